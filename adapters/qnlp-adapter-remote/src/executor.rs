//! Remote executor implementation.

use std::time::Instant;

use async_trait::async_trait;
use qnlp_hal::{
    BackendConfig, Capabilities, Counts, ExecutionResult, Executor, HalError, HalResult,
    TokenProvider,
};
use qnlp_ir::Circuit;
use tracing::{debug, info, instrument};

use crate::api::{ExecuteRequest, RemoteClient, SessionInfo};
use crate::error::RemoteError;

/// Register width assumed when the session does not report one.
pub const DEFAULT_REMOTE_QUBITS: u32 = 20;

/// Shot budget used when the caller does not request one and the service
/// cannot return exact expectations.
pub const DEFAULT_REMOTE_SHOTS: u32 = 1024;

/// Executor backed by a remote REST service.
///
/// Constructed only through [`RemoteExecutor::connect`], which checks the
/// credential and completes a session handshake. Execution requests are not
/// retried.
#[derive(Debug)]
pub struct RemoteExecutor {
    name: String,
    client: RemoteClient,
    capabilities: Capabilities,
    session_id: String,
    default_shots: u32,
}

impl RemoteExecutor {
    /// Authenticate and open a session.
    ///
    /// The configured timeout bounds each HTTP request. A missing endpoint
    /// is a configuration error; a rejected token is an authentication
    /// error; any other handshake failure is an initialization error.
    #[instrument(skip(config, tokens), fields(backend = %config.name))]
    pub async fn connect(config: &BackendConfig, tokens: &dyn TokenProvider) -> HalResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(RemoteError::MissingEndpoint)?;
        let token = tokens.get_token().await?;

        let client = RemoteClient::new(endpoint, token, config.timeout)?;
        let session = client.session().await.map_err(handshake_error)?;
        if session.session_id.is_empty() {
            return Err(RemoteError::Handshake("service returned an empty session id".into()).into());
        }

        let capabilities = build_capabilities(config, &session)?;
        info!(
            session = %session.session_id,
            qubits = capabilities.num_qubits,
            exact = capabilities.supports_exact,
            "remote session established"
        );

        Ok(Self {
            name: config.name.clone(),
            client,
            capabilities,
            session_id: session.session_id,
            default_shots: config.shots.unwrap_or(DEFAULT_REMOTE_SHOTS),
        })
    }

    /// Session identifier from the handshake.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn resolve_shots(&self, shots: Option<u32>) -> HalResult<Option<u32>> {
        let shots = match shots {
            None if self.capabilities.supports_exact => return Ok(None),
            None => self.default_shots,
            Some(s) => s,
        };
        if shots == 0 {
            return Err(HalError::InvalidShots("shot count must be positive".into()));
        }
        if shots > self.capabilities.max_shots {
            return Err(HalError::InvalidShots(format!(
                "{shots} shots requested, maximum is {}",
                self.capabilities.max_shots
            )));
        }
        Ok(Some(shots))
    }
}

fn handshake_error(e: RemoteError) -> HalError {
    match e {
        RemoteError::ApiError {
            status: 401 | 403, ..
        } => e.into(),
        other => HalError::Initialization(other.to_string()),
    }
}

fn build_capabilities(config: &BackendConfig, session: &SessionInfo) -> HalResult<Capabilities> {
    let name = session.backend.clone().unwrap_or_else(|| config.name.clone());
    let mut caps = Capabilities::remote(name, session.num_qubits.unwrap_or(DEFAULT_REMOTE_QUBITS));
    if let Some(max_shots) = session.max_shots {
        caps.max_shots = max_shots;
    }
    caps.supports_exact = session.supports_exact;

    // Local configuration overrides what the service reports.
    if let Some(profile) = config.noise_profile.as_ref().or(session.noise_profile.as_ref()) {
        profile.validate()?;
        caps = caps.with_noise_profile(profile.clone());
    }
    Ok(caps)
}

#[async_trait]
impl Executor for RemoteExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[instrument(skip(self, circuit), fields(circuit = circuit.name(), session = %self.session_id))]
    async fn execute(&self, circuit: &Circuit, shots: Option<u32>) -> HalResult<ExecutionResult> {
        if circuit.num_qubits() > self.capabilities.num_qubits {
            return Err(HalError::CircuitTooLarge(format!(
                "Circuit has {} qubits but {} supports {}",
                circuit.num_qubits(),
                self.name,
                self.capabilities.num_qubits
            )));
        }
        let shots = self.resolve_shots(shots)?;

        let start = Instant::now();
        let response = self
            .client
            .execute(&ExecuteRequest { circuit, shots })
            .await?;
        let elapsed = start.elapsed();
        debug!(?shots, ?elapsed, "remote execution completed");

        let result = match (response.counts, response.expectations) {
            (Some(counts), _) => {
                let counts = Counts::from_pairs(counts);
                let used = shots
                    .or_else(|| u32::try_from(counts.total_shots()).ok())
                    .unwrap_or(u32::MAX);
                ExecutionResult::sampled(counts, used)
            }
            (None, Some(expectations)) => {
                if expectations.len() != circuit.num_qubits() as usize {
                    return Err(RemoteError::MalformedResponse(format!(
                        "expected {} expectations, got {}",
                        circuit.num_qubits(),
                        expectations.len()
                    ))
                    .into());
                }
                ExecutionResult::exact(expectations)
            }
            (None, None) => {
                return Err(RemoteError::MalformedResponse(
                    "response carried neither counts nor expectations".into(),
                )
                .into());
            }
        };

        Ok(result.with_execution_time(elapsed).with_backend(&self.name))
    }
}
