//! REST client for remote executor services.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `GET` | `/session` | | [`SessionInfo`] |
//! | `POST` | `/execute` | [`ExecuteRequest`] | [`ExecuteResponse`] |

use std::collections::BTreeMap;
use std::time::Duration;

use qnlp_hal::NoiseProfile;
use qnlp_ir::Circuit;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{RemoteError, RemoteResult};

/// Connect timeout applied on top of the per-request budget.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote executor REST client.
///
/// Authenticates with `Authorization: Bearer <token>` on every request.
pub struct RemoteClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl RemoteClient {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(RemoteError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> RemoteResult<T> {
        let url = self.url(path);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::handle_response(resp).await
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> RemoteResult<T> {
        let url = self.url(path);
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        Self::handle_response(resp).await
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> RemoteResult<T> {
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::ApiError {
                status: status.as_u16(),
                message: if message.is_empty() {
                    "token rejected".into()
                } else {
                    message
                },
            }),
            _ => Err(RemoteError::ApiError {
                status: status.as_u16(),
                message,
            }),
        }
    }

    /// Open a session and read the service's limits.
    #[instrument(skip(self))]
    pub async fn session(&self) -> RemoteResult<SessionInfo> {
        self.get("session").await
    }

    /// Execute one circuit.
    #[instrument(skip(self, request), fields(circuit = request.circuit.name()))]
    pub async fn execute(&self, request: &ExecuteRequest<'_>) -> RemoteResult<ExecuteResponse> {
        self.post("execute", request).await
    }
}

// ---------------------------------------------------------------------------
// Request / response serde types
// ---------------------------------------------------------------------------

/// Response from `GET /session`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    /// Session identifier assigned by the service.
    pub session_id: String,
    /// Device or simulator name.
    #[serde(default)]
    pub backend: Option<String>,
    /// Register width available.
    #[serde(default)]
    pub num_qubits: Option<u32>,
    /// Largest accepted shot count.
    #[serde(default)]
    pub max_shots: Option<u32>,
    /// Whether exact expectations can be requested.
    #[serde(default)]
    pub supports_exact: bool,
    /// Calibrated error probabilities.
    #[serde(default)]
    pub noise_profile: Option<NoiseProfile>,
}

/// Request body for `POST /execute`.
#[derive(Debug, Serialize)]
pub struct ExecuteRequest<'a> {
    /// Circuit in its serde wire form.
    pub circuit: &'a Circuit,
    /// Shots requested; absent for exact execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shots: Option<u32>,
}

/// Response from `POST /execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResponse {
    /// Sampled counts keyed by bitstring, qubit 0 rightmost.
    #[serde(default)]
    pub counts: Option<BTreeMap<String, u64>>,
    /// Exact ⟨Z⟩ per qubit.
    #[serde(default)]
    pub expectations: Option<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnlp_ir::QubitId;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = RemoteClient::new("http://localhost:9000/api/", "t", Duration::from_secs(1))
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000/api");
        assert_eq!(client.url("/execute"), "http://localhost:9000/api/execute");
    }

    #[test]
    fn test_client_debug_redacts_token() {
        let client = RemoteClient::new("http://x", "secret-123", Duration::from_secs(1)).unwrap();
        assert!(!format!("{client:?}").contains("secret-123"));
    }

    #[test]
    fn test_execute_request_shape() {
        let mut circuit = Circuit::new("c", 1);
        circuit.h(QubitId(0)).unwrap();
        let body = serde_json::to_value(ExecuteRequest {
            circuit: &circuit,
            shots: Some(100),
        })
        .unwrap();
        assert_eq!(body["shots"], 100);
        assert_eq!(body["circuit"]["num_qubits"], 1);

        let exact = serde_json::to_value(ExecuteRequest {
            circuit: &circuit,
            shots: None,
        })
        .unwrap();
        assert!(exact.get("shots").is_none());
    }

    #[test]
    fn test_session_defaults() {
        let info: SessionInfo = serde_json::from_str(r#"{"session_id": "s1"}"#).unwrap();
        assert_eq!(info.session_id, "s1");
        assert!(info.num_qubits.is_none());
        assert!(!info.supports_exact);
    }

    #[test]
    fn test_execute_response_variants() {
        let counts: ExecuteResponse =
            serde_json::from_str(r#"{"counts": {"01": 3, "10": 1}}"#).unwrap();
        assert_eq!(counts.counts.unwrap()["01"], 3);

        let exact: ExecuteResponse = serde_json::from_str(r#"{"expectations": [0.5]}"#).unwrap();
        assert_eq!(exact.expectations, Some(vec![0.5]));
    }
}
