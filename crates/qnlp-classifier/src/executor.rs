//! Executor construction from classifier settings.

use std::sync::Arc;

use qnlp_adapter_remote::RemoteExecutor;
use qnlp_adapter_sim::{ShotExecutor, StatevectorExecutor};
use qnlp_hal::{BackendKind, DispatchOptions, Dispatcher, EnvTokenProvider, Executor, TokenProvider};
use tracing::info;

use crate::config::ClassifierConfig;
use crate::error::{QnlpError, QnlpResult};

/// Token provider used when none is supplied: reads `QNLP_BACKEND_TOKEN`.
pub fn default_token_provider() -> Arc<dyn TokenProvider> {
    Arc::new(EnvTokenProvider::default())
}

/// Build a dispatcher for the configured executor.
///
/// Remote executors are connected eagerly, within the configured timeout.
/// Any failure is reported as [`QnlpError::Backend`]; there is no fallback
/// to a local simulator.
pub fn connect(config: &ClassifierConfig, tokens: Arc<dyn TokenProvider>) -> QnlpResult<Dispatcher> {
    let backend = config.backend_config();
    let kind = backend.kind;
    let options = DispatchOptions::default()
        .with_timeout(backend.timeout)
        .with_max_concurrency(config.backend.max_concurrency);

    let dispatcher = match kind {
        BackendKind::Statevector => StatevectorExecutor::from_config(&backend)
            .and_then(|executor| Dispatcher::new(Arc::new(executor), options)),
        BackendKind::ShotSampling => ShotExecutor::from_config(&backend)
            .and_then(|executor| Dispatcher::new(Arc::new(executor), options)),
        BackendKind::Remote => Dispatcher::connect(options, move || async move {
            let executor = RemoteExecutor::connect(&backend, tokens.as_ref()).await?;
            Ok(Arc::new(executor) as Arc<dyn Executor>)
        }),
    }
    .map_err(|e| QnlpError::backend(format!("backend initialization failed ({kind})"), e))?;

    info!(
        backend = %kind,
        executor = dispatcher.executor().name(),
        max_concurrency = dispatcher.options().max_concurrency,
        "executor ready"
    );
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use qnlp_hal::{HalError, StaticTokenProvider};

    #[test]
    fn test_local_executors() {
        let mut config = ClassifierConfig::default();
        let dispatcher = connect(&config, default_token_provider()).unwrap();
        assert!(dispatcher.executor().capabilities().supports_exact);

        config.backend.kind = BackendKind::ShotSampling;
        config.backend.max_concurrency = 3;
        let dispatcher = connect(&config, default_token_provider()).unwrap();
        assert!(!dispatcher.executor().capabilities().supports_exact);
        assert_eq!(dispatcher.options().max_concurrency, 3);
    }

    #[test]
    fn test_remote_without_endpoint_is_backend_error() {
        let mut config = ClassifierConfig::default();
        config.backend.kind = BackendKind::Remote;

        let err = connect(&config, Arc::new(StaticTokenProvider::new("t0ken"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(
            err.to_string().contains("backend initialization failed (remote)"),
            "{err}"
        );
        assert!(matches!(
            err,
            QnlpError::Backend {
                source: Some(HalError::Configuration(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_noise_profile_is_backend_error() {
        let mut config = ClassifierConfig::default();
        config.backend.noise_profile = Some(qnlp_hal::NoiseProfile::uniform(-0.1, 0.0));
        let err = connect(&config, default_token_provider()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.to_string().contains("backend initialization failed (statevector)"));
    }
}
