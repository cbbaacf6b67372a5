//! Synchronous dispatch onto async executors.
//!
//! The classifier API is synchronous; executors are async. A [`Dispatcher`]
//! owns a multi-threaded tokio runtime and bridges the two:
//!
//! ```text
//!   run(&Circuit)          ──→ block_on(timeout(execute))
//!   run_batch(Vec<Circuit>) ──→ block_on(join_all(spawn × N))
//!                                   │
//!                                   └─ Semaphore(max_concurrency)
//! ```
//!
//! Every executor call runs under the configured timeout. A [`CancelToken`]
//! is checked before each dispatch.
//!
//! A `Dispatcher` must be created and dropped outside of any async context,
//! since it owns and shuts down its own runtime.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use num_complex::Complex64;
use qnlp_ir::Circuit;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::backend::{Executor, ValidationResult};
use crate::error::{HalError, HalResult};
use crate::result::ExecutionResult;

/// Dispatch limits.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Budget for each executor call and for initialization.
    pub timeout: Duration,
    /// Maximum number of in-flight executions in a batch.
    pub max_concurrency: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_concurrency: 1,
        }
    }
}

impl DispatchOptions {
    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the batch concurrency bound; zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Fail with [`HalError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> HalResult<()> {
        if self.is_cancelled() {
            Err(HalError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Runs circuits on a shared executor from synchronous code.
pub struct Dispatcher {
    runtime: Runtime,
    executor: Arc<dyn Executor>,
    options: DispatchOptions,
    cancel: CancelToken,
}

impl Dispatcher {
    /// Wrap an already constructed executor.
    pub fn new(executor: Arc<dyn Executor>, options: DispatchOptions) -> HalResult<Self> {
        let runtime = build_runtime(&options)?;
        Ok(Self {
            runtime,
            executor,
            options,
            cancel: CancelToken::new(),
        })
    }

    /// Construct the executor on the dispatcher's runtime.
    ///
    /// `init` runs under the configured timeout; if it elapses the result is
    /// [`HalError::Initialization`]. Errors returned by `init` itself are
    /// passed through unchanged.
    pub fn connect<F, Fut>(options: DispatchOptions, init: F) -> HalResult<Self>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HalResult<Arc<dyn Executor>>>,
    {
        let runtime = build_runtime(&options)?;
        let budget = options.timeout;
        let executor = runtime.block_on(async move {
            match tokio::time::timeout(budget, init()).await {
                Ok(result) => result,
                Err(_) => Err(HalError::Initialization(format!(
                    "no response within {budget:?}"
                ))),
            }
        })?;
        debug!(executor = executor.name(), "executor connected");
        Ok(Self {
            runtime,
            executor,
            options,
            cancel: CancelToken::new(),
        })
    }

    /// The wrapped executor.
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Dispatch limits in effect.
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Handle for cancelling dispatches from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Validate a circuit against the executor.
    pub fn validate(&self, circuit: &Circuit) -> HalResult<ValidationResult> {
        self.runtime.block_on(self.executor.validate(circuit))
    }

    /// Execute one circuit.
    pub fn run(&self, circuit: &Circuit, shots: Option<u32>) -> HalResult<ExecutionResult> {
        self.cancel.check()?;
        self.runtime.block_on(execute_within(
            self.executor.as_ref(),
            circuit,
            shots,
            self.options.timeout,
        ))
    }

    /// Final statevector, when the executor has state access.
    pub fn statevector(&self, circuit: &Circuit) -> HalResult<Option<Vec<Complex64>>> {
        self.cancel.check()?;
        let budget = self.options.timeout;
        self.runtime.block_on(async {
            tokio::time::timeout(budget, self.executor.statevector(circuit))
                .await
                .map_err(|_| timeout_error(self.executor.name(), budget))?
        })
    }

    /// Execute circuits concurrently, bounded by `max_concurrency`.
    ///
    /// Results come back in input order. The first failure, in input order,
    /// is returned.
    pub fn run_batch(
        &self,
        circuits: Vec<Circuit>,
        shots: Option<u32>,
    ) -> HalResult<Vec<ExecutionResult>> {
        self.cancel.check()?;
        if circuits.is_empty() {
            return Ok(Vec::new());
        }

        let budget = self.options.timeout;
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let start = Instant::now();
        let count = circuits.len();

        let results = self.runtime.block_on(async {
            let handles: Vec<_> = circuits
                .into_iter()
                .map(|circuit| {
                    let executor = Arc::clone(&self.executor);
                    let semaphore = Arc::clone(&semaphore);
                    let cancel = self.cancel.clone();
                    tokio::spawn(async move {
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .map_err(|_| HalError::Cancelled)?;
                        cancel.check()?;
                        execute_within(executor.as_ref(), &circuit, shots, budget).await
                    })
                })
                .collect();
            join_all(handles).await
        });

        debug!(
            circuits = count,
            max_concurrency = self.options.max_concurrency,
            elapsed = ?start.elapsed(),
            "batch dispatched"
        );

        results
            .into_iter()
            .map(|joined| {
                joined.map_err(|e| {
                    warn!(error = %e, "dispatch task aborted");
                    HalError::Backend(format!("dispatch task failed: {e}"))
                })?
            })
            .collect()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("executor", &self.executor.name())
            .field("options", &self.options)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

fn build_runtime(options: &DispatchOptions) -> HalResult<Runtime> {
    let available = std::thread::available_parallelism().map_or(1, |n| n.get());
    let workers = options.max_concurrency.clamp(1, available.max(1));
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("qnlp-dispatch")
        .enable_all()
        .build()
        .map_err(|e| HalError::Configuration(format!("failed to start dispatch runtime: {e}")))
}

fn timeout_error(executor: &str, budget: Duration) -> HalError {
    HalError::Timeout(format!("{executor} did not respond within {budget:?}"))
}

async fn execute_within(
    executor: &dyn Executor,
    circuit: &Circuit,
    shots: Option<u32>,
    budget: Duration,
) -> HalResult<ExecutionResult> {
    let start = Instant::now();
    let result = tokio::time::timeout(budget, executor.execute(circuit, shots))
        .await
        .map_err(|_| timeout_error(executor.name(), budget))??;
    if result.execution_time.is_zero() {
        Ok(result.with_execution_time(start.elapsed()))
    } else {
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Echoes the circuit name back as the backend name after a delay.
    struct EchoExecutor {
        capabilities: Capabilities,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl EchoExecutor {
        fn new(delay: Duration) -> Self {
            Self {
                capabilities: Capabilities::simulator(4),
                delay,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Executor for EchoExecutor {
        fn name(&self) -> &str {
            "echo"
        }

        fn capabilities(&self) -> &Capabilities {
            &self.capabilities
        }

        async fn execute(&self, circuit: &Circuit, _shots: Option<u32>) -> HalResult<ExecutionResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if circuit.name() == "fail" {
                return Err(HalError::Backend("requested failure".into()));
            }
            Ok(ExecutionResult::exact(vec![1.0]).with_backend(circuit.name()))
        }
    }

    fn circuits(n: usize) -> Vec<Circuit> {
        (0..n).map(|i| Circuit::new(format!("c{i}"), 1)).collect()
    }

    #[test]
    fn test_run_single() {
        let executor = Arc::new(EchoExecutor::new(Duration::from_millis(1)));
        let dispatcher = Dispatcher::new(executor, DispatchOptions::default()).unwrap();
        let result = dispatcher.run(&Circuit::new("one", 1), None).unwrap();
        assert_eq!(result.backend, "one");
        assert!(!result.execution_time.is_zero());
    }

    #[test]
    fn test_run_batch_preserves_order() {
        let executor = Arc::new(EchoExecutor::new(Duration::from_millis(5)));
        let dispatcher = Dispatcher::new(
            executor,
            DispatchOptions::default().with_max_concurrency(4),
        )
        .unwrap();

        let results = dispatcher.run_batch(circuits(10), None).unwrap();
        let names: Vec<_> = results.iter().map(|r| r.backend.clone()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("c{i}")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_run_batch_respects_concurrency_bound() {
        let executor = Arc::new(EchoExecutor::new(Duration::from_millis(10)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&executor) as Arc<dyn Executor>,
            DispatchOptions::default().with_max_concurrency(2),
        )
        .unwrap();

        dispatcher.run_batch(circuits(8), None).unwrap();
        let peak = executor.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak in-flight was {peak}");
        assert!(peak >= 1);
    }

    #[test]
    fn test_run_batch_empty() {
        let executor = Arc::new(EchoExecutor::new(Duration::ZERO));
        let dispatcher = Dispatcher::new(executor, DispatchOptions::default()).unwrap();
        assert!(dispatcher.run_batch(Vec::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_run_batch_reports_failure() {
        let executor = Arc::new(EchoExecutor::new(Duration::from_millis(1)));
        let dispatcher = Dispatcher::new(
            executor,
            DispatchOptions::default().with_max_concurrency(3),
        )
        .unwrap();
        let mut batch = circuits(3);
        batch.push(Circuit::new("fail", 1));
        assert!(matches!(
            dispatcher.run_batch(batch, None),
            Err(HalError::Backend(_))
        ));
    }

    #[test]
    fn test_timeout() {
        let executor = Arc::new(EchoExecutor::new(Duration::from_millis(500)));
        let dispatcher = Dispatcher::new(
            executor,
            DispatchOptions::default().with_timeout(Duration::from_millis(20)),
        )
        .unwrap();
        let err = dispatcher.run(&Circuit::new("slow", 1), None).unwrap_err();
        assert!(matches!(err, HalError::Timeout(_)));
    }

    #[test]
    fn test_cancelled_before_dispatch() {
        let executor = Arc::new(EchoExecutor::new(Duration::ZERO));
        let dispatcher = Dispatcher::new(executor, DispatchOptions::default()).unwrap();
        let token = dispatcher.cancel_token();
        token.cancel();

        assert!(matches!(
            dispatcher.run(&Circuit::new("x", 1), None),
            Err(HalError::Cancelled)
        ));
        assert!(matches!(
            dispatcher.run_batch(circuits(2), None),
            Err(HalError::Cancelled)
        ));

        token.reset();
        assert!(dispatcher.run(&Circuit::new("x", 1), None).is_ok());
    }

    #[test]
    fn test_connect_timeout_is_initialization_error() {
        let options = DispatchOptions::default().with_timeout(Duration::from_millis(20));
        let err = Dispatcher::connect(options, || async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(Arc::new(EchoExecutor::new(Duration::ZERO)) as Arc<dyn Executor>)
        })
        .unwrap_err();
        assert!(matches!(err, HalError::Initialization(_)));
        assert!(err.to_string().starts_with("Backend initialization failed"));
    }

    #[test]
    fn test_connect_passes_init_error_through() {
        let err = Dispatcher::connect(DispatchOptions::default(), || async {
            Err::<Arc<dyn Executor>, _>(HalError::AuthenticationFailed("no token".into()))
        })
        .unwrap_err();
        assert!(matches!(err, HalError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_connect_success() {
        let dispatcher = Dispatcher::connect(DispatchOptions::default(), || async {
            Ok(Arc::new(EchoExecutor::new(Duration::ZERO)) as Arc<dyn Executor>)
        })
        .unwrap();
        assert_eq!(dispatcher.executor().name(), "echo");
        assert!(dispatcher.statevector(&Circuit::new("c", 1)).unwrap().is_none());
    }
}
