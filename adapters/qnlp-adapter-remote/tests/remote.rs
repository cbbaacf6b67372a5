//! Tests for the remote executor against local TCP fixtures.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use qnlp_adapter_remote::RemoteExecutor;
use qnlp_hal::{
    BackendConfig, BackendKind, DispatchOptions, Dispatcher, EnvTokenProvider, Executor, HalError,
    StaticTokenProvider,
};
use qnlp_ir::{Circuit, QubitId};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Read one HTTP/1.1 request: (request line, lowercased head, body).
fn read_request(stream: &mut TcpStream) -> Option<(String, String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request_line = head.lines().next().unwrap_or_default().to_uppercase();
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some((request_line, head, body))
}

/// Serve canned JSON responses chosen by `handler` until the test exits.
fn spawn_server<F>(handler: F) -> String
where
    F: Fn(&str, &str, &str) -> (u16, String) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let Some((line, head, body)) = read_request(&mut stream) else {
                continue;
            };
            let (status, payload) = handler(&line, &head, &body);
            let reason = match status {
                200 => "OK",
                401 => "Unauthorized",
                _ => "Error",
            };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                payload.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}")
}

/// Accept connections and never answer.
fn spawn_silent_peer() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    format!("http://{addr}")
}

fn authorized(head: &str) -> bool {
    head.contains("authorization: bearer test-token")
}

/// Sampling service: 4 qubits, counts skewed towards qubit 0 = 1.
fn sampling_service(line: &str, head: &str, body: &str) -> (u16, String) {
    if !authorized(head) {
        return (401, r#"{"error":"unauthorized"}"#.into());
    }
    if line.starts_with("GET /SESSION") {
        (
            200,
            r#"{"session_id":"s-1","backend":"lab-sim","num_qubits":4,"max_shots":1000}"#.into(),
        )
    } else if line.starts_with("POST /EXECUTE") && body.contains(r#""shots":100"#) {
        (200, r#"{"counts":{"0001":75,"0000":25}}"#.into())
    } else {
        (400, r#"{"error":"bad request"}"#.into())
    }
}

fn config(endpoint: &str) -> BackendConfig {
    BackendConfig::new("lab", BackendKind::Remote)
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(5))
}

fn token() -> StaticTokenProvider {
    StaticTokenProvider::new("test-token")
}

fn one_qubit_circuit() -> Circuit {
    let mut circuit = Circuit::new("ry", 4);
    circuit.ry(0.5, QubitId(0)).unwrap();
    circuit
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_reads_session_limits() {
    let endpoint = spawn_server(sampling_service);
    let executor = RemoteExecutor::connect(&config(&endpoint), &token())
        .await
        .unwrap();

    assert_eq!(executor.session_id(), "s-1");
    let caps = executor.capabilities();
    assert_eq!(caps.name, "lab-sim");
    assert_eq!(caps.num_qubits, 4);
    assert_eq!(caps.max_shots, 1000);
    assert!(!caps.supports_exact);
    assert!(!caps.is_simulator);
}

#[tokio::test]
async fn rejected_token_is_authentication_error() {
    let endpoint = spawn_server(sampling_service);
    let err = RemoteExecutor::connect(&config(&endpoint), &StaticTokenProvider::new("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, HalError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn missing_token_fails_before_network() {
    let provider = EnvTokenProvider::new("QNLP_REMOTE_TEST_UNSET_TOKEN_7731");
    let err = RemoteExecutor::connect(&config("http://127.0.0.1:9"), &provider)
        .await
        .unwrap_err();
    assert!(matches!(err, HalError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn missing_endpoint_is_configuration_error() {
    let config = BackendConfig::new("lab", BackendKind::Remote);
    let err = RemoteExecutor::connect(&config, &token()).await.unwrap_err();
    assert!(matches!(err, HalError::Configuration(_)));
}

#[tokio::test]
async fn server_error_during_handshake_is_initialization_error() {
    let endpoint = spawn_server(|_, _, _| (500, r#"{"error":"down"}"#.into()));
    let err = RemoteExecutor::connect(&config(&endpoint), &token())
        .await
        .unwrap_err();
    assert!(matches!(err, HalError::Initialization(_)));
    assert!(err.to_string().starts_with("Backend initialization failed"));
}

#[tokio::test]
async fn silent_peer_times_out_during_handshake() {
    let endpoint = spawn_silent_peer();
    let config = config(&endpoint).with_timeout(Duration::from_millis(200));
    let err = RemoteExecutor::connect(&config, &token()).await.unwrap_err();
    assert!(matches!(err, HalError::Initialization(_)));
}

#[test]
fn dispatcher_bounds_connect() {
    let endpoint = spawn_silent_peer();
    let config = config(&endpoint);
    let options = DispatchOptions::default().with_timeout(Duration::from_millis(100));

    let err = Dispatcher::connect(options, move || async move {
        let executor = RemoteExecutor::connect(&config, &token()).await?;
        Ok(Arc::new(executor) as Arc<dyn Executor>)
    })
    .unwrap_err();
    assert!(matches!(err, HalError::Initialization(_)));
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn execute_returns_counts() {
    let endpoint = spawn_server(sampling_service);
    let executor = RemoteExecutor::connect(&config(&endpoint), &token())
        .await
        .unwrap();

    let result = executor
        .execute(&one_qubit_circuit(), Some(100))
        .await
        .unwrap();
    assert_eq!(result.shots, Some(100));
    assert_eq!(result.backend, "lab");

    let z = result.expectation_values(4);
    assert!((z[0] + 0.5).abs() < 1e-12);
    assert!((z[1] - 1.0).abs() < 1e-12);
}

#[tokio::test]
async fn execute_rejects_excess_shots_locally() {
    let endpoint = spawn_server(sampling_service);
    let executor = RemoteExecutor::connect(&config(&endpoint), &token())
        .await
        .unwrap();
    let err = executor
        .execute(&one_qubit_circuit(), Some(5000))
        .await
        .unwrap_err();
    assert!(matches!(err, HalError::InvalidShots(_)));
}

#[tokio::test]
async fn execute_rejects_wide_circuit() {
    let endpoint = spawn_server(sampling_service);
    let executor = RemoteExecutor::connect(&config(&endpoint), &token())
        .await
        .unwrap();
    let err = executor
        .execute(&Circuit::new("wide", 8), Some(100))
        .await
        .unwrap_err();
    assert!(matches!(err, HalError::CircuitTooLarge(_)));
}

#[tokio::test]
async fn exact_service_returns_expectations() {
    let endpoint = spawn_server(|line, _, body| {
        if line.starts_with("GET /SESSION") {
            (
                200,
                r#"{"session_id":"s-2","num_qubits":2,"supports_exact":true}"#.into(),
            )
        } else if body.contains("shots") {
            (400, "{}".into())
        } else {
            (200, r#"{"expectations":[0.25,-1.0]}"#.into())
        }
    });
    let executor = RemoteExecutor::connect(&config(&endpoint), &token())
        .await
        .unwrap();
    let result = executor
        .execute(&Circuit::new("pair", 2), None)
        .await
        .unwrap();
    assert!(result.counts().is_none());
    assert_eq!(result.expectation_values(2), vec![0.25, -1.0]);
}

#[tokio::test]
async fn empty_execute_response_is_backend_error() {
    let endpoint = spawn_server(|line, _, _| {
        if line.starts_with("GET /SESSION") {
            (200, r#"{"session_id":"s-3","num_qubits":2}"#.into())
        } else {
            (200, "{}".into())
        }
    });
    let executor = RemoteExecutor::connect(&config(&endpoint), &token())
        .await
        .unwrap();
    let err = executor
        .execute(&Circuit::new("pair", 2), Some(10))
        .await
        .unwrap_err();
    assert!(matches!(err, HalError::Backend(_)));
}
