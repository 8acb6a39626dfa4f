//! Integration tests for the FindMaximum bidirectional stream.
//!
//! These tests run the duplex driver against an in-process calculator
//! server over a real gRPC connection.

#![allow(clippy::unwrap_used)] // unwrap is acceptable in tests

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_stream::{Stream, StreamExt};
use tokio_test::{assert_err, assert_ok};
use tonic::transport::Channel;
use tonic::{Code, Request, Response, Status, Streaming};

use calculator_grpc::proto::calculator_service_server::CalculatorService;
use calculator_grpc::{
    CalculatorServiceClient, CalculatorServiceServer, DEFAULT_NUMBERS, FindMaximumRequest,
    FindMaximumResponse, open_find_maximum, status_of,
};
use duplex_driver::{DriverConfig, DuplexError, DuplexStreamDriver};

static INIT_TRACING: Once = Once::new();

fn init_tracing() {
    INIT_TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("calculator_grpc=debug,duplex_driver=debug")
            .with_test_writer()
            .init();
    });
}

/// Macro to log messages in tests (visible with --nocapture)
macro_rules! test_log {
    ($($arg:tt)*) => {
        eprintln!("[TEST] {}", format!($($arg)*));
    };
}

/// How the test server answers a FindMaximum call.
#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Report the running maximum whenever it grows; end when the client does.
    RunningMaximum,
    /// Reject negative numbers with `InvalidArgument`.
    RejectNegative,
    /// Answer the first number, then end the call.
    FirstOnly,
}

#[derive(Debug)]
struct TestCalculator {
    behavior: Behavior,
}

type FindMaximumStream = Pin<Box<dyn Stream<Item = Result<FindMaximumResponse, Status>> + Send>>;

#[tonic::async_trait]
impl CalculatorService for TestCalculator {
    type FindMaximumStream = FindMaximumStream;

    async fn find_maximum(
        &self,
        request: Request<Streaming<FindMaximumRequest>>,
    ) -> Result<Response<Self::FindMaximumStream>, Status> {
        let mut inbound = request.into_inner();
        let behavior = self.behavior;
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut maximum: Option<i32> = None;
            while let Some(Ok(req)) = inbound.next().await {
                test_log!("Server got {}", req.number);
                if matches!(behavior, Behavior::RejectNegative) && req.number < 0 {
                    let _ = tx
                        .send(Err(Status::invalid_argument(format!(
                            "negative number: {}",
                            req.number
                        ))))
                        .await;
                    return;
                }
                if maximum.is_none_or(|max| req.number > max) {
                    maximum = Some(req.number);
                    let response = FindMaximumResponse {
                        maximum: req.number,
                    };
                    if tx.send(Ok(response)).await.is_err() {
                        return;
                    }
                }
                if matches!(behavior, Behavior::FirstOnly) {
                    return;
                }
            }
        });

        Ok(Response::new(
            Box::pin(ReceiverStream::new(rx)) as Self::FindMaximumStream
        ))
    }
}

/// Start the test server and return its address.
async fn start_test_server(behavior: Behavior) -> SocketAddr {
    let addr: SocketAddr = "[::1]:0".parse().unwrap();

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let actual_addr = listener.local_addr().unwrap();
    test_log!("Server bound to {}", actual_addr);

    let service = TestCalculator { behavior };

    tokio::spawn(async move {
        let result = tonic::transport::Server::builder()
            .add_service(CalculatorServiceServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
        test_log!("Server task ended: {:?}", result);
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    actual_addr
}

/// Connect a client to the server.
async fn connect_client(addr: SocketAddr) -> CalculatorServiceClient<Channel> {
    let endpoint = format!("http://{}", addr);
    CalculatorServiceClient::connect(endpoint).await.unwrap()
}

fn requests(numbers: &[i32]) -> Vec<FindMaximumRequest> {
    numbers
        .iter()
        .map(|&number| FindMaximumRequest { number })
        .collect()
}

type Maxima = Arc<Mutex<Vec<i32>>>;

fn collector() -> (Maxima, impl FnMut(FindMaximumResponse) + Send + 'static) {
    let maxima = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let maxima = Arc::clone(&maxima);
        move |response: FindMaximumResponse| maxima.lock().unwrap().push(response.maximum)
    };
    (maxima, sink)
}

fn quick() -> DriverConfig {
    DriverConfig::default()
        .with_pacing(Duration::from_millis(5))
        .with_timeout(Duration::from_secs(10))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_running_maximum() {
    init_tracing();
    let addr = start_test_server(Behavior::RunningMaximum).await;
    let mut client = connect_client(addr).await;

    let stream = open_find_maximum(&mut client, 16).await.unwrap();
    let (maxima, sink) = collector();

    let summary = assert_ok!(
        DuplexStreamDriver::new(stream, requests(&DEFAULT_NUMBERS), sink)
            .with_config(quick())
            .run()
            .await
    );

    assert_eq!(summary.sent, 6);
    assert_eq!(summary.received, 4);
    assert_eq!(*maxima.lock().unwrap(), vec![1223, 31204, 45001, 34885488]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_runs_are_repeatable() {
    let addr = start_test_server(Behavior::RunningMaximum).await;
    let mut client = connect_client(addr).await;

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let stream = open_find_maximum(&mut client, 16).await.unwrap();
        let (maxima, sink) = collector();

        assert_ok!(
            DuplexStreamDriver::new(stream, requests(&[5, 3, 9, 1, 12]), sink)
                .with_config(quick())
                .run()
                .await
        );

        outputs.push(maxima.lock().unwrap().clone());
    }

    assert_eq!(outputs[0], vec![5, 9, 12]);
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_error_is_surfaced() {
    init_tracing();
    let addr = start_test_server(Behavior::RejectNegative).await;
    let mut client = connect_client(addr).await;

    let stream = open_find_maximum(&mut client, 16).await.unwrap();
    let (maxima, sink) = collector();

    let err = assert_err!(
        DuplexStreamDriver::new(stream, requests(&[10, 20, -1, 30, 40]), sink)
            .with_config(quick())
            .run()
            .await
    );
    test_log!("Run failed with: {}", err);

    // The send direction may also notice the call ending; the receive
    // failure is what matters.
    let receive = err.receive_error().unwrap();
    assert_eq!(receive.received, 2);
    let status = status_of(&receive.source).unwrap();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("-1"));
    assert_eq!(*maxima.lock().unwrap(), vec![10, 20]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_ending_early_stops_sender() {
    let addr = start_test_server(Behavior::FirstOnly).await;
    let mut client = connect_client(addr).await;

    let stream = open_find_maximum(&mut client, 16).await.unwrap();
    let (maxima, sink) = collector();

    let result = timeout(
        Duration::from_secs(5),
        DuplexStreamDriver::new(stream, requests(&DEFAULT_NUMBERS), sink)
            .with_config(DriverConfig::default().with_pacing(Duration::from_millis(200)))
            .run(),
    )
    .await
    .unwrap();

    let summary = assert_ok!(result);
    assert!(summary.stopped_early());
    assert_eq!(summary.received, 1);
    assert_eq!(*maxima.lock().unwrap(), vec![1223]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_against_stalled_server() {
    let addr = start_test_server(Behavior::RunningMaximum).await;
    let mut client = connect_client(addr).await;

    let stream = open_find_maximum(&mut client, 16).await.unwrap();
    let (_, sink) = collector();

    // Pacing far beyond the timeout keeps the call open.
    let config = DriverConfig::default()
        .with_pacing(Duration::from_secs(3600))
        .with_timeout(Duration::from_millis(200));

    let err = assert_err!(
        DuplexStreamDriver::new(stream, requests(&[1, 2]), sink)
            .with_config(config)
            .run()
            .await
    );

    assert!(matches!(err, DuplexError::TimedOut(_)));
}
