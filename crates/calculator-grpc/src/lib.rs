//! Calculator gRPC client
//!
//! Adapts the calculator service's bidirectional `FindMaximum` call to the
//! [`duplex_driver`] stream traits, so a [`DuplexStreamDriver`] can stream
//! numbers to the server while printing the running maxima it sends back.
//!
//! # Example Flow
//!
//! ```text
//! Client                                    Server
//! │                                           │
//! │  FindMaximumRequest{number: 1223}         │
//! │ ─────────────────────────────────────────>│
//! │       FindMaximumResponse{maximum: 1223}  │
//! │<───────────────────────────────────────── │
//! │  FindMaximumRequest{number: 432}          │
//! │ ─────────────────────────────────────────>│
//! │  FindMaximumRequest{number: 31204}        │
//! │ ─────────────────────────────────────────>│
//! │       FindMaximumResponse{maximum: 31204} │
//! │<───────────────────────────────────────── │
//! │  (request stream closed)                  │
//! │ ─────────────────────────────────────────>│
//! │       (response stream ends)              │
//! │<───────────────────────────────────────── │
//! ```
//!
//! [`DuplexStreamDriver`]: duplex_driver::DuplexStreamDriver

pub mod proto {
    #![allow(missing_docs)]
    #![allow(clippy::doc_markdown)]
    tonic::include_proto!("calculator.v1");
}

mod stream;

pub use stream::{GrpcDuplex, GrpcReceiver, GrpcSender, open_find_maximum, status_of};

// Re-export proto types for convenience
pub use proto::{
    FindMaximumRequest, FindMaximumResponse, calculator_service_client::CalculatorServiceClient,
    calculator_service_server::CalculatorServiceServer,
};

/// Numbers streamed when none are given on the command line.
pub const DEFAULT_NUMBERS: [i32; 6] = [1223, 432, 31204, 3432, 45001, 34885488];
