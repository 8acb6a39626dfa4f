//! Duplex stream driver
//!
//! Drives a bidirectional stream from the client side: one task sends a
//! fixed sequence of items on the outbound direction while another task
//! drains the inbound direction into a sink. The two tasks own disjoint
//! halves of the stream and are coordinated by a one-shot completion signal
//! fired when the inbound direction ends.
//!
//! # Example Flow
//!
//! ```text
//! Sender task          Stream              Receiver task
//! │                      │                      │
//! │  send(1223)          │                      │
//! │ ───────────────────> │   receive() -> 1223  │
//! │                      │ ───────────────────> │ sink(1223)
//! │  send(432)           │                      │
//! │ ───────────────────> │                      │
//! │  close_send()        │                      │
//! │ ───────────────────> │   receive() -> None  │
//! │                      │ ───────────────────> │ fire completion
//! │                                              │
//! run() returns once the completion signal fires
//! ```
//!
//! Errors from either direction are collected into a [`DuplexError`] rather
//! than aborting the process, so the caller decides what is fatal.

mod completion;
mod config;
mod driver;
mod error;
mod stream;


pub use completion::{CompletionSignal, CompletionWatch, channel as completion_channel};
pub use config::{ConfigError, DriverConfig};
pub use driver::{DuplexStreamDriver, RunSummary};
pub use error::{DuplexError, ReceiveError, SendError};
pub use stream::{DuplexStream, OutputSink, RecvHalf, SendHalf, TransportError};
