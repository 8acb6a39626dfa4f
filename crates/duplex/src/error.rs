//! Errors surfaced by a driver run

use std::time::Duration;

use thiserror::Error;

use crate::stream::TransportError;

/// Failure on the send direction
#[derive(Debug, Error)]
pub enum SendError {
    /// Sending an item failed; later items were not sent
    #[error("failed to send item {index}: {source}")]
    Item {
        /// Position of the failed item in the input sequence
        index: usize,
        /// Underlying transport error
        #[source]
        source: TransportError,
        /// Failure closing the direction after the send error, if the close
        /// was attempted and failed
        close: Option<TransportError>,
    },
    /// Every item was sent but closing the direction failed
    #[error("failed to close send direction: {source}")]
    Close {
        /// Underlying transport error
        #[source]
        source: TransportError,
    },
}

impl SendError {
    /// The underlying transport error.
    pub fn transport(&self) -> &TransportError {
        match self {
            Self::Item { source, .. } | Self::Close { source } => source,
        }
    }

    /// The failure closing the direction after a failed send, if any.
    pub fn close_error(&self) -> Option<&TransportError> {
        match self {
            Self::Item { close, .. } => close.as_ref(),
            Self::Close { .. } => None,
        }
    }
}

/// Failure on the receive direction
#[derive(Debug, Error)]
#[error("receive failed after {received} items: {source}")]
pub struct ReceiveError {
    /// Items delivered to the sink before the failure
    pub received: usize,
    /// Underlying transport error
    #[source]
    pub source: TransportError,
}

/// Errors returned by [`DuplexStreamDriver::run`](crate::DuplexStreamDriver::run)
#[derive(Debug, Error)]
pub enum DuplexError {
    /// The send direction failed
    #[error("send direction: {0}")]
    Send(#[source] SendError),
    /// The receive direction failed
    #[error("receive direction: {0}")]
    Receive(#[source] ReceiveError),
    /// Both directions failed
    #[error("send direction: {send}; receive direction: {receive}")]
    Both {
        /// Send failure
        send: SendError,
        /// Receive failure
        #[source]
        receive: ReceiveError,
    },
    /// The run did not finish within the configured timeout
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    /// The run was cancelled by the caller
    #[error("cancelled")]
    Cancelled,
    /// A worker task panicked
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl DuplexError {
    /// The send failure, if the send direction failed.
    pub fn send_error(&self) -> Option<&SendError> {
        match self {
            Self::Send(send) | Self::Both { send, .. } => Some(send),
            _ => None,
        }
    }

    /// The receive failure, if the receive direction failed.
    pub fn receive_error(&self) -> Option<&ReceiveError> {
        match self {
            Self::Receive(receive) | Self::Both { receive, .. } => Some(receive),
            _ => None,
        }
    }
}
