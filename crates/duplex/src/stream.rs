//! The duplex stream abstraction consumed by the driver.
//!
//! A [`DuplexStream`] is split once into a [`SendHalf`] and a [`RecvHalf`].
//! Each half is then owned by exactly one task, so the two directions never
//! share mutable state.

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a stream transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The direction is gone; nothing more can be sent or closed on it.
    #[error("stream closed")]
    Closed,
    /// Error reported by the remote end or the underlying transport.
    #[error("transport error: {0}")]
    Remote(#[source] Box<dyn StdError + Send + Sync>),
}

impl TransportError {
    /// Wrap an arbitrary transport error.
    pub fn remote<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::Remote(err.into())
    }

    /// Whether the direction this error came from can no longer be used,
    /// not even to close it.
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The wrapped remote error, if any.
    pub fn remote_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Closed => None,
            Self::Remote(err) => Some(err.as_ref()),
        }
    }
}

/// The outbound direction of a duplex stream.
#[async_trait]
pub trait SendHalf<T: Send + 'static>: Send + 'static {
    /// Send one item.
    ///
    /// Must be cancel-safe: the driver drops the future if the receive
    /// direction finishes while a send is pending.
    async fn send(&mut self, item: T) -> Result<(), TransportError>;

    /// Close the outbound direction. Consumes the half, so a stream can only
    /// be closed once and nothing can be sent afterwards.
    async fn close_send(self) -> Result<(), TransportError>;
}

/// The inbound direction of a duplex stream.
#[async_trait]
pub trait RecvHalf<T: Send + 'static>: Send + 'static {
    /// Receive the next item. `Ok(None)` marks the graceful end of the stream.
    async fn receive(&mut self) -> Result<Option<T>, TransportError>;
}

/// A bidirectional stream that can be partitioned into its two directions.
pub trait DuplexStream: Send + 'static {
    /// Items sent to the remote.
    type Outbound: fmt::Debug + Send + 'static;
    /// Items received from the remote.
    type Inbound: fmt::Debug + Send + 'static;
    /// The outbound half.
    type Sender: SendHalf<Self::Outbound>;
    /// The inbound half.
    type Receiver: RecvHalf<Self::Inbound>;

    /// Split the stream into independently owned halves.
    fn split(self) -> (Self::Sender, Self::Receiver);
}

/// Sink for received items.
pub trait OutputSink<T>: Send + 'static {
    /// Deliver one received item.
    fn deliver(&mut self, item: T);
}

impl<T, F> OutputSink<T> for F
where
    F: FnMut(T) + Send + 'static,
{
    fn deliver(&mut self, item: T) {
        self(item)
    }
}
