//! Concurrent driver for both directions of a duplex stream.

use std::fmt;
use std::future::{self, Future};
use std::time::Duration;

use crate::completion::{self, CompletionSignal, CompletionWatch};
use crate::config::DriverConfig;
use crate::error::{DuplexError, ReceiveError, SendError};
use crate::stream::{DuplexStream, OutputSink, RecvHalf, SendHalf};

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Items in the input sequence
    pub total: usize,
    /// Items actually sent
    pub sent: usize,
    /// Items delivered to the sink
    pub received: usize,
}

impl RunSummary {
    /// Whether the remote ended the stream before every item was sent.
    pub fn stopped_early(&self) -> bool {
        self.sent < self.total
    }
}

/// Sends a fixed sequence on one direction of a [`DuplexStream`] while
/// draining the other direction into a sink.
///
/// The two directions run as separate tokio tasks. [`run`](Self::run)
/// returns once the receive direction has finished; a sender still pacing
/// at that point stops, closes its direction, and is joined before the
/// results are reported.
pub struct DuplexStreamDriver<S: DuplexStream, K> {
    stream: S,
    items: Vec<S::Outbound>,
    sink: K,
    on_send: Option<SendObserver<S::Outbound>>,
    config: DriverConfig,
}

/// Callback invoked with each item right before it is sent.
type SendObserver<T> = Box<dyn FnMut(&T) + Send>;

impl<S: DuplexStream, K> fmt::Debug for DuplexStreamDriver<S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplexStreamDriver")
            .field("items", &self.items)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, K> DuplexStreamDriver<S, K>
where
    S: DuplexStream,
    K: OutputSink<S::Inbound>,
{
    /// Create a driver with the default configuration.
    pub fn new(stream: S, items: Vec<S::Outbound>, sink: K) -> Self {
        Self {
            stream,
            items,
            sink,
            on_send: None,
            config: DriverConfig::default(),
        }
    }

    /// Observe each outbound item just before it is sent, e.g. to report
    /// progress.
    pub fn on_send<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&S::Outbound) + Send + 'static,
    {
        self.on_send = Some(Box::new(observer));
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Run both directions until the receive direction finishes.
    pub async fn run(self) -> Result<RunSummary, DuplexError> {
        self.run_until(future::pending()).await
    }

    /// Like [`run`](Self::run), but gives up with [`DuplexError::Cancelled`]
    /// as soon as `shutdown` completes. Both tasks are aborted, which drops
    /// the stream halves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<RunSummary, DuplexError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            stream,
            items,
            sink,
            on_send,
            config,
        } = self;
        let total = items.len();
        let (send_half, recv_half) = stream.split();
        let (signal, mut done) = completion::channel();

        tracing::debug!(total, pacing = ?config.pacing, "Starting duplex run");
        let sender = tokio::spawn(send_all(
            send_half,
            items,
            config.pacing,
            on_send,
            done.clone(),
        ));
        let receiver = tokio::spawn(receive_all(recv_half, sink, signal));
        let sender_abort = sender.abort_handle();
        let receiver_abort = receiver.abort_handle();

        let limit = config.timeout;
        let deadline = async move {
            match limit {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => future::pending().await,
            }
        };

        // The bound covers the sender join too: closing may stall after the
        // receive direction is already done.
        let joined = async move {
            done.fired().await;
            let received = receiver.await?;
            let sent = sender.await?;
            Ok::<_, tokio::task::JoinError>((sent, received))
        };

        tokio::pin!(shutdown, deadline, joined);

        let (sent, received) = tokio::select! {
            joined = &mut joined => match joined {
                Ok(results) => results,
                Err(e) => {
                    sender_abort.abort();
                    receiver_abort.abort();
                    return Err(e.into());
                }
            },
            _ = &mut shutdown => {
                tracing::info!("Duplex run cancelled");
                sender_abort.abort();
                receiver_abort.abort();
                return Err(DuplexError::Cancelled);
            }
            limit = &mut deadline => {
                tracing::warn!(?limit, "Duplex run timed out");
                sender_abort.abort();
                receiver_abort.abort();
                return Err(DuplexError::TimedOut(limit));
            }
        };

        match (sent, received) {
            (Ok(sent), Ok(received)) => {
                let summary = RunSummary {
                    total,
                    sent,
                    received,
                };
                tracing::debug!(?summary, "Duplex run finished");
                Ok(summary)
            }
            (Err(send), Ok(_)) => Err(DuplexError::Send(send)),
            (Ok(_), Err(receive)) => Err(DuplexError::Receive(receive)),
            (Err(send), Err(receive)) => Err(DuplexError::Both { send, receive }),
        }
    }
}

/// Send every item in order, then close the send direction.
///
/// Stops early when `done` fires, since the remote has then finished the
/// call. Returns the number of items sent.
pub(crate) async fn send_all<H, T>(
    mut half: H,
    items: Vec<T>,
    pacing: Duration,
    mut on_send: Option<SendObserver<T>>,
    mut done: CompletionWatch,
) -> Result<usize, SendError>
where
    H: SendHalf<T>,
    T: fmt::Debug + Send + 'static,
{
    let total = items.len();
    let mut sent = 0;

    for (index, item) in items.into_iter().enumerate() {
        if index > 0 && !pacing.is_zero() {
            tokio::select! {
                biased;
                _ = done.fired() => break,
                _ = tokio::time::sleep(pacing) => {}
            }
        }
        if done.is_fired() {
            break;
        }

        tracing::info!(index, ?item, "Sending item");
        if let Some(observer) = on_send.as_mut() {
            observer(&item);
        }
        let result = tokio::select! {
            biased;
            result = half.send(item) => result,
            _ = done.fired() => break,
        };

        if let Err(source) = result {
            tracing::error!(index, error = %source, "Failed to send item");
            let close = if source.is_broken() {
                None
            } else {
                half.close_send().await.err()
            };
            if let Some(e) = &close {
                tracing::warn!(error = %e, "Failed to close send direction after send error");
            }
            return Err(SendError::Item {
                index,
                source,
                close,
            });
        }
        sent += 1;
    }

    if sent < total {
        tracing::debug!(sent, total, "Receive direction finished first, stopping sends");
    }

    half.close_send()
        .await
        .map_err(|source| SendError::Close { source })?;
    tracing::debug!(sent, "Send direction closed");

    Ok(sent)
}

/// Drain the receive direction into `sink`, then fire `signal`.
///
/// The loop exits exactly once, on end-of-stream or on the first error, and
/// the signal is consumed right after. Returns the number of items
/// delivered.
pub(crate) async fn receive_all<H, T, K>(
    mut half: H,
    mut sink: K,
    signal: CompletionSignal,
) -> Result<usize, ReceiveError>
where
    H: RecvHalf<T>,
    T: fmt::Debug + Send + 'static,
    K: OutputSink<T>,
{
    let mut received = 0;

    let outcome = loop {
        match half.receive().await {
            Ok(Some(item)) => {
                tracing::debug!(received, ?item, "Received item");
                sink.deliver(item);
                received += 1;
            }
            Ok(None) => {
                tracing::debug!(received, "Receive direction ended");
                break Ok(received);
            }
            Err(source) => {
                tracing::error!(received, error = %source, "Failed to receive");
                break Err(ReceiveError { received, source });
            }
        }
    };

    signal.fire();
    outcome
}
