//! One-shot completion signal.

use tokio::sync::watch;

/// Create a linked signal and watch pair.
pub fn channel() -> (CompletionSignal, CompletionWatch) {
    let (tx, rx) = watch::channel(false);
    (CompletionSignal { tx }, CompletionWatch { rx })
}

/// Write side of the completion signal.
///
/// [`fire`](Self::fire) consumes the signal, so it can fire at most once.
/// Dropping it without firing also releases every waiter, which keeps a
/// panicking owner from hanging them.
#[derive(Debug)]
pub struct CompletionSignal {
    tx: watch::Sender<bool>,
}

impl CompletionSignal {
    /// Fire the signal.
    pub fn fire(self) {
        self.tx.send_replace(true);
    }
}

/// Read side of the completion signal. Cheap to clone; every clone observes
/// the same firing.
#[derive(Debug, Clone)]
pub struct CompletionWatch {
    rx: watch::Receiver<bool>,
}

impl CompletionWatch {
    /// Wait until the signal fires or its owner goes away.
    ///
    /// Cancel-safe, so it can be used as a `select!` branch.
    pub async fn fired(&mut self) {
        // Err means the signal was dropped unfired; treat it like a firing.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    /// Whether the signal has fired or been dropped.
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}
