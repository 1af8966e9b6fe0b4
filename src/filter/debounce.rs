//! Last-value-wins debouncing for rapidly changing inputs.
//!
//! Values pushed through a [`DebounceHandle`] are held until `delay` has
//! passed without a newer push; only then is the latest value delivered on
//! the output channel. Superseded values are dropped, never queued.

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::debug;

/// Input side of a debouncer.
#[derive(Debug)]
pub struct DebounceHandle<T> {
    input: mpsc::UnboundedSender<T>,
}

impl<T> DebounceHandle<T> {
    /// Push a new value, superseding any pending one.
    ///
    /// Returns `false` once the output side has gone away.
    pub fn push(&self, value: T) -> bool {
        self.input.send(value).is_ok()
    }
}

/// Spawn a debouncer on the current tokio runtime.
///
/// Dropping the handle flushes a pending value (after its delay) and then
/// closes the returned receiver.
pub fn debounce<T: Send + 'static>(delay: Duration) -> (DebounceHandle<T>, mpsc::Receiver<T>) {
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = mpsc::channel(1);

    tokio::spawn(run(delay, input_rx, output_tx));

    (DebounceHandle { input: input_tx }, output_rx)
}

async fn run<T>(delay: Duration, mut input: mpsc::UnboundedReceiver<T>, output: mpsc::Sender<T>) {
    while let Some(mut pending) = input.recv().await {
        let mut deadline = Instant::now() + delay;
        let mut open = true;

        while open {
            tokio::select! {
                next = input.recv() => match next {
                    Some(value) => {
                        pending = value;
                        deadline = Instant::now() + delay;
                    }
                    None => open = false,
                },
                _ = sleep_until(deadline) => break,
            }
        }

        if !open {
            sleep_until(deadline).await;
        }

        if output.send(pending).await.is_err() {
            debug!("Debounce output dropped, stopping");
            return;
        }

        if !open {
            return;
        }
    }
}
