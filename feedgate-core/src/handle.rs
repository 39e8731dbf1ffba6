use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a background loop with cooperative shutdown.
///
/// `stop()` flips the stop signal and waits for the loop to exit on its own,
/// which lets work already in flight finish. Dropping the handle sends the
/// same signal and aborts the task if it has not finished.
#[derive(Debug)]
pub struct TaskHandle {
    inner: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
}

impl TaskHandle {
    /// Wrap a spawned task and the sender half of its stop signal.
    #[must_use]
    pub fn new(inner: JoinHandle<()>, stop_tx: watch::Sender<bool>) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: Some(stop_tx),
        }
    }

    /// Request a graceful stop and wait for the task to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(inner) = self.inner.take() {
            let _ = inner.await;
        }
    }

    /// Abort the task without waiting.
    pub fn abort(mut self) {
        if let Some(inner) = self.inner.take() {
            inner.abort();
        }
    }

    /// True once the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(h) = self.inner.take()
            && !h.is_finished()
        {
            h.abort();
        }
    }
}
