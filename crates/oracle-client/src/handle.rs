use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Owner of one running plan stream.
///
/// Dropping the handle does not stop the stream; call [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct StreamHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub(crate) fn new(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { token, task }
    }

    /// Stop the stream and close its connection. Safe to call repeatedly.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("cancelling plan stream");
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the background task to exit.
    pub async fn join(self) {
        if let Err(error) = self.task.await {
            debug!(%error, "plan stream task ended abnormally");
        }
    }
}
