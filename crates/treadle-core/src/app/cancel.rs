//! Run cancellation over a `watch` channel.
//!
//! - `CancelHandle::cancel()` flips the flag; every token sees it
//! - the executor checks the token before launching each task
//! - in-flight bodies are not interrupted, they finish or time out

use tokio::sync::watch;

/// Caller side. Dropping it does not cancel the run.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Executor side.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    /// Create a handle and the token to pass to `Executor::run_with_cancel`.
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelToken { rx })
    }

    pub fn cancel(&self) {
        // send_replace never fails, even when every token is gone
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_, token) = CancelHandle::new();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}
