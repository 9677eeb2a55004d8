//! Cooperative cancellation.
//!
//! A [`CancelHandle`] flips a watch channel; every [`CancelToken`] cloned
//! from it observes the change. Long running calls race their work against
//! [`CancelToken::cancelled`].

use tokio::sync::watch;

/// The sending side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// The observing side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    /// Creates a handle that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Returns a token observing this handle.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Signals cancellation to every token.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when cancellation is requested.
    ///
    /// Never completes if the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let handle = CancelHandle::new();
        let token = handle.token();
        assert!(!token.is_cancelled());

        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let token = CancelToken::never();
        let fired = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(fired.is_err());
    }
}
