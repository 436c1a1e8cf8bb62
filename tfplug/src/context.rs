//! Request-scoped cancellation and deadlines
//!
//! Every trait method takes a [`Context`] first. Status polling races its
//! work against [`Context::cancelled`], so a run stopped through
//! `ProviderHost::stop` ends its waits promptly. Lock waits are not
//! cancellable.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done_tx,
            }),
        }
    }

    /// Derives a context that is cancelled once `timeout` elapses. An
    /// existing, earlier deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let requested = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(existing) if existing < requested => existing,
            _ => requested,
        };

        let (done_tx, _) = watch::channel(self.is_cancelled());
        let child = Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                done_tx,
            }),
        };

        let parent = self.clone();
        let weak = Arc::downgrade(&child.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = parent.cancelled() => {}
            }
            if let Some(inner) = weak.upgrade() {
                inner.done_tx.send_replace(true);
            }
        });

        child
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done_tx.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, if there is one
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Resolves once this context is cancelled or its deadline passes
    pub async fn cancelled(&self) {
        let mut done = self.inner.done_tx.subscribe();
        // wait_for only errors when the sender is dropped, and we hold it
        let _ = done.wait_for(|cancelled| *cancelled).await;
    }

    pub fn cancel(&self) {
        self.inner.done_tx.send_replace(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_context() {
        let ctx = Context::new().with_timeout(Duration::from_secs(5));
        assert!(!ctx.is_cancelled());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn manual_cancel_wakes_waiters() {
        let ctx = Context::new();
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };

        assert!(!ctx.is_cancelled());
        ctx.cancel();

        waiter.await.unwrap();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancel_propagates_to_child() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(600));

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .unwrap();
        assert!(child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn child_keeps_earlier_deadline() {
        let parent = Context::new().with_timeout(Duration::from_secs(10));
        let child = parent.with_timeout(Duration::from_secs(60));

        assert_eq!(child.deadline(), parent.deadline());
        assert!(child.remaining().unwrap() <= Duration::from_secs(10));
        assert!(Context::new().remaining().is_none());
    }
}
