//! Cancellation and deadlines for storage operations.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::traits::{StorageError, StorageResult};

/// Carried by every storage call. Cancelling the token, or passing the
/// deadline, aborts the in-flight backend request; the dropped request
/// future returns its pooled connection.
#[derive(Clone, Debug, Default)]
pub struct OperationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Cancelled together with `self`; the deadline is the earlier of
    /// `self`'s and `timeout` from now.
    pub fn with_deadline_in(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Drive `fut` until it completes, the context is cancelled, or the
    /// deadline passes, whichever happens first.
    pub async fn run<F, T>(&self, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        if self.token.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(StorageError::Cancelled),
            _ = expired => Err(StorageError::Timeout),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_future_output() {
        let ctx = OperationContext::new();
        let value = ctx.run(async { Ok::<_, StorageError>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let ctx = OperationContext::new();
        ctx.cancel();
        let result = ctx.run(async { Ok::<_, StorageError>(()) }).await;
        assert!(matches!(result, Err(StorageError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_aborts_pending_operation() {
        let ctx = OperationContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, StorageError>(())
            })
            .await;
        assert!(matches!(result, Err(StorageError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_yields_timeout() {
        let ctx = OperationContext::with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StorageError>(())
            })
            .await;
        assert!(matches!(result, Err(StorageError::Timeout)));
    }

    #[tokio::test]
    async fn test_with_deadline_in_follows_parent_cancellation() {
        let parent = OperationContext::new();
        let bounded = parent.with_deadline_in(Duration::from_secs(5));
        assert!(bounded.deadline().is_some());
        parent.cancel();
        assert!(bounded.is_cancelled());

        let other = OperationContext::new();
        let other_bounded = other.with_deadline_in(Duration::from_secs(5));
        other_bounded.cancel();
        assert!(!other.is_cancelled());
    }

    #[tokio::test]
    async fn test_with_deadline_in_keeps_earlier_deadline() {
        let ctx = OperationContext::with_timeout(Duration::from_secs(1));
        let tighter = ctx.with_deadline_in(Duration::from_secs(60));
        assert_eq!(tighter.deadline(), ctx.deadline());
    }
}
