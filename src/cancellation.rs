//! Cancellation tokens for async resolution.
//!
//! Async resolution calls take a [`CancellationToken`]. It is checked before
//! any shared state is touched and is raced against waits on in-flight
//! singleton construction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::{DependencyError, DependencyResult};

/// A token that signals cancellation across async operations.
///
/// Cheap to clone; clones share state. A child token is cancelled whenever
/// its parent is, but cancelling a child leaves the parent alone.
///
/// # Examples
///
/// ```rust
/// use lifewire::CancellationToken;
///
/// let parent = CancellationToken::new();
/// let child = parent.child_token();
///
/// parent.cancel();
/// assert!(child.is_cancelled());
/// assert!(child.check().is_err());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    /// A token nobody holds a handle to cancel. Used where a caller does not
    /// care about cancellation.
    pub fn none() -> Self {
        Self::new()
    }

    fn with_parent(parent: Option<CancellationToken>) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                parent,
            }),
        }
    }

    /// Creates a token that is cancelled when either it or `self` is.
    pub fn child_token(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match &self.inner.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// Fails with [`ErrorKind::Cancelled`](crate::ErrorKind::Cancelled) once
    /// cancellation was requested.
    pub fn check(&self) -> DependencyResult<()> {
        if self.is_cancelled() {
            Err(DependencyError::cancelled())
        } else {
            Ok(())
        }
    }

    /// Completes when this token or any ancestor is cancelled.
    ///
    /// Suitable for `tokio::select!`:
    ///
    /// ```rust
    /// use lifewire::CancellationToken;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let token = CancellationToken::new();
    /// let remote = token.clone();
    /// tokio::spawn(async move { remote.cancel() });
    ///
    /// tokio::select! {
    ///     _ = token.cancelled() => {}
    ///     _ = std::future::pending::<()>() => unreachable!(),
    /// }
    /// # }
    /// ```
    pub async fn cancelled(&self) {
        let mut current = Some(self);
        let mut chain = Vec::new();
        while let Some(token) = current {
            chain.push(token);
            current = token.inner.parent.as_ref();
        }

        let waits = chain.into_iter().map(|token| Box::pin(token.own_cancelled()));
        futures::future::select_all(waits).await;
    }

    async fn own_cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not lost.
            notified.as_mut().enable();
            if self.inner.cancelled.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    #[test]
    fn child_cancel_leaves_parent_running() {
        let parent = CancellationToken::new();
        let child = parent.child_token();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn check_reports_cancelled_kind() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert_eq!(token.check().unwrap_err().kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_future_wakes_on_parent_cancel() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        let remote = parent.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.cancel();
        });

        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child should observe the parent cancellation");
    }

    #[tokio::test]
    async fn cancelled_future_returns_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancelled().await;
    }
}
