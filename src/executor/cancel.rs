//! Deadlines on top of cancellation tokens
//!
//! A [`Deadline`] is a child of a parent [`CancellationToken`]: it fires when
//! the parent is cancelled or when its own duration elapses, whichever comes
//! first. Dropping the deadline cancels its token so nothing outlives the
//! scope that created it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A cancellation scope bounded by a duration
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
    expired: Arc<AtomicBool>,
    duration: Duration,
}

impl Deadline {
    /// Creates a deadline that fires after `duration` or when `parent` is cancelled
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn after(parent: &CancellationToken, duration: Duration) -> Self {
        let token = parent.child_token();
        let expired = Arc::new(AtomicBool::new(false));

        let timer_token = token.clone();
        let timer_expired = Arc::clone(&expired);
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(duration) => {
                    timer_expired.store(true, Ordering::SeqCst);
                    timer_token.cancel();
                }
                () = timer_token.cancelled() => {}
            }
        });

        Self {
            token,
            expired,
            duration,
        }
    }

    /// The token to hand to supervised work
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns true if the duration elapsed (as opposed to external cancellation)
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    /// The configured duration
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_expires() {
        let parent = CancellationToken::new();
        let deadline = Deadline::after(&parent, Duration::from_millis(20));

        deadline.token().cancelled().await;
        assert!(deadline.expired());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancellation_is_not_expiry() {
        let parent = CancellationToken::new();
        let deadline = Deadline::after(&parent, Duration::from_secs(60));

        parent.cancel();
        deadline.token().cancelled().await;
        assert!(!deadline.expired());
    }

    #[tokio::test]
    async fn test_drop_cancels_token() {
        let parent = CancellationToken::new();
        let deadline = Deadline::after(&parent, Duration::from_secs(60));
        let token = deadline.token().clone();

        drop(deadline);
        assert!(token.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
