use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request aborted")]
pub struct Aborted;

#[derive(Debug, Default)]
struct Inner {
    aborted: AtomicBool,
    notify: Notify,
}

/// Cancellation signal shared by the requests a view issues. Aborting it
/// resolves every guarded request with [`Aborted`] and drops its future.
#[derive(Debug, Clone, Default)]
pub struct AbortToken {
    inner: Arc<Inner>,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    pub async fn guard<F: Future>(&self, future: F) -> Result<F::Output, Aborted> {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before re-checking the flag so an abort in between is not missed.
        notified.as_mut().enable();

        if self.is_aborted() {
            return Err(Aborted);
        }

        tokio::select! {
            output = future => Ok(output),
            _ = notified => Err(Aborted),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn completes_when_not_aborted() {
        let token = AbortToken::new();
        assert_eq!(token.guard(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn already_aborted_token_rejects_immediately() {
        let token = AbortToken::new();
        token.abort();
        assert_eq!(token.guard(async { 7 }).await, Err(Aborted));
    }

    #[tokio::test]
    async fn abort_interrupts_pending_request() {
        let token = AbortToken::new();
        let request = {
            let token = token.clone();
            tokio::spawn(async move { token.guard(std::future::pending::<()>()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.abort();

        let result = tokio::time::timeout(Duration::from_secs(1), request)
            .await
            .expect("guard did not observe the abort")
            .unwrap();
        assert_eq!(result, Err(Aborted));
    }
}
