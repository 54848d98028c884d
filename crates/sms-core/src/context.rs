use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::SmsError;

/// Caller-owned deadline and cancellation signal for a single send.
///
/// Nothing in the dispatch chain sets a timeout of its own; decorators pass
/// the context through untouched and providers apply it around their network
/// call with [`SendContext::run`].
#[derive(Debug, Clone)]
pub struct SendContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Default for SendContext {
    fn default() -> Self {
        Self::background()
    }
}

impl SendContext {
    /// A context that never expires and is never cancelled.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Keeps the earlier of the existing and the new deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails fast when the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), SmsError> {
        if self.cancel.is_cancelled() {
            return Err(SmsError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SmsError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes, the token fires or the deadline passes.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, SmsError>
    where
        F: Future<Output = Result<T, SmsError>>,
    {
        self.check()?;

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SmsError::Cancelled),
            _ = expired => Err(SmsError::DeadlineExceeded),
            res = fut => res,
        }
    }
}
