//! # SMS Rate Limit
//!
//! [`RateLimitSmsService`] consults a [`Limiter`] before every send and
//! short-circuits with [`SmsError::RateLimited`] when the quota is used up.

use async_trait::async_trait;
use sms_core::{SendContext, SendRequest, SendResponse, SmsError, SmsService};
use sms_limiter::Limiter;
use std::sync::Arc;
use tracing::warn;

/// Bucket shared by every send unless another key is given.
pub const DEFAULT_KEY: &str = "sms-limiter";

pub struct RateLimitSmsService {
    inner: Arc<dyn SmsService>,
    limiter: Arc<dyn Limiter>,
    key: String,
}

impl RateLimitSmsService {
    pub fn new(inner: Arc<dyn SmsService>, limiter: Arc<dyn Limiter>) -> Self {
        Self::with_key(inner, limiter, DEFAULT_KEY)
    }

    pub fn with_key(
        inner: Arc<dyn SmsService>,
        limiter: Arc<dyn Limiter>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            limiter,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl SmsService for RateLimitSmsService {
    async fn send(
        &self,
        ctx: &SendContext,
        req: SendRequest<'_>,
    ) -> Result<SendResponse, SmsError> {
        let limited = self
            .limiter
            .limit(&self.key)
            .await
            .map_err(|e| SmsError::Limiter(e.to_string()))?;
        if limited {
            warn!(key = %self.key, "Sms send rejected by rate limiter");
            return Err(SmsError::RateLimited);
        }
        self.inner.send(ctx, req).await
    }
}
