//! # SMS Core
//!
//! Core traits and types shared by every link of the SMS dispatch chain.
//!
//! This crate provides the fundamental building blocks:
//! - [`SmsService`] trait implemented by providers and decorators alike
//! - [`SendContext`] carrying the caller's deadline and cancellation signal
//! - Common types for requests, responses, and errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{SendContext, SendRequest, SmsService};
//!
//! let args = vec!["123456".to_string()];
//! let numbers = vec!["+8613800000000".to_string()];
//! let response = service
//!     .send(&SendContext::background(), SendRequest::new("1877556", &args, &numbers))
//!     .await?;
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

mod context;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use context::SendContext;

/// Errors that can occur during SMS operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmsError {
    /// The caller cancelled the send
    #[error("send cancelled")]
    Cancelled,
    /// The caller's deadline passed before the send completed
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// HTTP communication error
    #[error("http error: {0}")]
    Http(String),
    /// Authentication/authorization error
    #[error("authentication error: {0}")]
    Auth(String),
    /// Invalid request parameters
    #[error("invalid request: {0}")]
    Invalid(String),
    /// SMS provider returned an error
    #[error("provider error: {0}")]
    Provider(String),
    /// The send was rejected by the rate limiter
    #[error("sms rate limit triggered")]
    RateLimited,
    /// The rate limiter itself failed
    #[error("rate limiter error: {0}")]
    Limiter(String),
    /// Every provider was tried and none succeeded
    #[error("all sms providers failed")]
    AllProvidersFailed,
    /// Unexpected error occurred
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl SmsError {
    /// True for errors raised by the caller's context rather than a provider.
    ///
    /// Failover never masks these by moving on to another provider.
    pub fn is_context_error(&self) -> bool {
        matches!(self, SmsError::Cancelled | SmsError::DeadlineExceeded)
    }
}

/// A templated message addressed to one or more phone numbers.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SendRequest<'a> {
    pub template_id: &'a str,
    pub args: &'a [String],
    pub numbers: &'a [String],
}

impl<'a> SendRequest<'a> {
    pub fn new(template_id: &'a str, args: &'a [String], numbers: &'a [String]) -> Self {
        Self {
            template_id,
            args,
            numbers,
        }
    }

    /// Same message with a different template id.
    pub fn with_template<'b>(&self, template_id: &'b str) -> SendRequest<'b>
    where
        'a: 'b,
    {
        SendRequest {
            template_id,
            args: self.args,
            numbers: self.numbers,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendResponse {
    pub id: String,
    /// Name of the backend/provider that delivered the message, e.g. "tencent".
    pub provider: &'static str,
    /// Raw provider payload for debugging / audit.
    pub raw: serde_json::Value,
}

impl SendResponse {
    pub fn new(provider: &'static str, raw: serde_json::Value) -> Self {
        Self {
            id: fallback_id(),
            provider,
            raw,
        }
    }
}

/// Anything that can deliver a templated SMS: a provider client or a decorator
/// wrapping other services.
#[async_trait]
pub trait SmsService: Send + Sync {
    /// Send `req`, honouring the caller's deadline and cancellation in `ctx`.
    async fn send(&self, ctx: &SendContext, req: SendRequest<'_>)
        -> Result<SendResponse, SmsError>;
}

#[async_trait]
impl<T: SmsService + ?Sized> SmsService for Arc<T> {
    async fn send(
        &self,
        ctx: &SendContext,
        req: SendRequest<'_>,
    ) -> Result<SendResponse, SmsError> {
        (**self).send(ctx, req).await
    }
}

#[async_trait]
impl<T: SmsService + ?Sized> SmsService for Box<T> {
    async fn send(
        &self,
        ctx: &SendContext,
        req: SendRequest<'_>,
    ) -> Result<SendResponse, SmsError> {
        (**self).send(ctx, req).await
    }
}

/// Utility to create a pseudo id if a provider doesn't return one.
pub fn fallback_id() -> String {
    Uuid::new_v4().to_string()
}
