use async_trait::async_trait;
use sms_core::{SendContext, SendRequest, SendResponse, SmsError, SmsService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Tries every provider once, starting from a rotating offset.
pub struct FailoverSmsService {
    services: Vec<Arc<dyn SmsService>>,
    next: AtomicUsize,
}

impl FailoverSmsService {
    pub fn new(services: Vec<Arc<dyn SmsService>>) -> Self {
        Self {
            services,
            next: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[async_trait]
impl SmsService for FailoverSmsService {
    async fn send(
        &self,
        ctx: &SendContext,
        req: SendRequest<'_>,
    ) -> Result<SendResponse, SmsError> {
        let len = self.services.len();
        if len == 0 {
            error!("No sms providers registered for failover");
            return Err(SmsError::AllProvidersFailed);
        }

        let start = self.next.fetch_add(1, Ordering::Relaxed);
        for offset in 0..len {
            let index = start.wrapping_add(offset) % len;
            match self.services[index].send(ctx, req).await {
                Ok(response) => {
                    debug!(provider = response.provider, index, "Sms sent");
                    return Ok(response);
                }
                Err(e) if e.is_context_error() => return Err(e),
                Err(e) => warn!(index, error = %e, "Sms provider failed, trying next"),
            }
        }

        error!(providers = len, "Every sms provider failed");
        Err(SmsError::AllProvidersFailed)
    }
}
