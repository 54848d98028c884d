use async_trait::async_trait;
use sms_core::{SendContext, SendRequest, SendResponse, SmsError, SmsService};
use tracing::info;

const PROVIDER: &str = "local";

/// Writes the message to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSmsService;

impl LocalSmsService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SmsService for LocalSmsService {
    async fn send(
        &self,
        ctx: &SendContext,
        req: SendRequest<'_>,
    ) -> Result<SendResponse, SmsError> {
        ctx.check()?;
        if req.numbers.is_empty() {
            return Err(SmsError::Invalid("no recipients".into()));
        }
        info!(
            template = req.template_id,
            args = ?req.args,
            numbers = ?req.numbers,
            "Local sms"
        );
        Ok(SendResponse::new(
            PROVIDER,
            serde_json::to_value(req).unwrap_or_default(),
        ))
    }
}
