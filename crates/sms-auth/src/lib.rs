//! # SMS Auth
//!
//! Lets upstream callers reference a template only through an HS256 token
//! issued by this service. The token's `tpl` claim carries the real template
//! id; anything that fails to verify never reaches a provider.

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sms_core::{SendContext, SendRequest, SendResponse, SmsError, SmsService};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateClaims {
    /// Template id at the provider.
    pub tpl: String,
    /// Expiry as seconds since the epoch; tokens without one never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

pub struct AuthSmsService {
    inner: Arc<dyn SmsService>,
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl AuthSmsService {
    pub fn new(inner: Arc<dyn SmsService>, secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        Self {
            inner,
            decoding: DecodingKey::from_secret(secret),
            encoding: EncodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token that this service will accept for `claims.tpl`.
    pub fn issue(&self, claims: &TemplateClaims) -> Result<String, SmsError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| SmsError::Unexpected(format!("token encode: {}", e)))
    }

    fn template_of(&self, token: &str) -> Result<String, SmsError> {
        decode::<TemplateClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.tpl)
            .map_err(|e| {
                warn!(error = %e, "Rejected sms template token");
                SmsError::Auth(e.to_string())
            })
    }
}

#[async_trait]
impl SmsService for AuthSmsService {
    async fn send(
        &self,
        ctx: &SendContext,
        req: SendRequest<'_>,
    ) -> Result<SendResponse, SmsError> {
        let template_id = self.template_of(req.template_id)?;
        self.inner.send(ctx, req.with_template(&template_id)).await
    }
}
