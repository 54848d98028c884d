//! # Tencent Cloud SMS Provider
//!
//! Sends templated messages through the Tencent Cloud `SendSms` API
//! (version `2021-01-11`), signing every request with TC3-HMAC-SHA256.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{SendContext, SendRequest, SmsService};
//! use sms_tencent::TencentSmsClient;
//!
//! let client = TencentSmsClient::new("secret_id", "secret_key", "ap-beijing", "1400842696", "Lip");
//! let args = vec!["123456".to_string()];
//! let numbers = vec!["+8613800000000".to_string()];
//! client
//!     .send(&SendContext::background(), SendRequest::new("1877556", &args, &numbers))
//!     .await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{SendContext, SendRequest, SendResponse, SmsError, SmsService};
use std::fmt;

pub mod sign;

const PROVIDER: &str = "tencent";
const SERVICE: &str = "sms";
const ACTION: &str = "SendSms";
const VERSION: &str = "2021-01-11";

pub const DEFAULT_ENDPOINT: &str = "https://sms.tencentcloudapi.com";

/// Tencent Cloud SMS client.
#[derive(Clone)]
pub struct TencentSmsClient {
    /// API SecretId.
    pub secret_id: String,
    secret_key: String,
    /// Region, e.g. "ap-beijing".
    pub region: String,
    /// SmsSdkAppId of the SMS application.
    pub app_id: String,
    /// Approved signature name printed in front of every message.
    pub sign_name: String,
    /// API base URL; override for testing/mocking.
    pub base_url: String,
    #[cfg(feature = "reqwest")]
    http: reqwest::Client,
}

impl fmt::Debug for TencentSmsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TencentSmsClient")
            .field("secret_id", &self.secret_id)
            .field("region", &self.region)
            .field("app_id", &self.app_id)
            .field("sign_name", &self.sign_name)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TencentSmsClient {
    pub fn new<S: Into<String>>(
        secret_id: S,
        secret_key: S,
        region: S,
        app_id: S,
        sign_name: S,
    ) -> Self {
        Self::with_base_url(
            secret_id,
            secret_key,
            region,
            app_id,
            sign_name,
            DEFAULT_ENDPOINT.to_string(),
        )
    }

    pub fn with_base_url<S: Into<String>>(
        secret_id: S,
        secret_key: S,
        region: S,
        app_id: S,
        sign_name: S,
        base_url: String,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            region: region.into(),
            app_id: app_id.into(),
            sign_name: sign_name.into(),
            base_url,
            #[cfg(feature = "reqwest")]
            http: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured HTTP client, e.g. one with its own request timeout.
    #[cfg(feature = "reqwest")]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn host(&self) -> Result<String, SmsError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| SmsError::Invalid(format!("endpoint {}: {}", self.base_url, e)))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| SmsError::Invalid(format!("endpoint {} has no host", self.base_url)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TencentSendRequest<'a> {
    phone_number_set: &'a [String],
    sms_sdk_app_id: &'a str,
    sign_name: &'a str,
    template_id: &'a str,
    template_param_set: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TencentEnvelope {
    #[serde(rename = "Response")]
    response: TencentResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TencentResponse {
    #[serde(default)]
    send_status_set: Vec<SendStatus>,
    error: Option<ApiError>,
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendStatus {
    serial_no: Option<String>,
    phone_number: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

impl TencentResponse {
    fn into_result(self, raw: serde_json::Value) -> Result<SendResponse, SmsError> {
        if let Some(err) = self.error {
            let detail = format!("{}: {}", err.code, err.message);
            return Err(if err.code.starts_with("AuthFailure") {
                SmsError::Auth(detail)
            } else {
                SmsError::Provider(detail)
            });
        }

        for status in &self.send_status_set {
            if status.code.as_deref() != Some("Ok") {
                return Err(SmsError::Provider(format!(
                    "sms send failed to {} code:{} message:{}",
                    status.phone_number.as_deref().unwrap_or("?"),
                    status.code.as_deref().unwrap_or("<none>"),
                    status.message.as_deref().unwrap_or("")
                )));
            }
        }

        let id = self
            .request_id
            .or_else(|| {
                self.send_status_set
                    .first()
                    .and_then(|s| s.serial_no.clone())
            })
            .unwrap_or_else(sms_core::fallback_id);

        Ok(SendResponse {
            id,
            provider: PROVIDER,
            raw,
        })
    }
}

#[cfg(feature = "reqwest")]
fn map_transport(e: reqwest::Error) -> SmsError {
    if e.is_timeout() {
        SmsError::DeadlineExceeded
    } else {
        SmsError::Http(e.to_string())
    }
}

#[async_trait]
impl SmsService for TencentSmsClient {
    async fn send(
        &self,
        ctx: &SendContext,
        req: SendRequest<'_>,
    ) -> Result<SendResponse, SmsError> {
        #[cfg(not(feature = "reqwest"))]
        {
            let _ = (ctx, req);
            return Err(SmsError::Unexpected("reqwest feature disabled".into()));
        }
        #[cfg(feature = "reqwest")]
        {
            if req.numbers.is_empty() {
                return Err(SmsError::Invalid("no recipients".into()));
            }
            let body = TencentSendRequest {
                phone_number_set: req.numbers,
                sms_sdk_app_id: &self.app_id,
                sign_name: &self.sign_name,
                template_id: req.template_id,
                template_param_set: req.args,
            };
            let payload =
                serde_json::to_vec(&body).map_err(|e| SmsError::Invalid(e.to_string()))?;

            let host = self.host()?;
            let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
            let authorization = sign::Signer {
                secret_id: &self.secret_id,
                secret_key: &self.secret_key,
                service: SERVICE,
                host: &host,
                action: ACTION,
            }
            .authorization(&payload, timestamp);

            let exchange = async {
                let res = self
                    .http
                    .post(&self.base_url)
                    .header("Authorization", authorization)
                    .header("Content-Type", sign::CONTENT_TYPE)
                    .header("X-TC-Action", ACTION)
                    .header("X-TC-Timestamp", timestamp.to_string())
                    .header("X-TC-Version", VERSION)
                    .header("X-TC-Region", self.region.as_str())
                    .body(payload)
                    .send()
                    .await
                    .map_err(map_transport)?;

                if !res.status().is_success() {
                    let status = res.status();
                    let body = res.text().await.unwrap_or_default();
                    return Err(SmsError::Provider(format!("HTTP {}: {}", status, body)));
                }

                let raw_text = res.text().await.map_err(map_transport)?;
                let raw_json: serde_json::Value = serde_json::from_str(&raw_text)
                    .unwrap_or_else(|_| serde_json::json!({ "raw": raw_text }));
                tracing::debug!(
                    template = req.template_id,
                    numbers = ?req.numbers,
                    response = %raw_json,
                    "Called Tencent SendSms"
                );

                let envelope: TencentEnvelope = serde_json::from_value(raw_json.clone())
                    .map_err(|e| SmsError::Provider(format!("unexpected response: {}", e)))?;
                envelope.response.into_result(raw_json)
            };

            ctx.run(exchange).await
        }
    }
}
