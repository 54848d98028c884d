//! TC3-HMAC-SHA256 request signing for Tencent Cloud API 3.0.
//!
//! ```text
//! secret_date    = HMAC("TC3" + secret_key, date)
//! secret_service = HMAC(secret_date, service)
//! secret_signing = HMAC(secret_service, "tc3_request")
//! signature      = hex(HMAC(secret_signing, string_to_sign))
//! ```

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host;x-tc-action";

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// UTC date of `timestamp` as `YYYY-MM-DD`.
pub fn utc_date(timestamp: i64) -> String {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .date()
        .to_string()
}

/// Everything needed to sign one POST request.
#[derive(Debug, Clone)]
pub struct Signer<'a> {
    pub secret_id: &'a str,
    pub secret_key: &'a str,
    pub service: &'a str,
    pub host: &'a str,
    pub action: &'a str,
}

impl Signer<'_> {
    fn canonical_request(&self, payload: &[u8]) -> String {
        format!(
            "POST\n/\n\ncontent-type:{}\nhost:{}\nx-tc-action:{}\n\n{}\n{}",
            CONTENT_TYPE,
            self.host,
            self.action.to_lowercase(),
            SIGNED_HEADERS,
            sha256_hex(payload)
        )
    }

    fn credential_scope(&self, date: &str) -> String {
        format!("{}/{}/tc3_request", date, self.service)
    }

    pub fn string_to_sign(&self, payload: &[u8], timestamp: i64) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            timestamp,
            self.credential_scope(&utc_date(timestamp)),
            sha256_hex(self.canonical_request(payload).as_bytes())
        )
    }

    pub fn signature(&self, payload: &[u8], timestamp: i64) -> String {
        let date = utc_date(timestamp);
        let secret_date = hmac_sha256(format!("TC3{}", self.secret_key).as_bytes(), date.as_bytes());
        let secret_service = hmac_sha256(&secret_date, self.service.as_bytes());
        let secret_signing = hmac_sha256(&secret_service, b"tc3_request");
        hex::encode(hmac_sha256(
            &secret_signing,
            self.string_to_sign(payload, timestamp).as_bytes(),
        ))
    }

    /// Value of the `Authorization` header.
    pub fn authorization(&self, payload: &[u8], timestamp: i64) -> String {
        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            self.secret_id,
            self.credential_scope(&utc_date(timestamp)),
            SIGNED_HEADERS,
            self.signature(payload, timestamp)
        )
    }
}
