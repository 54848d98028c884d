//! Login verification codes: generate, store, send and verify.
//!
//! # Code lifecycle
//! ```text
//! set     -> rejected with SendTooMany while the previous code is younger than resend_interval
//! verify  -> match: code consumed, Ok(true)
//!            miss:  one attempt used, Ok(false)
//!            no attempts left: VerifyTooMany (reported as Ok(false) by CodeService)
//! expiry  -> after ttl the code is gone and a new one may be sent
//! ```

use async_trait::async_trait;
use rand::Rng;
use sms_core::{SendContext, SendRequest, SmsError, SmsService};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CodeConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("verification code sent too frequently")]
    SendTooMany,
    #[error("verification code checked too many times")]
    VerifyTooMany,
    #[error("code store error: {0}")]
    Store(String),
    #[error(transparent)]
    Sms(#[from] SmsError),
}

/// Storage for outstanding codes.
#[async_trait]
pub trait CodeCache: Send + Sync {
    async fn set(&self, biz: &str, phone: &str, code: &str) -> Result<(), CodeError>;
    async fn verify(&self, biz: &str, phone: &str, input: &str) -> Result<bool, CodeError>;
}

pub fn cache_key(biz: &str, phone: &str) -> String {
    format!("phone_code:{}:{}", biz, phone)
}

#[derive(Debug)]
struct CodeEntry {
    code: String,
    issued_at: Instant,
    attempts_left: u32,
}

#[derive(Debug)]
struct CodeStore {
    entries: HashMap<String, CodeEntry>,
    /// `set` sweeps expired entries once this passes.
    next_sweep: Instant,
}

impl CodeStore {
    fn purge_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.issued_at) < ttl);
        before - self.entries.len()
    }
}

/// In-process [`CodeCache`].
///
/// Expired codes are dropped by [`purge_expired`](Self::purge_expired), by a
/// sweep inside `set` at most once per `ttl`, and by the optional task from
/// [`spawn_purge`](Self::spawn_purge).
#[derive(Debug, Clone)]
pub struct MemoryCodeCache {
    store: Arc<Mutex<CodeStore>>,
    ttl: Duration,
    resend_interval: Duration,
    max_attempts: u32,
}

impl MemoryCodeCache {
    pub fn new(ttl: Duration, resend_interval: Duration, max_attempts: u32) -> Self {
        Self {
            store: Arc::new(Mutex::new(CodeStore {
                entries: HashMap::new(),
                next_sweep: Instant::now() + ttl,
            })),
            ttl,
            resend_interval,
            max_attempts,
        }
    }

    pub fn from_config(config: &CodeConfig) -> Self {
        Self::new(
            Duration::from_secs(config.ttl_seconds),
            Duration::from_secs(config.resend_interval_seconds),
            config.max_attempts,
        )
    }

    /// Number of stored codes, expired ones included until swept.
    pub fn len(&self) -> Result<usize, CodeError> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, CodeError> {
        Ok(self.len()? == 0)
    }

    /// Drop every code older than `ttl`. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CodeError> {
        let now = Instant::now();
        let mut store = self.lock()?;
        store.next_sweep = now + self.ttl;
        Ok(store.purge_expired(now, self.ttl))
    }

    /// Run [`purge_expired`](Self::purge_expired) every `every` on the current
    /// runtime. The task ends once the last `Arc` to the cache is dropped.
    pub fn spawn_purge(cache: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                match cache.purge_expired() {
                    Ok(0) => {}
                    Ok(purged) => debug!(purged, "Purged expired verification codes"),
                    Err(e) => warn!(error = %e, "Code cache purge failed"),
                }
            }
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CodeStore>, CodeError> {
        self.store
            .lock()
            .map_err(|_| CodeError::Store("code cache poisoned".into()))
    }
}

#[async_trait]
impl CodeCache for MemoryCodeCache {
    async fn set(&self, biz: &str, phone: &str, code: &str) -> Result<(), CodeError> {
        let key = cache_key(biz, phone);
        let now = Instant::now();
        let mut store = self.lock()?;

        if now >= store.next_sweep {
            store.next_sweep = now + self.ttl;
            let purged = store.purge_expired(now, self.ttl);
            if purged > 0 {
                debug!(purged, "Swept expired verification codes");
            }
        }

        let entries = &mut store.entries;
        if let Some(entry) = entries.get(&key) {
            let age = now.duration_since(entry.issued_at);
            if age < self.ttl && age < self.resend_interval {
                warn!(key = %key, "Verification code requested too often");
                return Err(CodeError::SendTooMany);
            }
        }

        entries.insert(
            key,
            CodeEntry {
                code: code.to_string(),
                issued_at: now,
                attempts_left: self.max_attempts,
            },
        );
        Ok(())
    }

    async fn verify(&self, biz: &str, phone: &str, input: &str) -> Result<bool, CodeError> {
        let key = cache_key(biz, phone);
        let now = Instant::now();
        let mut store = self.lock()?;
        let entries = &mut store.entries;

        let Some(entry) = entries.get_mut(&key) else {
            return Ok(false);
        };
        if now.duration_since(entry.issued_at) >= self.ttl {
            entries.remove(&key);
            return Ok(false);
        }
        if entry.attempts_left == 0 {
            return Err(CodeError::VerifyTooMany);
        }
        if entry.code == input {
            // Consumed, but kept until the resend interval passes.
            entry.attempts_left = 0;
            debug!(key = %key, "Verification code accepted");
            return Ok(true);
        }
        entry.attempts_left -= 1;
        Ok(false)
    }
}

/// Sends login codes through the SMS chain.
pub struct CodeService {
    cache: Arc<dyn CodeCache>,
    sms: Arc<dyn SmsService>,
    template_id: String,
}

impl CodeService {
    pub fn new(
        cache: Arc<dyn CodeCache>,
        sms: Arc<dyn SmsService>,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            sms,
            template_id: template_id.into(),
        }
    }

    pub async fn send(&self, ctx: &SendContext, biz: &str, phone: &str) -> Result<(), CodeError> {
        let code = generate_code();
        self.cache.set(biz, phone, &code).await?;

        let args = [code];
        let numbers = [phone.to_string()];
        self.sms
            .send(ctx, SendRequest::new(&self.template_id, &args, &numbers))
            .await?;
        Ok(())
    }

    /// Too many wrong guesses read as a plain mismatch to the caller.
    pub async fn verify(&self, biz: &str, phone: &str, input: &str) -> Result<bool, CodeError> {
        match self.cache.verify(biz, phone, input).await {
            Err(CodeError::VerifyTooMany) => Ok(false),
            other => other,
        }
    }
}

/// Six digits, zero padded.
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}
