//! # SMS Limiter
//!
//! The [`Limiter`] boundary answers one question: is this key currently over
//! quota? `true` means reject.
//!
//! [`SlidingWindowLimiter`] keeps the request instants of every key inside a
//! moving window, in process memory. [`NoopLimiter`] never limits and stands
//! in when limiting is switched off.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    #[error("limiter backend unavailable: {0}")]
    Backend(String),
    #[error("invalid limiter configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait Limiter: Send + Sync {
    /// Returns `Ok(true)` when the request identified by `key` must be rejected.
    async fn limit(&self, key: &str) -> Result<bool, LimitError>;
}

#[async_trait]
impl<T: Limiter + ?Sized> Limiter for Arc<T> {
    async fn limit(&self, key: &str) -> Result<bool, LimitError> {
        (**self).limit(key).await
    }
}

/// Configuration for a sliding window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidingWindowConfig {
    /// Window length in seconds
    pub window_seconds: u64,
    /// Maximum number of requests accepted inside one window
    pub max_requests: u32,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self {
            window_seconds: 1,
            max_requests: 3000,
        }
    }
}

/// In-memory sliding window limiter keyed by string.
#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: u32,
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &SlidingWindowConfig) -> Result<Self, LimitError> {
        if config.window_seconds == 0 {
            return Err(LimitError::Config("window_seconds must be positive".into()));
        }
        Ok(Self::new(
            Duration::from_secs(config.window_seconds),
            config.max_requests,
        ))
    }

    /// Number of requests recorded for `key` inside the current window.
    pub fn in_window(&self, key: &str) -> Result<usize, LimitError> {
        let now = Instant::now();
        let windows = self.lock()?;
        Ok(windows
            .get(key)
            .map(|hits| hits.iter().filter(|t| now.duration_since(**t) < self.window).count())
            .unwrap_or(0))
    }

    /// Number of keys currently holding a window.
    pub fn tracked_keys(&self) -> Result<usize, LimitError> {
        Ok(self.lock()?.len())
    }

    /// Drop keys whose window holds no live requests.
    pub fn purge_idle(&self) -> Result<usize, LimitError> {
        let now = Instant::now();
        let mut windows = self.lock()?;
        let before = windows.len();
        windows.retain(|key, hits| {
            Self::trim(hits, now, self.window);
            let keep = !hits.is_empty();
            if !keep {
                debug!("Cleaned up idle limiter window for key: {}", key);
            }
            keep
        });
        Ok(before - windows.len())
    }

    /// Run [`purge_idle`](Self::purge_idle) every `every` on the current
    /// runtime. The task ends once the last `Arc` to the limiter is dropped.
    pub fn spawn_purge(limiter: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(limiter);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = weak.upgrade() else {
                    break;
                };
                match limiter.purge_idle() {
                    Ok(0) => {}
                    Ok(purged) => debug!(purged, "Purged idle limiter windows"),
                    Err(e) => warn!(error = %e, "Limiter purge failed"),
                }
            }
        })
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, VecDeque<Instant>>>, LimitError> {
        self.windows
            .lock()
            .map_err(|_| LimitError::Backend("limiter state poisoned".into()))
    }

    fn trim(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = hits.front() {
            if now.duration_since(*oldest) >= window {
                hits.pop_front();
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl Limiter for SlidingWindowLimiter {
    async fn limit(&self, key: &str) -> Result<bool, LimitError> {
        let now = Instant::now();
        let mut windows = self.lock()?;
        let hits = windows.entry(key.to_string()).or_default();
        Self::trim(hits, now, self.window);

        if hits.len() >= self.max_requests as usize {
            warn!(key, in_window = hits.len(), "Rate limit exceeded");
            return Ok(true);
        }

        hits.push_back(now);
        debug!(key, in_window = hits.len(), "Rate limit check passed");
        Ok(false)
    }
}

/// Limiter that never rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLimiter;

#[async_trait]
impl Limiter for NoopLimiter {
    async fn limit(&self, _key: &str) -> Result<bool, LimitError> {
        Ok(false)
    }
}
