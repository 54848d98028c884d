//! Builds the dispatch chain from configuration:
//!
//! ```text
//! auth? -> rate limit -> failover strategy -> [tencent?, local?]
//! ```
//!
//! A disabled rate limit keeps its link in the chain with a [`NoopLimiter`].
//! In-memory stores get a background purge task when built inside a Tokio
//! runtime.

use sms_auth::AuthSmsService;
use sms_core::SmsService;
use sms_failover::{FailoverSmsService, TimeoutFailoverSmsService};
use sms_limiter::{Limiter, NoopLimiter, SlidingWindowConfig, SlidingWindowLimiter};
use sms_local::LocalSmsService;
use sms_ratelimit::RateLimitSmsService;
use sms_tencent::TencentSmsClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::code::MemoryCodeCache;
use crate::config::{CodeConfig, FailoverStrategy, SmsConfig, TencentConfig};

const LIMITER_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no sms provider configured")]
    NoProviders,
    #[error("invalid rate limit configuration: {0}")]
    RateLimit(#[from] sms_limiter::LimitError),
    #[error("timeout_threshold must be at least 1 for timeout failover")]
    ZeroTimeoutThreshold,
}

fn in_runtime() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

/// Code cache for [`CodeService`](crate::code::CodeService), purged every `ttl`.
pub fn build_code_cache(config: &CodeConfig) -> Arc<MemoryCodeCache> {
    let cache = Arc::new(MemoryCodeCache::from_config(config));
    if in_runtime() {
        MemoryCodeCache::spawn_purge(&cache, Duration::from_secs(config.ttl_seconds.max(1)));
    } else {
        warn!("No Tokio runtime, expired codes are only swept on set");
    }
    cache
}

/// Provider clients in the order failover should try them.
pub fn build_providers(config: &SmsConfig) -> Vec<Arc<dyn SmsService>> {
    let mut providers: Vec<Arc<dyn SmsService>> = Vec::new();
    if let Some(tencent) = &config.providers.tencent {
        providers.push(Arc::new(tencent_client(tencent)));
    }
    if config.providers.local {
        providers.push(Arc::new(LocalSmsService::new()));
    }
    providers
}

fn tencent_client(config: &TencentConfig) -> TencentSmsClient {
    let endpoint = config
        .endpoint
        .clone()
        .unwrap_or_else(|| sms_tencent::DEFAULT_ENDPOINT.to_string());
    TencentSmsClient::with_base_url(
        config.secret_id.as_str(),
        config.secret_key.as_str(),
        config.region.as_str(),
        config.app_id.as_str(),
        config.sign_name.as_str(),
        endpoint,
    )
}

pub fn build_sms_service(config: &SmsConfig) -> Result<Arc<dyn SmsService>, BuildError> {
    build_with_providers(config, build_providers(config))
}

/// Wrap already-built providers in the decorators `config` asks for.
pub fn build_with_providers(
    config: &SmsConfig,
    providers: Vec<Arc<dyn SmsService>>,
) -> Result<Arc<dyn SmsService>, BuildError> {
    if providers.is_empty() {
        return Err(BuildError::NoProviders);
    }
    if config.strategy == FailoverStrategy::TimeoutFailover && config.timeout_threshold == 0 {
        return Err(BuildError::ZeroTimeoutThreshold);
    }
    let count = providers.len();

    let mut service: Arc<dyn SmsService> = match config.strategy {
        FailoverStrategy::Failover => Arc::new(FailoverSmsService::new(providers)),
        FailoverStrategy::TimeoutFailover => Arc::new(TimeoutFailoverSmsService::new(
            providers,
            config.timeout_threshold,
        )),
    };

    let limit = &config.rate_limit;
    let limiter: Arc<dyn Limiter> = if limit.enabled {
        let sliding = Arc::new(SlidingWindowLimiter::from_config(&SlidingWindowConfig {
            window_seconds: limit.window_seconds,
            max_requests: limit.max_requests,
        })?);
        if in_runtime() {
            SlidingWindowLimiter::spawn_purge(&sliding, LIMITER_PURGE_INTERVAL);
        } else {
            warn!("No Tokio runtime, idle limiter windows will not be purged");
        }
        sliding
    } else {
        Arc::new(NoopLimiter)
    };
    service = Arc::new(RateLimitSmsService::with_key(
        service,
        limiter,
        limit.key.clone(),
    ));

    if let Some(auth) = &config.auth {
        service = Arc::new(AuthSmsService::new(service, auth.secret.as_bytes()));
    }

    info!(
        providers = count,
        strategy = ?config.strategy,
        rate_limited = limit.enabled,
        token_templates = config.auth.is_some(),
        "Sms service ready"
    );
    Ok(service)
}
