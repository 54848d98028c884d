use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// SMS dispatch chain configuration
    pub sms: SmsConfig,
    /// Verification code configuration
    pub code: CodeConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// How the configured providers are combined
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailoverStrategy {
    /// Rotate the first provider on every send and try all of them
    #[default]
    Failover,
    /// Stay on one provider until it times out `timeout_threshold` times in a row
    TimeoutFailover,
}

/// SMS dispatch chain configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmsConfig {
    /// Failover strategy (default: failover)
    pub strategy: FailoverStrategy,
    /// Consecutive timeouts before switching provider (default: 3)
    pub timeout_threshold: u32,
    /// Rate limiting in front of the providers
    pub rate_limit: RateLimitConfig,
    /// Signed template tokens; disabled when absent
    pub auth: Option<AuthConfig>,
    /// SMS providers configuration
    pub providers: ProvidersConfig,
}

/// Rate limiting configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: true)
    pub enabled: bool,
    /// Limiter bucket key (default: sms-limiter)
    pub key: String,
    /// Maximum sends per window (default: 3000)
    pub max_requests: u32,
    /// Window length in seconds (default: 1)
    pub window_seconds: u64,
}

/// Template token configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the services issuing template tokens
    pub secret: String,
}

/// SMS providers configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    /// Tencent Cloud configuration
    pub tencent: Option<TencentConfig>,
    /// Log messages instead of sending them (default: true)
    pub local: bool,
}

/// Tencent Cloud provider configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TencentConfig {
    /// API SecretId
    pub secret_id: String,
    /// API SecretKey
    pub secret_key: String,
    /// Region (default: ap-beijing)
    #[serde(default = "default_tencent_region")]
    pub region: String,
    /// SmsSdkAppId
    pub app_id: String,
    /// Approved signature name
    pub sign_name: String,
    /// API endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Verification code configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CodeConfig {
    /// Template used for login codes (default: 1877556)
    pub template_id: String,
    /// Code lifetime in seconds (default: 600)
    pub ttl_seconds: u64,
    /// Minimum seconds between two codes for the same phone (default: 60)
    pub resend_interval_seconds: u64,
    /// Wrong guesses allowed per code (default: 3)
    pub max_attempts: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: json or pretty (default: json)
    pub format: String,
}

fn default_tencent_region() -> String {
    "ap-beijing".to_string()
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            strategy: FailoverStrategy::default(),
            timeout_threshold: 3,
            rate_limit: RateLimitConfig::default(),
            auth: None,
            providers: ProvidersConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: sms_ratelimit::DEFAULT_KEY.to_string(),
            max_requests: 3000,
            window_seconds: 1,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            tencent: None,
            local: true,
        }
    }
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            template_id: "1877556".to_string(),
            ttl_seconds: 600,
            resend_interval_seconds: 60,
            max_attempts: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(Self::environment())
    }

    /// `WEBOOK__SMS__STRATEGY=timeout_failover` sets `sms.strategy`.
    pub fn environment() -> Environment {
        Environment::with_prefix("WEBOOK").separator("__")
    }

    /// Same layering as [`load`](Self::load) with a caller-supplied
    /// environment source on top.
    pub fn load_with(environment: Environment) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment)
            .build()?;

        s.try_deserialize()
    }
}
