//! # webook-sms
//!
//! SMS dispatch for login verification codes, built as a chain of
//! decorators over one [`SmsService`](sms_core::SmsService) capability.
//!
//! ## Features
//!
//! - **Failover**: rotate across providers, or stick to one until it keeps timing out
//! - **Rate limiting**: sliding-window quota in front of every provider
//! - **Signed templates**: optional HS256 template tokens for upstream callers
//! - **Providers**: Tencent Cloud SMS and a log-only local backend
//! - **Verification codes**: generate, throttle, send and verify login codes
//! - **Configuration**: layered files plus `WEBOOK__*` environment variables
//! - **Observability**: structured `tracing` events throughout
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use webook_sms::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     telemetry::init(&config.logging);
//!
//!     let sms = build_sms_service(&config.sms)?;
//!     let codes = CodeService::new(
//!         build_code_cache(&config.code),
//!         sms,
//!         config.code.template_id.clone(),
//!     );
//!     codes.send(&SendContext::background(), "login", "+8613800000000").await?;
//!     Ok(())
//! }
//! ```

pub mod code;
pub mod config;
pub mod telemetry;
pub mod wiring;

pub use config::*;
pub use wiring::{
    build_code_cache, build_providers, build_sms_service, build_with_providers, BuildError,
};

/// Common imports for webook-sms usage
pub mod prelude {
    pub use crate::code::{CodeCache, CodeError, CodeService, MemoryCodeCache};
    pub use crate::config::{
        AppConfig, CodeConfig, FailoverStrategy, LoggingConfig, ProvidersConfig, SmsConfig,
    };
    pub use crate::telemetry;
    pub use crate::wiring::{build_code_cache, build_sms_service, BuildError};
    pub use sms_core::*;
}
