//! Send a login verification code through the configured SMS chain.
//!
//! With no `config/` directory this uses the local provider, which only logs.
use std::time::Duration;
use webook_sms::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    telemetry::init(&config.logging);

    let phone = arg_or_env("--phone", "SMS_TO");
    let biz = std::env::args()
        .skip_while(|a| a != "--biz")
        .nth(1)
        .unwrap_or_else(|| "login".to_string());

    let sms = build_sms_service(&config.sms)?;
    let codes = CodeService::new(
        build_code_cache(&config.code),
        sms,
        config.code.template_id.clone(),
    );

    let ctx = SendContext::background().with_timeout(Duration::from_secs(5));
    codes.send(&ctx, &biz, &phone).await?;
    println!("Sent {} code to {}", biz, phone);
    Ok(())
}

fn arg_or_env(flag: &str, env_key: &str) -> String {
    let args: Vec<String> = std::env::args().collect();
    if let Some(idx) = args.iter().position(|a| a == flag) {
        if idx + 1 < args.len() {
            return args[idx + 1].clone();
        }
    }
    std::env::var(env_key)
        .unwrap_or_else(|_| panic!("missing {} (arg {} or env {})", flag, flag, env_key))
}
