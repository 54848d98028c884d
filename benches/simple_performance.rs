use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sms_core::testing::ScriptedService;
use sms_core::*;
use sms_failover::{FailoverSmsService, TimeoutFailoverSmsService};
use sms_limiter::{Limiter, SlidingWindowLimiter};
use sms_ratelimit::RateLimitSmsService;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use webook_sms::config::{AppConfig, FailoverStrategy, SmsConfig};
use webook_sms::wiring::build_with_providers;

fn providers(count: usize) -> Vec<Arc<dyn SmsService>> {
    (0..count)
        .map(|_| ScriptedService::ok("bench") as Arc<dyn SmsService>)
        .collect()
}

fn benchmark_failover(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let args = vec!["123456".to_string()];
    let numbers = vec!["13800000000".to_string()];
    let ctx = SendContext::background();

    let mut group = c.benchmark_group("failover");
    for count in [1, 3, 10] {
        let round_robin = FailoverSmsService::new(providers(count));
        group.bench_with_input(BenchmarkId::new("round_robin", count), &count, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(
                    round_robin
                        .send(&ctx, SendRequest::new("tpl", &args, &numbers))
                        .await,
                )
            })
        });

        let sticky = TimeoutFailoverSmsService::new(providers(count), 3);
        group.bench_with_input(BenchmarkId::new("timeout", count), &count, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(
                    sticky
                        .send(&ctx, SendRequest::new("tpl", &args, &numbers))
                        .await,
                )
            })
        });
    }
    group.finish();
}

fn benchmark_rate_limiting(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let limiter = SlidingWindowLimiter::new(Duration::from_secs(1), u32::MAX);

    let mut group = c.benchmark_group("rate_limiting");

    group.bench_function("single_key_check", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(limiter.limit("sms-limiter").await) })
    });

    group.bench_function("multiple_keys_check", |b| {
        b.to_async(&rt).iter(|| async {
            for i in 0..10 {
                black_box(limiter.limit(&format!("sms-limiter-{}", i)).await);
            }
        })
    });

    let limited = RateLimitSmsService::new(
        Arc::new(FailoverSmsService::new(providers(2))),
        Arc::new(SlidingWindowLimiter::new(Duration::from_secs(1), u32::MAX)),
    );
    let args = vec!["123456".to_string()];
    let numbers = vec!["13800000000".to_string()];
    let ctx = SendContext::background();
    group.bench_function("decorated_send", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                limited
                    .send(&ctx, SendRequest::new("tpl", &args, &numbers))
                    .await,
            )
        })
    });

    group.finish();
}

fn benchmark_wiring(c: &mut Criterion) {
    let mut group = c.benchmark_group("wiring");

    group.bench_function("config_default", |b| {
        b.iter(|| black_box(AppConfig::default()))
    });

    group.bench_function("build_chain", |b| {
        let config = SmsConfig {
            strategy: FailoverStrategy::TimeoutFailover,
            ..SmsConfig::default()
        };
        b.iter(|| black_box(build_with_providers(&config, providers(3))))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_failover,
    benchmark_rate_limiting,
    benchmark_wiring
);

criterion_main!(benches);
