use async_trait::async_trait;
use sms_core::{SendContext, SendRequest, SendResponse, SmsError, SmsService};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Sends through a single active provider and switches to the next one once
/// `threshold` consecutive sends have hit their deadline.
///
/// # State transitions
/// ```text
/// Ok                -> count = 0
/// DeadlineExceeded  -> count += 1
/// other error       -> count unchanged
/// count >= threshold on entry -> CAS index to (index + 1) % len; the winner resets count
/// ```
pub struct TimeoutFailoverSmsService {
    services: Vec<Arc<dyn SmsService>>,
    /// Index of the active provider.
    index: AtomicUsize,
    /// Consecutive timeouts seen on the active provider.
    timeouts: AtomicU32,
    threshold: u32,
}

impl TimeoutFailoverSmsService {
    pub fn new(services: Vec<Arc<dyn SmsService>>, threshold: u32) -> Self {
        Self {
            services,
            index: AtomicUsize::new(0),
            timeouts: AtomicU32::new(0),
            threshold,
        }
    }

    pub fn active_index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    pub fn consecutive_timeouts(&self) -> u32 {
        self.timeouts.load(Ordering::SeqCst)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[async_trait]
impl SmsService for TimeoutFailoverSmsService {
    async fn send(
        &self,
        ctx: &SendContext,
        req: SendRequest<'_>,
    ) -> Result<SendResponse, SmsError> {
        let len = self.services.len();
        if len == 0 {
            return Err(SmsError::Invalid("no sms providers configured".into()));
        }

        let mut index = self.index.load(Ordering::SeqCst);
        let timeouts = self.timeouts.load(Ordering::SeqCst);
        if timeouts >= self.threshold {
            let next = (index + 1) % len;
            // Racers that lose the swap still use `next` and do not swap again.
            if self
                .index
                .compare_exchange(index, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.timeouts.store(0, Ordering::SeqCst);
                info!(from = index, to = next, timeouts, "Switched active sms provider");
            }
            index = next;
        }

        let result = self.services[index].send(ctx, req).await;
        match &result {
            Ok(_) => self.timeouts.store(0, Ordering::SeqCst),
            Err(SmsError::DeadlineExceeded) => {
                let seen = self.timeouts.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(index, timeouts = seen, "Sms provider timed out");
            }
            // TODO: decide whether connection-level errors should count towards a switch.
            Err(_) => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sms_core::testing::ScriptedService;
    use async_trait::async_trait;
    use tokio::sync::Barrier;

    fn as_services(list: &[Arc<ScriptedService>]) -> Vec<Arc<dyn SmsService>> {
        list.iter()
            .map(|p| p.clone() as Arc<dyn SmsService>)
            .collect()
    }

    async fn send_once(svc: &TimeoutFailoverSmsService) -> Result<SendResponse, SmsError> {
        let args = vec!["123".to_string()];
        let numbers = vec!["12345".to_string()];
        svc.send(&SendContext::background(), SendRequest::new("123", &args, &numbers))
            .await
    }

    fn with_state(
        svc: TimeoutFailoverSmsService,
        index: usize,
        timeouts: u32,
    ) -> TimeoutFailoverSmsService {
        svc.index.store(index, Ordering::SeqCst);
        svc.timeouts.store(timeouts, Ordering::SeqCst);
        svc
    }

    #[tokio::test]
    async fn below_threshold_keeps_provider_and_resets_on_success() {
        let svc0 = ScriptedService::ok("svc0");
        let svc = with_state(
            TimeoutFailoverSmsService::new(as_services(&[svc0.clone()]), 15),
            0,
            12,
        );

        let res = send_once(&svc).await.unwrap();

        assert_eq!(res.provider, "svc0");
        assert_eq!(svc.active_index(), 0);
        assert_eq!(svc.consecutive_timeouts(), 0);
    }

    #[tokio::test]
    async fn threshold_switches_then_succeeds() {
        let svc0 = ScriptedService::failing("svc0", SmsError::Provider("send failed".into()));
        let svc1 = ScriptedService::ok("svc1");
        let svc = with_state(
            TimeoutFailoverSmsService::new(as_services(&[svc0.clone(), svc1.clone()]), 15),
            0,
            15,
        );

        let res = send_once(&svc).await.unwrap();

        assert_eq!(res.provider, "svc1");
        assert_eq!(svc0.calls(), 0);
        assert_eq!(svc.active_index(), 1);
        assert_eq!(svc.consecutive_timeouts(), 0);
    }

    #[tokio::test]
    async fn threshold_wraps_around_and_returns_provider_error() {
        let svc0 = ScriptedService::failing("svc0", SmsError::Provider("send failed".into()));
        let svc1 = ScriptedService::ok("svc1");
        let svc = with_state(
            TimeoutFailoverSmsService::new(as_services(&[svc0.clone(), svc1.clone()]), 15),
            1,
            15,
        );

        let err = send_once(&svc).await.unwrap_err();

        assert_eq!(err, SmsError::Provider("send failed".into()));
        assert_eq!(svc.active_index(), 0);
        // Reset by the switch; a non-timeout error leaves it alone.
        assert_eq!(svc.consecutive_timeouts(), 0);
        assert_eq!(svc1.calls(), 0);
    }

    #[tokio::test]
    async fn timeout_after_switch_counts_once() {
        let svc0 = ScriptedService::failing("svc0", SmsError::DeadlineExceeded);
        let svc1 = ScriptedService::ok("svc1");
        let svc = with_state(
            TimeoutFailoverSmsService::new(as_services(&[svc0.clone(), svc1.clone()]), 15),
            1,
            15,
        );

        let err = send_once(&svc).await.unwrap_err();

        assert_eq!(err, SmsError::DeadlineExceeded);
        assert_eq!(svc.active_index(), 0);
        assert_eq!(svc.consecutive_timeouts(), 1);
    }

    #[tokio::test]
    async fn consecutive_timeouts_trigger_switch() {
        let svc0 = ScriptedService::failing("svc0", SmsError::DeadlineExceeded);
        let svc1 = ScriptedService::ok("svc1");
        let svc = TimeoutFailoverSmsService::new(as_services(&[svc0.clone(), svc1.clone()]), 3);

        for expected in 1..=3 {
            assert_eq!(send_once(&svc).await.unwrap_err(), SmsError::DeadlineExceeded);
            assert_eq!(svc.consecutive_timeouts(), expected);
            assert_eq!(svc.active_index(), 0);
        }

        let res = send_once(&svc).await.unwrap();
        assert_eq!(res.provider, "svc1");
        assert_eq!(svc.active_index(), 1);
        assert_eq!(svc0.calls(), 3);
    }

    #[tokio::test]
    async fn non_timeout_errors_never_move_the_counter() {
        let svc0 = ScriptedService::failing("svc0", SmsError::Http("connection reset".into()));
        let svc1 = ScriptedService::ok("svc1");
        let svc = with_state(
            TimeoutFailoverSmsService::new(as_services(&[svc0.clone(), svc1.clone()]), 2),
            0,
            1,
        );

        for _ in 0..5 {
            assert!(send_once(&svc).await.is_err());
        }

        assert_eq!(svc.consecutive_timeouts(), 1);
        assert_eq!(svc.active_index(), 0);
        assert_eq!(svc1.calls(), 0);
    }

    #[tokio::test]
    async fn empty_provider_list_is_invalid() {
        let svc = TimeoutFailoverSmsService::new(Vec::new(), 1);
        assert!(matches!(send_once(&svc).await, Err(SmsError::Invalid(_))));
    }

    /// Waits at `barrier` (or yields) before delegating, so concurrent sends
    /// are really in flight together.
    struct InFlight {
        inner: Arc<ScriptedService>,
        barrier: Option<Arc<Barrier>>,
    }

    #[async_trait]
    impl SmsService for InFlight {
        async fn send(
            &self,
            ctx: &SendContext,
            req: SendRequest<'_>,
        ) -> Result<SendResponse, SmsError> {
            match &self.barrier {
                Some(barrier) => {
                    barrier.wait().await;
                }
                None => tokio::task::yield_now().await,
            }
            self.inner.send(ctx, req).await
        }
    }

    fn in_flight(
        list: &[Arc<ScriptedService>],
        barrier: Option<Arc<Barrier>>,
    ) -> Vec<Arc<dyn SmsService>> {
        list.iter()
            .map(|p| {
                Arc::new(InFlight {
                    inner: p.clone(),
                    barrier: barrier.clone(),
                }) as Arc<dyn SmsService>
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_timeouts_are_all_counted() {
        const SENDERS: usize = 16;
        let slow = ScriptedService::failing("slow", SmsError::DeadlineExceeded);
        let barrier = Arc::new(Barrier::new(SENDERS));
        let svc = Arc::new(with_state(
            TimeoutFailoverSmsService::new(in_flight(&[slow.clone()], Some(barrier)), 100),
            0,
            4,
        ));

        let handles: Vec<_> = (0..SENDERS)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { send_once(&svc).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), SmsError::DeadlineExceeded);
        }

        assert_eq!(slow.calls(), SENDERS);
        assert_eq!(svc.consecutive_timeouts(), 4 + SENDERS as u32);
        assert_eq!(svc.active_index(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_senders_at_threshold_switch_at_most_once_each() {
        const SENDERS: usize = 16;
        // One more provider than senders, so the index can never wrap back to 0.
        let providers: Vec<_> = (0..=SENDERS).map(|_| ScriptedService::ok("svc")).collect();
        let svc = Arc::new(with_state(
            TimeoutFailoverSmsService::new(in_flight(&providers, None), 5),
            0,
            5,
        ));

        let handles: Vec<_> = (0..SENDERS)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { send_once(&svc).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let calls: usize = providers.iter().map(|p| p.calls()).sum();
        assert_eq!(calls, SENDERS);
        // The first swap always wins; later ones need a sender that saw the
        // new index before its count was reset, and each sender swaps at most once.
        let switched = svc.active_index();
        assert!((1..=SENDERS).contains(&switched));
        assert_eq!(svc.consecutive_timeouts(), 0);
    }

    // Sends complete one after another here, so only the first sees the threshold.
    #[tokio::test]
    async fn interleaved_senders_switch_once() {
        let providers = [
            ScriptedService::ok("svc0"),
            ScriptedService::ok("svc1"),
            ScriptedService::ok("svc2"),
        ];
        let svc = Arc::new(with_state(
            TimeoutFailoverSmsService::new(as_services(&providers), 5),
            0,
            5,
        ));

        let sends = (0..16).map(|_| {
            let svc = svc.clone();
            async move { send_once(&svc).await.map(|r| r.provider) }
        });
        let results = futures::future::join_all(sends).await;

        assert!(results.iter().all(|r| *r == Ok("svc1")));
        assert_eq!(svc.active_index(), 1);
        assert_eq!(svc.consecutive_timeouts(), 0);
        assert_eq!(providers[2].calls(), 0);
    }
}
