//! Scripted fake provider for exercising decorators in tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{SendContext, SendRequest, SendResponse, SmsError, SmsService};

/// Replays a queue of outcomes; once the queue is drained it keeps returning
/// the fallback outcome. Records every template id it was called with.
#[derive(Debug)]
pub struct ScriptedService {
    name: &'static str,
    script: Mutex<VecDeque<Result<(), SmsError>>>,
    fallback: Result<(), SmsError>,
    calls: AtomicUsize,
    templates: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new(name: &'static str, fallback: Result<(), SmsError>) -> Self {
        Self {
            name,
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            templates: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(name: &'static str) -> Arc<Self> {
        Arc::new(Self::new(name, Ok(())))
    }

    pub fn failing(name: &'static str, err: SmsError) -> Arc<Self> {
        Arc::new(Self::new(name, Err(err)))
    }

    /// Queue outcomes returned before the fallback kicks in.
    pub fn then(self, outcome: Result<(), SmsError>) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(outcome);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn templates(&self) -> Vec<String> {
        self.templates.lock().expect("template lock poisoned").clone()
    }
}

#[async_trait]
impl SmsService for ScriptedService {
    async fn send(
        &self,
        _ctx: &SendContext,
        req: SendRequest<'_>,
    ) -> Result<SendResponse, SmsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.templates
            .lock()
            .expect("template lock poisoned")
            .push(req.template_id.to_string());
        let outcome = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        outcome.map(|()| SendResponse::new(self.name, serde_json::Value::Null))
    }
}
