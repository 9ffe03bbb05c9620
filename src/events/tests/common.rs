//! Shared fixtures for dispatcher tests

use crate::events::api::{Event, Listener, ListenerError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: &'static str,
    pub priority: f64,
}

impl Job {
    pub fn new(name: &'static str, priority: f64) -> Self {
        Self { name, priority }
    }
}

impl Event for Job {
    fn event_type(&self) -> &str {
        "Job"
    }

    fn priority(&self) -> f64 {
        self.priority
    }

    fn describe(&self) -> String {
        format!("Job {}", self.name)
    }
}

/// Records every notification and fails the first `failures` calls
pub struct ScriptedListener {
    pub label: &'static str,
    failures: usize,
    permanent: bool,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<&'static str>>,
}

impl ScriptedListener {
    pub fn succeeding(label: &'static str) -> Self {
        Self::failing(label, 0)
    }

    pub fn failing(label: &'static str, failures: usize) -> Self {
        Self {
            label,
            failures,
            permanent: false,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(label: &'static str) -> Self {
        Self {
            permanent: true,
            ..Self::failing(label, usize::MAX)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<&'static str> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Listener<Job> for ScriptedListener {
    async fn notify(&self, event: &Job) -> Result<(), ListenerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.permanent {
            return Err(ListenerError::do_not_retry(format!("{} refuses", self.label)));
        }
        if call < self.failures {
            return Err(ListenerError::failed(format!(
                "{} attempt {} failed",
                self.label,
                call + 1
            )));
        }
        self.seen.lock().unwrap().push(event.name);
        Ok(())
    }

    fn name(&self) -> &str {
        self.label
    }
}
