//! Termination policy for unrecoverable failures
//!
//! Components that hit an inconsistency they cannot reconcile (a failed
//! offset commit, tracker state that no longer matches the stream) hand a
//! report to a [`FatalHandler`] instead of continuing with partial state.
//! The production handler exits the process so an external supervisor can
//! restart from the last durable commit.

use std::sync::Mutex;

/// Exit code used when the consumer terminates itself
pub const FATAL_EXIT_CODE: i32 = 255;

/// Receives fatal reports; implementations are not expected to return
/// control to normal processing
pub trait FatalHandler: Send + Sync {
    fn terminate(&self, report: &str);
}

/// Logs the report, flushes the logger and exits the process
#[derive(Debug, Clone)]
pub struct ProcessExit {
    code: i32,
}

impl Default for ProcessExit {
    fn default() -> Self {
        Self {
            code: FATAL_EXIT_CODE,
        }
    }
}

impl ProcessExit {
    pub fn with_code(code: i32) -> Self {
        Self { code }
    }
}

impl FatalHandler for ProcessExit {
    fn terminate(&self, report: &str) {
        log::error!("Non-resolvable error, shutting down: {}", report);
        log::logger().flush();
        std::process::exit(self.code);
    }
}

/// Collects fatal reports instead of exiting
///
/// For hosts that supervise termination themselves, and for tests.
#[derive(Debug, Default)]
pub struct CollectingFatalHandler {
    reports: Mutex<Vec<String>>,
}

impl CollectingFatalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }

    pub fn is_triggered(&self) -> bool {
        !self.reports().is_empty()
    }
}

impl FatalHandler for CollectingFatalHandler {
    fn terminate(&self, report: &str) {
        log::error!("Fatal condition recorded: {}", report);
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.to_string());
        }
    }
}
