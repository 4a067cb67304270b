//! Observability middleware (spec §4.7).
//!
//! Wraps every inbound request in a span named `mcp.<operation_type>.<method>`
//! and every repository call in `db.<repo>.<op>`. A `Recorder` is injected
//! into the session engine; `NullRecorder` satisfies the contract with zero
//! overhead when `observability.enabled=false`, matching the teacher's
//! pattern of a no-op observability backend.

use std::time::Instant;

/// Final status of an observed unit of work, recorded as a span attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Cancelled,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Cross-cutting recorder interface. A real implementation emits `tracing`
/// spans; `NullRecorder` is the zero-overhead default for disabled telemetry.
pub trait Recorder: Send + Sync {
    fn record_request(&self, method: &str, outcome: Outcome, elapsed_ms: u64);
    fn record_repo_call(&self, repo: &str, op: &str, outcome: Outcome, elapsed_ms: u64);
}

pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn record_request(&self, _method: &str, _outcome: Outcome, _elapsed_ms: u64) {}
    fn record_repo_call(&self, _repo: &str, _op: &str, _outcome: Outcome, _elapsed_ms: u64) {}
}

/// Emits `tracing` spans and info-level events; used when
/// `observability.enabled=true`.
pub struct TracingRecorder;

impl Recorder for TracingRecorder {
    fn record_request(&self, method: &str, outcome: Outcome, elapsed_ms: u64) {
        tracing::info!(
            target: "mcp.request",
            method,
            outcome = outcome.as_str(),
            elapsed_ms,
            "request completed"
        );
    }

    fn record_repo_call(&self, repo: &str, op: &str, outcome: Outcome, elapsed_ms: u64) {
        tracing::debug!(
            target: "db",
            repo,
            op,
            outcome = outcome.as_str(),
            elapsed_ms,
            "repository call completed"
        );
    }
}

pub fn recorder_for(enabled: bool) -> Box<dyn Recorder> {
    if enabled {
        Box::new(TracingRecorder)
    } else {
        Box::new(NullRecorder)
    }
}

/// RAII timer for a request span. `operation_type` is one of
/// `lifecycle`/`resource`/`tool`/`prompt`/`sampling`, per §4.7's
/// `mcp.<operation_type>.<method>` naming.
pub struct RequestSpan<'a> {
    recorder: &'a dyn Recorder,
    operation_type: &'static str,
    method: String,
    started: Instant,
    outcome: Outcome,
}

impl<'a> RequestSpan<'a> {
    pub fn start(recorder: &'a dyn Recorder, operation_type: &'static str, method: impl Into<String>) -> Self {
        let method = method.into();
        tracing::debug!(target: "mcp.request", operation_type, method = %method, "request received");
        Self {
            recorder,
            operation_type,
            method,
            started: Instant::now(),
            outcome: Outcome::Success,
        }
    }

    pub fn mark(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }
}

impl Drop for RequestSpan<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let qualified = format!("mcp.{}.{}", self.operation_type, self.method);
        self.recorder.record_request(&qualified, self.outcome, elapsed_ms);
    }
}

/// RAII timer for a repository call span (`db.<repo>.<op>`).
pub struct RepoSpan<'a> {
    recorder: &'a dyn Recorder,
    repo: &'static str,
    op: &'static str,
    started: Instant,
    outcome: Outcome,
}

impl<'a> RepoSpan<'a> {
    pub fn start(recorder: &'a dyn Recorder, repo: &'static str, op: &'static str) -> Self {
        Self {
            recorder,
            repo,
            op,
            started: Instant::now(),
            outcome: Outcome::Success,
        }
    }

    pub fn mark(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }
}

impl Drop for RepoSpan<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.recorder.record_repo_call(self.repo, self.op, self.outcome, elapsed_ms);
    }
}
