//! Structured lifecycle events for suite runs.
//!
//! Every event carries an `event` field so log pipelines can filter on it.
//! Set `RUST_LOG` to tune verbosity; pass `--json` to the binary for JSON.

use tracing::{error, info, Span};

/// Span scoping everything logged while one test case runs.
///
/// Attach it with `tracing::Instrument` rather than entering it, since the
/// test body awaits subprocesses.
pub fn test_span(run_id: &str, test: &str) -> Span {
    tracing::info_span!("cip_e2e.test", run_id = %run_id, test = %test)
}

pub fn emit_suite_started(run_id: &str, suite_digest: &str, tests: usize, registries: &str) {
    info!(
        event = "suite.started",
        run_id = %run_id,
        suite_digest = %suite_digest,
        tests = tests,
        registries = %registries,
    );
}

pub fn emit_phase_started(test: &str, phase: &str) {
    info!(event = "test.phase", test = %test, phase = %phase);
}

pub fn emit_test_passed(test: &str, duration_ms: u64) {
    info!(event = "test.passed", test = %test, duration_ms = duration_ms);
}

pub fn emit_suite_finished(run_id: &str, duration_ms: u64, passed: usize) {
    info!(
        event = "suite.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        passed = passed,
    );
}

/// Emit event: the suite stopped at its first failure.
pub fn emit_suite_aborted(run_id: &str, test: Option<&str>, phase: &str, error: &dyn std::fmt::Display) {
    error!(
        event = "suite.aborted",
        run_id = %run_id,
        test = test.unwrap_or("-"),
        phase = %phase,
        error = %error,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_enter_and_emit() {
        let _entered = test_span("run-1", "simple-promote").entered();
        emit_phase_started("simple-promote", "reset");
        emit_test_passed("simple-promote", 12);
    }
}
