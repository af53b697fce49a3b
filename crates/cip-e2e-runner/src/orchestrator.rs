//! Suite orchestration.
//!
//! Test cases run one after another, each through
//! `Reset → PreVerify → Promote → PostVerify → Done`. The first error in any
//! phase aborts the whole suite: the registries are shared, so a failed test
//! leaves them in a state later tests cannot trust.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use cip_e2e_core::obs;
use cip_e2e_core::{
    check_equal, load_suite, test_span, HarnessError, Result, SharedRegistries, SnapshotStage, Suite, TestCase,
};

use crate::command::CommandExecutor;
use crate::config::HarnessConfig;
use crate::credential::activate_service_account;
use crate::golden::GoldenImage;
use crate::promotion::run_promotion;
use crate::registry::reset_registries;
use crate::snapshot::capture_snapshot;

/// Where a run was when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Load,
    Authenticate,
    Reset,
    PreVerify,
    Promote,
    PostVerify,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Load => "load",
            Phase::Authenticate => "authenticate",
            Phase::Reset => "reset",
            Phase::PreVerify => "pre_verify",
            Phase::Promote => "promote",
            Phase::PostVerify => "post_verify",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test case that passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub duration_ms: u64,
}

/// Result of a fully successful suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: String,
    pub suite_digest: String,
    pub started_at: DateTime<Utc>,
    pub tests: Vec<TestOutcome>,
    pub duration_ms: u64,
}

/// The error that stopped a suite, with where it happened.
#[derive(Debug)]
pub struct SuiteFailure {
    pub run_id: String,

    /// `None` when the run failed before its first test case.
    pub test: Option<String>,
    pub phase: Phase,
    pub error: HarnessError,

    /// Tests that passed before the failure.
    pub passed: Vec<TestOutcome>,
}

impl SuiteFailure {
    pub fn is_mismatch(&self) -> bool {
        matches!(self.error, HarnessError::Mismatch(_))
    }
}

impl fmt::Display for SuiteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.test {
            Some(test) => write!(f, "e2e test '{}' failed during {}: {}", test, self.phase, self.error),
            None => write!(f, "e2e run failed during {}: {}", self.phase, self.error),
        }
    }
}

impl std::error::Error for SuiteFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Drives test cases through their phases against live registries.
pub struct Orchestrator {
    executor: Arc<dyn CommandExecutor>,
    config: HarnessConfig,
    golden: GoldenImage,
    run_id: String,
}

impl Orchestrator {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: HarnessConfig) -> Self {
        Self {
            executor,
            config,
            golden: GoldenImage::default(),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_golden_image(mut self, golden: GoldenImage) -> Self {
        self.golden = golden;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Load the suite document at `path`.
    pub fn load(&self, path: &Path) -> std::result::Result<Suite, SuiteFailure> {
        load_suite(path).map_err(|error| self.fail(None, Phase::Load, error, Vec::new()))
    }

    /// Activate the suite's service account. Must happen before any test.
    pub async fn authenticate(&self, key_file: &Path) -> std::result::Result<(), SuiteFailure> {
        activate_service_account(self.executor.as_ref(), &self.config.tools, key_file)
            .await
            .map_err(|error| self.fail(None, Phase::Authenticate, error, Vec::new()))
    }

    /// Run every test case in order, stopping at the first failure.
    pub async fn run_suite(&self, suite: &Suite) -> std::result::Result<SuiteReport, SuiteFailure> {
        let started_at = Utc::now();
        let start = Instant::now();
        let registries = SharedRegistries::from_tests(&suite.tests);
        obs::emit_suite_started(&self.run_id, &suite.digest, suite.len(), &registries.to_string());

        let mut passed = Vec::new();
        for test in &suite.tests {
            let test_start = Instant::now();
            let mut phase = Phase::Reset;

            let outcome = self
                .run_test(test, &mut phase)
                .instrument(test_span(&self.run_id, &test.name))
                .await;
            if let Err(error) = outcome {
                return Err(self.fail(Some(test.name.clone()), phase, error, passed));
            }

            let duration_ms = test_start.elapsed().as_millis() as u64;
            obs::emit_test_passed(&test.name, duration_ms);
            passed.push(TestOutcome {
                name: test.name.clone(),
                duration_ms,
            });
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_suite_finished(&self.run_id, duration_ms, passed.len());
        Ok(SuiteReport {
            run_id: self.run_id.clone(),
            suite_digest: suite.digest.clone(),
            started_at,
            tests: passed,
            duration_ms,
        })
    }

    async fn run_test(&self, test: &TestCase, phase: &mut Phase) -> Result<()> {
        let executor = self.executor.as_ref();

        self.enter(test, phase, Phase::Reset);
        reset_registries(executor, &self.config, &test.manifest, &self.golden).await?;

        self.enter(test, phase, Phase::PreVerify);
        self.verify_snapshots(test, SnapshotStage::Before).await?;

        self.enter(test, phase, Phase::Promote);
        run_promotion(executor, &self.config, &test.manifest).await?;

        self.enter(test, phase, Phase::PostVerify);
        self.verify_snapshots(test, SnapshotStage::After).await?;

        *phase = Phase::Done;
        Ok(())
    }

    async fn verify_snapshots(&self, test: &TestCase, stage: SnapshotStage) -> Result<()> {
        for snapshot in &test.snapshots {
            let observed = capture_snapshot(
                self.executor.as_ref(),
                &self.config,
                &snapshot.name,
                &test.manifest,
            )
            .await?;
            check_equal(&snapshot.name, stage, &observed, snapshot.expected(stage))?;
        }
        Ok(())
    }

    fn enter(&self, test: &TestCase, current: &mut Phase, next: Phase) {
        *current = next;
        obs::emit_phase_started(&test.name, next.as_str());
    }

    fn fail(
        &self,
        test: Option<String>,
        phase: Phase,
        error: HarnessError,
        passed: Vec<TestOutcome>,
    ) -> SuiteFailure {
        obs::emit_suite_aborted(&self.run_id, test.as_deref(), phase.as_str(), &error);
        SuiteFailure {
            run_id: self.run_id.clone(),
            test,
            phase,
            error,
            passed,
        }
    }
}
