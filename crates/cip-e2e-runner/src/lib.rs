//! cip-e2e runner
//!
//! Drives the container image promoter against live registries:
//! - clears every registry a test touches and republishes the golden image
//! - snapshots registries through the promoter's snapshot mode
//! - runs the promotion itself
//! - sequences all of it per test case, stopping at the first failure
//!
//! All subprocesses go through [`CommandExecutor`]; tests swap in
//! [`fakes::ScriptedExecutor`].

pub mod command;
pub mod config;
pub mod credential;
pub mod fakes;
pub mod golden;
pub mod orchestrator;
pub mod promotion;
pub mod registry;
pub mod snapshot;
pub mod workspace_status;

pub use command::{CommandExecutor, CommandOutput, ExternalCommand, SystemExecutor};
pub use config::{HarnessConfig, ToolPaths};
pub use credential::activate_service_account;
pub use golden::{publish_golden_image, GoldenImage, Platform};
pub use orchestrator::{Orchestrator, Phase, SuiteFailure, SuiteReport, TestOutcome};
pub use promotion::{run_promotion, write_temp_manifest};
pub use registry::{clear_registry, read_registry, reset_registries};
pub use snapshot::capture_snapshot;
pub use workspace_status::WorkspaceStatus;
