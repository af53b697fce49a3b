//! Core library for the container image promoter e2e harness.
//!
//! Holds everything that does not touch the outside world: the suite and
//! manifest model, strict suite loading, snapshot verification, and the
//! logging setup shared by the binaries.

pub mod domain;
pub mod obs;
pub mod telemetry;
pub mod verify;
pub mod version;

pub use domain::{
    load_suite, parse_suite, CommandError, Digest, DigestTags, HarnessError, ImageName,
    ImageRecord, Manifest, RegistryContext, RegistryName, RegistrySnapshot, Result,
    SharedRegistries, SnapshotStage, Suite, Tag, TestCase,
};
pub use obs::test_span;
pub use telemetry::init_tracing;
pub use verify::{check_equal, SnapshotMismatch};
