//! Domain models for the e2e harness.
//!
//! - `Manifest` / `RegistryContext`: what the promoter is asked to do
//! - `ImageRecord`: what a registry holds, as the promoter reports it
//! - `TestCase` / `RegistrySnapshot`: what the registries should hold
//! - `SharedRegistries`: the registries a run mutates

pub mod error;
pub mod image;
pub mod manifest;
pub mod registry;
pub mod suite;

pub use error::{CommandError, HarnessError, Result};
pub use image::{Digest, DigestTags, ImageName, ImageRecord, RegistryName, Tag};
pub use manifest::{Manifest, RegistryContext};
pub use registry::SharedRegistries;
pub use suite::{load_suite, parse_suite, RegistrySnapshot, SnapshotStage, Suite, TestCase};
