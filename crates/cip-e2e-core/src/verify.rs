//! Snapshot verification.
//!
//! Observed and expected image lists are compared exactly: same length, same
//! order, every field equal. No sorting or digest normalization happens here.
//! If the promoter's snapshot output ever stops being stably ordered, that
//! shows up as a mismatch rather than being papered over.

use std::fmt;

use crate::domain::image::{ImageRecord, RegistryName};
use crate::domain::suite::SnapshotStage;

/// Observed registry contents that differ from the declared ones.
///
/// Displays as a conflict-marker block so the operator can read both sides
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct SnapshotMismatch {
    pub registry: RegistryName,
    pub stage: SnapshotStage,
    pub observed: Vec<ImageRecord>,
    pub expected: Vec<ImageRecord>,
}

impl fmt::Display for SnapshotMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<<<<<<< got ({}, {})", self.registry, self.stage)?;
        f.write_str(&render_records(&self.observed))?;
        writeln!(f, "=======")?;
        f.write_str(&render_records(&self.expected))?;
        write!(f, ">>>>>>> expected ({}, {})", self.registry, self.stage)
    }
}

/// Compare an observed snapshot against the expected one.
pub fn check_equal(
    registry: &RegistryName,
    stage: SnapshotStage,
    observed: &[ImageRecord],
    expected: &[ImageRecord],
) -> Result<(), SnapshotMismatch> {
    if observed == expected {
        return Ok(());
    }

    Err(SnapshotMismatch {
        registry: registry.clone(),
        stage,
        observed: observed.to_vec(),
        expected: expected.to_vec(),
    })
}

/// Render records the way suite documents spell them, one block per side.
fn render_records(records: &[ImageRecord]) -> String {
    if records.is_empty() {
        return "[]\n".to_string();
    }
    match serde_yaml::to_string(records) {
        Ok(yaml) => yaml,
        Err(_) => format!("{records:?}\n"),
    }
}
