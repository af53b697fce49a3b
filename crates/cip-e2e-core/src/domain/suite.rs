//! E2E suite documents.
//!
//! A suite is a YAML list of test cases. Each case embeds the promoter
//! manifest to run and the expected contents of every registry it cares
//! about, before and after promotion. Parsing is strict: unknown fields are
//! rejected rather than dropped.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::domain::error::{HarnessError, Result};
use crate::domain::image::{ImageRecord, RegistryName};
use crate::domain::manifest::Manifest;

/// Which side of the promotion a snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStage {
    Before,
    After,
}

impl fmt::Display for SnapshotStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotStage::Before => f.write_str("before"),
            SnapshotStage::After => f.write_str("after"),
        }
    }
}

/// Expected contents of one registry around a promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySnapshot {
    pub name: RegistryName,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<ImageRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<ImageRecord>,
}

impl RegistrySnapshot {
    pub fn expected(&self, stage: SnapshotStage) -> &[ImageRecord] {
        match stage {
            SnapshotStage::Before => &self.before,
            SnapshotStage::After => &self.after,
        }
    }
}

/// A single e2e test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    pub name: String,

    pub manifest: Manifest,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<RegistrySnapshot>,
}

impl TestCase {
    /// Check the cross-references a parser cannot: every snapshot must name a
    /// registry declared in the test's own manifest.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::Parse {
                origin: "suite".to_string(),
                message: "test case name must not be empty".to_string(),
            });
        }

        for snapshot in &self.snapshots {
            if self.manifest.registry(&snapshot.name).is_none() {
                return Err(HarnessError::Parse {
                    origin: format!("test '{}'", self.name),
                    message: format!(
                        "snapshot registry {} is not declared in the manifest",
                        snapshot.name
                    ),
                });
            }
        }

        Ok(())
    }
}

/// A parsed suite plus the digest of the document it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    pub tests: Vec<TestCase>,

    /// SHA-256 hex digest of the raw document.
    pub digest: String,
}

impl Suite {
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Parse a suite document, keeping declaration order.
pub fn parse_suite(doc: &str) -> Result<Suite> {
    // Blank and null documents are empty suites.
    let tests: Vec<TestCase> = if doc.trim().is_empty() {
        Vec::new()
    } else {
        serde_yaml::from_str::<Option<Vec<TestCase>>>(doc)
            .map_err(|e| HarnessError::Parse {
                origin: "suite".to_string(),
                message: e.to_string(),
            })?
            .unwrap_or_default()
    };

    for test in &tests {
        test.validate()?;
    }

    Ok(Suite {
        tests,
        digest: compute_suite_digest(doc.as_bytes()),
    })
}

/// Read and parse the suite document at `path`.
pub fn load_suite(path: &Path) -> Result<Suite> {
    let doc = std::fs::read_to_string(path).map_err(|e| HarnessError::Parse {
        origin: path.display().to_string(),
        message: e.to_string(),
    })?;

    parse_suite(&doc).map_err(|err| match err {
        HarnessError::Parse { origin, message } if origin == "suite" => HarnessError::Parse {
            origin: path.display().to_string(),
            message,
        },
        other => other,
    })
}

fn compute_suite_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"
- name: simple-promote
  manifest:
    registries:
    - name: staging
      service-account: promoter@example.iam.gserviceaccount.com
      src: true
    - name: prod
    images:
    - name: foo
      dmap:
        "sha256:aaa": ["1.0"]
  snapshots:
  - name: staging
    before:
    - name: foo
      dmap:
        "sha256:aaa": ["1.0"]
  - name: prod
    after:
    - name: foo
      dmap:
        "sha256:aaa": ["1.0"]
"#;

    #[test]
    fn test_parse_simple_suite() {
        let suite = parse_suite(SIMPLE).unwrap();
        assert_eq!(suite.len(), 1);
        let test = &suite.tests[0];
        assert_eq!(test.name, "simple-promote");
        assert_eq!(test.manifest.registries.len(), 2);
        assert_eq!(test.snapshots.len(), 2);
        assert!(test.snapshots[1].before.is_empty());
        assert_eq!(
            test.snapshots[1].expected(SnapshotStage::After),
            &[ImageRecord::new("foo").with_digest("sha256:aaa", ["1.0"])]
        );
    }

    #[test]
    fn test_digest_is_stable() {
        let a = parse_suite(SIMPLE).unwrap();
        let b = parse_suite(SIMPLE).unwrap();
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn test_empty_document_is_empty_suite() {
        let suite = parse_suite("   \n").unwrap();
        assert!(suite.is_empty());
    }

    #[test]
    fn test_null_document_is_empty_suite() {
        assert!(parse_suite("~\n").unwrap().is_empty());
        assert!(parse_suite("null").unwrap().is_empty());
        assert!(parse_suite("---\n~\n").unwrap().is_empty());
    }

    #[test]
    fn test_non_sequence_document_rejected() {
        let err = parse_suite("name: lonely\n").unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_snapshot_of_undeclared_registry_rejected() {
        let doc = r#"
- name: bad
  manifest:
    registries:
    - name: staging
  snapshots:
  - name: prod
"#;
        let err = parse_suite(doc).unwrap_err();
        assert!(err.to_string().contains("not declared"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(SnapshotStage::Before.to_string(), "before");
        assert_eq!(SnapshotStage::After.to_string(), "after");
    }
}
