//! The registries a suite run owns.
//!
//! A suite mutates real registries: every test clears them, republishes the
//! golden image and promotes into them. There is exactly one staging/prod
//! pair behind a suite, so the set named here has a single owner for the
//! whole run. Two runs against overlapping sets will corrupt each other's
//! snapshots; the harness does not lock anything, the caller (typically a
//! single CI job slot) must serialize runs.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::image::RegistryName;
use crate::domain::suite::TestCase;

/// Every registry referenced by any test in a suite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedRegistries {
    names: BTreeSet<RegistryName>,
}

impl SharedRegistries {
    pub fn from_tests(tests: &[TestCase]) -> Self {
        let names = tests
            .iter()
            .flat_map(|t| t.manifest.registries.iter().map(|r| r.name.clone()))
            .collect();
        Self { names }
    }
}

impl fmt::Display for SharedRegistries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names.iter().map(RegistryName::as_str).collect();
        f.write_str(&names.join(","))
    }
}
