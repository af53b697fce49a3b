//! Promoter manifest: the registries involved in a promotion and the images
//! to copy between them.

use serde::{Deserialize, Serialize};

use crate::domain::error::{HarnessError, Result};
use crate::domain::image::{ImageRecord, RegistryName};

/// A registry taking part in a promotion, with the credential used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryContext {
    pub name: RegistryName,

    #[serde(
        rename = "service-account",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_account: Option<String>,

    /// Marks the source (staging) registry.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub src: bool,
}

impl RegistryContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: RegistryName::new(name),
            service_account: None,
            src: false,
        }
    }

    pub fn with_service_account(mut self, account: impl Into<String>) -> Self {
        self.service_account = Some(account.into());
        self
    }

    pub fn source(mut self) -> Self {
        self.src = true;
        self
    }
}

/// The promoter's manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registries: Vec<RegistryContext>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRecord>,

    /// Groups of image paths that are the same image under different names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub renames: Vec<Vec<String>>,
}

impl Manifest {
    /// Look up the registry context declared under `name`.
    pub fn registry(&self, name: &RegistryName) -> Option<&RegistryContext> {
        self.registries.iter().find(|r| &r.name == name)
    }

    /// Service account configured for `name`, if any.
    pub fn service_account_for(&self, name: &RegistryName) -> Option<&str> {
        self.registry(name)
            .and_then(|r| r.service_account.as_deref())
            .filter(|sa| !sa.is_empty())
    }

    /// The source registry, if one is marked.
    pub fn source_registry(&self) -> Option<&RegistryContext> {
        self.registries.iter().find(|r| r.src)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| HarnessError::Parse {
            origin: "manifest".to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_yaml(doc: &str) -> Result<Self> {
        serde_yaml::from_str(doc).map_err(|e| HarnessError::Parse {
            origin: "manifest".to_string(),
            message: e.to_string(),
        })
    }
}
