//! Image records as reported by the promoter's snapshot mode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_newtype!(
    /// Registry path, e.g. `gcr.io/k8s-staging-cip-test`.
    RegistryName
);
string_newtype!(
    /// Image path relative to its registry, e.g. `golden-foo/foo`.
    ImageName
);
string_newtype!(
    /// Content digest, e.g. `sha256:0123...`.
    Digest
);
string_newtype!(
    /// Image tag.
    Tag
);

/// Digest to tag-list mapping for a single image.
pub type DigestTags = BTreeMap<Digest, Vec<Tag>>;

/// One image in a registry: its name and every digest it holds, with the
/// tags pointing at each digest. An untagged digest maps to an empty list.
///
/// Equality is structural. Tag lists are compared in order; nothing is
/// normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageRecord {
    pub name: ImageName,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dmap: DigestTags,
}

impl ImageRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: ImageName::new(name),
            dmap: DigestTags::new(),
        }
    }

    /// Builder-style helper attaching `tags` to `digest`.
    pub fn with_digest<I, T>(mut self, digest: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.dmap.insert(
            Digest::new(digest),
            tags.into_iter().map(Tag::new).collect(),
        );
        self
    }

    /// Number of distinct digests held by this image.
    pub fn digest_count(&self) -> usize {
        self.dmap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_record_yaml_shape() {
        let record = ImageRecord::new("foo").with_digest("sha256:aaa", ["1.0"]);
        let yaml = serde_yaml::to_string(&record).unwrap();
        assert!(yaml.contains("name: foo"));
        assert!(yaml.contains("sha256:aaa"));
        assert!(yaml.contains("1.0"));
    }

    #[test]
    fn test_untagged_digest_is_distinct_from_tagged() {
        let tagged = ImageRecord::new("foo").with_digest("sha256:aaa", ["1.0"]);
        let untagged = ImageRecord::new("foo").with_digest("sha256:aaa", Vec::<String>::new());
        assert_ne!(tagged, untagged);
    }

    #[test]
    fn test_tag_order_is_significant() {
        let a = ImageRecord::new("foo").with_digest("sha256:aaa", ["1.0", "latest"]);
        let b = ImageRecord::new("foo").with_digest("sha256:aaa", ["latest", "1.0"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let doc = "name: foo\ndigest: sha256:aaa\n";
        let parsed: Result<ImageRecord, _> = serde_yaml::from_str(doc);
        assert!(parsed.is_err());
    }
}
