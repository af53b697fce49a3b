//! Build metadata, stamped at compile time.
//!
//! Release builds set `CIP_E2E_GIT_DESCRIBE`, `CIP_E2E_GIT_COMMIT` and
//! `CIP_E2E_BUILD_TIMESTAMP` in the build environment; local builds fall back
//! to the crate version and `unknown`.

/// Output of `git describe` for the build.
pub const GIT_DESCRIBE: &str = match option_env!("CIP_E2E_GIT_DESCRIBE") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

/// Commit the binary was built from.
pub const GIT_COMMIT: &str = match option_env!("CIP_E2E_GIT_COMMIT") {
    Some(v) => v,
    None => "unknown",
};

/// RFC 3339 UTC build timestamp.
pub const BUILD_TIMESTAMP: &str = match option_env!("CIP_E2E_BUILD_TIMESTAMP") {
    Some(v) => v,
    None => "unknown",
};

/// The three-line banner printed when the binary runs without arguments.
pub fn banner() -> String {
    format!("Built:   {BUILD_TIMESTAMP}\nVersion: {GIT_DESCRIBE}\nCommit:  {GIT_COMMIT}\n")
}
