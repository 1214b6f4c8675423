use std::fmt;

/// Build metadata captured by `build.rs`.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub build_profile: &'static str,
    pub version: &'static str,
    pub pkg_version: &'static str,
    pub build_timestamp: &'static str,
    pub rust_version: &'static str,
    pub target: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        build_profile: env!("BUILD_PROFILE"),
        version: env!("REPO_VERSION"),
        pkg_version: env!("CARGO_PKG_VERSION"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
        rust_version: env!("RUST_VERSION"),
        target: env!("BUILD_TARGET"),
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dlfs {} ({}, {} build for {}, built {} with {})",
            self.pkg_version,
            self.version,
            self.build_profile,
            self.target,
            self.build_timestamp,
            self.rust_version
        )
    }
}
