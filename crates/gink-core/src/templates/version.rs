//! Template version resolution

use semver::Version;
use std::fmt;

/// Sentinel requesting the newest published template
pub const LATEST: &str = "latest";

/// Requested template version, either `latest` or a release number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VersionSpec {
    #[default]
    Latest,
    Release(String),
}

impl VersionSpec {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s == LATEST {
            VersionSpec::Latest
        } else {
            VersionSpec::Release(s.to_string())
        }
    }

    /// Archive tag for this version: `latest` or `v<version>`
    ///
    /// The input is not validated; an unknown tag only shows up later as a
    /// missing archive.
    pub fn tag(&self) -> String {
        match self {
            VersionSpec::Latest => LATEST.to_string(),
            VersionSpec::Release(v) => format!("v{}", v),
        }
    }

    /// Whether the release number parses as a semantic version
    pub fn is_semver(&self) -> bool {
        match self {
            VersionSpec::Latest => true,
            VersionSpec::Release(v) => Version::parse(v).is_ok(),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => f.write_str(LATEST),
            VersionSpec::Release(v) => f.write_str(v),
        }
    }
}

impl From<&str> for VersionSpec {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}
