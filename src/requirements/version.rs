//! Version string extraction and matching.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// A version found in tool output, e.g. `v18.18.0` or `git version 2.43.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: Option<u64>,
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.patch {
            Some(patch) => write!(f, "{}.{}.{}", self.major, self.minor, patch),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

/// Matches `1.2`, `v1.2.3` and the like anywhere in a line.
static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"v?(\d+)\.(\d+)(?:\.(\d+))?").expect("VERSION_REGEX must compile")
});

/// Extract the first version number from `text`.
pub fn extract_version(text: &str) -> Option<ToolVersion> {
    let caps = VERSION_REGEX.captures(text)?;
    Some(ToolVersion {
        major: caps.get(1)?.as_str().parse().ok()?,
        minor: caps.get(2)?.as_str().parse().ok()?,
        patch: caps.get(3).and_then(|m| m.as_str().parse().ok()),
    })
}

/// A `major.minor` that a tool's version must match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRequirement {
    pub major: u64,
    pub minor: u64,
}

impl VersionRequirement {
    pub fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }

    /// Whether `version` has exactly this major and minor.
    pub fn matches(&self, version: &ToolVersion) -> bool {
        version.major == self.major && version.minor == self.minor
    }
}

impl FromStr for VersionRequirement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid version requirement '{}': expected N.N", s);
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for VersionRequirement {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VersionRequirement> for String {
    fn from(r: VersionRequirement) -> Self {
        r.to_string()
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
