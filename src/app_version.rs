//! Application version advertised to peers (spec §6's `app-version` key).
//!
//! Neither the source system nor `spec.md` specifies a comparison order for
//! this value — see `DESIGN.md`'s Open Question resolutions — so it is kept
//! as an opaque, `Display`-able token rather than parsed as semver.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AppVersion(String);

impl AppVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AppVersion {
    fn default() -> Self {
        Self("0.0.0".to_string())
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AppVersion {
    fn from(value: String) -> Self {
        Self(value)
    }
}
