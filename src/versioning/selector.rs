//! Version selector parsing

use std::fmt;

use super::errors::{VersioningError, VersioningResult};

/// Which version(s) a read returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionSelector {
    /// The live document
    #[default]
    Latest,
    /// One synthesized historical version
    Specific(u64),
    /// Every version, each a full document, ascending
    All,
    /// Version 1 in full, later versions as partial diff entries
    Diffs,
}

impl VersionSelector {
    /// Parse the raw selector value. `None` selects the live document.
    pub fn parse(raw: Option<&str>) -> VersioningResult<Self> {
        let raw = match raw {
            None => return Ok(VersionSelector::Latest),
            Some(raw) => raw.trim(),
        };

        match raw {
            "all" => Ok(VersionSelector::All),
            "diffs" => Ok(VersionSelector::Diffs),
            _ => match raw.parse::<i64>() {
                Ok(n) if n > 0 => Ok(VersionSelector::Specific(n as u64)),
                Ok(n) => Err(VersioningError::bad_request(format!(
                    "version must be a positive integer, got {}",
                    n
                ))),
                Err(_) => Err(VersioningError::bad_request(format!(
                    "version must be a positive integer, \"all\" or \"diffs\", got {:?}",
                    raw
                ))),
            },
        }
    }

    /// Whether the selector reaches into history
    pub fn is_historical(&self) -> bool {
        !matches!(self, VersionSelector::Latest)
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => write!(f, "latest"),
            VersionSelector::Specific(n) => write!(f, "{}", n),
            VersionSelector::All => write!(f, "all"),
            VersionSelector::Diffs => write!(f, "diffs"),
        }
    }
}
