//! Restore and merge strategies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How a branch head is moved during a restore or a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Fold the abandoned contributions into one new checkpoint.
    Squash,
    /// Move the pointer along existing ancestry; no new checkpoint.
    FastForward,
    /// Replay the divergent checkpoints one by one onto the new base.
    Rebase,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Squash, Strategy::FastForward, Strategy::Rebase];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Squash => "squash",
            Strategy::FastForward => "fast-forward",
            Strategy::Rebase => "rebase",
        }
    }

    /// Whether the strategy writes new checkpoints.
    pub fn creates_checkpoints(&self) -> bool {
        !matches!(self, Strategy::FastForward)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStrategy {
                value: s.to_string(),
            })
    }
}
