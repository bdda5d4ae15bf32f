//! Build phases.
//!
//! ```text
//! Loaded → Scanned → Editing → Finalizing → Packaged
//! ```
//!
//! Phases only move forward. `Packaged` is terminal: the package has been
//! consumed and serialized.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a build is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    /// Package opened, main document parsed.
    Loaded,
    /// Ids and paragraphs indexed.
    Scanned,
    /// Edits being applied.
    Editing,
    /// Parts and registries being written back.
    Finalizing,
    /// Output archive produced.
    Packaged,
}

impl BuildPhase {
    /// Returns `true` for `Packaged`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Packaged)
    }

    /// The phases reachable from this one.
    #[must_use]
    pub const fn valid_transitions(self) -> &'static [Self] {
        match self {
            Self::Loaded => &[Self::Scanned],
            Self::Scanned => &[Self::Editing],
            Self::Editing => &[Self::Finalizing],
            Self::Finalizing => &[Self::Packaged],
            Self::Packaged => &[],
        }
    }

    /// Check whether moving to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Scanned => write!(f, "scanned"),
            Self::Editing => write!(f, "editing"),
            Self::Finalizing => write!(f, "finalizing"),
            Self::Packaged => write!(f, "packaged"),
        }
    }
}
