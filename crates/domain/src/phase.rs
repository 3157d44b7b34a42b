//! Game phases and the static phase transition table
//!
//! Sessions move between four phases. The transition graph is fixed data:
//! there are no side effects here and no failure mode beyond "edge absent".
//!
//! ```text
//! exploration -> combat | social | rest
//! combat      -> exploration | social
//! social      -> exploration | combat | rest
//! rest        -> exploration
//! ```
//!
//! Self-transitions are never allowed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The phase a session is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GamePhase {
    #[default]
    Exploration,
    Combat,
    Social,
    Rest,
}

impl GamePhase {
    /// Every phase, in declaration order.
    pub const ALL: [GamePhase; 4] = [Self::Exploration, Self::Combat, Self::Social, Self::Rest];

    /// The outgoing edges of the transition graph for this phase.
    pub fn allowed_transitions(self) -> &'static [GamePhase] {
        match self {
            Self::Exploration => &[Self::Combat, Self::Social, Self::Rest],
            Self::Combat => &[Self::Exploration, Self::Social],
            Self::Social => &[Self::Exploration, Self::Combat, Self::Rest],
            Self::Rest => &[Self::Exploration],
        }
    }

    /// Whether the transition graph contains an edge `self -> target`.
    ///
    /// Self-transitions are always rejected.
    pub fn can_transition_to(self, target: GamePhase) -> bool {
        self != target && self.allowed_transitions().contains(&target)
    }

    /// Whether this phase runs individual turns at all.
    pub fn has_turn_order(self) -> bool {
        !matches!(self, Self::Rest)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exploration => write!(f, "exploration"),
            Self::Combat => write!(f, "combat"),
            Self::Social => write!(f, "social"),
            Self::Rest => write!(f, "rest"),
        }
    }
}

impl FromStr for GamePhase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exploration" => Ok(Self::Exploration),
            "combat" => Ok(Self::Combat),
            "social" => Ok(Self::Social),
            "rest" => Ok(Self::Rest),
            other => Err(DomainError::parse(format!("Unknown phase: '{}'", other))),
        }
    }
}
