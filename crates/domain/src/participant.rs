//! Turn-order participant sum type
//!
//! A participant in a session is either a player (identified by their user
//! id) or a non-player combatant (identified by an NPC id). Modeling this as
//! a tagged union keeps downstream logic from ever sniffing id prefixes to
//! decide who is player-controlled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{NpcId, UserId};

/// A turn-order entry: a player-controlled user or a DM-controlled NPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Participant {
    Player(UserId),
    NonPlayer(NpcId),
}

impl Participant {
    /// Returns true for player-controlled participants.
    #[inline]
    pub fn is_player(self) -> bool {
        matches!(self, Self::Player(_))
    }

    /// Returns true for DM-controlled (non-player) participants.
    #[inline]
    pub fn is_non_player(self) -> bool {
        matches!(self, Self::NonPlayer(_))
    }

    /// The player user id, when this participant is a player.
    pub fn player_id(self) -> Option<UserId> {
        match self {
            Self::Player(id) => Some(id),
            Self::NonPlayer(_) => None,
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => write!(f, "player:{}", id),
            Self::NonPlayer(id) => write!(f, "npc:{}", id),
        }
    }
}

impl FromStr for Participant {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, id) = s
            .split_once(':')
            .ok_or_else(|| DomainError::parse(format!("Invalid participant: '{}'", s)))?;
        match tag {
            "player" => {
                let id: UserId = id
                    .parse()
                    .map_err(|_| DomainError::parse(format!("Invalid participant id: '{}'", s)))?;
                Ok(Self::Player(id))
            }
            "npc" => {
                let id: NpcId = id
                    .parse()
                    .map_err(|_| DomainError::parse(format!("Invalid participant id: '{}'", s)))?;
                Ok(Self::NonPlayer(id))
            }
            other => Err(DomainError::parse(format!(
                "Unknown participant kind: '{}'",
                other
            ))),
        }
    }
}
