//! Infrastructure-boundary types shared by ports and adapters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dmforge_domain::{
    CampaignId, CharacterId, DomainError, Participant, Point, UserId,
};

/// A campaign member's role, read from the campaign CRUD subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CampaignRole {
    Dm,
    Player,
}

impl fmt::Display for CampaignRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dm => write!(f, "dm"),
            Self::Player => write!(f, "player"),
        }
    }
}

impl FromStr for CampaignRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dm" => Ok(Self::Dm),
            "player" => Ok(Self::Player),
            other => Err(DomainError::parse(format!(
                "Unknown campaign role: '{}'",
                other
            ))),
        }
    }
}

/// An active campaign member, ordered by join time for round-robin turn
/// orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignMember {
    pub user_id: UserId,
    pub role: CampaignRole,
    pub character_id: Option<CharacterId>,
    pub joined_at: DateTime<Utc>,
}

/// One combatant registered in an encounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncounterParticipant {
    pub participant: Participant,
    pub initiative: i32,
    /// Registration sequence number; breaks initiative ties.
    pub seq: i64,
}

/// Ability scores from the permanent character record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Abilities {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for Abilities {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// The slice of the permanent character record this engine reads and
/// writes back. Character-sheet CRUD itself lives elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub owner: UserId,
    pub name: String,
    pub class: String,
    pub level: u8,
    pub hit_points: i32,
    pub xp: i64,
    pub abilities: Abilities,
    /// Slot level -> max slots.
    pub spell_slots: BTreeMap<u8, u8>,
}

/// How a token moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveMode {
    Walk,
    Run,
    Teleport,
}

impl fmt::Display for MoveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Walk => write!(f, "walk"),
            Self::Run => write!(f, "run"),
            Self::Teleport => write!(f, "teleport"),
        }
    }
}

impl FromStr for MoveMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "walk" => Ok(Self::Walk),
            "run" => Ok(Self::Run),
            "teleport" => Ok(Self::Teleport),
            other => Err(DomainError::parse(format!(
                "Unknown movement mode: '{}'",
                other
            ))),
        }
    }
}

/// A character token's current position on the campaign's world map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRecord {
    pub campaign_id: CampaignId,
    pub character_id: CharacterId,
    pub point: Point,
    pub updated_at: DateTime<Utc>,
}

/// One append-only audit row per accepted move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveAuditRow {
    pub campaign_id: CampaignId,
    pub character_id: CharacterId,
    pub previous_point: Option<Point>,
    pub new_point: Point,
    pub mode: MoveMode,
    pub moved_by: UserId,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// A two-point traveled segment with per-vertex timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSegment {
    pub campaign_id: CampaignId,
    pub character_id: CharacterId,
    pub start: Point,
    pub start_at: DateTime<Utc>,
    pub end: Point,
    pub end_at: DateTime<Utc>,
}
