//! Grid movement resolution.
//!
//! Validates mode, authority, and target; snaps the target to the world
//! grid; optionally clamps to the map's bounding rectangle; then writes
//! the position plus one audit row and one path segment under the
//! mover's row lock.
//!
//! Per-move distance limits and move rate limits are policy checks the
//! API layer applies before calling this resolver - the configured
//! thresholds live in [`EngineSettings`] but are independent of snapping
//! correctness.

use std::sync::Arc;

use dmforge_domain::{
    CampaignId, CharacterId, GridConfig, MapBounds, Point, UserId,
};

use crate::infrastructure::locks::{LockKey, LockRegistry};
use crate::infrastructure::ports::{
    CampaignRepo, CampaignRole, CharacterRecordRepo, ClockPort, MoveAuditRow, MoveMode,
    MovementRepo, PathSegment, PositionRecord, RepoError,
};
use crate::infrastructure::settings::EngineSettings;
use crate::use_cases::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum MovementError {
    #[error("Unsupported movement mode: '{0}'")]
    UnsupportedMode(String),
    #[error("{actor} may not move character {character}")]
    MoveForbidden {
        actor: UserId,
        character: CharacterId,
    },
    #[error("Move target is missing or not a finite coordinate pair")]
    InvalidTarget,
    #[error("Snapped target {point} is outside the map bounds")]
    TargetOutOfBounds { point: Point },
    #[error("Character record not found: {0}")]
    CharacterNotFound(CharacterId),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl MovementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedMode(_) | Self::InvalidTarget => ErrorKind::InvalidArgument,
            Self::MoveForbidden { .. } => ErrorKind::Conflict,
            Self::TargetOutOfBounds { .. } => ErrorKind::Conflict,
            Self::CharacterNotFound(_) | Self::Repo(RepoError::NotFound) => ErrorKind::NotFound,
            Self::Repo(_) => ErrorKind::Unavailable,
        }
    }
}

/// An inbound move, as received from the API layer.
#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub campaign_id: CampaignId,
    pub character_id: CharacterId,
    pub moved_by: UserId,
    /// Raw mode string; unrecognized values fail with `UnsupportedMode`.
    pub mode: String,
    pub target: Option<Point>,
    pub reason: Option<String>,
    /// When present, the snapped target must fall inside this rectangle.
    pub bounds: Option<MapBounds>,
}

/// The result of an accepted move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub previous: Option<Point>,
    pub position: Point,
    /// Traveled distance; zero for a first placement.
    pub distance: f64,
    pub first_placement: bool,
    pub mode: MoveMode,
}

pub struct PerformMove {
    movement: Arc<dyn MovementRepo>,
    campaigns: Arc<dyn CampaignRepo>,
    records: Arc<dyn CharacterRecordRepo>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn ClockPort>,
    settings: Arc<EngineSettings>,
}

impl PerformMove {
    pub fn new(
        movement: Arc<dyn MovementRepo>,
        campaigns: Arc<dyn CampaignRepo>,
        records: Arc<dyn CharacterRecordRepo>,
        locks: Arc<LockRegistry>,
        clock: Arc<dyn ClockPort>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        Self {
            movement,
            campaigns,
            records,
            locks,
            clock,
            settings,
        }
    }

    pub async fn execute(&self, request: MoveRequest) -> Result<MoveOutcome, MovementError> {
        // 1. Mode must be one this engine understands.
        let mode: MoveMode = request
            .mode
            .parse()
            .map_err(|_| MovementError::UnsupportedMode(request.mode.clone()))?;

        // 2. Target must be present and finite.
        let target = match request.target {
            Some(point) if point.is_finite() => point,
            _ => return Err(MovementError::InvalidTarget),
        };

        // 3. The actor must own the character or hold the DM role.
        let record = self
            .records
            .get(request.character_id)
            .await?
            .ok_or(MovementError::CharacterNotFound(request.character_id))?;
        if record.owner != request.moved_by {
            let role = self
                .campaigns
                .role_of(request.campaign_id, request.moved_by)
                .await?;
            if role != Some(CampaignRole::Dm) {
                return Err(MovementError::MoveForbidden {
                    actor: request.moved_by,
                    character: request.character_id,
                });
            }
        }

        // 4. Snap to the world grid, then clamp to the map if requested.
        let snapped = self.grid().snap(target);
        if let Some(bounds) = request.bounds {
            if !bounds.contains(snapped) {
                return Err(MovementError::TargetOutOfBounds { point: snapped });
            }
        }

        // 5. Locked read-modify-write on the mover's position row.
        let _lock = self
            .locks
            .acquire(LockKey::Position(request.campaign_id, request.character_id))
            .await;

        let previous = self
            .movement
            .get_position(request.campaign_id, request.character_id)
            .await?;
        let first_placement = previous.is_none();
        let previous_point = previous.as_ref().map(|p| p.point);
        // First placement measures from the target itself: distance zero.
        let effective_previous = previous_point.unwrap_or(snapped);
        let distance =
            GridConfig::distance(Some(effective_previous), Some(snapped)).unwrap_or(0.0);

        let now = self.clock.now();
        let position = PositionRecord {
            campaign_id: request.campaign_id,
            character_id: request.character_id,
            point: snapped,
            updated_at: now,
        };
        let audit = MoveAuditRow {
            campaign_id: request.campaign_id,
            character_id: request.character_id,
            previous_point,
            new_point: snapped,
            mode,
            moved_by: request.moved_by,
            reason: request.reason.clone(),
            at: now,
        };
        let path = PathSegment {
            campaign_id: request.campaign_id,
            character_id: request.character_id,
            start: effective_previous,
            start_at: previous.map(|p| p.updated_at).unwrap_or(now),
            end: snapped,
            end_at: now,
        };

        self.movement.put_move(&position, &audit, &path).await?;

        tracing::info!(
            campaign_id = %request.campaign_id,
            character_id = %request.character_id,
            mode = %mode,
            distance,
            first_placement,
            "Move accepted"
        );

        Ok(MoveOutcome {
            previous: previous_point,
            position: snapped,
            distance,
            first_placement,
            mode,
        })
    }

    fn grid(&self) -> &GridConfig {
        &self.settings.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{
        Abilities, CharacterRecord, MockCampaignRepo, MockCharacterRecordRepo, MockMovementRepo,
    };
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn record(id: CharacterId, owner: UserId) -> CharacterRecord {
        CharacterRecord {
            id,
            owner,
            name: "Bryn".to_string(),
            class: "rogue".to_string(),
            level: 2,
            hit_points: 15,
            xp: 300,
            abilities: Abilities::default(),
            spell_slots: BTreeMap::new(),
        }
    }

    fn perform_move(
        movement: MockMovementRepo,
        campaigns: MockCampaignRepo,
        records: MockCharacterRecordRepo,
    ) -> PerformMove {
        PerformMove::new(
            Arc::new(movement),
            Arc::new(campaigns),
            Arc::new(records),
            Arc::new(LockRegistry::new(Duration::from_secs(5))),
            Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2025, 6, 1, 20, 30, 0).single().expect("valid"),
            )),
            Arc::new(EngineSettings::default()),
        )
    }

    fn request(owner: UserId, character: CharacterId, target: Option<Point>) -> MoveRequest {
        MoveRequest {
            campaign_id: CampaignId::new(),
            character_id: character,
            moved_by: owner,
            mode: "walk".to_string(),
            target,
            reason: None,
            bounds: None,
        }
    }

    fn owned_records(owner: UserId, _character: CharacterId) -> MockCharacterRecordRepo {
        let mut records = MockCharacterRecordRepo::new();
        records
            .expect_get()
            .returning(move |id| Ok(Some(record(id, owner))));
        records
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected_before_any_read() {
        let owner = UserId::new();
        let character = CharacterId::new();
        let mut req = request(owner, character, Some(Point::new(1.0, 1.0)));
        req.mode = "burrow".to_string();

        let mover = perform_move(
            MockMovementRepo::new(),
            MockCampaignRepo::new(),
            MockCharacterRecordRepo::new(),
        );
        let err = mover.execute(req).await.expect_err("rejected");
        assert!(matches!(err, MovementError::UnsupportedMode(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn missing_or_non_finite_target_is_invalid() {
        let owner = UserId::new();
        let character = CharacterId::new();

        let mover = perform_move(
            MockMovementRepo::new(),
            MockCampaignRepo::new(),
            MockCharacterRecordRepo::new(),
        );

        let err = mover
            .execute(request(owner, character, None))
            .await
            .expect_err("rejected");
        assert!(matches!(err, MovementError::InvalidTarget));

        let err = mover
            .execute(request(owner, character, Some(Point::new(f64::NAN, 0.0))))
            .await
            .expect_err("rejected");
        assert!(matches!(err, MovementError::InvalidTarget));
    }

    #[tokio::test]
    async fn a_stranger_without_the_dm_role_is_forbidden() {
        let owner = UserId::new();
        let stranger = UserId::new();
        let character = CharacterId::new();

        let mut campaigns = MockCampaignRepo::new();
        campaigns
            .expect_role_of()
            .returning(|_, _| Ok(Some(CampaignRole::Player)));

        let mover = perform_move(
            MockMovementRepo::new(),
            campaigns,
            owned_records(owner, character),
        );
        let mut req = request(stranger, character, Some(Point::new(1.0, 1.0)));
        req.moved_by = stranger;

        let err = mover.execute(req).await.expect_err("rejected");
        assert!(matches!(err, MovementError::MoveForbidden { .. }));
    }

    #[tokio::test]
    async fn the_dm_may_move_any_token() {
        let owner = UserId::new();
        let dm = UserId::new();
        let character = CharacterId::new();

        let mut campaigns = MockCampaignRepo::new();
        campaigns
            .expect_role_of()
            .returning(|_, _| Ok(Some(CampaignRole::Dm)));

        let mut movement = MockMovementRepo::new();
        movement.expect_get_position().returning(|_, _| Ok(None));
        movement.expect_put_move().returning(|_, _, _| Ok(()));

        let mover = perform_move(movement, campaigns, owned_records(owner, character));
        let outcome = mover
            .execute(request(dm, character, Some(Point::new(7.0, 7.0))))
            .await
            .expect("accepted");
        assert!(outcome.first_placement);
    }

    #[tokio::test]
    async fn target_snaps_to_the_grid_and_measures_distance() {
        let owner = UserId::new();
        let character = CharacterId::new();

        let mut movement = MockMovementRepo::new();
        movement.expect_get_position().returning(move |c, ch| {
            Ok(Some(PositionRecord {
                campaign_id: c,
                character_id: ch,
                point: Point::new(0.0, 0.0),
                updated_at: Utc::now(),
            }))
        });
        movement.expect_put_move().returning(|position, audit, path| {
            assert_eq!(position.point, Point::new(5.0, 10.0));
            assert_eq!(audit.previous_point, Some(Point::new(0.0, 0.0)));
            assert_eq!(path.start, Point::new(0.0, 0.0));
            assert_eq!(path.end, Point::new(5.0, 10.0));
            Ok(())
        });

        let mover = perform_move(
            movement,
            MockCampaignRepo::new(),
            owned_records(owner, character),
        );
        // 6.2, 11.3 snaps to 5, 10 on the default 5-unit square grid.
        let outcome = mover
            .execute(request(owner, character, Some(Point::new(6.2, 11.3))))
            .await
            .expect("accepted");

        assert_eq!(outcome.position, Point::new(5.0, 10.0));
        assert!(!outcome.first_placement);
        assert!((outcome.distance - (125.0_f64).sqrt()).abs() < 1e-9);
    }

    #[tokio::test]
    async fn first_placement_reports_zero_distance() {
        let owner = UserId::new();
        let character = CharacterId::new();

        let mut movement = MockMovementRepo::new();
        movement.expect_get_position().returning(|_, _| Ok(None));
        movement.expect_put_move().returning(|_, audit, path| {
            // No prior position: the audit row records no previous point
            // and the path collapses to the target.
            assert_eq!(audit.previous_point, None);
            assert_eq!(path.start, path.end);
            Ok(())
        });

        let mover = perform_move(
            movement,
            MockCampaignRepo::new(),
            owned_records(owner, character),
        );
        let outcome = mover
            .execute(request(owner, character, Some(Point::new(12.0, 13.0))))
            .await
            .expect("accepted");

        assert!(outcome.first_placement);
        assert_eq!(outcome.distance, 0.0);
        assert_eq!(outcome.previous, None);
    }

    #[tokio::test]
    async fn out_of_bounds_snapped_target_is_rejected() {
        let owner = UserId::new();
        let character = CharacterId::new();

        let mover = perform_move(
            MockMovementRepo::new(),
            MockCampaignRepo::new(),
            owned_records(owner, character),
        );
        let mut req = request(owner, character, Some(Point::new(48.0, 0.0)));
        req.bounds = Some(MapBounds::new(-25.0, -25.0, 25.0, 25.0));

        let err = mover.execute(req).await.expect_err("rejected");
        match err {
            MovementError::TargetOutOfBounds { point } => {
                assert_eq!(point, Point::new(50.0, 0.0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bounds_are_checked_against_the_snapped_point_not_the_raw_target() {
        let owner = UserId::new();
        let character = CharacterId::new();

        let mut movement = MockMovementRepo::new();
        movement.expect_get_position().returning(|_, _| Ok(None));
        movement.expect_put_move().returning(|_, _, _| Ok(()));

        let mover = perform_move(
            movement,
            MockCampaignRepo::new(),
            owned_records(owner, character),
        );
        // Raw target 26.2 is outside, but it snaps back to 25.0 which is
        // on the boundary and therefore inside.
        let mut req = request(owner, character, Some(Point::new(26.2, 0.0)));
        req.bounds = Some(MapBounds::new(-25.0, -25.0, 25.0, 25.0));

        let outcome = mover.execute(req).await.expect("accepted");
        assert_eq!(outcome.position, Point::new(25.0, 0.0));
    }
}
