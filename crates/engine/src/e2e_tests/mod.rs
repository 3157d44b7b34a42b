//! End-to-end flows against an in-memory SQLite database.
//!
//! These exercise the real adapters: activation seeding, the session
//! state machine with its audit log, movement audit/path rows, outcome
//! application, rests, and end-of-session sync.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use dmforge_domain::{
    CampaignId, CharacterId, EncounterId, GamePhase, GameStateEvent, MapBounds, MechanicalOutcome,
    Participant, NpcId, Point, SessionId, UserId,
};

use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::locks::LockRegistry;
use crate::infrastructure::persistence::{
    Database, SqliteBattleStateRepo, SqliteCampaignRepo, SqliteCharacterRecordRepo,
    SqliteEncounterRepo, SqliteMovementRepo, SqliteSessionStateRepo,
};
use crate::infrastructure::ports::{
    Abilities, BattleStateRepo, CampaignMember, CampaignRole, CharacterRecord,
    CharacterRecordRepo, EscalationPort, SessionStateRepo,
};
use crate::infrastructure::settings::EngineSettings;
use crate::use_cases::combat::ApplyOutcome;
use crate::use_cases::movement::{MoveRequest, MovementError, PerformMove};
use crate::use_cases::rest::{CompleteLongRest, RestError, SpendHitDie};
use crate::use_cases::session::{
    ActivateSession, EndSession, SessionStateError, SessionStateMachine, TurnOrderBuilder,
};

/// Counts escalation boundary crossings.
#[derive(Default)]
struct CountingEscalation {
    zero_hp: AtomicUsize,
    revives: AtomicUsize,
}

#[async_trait]
impl EscalationPort for CountingEscalation {
    async fn on_zero_hp(&self, _: SessionId, _: CharacterId, _: i32, _: bool) {
        self.zero_hp.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_revive(&self, _: SessionId, _: CharacterId) {
        self.revives.fetch_add(1, Ordering::SeqCst);
    }
}

struct TestEngine {
    campaign_id: CampaignId,
    session_id: SessionId,
    dm: UserId,
    players: Vec<(UserId, CharacterId)>,
    campaigns: Arc<SqliteCampaignRepo>,
    encounters: Arc<SqliteEncounterRepo>,
    records: Arc<SqliteCharacterRecordRepo>,
    battle: Arc<SqliteBattleStateRepo>,
    movement: Arc<SqliteMovementRepo>,
    states: Arc<SqliteSessionStateRepo>,
    locks: Arc<LockRegistry>,
    settings: Arc<EngineSettings>,
    escalation: Arc<CountingEscalation>,
    machine: Arc<SessionStateMachine>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init()
        .ok();
}

impl TestEngine {
    /// In-memory engine with a DM and two player characters seeded.
    async fn bootstrap() -> anyhow::Result<Self> {
        init_tracing();
        let db = Database::connect_in_memory().await?;

        let campaigns = Arc::new(SqliteCampaignRepo::new(db.clone()));
        let encounters = Arc::new(SqliteEncounterRepo::new(db.clone()));
        let records = Arc::new(SqliteCharacterRecordRepo::new(db.clone()));
        let battle = Arc::new(SqliteBattleStateRepo::new(db.clone()));
        let movement = Arc::new(SqliteMovementRepo::new(db.clone()));
        let states = Arc::new(SqliteSessionStateRepo::new(db.clone()));

        let locks = Arc::new(LockRegistry::new(Duration::from_secs(5)));
        let settings = Arc::new(EngineSettings::default());
        let clock = Arc::new(SystemClock::new());
        let escalation = Arc::new(CountingEscalation::default());

        let machine = Arc::new(SessionStateMachine::new(
            states.clone(),
            Arc::new(TurnOrderBuilder::new(campaigns.clone(), encounters.clone())),
            locks.clone(),
            clock.clone(),
            settings.clone(),
        ));

        let campaign_id = CampaignId::new();
        let dm = UserId::new();
        let joined = Utc::now() - ChronoDuration::minutes(30);

        campaigns
            .upsert_member(
                campaign_id,
                &CampaignMember {
                    user_id: dm,
                    role: CampaignRole::Dm,
                    character_id: None,
                    joined_at: joined,
                },
            )
            .await?;

        let classes = ["fighter", "cleric"];
        let mut players = Vec::new();
        for (i, class) in classes.iter().enumerate() {
            let user_id = UserId::new();
            let character_id = CharacterId::new();
            records
                .upsert(&CharacterRecord {
                    id: character_id,
                    owner: user_id,
                    name: format!("PC {}", i + 1),
                    class: class.to_string(),
                    level: 3,
                    hit_points: 24,
                    xp: 900,
                    abilities: Abilities {
                        constitution: 14,
                        ..Abilities::default()
                    },
                    spell_slots: if *class == "cleric" {
                        BTreeMap::from([(1, 4), (2, 2)])
                    } else {
                        BTreeMap::new()
                    },
                })
                .await?;
            campaigns
                .upsert_member(
                    campaign_id,
                    &CampaignMember {
                        user_id,
                        role: CampaignRole::Player,
                        character_id: Some(character_id),
                        joined_at: joined + ChronoDuration::minutes(i as i64 + 1),
                    },
                )
                .await?;
            players.push((user_id, character_id));
        }

        Ok(Self {
            campaign_id,
            session_id: SessionId::new(),
            dm,
            players,
            campaigns,
            encounters,
            records,
            battle,
            movement,
            states,
            locks,
            settings,
            escalation,
            machine,
        })
    }

    async fn activate(&self) -> anyhow::Result<()> {
        let activate = ActivateSession::new(
            self.campaigns.clone(),
            self.records.clone(),
            self.battle.clone(),
            self.machine.clone(),
        );
        activate
            .execute(self.session_id, self.campaign_id, self.dm)
            .await?;
        Ok(())
    }

    fn clock(&self) -> Arc<SystemClock> {
        Arc::new(SystemClock::new())
    }

    fn apply_outcome(&self) -> ApplyOutcome {
        ApplyOutcome::new(
            self.battle.clone(),
            self.states.clone(),
            self.escalation.clone(),
            self.locks.clone(),
            self.clock(),
        )
    }

    fn perform_move(&self) -> PerformMove {
        PerformMove::new(
            self.movement.clone(),
            self.campaigns.clone(),
            self.records.clone(),
            self.locks.clone(),
            self.clock(),
            self.settings.clone(),
        )
    }
}

#[tokio::test]
async fn full_session_flow_keeps_state_and_log_in_step() -> anyhow::Result<()> {
    let engine = TestEngine::bootstrap().await?;
    engine.activate().await?;

    // Activation: exploration round-robin over the two players.
    let state = engine
        .states
        .get(engine.session_id)
        .await?
        .expect("state exists");
    assert_eq!(state.phase, GamePhase::Exploration);
    assert_eq!(state.turn_order.len(), 2);
    assert_eq!(
        state.active_participant,
        Some(Participant::Player(engine.players[0].0))
    );

    // Combat with an initiative-ordered encounter.
    let encounter_id = EncounterId::new();
    let goblin = Participant::NonPlayer(NpcId::new());
    engine
        .encounters
        .add_participant(encounter_id, goblin, 18)
        .await?;
    engine
        .encounters
        .add_participant(
            encounter_id,
            Participant::Player(engine.players[0].0),
            12,
        )
        .await?;

    let state = engine
        .machine
        .change_phase(engine.session_id, "combat", Some(encounter_id), engine.dm)
        .await?;
    assert_eq!(state.phase, GamePhase::Combat);
    assert_eq!(state.active_participant, Some(goblin));
    // The goblin leads, so no player budget yet.
    assert!(state.combat_turn_budget.is_none());

    // A full round: two end-turns wrap back to the goblin.
    let state = engine.machine.end_turn(engine.session_id, engine.dm).await?;
    assert!(state.combat_turn_budget.is_some());
    assert_eq!(state.round_number, 1);

    let state = engine.machine.end_turn(engine.session_id, engine.dm).await?;
    assert_eq!(state.round_number, 2);
    assert!(state.world_turn_pending);

    let state = engine
        .machine
        .execute_world_turn(engine.session_id, engine.dm)
        .await?;
    assert!(!state.world_turn_pending);
    assert_eq!(state.active_participant, Some(goblin));

    // A second world turn without a new wrap is a conflict.
    let err = engine
        .machine
        .execute_world_turn(engine.session_id, engine.dm)
        .await
        .expect_err("no pending world turn");
    assert!(matches!(err, SessionStateError::NoWorldTurnPending));

    // The audit log tracked every mutation, oldest first.
    let log = engine.states.log_entries(engine.session_id).await?;
    let events: Vec<GameStateEvent> = log.iter().map(|e| e.event).collect();
    assert_eq!(
        events,
        vec![
            GameStateEvent::Initialized,
            GameStateEvent::PhaseChanged,
            GameStateEvent::TurnEnded,
            GameStateEvent::TurnEnded,
            GameStateEvent::WorldTurnExecuted,
        ]
    );
    // Snapshots line up: each entry's new state is the next's previous.
    for pair in log.windows(2) {
        assert_eq!(Some(&pair[0].new_state), pair[1].previous_state.as_ref());
    }

    Ok(())
}

#[tokio::test]
async fn movement_produces_audit_and_path_rows() -> anyhow::Result<()> {
    let engine = TestEngine::bootstrap().await?;
    let (owner, character) = engine.players[0];
    let mover = engine.perform_move();

    // First placement.
    let outcome = mover
        .execute(MoveRequest {
            campaign_id: engine.campaign_id,
            character_id: character,
            moved_by: owner,
            mode: "walk".to_string(),
            target: Some(Point::new(7.3, 12.6)),
            reason: Some("entering the valley".to_string()),
            bounds: None,
        })
        .await?;
    assert!(outcome.first_placement);
    assert_eq!(outcome.position, Point::new(5.0, 15.0));
    assert_eq!(outcome.distance, 0.0);

    // Second move measures from the stored position.
    let outcome = mover
        .execute(MoveRequest {
            campaign_id: engine.campaign_id,
            character_id: character,
            moved_by: owner,
            mode: "walk".to_string(),
            target: Some(Point::new(20.1, 15.2)),
            reason: None,
            bounds: None,
        })
        .await?;
    assert!(!outcome.first_placement);
    assert_eq!(outcome.previous, Some(Point::new(5.0, 15.0)));
    assert_eq!(outcome.position, Point::new(20.0, 15.0));
    assert!((outcome.distance - 15.0).abs() < 1e-9);

    assert_eq!(
        engine
            .movement
            .audit_count(engine.campaign_id, character)
            .await?,
        2
    );
    assert_eq!(
        engine
            .movement
            .path_count(engine.campaign_id, character)
            .await?,
        2
    );

    // Out-of-bounds target: rejected, nothing written.
    let err = mover
        .execute(MoveRequest {
            campaign_id: engine.campaign_id,
            character_id: character,
            moved_by: owner,
            mode: "walk".to_string(),
            target: Some(Point::new(500.0, 0.0)),
            reason: None,
            bounds: Some(MapBounds::new(-100.0, -100.0, 100.0, 100.0)),
        })
        .await
        .expect_err("out of bounds");
    assert!(matches!(err, MovementError::TargetOutOfBounds { .. }));
    assert_eq!(
        engine
            .movement
            .audit_count(engine.campaign_id, character)
            .await?,
        2
    );

    Ok(())
}

#[tokio::test]
async fn damage_rest_and_sync_round_trip() -> anyhow::Result<()> {
    let engine = TestEngine::bootstrap().await?;
    engine.activate().await?;

    let (_, fighter) = engine.players[0];
    let (_, cleric) = engine.players[1];
    let applier = engine.apply_outcome();

    // Burn a cleric slot, then knock the fighter down.
    applier
        .execute(
            engine.session_id,
            cleric,
            MechanicalOutcome::SpellSlotUse { level: 1 },
            engine.dm,
        )
        .await?;

    let applied = applier
        .execute(
            engine.session_id,
            fighter,
            MechanicalOutcome::Damage {
                amount: 30,
                critical: true,
            },
            engine.dm,
        )
        .await?;
    assert_eq!(applied.state.hp_current, 0);
    assert_eq!(engine.escalation.zero_hp.load(Ordering::SeqCst), 1);

    // Healing brings the fighter back up (no unconscious condition was
    // added by the stub escalation, so no revive fires).
    let applied = applier
        .execute(
            engine.session_id,
            fighter,
            MechanicalOutcome::Healing { amount: 9 },
            engine.dm,
        )
        .await?;
    assert_eq!(applied.state.hp_current, 9);
    assert_eq!(engine.escalation.revives.load(Ordering::SeqCst), 0);

    // Short rest: spend a hit die.
    let spend = SpendHitDie::new(
        engine.battle.clone(),
        engine.records.clone(),
        engine.locks.clone(),
        engine.clock(),
        Arc::new(crate::infrastructure::clock::SystemRandom::new()),
    );
    let result = spend.execute(engine.session_id, fighter, engine.dm).await?;
    assert!(result.rolled >= 1 && result.rolled <= 10);
    assert_eq!(result.state.hit_dice.remaining, 2);
    assert!(result.state.hp_current > 9);

    // Spend the remaining dice, then the well is dry.
    spend.execute(engine.session_id, fighter, engine.dm).await?;
    spend.execute(engine.session_id, fighter, engine.dm).await?;
    let err = spend
        .execute(engine.session_id, fighter, engine.dm)
        .await
        .expect_err("no dice left");
    assert!(matches!(err, RestError::NoHitDiceRemaining));

    // Long rest resets everyone.
    let rest = CompleteLongRest::new(engine.battle.clone(), engine.locks.clone(), engine.clock());
    let restored = rest.execute(engine.session_id, engine.dm).await?;
    assert_eq!(restored.len(), 2);
    for state in &restored {
        assert_eq!(state.hp_current, state.hp_max);
        assert_eq!(state.hp_temp, 0);
        assert!(state.spell_slots.values().all(|slot| slot.used == 0));
        assert!(state.concentration.is_none());
    }

    // The change logs grew once per mutation and survived storage.
    let fighter_state = engine
        .battle
        .get(engine.session_id, fighter)
        .await?
        .expect("state exists");
    // damage, healing, three hit dice, long rest.
    assert_eq!(fighter_state.change_log.len(), 6);

    // End-of-session sync pushes HP back into the permanent record.
    let end = EndSession::new(engine.battle.clone(), engine.records.clone(), engine.locks.clone());
    let synced = end.execute(engine.session_id).await?;
    assert_eq!(synced, 2);

    let record = engine.records.get(fighter).await?.expect("record exists");
    assert_eq!(record.hit_points, 24);

    Ok(())
}
