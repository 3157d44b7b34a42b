//! Live battle-state mutation: the patch operation and the mechanical
//! outcome applier.

mod apply_outcome;
mod patch_state;

pub use apply_outcome::{AppliedOutcome, ApplyOutcome};
pub use patch_state::{BattleStateError, PatchBattleState};
