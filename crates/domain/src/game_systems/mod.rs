//! Game-system calculation rules.
//!
//! The session engine only needs the D&D 5e tables: XP thresholds,
//! ability modifiers, hit dice, and spell-slot progressions.

pub mod dnd5e;

pub use dnd5e::{
    ability_modifier, average_hit_die_gain, caster_type_for_class, hit_die_for_class,
    level_from_xp, spell_slots_for_class, xp_for_level, xp_for_next_level, CasterType, MAX_LEVEL,
};
