//! D&D 5th Edition calculation rules.
//!
//! Leveling thresholds, ability modifiers, hit dice, and spell-slot
//! progression tables consumed by the leveling resolver and session
//! activation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum character level.
pub const MAX_LEVEL: u8 = 20;

/// XP thresholds for each level in D&D 5e.
/// Index is level - 1 (so level 1 = index 0).
const XP_THRESHOLDS: [i64; 20] = [
    0,      // Level 1
    300,    // Level 2
    900,    // Level 3
    2700,   // Level 4
    6500,   // Level 5
    14000,  // Level 6
    23000,  // Level 7
    34000,  // Level 8
    48000,  // Level 9
    64000,  // Level 10
    85000,  // Level 11
    100000, // Level 12
    120000, // Level 13
    140000, // Level 14
    165000, // Level 15
    195000, // Level 16
    225000, // Level 17
    265000, // Level 18
    305000, // Level 19
    355000, // Level 20
];

/// Get XP required for a given level.
pub fn xp_for_level(level: u8) -> i64 {
    if level == 0 || level > MAX_LEVEL {
        return 0;
    }
    XP_THRESHOLDS[(level - 1) as usize]
}

/// Get XP required for the next level.
pub fn xp_for_next_level(current_level: u8) -> i64 {
    if current_level >= MAX_LEVEL {
        return XP_THRESHOLDS[19];
    }
    XP_THRESHOLDS[current_level as usize]
}

/// Calculate level from accumulated XP.
pub fn level_from_xp(xp: i64) -> u8 {
    for (i, &threshold) in XP_THRESHOLDS.iter().enumerate().rev() {
        if xp >= threshold {
            return (i + 1) as u8;
        }
    }
    1
}

/// Ability modifier: floor((score - 10) / 2).
///
/// D&D uses floor division; Rust's `/` rounds toward zero, so negative
/// differences need the adjustment.
pub fn ability_modifier(score: i32) -> i32 {
    let diff = score - 10;
    if diff >= 0 {
        diff / 2
    } else {
        (diff - 1) / 2
    }
}

/// Average hit-point gain per level for a hit die: ceil(die/2) + 1, plus
/// the Constitution modifier, never below 1.
pub fn average_hit_die_gain(die: u8, con_modifier: i32) -> i32 {
    ((die as i32 + 1) / 2 + 1 + con_modifier).max(1)
}

/// Spellcasting progression category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CasterType {
    Full,
    Half,
    Third,
    Pact,
}

/// Which progression a class follows, if it casts at all.
pub fn caster_type_for_class(class: &str) -> Option<CasterType> {
    match class.to_lowercase().as_str() {
        "bard" | "cleric" | "druid" | "sorcerer" | "wizard" => Some(CasterType::Full),
        "paladin" | "ranger" => Some(CasterType::Half),
        "eldritch knight" | "arcane trickster" => Some(CasterType::Third),
        "warlock" => Some(CasterType::Pact),
        _ => None,
    }
}

/// Hit die size per class.
pub fn hit_die_for_class(class: &str) -> u8 {
    match class.to_lowercase().as_str() {
        "sorcerer" | "wizard" => 6,
        "barbarian" => 12,
        "fighter" | "paladin" | "ranger" => 10,
        _ => 8,
    }
}

/// Spell-slot table (slot level -> max slots) for a class at a level.
/// Empty for non-casters.
pub fn spell_slots_for_class(class: &str, level: u8) -> BTreeMap<u8, u8> {
    match caster_type_for_class(class) {
        Some(CasterType::Full) => full_caster_slots(level),
        Some(CasterType::Half) => half_caster_slots(level),
        Some(CasterType::Third) => third_caster_slots(level),
        Some(CasterType::Pact) => warlock_slots(level),
        None => BTreeMap::new(),
    }
}

fn slots_from_table(table: &[(u8, &[u8])], level: u8) -> BTreeMap<u8, u8> {
    table
        .iter()
        .rev()
        .find(|(min_level, _)| level >= *min_level)
        .map(|(_, counts)| {
            counts
                .iter()
                .enumerate()
                .map(|(i, &count)| ((i + 1) as u8, count))
                .filter(|(_, count)| *count > 0)
                .collect()
        })
        .unwrap_or_default()
}

fn full_caster_slots(level: u8) -> BTreeMap<u8, u8> {
    let table: &[(u8, &[u8])] = &[
        (1, &[2]),
        (2, &[3]),
        (3, &[4, 2]),
        (4, &[4, 3]),
        (5, &[4, 3, 2]),
        (6, &[4, 3, 3]),
        (7, &[4, 3, 3, 1]),
        (8, &[4, 3, 3, 2]),
        (9, &[4, 3, 3, 3, 1]),
        (10, &[4, 3, 3, 3, 2]),
        (11, &[4, 3, 3, 3, 2, 1]),
        (13, &[4, 3, 3, 3, 2, 1, 1]),
        (15, &[4, 3, 3, 3, 2, 1, 1, 1]),
        (17, &[4, 3, 3, 3, 2, 1, 1, 1, 1]),
        (18, &[4, 3, 3, 3, 3, 1, 1, 1, 1]),
        (19, &[4, 3, 3, 3, 3, 2, 1, 1, 1]),
        (20, &[4, 3, 3, 3, 3, 2, 2, 1, 1]),
    ];
    slots_from_table(table, level)
}

fn half_caster_slots(level: u8) -> BTreeMap<u8, u8> {
    // Half casters start casting at level 2 and progress at half rate.
    let table: &[(u8, &[u8])] = &[
        (2, &[2]),
        (3, &[3]),
        (5, &[4, 2]),
        (7, &[4, 3]),
        (9, &[4, 3, 2]),
        (11, &[4, 3, 3]),
        (13, &[4, 3, 3, 1]),
        (15, &[4, 3, 3, 2]),
        (17, &[4, 3, 3, 3, 1]),
        (19, &[4, 3, 3, 3, 2]),
    ];
    slots_from_table(table, level)
}

fn third_caster_slots(level: u8) -> BTreeMap<u8, u8> {
    // Third casters (Eldritch Knight, Arcane Trickster) start at level 3.
    let table: &[(u8, &[u8])] = &[
        (3, &[2]),
        (4, &[3]),
        (7, &[4, 2]),
        (10, &[4, 3]),
        (13, &[4, 3, 2]),
        (16, &[4, 3, 3]),
        (19, &[4, 3, 3, 1]),
    ];
    slots_from_table(table, level)
}

fn warlock_slots(level: u8) -> BTreeMap<u8, u8> {
    // Pact magic: few slots, all at the same (highest available) level.
    let (count, slot_level) = match level {
        0 => (0, 0),
        1 => (1, 1),
        2 => (2, 1),
        3..=4 => (2, 2),
        5..=6 => (2, 3),
        7..=8 => (2, 4),
        9..=10 => (2, 5),
        11..=16 => (3, 5),
        _ => (4, 5),
    };

    let mut slots = BTreeMap::new();
    if count > 0 {
        slots.insert(slot_level, count);
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xp_thresholds_are_strictly_increasing() {
        for level in 1..MAX_LEVEL {
            assert!(
                xp_for_level(level) < xp_for_level(level + 1),
                "level {} threshold not increasing",
                level
            );
        }
    }

    #[test]
    fn level_from_xp_matches_the_table() {
        assert_eq!(level_from_xp(0), 1);
        assert_eq!(level_from_xp(299), 1);
        assert_eq!(level_from_xp(300), 2);
        assert_eq!(level_from_xp(6500), 5);
        assert_eq!(level_from_xp(354_999), 19);
        assert_eq!(level_from_xp(355_000), 20);
        assert_eq!(level_from_xp(9_999_999), 20);
    }

    #[test]
    fn xp_for_next_level_caps_at_twenty() {
        assert_eq!(xp_for_next_level(1), 300);
        assert_eq!(xp_for_next_level(19), 355_000);
        assert_eq!(xp_for_next_level(20), 355_000);
    }

    #[test]
    fn ability_modifier_uses_floor_division() {
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(15), 2);
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(9), -1);
        assert_eq!(ability_modifier(7), -2);
        assert_eq!(ability_modifier(20), 5);
        assert_eq!(ability_modifier(3), -4);
    }

    #[test]
    fn average_hit_die_gain_is_floored_at_one() {
        assert_eq!(average_hit_die_gain(8, 2), 7);
        assert_eq!(average_hit_die_gain(6, 0), 4);
        assert_eq!(average_hit_die_gain(12, -3), 4);
        assert_eq!(average_hit_die_gain(6, -5), 1);
    }

    #[test]
    fn full_caster_slots_match_known_rows() {
        let level_1 = spell_slots_for_class("wizard", 1);
        assert_eq!(level_1.get(&1), Some(&2));
        assert_eq!(level_1.len(), 1);

        let level_5 = spell_slots_for_class("cleric", 5);
        assert_eq!(level_5.get(&1), Some(&4));
        assert_eq!(level_5.get(&2), Some(&3));
        assert_eq!(level_5.get(&3), Some(&2));

        let level_20 = spell_slots_for_class("druid", 20);
        assert_eq!(level_20.get(&9), Some(&1));
        assert_eq!(level_20.get(&6), Some(&2));
    }

    #[test]
    fn half_casters_get_no_slots_at_level_one() {
        assert!(spell_slots_for_class("paladin", 1).is_empty());
        let level_5 = spell_slots_for_class("ranger", 5);
        assert_eq!(level_5.get(&1), Some(&4));
        assert_eq!(level_5.get(&2), Some(&2));
    }

    #[test]
    fn warlock_slots_collapse_to_the_pact_level() {
        let level_5 = spell_slots_for_class("warlock", 5);
        assert_eq!(level_5.get(&3), Some(&2));
        assert_eq!(level_5.len(), 1);

        let level_17 = spell_slots_for_class("warlock", 17);
        assert_eq!(level_17.get(&5), Some(&4));
    }

    #[test]
    fn non_casters_have_no_slots() {
        assert!(spell_slots_for_class("fighter", 10).is_empty());
        assert!(caster_type_for_class("monk").is_none());
    }

    #[test]
    fn hit_dice_per_class() {
        assert_eq!(hit_die_for_class("wizard"), 6);
        assert_eq!(hit_die_for_class("rogue"), 8);
        assert_eq!(hit_die_for_class("fighter"), 10);
        assert_eq!(hit_die_for_class("barbarian"), 12);
    }
}
