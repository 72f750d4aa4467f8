//! Stateless combat mathematics.
//!
//! The full attack sequence is hit → wound → save → damage allocation.
//! [`resolve_attacks_until_wounds`] runs the first two steps and halts:
//! that halt is the concurrency handoff where control passes to the
//! defending player, who resolves saves with [`roll_saves_batch`] and
//! takes the damage through [`apply_save_damage`]. Mortal-wound weapons
//! skip the save step entirely.
//!
//! Nothing here touches `GameState`; these functions read units and
//! produce diffs plus roll records for the phase layer to apply.

use serde::{Deserialize, Serialize};

use super::rolls::{roll_against, RerollPolicy, RollPurpose, RollRecord};
use crate::core::rng::DiceSource;
use crate::error::EngineResult;
use crate::state::diff::Diff;
use crate::state::unit::{Damage, Unit, UnitStatus, Weapon};

/// Required wound roll from the strength-vs-toughness comparison.
#[must_use]
pub fn wound_target(strength: u8, toughness: u8) -> u8 {
    if strength >= toughness.saturating_mul(2) {
        2
    } else if strength > toughness {
        3
    } else if strength == toughness {
        4
    } else if strength.saturating_mul(2) <= toughness {
        6
    } else {
        5
    }
}

/// Required save after armour penetration, taking the better of armour
/// and invulnerable saves. Clamped to [2, 7]; 7 means automatic failure.
///
/// AP is the conventional non-positive modifier, so `base - ap` worsens
/// the armour save. The invulnerable save is never modified by AP.
#[must_use]
pub fn save_target(base: u8, ap: i8, invuln: Option<u8>) -> u8 {
    let armour = base as i16 - ap as i16;
    let best = match invuln {
        Some(inv) => armour.min(inv as i16),
        None => armour,
    };
    best.clamp(2, 7) as u8
}

/// Roll hits for `attacks` attacks with a weapon's modifiers.
///
/// Auto-hit weapons produce a record of automatic successes without
/// drawing any dice.
pub fn roll_hits(
    dice: &mut dyn DiceSource,
    attacks: u32,
    skill: u8,
    weapon: &Weapon,
) -> EngineResult<RollRecord> {
    if weapon.auto_hit {
        return Ok(RollRecord::auto_passes(RollPurpose::Hit, attacks));
    }
    roll_against(
        dice,
        RollPurpose::Hit,
        attacks,
        skill,
        weapon.hit_modifier,
        weapon.reroll,
    )
}

/// Roll wounds for `hits` successful hits.
pub fn roll_wounds(
    dice: &mut dyn DiceSource,
    hits: u32,
    strength: u8,
    toughness: u8,
) -> EngineResult<RollRecord> {
    roll_against(
        dice,
        RollPurpose::Wound,
        hits,
        wound_target(strength, toughness),
        0,
        RerollPolicy::None,
    )
}

/// Roll the defender's saves for a batch of wounds in one draw.
pub fn roll_saves_batch(
    dice: &mut dyn DiceSource,
    wounds: u32,
    base_save: u8,
    ap: i8,
    invuln: Option<u8>,
) -> EngineResult<RollRecord> {
    roll_against(
        dice,
        RollPurpose::Save,
        wounds,
        save_target(base_save, ap, invuln),
        0,
        RerollPolicy::None,
    )
}

/// The attack sequence, halted before the save step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackPause {
    /// Unsaved-so-far wounds awaiting the defender's saves.
    pub wounds: u32,
    /// Hit and wound records, in roll order.
    pub records: Vec<RollRecord>,
}

/// Resolve hit and wound rolls for a unit's weapon against a defender,
/// then halt before saves. Attacks scale with the firing unit's alive
/// models.
pub fn resolve_attacks_until_wounds(
    dice: &mut dyn DiceSource,
    attacker: &Unit,
    weapon: &Weapon,
    defender: &Unit,
) -> EngineResult<AttackPause> {
    let attacks = attacker.total_attacks(weapon);
    let hits = roll_hits(dice, attacks, attacker.stats.skill, weapon)?;
    let wounds = roll_wounds(
        dice,
        hits.passes,
        weapon.wound_strength(&attacker.stats),
        defender.stats.toughness,
    )?;

    let pending = wounds.passes;
    Ok(AttackPause {
        wounds: pending,
        records: vec![hits, wounds],
    })
}

/// Roll one damage value per wound event. Variable damage is rolled once
/// per event, never once per model; fixed damage draws nothing.
pub fn damage_rolls(
    dice: &mut dyn DiceSource,
    damage: Damage,
    events: u32,
) -> EngineResult<(Vec<u32>, Vec<RollRecord>)> {
    let mut values = Vec::with_capacity(events as usize);
    let mut records = Vec::new();

    for _ in 0..events {
        match damage {
            Damage::Fixed(n) => values.push(n),
            Damage::D3 => {
                let roll = dice.roll_d6(1)?[0];
                values.push((roll as u32 + 1) / 2);
                records.push(RollRecord::values(RollPurpose::Damage, &[roll]));
            }
            Damage::D6 => {
                let roll = dice.roll_d6(1)?[0];
                values.push(roll as u32);
                records.push(RollRecord::values(RollPurpose::Damage, &[roll]));
            }
        }
    }

    Ok((values, records))
}

/// Pick the next model to take a wound: wounded alive models first, in
/// ascending remaining-wounds order, then the first unwounded alive
/// model.
fn allocation_target(models: &[(usize, u32, u32)]) -> Option<usize> {
    models
        .iter()
        .filter(|(_, wounds, _)| *wounds > 0)
        .min_by_key(|(index, wounds, max)| (wounds >= max, *wounds, *index))
        .map(|(index, _, _)| *index)
}

/// Allocate a sequence of wound events to a unit's models.
///
/// Each event's damage is capped at the target model's current wounds and
/// never spills over to a different model. A model is removed from play
/// the instant its wounds reach zero. Emits a destroy diff when the last
/// model falls.
#[must_use]
pub fn auto_allocate_wounds(unit: &Unit, damages: &[u32]) -> Vec<Diff> {
    // Working copy: (model index, current wounds, max wounds) for alive
    // models, updated as events land.
    let mut working: Vec<(usize, u32, u32)> = unit
        .models
        .iter()
        .enumerate()
        .filter(|(_, m)| m.alive)
        .map(|(i, m)| (i, m.wounds, m.max_wounds))
        .collect();

    let mut diffs = Vec::new();

    for &damage in damages {
        let Some(index) = allocation_target(&working) else {
            break;
        };
        let Some(entry) = working.iter_mut().find(|(i, _, _)| *i == index) else {
            break;
        };

        let dealt = damage.min(entry.1);
        entry.1 -= dealt;

        if entry.1 == 0 {
            diffs.push(Diff::ModelSlain {
                unit: unit.id.clone(),
                model: index,
            });
        } else {
            diffs.push(Diff::ModelWounds {
                unit: unit.id.clone(),
                model: index,
                wounds: entry.1,
            });
        }
    }

    if working.iter().all(|(_, wounds, _)| *wounds == 0) && !working.is_empty() {
        diffs.push(Diff::UnitStatus {
            unit: unit.id.clone(),
            status: UnitStatus::Destroyed,
        });
    }

    diffs
}

/// Turn a count of failed saves into allocated damage: roll variable
/// damage per event, then allocate wounded-models-first.
pub fn apply_save_damage(
    dice: &mut dyn DiceSource,
    defender: &Unit,
    failed_saves: u32,
    damage: Damage,
) -> EngineResult<(Vec<Diff>, Vec<RollRecord>)> {
    let (values, records) = damage_rolls(dice, damage, failed_saves)?;
    Ok((auto_allocate_wounds(defender, &values), records))
}

/// Remove `count` whole models from a unit (morale attrition). Uses the
/// same wounded-first ordering as wound allocation so removal is
/// deterministic.
#[must_use]
pub fn remove_fleeing_models(unit: &Unit, count: u32) -> Vec<Diff> {
    let mut working: Vec<(usize, u32, u32)> = unit
        .models
        .iter()
        .enumerate()
        .filter(|(_, m)| m.alive)
        .map(|(i, m)| (i, m.wounds, m.max_wounds))
        .collect();

    let mut diffs = Vec::new();
    for _ in 0..count {
        let Some(index) = allocation_target(&working) else {
            break;
        };
        working.retain(|(i, _, _)| *i != index);
        diffs.push(Diff::ModelSlain {
            unit: unit.id.clone(),
            model: index,
        });
    }

    if working.is_empty() && !diffs.is_empty() {
        diffs.push(Diff::UnitStatus {
            unit: unit.id.clone(),
            status: UnitStatus::Destroyed,
        });
    }

    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::player::PlayerId;
    use crate::core::rng::ScriptedDice;
    use crate::state::unit::{StatBlock, UnitId, WeaponStrength};

    fn stats(toughness: u8, wounds: u32) -> StatBlock {
        StatBlock {
            movement: 6.0,
            skill: 3,
            strength: 4,
            toughness,
            save: 3,
            invuln: None,
            wounds,
            leadership: 7,
            objective_control: 2,
        }
    }

    fn unit(models: usize, toughness: u8, wounds: u32) -> Unit {
        Unit::new(UnitId::new("target"), "Target", PlayerId::new(1), stats(toughness, wounds))
            .with_models(models)
    }

    #[test]
    fn test_wound_table() {
        assert_eq!(wound_target(8, 4), 2); // S >= 2T
        assert_eq!(wound_target(5, 4), 3); // S > T
        assert_eq!(wound_target(4, 4), 4); // S == T
        assert_eq!(wound_target(3, 4), 5); // S < T
        assert_eq!(wound_target(3, 6), 6); // S <= T/2
        assert_eq!(wound_target(2, 8), 6);
    }

    #[test]
    fn test_save_target_armour_only() {
        assert_eq!(save_target(3, 0, None), 3);
        assert_eq!(save_target(3, -2, None), 5);
        assert_eq!(save_target(6, -3, None), 7); // clamped: auto-fail
        assert_eq!(save_target(2, 1, None), 2); // clamped low
    }

    #[test]
    fn test_save_target_invuln() {
        // Invuln better than the degraded armour save.
        assert_eq!(save_target(3, -3, Some(4)), 4);
        // Armour still better than the invuln.
        assert_eq!(save_target(2, -1, Some(5)), 3);
        // Invuln is never modified by AP.
        assert_eq!(save_target(6, -6, Some(6)), 6);
    }

    #[test]
    fn test_roll_hits_auto_hit() {
        let weapon = Weapon::ranged("flamer", 12.0, 1, 4, 0, Damage::Fixed(1)).with_auto_hit();
        let mut dice = ScriptedDice::from_rolls(&[]);

        let record = roll_hits(&mut dice, 5, 3, &weapon).unwrap();
        assert_eq!(record.passes, 5);
        assert!(record.raw.is_empty());
    }

    #[test]
    fn test_attack_sequence_scenario() {
        // 5 attacks hitting on 3+ with [3,6,2,5,4], wounding on 4+ with
        // [4,6,3,5], saved on 5+ with [2,5,4]: 2 failed saves get through.
        let attacker = unit(5, 4, 1);
        let defender = unit(5, 4, 1);
        let weapon = Weapon::ranged("rifle", 24.0, 1, 4, 0, Damage::Fixed(1));

        let mut dice = ScriptedDice::from_rolls(&[3, 6, 2, 5, 4, 4, 6, 3, 5]);
        let pause = resolve_attacks_until_wounds(&mut dice, &attacker, &weapon, &defender).unwrap();

        assert_eq!(pause.records[0].passes, 4);
        assert_eq!(pause.records[1].passes, 3);
        assert_eq!(pause.wounds, 3);
        assert_eq!(dice.remaining(), 0);

        let mut dice = ScriptedDice::from_rolls(&[2, 5, 4]);
        let saves = roll_saves_batch(&mut dice, pause.wounds, 4, -1, None).unwrap();
        assert_eq!(saves.target, 5);
        assert_eq!(saves.passes, 1);
        assert_eq!(saves.fails, 2);
    }

    #[test]
    fn test_melee_user_strength_feeds_wound_roll() {
        // Wielder S4 with a +2 weapon against T4: S6 > T4 wounds on 3+.
        let attacker = unit(2, 4, 1);
        let defender = unit(3, 4, 1);
        let axe = Weapon::melee("axe", 1, WeaponStrength::User(2), 0, Damage::Fixed(1));

        // Hits at 3+ [3,4] -> 2; wounds at 3+ [3,2] -> 1.
        let mut dice = ScriptedDice::from_rolls(&[3, 4, 3, 2]);
        let pause = resolve_attacks_until_wounds(&mut dice, &attacker, &axe, &defender).unwrap();

        assert_eq!(pause.records[1].target, 3);
        assert_eq!(pause.wounds, 1);
    }

    #[test]
    fn test_allocation_wounded_first() {
        let mut defender = unit(3, 4, 3);
        defender.models[2].wounds = 1;

        let diffs = auto_allocate_wounds(&defender, &[1, 1]);

        // First event finishes the already-wounded model 2, second starts
        // on a fresh model.
        assert_eq!(
            diffs,
            vec![
                Diff::ModelSlain {
                    unit: defender.id.clone(),
                    model: 2,
                },
                Diff::ModelWounds {
                    unit: defender.id.clone(),
                    model: 0,
                    wounds: 2,
                },
            ]
        );
    }

    #[test]
    fn test_allocation_no_spillover() {
        // Damage 6 against 2-wound models: capped per event, one model
        // per event.
        let defender = unit(3, 4, 2);
        let diffs = auto_allocate_wounds(&defender, &[6, 6]);

        assert_eq!(
            diffs,
            vec![
                Diff::ModelSlain {
                    unit: defender.id.clone(),
                    model: 0,
                },
                Diff::ModelSlain {
                    unit: defender.id.clone(),
                    model: 1,
                },
            ]
        );
    }

    #[test]
    fn test_allocation_destroys_unit() {
        let defender = unit(2, 4, 1);
        let diffs = auto_allocate_wounds(&defender, &[1, 1]);

        assert_eq!(diffs.len(), 3);
        assert_eq!(
            diffs[2],
            Diff::UnitStatus {
                unit: defender.id.clone(),
                status: UnitStatus::Destroyed,
            }
        );
    }

    #[test]
    fn test_allocation_excess_events_ignored() {
        let defender = unit(1, 4, 1);
        let diffs = auto_allocate_wounds(&defender, &[1, 1, 1]);

        // One model, three events: one slain diff plus destruction.
        assert_eq!(diffs.len(), 2);
    }

    #[test]
    fn test_damage_rolls_variable_once_per_event() {
        let mut dice = ScriptedDice::from_rolls(&[4, 2]);
        let (values, records) = damage_rolls(&mut dice, Damage::D6, 2).unwrap();

        assert_eq!(values, vec![4, 2]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].purpose, RollPurpose::Damage);
    }

    #[test]
    fn test_damage_rolls_d3_mapping() {
        let mut dice = ScriptedDice::from_rolls(&[1, 2, 3, 4, 5, 6]);
        let (values, _) = damage_rolls(&mut dice, Damage::D3, 6).unwrap();
        assert_eq!(values, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_damage_rolls_fixed_draws_nothing() {
        let mut dice = ScriptedDice::from_rolls(&[]);
        let (values, records) = damage_rolls(&mut dice, Damage::Fixed(2), 3).unwrap();
        assert_eq!(values, vec![2, 2, 2]);
        assert!(records.is_empty());
    }

    #[test]
    fn test_apply_save_damage() {
        let defender = unit(3, 4, 2);
        let mut dice = ScriptedDice::from_rolls(&[]);

        let (diffs, records) =
            apply_save_damage(&mut dice, &defender, 2, Damage::Fixed(1)).unwrap();

        assert!(records.is_empty());
        assert_eq!(
            diffs,
            vec![
                Diff::ModelWounds {
                    unit: defender.id.clone(),
                    model: 0,
                    wounds: 1,
                },
                Diff::ModelSlain {
                    unit: defender.id.clone(),
                    model: 0,
                },
            ]
        );
    }

    #[test]
    fn test_remove_fleeing_models() {
        let mut u = unit(3, 4, 2);
        u.models[1].wounds = 1;

        let diffs = remove_fleeing_models(&u, 2);
        assert_eq!(
            diffs,
            vec![
                Diff::ModelSlain {
                    unit: u.id.clone(),
                    model: 1,
                },
                Diff::ModelSlain {
                    unit: u.id.clone(),
                    model: 0,
                },
            ]
        );
    }

    #[test]
    fn test_remove_fleeing_wipes_unit() {
        let u = unit(2, 4, 1);
        let diffs = remove_fleeing_models(&u, 5);
        assert_eq!(diffs.len(), 3);
        assert!(matches!(diffs[2], Diff::UnitStatus { .. }));
    }
}
