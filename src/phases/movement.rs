//! Movement phase: normal moves, advances, fall backs.
//!
//! Each unit acts at most once per turn, gated by its turn flags. An
//! advance is a two-step sequence: the roll fixes the increased
//! allowance, then a follow-up `Move` spends it. The allowance lives in
//! phase-local pending state, and while it is pending only that unit's
//! `Move` is admitted.

use serde::{Deserialize, Serialize};

use super::{ensure_active_player, owned_deployed_unit, wrong_phase, Phase, DIST_EPSILON};
use crate::core::action::{Action, ActionKind, ActionPayload, ActionResult};
use crate::core::geometry::{in_coherency, Pos, ENGAGEMENT_RANGE};
use crate::core::rng::DiceSource;
use crate::error::{EngineError, EngineResult};
use crate::rules::rolls::{RollPurpose, RollRecord};
use crate::state::diff::Diff;
use crate::state::game_state::{GameState, PhaseKind};
use crate::state::unit::{TurnFlag, Unit, UnitId, UnitStatus};

/// An advance roll awaiting its follow-up move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingAdvance {
    pub unit: UnitId,
    /// Movement stat plus the advance roll.
    pub allowance: f32,
}

/// The movement phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementPhase {
    done: bool,
    pending: Option<PendingAdvance>,
}

impl MovementPhase {
    fn ensure_unmoved(unit: &Unit) -> EngineResult<()> {
        if unit.flags.moved || unit.flags.advanced || unit.flags.fell_back {
            return Err(EngineError::Validation(format!(
                "unit '{}' has already acted this movement phase",
                unit.id
            )));
        }
        Ok(())
    }

    /// Destination checks shared by normal moves, advance moves, and
    /// fall backs: one destination per alive model, all on the board,
    /// clear of terrain, within the allowance, and coherent.
    fn check_destinations(
        state: &GameState,
        unit: &Unit,
        destinations: &[Pos],
        allowance: f32,
    ) -> EngineResult<()> {
        if destinations.len() != unit.alive_count() {
            return Err(EngineError::Validation(format!(
                "unit '{}' needs {} destinations, got {}",
                unit.id,
                unit.alive_count(),
                destinations.len()
            )));
        }

        for ((_, model), &dest) in unit.alive_models().zip(destinations) {
            if !state.board.contains(dest) {
                return Err(EngineError::RuleViolation(format!(
                    "destination {} is off the board",
                    dest
                )));
            }
            if state.board.position_blocked(dest) {
                return Err(EngineError::RuleViolation(format!(
                    "destination {} is inside blocking terrain",
                    dest
                )));
            }
            let Some(from) = model.pos else {
                return Err(EngineError::Validation(format!(
                    "unit '{}' has a model with no position",
                    unit.id
                )));
            };
            let dist = from.distance_to(dest);
            if dist > allowance + DIST_EPSILON {
                return Err(EngineError::RuleViolation(format!(
                    "move of {:.1}\" exceeds allowance {:.1}\"",
                    dist, allowance
                )));
            }
        }

        if !in_coherency(destinations) {
            return Err(EngineError::RuleViolation(format!(
                "unit '{}' would break coherency",
                unit.id
            )));
        }
        Ok(())
    }

    /// Would any destination sit within engagement range of an enemy?
    fn enters_engagement(state: &GameState, unit: &Unit, destinations: &[Pos]) -> bool {
        state
            .units
            .values()
            .filter(|u| u.owner != unit.owner && u.status == UnitStatus::Deployed)
            .any(|enemy| {
                enemy.alive_positions().iter().any(|&e| {
                    destinations
                        .iter()
                        .any(|&d| d.distance_to(e) <= ENGAGEMENT_RANGE)
                })
            })
    }

    fn move_diffs(unit: &Unit, destinations: &[Pos], flag: TurnFlag) -> Vec<Diff> {
        let mut diffs: Vec<Diff> = unit
            .alive_models()
            .zip(destinations)
            .map(|((index, _), &dest)| Diff::ModelPosition {
                unit: unit.id.clone(),
                model: index,
                pos: dest,
            })
            .collect();
        diffs.push(Diff::SetFlag {
            unit: unit.id.clone(),
            flag,
            value: true,
        });
        diffs
    }

    fn validate_move(
        &self,
        state: &GameState,
        action: &Action,
        unit_id: &UnitId,
        destinations: &[Pos],
    ) -> EngineResult<()> {
        ensure_active_player(state, action)?;
        let unit = owned_deployed_unit(state, action, unit_id)?;

        let allowance = match &self.pending {
            Some(pending) if &pending.unit == unit_id => pending.allowance,
            Some(pending) => {
                return Err(EngineError::Validation(format!(
                    "an advance move for '{}' is pending",
                    pending.unit
                )));
            }
            None => {
                Self::ensure_unmoved(unit)?;
                unit.stats.movement
            }
        };

        if state.is_engaged(unit_id)? {
            return Err(EngineError::Validation(format!(
                "unit '{}' is engaged and may only fall back",
                unit_id
            )));
        }
        Self::check_destinations(state, unit, destinations, allowance)?;
        if Self::enters_engagement(state, unit, destinations) {
            return Err(EngineError::RuleViolation(format!(
                "unit '{}' may not move into engagement range",
                unit_id
            )));
        }
        Ok(())
    }

    fn validate_advance(
        &self,
        state: &GameState,
        action: &Action,
        unit_id: &UnitId,
    ) -> EngineResult<()> {
        ensure_active_player(state, action)?;
        if let Some(pending) = &self.pending {
            return Err(EngineError::Validation(format!(
                "an advance move for '{}' is pending",
                pending.unit
            )));
        }
        let unit = owned_deployed_unit(state, action, unit_id)?;
        Self::ensure_unmoved(unit)?;
        if state.is_engaged(unit_id)? {
            return Err(EngineError::Validation(format!(
                "unit '{}' is engaged and may only fall back",
                unit_id
            )));
        }
        Ok(())
    }

    fn validate_fall_back(
        &self,
        state: &GameState,
        action: &Action,
        unit_id: &UnitId,
        destinations: &[Pos],
    ) -> EngineResult<()> {
        ensure_active_player(state, action)?;
        if let Some(pending) = &self.pending {
            return Err(EngineError::Validation(format!(
                "an advance move for '{}' is pending",
                pending.unit
            )));
        }
        let unit = owned_deployed_unit(state, action, unit_id)?;
        Self::ensure_unmoved(unit)?;
        if !state.is_engaged(unit_id)? {
            return Err(EngineError::Validation(format!(
                "unit '{}' is not engaged",
                unit_id
            )));
        }
        Self::check_destinations(state, unit, destinations, unit.stats.movement)?;
        // The whole point of falling back is to leave melee.
        if Self::enters_engagement(state, unit, destinations) {
            return Err(EngineError::RuleViolation(format!(
                "unit '{}' must end its fall back outside engagement range",
                unit_id
            )));
        }
        Ok(())
    }

    fn validate_stationary(
        &self,
        state: &GameState,
        action: &Action,
        unit_id: &UnitId,
    ) -> EngineResult<()> {
        ensure_active_player(state, action)?;
        if let Some(pending) = &self.pending {
            return Err(EngineError::Validation(format!(
                "an advance move for '{}' is pending",
                pending.unit
            )));
        }
        let unit = owned_deployed_unit(state, action, unit_id)?;
        Self::ensure_unmoved(unit)
    }
}

impl Phase for MovementPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Movement
    }

    fn exit_phase(&mut self, _state: &GameState) {
        self.pending = None;
    }

    fn get_available_actions(&self, _state: &GameState) -> Vec<ActionKind> {
        if self.pending.is_some() {
            vec![ActionKind::Move]
        } else {
            vec![
                ActionKind::Move,
                ActionKind::Advance,
                ActionKind::FallBack,
                ActionKind::RemainStationary,
                ActionKind::EndPhase,
            ]
        }
    }

    fn validate_action(&self, state: &GameState, action: &Action) -> EngineResult<()> {
        match &action.payload {
            ActionPayload::Move { unit, destinations } => {
                self.validate_move(state, action, unit, destinations)
            }
            ActionPayload::Advance { unit } => self.validate_advance(state, action, unit),
            ActionPayload::FallBack { unit, destinations } => {
                self.validate_fall_back(state, action, unit, destinations)
            }
            ActionPayload::RemainStationary { unit } => {
                self.validate_stationary(state, action, unit)
            }
            ActionPayload::EndPhase => {
                ensure_active_player(state, action)?;
                if let Some(pending) = &self.pending {
                    return Err(EngineError::Validation(format!(
                        "an advance move for '{}' is pending",
                        pending.unit
                    )));
                }
                Ok(())
            }
            other => Err(wrong_phase(other.kind(), self.kind())),
        }
    }

    fn execute_action(
        &mut self,
        state: &GameState,
        action: &Action,
        dice: &mut dyn DiceSource,
    ) -> EngineResult<ActionResult> {
        self.validate_action(state, action)?;

        match &action.payload {
            ActionPayload::Move { unit, destinations } => {
                let u = state.unit(unit)?;
                if self.pending.as_ref().is_some_and(|p| &p.unit == unit) {
                    self.pending = None;
                }
                Ok(ActionResult::ok(
                    Self::move_diffs(u, destinations, TurnFlag::Moved),
                    Vec::new(),
                ))
            }
            ActionPayload::Advance { unit } => {
                let u = state.unit(unit)?;
                let roll = dice.roll_d6(1)?[0];
                self.pending = Some(PendingAdvance {
                    unit: unit.clone(),
                    allowance: u.stats.movement + roll as f32,
                });
                let diffs = vec![Diff::SetFlag {
                    unit: unit.clone(),
                    flag: TurnFlag::Advanced,
                    value: true,
                }];
                let record = RollRecord::values(RollPurpose::Advance, &[roll]);
                Ok(ActionResult::ok(diffs, vec![record]))
            }
            ActionPayload::FallBack { unit, destinations } => {
                let u = state.unit(unit)?;
                Ok(ActionResult::ok(
                    Self::move_diffs(u, destinations, TurnFlag::FellBack),
                    Vec::new(),
                ))
            }
            ActionPayload::RemainStationary { unit } => {
                let diffs = vec![Diff::SetFlag {
                    unit: unit.clone(),
                    flag: TurnFlag::Moved,
                    value: true,
                }];
                Ok(ActionResult::ok(diffs, Vec::new()))
            }
            ActionPayload::EndPhase => {
                self.done = true;
                Ok(ActionResult::ok(Vec::new(), Vec::new()))
            }
            other => Err(wrong_phase(other.kind(), self.kind())),
        }
    }

    fn is_complete(&self, _state: &GameState) -> bool {
        self.done && self.pending.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::player::PlayerId;
    use crate::core::rng::ScriptedDice;
    use crate::state::board::Board;
    use crate::state::unit::{StatBlock, Unit};
    use smallvec::SmallVec;

    fn stats() -> StatBlock {
        StatBlock {
            movement: 6.0,
            skill: 3,
            strength: 4,
            toughness: 4,
            save: 3,
            invuln: None,
            wounds: 1,
            leadership: 7,
            objective_control: 2,
        }
    }

    fn deployed(id: &str, player: u8, y: f32, models: usize) -> Unit {
        let mut unit =
            Unit::new(UnitId::new(id), id, PlayerId::new(player), stats()).with_models(models);
        unit.status = UnitStatus::Deployed;
        for (i, m) in unit.models.iter_mut().enumerate() {
            m.pos = Some(Pos::new(i as f32, y));
        }
        unit
    }

    fn state() -> GameState {
        let mut state = GameState::new(Board::new(44.0, 30.0));
        state.add_unit(deployed("a1", 0, 5.0, 2)).unwrap();
        state.add_unit(deployed("b1", 1, 25.0, 2)).unwrap();
        state.meta.phase = PhaseKind::Movement;
        state
    }

    fn dests(points: &[(f32, f32)]) -> SmallVec<[Pos; 8]> {
        points.iter().map(|&(x, y)| Pos::new(x, y)).collect()
    }

    fn action(player: u8, payload: ActionPayload) -> Action {
        Action::new(PlayerId::new(player), 0.0, payload)
    }

    #[test]
    fn test_normal_move_within_allowance() {
        let mut state = state();
        let mut phase = MovementPhase::default();
        let mut dice = ScriptedDice::default();

        let mv = action(
            0,
            ActionPayload::Move {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 10.0), (1.0, 10.0)]),
            },
        );
        let result = phase.execute_action(&state, &mv, &mut dice).unwrap();
        state.apply_diffs(&result.diffs).unwrap();

        let unit = state.unit(&UnitId::new("a1")).unwrap();
        assert!(unit.flags.moved);
        assert_eq!(unit.models[0].pos, Some(Pos::new(0.0, 10.0)));

        // A second move this turn is rejected.
        let err = phase.validate_action(&state, &mv).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_move_beyond_allowance_rejected() {
        let state = state();
        let phase = MovementPhase::default();

        let mv = action(
            0,
            ActionPayload::Move {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 12.0), (1.0, 12.0)]),
            },
        );
        assert!(matches!(
            phase.validate_action(&state, &mv),
            Err(EngineError::RuleViolation(_))
        ));
    }

    #[test]
    fn test_advance_extends_allowance() {
        let mut state = state();
        let mut phase = MovementPhase::default();
        let mut dice = ScriptedDice::from_rolls(&[4]);

        let adv = action(
            0,
            ActionPayload::Advance {
                unit: UnitId::new("a1"),
            },
        );
        let result = phase.execute_action(&state, &adv, &mut dice).unwrap();
        state.apply_diffs(&result.diffs).unwrap();

        assert_eq!(result.dice[0].purpose, RollPurpose::Advance);
        assert!(state.unit(&UnitId::new("a1")).unwrap().flags.advanced);
        assert_eq!(phase.get_available_actions(&state), vec![ActionKind::Move]);

        // 6" movement + 4 rolled = 10" allowance.
        let mv = action(
            0,
            ActionPayload::Move {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 15.0), (1.0, 15.0)]),
            },
        );
        let result = phase.execute_action(&state, &mv, &mut dice).unwrap();
        state.apply_diffs(&result.diffs).unwrap();
        assert!(phase.pending.is_none());
    }

    #[test]
    fn test_advance_move_capped_by_roll() {
        let mut state = state();
        let mut phase = MovementPhase::default();
        let mut dice = ScriptedDice::from_rolls(&[1]);

        let adv = action(
            0,
            ActionPayload::Advance {
                unit: UnitId::new("a1"),
            },
        );
        let result = phase.execute_action(&state, &adv, &mut dice).unwrap();
        state.apply_diffs(&result.diffs).unwrap();

        // Allowance is 7"; 10" is too far.
        let mv = action(
            0,
            ActionPayload::Move {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 15.0), (1.0, 15.0)]),
            },
        );
        assert!(matches!(
            phase.validate_action(&state, &mv),
            Err(EngineError::RuleViolation(_))
        ));
    }

    #[test]
    fn test_pending_advance_blocks_other_actions() {
        let mut state = state();
        let mut phase = MovementPhase::default();
        let mut dice = ScriptedDice::from_rolls(&[3]);

        state.add_unit(deployed("a2", 0, 8.0, 1)).unwrap();
        let adv = action(
            0,
            ActionPayload::Advance {
                unit: UnitId::new("a1"),
            },
        );
        let result = phase.execute_action(&state, &adv, &mut dice).unwrap();
        state.apply_diffs(&result.diffs).unwrap();

        // Another unit cannot act until the advance move resolves.
        let other = action(
            0,
            ActionPayload::RemainStationary {
                unit: UnitId::new("a2"),
            },
        );
        assert!(phase.validate_action(&state, &other).is_err());

        let end = action(0, ActionPayload::EndPhase);
        assert!(phase.validate_action(&state, &end).is_err());
        assert!(!phase.is_complete(&state));
    }

    #[test]
    fn test_move_into_engagement_rejected() {
        let mut state = state();
        let phase = MovementPhase::default();
        state.add_unit(deployed("b2", 1, 10.5, 1)).unwrap();

        let mv = action(
            0,
            ActionPayload::Move {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 10.0), (1.0, 10.0)]),
            },
        );
        assert!(matches!(
            phase.validate_action(&state, &mv),
            Err(EngineError::RuleViolation(_))
        ));
    }

    #[test]
    fn test_engaged_unit_may_only_fall_back() {
        let mut state = state();
        let mut phase = MovementPhase::default();
        let mut dice = ScriptedDice::default();
        state.add_unit(deployed("b2", 1, 5.5, 1)).unwrap();

        let mv = action(
            0,
            ActionPayload::Move {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 8.0), (1.0, 8.0)]),
            },
        );
        assert!(phase.validate_action(&state, &mv).is_err());

        let adv = action(
            0,
            ActionPayload::Advance {
                unit: UnitId::new("a1"),
            },
        );
        assert!(phase.validate_action(&state, &adv).is_err());

        let fall = action(
            0,
            ActionPayload::FallBack {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 1.0), (1.0, 1.0)]),
            },
        );
        let result = phase.execute_action(&state, &fall, &mut dice).unwrap();
        state.apply_diffs(&result.diffs).unwrap();
        assert!(state.unit(&UnitId::new("a1")).unwrap().flags.fell_back);
    }

    #[test]
    fn test_fall_back_must_leave_engagement() {
        let mut state = state();
        let phase = MovementPhase::default();
        state.add_unit(deployed("b2", 1, 5.5, 1)).unwrap();

        let fall = action(
            0,
            ActionPayload::FallBack {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 5.2), (1.0, 5.2)]),
            },
        );
        assert!(matches!(
            phase.validate_action(&state, &fall),
            Err(EngineError::RuleViolation(_))
        ));
    }

    #[test]
    fn test_fall_back_requires_engagement() {
        let state = state();
        let phase = MovementPhase::default();

        let fall = action(
            0,
            ActionPayload::FallBack {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 1.0), (1.0, 1.0)]),
            },
        );
        assert!(matches!(
            phase.validate_action(&state, &fall),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_remain_stationary_consumes_activation() {
        let mut state = state();
        let mut phase = MovementPhase::default();
        let mut dice = ScriptedDice::default();

        let stay = action(
            0,
            ActionPayload::RemainStationary {
                unit: UnitId::new("a1"),
            },
        );
        let result = phase.execute_action(&state, &stay, &mut dice).unwrap();
        state.apply_diffs(&result.diffs).unwrap();

        let mv = action(
            0,
            ActionPayload::Move {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 8.0), (1.0, 8.0)]),
            },
        );
        assert!(phase.validate_action(&state, &mv).is_err());
    }

    #[test]
    fn test_inactive_player_rejected() {
        let state = state();
        let phase = MovementPhase::default();

        let mv = action(
            1,
            ActionPayload::Move {
                unit: UnitId::new("b1"),
                destinations: dests(&[(0.0, 20.0), (1.0, 20.0)]),
            },
        );
        assert!(matches!(
            phase.validate_action(&state, &mv),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_incoherent_move_rejected() {
        let state = state();
        let phase = MovementPhase::default();

        let mv = action(
            0,
            ActionPayload::Move {
                unit: UnitId::new("a1"),
                destinations: dests(&[(0.0, 10.0), (1.0, 2.0)]),
            },
        );
        assert!(matches!(
            phase.validate_action(&state, &mv),
            Err(EngineError::RuleViolation(_))
        ));
    }

    #[test]
    fn test_end_phase_completes() {
        let state = state();
        let mut phase = MovementPhase::default();
        let mut dice = ScriptedDice::default();

        let end = action(0, ActionPayload::EndPhase);
        phase.execute_action(&state, &end, &mut dice).unwrap();
        assert!(phase.is_complete(&state));
    }
}
