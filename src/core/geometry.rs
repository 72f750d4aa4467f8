//! Board geometry primitives and the distance thresholds the rules use.
//!
//! The engine only needs what validation needs: points, axis-aligned
//! rectangles, straight-line distance, and capped movement along a line.
//! Anything fancier (line of sight, pathing) belongs to an external
//! collaborator.
//!
//! Distances are in inches, matching tabletop convention.

use serde::{Deserialize, Serialize};

/// Opposing models within this distance of each other are in melee.
pub const ENGAGEMENT_RANGE: f32 = 1.0;

/// Every model must stay within this distance of another model in its unit.
pub const COHERENCY_RANGE: f32 = 2.0;

/// Models within this distance of an objective marker contest it.
pub const OBJECTIVE_RANGE: f32 = 3.0;

/// Maximum distance at which a charge may be declared.
pub const CHARGE_DECLARE_RANGE: f32 = 12.0;

/// A point on the battlefield.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pos {
    pub x: f32,
    pub y: f32,
}

impl Pos {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to another position.
    #[must_use]
    pub fn distance_to(self, other: Pos) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Move toward `target`, travelling at most `max_distance`.
    ///
    /// Returns `target` itself if it is within reach.
    #[must_use]
    pub fn step_towards(self, target: Pos, max_distance: f32) -> Pos {
        let dist = self.distance_to(target);
        if dist <= max_distance || dist == 0.0 {
            return target;
        }
        let t = max_distance / dist;
        Pos::new(self.x + (target.x - self.x) * t, self.y + (target.y - self.y) * t)
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Axis-aligned rectangle, used for deployment zones and terrain footprints.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Pos,
    pub max: Pos,
}

impl Rect {
    /// Create a rectangle from two corners.
    #[must_use]
    pub fn new(min: Pos, max: Pos) -> Self {
        Self {
            min: Pos::new(min.x.min(max.x), min.y.min(max.y)),
            max: Pos::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    /// Check whether a position lies inside (inclusive of edges).
    #[must_use]
    pub fn contains(&self, pos: Pos) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }
}

/// Check unit coherency: every position must be within [`COHERENCY_RANGE`]
/// of at least one other position. Single-model units are always coherent.
#[must_use]
pub fn in_coherency(positions: &[Pos]) -> bool {
    if positions.len() <= 1 {
        return true;
    }
    positions.iter().enumerate().all(|(i, &a)| {
        positions
            .iter()
            .enumerate()
            .any(|(j, &b)| i != j && a.distance_to(b) <= COHERENCY_RANGE)
    })
}
