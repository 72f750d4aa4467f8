//! The battlefield: deployment zones, objectives, terrain.

use serde::{Deserialize, Serialize};

use crate::core::geometry::{Pos, Rect};
use crate::core::player::PlayerId;

/// Where one player may set up units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploymentZone {
    pub owner: PlayerId,
    pub area: Rect,
}

/// An objective marker. Contested by models within its radius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub pos: Pos,
    pub radius: f32,
}

/// A terrain footprint. Blocking terrain may not be moved into or
/// deployed on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainPiece {
    pub id: String,
    pub area: Rect,
    pub blocks_movement: bool,
}

/// The battlefield.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub width: f32,
    pub height: f32,
    pub deployment_zones: Vec<DeploymentZone>,
    pub objectives: Vec<Objective>,
    pub terrain: Vec<TerrainPiece>,
}

impl Board {
    /// Create an empty board of the given size.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            deployment_zones: Vec::new(),
            objectives: Vec::new(),
            terrain: Vec::new(),
        }
    }

    /// Add a deployment zone.
    #[must_use]
    pub fn with_deployment_zone(mut self, owner: PlayerId, area: Rect) -> Self {
        self.deployment_zones.push(DeploymentZone { owner, area });
        self
    }

    /// Add an objective marker.
    #[must_use]
    pub fn with_objective(mut self, id: impl Into<String>, pos: Pos, radius: f32) -> Self {
        self.objectives.push(Objective {
            id: id.into(),
            pos,
            radius,
        });
        self
    }

    /// Add a terrain piece.
    #[must_use]
    pub fn with_terrain(mut self, id: impl Into<String>, area: Rect, blocks_movement: bool) -> Self {
        self.terrain.push(TerrainPiece {
            id: id.into(),
            area,
            blocks_movement,
        });
        self
    }

    /// Whether a position lies on the board at all.
    #[must_use]
    pub fn contains(&self, pos: Pos) -> bool {
        pos.x >= 0.0 && pos.x <= self.width && pos.y >= 0.0 && pos.y <= self.height
    }

    /// A player's deployment zone, if the board defines one.
    #[must_use]
    pub fn deployment_zone(&self, player: PlayerId) -> Option<&DeploymentZone> {
        self.deployment_zones.iter().find(|z| z.owner == player)
    }

    /// Whether a position is inside the given player's deployment zone.
    #[must_use]
    pub fn in_deployment_zone(&self, player: PlayerId, pos: Pos) -> bool {
        self.deployment_zone(player)
            .is_some_and(|z| z.area.contains(pos))
    }

    /// Whether a position sits inside blocking terrain.
    #[must_use]
    pub fn position_blocked(&self, pos: Pos) -> bool {
        self.terrain
            .iter()
            .any(|t| t.blocks_movement && t.area.contains(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        Board::new(44.0, 30.0)
            .with_deployment_zone(
                PlayerId::new(0),
                Rect::new(Pos::new(0.0, 0.0), Pos::new(44.0, 8.0)),
            )
            .with_deployment_zone(
                PlayerId::new(1),
                Rect::new(Pos::new(0.0, 22.0), Pos::new(44.0, 30.0)),
            )
            .with_objective("center", Pos::new(22.0, 15.0), 3.0)
            .with_terrain(
                "ruin",
                Rect::new(Pos::new(18.0, 12.0), Pos::new(20.0, 18.0)),
                true,
            )
    }

    #[test]
    fn test_contains() {
        let b = board();
        assert!(b.contains(Pos::new(0.0, 0.0)));
        assert!(b.contains(Pos::new(44.0, 30.0)));
        assert!(!b.contains(Pos::new(-1.0, 5.0)));
        assert!(!b.contains(Pos::new(5.0, 31.0)));
    }

    #[test]
    fn test_deployment_zones() {
        let b = board();
        assert!(b.in_deployment_zone(PlayerId::new(0), Pos::new(10.0, 4.0)));
        assert!(!b.in_deployment_zone(PlayerId::new(0), Pos::new(10.0, 15.0)));
        assert!(b.in_deployment_zone(PlayerId::new(1), Pos::new(10.0, 25.0)));
        assert!(!b.in_deployment_zone(PlayerId::new(1), Pos::new(10.0, 4.0)));
    }

    #[test]
    fn test_terrain_blocking() {
        let b = board();
        assert!(b.position_blocked(Pos::new(19.0, 15.0)));
        assert!(!b.position_blocked(Pos::new(25.0, 15.0)));
    }

    #[test]
    fn test_non_blocking_terrain() {
        let b = Board::new(20.0, 20.0).with_terrain(
            "crater",
            Rect::new(Pos::new(0.0, 0.0), Pos::new(5.0, 5.0)),
            false,
        );
        assert!(!b.position_blocked(Pos::new(2.0, 2.0)));
    }
}
