// Fog-of-war derivation for night levels.
//
// Every cell gets one `FogType`. A cell within one step (including
// diagonals) of an emissive block is fully lit. Otherwise each light on the
// 5x5 ring around the cell (Chebyshev distance 2) contributes one piece of
// evidence: the angle from the cell to the light, measured with east = 0°
// and north = 90°, is bucketed into a corner if it lies within 15° of a
// diagonal and into the nearest side otherwise. The evidence is resolved by
// a fixed decision table (`resolve`):
//
// - opposite sides, or three or more sides → fully lit
// - two adjacent sides → the matching inner-corner sprite
// - one side → that side's sprite
// - no sides: three corners or a diagonal pair → fully lit; two corners on
//   one side → that side's sprite; a single corner → that corner's sprite
// - nothing → `Center` (full darkness)
//
// The whole map is recomputed on every structural change or day/night
// toggle. During the day the map is all `Lit`.
//
// See also: `level.rs` (`recompute_fog`), `shading.rs` for the other
// derived decoration layer.

use crate::plane::LevelPlane;
use crate::types::Position;
use serde::{Deserialize, Serialize};

const CORNER_TOLERANCE_DEGREES: f64 = 15.0;
const LIGHT_RING: i32 = 2;

/// Fog sprite for one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FogType {
    Lit,
    Center,
    Top,
    Bottom,
    Left,
    Right,
    InCornerTopLeft,
    InCornerTopRight,
    InCornerBottomLeft,
    InCornerBottomRight,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl FogType {
    /// Sprite name; `""` for a fully lit cell.
    pub fn sprite_name(self) -> &'static str {
        match self {
            FogType::Lit => "",
            FogType::Center => "FogOfWar_Center",
            FogType::Top => "FogOfWar_Top",
            FogType::Bottom => "FogOfWar_Bottom",
            FogType::Left => "FogOfWar_Left",
            FogType::Right => "FogOfWar_Right",
            FogType::InCornerTopLeft => "FogOfWar_InCorner_TopLeft",
            FogType::InCornerTopRight => "FogOfWar_InCorner_TopRight",
            FogType::InCornerBottomLeft => "FogOfWar_InCorner_BottomLeft",
            FogType::InCornerBottomRight => "FogOfWar_InCorner_BottomRight",
            FogType::TopLeft => "FogOfWar_TopLeft",
            FogType::TopRight => "FogOfWar_TopRight",
            FogType::BottomLeft => "FogOfWar_BottomLeft",
            FogType::BottomRight => "FogOfWar_BottomRight",
        }
    }
}

/// Lit sectors gathered for one cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Evidence {
    top: bool,
    bottom: bool,
    left: bool,
    right: bool,
    top_left: bool,
    top_right: bool,
    bottom_left: bool,
    bottom_right: bool,
}

impl Evidence {
    /// Buckets the direction from `cell` to `light`.
    fn record(&mut self, cell: Position, light: Position) {
        let dx = f64::from(light.x - cell.x);
        let dy = f64::from(cell.y - light.y);
        let angle = dy.atan2(dx).to_degrees().rem_euclid(360.0);

        for (diagonal, slot) in [
            (45.0, &mut self.top_right),
            (135.0, &mut self.top_left),
            (225.0, &mut self.bottom_left),
            (315.0, &mut self.bottom_right),
        ] {
            if (angle - diagonal).abs() <= CORNER_TOLERANCE_DEGREES {
                *slot = true;
                return;
            }
        }
        match ((angle + 45.0).rem_euclid(360.0) / 90.0) as u32 {
            0 => self.right = true,
            1 => self.top = true,
            2 => self.left = true,
            _ => self.bottom = true,
        }
    }

    fn resolve(self) -> FogType {
        let sides = [self.top, self.bottom, self.left, self.right]
            .iter()
            .filter(|&&s| s)
            .count();
        if (self.top && self.bottom) || (self.left && self.right) || sides >= 3 {
            return FogType::Lit;
        }
        if sides == 2 {
            return match (self.top, self.left) {
                (true, true) => FogType::InCornerTopLeft,
                (true, false) => FogType::InCornerTopRight,
                (false, true) => FogType::InCornerBottomLeft,
                (false, false) => FogType::InCornerBottomRight,
            };
        }
        if sides == 1 {
            return if self.top {
                FogType::Top
            } else if self.bottom {
                FogType::Bottom
            } else if self.left {
                FogType::Left
            } else {
                FogType::Right
            };
        }

        let corners = [self.top_left, self.top_right, self.bottom_left, self.bottom_right];
        let corner_count = corners.iter().filter(|&&c| c).count();
        let diagonal_pair =
            (self.top_left && self.bottom_right) || (self.top_right && self.bottom_left);
        match corner_count {
            0 => FogType::Center,
            1 => match corners {
                [true, _, _, _] => FogType::TopLeft,
                [_, true, _, _] => FogType::TopRight,
                [_, _, true, _] => FogType::BottomLeft,
                _ => FogType::BottomRight,
            },
            2 if !diagonal_pair => {
                if self.top_left && self.top_right {
                    FogType::Top
                } else if self.bottom_left && self.bottom_right {
                    FogType::Bottom
                } else if self.top_left {
                    FogType::Left
                } else {
                    FogType::Right
                }
            }
            _ => FogType::Lit,
        }
    }
}

/// Fog type for one cell given every light position on the map.
pub fn solve_fow_type_for(cell: Position, lights: &[Position]) -> FogType {
    let mut evidence = Evidence::default();
    for &light in lights {
        let dx = (light.x - cell.x).abs();
        let dy = (light.y - cell.y).abs();
        match dx.max(dy) {
            0 | 1 => return FogType::Lit,
            LIGHT_RING => evidence.record(cell, light),
            _ => {}
        }
    }
    evidence.resolve()
}

/// Fog types for every cell, row-major. Lights are the emissive blocks of
/// the action and ground planes.
pub fn solve_fow_type_for_map(action: &LevelPlane, ground: &LevelPlane) -> Vec<FogType> {
    let lights: Vec<Position> = action
        .positions()
        .filter(|&p| {
            action.get_block_at(p).is_some_and(|b| b.is_emissive())
                || ground.get_block_at(p).is_some_and(|b| b.is_emissive())
        })
        .collect();
    action
        .positions()
        .map(|p| solve_fow_type_for(p, &lights))
        .collect()
}
