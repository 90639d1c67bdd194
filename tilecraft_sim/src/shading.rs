// Ambient-occlusion shading decals.
//
// For every open cell on the action plane (empty, or any non-solid block)
// the 8 neighbours are tested with `occluded_by`: a neighbour occludes when
// it is solid and not transparent, and everything past the edge of the world
// occludes. The resulting decals:
//
// - one `AOeffect_<Side>` per occluding orthogonal neighbour,
// - one `AOeffect_<Corner>` per occluding diagonal whose two adjacent sides
//   are both clear,
// - a soft drop shadow along the left edge when the left side is clear but
//   the top-left (`Shadow_Parts_Fade_top`) or bottom-left
//   (`Shadow_Parts_Fade_base`) diagonal occludes.
//
// Pure derived data. `LevelModel` recomputes the whole layer after any
// action or ground plane edit.
//
// See also: `fog.rs`, `level.rs` (`recompute_shading`).

use crate::plane::LevelPlane;
use crate::types::Position;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One shading decal drawn over a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadingDecal {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    ShadowFadeTop,
    ShadowFadeBase,
}

impl ShadingDecal {
    pub fn sprite_name(self) -> &'static str {
        match self {
            ShadingDecal::Top => "AOeffect_Top",
            ShadingDecal::Bottom => "AOeffect_Bottom",
            ShadingDecal::Left => "AOeffect_Left",
            ShadingDecal::Right => "AOeffect_Right",
            ShadingDecal::TopLeft => "AOeffect_TopLeft",
            ShadingDecal::TopRight => "AOeffect_TopRight",
            ShadingDecal::BottomLeft => "AOeffect_BottomLeft",
            ShadingDecal::BottomRight => "AOeffect_BottomRight",
            ShadingDecal::ShadowFadeTop => "Shadow_Parts_Fade_top",
            ShadingDecal::ShadowFadeBase => "Shadow_Parts_Fade_base",
        }
    }
}

pub type CellShading = SmallVec<[ShadingDecal; 4]>;

fn occluded_by(plane: &LevelPlane, position: Position) -> bool {
    match plane.get_block_at(position) {
        Some(block) => block.is_solid() && !block.is_transparent(),
        None => true,
    }
}

/// Decals for a single cell. Solid cells get none.
pub fn shading_for(plane: &LevelPlane, position: Position) -> CellShading {
    let mut decals = CellShading::new();
    let Some(block) = plane.get_block_at(position) else {
        return decals;
    };
    if !block.is_empty() && block.is_solid() {
        return decals;
    }

    let at = |dx: i32, dy: i32| occluded_by(plane, Position::new(position.x + dx, position.y + dy));
    let top = at(0, -1);
    let bottom = at(0, 1);
    let left = at(-1, 0);
    let right = at(1, 0);
    let top_left = at(-1, -1);
    let top_right = at(1, -1);
    let bottom_left = at(-1, 1);
    let bottom_right = at(1, 1);

    for (occluded, decal) in [
        (top, ShadingDecal::Top),
        (bottom, ShadingDecal::Bottom),
        (left, ShadingDecal::Left),
        (right, ShadingDecal::Right),
        (top_left && !top && !left, ShadingDecal::TopLeft),
        (top_right && !top && !right, ShadingDecal::TopRight),
        (bottom_left && !bottom && !left, ShadingDecal::BottomLeft),
        (bottom_right && !bottom && !right, ShadingDecal::BottomRight),
        (!left && top_left, ShadingDecal::ShadowFadeTop),
        (!left && bottom_left, ShadingDecal::ShadowFadeBase),
    ] {
        if occluded {
            decals.push(decal);
        }
    }
    decals
}

/// Decals for every cell, row-major.
pub fn compute_shading(plane: &LevelPlane) -> Vec<CellShading> {
    plane.positions().map(|p| shading_for(plane, p)).collect()
}
