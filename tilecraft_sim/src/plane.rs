// One block layer of the level grid, plus the electrical/mechanical
// propagation that runs whenever the action layer is edited.
//
// A `LevelPlane` is a row-major `Vec<LevelBlock>` addressed by
// `y * width + x`. Ground, decoration, and fluff planes are plain storage:
// `set_block_at` writes the cell and requests a sprite refresh. The action
// plane runs an ordered pipeline for every edit (`apply_edit`):
//
// 1. redstone adjacency-set membership update,
// 2. full redstone re-propagation when the old or new block needs it,
// 3. weak-charge recompute for the edited cell (and piston update),
// 4. severing neighbour rail connections that pointed at an emptied cell,
// 5. rail-type inference for the cell and its neighbours,
// 6. sprite refresh notices for the cell and its neighbours,
// 7. conduit activation resolution.
//
// Edits issued while a pipeline is running (piston pushes, arm placement,
// blocks destroyed on push) are appended to `pending` and drained in FIFO
// order until the plane reaches a fixed point. Nothing recurses into
// `apply_edit`.
//
// Side effects the presentation layer cares about are collected as
// `PlaneNotice`s and drained by `LevelModel` with `take_notices`.
//
// Out-of-bounds reads return `None`; out-of-bounds writes are ignored.
//
// See also: `block.rs` for the capability flags consulted here,
// `adjacency.rs` for the component grouping, `level.rs` which owns the
// planes and forwards entity positions for piston blocking.

use crate::adjacency::AdjacencySet;
use crate::block::{LevelBlock, piston_arm_type_name, piston_type_name};
use crate::types::FacingDirection::{East as DE, North as DN, South as DS, West as DW};
use crate::types::{FacingDirection, Position};
use log::{trace, warn};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which layer a plane is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaneType {
    Ground,
    Action,
    Decoration,
    Fluff,
}

/// Something the presentation layer should react to after an edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaneNotice {
    /// Re-sprite the cell.
    RefreshCell(Position),
    DoorAnimation { position: Position, open: bool },
    ConduitAnimation { position: Position, active: bool },
    /// A block was destroyed by being pushed into.
    Explosion(Position),
}

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

#[allow(dead_code)]
const N: u8 = 1;
#[allow(dead_code)]
const E: u8 = 2;
#[allow(dead_code)]
const S: u8 = 4;
#[allow(dead_code)]
const W: u8 = 8;

/// Wire sprite suffix by 4-bit neighbour mask (N=1, E=2, S=4, W=8).
const REDSTONE_SPRITES: [&str; 16] = [
    "",          // 0: isolated dot
    "Vertical",  // N
    "Horizontal", // E
    "UpRight",   // N E
    "Vertical",  // S
    "Vertical",  // N S
    "DownRight", // E S
    "TRight",    // N E S
    "Horizontal", // W
    "UpLeft",    // N W
    "Horizontal", // E W
    "TUp",       // N E W
    "DownLeft",  // S W
    "TLeft",     // N S W
    "TDown",     // E S W
    "Cross",     // all
];

/// Endpoints chosen for a plain rail by neighbour mask. Three neighbours
/// keep the straight pair; four default to north-south.
const RAIL_CONNECTION_PRIORITY: [[Option<FacingDirection>; 2]; 16] = [
    [None, None],
    [Some(DN), None],
    [Some(DE), None],
    [Some(DN), Some(DE)],
    [Some(DS), None],
    [Some(DN), Some(DS)],
    [Some(DS), Some(DE)],
    [Some(DN), Some(DS)],
    [Some(DW), None],
    [Some(DN), Some(DW)],
    [Some(DE), Some(DW)],
    [Some(DE), Some(DW)],
    [Some(DS), Some(DW)],
    [Some(DN), Some(DS)],
    [Some(DE), Some(DW)],
    [Some(DN), Some(DS)],
];

/// Powered rails never curve: any north/south neighbour wins the
/// north-south axis, otherwise east-west.
const POWERED_RAIL_CONNECTION_PRIORITY: [[Option<FacingDirection>; 2]; 16] = [
    [None, None],
    [Some(DN), None],
    [Some(DE), None],
    [Some(DN), None],
    [Some(DS), None],
    [Some(DN), Some(DS)],
    [Some(DS), None],
    [Some(DN), Some(DS)],
    [Some(DW), None],
    [Some(DN), None],
    [Some(DE), Some(DW)],
    [Some(DN), None],
    [Some(DS), None],
    [Some(DN), Some(DS)],
    [Some(DS), None],
    [Some(DN), Some(DS)],
];

/// Wire sprite name for a connectivity mask.
pub fn redstone_sprite(mask: u8, powered: bool) -> String {
    let shape = REDSTONE_SPRITES[usize::from(mask & 0x0F)];
    format!("redstoneWire{shape}{}", if powered { "On" } else { "" })
}

// ---------------------------------------------------------------------------
// LevelPlane
// ---------------------------------------------------------------------------

/// A single block layer.
#[derive(Clone, Debug)]
pub struct LevelPlane {
    plane_type: PlaneType,
    width: i32,
    height: i32,
    blocks: Vec<LevelBlock>,
    /// Contiguous wire/battery positions. Action plane only.
    redstone: AdjacencySet,
    /// Cells currently occupied by an entity; a piston cannot extend into
    /// one of these.
    occupied: FxHashSet<Position>,
    notices: Vec<PlaneNotice>,
    pending: VecDeque<(Position, LevelBlock)>,
    applying: bool,
}

impl LevelPlane {
    /// Builds a plane from row-major tags. `tags.len()` must equal
    /// `width * height`; level loading validates that before calling.
    pub fn new(plane_type: PlaneType, width: i32, height: i32, tags: &[String]) -> Self {
        let blocks = tags.iter().map(|t| LevelBlock::new(t)).collect();
        let mut plane = Self {
            plane_type,
            width,
            height,
            blocks,
            redstone: AdjacencySet::new(),
            occupied: FxHashSet::default(),
            notices: Vec::new(),
            pending: VecDeque::new(),
            applying: false,
        };
        if plane_type == PlaneType::Action {
            plane.initialize_circuits();
        }
        plane
    }

    /// An all-empty plane.
    pub fn empty(plane_type: PlaneType, width: i32, height: i32) -> Self {
        let count = (width.max(0) * height.max(0)) as usize;
        Self::new(plane_type, width, height, &vec![String::new(); count])
    }

    fn initialize_circuits(&mut self) {
        for position in self.positions().collect::<Vec<_>>() {
            if self.get_block_at(position).is_some_and(|b| b.is_redstone_network_member()) {
                self.redstone.add(position);
            }
        }
        // Two passes so a rail which settled late can still be picked up by
        // its neighbour.
        for _ in 0..2 {
            for position in self.positions().collect::<Vec<_>>() {
                self.determine_rail_type(position);
            }
        }
        self.applying = true;
        self.refresh_redstone_pass();
        self.resolve_conduits();
        self.applying = false;
        self.drain();
        self.notices.clear();
    }

    pub fn plane_type(&self) -> PlaneType {
        self.plane_type
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        position.x >= 0 && position.y >= 0 && position.x < self.width && position.y < self.height
    }

    fn index(&self, position: Position) -> Option<usize> {
        self.in_bounds(position)
            .then(|| (position.y * self.width + position.x) as usize)
    }

    /// All cells in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<> {
        let (width, height) = (self.width, self.height);
        (0..height).flat_map(move |y| (0..width).map(move |x| Position::new(x, y)))
    }

    pub fn get_block_at(&self, position: Position) -> Option<&LevelBlock> {
        self.index(position).map(|i| &self.blocks[i])
    }

    fn block_mut(&mut self, position: Position) -> Option<&mut LevelBlock> {
        self.index(position).map(|i| &mut self.blocks[i])
    }

    pub fn blocks(&self) -> &[LevelBlock] {
        &self.blocks
    }

    pub fn redstone_components(&self) -> &AdjacencySet {
        &self.redstone
    }

    /// Replaces the set of entity-occupied cells.
    pub fn set_occupied(&mut self, positions: impl IntoIterator<Item = Position>) {
        self.occupied = positions.into_iter().collect();
    }

    pub fn take_notices(&mut self) -> Vec<PlaneNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Writes `block` at `position` and runs the edit pipeline. Returns
    /// false (and does nothing) when out of bounds.
    pub fn set_block_at(&mut self, position: Position, block: LevelBlock) -> bool {
        if !self.in_bounds(position) {
            warn!("set_block_at {position} out of bounds on {:?} plane", self.plane_type);
            return false;
        }
        self.pending.push_back((position, block));
        self.drain();
        true
    }

    /// Toggles a door's open state. Returns the new state.
    pub fn toggle_door(&mut self, position: Position) -> Option<bool> {
        let block = self.block_mut(position)?;
        if !block.is_door() {
            return None;
        }
        block.state.open = !block.state.open;
        let open = block.state.open;
        self.notices.push(PlaneNotice::DoorAnimation { position, open });
        self.notices.push(PlaneNotice::RefreshCell(position));
        Some(open)
    }

    /// Re-runs the full redstone pass outside an edit.
    pub fn refresh_redstone(&mut self) {
        if self.plane_type != PlaneType::Action {
            return;
        }
        self.applying = true;
        self.refresh_redstone_pass();
        self.applying = false;
        self.drain();
    }

    fn drain(&mut self) {
        if self.applying {
            return;
        }
        self.applying = true;
        while let Some((position, block)) = self.pending.pop_front() {
            self.apply_edit(position, block);
        }
        self.applying = false;
    }

    fn apply_edit(&mut self, position: Position, block: LevelBlock) {
        let Some(index) = self.index(position) else {
            return;
        };
        let old = std::mem::replace(&mut self.blocks[index], block);
        if self.plane_type != PlaneType::Action {
            self.notices.push(PlaneNotice::RefreshCell(position));
            return;
        }
        let new = &self.blocks[index];
        let new_is_member = new.is_redstone_network_member();
        let new_is_empty = new.is_empty();
        let new_is_piston = new.is_piston();
        let refresh = needs_redstone_refresh(&old) || needs_redstone_refresh(new);

        // 1
        if new_is_member {
            self.redstone.add(position);
        } else {
            self.redstone.remove(position);
        }
        // 2
        if refresh {
            self.refresh_redstone_pass();
        }
        // 3
        self.update_weak_charge(position);
        if new_is_piston {
            self.update_piston(position);
        }
        // 4
        if new_is_empty {
            self.sever_rail_connections(position);
        }
        // 5
        let mut touched_powerable = false;
        for cell in std::iter::once(position).chain(position.orthogonal_positions()) {
            self.determine_rail_type(cell);
            touched_powerable |= self.get_block_at(cell).is_some_and(|b| b.is_powerable_rail());
        }
        if touched_powerable || old.is_powerable_rail() {
            self.power_rails();
        }
        // 6
        self.notices.push(PlaneNotice::RefreshCell(position));
        for neighbour in position.orthogonal_positions() {
            if self.in_bounds(neighbour) {
                self.notices.push(PlaneNotice::RefreshCell(neighbour));
            }
        }
        // 7
        self.resolve_conduits();
    }

    // -----------------------------------------------------------------------
    // Redstone
    // -----------------------------------------------------------------------

    fn refresh_redstone_pass(&mut self) {
        trace!("redstone refresh: {} components", self.redstone.component_count());
        self.power_redstone();
        self.power_all_blocks();
        self.power_rails();
        self.update_iron_doors();
        self.update_all_pistons();
    }

    /// 4-bit mask of orthogonal neighbours a wire at `position` joins.
    fn redstone_mask(&self, position: Position) -> u8 {
        FacingDirection::ALL
            .into_iter()
            .filter(|&d| {
                self.get_block_at(position.forward(d))
                    .is_some_and(|b| b.is_redstone() || b.is_connected_to_redstone())
            })
            .fold(0, |mask, d| mask | d.mask_bit())
    }

    fn power_redstone(&mut self) {
        let components: Vec<Vec<Position>> = self.redstone.components().map(<[_]>::to_vec).collect();
        for component in components {
            let powered = component
                .iter()
                .any(|&p| self.get_block_at(p).is_some_and(|b| b.is_redstone_battery()));
            for p in component {
                let mask = self.redstone_mask(p);
                if let Some(block) = self.block_mut(p) {
                    block.state.powered = powered;
                    if block.is_redstone() {
                        block.set_variant(redstone_sprite(mask, powered));
                    }
                }
            }
        }
    }

    /// Whether an orthogonal neighbour of `position` (other than `except`)
    /// is a live power source.
    fn has_power_source_near(&self, position: Position, except: Option<Position>) -> bool {
        position
            .orthogonal_positions()
            .into_iter()
            .filter(|&n| Some(n) != except)
            .filter_map(|n| self.get_block_at(n))
            .any(|b| b.is_redstone_battery() || (b.is_redstone() && b.is_powered()))
    }

    fn update_weak_charge(&mut self, position: Position) {
        let Some(block) = self.get_block_at(position) else {
            return;
        };
        if !block.is_weakly_powerable() || block.is_rail() {
            return;
        }
        let powered = self.has_power_source_near(position, None);
        if let Some(block) = self.block_mut(position) {
            block.state.powered = powered;
        }
    }

    fn power_all_blocks(&mut self) {
        for position in self.positions() {
            self.update_weak_charge(position);
        }
    }

    fn update_iron_doors(&mut self) {
        for position in self.positions() {
            let Some(block) = self.get_block_at(position) else {
                continue;
            };
            if !block.is_iron_door() {
                continue;
            }
            let should_open = self.has_power_source_near(position, None);
            if let Some(block) = self.block_mut(position)
                && block.state.open != should_open
            {
                block.state.open = should_open;
                self.notices.push(PlaneNotice::DoorAnimation {
                    position,
                    open: should_open,
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Rails
    // -----------------------------------------------------------------------

    fn sever_rail_connections(&mut self, position: Position) {
        for direction in FacingDirection::ALL {
            let toward = direction.opposite();
            let Some(neighbour) = self.block_mut(position.forward(direction)) else {
                continue;
            };
            if !neighbour.is_rail() || !neighbour.connects_toward(toward) {
                continue;
            }
            let state = &mut neighbour.state;
            if state.connection_a == Some(toward) {
                state.connection_a = state.connection_b.take();
            } else {
                state.connection_b = None;
            }
        }
    }

    /// Fills in missing rail endpoints from the neighbours and rebuilds the
    /// rail's tag.
    fn determine_rail_type(&mut self, position: Position) {
        let Some(block) = self.get_block_at(position) else {
            return;
        };
        if !block.is_rail() || block.is_fully_connected() {
            return;
        }
        let powerable = block.is_powerable_rail();
        let existing = block.state.connection_a;

        let mut mask = 0u8;
        for direction in FacingDirection::ALL {
            let compatible = self.get_block_at(position.forward(direction)).is_some_and(|n| {
                n.is_rail() && (n.connects_toward(direction.opposite()) || !n.is_fully_connected())
            });
            if compatible {
                mask |= direction.mask_bit();
            }
        }

        let table = if powerable {
            &POWERED_RAIL_CONNECTION_PRIORITY
        } else {
            &RAIL_CONNECTION_PRIORITY
        };
        let [first, second] = table[usize::from(mask)];
        let (a, b) = match existing {
            None => (first, second),
            Some(a) => {
                let b = if first == Some(a) {
                    second
                } else if second == Some(a) {
                    first
                } else if mask & a.opposite().mask_bit() != 0 {
                    Some(a.opposite())
                } else if powerable {
                    None
                } else {
                    FacingDirection::ALL
                        .into_iter()
                        .find(|&d| d != a && mask & d.mask_bit() != 0)
                };
                (Some(a), b.filter(|&d| d != a))
            }
        };

        if let Some(block) = self.block_mut(position) {
            block.state.connection_a = a;
            block.state.connection_b = b;
            let name = block.rail_type_name();
            block.set_variant(name);
        }
    }

    /// Groups powerable rails that connect to each other along their axis
    /// and powers every rail in a group touching a power source.
    fn power_rails(&mut self) {
        let components: Vec<Vec<Position>> = {
            let blocks = &*self;
            let mut rails = AdjacencySet::with_predicate(|a: Position, b: Position| {
                let Some(direction) = a.direction_to(b) else {
                    return false;
                };
                match (blocks.get_block_at(a), blocks.get_block_at(b)) {
                    (Some(x), Some(y)) => {
                        x.is_powerable_rail()
                            && y.is_powerable_rail()
                            && x.connects_toward(direction)
                            && y.connects_toward(direction.opposite())
                    }
                    _ => false,
                }
            });
            for position in self.positions() {
                if self.get_block_at(position).is_some_and(|b| b.is_powerable_rail()) {
                    rails.add(position);
                }
            }
            rails.components().map(<[_]>::to_vec).collect()
        };

        for component in components {
            let powered = component
                .iter()
                .any(|&p| self.has_power_source_near(p, None));
            for p in component {
                if let Some(block) = self.block_mut(p)
                    && block.state.powered != powered
                {
                    block.state.powered = powered;
                    let name = block.rail_type_name();
                    block.set_variant(name);
                    self.notices.push(PlaneNotice::RefreshCell(p));
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pistons
    // -----------------------------------------------------------------------

    fn update_all_pistons(&mut self) {
        for position in self.positions() {
            if self.get_block_at(position).is_some_and(|b| b.is_piston()) {
                self.update_piston(position);
            }
        }
    }

    fn update_piston(&mut self, position: Position) {
        let Some(block) = self.get_block_at(position) else {
            return;
        };
        let Some(facing) = block.piston_facing() else {
            return;
        };
        let extended = block.is_extended_piston();
        let front = position.forward(facing);
        let powered = self.has_power_source_near(position, Some(front));
        if powered && !extended {
            self.activate_piston(position, facing);
        } else if !powered && extended {
            self.deactivate_piston(position, facing);
        }
    }

    /// Cells to shift when pushing from `front` toward `direction`, nearest
    /// first. `None` when the chain hits a non-pushable block or the edge.
    pub fn get_blocks_to_push(&self, front: Position, direction: FacingDirection) -> Option<Vec<Position>> {
        let mut chain = Vec::new();
        let mut cursor = front;
        loop {
            let block = self.get_block_at(cursor)?;
            if block.is_empty() || block.is_destroyable_upon_push() {
                return Some(chain);
            }
            if !block.is_pushable() {
                return None;
            }
            chain.push(cursor);
            cursor = cursor.forward(direction);
        }
    }

    fn activate_piston(&mut self, position: Position, facing: FacingDirection) {
        let front = position.forward(facing);
        if self.occupied.contains(&front) {
            trace!("piston at {position} blocked by entity at {front}");
            return;
        }
        let Some(front_block) = self.get_block_at(front) else {
            return;
        };
        let sticky = self
            .get_block_at(position)
            .is_some_and(|b| b.is_sticky_piston());
        let arm = LevelBlock::new(&piston_arm_type_name(facing, sticky));

        if front_block.is_destroyable_upon_push() {
            self.notices.push(PlaneNotice::Explosion(front));
            self.pending.push_back((front, LevelBlock::empty()));
        } else if !front_block.is_empty() {
            let Some(chain) = self.get_blocks_to_push(front, facing) else {
                trace!("piston at {position} cannot push");
                return;
            };
            if let Some(&last) = chain.last() {
                let destination = last.forward(facing);
                if self
                    .get_block_at(destination)
                    .is_some_and(|b| b.is_destroyable_upon_push())
                {
                    self.notices.push(PlaneNotice::Explosion(destination));
                }
            }
            for &cell in chain.iter().rev() {
                if let Some(moved) = self.get_block_at(cell).cloned() {
                    self.pending.push_back((cell.forward(facing), moved));
                }
            }
        }
        self.pending.push_back((front, arm));
        if let Some(base) = self.block_mut(position) {
            base.set_variant(piston_type_name(facing, true, sticky));
        }
        self.notices.push(PlaneNotice::RefreshCell(position));
    }

    fn deactivate_piston(&mut self, position: Position, facing: FacingDirection) {
        let front = position.forward(facing);
        let sticky = self
            .get_block_at(position)
            .is_some_and(|b| b.is_sticky_piston());
        if let Some(base) = self.block_mut(position) {
            base.set_variant(piston_type_name(facing, false, sticky));
        }
        self.notices.push(PlaneNotice::RefreshCell(position));
        self.retract_arm(front, facing, sticky);
    }

    fn retract_arm(&mut self, front: Position, facing: FacingDirection, sticky: bool) {
        if !self.get_block_at(front).is_some_and(|b| b.is_piston_arm()) {
            return;
        }
        let attached = front.forward(facing);
        let pulled = self
            .get_block_at(attached)
            .filter(|b| sticky && !b.is_empty() && b.is_stickable() && b.is_pushable())
            .cloned();
        match pulled {
            Some(block) => {
                self.pending.push_back((front, block));
                self.pending.push_back((attached, LevelBlock::empty()));
            }
            None => self.pending.push_back((front, LevelBlock::empty())),
        }
    }

    // -----------------------------------------------------------------------
    // Conduits
    // -----------------------------------------------------------------------

    fn resolve_conduits(&mut self) {
        for position in self.positions() {
            if !self.get_block_at(position).is_some_and(|b| b.is_conduit()) {
                continue;
            }
            let framed = position
                .ring(2)
                .iter()
                .all(|&p| self.get_block_at(p).is_some_and(|b| b.block_type() == "prismarine"));
            let hollow = position
                .ring(1)
                .iter()
                .all(|&p| self.get_block_at(p).is_some_and(|b| b.is_empty()));
            let active = framed && hollow;
            if let Some(block) = self.block_mut(position)
                && block.state.activated_conduit != active
            {
                block.state.activated_conduit = active;
                self.notices.push(PlaneNotice::ConduitAnimation { position, active });
            }
        }
    }
}

fn needs_redstone_refresh(block: &LevelBlock) -> bool {
    block.is_redstone() || block.is_empty() || (block.is_connected_to_redstone() && !block.is_piston())
}
