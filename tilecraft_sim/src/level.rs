// The live level: planes, entities, and everything derived from them.
//
// `LevelModel` is the composition root of the world. It owns the four block
// planes, the entities (a `Vec` in spawn order, which is also tick order),
// the collectible miniblocks lying on the floor, the death counter, the
// score, and the derived fog-of-war and shading maps. It is rebuilt from the
// frozen `LevelConfig` on every `reset`.
//
// Construction is the only fallible step (`LevelModel::new`): plane
// lengths, block tags, entity types, and start positions are validated up
// front so an attempt can never trip over bad level data half-way through.
//
// Action-plane tags that name a registered entity type spawn that entity
// (facing south) and leave an empty cell; tags ending in `Miniblock` become
// floor miniblocks.
//
// Movement legality (`can_move_direction` and friends) runs, in order:
//
// 1. bounds,
// 2. entity collision: a `Block` entity stops the move; a `PassThrough`
//    entity (a boat) lets the mover share the cell; `Consumed` entities
//    (fish) are destroyed when the move is applied,
// 3. player liquid rules: under direct control the player refuses to step
//    into water or lava; under procedural control it may, and the move
//    carries a `Hazard` the caller turns into a death. Sharing a cell with
//    a boat makes liquid safe,
// 4. the entity's own `has_permission_to_walk`.
//
// `move_entity` applies a checked move: it destroys consumed entities,
// releases and presses pressure plates, and picks up miniblocks. The legality
// check and the mutation share `check_move`, so they cannot disagree.
//
// Every action or ground edit recomputes shading and fog wholesale. Plane
// notices are gathered here and drained by the controller.
//
// See also: `plane.rs` for the edit pipeline, `entity.rs` for per-type
// policy, `controller.rs` which drives commands against this model.

use crate::block::LevelBlock;
use crate::command::Hazard;
use crate::config::{Condition, GameConfig, LevelConfig, to_position};
use crate::entity::{Cell, EntityRegistry, LevelEntity, MoveThrough, Placement};
use crate::error::LevelError;
use crate::fog::{FogType, solve_fow_type_for_map};
use crate::plane::{LevelPlane, PlaneNotice, PlaneType};
use crate::shading::{CellShading, compute_shading};
use crate::types::{EntityId, FacingDirection, Position};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tilecraft_prng::GameRng;

/// A collectible item lying on a cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Miniblock {
    pub position: Position,
    pub item: String,
}

/// Outcome of a movement legality check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveCheck {
    pub allowed: bool,
    pub target: Position,
    /// The move is allowed but fatal on arrival.
    pub hazard: Option<Hazard>,
    /// Set when another entity is what stopped the move.
    pub blocking_entity: Option<EntityId>,
    /// Entities destroyed by the mover entering their cell.
    pub consumed: Vec<EntityId>,
}

impl MoveCheck {
    fn blocked(target: Position) -> Self {
        Self {
            allowed: false,
            target,
            hazard: None,
            blocking_entity: None,
            consumed: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn check_plane_length(
    plane: &'static str,
    tags: &[String],
    expected: usize,
    required: bool,
) -> Result<(), LevelError> {
    if tags.len() == expected || (!required && tags.is_empty()) {
        return Ok(());
    }
    Err(LevelError::PlaneLengthMismatch {
        plane,
        expected,
        actual: tags.len(),
    })
}

fn check_tags(
    plane: &'static str,
    tags: &[String],
    width: i32,
    is_entity: impl Fn(&str) -> bool,
) -> Result<(), LevelError> {
    for (index, tag) in tags.iter().enumerate() {
        if is_entity(tag) || crate::block::is_known_block_type(tag) {
            continue;
        }
        let index = index as i32;
        return Err(LevelError::UnknownBlockType {
            plane,
            position: Position::new(index % width, index / width),
            block_type: tag.clone(),
        });
    }
    Ok(())
}

fn validate(config: &LevelConfig, registry: &EntityRegistry) -> Result<(), LevelError> {
    let (width, height) = (config.width(), config.height());
    if width <= 0 || height <= 0 {
        return Err(LevelError::EmptyGrid { width, height });
    }
    let expected = (i64::from(width) * i64::from(height)) as usize;
    check_plane_length("ground", &config.ground_plane, expected, true)?;
    check_plane_length("action", &config.action_plane, expected, false)?;
    check_plane_length("decoration", &config.ground_decoration_plane, expected, false)?;
    check_plane_length("fluff", &config.fluff_plane, expected, false)?;
    check_tags("ground", &config.ground_plane, width, |_| false)?;
    check_tags("action", &config.action_plane, width, |t| registry.contains(t))?;

    let in_bounds = |p: Position| p.x >= 0 && p.y >= 0 && p.x < width && p.y < height;
    for (entity_type, x, y, _) in &config.entities {
        if !registry.contains(entity_type) {
            return Err(LevelError::UnknownEntityType(entity_type.clone()));
        }
        let position = Position::new(*x, *y);
        if !in_bounds(position) {
            return Err(LevelError::StartOutOfBounds {
                what: "entity",
                position,
            });
        }
    }
    if config.use_player && !in_bounds(config.player_start()) {
        return Err(LevelError::StartOutOfBounds {
            what: "player",
            position: config.player_start(),
        });
    }
    if config.use_agent && !in_bounds(config.agent_start()) {
        return Err(LevelError::StartOutOfBounds {
            what: "agent",
            position: config.agent_start(),
        });
    }
    Ok(())
}

fn plane_or_empty(plane_type: PlaneType, width: i32, height: i32, tags: &[String]) -> LevelPlane {
    if tags.is_empty() {
        LevelPlane::empty(plane_type, width, height)
    } else {
        LevelPlane::new(plane_type, width, height, tags)
    }
}

// ---------------------------------------------------------------------------
// LevelModel
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct LevelModel {
    config: LevelConfig,
    game_config: GameConfig,
    registry: EntityRegistry,
    ground: LevelPlane,
    action: LevelPlane,
    decoration: LevelPlane,
    fluff: LevelPlane,
    entities: Vec<LevelEntity>,
    miniblocks: Vec<Miniblock>,
    death_counts: BTreeMap<String, u32>,
    is_daytime: bool,
    fow: Vec<FogType>,
    shading: Vec<CellShading>,
    score: i64,
    next_serial: u64,
    notices: Vec<(PlaneType, PlaneNotice)>,
}

impl LevelModel {
    /// Validates `config` and builds the initial world with the default
    /// entity registry.
    pub fn new(config: LevelConfig, game_config: GameConfig) -> Result<Self, LevelError> {
        let registry = EntityRegistry::with_defaults(&game_config);
        Self::with_registry(config, game_config, registry)
    }

    pub fn with_registry(
        config: LevelConfig,
        game_config: GameConfig,
        registry: EntityRegistry,
    ) -> Result<Self, LevelError> {
        validate(&config, &registry)?;
        let (width, height) = (config.width(), config.height());
        let mut level = Self {
            ground: LevelPlane::empty(PlaneType::Ground, width, height),
            action: LevelPlane::empty(PlaneType::Action, width, height),
            decoration: LevelPlane::empty(PlaneType::Decoration, width, height),
            fluff: LevelPlane::empty(PlaneType::Fluff, width, height),
            is_daytime: config.is_daytime,
            config,
            game_config,
            registry,
            entities: Vec::new(),
            miniblocks: Vec::new(),
            death_counts: BTreeMap::new(),
            fow: Vec::new(),
            shading: Vec::new(),
            score: 0,
            next_serial: 0,
            notices: Vec::new(),
        };
        level.reset();
        info!(
            "level loaded: {width}x{height}, {} entities, {} miniblocks",
            level.entities.len(),
            level.miniblocks.len()
        );
        Ok(level)
    }

    /// Rebuilds every plane and entity from the level config.
    pub fn reset(&mut self) {
        let (width, height) = (self.config.width(), self.config.height());
        let area = (width * height) as usize;

        self.miniblocks.clear();
        let mut plane_entities = Vec::new();
        let mut action_tags = Vec::with_capacity(area);
        for (index, tag) in self.config.action_plane.iter().enumerate() {
            let index = index as i32;
            let position = Position::new(index % width, index / width);
            if self.registry.contains(tag) {
                plane_entities.push((tag.clone(), position));
                action_tags.push(String::new());
            } else if let Some(item) = tag.strip_suffix("Miniblock") {
                self.miniblocks.push(Miniblock {
                    position,
                    item: item.to_string(),
                });
                action_tags.push(String::new());
            } else {
                action_tags.push(tag.clone());
            }
        }

        self.ground = LevelPlane::new(PlaneType::Ground, width, height, &self.config.ground_plane);
        self.action = plane_or_empty(PlaneType::Action, width, height, &action_tags);
        self.decoration =
            plane_or_empty(PlaneType::Decoration, width, height, &self.config.ground_decoration_plane);
        self.fluff = plane_or_empty(PlaneType::Fluff, width, height, &self.config.fluff_plane);

        self.entities.clear();
        self.death_counts.clear();
        self.score = 0;
        self.next_serial = 0;
        self.is_daytime = self.config.is_daytime;

        if self.config.use_player {
            let (start, facing) = (self.config.player_start(), self.config.player_start_direction);
            self.spawn_entity(EntityId::PLAYER, start, facing);
        }
        if self.config.use_agent {
            let (start, facing) = (self.config.agent_start(), self.config.agent_start_direction);
            self.spawn_entity(EntityId::AGENT, start, facing);
        }
        for (entity_type, x, y, facing) in self.config.entities.clone() {
            self.spawn_entity(&entity_type, Position::new(x, y), facing);
        }
        for (entity_type, position) in plane_entities {
            self.spawn_entity(&entity_type, position, FacingDirection::South);
        }

        self.recompute_derived();
        self.notices.clear();
        self.action.take_notices();
        self.ground.take_notices();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub fn game_config(&self) -> &GameConfig {
        &self.game_config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn width(&self) -> i32 {
        self.config.width()
    }

    pub fn height(&self) -> i32 {
        self.config.height()
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        self.action.in_bounds(position)
    }

    pub fn plane(&self, plane_type: PlaneType) -> &LevelPlane {
        match plane_type {
            PlaneType::Ground => &self.ground,
            PlaneType::Action => &self.action,
            PlaneType::Decoration => &self.decoration,
            PlaneType::Fluff => &self.fluff,
        }
    }

    fn plane_mut(&mut self, plane_type: PlaneType) -> &mut LevelPlane {
        match plane_type {
            PlaneType::Ground => &mut self.ground,
            PlaneType::Action => &mut self.action,
            PlaneType::Decoration => &mut self.decoration,
            PlaneType::Fluff => &mut self.fluff,
        }
    }

    pub fn action_plane(&self) -> &LevelPlane {
        &self.action
    }

    pub fn ground_plane(&self) -> &LevelPlane {
        &self.ground
    }

    pub fn is_daytime(&self) -> bool {
        self.is_daytime
    }

    /// Fog per cell, row-major. All `Lit` during the day.
    pub fn fog(&self) -> &[FogType] {
        &self.fow
    }

    pub fn shading(&self) -> &[CellShading] {
        &self.shading
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn add_score(&mut self, amount: i64) {
        self.score += amount;
    }

    pub fn death_count(&self, entity_type: &str) -> u32 {
        self.death_counts.get(entity_type).copied().unwrap_or(0)
    }

    pub fn miniblocks(&self) -> &[Miniblock] {
        &self.miniblocks
    }

    pub fn take_notices(&mut self) -> Vec<(PlaneType, PlaneNotice)> {
        self.collect_plane_notices();
        std::mem::take(&mut self.notices)
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    pub fn entities(&self) -> &[LevelEntity] {
        &self.entities
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| e.identifier.clone()).collect()
    }

    fn index_of(&self, id: &EntityId) -> Option<usize> {
        self.entities.iter().position(|e| &e.identifier == id)
    }

    pub fn entity(&self, id: &EntityId) -> Option<&LevelEntity> {
        self.entities.iter().find(|e| &e.identifier == id)
    }

    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut LevelEntity> {
        self.entities.iter_mut().find(|e| &e.identifier == id)
    }

    pub fn player(&self) -> Option<&LevelEntity> {
        self.entity(&EntityId::player())
    }

    pub fn entities_of_type<'a>(&'a self, entity_type: &'a str) -> impl Iterator<Item = &'a LevelEntity> {
        self.entities.iter().filter(move |e| e.entity_type == entity_type)
    }

    pub fn entities_at(&self, position: Position) -> impl Iterator<Item = &LevelEntity> {
        self.entities.iter().filter(move |e| e.position == position)
    }

    /// Adds an entity. The player and agent keep their fixed identifiers;
    /// everything else is numbered in spawn order.
    pub fn spawn_entity(
        &mut self,
        entity_type: &str,
        position: Position,
        facing: FacingDirection,
    ) -> Option<EntityId> {
        if !self.in_bounds(position) {
            warn!("spawn of {entity_type:?} at {position} is out of bounds");
            return None;
        }
        let Some(behavior) = self.registry.create(&self.game_config, entity_type) else {
            warn!("no entity factory for {entity_type:?}");
            return None;
        };
        let identifier = if entity_type == EntityId::PLAYER || entity_type == EntityId::AGENT {
            EntityId::new(entity_type)
        } else {
            let id = EntityId::new(format!("{entity_type}{}", self.next_serial));
            self.next_serial += 1;
            id
        };
        if self.index_of(&identifier).is_some() {
            warn!("entity {identifier} already exists");
            return None;
        }
        let mut entity = LevelEntity::new(
            identifier.clone(),
            entity_type,
            position,
            facing,
            self.game_config.default_health_points,
            behavior,
        );
        entity.is_burning = self.is_daytime && entity.behavior().burns_in_daylight();
        self.entities.push(entity);
        self.sync_occupied();
        self.update_pressure_plate(position);
        Some(identifier)
    }

    /// Removes an entity and counts it as a death of its type.
    pub fn destroy_entity(&mut self, id: &EntityId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let entity = self.entities.remove(index);
        *self.death_counts.entry(entity.entity_type.clone()).or_insert(0) += 1;
        self.sync_occupied();
        self.update_pressure_plate(entity.position);
        true
    }

    /// Lowers health; returns what is left.
    pub fn damage_entity(&mut self, id: &EntityId, amount: i32) -> Option<i32> {
        let entity = self.entity_mut(id)?;
        entity.health_point -= amount;
        Some(entity.health_point)
    }

    /// Sets health to zero. Mobs drop their item and are removed; the player
    /// and agent stay on the board, dead.
    pub fn kill_entity(&mut self, id: &EntityId) -> bool {
        let Some(entity) = self.entity_mut(id) else {
            return false;
        };
        entity.health_point = 0;
        if entity.is_player() || entity.is_agent() {
            return true;
        }
        let position = entity.position;
        let drop = entity.behavior().drop_item().map(str::to_string);
        if let Some(item) = drop {
            self.spawn_miniblock(position, &item);
        }
        self.destroy_entity(id)
    }

    fn sync_occupied(&mut self) {
        let occupied: Vec<Position> = self.entities.iter().map(|e| e.position).collect();
        self.action.set_occupied(occupied);
    }

    /// Entities in draw order: by row, then by sort offset. Stable.
    pub fn render_order(&self) -> Vec<&LevelEntity> {
        let mut order: Vec<&LevelEntity> = self.entities.iter().collect();
        order.sort_by_key(|e| (e.position.y, e.behavior().sort_order_offset()));
        order
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    pub fn can_move_direction(&self, id: &EntityId, direction: FacingDirection) -> Option<MoveCheck> {
        let entity = self.entity(id)?;
        Some(self.check_move(entity, entity.position.forward(direction)))
    }

    pub fn can_move_forward(&self, id: &EntityId) -> Option<MoveCheck> {
        let facing = self.entity(id)?.facing;
        self.can_move_direction(id, facing)
    }

    pub fn can_move_backward(&self, id: &EntityId) -> Option<MoveCheck> {
        let facing = self.entity(id)?.facing;
        self.can_move_direction(id, facing.opposite())
    }

    fn check_move(&self, mover: &LevelEntity, target: Position) -> MoveCheck {
        let (Some(action), Some(ground)) = (self.action.get_block_at(target), self.ground.get_block_at(target)) else {
            return MoveCheck::blocked(target);
        };

        let mut shared = false;
        let mut consumed = Vec::new();
        for other in self.entities_at(target).filter(|e| e.identifier != mover.identifier) {
            match other.behavior().can_move_through() {
                MoveThrough::Block => {
                    return MoveCheck {
                        blocking_entity: Some(other.identifier.clone()),
                        ..MoveCheck::blocked(target)
                    };
                }
                MoveThrough::PassThrough => shared = true,
                MoveThrough::Consumed => consumed.push(other.identifier.clone()),
            }
        }

        let mut hazard = None;
        if mover.is_player() && ground.is_liquid() && !shared {
            if self.config.is_direct_player_control {
                return MoveCheck::blocked(target);
            }
            hazard = Some(if ground.block_type() == "lava" {
                Hazard::Burn
            } else {
                Hazard::Drown
            });
        }

        if !mover.behavior().has_permission_to_walk(Cell { action, ground }, shared) {
            return MoveCheck::blocked(target);
        }
        MoveCheck {
            allowed: true,
            target,
            hazard,
            blocking_entity: None,
            consumed,
        }
    }

    /// Applies a move that `check` allowed.
    pub fn move_entity(&mut self, id: &EntityId, check: &MoveCheck) -> bool {
        if !check.allowed || self.index_of(id).is_none() {
            return false;
        }
        for eaten in &check.consumed {
            self.destroy_entity(eaten);
        }
        let Some(entity) = self.entity_mut(id) else {
            return false;
        };
        let from = entity.position;
        entity.position = check.target;
        self.sync_occupied();
        self.update_pressure_plate(from);
        self.update_pressure_plate(check.target);
        self.collect_miniblocks(id);
        true
    }

    /// Presses or releases the plate at `position` to match whoever stands
    /// on it.
    fn update_pressure_plate(&mut self, position: Position) {
        let Some(block) = self.action.get_block_at(position) else {
            return;
        };
        if !block.block_type().starts_with("pressurePlate") {
            return;
        }
        let down = block.block_type() == "pressurePlateDown";
        let pressed = self
            .entities_at(position)
            .any(|e| e.is_alive() && e.behavior().can_trigger_pressure_plates());
        if pressed != down {
            let tag = if pressed { "pressurePlateDown" } else { "pressurePlateUp" };
            self.set_block(PlaneType::Action, position, LevelBlock::new(tag));
        }
    }

    // -----------------------------------------------------------------------
    // Miniblocks
    // -----------------------------------------------------------------------

    pub fn spawn_miniblock(&mut self, position: Position, item: &str) {
        if !self.in_bounds(position) || item.is_empty() {
            return;
        }
        self.miniblocks.push(Miniblock {
            position,
            item: item.to_string(),
        });
        self.notices.push((PlaneType::Action, PlaneNotice::RefreshCell(position)));
    }

    fn collect_miniblocks(&mut self, id: &EntityId) {
        let Some(entity) = self.entity(id) else {
            return;
        };
        if !entity.behavior().collects_miniblocks() {
            return;
        }
        let position = entity.position;
        let (picked, left): (Vec<Miniblock>, Vec<Miniblock>) = std::mem::take(&mut self.miniblocks)
            .into_iter()
            .partition(|m| m.position == position);
        self.miniblocks = left;
        if picked.is_empty() {
            return;
        }
        if let Some(entity) = self.entity_mut(id) {
            for miniblock in &picked {
                entity.add_to_inventory(&miniblock.item, 1);
            }
        }
        self.notices.push((PlaneType::Action, PlaneNotice::RefreshCell(position)));
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    /// Writes a block through the plane's edit pipeline and refreshes derived
    /// maps when the action or ground plane changed.
    pub fn set_block(&mut self, plane: PlaneType, position: Position, block: LevelBlock) -> bool {
        if !self.plane_mut(plane).set_block_at(position, block) {
            return false;
        }
        self.collect_plane_notices();
        if matches!(plane, PlaneType::Action | PlaneType::Ground) {
            self.recompute_derived();
        }
        true
    }

    pub fn block_at(&self, plane: PlaneType, position: Position) -> Option<&LevelBlock> {
        self.plane(plane).get_block_at(position)
    }

    /// Where `id` could put `block_type` at `position`. A non-walkable block
    /// never lands on a cell an entity stands on.
    pub fn can_place_block_at(&self, id: &EntityId, block_type: &str, position: Position) -> Placement {
        let Some(placer) = self.entity(id) else {
            return Placement::REFUSED;
        };
        let (Some(action), Some(ground)) = (self.action.get_block_at(position), self.ground.get_block_at(position)) else {
            return Placement::REFUSED;
        };
        let block = LevelBlock::new(block_type);
        if !placer.behavior().can_place_block(&block) {
            return Placement::REFUSED;
        }
        let placement = placer.behavior().can_place_block_over(&block, Cell { action, ground });
        let occupied = self.entities_at(position).next().is_some();
        if placement.can_place && placement.plane == PlaneType::Action && !block.is_walkable() && occupied {
            return Placement::REFUSED;
        }
        placement
    }

    pub fn can_place_block_direction(&self, id: &EntityId, block_type: &str, direction: FacingDirection) -> Placement {
        match self.entity(id) {
            Some(entity) => self.can_place_block_at(id, block_type, entity.position.forward(direction)),
            None => Placement::REFUSED,
        }
    }

    pub fn get_plane_to_place_on(&self, id: &EntityId, block_type: &str, position: Position) -> Option<PlaneType> {
        let placement = self.can_place_block_at(id, block_type, position);
        placement.can_place.then_some(placement.plane)
    }

    pub fn place_block(&mut self, plane: PlaneType, position: Position, block_type: &str) -> bool {
        self.set_block(plane, position, LevelBlock::new(block_type))
    }

    /// Empties a destroyable action cell and leaves its miniblock behind.
    /// Returns the dropped item.
    pub fn destroy_block(&mut self, position: Position) -> Option<String> {
        let block = self.action.get_block_at(position)?;
        if block.is_empty() || !block.is_destroyable() {
            return None;
        }
        let item = block.miniblock_frame();
        self.set_block(PlaneType::Action, position, LevelBlock::empty());
        self.spawn_miniblock(position, &item);
        Some(item)
    }

    /// Turns tillable ground under an empty action cell into farmland, wet
    /// if water lies within two cells.
    pub fn till_soil(&mut self, position: Position) -> bool {
        let tillable = self.ground.get_block_at(position).is_some_and(LevelBlock::is_tillable)
            && self.action.get_block_at(position).is_some_and(LevelBlock::is_empty);
        if !tillable {
            return false;
        }
        let wet = (1..=2).flat_map(|r| position.ring(r)).any(|p| {
            self.ground
                .get_block_at(p)
                .is_some_and(|b| b.block_type() == "water")
        });
        let tag = if wet { "farmlandWet" } else { "farmland" };
        self.place_block(PlaneType::Ground, position, tag)
    }

    /// Toggles a wooden door. Iron doors only follow redstone.
    pub fn toggle_door(&mut self, position: Position) -> Option<bool> {
        let block = self.action.get_block_at(position)?;
        if !block.is_door() || block.is_iron_door() {
            return None;
        }
        let open = self.action.toggle_door(position)?;
        self.collect_plane_notices();
        Some(open)
    }

    /// Destroys every destroyable action block within `radius` (Chebyshev)
    /// of `center`. Nothing drops. Returns the cleared cells.
    pub fn explode(&mut self, center: Position, radius: i32) -> Vec<Position> {
        let mut cleared = Vec::new();
        for r in 0..=radius.max(0) {
            for position in center.ring(r) {
                let destroyable = self
                    .action
                    .get_block_at(position)
                    .is_some_and(|b| !b.is_empty() && b.is_destroyable());
                if destroyable && self.set_block(PlaneType::Action, position, LevelBlock::empty()) {
                    cleared.push(position);
                }
            }
        }
        self.notices.push((PlaneType::Action, PlaneNotice::Explosion(center)));
        cleared
    }

    /// Empty action cell, standable ground, and nobody there.
    pub fn is_position_empty(&self, position: Position) -> bool {
        let open = self.action.get_block_at(position).is_some_and(LevelBlock::is_empty);
        let solid_ground = self.ground.get_block_at(position).is_some_and(|b| !b.is_liquid());
        open && solid_ground && self.entities_at(position).next().is_none()
    }

    /// Random empty cell, falling back to the first empty cell in row-major
    /// order once the random tries run out.
    pub fn random_empty_position(&self, rng: &mut GameRng) -> Option<Position> {
        let (width, height) = (self.width() as u64, self.height() as u64);
        for _ in 0..self.game_config.random_spawn_attempts {
            let x = rng.below(width) as i32;
            let y = rng.below(height) as i32;
            let candidate = Position::new(x, y);
            if self.is_position_empty(candidate) {
                return Some(candidate);
            }
        }
        self.action.positions().find(|&p| self.is_position_empty(p))
    }

    // -----------------------------------------------------------------------
    // Day / night and derived maps
    // -----------------------------------------------------------------------

    pub fn set_daytime(&mut self, is_daytime: bool) {
        self.is_daytime = is_daytime;
        for entity in &mut self.entities {
            entity.is_burning = is_daytime && entity.behavior().burns_in_daylight();
        }
        self.recompute_fog();
    }

    fn recompute_fog(&mut self) {
        self.fow = if self.is_daytime {
            vec![FogType::Lit; self.action.blocks().len()]
        } else {
            solve_fow_type_for_map(&self.action, &self.ground)
        };
    }

    fn recompute_derived(&mut self) {
        self.shading = compute_shading(&self.action);
        self.recompute_fog();
    }

    fn collect_plane_notices(&mut self) {
        for plane in [PlaneType::Ground, PlaneType::Action, PlaneType::Decoration, PlaneType::Fluff] {
            let notices = self.plane_mut(plane).take_notices();
            self.notices.extend(notices.into_iter().map(|n| (plane, n)));
        }
    }
}

// ---------------------------------------------------------------------------
// Condition evaluation
// ---------------------------------------------------------------------------

impl Condition {
    pub fn evaluate(&self, level: &LevelModel) -> bool {
        match self {
            Condition::Always => true,
            Condition::Never => false,
            Condition::BlockAt {
                plane,
                position,
                block_type,
            } => level
                .block_at(*plane, to_position(*position))
                .is_some_and(|b| b.block_type() == block_type),
            Condition::EntityAt {
                entity_type,
                position,
            } => {
                let position = to_position(*position);
                level.entities_of_type(entity_type).any(|e| e.position == position)
            }
            Condition::InventoryCount { item, check } => {
                let count = level.player().map_or(0, |p| p.inventory_count(item));
                check.test(i64::from(count))
            }
            Condition::EntityCount { entity_type, check } => {
                let count = level.entities_of_type(entity_type).filter(|e| e.is_alive()).count();
                check.test(count as i64)
            }
            Condition::DeathCount { entity_type, check } => {
                check.test(i64::from(level.death_count(entity_type)))
            }
            Condition::PlayerAlive => level.player().is_some_and(LevelEntity::is_alive),
            Condition::Score { check } => check.test(level.score()),
            Condition::All { conditions } => conditions.iter().all(|c| c.evaluate(level)),
            Condition::Any { conditions } => conditions.iter().any(|c| c.evaluate(level)),
            Condition::Not { condition } => !condition.evaluate(level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CountCheck;

    /// Level from ASCII rows. Ground: `.` grass, `~` water, `L` lava.
    /// Action: `.` empty, `#` stone, `B` bedrock, `P` plate, anything else is
    /// looked up in `extra`.
    fn config(ground: &[&str], action: &[&str], extra: &[(char, &str)]) -> LevelConfig {
        let height = ground.len() as i32;
        let width = ground[0].len() as i32;
        let ground_plane = ground
            .iter()
            .flat_map(|row| row.chars())
            .map(|c| match c {
                '~' => "water",
                'L' => "lava",
                _ => "grass",
            })
            .map(str::to_string)
            .collect();
        let action_plane = action
            .iter()
            .flat_map(|row| row.chars())
            .map(|c| match c {
                '.' => String::new(),
                '#' => "stone".to_string(),
                'B' => "bedrock".to_string(),
                'P' => "pressurePlateUp".to_string(),
                other => extra
                    .iter()
                    .find(|(k, _)| *k == other)
                    .map(|(_, tag)| tag.to_string())
                    .unwrap_or_default(),
            })
            .collect();
        LevelConfig {
            grid_dimensions: [width, height],
            ground_plane,
            action_plane,
            ground_decoration_plane: Vec::new(),
            fluff_plane: Vec::new(),
            entities: Vec::new(),
            use_player: true,
            player_start_position: [0, 0],
            player_start_direction: FacingDirection::East,
            use_agent: false,
            agent_start_position: None,
            agent_start_direction: FacingDirection::South,
            is_daytime: true,
            is_direct_player_control: false,
            verification: None,
            failure_check: None,
            level_verification_timeout: None,
            special_level_type: None,
            seed: 7,
        }
    }

    fn level(ground: &[&str], action: &[&str]) -> LevelModel {
        LevelModel::new(config(ground, action, &[]), GameConfig::default()).unwrap()
    }

    fn player() -> EntityId {
        EntityId::player()
    }

    #[test]
    fn rejects_bad_level_data() {
        let game = GameConfig::default();

        let mut c = config(&["..."], &["..."], &[]);
        c.grid_dimensions = [0, 1];
        assert!(matches!(LevelModel::new(c, game.clone()), Err(LevelError::EmptyGrid { .. })));

        let mut c = config(&["..."], &["..."], &[]);
        c.ground_plane.pop();
        assert!(matches!(
            LevelModel::new(c, game.clone()),
            Err(LevelError::PlaneLengthMismatch { plane: "ground", .. })
        ));

        let c = config(&["..."], &[".x."], &[('x', "unobtainium")]);
        match LevelModel::new(c, game.clone()) {
            Err(LevelError::UnknownBlockType { position, .. }) => assert_eq!(position, Position::new(1, 0)),
            other => panic!("expected unknown block type, got {other:?}"),
        }

        let mut c = config(&["..."], &["..."], &[]);
        c.entities.push(("dragon".into(), 1, 0, FacingDirection::North));
        assert!(matches!(LevelModel::new(c, game.clone()), Err(LevelError::UnknownEntityType(_))));

        let mut c = config(&["..."], &["..."], &[]);
        c.player_start_position = [5, 0];
        assert!(matches!(
            LevelModel::new(c, game),
            Err(LevelError::StartOutOfBounds { what: "player", .. })
        ));
    }

    #[test]
    fn action_plane_entities_and_miniblocks_are_lifted_out() {
        let c = config(&["...."], &[".sm."], &[('s', "sheep"), ('m', "stoneMiniblock")]);
        let lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        assert_eq!(lvl.entity_ids(), vec![player(), EntityId::new("sheep0")]);
        assert_eq!(lvl.entity(&EntityId::new("sheep0")).unwrap().position, Position::new(1, 0));
        assert!(lvl.block_at(PlaneType::Action, Position::new(1, 0)).unwrap().is_empty());
        assert_eq!(
            lvl.miniblocks(),
            &[Miniblock {
                position: Position::new(2, 0),
                item: "stone".into()
            }]
        );
    }

    #[test]
    fn spawn_ids_are_fixed_or_numbered() {
        let mut c = config(&["....", "...."], &["....", "...."], &[]);
        c.use_agent = true;
        c.agent_start_position = Some([1, 1]);
        c.entities.push(("cow".into(), 2, 0, FacingDirection::West));
        c.entities.push(("cow".into(), 3, 0, FacingDirection::West));
        let lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        let ids: Vec<String> = lvl.entity_ids().into_iter().map(|id| id.0).collect();
        assert_eq!(ids, ["Player", "PlayerAgent", "cow0", "cow1"]);
    }

    #[test]
    fn move_check_and_move_agree() {
        let mut lvl = level(&["...."], &["..#."]);
        let check = lvl.can_move_forward(&player()).unwrap();
        assert!(check.allowed);
        assert_eq!(check.target, Position::new(1, 0));
        assert!(lvl.move_entity(&player(), &check));
        assert_eq!(lvl.player().unwrap().position, check.target);

        let blocked = lvl.can_move_forward(&player()).unwrap();
        assert!(!blocked.allowed);
        assert!(!lvl.move_entity(&player(), &blocked));
        assert_eq!(lvl.player().unwrap().position, Position::new(1, 0));

        let back = lvl.can_move_backward(&player()).unwrap();
        assert_eq!(back.target, Position::new(0, 0));
        assert!(back.allowed);

        // Off the north edge.
        assert!(!lvl.can_move_direction(&player(), FacingDirection::North).unwrap().allowed);
        assert!(lvl.can_move_forward(&EntityId::new("ghost")).is_none());
    }

    #[test]
    fn water_is_fatal_under_program_control_and_refused_under_direct_control() {
        let lvl = level(&[".~L"], &["..."]);
        let check = lvl.can_move_forward(&player()).unwrap();
        assert!(check.allowed);
        assert_eq!(check.hazard, Some(Hazard::Drown));

        let mut c = config(&[".~L"], &["..."], &[]);
        c.is_direct_player_control = true;
        let direct = LevelModel::new(c, GameConfig::default()).unwrap();
        let check = direct.can_move_forward(&player()).unwrap();
        assert!(!check.allowed);
        assert!(check.hazard.is_none());

        let mut c = config(&[".~L"], &["..."], &[]);
        c.player_start_position = [1, 0];
        let lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        assert_eq!(lvl.can_move_forward(&player()).unwrap().hazard, Some(Hazard::Burn));
    }

    #[test]
    fn boats_make_water_safe() {
        let mut c = config(&[".~."], &["..."], &[]);
        c.entities.push(("boat".into(), 1, 0, FacingDirection::East));
        let lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        let check = lvl.can_move_forward(&player()).unwrap();
        assert!(check.allowed);
        assert_eq!(check.hazard, None);
    }

    #[test]
    fn blocking_entity_is_reported() {
        let mut c = config(&["..."], &["..."], &[]);
        c.entities.push(("sheep".into(), 1, 0, FacingDirection::East));
        let lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        let check = lvl.can_move_forward(&player()).unwrap();
        assert!(!check.allowed);
        assert_eq!(check.blocking_entity, Some(EntityId::new("sheep0")));
    }

    #[test]
    fn fish_are_eaten() {
        let mut c = config(&["~~~"], &["..."], &[]);
        c.use_player = false;
        c.use_agent = true;
        c.agent_start_position = Some([0, 0]);
        c.agent_start_direction = FacingDirection::East;
        c.entities.push(("boat".into(), 0, 0, FacingDirection::East));
        c.entities.push(("boat".into(), 1, 0, FacingDirection::East));
        c.entities.push(("cod".into(), 1, 0, FacingDirection::East));
        let mut lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        let agent = EntityId::agent();
        let check = lvl.can_move_forward(&agent).unwrap();
        assert!(check.allowed);
        assert_eq!(check.consumed, vec![EntityId::new("cod2")]);
        assert!(lvl.move_entity(&agent, &check));
        assert!(lvl.entity(&EntityId::new("cod2")).is_none());
        assert_eq!(lvl.death_count("cod"), 1);
    }

    #[test]
    fn pressure_plates_follow_occupants() {
        let mut lvl = level(&["...", "..."], &[".P.", "..."]);
        let plate = Position::new(1, 0);
        let check = lvl.can_move_forward(&player()).unwrap();
        lvl.move_entity(&player(), &check);
        assert_eq!(lvl.block_at(PlaneType::Action, plate).unwrap().block_type(), "pressurePlateDown");
        assert!(lvl.block_at(PlaneType::Action, plate).unwrap().is_redstone_battery());

        let check = lvl.can_move_forward(&player()).unwrap();
        lvl.move_entity(&player(), &check);
        assert_eq!(lvl.block_at(PlaneType::Action, plate).unwrap().block_type(), "pressurePlateUp");
    }

    #[test]
    fn walking_collects_miniblocks() {
        let mut lvl = level(&["..."], &["..."]);
        lvl.spawn_miniblock(Position::new(1, 0), "wool");
        lvl.spawn_miniblock(Position::new(1, 0), "wool");
        let check = lvl.can_move_forward(&player()).unwrap();
        lvl.move_entity(&player(), &check);
        assert_eq!(lvl.player().unwrap().inventory_count("wool"), 2);
        assert!(lvl.miniblocks().is_empty());
    }

    #[test]
    fn placement_targets_and_occupancy() {
        let mut c = config(&["..~"], &["..."], &[]);
        c.entities.push(("sheep".into(), 1, 0, FacingDirection::East));
        let lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        let p = player();
        // Sheep in the way of a solid block.
        assert!(!lvl.can_place_block_direction(&p, "stone", FacingDirection::East).can_place);
        // Flat blocks can go under it.
        assert_eq!(
            lvl.get_plane_to_place_on(&p, "redstoneWire", Position::new(1, 0)),
            Some(PlaneType::Action)
        );
        assert_eq!(
            lvl.get_plane_to_place_on(&p, "stone", Position::new(2, 0)),
            Some(PlaneType::Ground)
        );
        assert!(
            lvl.can_place_block_direction(&p, "stone", FacingDirection::North)
                .plane
                == PlaneType::Action
        );
        assert!(!lvl.can_place_block_direction(&p, "stone", FacingDirection::North).can_place);
    }

    #[test]
    fn destroying_a_block_drops_its_miniblock() {
        let mut lvl = level(&["..."], &[".#B"]);
        assert_eq!(lvl.destroy_block(Position::new(1, 0)), Some("stone".into()));
        assert!(lvl.block_at(PlaneType::Action, Position::new(1, 0)).unwrap().is_empty());
        assert_eq!(lvl.miniblocks()[0].item, "stone");
        assert_eq!(lvl.destroy_block(Position::new(2, 0)), None);
        assert_eq!(lvl.destroy_block(Position::new(0, 0)), None);
    }

    #[test]
    fn tilling_checks_for_nearby_water() {
        let mut lvl = level(&["....~", "....."], &[".....", "....."]);
        assert!(lvl.till_soil(Position::new(0, 0)));
        assert_eq!(lvl.block_at(PlaneType::Ground, Position::new(0, 0)).unwrap().block_type(), "farmland");
        assert!(lvl.till_soil(Position::new(3, 1)));
        assert_eq!(lvl.block_at(PlaneType::Ground, Position::new(3, 1)).unwrap().block_type(), "farmlandWet");
        assert!(!lvl.till_soil(Position::new(0, 0)));
    }

    #[test]
    fn explosions_spare_bedrock() {
        let mut lvl = level(&[".....", ".....", "....."], &["..#..", ".#B#.", "..#.."]);
        let cleared = lvl.explode(Position::new(2, 1), 1);
        assert_eq!(cleared.len(), 4);
        assert_eq!(lvl.block_at(PlaneType::Action, Position::new(2, 1)).unwrap().block_type(), "bedrock");
        assert!(lvl.miniblocks().is_empty());
        let notices = lvl.take_notices();
        assert!(notices.contains(&(PlaneType::Action, PlaneNotice::Explosion(Position::new(2, 1)))));
    }

    #[test]
    fn killing_mobs_drops_items_but_player_stays() {
        let mut c = config(&["..."], &["..."], &[]);
        c.entities.push(("sheep".into(), 2, 0, FacingDirection::East));
        let mut lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        let sheep = EntityId::new("sheep0");
        assert_eq!(lvl.damage_entity(&sheep, 1), Some(2));
        assert!(lvl.kill_entity(&sheep));
        assert!(lvl.entity(&sheep).is_none());
        assert_eq!(lvl.death_count("sheep"), 1);
        assert_eq!(lvl.miniblocks()[0].item, "wool");

        assert!(lvl.kill_entity(&player()));
        assert!(!lvl.player().unwrap().is_alive());
        assert!(!Condition::PlayerAlive.evaluate(&lvl));
    }

    #[test]
    fn zombies_burn_by_day() {
        let mut c = config(&["..."], &["..."], &[]);
        c.entities.push(("zombie".into(), 2, 0, FacingDirection::East));
        let mut lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        let zombie = EntityId::new("zombie0");
        assert!(lvl.entity(&zombie).unwrap().is_burning);
        assert!(lvl.fog().iter().all(|f| *f == FogType::Lit));
        lvl.set_daytime(false);
        assert!(!lvl.entity(&zombie).unwrap().is_burning);
        assert!(!lvl.player().unwrap().is_burning);
    }

    #[test]
    fn night_fog_is_derived_from_lights() {
        let mut c = config(&[".......", "......."], &["t......", "......."], &[('t', "torch")]);
        c.is_daytime = false;
        let lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        assert_eq!(lvl.fog()[0], FogType::Lit);
        assert_ne!(lvl.fog()[6], FogType::Lit);
    }

    #[test]
    fn render_order_sorts_rows_then_offsets() {
        let mut c = config(&["...", "..."], &["...", "..."], &[]);
        c.player_start_position = [0, 1];
        c.use_agent = true;
        c.agent_start_position = Some([1, 1]);
        c.entities.push(("sheep".into(), 2, 0, FacingDirection::East));
        c.entities.push(("boat".into(), 2, 1, FacingDirection::East));
        let lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        let order: Vec<&str> = lvl.render_order().iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(order, ["sheep0", "boat1", "Player", "PlayerAgent"]);
    }

    #[test]
    fn random_empty_positions_avoid_blocks_and_entities() {
        let lvl = level(&["~..."], &["..##"]);
        let mut rng = GameRng::new(3);
        for _ in 0..10 {
            assert_eq!(lvl.random_empty_position(&mut rng), Some(Position::new(1, 0)));
        }
    }

    #[test]
    fn conditions_read_the_live_level() {
        let mut c = config(&["..."], &[".#."], &[]);
        c.entities.push(("cow".into(), 2, 0, FacingDirection::East));
        let mut lvl = LevelModel::new(c, GameConfig::default()).unwrap();
        let stone_gone = Condition::BlockAt {
            plane: PlaneType::Action,
            position: [1, 0],
            block_type: String::new(),
        };
        assert!(!stone_gone.evaluate(&lvl));
        lvl.destroy_block(Position::new(1, 0));
        assert!(stone_gone.evaluate(&lvl));

        let cow_there = Condition::EntityAt {
            entity_type: "cow".into(),
            position: [2, 0],
        };
        let one_cow = Condition::EntityCount {
            entity_type: "cow".into(),
            check: CountCheck::Exactly(1),
        };
        assert!(Condition::All {
            conditions: vec![cow_there, one_cow, Condition::PlayerAlive]
        }
        .evaluate(&lvl));

        lvl.add_score(5);
        assert!(Condition::Score {
            check: CountCheck::AtLeast(5)
        }
        .evaluate(&lvl));
        assert!(Condition::Not {
            condition: Box::new(Condition::Never)
        }
        .evaluate(&lvl));
        assert!(!Condition::Any { conditions: vec![] }.evaluate(&lvl));
    }

    #[test]
    fn reset_restores_the_initial_world() {
        let mut lvl = level(&["..."], &[".#."]);
        lvl.destroy_block(Position::new(1, 0));
        let check = lvl.can_move_forward(&player()).unwrap();
        lvl.move_entity(&player(), &check);
        lvl.add_score(3);
        lvl.reset();
        assert_eq!(lvl.block_at(PlaneType::Action, Position::new(1, 0)).unwrap().block_type(), "stone");
        assert_eq!(lvl.player().unwrap().position, Position::new(0, 0));
        assert!(lvl.player().unwrap().inventory.is_empty());
        assert!(lvl.miniblocks().is_empty());
        assert_eq!(lvl.score(), 0);
        assert!(lvl.take_notices().is_empty());
    }
}
