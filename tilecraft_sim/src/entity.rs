// Entities and their type-specific behaviour.
//
// Every entity is a `LevelEntity`: identifier, type tag, position, facing,
// health, its own `CommandQueue`, and (for the player and agent) an
// inventory. What differs between types is a small policy surface,
// `EntityBehavior`: whether others can move through it, where it may
// place blocks, whether it can walk onto a cell, whether it presses
// pressure plates, and so on.
//
// Behaviours are produced by `EntityRegistry`, a type tag → factory map.
// The player and agent have dedicated behaviours; every other type is a
// `MobBehavior` driven by the `MobProfile` data in `GameConfig::mobs`, so
// adding a mob is a config change rather than a new match arm.
//
// See also: `level.rs` which owns entities and runs movement legality
// through these policies, `command_queue.rs` for the per-entity queue,
// `config.rs` for `MobProfile`.

use crate::block::LevelBlock;
use crate::command_queue::CommandQueue;
use crate::config::{GameConfig, MobProfile};
use crate::plane::PlaneType;
use crate::types::{EntityId, FacingDirection, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Outcome of something trying to move into this entity's cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveThrough {
    /// The cell is blocked.
    Block,
    /// The mover shares the cell (a boat).
    PassThrough,
    /// The mover enters and this entity is destroyed (fish).
    Consumed,
}

/// Where a block would land and whether that is allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub can_place: bool,
    pub plane: PlaneType,
}

impl Placement {
    pub const REFUSED: Placement = Placement {
        can_place: false,
        plane: PlaneType::Action,
    };

    fn on(plane: PlaneType) -> Self {
        Self {
            can_place: true,
            plane,
        }
    }
}

/// The two blocks stacked on one cell.
#[derive(Clone, Copy, Debug)]
pub struct Cell<'a> {
    pub action: &'a LevelBlock,
    pub ground: &'a LevelBlock,
}

// ---------------------------------------------------------------------------
// Behaviour trait
// ---------------------------------------------------------------------------

/// Type-specific policy for an entity.
pub trait EntityBehavior: fmt::Debug {
    fn can_move_through(&self) -> MoveThrough {
        MoveThrough::Block
    }

    fn can_place_block(&self, _block: &LevelBlock) -> bool {
        false
    }

    /// Where `block` would go if placed on `target`.
    fn can_place_block_over(&self, _block: &LevelBlock, _target: Cell<'_>) -> Placement {
        Placement::REFUSED
    }

    fn can_trigger_pressure_plates(&self) -> bool {
        false
    }

    /// Final say on stepping onto `target`. `shared_with` is set when a
    /// pass-through entity (a boat) already stands there.
    fn has_permission_to_walk(&self, target: Cell<'_>, shared_with: bool) -> bool;

    fn should_update_selection_indicator(&self) -> bool {
        false
    }

    fn sort_order_offset(&self) -> i32 {
        0
    }

    /// Picks up miniblocks when stepping on them.
    fn collects_miniblocks(&self) -> bool {
        false
    }

    fn burns_in_daylight(&self) -> bool {
        false
    }

    /// Miniblock dropped on death.
    fn drop_item(&self) -> Option<&str> {
        None
    }
}

/// Crops need wet farmland underneath; anything else follows `fallback`.
fn crop_rule(block: &LevelBlock, target: Cell<'_>) -> Option<Placement> {
    if !block.is_crop() {
        return None;
    }
    let wet = target.ground.block_type() == "farmlandWet";
    Some(if wet && target.action.is_empty() {
        Placement::on(PlaneType::Action)
    } else {
        Placement::REFUSED
    })
}

/// The player character.
#[derive(Debug, Default)]
pub struct PlayerBehavior;

impl EntityBehavior for PlayerBehavior {
    fn can_place_block(&self, block: &LevelBlock) -> bool {
        !block.is_empty()
    }

    fn can_place_block_over(&self, block: &LevelBlock, target: Cell<'_>) -> Placement {
        if let Some(placement) = crop_rule(block, target) {
            return placement;
        }
        if target.ground.is_liquid() && target.action.is_empty() {
            Placement::on(PlaneType::Ground)
        } else if target.action.is_walkable() || target.action.is_liquid() {
            Placement::on(PlaneType::Action)
        } else {
            Placement::REFUSED
        }
    }

    fn can_trigger_pressure_plates(&self) -> bool {
        true
    }

    fn has_permission_to_walk(&self, target: Cell<'_>, _shared_with: bool) -> bool {
        target.action.is_walkable()
    }

    fn should_update_selection_indicator(&self) -> bool {
        true
    }

    fn collects_miniblocks(&self) -> bool {
        true
    }
}

/// The programmable agent robot.
#[derive(Debug, Default)]
pub struct AgentBehavior;

impl EntityBehavior for AgentBehavior {
    fn can_place_block(&self, block: &LevelBlock) -> bool {
        !block.is_empty()
    }

    fn can_place_block_over(&self, block: &LevelBlock, target: Cell<'_>) -> Placement {
        if let Some(placement) = crop_rule(block, target) {
            return placement;
        }
        if target.ground.is_liquid() && target.action.is_empty() {
            Placement {
                can_place: block.is_placeable_in_liquid(),
                plane: PlaneType::Ground,
            }
        } else if target.action.is_empty() {
            Placement::on(PlaneType::Action)
        } else {
            Placement::REFUSED
        }
    }

    fn can_trigger_pressure_plates(&self) -> bool {
        true
    }

    fn has_permission_to_walk(&self, target: Cell<'_>, shared_with: bool) -> bool {
        target.action.is_walkable() && (!target.ground.is_liquid() || shared_with)
    }

    fn sort_order_offset(&self) -> i32 {
        1
    }

    fn collects_miniblocks(&self) -> bool {
        true
    }
}

/// Any other creature, driven by its profile.
#[derive(Debug)]
pub struct MobBehavior {
    pub profile: MobProfile,
}

impl EntityBehavior for MobBehavior {
    fn can_move_through(&self) -> MoveThrough {
        self.profile.move_through
    }

    fn can_trigger_pressure_plates(&self) -> bool {
        self.profile.triggers_pressure_plates
    }

    fn has_permission_to_walk(&self, target: Cell<'_>, _shared_with: bool) -> bool {
        let walkable = target.action.is_walkable() && !target.action.is_miniblock();
        if self.profile.aquatic {
            walkable && target.ground.is_liquid() && target.ground.block_type() == "water"
        } else {
            walkable && !target.ground.is_liquid()
        }
    }

    fn sort_order_offset(&self) -> i32 {
        self.profile.sort_order_offset
    }

    fn burns_in_daylight(&self) -> bool {
        self.profile.burns_in_daylight
    }

    fn drop_item(&self) -> Option<&str> {
        self.profile.drop.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub type EntityFactory = fn(&GameConfig, &str) -> Option<Rc<dyn EntityBehavior>>;

fn player_factory(_: &GameConfig, _: &str) -> Option<Rc<dyn EntityBehavior>> {
    Some(Rc::new(PlayerBehavior))
}

fn agent_factory(_: &GameConfig, _: &str) -> Option<Rc<dyn EntityBehavior>> {
    Some(Rc::new(AgentBehavior))
}

fn mob_factory(config: &GameConfig, entity_type: &str) -> Option<Rc<dyn EntityBehavior>> {
    let profile = config.mobs.get(entity_type)?.clone();
    Some(Rc::new(MobBehavior { profile }))
}

/// Entity type tag → behaviour factory.
#[derive(Clone, Debug)]
pub struct EntityRegistry {
    factories: BTreeMap<String, EntityFactory>,
}

impl EntityRegistry {
    /// Player, agent, and every mob in `config.mobs`.
    pub fn with_defaults(config: &GameConfig) -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register(EntityId::PLAYER, player_factory);
        registry.register(EntityId::AGENT, agent_factory);
        for mob in config.mobs.keys() {
            registry.register(mob, mob_factory);
        }
        registry
    }

    pub fn register(&mut self, entity_type: &str, factory: EntityFactory) {
        self.factories.insert(entity_type.to_string(), factory);
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.factories.contains_key(entity_type)
    }

    pub fn create(&self, config: &GameConfig, entity_type: &str) -> Option<Rc<dyn EntityBehavior>> {
        let factory = self.factories.get(entity_type)?;
        factory(config, entity_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// LevelEntity
// ---------------------------------------------------------------------------

/// A live entity on the level.
#[derive(Debug)]
pub struct LevelEntity {
    pub identifier: EntityId,
    pub entity_type: String,
    pub position: Position,
    pub facing: FacingDirection,
    pub health_point: i32,
    pub queue: CommandQueue,
    pub inventory: BTreeMap<String, u32>,
    pub is_burning: bool,
    behavior: Rc<dyn EntityBehavior>,
}

impl LevelEntity {
    pub fn new(
        identifier: EntityId,
        entity_type: &str,
        position: Position,
        facing: FacingDirection,
        health_point: i32,
        behavior: Rc<dyn EntityBehavior>,
    ) -> Self {
        Self {
            identifier,
            entity_type: entity_type.to_string(),
            position,
            facing,
            health_point,
            queue: CommandQueue::new(),
            inventory: BTreeMap::new(),
            is_burning: false,
            behavior,
        }
    }

    pub fn behavior(&self) -> &dyn EntityBehavior {
        self.behavior.as_ref()
    }

    pub fn is_player(&self) -> bool {
        self.identifier.as_str() == EntityId::PLAYER
    }

    pub fn is_agent(&self) -> bool {
        self.identifier.as_str() == EntityId::AGENT
    }

    pub fn is_alive(&self) -> bool {
        self.health_point > 0
    }

    pub fn add_to_inventory(&mut self, item: &str, count: u32) {
        *self.inventory.entry(item.to_string()).or_insert(0) += count;
    }

    /// Removes one `item`. False if none held.
    pub fn take_from_inventory(&mut self, item: &str) -> bool {
        match self.inventory.get_mut(item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.inventory.remove(item);
                }
                true
            }
            _ => false,
        }
    }

    pub fn inventory_count(&self, item: &str) -> u32 {
        self.inventory.get(item).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell<'a>(action: &'a LevelBlock, ground: &'a LevelBlock) -> Cell<'a> {
        Cell { action, ground }
    }

    #[test]
    fn registry_knows_defaults() {
        let config = GameConfig::default();
        let registry = EntityRegistry::with_defaults(&config);
        assert!(registry.contains("Player"));
        assert!(registry.contains("PlayerAgent"));
        assert!(registry.contains("sheep"));
        assert!(registry.contains("tropicalFish"));
        assert!(!registry.contains("dragon"));
        assert!(registry.create(&config, "dragon").is_none());
    }

    #[test]
    fn registry_is_open_for_extension() {
        let mut config = GameConfig::default();
        config.mobs.insert("llama".into(), config.mobs["sheep"].clone());
        let mut registry = EntityRegistry::with_defaults(&GameConfig::default());
        assert!(!registry.contains("llama"));
        registry.register("llama", mob_factory);
        let llama = registry.create(&config, "llama").unwrap();
        assert_eq!(llama.drop_item(), Some("wool"));
    }

    #[test]
    fn fish_are_consumed_boats_are_shared() {
        let config = GameConfig::default();
        let registry = EntityRegistry::with_defaults(&config);
        let cod = registry.create(&config, "cod").unwrap();
        assert_eq!(cod.can_move_through(), MoveThrough::Consumed);
        let boat = registry.create(&config, "boat").unwrap();
        assert_eq!(boat.can_move_through(), MoveThrough::PassThrough);
        let sheep = registry.create(&config, "sheep").unwrap();
        assert_eq!(sheep.can_move_through(), MoveThrough::Block);
    }

    #[test]
    fn player_places_over_walkable_or_into_liquid() {
        let player = PlayerBehavior;
        let stone = LevelBlock::new("stone");
        let empty = LevelBlock::empty();
        let grass = LevelBlock::new("grass");
        let water = LevelBlock::new("water");

        let on_grass = player.can_place_block_over(&stone, cell(&empty, &grass));
        assert_eq!(on_grass, Placement::on(PlaneType::Action));
        let on_water = player.can_place_block_over(&stone, cell(&empty, &water));
        assert_eq!(on_water, Placement::on(PlaneType::Ground));
        let on_stone = player.can_place_block_over(&stone, cell(&stone, &grass));
        assert!(!on_stone.can_place);
    }

    #[test]
    fn agent_only_fills_liquid_with_liquid_placeable_blocks() {
        let agent = AgentBehavior;
        let empty = LevelBlock::empty();
        let water = LevelBlock::new("water");
        let cobble = LevelBlock::new("cobblestone");
        let torch = LevelBlock::new("torch");
        assert!(agent.can_place_block_over(&cobble, cell(&empty, &water)).can_place);
        assert!(!agent.can_place_block_over(&torch, cell(&empty, &water)).can_place);
    }

    #[test]
    fn crops_need_wet_farmland() {
        let player = PlayerBehavior;
        let wheat = LevelBlock::new("cropWheat");
        let empty = LevelBlock::empty();
        let dry = LevelBlock::new("farmland");
        let wet = LevelBlock::new("farmlandWet");
        assert!(!player.can_place_block_over(&wheat, cell(&empty, &dry)).can_place);
        assert!(player.can_place_block_over(&wheat, cell(&empty, &wet)).can_place);
    }

    #[test]
    fn walking_permissions() {
        let config = GameConfig::default();
        let empty = LevelBlock::empty();
        let grass = LevelBlock::new("grass");
        let water = LevelBlock::new("water");
        let stone = LevelBlock::new("stone");

        assert!(PlayerBehavior.has_permission_to_walk(cell(&empty, &grass), false));
        assert!(!PlayerBehavior.has_permission_to_walk(cell(&stone, &grass), false));
        assert!(!AgentBehavior.has_permission_to_walk(cell(&empty, &water), false));
        assert!(AgentBehavior.has_permission_to_walk(cell(&empty, &water), true));

        let sheep = MobBehavior {
            profile: config.mobs["sheep"].clone(),
        };
        assert!(!sheep.has_permission_to_walk(cell(&empty, &water), false));
        let salmon = MobBehavior {
            profile: config.mobs["salmon"].clone(),
        };
        assert!(salmon.has_permission_to_walk(cell(&empty, &water), false));
        assert!(!salmon.has_permission_to_walk(cell(&empty, &grass), false));
    }

    #[test]
    fn inventory_counts() {
        let mut e = LevelEntity::new(
            EntityId::player(),
            "Player",
            Position::new(0, 0),
            FacingDirection::South,
            3,
            Rc::new(PlayerBehavior),
        );
        assert!(e.is_player());
        e.add_to_inventory("stone", 2);
        assert_eq!(e.inventory_count("stone"), 2);
        assert!(e.take_from_inventory("stone"));
        assert!(e.take_from_inventory("stone"));
        assert!(!e.take_from_inventory("stone"));
        assert!(e.inventory.is_empty());
    }
}
