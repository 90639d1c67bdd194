// Block model: one cell's contents on a plane.
//
// A block is split in two:
// - `BlockKind`: the capability record (walkable, destroyable, redstone,
//   rail, piston, ...). Derived once from the tag the block was constructed
//   with, by running the declarative `KIND_RULES` table, and cached per tag.
//   It never changes for the lifetime of the block.
// - `BlockState`: the parts that legitimately mutate in place while the
//   surrounding network changes: the variant tag (wire shape, rail
//   connection name, piston extended sprite), `powered`, `open`,
//   `activated_conduit`, and the two rail connection slots.
//
// Re-spriting a wire or a rail only touches `BlockState::variant`; the
// capability record keeps describing the tag the block was built from. To
// change what a cell *is*, build a new `LevelBlock` and set it on the plane.
//
// Unknown tags produce an all-default solid block (no error). Callers that
// need to reject unknown tags (level loading) use `is_known_block_type`.
//
// See also: `plane.rs` which owns blocks and mutates `BlockState`,
// `level.rs` for movement/placement queries built on these flags.

use crate::types::FacingDirection;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

// ---------------------------------------------------------------------------
// Capability record
// ---------------------------------------------------------------------------

/// Capabilities fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockKind {
    pub is_entity: bool,
    pub is_walkable: bool,
    /// Another block may be placed into this cell.
    pub is_placable: bool,
    pub is_destroyable: bool,
    pub is_usable: bool,
    pub is_empty: bool,
    pub is_emissive: bool,
    pub is_transparent: bool,
    pub is_liquid: bool,
    pub is_solid: bool,
    pub is_redstone: bool,
    /// Redstone wire visually joins this block.
    pub is_connected_to_redstone: bool,
    pub is_redstone_battery: bool,
    pub is_weakly_powerable: bool,
    pub is_rail: bool,
    pub is_powerable_rail: bool,
    pub is_stickable: bool,
    pub is_pushable: bool,
    pub is_piston: bool,
    pub is_piston_arm: bool,
    pub is_sticky: bool,
    pub is_door: bool,
    pub is_iron_door: bool,
    pub is_conduit: bool,
    pub is_explosive: bool,
    pub is_flat: bool,
    pub is_miniblock: bool,
    pub is_tillable: bool,
    pub is_crop: bool,
    /// Can be dropped into water/lava to fill it (agent placement).
    pub is_placeable_in_liquid: bool,
}

/// A simple destroyable cube.
const SOLID_CUBE: BlockKind = BlockKind {
    is_entity: false,
    is_walkable: false,
    is_placable: false,
    is_destroyable: true,
    is_usable: true,
    is_empty: false,
    is_emissive: false,
    is_transparent: false,
    is_liquid: false,
    is_solid: true,
    is_redstone: false,
    is_connected_to_redstone: false,
    is_redstone_battery: false,
    is_weakly_powerable: true,
    is_rail: false,
    is_powerable_rail: false,
    is_stickable: true,
    is_pushable: true,
    is_piston: false,
    is_piston_arm: false,
    is_sticky: false,
    is_door: false,
    is_iron_door: false,
    is_conduit: false,
    is_explosive: false,
    is_flat: false,
    is_miniblock: false,
    is_tillable: false,
    is_crop: false,
    is_placeable_in_liquid: true,
};

/// One capability flag, as named by the rule table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cap {
    Entity,
    Walkable,
    Placable,
    Destroyable,
    Usable,
    Empty,
    Emissive,
    Transparent,
    Liquid,
    Solid,
    Redstone,
    ConnectedToRedstone,
    Battery,
    WeaklyPowerable,
    Rail,
    PowerableRail,
    Stickable,
    Pushable,
    Piston,
    PistonArm,
    Sticky,
    Door,
    IronDoor,
    Conduit,
    Explosive,
    Flat,
    Miniblock,
    Tillable,
    Crop,
    PlaceableInLiquid,
}

impl BlockKind {
    fn flag_mut(&mut self, cap: Cap) -> &mut bool {
        match cap {
            Cap::Entity => &mut self.is_entity,
            Cap::Walkable => &mut self.is_walkable,
            Cap::Placable => &mut self.is_placable,
            Cap::Destroyable => &mut self.is_destroyable,
            Cap::Usable => &mut self.is_usable,
            Cap::Empty => &mut self.is_empty,
            Cap::Emissive => &mut self.is_emissive,
            Cap::Transparent => &mut self.is_transparent,
            Cap::Liquid => &mut self.is_liquid,
            Cap::Solid => &mut self.is_solid,
            Cap::Redstone => &mut self.is_redstone,
            Cap::ConnectedToRedstone => &mut self.is_connected_to_redstone,
            Cap::Battery => &mut self.is_redstone_battery,
            Cap::WeaklyPowerable => &mut self.is_weakly_powerable,
            Cap::Rail => &mut self.is_rail,
            Cap::PowerableRail => &mut self.is_powerable_rail,
            Cap::Stickable => &mut self.is_stickable,
            Cap::Pushable => &mut self.is_pushable,
            Cap::Piston => &mut self.is_piston,
            Cap::PistonArm => &mut self.is_piston_arm,
            Cap::Sticky => &mut self.is_sticky,
            Cap::Door => &mut self.is_door,
            Cap::IronDoor => &mut self.is_iron_door,
            Cap::Conduit => &mut self.is_conduit,
            Cap::Explosive => &mut self.is_explosive,
            Cap::Flat => &mut self.is_flat,
            Cap::Miniblock => &mut self.is_miniblock,
            Cap::Tillable => &mut self.is_tillable,
            Cap::Crop => &mut self.is_crop,
            Cap::PlaceableInLiquid => &mut self.is_placeable_in_liquid,
        }
    }

    /// Capability record for a construction tag. Cached per tag.
    pub fn for_type(block_type: &str) -> BlockKind {
        thread_local! {
            static CACHE: RefCell<FxHashMap<String, BlockKind>> = RefCell::new(FxHashMap::default());
        }
        CACHE.with(|cache| {
            if let Some(kind) = cache.borrow().get(block_type) {
                return *kind;
            }
            let kind = Self::derive(block_type);
            cache.borrow_mut().insert(block_type.to_string(), kind);
            kind
        })
    }

    fn derive(block_type: &str) -> BlockKind {
        let mut kind = SOLID_CUBE;
        for rule in KIND_RULES {
            if rule.matcher.matches(block_type) {
                for &cap in rule.set {
                    *kind.flag_mut(cap) = true;
                }
                for &cap in rule.clear {
                    *kind.flag_mut(cap) = false;
                }
            }
        }
        kind
    }
}

// ---------------------------------------------------------------------------
// Declarative rule table
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum TypeMatch {
    Exact(&'static str),
    Prefix(&'static str),
    Suffix(&'static str),
    PrefixSuffix(&'static str, &'static str),
}

impl TypeMatch {
    fn matches(self, block_type: &str) -> bool {
        match self {
            TypeMatch::Exact(s) => block_type == s,
            TypeMatch::Prefix(s) => block_type.starts_with(s),
            TypeMatch::Suffix(s) => block_type.ends_with(s),
            TypeMatch::PrefixSuffix(p, s) => block_type.starts_with(p) && block_type.ends_with(s),
        }
    }
}

struct KindRule {
    matcher: TypeMatch,
    set: &'static [Cap],
    clear: &'static [Cap],
}

const fn rule(matcher: TypeMatch, set: &'static [Cap], clear: &'static [Cap]) -> KindRule {
    KindRule {
        matcher,
        set,
        clear,
    }
}

/// Tag → capability rules, applied in order over `SOLID_CUBE`. Later rules
/// override earlier ones, so specific tags come after their prefix family.
const KIND_RULES: &[KindRule] = {
    use Cap::*;
    use TypeMatch::*;
    &[
        rule(
            Exact(""),
            &[Walkable, Placable, Empty],
            &[Destroyable, Usable, Solid, WeaklyPowerable, Stickable, Pushable, PlaceableInLiquid],
        ),
        rule(
            Suffix("Miniblock"),
            &[Entity, Walkable, Placable, Transparent, Miniblock],
            &[Destroyable, Usable, Solid, WeaklyPowerable, Stickable, PlaceableInLiquid],
        ),
        rule(
            Exact("water"),
            &[Liquid, Placable, Transparent],
            &[Destroyable, Usable, Solid, WeaklyPowerable, Stickable, Pushable, PlaceableInLiquid],
        ),
        rule(
            Exact("lava"),
            &[Liquid, Placable, Transparent, Emissive],
            &[Destroyable, Usable, Solid, WeaklyPowerable, Stickable, Pushable, PlaceableInLiquid],
        ),
        rule(
            Exact("torch"),
            &[Entity, Emissive, Transparent],
            &[Solid, WeaklyPowerable, Stickable, PlaceableInLiquid],
        ),
        rule(Exact("glowstone"), &[Emissive], &[]),
        rule(Exact("seaLantern"), &[Emissive], &[]),
        rule(Exact("magmaBlock"), &[Emissive], &[]),
        rule(Exact("redstoneLamp"), &[Emissive], &[]),
        rule(Prefix("glass"), &[Transparent], &[Solid]),
        rule(Prefix("ice"), &[Transparent], &[Solid]),
        rule(Prefix("leaves"), &[Transparent], &[Solid, PlaceableInLiquid]),
        rule(Exact("bedrock"), &[], &[Destroyable, Pushable]),
        rule(Exact("obsidian"), &[], &[Pushable]),
        rule(
            Exact("invisible"),
            &[Transparent],
            &[Destroyable, Usable, WeaklyPowerable, Pushable, Stickable, PlaceableInLiquid],
        ),
        rule(Exact("tnt"), &[Explosive], &[]),
        rule(
            Prefix("door"),
            &[Entity, Door, Transparent],
            &[Destroyable, Solid, Stickable, Pushable, WeaklyPowerable, PlaceableInLiquid],
        ),
        rule(Exact("doorIron"), &[IronDoor, ConnectedToRedstone], &[Usable]),
        rule(
            Prefix("redstoneWire"),
            &[Entity, Walkable, Redstone, Transparent, Flat],
            &[Solid, WeaklyPowerable, Stickable, Pushable, Usable, PlaceableInLiquid],
        ),
        rule(
            Prefix("pressurePlate"),
            &[Entity, Walkable, Transparent, ConnectedToRedstone, Flat],
            &[Usable, Solid, WeaklyPowerable, Stickable, Pushable, PlaceableInLiquid],
        ),
        rule(Exact("pressurePlateDown"), &[Battery], &[]),
        rule(
            Prefix("rails"),
            &[Entity, Walkable, Transparent, Rail, Flat, WeaklyPowerable],
            &[Solid, Stickable, Pushable, PlaceableInLiquid],
        ),
        rule(Prefix("railsPowered"), &[PowerableRail, ConnectedToRedstone], &[]),
        rule(Prefix("railsUnpowered"), &[PowerableRail, ConnectedToRedstone], &[]),
        rule(
            Exact("railsRedstoneTorch"),
            &[Battery, ConnectedToRedstone],
            &[Rail, Flat, Walkable, WeaklyPowerable],
        ),
        rule(Prefix("piston"), &[Piston, ConnectedToRedstone], &[WeaklyPowerable]),
        rule(
            Prefix("pistonArm"),
            &[PistonArm, Transparent],
            &[Piston, ConnectedToRedstone, Destroyable, Pushable, Stickable, PlaceableInLiquid],
        ),
        rule(PrefixSuffix("piston", "Sticky"), &[Sticky], &[]),
        rule(
            Exact("conduit"),
            &[Conduit, Entity, Transparent],
            &[Solid, WeaklyPowerable, Stickable, PlaceableInLiquid],
        ),
        rule(
            Prefix("cropWheat"),
            &[Walkable, Placable, Transparent, Crop, Flat],
            &[Destroyable, Usable, Solid, WeaklyPowerable, Stickable, PlaceableInLiquid],
        ),
        rule(Exact("grass"), &[Tillable], &[]),
        rule(Exact("dirt"), &[Tillable], &[]),
    ]
};

/// Tags that are plain solid cubes (no rule needed) but are still valid
/// level content.
const PLAIN_BLOCK_TYPES: &[&str] = &[
    "stone",
    "cobblestone",
    "dirtCoarse",
    "sand",
    "sandstone",
    "gravel",
    "clay",
    "bricks",
    "snow",
    "netherrack",
    "prismarine",
    "bookshelf",
    "pumpkin",
    "melon",
    "farmland",
    "farmlandWet",
    "path",
    "quartzOre",
    "terracotta",
    "deadBush",
];

const VALID_PREFIXES: &[&str] = &[
    "planks", "log", "tree", "wool", "ore", "stone", "concrete", "terracotta",
];

/// Whether a tag names something that can be rendered. Unknown tags are a
/// data error at level load.
pub fn is_known_block_type(block_type: &str) -> bool {
    KIND_RULES.iter().any(|r| r.matcher.matches(block_type))
        || PLAIN_BLOCK_TYPES.contains(&block_type)
        || VALID_PREFIXES.iter().any(|p| block_type.starts_with(p))
}

// ---------------------------------------------------------------------------
// Mutable state
// ---------------------------------------------------------------------------

/// The parts of a block that change in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    /// Current sprite/variant tag. Starts equal to the construction tag.
    pub variant: String,
    pub powered: bool,
    pub open: bool,
    pub activated_conduit: bool,
    pub connection_a: Option<FacingDirection>,
    pub connection_b: Option<FacingDirection>,
}

// ---------------------------------------------------------------------------
// LevelBlock
// ---------------------------------------------------------------------------

/// One cell's block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBlock {
    kind: BlockKind,
    pub state: BlockState,
}

impl Default for LevelBlock {
    fn default() -> Self {
        Self::empty()
    }
}

impl LevelBlock {
    pub fn new(block_type: &str) -> Self {
        let kind = BlockKind::for_type(block_type);
        let (connection_a, connection_b) = if kind.is_rail {
            parse_rail_connections(block_type)
        } else {
            (None, None)
        };
        Self {
            kind,
            state: BlockState {
                variant: block_type.to_string(),
                powered: false,
                open: false,
                activated_conduit: false,
                connection_a,
                connection_b,
            },
        }
    }

    pub fn empty() -> Self {
        Self::new("")
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    /// Current tag (variant included).
    pub fn block_type(&self) -> &str {
        &self.state.variant
    }

    /// Re-sprite in place. Capabilities are untouched.
    pub fn set_variant(&mut self, variant: impl Into<String>) {
        self.state.variant = variant.into();
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_empty
    }

    /// Walkable right now; an open door is walkable even though doors are
    /// not walkable by kind.
    pub fn is_walkable(&self) -> bool {
        self.kind.is_walkable || (self.kind.is_door && self.state.open)
    }

    pub fn is_destroyable(&self) -> bool {
        self.kind.is_destroyable
    }

    pub fn is_usable(&self) -> bool {
        self.kind.is_usable
    }

    pub fn is_placable(&self) -> bool {
        self.kind.is_placable
    }

    pub fn is_emissive(&self) -> bool {
        self.kind.is_emissive
    }

    pub fn is_liquid(&self) -> bool {
        self.kind.is_liquid
    }

    pub fn is_solid(&self) -> bool {
        self.kind.is_solid
    }

    pub fn is_transparent(&self) -> bool {
        self.kind.is_transparent
    }

    pub fn is_redstone(&self) -> bool {
        self.kind.is_redstone
    }

    pub fn is_redstone_battery(&self) -> bool {
        self.kind.is_redstone_battery
    }

    pub fn is_connected_to_redstone(&self) -> bool {
        self.kind.is_connected_to_redstone
    }

    /// Wire or battery: members of the redstone adjacency set.
    pub fn is_redstone_network_member(&self) -> bool {
        self.kind.is_redstone || self.kind.is_redstone_battery
    }

    pub fn is_weakly_powerable(&self) -> bool {
        self.kind.is_weakly_powerable
    }

    pub fn is_powered(&self) -> bool {
        self.state.powered
    }

    pub fn is_open(&self) -> bool {
        self.state.open
    }

    pub fn is_activated_conduit(&self) -> bool {
        self.state.activated_conduit
    }

    pub fn is_rail(&self) -> bool {
        self.kind.is_rail
    }

    pub fn is_powerable_rail(&self) -> bool {
        self.kind.is_powerable_rail
    }

    pub fn is_piston(&self) -> bool {
        self.kind.is_piston
    }

    pub fn is_piston_arm(&self) -> bool {
        self.kind.is_piston_arm
    }

    pub fn is_sticky_piston(&self) -> bool {
        self.kind.is_sticky
    }

    /// An extended piston base (its arm occupies the front cell).
    pub fn is_extended_piston(&self) -> bool {
        self.kind.is_piston && self.state.variant.contains("On")
    }

    pub fn is_door(&self) -> bool {
        self.kind.is_door
    }

    pub fn is_iron_door(&self) -> bool {
        self.kind.is_iron_door
    }

    pub fn is_conduit(&self) -> bool {
        self.kind.is_conduit
    }

    pub fn is_stickable(&self) -> bool {
        self.kind.is_stickable
    }

    pub fn is_explosive(&self) -> bool {
        self.kind.is_explosive
    }

    pub fn is_miniblock(&self) -> bool {
        self.kind.is_miniblock
    }

    pub fn is_tillable(&self) -> bool {
        self.kind.is_tillable
    }

    pub fn is_crop(&self) -> bool {
        self.kind.is_crop
    }

    pub fn is_placeable_in_liquid(&self) -> bool {
        self.kind.is_placeable_in_liquid
    }

    /// Renders flush with the ground instead of as a cube.
    pub fn is_flat(&self) -> bool {
        self.kind.is_flat
    }

    /// Destroyed (rather than moved) when a piston pushes into it.
    pub fn is_destroyable_upon_push(&self) -> bool {
        let t = self.block_type();
        t.starts_with("redstoneWire")
            || t.starts_with("door")
            || t.starts_with("rails")
            || t.starts_with("pressurePlate")
    }

    /// Can be shifted by a piston.
    pub fn is_pushable(&self) -> bool {
        self.kind.is_pushable && !self.is_destroyable_upon_push() && !self.is_extended_piston()
    }

    // --- Rails ---

    pub fn connects_toward(&self, direction: FacingDirection) -> bool {
        self.state.connection_a == Some(direction) || self.state.connection_b == Some(direction)
    }

    pub fn is_fully_connected(&self) -> bool {
        self.state.connection_a.is_some() && self.state.connection_b.is_some()
    }

    /// Connection name for the current endpoints, e.g. `"NorthEast"`. A rail
    /// with only one endpoint runs straight through it; none gives `""`.
    pub fn rail_connection_name(&self) -> &'static str {
        match (self.state.connection_a, self.state.connection_b) {
            (None, None) => "",
            (Some(a), None) | (None, Some(a)) => connection_name(a, a.opposite()),
            (Some(a), Some(b)) => connection_name(a, b),
        }
    }

    /// Rebuilds the rail tag from the connection slots and power state.
    pub fn rail_type_name(&self) -> String {
        let power = if self.kind.is_powerable_rail {
            if self.state.powered { "Powered" } else { "Unpowered" }
        } else {
            ""
        };
        format!("rails{power}{}", self.rail_connection_name())
    }

    // --- Pistons ---

    /// Facing of a piston base or arm from its tag.
    pub fn piston_facing(&self) -> Option<FacingDirection> {
        let rest = self
            .block_type()
            .strip_prefix("pistonArm")
            .or_else(|| self.block_type().strip_prefix("piston"))?;
        PISTON_DIRECTIONS
            .iter()
            .find(|(name, _)| rest.starts_with(name))
            .map(|&(_, facing)| facing)
    }

    /// Collectible item this block drops when destroyed.
    pub fn miniblock_frame(&self) -> String {
        miniblock_frame(self.block_type())
    }
}

// ---------------------------------------------------------------------------
// Tag helpers
// ---------------------------------------------------------------------------

const PISTON_DIRECTIONS: [(&str, FacingDirection); 4] = [
    ("Up", FacingDirection::North),
    ("Down", FacingDirection::South),
    ("Left", FacingDirection::West),
    ("Right", FacingDirection::East),
];

fn piston_direction_name(facing: FacingDirection) -> &'static str {
    PISTON_DIRECTIONS
        .iter()
        .find(|(_, f)| *f == facing)
        .map(|(name, _)| *name)
        .unwrap_or("Up")
}

/// Tag of a piston base, e.g. `pistonRight`, `pistonUpOnSticky`.
pub fn piston_type_name(facing: FacingDirection, extended: bool, sticky: bool) -> String {
    format!(
        "piston{}{}{}",
        piston_direction_name(facing),
        if extended { "On" } else { "" },
        if sticky { "Sticky" } else { "" }
    )
}

/// Tag of a piston arm, e.g. `pistonArmLeft`.
pub fn piston_arm_type_name(facing: FacingDirection, sticky: bool) -> String {
    format!(
        "pistonArm{}{}",
        piston_direction_name(facing),
        if sticky { "Sticky" } else { "" }
    )
}

const CONNECTION_NAMES: [(FacingDirection, FacingDirection, &str); 6] = {
    use FacingDirection::*;
    [
        (North, South, "NorthSouth"),
        (East, West, "EastWest"),
        (North, East, "NorthEast"),
        (North, West, "NorthWest"),
        (South, East, "SouthEast"),
        (South, West, "SouthWest"),
    ]
};

fn connection_name(a: FacingDirection, b: FacingDirection) -> &'static str {
    CONNECTION_NAMES
        .iter()
        .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
        .map(|(_, _, name)| *name)
        .unwrap_or("")
}

fn parse_rail_connections(block_type: &str) -> (Option<FacingDirection>, Option<FacingDirection>) {
    CONNECTION_NAMES
        .iter()
        .find(|(_, _, name)| block_type.ends_with(name))
        .map(|&(a, b, _)| (Some(a), Some(b)))
        .unwrap_or((None, None))
}

const MINIBLOCK_RENAMES: &[(&str, &str)] = &[
    ("oreCoal", "coal"),
    ("oreDiamond", "diamond"),
    ("oreEmerald", "emerald"),
    ("oreIron", "ingotIron"),
    ("oreGold", "ingotGold"),
    ("oreLapis", "lapisLazuli"),
    ("oreRedstone", "redstoneDust"),
    ("oreQuartz", "quartz"),
    ("grass", "dirt"),
    ("tnt", "gunPowder"),
    ("cropWheat", "wheat"),
    ("railsRedstoneTorch", "redstoneTorch"),
];

/// Collectible item for a destroyed block's tag.
pub fn miniblock_frame(block_type: &str) -> String {
    if let Some(&(_, renamed)) = MINIBLOCK_RENAMES.iter().find(|(from, _)| *from == block_type) {
        return renamed.to_string();
    }
    if block_type.starts_with("redstoneWire") {
        return "redstoneDust".to_string();
    }
    if block_type.starts_with("railsPowered") || block_type.starts_with("railsUnpowered") {
        return "poweredRail".to_string();
    }
    if block_type.starts_with("rails") {
        return "railNormal".to_string();
    }
    if block_type.starts_with("pressurePlate") {
        return "pressurePlate".to_string();
    }
    if block_type.starts_with("piston") {
        let sticky = block_type.ends_with("Sticky");
        return if sticky { "pistonSticky" } else { "piston" }.to_string();
    }
    if let Some(species) = block_type.strip_prefix("tree") {
        return format!("log{species}");
    }
    if block_type.starts_with("wool") {
        return "wool".to_string();
    }
    block_type.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block_is_walkable_and_placable() {
        let b = LevelBlock::empty();
        assert!(b.is_empty());
        assert!(b.is_walkable());
        assert!(b.is_placable());
        assert!(!b.is_destroyable());
        assert!(!b.is_solid());
        assert_eq!(b.block_type(), "");
    }

    #[test]
    fn unknown_tag_is_default_solid_cube() {
        let b = LevelBlock::new("definitelyNotABlock");
        assert_eq!(*b.kind(), SOLID_CUBE);
        assert!(!is_known_block_type("definitelyNotABlock"));
        assert!(is_known_block_type("stone"));
        assert!(is_known_block_type("planksBirch"));
        assert!(is_known_block_type("railsNorthSouth"));
    }

    #[test]
    fn stone_is_a_destroyable_cube() {
        let b = LevelBlock::new("stone");
        assert!(b.is_destroyable());
        assert!(b.is_solid());
        assert!(!b.is_walkable());
        assert!(b.is_pushable());
        assert!(b.is_weakly_powerable());
        assert_eq!(b.miniblock_frame(), "stone");
    }

    #[test]
    fn rails_family() {
        let plain = LevelBlock::new("railsEastWest");
        assert!(plain.is_rail());
        assert!(!plain.is_powerable_rail());
        assert!(plain.connects_toward(FacingDirection::East));
        assert!(plain.connects_toward(FacingDirection::West));
        assert!(plain.is_destroyable_upon_push());
        assert!(plain.is_flat());

        let powered = LevelBlock::new("railsUnpoweredNorthSouth");
        assert!(powered.is_powerable_rail());
        assert!(powered.is_connected_to_redstone());
        assert_eq!(powered.rail_connection_name(), "NorthSouth");

        let torch = LevelBlock::new("railsRedstoneTorch");
        assert!(!torch.is_rail());
        assert!(torch.is_redstone_battery());
        assert!(torch.is_redstone_network_member());
    }

    #[test]
    fn rail_names_follow_connections() {
        let mut rail = LevelBlock::new("rails");
        assert_eq!(rail.rail_type_name(), "rails");
        rail.state.connection_a = Some(FacingDirection::South);
        assert_eq!(rail.rail_connection_name(), "NorthSouth");
        rail.state.connection_b = Some(FacingDirection::West);
        assert_eq!(rail.rail_type_name(), "railsSouthWest");

        let mut powered = LevelBlock::new("railsUnpowered");
        powered.state.connection_a = Some(FacingDirection::East);
        powered.state.connection_b = Some(FacingDirection::West);
        powered.state.powered = true;
        assert_eq!(powered.rail_type_name(), "railsPoweredEastWest");
    }

    #[test]
    fn redstone_and_pressure_plates() {
        let wire = LevelBlock::new("redstoneWire");
        assert!(wire.is_redstone());
        assert!(wire.is_walkable());
        assert!(!wire.is_weakly_powerable());
        assert!(!wire.is_pushable());

        let up = LevelBlock::new("pressurePlateUp");
        let down = LevelBlock::new("pressurePlateDown");
        assert!(!up.is_redstone_battery());
        assert!(down.is_redstone_battery());
        assert!(up.is_connected_to_redstone());
    }

    #[test]
    fn variant_change_keeps_capabilities() {
        let mut wire = LevelBlock::new("redstoneWire");
        let before = *wire.kind();
        wire.set_variant("redstoneWireCrossOn");
        assert_eq!(*wire.kind(), before);
        assert_eq!(wire.block_type(), "redstoneWireCrossOn");
    }

    #[test]
    fn pistons_and_arms() {
        let piston = LevelBlock::new("pistonRight");
        assert!(piston.is_piston());
        assert!(!piston.is_sticky_piston());
        assert_eq!(piston.piston_facing(), Some(FacingDirection::East));
        assert!(piston.is_pushable());

        let sticky = LevelBlock::new("pistonUpOnSticky");
        assert!(sticky.is_sticky_piston());
        assert!(sticky.is_extended_piston());
        assert!(!sticky.is_pushable());
        assert_eq!(sticky.piston_facing(), Some(FacingDirection::North));

        let arm = LevelBlock::new("pistonArmLeft");
        assert!(arm.is_piston_arm());
        assert!(!arm.is_piston());
        assert_eq!(arm.piston_facing(), Some(FacingDirection::West));

        assert_eq!(piston_type_name(FacingDirection::South, true, true), "pistonDownOnSticky");
        assert_eq!(piston_arm_type_name(FacingDirection::East, false), "pistonArmRight");
    }

    #[test]
    fn doors() {
        let mut door = LevelBlock::new("door");
        assert!(door.is_door());
        assert!(door.is_usable());
        assert!(!door.is_walkable());
        door.state.open = true;
        assert!(door.is_walkable());

        let iron = LevelBlock::new("doorIron");
        assert!(iron.is_iron_door());
        assert!(!iron.is_usable());
        assert!(iron.is_connected_to_redstone());
    }

    #[test]
    fn liquids_and_light() {
        let water = LevelBlock::new("water");
        assert!(water.is_liquid());
        assert!(!water.is_emissive());
        let lava = LevelBlock::new("lava");
        assert!(lava.is_liquid());
        assert!(lava.is_emissive());
        assert!(LevelBlock::new("torch").is_emissive());
        assert!(LevelBlock::new("glowstone").is_emissive());
        assert!(!LevelBlock::new("glass").is_solid());
    }

    #[test]
    fn miniblock_renames() {
        assert_eq!(miniblock_frame("oreIron"), "ingotIron");
        assert_eq!(miniblock_frame("treeBirch"), "logBirch");
        assert_eq!(miniblock_frame("redstoneWireTUpOn"), "redstoneDust");
        assert_eq!(miniblock_frame("railsPoweredNorthSouth"), "poweredRail");
        assert_eq!(miniblock_frame("pistonDownSticky"), "pistonSticky");
        assert_eq!(miniblock_frame("planksOak"), "planksOak");
        let mini = LevelBlock::new("planksOakMiniblock");
        assert!(mini.is_miniblock());
        assert!(mini.is_walkable());
    }

    #[test]
    fn capability_cache_is_stable() {
        assert_eq!(BlockKind::for_type("tnt"), BlockKind::for_type("tnt"));
        assert!(BlockKind::for_type("tnt").is_explosive);
    }
}
