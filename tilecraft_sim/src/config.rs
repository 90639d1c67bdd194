// Data-driven configuration.
//
// Two layers:
// - `GameConfig`: tunables shared by every level (health, damage, animation
//   timing for the headless presenter, explosion radius, `repeatRandom`
//   bounds, day/night period) plus per-mob behaviour data in `mobs`, keyed
//   by entity type tag. Loaded from JSON or built with `Default`.
// - `LevelConfig`: the static description of one level: grid size, the four
//   block planes as row-major tag arrays, initial entities, player/agent
//   start, lighting, and the declarative win/loss `Condition`s. JSON keys
//   are camelCase.
//
// Neither is mutated at runtime. `LevelModel::reset` rebuilds the world from
// the same `LevelConfig` every attempt.
//
// See also: `entity.rs` for `MobProfile` consumers, `level.rs` where the
// level config is validated and `Condition::evaluate` lives.

use crate::entity::MoveThrough;
use crate::error::LevelError;
use crate::plane::PlaneType;
use crate::types::{FacingDirection, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Mob behaviour data
// ---------------------------------------------------------------------------

/// Behaviour knobs for one mob type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MobProfile {
    /// Lives in water: may only walk on liquid ground.
    pub aquatic: bool,
    /// What happens when something moves into this mob's cell.
    pub move_through: MoveThrough,
    /// Sets `is_burning` while it is day.
    pub burns_in_daylight: bool,
    pub triggers_pressure_plates: bool,
    /// Draw-order nudge relative to other entities on the same row.
    pub sort_order_offset: i32,
    /// Miniblock dropped when killed.
    pub drop: Option<String>,
}

impl MobProfile {
    fn land(drop: Option<&str>) -> Self {
        Self {
            aquatic: false,
            move_through: MoveThrough::Block,
            burns_in_daylight: false,
            triggers_pressure_plates: true,
            sort_order_offset: 0,
            drop: drop.map(str::to_string),
        }
    }

    fn fish() -> Self {
        Self {
            aquatic: true,
            move_through: MoveThrough::Consumed,
            burns_in_daylight: false,
            triggers_pressure_plates: false,
            sort_order_offset: -1,
            drop: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Global tunables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// Starting health for every entity.
    pub default_health_points: i32,
    /// Health removed by one `attack`.
    pub attack_damage: i32,
    /// Ticks the headless presenter takes to finish any animation.
    pub animation_duration_ticks: u32,
    /// Chebyshev radius destroyed by TNT and `explode`.
    pub explosion_radius: i32,
    /// Inclusive iteration bounds for `repeatRandom`.
    pub repeat_random_range: (i32, i32),
    /// Default period between day/night toggles for `setDayNightCycle`.
    pub day_night_period_ticks: u64,
    /// Tries before a random spawn position search gives up.
    pub random_spawn_attempts: u32,
    /// Per-mob behaviour keyed by entity type tag.
    pub mobs: BTreeMap<String, MobProfile>,
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut mobs = BTreeMap::new();
        mobs.insert("sheep".to_string(), MobProfile::land(Some("wool")));
        mobs.insert("cow".to_string(), MobProfile::land(Some("leather")));
        mobs.insert("chicken".to_string(), MobProfile::land(Some("feather")));
        mobs.insert("creeper".to_string(), MobProfile::land(Some("gunPowder")));
        mobs.insert("ironGolem".to_string(), MobProfile::land(Some("ingotIron")));
        mobs.insert(
            "zombie".to_string(),
            MobProfile {
                burns_in_daylight: true,
                ..MobProfile::land(Some("rottenFlesh"))
            },
        );
        mobs.insert(
            "boat".to_string(),
            MobProfile {
                aquatic: true,
                move_through: MoveThrough::PassThrough,
                triggers_pressure_plates: false,
                sort_order_offset: -1,
                ..MobProfile::land(None)
            },
        );
        for fish in ["cod", "salmon", "tropicalFish"] {
            mobs.insert(fish.to_string(), MobProfile::fish());
        }

        Self {
            default_health_points: 3,
            attack_damage: 1,
            animation_duration_ticks: 2,
            explosion_radius: 1,
            repeat_random_range: (2, 6),
            day_night_period_ticks: 60,
            random_spawn_attempts: 20,
            mobs,
        }
    }
}

// ---------------------------------------------------------------------------
// Win/loss conditions
// ---------------------------------------------------------------------------

/// Numeric comparison used by counting conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CountCheck {
    AtLeast(i64),
    AtMost(i64),
    Exactly(i64),
}

impl CountCheck {
    pub fn test(self, value: i64) -> bool {
        match self {
            CountCheck::AtLeast(n) => value >= n,
            CountCheck::AtMost(n) => value <= n,
            CountCheck::Exactly(n) => value == n,
        }
    }
}

/// Declarative predicate over the live level. Evaluated by
/// `Condition::evaluate` in `level.rs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Condition {
    Always,
    Never,
    /// The cell on `plane` holds exactly `block_type`.
    BlockAt {
        plane: PlaneType,
        position: [i32; 2],
        block_type: String,
    },
    /// Some entity of `entity_type` stands at `position`.
    EntityAt {
        entity_type: String,
        position: [i32; 2],
    },
    /// Player inventory count of `item`.
    InventoryCount { item: String, check: CountCheck },
    /// Live entities of a type.
    EntityCount { entity_type: String, check: CountCheck },
    /// Entities of a type destroyed so far.
    DeathCount { entity_type: String, check: CountCheck },
    PlayerAlive,
    Score { check: CountCheck },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

// ---------------------------------------------------------------------------
// LevelConfig
// ---------------------------------------------------------------------------

/// Selects the end-of-level animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecialLevelType {
    Freeplay,
    Minecart,
    HouseBuild,
    AgentSpawn,
}

/// One initial entity: `[type, x, y, facing]`.
pub type EntitySpec = (String, i32, i32, FacingDirection);

fn default_true() -> bool {
    true
}

fn default_facing() -> FacingDirection {
    FacingDirection::South
}

/// Static description of a level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    /// `[width, height]`.
    pub grid_dimensions: [i32; 2],
    pub ground_plane: Vec<String>,
    /// Empty means all-empty.
    #[serde(default)]
    pub action_plane: Vec<String>,
    #[serde(default)]
    pub ground_decoration_plane: Vec<String>,
    #[serde(default)]
    pub fluff_plane: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
    #[serde(default = "default_true")]
    pub use_player: bool,
    #[serde(default)]
    pub player_start_position: [i32; 2],
    #[serde(default = "default_facing")]
    pub player_start_direction: FacingDirection,
    #[serde(default)]
    pub use_agent: bool,
    #[serde(default)]
    pub agent_start_position: Option<[i32; 2]>,
    #[serde(default = "default_facing")]
    pub agent_start_direction: FacingDirection,
    #[serde(default = "default_true")]
    pub is_daytime: bool,
    /// Arrow-key control: walking into water/lava is refused rather than
    /// fatal.
    #[serde(default)]
    pub is_direct_player_control: bool,
    #[serde(default)]
    pub verification: Option<Condition>,
    #[serde(default)]
    pub failure_check: Option<Condition>,
    /// Ticks after which the attempt resolves by `verification` alone.
    #[serde(default)]
    pub level_verification_timeout: Option<u64>,
    #[serde(default)]
    pub special_level_type: Option<SpecialLevelType>,
    #[serde(default)]
    pub seed: u64,
}

impl LevelConfig {
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn width(&self) -> i32 {
        self.grid_dimensions[0]
    }

    pub fn height(&self) -> i32 {
        self.grid_dimensions[1]
    }

    pub fn player_start(&self) -> Position {
        to_position(self.player_start_position)
    }

    /// Agent start; defaults to the player start.
    pub fn agent_start(&self) -> Position {
        self.agent_start_position
            .map(to_position)
            .unwrap_or_else(|| self.player_start())
    }

    pub fn is_freeplay(&self) -> bool {
        self.special_level_type == Some(SpecialLevelType::Freeplay)
    }
}

pub(crate) fn to_position(xy: [i32; 2]) -> Position {
    Position::new(xy[0], xy[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_json() {
        let config = GameConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = GameConfig::from_json(&json).unwrap();
        assert_eq!(restored.default_health_points, 3);
        assert_eq!(restored.mobs.len(), config.mobs.len());
        assert_eq!(restored.mobs["zombie"], config.mobs["zombie"]);
        assert!(restored.mobs["zombie"].burns_in_daylight);
        assert_eq!(restored.mobs["cod"].move_through, MoveThrough::Consumed);
    }

    #[test]
    fn level_config_loads_camel_case_json() {
        let json = r#"{
            "gridDimensions": [3, 2],
            "groundPlane": ["grass", "grass", "water", "grass", "grass", "lava"],
            "actionPlane": ["", "stone", "", "", "", ""],
            "entities": [["sheep", 2, 1, "West"]],
            "playerStartPosition": [0, 0],
            "playerStartDirection": "East",
            "isDaytime": false,
            "verification": {
                "type": "all",
                "conditions": [
                    {"type": "blockAt", "plane": "Action", "position": [1, 0], "blockType": ""},
                    {"type": "inventoryCount", "item": "stone", "check": {"atLeast": 1}}
                ]
            },
            "levelVerificationTimeout": 100,
            "specialLevelType": "houseBuild"
        }"#;
        let level = LevelConfig::from_json(json).unwrap();
        assert_eq!(level.width(), 3);
        assert_eq!(level.height(), 2);
        assert_eq!(level.entities[0], ("sheep".to_string(), 2, 1, FacingDirection::West));
        assert_eq!(level.player_start_direction, FacingDirection::East);
        assert!(level.use_player);
        assert!(!level.use_agent);
        assert!(!level.is_daytime);
        assert_eq!(level.agent_start(), Position::new(0, 0));
        assert_eq!(level.special_level_type, Some(SpecialLevelType::HouseBuild));
        match level.verification {
            Some(Condition::All { conditions }) => assert_eq!(conditions.len(), 2),
            other => panic!("unexpected verification {other:?}"),
        }
    }

    #[test]
    fn malformed_level_is_an_error() {
        let err = LevelConfig::from_json(r#"{"gridDimensions": [1]}"#).unwrap_err();
        assert!(matches!(err, LevelError::Json(_)));
    }

    #[test]
    fn count_checks() {
        assert!(CountCheck::AtLeast(2).test(3));
        assert!(!CountCheck::AtMost(2).test(3));
        assert!(CountCheck::Exactly(0).test(0));
    }
}
