// Grid coordinates and facing directions.
//
// `Position` is an integer cell on the 2D tile grid. `x` grows east, `y` grows
// south (row-major planes index `y * width + x`). `FacingDirection` is the
// 4-way facing used by entities, rails, pistons, and doors.
//
// Also holds `EntityId`, the string identifier every entity is registered
// under. The player is always `"Player"` and the agent `"PlayerAgent"`;
// everything else gets `<type><serial>` from the level model.
//
// See also: `plane.rs` for indexing, `adjacency.rs` which groups positions,
// `entity.rs` for the entities that carry a `Position` + `FacingDirection`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::ops::{Add, Sub};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell on the tile grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    pub const fn subtract(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }

    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Squared Euclidean distance. Used for proximity comparisons where the
    /// ordering is all that matters.
    pub fn absolute_distance_square(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }

    /// True iff `other` is exactly one orthogonal step away.
    pub fn is_adjacent(self, other: Self) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// The cell one step in `facing`.
    pub fn forward(self, facing: FacingDirection) -> Self {
        self + facing.offset()
    }

    /// The four orthogonal neighbours, in North, East, South, West order.
    pub fn orthogonal_positions(self) -> [Position; 4] {
        FacingDirection::ALL.map(|d| self.forward(d))
    }

    /// The eight surrounding cells, clockwise from north-west.
    pub fn surrounding_positions(self) -> [Position; 8] {
        const OFFSETS: [(i32, i32); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
        ];
        OFFSETS.map(|(dx, dy)| Position::new(self.x + dx, self.y + dy))
    }

    /// Cells at Chebyshev distance exactly `radius` (a square ring).
    /// Radius 0 is the cell itself.
    pub fn ring(self, radius: i32) -> SmallVec<[Position; 16]> {
        let mut out = SmallVec::new();
        if radius <= 0 {
            out.push(self);
            return out;
        }
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs() == radius || dy.abs() == radius {
                    out.push(Position::new(self.x + dx, self.y + dy));
                }
            }
        }
        out
    }

    /// Direction of a single orthogonal step from `self` to `other`, or
    /// `None` if they are not adjacent.
    pub fn direction_to(self, other: Self) -> Option<FacingDirection> {
        FacingDirection::ALL
            .into_iter()
            .find(|&d| self.forward(d) == other)
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, other: Self) -> Self {
        Position::add(self, other)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, other: Self) -> Self {
        Position::subtract(self, other)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Facing
// ---------------------------------------------------------------------------

/// Rotation sense for `turn`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnDirection {
    Left,
    Right,
}

/// 4-way facing. Discriminants match the clockwise order used by `turn`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FacingDirection {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl FacingDirection {
    pub const ALL: [FacingDirection; 4] = [
        FacingDirection::North,
        FacingDirection::East,
        FacingDirection::South,
        FacingDirection::West,
    ];

    fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(4) as usize]
    }

    pub fn offset(self) -> Position {
        match self {
            FacingDirection::North => Position::new(0, -1),
            FacingDirection::East => Position::new(1, 0),
            FacingDirection::South => Position::new(0, 1),
            FacingDirection::West => Position::new(-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self as i32 + 2)
    }

    pub fn turn(self, direction: TurnDirection) -> Self {
        match direction {
            TurnDirection::Right => Self::from_index(self as i32 + 1),
            TurnDirection::Left => Self::from_index(self as i32 - 1),
        }
    }

    /// Which single rotation turns `from` into `to`. `None` when they are
    /// equal or opposite (no single quarter turn does it).
    pub fn turn_direction(from: Self, to: Self) -> Option<TurnDirection> {
        if from.turn(TurnDirection::Right) == to {
            Some(TurnDirection::Right)
        } else if from.turn(TurnDirection::Left) == to {
            Some(TurnDirection::Left)
        } else {
            None
        }
    }

    /// Bit used in 4-neighbour connectivity masks (N=1, E=2, S=4, W=8).
    pub const fn mask_bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, FacingDirection::North | FacingDirection::South)
    }

    pub fn name(self) -> &'static str {
        match self {
            FacingDirection::North => "North",
            FacingDirection::East => "East",
            FacingDirection::South => "South",
            FacingDirection::West => "West",
        }
    }
}

impl fmt::Display for FacingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Entity identifiers
// ---------------------------------------------------------------------------

/// Identifier an entity is registered under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub const PLAYER: &'static str = "Player";
    pub const AGENT: &'static str = "PlayerAgent";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn player() -> Self {
        Self::new(Self::PLAYER)
    }

    pub fn agent() -> Self {
        Self::new(Self::AGENT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_subtract_are_inverse() {
        let a = Position::new(3, -2);
        let b = Position::new(-1, 5);
        assert_eq!((a + b) - b, a);
        assert_eq!(a.add(b), Position::new(2, 3));
        assert_eq!(a.subtract(b), Position::new(4, -7));
    }

    #[test]
    fn adjacency_is_orthogonal_only() {
        let p = Position::new(2, 2);
        for n in p.orthogonal_positions() {
            assert!(p.is_adjacent(n));
        }
        assert!(!p.is_adjacent(Position::new(3, 3)));
        assert!(!p.is_adjacent(p));
        assert!(!p.is_adjacent(Position::new(4, 2)));
    }

    #[test]
    fn distances() {
        let a = Position::new(0, 0);
        let b = Position::new(3, 4);
        assert_eq!(a.manhattan_distance(b), 7);
        assert_eq!(a.absolute_distance_square(b), 25);
    }

    #[test]
    fn surrounding_positions_are_distinct_and_exclude_center() {
        let p = Position::new(5, 5);
        let around = p.surrounding_positions();
        for (i, a) in around.iter().enumerate() {
            assert_ne!(*a, p);
            for b in &around[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn ring_sizes() {
        let p = Position::new(0, 0);
        assert_eq!(p.ring(0).len(), 1);
        assert_eq!(p.ring(1).len(), 8);
        assert_eq!(p.ring(2).len(), 16);
    }

    #[test]
    fn turning_wraps() {
        use FacingDirection::*;
        assert_eq!(North.turn(TurnDirection::Left), West);
        assert_eq!(West.turn(TurnDirection::Right), North);
        for d in FacingDirection::ALL {
            assert_eq!(d.opposite().opposite(), d);
            assert_eq!(d.turn(TurnDirection::Left).turn(TurnDirection::Right), d);
        }
    }

    #[test]
    fn turn_direction_between_facings() {
        use FacingDirection::*;
        assert_eq!(
            FacingDirection::turn_direction(North, East),
            Some(TurnDirection::Right)
        );
        assert_eq!(
            FacingDirection::turn_direction(North, West),
            Some(TurnDirection::Left)
        );
        assert_eq!(FacingDirection::turn_direction(North, South), None);
        assert_eq!(FacingDirection::turn_direction(East, East), None);
    }

    #[test]
    fn direction_to_neighbour() {
        let p = Position::new(1, 1);
        assert_eq!(p.direction_to(Position::new(1, 0)), Some(FacingDirection::North));
        assert_eq!(p.direction_to(Position::new(0, 1)), Some(FacingDirection::West));
        assert_eq!(p.direction_to(Position::new(2, 2)), None);
    }
}
