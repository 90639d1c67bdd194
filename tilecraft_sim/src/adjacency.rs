// Partition of grid positions into connected components.
//
// `AdjacencySet` groups positions under a caller-supplied adjacency predicate
// (default: one orthogonal step, `Position::is_adjacent`). The action plane
// keeps one persistently for redstone wire + batteries; rail power builds a
// throwaway one per pass with a stricter "rails point at each other"
// predicate.
//
// `add` merges every component the new position touches. `remove` pulls the
// position out and re-adds the remaining members of its old component one by
// one, which splits the component if the removal disconnected it. Both are
// quadratic in the worst case; levels are at most a few hundred cells.
//
// See also: `plane.rs` (`refresh_redstone`, `power_rails`).

use crate::types::Position;

/// Disjoint connected components of positions.
#[derive(Clone, Debug)]
pub struct AdjacencySet<F = fn(Position, Position) -> bool> {
    sets: Vec<Vec<Position>>,
    adjacent: F,
}

impl AdjacencySet {
    /// Components under orthogonal adjacency.
    pub fn new() -> Self {
        Self::with_predicate(Position::is_adjacent as fn(Position, Position) -> bool)
    }
}

impl Default for AdjacencySet {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Fn(Position, Position) -> bool> AdjacencySet<F> {
    pub fn with_predicate(adjacent: F) -> Self {
        Self {
            sets: Vec::new(),
            adjacent,
        }
    }

    /// Insert a position, merging every component it touches. Returns `false`
    /// if it was already present.
    pub fn add(&mut self, position: Position) -> bool {
        if self.find(position).is_some() {
            return false;
        }

        let touching: Vec<usize> = self
            .sets
            .iter()
            .enumerate()
            .filter(|(_, set)| set.iter().any(|&p| (self.adjacent)(p, position)))
            .map(|(i, _)| i)
            .collect();

        match touching.as_slice() {
            [] => self.sets.push(vec![position]),
            [only] => self.sets[*only].push(position),
            _ => {
                let mut merged = Vec::new();
                // Highest index first so the earlier indices stay valid.
                for &i in touching.iter().rev() {
                    merged.extend(self.sets.swap_remove(i));
                }
                merged.push(position);
                self.sets.push(merged);
            }
        }
        true
    }

    /// Remove a position and re-derive its old component. Returns `false` if
    /// it was not present.
    pub fn remove(&mut self, position: Position) -> bool {
        let Some(index) = self.sets.iter().position(|set| set.contains(&position)) else {
            return false;
        };
        let old = self.sets.swap_remove(index);
        for member in old.into_iter().filter(|&p| p != position) {
            self.add(member);
        }
        true
    }

    /// The component containing `position`.
    pub fn find(&self, position: Position) -> Option<&[Position]> {
        self.sets
            .iter()
            .find(|set| set.contains(&position))
            .map(Vec::as_slice)
    }

    pub fn contains(&self, position: Position) -> bool {
        self.find(position).is_some()
    }

    pub fn components(&self) -> impl Iterator<Item = &[Position]> {
        self.sets.iter().map(Vec::as_slice)
    }

    pub fn component_count(&self) -> usize {
        self.sets.len()
    }

    pub fn len(&self) -> usize {
        self.sets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    fn sorted(component: &[Position]) -> Vec<Position> {
        let mut v = component.to_vec();
        v.sort();
        v
    }

    /// Every member of a component reaches every other through members only.
    fn assert_connected<F: Fn(Position, Position) -> bool>(set: &AdjacencySet<F>) {
        for component in set.components() {
            let mut reached = vec![component[0]];
            let mut frontier = vec![component[0]];
            while let Some(cur) = frontier.pop() {
                for &other in component {
                    if !reached.contains(&other) && (set.adjacent)(cur, other) {
                        reached.push(other);
                        frontier.push(other);
                    }
                }
            }
            assert_eq!(reached.len(), component.len(), "component {component:?} is split");
        }
    }

    #[test]
    fn separate_then_merge() {
        let mut set = AdjacencySet::new();
        assert!(set.add(p(0, 0)));
        assert!(set.add(p(1, 0)));
        assert!(set.add(p(3, 0)));
        assert_eq!(set.component_count(), 2);
        assert_eq!(sorted(set.find(p(0, 0)).unwrap()), vec![p(0, 0), p(1, 0)]);
        assert_eq!(set.find(p(3, 0)).unwrap(), &[p(3, 0)]);

        assert!(set.add(p(2, 0)));
        assert_eq!(set.component_count(), 1);
        assert_eq!(set.len(), 4);
        assert_connected(&set);
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut set = AdjacencySet::new();
        assert!(set.add(p(4, 4)));
        assert!(!set.add(p(4, 4)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn removing_a_bridge_splits_the_component() {
        let mut set = AdjacencySet::new();
        for x in 0..5 {
            set.add(p(x, 0));
        }
        assert_eq!(set.component_count(), 1);

        assert!(set.remove(p(2, 0)));
        assert_eq!(set.component_count(), 2);
        assert_eq!(sorted(set.find(p(0, 0)).unwrap()), vec![p(0, 0), p(1, 0)]);
        assert_eq!(sorted(set.find(p(4, 0)).unwrap()), vec![p(3, 0), p(4, 0)]);
        assert!(set.find(p(2, 0)).is_none());
        assert_connected(&set);
    }

    #[test]
    fn removing_a_missing_position_is_noop() {
        let mut set = AdjacencySet::new();
        set.add(p(0, 0));
        assert!(!set.remove(p(9, 9)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn three_way_merge_through_a_junction() {
        let mut set = AdjacencySet::new();
        set.add(p(1, 0));
        set.add(p(0, 1));
        set.add(p(2, 1));
        set.add(p(1, 2));
        assert_eq!(set.component_count(), 4);
        set.add(p(1, 1));
        assert_eq!(set.component_count(), 1);
        assert_connected(&set);

        set.remove(p(1, 1));
        assert_eq!(set.component_count(), 4);
    }

    #[test]
    fn custom_predicate_groups_diagonals() {
        let mut set = AdjacencySet::with_predicate(|a: Position, b: Position| {
            (a.x - b.x).abs() <= 1 && (a.y - b.y).abs() <= 1 && a != b
        });
        set.add(p(0, 0));
        set.add(p(1, 1));
        set.add(p(2, 2));
        assert_eq!(set.component_count(), 1);
        assert_connected(&set);
    }

    #[test]
    fn partition_holds_after_mixed_operations() {
        let mut set = AdjacencySet::new();
        let ops: [(i32, i32, bool); 10] = [
            (0, 0, true),
            (0, 1, true),
            (2, 2, true),
            (1, 1, true),
            (0, 1, false),
            (2, 1, true),
            (1, 2, true),
            (1, 1, false),
            (0, 1, true),
            (1, 1, true),
        ];
        for (x, y, add) in ops {
            if add {
                set.add(p(x, y));
            } else {
                set.remove(p(x, y));
            }
            let mut all: Vec<Position> = set.components().flatten().copied().collect();
            let total = all.len();
            all.sort();
            all.dedup();
            assert_eq!(all.len(), total, "a position appears in two components");
            assert_connected(&set);
        }
    }
}
