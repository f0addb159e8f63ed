use ahash::AHashSet;

use crate::body::BodyId;

/// Unordered pair of body ids; the canonical ordering makes (a, b) and
/// (b, a) the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyPair {
    pub a: BodyId,
    pub b: BodyId,
}

impl BodyPair {
    #[must_use]
    pub fn new(a: BodyId, b: BodyId) -> Self {
        debug_assert_ne!(a, b);
        if a < b { Self { a, b } } else { Self { a: b, b: a } }
    }

    #[must_use]
    pub fn other(&self, id: BodyId) -> BodyId {
        if self.a == id { self.b } else { self.a }
    }

    #[must_use]
    pub fn involves(&self, id: BodyId) -> bool {
        self.a == id || self.b == id
    }
}

/// Pairs whose overlap state changed since the previous broad-phase refresh.
/// `added` is the sole trigger for narrow-phase tracking of a pair, `removed`
/// the sole trigger for dropping its contact data.
#[derive(Debug, Default)]
pub struct PairDiff {
    pub added: Vec<BodyPair>,
    pub removed: Vec<BodyPair>,
}

/// Tracks the current set of overlapping AABB pairs across steps and diffs
/// each refresh against the previous one.
#[derive(Default)]
pub struct OverlappingPairCache {
    current: AHashSet<BodyPair>,
}

impl OverlappingPairCache {
    /// Replaces the tracked set with `fresh`, reporting what appeared and
    /// what vanished.
    pub fn refresh(&mut self, fresh: AHashSet<BodyPair>) -> PairDiff {
        let mut diff = PairDiff::default();

        for &pair in &fresh {
            if !self.current.contains(&pair) {
                diff.added.push(pair);
            }
        }
        for &pair in &self.current {
            if !fresh.contains(&pair) {
                diff.removed.push(pair);
            }
        }

        // deterministic order for the narrow phase
        diff.added.sort_unstable();
        diff.removed.sort_unstable();

        self.current = fresh;
        diff
    }

    #[must_use]
    pub fn contains(&self, pair: BodyPair) -> bool {
        self.current.contains(&pair)
    }

    /// Drops every pair involving `id`, returning the removed pairs. Used
    /// when a body leaves the world mid-simulation.
    pub fn remove_body(&mut self, id: BodyId) -> Vec<BodyPair> {
        let removed: Vec<BodyPair> = self
            .current
            .iter()
            .copied()
            .filter(|pair| pair.involves(id))
            .collect();

        for pair in &removed {
            self.current.remove(pair);
        }

        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = BodyPair> + '_ {
        self.current.iter().copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(index: u32) -> BodyId {
        BodyId {
            index,
            generation: 0,
        }
    }

    #[test]
    fn pair_is_unordered() {
        assert_eq!(BodyPair::new(id(3), id(1)), BodyPair::new(id(1), id(3)));
    }

    #[test]
    fn refresh_reports_added_then_removed() {
        let mut cache = OverlappingPairCache::default();

        let ab = BodyPair::new(id(0), id(1));
        let bc = BodyPair::new(id(1), id(2));

        let diff = cache.refresh(AHashSet::from_iter([ab, bc]));
        assert_eq!(diff.added, vec![ab, bc]);
        assert!(diff.removed.is_empty());

        // same set again: no changes
        let diff = cache.refresh(AHashSet::from_iter([ab, bc]));
        assert!(diff.added.is_empty() && diff.removed.is_empty());

        let diff = cache.refresh(AHashSet::from_iter([ab]));
        assert!(diff.added.is_empty());
        assert_eq!(diff.removed, vec![bc]);
    }

    #[test]
    fn remove_body_clears_its_pairs() {
        let mut cache = OverlappingPairCache::default();
        let ab = BodyPair::new(id(0), id(1));
        let bc = BodyPair::new(id(1), id(2));
        cache.refresh(AHashSet::from_iter([ab, bc]));

        let mut removed = cache.remove_body(id(1));
        removed.sort_unstable();
        assert_eq!(removed, vec![ab, bc]);
        assert!(!cache.contains(ab));
    }
}
