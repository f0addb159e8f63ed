use ahash::AHashMap;

use crate::body::BodyId;

#[derive(Debug, Clone, Copy)]
struct IslandLink {
    body: BodyId,
    /// Parent element in the union-find forest; self-referencing at a root.
    parent: usize,
    linked_to_static: bool,
}

/// Result of grouping: one island of mutually-reachable dynamic bodies.
#[derive(Debug, Clone)]
pub struct Island {
    pub bodies: Vec<BodyId>,
    /// True when any member touches a static or kinematic body. An island
    /// floating free of static geometry is never allowed to sleep.
    pub linked_to_static: bool,
}

/// Union-find over the dynamic bodies of a step. Rebuilt from scratch every
/// step from the live contact manifolds, so stale connectivity can never
/// keep an island alive.
#[derive(Debug, Default)]
pub struct IslandContainer {
    index_of: AHashMap<BodyId, usize>,
    links: Vec<IslandLink>,
}

impl IslandContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new grouping pass: every body becomes its own island.
    /// Static bodies must not be passed in, they never join islands.
    pub fn reset(&mut self, bodies: impl IntoIterator<Item = BodyId>) {
        self.index_of.clear();
        self.links.clear();

        for body in bodies {
            let index = self.links.len();
            self.index_of.insert(body, index);
            self.links.push(IslandLink {
                body,
                parent: index,
                linked_to_static: false,
            });
        }
    }

    fn find(&self, mut index: usize) -> usize {
        while self.links[index].parent != index {
            index = self.links[index].parent;
        }
        index
    }

    /// `find` with path compression, for the mutable merge path.
    fn find_compress(&mut self, index: usize) -> usize {
        let root = self.find(index);
        let mut current = index;
        while current != root {
            current = std::mem::replace(&mut self.links[current].parent, root);
        }
        root
    }

    /// Joins the islands of two dynamic bodies in contact.
    pub fn merge_islands(&mut self, a: BodyId, b: BodyId) {
        let (Some(&index_a), Some(&index_b)) = (self.index_of.get(&a), self.index_of.get(&b))
        else {
            debug_assert!(false, "merge of bodies unknown to the island container");
            return;
        };

        let root_a = self.find_compress(index_a);
        let root_b = self.find_compress(index_b);
        if root_a != root_b {
            // lower root wins so island numbering is deterministic
            let (low, high) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.links[high].parent = low;
        }
    }

    /// Records that a dynamic body rests against static geometry. The flag
    /// spreads to the whole island when the islands are retrieved.
    pub fn link_to_static(&mut self, body: BodyId) {
        if let Some(&index) = self.index_of.get(&body) {
            self.links[index].linked_to_static = true;
        } else {
            debug_assert!(false, "static link for a body unknown to the island container");
        }
    }

    #[must_use]
    pub fn island_root(&self, body: BodyId) -> Option<usize> {
        self.index_of.get(&body).map(|&index| self.find(index))
    }

    /// Materializes the islands, ordered by their lowest member so the
    /// caller iterates them deterministically.
    #[must_use]
    pub fn islands(&self) -> Vec<Island> {
        let mut by_root: AHashMap<usize, Island> = AHashMap::new();

        for (index, link) in self.links.iter().enumerate() {
            let root = self.find(index);
            let island = by_root.entry(root).or_insert_with(|| Island {
                bodies: Vec::new(),
                linked_to_static: false,
            });
            island.bodies.push(link.body);
            island.linked_to_static |= link.linked_to_static;
        }

        let mut roots: Vec<usize> = by_root.keys().copied().collect();
        roots.sort_unstable();
        roots
            .into_iter()
            .map(|root| by_root.remove(&root).unwrap_or_else(|| unreachable!()))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ids(count: u32) -> Vec<BodyId> {
        (0..count)
            .map(|index| BodyId {
                index,
                generation: 0,
            })
            .collect()
    }

    #[test]
    fn cascade_merge_joins_everything() {
        let bodies = ids(4);
        let mut container = IslandContainer::new();
        container.reset(bodies.iter().copied());

        // body n in contact with body n + 1
        container.merge_islands(bodies[0], bodies[1]);
        container.merge_islands(bodies[1], bodies[2]);
        container.merge_islands(bodies[2], bodies[3]);

        let islands = container.islands();
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].bodies.len(), 4);
    }

    #[test]
    fn redundant_merges_are_harmless() {
        let bodies = ids(3);
        let mut container = IslandContainer::new();
        container.reset(bodies.iter().copied());

        // every body in contact with every other
        container.merge_islands(bodies[0], bodies[1]);
        container.merge_islands(bodies[0], bodies[2]);
        container.merge_islands(bodies[1], bodies[2]);

        let islands = container.islands();
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].bodies.len(), 3);
    }

    #[test]
    fn disjoint_contacts_make_separate_islands() {
        let bodies = ids(4);
        let mut container = IslandContainer::new();
        container.reset(bodies.iter().copied());

        container.merge_islands(bodies[0], bodies[3]);
        container.merge_islands(bodies[2], bodies[1]);

        let islands = container.islands();
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].bodies.len(), 2);
        assert_eq!(islands[1].bodies.len(), 2);
        assert_ne!(
            container.island_root(bodies[0]),
            container.island_root(bodies[1])
        );
    }

    #[test]
    fn static_link_marks_the_whole_island() {
        let bodies = ids(3);
        let mut container = IslandContainer::new();
        container.reset(bodies.iter().copied());

        container.merge_islands(bodies[0], bodies[1]);
        container.link_to_static(bodies[1]);

        let islands = container.islands();
        assert_eq!(islands.len(), 2);

        let linked = islands
            .iter()
            .find(|island| island.bodies.contains(&bodies[0]))
            .unwrap();
        assert!(linked.linked_to_static);

        let lone = islands
            .iter()
            .find(|island| island.bodies.contains(&bodies[2]))
            .unwrap();
        assert!(!lone.linked_to_static);
    }
}
