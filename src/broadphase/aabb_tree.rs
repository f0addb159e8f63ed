use glam::Vec3A;

use crate::{body::BodyId, math::Aabb};

const NULL_NODE: usize = usize::MAX;

#[derive(Clone)]
struct Node {
    aabb: Aabb,
    parent: usize,
    left: usize,
    right: usize,
    body: BodyId,
    is_static: bool,
}

impl Node {
    const fn is_leaf(&self) -> bool {
        self.left == NULL_NODE
    }
}

/// Dynamic bounding-volume tree over body AABBs. Leaves store fat AABBs
/// (fixed margin plus a velocity-proportional term) so small movements do not
/// force a reinsertion; static bodies are inserted once and left alone.
pub struct AabbTree {
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: usize,
    fat_margin: f32,
    velocity_margin_factor: f32,
}

impl AabbTree {
    #[must_use]
    pub fn new(fat_margin: f32, velocity_margin_factor: f32) -> Self {
        Self {
            nodes: Vec::with_capacity(64),
            free: Vec::new(),
            root: NULL_NODE,
            fat_margin,
            velocity_margin_factor,
        }
    }

    fn fatten(&self, aabb: &Aabb, velocity: Vec3A) -> Aabb {
        let margin = Vec3A::splat(self.fat_margin) + velocity.abs() * self.velocity_margin_factor;
        aabb.inflated(margin)
    }

    /// Inserts a body and returns its leaf index.
    pub fn insert(&mut self, body: BodyId, aabb: Aabb, velocity: Vec3A, is_static: bool) -> usize {
        let fat = if is_static {
            aabb
        } else {
            self.fatten(&aabb, velocity)
        };

        let leaf = self.alloc_node(Node {
            aabb: fat,
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            body,
            is_static,
        });
        self.insert_leaf(leaf);
        leaf
    }

    pub fn remove(&mut self, leaf: usize) {
        self.remove_leaf(leaf);
        self.free_node(leaf);
    }

    /// Refreshes a leaf with the body's tight AABB. Returns true when the
    /// leaf had to be reinserted (its fat AABB no longer contained the tight
    /// one).
    pub fn update(&mut self, leaf: usize, aabb: Aabb, velocity: Vec3A) -> bool {
        debug_assert!(self.nodes[leaf].is_leaf());

        if self.nodes[leaf].aabb.contains(&aabb) {
            return false;
        }

        let fat = self.fatten(&aabb, velocity);
        self.remove_leaf(leaf);
        self.nodes[leaf].aabb = fat;
        self.insert_leaf(leaf);
        true
    }

    #[must_use]
    pub fn leaf_aabb(&self, leaf: usize) -> &Aabb {
        &self.nodes[leaf].aabb
    }

    /// Calls `visit` with every leaf whose fat AABB overlaps `aabb`,
    /// excluding `skip_leaf`.
    pub fn query_overlaps<F: FnMut(BodyId, bool)>(
        &self,
        aabb: &Aabb,
        skip_leaf: usize,
        mut visit: F,
    ) {
        if self.root == NULL_NODE {
            return;
        }

        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            if index == skip_leaf {
                continue;
            }

            let node = &self.nodes[index];
            if !node.aabb.overlaps(aabb) {
                continue;
            }

            if node.is_leaf() {
                visit(node.body, node.is_static);
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Calls `visit` with every leaf whose fat AABB is crossed by the ray.
    pub fn query_ray<F: FnMut(BodyId)>(&self, origin: Vec3A, dir: Vec3A, max_t: f32, mut visit: F) {
        if self.root == NULL_NODE {
            return;
        }

        let inv_dir = dir.recip();
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.aabb.ray_hit(origin, inv_dir, max_t).is_none() {
                continue;
            }

            if node.is_leaf() {
                visit(node.body);
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Leaves currently in the tree, static ones included.
    pub fn leaves(&self) -> impl Iterator<Item = (usize, BodyId, bool)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(index, node)| node.is_leaf() && !self.free.contains(index))
            .map(|(index, node)| (index, node.body, node.is_static))
    }

    fn alloc_node(&mut self, node: Node) -> usize {
        if let Some(index) = self.free.pop() {
            self.nodes[index] = node;
            index
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, index: usize) {
        // Mark as a parked leaf; the slot is recycled by alloc_node.
        self.nodes[index].left = NULL_NODE;
        self.nodes[index].right = NULL_NODE;
        self.free.push(index);
    }

    fn insert_leaf(&mut self, leaf: usize) {
        self.nodes[leaf].parent = NULL_NODE;

        if self.root == NULL_NODE {
            self.root = leaf;
            return;
        }

        // find the best sibling by surface-area cost
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let left = self.nodes[index].left;
            let right = self.nodes[index].right;

            let cost_left = leaf_aabb.merged(&self.nodes[left].aabb).surface_area()
                - self.nodes[left].aabb.surface_area();
            let cost_right = leaf_aabb.merged(&self.nodes[right].aabb).surface_area()
                - self.nodes[right].aabb.surface_area();

            index = if cost_left < cost_right { left } else { right };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.alloc_node(Node {
            aabb: leaf_aabb.merged(&self.nodes[sibling].aabb),
            parent: old_parent,
            left: sibling,
            right: leaf,
            body: self.nodes[sibling].body,
            is_static: false,
        });

        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else if self.nodes[old_parent].left == sibling {
            self.nodes[old_parent].left = new_parent;
        } else {
            self.nodes[old_parent].right = new_parent;
        }

        self.refit_upwards(new_parent);
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let sibling = if self.nodes[parent].left == leaf {
            self.nodes[parent].right
        } else {
            self.nodes[parent].left
        };

        let grand_parent = self.nodes[parent].parent;
        self.nodes[sibling].parent = grand_parent;

        if grand_parent == NULL_NODE {
            self.root = sibling;
        } else {
            if self.nodes[grand_parent].left == parent {
                self.nodes[grand_parent].left = sibling;
            } else {
                self.nodes[grand_parent].right = sibling;
            }
            self.refit_upwards(grand_parent);
        }

        self.free_node(parent);
    }

    fn refit_upwards(&mut self, mut index: usize) {
        while index != NULL_NODE {
            let left = self.nodes[index].left;
            let right = self.nodes[index].right;
            self.nodes[index].aabb = self.nodes[left].aabb.merged(&self.nodes[right].aabb);
            index = self.nodes[index].parent;
        }
    }
}
