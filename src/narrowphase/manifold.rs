use ahash::AHashMap;
use arrayvec::ArrayVec;
use glam::{Affine3A, Vec3A};

use crate::body::BodyId;
use crate::broadphase::BodyPair;

use super::epa::ContactData;

pub const MANIFOLD_CACHE_SIZE: usize = 4;

/// One persistent contact. Local points anchor the contact to the body
/// surfaces so it survives small relative motion; the accumulated impulses
/// are what warm starting feeds back to the solver on the next step.
#[derive(Debug, Clone, Copy)]
pub struct ContactPoint {
    pub local_on_a: Vec3A,
    pub local_on_b: Vec3A,
    pub world_on_a: Vec3A,
    pub world_on_b: Vec3A,
    /// World-space unit normal, pointing from body A toward body B.
    pub normal: Vec3A,
    /// Penetration depth, positive while the shapes overlap.
    pub depth: f32,
    pub accumulated_normal_impulse: f32,
    pub accumulated_tangent_impulse: [f32; 2],
}

impl ContactPoint {
    fn new(contact: &ContactData, transform_a: &Affine3A, transform_b: &Affine3A) -> Self {
        Self {
            local_on_a: transform_a.inverse().transform_point3a(contact.point_on_a),
            local_on_b: transform_b.inverse().transform_point3a(contact.point_on_b),
            world_on_a: contact.point_on_a,
            world_on_b: contact.point_on_b,
            normal: contact.normal,
            depth: contact.depth,
            accumulated_normal_impulse: 0.0,
            accumulated_tangent_impulse: [0.0; 2],
        }
    }
}

/// Persistent contact set for one body pair, at most four points. Identity
/// is the unordered pair of body ids, so the manifold outlives individual
/// contact points and keeps its warm-start data while the pair stays in
/// proximity.
#[derive(Debug, Clone)]
pub struct ContactManifold {
    pub pair: BodyPair,
    pub points: ArrayVec<ContactPoint, MANIFOLD_CACHE_SIZE>,
    /// Combined coefficients for the pair, refreshed on every contact add.
    pub friction: f32,
    pub restitution: f32,
}

impl ContactManifold {
    #[must_use]
    pub fn new(pair: BodyPair) -> Self {
        Self {
            pair,
            points: ArrayVec::new(),
            friction: 0.0,
            restitution: 0.0,
        }
    }

    /// Inserts the narrow-phase result, carrying accumulated impulses over
    /// from a cached point anchored at the same spot on body A.
    pub fn add_contact(
        &mut self,
        contact: &ContactData,
        transform_a: &Affine3A,
        transform_b: &Affine3A,
        breaking_threshold: f32,
    ) {
        if contact.depth < -breaking_threshold {
            return;
        }

        let mut point = ContactPoint::new(contact, transform_a, transform_b);

        if let Some(index) = self.cache_entry(point.local_on_a, breaking_threshold) {
            let cached = &self.points[index];
            point.accumulated_normal_impulse = cached.accumulated_normal_impulse;
            point.accumulated_tangent_impulse = cached.accumulated_tangent_impulse;
            self.points[index] = point;
        } else if self.points.is_full() {
            let index = self.replacement_index(&point);
            self.points[index] = point;
        } else {
            self.points.push(point);
        }
    }

    /// Re-derives world positions and depths from the current transforms and
    /// drops points that separated or slid apart beyond the threshold.
    pub fn refresh(
        &mut self,
        transform_a: &Affine3A,
        transform_b: &Affine3A,
        breaking_threshold: f32,
    ) {
        for point in &mut self.points {
            point.world_on_a = transform_a.transform_point3a(point.local_on_a);
            point.world_on_b = transform_b.transform_point3a(point.local_on_b);
            point.depth = (point.world_on_a - point.world_on_b).dot(point.normal);
        }

        let threshold_sq = breaking_threshold * breaking_threshold;
        self.points.retain(|point| {
            if point.depth < -breaking_threshold {
                return false;
            }
            // drop points whose anchors slid apart tangentially
            let projected = point.world_on_a - point.normal * point.depth;
            (point.world_on_b - projected).length_squared() <= threshold_sq
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Nearest cached point anchored within `threshold` of the new anchor
    /// on body A.
    fn cache_entry(&self, local_on_a: Vec3A, threshold: f32) -> Option<usize> {
        let threshold_sq = threshold * threshold;
        let mut best = None;
        let mut best_dist_sq = threshold_sq;

        for (index, point) in self.points.iter().enumerate() {
            let dist_sq = (point.local_on_a - local_on_a).length_squared();
            if dist_sq <= best_dist_sq {
                best_dist_sq = dist_sq;
                best = Some(index);
            }
        }

        best
    }

    /// Which cached point to evict for `new_point` when the cache is full:
    /// never the deepest, otherwise the one whose removal keeps the largest
    /// contact area.
    fn replacement_index(&self, new_point: &ContactPoint) -> usize {
        debug_assert!(self.points.is_full());

        let mut deepest = MANIFOLD_CACHE_SIZE;
        let mut max_depth = new_point.depth;
        for (index, point) in self.points.iter().enumerate() {
            if point.depth > max_depth {
                max_depth = point.depth;
                deepest = index;
            }
        }

        // quadrilateral area (squared) if the cached point at `index` is
        // replaced by the new point
        const KEPT: [[usize; 3]; 4] = [[1, 3, 2], [0, 3, 2], [0, 3, 1], [0, 2, 1]];
        let area = |index: usize| {
            let [p1, p2, p3] = KEPT[index].map(|i| self.points[i].local_on_a);
            (new_point.local_on_a - p1)
                .cross(p2 - p3)
                .length_squared()
        };

        let mut best = 0;
        let mut best_area = f32::MIN;
        for index in 0..MANIFOLD_CACHE_SIZE {
            if index == deepest {
                continue;
            }
            let candidate_area = area(index);
            if candidate_area > best_area {
                best_area = candidate_area;
                best = index;
            }
        }

        best
    }
}

/// All live manifolds, keyed by body pair. Manifolds persist across steps
/// until the broad phase stops reporting the pair or a body is removed.
#[derive(Debug, Default)]
pub struct ManifoldStore {
    manifolds: AHashMap<BodyPair, ContactManifold>,
}

impl ManifoldStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&mut self, pair: BodyPair) -> &mut ContactManifold {
        self.manifolds
            .entry(pair)
            .or_insert_with(|| ContactManifold::new(pair))
    }

    #[must_use]
    pub fn get(&self, pair: &BodyPair) -> Option<&ContactManifold> {
        self.manifolds.get(pair)
    }

    pub fn remove_pair(&mut self, pair: &BodyPair) -> Option<ContactManifold> {
        self.manifolds.remove(pair)
    }

    pub fn remove_body(&mut self, id: BodyId) {
        self.manifolds.retain(|pair, _| !pair.involves(id));
    }

    pub fn retain_non_empty(&mut self) {
        self.manifolds.retain(|_, manifold| !manifold.is_empty());
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContactManifold> {
        self.manifolds.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ContactManifold> {
        self.manifolds.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.manifolds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifolds.is_empty()
    }
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::*;

    fn pair() -> BodyPair {
        let a = BodyId {
            index: 0,
            generation: 0,
        };
        let b = BodyId {
            index: 1,
            generation: 0,
        };
        BodyPair::new(a, b)
    }

    fn contact_at(point_on_a: Vec3, depth: f32) -> ContactData {
        ContactData {
            point_on_a: point_on_a.into(),
            point_on_b: Vec3A::from(point_on_a) - Vec3A::Y * depth,
            normal: Vec3A::Y,
            depth,
        }
    }

    #[test]
    fn warm_start_data_survives_nearby_readd() {
        let mut manifold = ContactManifold::new(pair());
        let identity = Affine3A::IDENTITY;

        manifold.add_contact(&contact_at(Vec3::ZERO, 0.01), &identity, &identity, 0.02);
        manifold.points[0].accumulated_normal_impulse = 3.5;

        // same anchor within the breaking threshold
        manifold.add_contact(
            &contact_at(Vec3::new(0.005, 0.0, 0.0), 0.012),
            &identity,
            &identity,
            0.02,
        );

        assert_eq!(manifold.points.len(), 1);
        assert!((manifold.points[0].accumulated_normal_impulse - 3.5).abs() < f32::EPSILON);
        assert!((manifold.points[0].depth - 0.012).abs() < f32::EPSILON);
    }

    #[test]
    fn distant_contact_gets_its_own_point() {
        let mut manifold = ContactManifold::new(pair());
        let identity = Affine3A::IDENTITY;

        manifold.add_contact(&contact_at(Vec3::ZERO, 0.01), &identity, &identity, 0.02);
        manifold.add_contact(
            &contact_at(Vec3::new(1.0, 0.0, 0.0), 0.01),
            &identity,
            &identity,
            0.02,
        );

        assert_eq!(manifold.points.len(), 2);
    }

    #[test]
    fn full_cache_never_evicts_the_deepest_point() {
        let mut manifold = ContactManifold::new(pair());
        let identity = Affine3A::IDENTITY;

        manifold.add_contact(&contact_at(Vec3::new(1.0, 0.0, 1.0), 0.5), &identity, &identity, 0.02);
        manifold.add_contact(&contact_at(Vec3::new(-1.0, 0.0, 1.0), 0.01), &identity, &identity, 0.02);
        manifold.add_contact(&contact_at(Vec3::new(-1.0, 0.0, -1.0), 0.01), &identity, &identity, 0.02);
        manifold.add_contact(&contact_at(Vec3::new(1.0, 0.0, -1.0), 0.01), &identity, &identity, 0.02);

        manifold.add_contact(&contact_at(Vec3::new(0.2, 0.0, 0.2), 0.01), &identity, &identity, 0.02);

        assert_eq!(manifold.points.len(), MANIFOLD_CACHE_SIZE);
        assert!(manifold.points.iter().any(|p| (p.depth - 0.5).abs() < f32::EPSILON));
    }

    #[test]
    fn refresh_drops_separated_points() {
        let mut manifold = ContactManifold::new(pair());
        let identity = Affine3A::IDENTITY;

        manifold.add_contact(&contact_at(Vec3::ZERO, 0.01), &identity, &identity, 0.02);
        assert_eq!(manifold.points.len(), 1);

        // pull body A away along the contact normal, past the threshold
        let lifted = Affine3A::from_translation(Vec3::new(0.0, -0.5, 0.0));
        manifold.refresh(&lifted, &identity, 0.02);

        assert!(manifold.is_empty());
    }
}
