use ahash::AHashSet;
use glam::{Affine3A, Vec3A};

use crate::body::{BodyDescriptor, BodyId, RigidBody};
use crate::broadphase::{AabbTree, BodyPair, OverlappingPairCache};
use crate::config::PhysicsConfig;
use crate::error::{BodyError, WorldError};
use crate::island::IslandContainer;
use crate::math;
use crate::narrowphase::{ContactData, ContactManifold, EpaResult, GjkResult, ManifoldStore, epa, gjk};
use crate::pool::{ConvexObject, ConvexObjectPool};
use crate::shape::ConvexShape;
use crate::solver::SequentialImpulseSolver;

/// Generational storage of the world's bodies. Slots are reused but their
/// generation is bumped on removal, so a stale [`BodyId`] simply resolves to
/// nothing instead of another body.
#[derive(Default)]
pub struct Bodies {
    slots: Vec<BodySlot>,
    free: Vec<u32>,
}

struct BodySlot {
    generation: u32,
    body: Option<RigidBody>,
}

impl Bodies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: BodyDescriptor) -> Result<BodyId, BodyError> {
        let index = self
            .free
            .last()
            .copied()
            .unwrap_or(self.slots.len() as u32);
        let generation = self
            .slots
            .get(index as usize)
            .map_or(0, |slot| slot.generation);

        // validate before touching any slot, a rejected descriptor must
        // leave the storage unchanged
        let body = RigidBody::new(descriptor, BodyId { index, generation })?;

        if self.free.pop().is_some() {
            self.slots[index as usize].body = Some(body);
        } else {
            self.slots.push(BodySlot {
                generation: 0,
                body: Some(body),
            });
        }

        Ok(BodyId { index, generation })
    }

    #[must_use]
    pub fn get(&self, id: BodyId) -> Option<&RigidBody> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.body.as_ref())
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.body.as_mut())
    }

    pub fn remove(&mut self, id: BodyId) -> Option<RigidBody> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let body = slot.body.take()?;
        slot.generation += 1;
        self.free.push(id.index);
        Some(body)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RigidBody> {
        self.slots.iter().filter_map(|slot| slot.body.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RigidBody> {
        self.slots.iter_mut().filter_map(|slot| slot.body.as_mut())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pair-level contact transition, reported once per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContactEvent {
    Started(BodyPair),
    Stopped(BodyPair),
}

/// Read-only view of one persistent contact point, for external listeners
/// such as sound or gameplay triggers. `impulse` is the normal impulse the
/// solver applied at this point during the last step.
#[derive(Debug, Clone, Copy)]
pub struct ContactSnapshot {
    pub pair: BodyPair,
    /// World-space contact point on body B's surface.
    pub point: Vec3A,
    /// World-space unit normal, pointing from body A toward body B.
    pub normal: Vec3A,
    pub depth: f32,
    pub impulse: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub body: BodyId,
    /// Distance from the ray origin to the hit, along the ray direction.
    pub distance: f32,
    pub point: Vec3A,
    pub normal: Vec3A,
}

/// The simulation: bodies, broad and narrow phase, islands and the solver,
/// advanced by [`PhysicsWorld::step`].
pub struct PhysicsWorld {
    config: PhysicsConfig,
    bodies: Bodies,
    tree: AabbTree,
    pair_cache: OverlappingPairCache,
    manifolds: ManifoldStore,
    islands: IslandContainer,
    solver: SequentialImpulseSolver,
    pool: ConvexObjectPool,
    events: Vec<ContactEvent>,
}

impl PhysicsWorld {
    #[must_use]
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            bodies: Bodies::new(),
            tree: AabbTree::new(config.aabb_fat_margin, config.velocity_margin_factor),
            pair_cache: OverlappingPairCache::default(),
            manifolds: ManifoldStore::new(),
            islands: IslandContainer::new(),
            solver: SequentialImpulseSolver::new(),
            pool: ConvexObjectPool::new(config.convex_pool_capacity),
            events: Vec::new(),
            config,
        }
    }

    pub fn add_body(&mut self, descriptor: BodyDescriptor) -> Result<BodyId, BodyError> {
        let id = self.bodies.insert(descriptor)?;

        // the freshly inserted body always resolves
        let Some(body) = self.bodies.get(id) else {
            unreachable!()
        };
        let (aabb, velocity, is_static) = (body.aabb(), body.linear_velocity, body.is_static());
        let proxy = self.tree.insert(id, aabb, velocity, is_static);
        if let Some(body) = self.bodies.get_mut(id) {
            body.proxy = proxy;
        }

        log::debug!("body {id:?} added");
        Ok(id)
    }

    /// Removes a body and everything referencing it in one operation: its
    /// broad-phase proxy, its tracked pairs and its contact manifolds. Bodies
    /// it was supporting are woken.
    pub fn remove_body(&mut self, id: BodyId) -> Result<(), WorldError> {
        let body = self.bodies.remove(id).ok_or(WorldError::UnknownBody(id))?;
        self.tree.remove(body.proxy);

        for pair in self.pair_cache.remove_body(id) {
            let touching = self
                .manifolds
                .remove_pair(&pair)
                .is_some_and(|manifold| !manifold.is_empty());
            if touching {
                self.events.push(ContactEvent::Stopped(pair));
                if let Some(other) = self.bodies.get_mut(pair.other(id)) {
                    other.active = true;
                    other.deactivation_time = 0.0;
                    other.forced_asleep = false;
                }
            }
        }
        self.manifolds.remove_body(id);

        log::debug!("body {id:?} removed");
        Ok(())
    }

    /// Forces a body awake or asleep. Deactivating zeroes its velocities and
    /// keeps the body down until it is explicitly woken or gains a fresh
    /// contact; activating resets its rest timer so the island logic keeps
    /// the whole island awake on the next step.
    pub fn set_active(&mut self, id: BodyId, active: bool) -> Result<(), WorldError> {
        let body = self.bodies.get_mut(id).ok_or(WorldError::UnknownBody(id))?;
        body.active = active;
        body.deactivation_time = 0.0;
        body.forced_asleep = !active;
        if !active {
            body.linear_velocity = Vec3A::ZERO;
            body.angular_velocity = Vec3A::ZERO;
        }
        Ok(())
    }

    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    #[must_use]
    pub const fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Contact transitions observed during the last [`Self::step`] (plus any
    /// produced by body removal since then).
    #[must_use]
    pub fn contact_events(&self) -> &[ContactEvent] {
        &self.events
    }

    /// Snapshot of every live contact point after the last step's solve.
    #[must_use]
    pub fn contacts(&self) -> Vec<ContactSnapshot> {
        self.manifolds
            .iter()
            .flat_map(|manifold| {
                manifold.points.iter().map(|point| ContactSnapshot {
                    pair: manifold.pair,
                    point: point.world_on_b,
                    normal: point.normal,
                    depth: point.depth,
                    impulse: point.accumulated_normal_impulse,
                })
            })
            .collect()
    }

    /// Advances the simulation by `time_step` seconds.
    pub fn step(&mut self, time_step: f32) {
        if time_step <= 0.0 {
            return;
        }

        self.events.clear();
        let previously_touching: AHashSet<BodyPair> = self
            .manifolds
            .iter()
            .filter(|manifold| !manifold.is_empty())
            .map(|manifold| manifold.pair)
            .collect();

        self.apply_forces(time_step);
        self.update_broad_phase();
        self.update_narrow_phase(&previously_touching);
        self.build_islands();
        self.solve_islands(time_step);
        self.update_sleep_state(time_step);
        self.integrate(time_step);
        self.emit_contact_events(&previously_touching);
    }

    fn apply_forces(&mut self, time_step: f32) {
        let gravity = self.config.gravity;
        for body in self.bodies.iter_mut() {
            if body.is_dynamic() && body.active {
                body.linear_velocity += gravity * time_step;
                body.apply_damping(time_step);
            }
        }
    }

    fn update_broad_phase(&mut self) {
        for body in self.bodies.iter_mut() {
            if !body.is_static() {
                self.tree.update(body.proxy, body.aabb(), body.linear_velocity);
            }
        }

        let mut fresh = AHashSet::new();
        for (leaf, id, is_static) in self.tree.leaves() {
            // static leaves never seed pairs, they are only found by others
            if is_static {
                continue;
            }
            let aabb = *self.tree.leaf_aabb(leaf);
            self.tree.query_overlaps(&aabb, leaf, |other, _| {
                fresh.insert(BodyPair::new(id, other));
            });
        }

        let diff = self.pair_cache.refresh(fresh);
        for pair in &diff.removed {
            self.manifolds.remove_pair(pair);
        }
    }

    fn update_narrow_phase(&mut self, previously_touching: &AHashSet<BodyPair>) {
        let breaking = self.config.contact_breaking_threshold;
        let margin = self.config.shape_margin;
        let pairs: Vec<BodyPair> = self.pair_cache.iter().collect();

        for pair in pairs {
            let (Some(body_a), Some(body_b)) = (self.bodies.get(pair.a), self.bodies.get(pair.b))
            else {
                continue;
            };

            // at least one dynamic body, and a sleeping pair keeps its
            // manifold frozen
            if !body_a.is_dynamic() && !body_b.is_dynamic() {
                continue;
            }
            if !body_a.active && !body_b.active {
                continue;
            }

            let transform_a = body_a.transform;
            let transform_b = body_b.transform;
            let shape_a = body_a.shape;
            let shape_b = body_b.shape;
            let friction = combined_friction(body_a, body_b);
            let restitution = combined_restitution(body_a, body_b);

            let contact = {
                let object_a = self.pool.acquire(shape_a, transform_a, margin);
                let object_b = self.pool.acquire(shape_b, transform_b, margin);
                narrow_contact(&object_a, &object_b, margin + margin, &self.config)
            };

            let manifold = self.manifolds.get_or_insert(pair);
            manifold.refresh(&transform_a, &transform_b, breaking);
            if let Some(contact) = contact {
                manifold.friction = friction;
                manifold.restitution = restitution;
                manifold.add_contact(&contact, &transform_a, &transform_b, breaking);
            }

            // a fresh contact overrides an external sleep request
            if !manifold.is_empty() && !previously_touching.contains(&pair) {
                for id in [pair.a, pair.b] {
                    if let Some(body) = self.bodies.get_mut(id)
                        && body.forced_asleep
                    {
                        body.forced_asleep = false;
                        body.active = true;
                        body.deactivation_time = 0.0;
                    }
                }
            }
        }
    }

    fn build_islands(&mut self) {
        self.islands.reset(
            self.bodies
                .iter()
                .filter(|body| body.is_dynamic())
                .map(|body| body.id),
        );

        for manifold in self.manifolds.iter() {
            if manifold.is_empty() {
                continue;
            }
            let (Some(body_a), Some(body_b)) = (
                self.bodies.get(manifold.pair.a),
                self.bodies.get(manifold.pair.b),
            ) else {
                continue;
            };

            match (body_a.is_dynamic(), body_b.is_dynamic()) {
                (true, true) => self.islands.merge_islands(manifold.pair.a, manifold.pair.b),
                (true, false) => self.islands.link_to_static(manifold.pair.a),
                (false, true) => self.islands.link_to_static(manifold.pair.b),
                (false, false) => {}
            }
        }
    }

    fn solve_islands(&mut self, time_step: f32) {
        let mut batches: Vec<(usize, &mut ContactManifold)> = Vec::new();
        for manifold in self.manifolds.iter_mut() {
            if manifold.is_empty() {
                continue;
            }

            let awake = |id: BodyId| {
                self.bodies
                    .get(id)
                    .is_some_and(|body| body.is_dynamic() && body.active)
            };
            if !awake(manifold.pair.a) && !awake(manifold.pair.b) {
                continue;
            }

            let root = self
                .islands
                .island_root(manifold.pair.a)
                .or_else(|| self.islands.island_root(manifold.pair.b));
            if let Some(root) = root {
                batches.push((root, manifold));
            }
        }

        batches.sort_by_key(|(root, _)| *root);

        for chunk in batches.chunk_by_mut(|(lhs, _), (rhs, _)| lhs == rhs) {
            let mut island: Vec<&mut ContactManifold> =
                chunk.iter_mut().map(|(_, manifold)| &mut **manifold).collect();
            self.solver
                .solve_island(&mut self.bodies, &mut island, time_step, &self.config);
        }
    }

    /// Island-granular rest management: an island sleeps only when every
    /// member has been below the velocity thresholds for the configured time
    /// and the island rests on something static. One restless member keeps
    /// the entire island awake.
    fn update_sleep_state(&mut self, time_step: f32) {
        let linear_sq =
            self.config.linear_sleeping_threshold * self.config.linear_sleeping_threshold;
        let angular_sq =
            self.config.angular_sleeping_threshold * self.config.angular_sleeping_threshold;

        for body in self.bodies.iter_mut() {
            if !body.is_dynamic() || !body.active {
                continue;
            }
            if body.linear_velocity.length_squared() < linear_sq
                && body.angular_velocity.length_squared() < angular_sq
            {
                body.deactivation_time += time_step;
            } else {
                body.deactivation_time = 0.0;
            }
        }

        let time_before_sleep = self.config.time_before_sleep;
        for island in self.islands.islands() {
            let all_resting = island.bodies.iter().all(|&id| {
                self.bodies.get(id).is_none_or(|body| {
                    body.forced_asleep || body.deactivation_time >= time_before_sleep
                })
            });

            if all_resting && island.linked_to_static {
                for &id in &island.bodies {
                    if let Some(body) = self.bodies.get_mut(id)
                        && body.active
                    {
                        body.active = false;
                        body.linear_velocity = Vec3A::ZERO;
                        body.angular_velocity = Vec3A::ZERO;
                    }
                }
            } else {
                for &id in &island.bodies {
                    if let Some(body) = self.bodies.get_mut(id)
                        && !body.forced_asleep
                    {
                        body.active = true;
                    }
                }
            }
        }
    }

    fn integrate(&mut self, time_step: f32) {
        for body in self.bodies.iter_mut() {
            if body.active && !body.is_static() {
                body.integrate_transform(time_step);
            }
        }
    }

    fn emit_contact_events(&mut self, previously_touching: &AHashSet<BodyPair>) {
        let now_touching: AHashSet<BodyPair> = self
            .manifolds
            .iter()
            .filter(|manifold| !manifold.is_empty())
            .map(|manifold| manifold.pair)
            .collect();

        for &pair in now_touching.difference(previously_touching) {
            self.events.push(ContactEvent::Started(pair));
        }
        for &pair in previously_touching.difference(&now_touching) {
            self.events.push(ContactEvent::Stopped(pair));
        }
        self.events.sort_unstable();
    }

    /// All bodies hit by a ray, among bodies accepted by `filter`, sorted
    /// nearest first. One hit record per body, at its entry point.
    #[must_use]
    pub fn ray_cast(
        &self,
        origin: Vec3A,
        direction: Vec3A,
        max_distance: f32,
        filter: impl Fn(BodyId) -> bool,
    ) -> Vec<RayHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3A::ZERO {
            return Vec::new();
        }

        let mut hits = Vec::new();
        self.tree.query_ray(origin, direction, max_distance, |id| {
            if !filter(id) {
                return;
            }
            let Some(body) = self.bodies.get(id) else {
                return;
            };

            let inverse = body.transform.inverse();
            let local_origin = inverse.transform_point3a(origin);
            let local_direction = inverse.transform_vector3a(direction);

            if let Some((distance, local_normal)) =
                body.shape.local_ray_cast(local_origin, local_direction, max_distance)
            {
                hits.push(RayHit {
                    body: id,
                    distance,
                    point: origin + direction * distance,
                    normal: body.transform.matrix3 * local_normal,
                });
            }
        });

        hits.sort_unstable_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// All bodies accepted by `filter` whose shape overlaps the probe shape
    /// at `transform`. Results are sorted by id for determinism.
    #[must_use]
    pub fn overlap_test(
        &self,
        shape: ConvexShape,
        transform: Affine3A,
        filter: impl Fn(BodyId) -> bool,
    ) -> Vec<BodyId> {
        let aabb = math::transform_aabb(shape.local_half_extents(), 0.0, &transform);
        let probe = self.pool.acquire(shape, transform, 0.0);

        let mut hits = Vec::new();
        self.tree.query_overlaps(&aabb, usize::MAX, |id, _| {
            if !filter(id) {
                return;
            }
            let Some(body) = self.bodies.get(id) else {
                return;
            };
            let candidate = self.pool.acquire(body.shape, body.transform, 0.0);
            if gjk(&probe, &candidate, &self.config).is_overlapping() {
                hits.push(id);
            }
        });

        hits.sort_unstable();
        hits
    }
}

fn combined_friction(body_a: &RigidBody, body_b: &RigidBody) -> f32 {
    if body_a.is_static_or_kinematic() || body_b.is_static_or_kinematic() {
        body_a.friction.min(body_b.friction)
    } else {
        body_a.friction * body_b.friction
    }
}

fn combined_restitution(body_a: &RigidBody, body_b: &RigidBody) -> f32 {
    if body_a.is_static_or_kinematic() || body_b.is_static_or_kinematic() {
        body_a.restitution.max(body_b.restitution)
    } else {
        body_a.restitution * body_b.restitution
    }
}

/// Runs the margin-inflated narrow phase on a pair and converts the result
/// back to true-surface terms. Overlap of the margins alone yields a contact
/// with a small negative depth, which the manifold keeps if it is within the
/// breaking threshold.
fn narrow_contact(
    object_a: &ConvexObject,
    object_b: &ConvexObject,
    total_margin: f32,
    config: &PhysicsConfig,
) -> Option<ContactData> {
    let half_margin = total_margin * 0.5;

    match gjk(object_a, object_b, config) {
        GjkResult::Invalid => None,
        GjkResult::Separated { distance, simplex } => {
            let true_gap = distance + total_margin;
            if true_gap >= config.contact_breaking_threshold {
                return None;
            }
            let (on_a, on_b) = simplex.closest_points();
            let normal = (on_b - on_a).try_normalize()?;

            Some(ContactData {
                point_on_a: on_a - normal * half_margin,
                point_on_b: on_b + normal * half_margin,
                normal,
                depth: -true_gap,
            })
        }
        GjkResult::Overlapping { simplex } => match epa(object_a, object_b, &simplex, config) {
            EpaResult::NoCollide => None,
            EpaResult::Collide(contact) => Some(ContactData {
                point_on_a: contact.point_on_a - contact.normal * half_margin,
                point_on_b: contact.point_on_b + contact.normal * half_margin,
                normal: contact.normal,
                depth: contact.depth - total_margin,
            }),
        },
    }
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::*;
    use crate::body::BodyCategory;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig::default())
    }

    fn floor(world: &mut PhysicsWorld) -> BodyId {
        world
            .add_body(BodyDescriptor::new(
                ConvexShape::Cuboid {
                    half_extents: Vec3A::new(20.0, 0.5, 20.0),
                },
                Affine3A::from_translation(Vec3::new(0.0, -0.5, 0.0)),
                0.0,
                BodyCategory::Static,
            ))
            .unwrap()
    }

    fn dynamic_cube(world: &mut PhysicsWorld, position: Vec3) -> BodyId {
        world
            .add_body(BodyDescriptor::new(
                ConvexShape::Cuboid {
                    half_extents: Vec3A::splat(0.5),
                },
                Affine3A::from_translation(position),
                1.0,
                BodyCategory::Dynamic,
            ))
            .unwrap()
    }

    #[test]
    fn add_body_rejects_invalid_descriptors() {
        let mut world = world();
        let result = world.add_body(BodyDescriptor::new(
            ConvexShape::Sphere { radius: 1.0 },
            Affine3A::IDENTITY,
            -2.0,
            BodyCategory::Dynamic,
        ));
        assert!(result.is_err());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn stale_id_resolves_to_nothing_after_reuse() {
        let mut world = world();
        let first = dynamic_cube(&mut world, Vec3::ZERO);
        world.remove_body(first).unwrap();

        let second = dynamic_cube(&mut world, Vec3::ZERO);
        assert!(world.body(first).is_none());
        assert!(world.body(second).is_some());
        assert!(world.remove_body(first).is_err());
    }

    #[test]
    fn gravity_pulls_a_free_body_down() {
        let mut world = world();
        let cube = dynamic_cube(&mut world, Vec3::new(0.0, 10.0, 0.0));

        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }

        let body = world.body(cube).unwrap();
        assert!(body.transform.translation.y < 10.0);
        assert!(body.linear_velocity.y < 0.0);
    }

    #[test]
    fn contact_events_fire_on_touch_and_separation() {
        let mut world = world();
        let ground = floor(&mut world);
        let cube = dynamic_cube(&mut world, Vec3::new(0.0, 0.55, 0.0));

        let pair = BodyPair::new(ground, cube);
        let mut started = false;
        for _ in 0..60 {
            world.step(1.0 / 60.0);
            if world
                .contact_events()
                .contains(&ContactEvent::Started(pair))
            {
                started = true;
                break;
            }
        }
        assert!(started, "falling cube never reported a contact");

        let snapshots = world.contacts();
        let snapshot = snapshots
            .iter()
            .find(|snapshot| snapshot.pair == pair)
            .expect("touching pair missing from the contact snapshot");
        // floor is body A of the pair, so the normal points up at the cube
        assert!(snapshot.normal.y > 0.9);
        assert!(snapshot.impulse >= 0.0);

        // yank the cube far away and the contact must stop
        world.body_mut(cube).unwrap().transform =
            Affine3A::from_translation(Vec3::new(0.0, 10.0, 0.0));
        world.body_mut(cube).unwrap().linear_velocity = Vec3A::ZERO;
        world.step(1.0 / 60.0);

        assert!(
            world
                .contact_events()
                .contains(&ContactEvent::Stopped(pair))
        );
    }

    #[test]
    fn ray_cast_orders_hits_and_honors_filter() {
        let mut world = world();
        let near = dynamic_cube(&mut world, Vec3::new(0.0, 0.0, 2.0));
        let far = dynamic_cube(&mut world, Vec3::new(0.0, 0.0, 5.0));

        let hits = world.ray_cast(Vec3A::ZERO, Vec3A::Z, 100.0, |_| true);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].body, near);
        assert_eq!(hits[1].body, far);
        assert!((hits[0].distance - 1.5).abs() < 1e-4);
        assert!((hits[0].normal - (-Vec3A::Z)).length() < 1e-4);
        assert!((hits[1].distance - 4.5).abs() < 1e-4);

        let hits = world.ray_cast(Vec3A::ZERO, Vec3A::Z, 100.0, |id| id != near);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].body, far);
    }

    #[test]
    fn falling_cube_settles_and_sleeps() {
        let mut world = world();
        floor(&mut world);
        let cube = dynamic_cube(&mut world, Vec3::new(0.0, 2.0, 0.0));

        for _ in 0..600 {
            world.step(1.0 / 60.0);
        }

        let body = world.body(cube).unwrap();
        assert!(
            (body.transform.translation.y - 0.5).abs() < 0.1,
            "cube did not come to rest on the floor: y = {}",
            body.transform.translation.y
        );
        assert!(!body.active, "resting cube never fell asleep");
        assert_eq!(body.linear_velocity, Vec3A::ZERO);
    }

    #[test]
    fn waking_one_body_wakes_its_island() {
        let mut world = world();
        floor(&mut world);

        // three cubes in a row, close enough to share contact manifolds
        let a = dynamic_cube(&mut world, Vec3::new(0.0, 0.5, 0.0));
        let b = dynamic_cube(&mut world, Vec3::new(1.01, 0.5, 0.0));
        let c = dynamic_cube(&mut world, Vec3::new(2.02, 0.5, 0.0));

        for _ in 0..180 {
            world.step(1.0 / 60.0);
        }
        for &id in &[a, b, c] {
            assert!(!world.body(id).unwrap().active, "island never slept");
        }

        world.set_active(a, true).unwrap();
        world.step(1.0 / 60.0);

        for &id in &[a, b, c] {
            assert!(
                world.body(id).unwrap().active,
                "wake did not propagate through the island"
            );
        }
    }

    #[test]
    fn removing_a_support_wakes_the_sleeper() {
        let mut world = world();
        let ground = floor(&mut world);
        let cube = dynamic_cube(&mut world, Vec3::new(0.0, 0.5, 0.0));

        for _ in 0..120 {
            world.step(1.0 / 60.0);
        }
        assert!(!world.body(cube).unwrap().active);

        world.remove_body(ground).unwrap();
        assert!(world.body(cube).unwrap().active);

        let height_before = world.body(cube).unwrap().transform.translation.y;
        for _ in 0..30 {
            world.step(1.0 / 60.0);
        }
        assert!(world.body(cube).unwrap().transform.translation.y < height_before - 0.1);
    }

    #[test]
    fn external_sleep_holds_until_external_wake() {
        let mut world = world();
        let cube = dynamic_cube(&mut world, Vec3::new(0.0, 5.0, 0.0));

        world.step(1.0 / 60.0);
        world.set_active(cube, false).unwrap();

        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }
        let body = world.body(cube).unwrap();
        assert!(!body.active, "externally slept body woke itself");
        assert_eq!(body.linear_velocity, Vec3A::ZERO);
        let held_y = body.transform.translation.y;

        world.set_active(cube, true).unwrap();
        world.step(1.0 / 60.0);
        assert!(world.body(cube).unwrap().transform.translation.y < held_y);
    }

    #[test]
    fn fresh_contact_wakes_an_externally_slept_body() {
        let mut world = world();
        let held = dynamic_cube(&mut world, Vec3::new(0.0, 3.0, 0.0));
        world.set_active(held, false).unwrap();
        let _falling = dynamic_cube(&mut world, Vec3::new(0.0, 5.0, 0.0));

        for _ in 0..120 {
            world.step(1.0 / 60.0);
            if world.body(held).unwrap().active {
                break;
            }
        }
        assert!(
            world.body(held).unwrap().active,
            "impact never woke the held body"
        );
    }

    #[test]
    fn overlap_test_reports_intersecting_bodies() {
        let mut world = world();
        let inside = dynamic_cube(&mut world, Vec3::ZERO);
        let _outside = dynamic_cube(&mut world, Vec3::new(10.0, 0.0, 0.0));

        let hits = world.overlap_test(
            ConvexShape::Sphere { radius: 1.0 },
            Affine3A::from_translation(Vec3::new(0.6, 0.0, 0.0)),
            |_| true,
        );
        assert_eq!(hits, vec![inside]);

        let hits = world.overlap_test(
            ConvexShape::Sphere { radius: 1.0 },
            Affine3A::from_translation(Vec3::new(0.6, 0.0, 0.0)),
            |id| id != inside,
        );
        assert!(hits.is_empty());
    }
}
