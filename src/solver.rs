use ahash::AHashMap;
use glam::{Mat3A, Vec3A};

use crate::body::BodyId;
use crate::config::PhysicsConfig;
use crate::math::plane_space;
use crate::narrowphase::ContactManifold;
use crate::world::Bodies;

/// Velocity-space snapshot of one body for the duration of an island solve.
/// Static and kinematic bodies participate with zero inverse mass, so the
/// impulse exchange leaves them untouched.
#[derive(Debug, Clone, Copy)]
struct SolverBody {
    id: BodyId,
    linear_velocity: Vec3A,
    angular_velocity: Vec3A,
    inv_mass: f32,
    inv_inertia_world: Mat3A,
}

impl SolverBody {
    fn velocity_at(&self, rel_pos: Vec3A) -> Vec3A {
        self.linear_velocity + self.angular_velocity.cross(rel_pos)
    }

    fn apply_impulse(&mut self, impulse: Vec3A, rel_pos: Vec3A) {
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_inertia_world * rel_pos.cross(impulse);
    }
}

/// One contact point turned into a velocity constraint. The normal row keeps
/// the bodies from approaching, the two tangent rows oppose sliding within
/// the friction cone.
struct SolverConstraint {
    body_a: usize,
    body_b: usize,
    manifold_index: usize,
    point_index: usize,
    rel_a: Vec3A,
    rel_b: Vec3A,
    normal: Vec3A,
    tangents: [Vec3A; 2],
    /// Inverse of the effective mass along the normal.
    normal_mass: f32,
    tangent_mass: [f32; 2],
    /// Target separating speed, the larger of the Baumgarte push and the
    /// restitution bounce.
    velocity_bias: f32,
    friction: f32,
    applied_normal_impulse: f32,
    applied_tangent_impulse: [f32; 2],
}

/// Iterative impulse solver, run once per island and step. Accumulated
/// impulses are seeded from the manifolds (warm starting) and persisted back
/// when the iterations are done.
#[derive(Default)]
pub struct SequentialImpulseSolver {
    bodies: Vec<SolverBody>,
    constraints: Vec<SolverConstraint>,
    body_index: AHashMap<BodyId, usize>,
}

impl SequentialImpulseSolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Solves every contact of one island. Manifold normals must point from
    /// the pair's first body toward its second.
    pub fn solve_island(
        &mut self,
        bodies: &mut Bodies,
        manifolds: &mut [&mut ContactManifold],
        time_step: f32,
        config: &PhysicsConfig,
    ) {
        self.setup(bodies, manifolds, time_step, config);
        if self.constraints.is_empty() {
            return;
        }

        if config.warm_starting {
            self.warm_start();
        }

        for _ in 0..config.solver_iterations {
            self.solve_normal_rows();
            self.solve_friction_rows();
        }

        self.finish(bodies, manifolds);
    }

    fn solver_body(&mut self, bodies: &Bodies, id: BodyId) -> Option<usize> {
        if let Some(&index) = self.body_index.get(&id) {
            return Some(index);
        }

        let body = bodies.get(id)?;
        let index = self.bodies.len();
        self.bodies.push(SolverBody {
            id,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
            inv_mass: body.inverse_mass,
            inv_inertia_world: body.inv_inertia_world,
        });
        self.body_index.insert(id, index);
        Some(index)
    }

    fn setup(
        &mut self,
        bodies: &Bodies,
        manifolds: &[&mut ContactManifold],
        time_step: f32,
        config: &PhysicsConfig,
    ) {
        self.bodies.clear();
        self.constraints.clear();
        self.body_index.clear();

        for (manifold_index, manifold) in manifolds.iter().enumerate() {
            let (Some(index_a), Some(index_b)) = (
                self.solver_body(bodies, manifold.pair.a),
                self.solver_body(bodies, manifold.pair.b),
            ) else {
                continue;
            };

            let translation_a = bodies
                .get(manifold.pair.a)
                .map(|body| Vec3A::from(body.transform.translation))
                .unwrap_or_default();
            let translation_b = bodies
                .get(manifold.pair.b)
                .map(|body| Vec3A::from(body.transform.translation))
                .unwrap_or_default();

            for (point_index, point) in manifold.points.iter().enumerate() {
                let body_a = &self.bodies[index_a];
                let body_b = &self.bodies[index_b];

                let rel_a = point.world_on_a - translation_a;
                let rel_b = point.world_on_b - translation_b;
                let normal = point.normal;

                let normal_mass = effective_mass(body_a, body_b, rel_a, rel_b, normal);

                let (tangent_0, tangent_1) = plane_space(normal);
                let tangent_mass = [
                    effective_mass(body_a, body_b, rel_a, rel_b, tangent_0),
                    effective_mass(body_a, body_b, rel_a, rel_b, tangent_1),
                ];

                // positive when the bodies separate, negative on approach
                let approach_speed =
                    (body_b.velocity_at(rel_b) - body_a.velocity_at(rel_a)).dot(normal);

                let baumgarte = config.bias_factor / time_step
                    * (point.depth - config.linear_slop).max(0.0);
                let bounce = if -approach_speed > config.restitution_velocity_threshold {
                    manifold.restitution * -approach_speed
                } else {
                    0.0
                };

                self.constraints.push(SolverConstraint {
                    body_a: index_a,
                    body_b: index_b,
                    manifold_index,
                    point_index,
                    rel_a,
                    rel_b,
                    normal,
                    tangents: [tangent_0, tangent_1],
                    normal_mass,
                    tangent_mass,
                    velocity_bias: baumgarte.max(bounce),
                    friction: manifold.friction,
                    applied_normal_impulse: point.accumulated_normal_impulse,
                    applied_tangent_impulse: point.accumulated_tangent_impulse,
                });
            }
        }
    }

    /// Re-applies last step's impulses before iterating, so stacked contacts
    /// start from a converged state instead of rediscovering it.
    fn warm_start(&mut self) {
        for constraint in &self.constraints {
            let impulse = constraint.normal * constraint.applied_normal_impulse
                + constraint.tangents[0] * constraint.applied_tangent_impulse[0]
                + constraint.tangents[1] * constraint.applied_tangent_impulse[1];

            let [body_a, body_b] = get_pair(&mut self.bodies, constraint.body_a, constraint.body_b);
            body_a.apply_impulse(-impulse, constraint.rel_a);
            body_b.apply_impulse(impulse, constraint.rel_b);
        }
    }

    fn solve_normal_rows(&mut self) {
        for constraint in &mut self.constraints {
            let [body_a, body_b] = get_pair(&mut self.bodies, constraint.body_a, constraint.body_b);

            let relative_velocity =
                body_b.velocity_at(constraint.rel_b) - body_a.velocity_at(constraint.rel_a);
            let normal_speed = relative_velocity.dot(constraint.normal);

            let delta =
                constraint.normal_mass * (constraint.velocity_bias - normal_speed);

            // accumulated impulse stays non-negative: contacts only push
            let new_impulse = (constraint.applied_normal_impulse + delta).max(0.0);
            let applied = new_impulse - constraint.applied_normal_impulse;
            constraint.applied_normal_impulse = new_impulse;

            let impulse = constraint.normal * applied;
            body_a.apply_impulse(-impulse, constraint.rel_a);
            body_b.apply_impulse(impulse, constraint.rel_b);
        }
    }

    fn solve_friction_rows(&mut self) {
        for constraint in &mut self.constraints {
            let friction_limit = constraint.friction * constraint.applied_normal_impulse;

            for axis in 0..2 {
                let [body_a, body_b] =
                    get_pair(&mut self.bodies, constraint.body_a, constraint.body_b);

                let relative_velocity =
                    body_b.velocity_at(constraint.rel_b) - body_a.velocity_at(constraint.rel_a);
                let tangent_speed = relative_velocity.dot(constraint.tangents[axis]);

                let delta = -constraint.tangent_mass[axis] * tangent_speed;

                let new_impulse = (constraint.applied_tangent_impulse[axis] + delta)
                    .clamp(-friction_limit, friction_limit);
                let applied = new_impulse - constraint.applied_tangent_impulse[axis];
                constraint.applied_tangent_impulse[axis] = new_impulse;

                let impulse = constraint.tangents[axis] * applied;
                body_a.apply_impulse(-impulse, constraint.rel_a);
                body_b.apply_impulse(impulse, constraint.rel_b);
            }
        }
    }

    /// Writes solved velocities back to the bodies and the accumulated
    /// impulses back to the manifold points for the next step's warm start.
    fn finish(&mut self, bodies: &mut Bodies, manifolds: &mut [&mut ContactManifold]) {
        for solver_body in &self.bodies {
            if solver_body.inv_mass == 0.0 {
                continue;
            }
            if let Some(body) = bodies.get_mut(solver_body.id) {
                body.linear_velocity = solver_body.linear_velocity;
                body.angular_velocity = solver_body.angular_velocity;
            }
        }

        for constraint in &self.constraints {
            let point =
                &mut manifolds[constraint.manifold_index].points[constraint.point_index];
            point.accumulated_normal_impulse = constraint.applied_normal_impulse;
            point.accumulated_tangent_impulse = constraint.applied_tangent_impulse;
        }
    }
}

fn effective_mass(
    body_a: &SolverBody,
    body_b: &SolverBody,
    rel_a: Vec3A,
    rel_b: Vec3A,
    direction: Vec3A,
) -> f32 {
    let angular_a = (body_a.inv_inertia_world * rel_a.cross(direction)).cross(rel_a);
    let angular_b = (body_b.inv_inertia_world * rel_b.cross(direction)).cross(rel_b);
    let k = body_a.inv_mass + body_b.inv_mass + (angular_a + angular_b).dot(direction);

    if k > 0.0 { 1.0 / k } else { 0.0 }
}

fn get_pair(bodies: &mut [SolverBody], a: usize, b: usize) -> [&mut SolverBody; 2] {
    debug_assert_ne!(a, b);
    bodies
        .get_disjoint_mut([a, b])
        .expect("constraint references one body twice")
}

#[cfg(test)]
mod test {
    use glam::{Affine3A, Vec3};

    use super::*;
    use crate::body::{BodyCategory, BodyDescriptor};
    use crate::broadphase::BodyPair;
    use crate::narrowphase::ContactData;
    use crate::shape::ConvexShape;

    fn bodies_with_floor_and_box() -> (Bodies, BodyId, BodyId) {
        let mut bodies = Bodies::new();

        let floor = bodies
            .insert(BodyDescriptor::new(
                ConvexShape::Cuboid {
                    half_extents: Vec3A::new(10.0, 0.5, 10.0),
                },
                Affine3A::from_translation(Vec3::new(0.0, -0.5, 0.0)),
                0.0,
                BodyCategory::Static,
            ))
            .unwrap();
        let cube = bodies
            .insert(BodyDescriptor::new(
                ConvexShape::Cuboid {
                    half_extents: Vec3A::splat(0.5),
                },
                Affine3A::from_translation(Vec3::new(0.0, 0.49, 0.0)),
                1.0,
                BodyCategory::Dynamic,
            ))
            .unwrap();

        (bodies, floor, cube)
    }

    fn resting_manifold(floor: BodyId, cube: BodyId) -> ContactManifold {
        let pair = BodyPair::new(floor, cube);
        let mut manifold = ContactManifold::new(pair);
        manifold.friction = 0.5;
        manifold.restitution = 0.0;

        // cube sits 0.01 into the floor; normal points from the floor (a)
        // up toward the cube (b) only if floor sorts first
        let (normal, depth) = if pair.a == floor {
            (Vec3A::Y, 0.01)
        } else {
            (-Vec3A::Y, 0.01)
        };
        let contact = ContactData {
            point_on_a: Vec3A::new(0.0, 0.0, 0.0),
            point_on_b: Vec3A::new(0.0, 0.0, 0.0) - normal * depth,
            normal,
            depth,
        };
        manifold.add_contact(&contact, &Affine3A::IDENTITY, &Affine3A::IDENTITY, 0.02);
        manifold
    }

    #[test]
    fn normal_impulse_stops_approach() {
        let (mut bodies, floor, cube) = bodies_with_floor_and_box();
        bodies.get_mut(cube).unwrap().linear_velocity = Vec3A::new(0.0, -2.0, 0.0);

        let mut manifold = resting_manifold(floor, cube);
        let mut solver = SequentialImpulseSolver::new();
        let config = PhysicsConfig::default();

        let mut island = [&mut manifold];
        solver.solve_island(&mut bodies, &mut island, 1.0 / 60.0, &config);

        let velocity = bodies.get(cube).unwrap().linear_velocity;
        assert!(velocity.y >= -1e-3, "still approaching: {velocity:?}");

        let fetched = manifold.points[0].accumulated_normal_impulse;
        assert!(fetched > 0.0, "no impulse accumulated");
    }

    #[test]
    fn static_body_velocity_is_untouched() {
        let (mut bodies, floor, cube) = bodies_with_floor_and_box();
        bodies.get_mut(cube).unwrap().linear_velocity = Vec3A::new(0.0, -2.0, 0.0);

        let mut manifold = resting_manifold(floor, cube);
        let mut solver = SequentialImpulseSolver::new();
        let config = PhysicsConfig::default();

        let mut island = [&mut manifold];
        solver.solve_island(&mut bodies, &mut island, 1.0 / 60.0, &config);

        assert_eq!(bodies.get(floor).unwrap().linear_velocity, Vec3A::ZERO);
    }

    #[test]
    fn friction_opposes_sliding_within_the_cone() {
        let (mut bodies, floor, cube) = bodies_with_floor_and_box();
        bodies.get_mut(cube).unwrap().linear_velocity = Vec3A::new(1.0, -0.5, 0.0);

        let mut manifold = resting_manifold(floor, cube);
        let mut solver = SequentialImpulseSolver::new();
        let config = PhysicsConfig::default();

        let before = bodies.get(cube).unwrap().linear_velocity.x;
        let mut island = [&mut manifold];
        solver.solve_island(&mut bodies, &mut island, 1.0 / 60.0, &config);
        let after = bodies.get(cube).unwrap().linear_velocity.x;

        assert!(after < before, "friction did not slow the slide");
        assert!(after >= 0.0, "friction reversed the motion");

        let point = &manifold.points[0];
        let tangent_magnitude = (point.accumulated_tangent_impulse[0].powi(2)
            + point.accumulated_tangent_impulse[1].powi(2))
        .sqrt();
        let limit = manifold.friction * point.accumulated_normal_impulse;
        assert!(tangent_magnitude <= limit * 1.5 + 1e-6);
    }

    #[test]
    fn restitution_bounces_fast_impacts() {
        let (mut bodies, floor, cube) = bodies_with_floor_and_box();
        bodies.get_mut(cube).unwrap().linear_velocity = Vec3A::new(0.0, -5.0, 0.0);

        let mut manifold = resting_manifold(floor, cube);
        manifold.restitution = 0.8;

        let mut solver = SequentialImpulseSolver::new();
        let config = PhysicsConfig::default();

        let mut island = [&mut manifold];
        solver.solve_island(&mut bodies, &mut island, 1.0 / 60.0, &config);

        let velocity = bodies.get(cube).unwrap().linear_velocity;
        assert!(velocity.y > 3.0, "impact did not bounce: {velocity:?}");
    }
}
