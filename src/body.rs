use glam::{Affine3A, Mat3A, Vec3A};

use crate::{error::BodyError, math, shape::ConvexShape};

/// Stable generational handle to a body in a [`crate::PhysicsWorld`]. Slots
/// are recycled on removal but the generation changes, so a stale id never
/// aliases a newer body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCategory {
    Static,
    Dynamic,
    Kinematic,
}

/// Everything needed to create a body. Mirrors the world-facing contract:
/// invalid combinations are rejected by [`crate::PhysicsWorld::add_body`]
/// before any state is touched.
#[derive(Debug, Clone)]
pub struct BodyDescriptor {
    pub shape: ConvexShape,
    pub pose: Affine3A,
    pub mass: f32,
    pub category: BodyCategory,
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl BodyDescriptor {
    #[must_use]
    pub const fn new(shape: ConvexShape, pose: Affine3A, mass: f32, category: BodyCategory) -> Self {
        Self {
            shape,
            pose,
            mass,
            category,
            friction: 0.5,
            restitution: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.05,
        }
    }
}

#[derive(Debug)]
pub struct RigidBody {
    pub id: BodyId,
    pub shape: ConvexShape,
    pub transform: Affine3A,
    pub linear_velocity: Vec3A,
    pub angular_velocity: Vec3A,
    pub inverse_mass: f32,
    pub inv_inertia_local: Vec3A,
    pub inv_inertia_world: Mat3A,
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub category: BodyCategory,
    pub active: bool,
    /// Consecutive seconds spent below the sleeping thresholds.
    pub deactivation_time: f32,
    /// Set by an external sleep request; the island rest logic leaves the
    /// body down until an external wake or a fresh contact.
    pub(crate) forced_asleep: bool,
    /// Broad-phase leaf index, maintained by the world.
    pub(crate) proxy: usize,
}

impl RigidBody {
    pub fn new(desc: BodyDescriptor, id: BodyId) -> Result<Self, BodyError> {
        desc.shape.validate()?;

        if !(desc.pose.translation.is_finite() && desc.pose.matrix3.is_finite()) {
            return Err(BodyError::NonFinitePose);
        }

        let (inverse_mass, inv_inertia_local) = match desc.category {
            BodyCategory::Dynamic => {
                if !(desc.mass > 0.0 && desc.mass.is_finite()) {
                    return Err(BodyError::InvalidMass(desc.mass));
                }

                let inertia = desc.shape.local_inertia_diagonal(desc.mass);
                (1.0 / desc.mass, inertia.recip())
            }
            BodyCategory::Static => {
                if desc.mass != 0.0 {
                    return Err(BodyError::StaticWithMass(desc.mass));
                }
                (0.0, Vec3A::ZERO)
            }
            BodyCategory::Kinematic => (0.0, Vec3A::ZERO),
        };

        let inv_inertia_world = inertia_tensor(desc.pose.matrix3, inv_inertia_local);

        Ok(Self {
            id,
            shape: desc.shape,
            transform: desc.pose,
            linear_velocity: Vec3A::ZERO,
            angular_velocity: Vec3A::ZERO,
            inverse_mass,
            inv_inertia_local,
            inv_inertia_world,
            friction: desc.friction,
            restitution: desc.restitution,
            linear_damping: desc.linear_damping.clamp(0.0, 1.0),
            angular_damping: desc.angular_damping.clamp(0.0, 1.0),
            category: desc.category,
            active: desc.category == BodyCategory::Dynamic,
            deactivation_time: 0.0,
            forced_asleep: false,
            proxy: usize::MAX,
        })
    }

    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.category == BodyCategory::Static
    }

    #[inline]
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.category == BodyCategory::Dynamic
    }

    /// Infinite-mass from the solver's point of view.
    #[inline]
    #[must_use]
    pub fn is_static_or_kinematic(&self) -> bool {
        self.category != BodyCategory::Dynamic
    }

    /// World-space inverse inertia, `R * diag(inv_inertia_local) * Rᵀ`. Must
    /// be re-run whenever the orientation changes; the solver reads the
    /// cached tensor.
    pub fn update_inertia_tensor(&mut self) {
        self.inv_inertia_world = inertia_tensor(self.transform.matrix3, self.inv_inertia_local);
    }

    #[must_use]
    pub fn velocity_in_local_point(&self, rel_pos: Vec3A) -> Vec3A {
        self.linear_velocity + self.angular_velocity.cross(rel_pos)
    }

    pub fn apply_central_impulse(&mut self, impulse: Vec3A) {
        debug_assert!(!impulse.is_nan());
        self.linear_velocity += impulse * self.inverse_mass;
    }

    pub fn apply_torque_impulse(&mut self, torque: Vec3A) {
        debug_assert!(!torque.is_nan());
        self.angular_velocity += self.inv_inertia_world * torque;
    }

    pub fn apply_impulse(&mut self, impulse: Vec3A, rel_pos: Vec3A) {
        self.apply_central_impulse(impulse);
        self.apply_torque_impulse(rel_pos.cross(impulse));
    }

    pub fn apply_damping(&mut self, time_step: f32) {
        self.linear_velocity *= (1.0 - self.linear_damping).powf(time_step);
        self.angular_velocity *= (1.0 - self.angular_damping).powf(time_step);
    }

    pub fn integrate_transform(&mut self, time_step: f32) {
        self.transform = math::integrate_transform(
            &self.transform,
            self.linear_velocity,
            self.angular_velocity,
            time_step,
        );
        self.update_inertia_tensor();
    }

    /// Tight world-space AABB of the body's shape at its current pose.
    #[must_use]
    pub fn aabb(&self) -> math::Aabb {
        math::transform_aabb(self.shape.local_half_extents(), 0.0, &self.transform)
    }
}

fn inertia_tensor(world_mat: Mat3A, inv_inertia_local: Vec3A) -> Mat3A {
    let mut scaled_mat = world_mat.transpose();
    scaled_mat.x_axis *= inv_inertia_local;
    scaled_mat.y_axis *= inv_inertia_local;
    scaled_mat.z_axis *= inv_inertia_local;

    world_mat * scaled_mat
}

#[cfg(test)]
mod test {
    use super::*;
    use glam::{Quat, Vec3};

    fn dynamic_box(mass: f32) -> BodyDescriptor {
        BodyDescriptor::new(
            ConvexShape::Cuboid {
                half_extents: Vec3A::splat(0.5),
            },
            Affine3A::IDENTITY,
            mass,
            BodyCategory::Dynamic,
        )
    }

    const ID: BodyId = BodyId {
        index: 0,
        generation: 0,
    };

    #[test]
    fn creation_rejects_bad_config() {
        assert_eq!(
            RigidBody::new(dynamic_box(0.0), ID).unwrap_err(),
            BodyError::InvalidMass(0.0)
        );
        assert_eq!(
            RigidBody::new(dynamic_box(-2.0), ID).unwrap_err(),
            BodyError::InvalidMass(-2.0)
        );

        let mut static_with_mass = dynamic_box(3.0);
        static_with_mass.category = BodyCategory::Static;
        assert_eq!(
            RigidBody::new(static_with_mass, ID).unwrap_err(),
            BodyError::StaticWithMass(3.0)
        );
    }

    #[test]
    fn world_inertia_follows_orientation() {
        let mut desc = dynamic_box(2.0);
        desc.shape = ConvexShape::Cuboid {
            half_extents: Vec3A::new(1.0, 0.2, 0.2),
        };
        let mut body = RigidBody::new(desc, ID).unwrap();

        let initial = body.inv_inertia_world;

        // rotate the long axis from X to Y; the tensor must follow
        body.transform =
            Affine3A::from_rotation_translation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), Vec3::ZERO);
        body.update_inertia_tensor();

        assert!((body.inv_inertia_world.y_axis.y - initial.x_axis.x).abs() < 1e-4);
        assert!((body.inv_inertia_world.x_axis.x - initial.y_axis.y).abs() < 1e-4);
    }

    #[test]
    fn impulse_changes_both_velocities() {
        let mut body = RigidBody::new(dynamic_box(2.0), ID).unwrap();
        body.apply_impulse(Vec3A::new(0.0, 2.0, 0.0), Vec3A::new(0.5, 0.0, 0.0));

        assert!((body.linear_velocity - Vec3A::new(0.0, 1.0, 0.0)).length() < 1e-5);
        // off-center impulse spins the body about Z
        assert!(body.angular_velocity.z > 0.0);
        assert!(body.angular_velocity.x.abs() < 1e-6);
    }
}
