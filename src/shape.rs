use glam::Vec3A;

use crate::error::BodyError;

/// Convex primitives supported by the narrow phase. Every variant is defined
/// in its principal axes, centered on its center of mass; the capsule axis is
/// local Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvexShape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3A },
    Capsule { half_height: f32, radius: f32 },
}

impl ConvexShape {
    pub fn validate(&self) -> Result<(), BodyError> {
        let check = |extent: f32| {
            if extent > 0.0 && extent.is_finite() {
                Ok(())
            } else {
                Err(BodyError::InvalidShapeExtent(extent))
            }
        };

        match *self {
            Self::Sphere { radius } => check(radius),
            Self::Cuboid { half_extents } => {
                check(half_extents.x)?;
                check(half_extents.y)?;
                check(half_extents.z)
            }
            Self::Capsule {
                half_height,
                radius,
            } => {
                check(half_height)?;
                check(radius)
            }
        }
    }

    /// Furthest point of the shape along `dir`, in local space. `dir` does
    /// not need to be normalized.
    #[must_use]
    pub fn local_support_point(&self, dir: Vec3A) -> Vec3A {
        match *self {
            Self::Sphere { radius } => dir.normalize_or_zero() * radius,
            Self::Cuboid { half_extents } => {
                Vec3A::select(dir.cmpge(Vec3A::ZERO), half_extents, -half_extents)
            }
            Self::Capsule {
                half_height,
                radius,
            } => {
                let cap = Vec3A::new(0.0, half_height.copysign(dir.y), 0.0);
                cap + dir.normalize_or_zero() * radius
            }
        }
    }

    /// Half extents of the tight local-space AABB.
    #[must_use]
    pub fn local_half_extents(&self) -> Vec3A {
        match *self {
            Self::Sphere { radius } => Vec3A::splat(radius),
            Self::Cuboid { half_extents } => half_extents,
            Self::Capsule {
                half_height,
                radius,
            } => Vec3A::new(radius, half_height + radius, radius),
        }
    }

    /// Diagonal of the local inertia tensor for the given mass; the shapes
    /// are defined in principal axes so the off-diagonal terms are zero.
    #[must_use]
    pub fn local_inertia_diagonal(&self, mass: f32) -> Vec3A {
        match *self {
            Self::Sphere { radius } => Vec3A::splat(0.4 * mass * radius * radius),
            Self::Cuboid { half_extents } => {
                let sq = 4.0 * half_extents * half_extents;
                (mass / 12.0) * Vec3A::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y)
            }
            Self::Capsule {
                half_height,
                radius,
            } => {
                // cylinder plus two hemispherical caps
                let h = 2.0 * half_height;
                let r2 = radius * radius;
                let cyl_volume = std::f32::consts::PI * r2 * h;
                let caps_volume = 4.0 / 3.0 * std::f32::consts::PI * r2 * radius;
                let total = cyl_volume + caps_volume;
                let m_cyl = mass * cyl_volume / total;
                let m_caps = mass * caps_volume / total;

                let axial = 0.5 * m_cyl * r2 + 0.4 * m_caps * r2;
                let radial = m_cyl * (r2 / 4.0 + h * h / 12.0)
                    + m_caps * (0.4 * r2 + half_height * half_height + 0.375 * h * radius);
                Vec3A::new(radial, axial, radial)
            }
        }
    }

    /// Local-space ray intersection; returns the hit distance and the surface
    /// normal at the hit point. `dir` must be normalized.
    #[must_use]
    pub fn local_ray_cast(&self, origin: Vec3A, dir: Vec3A, max_t: f32) -> Option<(f32, Vec3A)> {
        match *self {
            Self::Sphere { radius } => ray_sphere(origin, dir, Vec3A::ZERO, radius, max_t),
            Self::Cuboid { half_extents } => ray_cuboid(origin, dir, half_extents, max_t),
            Self::Capsule {
                half_height,
                radius,
            } => ray_capsule(origin, dir, half_height, radius, max_t),
        }
    }
}

fn ray_sphere(
    origin: Vec3A,
    dir: Vec3A,
    center: Vec3A,
    radius: f32,
    max_t: f32,
) -> Option<(f32, Vec3A)> {
    let m = origin - center;
    let b = m.dot(dir);
    let c = m.length_squared() - radius * radius;

    // ray starts outside and points away
    if c > 0.0 && b > 0.0 {
        return None;
    }

    let discr = b * b - c;
    if discr < 0.0 {
        return None;
    }

    let t = (-b - discr.sqrt()).max(0.0);
    if t > max_t {
        return None;
    }

    let hit = origin + dir * t;
    Some((t, (hit - center).normalize_or_zero()))
}

fn ray_cuboid(origin: Vec3A, dir: Vec3A, half_extents: Vec3A, max_t: f32) -> Option<(f32, Vec3A)> {
    let mut t_min = 0.0_f32;
    let mut t_max = max_t;
    let mut normal = Vec3A::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        let e = half_extents[axis];

        if d.abs() < f32::EPSILON {
            if o.abs() > e {
                return None;
            }
            continue;
        }

        let inv_d = 1.0 / d;
        let mut t1 = (-e - o) * inv_d;
        let mut t2 = (e - o) * inv_d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }

        // entry is always against the direction of travel on this axis
        let axis_normal = if d > 0.0 { -1.0 } else { 1.0 };

        if t1 > t_min {
            t_min = t1;
            normal = Vec3A::ZERO;
            normal[axis] = axis_normal;
        }
        t_max = t_max.min(t2);

        if t_min > t_max {
            return None;
        }
    }

    if normal == Vec3A::ZERO {
        // ray starts inside; report the entry point with an opposing normal
        normal = -dir;
    }

    Some((t_min, normal))
}

fn ray_capsule(
    origin: Vec3A,
    dir: Vec3A,
    half_height: f32,
    radius: f32,
    max_t: f32,
) -> Option<(f32, Vec3A)> {
    // infinite cylinder around local Y
    let oxz = Vec3A::new(origin.x, 0.0, origin.z);
    let dxz = Vec3A::new(dir.x, 0.0, dir.z);

    let a = dxz.length_squared();
    let mut best: Option<(f32, Vec3A)> = None;

    if a > f32::EPSILON {
        let b = oxz.dot(dxz);
        let c = oxz.length_squared() - radius * radius;
        let discr = b * b - a * c;
        if discr >= 0.0 {
            let t = ((-b - discr.sqrt()) / a).max(0.0);
            let hit = origin + dir * t;
            if t <= max_t && hit.y.abs() <= half_height && (c > 0.0 || t > 0.0) {
                let normal = Vec3A::new(hit.x, 0.0, hit.z).normalize_or_zero();
                best = Some((t, normal));
            }
        }
    }

    // spherical caps
    for cap_y in [half_height, -half_height] {
        let center = Vec3A::new(0.0, cap_y, 0.0);
        if let Some((t, normal)) = ray_sphere(origin, dir, center, radius, max_t)
            && best.is_none_or(|(bt, _)| t < bt)
        {
            best = Some((t, normal));
        }
    }

    best
}

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn support_points_are_extreme() {
        let shapes = [
            ConvexShape::Sphere { radius: 2.0 },
            ConvexShape::Cuboid {
                half_extents: Vec3A::new(1.0, 2.0, 3.0),
            },
            ConvexShape::Capsule {
                half_height: 1.0,
                radius: 0.5,
            },
        ];
        let dirs = [
            Vec3A::X,
            -Vec3A::Y,
            Vec3A::new(1.0, 1.0, -1.0).normalize(),
            Vec3A::new(-0.2, 0.9, 0.4).normalize(),
        ];

        for shape in shapes {
            for dir in dirs {
                let support = shape.local_support_point(dir);
                // no other sampled support may be more extreme along dir
                for other_dir in dirs {
                    let other = shape.local_support_point(other_dir);
                    assert!(other.dot(dir) <= support.dot(dir) + EPS);
                }
            }
        }
    }

    #[test]
    fn cuboid_inertia_diagonal() {
        let shape = ConvexShape::Cuboid {
            half_extents: Vec3A::splat(0.5),
        };
        // unit cube of mass 6 has inertia diag 1
        let inertia = shape.local_inertia_diagonal(6.0);
        assert!((inertia - Vec3A::ONE).length() < EPS);
    }

    #[test]
    fn validate_rejects_bad_extents() {
        assert_eq!(
            ConvexShape::Sphere { radius: 0.0 }.validate(),
            Err(BodyError::InvalidShapeExtent(0.0))
        );
        assert!(
            ConvexShape::Capsule {
                half_height: 0.3,
                radius: 0.1
            }
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn ray_hits_cuboid_face() {
        let shape = ConvexShape::Cuboid {
            half_extents: Vec3A::ONE,
        };
        let (t, normal) = shape
            .local_ray_cast(Vec3A::new(-4.0, 0.2, 0.0), Vec3A::X, 100.0)
            .unwrap();
        assert!((t - 3.0).abs() < EPS);
        assert_eq!(normal, -Vec3A::X);

        assert!(
            shape
                .local_ray_cast(Vec3A::new(-4.0, 2.0, 0.0), Vec3A::X, 100.0)
                .is_none()
        );
    }

    #[test]
    fn ray_hits_capsule_side_and_cap() {
        let shape = ConvexShape::Capsule {
            half_height: 1.0,
            radius: 0.5,
        };

        let (t, normal) = shape
            .local_ray_cast(Vec3A::new(-3.0, 0.5, 0.0), Vec3A::X, 100.0)
            .unwrap();
        assert!((t - 2.5).abs() < EPS);
        assert_eq!(normal, -Vec3A::X);

        let (t, normal) = shape
            .local_ray_cast(Vec3A::new(0.0, 4.0, 0.0), -Vec3A::Y, 100.0)
            .unwrap();
        assert!((t - 2.5).abs() < EPS);
        assert!((normal - Vec3A::Y).length() < EPS);
    }
}
