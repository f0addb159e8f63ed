use glam::{Affine3A, Mat3A, Quat, Vec3A};
use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_4};

const ANGULAR_MOTION_THRESHOLD: f32 = FRAC_PI_4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3A,
    pub max: Vec3A,
}

impl Aabb {
    #[must_use]
    pub const fn new(min: Vec3A, max: Vec3A) -> Self {
        Self { min, max }
    }

    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn surface_area(&self) -> f32 {
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    #[must_use]
    pub fn inflated(&self, margin: Vec3A) -> Self {
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    /// Slab test. Returns the entry distance when the ray hits within `max_t`.
    #[must_use]
    pub fn ray_hit(&self, origin: Vec3A, inv_dir: Vec3A, max_t: f32) -> Option<f32> {
        let t1 = (self.min - origin) * inv_dir;
        let t2 = (self.max - origin) * inv_dir;

        let t_min = t1.min(t2).max_element().max(0.0);
        let t_max = t1.max(t2).min_element().min(max_t);

        (t_min <= t_max).then_some(t_min)
    }
}

pub fn transform_aabb(half_extents: Vec3A, margin: f32, t: &Affine3A) -> Aabb {
    let half_extents_with_margin = half_extents + Vec3A::splat(margin);
    let extent = t.matrix3.abs() * half_extents_with_margin;

    Aabb::new(t.translation - extent, t.translation + extent)
}

pub fn integrate_transform(
    cur_trans: &Affine3A,
    lin_vel: Vec3A,
    ang_vel: Vec3A,
    time_step: f32,
) -> Affine3A {
    let translation = cur_trans.translation + lin_vel * time_step;

    let mut angle = ang_vel.length();
    if angle * time_step > ANGULAR_MOTION_THRESHOLD {
        angle = ANGULAR_MOTION_THRESHOLD / time_step;
    }

    let axis = if angle < 0.001 {
        // Taylor expansion of sin(angle * dt / 2) / angle around zero
        ang_vel
            * (0.5 * time_step - time_step * time_step * time_step * 0.020833334 * angle * angle)
    } else {
        ang_vel * ((0.5 * angle * time_step).sin() / angle)
    };

    let dorn = Quat::from_xyzw(axis.x, axis.y, axis.z, (angle * time_step * 0.5).cos());
    let orn0 = Quat::from_mat3a(&cur_trans.matrix3);
    let predicted_orn = (dorn * orn0).normalize();

    Affine3A {
        matrix3: Mat3A::from_quat(predicted_orn),
        translation,
    }
}

/// Builds two unit vectors orthogonal to `n` and each other.
pub fn plane_space(n: Vec3A) -> (Vec3A, Vec3A) {
    if n.z.abs() > FRAC_1_SQRT_2 {
        // choose p in y-z plane
        let a = n.y.mul_add(n.y, n.z * n.z);
        let k = 1.0 / a.sqrt();
        let p = Vec3A::new(0.0, -n.z * k, n.y * k);
        (p, Vec3A::new(a * k, -n.x * p.z, n.x * p.y))
    } else {
        // choose p in x-y plane
        let a = n.x.mul_add(n.x, n.y * n.y);
        let k = 1.0 / a.sqrt();
        let p = Vec3A::new(-n.y * k, n.x * k, 0.0);
        (p, Vec3A::new(-n.z * p.y, n.z * p.x, a * k))
    }
}

/// Closest point to `p` on segment [a, b] with its barycentric weights.
pub fn closest_point_on_segment(a: Vec3A, b: Vec3A, p: Vec3A) -> (Vec3A, [f32; 2]) {
    let ab = b - a;
    let denom = ab.length_squared();
    if denom < f32::EPSILON {
        return (a, [1.0, 0.0]);
    }

    let t = ((p - a).dot(ab) / denom).clamp(0.0, 1.0);
    (a + ab * t, [1.0 - t, t])
}

/// Closest point to `p` on triangle (a, b, c) with its barycentric weights.
pub fn closest_point_on_triangle(a: Vec3A, b: Vec3A, c: Vec3A, p: Vec3A) -> (Vec3A, [f32; 3]) {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (a, [1.0, 0.0, 0.0]);
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (b, [0.0, 1.0, 0.0]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a + ab * v, [1.0 - v, v, 0.0]);
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (c, [0.0, 0.0, 1.0]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a + ac * w, [1.0 - w, 0.0, w]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b + (c - b) * w, [0.0, 1.0 - w, w]);
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    (a + ab * v + ac * w, [1.0 - v - w, v, w])
}

/// Signed-volume barycentric coordinates of `p` in tetrahedron (a, b, c, d).
/// All four weights are non-negative iff `p` lies inside.
pub fn tetrahedron_barycentric(a: Vec3A, b: Vec3A, c: Vec3A, d: Vec3A, p: Vec3A) -> [f32; 4] {
    let vap = p - a;
    let vbp = p - b;
    let vab = b - a;
    let vac = c - a;
    let vad = d - a;
    let vbc = c - b;
    let vbd = d - b;

    let va6 = vbp.dot(vbd.cross(vbc));
    let vb6 = vap.dot(vac.cross(vad));
    let vc6 = vap.dot(vad.cross(vab));
    let vd6 = vap.dot(vab.cross(vac));
    let v6 = vab.dot(vac.cross(vad));

    if v6.abs() < f32::EPSILON {
        // degenerate tetrahedron
        return [1.0, 0.0, 0.0, 0.0];
    }

    let inv = 1.0 / v6;
    [va6 * inv, vb6 * inv, vc6 * inv, vd6 * inv]
}

#[must_use]
pub fn tetrahedron_contains(a: Vec3A, b: Vec3A, c: Vec3A, d: Vec3A, p: Vec3A) -> bool {
    tetrahedron_barycentric(a, b, c, d, p)
        .iter()
        .all(|&w| w >= 0.0)
}
