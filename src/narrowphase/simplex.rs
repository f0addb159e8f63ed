use arrayvec::ArrayVec;
use glam::Vec3A;

use crate::math::{
    closest_point_on_segment, closest_point_on_triangle, tetrahedron_barycentric,
};

/// One vertex of the simplex: a Minkowski-difference point together with the
/// two support points it was built from, so witness points can be recovered
/// by barycentric combination.
#[derive(Debug, Clone, Copy)]
pub struct SupportMapping {
    pub point: Vec3A,
    pub support_a: Vec3A,
    pub support_b: Vec3A,
    pub barycentric: f32,
}

/// Growing GJK simplex (point, segment, triangle, tetrahedron) in
/// Minkowski-difference space, reduced after every insertion to the minimal
/// feature closest to the origin.
#[derive(Debug, Clone, Default)]
pub struct Simplex {
    points: ArrayVec<SupportMapping, 4>,
    closest_point_to_origin: Vec3A,
}

impl Simplex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn point(&self, index: usize) -> Vec3A {
        self.points[index].point
    }

    #[must_use]
    pub fn support_a(&self, index: usize) -> Vec3A {
        self.points[index].support_a
    }

    #[must_use]
    pub fn support_b(&self, index: usize) -> Vec3A {
        self.points[index].support_b
    }

    #[must_use]
    pub fn closest_point_to_origin(&self) -> Vec3A {
        self.closest_point_to_origin
    }

    #[must_use]
    pub fn contains_point(&self, p: Vec3A) -> bool {
        self.points.iter().any(|mapping| mapping.point == p)
    }

    /// Witness points on the two source shapes for the current closest
    /// feature. Meaningless once the shapes overlap.
    #[must_use]
    pub fn closest_points(&self) -> (Vec3A, Vec3A) {
        let mut on_a = Vec3A::ZERO;
        let mut on_b = Vec3A::ZERO;
        for mapping in &self.points {
            on_a += mapping.support_a * mapping.barycentric;
            on_b += mapping.support_b * mapping.barycentric;
        }
        (on_a, on_b)
    }

    /// Appends a support mapping and reduces the simplex to the feature
    /// closest to the origin.
    pub fn add_point(&mut self, support_a: Vec3A, support_b: Vec3A) {
        debug_assert!(self.points.len() < 4);
        self.points.push(SupportMapping {
            point: support_a - support_b,
            support_a,
            support_b,
            barycentric: 0.0,
        });

        self.update();
    }

    fn update(&mut self) {
        match self.points.len() {
            1 => {
                self.closest_point_to_origin = self.points[0].point;
                self.points[0].barycentric = 1.0;
            }
            2 => {
                let (closest, bary) = closest_point_on_segment(
                    self.points[0].point,
                    self.points[1].point,
                    Vec3A::ZERO,
                );
                self.closest_point_to_origin = closest;
                self.points[0].barycentric = bary[0];
                self.points[1].barycentric = bary[1];
            }
            3 => {
                let (a, b, c) = (
                    self.points[0].point,
                    self.points[1].point,
                    self.points[2].point,
                );
                let (closest, bary) = closest_point_on_triangle(a, b, c, Vec3A::ZERO);
                self.closest_point_to_origin = closest;
                for (mapping, &weight) in self.points.iter_mut().zip(&bary) {
                    mapping.barycentric = weight;
                }

                // drop vertices that no longer carry weight, highest index first
                if bary[1] == 0.0 {
                    self.points.remove(1);
                }
                if bary[0] == 0.0 {
                    self.points.remove(0);
                }

                // keep the triangle winding facing the origin
                if self.points.len() == 3 {
                    let co = -c;
                    let normal = (b - c).cross(a - c);
                    if normal.dot(co) <= 0.0 {
                        self.points.swap(0, 1);
                    }
                }
            }
            4 => self.update_tetrahedron(),
            _ => unreachable!("empty simplex updated"),
        }
    }

    fn update_tetrahedron(&mut self) {
        let (a, b, c, d) = (
            self.points[0].point,
            self.points[1].point,
            self.points[2].point,
            self.points[3].point,
        );

        let bary = tetrahedron_barycentric(a, b, c, d, Vec3A::ZERO);
        if bary.iter().all(|&w| w >= 0.0) {
            // origin is inside: the closest point is the origin itself
            self.closest_point_to_origin = Vec3A::ZERO;
            for (mapping, &weight) in self.points.iter_mut().zip(&bary) {
                mapping.barycentric = weight;
            }
            return;
        }

        // test only the faces containing the newest point (d); the opposite
        // face was the closest feature before d was added
        let faces: [[usize; 3]; 3] = [[0, 1, 3], [0, 2, 3], [1, 2, 3]];
        let mut best_face = 0;
        let mut best_bary = [0.0; 3];
        let mut best_closest = Vec3A::ZERO;
        let mut best_dist_sq = f32::MAX;

        for (face_index, face) in faces.iter().enumerate() {
            let (closest, bary) = closest_point_on_triangle(
                self.points[face[0]].point,
                self.points[face[1]].point,
                self.points[face[2]].point,
                Vec3A::ZERO,
            );
            let dist_sq = closest.length_squared();
            if dist_sq < best_dist_sq {
                best_dist_sq = dist_sq;
                best_face = face_index;
                best_bary = bary;
                best_closest = closest;
            }
        }

        let kept = faces[best_face];
        let reduced: ArrayVec<SupportMapping, 4> = kept
            .iter()
            .zip(&best_bary)
            .map(|(&index, &weight)| SupportMapping {
                barycentric: weight,
                ..self.points[index]
            })
            .collect();

        self.points = reduced;
        self.closest_point_to_origin = best_closest;

        // drop zero-weight vertices, highest index first
        for index in (0..self.points.len()).rev() {
            if self.points[index].barycentric == 0.0 && self.points.len() > 1 {
                self.points.remove(index);
            }
        }
    }
}
