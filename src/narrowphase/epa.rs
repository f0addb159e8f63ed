use std::f32::consts::FRAC_PI_3;

use glam::{Quat, Vec3A};

use crate::config::PhysicsConfig;
use crate::math::{closest_point_on_triangle, tetrahedron_contains};
use crate::pool::ConvexObject;

use super::simplex::Simplex;

/// Deepest-point contact between two overlapping convex objects.
///
/// `point_on_a - point_on_b == normal * depth`: the normal points from
/// object A toward object B, and translating B along `normal * depth`
/// separates the pair.
#[derive(Debug, Clone, Copy)]
pub struct ContactData {
    pub point_on_a: Vec3A,
    pub point_on_b: Vec3A,
    pub normal: Vec3A,
    pub depth: f32,
}

#[derive(Debug, Clone, Copy)]
pub enum EpaResult {
    /// Penetration could not be established (zero depth or a degenerate
    /// polytope). Never fabricates a contact.
    NoCollide,
    Collide(ContactData),
}

#[derive(Debug, Clone, Copy)]
struct Vertex {
    point: Vec3A,
    support_a: Vec3A,
    support_b: Vec3A,
}

#[derive(Debug, Clone, Copy)]
struct Face {
    indices: [usize; 3],
    /// Outward unit normal of the triangle plane.
    normal: Vec3A,
    /// Distance from the origin to the closest point of the triangle.
    distance: f32,
    barycentric: [f32; 3],
    alive: bool,
}

/// Expanding-polytope penetration query, seeded with the terminal GJK
/// simplex. The polytope grows one support point per iteration toward the
/// current closest face until the hull boundary is bracketed within the
/// termination tolerance.
#[must_use]
pub fn epa(
    object_a: &ConvexObject,
    object_b: &ConvexObject,
    simplex: &Simplex,
    config: &PhysicsConfig,
) -> EpaResult {
    let Some(seed) = initial_vertices(object_a, object_b, simplex) else {
        return EpaResult::NoCollide;
    };
    let mut vertices = seed.to_vec();
    let Some(mut faces) = initial_faces(&vertices) else {
        return EpaResult::NoCollide;
    };

    let mut upper_bound = f32::MAX;
    let mut closest = match closest_face(&faces) {
        Some(index) => index,
        None => return EpaResult::NoCollide,
    };

    for _ in 0..config.epa_max_iterations {
        let normal = faces[closest].normal;
        let distance = faces[closest].distance;

        let support_a = object_a.support_point(normal);
        let support_b = object_b.support_point(-normal);
        let new_point = support_a - support_b;

        upper_bound = upper_bound.min(new_point.dot(normal).abs());
        if upper_bound <= (1.0 + config.epa_termination_tolerance) * distance {
            break;
        }

        if !expand(&mut vertices, &mut faces, Vertex {
            point: new_point,
            support_a,
            support_b,
        }) {
            // polytope cannot grow in this direction, settle for the
            // current closest face
            break;
        }

        closest = match closest_face(&faces) {
            Some(index) => index,
            None => return EpaResult::NoCollide,
        };
    }

    let face = &faces[closest];
    let mut point_on_a = Vec3A::ZERO;
    let mut point_on_b = Vec3A::ZERO;
    for (&index, &weight) in face.indices.iter().zip(&face.barycentric) {
        point_on_a += vertices[index].support_a * weight;
        point_on_b += vertices[index].support_b * weight;
    }

    if !face.distance.is_finite() || face.distance <= 0.0 {
        return EpaResult::NoCollide;
    }

    EpaResult::Collide(ContactData {
        point_on_a,
        point_on_b,
        normal: face.normal,
        depth: face.distance,
    })
}

/// Builds the seed tetrahedron from the GJK terminal simplex, sampling
/// extra support points when the simplex has fewer than four vertices.
fn initial_vertices(
    object_a: &ConvexObject,
    object_b: &ConvexObject,
    simplex: &Simplex,
) -> Option<[Vertex; 4]> {
    let vertex = |index: usize| Vertex {
        point: simplex.point(index),
        support_a: simplex.support_a(index),
        support_b: simplex.support_b(index),
    };
    let sample = |dir: Vec3A| {
        let support_a = object_a.support_point(dir);
        let support_b = object_b.support_point(-dir);
        Vertex {
            point: support_a - support_b,
            support_a,
            support_b,
        }
    };

    match simplex.size() {
        // the simplex collapsed onto the origin, depth is zero
        1 => None,
        2 => {
            // segment through the origin: sample three directions around it,
            // 120 degrees apart, then keep the half containing the origin
            let line = (simplex.point(1) - simplex.point(0)).normalize_or_zero();
            if line == Vec3A::ZERO {
                return None;
            }

            let abs = line.abs();
            let least_axis = if abs.x <= abs.y && abs.x <= abs.z {
                Vec3A::X
            } else if abs.y <= abs.z {
                Vec3A::Y
            } else {
                Vec3A::Z
            };

            let rotation = Quat::from_axis_angle(line.into(), 2.0 * FRAC_PI_3);
            let v1 = line.cross(least_axis);
            let v2 = rotation * v1;
            let v3 = rotation * v2;

            let (s1, s2, s3) = (sample(v1), sample(v2), sample(v3));

            let base = if tetrahedron_contains(
                simplex.point(0),
                s1.point,
                s2.point,
                s3.point,
                Vec3A::ZERO,
            ) {
                vertex(0)
            } else {
                vertex(1)
            };
            Some([base, s1, s2, s3])
        }
        3 => {
            // triangle containing the origin: close the polytope on the
            // side of the triangle the origin falls on
            let normal = (simplex.point(1) - simplex.point(0))
                .cross(simplex.point(2) - simplex.point(0))
                .normalize_or_zero();
            if normal == Vec3A::ZERO {
                return None;
            }

            let above = sample(normal);
            let below = sample(-normal);

            let apex = if tetrahedron_contains(
                simplex.point(0),
                simplex.point(1),
                simplex.point(2),
                above.point,
                Vec3A::ZERO,
            ) {
                above
            } else {
                below
            };
            Some([vertex(0), vertex(1), vertex(2), apex])
        }
        4 => Some([vertex(0), vertex(1), vertex(2), vertex(3)]),
        size => unreachable!("gjk simplex of size {size}"),
    }
}

/// The four outward-wound faces of the seed tetrahedron, or `None` when the
/// tetrahedron is numerically flat.
fn initial_faces(vertices: &[Vertex]) -> Option<Vec<Face>> {
    const INDICES: [[usize; 3]; 4] = [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];

    let mut faces = Vec::with_capacity(16);
    for indices in INDICES {
        let opposite = 6 - indices.iter().sum::<usize>();
        let [a, b, c] = indices.map(|i| vertices[i].point);

        let normal = (b - a).cross(c - a);
        let to_opposite = vertices[opposite].point - a;

        let oriented = if normal.dot(to_opposite) < 0.0 {
            indices
        } else {
            [indices[0], indices[2], indices[1]]
        };

        let face = make_face(vertices, oriented)?;
        faces.push(face);
    }

    Some(faces)
}

fn make_face(vertices: &[Vertex], indices: [usize; 3]) -> Option<Face> {
    let [a, b, c] = indices.map(|i| vertices[i].point);
    let normal = (b - a).cross(c - a).try_normalize()?;

    let (closest, barycentric) = closest_point_on_triangle(a, b, c, Vec3A::ZERO);

    Some(Face {
        indices,
        normal,
        distance: closest.length(),
        barycentric,
        alive: true,
    })
}

fn closest_face(faces: &[Face]) -> Option<usize> {
    faces
        .iter()
        .enumerate()
        .filter(|(_, face)| face.alive)
        .min_by(|(_, lhs), (_, rhs)| lhs.distance.total_cmp(&rhs.distance))
        .map(|(index, _)| index)
}

/// Inserts a vertex, removing every face it can see and stitching the new
/// vertex to the horizon edges. Returns false when the vertex lies inside
/// the polytope and nothing can be removed.
fn expand(vertices: &mut Vec<Vertex>, faces: &mut Vec<Face>, vertex: Vertex) -> bool {
    let mut horizon: Vec<(usize, usize)> = Vec::new();

    for face in faces.iter_mut() {
        if !face.alive {
            continue;
        }
        let to_vertex = vertex.point - vertices[face.indices[0]].point;
        if face.normal.dot(to_vertex) > 0.0 {
            face.alive = false;

            let [a, b, c] = face.indices;
            for edge in [(a, b), (b, c), (c, a)] {
                // a shared edge appears once per winding direction; interior
                // edges cancel out, horizon edges survive
                if let Some(position) = horizon.iter().position(|&(s, e)| (e, s) == edge) {
                    horizon.swap_remove(position);
                } else {
                    horizon.push(edge);
                }
            }
        }
    }

    if horizon.is_empty() {
        return false;
    }

    let new_index = vertices.len();
    vertices.push(vertex);

    for (start, end) in horizon {
        match make_face(vertices, [start, end, new_index]) {
            Some(face) => faces.push(face),
            // sliver triangle, skip it and let the neighbours cover the gap
            None => continue,
        }
    }

    true
}
