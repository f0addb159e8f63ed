use glam::Vec3A;

use crate::config::PhysicsConfig;
use crate::pool::ConvexObject;

use super::simplex::Simplex;

/// Outcome of the distance query between two convex objects.
#[derive(Debug, Clone)]
pub enum GjkResult {
    /// The algorithm did not converge within the iteration budget. Callers
    /// must treat the pair as unknown and skip it for this step.
    Invalid,
    /// Shapes are separated by `distance`, witness points recoverable from
    /// the simplex barycentrics.
    Separated { distance: f32, simplex: Simplex },
    /// Shapes overlap. The terminal simplex seeds penetration-depth
    /// computation.
    Overlapping { simplex: Simplex },
}

impl GjkResult {
    #[must_use]
    pub const fn is_overlapping(&self) -> bool {
        matches!(self, Self::Overlapping { .. })
    }
}

/// Runs GJK on the Minkowski difference of two convex objects.
///
/// The termination tolerance is adaptive twice over: it scales with the
/// square of the current closest distance and its floor grows every
/// iteration, so pairs that creep toward the tolerance boundary still
/// terminate.
#[must_use]
pub fn gjk(object_a: &ConvexObject, object_b: &ConvexObject, config: &PhysicsConfig) -> GjkResult {
    let initial_direction = Vec3A::X;
    let initial_support_a = object_a.support_point(initial_direction);
    let initial_support_b = object_b.support_point(-initial_direction);
    let initial_point = initial_support_a - initial_support_b;

    let mut simplex = Simplex::new();
    simplex.add_point(initial_support_a, initial_support_b);

    let mut direction = -initial_point;
    let mut tolerance_multiplicator = 1.0;

    for _ in 0..config.gjk_max_iterations {
        let support_a = object_a.support_point(direction);
        let support_b = object_b.support_point(-direction);
        let new_point = support_a - support_b;

        // vector from the origin to the closest point of the simplex
        let closest = -direction;
        let closest_square_distance = closest.length_squared();
        let closest_dot_new_point = closest.dot(new_point);

        // terminate when the new point is no more extreme than the simplex,
        // or when the support function starts repeating itself
        let distance_tolerance = f32::max(
            config.gjk_minimum_tolerance * tolerance_multiplicator,
            config.gjk_relative_tolerance * closest_square_distance,
        );
        if closest_square_distance - closest_dot_new_point <= distance_tolerance
            || simplex.contains_point(new_point)
        {
            return if closest_dot_new_point <= 0.0 {
                GjkResult::Overlapping { simplex }
            } else {
                GjkResult::Separated {
                    distance: closest_square_distance.sqrt(),
                    simplex,
                }
            };
        }

        simplex.add_point(support_a, support_b);
        direction = -simplex.closest_point_to_origin();

        tolerance_multiplicator += config.gjk_tolerance_growth;
    }

    log::warn!(
        "gjk failed to converge within {} iterations",
        config.gjk_max_iterations
    );
    GjkResult::Invalid
}
