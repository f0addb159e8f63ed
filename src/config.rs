/// Tuning knobs for the whole pipeline. Owned by the [`crate::PhysicsWorld`]
/// so independent worlds can run with different settings.
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    pub gravity: glam::Vec3A,

    // narrow phase
    pub gjk_max_iterations: u32,
    pub gjk_relative_tolerance: f32,
    pub gjk_minimum_tolerance: f32,
    /// Growth applied to the minimum tolerance per GJK iteration, so long
    /// runs on smooth shapes still terminate.
    pub gjk_tolerance_growth: f32,
    pub epa_max_iterations: u32,
    pub epa_termination_tolerance: f32,
    pub shape_margin: f32,
    pub contact_breaking_threshold: f32,
    pub convex_pool_capacity: usize,

    // broad phase
    pub aabb_fat_margin: f32,
    /// Extra AABB inflation per unit of body speed, reduces tree churn for
    /// fast movers.
    pub velocity_margin_factor: f32,

    // solver
    pub solver_iterations: u32,
    pub bias_factor: f32,
    pub linear_slop: f32,
    pub restitution_velocity_threshold: f32,
    pub warm_starting: bool,

    // sleeping
    pub linear_sleeping_threshold: f32,
    pub angular_sleeping_threshold: f32,
    /// Consecutive seconds below the sleeping thresholds before an island may
    /// be deactivated.
    pub time_before_sleep: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: glam::Vec3A::new(0.0, -9.81, 0.0),

            gjk_max_iterations: 25,
            gjk_relative_tolerance: 1e-4,
            gjk_minimum_tolerance: 1e-6,
            gjk_tolerance_growth: 0.1,
            epa_max_iterations: 30,
            epa_termination_tolerance: 1e-3,
            shape_margin: 0.04,
            contact_breaking_threshold: 0.02,
            convex_pool_capacity: 64,

            aabb_fat_margin: 0.2,
            velocity_margin_factor: 1.0 / 30.0,

            solver_iterations: 10,
            bias_factor: 0.2,
            linear_slop: 0.005,
            restitution_velocity_threshold: 1.0,
            warm_starting: true,

            linear_sleeping_threshold: 0.15,
            angular_sleeping_threshold: 0.05,
            time_before_sleep: 0.5,
        }
    }
}
