pub mod epa;
pub mod gjk;
pub mod manifold;
pub mod simplex;

pub use epa::{ContactData, EpaResult, epa};
pub use gjk::{GjkResult, gjk};
pub use manifold::{ContactManifold, ContactPoint, MANIFOLD_CACHE_SIZE, ManifoldStore};
pub use simplex::Simplex;
