pub mod body;
pub mod broadphase;
pub mod config;
pub mod error;
pub mod island;
pub mod logging;
pub mod math;
pub mod narrowphase;
pub mod pool;
pub mod shape;
pub mod solver;
pub mod world;

pub use body::{BodyCategory, BodyDescriptor, BodyId, RigidBody};
pub use config::PhysicsConfig;
pub use error::{BodyError, WorldError};
pub use shape::ConvexShape;
pub use world::{ContactEvent, ContactSnapshot, PhysicsWorld, RayHit};
