pub mod aabb_tree;
pub mod pair_cache;

pub use aabb_tree::AabbTree;
pub use pair_cache::{BodyPair, OverlappingPairCache, PairDiff};
