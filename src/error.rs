use thiserror::Error;

/// Rejections raised at body-creation time. Catching a bad setup here keeps
/// the solver free of runtime recovery paths.
#[derive(Debug, Error, PartialEq)]
pub enum BodyError {
    #[error("dynamic body requires a strictly positive mass, got {0}")]
    InvalidMass(f32),
    #[error("static body must have zero mass, got {0}")]
    StaticWithMass(f32),
    #[error("shape extent must be strictly positive, got {0}")]
    InvalidShapeExtent(f32),
    #[error("body pose contains non-finite values")]
    NonFinitePose,
}

/// Errors surfaced by world-level operations on existing bodies.
#[derive(Debug, Error, PartialEq)]
pub enum WorldError {
    #[error("body {0:?} is not present in this world")]
    UnknownBody(crate::body::BodyId),
}
