use std::{
    ops::{Deref, DerefMut},
    sync::Mutex,
};

use glam::{Affine3A, Vec3A};

use crate::shape::ConvexShape;

/// Transient convex wrapper consumed by the narrow-phase algorithms: a shape
/// positioned in the world, optionally inflated by a collision margin.
#[derive(Debug, Clone, Copy)]
pub struct ConvexObject {
    pub shape: ConvexShape,
    pub transform: Affine3A,
    pub margin: f32,
}

impl ConvexObject {
    /// Furthest point of the object along `dir`, in world space.
    #[must_use]
    pub fn support_point(&self, dir: Vec3A) -> Vec3A {
        let local_dir = self.transform.matrix3.transpose() * dir;
        let local = self.shape.local_support_point(local_dir);
        let world = self.transform.transform_point3a(local);

        if self.margin > 0.0 {
            world + dir.normalize_or_zero() * self.margin
        } else {
            world
        }
    }
}

/// Fixed-capacity slab of [`ConvexObject`] slots. All narrow-phase queries
/// borrow their wrappers from here instead of allocating; the slab never
/// grows, so an overrun means the capacity was mis-sized for the caller's
/// query nesting and is reported as a fatal error right away.
pub struct ConvexObjectPool {
    free: Mutex<Vec<Box<ConvexObject>>>,
    capacity: usize,
}

impl ConvexObjectPool {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let placeholder = ConvexObject {
            shape: ConvexShape::Sphere { radius: 1.0 },
            transform: Affine3A::IDENTITY,
            margin: 0.0,
        };

        Self {
            free: Mutex::new((0..capacity).map(|_| Box::new(placeholder)).collect()),
            capacity,
        }
    }

    /// Checks out one slot; the slot returns to the pool when the guard
    /// drops, on every exit path.
    pub fn acquire(
        &self,
        shape: ConvexShape,
        transform: Affine3A,
        margin: f32,
    ) -> PooledConvexObject<'_> {
        let mut slot = self
            .free
            .lock()
            .expect("convex object pool lock poisoned")
            .pop()
            .unwrap_or_else(|| {
                panic!(
                    "convex object pool exhausted (capacity {}), raise convex_pool_capacity",
                    self.capacity
                )
            });

        *slot = ConvexObject {
            shape,
            transform,
            margin,
        };

        PooledConvexObject {
            pool: self,
            object: Some(slot),
        }
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.free
            .lock()
            .expect("convex object pool lock poisoned")
            .len()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct PooledConvexObject<'a> {
    pool: &'a ConvexObjectPool,
    object: Option<Box<ConvexObject>>,
}

impl Deref for PooledConvexObject<'_> {
    type Target = ConvexObject;

    fn deref(&self) -> &ConvexObject {
        self.object.as_ref().expect("pooled object already released")
    }
}

impl DerefMut for PooledConvexObject<'_> {
    fn deref_mut(&mut self) -> &mut ConvexObject {
        self.object.as_mut().expect("pooled object already released")
    }
}

impl Drop for PooledConvexObject<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.object.take()
            && let Ok(mut free) = self.pool.free.lock()
        {
            free.push(slot);
        }
    }
}
