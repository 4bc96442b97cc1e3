//! Handle targets.
//!
//! Anything that can be wrapped by a capability handle implements
//! [`HandleTarget`]. The trait is implemented automatically for every
//! thread-safe type with a `Display` representation, which is what the
//! handle-to-string operation reports across the boundary.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An object that can sit behind a capability handle.
pub trait HandleTarget: Any + Send + Sync + fmt::Display {
    /// Borrow the target as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared target into a shared `Any` for downcasting.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// The concrete type name of the target, for diagnostics.
    ///
    /// Call through `&dyn HandleTarget`; on an `Arc` the blanket impl would
    /// report the `Arc` itself.
    fn kind(&self) -> &'static str;
}

impl<T> HandleTarget for T
where
    T: Any + Send + Sync + fmt::Display,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn kind(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl dyn HandleTarget {
    /// Check whether the target is of type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow the target as `T` if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Downcast a shared target into a shared `T`.
pub fn downcast_arc<T: Any + Send + Sync>(target: Arc<dyn HandleTarget>) -> Option<Arc<T>> {
    target.into_any_arc().downcast::<T>().ok()
}
