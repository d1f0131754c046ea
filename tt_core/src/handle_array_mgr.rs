//! Dense, handle-addressed object pool.
//!
//! `HandleArrayMgr` owns its objects in one contiguous `Vec` and keeps them
//! packed: live objects always occupy positions `[0, active_count)`. Removal
//! swaps the last object into the hole, so positions change over time. Handles
//! stay valid across those moves because they name a slot in the
//! [`HandleMgr`] table, and the table is told where each object went.
//!
//! # Usage
//! ```ignore
//! let mut pool = HandleArrayMgr::<Widget>::new(64);
//! let h = pool.create(params);
//! pool.get_mut(h).unwrap().z = 3;
//! pool.destroy(h);
//! assert!(pool.get(h).is_none());
//! ```

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::error::{fail_fast, HandleError};
use crate::handle::{Handle, Resolve};
use crate::handle_mgr::HandleMgr;

/// Requirements for types stored in a [`HandleArrayMgr`].
pub trait Pooled: Sized {
    /// Argument forwarded from [`HandleArrayMgr::create`].
    type ConstructorParam;

    /// Builds the object. `handle` is the handle it will be reachable through.
    fn construct(param: Self::ConstructorParam, handle: Handle<Self>) -> Self;

    /// The handle passed to [`Pooled::construct`]. Must not change afterwards.
    fn handle(&self) -> Handle<Self>;
}

/// Fixed-capacity dense pool with stable handles.
#[derive(Debug)]
pub struct HandleArrayMgr<T: Pooled> {
    objects: Vec<T>,
    table: HandleMgr<T>,
}

impl<T: Pooled> HandleArrayMgr<T> {
    /// Creates an empty pool for at most `capacity` objects.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAX_CAPACITY`](crate::handle_mgr::MAX_CAPACITY).
    pub fn new(capacity: usize) -> Self {
        Self {
            objects: Vec::with_capacity(capacity),
            table: HandleMgr::with_capacity(capacity),
        }
    }

    /// Like [`HandleArrayMgr::new`], but reports an oversized capacity.
    pub fn try_new(capacity: usize) -> Result<Self, HandleError> {
        let table = HandleMgr::try_with_capacity(capacity)?;
        Ok(Self {
            objects: Vec::with_capacity(capacity),
            table,
        })
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Number of live objects. They sit at positions `[0, active_count)`.
    pub fn active_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.objects.len() >= self.capacity()
    }

    /// Constructs a new object at the end of the dense range.
    pub fn try_create(&mut self, param: T::ConstructorParam) -> Result<Handle<T>, HandleError> {
        self.ensure_room()?;
        let position = self.objects.len();
        let handle = self.table.try_register_object(position)?;
        self.push_constructed(T::construct(param, handle), handle);
        Ok(handle)
    }

    /// Infallible variant of [`HandleArrayMgr::try_create`].
    ///
    /// An exhausted pool is an invariant violation (pool sizes are chosen up
    /// front): it panics with debug assertions and yields the empty handle
    /// otherwise.
    pub fn create(&mut self, param: T::ConstructorParam) -> Handle<T> {
        match self.try_create(param) {
            Ok(handle) => handle,
            Err(e) => {
                fail_fast!("HandleArrayMgr::create failed: {}", e);
                Handle::empty()
            }
        }
    }

    /// Constructs an object that must be reachable through exactly `handle`.
    ///
    /// Used when restoring saved state; the target slot must be free.
    pub fn create_with_specific_handle(
        &mut self,
        param: T::ConstructorParam,
        handle: Handle<T>,
    ) -> Result<Handle<T>, HandleError> {
        self.ensure_room()?;
        let position = self.objects.len();
        let handle = self.table.register_at(handle, position)?;
        self.push_constructed(T::construct(param, handle), handle);
        Ok(handle)
    }

    /// Adds an already constructed object under the handle it reports.
    ///
    /// On failure the object is dropped.
    pub fn add_with_specific_handle(&mut self, object: T) -> Result<Handle<T>, HandleError> {
        self.ensure_room()?;
        let position = self.objects.len();
        let handle = self.table.register_at(object.handle(), position)?;
        self.objects.push(object);
        Ok(handle)
    }

    /// Destroys the object behind `handle`.
    ///
    /// Stale and empty handles are ignored with a warning; returns whether an
    /// object was destroyed.
    pub fn destroy(&mut self, handle: Handle<T>) -> bool {
        match self.remove(handle) {
            Some(_) => true,
            None => {
                warn!(%handle, "destroy called with an empty or stale handle; ignoring");
                false
            }
        }
    }

    /// Removes the object behind `handle` and hands it back.
    ///
    /// The last object in the dense range moves into the vacated position and
    /// its handle is retargeted; no other handle is touched.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let position = self.table.unregister_object(handle)?;
        let object = self.objects.swap_remove(position);
        if let Some(moved) = self.objects.get(position) {
            let moved_handle = moved.handle();
            let relocated = self.table.set_target(moved_handle, position);
            debug_assert!(relocated, "moved object {moved_handle} had no live slot");
        }
        Some(object)
    }

    /// Swaps the storage positions of two objects.
    ///
    /// Each handle keeps resolving to its own object; only the physical order
    /// changes. Returns `false` (and does nothing) if either handle is stale.
    pub fn swap_objects_in_array(&mut self, a: Handle<T>, b: Handle<T>) -> bool {
        let (Some(pa), Some(pb)) = (self.table.get_target(a), self.table.get_target(b)) else {
            warn!(%a, %b, "swap requested with a stale handle; ignoring");
            return false;
        };
        if pa == pb {
            return true;
        }
        self.objects.swap(pa, pb);
        self.table.set_target(a, pb);
        self.table.set_target(b, pa);
        true
    }

    /// Stable-sorts the dense range. All handles stay valid.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.objects.sort_by(compare);
        self.retarget_all();
    }

    pub fn sort_by_key<K, F>(&mut self, key: F)
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.objects.sort_by_key(key);
        self.retarget_all();
    }

    /// Destroys every object. Previously issued handles stay invalid.
    pub fn reset(&mut self) {
        debug!(count = self.objects.len(), "resetting handle array");
        self.objects.clear();
        self.table.reset();
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.table
            .get_target(handle)
            .and_then(|position| self.objects.get(position))
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.table
            .get_target(handle)
            .and_then(|position| self.objects.get_mut(position))
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.table.is_valid(handle)
    }

    /// Current storage position of `handle`'s object.
    pub fn position_of(&self, handle: Handle<T>) -> Option<usize> {
        self.table.get_target(handle)
    }

    /// Handle of the object stored at `position`.
    pub fn handle_at(&self, position: usize) -> Option<Handle<T>> {
        self.objects.get(position).map(Pooled::handle)
    }

    /// The dense range, in storage order.
    pub fn as_slice(&self) -> &[T] {
        &self.objects
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.objects.iter()
    }

    /// Mutable iteration. Objects must not change the handle they report.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.objects.iter_mut()
    }

    fn ensure_room(&self) -> Result<(), HandleError> {
        if self.is_full() {
            return Err(HandleError::PoolExhausted {
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    fn push_constructed(&mut self, object: T, handle: Handle<T>) {
        debug_assert_eq!(object.handle(), handle, "constructed object reports another handle");
        self.objects.push(object);
    }

    fn retarget_all(&mut self) {
        for (position, object) in self.objects.iter().enumerate() {
            self.table.set_target(object.handle(), position);
        }
    }
}

impl<T: Pooled> Resolve<T> for HandleArrayMgr<T> {
    fn resolve(&self, handle: Handle<T>) -> Option<&T> {
        self.get(handle)
    }

    fn resolve_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.get_mut(handle)
    }
}

impl<'a, T: Pooled> IntoIterator for &'a HandleArrayMgr<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Widget {
        handle: Handle<Widget>,
        name: &'static str,
        z: i32,
    }

    impl Pooled for Widget {
        type ConstructorParam = (&'static str, i32);

        fn construct((name, z): Self::ConstructorParam, handle: Handle<Self>) -> Self {
            Widget { handle, name, z }
        }

        fn handle(&self) -> Handle<Self> {
            self.handle
        }
    }

    fn names(pool: &HandleArrayMgr<Widget>) -> Vec<&'static str> {
        pool.iter().map(|w| w.name).collect()
    }

    #[test]
    fn create_resolves_to_constructed_object() {
        let mut pool = HandleArrayMgr::<Widget>::new(4);
        let h = pool.create(("a", 1));

        let w = pool.get(h).unwrap();
        assert_eq!(w.name, "a");
        assert_eq!(w.z, 1);
        assert_eq!(w.handle, h);
        assert_eq!(h.get(&pool).map(|w| w.name), Some("a"));
    }

    #[test]
    fn destroy_moves_last_into_hole() {
        let mut pool = HandleArrayMgr::<Widget>::new(4);
        let a = pool.create(("a", 0));
        let b = pool.create(("b", 0));
        let c = pool.create(("c", 0));

        assert!(pool.destroy(b));
        assert_eq!(pool.active_count(), 2);
        assert!(pool.get(b).is_none());
        assert_eq!(pool.get(c).unwrap().name, "c");
        assert_eq!(pool.position_of(c), Some(1));
        assert_eq!(pool.get(a).unwrap().name, "a");
        assert_eq!(names(&pool), vec!["a", "c"]);

        let d = pool.create(("d", 0));
        assert_eq!(pool.position_of(d), Some(2));
        assert_ne!(d, a);
        assert_ne!(d, b);
        assert_ne!(d, c);
        assert!(pool.get(b).is_none());
    }

    #[test]
    fn destroying_last_object_moves_nothing() {
        let mut pool = HandleArrayMgr::<Widget>::new(2);
        let a = pool.create(("a", 0));
        let b = pool.create(("b", 0));
        assert!(pool.destroy(b));
        assert_eq!(pool.position_of(a), Some(0));
    }

    #[test]
    fn destroy_twice_is_ignored() {
        let mut pool = HandleArrayMgr::<Widget>::new(2);
        let a = pool.create(("a", 0));
        assert!(pool.destroy(a));
        assert!(!pool.destroy(a));
        assert!(!pool.destroy(Handle::empty()));
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn remove_returns_object() {
        let mut pool = HandleArrayMgr::<Widget>::new(2);
        let a = pool.create(("a", 5));
        let w = pool.remove(a).unwrap();
        assert_eq!((w.name, w.z), ("a", 5));
        assert!(pool.remove(a).is_none());
    }

    #[test]
    fn try_create_reports_exhaustion() {
        let mut pool = HandleArrayMgr::<Widget>::new(1);
        pool.create(("a", 0));
        assert!(pool.is_full());
        assert_eq!(
            pool.try_create(("b", 0)).unwrap_err(),
            HandleError::PoolExhausted { capacity: 1 }
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "pool exhausted")]
    fn create_on_full_pool_fails_fast() {
        let mut pool = HandleArrayMgr::<Widget>::new(1);
        pool.create(("a", 0));
        pool.create(("b", 0));
    }

    #[test]
    fn swap_keeps_handles_on_their_objects() {
        let mut pool = HandleArrayMgr::<Widget>::new(4);
        let a = pool.create(("a", 0));
        let b = pool.create(("b", 0));
        let c = pool.create(("c", 0));

        assert!(pool.swap_objects_in_array(a, c));
        assert_eq!(names(&pool), vec!["c", "b", "a"]);
        assert_eq!(pool.get(a).unwrap().name, "a");
        assert_eq!(pool.get(c).unwrap().name, "c");
        assert_eq!(pool.position_of(a), Some(2));
        assert_eq!(pool.handle_at(0), Some(c));

        pool.destroy(b);
        assert!(!pool.swap_objects_in_array(a, b));
    }

    #[test]
    fn sort_reorders_storage_not_identity() {
        let mut pool = HandleArrayMgr::<Widget>::new(4);
        let handles: Vec<_> = [("far", 9), ("near", -2), ("mid", 3)]
            .into_iter()
            .map(|p| pool.create(p))
            .collect();

        pool.sort_by_key(|w| w.z);
        assert_eq!(names(&pool), vec!["near", "mid", "far"]);
        for (h, name) in handles.iter().zip(["far", "near", "mid"]) {
            assert_eq!(pool.get(*h).unwrap().name, name);
        }

        pool.sort_by(|x, y| y.z.cmp(&x.z));
        assert_eq!(names(&pool), vec!["far", "mid", "near"]);
        assert_eq!(pool.position_of(handles[1]), Some(2));
    }

    #[test]
    fn specific_handle_restores_saved_identity() {
        let saved = Handle::<Widget>::new(3, 12);
        let mut pool = HandleArrayMgr::<Widget>::new(4);

        let h = pool.create_with_specific_handle(("restored", 0), saved).unwrap();
        assert_eq!(h, saved);
        assert_eq!(pool.get(saved).unwrap().name, "restored");

        assert_eq!(
            pool.create_with_specific_handle(("dup", 0), saved).unwrap_err(),
            HandleError::SlotOccupied { index: 3 }
        );
        assert_eq!(pool.active_count(), 1);

        let other = Handle::<Widget>::new(1, 2);
        let added = pool
            .add_with_specific_handle(Widget {
                handle: other,
                name: "added",
                z: 0,
            })
            .unwrap();
        assert_eq!(added, other);
        assert_eq!(pool.position_of(other), Some(1));
    }

    #[test]
    fn mutation_through_handle() {
        let mut pool = HandleArrayMgr::<Widget>::new(2);
        let a = pool.create(("a", 0));
        a.get_mut(&mut pool).unwrap().z = 7;
        assert_eq!(pool.get(a).unwrap().z, 7);
    }

    #[test]
    fn oversized_pool_is_rejected() {
        assert_eq!(
            HandleArrayMgr::<Widget>::try_new(70_000).unwrap_err(),
            HandleError::CapacityTooLarge {
                capacity: 70_000,
                max: 65536
            }
        );
        assert_eq!(HandleArrayMgr::<Widget>::try_new(8).unwrap().capacity(), 8);
    }

    #[test]
    fn reset_destroys_everything() {
        let mut pool = HandleArrayMgr::<Widget>::new(3);
        let a = pool.create(("a", 0));
        let b = pool.create(("b", 0));
        pool.reset();

        assert!(pool.is_empty());
        assert!(pool.get(a).is_none());
        assert!(pool.get(b).is_none());

        let c = pool.create(("c", 0));
        assert_eq!(pool.position_of(c), Some(0));
        assert!(pool.get(a).is_none());
    }
}
