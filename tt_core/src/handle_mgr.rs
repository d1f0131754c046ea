//! Slot table mapping handles to storage targets.
//!
//! `HandleMgr` is the registry half of the pool: it hands out handles, checks
//! their generation on lookup, and records where each live object currently
//! sits in its owner's storage (the "target"). It never owns the objects.
//!
//! Slot lifecycle:
//! - register: take a free slot, bump its counter, store the target.
//! - unregister: clear the target. The counter is left alone so handles from
//!   the finished generation stay invalid.
//! - Freed slots are reused oldest-first.
//! - A slot whose counter reaches [`MAX_COUNTER`] is retired when it is next
//!   unregistered and never handed out again.

use std::collections::VecDeque;
use std::marker::PhantomData;

use tracing::{debug, warn};

use crate::error::{fail_fast, HandleError};
use crate::handle::{Handle, MAX_COUNTER, MAX_INDEX};

/// Most slots a table can hold: every index a handle can encode.
pub const MAX_CAPACITY: usize = MAX_INDEX as usize + 1;

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    counter: u32,
    target: Option<usize>,
    retired: bool,
}

/// Generation-checked slot table.
#[derive(Debug)]
pub struct HandleMgr<T> {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    capacity: usize,
    live: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HandleMgr<T> {
    /// Creates a table that can hold up to `capacity` live handles.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAX_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        match Self::try_with_capacity(capacity) {
            Ok(mgr) => mgr,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible variant of [`HandleMgr::with_capacity`].
    pub fn try_with_capacity(capacity: usize) -> Result<Self, HandleError> {
        if capacity > MAX_CAPACITY {
            return Err(HandleError::CapacityTooLarge {
                capacity,
                max: MAX_CAPACITY,
            });
        }
        Ok(Self {
            slots: Vec::with_capacity(capacity),
            free: VecDeque::new(),
            capacity,
            live: 0,
            _marker: PhantomData,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Registers an object stored at `target`, returning its new handle.
    pub fn try_register_object(&mut self, target: usize) -> Result<Handle<T>, HandleError> {
        let index = self.next_free_index().ok_or(HandleError::PoolExhausted {
            capacity: self.capacity,
        })?;
        let slot = &mut self.slots[index as usize];
        slot.counter += 1;
        slot.target = Some(target);
        self.live += 1;
        Ok(Handle::new(index, slot.counter))
    }

    /// Infallible variant of [`HandleMgr::try_register_object`].
    ///
    /// A full table is an invariant violation: see `fail_fast!`. Release builds
    /// get the empty handle back.
    pub fn register_object(&mut self, target: usize) -> Handle<T> {
        match self.try_register_object(target) {
            Ok(handle) => handle,
            Err(e) => {
                fail_fast!("register_object failed: {}", e);
                Handle::empty()
            }
        }
    }

    /// Registers an object under a caller-chosen handle (deserialization path).
    ///
    /// The slot must be in range, unoccupied and not retired, and the requested
    /// counter must be newer than any generation the slot already issued. The
    /// slot's counter is set to the requested one; later registrations continue
    /// from there.
    pub fn register_at(
        &mut self,
        handle: Handle<T>,
        target: usize,
    ) -> Result<Handle<T>, HandleError> {
        if handle.is_empty() {
            return Err(HandleError::EmptyHandle);
        }
        let index = handle.index() as usize;
        if index >= self.capacity {
            return Err(HandleError::IndexOutOfRange {
                index,
                capacity: self.capacity,
            });
        }

        while self.slots.len() <= index {
            let fresh = self.slots.len();
            self.slots.push(Slot::default());
            if fresh != index {
                self.free.push_back(fresh as u32);
            }
        }

        let slot = self.slots[index];
        if slot.target.is_some() {
            return Err(HandleError::SlotOccupied { index });
        }
        if slot.retired {
            return Err(HandleError::SlotRetired { index });
        }
        if slot.counter > 0 && handle.counter() <= slot.counter {
            return Err(HandleError::GenerationRollback {
                index,
                requested: handle.counter(),
                issued: slot.counter,
            });
        }

        self.free.retain(|&free| free as usize != index);
        let slot = &mut self.slots[index];
        slot.counter = handle.counter();
        slot.target = Some(target);
        self.live += 1;
        debug!(%handle, target, "registered object at specific handle");
        Ok(handle)
    }

    /// Clears the slot for `handle` and returns the target it pointed at.
    ///
    /// Returns `None` for empty or stale handles.
    pub fn unregister_object(&mut self, handle: Handle<T>) -> Option<usize> {
        let index = self.current_index(handle)?;
        let slot = &mut self.slots[index];
        let target = slot.target.take();
        self.live -= 1;

        if slot.counter >= MAX_COUNTER {
            slot.retired = true;
            warn!(index, "handle slot exhausted its generations; retiring it");
        } else {
            self.free.push_back(index as u32);
        }
        target
    }

    /// Storage target of `handle`, if it is current.
    pub fn get_target(&self, handle: Handle<T>) -> Option<usize> {
        self.current_index(handle)
            .and_then(|index| self.slots[index].target)
    }

    /// Points a live handle at a new target after its object moved.
    pub fn set_target(&mut self, handle: Handle<T>, target: usize) -> bool {
        match self.current_index(handle) {
            Some(index) => {
                self.slots[index].target = Some(target);
                true
            }
            None => false,
        }
    }

    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        self.current_index(handle).is_some()
    }

    /// Iterates live handles together with their targets, in slot order.
    pub fn live_handles(&self) -> impl Iterator<Item = (Handle<T>, usize)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.target
                .map(|target| (Handle::new(index as u32, slot.counter), target))
        })
    }

    /// Unregisters everything. Counters survive, so every previously issued
    /// handle stays invalid.
    pub fn reset(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.target.take().is_some() && slot.counter >= MAX_COUNTER {
                slot.retired = true;
            }
            if !slot.retired {
                self.free.push_back(index as u32);
            }
        }
        self.live = 0;
    }

    fn current_index(&self, handle: Handle<T>) -> Option<usize> {
        if handle.is_empty() {
            return None;
        }
        let index = handle.index() as usize;
        let slot = self.slots.get(index)?;
        (slot.target.is_some() && slot.counter == handle.counter()).then_some(index)
    }

    fn next_free_index(&mut self) -> Option<u32> {
        if let Some(index) = self.free.pop_front() {
            return Some(index);
        }
        if self.slots.len() < self.capacity {
            self.slots.push(Slot::default());
            return Some((self.slots.len() - 1) as u32);
        }
        None
    }
}
