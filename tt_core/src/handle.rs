//! Generational handles.
//!
//! A [`Handle`] is an opaque, typed reference into a manager's slot table. It
//! packs a slot index and a generation counter into one `u32`:
//!
//! ```text
//! 32-bit handle layout:
//! ┌───────────────────────────────┬───────────────────────────────┐
//! │ Counter (16)                  │ Index (16)                    │
//! └───────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! Counter `0` is never issued, so the all-zero value is the empty handle.
//! A handle is only "current" while its counter matches the slot's counter;
//! once the object is destroyed the slot moves on and the old handle stays
//! invalid.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of bits holding the slot index.
pub const INDEX_BITS: u32 = 16;
/// Number of bits holding the generation counter.
pub const COUNTER_BITS: u32 = 16;

/// Largest slot index a handle can carry.
pub const MAX_INDEX: u32 = (1 << INDEX_BITS) - 1;
/// Largest generation a handle can carry.
pub const MAX_COUNTER: u32 = (1 << COUNTER_BITS) - 1;

const INDEX_MASK: u32 = MAX_INDEX;

/// Typed generational handle.
pub struct Handle<T> {
    value: u32,
    _marker: PhantomData<fn() -> T>,
}

/// Marker for handle upcasts: `Handle<Self>` may be viewed as `Handle<Base>`.
///
/// Implement it for types stored in a pool that other code addresses through a
/// more general handle type (e.g. every `Sprite` is also a `SceneNode`).
pub trait Upcast<Base> {}

/// Capability to turn a handle into a reference to its object.
pub trait Resolve<T> {
    /// Returns the object if `handle` is current.
    fn resolve(&self, handle: Handle<T>) -> Option<&T>;

    /// Mutable variant of [`Resolve::resolve`].
    fn resolve_mut(&mut self, handle: Handle<T>) -> Option<&mut T>;
}

impl<T> Handle<T> {
    /// Packs an index and a counter.
    ///
    /// # Panics
    ///
    /// Panics if either part exceeds its bit width.
    pub fn new(index: u32, counter: u32) -> Self {
        assert!(index <= MAX_INDEX, "handle index {index} exceeds {MAX_INDEX}");
        assert!(
            counter <= MAX_COUNTER,
            "handle counter {counter} exceeds {MAX_COUNTER}"
        );
        Self::from_raw_value((counter << INDEX_BITS) | index)
    }

    /// The empty handle. Never resolves.
    pub const fn empty() -> Self {
        Self {
            value: 0,
            _marker: PhantomData,
        }
    }

    /// Rebuilds a handle from [`Handle::value`].
    ///
    /// No manager is consulted; the owner re-validates on dereference.
    pub const fn from_raw_value(value: u32) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// Packed representation, used for hashing, logging and persistence.
    pub const fn value(self) -> u32 {
        self.value
    }

    pub const fn index(self) -> u32 {
        self.value & INDEX_MASK
    }

    pub const fn counter(self) -> u32 {
        self.value >> INDEX_BITS
    }

    /// True iff the counter is zero.
    pub const fn is_empty(self) -> bool {
        self.counter() == 0
    }

    /// Resets to the empty handle.
    pub fn invalidate(&mut self) {
        *self = Self::empty();
    }

    /// Views this handle as a handle to a base type. Index and counter are kept.
    pub fn upcast<B>(self) -> Handle<B>
    where
        T: Upcast<B>,
    {
        Handle::from_raw_value(self.value)
    }

    /// Dereferences through `resolver`. Empty handles short-circuit to `None`.
    pub fn get<R: Resolve<T>>(self, resolver: &R) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        resolver.resolve(self)
    }

    pub fn get_mut<R: Resolve<T>>(self, resolver: &mut R) -> Option<&mut T> {
        if self.is_empty() {
            return None;
        }
        resolver.resolve_mut(self)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index())
            .field("counter", &self.counter())
            .finish()
    }
}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[empty]")
        } else {
            write!(f, "[{}:{}]", self.index(), self.counter())
        }
    }
}

impl<T> From<Handle<T>> for u32 {
    fn from(handle: Handle<T>) -> Self {
        handle.value
    }
}

impl<T> Serialize for Handle<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.value)
    }
}

impl<'de, T> Deserialize<'de> for Handle<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_raw_value)
    }
}
