//! Weak-reference asset cache.
//!
//! `AssetCache` maps an asset id to a weak reference of the one live instance
//! for that id. Callers get an [`AssetRef`] (shared ownership). The cache
//! itself never keeps an asset alive: when the last `AssetRef` for an id goes
//! away, the asset calls back into the cache, which erases the map entry and
//! runs the [`ReleasePolicy`].
//!
//! Guarantees:
//! - At most one live instance per id. Creation runs without holding the map
//!   lock; if two creators race, the first insert wins and the duplicate is
//!   discarded before anyone sees it.
//! - An entry is removed exactly once, by its own asset's release.
//! - The cache only tracks identity and lifetime. Whether an asset is usable
//!   is up to the asset type and its policy.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tracing::{debug, warn};

/// A cacheable asset. The id must not change after construction.
pub trait Asset: Send + Sync + 'static {
    type Id: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn asset_id(&self) -> &Self::Id;
}

/// Hook run when the last owner releases an asset, right before it is dropped.
pub trait ReleasePolicy<A>: Send + Sync + 'static {
    fn destroy(&self, _asset: &A) {}
}

/// Builds an asset for a cache miss.
pub trait CreationPolicy<A: Asset>: ReleasePolicy<A> {
    fn create(&self, id: &A::Id) -> A;
}

/// Policy that does nothing extra on release.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRelease;

impl<A> ReleasePolicy<A> for DefaultRelease {}

/// Counters describing cache traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub releases: u64,
    /// Entries currently backed by a live asset.
    pub live: usize,
}

trait Release<A>: Send + Sync {
    fn release(&self, asset: &A);
}

struct Shared<A: Asset, P> {
    entries: Mutex<HashMap<A::Id, Weak<Tracked<A>>>>,
    policy: P,
    hits: AtomicU64,
    misses: AtomicU64,
    releases: AtomicU64,
}

struct Tracked<A: Asset> {
    asset: A,
    owner: Weak<dyn Release<A>>,
}

impl<A: Asset> Drop for Tracked<A> {
    fn drop(&mut self) {
        match self.owner.upgrade() {
            Some(owner) => owner.release(&self.asset),
            None => debug!(
                id = ?self.asset.asset_id(),
                "asset released after its cache was dropped"
            ),
        }
    }
}

impl<A: Asset, P: ReleasePolicy<A>> Release<A> for Shared<A, P> {
    fn release(&self, asset: &A) {
        let id = asset.asset_id();
        {
            let mut entries = lock(&self.entries);
            match entries.get(id).map(|weak| weak.strong_count() == 0) {
                Some(true) => {
                    entries.remove(id);
                }
                Some(false) => debug!(?id, "released asset was already superseded in the cache"),
                None => warn!(?id, "released asset had no cache entry"),
            }
        }
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.policy.destroy(asset);
    }
}

/// Shared handle to a cached asset.
pub struct AssetRef<A: Asset>(Arc<Tracked<A>>);

impl<A: Asset> AssetRef<A> {
    /// True if both refer to the same instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    /// Number of live `AssetRef`s to this instance.
    pub fn strong_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }
}

impl<A: Asset> Clone for AssetRef<A> {
    fn clone(&self) -> Self {
        AssetRef(Arc::clone(&self.0))
    }
}

impl<A: Asset> Deref for AssetRef<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.0.asset
    }
}

impl<A: Asset + fmt::Debug> fmt::Debug for AssetRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssetRef").field(&self.0.asset).finish()
    }
}

/// Keyed cache of weakly tracked assets.
pub struct AssetCache<A: Asset, P: ReleasePolicy<A> = DefaultRelease> {
    shared: Arc<Shared<A, P>>,
}

impl<A: Asset, P: ReleasePolicy<A> + Default> Default for AssetCache<A, P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<A: Asset, P: ReleasePolicy<A>> AssetCache<A, P> {
    pub fn new(policy: P) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                policy,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                releases: AtomicU64::new(0),
            }),
        }
    }

    pub fn policy(&self) -> &P {
        &self.shared.policy
    }

    /// Returns the live instance for `id` without creating one.
    pub fn find(&self, id: &A::Id) -> Option<AssetRef<A>> {
        self.lookup(id)
    }

    /// Returns the live instance for `id`, or inserts the asset built by `load`.
    ///
    /// A failed load leaves the cache untouched.
    pub fn get_or_try_insert_with<E, F>(&self, id: &A::Id, load: F) -> Result<AssetRef<A>, E>
    where
        F: FnOnce() -> Result<A, E>,
    {
        if let Some(hit) = self.lookup(id) {
            self.shared.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.shared.misses.fetch_add(1, Ordering::Relaxed);
        let asset = load()?;
        debug_assert!(asset.asset_id() == id, "loaded asset reports another id");
        Ok(self.insert(asset))
    }

    pub fn contains(&self, id: &A::Id) -> bool {
        lock(&self.shared.entries)
            .get(id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of ids backed by a live asset.
    pub fn len(&self) -> usize {
        lock(&self.shared.entries)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live ids with their owner counts.
    pub fn entries(&self) -> Vec<(A::Id, usize)> {
        lock(&self.shared.entries)
            .iter()
            .filter_map(|(id, weak)| {
                let owners = weak.strong_count();
                (owners > 0).then(|| (id.clone(), owners))
            })
            .collect()
    }

    /// Live assets, upgraded. Holding the result keeps them alive.
    pub fn live_assets(&self) -> Vec<AssetRef<A>> {
        lock(&self.shared.entries)
            .values()
            .filter_map(Weak::upgrade)
            .map(AssetRef)
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            releases: self.shared.releases.load(Ordering::Relaxed),
            live: self.len(),
        }
    }

    fn lookup(&self, id: &A::Id) -> Option<AssetRef<A>> {
        let mismatched;
        {
            let entries = lock(&self.shared.entries);
            match entries.get(id).and_then(Weak::upgrade) {
                Some(tracked) if tracked.asset.asset_id() == id => return Some(AssetRef(tracked)),
                other => mismatched = other,
            }
        }
        // Dropped outside the lock: it may be the last owner.
        if mismatched.is_some() {
            warn!(?id, "cache entry resolved to an asset with another id");
        }
        None
    }

    fn insert(&self, asset: A) -> AssetRef<A> {
        let id = asset.asset_id().clone();
        let mut displaced = None;
        let mut entries = lock(&self.shared.entries);

        let existing = entries.get(&id).and_then(Weak::upgrade);
        if let Some(existing) = existing {
            if existing.asset.asset_id() == &id {
                drop(entries);
                debug!(?id, "asset was inserted concurrently; discarding duplicate");
                self.shared.policy.destroy(&asset);
                return AssetRef(existing);
            }
            displaced = Some(existing);
        }

        let shared: Arc<dyn Release<A>> = self.shared.clone();
        let owner = Arc::downgrade(&shared);
        let tracked = Arc::new(Tracked { asset, owner });
        entries.insert(id, Arc::downgrade(&tracked));
        drop(entries);
        drop(displaced);
        AssetRef(tracked)
    }
}

impl<A: Asset, P: CreationPolicy<A>> AssetCache<A, P> {
    /// Returns the live instance for `id`, creating it through the policy on a
    /// miss.
    pub fn get_asset(&self, id: &A::Id) -> AssetRef<A> {
        if let Some(hit) = self.lookup(id) {
            self.shared.hits.fetch_add(1, Ordering::Relaxed);
            return hit;
        }
        self.shared.misses.fetch_add(1, Ordering::Relaxed);
        let asset = self.shared.policy.create(id);
        self.insert(asset)
    }
}

impl<A: Asset, P: ReleasePolicy<A>> Drop for AssetCache<A, P> {
    fn drop(&mut self) {
        let live = self.len();
        if live > 0 {
            warn!(live, "asset cache dropped while assets are still referenced");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
