//! Cache of decoded texture data.
//!
//! Textures are keyed by the [`Hash32`] of their filename. While anyone holds
//! a [`TextureDataPtr`] for a file, `get` hands out that same buffer; once the
//! last pointer is dropped the entry disappears and the next `get` decodes the
//! file again.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::asset_cache::{AssetCache, AssetRef, CacheStats, ReleasePolicy};
use crate::hash::Hash32;
use crate::texture_data::{PixelFormat, TextureData};

/// Shared pointer to cached texture data.
pub type TextureDataPtr = AssetRef<TextureData>;

/// Release hook: accounts for freed pixel memory.
#[derive(Debug, Default)]
pub struct TextureRelease {
    released_bytes: AtomicU64,
}

impl ReleasePolicy<TextureData> for TextureRelease {
    fn destroy(&self, texture: &TextureData) {
        self.released_bytes
            .fetch_add(texture.byte_size() as u64, Ordering::Relaxed);
        debug!(
            id = %texture.id(),
            filename = texture.filename(),
            bytes = texture.byte_size(),
            "texture data released"
        );
    }
}

/// One line of [`TextureDataCache::dump`].
#[derive(Debug, Clone, Serialize)]
pub struct TextureDumpEntry {
    pub id: Hash32,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub bytes: usize,
    /// Owners outside the dump itself.
    pub owners: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Filename-keyed cache of decoded textures.
pub struct TextureDataCache {
    root: PathBuf,
    cache: AssetCache<TextureData, TextureRelease>,
}

impl TextureDataCache {
    /// Creates a cache resolving filenames against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: AssetCache::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of `filename`. Backslashes are separators, matching
    /// [`Hash32::from_filename`].
    pub fn source_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename.replace('\\', "/"))
    }

    /// Returns the cached texture for `filename`, decoding it on a miss.
    pub fn try_get(&self, filename: &str) -> anyhow::Result<TextureDataPtr> {
        let id = Hash32::from_filename(filename);
        let texture = self.cache.get_or_try_insert_with(&id, || {
            let path = self.source_path(filename);
            debug!(%id, path = %path.display(), "loading texture data");
            TextureData::load(&path, filename)
        })?;
        if !same_filename(texture.filename(), filename) {
            warn!(
                %id,
                requested = filename,
                cached = texture.filename(),
                "texture filename hash collision"
            );
        }
        Ok(texture)
    }

    /// Like [`TextureDataCache::try_get`], but logs failures and returns `None`.
    pub fn get(&self, filename: &str) -> Option<TextureDataPtr> {
        match self.try_get(filename) {
            Ok(texture) => Some(texture),
            Err(e) => {
                warn!(filename, error = ?e, "failed to load texture data");
                None
            }
        }
    }

    /// Returns the texture for `filename` only if it is currently cached.
    pub fn find(&self, filename: &str) -> Option<TextureDataPtr> {
        self.cache.find(&Hash32::from_filename(filename))
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.cache.contains(&Hash32::from_filename(filename))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Total pixel bytes freed by released textures so far.
    pub fn released_bytes(&self) -> u64 {
        self.cache.policy().released_bytes.load(Ordering::Relaxed)
    }

    /// Lists the cached textures, sorted by filename, and logs them.
    pub fn dump(&self) -> Vec<TextureDumpEntry> {
        let mut entries: Vec<TextureDumpEntry> = self
            .cache
            .live_assets()
            .into_iter()
            .map(|texture| TextureDumpEntry {
                id: texture.id(),
                filename: texture.filename().to_string(),
                width: texture.width(),
                height: texture.height(),
                format: texture.format(),
                bytes: texture.byte_size(),
                owners: AssetRef::strong_count(&texture) - 1,
                loaded_at: texture.loaded_at(),
            })
            .collect();
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));

        let total: usize = entries.iter().map(|e| e.bytes).sum();
        info!(textures = entries.len(), bytes = total, "texture data cache dump");
        for e in &entries {
            debug!(
                id = %e.id,
                filename = %e.filename,
                width = e.width,
                height = e.height,
                format = ?e.format,
                bytes = e.bytes,
                owners = e.owners,
                "cached texture"
            );
        }
        entries
    }
}

fn same_filename(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .all(|(x, y)| x == y || (matches!(x, b'/' | b'\\') && matches!(y, b'/' | b'\\')))
}
