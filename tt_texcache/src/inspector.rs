//! Texture inspection session.
//!
//! Loads textures through the cache, keeps one pool entry per requested file,
//! and produces a report of what is resident. Teardown checks that releasing
//! the pool really empties the cache.

use std::cmp::Reverse;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{debug, info, warn};
use tt_core::prelude::*;

/// Pool entry holding a reference to cached texture data.
#[derive(Debug)]
pub struct LoadedTexture {
    handle: Handle<LoadedTexture>,
    texture: TextureDataPtr,
}

impl LoadedTexture {
    pub fn texture(&self) -> &TextureData {
        &self.texture
    }
}

impl Pooled for LoadedTexture {
    type ConstructorParam = TextureDataPtr;

    fn construct(texture: TextureDataPtr, handle: Handle<Self>) -> Self {
        LoadedTexture { handle, texture }
    }

    fn handle(&self) -> Handle<Self> {
        self.handle
    }
}

/// One pool entry in a report.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedEntry {
    pub handle: Handle<LoadedTexture>,
    pub position: usize,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

/// Snapshot of the session state.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub loaded: Vec<LoadedEntry>,
    pub failed: Vec<String>,
    pub textures: Vec<TextureDumpEntry>,
    pub stats: CacheStats,
}

/// Texture cache + handle pool driven by the `texcache` binary.
pub struct TextureInspector {
    ctx: AssetContext,
    pool: HandleArrayMgr<LoadedTexture>,
    failed: Vec<String>,
}

impl TextureInspector {
    /// Builds the session. Fails on a config the pool cannot honour.
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let pool = HandleArrayMgr::try_new(config.pool_capacity)
            .context("create texture pool")?;
        let mut ctx = AssetContext::new(config);
        ctx.create_texture_cache();
        Ok(Self {
            ctx,
            pool,
            failed: Vec::new(),
        })
    }

    pub fn pool(&self) -> &HandleArrayMgr<LoadedTexture> {
        &self.pool
    }

    fn cache(&self) -> anyhow::Result<&TextureDataCache> {
        self.ctx
            .texture_cache()
            .context("texture data cache has not been created")
    }

    /// Loads `filename` and stores it in the pool.
    ///
    /// The file is requested twice; the second request must be a cache hit.
    pub fn load(&mut self, filename: &str) -> anyhow::Result<Handle<LoadedTexture>> {
        let cache = self.cache()?;
        let texture = cache.try_get(filename)?;
        let again = cache.try_get(filename)?;
        if !AssetRef::ptr_eq(&texture, &again) {
            bail!("texture {filename} was decoded twice while still referenced");
        }
        drop(again);

        let handle = self
            .pool
            .try_create(texture)
            .with_context(|| format!("store texture {filename}"))?;
        debug!(%handle, filename, "texture stored in pool");
        Ok(handle)
    }

    /// Loads every file, remembering failures instead of stopping.
    pub fn load_all<'a>(&mut self, filenames: impl IntoIterator<Item = &'a str>) -> usize {
        let mut loaded = 0;
        for filename in filenames {
            match self.load(filename) {
                Ok(_) => loaded += 1,
                Err(e) => {
                    warn!(filename, error = ?e, "texture load failed");
                    self.failed.push(filename.to_string());
                }
            }
        }
        loaded
    }

    /// Drops one pool entry.
    pub fn unload(&mut self, handle: Handle<LoadedTexture>) -> bool {
        self.pool.destroy(handle)
    }

    /// Orders the pool largest texture first. Handles are unaffected.
    pub fn sort_by_size(&mut self) {
        self.pool
            .sort_by_key(|entry| Reverse(entry.texture.byte_size()));
    }

    pub fn report(&self) -> anyhow::Result<InspectReport> {
        let cache = self.cache()?;
        let loaded = self
            .pool
            .iter()
            .enumerate()
            .map(|(position, entry)| LoadedEntry {
                handle: entry.handle,
                position,
                filename: entry.texture.filename().to_string(),
                width: entry.texture.width(),
                height: entry.texture.height(),
                bytes: entry.texture.byte_size(),
            })
            .collect();
        Ok(InspectReport {
            loaded,
            failed: self.failed.clone(),
            textures: cache.dump(),
            stats: cache.stats(),
        })
    }

    /// Releases the pool and destroys the cache. Fails if any texture is still
    /// resident afterwards.
    pub fn teardown(mut self) -> anyhow::Result<CacheStats> {
        self.pool.reset();
        let cache = self.cache()?;
        let stats = cache.stats();
        if !cache.is_empty() {
            bail!("{} textures still cached after releasing the pool", cache.len());
        }
        info!(
            released_bytes = cache.released_bytes(),
            releases = stats.releases,
            "texture cache drained"
        );
        self.ctx.destroy_texture_cache();
        Ok(stats)
    }
}
