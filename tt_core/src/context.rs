//! Explicitly owned engine services.
//!
//! Process-wide singletons are replaced by an [`AssetContext`] that the
//! application creates, passes to whoever needs asset lookups, and tears down
//! itself. Several contexts can coexist, which keeps tests independent.

use tracing::info;

use crate::config::EngineConfig;
use crate::error::fail_fast;
use crate::texture_data_cache::TextureDataCache;

/// Holder for a service with an explicit create/destroy lifecycle.
#[derive(Debug)]
pub struct InstanceSlot<T> {
    name: &'static str,
    instance: Option<T>,
}

impl<T> InstanceSlot<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            instance: None,
        }
    }

    /// Creates the instance. Creating twice is an invariant violation; release
    /// builds keep the existing instance.
    pub fn create_instance(&mut self, make: impl FnOnce() -> T) -> &mut T {
        if self.instance.is_some() {
            fail_fast!("{} instance already exists", self.name);
        }
        self.instance.get_or_insert_with(make)
    }

    pub fn get_instance(&self) -> Option<&T> {
        self.instance.as_ref()
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Drops the instance. Returns whether there was one.
    pub fn destroy_instance(&mut self) -> bool {
        self.instance.take().is_some()
    }
}

/// Owner of the asset caches and the config they were built from.
pub struct AssetContext {
    config: EngineConfig,
    textures: InstanceSlot<TextureDataCache>,
}

impl AssetContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            textures: InstanceSlot::new("TextureDataCache"),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates the texture cache rooted at the configured texture directory.
    pub fn create_texture_cache(&mut self) -> &TextureDataCache {
        let root = self.config.texture_root.clone();
        info!(%root, "creating texture data cache");
        self.textures
            .create_instance(|| TextureDataCache::new(root))
    }

    pub fn texture_cache(&self) -> Option<&TextureDataCache> {
        self.textures.get_instance()
    }

    pub fn has_texture_cache(&self) -> bool {
        self.textures.has_instance()
    }

    /// Tears down the texture cache. Textures still held elsewhere stay valid
    /// but are no longer tracked.
    pub fn destroy_texture_cache(&mut self) -> bool {
        self.textures.destroy_instance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_lifecycle() {
        let mut slot = InstanceSlot::<u32>::new("counter");
        assert!(!slot.has_instance());
        assert!(slot.get_instance().is_none());

        *slot.create_instance(|| 1) += 1;
        assert_eq!(slot.get_instance(), Some(&2));

        assert!(slot.destroy_instance());
        assert!(!slot.destroy_instance());
        assert!(!slot.has_instance());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "already exists")]
    fn double_create_fails_fast() {
        let mut slot = InstanceSlot::<u32>::new("counter");
        slot.create_instance(|| 1);
        slot.create_instance(|| 2);
    }

    #[test]
    fn context_owns_texture_cache() {
        let mut ctx = AssetContext::new(EngineConfig {
            texture_root: "assets/tex".to_string(),
            ..EngineConfig::default()
        });
        assert!(!ctx.has_texture_cache());

        let cache = ctx.create_texture_cache();
        assert_eq!(cache.root(), std::path::Path::new("assets/tex"));
        assert!(ctx.texture_cache().is_some());

        assert!(ctx.destroy_texture_cache());
        assert!(ctx.texture_cache().is_none());
    }
}
