//! `tt_texcache`
//!
//! Texture cache inspection:
//! - Loads texture files through the shared texture data cache
//! - Keeps one handle-addressed pool entry per file
//! - Reports resident textures and cache traffic
//! - Verifies the cache drains once the pool is released

pub mod inspector;

pub use inspector::TextureInspector;
