//! Shared fixtures for the integration tests.

use std::path::Path;

use image::{Rgba, RgbaImage};
use tt_core::prelude::*;

/// Installs a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Writes a solid-colour RGBA PNG of `w`x`h` pixels to `dir/name`.
pub fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> anyhow::Result<()> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    RgbaImage::from_pixel(w, h, Rgba([0x40, 0x80, 0xc0, 0xff])).save(path)?;
    Ok(())
}

/// Base type for upcast tests.
#[derive(Debug)]
pub struct Node;

/// Pool object used across the handle tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub handle: Handle<Sprite>,
    pub name: String,
    pub layer: i32,
}

impl Pooled for Sprite {
    type ConstructorParam = (String, i32);

    fn construct((name, layer): (String, i32), handle: Handle<Self>) -> Self {
        Sprite {
            handle,
            name,
            layer,
        }
    }

    fn handle(&self) -> Handle<Self> {
        self.handle
    }
}

impl Upcast<Node> for Sprite {}

/// Creates a sprite named `name` on layer 0.
pub fn sprite(pool: &mut HandleArrayMgr<Sprite>, name: &str) -> Handle<Sprite> {
    pool.create((name.to_string(), 0))
}

/// Checks that the pool is densely packed and every live object resolves
/// through its own handle.
pub fn assert_consistent(pool: &HandleArrayMgr<Sprite>) {
    for (position, sprite) in pool.iter().enumerate() {
        assert_eq!(pool.position_of(sprite.handle), Some(position));
        assert_eq!(pool.get(sprite.handle), Some(sprite));
        assert_eq!(pool.handle_at(position), Some(sprite.handle));
    }
    assert_eq!(pool.as_slice().len(), pool.active_count());
}
