use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use tempfile::TempDir;
use tt_core::prelude::*;
use tt_tests::{init_tracing, write_png};
use tt_texcache::TextureInspector;

fn config_for(dir: &TempDir, capacity: usize) -> EngineConfig {
    EngineConfig {
        texture_root: dir.path().display().to_string(),
        pool_capacity: capacity,
    }
}

#[test]
fn concurrent_gets_share_one_texture() -> anyhow::Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    write_png(dir.path(), "shared.png", 8, 8)?;
    let cache = TextureDataCache::new(dir.path());

    let held = cache.try_get("shared.png")?;
    let barrier = Barrier::new(8);
    let results: Vec<TextureDataPtr> = thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.try_get("shared.png").unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for texture in &results {
        assert!(AssetRef::ptr_eq(texture, &held));
    }
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(cache.stats().hits, 8);
    Ok(())
}

#[test]
fn last_release_evicts_and_next_get_reloads() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_png(dir.path(), "tile.png", 4, 2)?;
    let cache = TextureDataCache::new(dir.path());

    let a = cache.try_get("tile.png")?;
    let b = a.clone();
    drop(a);
    assert!(cache.contains("tile.png"));
    drop(b);
    assert!(!cache.contains("tile.png"));
    assert_eq!(cache.stats().releases, 1);
    assert_eq!(cache.released_bytes(), 32);

    let _again = cache.try_get("tile.png")?;
    assert_eq!(cache.stats().misses, 2);
    Ok(())
}

#[derive(Debug)]
struct Shader {
    name: String,
    serial: usize,
}

impl Asset for Shader {
    type Id = String;

    fn asset_id(&self) -> &String {
        &self.name
    }
}

#[derive(Default)]
struct ShaderCompiler {
    compiled: AtomicUsize,
    released: AtomicUsize,
}

impl ReleasePolicy<Shader> for ShaderCompiler {
    fn destroy(&self, _shader: &Shader) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl CreationPolicy<Shader> for ShaderCompiler {
    fn create(&self, id: &String) -> Shader {
        Shader {
            name: id.clone(),
            serial: self.compiled.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[test]
fn creation_policy_builds_a_new_instance_after_eviction() {
    let cache = AssetCache::<Shader, _>::new(ShaderCompiler::default());
    let id = "sprite.frag".to_string();

    let first = cache.get_asset(&id);
    let again = cache.get_asset(&id);
    assert!(AssetRef::ptr_eq(&first, &again));
    assert_eq!(first.serial, 0);
    drop((first, again));
    assert_eq!(cache.policy().released.load(Ordering::SeqCst), 1);
    assert!(cache.is_empty());

    let rebuilt = cache.get_asset(&id);
    assert_eq!(rebuilt.serial, 1);
    assert_eq!(cache.policy().compiled.load(Ordering::SeqCst), 2);
    assert_eq!(cache.entries(), vec![(id, 1)]);
}

#[test]
fn texture_outlives_destroyed_cache() -> anyhow::Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    write_png(dir.path(), "late.png", 2, 2)?;
    let mut ctx = AssetContext::new(config_for(&dir, 4));

    let texture = ctx.create_texture_cache().try_get("late.png")?;
    assert!(ctx.destroy_texture_cache());
    assert_eq!(texture.width(), 2);
    assert_eq!(texture.pixels().len(), 16);
    drop(texture);

    let cache = ctx.create_texture_cache();
    assert!(cache.is_empty());
    Ok(())
}

#[test]
fn inspector_loads_sorts_and_drains() -> anyhow::Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    write_png(dir.path(), "small.png", 1, 1)?;
    write_png(dir.path(), "large.png", 8, 8)?;
    write_png(dir.path(), "ui/medium.png", 4, 4)?;

    let mut inspector = TextureInspector::new(config_for(&dir, 8))?;
    let loaded = inspector.load_all(["small.png", "large.png", "ui\\medium.png", "missing.png"]);
    assert_eq!(loaded, 3);

    let small = inspector.pool().handle_at(0).unwrap();
    inspector.sort_by_size();
    let report = inspector.report()?;
    let sizes: Vec<_> = report.loaded.iter().map(|e| e.bytes).collect();
    assert_eq!(sizes, [256, 64, 4]);
    assert_eq!(report.failed, ["missing.png"]);
    assert_eq!(report.textures.len(), 3);
    assert!(report.textures.iter().all(|t| t.owners == 1));
    assert_eq!(report.stats.hits, 3);
    assert_eq!(inspector.pool().position_of(small), Some(2));

    assert!(inspector.unload(small));
    assert!(!inspector.unload(small));
    assert_eq!(inspector.report()?.textures.len(), 2);

    let stats = inspector.teardown()?;
    assert_eq!(stats.live, 0);
    assert_eq!(stats.releases, 3);
    Ok(())
}

#[test]
fn backslash_filename_loads_from_nested_directory() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_png(dir.path(), "levels/forest/bark.png", 2, 3)?;
    let cache = TextureDataCache::new(dir.path());

    let bark = cache.try_get("levels\\forest\\bark.png")?;
    assert_eq!((bark.width(), bark.height()), (2, 3));
    assert!(cache.contains("levels/forest/bark.png"));

    let again = cache.try_get("levels/forest/bark.png")?;
    assert!(AssetRef::ptr_eq(&bark, &again));
    assert_eq!(cache.stats().misses, 1);
    Ok(())
}

#[test]
fn inspector_rejects_oversized_pool_config() {
    let dir = TempDir::new().unwrap();
    let err = TextureInspector::new(config_for(&dir, 70_000))
        .err()
        .expect("oversized pool accepted");
    assert!(format!("{err:#}").contains("pool_capacity 70000"));
}

#[test]
fn inspector_rejects_loads_beyond_pool_capacity() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_png(dir.path(), "a.png", 1, 1)?;
    write_png(dir.path(), "b.png", 1, 1)?;

    let mut inspector = TextureInspector::new(config_for(&dir, 1))?;
    inspector.load("a.png")?;
    let err = inspector.load("b.png").unwrap_err();
    assert!(format!("{err:#}").contains("pool exhausted"));

    let stats = inspector.teardown()?;
    assert_eq!(stats.live, 0);
    Ok(())
}
