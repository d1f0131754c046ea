//! Standalone texture cache inspector.
//!
//! Usage:
//!   cargo run -p tt_texcache -- [--config engine.json] [--root textures] [--capacity 1024] [--sort] [--json] <files...>
//!
//! Each file is loaded through the texture data cache (a second request must
//! hit the cache), stored in a handle pool, and listed. On exit the pool is
//! released and the cache must be empty.

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing::info;
use tt_core::config::EngineConfig;
use tt_texcache::TextureInspector;

const USAGE: &str =
    "texcache [--config FILE] [--root DIR] [--capacity N] [--sort] [--json] <files...>";

struct Args {
    config: Option<PathBuf>,
    root: Option<String>,
    capacity: Option<usize>,
    sort: bool,
    json: bool,
    files: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut parsed = Args {
        config: None,
        root: None,
        capacity: None,
        sort: false,
        json: false,
        files: Vec::new(),
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                parsed.config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--root" if i + 1 < args.len() => {
                parsed.root = Some(args[i + 1].clone());
                i += 2;
            }
            "--capacity" if i + 1 < args.len() => {
                let capacity = args[i + 1]
                    .parse()
                    .with_context(|| format!("invalid --capacity {}", args[i + 1]))?;
                parsed.capacity = Some(capacity);
                i += 2;
            }
            "--sort" => {
                parsed.sort = true;
                i += 1;
            }
            "--json" => {
                parsed.json = true;
                i += 1;
            }
            other if other.starts_with("--") => bail!("unknown option {other}"),
            file => {
                parsed.files.push(file.to_string());
                i += 1;
            }
        }
    }
    Ok(parsed)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    if args.files.is_empty() {
        bail!("usage: {USAGE}");
    }

    let mut cfg = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(root) = args.root {
        cfg.texture_root = root;
    }
    if let Some(capacity) = args.capacity {
        cfg.pool_capacity = capacity;
    }
    cfg.validate()?;
    info!(
        root = %cfg.texture_root,
        capacity = cfg.pool_capacity,
        files = args.files.len(),
        "Starting texture inspection"
    );

    let mut inspector = TextureInspector::new(cfg)?;
    let loaded = inspector.load_all(args.files.iter().map(String::as_str));
    if args.sort {
        inspector.sort_by_size();
    }

    let report = inspector.report()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).context("serialize report")?);
    } else {
        println!("Loaded {loaded} of {} textures", args.files.len());
        for entry in &report.loaded {
            println!(
                "  {:<12} #{:<4} {:<40} {}x{} ({} bytes)",
                entry.handle.to_string(),
                entry.position,
                entry.filename,
                entry.width,
                entry.height,
                entry.bytes
            );
        }
        for failed in &report.failed {
            println!("  failed: {failed}");
        }
        println!();
        println!("Cache ({} resident):", report.textures.len());
        for tex in &report.textures {
            println!(
                "  {} {:<40} {:?} {} bytes, {} owner(s), loaded {}",
                tex.id, tex.filename, tex.format, tex.bytes, tex.owners, tex.loaded_at
            );
        }
        println!(
            "hits {} / misses {}",
            report.stats.hits, report.stats.misses
        );
    }

    let stats = inspector.teardown()?;
    info!(releases = stats.releases, "Texture cache empty after teardown");
    Ok(())
}
