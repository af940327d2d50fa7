//! Global config with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic config replacement.
//! This enables hot-reloading of `sluice.toml` during watch mode.

use crate::config::PipelineConfig;
use crate::freshness::ContentHash;
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

/// Global config storage.
pub static CONFIG: LazyLock<ArcSwap<PipelineConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(PipelineConfig::default()));

/// Short hash of the current config file content.
static CONFIG_HASH: AtomicU64 = AtomicU64::new(0);

#[inline]
pub fn cfg() -> Arc<PipelineConfig> {
    CONFIG.load_full()
}

fn short_hash(content: &[u8]) -> u64 {
    let hash = ContentHash::of(content);
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

/// Reload config from disk if content changed.
///
/// Returns `Ok(true)` if config was updated, `Ok(false)` if unchanged.
/// On error the previous config stays active.
pub fn reload_config() -> Result<bool> {
    let c = cfg();
    let cli = c.cli.context("config was not loaded from the command line")?;

    let content = std::fs::read(&c.config_path)
        .with_context(|| format!("Failed to read `{}`", c.config_path.display()))?;
    let new_hash = short_hash(&content);
    if new_hash == CONFIG_HASH.load(Ordering::Relaxed) {
        return Ok(false);
    }

    let new_config = PipelineConfig::load(cli)?;
    CONFIG.store(Arc::new(new_config));
    CONFIG_HASH.store(new_hash, Ordering::Relaxed);

    Ok(true)
}

#[inline]
pub fn init_config(config: PipelineConfig) -> Arc<PipelineConfig> {
    if let Ok(content) = std::fs::read(&config.config_path) {
        CONFIG_HASH.store(short_hash(&content), Ordering::Relaxed);
    }

    let arc = Arc::new(config);
    CONFIG.store(Arc::clone(&arc));
    arc
}
