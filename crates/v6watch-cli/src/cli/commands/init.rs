//! `v6watch init` – create the database and config files if missing.
//!
//! Schema migration itself runs on every store open; this command exists so
//! a fresh install can be prepared explicitly.

use anyhow::Result;

use v6watch_core::config;

pub async fn run_init() -> Result<()> {
    // The caller already opened the store (running migrations) and
    // load_or_init already wrote a default config; just report where.
    println!("config: {}", config::config_path()?.display());
    println!("domain database ready");
    Ok(())
}
