//! `v6watch check` / `check-all` – trigger capability re-checks.

use anyhow::{bail, Result};

use v6watch_core::store::{CapabilityStore, SqliteStore};
use v6watch_core::tracker::Tracker;

pub async fn run_check(store: &SqliteStore, tracker: &Tracker, domain: &str) -> Result<()> {
    if store.fetch(domain).await?.is_none() {
        bail!("'{domain}' is not registered; use `v6watch add {domain}` first");
    }
    tracker.spawn_check(domain).await?;
    println!("capability check finished for {domain}");
    Ok(())
}

pub async fn run_check_all(store: &SqliteStore, tracker: &Tracker) -> Result<()> {
    let domains = store.all_domains().await?;
    if domains.is_empty() {
        println!("No domains registered.");
        return Ok(());
    }

    println!(
        "checking {} domain(s), up to {} at a time",
        domains.len(),
        tracker.capacity()
    );
    // Spawn everything up front; the admission pool does the pacing.
    let handles: Vec<_> = domains.iter().map(|d| tracker.spawn_check(d)).collect();
    for handle in handles {
        handle.await?;
    }
    println!("done");
    Ok(())
}
