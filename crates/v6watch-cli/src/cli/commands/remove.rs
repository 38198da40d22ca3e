//! `v6watch remove` – drop a domain and its capability record.

use anyhow::Result;

use v6watch_core::store::SqliteStore;

pub async fn run_remove(store: &SqliteStore, domain: &str) -> Result<()> {
    if store.remove(domain).await? {
        println!("removed {domain}");
    } else {
        println!("'{domain}' was not registered");
    }
    Ok(())
}
