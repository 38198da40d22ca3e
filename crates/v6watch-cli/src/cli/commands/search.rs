//! `v6watch search` – substring search over registered domains.

use anyhow::Result;

use super::{print_header, print_row};
use v6watch_core::store::SqliteStore;

pub async fn run_search(store: &SqliteStore, needle: &str, limit: u32) -> Result<()> {
    let hits = store.search(needle, limit).await?;
    if hits.is_empty() {
        println!("No domains match '{needle}'.");
        return Ok(());
    }
    print_header();
    for snap in &hits {
        print_row(snap);
    }
    Ok(())
}
