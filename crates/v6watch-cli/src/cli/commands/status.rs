//! `v6watch status` – recently registered domains and their capabilities.

use anyhow::Result;

use super::{print_header, print_row};
use v6watch_core::store::SqliteStore;

pub async fn run_status(store: &SqliteStore, limit: u32) -> Result<()> {
    let recent = store.list_recent(limit).await?;
    if recent.is_empty() {
        println!("No domains registered.");
        return Ok(());
    }

    print_header();
    for snap in &recent {
        print_row(snap);
    }

    let adopters = store.list_ipv6_adopters(limit).await?;
    if !adopters.is_empty() {
        println!();
        println!("Recent IPv6 adopters:");
        for snap in &adopters {
            println!(
                "  {:<28} first seen {}",
                snap.domain,
                super::format_time(snap.first_ipv6_seen_at)
            );
        }
    }
    Ok(())
}
