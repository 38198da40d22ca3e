//! `v6watch expiring` – certificates expiring within a window.

use anyhow::Result;
use chrono::Utc;

use v6watch_core::store::SqliteStore;

pub async fn run_expiring(store: &SqliteStore, within_days: i64) -> Result<()> {
    let expiring = store.list_expiring(within_days).await?;
    if expiring.is_empty() {
        println!("No certificates expire within {within_days} days.");
        return Ok(());
    }

    println!("{:<28} {:<18} {}", "DOMAIN", "EXPIRES", "IN");
    let now = Utc::now();
    for snap in &expiring {
        // list_expiring only returns rows with an expiry set.
        let Some(expires_at) = snap.certificate_expires_at else {
            continue;
        };
        let days_left = (expires_at - now).num_days();
        let remaining = if days_left < 0 {
            format!("expired {} day(s) ago", -days_left)
        } else {
            format!("{days_left} day(s)")
        };
        println!(
            "{:<28} {:<18} {}",
            snap.domain,
            expires_at.format("%Y-%m-%d"),
            remaining
        );
    }
    Ok(())
}
