//! `v6watch add` – register a domain and run its first capability check.

use anyhow::{bail, Result};
use chrono::Utc;
use std::net::IpAddr;

use v6watch_core::resolver::{ResolveHost, SystemResolver};
use v6watch_core::snapshot::CapabilitySnapshot;
use v6watch_core::store::{CapabilityStore, SqliteStore};
use v6watch_core::tracker::Tracker;

const MAX_DESCRIPTION_CHARS: usize = 64;

pub async fn run_add(
    store: &SqliteStore,
    tracker: &Tracker,
    domain: &str,
    desc: &str,
) -> Result<()> {
    let domain = domain.trim().trim_end_matches('.');
    if domain.is_empty() {
        bail!("domain must not be empty");
    }
    if domain.parse::<IpAddr>().is_ok() {
        bail!("'{domain}' is an IP address; register a domain name instead");
    }
    if desc.chars().count() > MAX_DESCRIPTION_CHARS {
        bail!("description is longer than {MAX_DESCRIPTION_CHARS} characters");
    }
    if store.fetch(domain).await?.is_some() {
        bail!("'{domain}' is already registered; use `v6watch check {domain}` to re-check it");
    }

    // Registration requires at least one DNS record, and records the
    // addresses seen at add time so the row is useful before the first
    // check finishes.
    let addrs = SystemResolver.lookup(domain).await?;
    if addrs.is_empty() {
        bail!("'{domain}' has no DNS records");
    }

    let mut snap = CapabilitySnapshot::new(domain, desc);
    snap.created_at = Some(Utc::now());
    for addr in &addrs {
        match addr {
            IpAddr::V4(_) => snap.address_v4 = Some(addr.to_string()),
            IpAddr::V6(_) => snap.address_v6 = Some(addr.to_string()),
        }
    }
    store.insert(&snap).await?;
    println!("registered {domain} ({} address(es) resolved)", addrs.len());

    tracker.spawn_check(domain).await?;
    println!("capability check finished for {domain}");
    Ok(())
}
