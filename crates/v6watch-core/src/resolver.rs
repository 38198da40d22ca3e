//! DNS resolution seam for the aggregator.
//!
//! The core only needs "domain in, address list out"; the production
//! implementation delegates to the system resolver via tokio.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::IpAddr;

/// Resolver collaborator. A failed lookup or an empty list both terminate a
/// check run early; callers decide which, so empty results are not an error.
#[async_trait]
pub trait ResolveHost: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>>;
}

/// System resolver backed by `tokio::net::lookup_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl ResolveHost for SystemResolver {
    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>> {
        // lookup_host wants a port; it is discarded from the results.
        let addrs = tokio::net::lookup_host((domain, 0))
            .await
            .with_context(|| format!("resolve {domain}"))?
            .map(|sock| sock.ip())
            .collect();
        Ok(addrs)
    }
}
