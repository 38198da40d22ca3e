//! Shared fakes for integration tests: scripted resolver and prober so no
//! test touches the network.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use v6watch_core::probe::{Probe, ProbeError, ProbeOutcome, ProtocolVersion, Scheme};
use v6watch_core::resolver::ResolveHost;

/// Resolver answering from a fixed table; unknown domains fail like NXDOMAIN.
#[derive(Default)]
pub struct TableResolver {
    table: Mutex<HashMap<String, Vec<IpAddr>>>,
}

impl TableResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, domain: &str, addrs: &[&str]) {
        self.table.lock().unwrap().insert(
            domain.to_string(),
            addrs.iter().map(|a| a.parse().unwrap()).collect(),
        );
    }
}

#[async_trait]
impl ResolveHost for TableResolver {
    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>> {
        self.table
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .ok_or_else(|| anyhow!("no such host: {domain}"))
    }
}

/// Prober scripted per (address, scheme). Tracks how many probes run at the
/// same time so tests can assert the admission bound.
pub struct CountingProber {
    outcomes: Mutex<HashMap<(IpAddr, &'static str), ProbeOutcome>>,
    delay: Duration,
    running: AtomicUsize,
    pub peak: AtomicUsize,
}

impl CountingProber {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(HashMap::new()),
            delay,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn succeed(
        &self,
        addr: &str,
        scheme: Scheme,
        version: ProtocolVersion,
        expiry: Option<DateTime<Utc>>,
    ) {
        self.outcomes.lock().unwrap().insert(
            (addr.parse().unwrap(), scheme.as_str()),
            ProbeOutcome {
                version,
                certificate_expires_at: expiry,
            },
        );
    }
}

#[async_trait]
impl Probe for CountingProber {
    async fn probe(
        &self,
        _domain: &str,
        addr: IpAddr,
        scheme: Scheme,
    ) -> Result<ProbeOutcome, ProbeError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.outcomes.lock().unwrap().get(&(addr, scheme.as_str())).copied();
        scripted.ok_or_else(|| {
            let err = reqwest::Client::new().head("not a url").build().unwrap_err();
            ProbeError::Transport(err)
        })
    }
}
