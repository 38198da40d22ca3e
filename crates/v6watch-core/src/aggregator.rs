//! Capability aggregation: resolve a domain, fan probes out across every
//! {address, scheme} combination, and fold the evidence into a snapshot.
//!
//! Probing is deliberately brute-force. The goal is capability discovery, so
//! a failure on one combination must never suppress detection on another,
//! and a run only ever accumulates positive evidence.

use chrono::Utc;

use crate::probe::{AddressFamily, Probe, ProbeOutcome, ProtocolVersion, Scheme};
use crate::resolver::ResolveHost;
use crate::snapshot::CapabilitySnapshot;

/// Run one capability check for a domain.
///
/// `seed` is the domain's current stored record, so write-once fields and
/// previously observed flags carry through. If resolution fails or yields no
/// addresses, the seed is returned untouched: still a completed run, just
/// one with no evidence, and `last_checked_at` is not stamped.
pub async fn run_check(
    resolver: &dyn ResolveHost,
    prober: &dyn Probe,
    seed: CapabilitySnapshot,
) -> CapabilitySnapshot {
    let mut snapshot = seed;
    let domain = snapshot.domain.clone();

    let addrs = match resolver.lookup(&domain).await {
        Ok(addrs) if !addrs.is_empty() => addrs,
        Ok(_) => {
            tracing::info!(domain, "resolved zero addresses, skipping probes");
            return snapshot;
        }
        Err(err) => {
            tracing::info!(domain, %err, "resolution failed, skipping probes");
            return snapshot;
        }
    };

    for addr in addrs {
        let family = AddressFamily::of(addr);
        // Most recent address seen per family, in resolved order.
        match family {
            AddressFamily::V4 => snapshot.address_v4 = Some(addr.to_string()),
            AddressFamily::V6 => snapshot.address_v6 = Some(addr.to_string()),
        }

        for scheme in [Scheme::Http, Scheme::Https] {
            match prober.probe(&domain, addr, scheme).await {
                Ok(outcome) => fold_evidence(&mut snapshot, family, scheme, &outcome),
                Err(err) => {
                    // No evidence, not an error: the flag stays as-is and
                    // sibling probes continue.
                    tracing::debug!(
                        domain,
                        %addr,
                        scheme = scheme.as_str(),
                        %err,
                        "probe produced no evidence"
                    );
                }
            }
        }
    }

    snapshot.last_checked_at = Some(Utc::now());
    snapshot
}

/// Fold one successful probe into the snapshot.
fn fold_evidence(
    snapshot: &mut CapabilitySnapshot,
    family: AddressFamily,
    scheme: Scheme,
    outcome: &ProbeOutcome,
) {
    if family == AddressFamily::V6 {
        snapshot.note_ipv6_seen(Utc::now());
    }

    match (scheme, family) {
        (Scheme::Http, AddressFamily::V4) => snapshot.http_v4.mark_supported(),
        (Scheme::Http, AddressFamily::V6) => snapshot.http_v6.mark_supported(),
        (Scheme::Https, AddressFamily::V4) => {
            snapshot.https_v4.mark_supported();
            if outcome.version == ProtocolVersion::Http2 {
                snapshot.http2_v4.mark_supported();
            }
        }
        (Scheme::Https, AddressFamily::V6) => {
            snapshot.https_v6.mark_supported();
            if outcome.version == ProtocolVersion::Http2 {
                snapshot.http2_v6.mark_supported();
            }
        }
    }

    // Last successful https probe wins, in probe processing order. This
    // mirrors the long-standing observed behavior; see DESIGN.md.
    if scheme == Scheme::Https {
        if let Some(expiry) = outcome.certificate_expires_at {
            snapshot.certificate_expires_at = Some(expiry);
        }
    }
}
