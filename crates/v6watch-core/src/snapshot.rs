//! Per-domain capability snapshot: which network/protocol features were
//! observed as supported, per address family.
//!
//! A snapshot is seeded from the stored record at the start of a check run,
//! mutated in place as probes complete, then handed once to the snapshot
//! writer and discarded.

use chrono::{DateTime, Utc};

/// Tri-state capability flag. Stays `Unknown` until a successful probe marks
/// it `Supported`; a run only ever has positive evidence, so the transition
/// is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Support {
    #[default]
    Unknown,
    Supported,
}

impl Support {
    /// One-way transition: never downgrades `Supported` back to `Unknown`.
    pub fn mark_supported(&mut self) {
        *self = Support::Supported;
    }

    pub fn is_supported(self) -> bool {
        matches!(self, Support::Supported)
    }
}

/// Capability record for one domain, one canonical row per domain in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySnapshot {
    /// Identity key; immutable for the lifetime of the record.
    pub domain: String,
    /// Free-text description captured at registration.
    pub description: String,
    /// Last-observed resolved address per family.
    pub address_v4: Option<String>,
    pub address_v6: Option<String>,
    pub http_v4: Support,
    pub https_v4: Support,
    pub http2_v4: Support,
    pub http_v6: Support,
    pub https_v6: Support,
    pub http2_v6: Support,
    /// First time any IPv6 probe succeeded for this domain. Write-once: a run
    /// that finds no IPv6 support must not clear a previously recorded value.
    pub first_ipv6_seen_at: Option<DateTime<Utc>>,
    /// Expiry of peer certificate material seen during the run.
    pub certificate_expires_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CapabilitySnapshot {
    pub fn new(domain: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            description: description.into(),
            address_v4: None,
            address_v6: None,
            http_v4: Support::Unknown,
            https_v4: Support::Unknown,
            http2_v4: Support::Unknown,
            http_v6: Support::Unknown,
            https_v6: Support::Unknown,
            http2_v6: Support::Unknown,
            first_ipv6_seen_at: None,
            certificate_expires_at: None,
            last_checked_at: None,
            created_at: None,
        }
    }

    /// Record the moment IPv6 support was first observed. Later calls are
    /// no-ops so the adoption timestamp survives every subsequent run.
    pub fn note_ipv6_seen(&mut self, now: DateTime<Utc>) {
        if self.first_ipv6_seen_at.is_none() {
            self.first_ipv6_seen_at = Some(now);
        }
    }

    /// True if any IPv6-side capability has been observed.
    pub fn supports_ipv6(&self) -> bool {
        self.address_v6.is_some()
            || self.http_v6.is_supported()
            || self.https_v6.is_supported()
    }
}
