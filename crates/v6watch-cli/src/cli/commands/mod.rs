//! One handler module per subcommand, plus shared output helpers.

mod add;
mod check;
mod expiring;
mod init;
mod remove;
mod search;
mod status;

pub use add::run_add;
pub use check::{run_check, run_check_all};
pub use expiring::run_expiring;
pub use init::run_init;
pub use remove::run_remove;
pub use search::run_search;
pub use status::run_status;

use chrono::{DateTime, Utc};
use v6watch_core::probe::AddressFamily;
use v6watch_core::snapshot::CapabilitySnapshot;

/// Compact capability summary for one address family, e.g. "http,tls,h2".
pub(crate) fn caps_summary(snap: &CapabilitySnapshot, family: AddressFamily) -> String {
    let (http, https, http2) = match family {
        AddressFamily::V4 => (snap.http_v4, snap.https_v4, snap.http2_v4),
        AddressFamily::V6 => (snap.http_v6, snap.https_v6, snap.http2_v6),
    };
    let mut parts = Vec::new();
    if http.is_supported() {
        parts.push("http");
    }
    if https.is_supported() {
        parts.push("tls");
    }
    if http2.is_supported() {
        parts.push("h2");
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(",")
    }
}

pub(crate) fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Print one domain row in the shared listing layout.
pub(crate) fn print_row(snap: &CapabilitySnapshot) {
    println!(
        "{:<28} {:<16} {:<26} {:<14} {:<14} {}",
        snap.domain,
        snap.address_v4.as_deref().unwrap_or("-"),
        snap.address_v6.as_deref().unwrap_or("-"),
        caps_summary(snap, AddressFamily::V4),
        caps_summary(snap, AddressFamily::V6),
        format_time(snap.last_checked_at),
    );
}

pub(crate) fn print_header() {
    println!(
        "{:<28} {:<16} {:<26} {:<14} {:<14} {}",
        "DOMAIN", "IPV4", "IPV6", "V4 CAPS", "V6 CAPS", "CHECKED"
    );
}
