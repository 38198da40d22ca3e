//! Protocol probing: one bounded HEAD request over a forced address family.
//!
//! The client is pinned to a single resolved address, so a lookup-then-connect
//! step can never silently fall back to the other family. Redirects are not
//! followed: a redirect response is itself evidence of protocol support.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on total request time for a single probe. Exceeding it is a
/// [`ProbeError`], not a crash.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Application-layer protocol dimension probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Probe target URL for a domain, e.g. `https://example.test`.
    pub fn url_for(self, domain: &str) -> String {
        format!("{}://{}", self.as_str(), domain)
    }
}

/// Address family a probe is forced to isolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

/// Negotiated HTTP protocol version, reduced to the distinction the
/// capability record cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    Http1,
    Http2,
}

impl From<reqwest::Version> for ProtocolVersion {
    fn from(v: reqwest::Version) -> Self {
        if v == reqwest::Version::HTTP_2 {
            ProtocolVersion::Http2
        } else {
            ProtocolVersion::Http1
        }
    }
}

/// Successful probe evidence: the negotiated protocol and, for https, the
/// latest expiry among the peer certificates the TLS layer exposed.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub version: ProtocolVersion,
    pub certificate_expires_at: Option<DateTime<Utc>>,
}

/// Why a single probe produced no evidence. The aggregator absorbs these
/// silently; they exist so callers can log the distinction.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Client could not be built (bad domain, TLS backend setup).
    #[error("probe client setup: {0}")]
    Client(#[source] reqwest::Error),
    /// Connection, handshake, or timeout failure during the request.
    #[error("probe transport: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Probe seam: lets the aggregator run against a scripted fake in tests.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(
        &self,
        domain: &str,
        addr: IpAddr,
        scheme: Scheme,
    ) -> Result<ProbeOutcome, ProbeError>;
}

/// Production prober: reqwest with rustls, one client per probe so each
/// request dials exactly the pinned address.
#[derive(Debug, Clone)]
pub struct HttpProber {
    timeout: Duration,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(
        &self,
        domain: &str,
        addr: IpAddr,
        scheme: Scheme,
    ) -> Result<ProbeOutcome, ProbeError> {
        let client = reqwest::Client::builder()
            // Port 0 means "use the scheme's conventional port".
            .resolve(domain, SocketAddr::new(addr, 0))
            .redirect(reqwest::redirect::Policy::none())
            .timeout(self.timeout)
            .use_rustls_tls()
            .tls_info(true)
            .build()
            .map_err(ProbeError::Client)?;

        let response = client
            .head(scheme.url_for(domain))
            .send()
            .await
            .map_err(ProbeError::Transport)?;

        // Any response is evidence the protocol is spoken, including
        // redirects and error statuses.
        let version = ProtocolVersion::from(response.version());
        let certificate_expires_at = latest_expiry(
            response
                .extensions()
                .get::<reqwest::tls::TlsInfo>()
                .and_then(|info| info.peer_certificate())
                .into_iter()
                .filter_map(parse_not_after),
        );

        tracing::debug!(
            domain,
            %addr,
            scheme = scheme.as_str(),
            ?version,
            "probe succeeded"
        );

        Ok(ProbeOutcome {
            version,
            certificate_expires_at,
        })
    }
}

/// `NotAfter` of a DER-encoded certificate. Unparseable certificate material
/// is logged and treated as absent rather than failing the probe.
fn parse_not_after(der: &[u8]) -> Option<DateTime<Utc>> {
    match x509_parser::parse_x509_certificate(der) {
        Ok((_, cert)) => DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0),
        Err(err) => {
            tracing::warn!(%err, "unparseable peer certificate");
            None
        }
    }
}

/// Latest `NotAfter` among the certificates one probe presented.
fn latest_expiry(expiries: impl Iterator<Item = DateTime<Utc>>) -> Option<DateTime<Utc>> {
    expiries.max()
}
