//! Persistent domain capability store (SQLite via sqlx).
//!
//! One canonical row per domain. The probing core only needs get-by-key and
//! update-by-key; the extra listing queries back the CLI views.
//!
//! Writes to existing rows are funneled through the snapshot writer, so the
//! store itself needs no per-row locking.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

use crate::snapshot::{CapabilitySnapshot, Support};

/// Storage seam used by the probing core: seed reads and serialized updates.
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    /// Current stored record for a domain, if registered.
    async fn fetch(&self, domain: &str) -> Result<Option<CapabilitySnapshot>>;
    /// Update-by-key with a finished snapshot. Called only by the snapshot
    /// writer, one update at a time.
    async fn apply(&self, snapshot: &CapabilitySnapshot) -> Result<()>;
}

/// Handle to the SQLite-backed domain database.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/v6watch/domains.db`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the default domain database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("v6watch")?;
        let state_dir = xdg_dirs.get_state_home();
        tokio::fs::create_dir_all(&state_dir).await?;
        Self::open_at(&state_dir.join("domains.db")).await
    }

    /// Open (or create) a domain database at an explicit path.
    pub async fn open_at(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .with_context(|| format!("open domain database at {}", path.display()))?;

        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // Single-table schema keyed by domain. Capability flags are stored as
        // 0/1 integers, timestamps as RFC 3339 text.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domains (
                domain TEXT PRIMARY KEY,
                description TEXT NOT NULL DEFAULT '',
                address_v4 TEXT,
                address_v6 TEXT,
                http_v4 INTEGER NOT NULL DEFAULT 0,
                https_v4 INTEGER NOT NULL DEFAULT 0,
                http2_v4 INTEGER NOT NULL DEFAULT 0,
                http_v6 INTEGER NOT NULL DEFAULT 0,
                https_v6 INTEGER NOT NULL DEFAULT 0,
                http2_v6 INTEGER NOT NULL DEFAULT 0,
                first_ipv6_seen_at TEXT,
                certificate_expires_at TEXT,
                last_checked_at TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a newly registered domain. Fails if the domain already exists;
    /// callers check with [`CapabilityStore::fetch`] first to report a
    /// friendlier error.
    pub async fn insert(&self, snapshot: &CapabilitySnapshot) -> Result<()> {
        let created_at = snapshot.created_at.unwrap_or_else(Utc::now);
        sqlx::query(
            r#"
            INSERT INTO domains (
                domain, description, address_v4, address_v6,
                http_v4, https_v4, http2_v4, http_v6, https_v6, http2_v6,
                first_ipv6_seen_at, certificate_expires_at, last_checked_at,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&snapshot.domain)
        .bind(&snapshot.description)
        .bind(&snapshot.address_v4)
        .bind(&snapshot.address_v6)
        .bind(flag_to_int(snapshot.http_v4))
        .bind(flag_to_int(snapshot.https_v4))
        .bind(flag_to_int(snapshot.http2_v4))
        .bind(flag_to_int(snapshot.http_v6))
        .bind(flag_to_int(snapshot.https_v6))
        .bind(flag_to_int(snapshot.http2_v6))
        .bind(snapshot.first_ipv6_seen_at)
        .bind(snapshot.certificate_expires_at)
        .bind(snapshot.last_checked_at)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert domain {}", snapshot.domain))?;

        Ok(())
    }

    /// Permanently remove a domain row. Returns true if a row was deleted.
    pub async fn remove(&self, domain: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM domains WHERE domain = ?1")
            .bind(domain)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All registered domain names, for bulk re-checks.
    pub async fn all_domains(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT domain FROM domains ORDER BY domain")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("domain")).collect())
    }

    /// Most recently registered domains, newest first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<CapabilitySnapshot>> {
        let rows = sqlx::query(
            "SELECT * FROM domains ORDER BY created_at DESC, domain LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_snapshot).collect()
    }

    /// Domains that gained IPv6 support, most recent adopters first.
    pub async fn list_ipv6_adopters(&self, limit: u32) -> Result<Vec<CapabilitySnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM domains
            WHERE first_ipv6_seen_at IS NOT NULL
            ORDER BY first_ipv6_seen_at DESC, domain
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_snapshot).collect()
    }

    /// Domains whose certificate expires within `within_days`, soonest first.
    /// Already-expired certificates are included.
    pub async fn list_expiring(&self, within_days: i64) -> Result<Vec<CapabilitySnapshot>> {
        let cutoff = Utc::now() + Duration::days(within_days);
        let rows = sqlx::query(
            r#"
            SELECT * FROM domains
            WHERE certificate_expires_at IS NOT NULL
              AND certificate_expires_at < ?1
            ORDER BY certificate_expires_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_snapshot).collect()
    }

    /// Substring search over domain names, newest registrations first.
    pub async fn search(&self, needle: &str, limit: u32) -> Result<Vec<CapabilitySnapshot>> {
        // Escape the escape character first so user backslashes stay literal.
        let escaped = needle
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let rows = sqlx::query(
            r#"
            SELECT * FROM domains
            WHERE domain LIKE ?1 ESCAPE '\'
            ORDER BY created_at DESC, domain
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_snapshot).collect()
    }
}

#[async_trait]
impl CapabilityStore for SqliteStore {
    async fn fetch(&self, domain: &str) -> Result<Option<CapabilitySnapshot>> {
        let row = sqlx::query("SELECT * FROM domains WHERE domain = ?1")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn apply(&self, snapshot: &CapabilitySnapshot) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE domains SET
                description = ?2,
                address_v4 = ?3,
                address_v6 = ?4,
                http_v4 = ?5,
                https_v4 = ?6,
                http2_v4 = ?7,
                http_v6 = ?8,
                https_v6 = ?9,
                http2_v6 = ?10,
                first_ipv6_seen_at = ?11,
                certificate_expires_at = ?12,
                last_checked_at = ?13
            WHERE domain = ?1
            "#,
        )
        .bind(&snapshot.domain)
        .bind(&snapshot.description)
        .bind(&snapshot.address_v4)
        .bind(&snapshot.address_v6)
        .bind(flag_to_int(snapshot.http_v4))
        .bind(flag_to_int(snapshot.https_v4))
        .bind(flag_to_int(snapshot.http2_v4))
        .bind(flag_to_int(snapshot.http_v6))
        .bind(flag_to_int(snapshot.https_v6))
        .bind(flag_to_int(snapshot.http2_v6))
        .bind(snapshot.first_ipv6_seen_at)
        .bind(snapshot.certificate_expires_at)
        .bind(snapshot.last_checked_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("update domain {}", snapshot.domain))?;

        Ok(())
    }
}

fn flag_to_int(flag: Support) -> i64 {
    match flag {
        Support::Unknown => 0,
        Support::Supported => 1,
    }
}

fn flag_from_int(value: i64) -> Support {
    if value == 0 {
        Support::Unknown
    } else {
        Support::Supported
    }
}

fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> Result<CapabilitySnapshot> {
    Ok(CapabilitySnapshot {
        domain: row.try_get("domain")?,
        description: row.try_get("description")?,
        address_v4: row.try_get("address_v4")?,
        address_v6: row.try_get("address_v6")?,
        http_v4: flag_from_int(row.try_get("http_v4")?),
        https_v4: flag_from_int(row.try_get("https_v4")?),
        http2_v4: flag_from_int(row.try_get("http2_v4")?),
        http_v6: flag_from_int(row.try_get("http_v6")?),
        https_v6: flag_from_int(row.try_get("https_v6")?),
        http2_v6: flag_from_int(row.try_get("http2_v6")?),
        first_ipv6_seen_at: row.try_get::<Option<DateTime<Utc>>, _>("first_ipv6_seen_at")?,
        certificate_expires_at: row
            .try_get::<Option<DateTime<Utc>>, _>("certificate_expires_at")?,
        last_checked_at: row.try_get::<Option<DateTime<Utc>>, _>("last_checked_at")?,
        created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Open an in-memory database for tests (no disk I/O).
    async fn open_memory() -> Result<SqliteStore> {
        // Single connection so the in-memory pool never hands back a
        // different empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    fn registered(domain: &str) -> CapabilitySnapshot {
        let mut snap = CapabilitySnapshot::new(domain, "a test site");
        snap.created_at = Some(Utc::now());
        snap
    }

    #[tokio::test]
    async fn insert_fetch_roundtrip() {
        let store = open_memory().await.unwrap();
        assert!(store.fetch("example.test").await.unwrap().is_none());

        store.insert(&registered("example.test")).await.unwrap();
        let got = store.fetch("example.test").await.unwrap().unwrap();
        assert_eq!(got.domain, "example.test");
        assert_eq!(got.description, "a test site");
        assert_eq!(got.http_v4, Support::Unknown);
        assert!(got.last_checked_at.is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = open_memory().await.unwrap();
        store.insert(&registered("example.test")).await.unwrap();
        assert!(store.insert(&registered("example.test")).await.is_err());
    }

    #[tokio::test]
    async fn apply_persists_capability_changes() {
        let store = open_memory().await.unwrap();
        store.insert(&registered("example.test")).await.unwrap();

        let mut snap = store.fetch("example.test").await.unwrap().unwrap();
        snap.address_v6 = Some("2001:db8::5".to_string());
        snap.https_v6.mark_supported();
        snap.http2_v6.mark_supported();
        let now = Utc::now();
        snap.note_ipv6_seen(now);
        snap.last_checked_at = Some(now);
        store.apply(&snap).await.unwrap();

        let got = store.fetch("example.test").await.unwrap().unwrap();
        assert_eq!(got.address_v6.as_deref(), Some("2001:db8::5"));
        assert!(got.https_v6.is_supported());
        assert!(got.http2_v6.is_supported());
        assert_eq!(
            got.first_ipv6_seen_at.map(|t| t.timestamp()),
            Some(now.timestamp())
        );
    }

    #[tokio::test]
    async fn expiring_query_orders_soonest_first() {
        let store = open_memory().await.unwrap();
        for (domain, days) in [("late.test", 25i64), ("soon.test", 3), ("fine.test", 300)] {
            let mut snap = registered(domain);
            snap.certificate_expires_at = Some(Utc::now() + Duration::days(days));
            store.insert(&snap).await.unwrap();
        }

        let expiring = store.list_expiring(30).await.unwrap();
        let names: Vec<&str> = expiring.iter().map(|s| s.domain.as_str()).collect();
        assert_eq!(names, vec!["soon.test", "late.test"]);
    }

    #[tokio::test]
    async fn search_matches_substrings() {
        let store = open_memory().await.unwrap();
        store.insert(&registered("alpha.example")).await.unwrap();
        store.insert(&registered("beta.example")).await.unwrap();
        store.insert(&registered("gamma.test")).await.unwrap();

        let hits = store.search("example", 20).await.unwrap();
        assert_eq!(hits.len(), 2);
        let hits = store.search("gamma", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].domain, "gamma.test");
        assert!(store.search("nomatch", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_treats_like_metacharacters_as_literals() {
        let store = open_memory().await.unwrap();
        store.insert(&registered("a_b.test")).await.unwrap();
        store.insert(&registered("axb.test")).await.unwrap();
        store.insert(&registered("100%.test")).await.unwrap();
        store.insert(&registered(r"odd\name.test")).await.unwrap();

        // `_` must not act as a single-character wildcard.
        let hits = store.search("a_b", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].domain, "a_b.test");

        // `%` must not act as a multi-character wildcard.
        let hits = store.search("100%", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].domain, "100%.test");

        // A literal backslash matches itself instead of escaping what follows.
        let hits = store.search(r"odd\name", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].domain, r"odd\name.test");
        assert_eq!(store.search(r"\n", 20).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ipv6_adopters_excludes_unseen() {
        let store = open_memory().await.unwrap();
        let mut seen = registered("six.test");
        seen.note_ipv6_seen(Utc::now());
        store.insert(&seen).await.unwrap();
        store.insert(&registered("four.test")).await.unwrap();

        let adopters = store.list_ipv6_adopters(20).await.unwrap();
        assert_eq!(adopters.len(), 1);
        assert_eq!(adopters[0].domain, "six.test");
    }

    #[tokio::test]
    async fn remove_reports_whether_row_existed() {
        let store = open_memory().await.unwrap();
        store.insert(&registered("example.test")).await.unwrap();
        assert!(store.remove("example.test").await.unwrap());
        assert!(!store.remove("example.test").await.unwrap());
        assert!(store.fetch("example.test").await.unwrap().is_none());
    }
}
