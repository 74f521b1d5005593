use crate::types::{Credential, PublishedSnapshot, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Where a pool username stands in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    Unclaimed,
    /// Reserved, registration in flight or interrupted.
    Provisioning,
    Claimed(Credential),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Reserved,
    AlreadyClaimed,
}

/// Durable record of published URLs, pool identities, off-topic URLs and
/// source cursors, all kept in one SQLite file.
pub struct Ledger {
    db: SqlitePool,
}

impl Ledger {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let db = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!("Opened ledger at {}", path.display());
        Self::with_pool(db).await
    }

    /// Ledger that lives as long as the value, for tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is a separate database, so pin exactly one.
        let db = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(db).await
    }

    async fn with_pool(db: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&db).await?;
        Ok(Self { db })
    }

    pub async fn has_posted(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM posted_urls WHERE url = ?1")
            .bind(url)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    /// Record a URL as published. Call only after the publish call succeeded.
    pub async fn mark_posted(&self, url: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("INSERT INTO posted_urls (url) VALUES (?1) ON CONFLICT(url) DO NOTHING")
            .bind(url)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!("Marked as posted: {}", url);
        Ok(())
    }

    /// Re-write the upstream corpus into the posted set, returning how many
    /// URLs were not known yet.
    pub async fn record_published(&self, snapshot: &PublishedSnapshot) -> Result<usize> {
        let mut tx = self.db.begin().await?;
        let mut added = 0;

        for item in snapshot.items() {
            if item.url.trim().is_empty() {
                continue;
            }
            let result = sqlx::query("INSERT INTO posted_urls (url) VALUES (?1) ON CONFLICT(url) DO NOTHING")
                .bind(&item.url)
                .execute(&mut *tx)
                .await?;
            added += result.rows_affected() as usize;
        }

        tx.commit().await?;
        info!("Synced {} published items into ledger ({} new)", snapshot.len(), added);
        Ok(added)
    }

    pub async fn identity_state(&self, username: &str) -> Result<IdentityState> {
        let row = sqlx::query("SELECT credential FROM identities WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        let state = match row {
            None => IdentityState::Unclaimed,
            Some(row) => match row.try_get::<Option<String>, _>("credential")? {
                Some(token) if !token.is_empty() => IdentityState::Claimed(Credential::new(token)),
                _ => IdentityState::Provisioning,
            },
        };
        Ok(state)
    }

    pub async fn cached_credential(&self, username: &str) -> Result<Option<Credential>> {
        match self.identity_state(username).await? {
            IdentityState::Claimed(credential) => Ok(Some(credential)),
            _ => Ok(None),
        }
    }

    /// Claim a username for registration. The check and the placeholder write
    /// happen in one transaction so two callers never both get `Reserved`.
    pub async fn reserve_identity(&self, username: &str) -> Result<Reservation> {
        let mut tx = self.db.begin().await?;

        let existing = sqlx::query("SELECT username FROM identities WHERE username = ?1")
            .bind(username)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Ok(Reservation::AlreadyClaimed);
        }

        let inserted = sqlx::query(
            "INSERT INTO identities (username, credential) VALUES (?1, NULL) ON CONFLICT(username) DO NOTHING",
        )
        .bind(username)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if inserted.rows_affected() == 1 {
            debug!("Reserved identity {}", username);
            Ok(Reservation::Reserved)
        } else {
            Ok(Reservation::AlreadyClaimed)
        }
    }

    /// Store the credential returned by a registration. Only fills a
    /// placeholder; returns false when a credential was already present.
    pub async fn store_registered_credential(&self, username: &str, credential: &Credential) -> Result<bool> {
        let mut tx = self.db.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET credential = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE username = ?1 AND credential IS NULL
            "#,
        )
        .bind(username)
        .bind(credential.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    /// Replace the cached credential with one obtained from a login.
    pub async fn refresh_credential(&self, username: &str, credential: &Credential) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO identities (username, credential) VALUES (?1, ?2)
            ON CONFLICT(username) DO UPDATE SET
                credential = EXCLUDED.credential,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
        )
        .bind(username)
        .bind(credential.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn is_rejected(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM rejected_urls WHERE url = ?1")
            .bind(url)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    pub async fn mark_rejected(&self, url: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("INSERT INTO rejected_urls (url) VALUES (?1) ON CONFLICT(url) DO NOTHING")
            .bind(url)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn cursor(&self, source: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM source_cursors WHERE source = ?1")
            .bind(source)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn set_cursor(&self, source: &str, value: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO source_cursors (source, value) VALUES (?1, ?2)
            ON CONFLICT(source) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
        )
        .bind(source)
        .bind(value)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
