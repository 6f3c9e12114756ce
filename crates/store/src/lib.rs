use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use common::{Error, PriceEvent, PriceEventStore, Result, Subscriber, SubscriberSource};

/// Market the tracker watches. Stored alongside each price event.
const MARKET: &str = "futures";

/// SQLite-backed persistence for subscribers and the price-event log.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Everything the bot shows a user about their own account.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SubscriberProfile {
    pub id: i64,
    pub username: Option<String>,
    pub is_admin: bool,
    #[sqlx(rename = "notification")]
    pub notifications_enabled: bool,
    #[sqlx(rename = "percent")]
    pub alert_percent: Option<f64>,
}

#[derive(FromRow)]
struct PriceEventRow {
    id: i64,
    pair: String,
    price: f64,
    recorded_at: String,
}

impl TryFrom<PriceEventRow> for PriceEvent {
    type Error = Error;

    fn try_from(row: PriceEventRow) -> Result<Self> {
        let recorded_at = DateTime::parse_from_rfc3339(&row.recorded_at)
            .map_err(|e| Error::Database(sqlx::Error::Decode(Box::new(e))))?
            .with_timezone(&Utc);
        Ok(PriceEvent {
            id: row.id,
            pair: row.pair,
            price: row.price,
            recorded_at,
        })
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Each in-memory connection is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let store = Self::from_pool(pool);
        store.migrate().await?;
        info!(url, "Database ready");
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))
    }

    /// Add a user on first contact, or refresh their username.
    /// Returns `true` when the user was not known before.
    pub async fn register(&self, id: i64, username: Option<&str>) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO subscribers (id, username, modified_at) VALUES (?1, ?2, ?3)",
        )
        .bind(id)
        .bind(username)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !inserted {
            sqlx::query("UPDATE subscribers SET username = ?2, modified_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(username)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(id, is_new = inserted, "Subscriber registered");
        Ok(inserted)
    }

    /// Make sure `id` exists and is flagged as an admin.
    pub async fn upsert_admin(&self, id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscribers (id, is_admin, modified_at) VALUES (?1, 1, ?2)
             ON CONFLICT(id) DO UPDATE SET is_admin = 1",
        )
        .bind(id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn admin_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM subscribers WHERE is_admin = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    pub async fn profile(&self, id: i64) -> Result<Option<SubscriberProfile>> {
        let profile = sqlx::query_as::<_, SubscriberProfile>(
            "SELECT id, username, is_admin, notification, percent FROM subscribers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    /// Flip the alert switch. Returns the new state, or `None` for an unknown user.
    pub async fn toggle_notifications(&self, id: i64) -> Result<Option<bool>> {
        let enabled = sqlx::query_scalar(
            "UPDATE subscribers SET notification = NOT notification, modified_at = ?2
             WHERE id = ?1 RETURNING notification",
        )
        .bind(id)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        Ok(enabled)
    }

    /// Set the minimum hourly move the user wants to hear about.
    /// Returns `false` for an unknown user.
    pub async fn set_alert_percent(&self, id: i64, percent: f64) -> Result<bool> {
        if !percent.is_finite() || percent < 0.0 {
            return Err(Error::Validation(format!(
                "alert percent must be a non-negative number, got {percent}"
            )));
        }
        let updated = sqlx::query("UPDATE subscribers SET percent = ?2, modified_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(percent)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated == 1)
    }
}

#[async_trait]
impl PriceEventStore for SqliteStore {
    async fn last_event(&self, pair: &str) -> Result<Option<PriceEvent>> {
        let row = sqlx::query_as::<_, PriceEventRow>(
            "SELECT id, pair, price, recorded_at FROM price_events
             WHERE pair = ?1 ORDER BY id DESC LIMIT 1",
        )
        .bind(pair.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        row.map(PriceEvent::try_from).transpose()
    }

    async fn record(&self, pair: &str, price: f64, at: DateTime<Utc>) -> Result<PriceEvent> {
        let pair = pair.to_lowercase();
        let id = sqlx::query(
            "INSERT INTO price_events (pair, market, price, recorded_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&pair)
        .bind(MARKET)
        .bind(price)
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(id, pair = %pair, price, "Price event recorded");
        Ok(PriceEvent {
            id,
            pair,
            price,
            recorded_at: at,
        })
    }
}

#[async_trait]
impl SubscriberSource for SqliteStore {
    async fn enabled_subscribers(&self) -> Result<Vec<Subscriber>> {
        let rows: Vec<(i64, Option<f64>, bool)> = sqlx::query_as(
            "SELECT id, percent, notification FROM subscribers WHERE notification = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, alert_percent, notifications_enabled)| Subscriber {
                id,
                alert_percent,
                notifications_enabled,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn empty_log_has_no_last_event() {
        let store = store().await;
        assert!(store.last_event("ethusdt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_lowercases_pair_and_last_event_returns_newest() {
        let store = store().await;
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        store.record("ETHUSDT", 2000.0, t0).await.unwrap();
        let second = store.record("EthUsdt", 2050.5, t0 + Duration::hours(2)).await.unwrap();
        store.record("btcusdt", 42000.0, t0 + Duration::hours(3)).await.unwrap();

        assert_eq!(second.pair, "ethusdt");
        let last = store.last_event("ETHUSDT").await.unwrap().unwrap();
        assert_eq!(last, second);
        assert_eq!(last.recorded_at, t0 + Duration::hours(2));
    }

    #[tokio::test]
    async fn register_reports_new_users_once() {
        let store = store().await;
        assert!(store.register(7, Some("alice")).await.unwrap());
        assert!(!store.register(7, Some("alice_renamed")).await.unwrap());

        let profile = store.profile(7).await.unwrap().unwrap();
        assert_eq!(profile.username.as_deref(), Some("alice_renamed"));
        assert!(!profile.is_admin);
        assert!(!profile.notifications_enabled);
        assert_eq!(profile.alert_percent, Some(1.0));
    }

    #[tokio::test]
    async fn toggle_flips_and_feeds_enabled_subscribers() {
        let store = store().await;
        store.register(1, None).await.unwrap();
        store.register(2, None).await.unwrap();

        assert_eq!(store.toggle_notifications(1).await.unwrap(), Some(true));
        assert_eq!(store.toggle_notifications(99).await.unwrap(), None);

        let enabled = store.enabled_subscribers().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, 1);

        assert_eq!(store.toggle_notifications(1).await.unwrap(), Some(false));
        assert!(store.enabled_subscribers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn alert_percent_rejects_negative_values() {
        let store = store().await;
        store.register(3, None).await.unwrap();

        assert!(store.set_alert_percent(3, 2.5).await.unwrap());
        assert_eq!(store.profile(3).await.unwrap().unwrap().alert_percent, Some(2.5));

        let err = store.set_alert_percent(3, -1.0).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!store.set_alert_percent(404, 1.0).await.unwrap());
    }

    #[tokio::test]
    async fn null_percent_reads_as_unset() {
        let store = store().await;
        store.register(4, None).await.unwrap();
        sqlx::query("UPDATE subscribers SET percent = NULL, notification = 1 WHERE id = 4")
            .execute(store.pool())
            .await
            .unwrap();

        let subs = store.enabled_subscribers().await.unwrap();
        assert_eq!(subs[0].alert_percent, None);
        assert_eq!(subs[0].threshold(), 1.0);
    }

    #[tokio::test]
    async fn upsert_admin_promotes_existing_users() {
        let store = store().await;
        store.register(5, Some("bob")).await.unwrap();
        store.upsert_admin(5).await.unwrap();
        store.upsert_admin(6).await.unwrap();
        store.upsert_admin(6).await.unwrap();

        assert_eq!(store.admin_ids().await.unwrap(), vec![5, 6]);
        assert_eq!(
            store.profile(5).await.unwrap().unwrap().username.as_deref(),
            Some("bob")
        );
    }
}
