//! SQLite storage backend implementation
//!
//! Embedded, WAL mode for concurrent reads during writes, pooled
//! connections, schema managed by sqlx migrations. Suitable for a single
//! hub instance; ingested tables are append-only.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::{BackendHealth, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{CommodityPriceRow, MaterialType, MiningEventRow, MiningSiteRow, SiteType};

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (creating if missing) the database at `db_path` and run
    /// migrations.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_commodities(&self, rows: Vec<CommodityPriceRow>) -> StorageResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO commodity_prices (
                    commodity_name, station_name, system_name,
                    buy_price, sell_price, supply, demand, source, timestamp
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.commodity_name)
            .bind(&row.station_name)
            .bind(&row.system_name)
            .bind(row.buy_price as i64)
            .bind(row.sell_price as i64)
            .bind(row.supply as i64)
            .bind(row.demand as i64)
            .bind(&row.source)
            .bind(row.timestamp.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_mining_events(&self, rows: Vec<MiningEventRow>) -> StorageResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO mining_events (
                    system_name, body_name, material_refined, amount, source, timestamp
                )
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.system_name)
            .bind(&row.body_name)
            .bind(&row.material_refined)
            .bind(row.amount as i64)
            .bind(&row.source)
            .bind(row.timestamp.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_sites(&self, rows: Vec<MiningSiteRow>) -> StorageResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for row in rows {
            let materials = serde_json::to_string(&row.hotspot_materials)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO mining_sites (
                    system_name, body_name, site_type, material_type,
                    hotspot_materials, x, y, z, source
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.system_name)
            .bind(&row.body_name)
            .bind(row.site_type.as_str())
            .bind(row.material_type.map(|m| m.as_str()))
            .bind(materials)
            .bind(row.coordinates[0])
            .bind(row.coordinates[1])
            .bind(row.coordinates[2])
            .bind(&row.source)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn recent_commodities(&self, limit: usize) -> StorageResult<Vec<CommodityPriceRow>> {
        let rows = sqlx::query(
            r#"
            SELECT commodity_name, station_name, system_name,
                   buy_price, sell_price, supply, demand, source, timestamp
            FROM commodity_prices
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CommodityPriceRow {
                commodity_name: row.get("commodity_name"),
                station_name: row.get("station_name"),
                system_name: row.get("system_name"),
                buy_price: row.get::<i64, _>("buy_price").max(0) as u64,
                sell_price: row.get::<i64, _>("sell_price").max(0) as u64,
                supply: row.get::<i64, _>("supply").max(0) as u64,
                demand: row.get::<i64, _>("demand").max(0) as u64,
                source: row.get("source"),
                timestamp: Self::millis_to_timestamp(row.get("timestamp")),
            })
            .collect())
    }

    async fn recent_mining_events(&self, limit: usize) -> StorageResult<Vec<MiningEventRow>> {
        let rows = sqlx::query(
            r#"
            SELECT system_name, body_name, material_refined, amount, source, timestamp
            FROM mining_events
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MiningEventRow {
                system_name: row.get("system_name"),
                body_name: row.get("body_name"),
                material_refined: row.get("material_refined"),
                amount: row.get::<i64, _>("amount").max(0) as u64,
                source: row.get("source"),
                timestamp: Self::millis_to_timestamp(row.get("timestamp")),
            })
            .collect())
    }

    async fn list_sites(&self) -> StorageResult<Vec<MiningSiteRow>> {
        let rows = sqlx::query(
            r#"
            SELECT system_name, body_name, site_type, material_type,
                   hotspot_materials, x, y, z, source
            FROM mining_sites
            ORDER BY system_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let site_type_str: String = row.get("site_type");
                let site_type = SiteType::parse(&site_type_str).ok_or_else(|| {
                    StorageError::SerializationError(format!("unknown site type {site_type_str:?}"))
                })?;

                let material_type = row
                    .get::<Option<String>, _>("material_type")
                    .as_deref()
                    .and_then(MaterialType::parse);

                let materials_json: String = row.get("hotspot_materials");
                let hotspot_materials = serde_json::from_str(&materials_json)
                    .map_err(|e| StorageError::SerializationError(e.to_string()))?;

                Ok(MiningSiteRow {
                    system_name: row.get("system_name"),
                    body_name: row.get("body_name"),
                    site_type,
                    material_type,
                    hotspot_materials,
                    coordinates: [row.get("x"), row.get("y"), row.get("z")],
                    source: row.get("source"),
                })
            })
            .collect()
    }

    async fn health_check(&self) -> StorageResult<BackendHealth> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;

        Ok(BackendHealth {
            healthy: true,
            message: format!("SQLite operational at {}", self.db_path),
            connections: self.pool.size() as usize,
        })
    }

    async fn stats(&self) -> StorageResult<String> {
        let commodities: i64 = sqlx::query("SELECT COUNT(*) AS n FROM commodity_prices")
            .fetch_one(&self.pool)
            .await?
            .get("n");
        let events: i64 = sqlx::query("SELECT COUNT(*) AS n FROM mining_events")
            .fetch_one(&self.pool)
            .await?
            .get("n");

        Ok(format!(
            "SQLite ({}): {} commodity prices, {} mining events",
            self.db_path, commodities, events
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
