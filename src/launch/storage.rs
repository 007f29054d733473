//! Local persistence for tracked launches.

use crate::launch::types::{SocialMetrics, TokenLaunch};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use tracing::{debug, info};

/// Contract for launch persistence. Launches are keyed by symbol.
#[async_trait]
pub trait LaunchStorage: Send + Sync {
    /// Insert or replace launches. Returns the number written.
    async fn upsert_launches(&self, launches: &[TokenLaunch]) -> Result<usize>;

    /// All stored launches, soonest first.
    async fn get_launches(&self) -> Result<Vec<TokenLaunch>>;

    async fn get_launch(&self, symbol: &str) -> Result<Option<TokenLaunch>>;

    async fn launch_count(&self) -> Result<i64>;

    async fn health_check(&self) -> Result<bool>;
}

#[derive(FromRow)]
struct LaunchRow {
    name: String,
    symbol: String,
    launch_time: String,
    platform: String,
    initial_market_cap: f64,
    description: String,
    telegram_members: i64,
    twitter_followers: i64,
    audit_status: bool,
    kyc_status: bool,
    potential_score: f64,
}

impl LaunchRow {
    fn into_launch(self) -> Result<TokenLaunch> {
        let launch_time = DateTime::parse_from_rfc3339(&self.launch_time)
            .with_context(|| format!("Bad launch_time stored for {}", self.symbol))?
            .with_timezone(&Utc);

        Ok(TokenLaunch {
            name: self.name,
            symbol: self.symbol,
            launch_time,
            platform: self.platform,
            initial_market_cap: self.initial_market_cap,
            description: self.description,
            social_metrics: SocialMetrics {
                telegram: self.telegram_members.max(0) as u64,
                twitter: self.twitter_followers.max(0) as u64,
            },
            audit_status: self.audit_status,
            kyc_status: self.kyc_status,
            potential_score: self.potential_score,
        })
    }
}

const SELECT_LAUNCH: &str = r#"
    SELECT name, symbol, launch_time, platform, initial_market_cap, description,
           telegram_members, twitter_followers, audit_status, kyc_status, potential_score
    FROM coin_launches
"#;

/// SQLite-backed [`LaunchStorage`].
pub struct SqliteLaunchStore {
    pool: Pool<Sqlite>,
}

impl SqliteLaunchStore {
    /// Connect and create the schema. `sqlite::memory:` gives a private
    /// in-memory database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        // Every connection to :memory: is a separate database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to SQLite database {}", database_url))?;

        Self::create_schema(&pool).await?;

        info!("SqliteLaunchStore initialized and connected to {}", database_url);
        Ok(Self { pool })
    }

    async fn create_schema(pool: &Pool<Sqlite>) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coin_launches (
                symbol TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                launch_time TEXT NOT NULL,
                platform TEXT NOT NULL,
                initial_market_cap REAL NOT NULL,
                description TEXT NOT NULL,
                telegram_members INTEGER NOT NULL,
                twitter_followers INTEGER NOT NULL,
                audit_status BOOLEAN NOT NULL,
                kyc_status BOOLEAN NOT NULL,
                potential_score REAL NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create coin_launches table")?;

        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl LaunchStorage for SqliteLaunchStore {
    async fn upsert_launches(&self, launches: &[TokenLaunch]) -> Result<usize> {
        let updated_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        for launch in launches {
            sqlx::query(
                r#"
                INSERT INTO coin_launches (
                    symbol, name, launch_time, platform, initial_market_cap, description,
                    telegram_members, twitter_followers, audit_status, kyc_status,
                    potential_score, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol) DO UPDATE SET
                    name = excluded.name,
                    launch_time = excluded.launch_time,
                    platform = excluded.platform,
                    initial_market_cap = excluded.initial_market_cap,
                    description = excluded.description,
                    telegram_members = excluded.telegram_members,
                    twitter_followers = excluded.twitter_followers,
                    audit_status = excluded.audit_status,
                    kyc_status = excluded.kyc_status,
                    potential_score = excluded.potential_score,
                    updated_at = excluded.updated_at;
                "#,
            )
            .bind(&launch.symbol)
            .bind(&launch.name)
            .bind(launch.launch_time.to_rfc3339())
            .bind(&launch.platform)
            .bind(launch.initial_market_cap)
            .bind(&launch.description)
            .bind(i64::try_from(launch.social_metrics.telegram).unwrap_or(i64::MAX))
            .bind(i64::try_from(launch.social_metrics.twitter).unwrap_or(i64::MAX))
            .bind(launch.audit_status)
            .bind(launch.kyc_status)
            .bind(launch.potential_score)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to store launch {}", launch.symbol))?;
        }

        tx.commit().await.context("Failed to commit launches")?;

        debug!("Stored {} launches", launches.len());
        Ok(launches.len())
    }

    async fn get_launches(&self) -> Result<Vec<TokenLaunch>> {
        let rows: Vec<LaunchRow> =
            sqlx::query_as(&format!("{} ORDER BY launch_time ASC, symbol ASC", SELECT_LAUNCH))
                .fetch_all(&self.pool)
                .await
                .context("Failed to load launches")?;

        rows.into_iter().map(LaunchRow::into_launch).collect()
    }

    async fn get_launch(&self, symbol: &str) -> Result<Option<TokenLaunch>> {
        let row: Option<LaunchRow> = sqlx::query_as(&format!("{} WHERE symbol = ?", SELECT_LAUNCH))
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load launch")?;

        row.map(LaunchRow::into_launch).transpose()
    }

    async fn launch_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coin_launches")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count launches")?;

        Ok(count.0)
    }

    async fn health_check(&self) -> Result<bool> {
        let result = sqlx::query("SELECT 1").fetch_one(&self.pool).await;
        Ok(result.is_ok())
    }
}
