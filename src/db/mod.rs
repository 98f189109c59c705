use crate::error::{SourceError, SourceResult};
use crate::models::{CategoryRef, NomineeRef, UserRef, VoteRecord};
use crate::source::VoteSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{migrate::MigrateDatabase, sqlite::{SqlitePool, SqlitePoolOptions}, Row, Sqlite};
use std::collections::{BTreeSet, HashMap};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(db_url: &str) -> SourceResult<Self> {
        // SQLite needs the file before the pool can open it
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool, e.g. a single-connection in-memory pool.
    pub async fn with_pool(pool: SqlitePool) -> SourceResult<Self> {
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Tables mirror the platform's read model; created only when absent
    async fn init_schema(pool: &SqlitePool) -> SourceResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nominees (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                image_url TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nominee_categories (
                nominee_id TEXT NOT NULL,
                category_id TEXT NOT NULL,
                PRIMARY KEY (nominee_id, category_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                location TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                category_id TEXT NOT NULL,
                nominee_id TEXT NOT NULL,
                cast_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn parse_timestamp(value: &str) -> SourceResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SourceError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl VoteSource for Database {
    async fn fetch_votes(&self) -> SourceResult<Vec<VoteRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, category_id, nominee_id, cast_at
            FROM votes
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> SourceResult<VoteRecord> {
                Ok(VoteRecord {
                    vote_id: row.get::<String, _>("id"),
                    user_id: row.get::<String, _>("user_id"),
                    category_id: row.get::<String, _>("category_id"),
                    nominee_id: row.get::<String, _>("nominee_id"),
                    cast_at: parse_timestamp(&row.get::<String, _>("cast_at"))?,
                })
            })
            .collect()
    }

    async fn fetch_categories(&self) -> SourceResult<Vec<CategoryRef>> {
        let categories = sqlx::query(
            r#"
            SELECT id, name
            FROM categories
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| CategoryRef {
            category_id: row.get::<String, _>("id"),
            name: row.get::<String, _>("name"),
        })
        .collect();

        Ok(categories)
    }

    async fn fetch_nominees(&self) -> SourceResult<Vec<NomineeRef>> {
        let mut eligibility: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in sqlx::query("SELECT nominee_id, category_id FROM nominee_categories")
            .fetch_all(&self.pool)
            .await?
        {
            eligibility
                .entry(row.get::<String, _>("nominee_id"))
                .or_default()
                .insert(row.get::<String, _>("category_id"));
        }

        let nominees = sqlx::query(
            r#"
            SELECT id, name, image_url
            FROM nominees
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            let nominee_id = row.get::<String, _>("id");
            let category_ids = eligibility.remove(&nominee_id).unwrap_or_default();
            NomineeRef {
                nominee_id,
                name: row.get::<String, _>("name"),
                image_url: row.get::<Option<String>, _>("image_url"),
                category_ids,
            }
        })
        .collect();

        Ok(nominees)
    }

    async fn fetch_users(&self) -> SourceResult<Vec<UserRef>> {
        let users = sqlx::query(
            r#"
            SELECT id, location
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| UserRef {
            user_id: row.get::<String, _>("id"),
            location: row.get::<Option<String>, _>("location"),
        })
        .collect();

        Ok(users)
    }
}
