use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    engine::Engine,
    error::{Result, StoreError},
    event::{Event, EventRow},
};

#[derive(Debug, Clone)]
pub struct SqliteEngine {
    pool: SqlitePool,
}

impl SqliteEngine {
    pub fn new(pool: &SqlitePool) -> Self {
        Self { pool: pool.clone() }
    }

    async fn exists(&self, table: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

impl From<SqlitePool> for SqliteEngine {
    fn from(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_err(table: &str, err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.message().contains("no such table") {
            return StoreError::TableAbsent(table.to_owned());
        }
    }

    err.into()
}

#[async_trait]
impl Engine for SqliteEngine {
    async fn table_exists(&self, table: &'_ str) -> Result<bool> {
        self.exists(table).await
    }

    async fn create_table(&self, table: &'_ str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                "id" INTEGER PRIMARY KEY AUTOINCREMENT,
                "time" DATETIME NOT NULL,
                "context" VARCHAR(255) NOT NULL,
                "type" VARCHAR(255) NOT NULL,
                "name" VARCHAR(255) NOT NULL,
                "host" VARCHAR(255),
                "user" VARCHAR(255)
            )
            "#
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"CREATE INDEX IF NOT EXISTS "{table}_context_time_idx" ON "{table}" ("context", "time")"#
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn has_identity(&self, _table: &'_ str) -> Result<bool> {
        // every sqlite table without `WITHOUT ROWID` carries the implicit rowid
        Ok(true)
    }

    async fn add_identity(&self, _table: &'_ str) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, table: &'_ str, events: Vec<Event>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for events in events.chunks(100) {
            let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                r#"INSERT INTO "{table}" ("time", "context", "type", "name", "host", "user") "#
            ));

            query_builder.push_values(events, |mut b, event| {
                b.push_bind(event.time)
                    .push_bind(event.context.to_owned())
                    .push_bind(event.kind.as_str())
                    .push_bind(event.name.to_owned())
                    .push_bind(event.host.clone())
                    .push_bind(event.user.clone());
            });

            query_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|err| map_err(table, err))?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn read(&self, table: &'_ str, context: &'_ str) -> Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT rowid AS "id", "time", "context", "type", "name", "host", "user"
            FROM "{table}"
            WHERE "context" = ?1
            ORDER BY "time" ASC, rowid ASC
            "#
        ))
        .bind(context)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_err(table, err))?;

        rows.into_iter().map(Event::try_from).collect()
    }

    async fn read_legacy(&self, table: &'_ str, key: &'_ str) -> Result<Option<String>> {
        if !self.exists(table).await? {
            return Ok(None);
        }

        let value = sqlx::query_scalar::<_, Option<String>>(&format!(
            r#"SELECT "value" FROM "{table}" WHERE "key" = ?1 LIMIT 1"#
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.flatten())
    }
}
