use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use super::{OrderStore, OutboxStore, UnitOfWork};
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::outbox::core::{DomainEvent, OutboxRecord, StoreError};

// ============================================================================
// Postgres Store
// ============================================================================
//
// Tables:
//
//   orders(id, customer_email, total, status, version, created_at, updated_at)
//   outbox_events(id, aggregate_id, sequence, type, occurred_at, payload,
//                 published)  UNIQUE (aggregate_id, sequence)
//
// A unit of work wraps one sqlx transaction. Dropping it without `commit`
// rolls the transaction back.
//
// ============================================================================

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id             UUID PRIMARY KEY,
        customer_email TEXT NOT NULL,
        total          NUMERIC(19, 2) NOT NULL,
        status         TEXT NOT NULL,
        version        BIGINT NOT NULL DEFAULT 0,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at     TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS outbox_events (
        id           UUID PRIMARY KEY,
        aggregate_id TEXT NOT NULL,
        sequence     BIGINT NOT NULL,
        type         TEXT NOT NULL,
        occurred_at  TIMESTAMPTZ NOT NULL,
        payload      TEXT NOT NULL,
        published    BOOLEAN NOT NULL DEFAULT FALSE,
        CONSTRAINT outbox_events_aggregate_sequence_key UNIQUE (aggregate_id, sequence)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS outbox_events_unpublished_idx
        ON outbox_events (aggregate_id, sequence)
        WHERE published = FALSE
    "#,
];

#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "✅ Connected to Postgres");
        Ok(Self::new(pool))
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        tracing::info!("✅ Schema ready (orders, outbox_events)");
        Ok(())
    }
}

/// Unique violations on either table mean another writer got there first.
fn map_write_error(err: sqlx::Error, aggregate_id: &str, expected_version: Option<i64>) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::ConcurrencyConflict {
            aggregate_id: aggregate_id.to_string(),
            expected_version,
        },
        _ => StoreError::Persistence(err),
    }
}

fn record_from_row(row: &PgRow) -> Result<OutboxRecord, StoreError> {
    Ok(OutboxRecord {
        id: row.try_get("id")?,
        aggregate_id: row.try_get("aggregate_id")?,
        sequence: row.try_get("sequence")?,
        event_type: row.try_get("type")?,
        occurred_at: row.try_get("occurred_at")?,
        payload: row.try_get("payload")?,
        published: row.try_get("published")?,
    })
}

fn order_from_row(id: OrderId, row: &PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<OrderStatus>().map_err(|e| StoreError::Corrupt {
        table: "orders",
        reason: e.to_string(),
    })?;
    let total: Decimal = row.try_get("total")?;

    Ok(Order::restore(
        id,
        row.try_get("customer_email")?,
        total,
        row.try_get("version")?,
        status,
    ))
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let aggregate_id = order.id().to_string();

        match order.persisted_version() {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO orders (id, customer_email, total, status, version, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, now(), now())
                    "#,
                )
                .bind(order.id().as_uuid())
                .bind(order.customer_email())
                .bind(order.total())
                .bind(order.status().as_str())
                .bind(order.version())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_write_error(e, &aggregate_id, None))?;
            }
            Some(expected) => {
                let result = sqlx::query(
                    r#"
                    UPDATE orders
                       SET customer_email = $2, total = $3, status = $4, version = $5, updated_at = now()
                     WHERE id = $1 AND version = $6
                    "#,
                )
                .bind(order.id().as_uuid())
                .bind(order.customer_email())
                .bind(order.total())
                .bind(order.status().as_str())
                .bind(order.version())
                .bind(expected)
                .execute(&mut *self.tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected_version: Some(expected),
                    });
                }
            }
        }

        Ok(())
    }

    async fn append(&mut self, event: &dyn DomainEvent) -> Result<Uuid, StoreError> {
        let record = OutboxRecord::from_event(event)?;

        sqlx::query(
            r#"
            INSERT INTO outbox_events (id, aggregate_id, sequence, type, occurred_at, payload, published)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            "#,
        )
        .bind(record.id)
        .bind(&record.aggregate_id)
        .bind(record.sequence)
        .bind(&record.event_type)
        .bind(record.occurred_at)
        .bind(&record.payload)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, &record.aggregate_id, Some(record.sequence - 1)))?;

        Ok(record.id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgUnitOfWork { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgOutboxStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT customer_email, total, status, version FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| order_from_row(id, &row)).transpose()
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn find_unpublished_batch(&self, limit: usize) -> Result<Vec<OutboxRecord>, StoreError> {
        // Byte-order collation keeps the ordering identical to the in-memory
        // store regardless of the database locale.
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, sequence, type, occurred_at, payload, published
              FROM outbox_events
             WHERE published = FALSE
             ORDER BY aggregate_id COLLATE "C", sequence
             LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn mark_published(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE outbox_events SET published = TRUE WHERE id = $1 AND published = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM outbox_events WHERE published = TRUE AND occurred_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// Integration Tests (need a running Postgres)
// ============================================================================
//
// DATABASE_URL=postgres://... cargo test -- --ignored
//
// ============================================================================
