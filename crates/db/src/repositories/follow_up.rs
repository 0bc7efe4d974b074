use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use crmlite_core::domain::customer::{CustomerId, CustomerStatus};
use crmlite_core::domain::follow_up::{FollowUp, FollowUpId, FollowUpInput, ScheduledFollowUp};
use crmlite_core::domain::timestamp::{
    format_timestamp, now_utc, parse_stored_timestamp, storage_precision,
};

use super::{decode_error, FollowUpRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFollowUpRepository {
    pool: DbPool,
}

impl SqlFollowUpRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn ensure_customer_exists(&self, customer_id: CustomerId) -> Result<(), RepositoryError> {
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customer WHERE id = ?)")
            .bind(customer_id.0)
            .fetch_one(&self.pool)
            .await?;

        if exists == 0 {
            return Err(RepositoryError::customer_not_found(customer_id));
        }
        Ok(())
    }
}

fn parse_column(row: &SqliteRow, column: &'static str) -> Result<DateTime<Utc>, RepositoryError> {
    let raw: String = row.try_get(column).map_err(|e| decode_error(column, e))?;
    parse_stored_timestamp(&raw).map_err(|e| decode_error(column, e))
}

fn row_to_follow_up(row: &SqliteRow) -> Result<FollowUp, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| decode_error("follow_up.id", e))?;
    let customer_id: i64 =
        row.try_get("customer_id").map_err(|e| decode_error("follow_up.customer_id", e))?;
    let note: String = row.try_get("note").map_err(|e| decode_error("follow_up.note", e))?;
    let next_raw: Option<String> = row
        .try_get("next_follow_up_date")
        .map_err(|e| decode_error("follow_up.next_follow_up_date", e))?;

    let next_follow_up_date = next_raw
        .map(|raw| parse_stored_timestamp(&raw))
        .transpose()
        .map_err(|e| decode_error("follow_up.next_follow_up_date", e))?;

    Ok(FollowUp {
        id: FollowUpId(id),
        customer_id: CustomerId(customer_id),
        note,
        follow_up_date: parse_column(row, "follow_up_date")?,
        next_follow_up_date,
        created_at: parse_column(row, "created_at")?,
    })
}

fn row_to_scheduled(row: &SqliteRow) -> Result<ScheduledFollowUp, RepositoryError> {
    let customer_name: String =
        row.try_get("customer_name").map_err(|e| decode_error("customer.name", e))?;
    let customer_phone: String =
        row.try_get("customer_phone").map_err(|e| decode_error("customer.phone", e))?;
    let customer_email: String =
        row.try_get("customer_email").map_err(|e| decode_error("customer.email", e))?;
    let status_str: String =
        row.try_get("customer_status").map_err(|e| decode_error("customer.status", e))?;

    Ok(ScheduledFollowUp {
        follow_up: row_to_follow_up(row)?,
        customer_name,
        customer_phone,
        customer_email,
        customer_status: status_str
            .parse::<CustomerStatus>()
            .map_err(|e| decode_error("customer.status", e))?,
    })
}

#[async_trait::async_trait]
impl FollowUpRepository for SqlFollowUpRepository {
    async fn create(&self, input: FollowUpInput) -> Result<FollowUp, RepositoryError> {
        let created_at = now_utc();
        let follow_up_date = storage_precision(input.follow_up_date);
        let next_follow_up_date = input.next_follow_up_date.map(storage_precision);

        let mut tx = self.pool.begin().await?;

        let owner_exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customer WHERE id = ?)")
                .bind(input.customer_id.0)
                .fetch_one(&mut *tx)
                .await?;
        if owner_exists == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::customer_not_found(input.customer_id));
        }

        let result = sqlx::query(
            "INSERT INTO follow_up (customer_id, note, follow_up_date, next_follow_up_date, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(input.customer_id.0)
        .bind(&input.note)
        .bind(format_timestamp(&follow_up_date))
        .bind(next_follow_up_date.as_ref().map(format_timestamp))
        .bind(format_timestamp(&created_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let id = FollowUpId(result.last_insert_rowid());
        info!(
            event_name = "crm.follow_up.created",
            follow_up_id = id.0,
            customer_id = input.customer_id.0,
            "follow-up recorded"
        );

        Ok(FollowUp {
            id,
            customer_id: input.customer_id,
            note: input.note,
            follow_up_date,
            next_follow_up_date,
            created_at,
        })
    }

    async fn list_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<FollowUp>, RepositoryError> {
        self.ensure_customer_exists(customer_id).await?;

        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT id, customer_id, note, follow_up_date, next_follow_up_date, created_at
             FROM follow_up
             WHERE customer_id = ?
             ORDER BY follow_up_date DESC, id DESC",
        )
        .bind(customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_follow_up).collect::<Result<Vec<_>, _>>()
    }

    async fn list_scheduled_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduledFollowUp>, RepositoryError> {
        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT f.id, f.customer_id, f.note, f.follow_up_date, f.next_follow_up_date,
                    f.created_at,
                    c.name AS customer_name, c.phone AS customer_phone,
                    c.email AS customer_email, c.status AS customer_status
             FROM follow_up f
             JOIN customer c ON c.id = f.customer_id
             WHERE f.follow_up_date >= ? AND f.follow_up_date <= ?
             ORDER BY f.follow_up_date DESC, f.id DESC",
        )
        .bind(format_timestamp(&storage_precision(start)))
        .bind(format_timestamp(&storage_precision(end)))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_scheduled).collect::<Result<Vec<_>, _>>()
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM follow_up").fetch_one(&self.pool).await?;
        Ok(count)
    }
}
