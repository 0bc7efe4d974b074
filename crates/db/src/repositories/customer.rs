use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use crmlite_core::domain::customer::{Customer, CustomerId, CustomerInput, CustomerStatus};
use crmlite_core::domain::timestamp::{format_timestamp, now_utc, parse_stored_timestamp};

use super::{decode_error, CustomerRepository, RepositoryError};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = "id, name, phone, email, address, status, created_at";

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_customer(row: &SqliteRow) -> Result<Customer, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| decode_error("customer.id", e))?;
    let name: String = row.try_get("name").map_err(|e| decode_error("customer.name", e))?;
    let phone: String = row.try_get("phone").map_err(|e| decode_error("customer.phone", e))?;
    let email: String = row.try_get("email").map_err(|e| decode_error("customer.email", e))?;
    let address: String =
        row.try_get("address").map_err(|e| decode_error("customer.address", e))?;
    let status_str: String =
        row.try_get("status").map_err(|e| decode_error("customer.status", e))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| decode_error("customer.created_at", e))?;

    let status = status_str
        .parse::<CustomerStatus>()
        .map_err(|e| decode_error("customer.status", e))?;
    let created_at =
        parse_stored_timestamp(&created_at_str)
            .map_err(|e| decode_error("customer.created_at", e))?;

    Ok(Customer { id: CustomerId(id), name, phone, email, address, status, created_at })
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn create(&self, input: CustomerInput) -> Result<Customer, RepositoryError> {
        let created_at = now_utc();

        let result = sqlx::query(
            "INSERT INTO customer (name, phone, email, address, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(input.status.as_str())
        .bind(format_timestamp(&created_at))
        .execute(&self.pool)
        .await?;

        let id = CustomerId(result.last_insert_rowid());
        info!(
            event_name = "crm.customer.created",
            customer_id = id.0,
            status = input.status.as_str(),
            "customer created"
        );

        Ok(Customer {
            id,
            name: input.name,
            phone: input.phone,
            email: input.email,
            address: input.address,
            status: input.status,
            created_at,
        })
    }

    async fn get(&self, id: CustomerId) -> Result<Customer, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => row_to_customer(r),
            None => Err(RepositoryError::customer_not_found(id)),
        }
    }

    async fn list(&self, status: Option<CustomerStatus>) -> Result<Vec<Customer>, RepositoryError> {
        let rows: Vec<SqliteRow> = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customer
                 WHERE status = ?
                 ORDER BY created_at DESC, id DESC"
            ))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customer ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_customer).collect::<Result<Vec<_>, _>>()
    }

    async fn update(
        &self,
        id: CustomerId,
        input: CustomerInput,
    ) -> Result<Customer, RepositoryError> {
        let result = sqlx::query(
            "UPDATE customer
             SET name = ?, phone = ?, email = ?, address = ?, status = ?
             WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(input.status.as_str())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::customer_not_found(id));
        }

        info!(
            event_name = "crm.customer.updated",
            customer_id = id.0,
            status = input.status.as_str(),
            "customer updated"
        );
        self.get(id).await
    }

    async fn delete(&self, id: CustomerId) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let follow_ups_removed = sqlx::query("DELETE FROM follow_up WHERE customer_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let customers_removed = sqlx::query("DELETE FROM customer WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if customers_removed == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::customer_not_found(id));
        }

        tx.commit().await?;
        info!(
            event_name = "crm.customer.deleted",
            customer_id = id.0,
            follow_ups_removed,
            "customer deleted with owned follow-ups"
        );

        Ok(follow_ups_removed)
    }

    async fn count(&self, status: Option<CustomerStatus>) -> Result<i64, RepositoryError> {
        let count: i64 = match status {
            Some(status) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM customer WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM customer").fetch_one(&self.pool).await?
            }
        };

        Ok(count)
    }
}
