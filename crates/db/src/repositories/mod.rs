use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crmlite_core::domain::customer::{Customer, CustomerId, CustomerInput, CustomerStatus};
use crmlite_core::domain::follow_up::{FollowUp, FollowUpInput, ScheduledFollowUp};
use crmlite_core::domain::user::User;
use crmlite_core::errors::{ApplicationError, DomainError};

pub mod customer;
pub mod follow_up;
pub mod memory;
pub mod user;

pub use customer::SqlCustomerRepository;
pub use follow_up::SqlFollowUpRepository;
pub use memory::InMemoryCrmStore;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{entity} `{key}` already exists")]
    Conflict { entity: &'static str, key: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepositoryError {
    pub fn customer_not_found(id: CustomerId) -> Self {
        Self::NotFound { entity: "customer", id: id.0 }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepositoryError::Domain(error) => Self::Domain(error),
            other => Self::Persistence(other.to_string()),
        }
    }
}

pub(crate) fn decode_error(context: &str, error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(format!("{context}: {error}"))
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn create(&self, input: CustomerInput) -> Result<Customer, RepositoryError>;

    async fn get(&self, id: CustomerId) -> Result<Customer, RepositoryError>;

    /// Newest first. `None` lists every customer regardless of status.
    async fn list(&self, status: Option<CustomerStatus>) -> Result<Vec<Customer>, RepositoryError>;

    /// Replaces every mutable field; identifier and creation time are kept.
    async fn update(
        &self,
        id: CustomerId,
        input: CustomerInput,
    ) -> Result<Customer, RepositoryError>;

    /// Removes the customer and every follow-up it owns, returning how many
    /// follow-ups went with it.
    async fn delete(&self, id: CustomerId) -> Result<u64, RepositoryError>;

    async fn count(&self, status: Option<CustomerStatus>) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait FollowUpRepository: Send + Sync {
    /// Fails with `NotFound` when the owning customer does not exist.
    async fn create(&self, input: FollowUpInput) -> Result<FollowUp, RepositoryError>;

    /// Latest follow-up date first. Fails with `NotFound` for an unknown customer.
    async fn list_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<FollowUp>, RepositoryError>;

    /// Follow-ups dated within `[start, end]`, both inclusive, joined with
    /// their owning customer.
    async fn list_scheduled_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduledFollowUp>, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    async fn create(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError>;

    async fn record_login(&self, user: &User, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}
