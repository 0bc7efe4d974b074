//! Session-gated entry points for every CRM operation the pages expose.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crmlite_core::auth::{placeholder_hash, verify_password};
use crmlite_core::domain::customer::{Customer, CustomerFields, CustomerId, CustomerStatus};
use crmlite_core::domain::dashboard::DashboardSummary;
use crmlite_core::domain::follow_up::{FollowUp, FollowUpFields};
use crmlite_core::errors::ApplicationError;
use crmlite_db::repositories::{
    CustomerRepository, FollowUpRepository, InMemoryCrmStore, SqlCustomerRepository,
    SqlFollowUpRepository, SqlUserRepository, UserRepository,
};
use crmlite_db::{DashboardAggregator, DbPool};

use crate::session::{Session, SessionStore, SessionToken};

/// Checks a submitted password against a stored PHC hash.
pub type PasswordCheck = fn(&str, &str) -> bool;

pub struct CrmBoundary {
    sessions: Arc<SessionStore>,
    check_password: PasswordCheck,
    customers: Arc<dyn CustomerRepository>,
    follow_ups: Arc<dyn FollowUpRepository>,
    users: Arc<dyn UserRepository>,
    dashboard: DashboardAggregator<dyn CustomerRepository, dyn FollowUpRepository>,
}

impl CrmBoundary {
    pub fn new(
        sessions: Arc<SessionStore>,
        customers: Arc<dyn CustomerRepository>,
        follow_ups: Arc<dyn FollowUpRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        let dashboard = DashboardAggregator::new(customers.clone(), follow_ups.clone());
        Self {
            sessions,
            check_password: verify_password,
            customers,
            follow_ups,
            users,
            dashboard,
        }
    }

    pub fn with_password_check(mut self, check_password: PasswordCheck) -> Self {
        self.check_password = check_password;
        self
    }

    pub fn with_pool(pool: DbPool, sessions: Arc<SessionStore>) -> Self {
        Self::new(
            sessions,
            Arc::new(SqlCustomerRepository::new(pool.clone())),
            Arc::new(SqlFollowUpRepository::new(pool.clone())),
            Arc::new(SqlUserRepository::new(pool)),
        )
    }

    pub fn in_memory(store: Arc<InMemoryCrmStore>, sessions: Arc<SessionStore>) -> Self {
        Self::new(sessions, store.clone(), store.clone(), store)
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<SessionToken, ApplicationError> {
        let username = username.trim();
        let found = self.users.find_by_username(username).await?;

        // Unknown users still pay for a full verification.
        let stored_hash =
            found.as_ref().map_or(placeholder_hash(), |user| user.password_hash.as_str());
        let verified = (self.check_password)(password.expose_secret(), stored_hash);

        let user = match found {
            Some(user) if user.is_active && verified => user,
            _ => {
                warn!(event_name = "crm.auth.rejected", username, "sign-in rejected");
                return Err(ApplicationError::InvalidCredentials);
            }
        };

        self.users.record_login(&user, Utc::now()).await?;
        let token = self.sessions.issue(&user).await;
        info!(event_name = "crm.auth.signed_in", user_id = user.id.0, username, "user signed in");
        Ok(token)
    }

    /// Succeeds whether or not a session was active.
    pub async fn end_session(&self, token: Option<&SessionToken>) {
        if let Some(token) = token {
            if self.sessions.revoke(token).await {
                info!(event_name = "crm.auth.signed_out", "session ended");
            }
        }
    }

    pub async fn require_session(&self, token: &SessionToken) -> Result<Session, ApplicationError> {
        self.sessions.resolve(token).await.ok_or(ApplicationError::Unauthenticated)
    }

    pub async fn list_customers(
        &self,
        token: &SessionToken,
        status_filter: Option<&str>,
    ) -> Result<Vec<Customer>, ApplicationError> {
        self.require_session(token).await?;
        let status = CustomerStatus::parse_filter(status_filter)?;
        Ok(self.customers.list(status).await?)
    }

    pub async fn get_customer(
        &self,
        token: &SessionToken,
        id: CustomerId,
    ) -> Result<Customer, ApplicationError> {
        self.require_session(token).await?;
        Ok(self.customers.get(id).await?)
    }

    pub async fn create_customer(
        &self,
        token: &SessionToken,
        fields: CustomerFields,
    ) -> Result<Customer, ApplicationError> {
        self.require_session(token).await?;
        let input = fields.into_create_input()?;
        Ok(self.customers.create(input).await?)
    }

    pub async fn update_customer(
        &self,
        token: &SessionToken,
        id: CustomerId,
        fields: CustomerFields,
    ) -> Result<Customer, ApplicationError> {
        self.require_session(token).await?;
        let input = fields.into_update_input()?;
        Ok(self.customers.update(id, input).await?)
    }

    pub async fn delete_customer(
        &self,
        token: &SessionToken,
        id: CustomerId,
    ) -> Result<(), ApplicationError> {
        self.require_session(token).await?;
        self.customers.delete(id).await?;
        Ok(())
    }

    pub async fn list_follow_ups_by_customer(
        &self,
        token: &SessionToken,
        customer_id: CustomerId,
    ) -> Result<Vec<FollowUp>, ApplicationError> {
        self.require_session(token).await?;
        Ok(self.follow_ups.list_by_customer(customer_id).await?)
    }

    /// Dates without an offset are read in the server's local time zone.
    pub async fn create_follow_up(
        &self,
        token: &SessionToken,
        fields: FollowUpFields,
    ) -> Result<FollowUp, ApplicationError> {
        self.create_follow_up_in(token, fields, &Local).await
    }

    pub async fn create_follow_up_in<Tz: TimeZone>(
        &self,
        token: &SessionToken,
        fields: FollowUpFields,
        tz: &Tz,
    ) -> Result<FollowUp, ApplicationError> {
        self.require_session(token).await?;
        let input = fields.into_input_in(tz)?;
        Ok(self.follow_ups.create(input).await?)
    }

    pub async fn dashboard_summary(
        &self,
        token: &SessionToken,
        now: DateTime<Local>,
    ) -> Result<DashboardSummary, ApplicationError> {
        self.require_session(token).await?;
        Ok(self.dashboard.compute_summary(now).await?)
    }
}
