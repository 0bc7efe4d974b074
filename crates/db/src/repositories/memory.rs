use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crmlite_core::domain::customer::{Customer, CustomerId, CustomerInput, CustomerStatus};
use crmlite_core::domain::follow_up::{FollowUp, FollowUpId, FollowUpInput, ScheduledFollowUp};
use crmlite_core::domain::timestamp::{now_utc, storage_precision};
use crmlite_core::domain::user::{User, UserId};

use super::{CustomerRepository, FollowUpRepository, RepositoryError, UserRepository};

#[derive(Default)]
struct MemoryState {
    next_customer_id: i64,
    next_follow_up_id: i64,
    next_user_id: i64,
    customers: BTreeMap<i64, Customer>,
    follow_ups: BTreeMap<i64, FollowUp>,
    users: BTreeMap<String, User>,
}

/// Customers, follow-ups, and users behind one lock, so cascade delete and
/// owner resolution behave like the SQL store's transactions.
#[derive(Default)]
pub struct InMemoryCrmStore {
    state: RwLock<MemoryState>,
}

fn newest_first(customers: &mut [Customer]) {
    customers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn latest_follow_up_first(follow_ups: &mut [FollowUp]) {
    follow_ups.sort_by(|a, b| b.follow_up_date.cmp(&a.follow_up_date).then(b.id.cmp(&a.id)));
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCrmStore {
    async fn create(&self, input: CustomerInput) -> Result<Customer, RepositoryError> {
        let mut state = self.state.write().await;
        state.next_customer_id += 1;

        let customer = Customer {
            id: CustomerId(state.next_customer_id),
            name: input.name,
            phone: input.phone,
            email: input.email,
            address: input.address,
            status: input.status,
            created_at: now_utc(),
        };
        state.customers.insert(customer.id.0, customer.clone());
        Ok(customer)
    }

    async fn get(&self, id: CustomerId) -> Result<Customer, RepositoryError> {
        let state = self.state.read().await;
        state.customers.get(&id.0).cloned().ok_or(RepositoryError::customer_not_found(id))
    }

    async fn list(&self, status: Option<CustomerStatus>) -> Result<Vec<Customer>, RepositoryError> {
        let state = self.state.read().await;
        let mut customers: Vec<Customer> = state
            .customers
            .values()
            .filter(|customer| status.map_or(true, |wanted| customer.status == wanted))
            .cloned()
            .collect();
        newest_first(&mut customers);
        Ok(customers)
    }

    async fn update(
        &self,
        id: CustomerId,
        input: CustomerInput,
    ) -> Result<Customer, RepositoryError> {
        let mut state = self.state.write().await;
        let customer =
            state.customers.get_mut(&id.0).ok_or(RepositoryError::customer_not_found(id))?;
        customer.apply(input);
        Ok(customer.clone())
    }

    async fn delete(&self, id: CustomerId) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        if state.customers.remove(&id.0).is_none() {
            return Err(RepositoryError::customer_not_found(id));
        }

        let before = state.follow_ups.len();
        state.follow_ups.retain(|_, follow_up| follow_up.customer_id != id);
        Ok((before - state.follow_ups.len()) as u64)
    }

    async fn count(&self, status: Option<CustomerStatus>) -> Result<i64, RepositoryError> {
        let state = self.state.read().await;
        let count = state
            .customers
            .values()
            .filter(|customer| status.map_or(true, |wanted| customer.status == wanted))
            .count();
        Ok(count as i64)
    }
}

#[async_trait::async_trait]
impl FollowUpRepository for InMemoryCrmStore {
    async fn create(&self, input: FollowUpInput) -> Result<FollowUp, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&input.customer_id.0) {
            return Err(RepositoryError::customer_not_found(input.customer_id));
        }
        state.next_follow_up_id += 1;

        let follow_up = FollowUp {
            id: FollowUpId(state.next_follow_up_id),
            customer_id: input.customer_id,
            note: input.note,
            follow_up_date: storage_precision(input.follow_up_date),
            next_follow_up_date: input.next_follow_up_date.map(storage_precision),
            created_at: now_utc(),
        };
        state.follow_ups.insert(follow_up.id.0, follow_up.clone());
        Ok(follow_up)
    }

    async fn list_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<FollowUp>, RepositoryError> {
        let state = self.state.read().await;
        if !state.customers.contains_key(&customer_id.0) {
            return Err(RepositoryError::customer_not_found(customer_id));
        }

        let mut follow_ups: Vec<FollowUp> = state
            .follow_ups
            .values()
            .filter(|follow_up| follow_up.customer_id == customer_id)
            .cloned()
            .collect();
        latest_follow_up_first(&mut follow_ups);
        Ok(follow_ups)
    }

    async fn list_scheduled_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduledFollowUp>, RepositoryError> {
        let state = self.state.read().await;
        let mut in_window: Vec<FollowUp> = state
            .follow_ups
            .values()
            .filter(|follow_up| (start..=end).contains(&follow_up.follow_up_date))
            .cloned()
            .collect();
        latest_follow_up_first(&mut in_window);

        in_window
            .into_iter()
            .map(|follow_up| {
                let owner = state
                    .customers
                    .get(&follow_up.customer_id.0)
                    .ok_or(RepositoryError::customer_not_found(follow_up.customer_id))?;
                Ok(ScheduledFollowUp {
                    customer_name: owner.name.clone(),
                    customer_phone: owner.phone.clone(),
                    customer_email: owner.email.clone(),
                    customer_status: owner.status,
                    follow_up,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.state.read().await.follow_ups.len() as i64)
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryCrmStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(username).cloned())
    }

    async fn create(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        if state.users.contains_key(username) {
            return Err(RepositoryError::Conflict { entity: "user", key: username.to_string() });
        }
        state.next_user_id += 1;

        let user = User {
            id: UserId(state.next_user_id),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            is_active: true,
            created_at: now_utc(),
            last_login_at: None,
        };
        state.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn record_login(&self, user: &User, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if let Some(stored) = self.state.write().await.users.get_mut(&user.username) {
            stored.last_login_at = Some(at);
        }
        Ok(())
    }
}

impl InMemoryCrmStore {
    /// Marks a user inactive; inactive users cannot sign in.
    pub async fn deactivate_user(&self, username: &str) {
        if let Some(user) = self.state.write().await.users.get_mut(username) {
            user.is_active = false;
        }
    }
}
