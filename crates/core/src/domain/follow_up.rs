use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::{CustomerId, CustomerStatus};
use crate::domain::timestamp::parse_timestamp_in;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FollowUpId(pub i64);

impl fmt::Display for FollowUpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: FollowUpId,
    pub customer_id: CustomerId,
    pub note: String,
    pub follow_up_date: DateTime<Utc>,
    pub next_follow_up_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpInput {
    pub customer_id: CustomerId,
    pub note: String,
    pub follow_up_date: DateTime<Utc>,
    pub next_follow_up_date: Option<DateTime<Utc>>,
}

impl FollowUpInput {
    pub fn new(
        customer_id: CustomerId,
        note: impl Into<String>,
        follow_up_date: DateTime<Utc>,
    ) -> Self {
        Self { customer_id, note: note.into(), follow_up_date, next_follow_up_date: None }
    }

    pub fn with_next_follow_up(mut self, next: DateTime<Utc>) -> Self {
        self.next_follow_up_date = Some(next);
        self
    }
}

/// Untrusted follow-up fields as submitted by a form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpFields {
    pub customer: Option<String>,
    pub note: Option<String>,
    pub follow_up_date: Option<String>,
    pub next_follow_up_date: Option<String>,
}

impl FollowUpFields {
    pub fn into_input(self) -> Result<FollowUpInput, DomainError> {
        self.into_input_in(&Local)
    }

    pub fn into_input_in<Tz: TimeZone>(self, tz: &Tz) -> Result<FollowUpInput, DomainError> {
        let raw_customer = non_blank(self.customer).ok_or(DomainError::MissingField("customer"))?;
        let customer_id = raw_customer.parse::<i64>().map(CustomerId).map_err(|_| {
            DomainError::InvalidReference { field: "customer", value: raw_customer.clone() }
        })?;

        let note = self.note.ok_or(DomainError::MissingField("note"))?;

        let follow_up_date = non_blank(self.follow_up_date)
            .ok_or(DomainError::MissingField("follow_up_date"))
            .and_then(|raw| parse_timestamp_in("follow_up_date", &raw, tz))?;

        let next_follow_up_date = non_blank(self.next_follow_up_date)
            .map(|raw| parse_timestamp_in("next_follow_up_date", &raw, tz))
            .transpose()?;

        Ok(FollowUpInput { customer_id, note, follow_up_date, next_follow_up_date })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

/// A follow-up joined with the identifying fields of its owning customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledFollowUp {
    pub follow_up: FollowUp,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub customer_status: CustomerStatus,
}

impl fmt::Display for ScheduledFollowUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Follow-up for {} on {}",
            self.customer_name,
            self.follow_up.follow_up_date.with_timezone(&Local).format("%Y-%m-%d")
        )
    }
}
