use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub i64);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    #[default]
    New,
    Contacted,
    Converted,
    Lost,
}

impl CustomerStatus {
    pub const ALL: [CustomerStatus; 4] =
        [Self::New, Self::Contacted, Self::Converted, Self::Lost];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Converted => "converted",
            Self::Lost => "lost",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Contacted => "Contacted",
            Self::Converted => "Converted",
            Self::Lost => "Lost",
        }
    }

    /// Parses a listing filter. Absent or blank input means "every status".
    pub fn parse_filter(raw: Option<&str>) -> Result<Option<Self>, DomainError> {
        match raw {
            None => Ok(None),
            Some(value) if value.trim().is_empty() => Ok(None),
            Some(value) => value.parse().map(Some),
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "converted" => Ok(Self::Converted),
            "lost" => Ok(Self::Lost),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn apply(&mut self, input: CustomerInput) {
        self.name = input.name;
        self.phone = input.phone;
        self.email = input.email;
        self.address = input.address;
        self.status = input.status;
    }
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Every field of a customer that callers may set. Identifier and creation
/// time are assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub status: CustomerStatus,
}

impl CustomerInput {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
            address: address.into(),
            status: CustomerStatus::default(),
        }
    }

    pub fn with_status(mut self, status: CustomerStatus) -> Self {
        self.status = status;
        self
    }
}

/// Untrusted customer fields as submitted by a form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFields {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
}

impl CustomerFields {
    /// Validates fields for a new customer; a missing or blank status falls
    /// back to `new`.
    pub fn into_create_input(self) -> Result<CustomerInput, DomainError> {
        let status = CustomerStatus::parse_filter(self.status.as_deref())?.unwrap_or_default();
        self.into_input(status)
    }

    /// Validates the full replacement field set of an existing customer.
    pub fn into_update_input(self) -> Result<CustomerInput, DomainError> {
        let status = match self.status.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => return Err(DomainError::MissingField("status")),
        };
        self.into_input(status)
    }

    /// The name is stored exactly as submitted; only an all-blank name is refused.
    fn into_input(self, status: CustomerStatus) -> Result<CustomerInput, DomainError> {
        let name = self
            .name
            .filter(|value| !value.trim().is_empty())
            .ok_or(DomainError::MissingField("name"))?;

        Ok(CustomerInput {
            name,
            phone: self.phone.ok_or(DomainError::MissingField("phone"))?,
            email: self.email.ok_or(DomainError::MissingField("email"))?,
            address: self.address.ok_or(DomainError::MissingField("address"))?,
            status,
        })
    }
}

impl From<&Customer> for CustomerFields {
    fn from(customer: &Customer) -> Self {
        Self {
            name: Some(customer.name.clone()),
            phone: Some(customer.phone.clone()),
            email: Some(customer.email.clone()),
            address: Some(customer.address.clone()),
            status: Some(customer.status.as_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CustomerFields, CustomerStatus};
    use crate::errors::DomainError;

    fn fields(status: Option<&str>) -> CustomerFields {
        CustomerFields {
            name: Some("Ada Lovelace".to_string()),
            phone: Some("555-0100".to_string()),
            email: Some("ada@example.com".to_string()),
            address: Some("12 Analytical Row".to_string()),
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn every_enumerated_status_round_trips_through_its_string_form() {
        for status in CustomerStatus::ALL {
            assert_eq!(status.as_str().parse::<CustomerStatus>(), Ok(status));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_eq!(
            "pending".parse::<CustomerStatus>(),
            Err(DomainError::InvalidStatus("pending".to_string()))
        );
        assert!("NEW".parse::<CustomerStatus>().is_err());
    }

    #[test]
    fn blank_filter_means_no_filter() {
        assert_eq!(CustomerStatus::parse_filter(None), Ok(None));
        assert_eq!(CustomerStatus::parse_filter(Some("  ")), Ok(None));
        assert_eq!(
            CustomerStatus::parse_filter(Some("contacted")),
            Ok(Some(CustomerStatus::Contacted))
        );
    }

    #[test]
    fn create_defaults_status_to_new() {
        let input = fields(None).into_create_input().expect("valid");
        assert_eq!(input.status, CustomerStatus::New);

        let input = fields(Some("")).into_create_input().expect("valid");
        assert_eq!(input.status, CustomerStatus::New);
    }

    #[test]
    fn create_rejects_explicit_invalid_status() {
        let result = fields(Some("archived")).into_create_input();
        assert_eq!(result, Err(DomainError::InvalidStatus("archived".to_string())));
    }

    #[test]
    fn update_requires_status() {
        assert_eq!(fields(None).into_update_input(), Err(DomainError::MissingField("status")));

        let input = fields(Some("lost")).into_update_input().expect("valid");
        assert_eq!(input.status, CustomerStatus::Lost);
    }

    #[test]
    fn padded_status_is_not_an_enumerated_value() {
        for padded in [" new", "lost "] {
            let invalid = Err(DomainError::InvalidStatus(padded.to_string()));
            assert_eq!(fields(Some(padded)).into_create_input(), invalid);
            assert_eq!(fields(Some(padded)).into_update_input(), invalid);
        }
    }

    #[test]
    fn name_is_kept_exactly_as_submitted() {
        let mut padded = fields(Some("new"));
        padded.name = Some(" Ada ".to_string());

        assert_eq!(padded.clone().into_create_input().expect("valid").name, " Ada ");
        assert_eq!(padded.into_update_input().expect("valid").name, " Ada ");
    }

    #[test]
    fn missing_required_fields_are_reported_by_name() {
        let mut missing_name = fields(None);
        missing_name.name = Some("   ".to_string());
        assert_eq!(missing_name.into_create_input(), Err(DomainError::MissingField("name")));

        let mut missing_address = fields(None);
        missing_address.address = None;
        assert_eq!(missing_address.into_create_input(), Err(DomainError::MissingField("address")));
    }

    #[test]
    fn empty_contact_fields_are_accepted() {
        let mut sparse = fields(None);
        sparse.phone = Some(String::new());
        sparse.email = Some(String::new());

        let input = sparse.into_create_input().expect("valid");
        assert!(input.phone.is_empty());
        assert!(input.email.is_empty());
    }
}
