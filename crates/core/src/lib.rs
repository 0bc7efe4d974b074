pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;

pub use domain::customer::{Customer, CustomerFields, CustomerId, CustomerInput, CustomerStatus};
pub use domain::dashboard::{DashboardSummary, StatusCounts};
pub use domain::follow_up::{FollowUp, FollowUpFields, FollowUpId, FollowUpInput, ScheduledFollowUp};
pub use domain::user::{User, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
