pub mod bootstrap;
pub mod boundary;
pub mod health;
pub mod pages;
pub mod session;

pub use bootstrap::{bootstrap_with_config, Application, BootstrapError};
pub use boundary::CrmBoundary;
pub use session::{Session, SessionStore, SessionToken};
