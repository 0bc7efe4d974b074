pub mod customer;
pub mod dashboard;
pub mod follow_up;
pub mod timestamp;
pub mod user;
