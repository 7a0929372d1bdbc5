//! Scheduling records and the checks and aggregates computed over them

pub mod definition;
pub mod summary;
pub mod validation;
