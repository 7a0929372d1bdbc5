pub mod config;
pub mod discovery;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod naming;
pub mod orchestrator;
pub mod systemd_client;
pub mod units;

pub use orchestrator::{DefinitionSource, Scheduler};
