//! Desk daemon library - exposes modules for testing.

pub mod commands;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod engine;
pub mod gateway;
pub mod gmail;
pub mod oracle;
pub mod store;

pub use config::Config;
pub use dispatcher::{BatchOutcome, BulkDispatcher, SendReport};
pub use engine::{TriageEngine, TriageOverrides};
pub use store::{SessionStore, TicketSet};
