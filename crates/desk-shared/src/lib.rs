//! Shared types and pure core logic for the triage desk.
//!
//! Everything here is synchronous and side-effect free: the data
//! model, status derivation, customer aggregation, dashboard stats,
//! and the template store. Orchestration lives in `deskd`.

pub mod category;
pub mod classification;
pub mod customer;
pub mod error;
pub mod snapshot;
pub mod stats;
pub mod template;
pub mod ticket;

pub use category::SupportCategory;
pub use classification::{Classification, TicketMetadata};
pub use customer::{aggregate_customers, Customer, ThreadSummary, UNLINKED_USER_ID};
pub use error::DeskError;
pub use snapshot::{SessionSnapshot, DEFAULT_MODEL};
pub use stats::{project_stats, DeskStats, ExtractionMetrics};
pub use template::{recommended_template, Template, TemplateStore, FREE_FORM_TEMPLATE_ID};
pub use ticket::{Attachment, Ticket, TicketSource, TicketStatus};
