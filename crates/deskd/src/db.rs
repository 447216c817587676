//! Backend ticket database seam.
//!
//! The secondary workspace mirrors the mail triage flow against rows
//! of a backend ticket table. Rows arrive as tickets with
//! `TicketSource::Database` and share the engine, dispatcher and
//! projections unchanged.

use async_trait::async_trait;
use chrono::NaiveDate;
use desk_shared::{DeskError, Ticket, TicketSource, TicketStatus};

/// Read access to the backend ticket table.
#[async_trait]
pub trait TicketDatabase: Send + Sync {
    /// Fetch all rows created on the given date.
    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<Ticket>, DeskError>;
}

/// Fixture-backed database used by tests and the offline demo path.
#[derive(Default)]
pub struct StaticTicketDatabase {
    rows: Vec<Ticket>,
}

impl StaticTicketDatabase {
    pub fn new(mut rows: Vec<Ticket>) -> Self {
        for row in &mut rows {
            row.source = TicketSource::Database;
            if row.status == TicketStatus::Resolved {
                continue;
            }
            row.status = TicketStatus::New;
        }
        Self { rows }
    }

    /// Two canned backend rows per date, standing in for the real
    /// ticket table until it is wired up.
    pub fn demo(date: NaiveDate) -> Self {
        let at = |h, m| {
            date.and_hms_opt(h, m, 0)
                .unwrap_or_default()
                .and_utc()
        };
        let row = |id: &str, sender: &str, subject: &str, notes: &str, ts| Ticket {
            id: id.to_string(),
            thread_id: id.to_string(),
            message_id: String::new(),
            source: TicketSource::Database,
            sender: sender.to_string(),
            sender_name: sender.split('@').next().unwrap_or(sender).to_string(),
            subject: subject.to_string(),
            body: notes.to_string(),
            timestamp: ts,
            is_read: false,
            status: TicketStatus::New,
            attachments: vec![],
            classification: None,
            agent_notes: Some(notes.to_string()),
            sent_reply: None,
            selected: false,
        };
        Self::new(vec![
            row(
                "db_99812",
                "customer.db@example.com",
                "[TECHNICAL] API Error 500 during voice synthesis",
                "[HUMAN SUPPLEMENT]: Backend investigation: rate limits hit from a single IP; cache cleared for this UID.",
                at(10, 30),
            ),
            row(
                "db_99813",
                "payer@gmail.com",
                "Stripe payment verified but no Pro status",
                "[HUMAN SUPPLEMENT]: Backend investigation: transaction TXN_99283 was stuck in Pending, manually set to Succeeded.",
                at(14, 45),
            ),
        ])
    }
}

#[async_trait]
impl TicketDatabase for StaticTicketDatabase {
    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<Ticket>, DeskError> {
        Ok(self
            .rows
            .iter()
            .filter(|t| t.timestamp.date_naive() == date)
            .cloned()
            .collect())
    }
}
