//! Mail gateway seam.
//!
//! The gateway is an injected capability: the dispatcher and the CLI
//! take `Arc<dyn MailGateway>` so tests substitute scripted doubles.

use async_trait::async_trait;
use desk_shared::{DeskError, Ticket};

/// A threaded reply ready for transmission.
#[derive(Debug, Clone)]
pub struct OutgoingReply {
    pub to: String,
    pub subject: String,
    pub thread_id: String,
    /// Wire id of the message being replied to
    pub in_reply_to: String,
    pub body: String,
}

impl OutgoingReply {
    /// Build the reply for a ticket with the given body text.
    pub fn for_ticket(ticket: &Ticket, body: &str) -> Self {
        Self {
            to: ticket.sender.clone(),
            subject: ticket.subject.clone(),
            thread_id: ticket.thread_id.clone(),
            in_reply_to: ticket.message_id.clone(),
            body: body.to_string(),
        }
    }

    /// Reply subject with the `Re:` prefix added when absent.
    pub fn reply_subject(&self) -> String {
        if self.subject.starts_with("Re:") {
            self.subject.clone()
        } else {
            format!("Re: {}", self.subject)
        }
    }
}

/// External mail provider operations.
///
/// Every method may fail with `DeskError::AuthExpired` when the held
/// credential is no longer valid; callers must stop issuing gateway
/// calls until a fresh sign-in, never retry automatically.
#[async_trait]
pub trait MailGateway: Send + Sync {
    /// Fetch up to `limit` most recent inbound items.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Ticket>, DeskError>;

    /// Fetch raw attachment bytes for one ticket.
    async fn fetch_attachment(
        &self,
        ticket_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, DeskError>;

    /// Transmit a threaded reply.
    async fn send_reply(&self, outgoing: &OutgoingReply) -> Result<(), DeskError>;
}
