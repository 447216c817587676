//! Dashboard counters derived from the ticket set.

use crate::ticket::{Ticket, TicketSource, TicketStatus};
use serde::{Deserialize, Serialize};

/// Extraction-quality counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMetrics {
    /// Tickets with a non-missing extracted user id
    pub uid_count: usize,
    /// Tickets with a non-missing extracted payment method
    pub payment_method_count: usize,
    /// Tickets with payment proof present
    pub proof_count: usize,
    /// Tickets ready to resolve or already resolved
    pub perfect_count: usize,
}

/// Status rollup plus extraction metrics. Pure function of the ticket
/// set; recomputed on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskStats {
    pub total: usize,
    pub mail_count: usize,
    pub db_count: usize,
    pub new: usize,
    /// InProgress + InfoMissing + ReadyToResolve
    pub in_progress: usize,
    pub resolved: usize,
    pub metrics: ExtractionMetrics,
}

/// Single pass over the ticket set.
pub fn project_stats(tickets: &[Ticket]) -> DeskStats {
    let mut stats = DeskStats::default();
    for ticket in tickets {
        stats.total += 1;
        match ticket.source {
            TicketSource::Mail => stats.mail_count += 1,
            TicketSource::Database => stats.db_count += 1,
        }
        match ticket.status {
            TicketStatus::New => stats.new += 1,
            TicketStatus::Resolved => stats.resolved += 1,
            s if s.is_open() => stats.in_progress += 1,
            _ => {}
        }
        if let Some(c) = &ticket.classification {
            if c.metadata.user_id.is_some() {
                stats.metrics.uid_count += 1;
            }
            if c.metadata.payment_method.is_some() {
                stats.metrics.payment_method_count += 1;
            }
            if c.metadata.has_payment_proof {
                stats.metrics.proof_count += 1;
            }
        }
        if matches!(
            ticket.status,
            TicketStatus::ReadyToResolve | TicketStatus::Resolved
        ) {
            stats.metrics.perfect_count += 1;
        }
    }
    stats
}
