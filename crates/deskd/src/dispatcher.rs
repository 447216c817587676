//! Bulk operations over selected tickets.
//!
//! Both paths isolate per-item failures: one ticket failing never
//! aborts or corrupts its siblings. Classification fans out
//! concurrently; sending is strictly sequential so the running
//! progress percentage is deterministic.

use crate::engine::{TriageEngine, TriageOverrides};
use crate::gateway::{MailGateway, OutgoingReply};
use desk_shared::{DeskError, TemplateStore, Ticket, TicketStatus};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Minimum draft length considered sendable.
const MIN_DRAFT_LEN: usize = 10;

/// Outcome of a bulk classification batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Successfully reclassified tickets, to be applied by id
    pub updated: Vec<Ticket>,
    /// Per-item failures as (ticket id, reason)
    pub failures: Vec<(String, String)>,
}

/// Outcome of a bulk send batch. Partial failure is a normal result,
/// never an error.
#[derive(Debug, Default)]
pub struct SendReport {
    pub success: usize,
    pub failed: usize,
    /// Items shown as needing review, never dispatched
    pub skipped: usize,
    /// The gateway reported a stale credential; remaining items were
    /// not attempted and the caller must prompt a fresh sign-in
    pub auth_expired: bool,
    /// Tickets that transitioned to resolved, to be applied by id
    pub updated: Vec<Ticket>,
}

impl SendReport {
    /// True when not a single item could be sent.
    pub fn all_failed(&self) -> bool {
        self.success == 0 && self.failed > 0
    }
}

/// Orchestrates classify-or-send over a selected set.
pub struct BulkDispatcher {
    engine: Arc<TriageEngine>,
    gateway: Arc<dyn MailGateway>,
}

impl BulkDispatcher {
    pub fn new(engine: Arc<TriageEngine>, gateway: Arc<dyn MailGateway>) -> Self {
        Self { engine, gateway }
    }

    /// Classify every eligible selected ticket concurrently.
    ///
    /// Resolved tickets are dropped from the batch before dispatch.
    /// All oracle calls are issued at once and awaited together; each
    /// failure removes only that ticket's contribution. An empty
    /// eligible set is a validation error; a batch where every item
    /// failed is reported distinctly.
    pub async fn bulk_classify(
        &self,
        selected: Vec<Ticket>,
        thread_pool: &[Ticket],
        templates: &TemplateStore,
    ) -> Result<BatchOutcome, DeskError> {
        let eligible: Vec<Ticket> = selected
            .into_iter()
            .filter(|t| !t.status.is_terminal())
            .collect();
        if eligible.is_empty() {
            return Err(DeskError::Validation(
                "no eligible tickets selected for classification".to_string(),
            ));
        }

        let total = eligible.len();
        info!("bulk classify: dispatching {total} tickets");

        let history: Arc<Vec<Ticket>> = Arc::new(thread_pool.to_vec());
        let templates: Arc<TemplateStore> = Arc::new(templates.clone());

        let mut tasks = JoinSet::new();
        for ticket in eligible {
            let engine = Arc::clone(&self.engine);
            let history = Arc::clone(&history);
            let templates = Arc::clone(&templates);
            tasks.spawn(async move {
                let result = engine
                    .classify(&ticket, &history, &TriageOverrides::default(), &templates)
                    .await;
                (ticket.id.clone(), result)
            });
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(updated))) => outcome.updated.push(updated),
                Ok((id, Err(e))) => {
                    warn!("bulk classify: ticket {id} failed: {e}");
                    outcome.failures.push((id, e.to_string()));
                }
                Err(e) => {
                    // A panicked task loses its ticket id; the batch goes on.
                    warn!("bulk classify: task aborted: {e}");
                    outcome.failures.push((String::new(), e.to_string()));
                }
            }
        }

        if outcome.updated.is_empty() {
            return Err(DeskError::Oracle(format!(
                "all {total} classifications failed"
            )));
        }
        info!(
            "bulk classify: {} ok, {} failed",
            outcome.updated.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Send every ready selected ticket, one at a time.
    ///
    /// Ready means a non-trivial reply draft and a non-terminal status;
    /// everything else is counted as skipped and never dispatched.
    /// After every attempt, success or failure, `progress` receives the
    /// rounded completion percentage. A stale credential stops the
    /// batch; any remaining ready items count as failed.
    pub async fn bulk_send<F>(
        &self,
        selected: Vec<Ticket>,
        mut progress: F,
    ) -> Result<SendReport, DeskError>
    where
        F: FnMut(u32),
    {
        let (ready, skipped): (Vec<Ticket>, Vec<Ticket>) =
            selected.into_iter().partition(is_ready_to_send);
        if ready.is_empty() {
            return Err(DeskError::Validation(
                "no tickets ready to send".to_string(),
            ));
        }

        let total = ready.len();
        info!("bulk send: {total} ready, {} need review", skipped.len());

        let mut report = SendReport {
            skipped: skipped.len(),
            ..Default::default()
        };

        for (index, mut ticket) in ready.into_iter().enumerate() {
            let draft = ticket
                .reply_draft()
                .map(|d| d.to_string())
                .unwrap_or_default();
            let outgoing = OutgoingReply::for_ticket(&ticket, &draft);

            match self.gateway.send_reply(&outgoing).await {
                Ok(()) => {
                    ticket.status = TicketStatus::Resolved;
                    ticket.is_read = true;
                    ticket.selected = false;
                    ticket.sent_reply = Some(draft);
                    report.success += 1;
                    report.updated.push(ticket);
                }
                Err(DeskError::AuthExpired) => {
                    warn!("bulk send: credential expired at ticket {}", ticket.id);
                    // This attempt plus everything not yet tried.
                    report.failed += total - index;
                    report.auth_expired = true;
                    progress(percent(index + 1, total));
                    break;
                }
                Err(e) => {
                    warn!("bulk send: ticket {} failed: {e}", ticket.id);
                    report.failed += 1;
                }
            }
            progress(percent(index + 1, total));
        }

        info!(
            "bulk send: {} sent, {} failed, {} skipped",
            report.success, report.failed, report.skipped
        );
        Ok(report)
    }
}

/// Ready when a classification produced a usable draft and the ticket
/// is not already resolved.
fn is_ready_to_send(ticket: &Ticket) -> bool {
    !ticket.status.is_terminal()
        && ticket
            .reply_draft()
            .map(|d| d.len() > MIN_DRAFT_LEN)
            .unwrap_or(false)
}

fn percent(completed: usize, total: usize) -> u32 {
    ((completed as f64 / total as f64) * 100.0).round() as u32
}
