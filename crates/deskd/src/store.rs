//! Session store: the in-memory ticket set plus its on-disk snapshot.
//!
//! All bulk results land here through `apply_updates`, which replaces
//! tickets by id. Per-ticket replacement is order-independent, so a
//! classify batch and a send batch touching disjoint tickets can be
//! applied in either order with the same outcome.

use desk_shared::{DeskError, SessionSnapshot, TemplateStore, Ticket, TicketStatus};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The working set of tickets for one session.
#[derive(Debug, Clone, Default)]
pub struct TicketSet {
    tickets: Vec<Ticket>,
}

impl TicketSet {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        Self { tickets }
    }

    pub fn all(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == id)
    }

    /// Replace the ticket with the same id. Unknown ids are dropped
    /// silently: the ticket may have been purged between the batch
    /// starting and its result landing.
    pub fn replace(&mut self, updated: Ticket) {
        if let Some(slot) = self.tickets.iter_mut().find(|t| t.id == updated.id) {
            *slot = updated;
        } else {
            warn!("dropping update for unknown ticket {}", updated.id);
        }
    }

    /// Apply a batch of per-ticket replacements.
    pub fn apply_updates(&mut self, updates: Vec<Ticket>) {
        for updated in updates {
            self.replace(updated);
        }
    }

    /// Merge freshly fetched tickets in front of the current set.
    ///
    /// Known ids are dropped (the stored copy carries triage state the
    /// fetched copy lacks); genuinely new arrivals are auto-selected so
    /// the next bulk classification picks them up.
    pub fn extend_new(&mut self, fetched: Vec<Ticket>) -> usize {
        let mut fresh: Vec<Ticket> = fetched
            .into_iter()
            .filter(|f| !self.tickets.iter().any(|t| t.id == f.id))
            .collect();
        let added = fresh.len();
        for ticket in &mut fresh {
            ticket.selected = true;
        }
        fresh.append(&mut self.tickets);
        self.tickets = fresh;
        if added > 0 {
            info!("{added} new tickets merged into the set");
        }
        added
    }

    pub fn toggle_selected(&mut self, id: &str) {
        if let Some(t) = self.tickets.iter_mut().find(|t| t.id == id) {
            t.selected = !t.selected;
        }
    }

    /// Select every open ticket; resolved ones stay untouched.
    pub fn select_all_open(&mut self) {
        for t in &mut self.tickets {
            if t.status.is_open() {
                t.selected = true;
            }
        }
    }

    pub fn clear_selection(&mut self) {
        for t in &mut self.tickets {
            t.selected = false;
        }
    }

    pub fn selected(&self) -> Vec<Ticket> {
        self.tickets.iter().filter(|t| t.selected).cloned().collect()
    }

    /// Tickets in the given status, newest first.
    pub fn by_status(&self, status: TicketStatus) -> Vec<&Ticket> {
        let mut view: Vec<&Ticket> = self.tickets.iter().filter(|t| t.status == status).collect();
        view.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        view
    }
}

/// Session state bound to a snapshot file.
pub struct SessionStore {
    path: PathBuf,
    pub tickets: TicketSet,
    pub templates: TemplateStore,
    pub active_model: String,
}

impl SessionStore {
    /// Load the snapshot, falling back to defaults when the file does
    /// not exist yet. A fresh session adopts `default_model`; an
    /// existing snapshot keeps whatever model the operator last chose.
    pub fn load(path: &Path, default_model: &str) -> Result<Self, DeskError> {
        let snapshot = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            info!("no session snapshot at {}, starting fresh", path.display());
            SessionSnapshot {
                active_model: default_model.to_string(),
                ..Default::default()
            }
        };
        Ok(Self::from_snapshot(path, snapshot))
    }

    fn from_snapshot(path: &Path, snapshot: SessionSnapshot) -> Self {
        Self {
            path: path.to_path_buf(),
            tickets: TicketSet::new(snapshot.tickets),
            templates: snapshot.templates,
            active_model: snapshot.active_model,
        }
    }

    /// Write the snapshot back to disk, creating parent directories on
    /// first save.
    pub fn save(&self) -> Result<(), DeskError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = SessionSnapshot {
            tickets: self.tickets.all().to_vec(),
            templates: self.templates.clone(),
            active_model: self.active_model.clone(),
        };
        let raw = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}
