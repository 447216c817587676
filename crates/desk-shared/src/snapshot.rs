//! Persisted session state.
//!
//! The snapshot is loaded at session start and re-emitted after every
//! mutating operation; the storage medium is the caller's concern.

use crate::template::TemplateStore;
use crate::ticket::Ticket;
use serde::{Deserialize, Serialize};

/// Default classification model when the snapshot carries none.
pub const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";

/// Everything a session needs to resume: the ticket set, the template
/// store, and the currently selected classification engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    #[serde(default)]
    pub templates: TemplateStore,
    #[serde(default = "default_model")]
    pub active_model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            tickets: vec![],
            templates: TemplateStore::defaults(),
            active_model: default_model(),
        }
    }
}
