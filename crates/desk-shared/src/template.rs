//! Reply templates and the template store.
//!
//! Template bodies are contractual: a non-free-form template is always
//! copied into the draft byte-for-byte, with no interpolation. Only the
//! designated free-form template yields the oracle's generated reply.

use crate::category::SupportCategory;
use crate::error::DeskError;
use crate::ticket::Ticket;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id of the designated free-form "AI context-aware draft" template.
pub const FREE_FORM_TEMPLATE_ID: &str = "T7";

/// One reply template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    /// Free-text rule guiding automatic selection; not executable,
    /// passed verbatim to the oracle as context
    pub rule_prompt: String,
    /// Verbatim reply text
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<SupportCategory>,
}

impl Template {
    /// Operator-created template with a freshly minted id.
    pub fn new(name: &str, rule_prompt: &str, body: &str, category: Option<SupportCategory>) -> Self {
        Self {
            id: format!("tpl_{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            rule_prompt: rule_prompt.to_string(),
            body: body.to_string(),
            category,
        }
    }

    fn validate(&self) -> Result<(), DeskError> {
        if self.id.is_empty() || self.name.is_empty() || self.body.is_empty() {
            return Err(DeskError::Validation(
                "template requires id, name and body".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ordered set of reply templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStore {
    templates: Vec<Template>,
}

impl TemplateStore {
    /// Empty store.
    pub fn new() -> Self {
        Self { templates: vec![] }
    }

    /// The seven stock templates.
    pub fn defaults() -> Self {
        Self {
            templates: default_templates(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn all(&self) -> &[Template] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Append a new template. Fails on missing required fields or a
    /// duplicate id.
    pub fn add(&mut self, template: Template) -> Result<(), DeskError> {
        template.validate()?;
        if self.get(&template.id).is_some() {
            return Err(DeskError::Validation(format!(
                "duplicate template id {}",
                template.id
            )));
        }
        self.templates.push(template);
        Ok(())
    }

    /// Replace an existing template in place, or append if the id is new.
    pub fn upsert(&mut self, template: Template) -> Result<(), DeskError> {
        template.validate()?;
        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(slot) => *slot = template,
            None => self.templates.push(template),
        }
        Ok(())
    }

    /// Compute the reply draft for a chosen template.
    ///
    /// The free-form template yields the oracle's generated reply,
    /// falling back to its literal body when the ticket has no
    /// classification yet. Every other template yields its body
    /// verbatim.
    pub fn draft_for(&self, ticket: &Ticket, template_id: &str) -> Result<String, DeskError> {
        let template = self.get(template_id).ok_or_else(|| {
            DeskError::Validation(format!("unknown template id {template_id}"))
        })?;
        if template.id == FREE_FORM_TEMPLATE_ID {
            return Ok(ticket
                .reply_draft()
                .map(|d| d.to_string())
                .unwrap_or_else(|| template.body.clone()));
        }
        Ok(template.body.clone())
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Deterministic category -> template-id recommendation, used as the
/// UI default before (or absent) an explicit oracle choice. Total over
/// the category enumeration; anything without a dedicated template
/// maps to the free-form template.
pub fn recommended_template(category: SupportCategory) -> &'static str {
    match category {
        SupportCategory::SubscriptionMissingInfo => "T1",
        SupportCategory::NsfwIssue => "T2",
        SupportCategory::AccountUsageError => "T3",
        SupportCategory::AccountDeletion => "T4",
        SupportCategory::BotPowerIssue => "T5",
        SupportCategory::PostDeletionBilling => "T6",
        SupportCategory::SubscriptionVerified | SupportCategory::Other => FREE_FORM_TEMPLATE_ID,
    }
}

fn default_templates() -> Vec<Template> {
    vec![
        Template {
            id: "T1".into(),
            name: "Information Recovery".into(),
            rule_prompt: "Use when a user asks about subscription/recharge issues but lacks full info (missing UID, payment method, or receipt).".into(),
            body: "Dear Customer,\n\nThank you for contacting us.\n\nTo investigate your transaction, we require the following missing details:\n\n- Your unique User ID\n- Payment platform used (e.g., Stripe/PayPal)\n- A clear screenshot of the receipt/confirmation\n\nOnce provided, our team will manually verify and update your balance.\n\nBest regards,\nSupport Team".into(),
            category: Some(SupportCategory::SubscriptionMissingInfo),
        },
        Template {
            id: "T2".into(),
            name: "NSFW Policy Notice".into(),
            rule_prompt: "Use when a user complains about NSFW content being locked or bots being limited after policy changes.".into(),
            body: "Dear Customer,\n\nThank you for your inquiry. Please be advised that NSFW content and associated bots are now a Pro-exclusive feature.\n\nTo unlock these capabilities, consider upgrading your account. We currently have a promotion: Use code UPGRADEPRO for 50% off yearly plans.\n\nBest regards,\nSupport Team".into(),
            category: Some(SupportCategory::NsfwIssue),
        },
        Template {
            id: "T3".into(),
            name: "Technical Diagnostics".into(),
            rule_prompt: "Use for account-related technical bugs, 500 errors, or usage failures where we need the UID to check the backend.".into(),
            body: "Dear Customer,\n\nWe are sorry to hear you're experiencing technical difficulties.\n\nWe have logged this issue with our engineering team. To expedite the fix, please confirm:\n- Your UID\n- Your device OS version\n\nExpect a follow-up within 72 hours.\n\nBest regards,\nSupport Team".into(),
            category: Some(SupportCategory::AccountUsageError),
        },
        Template {
            id: "T4".into(),
            name: "Account Deletion Guide".into(),
            rule_prompt: "Use when a user explicitly requests to delete their account or personal data.".into(),
            body: "Dear Customer,\n\nYou can delete your account via My Profile > Settings > Delete Account.\n\nPlease note that this action is permanent and all data will be erased.\n\nBest regards,\nSupport Team".into(),
            category: Some(SupportCategory::AccountDeletion),
        },
        Template {
            id: "T5".into(),
            name: "Energy Consumption Explained".into(),
            rule_prompt: "Use when a user complains about a bot consuming too much energy/power per task.".into(),
            body: "Dear Customer,\n\nOur power system is dynamic. Consumption is calculated post-task based on complexity.\n\nWe are working on detailed usage logs to improve transparency.\n\nBest regards,\nSupport Team".into(),
            category: Some(SupportCategory::BotPowerIssue),
        },
        Template {
            id: "T6".into(),
            name: "Subscription Reminder".into(),
            rule_prompt: "Use when a user is still being charged by PayPal/Stripe after deleting their account.".into(),
            body: "Dear Customer,\n\nNote that deleting your account does not automatically cancel third-party billing cycles (Stripe/PayPal).\n\nPlease cancel your active subscription in your payment portal to prevent future charges.\n\nBest regards,\nSupport Team".into(),
            category: Some(SupportCategory::PostDeletionBilling),
        },
        Template {
            id: FREE_FORM_TEMPLATE_ID.into(),
            name: "AI Intelligent Reply".into(),
            rule_prompt: "DEFAULT: Use for general queries or when subscription info is already complete. Generate a smart context-aware reply.".into(),
            body: "[AI CONTEXT-AWARE DRAFT]".into(),
            category: Some(SupportCategory::Other),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_seeded() {
        let store = TemplateStore::defaults();
        assert_eq!(store.len(), 7);
        assert!(store.get(FREE_FORM_TEMPLATE_ID).is_some());
    }

    #[test]
    fn test_recommendation_total() {
        let store = TemplateStore::defaults();
        for cat in SupportCategory::ALL {
            let id = recommended_template(cat);
            assert!(store.get(id).is_some(), "no template for {cat}");
        }
    }

    #[test]
    fn test_add_rejects_empty_body() {
        let mut store = TemplateStore::new();
        let mut t = Template::new("Greeting", "always", "body", None);
        t.body.clear();
        assert!(store.add(t).is_err());
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut store = TemplateStore::defaults();
        let mut t = Template::new("Clone", "never", "body", None);
        t.id = "T1".into();
        assert!(store.add(t).is_err());
    }

    #[test]
    fn test_upsert_edits_in_place() {
        let mut store = TemplateStore::defaults();
        let mut edited = store.get("T2").unwrap().clone();
        edited.body = "Updated body".into();
        store.upsert(edited).unwrap();
        assert_eq!(store.get("T2").unwrap().body, "Updated body");
        assert_eq!(store.len(), 7);
    }
}
