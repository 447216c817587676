//! Support categories produced by the classification oracle.
//!
//! The wire tags are fixed; an unknown tag from the oracle is a parse
//! error, never coerced into `Other`.

use serde::{Deserialize, Serialize};

/// Fixed set of support categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SupportCategory {
    /// Subscription/recharge issue with at least one mandatory item missing
    #[serde(rename = "SUBSCRIPTION_MISSING_INFO")]
    SubscriptionMissingInfo,
    /// Subscription issue with UID, payment method and proof all present
    #[serde(rename = "SUBSCRIPTION_VERIFIED")]
    SubscriptionVerified,
    /// NSFW content locked behind the Pro plan
    #[serde(rename = "NSFW_ISSUE")]
    NsfwIssue,
    /// Technical bug or usage failure on the account
    #[serde(rename = "ACCOUNT_USAGE_ERROR")]
    AccountUsageError,
    /// Explicit request to delete the account or personal data
    #[serde(rename = "ACCOUNT_DELETION")]
    AccountDeletion,
    /// Charged by the payment provider after deleting the account
    #[serde(rename = "POST_DELETION_BILLING")]
    PostDeletionBilling,
    /// Bot energy/power consumption complaint
    #[serde(rename = "BOT_POWER_ISSUE")]
    BotPowerIssue,
    /// Everything else
    #[default]
    #[serde(rename = "OTHER")]
    Other,
}

impl SupportCategory {
    /// All categories, in decision-tree order.
    pub const ALL: [SupportCategory; 8] = [
        SupportCategory::SubscriptionMissingInfo,
        SupportCategory::SubscriptionVerified,
        SupportCategory::NsfwIssue,
        SupportCategory::AccountUsageError,
        SupportCategory::AccountDeletion,
        SupportCategory::PostDeletionBilling,
        SupportCategory::BotPowerIssue,
        SupportCategory::Other,
    ];

    /// Wire tag as the oracle emits it.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::SubscriptionMissingInfo => "SUBSCRIPTION_MISSING_INFO",
            Self::SubscriptionVerified => "SUBSCRIPTION_VERIFIED",
            Self::NsfwIssue => "NSFW_ISSUE",
            Self::AccountUsageError => "ACCOUNT_USAGE_ERROR",
            Self::AccountDeletion => "ACCOUNT_DELETION",
            Self::PostDeletionBilling => "POST_DELETION_BILLING",
            Self::BotPowerIssue => "BOT_POWER_ISSUE",
            Self::Other => "OTHER",
        }
    }

    /// Parse a wire tag. Unknown tags are rejected.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_tag() == tag)
    }

    /// True for the subscription decision branch (mandatory-field checks apply).
    pub fn is_subscription(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionMissingInfo | Self::SubscriptionVerified
        )
    }
}

impl std::fmt::Display for SupportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for cat in SupportCategory::ALL {
            assert_eq!(SupportCategory::from_tag(cat.as_tag()), Some(cat));
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(SupportCategory::from_tag("REFUND_REQUEST"), None);
        assert_eq!(SupportCategory::from_tag("other"), None);
    }

    #[test]
    fn test_serde_uses_wire_tags() {
        let json = serde_json::to_string(&SupportCategory::NsfwIssue).unwrap();
        assert_eq!(json, "\"NSFW_ISSUE\"");
        let parsed: SupportCategory = serde_json::from_str("\"SUBSCRIPTION_VERIFIED\"").unwrap();
        assert_eq!(parsed, SupportCategory::SubscriptionVerified);
    }
}
