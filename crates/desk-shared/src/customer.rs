//! Customer roster derived from the ticket set.
//!
//! Customers have no independent storage or identity: the roster is a
//! pure function of the current tickets, recomputed on every read.

use crate::category::SupportCategory;
use crate::ticket::{Ticket, TicketSource, TicketStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel for a customer whose user id has not been extracted yet.
pub const UNLINKED_USER_ID: &str = "UNLINKED";

/// A customer crosses the FREQUENT threshold above this many tickets.
pub const FREQUENT_THRESHOLD: usize = 3;

/// One thread entry in a customer's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    pub source: TicketSource,
    pub subject: String,
    pub status: TicketStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<SupportCategory>,
}

/// Derived per-customer aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Lowercased sender identity
    pub email: String,
    /// Display name, from the customer's latest ticket
    pub name: String,
    /// Linked user id; first non-missing extraction wins and is never
    /// overwritten by a later, possibly conflicting id
    pub user_id: String,
    /// Category of the most recent ticket
    pub latest_category: SupportCategory,
    pub tags: Vec<String>,
    pub threads: Vec<ThreadSummary>,
    pub total_tickets: usize,
    pub resolved_count: usize,
    pub last_active: DateTime<Utc>,
}

impl Customer {
    fn new(key: String, first: &Ticket) -> Self {
        Self {
            email: key,
            name: first.sender_name.clone(),
            user_id: UNLINKED_USER_ID.to_string(),
            latest_category: SupportCategory::Other,
            tags: vec![],
            threads: vec![],
            total_tickets: 0,
            resolved_count: 0,
            last_active: first.timestamp,
        }
    }

    /// True once a user id has been extracted from any ticket.
    pub fn is_linked(&self) -> bool {
        self.user_id != UNLINKED_USER_ID
    }
}

/// Build the customer roster from the ticket set.
///
/// Tickets are sorted ascending by timestamp before the scan; the
/// "latest wins" fields (name, latest category, last active) rely on
/// that order, so storage order never matters. The linked user id is
/// first-write-sticky: conflicting ids seen later are ignored, with no
/// reconciliation.
pub fn aggregate_customers(tickets: &[Ticket]) -> Vec<Customer> {
    let mut ordered: Vec<&Ticket> = tickets.iter().collect();
    ordered.sort_by_key(|t| t.timestamp);

    // BTreeMap keeps roster order stable across recomputations.
    let mut roster: BTreeMap<String, Customer> = BTreeMap::new();

    for ticket in ordered {
        let key = ticket.customer_key();
        let customer = roster
            .entry(key.clone())
            .or_insert_with(|| Customer::new(key, ticket));

        if !customer.is_linked() {
            if let Some(uid) = ticket
                .classification
                .as_ref()
                .and_then(|c| c.metadata.user_id.as_deref())
            {
                customer.user_id = uid.to_string();
            }
        }

        // Ascending scan: the last write is the true latest.
        customer.name = ticket.sender_name.clone();
        customer.last_active = ticket.timestamp;
        if let Some(c) = &ticket.classification {
            customer.latest_category = c.category;
        }

        customer.threads.push(ThreadSummary {
            id: ticket.id.clone(),
            source: ticket.source,
            subject: ticket.subject.clone(),
            status: ticket.status,
            timestamp: ticket.timestamp,
            category: ticket.classification.as_ref().map(|c| c.category),
        });
        customer.total_tickets += 1;
        if ticket.status == TicketStatus::Resolved {
            customer.resolved_count += 1;
        }
    }

    let mut customers: Vec<Customer> = roster.into_values().collect();
    for customer in &mut customers {
        customer.tags = derive_tags(customer);
    }
    customers
}

/// Informational filter labels; no business logic hangs off these.
fn derive_tags(customer: &Customer) -> Vec<String> {
    let mut tags = Vec::new();
    if customer.is_linked() {
        tags.push("VERIFIED_UID".to_string());
    }
    let category_tag = customer.latest_category.as_tag();
    if category_tag.contains("SUBSCRIPTION") {
        tags.push("PAID".to_string());
    }
    if customer.latest_category == SupportCategory::SubscriptionVerified {
        tags.push("VIP_READY".to_string());
    }
    if customer.total_tickets > FREQUENT_THRESHOLD {
        tags.push("FREQUENT".to_string());
    }
    tags
}
