//! Bulk classification and bulk send behavior under partial failure.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use desk_shared::{
    Classification, DeskError, SupportCategory, TemplateStore, Ticket, TicketMetadata,
    TicketSource, TicketStatus,
};
use deskd::gateway::{MailGateway, OutgoingReply};
use deskd::oracle::{ClassificationOracle, ClassifyRequest, ImageInsights};
use deskd::store::TicketSet;
use deskd::{BulkDispatcher, TriageEngine};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

fn ticket(id: &str, status: TicketStatus) -> Ticket {
    Ticket {
        id: id.into(),
        thread_id: format!("thread_{id}"),
        message_id: format!("<{id}@mail>"),
        source: TicketSource::Mail,
        sender: format!("{id}@example.com"),
        sender_name: id.to_uppercase(),
        subject: "Paid but no credits".into(),
        body: "I paid via Stripe yesterday and my plan is still locked.".into(),
        timestamp: Utc.with_ymd_and_hms(2026, 8, 20, 9, 0, 0).unwrap(),
        is_read: false,
        status,
        attachments: vec![],
        classification: None,
        agent_notes: None,
        sent_reply: None,
        selected: true,
    }
}

fn verdict(category: SupportCategory, draft: &str) -> Classification {
    Classification {
        category,
        confidence: 0.9,
        should_auto_send: false,
        reply_draft: draft.into(),
        reasoning_summary: None,
        thread_summary: Some("Customer paid, credits missing.".into()),
        metadata: TicketMetadata::default(),
        selected_template_id: None,
    }
}

fn classified(id: &str, status: TicketStatus, draft: &str) -> Ticket {
    let mut t = ticket(id, status);
    t.classification = Some(verdict(SupportCategory::Other, draft));
    t
}

/// Oracle double that fails for any subject containing a marker word.
struct ScriptedOracle {
    fail_bodies: HashSet<String>,
}

impl ScriptedOracle {
    fn new(fail_bodies: &[&str]) -> Self {
        Self {
            fail_bodies: fail_bodies.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ClassificationOracle for ScriptedOracle {
    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification, DeskError> {
        if self.fail_bodies.iter().any(|m| request.body.contains(m)) {
            return Err(DeskError::Oracle("truncated model output".into()));
        }
        Ok(verdict(
            SupportCategory::SubscriptionVerified,
            "Dear Customer, your subscription is verified and active.",
        ))
    }

    async fn classify_image(
        &self,
        _bytes: &[u8],
        _mime_type: &str,
        _context: &str,
    ) -> Result<ImageInsights, DeskError> {
        Err(DeskError::Oracle("not scripted".into()))
    }
}

/// Gateway double recording sends and failing scripted recipients.
#[derive(Default)]
struct ScriptedGateway {
    fail_to: HashSet<String>,
    auth_expire_at: Option<usize>,
    sent: Mutex<Vec<OutgoingReply>>,
    attempts: Mutex<usize>,
}

#[async_trait]
impl MailGateway for ScriptedGateway {
    async fn fetch_recent(&self, _limit: usize) -> Result<Vec<Ticket>, DeskError> {
        Ok(vec![])
    }

    async fn fetch_attachment(
        &self,
        _ticket_id: &str,
        _attachment_id: &str,
    ) -> Result<Vec<u8>, DeskError> {
        Ok(vec![])
    }

    async fn send_reply(&self, outgoing: &OutgoingReply) -> Result<(), DeskError> {
        let mut attempts = self.attempts.lock().unwrap();
        *attempts += 1;
        if let Some(at) = self.auth_expire_at {
            if *attempts >= at {
                return Err(DeskError::AuthExpired);
            }
        }
        if self.fail_to.contains(&outgoing.to) {
            return Err(DeskError::SendFailed("550 mailbox unavailable".into()));
        }
        self.sent.lock().unwrap().push(outgoing.clone());
        Ok(())
    }
}

fn dispatcher(oracle: ScriptedOracle, gateway: Arc<ScriptedGateway>) -> BulkDispatcher {
    let engine = Arc::new(TriageEngine::new(Arc::new(oracle)));
    BulkDispatcher::new(engine, gateway)
}

#[tokio::test]
async fn test_bulk_classify_partial_failure_isolates_items() {
    let d = dispatcher(
        ScriptedOracle::new(&["POISON"]),
        Arc::new(ScriptedGateway::default()),
    );

    let mut bad = ticket("b", TicketStatus::New);
    bad.body = "POISON payload".into();
    let selected = vec![ticket("a", TicketStatus::New), bad, ticket("c", TicketStatus::New)];

    let outcome = d
        .bulk_classify(selected, &[], &TemplateStore::defaults())
        .await
        .unwrap();

    assert_eq!(outcome.updated.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].0, "b");

    // The failed ticket produced no update; applying the batch leaves it untouched.
    let mut set = TicketSet::new(vec![
        ticket("a", TicketStatus::New),
        {
            let mut b = ticket("b", TicketStatus::New);
            b.body = "POISON payload".into();
            b
        },
        ticket("c", TicketStatus::New),
    ]);
    set.apply_updates(outcome.updated);
    assert_eq!(set.get("b").unwrap().status, TicketStatus::New);
    assert!(set.get("b").unwrap().classification.is_none());
    assert_eq!(set.get("a").unwrap().status, TicketStatus::InProgress);
    assert!(set.get("a").unwrap().classification.is_some());
}

#[tokio::test]
async fn test_bulk_classify_excludes_resolved() {
    let d = dispatcher(
        ScriptedOracle::new(&[]),
        Arc::new(ScriptedGateway::default()),
    );

    let selected = vec![
        ticket("open", TicketStatus::New),
        ticket("done", TicketStatus::Resolved),
    ];
    let outcome = d
        .bulk_classify(selected, &[], &TemplateStore::defaults())
        .await
        .unwrap();

    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.updated[0].id, "open");
}

#[tokio::test]
async fn test_bulk_classify_nothing_eligible_is_validation_error() {
    let d = dispatcher(
        ScriptedOracle::new(&[]),
        Arc::new(ScriptedGateway::default()),
    );

    let err = d
        .bulk_classify(
            vec![ticket("done", TicketStatus::Resolved)],
            &[],
            &TemplateStore::defaults(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::Validation(_)));
}

#[tokio::test]
async fn test_bulk_classify_total_failure_is_distinct_error() {
    let d = dispatcher(
        ScriptedOracle::new(&["paid"]),
        Arc::new(ScriptedGateway::default()),
    );

    let err = d
        .bulk_classify(
            vec![ticket("a", TicketStatus::New), ticket("b", TicketStatus::New)],
            &[],
            &TemplateStore::defaults(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::Oracle(_)));
}

#[tokio::test]
async fn test_bulk_send_partial_failure_counts() {
    let gateway = Arc::new(ScriptedGateway {
        fail_to: ["b@example.com".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let d = dispatcher(ScriptedOracle::new(&[]), Arc::clone(&gateway));

    let draft = "Dear Customer, thank you for your patience.";
    let selected = vec![
        classified("a", TicketStatus::ReadyToResolve, draft),
        classified("b", TicketStatus::ReadyToResolve, draft),
        classified("c", TicketStatus::ReadyToResolve, draft),
    ];

    let mut progress = Vec::new();
    let report = d
        .bulk_send(selected, |pct| progress.push(pct))
        .await
        .unwrap();

    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);
    assert!(!report.all_failed());
    assert_eq!(progress, vec![33, 67, 100]);

    // Successes are resolved with the sent text captured; the failure
    // produced no update at all.
    assert_eq!(report.updated.len(), 2);
    for t in &report.updated {
        assert_eq!(t.status, TicketStatus::Resolved);
        assert!(t.is_read);
        assert!(!t.selected);
        assert_eq!(t.sent_reply.as_deref(), Some(draft));
    }
    assert!(report.updated.iter().all(|t| t.id != "b"));
    assert_eq!(gateway.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_bulk_send_skips_short_drafts_and_resolved() {
    let gateway = Arc::new(ScriptedGateway::default());
    let d = dispatcher(ScriptedOracle::new(&[]), Arc::clone(&gateway));

    let selected = vec![
        classified("ok", TicketStatus::ReadyToResolve, "Dear Customer, all set now."),
        classified("short", TicketStatus::InProgress, "thanks"),
        classified("done", TicketStatus::Resolved, "Dear Customer, already sent."),
        ticket("blank", TicketStatus::New),
    ];

    let report = d.bulk_send(selected, |_| {}).await.unwrap();
    assert_eq!(report.success, 1);
    assert_eq!(report.skipped, 3);
    assert_eq!(gateway.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bulk_send_nothing_ready_is_validation_error() {
    let d = dispatcher(
        ScriptedOracle::new(&[]),
        Arc::new(ScriptedGateway::default()),
    );

    let err = d
        .bulk_send(vec![ticket("blank", TicketStatus::New)], |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::Validation(_)));
}

#[tokio::test]
async fn test_bulk_send_auth_expiry_stops_batch() {
    let gateway = Arc::new(ScriptedGateway {
        auth_expire_at: Some(2),
        ..Default::default()
    });
    let d = dispatcher(ScriptedOracle::new(&[]), Arc::clone(&gateway));

    let draft = "Dear Customer, thank you for your patience.";
    let selected = vec![
        classified("a", TicketStatus::ReadyToResolve, draft),
        classified("b", TicketStatus::ReadyToResolve, draft),
        classified("c", TicketStatus::ReadyToResolve, draft),
    ];

    let report = d.bulk_send(selected, |_| {}).await.unwrap();
    assert!(report.auth_expired);
    assert_eq!(report.success, 1);
    // The expired attempt plus the never-attempted remainder.
    assert_eq!(report.failed, 2);
    assert_eq!(gateway.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bulk_send_all_failed_flag() {
    let gateway = Arc::new(ScriptedGateway {
        fail_to: ["a@example.com".to_string(), "b@example.com".to_string()]
            .into_iter()
            .collect(),
        ..Default::default()
    });
    let d = dispatcher(ScriptedOracle::new(&[]), gateway);

    let draft = "Dear Customer, thank you for your patience.";
    let selected = vec![
        classified("a", TicketStatus::ReadyToResolve, draft),
        classified("b", TicketStatus::ReadyToResolve, draft),
    ];

    let report = d.bulk_send(selected, |_| {}).await.unwrap();
    assert!(report.all_failed());
    assert_eq!(report.failed, 2);
}
