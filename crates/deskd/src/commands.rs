//! Command implementations for the deskd CLI.
//!
//! Each command loads the session snapshot, performs its operation, and
//! saves the snapshot back when anything changed.

use crate::config::Config;
use crate::dispatcher::BulkDispatcher;
use crate::engine::{TriageEngine, TriageOverrides};
use crate::gmail::GmailClient;
use crate::oracle::GeminiClient;
use crate::store::SessionStore;
use anyhow::{Context, Result};
use desk_shared::{
    aggregate_customers, project_stats, recommended_template, SupportCategory, Template,
};
use std::sync::Arc;
use tracing::{info, warn};

fn open_store(config: &Config) -> Result<SessionStore> {
    SessionStore::load(&config.store.snapshot_path, &config.oracle.model)
        .context("failed to load session snapshot")
}

fn gateway(config: &Config) -> Result<Arc<GmailClient>> {
    let token = std::fs::read_to_string(&config.gateway.token_path)
        .with_context(|| format!("no access token at {}", config.gateway.token_path.display()))?;
    Ok(Arc::new(GmailClient::new(token.trim().to_string())))
}

fn dispatcher(config: &Config, store: &SessionStore) -> Result<BulkDispatcher> {
    let oracle = Arc::new(GeminiClient::new(
        config.api_key()?,
        Some(store.active_model.clone()),
    ));
    let engine = Arc::new(TriageEngine::new(oracle).with_model(store.active_model.clone()));
    Ok(BulkDispatcher::new(engine, gateway(config)?))
}

/// Fetch recent inbox messages and merge them into the session.
pub async fn sync(config: &Config, limit: Option<usize>) -> Result<()> {
    use crate::gateway::MailGateway;

    let mut store = open_store(config)?;
    let gateway = gateway(config)?;
    let limit = limit.unwrap_or(config.gateway.fetch_limit);

    let fetched = gateway.fetch_recent(limit).await?;
    let count = fetched.len();
    let added = store.tickets.extend_new(fetched);
    store.save()?;

    println!("{count} tickets fetched, {added} new");
    println!("{} tickets in session", store.tickets.len());
    Ok(())
}

/// Pull backend ticket rows for a date into the session.
pub async fn db_sync(config: &Config, date: chrono::NaiveDate) -> Result<()> {
    use crate::db::{StaticTicketDatabase, TicketDatabase};

    let mut store = open_store(config)?;
    let db = StaticTicketDatabase::demo(date);
    let rows = db.fetch_by_date(date).await?;
    let fetched = rows.len();
    let added = store.tickets.extend_new(rows);
    store.save()?;

    println!("{fetched} database tickets for {date}, {added} new");
    println!("{} tickets in session", store.tickets.len());
    Ok(())
}

/// Classify the selected tickets (or an explicit id list).
///
/// A single explicit id goes through the engine directly: that path
/// scans image attachments for payment evidence and may re-triage an
/// already resolved ticket. Everything else runs through the bulk
/// dispatcher, which filters terminal tickets.
pub async fn classify(
    config: &Config,
    ids: Vec<String>,
    user_id: Option<String>,
    payment_method: Option<String>,
    note: Option<String>,
) -> Result<()> {
    let mut store = open_store(config)?;

    let mut overrides = TriageOverrides {
        user_id,
        payment_method,
        supplement: note,
    };

    // Overrides apply per ticket; a whole-batch override would smear
    // one customer's details across unrelated tickets.
    if overrides.as_agent_notes().is_some() && ids.len() != 1 {
        anyhow::bail!("overrides require exactly one explicit ticket id");
    }

    let outcome = if ids.len() == 1 {
        let ticket = store
            .tickets
            .get(&ids[0])
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown ticket id {}", ids[0]))?;

        let oracle = Arc::new(GeminiClient::new(
            config.api_key()?,
            Some(store.active_model.clone()),
        ));
        let engine = TriageEngine::new(oracle).with_model(store.active_model.clone());

        // Best effort: a failed scan never blocks the classification.
        if ticket.has_image_attachment() {
            match gateway(config) {
                Ok(gw) => match engine.scan_evidence(&ticket, gw.as_ref()).await {
                    Ok(Some(insights)) => overrides.absorb_insights(&insights),
                    Ok(None) => {}
                    Err(e) => warn!("attachment scan skipped: {e}"),
                },
                Err(e) => warn!("attachment scan skipped: {e}"),
            }
        }

        let updated = engine
            .classify(&ticket, store.tickets.all(), &overrides, &store.templates)
            .await?;
        crate::dispatcher::BatchOutcome {
            updated: vec![updated],
            failures: vec![],
        }
    } else {
        let targets = if ids.is_empty() {
            store.tickets.selected()
        } else {
            ids.iter()
                .filter_map(|id| store.tickets.get(id).cloned())
                .collect()
        };
        let all = store.tickets.all().to_vec();
        dispatcher(config, &store)?
            .bulk_classify(targets, &all, &store.templates)
            .await?
    };

    for ticket in &outcome.updated {
        if let Some(c) = &ticket.classification {
            let template = c
                .selected_template_id
                .clone()
                .unwrap_or_else(|| recommended_template(c.category).to_string());
            println!("{}: {} -> {} [{}]", ticket.id, c.category, ticket.status, template);
        }
    }
    for (id, reason) in &outcome.failures {
        println!("{id}: FAILED ({reason})");
    }

    store.tickets.apply_updates(outcome.updated);
    store.save()?;
    Ok(())
}

/// Send the drafted replies for all selected tickets.
pub async fn send(config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    let dispatcher = dispatcher(config, &store)?;

    let selected = store.tickets.selected();
    let report = dispatcher
        .bulk_send(selected, |pct| info!("bulk send: {pct}%"))
        .await?;

    store.tickets.apply_updates(report.updated);
    store.save()?;

    println!(
        "{} sent, {} failed, {} need review",
        report.success, report.failed, report.skipped
    );
    if report.auth_expired {
        println!("access token expired; refresh it and retry the remaining tickets");
    }
    Ok(())
}

/// Switch the classification model for this session.
pub async fn set_model(config: &Config, model: String) -> Result<()> {
    let mut store = open_store(config)?;
    store.active_model = model;
    store.save()?;

    println!("active model: {}", store.active_model);
    Ok(())
}

/// Print the session dashboard numbers.
pub async fn stats(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let stats = project_stats(store.tickets.all());

    println!("tickets: {} ({} mail, {} database)", stats.total, stats.mail_count, stats.db_count);
    println!("  new: {}  in progress: {}  resolved: {}", stats.new, stats.in_progress, stats.resolved);
    println!(
        "extraction: {} uids, {} payment methods, {} proofs, {} complete",
        stats.metrics.uid_count,
        stats.metrics.payment_method_count,
        stats.metrics.proof_count,
        stats.metrics.perfect_count
    );
    Ok(())
}

/// Print the customer roster aggregated from the ticket set.
pub async fn customers(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let roster = aggregate_customers(store.tickets.all());

    for customer in &roster {
        println!(
            "{} <{}>  uid={}  tickets={} ({} resolved)  tags={}",
            customer.name,
            customer.email,
            customer.user_id,
            customer.total_tickets,
            customer.resolved_count,
            customer.tags.join(",")
        );
    }
    println!("{} customers", roster.len());
    Ok(())
}

/// List the reply templates.
pub async fn templates_list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    for template in store.templates.all() {
        let category = template
            .category
            .map(|c| c.to_string())
            .unwrap_or_else(|| "any".to_string());
        println!("{}  {}  [{}]", template.id, template.name, category);
    }
    Ok(())
}

/// Add an operator-defined template.
pub async fn templates_add(
    config: &Config,
    name: String,
    rule: String,
    body: String,
    category: Option<String>,
) -> Result<()> {
    let mut store = open_store(config)?;

    let category = match category {
        Some(tag) => Some(
            SupportCategory::from_tag(&tag)
                .ok_or_else(|| anyhow::anyhow!("unknown category tag: {tag}"))?,
        ),
        None => None,
    };

    let template = Template::new(&name, &rule, &body, category);
    let id = template.id.clone();
    store.templates.add(template)?;
    store.save()?;

    println!("template {id} added");
    Ok(())
}
