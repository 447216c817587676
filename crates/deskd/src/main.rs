//! Desk Daemon - Support triage dashboard core
//!
//! Syncs the support inbox into a ticket set, classifies tickets with
//! the configured model, and dispatches drafted replies in bulk.

use anyhow::Result;
use clap::{Parser, Subcommand};
use deskd::{commands, Config};

#[derive(Parser)]
#[command(name = "deskd")]
#[command(about = "Support triage desk - classify, draft and dispatch replies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent inbox messages into the session
    Sync {
        /// Messages to fetch (default from config)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Pull backend ticket rows for a date into the session
    DbSync {
        /// Date to fetch, YYYY-MM-DD
        date: chrono::NaiveDate,
    },

    /// Classify selected tickets (or explicit ids)
    Classify {
        /// Ticket ids to classify; empty means the current selection
        ids: Vec<String>,

        /// Override the customer user id (single ticket only)
        #[arg(long)]
        user_id: Option<String>,

        /// Override the payment method (single ticket only)
        #[arg(long)]
        payment_method: Option<String>,

        /// Free-form context forwarded to the classifier (single ticket only)
        #[arg(long)]
        note: Option<String>,
    },

    /// Send the drafted replies for all selected tickets
    Send,

    /// Switch the classification model for this session
    SetModel {
        /// Model identifier forwarded to the classification service
        model: String,
    },

    /// Show session statistics
    Stats,

    /// Show the customer roster
    Customers,

    /// Manage reply templates
    Templates {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List all templates
    List,

    /// Add a template
    Add {
        /// Display name
        #[arg(long)]
        name: String,

        /// Rule text telling the classifier when to pick this template
        #[arg(long)]
        rule: String,

        /// Reply body sent verbatim
        #[arg(long)]
        body: String,

        /// Category tag this template belongs to
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { limit } => commands::sync(&config, limit).await,
        Commands::DbSync { date } => commands::db_sync(&config, date).await,
        Commands::Classify {
            ids,
            user_id,
            payment_method,
            note,
        } => commands::classify(&config, ids, user_id, payment_method, note).await,
        Commands::Send => commands::send(&config).await,
        Commands::SetModel { model } => commands::set_model(&config, model).await,
        Commands::Stats => commands::stats(&config).await,
        Commands::Customers => commands::customers(&config).await,
        Commands::Templates { action } => match action {
            TemplateAction::List => commands::templates_list(&config).await,
            TemplateAction::Add {
                name,
                rule,
                body,
                category,
            } => commands::templates_add(&config, name, rule, body, category).await,
        },
    }
}
