use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::{Parser, Subcommand};

use mail_intent::auth::AuthorizedUserToken;
use mail_intent::config::AppConfig;
use mail_intent::error::{ConfigError, Result};
use mail_intent::llm::create_provider;
use mail_intent::mail::GmailClient;
use mail_intent::pipeline::handlers::{CompanyResearchHandler, MeetingHandler};
use mail_intent::pipeline::{IntentClassifier, IntentRouter, Orchestrator, RunSummary, spawn_poller};
use mail_intent::search::{KnowledgeGraph, SerpApiClient, TavilyClient, WebSearch};
use mail_intent::store::{Database, LibSqlBackend};

#[derive(Parser)]
#[command(name = "mail-intent")]
#[command(about = "Classify recent Gmail messages by intent and store enriched results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one pass and print the summary.
    Run,
    /// Run passes on a fixed interval until interrupted.
    Poll {
        /// Overrides MAIL_INTENT_POLL_INTERVAL_SECS.
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Show stored results in dashboard order.
    Results {
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Delete results older than the given number of days.
    Prune {
        #[arg(long)]
        keep_days: u32,
    },
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // A missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?;

    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    match cli.command {
        Command::Run => {
            let orchestrator = build_orchestrator(&config, db).await?;
            let summary = orchestrator.run_once().await?;
            print_summary(&summary);
        }
        Command::Poll { interval_secs } => {
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or(config.poll_interval);
            if interval.is_zero() {
                return Err(ConfigError::InvalidValue {
                    key: "--interval-secs".into(),
                    message: "must be positive".into(),
                }
                .into());
            }
            let orchestrator = Arc::new(build_orchestrator(&config, db).await?);
            eprintln!("   Polling every {}s. Ctrl-C to stop.\n", interval.as_secs());

            let (mut handle, shutdown) = spawn_poller(orchestrator, interval);
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    shutdown.store(true, Ordering::Relaxed);
                    handle.abort();
                    eprintln!("\nStopped.");
                }
                _ = &mut handle => {
                    eprintln!("Poller stopped after a credential failure. Re-authenticate and restart.");
                    std::process::exit(1);
                }
            }
        }
        Command::Results { limit, json } => {
            let rows: Vec<_> = db
                .list_results(limit)
                .await?
                .iter()
                .map(|r| r.dashboard_row())
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                eprintln!("No results stored.");
            } else {
                for row in &rows {
                    let content = match &row.content {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    println!(
                        "{:<18} {:<24} {:<40} {}",
                        row.intent, row.company, row.headline, content
                    );
                }
            }
        }
        Command::Prune { keep_days } => {
            let removed = db.prune_results(keep_days).await?;
            eprintln!("Removed {removed} result(s) older than {keep_days} day(s).");
        }
    }

    Ok(())
}

/// Wire the collaborators for a pipeline run.
async fn build_orchestrator(
    config: &AppConfig,
    db: Arc<dyn Database>,
) -> Result<Orchestrator> {
    let llm_config = config.llm_config()?;
    let llm = create_provider(&llm_config)?;

    let tokens = Arc::new(AuthorizedUserToken::load(&config.token_path, config.http_timeout).await?);
    let gmail = Arc::new(GmailClient::new(config.gmail.clone(), tokens)?);

    let search: Option<Arc<dyn WebSearch>> = match config.search.tavily_api_key.clone() {
        Some(key) => Some(Arc::new(TavilyClient::new(key, config.http_timeout)?)),
        None => None,
    };
    let knowledge_graph: Option<Arc<dyn KnowledgeGraph>> =
        match config.search.serpapi_api_key.clone() {
            Some(key) => Some(Arc::new(SerpApiClient::new(key, config.http_timeout)?)),
            None => None,
        };

    eprintln!("📬 mail-intent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mailbox: {}", config.gmail.user_id);
    eprintln!("   Model: {}", llm_config.model);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!(
        "   Web search: {}",
        if search.is_some() { "tavily" } else { "disabled" }
    );
    eprintln!(
        "   Knowledge graph: {}",
        if knowledge_graph.is_some() { "serpapi" } else { "disabled" }
    );

    Ok(Orchestrator::new(
        gmail,
        config.filter.clone(),
        IntentClassifier::new(llm.clone()),
        IntentRouter::new(
            CompanyResearchHandler::new(llm, search, knowledge_graph),
            MeetingHandler::new(),
        ),
        db,
    ))
}

fn print_summary(summary: &RunSummary) {
    eprintln!(
        "Listed {} (complete: {}), already processed {}, persisted {}, no action {}, skipped {}",
        summary.listed,
        summary.listing_complete,
        summary.already_processed,
        summary.persisted,
        summary.no_action,
        summary.skipped.len()
    );
    for skipped in &summary.skipped {
        eprintln!(
            "   {} [{}] {}",
            skipped.message_ref, skipped.stage, skipped.reason
        );
    }
}
