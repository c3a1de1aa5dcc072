//! # CallClaw — Campaign Execution Engine
//!
//! Turns a list of contacts into a stream of compliant, rate-limited,
//! retried outbound voice calls.
//!
//! Usage:
//!   callclaw                     # Run the scheduler loop (default 60s sweeps)
//!   callclaw --once              # One sweep and exit (for external cron)
//!   callclaw --tick-secs 30      # Custom sweep interval
//!   callclaw --db ./dev.db       # Custom database path

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use callclaw_billing::{HttpUsageGate, PlanUsageGate};
use callclaw_core::CallClawConfig;
use callclaw_core::traits::{CallDispatcher, UsageGate};
use callclaw_core::types::CallOutcome;
use callclaw_db::SqliteStore;
use callclaw_engine::{CampaignEngine, spawn_scheduler};
use callclaw_telephony::{HttpCallDispatcher, MockDispatcher};

#[derive(Parser)]
#[command(
    name = "callclaw",
    version,
    about = "📞 CallClaw — campaign execution engine for AI voice calling"
)]
struct Cli {
    /// Config file path (default ~/.callclaw/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Database path (overrides config)
    #[arg(long)]
    db: Option<String>,

    /// Sweep interval in seconds (overrides config)
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Run a single scheduler sweep and exit (for external cron triggers)
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "callclaw=debug,callclaw_engine=debug,callclaw_db=debug"
    } else {
        "callclaw=info,callclaw_engine=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => CallClawConfig::load_from(Path::new(&expand_path(path)))?,
        None => CallClawConfig::load()?,
    };

    // Open the campaign database
    let db_path = expand_path(cli.db.as_deref().unwrap_or(&config.engine.db_path));
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(SqliteStore::open(Path::new(&db_path))?);
    tracing::info!("💾 Campaign database: {}", db_path);

    // Telephony: real provider when configured, scripted dispatcher otherwise
    let dispatcher: Arc<dyn CallDispatcher> = if config.telephony.api_key.is_empty() {
        tracing::warn!("⚠️ No telephony API key configured — using the mock dispatcher");
        Arc::new(MockDispatcher::new(CallOutcome::Completed))
    } else {
        Arc::new(HttpCallDispatcher::new(config.telephony.clone()))
    };

    // Billing: real usage gate when configured, open in-process gate otherwise
    let usage: Arc<dyn UsageGate> = if config.billing.api_key.is_empty() {
        tracing::warn!("⚠️ No billing API key configured — using the in-process plan gate");
        Arc::new(PlanUsageGate::new(i64::MAX))
    } else {
        Arc::new(HttpUsageGate::new(config.billing.clone()))
    };

    let engine = Arc::new(CampaignEngine::new(
        store,
        dispatcher,
        usage,
        &config.engine,
    ));

    if cli.once {
        engine.process_scheduled_campaigns().await;
        return Ok(());
    }

    let tick_secs = cli.tick_secs.unwrap_or(config.engine.tick_secs);
    spawn_scheduler(engine, tick_secs).await;
    Ok(())
}
