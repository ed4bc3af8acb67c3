//! # TaskDeck — project-management notification backend
//!
//! Host process: wires the project database, the durable action store, the
//! SMTP mailer, the reminder workflow, the delay scheduler, and the HTTP
//! ingest gateway. Every component is constructed here and passed down
//! explicitly; nothing holds a global client.
//!
//! Usage:
//!   taskdeck                       # Start with ~/.taskdeck/config.toml
//!   taskdeck --config deck.toml    # Custom config
//!   taskdeck --port 8080           # Override ingest port

mod server;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use taskdeck_channels::{LogNotifier, Mailer};
use taskdeck_core::config::TaskDeckConfig;
use taskdeck_core::traits::Notifier;
use taskdeck_db::ProjectDb;
use taskdeck_scheduler::{
    ActionStore, DueRecheckHandler, ReminderWorkflow, Scheduler, TASK_DUE_RECHECK,
};

#[derive(Parser)]
#[command(
    name = "taskdeck",
    version,
    about = "📋 TaskDeck — task assignment notifications & due-date reminders"
)]
struct Cli {
    /// Path to config file (default: ~/.taskdeck/config.toml)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Ingest gateway port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(shellexpand::tilde(p).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "taskdeck=debug,tower_http=debug"
    } else {
        "taskdeck=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => TaskDeckConfig::load_from(path)?,
        None => TaskDeckConfig::load()?,
    };
    let port = cli.port.unwrap_or(config.gateway.port);

    let actions_path = expand_path(&config.database.actions_db);
    let tasks_path = expand_path(&config.database.tasks_db);

    // Explicit construction, explicit lifecycle: open at startup, share by Arc
    let directory = Arc::new(ProjectDb::open(&tasks_path)?);
    let store = Arc::new(ActionStore::open(&actions_path)?);

    let notifier: Arc<dyn Notifier> = if config.smtp.enabled {
        Arc::new(Mailer::new(config.smtp.clone()))
    } else {
        tracing::warn!("⚠️ SMTP disabled — emails will be logged, not sent");
        Arc::new(LogNotifier)
    };

    let workflow = Arc::new(ReminderWorkflow::new(
        directory.clone(),
        notifier.clone(),
        store.clone(),
    ));

    let mut scheduler = Scheduler::new(store.clone(), config.scheduler.poll_interval_secs);
    scheduler.register_handler(
        TASK_DUE_RECHECK,
        Arc::new(DueRecheckHandler::new(directory.clone(), notifier.clone())),
    );
    let scheduler = Arc::new(scheduler);

    println!("📋 TaskDeck v{}", env!("CARGO_PKG_VERSION"));
    println!("   🌐 Ingest API:  http://{}:{}", config.gateway.host, port);
    println!("   🗄️  Actions DB:  {}", actions_path.display());
    println!("   🗄️  Tasks DB:    {}", tasks_path.display());
    println!(
        "   ⏰ Poll cycle:  every {}s",
        config.scheduler.poll_interval_secs
    );
    println!();

    let sched = scheduler.clone();
    let loop_handle = tokio::spawn(async move { sched.run().await });

    server::serve(workflow, store, directory, &config.gateway.host, port).await?;

    // the gateway drained on ctrl-c; stop the polling loop too
    scheduler.shutdown();
    loop_handle.await.ok();
    Ok(())
}
