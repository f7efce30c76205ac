//! Campaign Autopilot: outreach lifecycle, follow-up scheduling and content
//! rotation behind a REST API.

use std::sync::Arc;
use std::time::Duration;

use autopilot_api::ApiServer;
use autopilot_core::config::AppConfig;
use autopilot_engine::{spawn_research_workers, BackoffPolicy, CampaignEngine, Collaborators, ResearchQueue};
use autopilot_store::InMemoryStore;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-autopilot")]
#[command(about = "Outreach campaign lifecycle and content rotation engine")]
#[command(version)]
struct Cli {
    /// Path to a config file (TOML, YAML or JSON)
    #[arg(long, env = "AUTOPILOT_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "AUTOPILOT__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "AUTOPILOT__API__HTTP_PORT")]
    http_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Run the API, research workers and the periodic follow-up cycle
    #[default]
    Serve,
    /// Run a single follow-up cycle and print its report. The built-in store
    /// is in-memory and starts empty, so this reports nothing until a
    /// persistent store is wired in; use `POST /api/v1/follow-ups/run`
    /// against a running server instead
    Cycle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_autopilot=info,autopilot=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        destinations = config.distribution.destinations.len(),
        "Configuration loaded"
    );

    let store = Arc::new(InMemoryStore::new());
    let engine = CampaignEngine::new(&config, store, Collaborators::from_config(&config));

    match cli.command.unwrap_or_default() {
        Command::Cycle => {
            let report = engine.process_due_follow_ups(chrono::Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Serve => serve(config, engine).await,
    }
}

async fn serve(config: AppConfig, engine: CampaignEngine) -> anyhow::Result<()> {
    info!("Campaign Autopilot starting up");

    let engine = if config.research.enabled {
        let (queue, receiver) = ResearchQueue::bounded(config.research.queue_capacity);
        // Workers take the engine from before the queue is attached.
        let handles = spawn_research_workers(
            engine.clone(),
            &queue,
            receiver,
            BackoffPolicy::from_config(&config.research),
            config.research.workers,
        );
        info!(workers = handles.len(), "Research workers started");
        engine.with_research_queue(queue)
    } else {
        info!("Background research disabled");
        engine
    };

    let api_server = ApiServer::new(config.clone(), engine.clone());
    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    let cycle_engine = engine.clone();
    let period = Duration::from_secs(config.scheduler.cycle_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match cycle_engine.process_due_follow_ups(chrono::Utc::now()).await {
                Ok(report) if report.total_due > 0 => info!(
                    processed = report.processed,
                    total_due = report.total_due,
                    failed = report.failures().count(),
                    "Follow-up cycle finished"
                ),
                Ok(_) => {}
                Err(e) => error!(error = %e, "Follow-up cycle failed"),
            }
        }
    });

    info!("Campaign Autopilot is ready to serve traffic");
    api_server.start_http().await
}
