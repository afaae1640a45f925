//! `oracle-consensus` CLI entry point.
//!
//! This binary wires the library's core traits to concrete, out-of-scope
//! collaborators (§6): [`PolymarketClient`] for the market feed,
//! [`OpenRouterProvider`] for the LLM, and [`SqlitePersistence`] for
//! storage. The analysis core itself — the graph, the agents, the fusion
//! math — doesn't know any of this exists; it only sees the traits in
//! `oracle_consensus::interfaces`. Subcommand shape follows the teacher's
//! `src/bin/live_recorder.rs` (`clap::Subcommand` over a small set of
//! operator actions backed by the same library).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use oracle_consensus::agents::AgentRegistry;
use oracle_consensus::clock::SystemClock;
use oracle_consensus::config::Config;
use oracle_consensus::external::{ExternalDataLayer, ExternalDataLayerConfig};
use oracle_consensus::graph::{run_graph, GraphDeps};
use oracle_consensus::harness::AgentHarness;
use oracle_consensus::interfaces::TracingObservabilitySink;
use oracle_consensus::llm::OpenRouterProvider;
use oracle_consensus::market::PolymarketClient;
use oracle_consensus::monitor::{Monitor, QuotaManager};
use oracle_consensus::performance::PerformanceTracker;
use oracle_consensus::persistence::SqlitePersistence;

#[derive(Parser, Debug)]
#[command(name = "oracle-consensus")]
#[command(about = "Prediction-market consensus analysis core")]
struct Args {
    /// Path to a TOML config file; defaults to built-in values (§6).
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database path for persistence; `:memory:` for a scratch run.
    #[arg(long, default_value = "oracle-consensus.db")]
    db: String,

    /// OpenRouter model id passed to every agent invocation.
    #[arg(long, default_value = "anthropic/claude-3.5-sonnet")]
    model: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the workflow graph once for a single market and print the
    /// recommendation.
    Analyze {
        /// Polymarket `conditionId` to analyze.
        condition_id: String,
    },
    /// Start the autonomous monitor and block until Ctrl-C.
    Monitor,
    /// Print the agent performance leaderboard (§4.12).
    Leaderboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("oracle_consensus=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading configuration")?;

    // Per-agent counters/histograms (§4.12) are recorded through the
    // `metrics` facade; this installs the teacher's exporter so they're
    // scrapeable the same way the teacher's own dashboards are.
    if let Err(err) = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([127, 0, 0, 1], 9100))
        .install()
    {
        tracing::warn!(error = %err, "prometheus exporter not installed; continuing without metrics scraping");
    }

    let deps = build_deps(&args, &config).await?;

    match args.command {
        Commands::Analyze { condition_id } => analyze_once(&deps, &condition_id).await,
        Commands::Monitor => run_monitor(deps, &config).await,
        Commands::Leaderboard => {
            for metrics in deps.performance.leaderboard() {
                println!(
                    "{:<24} accuracy={:.3} analyses={:<5} avg_confidence={:.3} error_rate={:.3}",
                    metrics.agent_name, metrics.accuracy_score, metrics.total_analyses, metrics.average_confidence, metrics.error_rate
                );
            }
            Ok(())
        }
    }
}

async fn build_deps(args: &Args, config: &Config) -> Result<Arc<GraphDeps>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;

    let market_client = Arc::new(PolymarketClient::new(http.clone(), config.retry.clone(), Duration::from_secs(15)));

    let llm = match OpenRouterProvider::from_env(http.clone(), args.model.clone()) {
        Ok(provider) => Arc::new(provider) as Arc<dyn oracle_consensus::interfaces::LlmProvider>,
        Err(err) => {
            anyhow::bail!("LLM provider unavailable: {err} (set OPENROUTER_API_KEY)");
        }
    };

    let persistence = if args.db == ":memory:" {
        SqlitePersistence::in_memory().context("opening in-memory persistence")?
    } else {
        SqlitePersistence::open(&args.db).context("opening persistence database")?
    };

    let clock = Arc::new(SystemClock);
    let performance = Arc::new(PerformanceTracker::new(clock.clone(), &config.performance_tracking));
    let observability: Arc<dyn oracle_consensus::interfaces::ObservabilitySink> = Arc::new(TracingObservabilitySink);

    let external = ExternalDataLayer::new(
        ExternalDataLayerConfig {
            cache: config.cache.clone(),
            news: &config.external_data.news,
            polling: &config.external_data.polling,
            social: &config.external_data.social,
            breaker: &config.circuit_breaker,
            rate_limit: &config.rate_limit,
            retry: &config.retry,
        },
        clock.clone(),
        // News/polling/social providers are out-of-scope external
        // collaborators (§6); wiring a concrete adapter is left to a
        // deployment that has API keys for one. With none configured the
        // fetch layer always falls through to stale-or-empty (§4.6).
        None,
        None,
        None,
        observability.clone(),
    );

    let harness = Arc::new(AgentHarness::new(llm, performance.clone()));

    Ok(Arc::new(GraphDeps {
        market_client,
        persistence: Arc::new(persistence),
        external: Arc::new(external),
        registry: Arc::new(AgentRegistry::default_agents()),
        harness,
        performance,
        config: Arc::new(config.clone()),
        observability,
    }))
}

async fn analyze_once(deps: &Arc<GraphDeps>, condition_id: &str) -> Result<()> {
    match run_graph(deps, condition_id, Utc::now()).await {
        Ok(outcome) => {
            match outcome.recommendation {
                Some(rec) => {
                    println!("{:#?}", rec);
                }
                None => println!("no recommendation produced (graph skipped to completion without one)"),
            }
            tracing::info!(condition_id, audit_entries = outcome.audit_log.len(), "run complete");
            Ok(())
        }
        Err(err) => {
            tracing::error!(condition_id, error = %err.error, "run aborted");
            Err(anyhow::anyhow!(err))
        }
    }
}

async fn run_monitor(deps: Arc<GraphDeps>, config: &Config) -> Result<()> {
    let quota = Arc::new(QuotaManager::new(config.rate_limit.daily_quota, Arc::new(SystemClock)));
    let monitor = Monitor::new(deps, quota, config.monitor.interval_ms);
    monitor.start();

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown requested, stopping monitor gracefully");
    monitor.stop().await;
    Ok(())
}
