use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use glidepath::adapters::{NoopPublisher, PostgresStore, Publisher, WebhookPublisher};
use glidepath::collector::BinanceCandles;
use glidepath::config::{AppConfig, SharedPools};
use glidepath::engine::{
    CycleFinalizer, TargetController, TickOutcome, TradeGenerator, TradeMatcher, YieldDistributor,
};
use glidepath::error::Result;
use glidepath::persistence::Store;
use glidepath::services::{AdminApi, HealthServer, HealthState, Metrics};
use glidepath::supervisor::{spawn_supervised, SupervisorConfig};
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glidepath", about = "Target-seeking trade event generator")]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the generator and finalizer loops (default)
    Run,
    /// Generate a single trade event immediately and exit
    GenerateOnce,
    /// Finalize a closed cycle (defaults to the most recently closed one)
    Finalize {
        /// Cycle date, YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show the open cycle's progress
    Progress,
    /// Re-send the settlement notification for a finalized cycle
    Publish {
        /// Cycle date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// Override the stored aggregate percentage
        #[arg(long)]
        pct: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match AppConfig::load_from(&cli.config_dir) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(errors) = config.validate() {
        eprintln!("Invalid configuration:");
        for e in &errors {
            eprintln!("  - {}", e);
        }
        std::process::exit(1);
    }

    init_logging(&config);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_service(config).await,
        Commands::GenerateOnce => {
            let components = Components::build(&config).await?;
            match components.admin().force_generate().await? {
                TickOutcome::Generated(id) => println!("Generated trade event #{}", id),
                TickOutcome::NoCandidate => println!("No acceptable candidate found"),
                TickOutcome::Closed => println!("Cycle is closed, nothing generated"),
            }
            Ok(())
        }
        Commands::Finalize { date } => {
            let components = Components::build(&config).await?;
            let finalized = components.admin().force_finalize(date).await?;
            if finalized {
                println!("Cycle finalized");
            } else {
                println!("Cycle was already finalized");
            }
            Ok(())
        }
        Commands::Progress => {
            let components = Components::build(&config).await?;
            let progress = components.admin().progress().await?;
            println!(
                "Cycle {}: {:+.2}% over {} events, {:.1}h remaining ({})",
                progress.date,
                progress.cumulative_pct,
                progress.events_count,
                progress.hours_remaining,
                if progress.is_active { "open" } else { "closed" },
            );
            Ok(())
        }
        Commands::Publish { date, pct } => {
            let components = Components::build(&config).await?;
            let aggregate = components.admin().republish_settlement(date, pct).await?;
            println!("Published settlement for {}: {:+.2}%", date, aggregate);
            Ok(())
        }
    }
}

/// Everything wired together against a live database.
struct Components {
    postgres: Arc<PostgresStore>,
    generator: Arc<TradeGenerator<BinanceCandles>>,
    finalizer: Arc<CycleFinalizer>,
    store: Arc<dyn Store>,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<Metrics>,
}

impl Components {
    async fn build(config: &AppConfig) -> Result<Self> {
        let postgres = Arc::new(
            PostgresStore::new(&config.database.url, config.database.max_connections).await?,
        );
        postgres.migrate().await?;

        let store: Arc<dyn Store> = postgres.clone();
        let publisher: Arc<dyn Publisher> = match &config.publisher.webhook_url {
            Some(url) => Arc::new(WebhookPublisher::new(url.clone())),
            None => match WebhookPublisher::from_env() {
                Some(p) => Arc::new(p),
                None => {
                    info!("No webhook configured, publishing disabled");
                    Arc::new(NoopPublisher)
                }
            },
        };
        let metrics = Arc::new(Metrics::new());

        let engine = config.engine.clone();
        let matcher = TradeMatcher::new(BinanceCandles::new(), engine.clone());
        let controller = TargetController::new(engine.clone());
        let generator = Arc::new(TradeGenerator::new(
            Arc::clone(&store),
            matcher,
            controller,
            Arc::clone(&publisher),
            Arc::clone(&metrics),
            engine.clone(),
        ));

        let pools = SharedPools::new(config.pools.clone());
        let distributor = YieldDistributor::new(Arc::clone(&store), pools);
        let finalizer = Arc::new(CycleFinalizer::new(
            Arc::clone(&store),
            distributor,
            Arc::clone(&publisher),
            Arc::clone(&metrics),
            engine,
        ));

        Ok(Self {
            postgres,
            generator,
            finalizer,
            store,
            publisher,
            metrics,
        })
    }

    fn admin(&self) -> AdminApi<BinanceCandles> {
        AdminApi::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.finalizer),
            Arc::clone(&self.store),
            Arc::clone(&self.publisher),
        )
    }
}

async fn run_service(config: AppConfig) -> Result<()> {
    info!(
        "Starting glidepath (cutover {:02}:00 UTC, target {:.1}..{:.1}%)",
        config.engine.cutover_hour_utc, config.engine.target_min, config.engine.target_max
    );

    let components = Components::build(&config).await?;

    let generator = Arc::clone(&components.generator);
    spawn_supervised("generator", SupervisorConfig::default(), move || {
        let generator = Arc::clone(&generator);
        async move { generator.run().await }
    });

    let finalizer = Arc::clone(&components.finalizer);
    spawn_supervised("finalizer", SupervisorConfig::default(), move || {
        let finalizer = Arc::clone(&finalizer);
        async move { finalizer.run().await }
    });

    // Health server plus a periodic probe feeding it
    let health_state = Arc::new(HealthState::new().with_metrics(Arc::clone(&components.metrics)));
    health_state.record_db_check(true).await;

    let probe_state = Arc::clone(&health_state);
    let probe_pool = components.postgres.pool().clone();
    let probe_generator = Arc::clone(&components.generator);
    spawn_supervised("db-probe", SupervisorConfig::default(), move || {
        let state = Arc::clone(&probe_state);
        let pool = probe_pool.clone();
        let generator = Arc::clone(&probe_generator);
        async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let ok = sqlx::query("SELECT 1").execute(&pool).await.is_ok();
                state.record_db_check(ok).await;
                state
                    .set_generator_state(generator.state().await.as_str())
                    .await;
            }
        }
    });

    let port = config.health_port.unwrap_or(8080);
    let server_state = Arc::clone(&health_state);
    spawn_supervised("health-server", SupervisorConfig::default(), move || {
        let server = HealthServer::new(Arc::clone(&server_state), port);
        async move {
            if let Err(e) = server.run().await {
                error!("Health server failed: {}", e);
            }
        }
    });

    shutdown_signal().await;
    warn!("Shutdown signal received, stopping");
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},glidepath=debug,sqlx=warn",
            config.logging.level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
