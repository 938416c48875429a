use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use optloop_broker::{AlpacaClient, ChainSource, PaperBroker, PolygonChain, YahooMarketData};
use optloop_core::config::AppConfig;
use optloop_core::traits::OptionsChainProvider;
use optloop_core::ConfigLoader;
use optloop_data::{DatabaseClient, MemoryTradeStore, PgTradeStore, TradeStore};
use optloop_engine::cycle::{Collaborators, CycleController};
use optloop_engine::{hours, service};

#[derive(Parser)]
#[command(name = "optloop")]
#[command(about = "Autonomous options trading decision loop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the decision loop continuously
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Run exactly one cycle and exit
    Cycle {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Show market status and the current ledger
    Status {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run_service(&config).await?,
        Commands::Cycle { config } => run_once(&config).await?,
        Commands::Status { config } => show_status(&config).await?,
    }

    Ok(())
}

async fn run_service(config_path: &str) -> anyhow::Result<()> {
    let config = ConfigLoader::load(config_path)?;
    let interval = config.engine.cycle_interval_secs;
    let enforce_hours = config.engine.enforce_market_hours;
    let controller = build_controller(&config).await?;
    service::run(controller, interval, enforce_hours).await
}

async fn run_once(config_path: &str) -> anyhow::Result<()> {
    let config = ConfigLoader::load(config_path)?;
    let controller = build_controller(&config).await?;
    let summary = controller.run_cycle().await?;
    info!(
        ideas = summary.ideas,
        validated = summary.validated,
        approved = summary.approved,
        positions_opened = summary.positions_opened,
        closed = summary.sweep.closed,
        "Cycle complete"
    );
    Ok(())
}

async fn show_status(config_path: &str) -> anyhow::Result<()> {
    let config = ConfigLoader::load(config_path)?;

    let status = hours::market_status(chrono::Utc::now());
    println!("Market: {} ({}, {})", status.status, status.weekday, status.current_time_et);
    println!("Mode:   {}", if config.engine.shadow_mode { "shadow" } else { "live" });

    if !has_broker_credentials(&config) {
        println!("No broker credentials configured; ledger lives in memory only.");
        return Ok(());
    }

    let store = connect_store(&config).await?;
    let open = store.open_positions().await?;
    println!("\nOpen positions: {}", open.len());
    for pos in &open {
        println!(
            "  #{} {} {} entry {} pnl {}{}",
            pos.id,
            pos.strategy,
            pos.underlying,
            pos.entry_price,
            pos.unrealized_pnl,
            if pos.fallback_used { " [fallback leg]" } else { "" }
        );
    }

    let recent = store.recent_approved_trades(10).await?;
    println!("\nRecent decisions: {}", recent.len());
    for trade in &recent {
        println!(
            "  {} {} {} confidence {:.2} {}",
            trade.timestamp.format("%Y-%m-%d %H:%M"),
            trade.strategy,
            trade.underlying,
            trade.confidence,
            if trade.approved { "approved" } else { "rejected" }
        );
    }
    Ok(())
}

fn has_broker_credentials(config: &AppConfig) -> bool {
    !config.alpaca.key_id.is_empty() && !config.alpaca.secret_key.is_empty()
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<PgTradeStore>> {
    let db = DatabaseClient::connect(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;
    Ok(Arc::new(PgTradeStore::new(db.pool())))
}

/// Wires live collaborators when broker credentials are present; otherwise
/// falls back to the deterministic paper broker and an in-memory ledger.
async fn build_controller(config: &AppConfig) -> anyhow::Result<Arc<CycleController>> {
    if !has_broker_credentials(config) {
        warn!("No broker credentials configured, running on the paper broker");
        let paper = Arc::new(PaperBroker::new(
            &config.engine.benchmark,
            rust_decimal::Decimal::from(100),
        ));
        let collab = Collaborators {
            market: paper.clone(),
            chains: ChainSource::new(vec![paper.clone() as Arc<dyn OptionsChainProvider>]),
            broker: paper.clone(),
            prices: paper,
        };
        let store = Arc::new(MemoryTradeStore::new());
        return Ok(Arc::new(CycleController::new(collab, store, &config.engine)));
    }

    let store = connect_store(config).await?;
    let alpaca = Arc::new(AlpacaClient::new(&config.alpaca)?);

    let mut providers: Vec<Arc<dyn OptionsChainProvider>> = Vec::new();
    if config.polygon.api_key.is_empty() {
        warn!("No Polygon API key, chain data comes from the secondary source only");
    } else {
        providers.push(Arc::new(PolygonChain::new(&config.polygon)));
    }
    providers.push(alpaca.clone());
    let chains = ChainSource::new(providers);

    let market = Arc::new(YahooMarketData::new(&config.engine.benchmark, chains.clone()));
    let collab = Collaborators {
        market,
        chains,
        broker: alpaca.clone(),
        prices: alpaca,
    };
    info!(
        shadow_mode = config.engine.shadow_mode,
        universe = ?config.engine.universe,
        "Live collaborators wired"
    );
    Ok(Arc::new(CycleController::new(collab, store, &config.engine)))
}
