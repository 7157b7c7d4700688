//! Rebalance CLI: screen, preview and rank commands.
//!
//! Commands:
//! - `screen`: screen the universe, plan and execute against the paper venue
//! - `preview`: screen and plan without placing orders
//! - `rank`: score and rank the universe with no thresholds
//! - `baseline-model`: write the baseline linear model artifact
//!
//! Results are printed as JSON. Logging goes to stderr and is controlled by
//! `RUST_LOG` (default `info`).

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::info;
use rebalance_core::data::{
    CircuitBreaker, CsvHistoryProvider, HistoryProvider, SyntheticHistoryProvider, Universe,
    YahooHistoryProvider, YahooSettings,
};
use rebalance_core::domain::{Holding, InstrumentSnapshot};
use rebalance_core::predictor::{LinearReturnModel, ReturnPredictor};
use rebalance_core::sentiment::{SentimentProvider, StaticSentiment};
use rebalance_runner::venue::PaperVenue;
use rebalance_runner::{
    load_holdings_csv, load_universe, EngineConfig, LoadOptions, RebalanceEngine, RebalanceRequest,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "rebalance",
    about = "Rebalance engine: screen holdings and a universe, plan and place orders"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen, plan and execute a rebalance against the paper venue.
    Screen {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Screen and plan without placing any order.
    Preview {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Score and rank the universe.
    Rank {
        #[command(flatten)]
        common: CommonArgs,

        /// Prediction horizon in days. Defaults to the config value.
        #[arg(long)]
        horizon: Option<u32>,

        /// Print only the top N instruments.
        #[arg(long)]
        top: Option<usize>,
    },
    /// Write the baseline model artifact as JSON.
    BaselineModel {
        /// Horizons (days) to include.
        #[arg(long, value_delimiter = ',', default_value = "7,30,90")]
        horizons: Vec<u32>,

        /// Output path. Prints to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Engine config TOML. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Universe TOML (sector = [symbols]). Defaults to the built-in NSE list.
    #[arg(long)]
    universe: Option<PathBuf>,

    /// Evaluate at most this many universe symbols up front; the rest become
    /// the relaxation reserve.
    #[arg(long)]
    limit: Option<usize>,

    /// Model artifact JSON. Defaults to the baseline model.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Sentiment TOML. Defaults to the built-in sector outlook.
    #[arg(long)]
    sentiment: Option<PathBuf>,

    /// Read bars from `<dir>/<symbol>.csv` instead of Yahoo Finance.
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Use deterministic synthetic bars instead of Yahoo Finance.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Last synthetic trading day (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    synthetic_end: Option<String>,

    /// Output path for the JSON result. Prints to stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RequestArgs {
    /// Holdings CSV: symbol,quantity,average_cost[,current_price][,sector].
    #[arg(long)]
    holdings: Option<PathBuf>,

    /// Cash available for buys.
    #[arg(long, default_value_t = 50_000.0)]
    budget: f64,

    /// Minimum predicted return (percent) for a buy. Defaults to the config value.
    #[arg(long)]
    target: Option<f64>,

    /// Prediction horizon in days. Defaults to the config value.
    #[arg(long)]
    horizon: Option<u32>,

    /// Maximum risk score for a buy. Defaults to the config value.
    #[arg(long)]
    risk_ceiling: Option<f64>,

    /// Absolute per-position cap in currency.
    #[arg(long)]
    max_per_position: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Screen { common, request } => run_screen(&common, &request, false),
        Commands::Preview { common, request } => run_screen(&common, &request, true),
        Commands::Rank { common, horizon, top } => run_rank(&common, horizon, top),
        Commands::BaselineModel { horizons, output } => run_baseline_model(&horizons, output.as_deref()),
    }
}

/// Everything the engine needs, resolved from the command line.
struct Setup {
    config: EngineConfig,
    universe: Universe,
    provider: Arc<dyn HistoryProvider>,
    predictor: Arc<dyn ReturnPredictor>,
    sentiment: Arc<dyn SentimentProvider>,
}

/// `horizon` is a request override the baseline model must also cover.
fn setup(common: &CommonArgs, horizon: Option<u32>) -> Result<Setup> {
    let config = match &common.config {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let universe = match &common.universe {
        Some(path) => Universe::from_file(path).map_err(|e| anyhow!(e))?,
        None => Universe::default_nse(),
    };
    if universe.is_empty() {
        bail!("universe has no symbols");
    }

    let predictor: Arc<dyn ReturnPredictor> = match &common.model {
        Some(path) => Arc::new(
            LinearReturnModel::from_json_file(path)
                .with_context(|| format!("loading model {}", path.display()))?,
        ),
        None => {
            let horizons: BTreeSet<u32> = [7, 30, 90, config.screening.horizon_days]
                .into_iter()
                .chain(horizon)
                .collect();
            Arc::new(LinearReturnModel::baseline(&horizons.into_iter().collect::<Vec<_>>()))
        }
    };

    let sentiment: Arc<dyn SentimentProvider> = match &common.sentiment {
        Some(path) => Arc::new(StaticSentiment::from_file(path).map_err(|e| anyhow!(e))?),
        None => Arc::new(StaticSentiment::default_sectors()),
    };

    Ok(Setup {
        config,
        universe,
        provider: history_provider(common)?,
        predictor,
        sentiment,
    })
}

fn history_provider(common: &CommonArgs) -> Result<Arc<dyn HistoryProvider>> {
    if common.synthetic && common.csv_dir.is_some() {
        bail!("--synthetic and --csv-dir are mutually exclusive");
    }
    if let Some(dir) = &common.csv_dir {
        return Ok(Arc::new(CsvHistoryProvider::new(dir.clone())));
    }
    if common.synthetic {
        let end = common
            .synthetic_end
            .as_deref()
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .transpose()?
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        return Ok(Arc::new(SyntheticHistoryProvider::new(126, end)));
    }
    let breaker = Arc::new(CircuitBreaker::default_provider());
    Ok(Arc::new(YahooHistoryProvider::new(breaker, YahooSettings::default())?))
}

/// Fetch the up-front universe; with `--limit`, the full universe is also
/// the relaxation reserve.
fn load_snapshots(setup: &mut Setup, common: &CommonArgs) -> Result<Vec<InstrumentSnapshot>> {
    let opts = LoadOptions {
        worker_threads: setup.config.screening.worker_threads,
        exclude: Vec::new(),
        limit: common.limit,
    };
    if common.limit.is_some() && setup.config.screening.reserve.is_empty() {
        setup.config.screening.reserve = setup.universe.clone();
    }
    let loaded = load_universe(&setup.universe, setup.provider.as_ref(), &opts)?;
    if loaded.snapshots.is_empty() {
        bail!("no universe symbol could be loaded ({} failed)", loaded.failures.len());
    }
    Ok(loaded.snapshots)
}

fn build_engine(setup: Setup, quotes: &[InstrumentSnapshot], holdings: &[Holding]) -> Result<RebalanceEngine> {
    let venue = PaperVenue::new()
        .with_quotes(holdings.iter().map(|h| (h.symbol.clone(), h.market_price())))
        .with_quotes(quotes.iter().map(|s| (s.symbol.clone(), s.price)));
    let engine = RebalanceEngine::new(setup.config, setup.predictor, Arc::new(venue))?
        .with_sentiment(setup.sentiment)
        .with_history_provider(setup.provider)?;
    Ok(engine)
}

fn run_screen(common: &CommonArgs, args: &RequestArgs, preview_only: bool) -> Result<()> {
    let mut setup = setup(common, args.horizon)?;
    let holdings = match &args.holdings {
        Some(path) => load_holdings_csv(path).with_context(|| format!("loading holdings {}", path.display()))?,
        None => Vec::new(),
    };
    let snapshots = load_snapshots(&mut setup, common)?;
    let outside = holdings
        .iter()
        .filter(|h| !snapshots.iter().any(|s| s.symbol == h.symbol))
        .count();
    info!(
        "{} snapshots loaded, {} holdings ({outside} outside the universe)",
        snapshots.len(),
        holdings.len()
    );

    let engine = build_engine(setup, &snapshots, &holdings)?;
    let screening = &engine.config().screening;
    let mut request = RebalanceRequest::new(screening, args.budget)
        .with_universe(snapshots)
        .with_holdings(holdings)
        .with_target_return(args.target.unwrap_or(screening.target_return_pct))
        .with_horizon(args.horizon.unwrap_or(screening.horizon_days))
        .with_risk_ceiling(args.risk_ceiling.unwrap_or(screening.risk_ceiling));
    if let Some(cap) = args.max_per_position {
        request = request.with_max_per_position(cap);
    }

    if preview_only {
        let preview = engine.preview(&request)?;
        for w in &preview.warnings {
            log::warn!("{w}");
        }
        emit(&preview, common.output.as_deref())
    } else {
        let result = engine.screen(&request)?;
        for w in &result.warnings {
            log::warn!("{w}");
        }
        emit(&result, common.output.as_deref())
    }
}

fn run_rank(common: &CommonArgs, horizon: Option<u32>, top: Option<usize>) -> Result<()> {
    let mut setup = setup(common, horizon)?;
    let snapshots = load_snapshots(&mut setup, common)?;
    let engine = build_engine(setup, &snapshots, &[])?;
    let horizon = horizon.unwrap_or(engine.config().screening.horizon_days);

    let mut ranked = engine.rank(&snapshots, horizon)?;
    if let Some(n) = top {
        ranked.truncate(n);
    }
    emit(&ranked, common.output.as_deref())
}

fn run_baseline_model(horizons: &[u32], output: Option<&Path>) -> Result<()> {
    if horizons.is_empty() || horizons.contains(&0) {
        bail!("--horizons must list positive day counts");
    }
    let json = LinearReturnModel::baseline(horizons).to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("Baseline model written to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("Result written to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
