//! HistLab CLI: build a wide market-history dataset.
//!
//! Commands:
//! - `build`: fetch the lookback window, reconcile fundamentals, attach VIX, write CSV/Parquet
//! - `fetch-vix`: download the CBOE volatility index history
//! - `query`: print the provider request path for a call mode and parameters

mod obs;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use histlab_core::cancel::CancellationToken;
use histlab_core::data::{
    load_series, write_table, CallMode, CboeVolatilitySource, FinnhubClient, FundamentalsProvider,
    PolygonClient, Query, ThreadPause, VolatilitySource, VIX_HISTORY_FILE, VIX_HISTORY_URL,
};
use histlab_runner::{build_dataset, LogProgress, PipelineConfig, RunOptions, Sources};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "histlab",
    about = "HistLab CLI: market history dataset builder"
)]
struct Cli {
    /// Log filter when HISTLAB_LOG is unset (e.g. info, histlab_core=debug).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dataset and write it as CSV or Parquet.
    Build {
        /// Path to a TOML pipeline config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file; the extension (.csv or .parquet) picks the format.
        #[arg(long)]
        output: PathBuf,

        /// Stop fundamentals reconciliation after this many tickers.
        #[arg(long)]
        max_tickers: Option<usize>,

        /// Skip fundamentals reconciliation.
        #[arg(long, default_value_t = false)]
        skip_financials: bool,

        /// Skip volatility columns.
        #[arg(long, default_value_t = false)]
        skip_volatility: bool,

        /// Last date of the window (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        today: Option<String>,

        #[arg(long, env = "POLYGON_API_KEY", hide_env_values = true)]
        polygon_key: String,

        #[arg(long, env = "FINNHUB_API_KEY", hide_env_values = true)]
        finnhub_key: Option<String>,
    },
    /// Download the CBOE VIX history CSV.
    FetchVix {
        #[arg(long, default_value = VIX_HISTORY_FILE)]
        output: PathBuf,

        #[arg(long, default_value = VIX_HISTORY_URL)]
        url: String,
    },
    /// Print the request path a query would use.
    Query {
        /// daily, daily_aggregate or time_period_aggregate.
        #[arg(long)]
        mode: CallMode,

        /// Query parameter as key=value; repeatable.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Build {
            config,
            output,
            max_tickers,
            skip_financials,
            skip_volatility,
            today,
            polygon_key,
            finnhub_key,
        } => run_build(BuildArgs {
            config,
            output,
            max_tickers,
            skip_financials,
            skip_volatility,
            today,
            polygon_key,
            finnhub_key,
        }),
        Commands::FetchVix { output, url } => run_fetch_vix(output, url),
        Commands::Query { mode, params } => run_query(mode, params),
    }
}

struct BuildArgs {
    config: Option<PathBuf>,
    output: PathBuf,
    max_tickers: Option<usize>,
    skip_financials: bool,
    skip_volatility: bool,
    today: Option<String>,
    polygon_key: String,
    finnhub_key: Option<String>,
}

fn run_build(args: BuildArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    let today = args
        .today
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("--today must be YYYY-MM-DD")?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let market = PolygonClient::with_base_url(&config.market.base_url, args.polygon_key)?;

    let finnhub = match (&args.finnhub_key, args.skip_financials) {
        (_, true) => None,
        (Some(key), false) => Some(FinnhubClient::with_base_url(
            &config.fundamentals.base_url,
            key.as_str(),
        )?),
        (None, false) => {
            bail!("FINNHUB_API_KEY (or --finnhub-key) is required unless --skip-financials is set")
        }
    };
    let cboe = if args.skip_volatility {
        None
    } else {
        Some(CboeVolatilitySource::with_url(&config.volatility.url)?)
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("Ctrl+C received, stopping at the next pause");
            cancel.cancel();
        })
        .context("failed to install Ctrl+C handler")?;
    }

    let pause = ThreadPause::default();
    let sources = Sources {
        market: &market,
        fundamentals: finnhub.as_ref().map(|f| f as &dyn FundamentalsProvider),
        volatility: cboe.as_ref().map(|c| c as &dyn VolatilitySource),
        pause: &pause,
    };
    let options = RunOptions {
        today,
        skip_financials: args.skip_financials,
        skip_volatility: args.skip_volatility,
        max_tickers: args.max_tickers,
    };

    let run = build_dataset(&config, &sources, &options, &cancel, &LogProgress)?;

    if run.table.is_empty() {
        bail!("no data collected; nothing written");
    }
    let meta = write_table(&run.table, &args.output)?;
    if !run.summary.completed {
        warn!(path = %args.output.display(), "partial dataset written");
    }

    println!("{}", serde_json::to_string_pretty(&run.summary)?);
    info!(hash = %meta.data_hash, "done");
    Ok(())
}

fn run_fetch_vix(output: PathBuf, url: String) -> Result<()> {
    let source = CboeVolatilitySource::with_url(url)?;
    source
        .acquire(&output)
        .with_context(|| format!("failed to download {}", output.display()))?;

    let series = load_series(&output)?;
    match (series.first(), series.last()) {
        (Some(first), Some(last)) => println!(
            "{}: {} points, {} to {}",
            output.display(),
            series.len(),
            first.date,
            last.date
        ),
        _ => bail!("{} contains no volatility points", output.display()),
    }
    Ok(())
}

fn run_query(mode: CallMode, params: Vec<(String, String)>) -> Result<()> {
    let query = Query::build(mode, params)?;
    println!("{}", query.path());
    Ok(())
}
