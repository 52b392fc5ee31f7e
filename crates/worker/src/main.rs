use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use valuescan_core::domain::filter::{self, FilterParams, DEFAULT_MAX_PE};
use valuescan_core::domain::stock::{StockRow, TickerSymbol};
use valuescan_core::ingest::types::FetchProgress;
use valuescan_core::scan::{ScanOutcome, ScanWorkflow};
use valuescan_core::time::month::{resolve_clock, ScanClock};

mod report;

#[derive(Debug, Parser)]
#[command(name = "valuescan", version)]
#[command(about = "Monthly large-cap value screen over S&P 500 constituents")]
struct Args {
    /// Session date (YYYY-MM-DD). Defaults to today's local date.
    #[arg(long, global = true)]
    today: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Use this month's cached scan, or run a full scan when there is none.
    Scan {
        /// Scan without writing the result cache.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print this month's cached rows after filtering.
    Show {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Write this month's filtered rows as a BOM-prefixed CSV.
    Export {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Print the company profile for one symbol.
    Detail { symbol: String },
}

#[derive(Debug, Clone, Copy, ClapArgs)]
struct FilterArgs {
    /// Keep rows with trailing P/E at or below this value (5-30).
    #[arg(long, default_value_t = DEFAULT_MAX_PE)]
    max_pe: f64,

    /// Keep rows with dividend yield (percent) at or above this value.
    #[arg(long)]
    min_dividend_yield: Option<f64>,
}

impl FilterArgs {
    fn params(self) -> anyhow::Result<FilterParams> {
        let params = FilterParams {
            max_pe: self.max_pe,
            min_dividend_yield: self.min_dividend_yield,
        };
        params.validate()?;
        Ok(params)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = valuescan_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let clock = resolve_clock(args.today.as_deref(), chrono::Utc::now())?;
    let workflow = ScanWorkflow::from_settings(&settings)?;

    let res = match args.command {
        Command::Scan { dry_run } => scan(workflow.with_persist(!dry_run), &clock).await,
        Command::Show { filter } => show(&workflow, &clock, filter.params()?),
        Command::Export { filter, out } => export(&workflow, &clock, filter.params()?, &out),
        Command::Detail { symbol } => detail(&workflow, &symbol).await,
    };

    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "command failed");
    }
    res
}

async fn scan(workflow: ScanWorkflow, clock: &ScanClock) -> anyhow::Result<()> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    let mut on_progress = |p: &FetchProgress| {
        pb.set_length(p.total as u64);
        pb.set_position(p.index as u64);
        pb.set_message(p.symbol.to_string());
    };

    let outcome = workflow.session(clock, true, Some(&mut on_progress)).await?;
    pb.finish_and_clear();

    match outcome {
        ScanOutcome::Cached { result } => {
            println!(
                "using cached scan for {} ({} rows)",
                clock.current_month(),
                result.len()
            );
        }
        ScanOutcome::Scanned { result, stats } => {
            println!("{}", report::render_stats(&stats));
            print!("{}", report::render_table(&result.rows));
        }
        ScanOutcome::NotScanned => {}
        ScanOutcome::SourceUnavailable { reason } => {
            anyhow::bail!("could not retrieve the S&P 500 ticker list: {reason}");
        }
    }
    Ok(())
}

fn cached_rows(workflow: &ScanWorkflow, clock: &ScanClock) -> Option<Vec<StockRow>> {
    let cached = workflow.load_cached(clock);
    if cached.is_none() {
        eprintln!(
            "no scan for {} yet; run `valuescan scan` first",
            clock.current_month()
        );
    }
    cached.map(|r| r.rows)
}

fn show(workflow: &ScanWorkflow, clock: &ScanClock, params: FilterParams) -> anyhow::Result<()> {
    let Some(rows) = cached_rows(workflow, clock) else {
        return Ok(());
    };
    let filtered = filter::apply(&rows, &params);
    println!(
        "{} of {} rows match P/E <= {}{}",
        filtered.len(),
        rows.len(),
        params.max_pe,
        params
            .min_dividend_yield
            .map(|d| format!(", dividend yield >= {d}%"))
            .unwrap_or_default()
    );
    print!("{}", report::render_table(&filtered));
    Ok(())
}

fn export(
    workflow: &ScanWorkflow,
    clock: &ScanClock,
    params: FilterParams,
    out: &std::path::Path,
) -> anyhow::Result<()> {
    let Some(rows) = cached_rows(workflow, clock) else {
        anyhow::bail!("nothing to export for {}", clock.current_month());
    };
    let filtered = filter::apply(&rows, &params);
    let path = valuescan_core::export::export_to_dir(out, &clock.current_month(), &filtered)?;
    tracing::info!(path = %path.display(), rows = filtered.len(), "exported filtered rows");
    println!("{}", path.display());
    Ok(())
}

async fn detail(workflow: &ScanWorkflow, symbol: &str) -> anyhow::Result<()> {
    let symbol = TickerSymbol::normalize(symbol).context("empty symbol")?;
    let profile = workflow
        .company_profile(&symbol)
        .await
        .with_context(|| format!("failed to load profile for {symbol}"))?;
    print!("{}", report::render_profile(&profile));
    Ok(())
}

fn init_sentry(settings: &valuescan_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
