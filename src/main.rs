//! giddview - disaster displacement dashboard for the terminal
//!
//! Queries the GIDD statistics backend for a selection of subregions,
//! countries, hazard categories and years, aggregates the time series
//! client-side and renders the result as a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, reference data, backend failure, etc.)

mod analysis;
mod cli;
mod client;
mod config;
mod dashboard;
mod filter;
mod models;
mod reference;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use client::{ClientConfig, DisasterDataVariables, StatisticsClient};
use config::{Config, CONFIG_FILE};
use dashboard::{Dashboard, DashboardLinks, DashboardSettings, DashboardView};
use filter::command::HELP;
use filter::{debounce, FilterCommand, FilterState};
use indicatif::{ProgressBar, ProgressStyle};
use reference::ReferenceData;
use report::{format_count, Report, ReportMetadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read before logging starts so that `verbose` can apply
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(args.quiet))?;

    info!("giddview v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    if let Err(e) = run(args, config).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .giddview.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set endpoints, year bounds and report options.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Load everything, then run in one-shot, dry-run or interactive mode.
async fn run(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let settings = config.dashboard.settings()?;
    let reference = Arc::new(ReferenceData::load(&config.reference.path)?);
    let filter = args.filter(settings.year_bounds)?;
    warn_unknown_selections(&filter, &reference);

    let client_config = config.client_config();

    if args.dry_run {
        return handle_dry_run(&filter, &reference, &client_config, &settings);
    }

    let client = StatisticsClient::new(client_config.clone())?;
    let mut dashboard = Dashboard::new(reference, client, settings);

    if args.interactive {
        return run_interactive(dashboard, filter, &config, &args).await;
    }

    if !args.quiet {
        println!("📊 Querying {}", client_config.graphql_url);
        println!("   Filters: {}", filter);
    }

    let view = refresh_with_spinner(&mut dashboard, &filter, args.quiet).await;

    if !view.has_data() {
        anyhow::bail!("No statistics received: {}", view.errors.join("; "));
    }
    for e in &view.errors {
        warn!("{}", e);
    }

    let report = Report {
        metadata: ReportMetadata {
            generated_at: Utc::now(),
            endpoint: client_config.graphql_url.clone(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        view,
    };

    let output = output_path(&args, &config);
    write_report(&report, &config, args.format, &output)?;

    if !args.quiet {
        print_view_summary(&report.view);
        println!("\n✅ Report saved to: {}", output.display());
    }

    Ok(())
}

/// Refresh once, showing a spinner while the queries are in flight.
async fn refresh_with_spinner(
    dashboard: &mut Dashboard,
    filter: &FilterState,
    quiet: bool,
) -> DashboardView {
    let spinner = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message("Fetching displacement statistics...");
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let view = dashboard.refresh(filter).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    view
}

/// Handle --dry-run: print what would be queried, contact nothing.
fn handle_dry_run(
    filter: &FilterState,
    reference: &ReferenceData,
    client_config: &ClientConfig,
    settings: &DashboardSettings,
) -> Result<()> {
    println!("\n🔍 Dry run: no backend calls will be made\n");

    let view = dashboard::build_view(None, None, filter, reference, settings);
    let variables = DisasterDataVariables::from_filter(filter, &view.effective_countries);

    println!("   Endpoint: {}", client_config.graphql_url);
    println!("   Filters:  {}", filter);
    println!("   Mode:     {:?}", view.mode);
    println!(
        "   Series:   {}",
        analysis::series_descriptors(filter, reference, view.mode)
            .iter()
            .map(|s| s.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("\n   Query variables:");
    let json = serde_json::to_string_pretty(&variables).context("Failed to encode variables")?;
    for line in json.lines() {
        println!("     {}", line);
    }

    let links = DashboardLinks::new(client_config, &view.effective_countries, filter)?;
    println!("\n   Export:        {}", links.export);
    println!("   Full database: {}", links.full_database);

    println!("\n✅ Dry run complete.");
    Ok(())
}

/// Interactive session: stdin commands edit the filter, and each settled
/// filter is fetched once the debounce delay has passed.
async fn run_interactive(
    mut dashboard: Dashboard,
    mut filter: FilterState,
    config: &Config,
    args: &Args,
) -> Result<()> {
    let settings = *dashboard.settings();
    let (snapshots_in, mut snapshots) = debounce::<FilterState>(settings.debounce);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_view: Option<DashboardView> = None;

    println!("{}\n", HELP);
    println!("Filters: {}", filter);
    snapshots_in.push(filter.clone());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match FilterCommand::parse(&line) {
                    Ok(FilterCommand::Quit) => break,
                    Ok(FilterCommand::Help) => println!("{}", HELP),
                    Ok(FilterCommand::Show) => println!("Filters: {}", filter),
                    Ok(command) => match command.apply(&mut filter, settings.year_bounds) {
                        Ok(true) => {
                            println!("Filters: {}", filter);
                            snapshots_in.push(filter.clone());
                        }
                        Ok(false) => println!("(no change)"),
                        Err(e) => eprintln!("{}", e),
                    },
                    Err(e) => eprintln!("{}", e),
                }
            }
            Some(snapshot) = snapshots.recv() => {
                warn_unknown_selections(&snapshot, dashboard.reference());
                let view = dashboard.refresh(&snapshot).await;
                print_view_summary(&view);
                last_view = Some(view);
            }
        }
    }

    if let (Some(output), Some(view)) = (args.output.as_ref(), last_view) {
        let report = Report {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                endpoint: config.endpoints.graphql_url.clone(),
                duration_seconds: 0.0,
            },
            view,
        };
        write_report(&report, config, args.format, output)?;
        println!("✅ Report saved to: {}", output.display());
    }

    Ok(())
}

/// Print a compact terminal summary of a view.
fn print_view_summary(view: &DashboardView) {
    for e in &view.errors {
        eprintln!("⚠️  {}", e);
    }

    if !view.has_data() {
        println!("   No statistics yet.");
        return;
    }

    if view.stale {
        println!("   (showing results for an earlier selection)");
    }

    println!(
        "\n   {} countries | {} internal displacements | {} events",
        view.effective_countries.len(),
        format_count(view.headline.new_displacements),
        format_count(view.headline.total_events)
    );

    for row in &view.chart {
        let cells: Vec<String> = view
            .legend
            .iter()
            .filter_map(|series| {
                row.values
                    .get(series.key.field_name())
                    .map(|v| format!("{}: {}", series.label, format_count(*v)))
            })
            .collect();
        println!("   {}  {}", row.year, cells.join(" | "));
    }

    if !view.category_breakdown.is_empty() {
        let slices: Vec<String> = view
            .category_breakdown
            .iter()
            .rev()
            .map(|s| format!("{} {:.0}%", s.label, s.share))
            .collect();
        println!("   By hazard: {}", slices.join(", "));
    }
}

/// Log selections that the reference table does not know.
fn warn_unknown_selections(filter: &FilterState, reference: &ReferenceData) {
    for key in &filter.selected_regions {
        if reference.region(key).is_none() {
            warn!("Unknown region '{}' is ignored", key);
        }
    }
    for iso3 in &filter.selected_countries {
        if reference.country(iso3).is_none() {
            warn!("Unknown country '{}' is ignored", iso3);
        }
    }
}

/// Render and save a report.
fn write_report(report: &Report, config: &Config, format: OutputFormat, path: &Path) -> Result<()> {
    let output = match format {
        OutputFormat::Json => report::generate_json_report(report)?,
        OutputFormat::Markdown => report::generate_markdown_report(report, &config.report),
    };

    std::fs::write(path, &output)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Report path: explicit `--output`, else the configured default with an
/// extension matching the format.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    if let Some(ref output) = args.output {
        return output.clone();
    }

    let path = PathBuf::from(&config.general.output);
    match args.format {
        OutputFormat::Json => path.with_extension("json"),
        OutputFormat::Markdown => path,
    }
}

/// Where the configuration came from, logged once logging is up.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    Fallback(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::Defaults => debug!("No config file found, using defaults"),
            ConfigSource::Fallback(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Fallback(e))),
    }
}
