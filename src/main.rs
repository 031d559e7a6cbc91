// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

// Use library instead of local modules
use farm_report::{assemble_report, dates, Config, FarmStats, StatusFilter};

#[derive(Parser)]
#[command(name = "farm-report")]
#[command(about = "Livestock management report: headcounts, breeding, lactation and milk yield")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the farms in the database
    Farms,
    /// Print the report for one farm
    Report(ReportArgs),
    /// Browse reports interactively
    Tui,
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Farm name
    #[arg(short, long)]
    farm: String,

    /// Status filter: owned, Sell, Dead, Cull or Total
    #[arg(short, long, default_value = "owned")]
    status: StatusFilter,

    /// Report instant (YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS"), defaults to now
    #[arg(long, value_parser = dates::parse_as_of)]
    as_of: Option<NaiveDateTime>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Metric warnings are shown inside the TUI; only errors may reach the terminal there.
    let default_level = match cli.command {
        Some(Commands::Tui) | None => "error",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli.config.validate() {
        eprintln!("❌ {err}");
        eprintln!("   Pass --db <path> or set FARM_REPORT_DB.");
        std::process::exit(1);
    }

    match cli.command {
        Some(Commands::Farms) => run_farms(&cli.config),
        Some(Commands::Report(args)) => run_report(&cli.config, args),
        Some(Commands::Tui) | None => run_ui_mode(&cli.config),
    }
}

fn run_farms(config: &Config) -> Result<()> {
    let store = config.store();
    let mut stats = FarmStats::new(&store, Local::now().naive_local());

    let farms = stats.farms();
    for warning in stats.warnings() {
        eprintln!("⚠️  {warning}");
    }

    if farms.is_empty() {
        println!("No farms found.");
    }
    for farm in farms {
        println!("{farm}");
    }

    Ok(())
}

fn run_report(config: &Config, args: ReportArgs) -> Result<()> {
    let store = config.store();
    let as_of = args.as_of.unwrap_or_else(|| Local::now().naive_local());

    info!(farm = %args.farm, status = %args.status, %as_of, "assembling report");
    let report = assemble_report(&store, &args.farm, args.status, as_of);

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{json}");
    } else {
        print!("{report}");
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    let store = config.store();
    let mut app = ui::App::new(store, Local::now().naive_local());
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or print a report: farm-report report --farm <name>");
    std::process::exit(1);
}
