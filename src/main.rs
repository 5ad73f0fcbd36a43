//! CLI entry point for the headline clustering engine.
//!
//! Provides commands for clustering a batch of article records into a
//! partition and for inspecting the active configuration.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use tracing_subscriber::EnvFilter;

use headliner::{ArticleRecord, ClusteringEngine, EngineError, ErrorContext, Partition, Settings};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "headliner",
    version,
    about = "Cluster news headlines into event clusters",
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster a batch of article records for one (date, category) partition
    Cluster {
        /// JSON file with an array of article records; "-" reads stdin
        #[arg(short, long)]
        input: PathBuf,

        /// Processing date (YYYY-MM-DD); defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Partition category, e.g. "world" or "business"
        #[arg(long)]
        category: String,

        /// Emit the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Display active settings
    Config,
}

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("Error: {error}");
            std::process::exit(error.exit_code() as i32);
        }
    };
    init_tracing(settings.debug);

    let result = match cli.command {
        Commands::Cluster {
            input,
            date,
            category,
            json,
        } => run_cluster(settings, &input, date, category, json),
        Commands::Config => show_config(&settings),
    };

    if let Err(error) = result {
        eprintln!("Error: {error}");
        for suggestion in error.recovery_suggestions() {
            eprintln!("  Suggestion: {suggestion}");
        }
        std::process::exit(error.exit_code() as i32);
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "headliner=debug"
    } else {
        "headliner=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_cluster(
    settings: Settings,
    input: &Path,
    date: Option<NaiveDate>,
    category: String,
    json: bool,
) -> Result<(), EngineError> {
    let records = read_records(input)?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let partition = Partition::new(date, category);

    let engine = ClusteringEngine::new(settings)?;
    let report = engine.run(&partition, records)?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{rendered}");
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

fn read_records(input: &Path) -> Result<Vec<ArticleRecord>, EngineError> {
    let json = if input == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read records from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(input)
            .context(&format!("failed to read {}", input.display()))?
    };
    serde_json::from_str(&json).context("failed to parse article records")
}

fn show_config(settings: &Settings) -> Result<(), EngineError> {
    let rendered =
        serde_json::to_string_pretty(settings).context("failed to serialize settings")?;
    println!("{rendered}");
    Ok(())
}
