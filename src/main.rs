use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

use sportlens::logging::init_logging;
use sportlens::store::StoreFixture;
use sportlens::{
    AnalyticsConfig, AnalyticsService, CompareRequest, InMemoryStore, LogLevel, SportMode, SqliteStore,
    TrendRequest,
};

/// sportlens - training analytics inspector
///
/// Runs the trend, skill map and personal record queries against a local
/// SQLite database or a JSON fixture and prints the results.
#[derive(Parser)]
#[command(name = "sportlens")]
#[command(version)]
#[command(about = "Training analytics inspector", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// SQLite database to read (overrides the config file)
    #[arg(long, value_name = "FILE", conflicts_with = "data")]
    db: Option<PathBuf>,

    /// JSON fixture to read instead of a database
    #[arg(long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// User whose history is analyzed
    #[arg(short, long, default_value = "default")]
    user: String,

    /// Evaluate windows as if today were this date (YYYY-MM-DD)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the views offered for a sport
    Views {
        #[arg(short, long)]
        sport: SportMode,
    },

    /// Per-bucket trend of one view
    Trend {
        #[arg(short, long)]
        sport: SportMode,

        /// View name, e.g. "Tonnage"
        #[arg(long)]
        view: String,

        /// Only exercises matching this name
        #[arg(short, long)]
        exercise: Option<String>,

        /// Window length in days
        #[arg(short, long, default_value = "30")]
        days: u32,
    },

    /// Compare exercises on one view
    Compare {
        #[arg(short, long)]
        sport: SportMode,

        #[arg(long)]
        view: String,

        /// Exercise to compare; repeat for each selection
        #[arg(short, long = "exercise", required = true)]
        exercises: Vec<String>,

        #[arg(short, long, default_value = "30")]
        days: u32,
    },

    /// All-time bests for an exercise
    Records {
        #[arg(short, long)]
        sport: SportMode,

        #[arg(short, long)]
        exercise: String,
    },

    /// Load a JSON fixture into the SQLite database
    Import {
        /// Fixture file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Tabled)]
struct ViewRow {
    #[tabled(rename = "View")]
    name: String,
    #[tabled(rename = "Exercise type")]
    exercise_type: String,
    #[tabled(rename = "Calculation")]
    calculation: String,
}

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "From")]
    start: NaiveDate,
    #[tabled(rename = "To")]
    end: NaiveDate,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct SkillRow {
    #[tabled(rename = "Exercise")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Share")]
    share: String,
    #[tabled(rename = "")]
    marker: String,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Best")]
    value: String,
    #[tabled(rename = "Date")]
    achieved_on: NaiveDate,
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
}

fn print_table<R: Tabled>(rows: Vec<R>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_database(cli: &Cli, config: &AnalyticsConfig) -> Result<SqliteStore> {
    let Some(path) = cli.db.clone().or_else(|| config.store.database_path.clone()) else {
        bail!("no database given; pass --db or set store.database_path in the config file");
    };
    let timeout = Duration::from_millis(config.store.busy_timeout_ms);
    SqliteStore::open(&path, timeout)
        .map(|store| store.with_matcher(config.matcher()))
        .with_context(|| format!("Failed to open database: {}", path.display()))
}

fn build_service(cli: &Cli, config: &AnalyticsConfig) -> Result<AnalyticsService> {
    let service = match &cli.data {
        Some(path) => {
            let store = InMemoryStore::from_json_file(path)?.with_matcher(config.matcher());
            AnalyticsService::with_store(store, config.clone())
        }
        None => AnalyticsService::with_store(open_database(cli, config)?, config.clone()),
    };
    Ok(match cli.today {
        Some(today) => service.pinned_to(today),
        None => service,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalyticsConfig::load_from_file(path)?,
        None => AnalyticsConfig::load_or_default(),
    };
    config.logging.level = LogLevel::from_verbosity(cli.verbose, config.logging.level);
    init_logging(&config.logging)?;

    match &cli.command {
        Commands::Views { sport } => {
            let views = sportlens::ViewRegistry::views_for(*sport);
            if cli.json {
                return print_json(&views);
            }
            if views.is_empty() {
                println!("{}", format!("No views for {}", sport).yellow());
                return Ok(());
            }
            println!("{}", format!("Views for {}", sport).bold());
            print_table(
                views
                    .iter()
                    .map(|view| ViewRow {
                        name: view.name.to_string(),
                        exercise_type: view.exercise_type.to_string(),
                        calculation: view.calculation.to_string(),
                    })
                    .collect(),
            );
        }

        Commands::Trend {
            sport,
            view,
            exercise,
            days,
        } => {
            let service = build_service(&cli, &config)?;
            let mut request = TrendRequest::new(cli.user.clone(), *sport, view.clone(), *days);
            request.exercise_query = exercise.clone();

            let Some(result) = service.trend(request).await? else {
                println!("{}", format!("{} has no view named \"{}\"", sport, view).yellow());
                return Ok(());
            };
            if cli.json {
                return print_json(&result);
            }

            println!("{}", format!("{} / {} over {} days", sport, result.view_name, days).bold());
            print_table(
                result
                    .points
                    .iter()
                    .map(|point| TrendRow {
                        index: point.bucket_index,
                        start: point.start,
                        end: point.end,
                        value: format_value(point.value),
                    })
                    .collect(),
            );
            if result.has_data() {
                println!(
                    "  min {}  max {}",
                    format_value(result.min_value).cyan(),
                    format_value(result.max_value).green()
                );
            } else {
                println!("{}", "  no data in this window".dimmed());
            }
        }

        Commands::Compare {
            sport,
            view,
            exercises,
            days,
        } => {
            let service = build_service(&cli, &config)?;
            let request = CompareRequest::new(cli.user.clone(), *sport, view.clone(), exercises.clone(), *days);

            let Some(result) = service.compare(request).await? else {
                println!("{}", format!("{} has no view named \"{}\"", sport, view).yellow());
                return Ok(());
            };
            if cli.json {
                return print_json(&result);
            }

            println!("{}", format!("{} / {} over {} days", sport, result.view_name, days).bold());
            print_table(
                result
                    .entries
                    .iter()
                    .map(|entry| SkillRow {
                        name: entry.exercise_name.clone(),
                        value: format!("{:.1}", entry.raw_value),
                        share: format!("{:.0}%", entry.percentage),
                        marker: if entry.is_highest { "*".to_string() } else { String::new() },
                    })
                    .collect(),
            );
        }

        Commands::Records { sport, exercise } => {
            let service = build_service(&cli, &config)?;
            let Some(record) = service.best_ever(&cli.user, exercise, *sport).await? else {
                println!("{}", format!("No records for \"{}\" in {}", exercise, sport).yellow());
                return Ok(());
            };
            if cli.json {
                return print_json(&record);
            }

            println!(
                "{}",
                format!("{} ({}, {})", record.exercise_name, record.sport, record.exercise_type).bold()
            );
            print_table(
                record
                    .bests
                    .iter()
                    .map(|(metric, best)| RecordRow {
                        metric: metric.label().to_string(),
                        value: format!("{:.1}", best.value),
                        achieved_on: best.achieved_on,
                    })
                    .collect(),
            );
        }

        Commands::Import { file } => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read fixture: {}", file.display()))?;
            let fixture: StoreFixture = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse fixture: {}", file.display()))?;

            let store = open_database(&cli, &config)?;
            let stats = store.import_fixture(&fixture)?;
            println!(
                "{}",
                format!(
                    "✓ Imported {} sessions, {} occurrences, {} sets",
                    stats.session_count, stats.occurrence_count, stats.set_count
                )
                .green()
            );
        }
    }

    Ok(())
}
