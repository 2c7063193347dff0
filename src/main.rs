use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

mod aliases;
mod cache;
mod error;
mod filter;
mod likert;
mod metrics;
mod models;
mod normalize;
mod pipeline;
mod report;
mod source;

use aliases::HeaderAliasTable;
use cache::{ContentCache, NoCache, TableCache};
use error::SurveyError;
use filter::{DepartmentFilter, FilterOptions, FilterSelection, Period};
use models::NormalizedTable;

#[derive(Parser)]
#[command(name = "opd-experience")]
#[command(about = "Patient experience (OPD) survey normalizer and summary", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Survey export (.xlsx, .xls or .csv)
    #[arg(long, env = "OPD_SURVEY_FILE", default_value = "mpxo.xlsx")]
    input: PathBuf,
    /// Alternate file tried when the input cannot be loaded
    #[arg(long)]
    fallback: Option<PathBuf>,
    /// JSON file with extra header aliases
    #[arg(long, env = "OPD_ALIAS_FILE")]
    aliases: Option<PathBuf>,
}

#[derive(Args)]
struct SelectionArgs {
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(
        long,
        requires = "year",
        conflicts_with = "month",
        value_parser = clap::value_parser!(u32).range(1..=4)
    )]
    quarter: Option<u32>,
    #[arg(long, requires = "year", value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,
}

impl SelectionArgs {
    fn selection(&self) -> FilterSelection {
        // Record departments are trimmed during normalization.
        let department = match self.department.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => DepartmentFilter::Named(name.to_string()),
            _ => DepartmentFilter::All,
        };
        let period = match (self.year, self.quarter, self.month) {
            (None, _, _) => Period::All,
            (Some(year), Some(quarter), _) => Period::Quarter { year, quarter },
            (Some(year), None, Some(month)) => Period::Month { year, month },
            (Some(year), None, None) => Period::Year(year),
        };
        FilterSelection { department, period }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the scorecard for a selection
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        /// Print the full metric bundle as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// List departments and periods available for filtering
    Facets {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        json: bool,
    },
    /// Re-read the source on an interval and print a one-line summary
    Watch {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
        /// Stop after this many polls
        #[arg(long)]
        polls: Option<u64>,
        /// How long a normalized table may be reused
        #[arg(long, default_value_t = 600)]
        max_age_secs: u64,
    },
}

fn load_aliases(path: Option<&Path>) -> anyhow::Result<HeaderAliasTable> {
    let mut table = HeaderAliasTable::builtin();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read alias file {}", path.display()))?;
        table
            .extend_from_json(&text)
            .with_context(|| format!("failed to apply alias file {}", path.display()))?;
    }
    tracing::debug!(version = table.version(), entries = table.len(), "alias table ready");
    Ok(table)
}

fn load_from(
    path: &Path,
    aliases: &HeaderAliasTable,
    cache: &mut dyn TableCache,
) -> anyhow::Result<Arc<NormalizedTable>> {
    let input = source::read_file(path)?;
    pipeline::load(&input, aliases, cache)
        .with_context(|| format!("failed to load {}", path.display()))
}

/// Tries the input, then the fallback file if one was given.
fn load_table(
    args: &SourceArgs,
    aliases: &HeaderAliasTable,
    cache: &mut dyn TableCache,
) -> anyhow::Result<Arc<NormalizedTable>> {
    match load_from(&args.input, aliases, cache) {
        Ok(table) => Ok(table),
        Err(err) => match &args.fallback {
            Some(fallback) => {
                tracing::warn!(
                    error = %format!("{err:#}"),
                    fallback = %fallback.display(),
                    "primary source failed, trying fallback"
                );
                load_from(fallback, aliases, cache)
            }
            None => Err(err),
        },
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Summary {
            source,
            selection,
            json,
        } => {
            let aliases = load_aliases(source.aliases.as_deref())?;
            let table = load_table(&source, &aliases, &mut NoCache)?;
            let selection = selection.selection();
            let selected = filter::select(&table.records, &selection)?;
            let bundle = metrics::aggregate(selected.iter().copied());

            if json {
                println!("{}", serde_json::to_string_pretty(&bundle)?);
                return Ok(());
            }

            println!(
                "{} ({} of {} records, {} dropped for bad dates)",
                selection,
                selected.len(),
                table.records.len(),
                table.dropped
            );
            for (label, value) in report::scorecard(&bundle) {
                println!("- {label}: {value}");
            }
            let histogram: Vec<String> = bundle
                .rating_histogram
                .iter()
                .map(|(bucket, count)| format!("{bucket}={count}"))
                .collect();
            println!("- ratings: {}", histogram.join(" "));
        }
        Commands::Report {
            source,
            selection,
            out,
        } => {
            let aliases = load_aliases(source.aliases.as_deref())?;
            let table = load_table(&source, &aliases, &mut NoCache)?;
            let selection = selection.selection();
            let selected = filter::select(&table.records, &selection)?;
            let options = FilterOptions::from_records(&table.records);
            let report = report::build_report(&selection, &options, &selected);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Facets { source, json } => {
            let aliases = load_aliases(source.aliases.as_deref())?;
            let table = load_table(&source, &aliases, &mut NoCache)?;
            let options = FilterOptions::from_records(&table.records);

            if json {
                println!("{}", serde_json::to_string_pretty(&options)?);
                return Ok(());
            }

            if let (Some(first), Some(last)) = (options.first_timestamp, options.last_timestamp) {
                println!("Data range: {} - {}", first.format("%d %b %Y"), last.format("%d %b %Y"));
            }
            println!("Departments:");
            for department in &options.departments {
                println!("- {department}");
            }
            println!("Periods:");
            for year in &options.years {
                let quarters = options.quarters.get(year).cloned().unwrap_or_default();
                let months: Vec<String> = options
                    .months
                    .get(year)
                    .map(|months| months.iter().map(|m| filter::month_label(*m)).collect())
                    .unwrap_or_default();
                println!("- {year}: quarters {quarters:?}, months {}", months.join(" "));
            }
        }
        Commands::Watch {
            source,
            selection,
            interval_secs,
            polls,
            max_age_secs,
        } => {
            let aliases = load_aliases(source.aliases.as_deref())?;
            let selection = selection.selection();
            let mut cache = ContentCache::new(Duration::from_secs(max_age_secs));
            let mut poll = 0u64;

            loop {
                poll += 1;
                // A polled export may be mid-write; report and keep going.
                match load_table(&source, &aliases, &mut cache) {
                    Ok(table) => {
                        let selected = filter::filter(&table.records, &selection);
                        if selected.is_empty() {
                            println!("[{poll}] no data for this selection: {selection}");
                        } else {
                            let bundle = metrics::aggregate(selected.iter().copied());
                            println!(
                                "[{poll}] {} respondents, mean {}, return {}, recommend {}, complaints {}",
                                bundle.respondent_count,
                                metrics::format_mean(bundle.mean_satisfaction),
                                metrics::format_rate(bundle.return_rate, 1),
                                metrics::format_rate(bundle.recommend_rate, 1),
                                metrics::format_rate(bundle.complaint_rate, 2),
                            );
                        }
                    }
                    Err(err) => tracing::warn!(poll, error = %format!("{err:#}"), "load failed"),
                }
                tracing::debug!(cached = cache.len(), "poll finished");

                if polls.is_some_and(|limit| poll >= limit) {
                    break;
                }
                std::thread::sleep(Duration::from_secs(interval_secs));
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            match err.downcast_ref::<SurveyError>() {
                Some(SurveyError::EmptyFilterResult { .. }) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
