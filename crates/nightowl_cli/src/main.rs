//! NightOwl command line entry point.
//!
//! # Responsibility
//! - Turn command line flags into a `RunConfig`.
//! - Run one fetch-merge-report pass and map the outcome to an exit code.

use chrono::NaiveDate;
use clap::Parser;
use log::{error, info, warn};
use nightowl_core::{
    init_logging, CsvSleepStore, JsonExportSource, RecordSource, ReportGenerator, RunConfig,
    SyncService, TemplateRegistry, DEFAULT_FETCH_DAYS, DEFAULT_OUTPUT_DIR,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "nightowl")]
#[command(about = "Sync exported sleep records into a local history and rebuild dashboards")]
#[command(version)]
struct Cli {
    /// Exported sleep payload (JSON array or `{ "data": [...] }`)
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// First day to sync (YYYY-MM-DD)
    #[arg(long, short = 's', value_parser = parse_date)]
    start_date: Option<NaiveDate>,

    /// Last day to sync (YYYY-MM-DD), defaults to today
    #[arg(long, short = 'e', value_parser = parse_date)]
    end_date: Option<NaiveDate>,

    /// Trailing days to sync when no start date is given
    #[arg(long, short = 'd', default_value_t = DEFAULT_FETCH_DAYS)]
    days: u32,

    /// Directory for the history file and dashboards
    #[arg(long, short = 'o', default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Replace the stored history instead of merging into it
    #[arg(long)]
    overwrite: bool,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Log directory, defaults to <output>/logs
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn into_parts(self) -> (PathBuf, RunConfig) {
        let config = RunConfig {
            start_date: self.start_date,
            end_date: self.end_date,
            days: self.days,
            output_dir: self.output,
            overwrite: self.overwrite,
            debug: self.debug,
            log_dir: self.log_dir,
        };
        (self.input, config)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("`{value}` is not a YYYY-MM-DD date: {err}"))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn main() -> ExitCode {
    let (input, config) = Cli::parse().into_parts();

    if let Err(err) = init_logging(config.log_level(), &absolute(&config.log_dir())) {
        eprintln!("warning: logging disabled: {err}");
    }

    match run(&input, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(input: &Path, config: &RunConfig) -> Result<(), String> {
    let today = chrono::Local::now().date_naive();
    let window = config.fetch_window(today).map_err(|err| err.to_string())?;
    info!(
        "event=cli_run module=cli status=start input={} start={} end={} output={} overwrite={}",
        input.display(),
        window.start,
        window.end,
        config.output_dir.display(),
        config.overwrite
    );

    let raw = JsonExportSource::new(input)
        .fetch(&window)
        .map_err(|err| err.to_string())?;

    let reports = ReportGenerator::new(TemplateRegistry::builtin(), config.dashboard_dir());
    let service = SyncService::new(CsvSleepStore::new(config.store_path())).with_reports(reports);
    let report = service
        .run(&raw, config.overwrite)
        .map_err(|err| err.to_string())?;

    for warning in &report.warnings {
        warn!("event=cli_run module=cli status=warn warning={warning}");
    }
    println!(
        "synced {} records ({} new, {} updated); {} stored in {}",
        report.fetched,
        report.inserted,
        report.replaced,
        report.stored,
        config.store_path().display()
    );
    for path in &report.dashboards {
        println!("dashboard: {}", path.display());
    }
    Ok(())
}
