use anyhow::{bail, Context};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use logspan::config::parse_zone;
use logspan::{
    filter_by_window, FileParseCoordinator, Interval, LineMode, LogParser, OutputFormat,
    OutputFormatter, ParseOutcome, ParserConfig, Schedule,
};

#[derive(Parser)]
#[command(name = "logspan")]
#[command(about = "Reconstruct events from server logs and report what each file covers")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// YAML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Line layout, e.g. "[LEVEL TIMESTAMP <THREAD> tid=PROP(tid)] MESSAGE"
    #[arg(long, global = true)]
    layout: Option<String>,

    /// Timestamp format, e.g. "yyyy/MM/dd HH:mm:ss.SSS z"
    #[arg(long = "timestamp-format", global = true, value_name = "FORMAT")]
    timestamp_format: Option<String>,

    /// Zone for timestamps that carry none (+02:00, UTC, PST, ...)
    #[arg(long, global = true)]
    zone: Option<String>,

    /// Fold unclassified lines into the open event for every scan
    #[arg(long, global = true)]
    append: bool,

    /// Parse files concurrently
    #[arg(long, global = true)]
    parallel: bool,

    /// Bound the number of parallel workers (implies --parallel)
    #[arg(long = "max-workers", global = true, value_name = "N")]
    max_workers: Option<usize>,

    /// Only look at files directly under the root
    #[arg(long = "no-recursive", global = true)]
    no_recursive: bool,

    /// Log file extension, without the dot ("" for every file)
    #[arg(long, global = true, value_name = "EXT")]
    extension: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Logfmt)]
    format: OutputFormat,

    /// Force colored output
    #[arg(long, global = true, conflicts_with = "no_color")]
    color: bool,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Debug mode - log parsing details to stderr
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Report the time span each log file covers
    Interval {
        /// Log file or directory
        path: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Report time span, version, OS and system properties of each log file
    Metadata {
        /// Log file or directory
        path: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Print every event of one log file
    Events {
        file: PathBuf,
        /// Also print lines that belong to no event
        #[arg(long)]
        unmatched: bool,
        /// Print assembly statistics after the events
        #[arg(long)]
        stats: bool,
    },
}

#[derive(ClapArgs)]
struct WindowArgs {
    /// Keep files that cover anything after this date
    #[arg(long, value_name = "DATE")]
    from: Option<String>,

    /// Keep files that cover anything before this date
    #[arg(long, value_name = "DATE")]
    to: Option<String>,

    /// Keep files that cover the last DURATION, e.g. "2h" or "3days"
    #[arg(long, value_name = "DURATION", conflicts_with_all = ["from", "to"])]
    last: Option<String>,
}

impl Args {
    fn color_preference(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    fn parser_config(&self) -> anyhow::Result<ParserConfig> {
        let mut config = match &self.config {
            Some(path) => ParserConfig::load(path)?,
            None => ParserConfig::default(),
        };
        if let Some(layout) = &self.layout {
            config.layout = layout.clone();
        }
        if let Some(format) = &self.timestamp_format {
            config.timestamp_format = format.clone();
        }
        if let Some(zone) = &self.zone {
            config.default_zone = parse_zone(zone)?;
        }
        if self.append {
            config.line_mode = LineMode::Append;
            config.metadata_line_mode = LineMode::Append;
        }
        if self.parallel || self.max_workers.is_some() {
            config.schedule = Schedule::Parallel;
        }
        if self.max_workers.is_some() {
            config.max_workers = self.max_workers;
        }
        if self.no_recursive {
            config.recursive = false;
        }
        if let Some(extension) = &self.extension {
            config.extension = extension.trim_start_matches('.').to_string();
        }
        Ok(config)
    }
}

impl WindowArgs {
    fn window(&self, zone: FixedOffset) -> anyhow::Result<Option<Interval>> {
        let now = Utc::now();
        if let Some(last) = &self.last {
            let span = humantime::parse_duration(last)
                .with_context(|| format!("Invalid duration '{}'", last))?;
            let delta = chrono::Duration::from_std(span)
                .with_context(|| format!("Duration '{}' is too long", last))?;
            let start = now
                .checked_sub_signed(delta)
                .context("Duration reaches past the earliest supported date")?;
            return Ok(Some(Interval::new(zone, Some(start), Some(now))?));
        }
        if self.from.is_none() && self.to.is_none() {
            return Ok(None);
        }
        let start = match &self.from {
            Some(text) => parse_date(text, zone)?,
            None => Utc.timestamp_opt(0, 0).single().unwrap_or(now),
        };
        let finish = match &self.to {
            Some(text) => parse_date(text, zone)?,
            None => now,
        };
        Ok(Some(Interval::new(zone, Some(start), Some(finish))?))
    }
}

fn parse_date(text: &str, zone: FixedOffset) -> anyhow::Result<DateTime<Utc>> {
    dateparser::parse_with_timezone(text, &zone).with_context(|| format!("Invalid date '{}'", text))
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if debug { "logspan=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

    let code = match run(args) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };
    std::process::exit(code);
}

/// Returns whether every file parsed successfully.
fn run(args: Args) -> anyhow::Result<bool> {
    let config = args.parser_config()?;
    let formatter = OutputFormatter::new(args.format, args.color_preference());
    let stdout = io::stdout();
    let mut output = BufWriter::new(stdout.lock());

    let all_ok = match &args.command {
        Command::Interval { path, window } => {
            let window = window.window(config.default_zone)?;
            let coordinator = FileParseCoordinator::from_config(&config)?;
            let outcomes = coordinator.parse_interval(path);
            write_outcomes(&formatter, &mut output, outcomes, window.as_ref())?
        }
        Command::Metadata { path, window } => {
            let window = window.window(config.default_zone)?;
            let coordinator = FileParseCoordinator::from_config(&config)?;
            let outcomes = coordinator.parse_metadata(path);
            write_outcomes(&formatter, &mut output, outcomes, window.as_ref())?
        }
        Command::Events {
            file,
            unmatched,
            stats,
        } => {
            if file.is_dir() {
                bail!("'{}' is a directory; events reads a single file", file.display());
            }
            let parser = LogParser::from_config(&config)?;
            match parser.parse_events(file) {
                Ok(assembly) => {
                    for event in &assembly.events {
                        formatter.write_event(&mut output, event)?;
                    }
                    if *unmatched {
                        for line in &assembly.unmatched {
                            formatter.write_unmatched(&mut output, line)?;
                        }
                    }
                    if *stats {
                        formatter.write_stats(&mut output, &assembly.stats)?;
                    }
                    true
                }
                Err(e) => {
                    output.flush()?;
                    eprintln!("Error: {}", e);
                    false
                }
            }
        }
    };

    output.flush()?;
    Ok(all_ok)
}

fn write_outcomes<W, T>(
    formatter: &OutputFormatter,
    output: &mut W,
    outcomes: Vec<ParseOutcome<T>>,
    window: Option<&Interval>,
) -> anyhow::Result<bool>
where
    W: Write,
    T: serde::Serialize + logspan::coordinator::Covered,
{
    let outcomes = match window {
        Some(window) => filter_by_window(outcomes, window),
        None => outcomes,
    };
    let mut all_ok = true;
    for outcome in &outcomes {
        all_ok &= outcome.is_success();
        formatter.write_outcome(output, outcome)?;
    }
    Ok(all_ok)
}
