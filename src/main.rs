//! CLI entry point for `gmail-mbox`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use gmail_mbox::config::{self, Config};
use gmail_mbox::import::{run_import, ImportSummary};
use gmail_mbox::parser::mbox::MboxScanner;
use gmail_mbox::store::SqliteStore;

#[derive(Parser)]
#[command(
    name = "gmail-mbox",
    version,
    about = "Import a Gmail Takeout MBOX archive into SQLite"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every message of an archive into a SQLite database
    Import {
        /// The mbox file to read from
        #[arg(long = "in", value_name = "MBOX")]
        input: Option<PathBuf>,
        /// The sqlite file to dump to
        #[arg(long = "out", value_name = "DB")]
        output: Option<PathBuf>,
        /// Keep SQLite journaling and syncing enabled
        #[arg(long)]
        safe: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count the messages in an archive
    Count {
        path: PathBuf,
    },
    /// Write the default configuration file
    InitConfig,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Import {
            input,
            output,
            safe,
            json,
        } => {
            let input = input.unwrap_or_else(|| config.import.input.clone());
            let output = output.unwrap_or_else(|| config.import.database.clone());
            cmd_import(&input, &output, !safe && config.storage.fast_inserts, json, &config)
        }
        Commands::Count { path } => cmd_count(&path, &config),
        Commands::InitConfig => cmd_init_config(&config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let log_name = log_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Import an archive and print a summary.
fn cmd_import(
    input: &Path,
    output: &Path,
    fast_inserts: bool,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let scanner = MboxScanner::open_with_max_line_size(input, config.performance.max_line_size)?;
    let mut store = SqliteStore::open(output, fast_inserts)?;
    let file_size = std::fs::metadata(input)?.len();

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Importing [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let summary = run_import(
        &scanner,
        &mut store,
        config.performance.max_mime_depth,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;

    pb.finish_and_clear();

    if json {
        print_summary_json(input, output, file_size, &summary)
    } else {
        print_summary_table(input, output, file_size, &summary);
        Ok(())
    }
}

/// Count the messages in an archive.
fn cmd_count(path: &Path, config: &Config) -> anyhow::Result<()> {
    let scanner = MboxScanner::open_with_max_line_size(path, config.performance.max_line_size)?;
    println!("{}", scanner.count_messages()?);
    Ok(())
}

/// Write the current (default or loaded) configuration to disk.
fn cmd_init_config(config: &Config) -> anyhow::Result<()> {
    config::save_config(config)?;
    if let Some(path) = config::config_file_path() {
        println!("{}", path.display());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "gmail-mbox", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn print_summary_table(input: &Path, output: &Path, file_size: u64, summary: &ImportSummary) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Archive", input.display());
    println!("  {:<20} {}", "Archive size", format_size(file_size, BINARY));
    println!("  {:<20} {}", "Database", output.display());
    println!("  {:<20} {}", "Counted", summary.expected);
    println!("  {:<20} {}", "Loaded", summary.persisted);
    println!("  {:<20} {}", "Rejected", summary.rejected);
    println!("  {:<20} {}", "Missing", summary.missing());
    println!("  {:<20} {:.2?}", "Duration", summary.duration);
    println!();
}

fn print_summary_json(
    input: &Path,
    output: &Path,
    file_size: u64,
    summary: &ImportSummary,
) -> anyhow::Result<()> {
    let stats = serde_json::json!({
        "archive": input.to_string_lossy(),
        "archive_size": file_size,
        "database": output.to_string_lossy(),
        "counted": summary.expected,
        "processed": summary.processed,
        "loaded": summary.persisted,
        "rejected": summary.rejected,
        "missing": summary.missing(),
        "duration_ms": summary.duration.as_millis() as u64,
    });

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
