// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::assembler::OutputFormat;
use crate::checkpoint::{DatabaseConnection, JobStatus, Repository};
use crate::classifier::StopwordClassifier;
use crate::engine::HttpEngine;
use crate::job::JobManager;

mod app_config;
mod assembler;
mod checkpoint;
mod classifier;
mod driver;
mod engine;
mod errors;
mod extractor;
mod file_utils;
mod job;
mod language_utils;

/// CLI wrapper for OutputFormat to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    Json,
    Csv,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(cli_format: CliOutputFormat) -> Self {
        match cli_format {
            CliOutputFormat::Json => OutputFormat::Json,
            CliOutputFormat::Csv => OutputFormat::Csv,
        }
    }
}

/// CLI wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LevelFilter {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LevelFilter::Error,
            CliLogLevel::Warn => LevelFilter::Warn,
            CliLogLevel::Info => LevelFilter::Info,
            CliLogLevel::Debug => LevelFilter::Debug,
            CliLogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a document and write the assembled output
    Translate {
        /// Input document (txt, md, csv, docx, or pdf)
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        /// Target language code (e.g., 'en', 'es', 'fr')
        #[arg(short, long)]
        target_language: Option<String>,

        /// Output representation
        #[arg(short = 'F', long, value_enum, default_value = "json")]
        output_format: CliOutputFormat,

        /// Output file path; defaults to the input path with a new extension
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the status of a job
    Status {
        /// Job identifier
        job_id: String,
    },

    /// List jobs, newest first
    List {
        /// Only show jobs with this status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Resume an interrupted job from its checkpoints
    Resume {
        /// Job identifier
        job_id: String,

        /// Output file path for the assembled result
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a job and all its stored blocks and checkpoints
    Delete {
        /// Job identifier
        job_id: String,
    },
}

/// doctrans - document translation pipeline
///
/// Extracts translatable blocks from documents, pushes them through a
/// translation engine, and reassembles the result. Progress is checkpointed
/// per block so interrupted jobs can be resumed.
#[derive(Parser, Debug)]
#[command(name = "doctrans")]
#[command(version = "0.3.0")]
#[command(about = "Checkpointed document translation pipeline")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let color = Self::color_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:5} {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default;
    // the level is updated after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Some(level) = cli.log_level {
        log::set_max_level(level.into());
    }

    let config = load_or_create_config(&cli.config_path)?;

    if cli.log_level.is_none() {
        let level = match config.log_level {
            app_config::LogLevel::Error => LevelFilter::Error,
            app_config::LogLevel::Warn => LevelFilter::Warn,
            app_config::LogLevel::Info => LevelFilter::Info,
            app_config::LogLevel::Debug => LevelFilter::Debug,
            app_config::LogLevel::Trace => LevelFilter::Trace,
        };
        log::set_max_level(level);
    }

    let manager = build_manager(config)?;

    match cli.command {
        Commands::Translate {
            input_path,
            target_language,
            output_format,
            output,
        } => {
            run_translate(
                &manager,
                &input_path,
                target_language.as_deref(),
                output_format.into(),
                output,
            )
            .await
        }
        Commands::Status { job_id } => {
            let snapshot = manager.snapshot(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::List { status } => {
            let filter = status
                .map(|s| s.parse::<JobStatus>())
                .transpose()
                .context("Invalid status filter")?;
            let jobs = manager.list_jobs(filter).await?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
            Ok(())
        }
        Commands::Resume { job_id, output } => {
            let record = manager.resume_job(&job_id).await?;
            info!("Job {} is now {}", record.id, record.status);

            if record.status == JobStatus::Completed {
                let content = manager.render_output(&record.id).await?;
                let path = output.unwrap_or_else(|| {
                    PathBuf::from(format!("{}.{}", record.filename, record.output_format))
                });
                file_utils::write_atomic(&path, &content)?;
                info!("Output written to {:?}", path);
            }
            Ok(())
        }
        Commands::Delete { job_id } => {
            manager.delete_job(&job_id).await?;
            info!("Deleted job {}", job_id);
            Ok(())
        }
    }
}

/// Load an existing config file or write a default one next to the binary
fn load_or_create_config(config_path: &str) -> Result<Config> {
    let config = if Path::new(config_path).exists() {
        Config::from_file(config_path)?
    } else {
        warn!(
            "Config file not found at '{}', creating default config.",
            config_path
        );
        let config = Config::default();
        config.save(config_path)?;
        config
    };

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Wire up the job manager from configuration
fn build_manager(config: Config) -> Result<JobManager> {
    let db = if config.database_path.is_empty() {
        DatabaseConnection::new_default()?
    } else {
        DatabaseConnection::new(&config.database_path)?
    };

    let engine = HttpEngine::new(&config.engine.endpoint, config.engine.timeout_secs)?;

    Ok(JobManager::new(
        Repository::new(db),
        Arc::new(engine),
        Arc::new(StopwordClassifier),
        config,
    ))
}

async fn run_translate(
    manager: &JobManager,
    input_path: &Path,
    target_language: Option<&str>,
    output_format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    if !input_path.is_file() {
        return Err(anyhow!("Input path does not exist: {:?}", input_path));
    }

    let document = file_utils::read_bytes(input_path)?;
    let filename = file_utils::file_name(input_path);

    let job = manager
        .create_job(&filename, &document, target_language, output_format)
        .await?;
    info!("Created job {}", job.id);

    let done = manager.run_job(&job.id, &document).await?;
    info!(
        "Job {} finished as {} ({} translated, {} skipped, {} failed)",
        done.id, done.status, done.blocks_translated, done.blocks_skipped, done.blocks_failed
    );

    if done.status != JobStatus::Completed {
        return Err(anyhow!(
            "Job {} failed: {}",
            done.id,
            done.error.unwrap_or_else(|| "unknown error".to_string())
        ));
    }

    let content = manager.render_output(&done.id).await?;
    let path = output.unwrap_or_else(|| input_path.with_extension(output_format.to_string()));
    file_utils::write_atomic(&path, &content)?;
    info!("Output written to {:?}", path);

    Ok(())
}
