use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cogwar::analytics::SmoothingMethod;
use cogwar::config::Config;
use cogwar::dashboard::AnalysisParams;
use cogwar::export::ExportTarget;

mod commands;

use commands::{DetectParams, OutputFormat, SeriesParams};

#[derive(Parser)]
#[command(
    name = "cogwar",
    version,
    about = "Temporal burst analytics for classified cognitive warfare text chunks",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); COGWAR_* environment variables otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

/// Analysis options shared by `detect` and `series`
#[derive(Args, Debug, Clone)]
struct AnalysisArgs {
    /// Event file (CSV or JSON) to analyse instead of the database
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Bucket granularity (day, week, month, year)
    #[arg(short, long)]
    granularity: Option<String>,

    /// Standard-score threshold (0-10)
    #[arg(short, long)]
    sensitivity: Option<f64>,

    /// Comma-separated sources to include
    #[arg(long)]
    sources: Option<String>,

    /// Comma-separated languages to include
    #[arg(long)]
    languages: Option<String>,

    /// Comma-separated top-level categories to include
    #[arg(long)]
    categories: Option<String>,

    /// First day of the analysed range (YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// Last day of the analysed range (YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,

    /// Also detect bursts separately for every category
    #[arg(long, default_value = "false")]
    per_category: bool,
}

impl AnalysisArgs {
    fn into_params(self) -> (Option<PathBuf>, AnalysisParams) {
        let params = AnalysisParams {
            granularity: self.granularity,
            sensitivity: self.sensitivity,
            sources: self.sources,
            languages: self.languages,
            categories: self.categories,
            start: self.start,
            end: self.end,
            per_category: self.per_category,
        };
        (self.input, params)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Detect bursts
    Detect {
        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// What to export with csv/json output (intervals, buckets)
        #[arg(long, default_value = "intervals")]
        target: ExportTarget,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the bucket series with bursts marked
    Series {
        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Rolling-mean window in buckets
        #[arg(long, conflicts_with = "ewm_span")]
        rolling: Option<usize>,

        /// Exponential smoothing span in buckets
        #[arg(long)]
        ewm_span: Option<usize>,
    },

    /// Import an event file into the database
    Import {
        /// Input file (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Rows per transaction
        #[arg(short, long, default_value = "1000")]
        batch_size: usize,
    },

    /// Show available filter values
    Filters {
        /// Event file to inspect instead of the database
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Start the dashboard API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());

    // Initialize tracing/logging
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("cogwar starting");

    match cli.command {
        Commands::Detect {
            analysis,
            format,
            target,
            output,
        } => {
            let (input, analysis) = analysis.into_params();
            tracing::info!(
                input = ?input,
                granularity = ?analysis.granularity,
                sensitivity = ?analysis.sensitivity,
                format = ?format,
                "Starting detect command"
            );
            commands::detect(
                &config,
                DetectParams {
                    input,
                    analysis,
                    format,
                    target,
                    output,
                },
            )?;
        }

        Commands::Series {
            analysis,
            rolling,
            ewm_span,
        } => {
            let (input, analysis) = analysis.into_params();
            let smoothing = match (rolling, ewm_span) {
                (Some(window), _) => Some(SmoothingMethod::Rolling { window }),
                (None, Some(span)) => Some(SmoothingMethod::Exponential { span }),
                (None, None) => None,
            };
            tracing::info!(input = ?input, smoothing = ?smoothing, "Starting series command");
            commands::series(
                &config,
                SeriesParams {
                    input,
                    analysis,
                    smoothing,
                },
            )?;
        }

        Commands::Import { input, batch_size } => {
            tracing::info!(
                input = %input.display(),
                batch_size = %batch_size,
                "Starting import command"
            );
            commands::import(&config, &input, batch_size)?;
        }

        Commands::Filters { input } => {
            commands::filters(&config, input.as_deref())?;
        }

        Commands::Serve { host, port } => {
            tracing::info!(host = ?host, port = ?port, "Starting serve command");
            commands::serve(config, host, port).await?;
        }
    }

    tracing::info!("cogwar completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("cogwar=debug,tower_http=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("cogwar={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
