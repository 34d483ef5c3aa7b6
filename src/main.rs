use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use feedboard::cli::correlate::{CorrelateRequest, CorrelateTarget};
use feedboard::cli::series::SeriesView;
use feedboard::core::log::init_logging;
use feedboard::core::series::{LeadingNulls, NormalizeOptions, TrailingNulls};
use feedboard::feeds::FeedKind;
use feedboard::feeds::weather::{Region, WeatherVariable};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args)]
struct GapArgs {
    /// Drop the days before the first real value
    #[arg(long)]
    drop_leading: bool,

    /// Carry the last real value forward to today
    #[arg(long)]
    hold_trailing: bool,
}

impl From<&GapArgs> for NormalizeOptions {
    fn from(args: &GapArgs) -> Self {
        NormalizeOptions {
            leading: if args.drop_leading {
                LeadingNulls::Drop
            } else {
                LeadingNulls::Keep
            },
            trailing: if args.hold_trailing {
                TrailingNulls::Hold
            } else {
                TrailingNulls::Keep
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load a directory of feed files into the store
    Ingest {
        /// Kind of feed the files contain
        #[arg(value_enum)]
        kind: FeedKind,
        /// Directory holding the *.json files
        dir: PathBuf,
        /// Delete each file once it has been stored
        #[arg(long)]
        remove: bool,
    },
    /// Display the daily price series and its distribution
    Series {
        /// Only show this calendar year
        #[arg(long)]
        year: Option<i32>,
        /// Only show this month (1-12)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        /// Number of most recent rows to list
        #[arg(long, default_value_t = 15)]
        last: usize,
        #[command(flatten)]
        gaps: GapArgs,
    },
    /// Display the latest exchange rate per currency
    Rates,
    /// Display price correlations against weather or exchange rates
    Correlate {
        #[arg(value_enum, default_value_t = CorrelateTarget::Weather)]
        target: CorrelateTarget,
        /// Weather variable to correlate with
        #[arg(long, value_enum, default_value_t = WeatherVariable::Temperature)]
        variable: WeatherVariable,
        /// Restrict to one region instead of one coefficient per region
        #[arg(long, value_enum)]
        region: Option<Region>,
        /// Show the pairwise matrix for --region
        #[arg(long, requires = "region")]
        matrix: bool,
        #[command(flatten)]
        gaps: GapArgs,
    },
}

impl From<Commands> for feedboard::AppCommand {
    fn from(cmd: Commands) -> feedboard::AppCommand {
        match cmd {
            Commands::Ingest { kind, dir, remove } => feedboard::AppCommand::Ingest {
                kind,
                dir,
                remove_processed: remove,
            },
            Commands::Series {
                year,
                month,
                last,
                gaps,
            } => feedboard::AppCommand::Series {
                options: (&gaps).into(),
                view: SeriesView { year, month, last },
            },
            Commands::Rates => feedboard::AppCommand::Rates,
            Commands::Correlate {
                target,
                variable,
                region,
                matrix,
                gaps,
            } => feedboard::AppCommand::Correlate {
                options: (&gaps).into(),
                request: CorrelateRequest {
                    target,
                    variable,
                    region,
                    matrix,
                },
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(cmd) => feedboard::run_command(cmd.into()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
