use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csvql::config::{Params, STORAGE_ENV};
use csvql::Csvql;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Parser)]
#[command(name = "csvql")]
#[command(about = "Load delimited files into SQLite and query or export them")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and run queries from csv files
    #[command(after_help = "Example: csvql run -f test.csv -d \";\"")]
    Run {
        /// Origin file in csv (repeatable)
        #[arg(short, long = "file", required = true)]
        file: Vec<PathBuf>,

        /// Field delimiter
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,

        /// Query to run after the import; opens the prompt when absent
        #[arg(short, long)]
        query: Option<String>,

        /// Export path
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Export format [csv, jsonl]
        #[arg(short = 't', long = "type")]
        export_type: Option<String>,

        /// SQLite file, in memory when unset
        #[arg(short, long, env = STORAGE_ENV)]
        storage: Option<String>,

        /// Maximum number of rows to load
        #[arg(short, long)]
        lines: Option<u64>,
    },
    /// Print the csvql version
    Version,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Run {
            file,
            delimiter,
            query,
            export,
            export_type,
            storage,
            lines,
        } => {
            let params = Params {
                file_inputs: file,
                delimiter,
                query,
                export,
                export_type,
                storage,
                lines,
            };

            let mut csvql = Csvql::new(params).context("failed to initialize csvql")?;
            let result = csvql.run().await.context("failed to run csvql");
            csvql.close();
            result?;
            info!("Done");
        }
        Commands::Version => {
            let version =
                std::env::var("VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
            println!("csvql {}", version);
        }
    }

    Ok(())
}
