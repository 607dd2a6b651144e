#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{CommandFactory, Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use cinebias::config::StudyConfig;
use cinebias::data::load_raw_ratings;
use cinebias::explore::summarize;
use cinebias::pipeline::run_study_from_path;
use cinebias::prepare::{DateGranularity, prepare_ratings};

#[derive(Parser)]
#[command(
    name = "cinebias",
    about = "Additive-effects rating models with shrinkage selection",
    long_about = "Fits movie, user, genre, release-year and review-delay effects to a \
                 MovieLens-style ratings file, selects the shrinkage strength on an \
                 internal test split, and scores the result once on a holdout set."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full study on a ratings file
    #[command(about = "Run the study (outputs: results.tsv, lambda_curve.tsv)")]
    Run {
        /// Tab-separated file with userId, movieId, rating, timestamp, title, genres
        ratings: PathBuf,

        /// TOML study configuration; defaults are used when omitted
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Directory for the result tables, overriding the configuration
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Split seed, overriding the configuration
        #[arg(long, value_name = "N")]
        seed: Option<u64>,
    },

    /// Print descriptive statistics of a ratings file
    #[command(about = "Summarize a ratings file")]
    Summarize {
        /// Tab-separated ratings file
        ratings: PathBuf,
    },

    /// Display version and build information
    #[command(about = "Display version and build information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();
    if let Err(e) = dispatch(command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn dispatch(command: Option<Commands>) -> Result<(), Box<dyn Error>> {
    match command {
        Some(Commands::Run {
            ratings,
            config,
            output_dir,
            seed,
        }) => run(&ratings, config.as_deref(), output_dir, seed),
        Some(Commands::Summarize { ratings }) => summarize_file(&ratings),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run(
    ratings: &Path,
    config_path: Option<&Path>,
    output_dir: Option<PathBuf>,
    seed: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let mut config = match config_path {
        Some(path) => {
            log::info!("Reading configuration from '{}'.", path.display());
            StudyConfig::load(path)?
        }
        None => StudyConfig::default(),
    };
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if let Some(seed) = seed {
        config.split.seed = seed;
    }

    let report = run_study_from_path(ratings, &config)?;
    println!("{}", report.results);
    report.write(&config.output_dir)?;
    Ok(())
}

fn summarize_file(ratings: &Path) -> Result<(), Box<dyn Error>> {
    let raw = load_raw_ratings(ratings)?;
    let prepared = prepare_ratings(&raw, DateGranularity::default());
    print!("{}", summarize(&prepared));
    Ok(())
}

/// Format seconds into a human-readable duration like "2.4 hours ago"
fn format_duration_ago(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const YEAR: u64 = 365 * DAY;

    if seconds < MINUTE {
        format!("{} seconds ago", seconds)
    } else if seconds < HOUR {
        format!("{:.1} minutes ago", seconds as f64 / MINUTE as f64)
    } else if seconds < DAY {
        format!("{:.1} hours ago", seconds as f64 / HOUR as f64)
    } else if seconds < YEAR {
        format!("{:.1} days ago", seconds as f64 / DAY as f64)
    } else {
        format!("{:.1} years ago", seconds as f64 / YEAR as f64)
    }
}

fn print_version_info() {
    let version = env!("CARGO_PKG_VERSION");
    let build_timestamp: i64 = env!("CINEBIAS_BUILD_TIMESTAMP").parse().unwrap_or(0);

    println!("cinebias {}", version);

    if build_timestamp > 0 {
        let age = chrono::Utc::now().timestamp() - build_timestamp;
        if age > 0 {
            println!("Built: {}", format_duration_ago(age as u64));
        } else {
            println!("Built: just now");
        }
    }
}
