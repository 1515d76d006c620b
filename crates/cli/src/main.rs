//! Handwritten digit classifier CLI
//!
//! Trains, evaluates and queries the KNN digit classifier, either in-process
//! against a local model directory or through the classifier server.

mod backend;
mod client;
mod commands;
mod config;
mod menu;
mod output;

use anyhow::Result;
use backend::Backend;
use clap::{Parser, Subcommand};
use commands::{configure, predict, show, train};
use digits_lib::{FileRepository, TrainInput};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Handwritten Digit Classifier CLI
#[derive(Parser)]
#[command(name = "digits")]
#[command(author, version, about = "CLI for the Handwritten Digit Classifier", long_about = None)]
pub struct Cli {
    /// Classifier server URL; commands run locally when unset
    #[arg(long, env = "DIGITS_API_URL")]
    pub api_url: Option<String>,

    /// Headerless digits CSV used for local training
    #[arg(long, env = "DIGITS_DATASET_PATH")]
    pub dataset: Option<PathBuf>,

    /// Directory holding the persisted model files
    #[arg(long, env = "DIGITS_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive menu: load, configure, train, evaluate, predict and save
    Menu,

    /// Train, evaluate and save a model
    Train {
        /// Random generator seed for the train/test split (greater than zero)
        #[arg(long, allow_negative_numbers = true)]
        seed: Option<i64>,

        /// Fraction of records held out for testing, between 0 and 1
        #[arg(long)]
        test_size: Option<f64>,

        /// Number of neighbors consulted per prediction
        #[arg(long, short = 'k', allow_negative_numbers = true)]
        k_neighbors: Option<i64>,

        /// Cross-validation folds; 0 disables cross-validation
        #[arg(long, allow_negative_numbers = true)]
        k_fold: Option<i64>,
    },

    /// Predict digits with the saved model
    Predict {
        /// 64 comma-separated pixel values (0-16); separate samples with ';'
        #[arg(long, short)]
        pixels: String,
    },

    /// Show the saved model's parameters and evaluation result
    Show,

    /// Save default settings to the config file
    Configure {
        /// Default classifier server URL
        #[arg(long)]
        api_url: Option<String>,

        /// Default dataset CSV
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Default model directory
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Default output format
        #[arg(long)]
        default_format: Option<output::OutputFormat>,
    },
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_writer(io::stderr)
            .init();
    }

    let config = config::Config::load()?;
    let format = cli.format.or(config.default_format).unwrap_or_default();
    let dataset = cli.dataset.or(config.dataset_path);
    let model_dir = cli
        .model_dir
        .or(config.model_dir)
        .unwrap_or_else(default_model_dir);
    let api_url = cli.api_url.or(config.api_url);

    let make_backend = || -> Result<Backend> {
        match &api_url {
            Some(url) => Backend::remote(url),
            None => Ok(Backend::local(dataset.as_deref(), &model_dir)),
        }
    };

    match cli.command {
        Commands::Menu => {
            if api_url.is_some() {
                output::print_info("The menu always runs locally; --api-url is ignored");
            }
            let stdin = io::stdin();
            let mut menu = menu::Menu::new(
                stdin.lock(),
                io::stdout(),
                backend::data_source(dataset.as_deref()),
                Arc::new(FileRepository::new(&model_dir)),
            );
            menu.run()?;
        }
        Commands::Train {
            seed,
            test_size,
            k_neighbors,
            k_fold,
        } => {
            let input = TrainInput {
                seed,
                test_size,
                k_neighbors,
                k_fold,
            };
            train::train(&make_backend()?, input, format).await?;
        }
        Commands::Predict { pixels } => {
            predict::predict(&make_backend()?, &pixels, format).await?;
        }
        Commands::Show => {
            show::show(&make_backend()?, format).await?;
        }
        Commands::Configure {
            api_url,
            dataset,
            model_dir,
            default_format,
        } => {
            let update = config::Config {
                api_url,
                dataset_path: dataset,
                model_dir,
                default_format,
            };
            configure::configure(update, format)?;
        }
    }

    Ok(())
}
