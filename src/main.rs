//! UPI Fraud Detector - Main Entry Point
//!
//! Checks a single transaction, scores a CSV batch, prints the sample
//! template, or runs as a NATS worker.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use upi_fraud_detector::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    worker, Detector, Transaction, SAMPLE_CSV,
};

/// UPI transaction fraud detector
#[derive(Parser, Debug)]
#[command(name = "upi-fraud", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a single transaction
    Check {
        /// Transaction amount
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
        /// Transaction date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Transaction type, e.g. "Purchase"
        #[arg(long)]
        transaction_type: String,
        /// Payment gateway, e.g. "Paytm"
        #[arg(long)]
        payment_gateway: String,
        /// Transaction state, e.g. "Karnataka"
        #[arg(long)]
        state: String,
        /// Merchant category, e.g. "Utilities"
        #[arg(long)]
        merchant_category: String,
    },
    /// Check every transaction of a CSV file
    Batch {
        /// Input CSV (see `upi-fraud template`)
        input: PathBuf,
        /// Where to write the scored rows
        #[arg(short, long, default_value = "fraud_results.csv")]
        output: PathBuf,
        /// Where to write rows that could not be scored
        #[arg(long)]
        errors: Option<PathBuf>,
    },
    /// Print the sample CSV format
    Template,
    /// Score transactions received over NATS
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(&cli.config)?;
    init_logging(&config.logging)?;
    if cli.config.exists() {
        info!(path = %cli.config.display(), "Configuration loaded");
    } else {
        warn!(path = %cli.config.display(), "Configuration file not found, using defaults");
    }

    match cli.command {
        Commands::Template => {
            print!("{SAMPLE_CSV}");
            Ok(())
        }
        Commands::Check {
            amount,
            date,
            transaction_type,
            payment_gateway,
            state,
            merchant_category,
        } => {
            let detector = Detector::from_config(&config)?;
            let tx = Transaction::new(
                amount,
                date.unwrap_or_else(|| Local::now().date_naive()),
                transaction_type,
                payment_gateway,
                state,
                merchant_category,
            );
            let verdict = detector.check(&tx).context("Transaction could not be checked")?;
            println!("{}", verdict.message());
            Ok(())
        }
        Commands::Batch {
            input,
            output,
            errors,
        } => {
            let detector = Detector::from_config(&config)?;
            run_batch(&detector, &input, &output, errors.as_deref())
        }
        Commands::Serve => {
            info!("Starting UPI fraud detection worker");
            let detector = Detector::from_config(&config)?;
            worker::run(config, detector).await
        }
    }
}

fn run_batch(
    detector: &Detector,
    input: &Path,
    output: &Path,
    errors: Option<&Path>,
) -> Result<()> {
    let reader = File::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let report = detector
        .check_batch(BufReader::new(reader))
        .with_context(|| format!("Failed to check {}", input.display()))?;

    let writer = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    report.write_results(BufWriter::new(writer))?;

    for err in report.errors() {
        eprintln!("{err}");
    }
    if let Some(path) = errors {
        let writer = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        report.write_errors(BufWriter::new(writer))?;
    }

    println!("All transactions checked: {}", report.summary());
    println!("Results written to {}", output.display());
    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("upi_fraud_detector={}", logging.level).parse()?);

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}
