use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use process::{Simulator, SimulatorConfig};
use store::SqliteStore;
use tracing_subscriber::{EnvFilter, fmt};

/// Runs a fixed number of simulator ticks against a database, then exits.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://gearguard.db?mode=rwc")]
    database_url: String,

    /// Optional `.csv` or `.json` feed to sample from.
    #[arg(long, env = "SIM_DATA_PATH")]
    data_path: Option<PathBuf>,

    /// Seconds between ticks.
    #[arg(long, default_value_t = 1)]
    interval: u64,

    #[arg(long, default_value_t = 5)]
    ticks: u64,

    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let store = Arc::new(SqliteStore::connect_default(&args.database_url).await?);
    let mut simulator = Simulator::new(
        SimulatorConfig {
            data_path: args.data_path,
            interval: Duration::from_secs(args.interval),
            seed: args.seed,
        },
        store,
    )
    .await;

    let pb = ProgressBar::new(args.ticks);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut inserted = 0;
    let mut failed = 0;

    for tick in 1..=args.ticks {
        let report = simulator.tick().await;
        inserted += report.inserted.len();
        failed += report.failures.len();

        pb.set_message(format!("{inserted} inserted, {failed} failed"));
        pb.inc(1);

        if tick < args.ticks {
            tokio::time::sleep(Duration::from_secs(args.interval)).await;
        }
    }

    pb.finish_with_message("Done");

    println!("Total Inserted: {inserted}");
    println!("Total Failed: {failed}");

    Ok(())
}
