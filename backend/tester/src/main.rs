use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use store::{Board, Snapshot, Status};

/// Polls the live board the way the dashboard does and prints what it sees.
#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    url: String,

    #[arg(long, default_value_t = 5)]
    polls: u32,

    #[arg(long, default_value_t = 2000)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::new();
    let endpoint = format!("{}/api/maintenance/live", args.url.trim_end_matches('/'));

    for poll in 1..=args.polls {
        let snapshot: Snapshot = client
            .get(&endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let staleness = Utc::now() - snapshot.server_time;
        if snapshot.board.is_empty() {
            println!(
                "[{poll}/{}] board empty, staleness {}ms",
                args.polls,
                staleness.num_milliseconds()
            );
        } else {
            print_buckets(poll, args.polls, &snapshot.board, staleness.num_milliseconds());
        }

        if poll < args.polls {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
    }

    Ok(())
}

fn print_buckets(poll: u32, polls: u32, board: &Board, staleness_ms: i64) {
    let counts: Vec<String> = Status::ALL
        .iter()
        .map(|status| format!("{status}={}", board.bucket(*status).len()))
        .collect();

    println!(
        "[{poll}/{polls}] {} total ({}) staleness {staleness_ms}ms",
        board.len(),
        counts.join(", "),
    );
}
