use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "traffic")]
#[command(about = "Generate load against the telemetry demo service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,

    /// Total number of requests
    #[arg(short = 'n', long, default_value_t = 100)]
    requests: usize,

    /// Requests in flight at once
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,

    /// Send every tenth request to /error
    #[arg(long)]
    include_errors: bool,

    /// Finish with one request to /debug-sentry
    #[arg(long)]
    include_fault: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

type Tally = BTreeMap<String, usize>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .build()?;
    let base = cli.url.trim_end_matches('/').to_string();
    let next = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let mut workers = JoinSet::new();
    for _ in 0..cli.concurrency.max(1) {
        let client = client.clone();
        let base = base.clone();
        let next = Arc::clone(&next);
        let (total, include_errors) = (cli.requests, cli.include_errors);
        workers.spawn(async move {
            let mut tally = Tally::new();
            loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                if i >= total {
                    break;
                }
                let path = if include_errors && i % 10 == 9 { "/error" } else { "/" };
                *tally.entry(hit(&client, &base, path).await).or_default() += 1;
            }
            tally
        });
    }

    let mut tally = Tally::new();
    while let Some(result) = workers.join_next().await {
        for (status, count) in result? {
            *tally.entry(status).or_default() += count;
        }
    }

    if cli.include_fault {
        let status = hit(&client, &base, "/debug-sentry").await;
        println!("/debug-sentry -> {}", status);
    }

    let elapsed = started.elapsed();
    println!(
        "{} requests in {:.2}s ({:.1} req/s)",
        cli.requests,
        elapsed.as_secs_f64(),
        cli.requests as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    for (status, count) in &tally {
        println!("  {:<24} {}", status, count);
    }

    Ok(())
}

async fn hit(client: &reqwest::Client, base: &str, path: &str) -> String {
    match client.get(format!("{}{}", base, path)).send().await {
        Ok(res) => res.status().as_u16().to_string(),
        Err(e) if e.is_timeout() => "timeout".to_string(),
        Err(e) if e.is_connect() => "connect error".to_string(),
        Err(_) => "transport error".to_string(),
    }
}
