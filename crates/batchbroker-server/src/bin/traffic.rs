//! Dummy Traffic Generator
//!
//! Drives a running batchbroker instance with randomized produce traffic.
//! A pool of worker tasks POSTs small JSON records to `/add` with jittered
//! sleeps, which exercises the batching window under realistic concurrent
//! load.
//!
//! ## Configuration
//! - `BATCHBROKER_URL`: Base URL of the broker (default: http://127.0.0.1:8080)
//! - `TRAFFIC_WORKERS`: Number of concurrent workers (default: 100)
//! - `TRAFFIC_REQUESTS`: Total number of records to send (default: 10000)

use rand::Rng;
use serde_json::json;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let base_url = env_or("BATCHBROKER_URL", "http://127.0.0.1:8080");
    let workers: usize = env_or("TRAFFIC_WORKERS", "100").parse()?;
    let requests: usize = env_or("TRAFFIC_REQUESTS", "10000").parse()?;

    tracing::info!(base_url, workers, requests, "starting traffic generator");

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let client = reqwest::Client::new();
        let add_url = format!("{}/add", base_url);

        handles.push(tokio::spawn(async move {
            // Each worker sends the IDs congruent to its index.
            for id in (worker..requests).step_by(workers.max(1)) {
                let jitter = {
                    let mut rng = rand::thread_rng();
                    std::time::Duration::from_millis(rng.gen_range(0..5_000))
                };
                tokio::time::sleep(jitter).await;

                let record = json!({ "id": id }).to_string();
                match client.post(&add_url).body(record).send().await {
                    Ok(response) if response.status().is_success() => {}
                    Ok(response) => {
                        tracing::error!(id, status = %response.status(), "add rejected");
                    }
                    Err(err) => {
                        tracing::error!(id, error = %err, "add failed");
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }

    tracing::info!("traffic generator done");
    Ok(())
}
