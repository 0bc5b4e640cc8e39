//! Throughput/latency smoke test for the proxy's relay path.

use fleetfront::config::schema::ServerConfig;
use std::collections::HashMap;
use std::time::Instant;

mod common;

#[tokio::test]
async fn handles_concurrent_load_without_errors() {
    let backend_addr = common::start_mock_backend("Hello from backend").await;

    let mut config = ServerConfig::default();
    config.routes = HashMap::from([("/".to_string(), vec![format!("http://{backend_addr}")])]);
    config.health_check.enabled = false;

    let proxy = common::start_proxy(config).await;
    let url = format!("http://{}", proxy.addr);

    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            let mut successes = 0;
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        successes += 1;
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            (successes, latencies)
        }));
    }

    let mut total_successes = 0;
    let mut all_latencies = Vec::new();
    for task in tasks {
        let (successes, latencies) = task.await.unwrap();
        total_successes += successes;
        all_latencies.extend(latencies);
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(total_successes, total_requests, "every request should succeed against a healthy single backend");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {total_requests}");
    println!("Concurrency:    {concurrency}");
    println!("Total Duration: {duration:?}");
    println!("Requests/sec:   {rps:.2}");
    println!("P50 Latency:    {p50:?}");
    println!("P99 Latency:    {p99:?}");
    println!("-------------------------\n");

    proxy.shutdown();
}
