//! Failure injection tests: circuit breaker, health-based eviction, rate
//! limiting, exercised through a real `ConnectionDriver` over TCP.

use fleetfront::config::schema::{CircuitBreakerConfig, HealthCheckConfig, RateLimiterConfig, RateLimiterStrategy, ServerConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod common;

fn config_with_routes(backends: Vec<String>) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.routes = HashMap::from([("/".to_string(), backends)]);
    config.health_check.enabled = false;
    config
}

#[tokio::test]
async fn circuit_breaker_opens_after_consecutive_failures() {
    let backend_addr = common::start_programmable_backend(|| async { (500, "broken".to_string()) }).await;

    let mut config = config_with_routes(vec![format!("http://{backend_addr}")]);
    config.circuit_breaker = CircuitBreakerConfig {
        enabled: true,
        failure_threshold: 2,
        open_timeout_secs: 60,
        reset_timeout_secs: 60,
        half_open_probes: 1,
    };

    let proxy = common::start_proxy(config).await;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}", proxy.addr);

    // First two requests reach the backend and observe its 500; the third
    // should find the circuit open and fail fast with 503 instead.
    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.status(), 500);
    let second = client.get(&url).send().await.unwrap();
    assert_eq!(second.status(), 500);
    let third = client.get(&url).send().await.unwrap();
    assert_eq!(third.status(), 503, "circuit should be open after the failure threshold");

    proxy.shutdown();
}

#[tokio::test]
async fn passive_health_evicts_a_failing_backend_from_rotation() {
    let b1_addr = common::start_mock_backend("b1").await;

    let b2_healthy = Arc::new(AtomicBool::new(true));
    let flag = b2_healthy.clone();
    let b2_addr = common::start_programmable_backend(move || {
        let flag = flag.clone();
        async move {
            if flag.load(Ordering::SeqCst) {
                (200, "b2".to_string())
            } else {
                (500, "dead".to_string())
            }
        }
    })
    .await;

    let mut config = config_with_routes(vec![format!("http://{b1_addr}"), format!("http://{b2_addr}")]);
    config.health_check = HealthCheckConfig { enabled: false, ..HealthCheckConfig::default() };

    let proxy = common::start_proxy(config).await;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}", proxy.addr);

    let mut b1_hits = 0;
    let mut b2_hits = 0;
    for _ in 0..20 {
        let res = client.get(&url).send().await.unwrap();
        let body = res.text().await.unwrap();
        match body.as_str() {
            "b1" => b1_hits += 1,
            "b2" => b2_hits += 1,
            _ => {}
        }
    }
    assert!(b1_hits > 0, "round robin should have reached b1");
    assert!(b2_hits > 0, "round robin should have reached b2");

    b2_healthy.store(false, Ordering::SeqCst);

    // Drive enough failing requests through b2 to cross the default passive
    // failure threshold and evict it from rotation.
    for _ in 0..10 {
        let _ = client.get(&url).send().await;
    }

    let mut b1_hits_after = 0;
    let mut b2_hits_after = 0;
    for _ in 0..10 {
        let res = client.get(&url).send().await.unwrap();
        let body = res.text().await.unwrap();
        match body.as_str() {
            "b1" => b1_hits_after += 1,
            "b2" => b2_hits_after += 1,
            _ => {}
        }
    }
    assert_eq!(b1_hits_after, 10, "only b1 should be reachable once b2 is evicted");
    assert_eq!(b2_hits_after, 0, "b2 should have been evicted from rotation");

    proxy.shutdown();
}

#[tokio::test]
async fn rate_limiter_rejects_once_the_burst_is_exhausted() {
    let backend_addr = common::start_mock_backend("ok").await;

    let mut config = config_with_routes(vec![format!("http://{backend_addr}")]);
    config.rate_limiter = RateLimiterConfig {
        enabled: true,
        requests_per_second: 1,
        burst_size: 3,
        strategy: RateLimiterStrategy::TokenBucket,
        per_path: false,
    };

    let proxy = common::start_proxy(config).await;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}", proxy.addr);

    let mut saw_429 = false;
    for _ in 0..10 {
        let res = client.get(&url).send().await.unwrap();
        if res.status() == 429 {
            saw_429 = true;
            assert!(res.headers().contains_key("retry-after"));
            break;
        }
    }
    assert!(saw_429, "burst of requests beyond the bucket capacity should be rate limited");

    proxy.shutdown();
}

#[tokio::test]
async fn connection_limit_applies_backpressure_to_new_connections() {
    let backend_addr = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        (200, "slow".to_string())
    })
    .await;

    let mut config = config_with_routes(vec![format!("http://{backend_addr}")]);
    config.listener.max_connections = 1;

    let proxy = common::start_proxy(config).await;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}", proxy.addr);

    let url_a = url.clone();
    let client_a = client.clone();
    let first = tokio::spawn(async move { client_a.get(&url_a).send().await });

    // Give the first request time to occupy the single connection slot.
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second_started = std::time::Instant::now();
    let second = client.get(&url).send().await.unwrap();
    assert_eq!(second.status(), 200);
    assert!(
        second_started.elapsed() >= Duration::from_millis(100),
        "second connection should have waited for the first to finish"
    );

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), 200);

    proxy.shutdown();
}
