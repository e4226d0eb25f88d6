//! Basic resilient client usage example
//!
//! Run with `RUST_LOG=resilience_machines=debug` to see breaker and retry
//! decisions.

use resilience_machines::{
    Callbacks, ClientConfig, RequestSpec, ResilientClient, Response, Transition, TransportError,
    TransportFn,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Resilient Client Basic Example ===\n");

    // Every third call to /flaky fails, /down always fails
    let calls = Arc::new(AtomicU32::new(0));
    let transport = {
        let calls = calls.clone();
        TransportFn::new(move |spec: RequestSpec| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if spec.url.starts_with("/down") {
                    return Err(TransportError::http(503, "service unavailable"));
                }
                if n % 3 == 0 {
                    return Err(TransportError::connection("ECONNRESET", "socket hang up"));
                }
                Ok(Response::for_request(&spec, 200, json!({ "call": n })))
            }
        })
    };

    let config = ClientConfig::from_json_str(
        r#"{
            "retry": { "maxAttempts": 3, "baseDelayMs": 50, "maxDelayMs": 500 },
            "circuitBreaker": { "failureThreshold": 3, "volumeThreshold": 3, "resetTimeoutMs": 1000 }
        }"#,
    )
    .expect("example config is valid");

    let callbacks = Callbacks {
        on_open: Some(Arc::new(|t: &Transition<'_>| println!("🔴 Circuit '{}' opened!", t.circuit))),
        on_close: Some(Arc::new(|t: &Transition<'_>| println!("🟢 Circuit '{}' closed!", t.circuit))),
        on_half_open: Some(Arc::new(|t: &Transition<'_>| {
            println!("🟡 Circuit '{}' half-open, testing...", t.circuit)
        })),
    };

    let client = ResilientClient::builder(transport)
        .name("payments")
        .config(config)
        .callbacks(callbacks)
        .build()
        .expect("client builds");

    println!("--- Flaky endpoint, retries hide transient failures ---");
    for i in 1..=4 {
        match client.get(format!("/flaky/{i}")).await {
            Ok(response) => println!("✓ {} -> {}", i, response.body),
            Err(e) => println!("✗ {}", e),
        }
    }

    println!("\n--- Failing endpoint, circuit opens ---");
    for _ in 1..=4 {
        match client.post("/down", json!({ "amount": 10 })).await {
            Ok(_) => println!("✓ Success"),
            Err(e) => println!("✗ [{}] {}", e.code, e.message),
        }
    }
    println!("State: {}\n", client.circuit_breaker().state());

    println!("--- Metrics snapshot ---");
    match serde_json::to_string_pretty(&client.metrics_snapshot()) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("failed to serialize snapshot: {e}"),
    }

    client.close();
    println!("\nState after close: {}", client.circuit_breaker().state());
}
