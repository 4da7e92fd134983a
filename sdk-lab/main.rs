//! PostHog core lab
//!
//! Walks a client through identify, capture, flags and delivery against an
//! in-process transport, so no PostHog project is needed.
//! Run with: RUST_LOG=posthog_core=debug cargo run --example sdk-lab

use async_trait::async_trait;
use parking_lot::Mutex;
use posthog_core::{
    FlagValue, HttpRequest, HttpResponse, MemoryStore, PostHogCore, PostHogOptions, Result,
    Transport,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const PASS: &str = "\x1b[32m[PASS]\x1b[0m";
const FAIL: &str = "\x1b[31m[FAIL]\x1b[0m";

/// Serves a fixed flag set and accepts any batch up to `max_batch` events.
struct LabTransport {
    max_batch: usize,
    delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for LabTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        if request.url.contains("/config") {
            return Ok(HttpResponse::new(200, json!({"hasFeatureFlags": true}).to_string()));
        }
        if request.url.contains("/flags/") {
            let body = json!({
                "flags": {
                    "lab-bool": {"key": "lab-bool", "enabled": true},
                    "lab-variant": {
                        "key": "lab-variant",
                        "enabled": true,
                        "variant": "blue",
                        "metadata": {"id": 1, "version": 2, "payload": "{\"color\":\"#00f\"}"}
                    }
                },
                "requestId": "lab-request"
            });
            return Ok(HttpResponse::new(200, body.to_string()));
        }

        let batch = request
            .json_body()
            .and_then(|b| b["batch"].as_array().cloned())
            .unwrap_or_default();
        if batch.len() > self.max_batch {
            return Ok(HttpResponse::new(413, "payload too large"));
        }
        let mut delivered = self.delivered.lock();
        for event in batch {
            delivered.push(event["event"].as_str().unwrap_or_default().to_string());
        }
        Ok(HttpResponse::new(200, "{\"status\":1}"))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== PostHog Core Lab ===\n");

    let mut passed = 0;
    let mut failed = 0;

    macro_rules! pass {
        ($test:expr) => {{
            println!("{} {}", PASS, $test);
            passed += 1;
        }};
    }

    macro_rules! fail {
        ($test:expr) => {{
            println!("{} {}", FAIL, $test);
            failed += 1;
        }};
    }

    let transport = Arc::new(LabTransport {
        max_batch: 2,
        delivered: Mutex::new(Vec::new()),
    });
    let options = PostHogOptions::builder("phc_lab_key")
        .host("https://lab.posthog.local")
        .flush_at(100)
        .build();

    println!("Testing initialization...");
    let client = match PostHogCore::with_backends(
        options,
        Arc::new(MemoryStore::new()),
        transport.clone(),
    ) {
        Ok(c) => c,
        Err(e) => {
            fail!(format!("Initialization - {}", e));
            print_summary(passed, failed);
            std::process::exit(1);
        }
    };

    let remote_config_calls = Arc::new(Mutex::new(0));
    let counter = remote_config_calls.clone();
    client.on_remote_config(move |_| *counter.lock() += 1);
    client.initialize().await;

    if *remote_config_calls.lock() == 1 {
        pass!("Remote config callback fired once");
    } else {
        fail!(format!(
            "Remote config callback - fired {} times",
            remote_config_calls.lock()
        ));
    }

    println!("\nTesting feature flags...");
    if client.is_feature_enabled("lab-bool") == Some(true) {
        pass!("is_feature_enabled()");
    } else {
        fail!("is_feature_enabled() - expected Some(true)");
    }

    match client.get_feature_flag("lab-variant") {
        Some(FlagValue::Variant(v)) if v == "blue" => pass!("get_feature_flag()"),
        other => fail!(format!("get_feature_flag() - got {:?}", other)),
    }

    match client.get_feature_flag_payload("lab-variant") {
        Some(payload) if payload["color"] == "#00f" => pass!("get_feature_flag_payload()"),
        other => fail!(format!("get_feature_flag_payload() - got {:?}", other)),
    }

    if client.get_feature_flag("missing").is_none() {
        pass!("Missing flag is None");
    } else {
        fail!("Missing flag - expected None");
    }

    println!("\nTesting identity...");
    let anonymous_id = client.get_anonymous_id();
    match client.identify("lab-user-123", None) {
        Ok(()) if client.get_distinct_id() == "lab-user-123" => pass!("identify()"),
        Ok(()) => fail!("identify() - distinct id not updated"),
        Err(e) => fail!(format!("identify() - {}", e)),
    }

    client.reset(&[]);
    if client.get_distinct_id() != "lab-user-123" && client.get_anonymous_id() != anonymous_id {
        pass!("reset()");
    } else {
        fail!("reset() - identity not cleared");
    }

    println!("\nTesting delivery...");
    for i in 0..5 {
        if let Err(e) = client.capture("lab_verification", Some(props(i))) {
            fail!(format!("capture() - {}", e));
        }
    }
    let queued = client.queued_events().len();

    match client.flush().await {
        Ok(()) if transport.delivered.lock().len() == queued => pass!("flush()"),
        Ok(()) => fail!(format!(
            "flush() - delivered {} of {}",
            transport.delivered.lock().len(),
            queued
        )),
        Err(e) => fail!(format!("flush() - {}", e)),
    }

    if client.max_batch_size() <= 2 {
        pass!(format!("Batch size reduced to {}", client.max_batch_size()));
    } else {
        fail!("Batch size - not reduced after 413");
    }

    println!("\nTesting shutdown...");
    match client.shutdown(Duration::from_secs(2)).await {
        Ok(()) if client.capture("late", None).is_err() => pass!("shutdown()"),
        Ok(()) => fail!("shutdown() - capture still accepted"),
        Err(e) => fail!(format!("shutdown() - {}", e)),
    }

    print_summary(passed, failed);

    if failed > 0 {
        println!("\n\x1b[31mSome verifications failed!\x1b[0m");
        std::process::exit(1);
    } else {
        println!("\n\x1b[32mAll verifications passed!\x1b[0m");
        std::process::exit(0);
    }
}

fn props(step: usize) -> posthog_core::Properties {
    let mut props = posthog_core::Properties::new();
    props.insert("step".to_string(), json!(step));
    props
}

fn print_summary(passed: i32, failed: i32) {
    println!("\n{}", "=".repeat(40));
    println!("Results: {} passed, {} failed", passed, failed);
    println!("{}", "=".repeat(40));
}
