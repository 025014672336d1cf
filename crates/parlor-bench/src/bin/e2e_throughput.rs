//! End-to-end throughput benchmark for Parlor.
//!
//! Measures fan-out throughput over real WebSocket connections to a running
//! server. The server must sign cookies with the same `chat` secret:
//!
//! ```bash
//! PARLOR_SESSION__SECRETS_PATH=secrets.json cargo run --release -p parlor-server
//! cargo run --release -p parlor-bench --bin e2e_throughput -- 16 secrets.json
//! ```

use futures_util::{SinkExt, StreamExt};
use parlor_core::Profile;
use parlor_server::{session, Secrets};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::COOKIE, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const SERVER_URL: &str = "ws://127.0.0.1:8080/room";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args: Vec<String> = std::env::args().collect();
    let num_clients = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);
    let secrets_path = args.get(2).map_or("secrets.json", String::as_str);

    let secrets = Secrets::load(secrets_path).map_err(|e| format!("{e:#}"))?;
    let key = session::signing_key(Some(&secrets)).map_err(|e| format!("{e:#}"))?;

    println!("Parlor end-to-end throughput benchmark");
    println!("  Server:  {}", SERVER_URL);
    println!("  Clients: {}", num_clients);
    println!("  Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let message_count = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(num_clients + 1));

    let mut handles = Vec::new();

    for client_id in 0..num_clients {
        let profile = Profile::new().with("name", format!("bench-{client_id}"));
        let cookie = session::cookie_header(&key, "auth", &profile)?;
        let msg_count = Arc::clone(&message_count);
        let barrier = Arc::clone(&barrier);

        handles.push(tokio::spawn(async move {
            if let Err(e) = run_client(cookie, msg_count, barrier).await {
                eprintln!("Client {} error: {}", client_id, e);
            }
        }));
    }

    // Wait for all clients to connect
    barrier.wait().await;
    println!("All {} clients connected", num_clients);

    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    message_count.store(0, Ordering::SeqCst);
    let start = Instant::now();
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total_messages = message_count.load(Ordering::SeqCst);
    let msgs_per_sec = total_messages as f64 / elapsed.as_secs_f64();

    println!();
    println!("  Duration:        {:>10.2}s", elapsed.as_secs_f64());
    println!("  Delivered:       {:>10}", total_messages);
    println!("  Throughput:      {:>10.0} msg/s", msgs_per_sec);
    println!(
        "  Per client:      {:>10.0} msg/s",
        msgs_per_sec / num_clients as f64
    );

    for handle in handles {
        handle.abort();
    }
    Ok(())
}

async fn run_client(
    cookie: String,
    message_count: Arc<AtomicU64>,
    barrier: Arc<Barrier>,
) -> Result<(), BoxError> {
    let mut request = SERVER_URL.into_client_request()?;
    request
        .headers_mut()
        .insert(COOKIE, HeaderValue::from_str(&cookie)?);
    let (ws, _) = connect_async(request).await?;
    let (mut sender, mut receiver) = ws.split();

    // Wait for all clients to be ready
    barrier.wait().await;

    let frame = serde_json::json!({ "message": "x".repeat(64) }).to_string();
    let outgoing = Message::Text(frame);

    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            if let Ok(Message::Text(_)) = result {
                message_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    loop {
        if sender.send(outgoing.clone()).await.is_err() {
            break;
        }
        // Small yield to not starve the receiver task
        tokio::task::yield_now().await;
    }

    recv_task.abort();
    Ok(())
}
