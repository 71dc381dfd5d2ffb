//! Clock example: broadcasts the current time every second
//!
//! Run with: cargo run --example clock [BIND_ADDR]
//!
//! Then subscribe:
//!   curl -N http://localhost:8111/subscribe/time

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sse_hub::{Message, Server, ServerConfig};

/// UTC wall clock time as `HH:MM:SS`
fn utc_time(now: SystemTime) -> String {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02} UTC", day / 3600, (day % 3600) / 60, day % 60)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:8111".to_string())
        .parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sse_hub=info".parse()?),
        )
        .init();

    let server = Server::new(ServerConfig::with_addr(bind_addr))?;

    let publisher = server.publisher();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            publisher.publish(Message::new("/time", utc_time(SystemTime::now())));
        }
    });

    println!("Clock server on http://{}", bind_addr);
    println!("  curl -N http://localhost:{}/subscribe/time", bind_addr.port());

    server
        .serve_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
