//! Pet store example: scoped events on nested namespaces
//!
//! Run with: cargo run --example petstore [BIND_ADDR]
//!
//! Subscribing to a parent namespace receives the events of its children:
//!
//!   curl -N http://localhost:8222/subscribe/pets/cats   # cats only
//!   curl -N http://localhost:8222/subscribe/pets/dogs   # dogs only
//!   curl -N http://localhost:8222/subscribe/pets        # both
//!
//! Server status is available at http://localhost:8222/admin/status.json

use std::net::SocketAddr;
use std::time::Duration;

use sse_hub::{Message, Server, ServerConfig};

const DOG_BREEDS: &[&str] = &["Corgi", "Terrier", "Dachshund"];
const CAT_BREEDS: &[&str] = &["Persian", "Maine Coon", "LOLcat"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:8222".to_string())
        .parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sse_hub=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr).cors_allow_origin("*");
    let server = Server::new(config)?;

    let publisher = server.publisher();
    tokio::spawn(async move {
        let mut n: usize = 0;
        loop {
            let msg = if n % 2 == 0 {
                Message::new("/pets/cats", CAT_BREEDS[n / 2 % CAT_BREEDS.len()]).with_event("new-cat")
            } else {
                Message::new("/pets/dogs", DOG_BREEDS[n / 2 % DOG_BREEDS.len()]).with_event("new-dog")
            };
            publisher.publish(msg);

            n += 1;
            tokio::time::sleep(Duration::from_secs(1 + (n % 5) as u64)).await;
        }
    });

    println!("Pet store on http://{}", bind_addr);

    server
        .serve_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
