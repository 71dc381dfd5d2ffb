//! SSE server
//!
//! [`Server`] ties a [`Hub`] to HTTP: it publishes messages into the hub
//! and turns each subscription request into a registered connection whose
//! response body is the event stream.
//!
//! # Routes
//!
//! - `GET <mount>` and `GET <mount>/<namespace...>`: subscribe. The part of
//!   the path after the mount (default `/subscribe`) is the namespace.
//! - `GET /admin/status.json`: [`ReportingStatus`] as JSON, `403` when the
//!   admin endpoint is disabled.

pub mod config;
mod handler;
mod listener;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::Result;
use crate::hub::{Hub, Publisher};
use crate::message::Message;
use crate::stats::ReportingStatus;

pub use config::ServerConfig;

/// Namespaced SSE broadcast server
///
/// Cheap to clone; clones share one hub.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServerConfig,
    hub: Hub,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Server {
    /// Create a server and start its hub
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                hub: Hub::new(),
                connection_semaphore,
            }),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// The underlying hub
    pub fn hub(&self) -> &Hub {
        &self.inner.hub
    }

    /// Publish a message to every subscriber at or above its namespace
    pub fn broadcast(&self, msg: Message) {
        self.inner.hub.broadcast(msg);
    }

    /// A cloneable publishing handle
    pub fn publisher(&self) -> Publisher {
        self.inner.hub.publisher()
    }

    /// Current status for reporting
    pub async fn status(&self) -> ReportingStatus {
        match self.inner.hub.status().await {
            Ok(status) => ReportingStatus::from_hub(status),
            Err(_) => ReportingStatus::shut_down(self.inner.hub.started_at()),
        }
    }

    /// Close all subscriptions and stop the hub. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.hub.shutdown().await;
    }

    /// Axum router serving subscriptions and the admin endpoint
    pub fn router(&self) -> Router {
        let mount = self.inner.config.mount_path.as_str();

        let mut router = Router::new();
        for path in subscribe_paths(mount) {
            router = router.route(&path, get(handler::subscribe));
        }

        router
            .route("/admin/status.json", get(handler::admin_status))
            .with_state(self.clone())
    }

    /// Reserve a subscriber slot when a connection limit is configured
    fn try_acquire_slot(
        &self,
    ) -> std::result::Result<Option<OwnedSemaphorePermit>, TryAcquireError> {
        match self.inner.connection_semaphore {
            Some(ref sem) => Arc::clone(sem).try_acquire_owned().map(Some),
            None => Ok(None),
        }
    }
}

fn subscribe_paths(mount: &str) -> Vec<String> {
    if mount.is_empty() {
        vec!["/".to_string(), "/*namespace".to_string()]
    } else {
        vec![
            mount.to_string(),
            format!("{}/", mount),
            format!("{}/*namespace", mount),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use futures_util::StreamExt;
    use tower::ServiceExt;

    use super::*;

    fn server(config: ServerConfig) -> Server {
        Server::new(config).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// Read from a body stream until `len` bytes have arrived
    async fn read_bytes(body: Body, len: usize) -> Vec<u8> {
        let mut stream = body.into_data_stream();
        let mut out = Vec::new();
        while out.len() < len {
            match stream.next().await {
                Some(Ok(chunk)) => out.extend_from_slice(&chunk),
                _ => break,
            }
        }
        out
    }

    async fn wait_for_subscribers(server: &Server, expected: usize) {
        for _ in 0..200 {
            if server.status().await.connections.len() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} subscribers", expected);
    }

    #[test]
    fn test_subscribe_paths() {
        assert_eq!(
            subscribe_paths("/subscribe"),
            vec!["/subscribe", "/subscribe/", "/subscribe/*namespace"]
        );
        assert_eq!(subscribe_paths(""), vec!["/", "/*namespace"]);
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let result = Server::new(ServerConfig::default().queue_capacity(0));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subscribe_headers() {
        let server = server(ServerConfig::default());
        let response = server
            .router()
            .oneshot(get_request("/subscribe/pets"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream; charset=utf-8");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_subscribe_cors_header() {
        let server = server(ServerConfig::default().cors_allow_origin("*"));
        let response = server
            .router()
            .oneshot(get_request("/subscribe/pets"))
            .await
            .unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_receives_matching_messages() {
        let server = server(ServerConfig::default());
        let response = server
            .router()
            .oneshot(get_request("/subscribe/pets"))
            .await
            .unwrap();

        server.broadcast(Message::new("/kids", "wahh"));
        server.broadcast(Message::new("/pets/cats", "Persian").with_event("new-cat"));

        let expected = b"event:new-cat\ndata:Persian\n\n";
        let body = read_bytes(response.into_body(), expected.len()).await;
        assert_eq!(body, expected);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_encoded_path_is_decoded() {
        let server = server(ServerConfig::default());
        let response = server
            .router()
            .oneshot(get_request("/subscribe/caf%C3%A9"))
            .await
            .unwrap();

        server.broadcast(Message::new("/café", "hi"));

        let expected = b"data:hi\n\n";
        let body = read_bytes(response.into_body(), expected.len()).await;
        assert_eq!(body, expected);

        let status = server.status().await;
        assert_eq!(status.connections[0].namespace, "/café");
        assert_eq!(status.connections[0].path, "/subscribe/caf%C3%A9");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_status_lists_subscription() {
        let server = server(ServerConfig::default());
        let request = Request::builder()
            .uri("/subscribe/pets/dogs")
            .header(header::USER_AGENT, "test-agent")
            .header("x-real-ip", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let _response = server.router().oneshot(request).await.unwrap();

        let status = server.status().await;
        assert!(status.is_ok());
        assert_eq!(status.connections.len(), 1);

        let conn = &status.connections[0];
        assert_eq!(conn.namespace, "/pets/dogs");
        assert_eq!(conn.path, "/subscribe/pets/dogs");
        assert_eq!(conn.client_ip, "203.0.113.9");
        assert_eq!(conn.user_agent, "test-agent");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropped_response_unregisters() {
        let server = server(ServerConfig::default());
        let response = server
            .router()
            .oneshot(get_request("/subscribe/pets"))
            .await
            .unwrap();
        wait_for_subscribers(&server, 1).await;

        drop(response);
        wait_for_subscribers(&server, 0).await;

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_ends_stream() {
        let server = server(ServerConfig::default());
        let response = server
            .router()
            .oneshot(get_request("/subscribe/pets"))
            .await
            .unwrap();

        for _ in 0..3 {
            server.shutdown().await;
        }

        let mut stream = response.into_body().into_data_stream();
        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("stream should end after shutdown");
        assert!(next.is_none());

        assert!(!server.status().await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown_is_rejected() {
        let server = server(ServerConfig::default());
        server.shutdown().await;

        let response = server
            .router()
            .oneshot(get_request("/subscribe/pets"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let server = server(ServerConfig::default().max_connections(1));

        let first = server
            .router()
            .oneshot(get_request("/subscribe/a"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = server
            .router()
            .oneshot(get_request("/subscribe/b"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_root_subscription_gets_everything() {
        let server = server(ServerConfig::default());
        let response = server
            .router()
            .oneshot(get_request("/subscribe"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        server.broadcast(Message::new("/deeply/nested/topic", "hi"));

        let expected = b"data:hi\n\n";
        let body = read_bytes(response.into_body(), expected.len()).await;
        assert_eq!(body, expected);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_admin_status_json() {
        let server = server(ServerConfig::default());
        server.broadcast(Message::new("/a", "x"));

        let response = server
            .router()
            .oneshot(get_request("/admin/status.json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["msgs_broadcast"], 1);
        assert!(json["connections"].as_array().unwrap().is_empty());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_admin_disabled() {
        let server = server(ServerConfig::default().disable_admin());
        let response = server
            .router()
            .oneshot(get_request("/admin/status.json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let server = server(ServerConfig::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .serve_listener(listener, async {
                        let _ = rx.await;
                    })
                    .await
            })
        };

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(server.hub().is_shut_down());
    }
}
