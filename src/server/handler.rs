//! HTTP handlers
//!
//! Binds subscription requests to the hub. Each request gets a
//! [`Connection`] whose delivery loop writes into an in-memory pipe; the
//! read end of the pipe is the response body.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use percent_encoding::percent_decode_str;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::connection::{ClientInfo, Connection};

use super::Server;

const EVENT_STREAM: &str = "text/event-stream; charset=utf-8";

/// `GET <mount>/<namespace>`: stream messages for a namespace
pub(crate) async fn subscribe(State(server): State<Server>, request: Request) -> Response {
    let config = server.config();
    let path = request.uri().path().to_owned();
    let namespace = decode_namespace(namespace_from_path(&path, &config.mount_path));

    if server.hub().is_shut_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
    }

    let permit = match server.try_acquire_slot() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(namespace = %namespace, "Subscription rejected: limit reached");
            return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
        }
    };

    let client = client_info(&request, path);
    tracing::info!(
        namespace = %namespace,
        remote = %client.remote_addr,
        "CONNECT"
    );

    let (conn, outbound) = Connection::new(namespace, client, config.queue_capacity);
    server.hub().register(conn.clone());

    let (writer, reader) = tokio::io::duplex(config.write_buffer_size);

    // Dropping the body (client gone) cancels the delivery loop
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let keepalive = config.keepalive_interval;
    let task_server = server.clone();
    tokio::spawn(async move {
        let reason = conn.run(outbound, writer, keepalive, cancel).await;
        task_server.hub().unregister(&conn);
        drop(permit);

        tracing::info!(
            namespace = %conn.namespace(),
            remote = %conn.client().remote_addr,
            reason = ?reason,
            msgs_sent = conn.msgs_sent(),
            "DISCONNECT"
        );
    });

    let stream = ReaderStream::new(reader).map(move |chunk| {
        let _guard = &guard;
        chunk
    });

    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    if let Some(ref origin) = config.cors_allow_origin {
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }

    response
}

/// `GET /admin/status.json`
pub(crate) async fn admin_status(State(server): State<Server>) -> Response {
    if !server.config().admin_enabled {
        return (StatusCode::FORBIDDEN, "403 admin endpoint disabled").into_response();
    }
    Json(server.status().await).into_response()
}

/// Strip the mount prefix, leaving the namespace with its leading slash
pub(crate) fn namespace_from_path<'a>(path: &'a str, mount: &str) -> &'a str {
    path.strip_prefix(mount).unwrap_or(path)
}

/// Percent-decode a raw namespace path; invalid UTF-8 is replaced
pub(crate) fn decode_namespace(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Client details, trusting proxy headers over the socket address
fn client_info(request: &Request, request_path: String) -> ClientInfo {
    let headers = request.headers();
    let remote_addr = forwarded_ip(headers)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.to_string())
        })
        .unwrap_or_default();
    let user_agent = header_str(headers, header::USER_AGENT.as_str()).unwrap_or_default();

    ClientInfo::new(request_path, remote_addr, user_agent)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-real-ip").or_else(|| header_str(headers, "x-forwarded-for"))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
