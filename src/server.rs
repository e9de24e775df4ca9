// src/server.rs
use crate::api::App;
use crate::shutdown::Interrupt;
use anyhow::Result;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

/// Accept HTTP/1.1 connections until `interrupt` fires.
///
/// Each connection gets its own task; requests on it are routed through `app`.
/// After the interrupt, open connections get up to `grace` to answer the
/// request they are serving before they are aborted.
pub async fn serve(
    listener: TcpListener,
    app: Arc<App>,
    interrupt: Interrupt,
    grace: Duration,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!(target = "server", %local, "listening");

    let mut connections = JoinSet::new();
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(target = "server", error = %e, "accept failed");
                    continue;
                }
            },
            // reap finished connections so the set does not grow
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            _ = interrupt.fired() => break,
        };
        trace!(target = "server", %peer, "connection accepted");
        connections.spawn(serve_connection(
            stream,
            peer,
            Arc::clone(&app),
            interrupt.clone(),
        ));
    }
    drop(listener);

    info!(
        target = "server",
        %local,
        open = connections.len(),
        "stopped accepting connections"
    );
    let drained = tokio::time::timeout(grace, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            target = "server",
            remaining = connections.len(),
            grace_ms = grace.as_millis() as u64,
            "grace period elapsed, aborting connections"
        );
        connections.shutdown().await;
    }
    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Arc<App>,
    interrupt: Interrupt,
) {
    let svc = service_fn(move |req| {
        let app = Arc::clone(&app);
        async move { handle_request(&app, req).await }
    });
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        _ = interrupt.fired() => {
            // answer the request in flight, then close instead of keeping alive
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(e) = res {
        debug!(target = "server", %peer, error = %e, "connection closed with error");
    }
}

async fn handle_request(
    app: &App,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, _body) = req.into_parts();
    let (status, body) = app
        .handle(&parts.method, parts.uri.path(), parts.uri.query())
        .await;
    trace!(target = "server", method = %parts.method, path = parts.uri.path(), %status, "request");
    Ok(json_response(status, &body))
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body.to_string())));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}
