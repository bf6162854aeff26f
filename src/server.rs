//! hyper adapter and graceful shutdown.
//!
//! The hook core never touches the network. This module is one possible
//! runtime adapter: it translates each hyper request into a [`Request`],
//! runs it through a single [`Endpoint`], and writes the normalized
//! [`Response`](crate::Response) back.
//!
//! # Graceful shutdown
//!
//! SIGTERM or Ctrl-C stops the accept loop. Open connections are then
//! awaited before [`Server::serve`] returns.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::ServerError;
use crate::pipeline::Endpoint;
use crate::request::Request;
use crate::response::Response;

/// Serves one [`Endpoint`] over HTTP/1.1 and HTTP/2.
///
/// Routing is out of scope: every request reaches the endpoint, so put a
/// [`PathParams`](crate::hooks::PathParams) hook first to reject foreign
/// paths with a 404.
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// ```rust
    /// use hookwork::Server;
    ///
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, ServerError> {
        let addr = addr.parse().map_err(|_| ServerError::InvalidAddr(addr.to_owned()))?;
        Ok(Self { addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts connections until a shutdown signal arrives, then drains.
    pub async fn serve(self, endpoint: Endpoint) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr).await?;
        run(listener, endpoint, shutdown_signal()).await
    }
}

/// Accept loop over an already bound listener. Returns once `shutdown` has
/// resolved and every open connection has finished.
async fn run(
    listener: TcpListener,
    endpoint: Endpoint,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    info!(addr = %listener.local_addr()?, "hookwork listening");

    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            biased;
            () = &mut shutdown => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                connections.spawn(connection(endpoint.clone(), stream, peer));
            }
            Err(e) => error!("accept error: {e}"),
        }

        while connections.try_join_next().is_some() {}
    }

    info!(in_flight = connections.len(), "shutdown signal received, draining connections");
    while connections.join_next().await.is_some() {}
    info!("hookwork stopped");
    Ok(())
}

/// Serves every request of one connection, HTTP/1.1 or HTTP/2.
async fn connection(endpoint: Endpoint, stream: TcpStream, peer: SocketAddr) {
    let service = service_fn(move |req| dispatch(endpoint.clone(), req, peer));
    let served = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await;
    if let Err(e) = served {
        error!(%peer, "connection error: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Translates one hyper request and runs it through the endpoint.
///
/// Never fails: an unreadable body is answered with a 400 here, everything
/// else is normalized by the endpoint.
async fn dispatch(
    endpoint: Endpoint,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let started_at = Instant::now();
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(peer = %remote_addr, "failed to read request body: {e}");
            let response = Response::builder()
                .status(400u16)
                .json(json!({ "message": "Unreadable request body" }));
            return Ok(response.into_http());
        }
    };

    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let mut builder = Request::builder()
        .method(parts.method)
        .uri(path_and_query)
        .body(body)
        .started_at(started_at)
        .ip(remote_addr.ip())
        .http_version(version_str(parts.version))
        .protocol("http");

    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            builder = builder.header(name.as_str(), value);
        }
    }
    // HTTP/2 carries the host in the URI authority instead of a header.
    if parts.headers.get(http::header::HOST).is_none() {
        if let Some(authority) = parts.uri.authority() {
            builder = builder.header("host", authority.as_str());
        }
    }

    Ok(endpoint.handle(builder.build()).await.into_http())
}

fn version_str(version: http::Version) -> &'static str {
    match version {
        http::Version::HTTP_09 => "0.9",
        http::Version::HTTP_10 => "1.0",
        http::Version::HTTP_2 => "2.0",
        http::Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. On Windows only Ctrl-C exists.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_strings() {
        assert_eq!(version_str(http::Version::HTTP_11), "1.1");
        assert_eq!(version_str(http::Version::HTTP_2), "2.0");
        assert_eq!(version_str(http::Version::HTTP_10), "1.0");
    }

    #[tokio::test]
    async fn serves_requests_until_shut_down() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        use crate::props::Props;
        use crate::{Error, compose};

        let endpoint = compose().handler(|props: Props| async move {
            Ok::<_, Error>(json!({ "path": props.request().path() }))
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(run(listener, endpoint, async {
            let _ = stopped.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200"), "{raw}");
        assert!(raw.ends_with(r#"{"path":"/ping"}"#), "{raw}");

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[test]
    fn bind_rejects_garbage() {
        assert!(matches!(Server::bind("localhost"), Err(ServerError::InvalidAddr(_))));
        assert_eq!(Server::bind("127.0.0.1:8080").unwrap().addr().port(), 8080);
    }
}
