//! HTTP serving.
//!
//! A hyper HTTP/1.1 accept loop in front of an [`App`]. Request bodies are
//! collected up to a size limit before dispatch. On shutdown the listener
//! stops accepting, open connections are asked to finish their in-flight
//! request, and the server waits up to the shutdown timeout for them.
//!
//! # Example
//!
//! ```rust,ignore
//! use covenant_server::{App, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = App::new();
//!     Server::new(app).http_addr("0.0.0.0:8080").run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::{Request, StatusCode};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::json;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

use covenant_config::{ServerSettings, ValidationSettings};
use covenant_core::{Response, ResponseExt};

use crate::app::App;

/// Errors from starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address does not parse.
    #[error("invalid address '{addr}': {source}")]
    InvalidAddress {
        /// Configured address
        addr: String,
        /// Parse error
        #[source]
        source: std::net::AddrParseError,
    },

    /// The listener could not bind.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// Address that failed
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for an [`App`].
#[derive(Debug)]
pub struct Server {
    app: Arc<App>,
    http_addr: String,
    shutdown_timeout: Duration,
    max_body_bytes: usize,
}

impl Server {
    /// A server with default settings.
    #[must_use]
    pub fn new(app: App) -> Self {
        let server = ServerSettings::default();
        let validation = ValidationSettings::default();
        Self {
            app: Arc::new(app),
            http_addr: server.http_addr,
            shutdown_timeout: Duration::from_secs(server.shutdown_timeout_secs),
            max_body_bytes: validation.max_body_bytes,
        }
    }

    /// A server configured from the `server` and `validation` sections.
    #[must_use]
    pub fn from_settings(app: App, server: &ServerSettings, validation: &ValidationSettings) -> Self {
        Self::new(app)
            .http_addr(server.http_addr.clone())
            .shutdown_timeout(Duration::from_secs(server.shutdown_timeout_secs))
            .max_body_bytes(validation.max_body_bytes)
    }

    /// Sets the bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = addr.into();
        self
    }

    /// Sets how long shutdown waits for open connections.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the request body limit.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// The app being served.
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Fails when the address is invalid or cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl-C, shutting down");
        })
        .await
    }

    /// Serves until `signal` completes.
    ///
    /// # Errors
    ///
    /// Fails when the address is invalid or cannot be bound.
    pub async fn run_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let addr: SocketAddr = self
            .http_addr
            .parse()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.http_addr.clone(),
                source,
            })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, signal).await
    }

    /// Serves connections from an already bound listener until `signal`
    /// completes.
    ///
    /// # Errors
    ///
    /// Fails when the listener's local address cannot be read.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, routes = self.app.routes().len(), "Server listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let app = Arc::clone(&self.app);
                        let limit = self.max_body_bytes;
                        let shutdown = shutdown_rx.clone();
                        connections.spawn(serve_connection(app, stream, remote, limit, shutdown));
                    }
                    Err(err) => tracing::error!(error = %err, "Failed to accept connection"),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_exit(finished);
                }
                () = &mut signal => {
                    tracing::info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        drop(listener);
        let _ = shutdown_tx.send(true);

        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "Shutdown timeout reached, aborting open connections"
            );
            connections.abort_all();
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}

fn log_connection_exit(result: Result<(), JoinError>) {
    if let Err(err) = result {
        if err.is_panic() {
            tracing::error!(error = %err, "Connection task panicked");
        }
    }
}

async fn serve_connection(
    app: Arc<App>,
    stream: TcpStream,
    remote: SocketAddr,
    max_body_bytes: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let service = service_fn(move |request: Request<Incoming>| {
        let app = Arc::clone(&app);
        async move { Ok::<_, Infallible>(handle(&app, request, max_body_bytes).await) }
    });

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = shutdown.changed() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };

    if let Err(err) = result {
        tracing::debug!(remote = %remote, error = %err, "Connection closed with error");
    }
}

async fn handle(app: &App, request: Request<Incoming>, max_body_bytes: usize) -> Response {
    let (parts, body) = request.into_parts();
    match Limited::new(body, max_body_bytes).collect().await {
        Ok(collected) => app.handle_parts(parts, collected.to_bytes()).await,
        Err(err) => body_error(err.as_ref()),
    }
}

fn body_error(err: &(dyn std::error::Error + Send + Sync + 'static)) -> Response {
    if err.is::<http_body_util::LengthLimitError>() {
        tracing::warn!("Request body exceeds limit");
        return Response::json(
            StatusCode::PAYLOAD_TOO_LARGE,
            &json!({ "message": "Payload Too Large" }),
        );
    }
    tracing::warn!(error = %err, "Failed to read request body");
    Response::json(
        StatusCode::BAD_REQUEST,
        &json!({ "message": "Failed to read request body" }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::{Contract, HandlerResponse, Handlers, Input, Operation, RequestContext};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::config::EndpointConfig;

    fn echo_app() -> App {
        let contract = Contract::builder()
            .operation("echo", Operation::post("/echo").build())
            .build()
            .unwrap();
        let handlers = Handlers::new().handler_sync("echo", |input: Input, _ctx: RequestContext| {
            Ok(HandlerResponse::ok(input.body))
        });
        let mut app = App::new();
        app.mount(&contract, handlers, EndpointConfig::new()).unwrap();
        app
    }

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn test_server_defaults() {
        let server = Server::new(App::new());
        assert_eq!(server.http_addr, "0.0.0.0:8080");
        assert_eq!(server.shutdown_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let err = Server::new(App::new())
            .http_addr("not an address")
            .run_with_shutdown(async {})
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn test_serves_and_shuts_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = Server::new(echo_app()).max_body_bytes(16);
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        let ok = roundtrip(
            addr,
            "POST /echo HTTP/1.1\r\nhost: test\r\ncontent-type: application/json\r\ncontent-length: 7\r\nconnection: close\r\n\r\n{\"a\":1}",
        )
        .await;
        assert!(ok.starts_with("HTTP/1.1 200"));
        assert!(ok.ends_with("{\"a\":1}"));

        let too_large = roundtrip(
            addr,
            "POST /echo HTTP/1.1\r\nhost: test\r\ncontent-length: 32\r\nconnection: close\r\n\r\n01234567890123456789012345678901",
        )
        .await;
        assert!(too_large.starts_with("HTTP/1.1 413"));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_many_sequential_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = Server::new(echo_app()).shutdown_timeout(Duration::from_millis(50));
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        for i in 0..32 {
            let body = format!("{{\"n\":{i}}}");
            let raw = format!(
                "POST /echo HTTP/1.1\r\nhost: test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let response = roundtrip(addr, &raw).await;
            assert!(response.starts_with("HTTP/1.1 200"));
            assert!(response.ends_with(&body));
        }

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_finished_connection_tasks_are_reaped() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async {});
        tasks.spawn(async { panic!("connection task failed") });

        let mut reaped = 0;
        while let Some(finished) = tasks.join_next().await {
            log_connection_exit(finished);
            reaped += 1;
        }
        assert_eq!(reaped, 2);
        assert!(tasks.is_empty());
    }

    // ==================== Body Error Tests ====================

    #[tokio::test]
    async fn test_body_error_over_limit_is_413() {
        let body = http_body_util::Full::new(bytes::Bytes::from_static(b"0123456789"));
        let err = Limited::new(body, 4).collect().await.unwrap_err();
        let response = body_error(err.as_ref());
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_body_error_other_is_400() {
        let err: Box<dyn std::error::Error + Send + Sync> =
            Box::new(std::io::Error::other("reset"));
        let response = body_error(err.as_ref());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
