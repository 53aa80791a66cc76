//! HTTP server.
//!
//! Built on Hyper and Tokio. Every request goes through [`Server::handle`]:
//!
//! 1. `OPTIONS` is answered with `204` and CORS headers
//! 2. basic authentication, when users are configured
//! 3. built-in endpoints (`reports.json`, `/openapi`, `/metrics`)
//! 4. route lookup, then either the info document or report generation
//!
//! Errors become the JSON envelope `{"message": ..., "error": true}`. Every
//! response carries CORS headers and an `x-request-id`.
//!
//! # Example
//!
//! ```rust,ignore
//! use clio_server::{ResourceCompiler, Server, UpstreamRenderer};
//!
//! let routes = ResourceCompiler::from_config(&config).compile(&config.reports)?;
//! let renderer = Arc::new(UpstreamRenderer::new(&config.renderer)?);
//! Server::from_config(&config, routes, renderer, None)?.run().await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use clio_config::ClioConfig;
use clio_core::{
    strip_file_paths, DataSource, PublicDefinition, PublicResource, QueryParams, Renderer,
    ReportResource, RequestError, RequestId,
};
use clio_telemetry::metrics::{record_http_request, InFlightGuard};
use clio_telemetry::PrometheusHandle;
use http::header::{HeaderName, HeaderValue, ACCEPT, ALLOW, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use crate::auth::{BasicAuth, CHALLENGE};
use crate::backup::BackupTarget;
use crate::cors;
use crate::dispatch::{Dispatcher, ReportRequest};
use crate::error::{ServerError, ServerResult};
use crate::openapi::OpenApiDocument;
use crate::routes::{
    normalize_request_path, RouteKind, RouteLookup, RouteTable, METRICS_PATH, OPENAPI_PATH,
};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Type alias for HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// Largest accepted form body (1 MiB).
pub const MAX_FORM_BODY_SIZE: usize = 1024 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response header carrying the request ID.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// The Clio HTTP server.
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
    routes: RouteTable,
    dispatcher: Dispatcher,
    auth: Option<BasicAuth>,
    openapi: OpenApiDocument,
    metrics: Option<PrometheusHandle>,
    request_timeout: Option<Duration>,
    shutdown_timeout: Duration,
}

impl Server {
    /// Creates a builder over a compiled route table and a renderer.
    pub fn builder(routes: RouteTable, renderer: Arc<dyn Renderer>) -> ServerBuilder {
        ServerBuilder::new(routes, renderer)
    }

    /// Creates a server from configuration. `/metrics` is served only when a
    /// handle is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is invalid or the OpenAPI
    /// document cannot be built.
    pub fn from_config(
        config: &ClioConfig,
        routes: RouteTable,
        renderer: Arc<dyn Renderer>,
        metrics: Option<PrometheusHandle>,
    ) -> ServerResult<Self> {
        let addr = config.socket_addr()?;

        Self::builder(routes, renderer)
            .addr(addr)
            .auth(BasicAuth::from_config(config.basic_auth.as_ref()))
            .backup(
                config
                    .backup
                    .as_ref()
                    .map(|b| BackupTarget::from_config(b, &config.base_dir)),
            )
            .data_source(config.database.as_ref().map(DataSource::from))
            .request_timeout(config.request_timeout())
            .shutdown_timeout(config.shutdown_timeout())
            .metrics(metrics)
            .build()
    }

    /// Returns the configured address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Runs the server until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn run(self) -> ServerResult<()> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr,
                source,
            })?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// fires, then drains open connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener address cannot be read.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> ServerResult<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            routes = self.routes.len(),
            auth = self.auth.is_some(),
            backup = ?self.dispatcher.backup().map(BackupTarget::directory),
            "Server listening"
        );

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(err) = server.handle_connection(stream, shutdown).await {
                                tracing::debug!(%remote_addr, error = %err, "Connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(err) => tracing::error!(error = %err, "Failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let drain = server.shutdown_timeout;
        tracing::info!(
            timeout_secs = drain.as_secs(),
            connections = tracker.active_connections(),
            "Draining connections"
        );
        tokio::select! {
            () = tracker.wait_idle() => tracing::info!("All connections closed"),
            () = tokio::time::sleep(drain) => tracing::warn!(
                connections = tracker.active_connections(),
                "Shutdown timeout reached with connections still open"
            ),
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&self);
            async move { Ok::<_, Infallible>(server.handle(req).await) }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    /// Handles one request end to end.
    pub async fn handle<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let started = Instant::now();
        let request_id = RequestId::new();
        let method = req.method().clone();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %req.uri().path(),
        );
        let _in_flight = InFlightGuard::new();

        let routed = self.route(req).instrument(span.clone());
        let mut response = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, routed).await {
                Ok(response) => response,
                Err(_) => span.in_scope(|| error_response(&RequestError::Timeout)),
            },
            None => routed.await,
        };

        cors::apply(response.headers_mut());
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let elapsed = started.elapsed();
        record_http_request(method.as_str(), response.status().as_u16(), elapsed);
        span.in_scope(|| {
            tracing::info!(
                status = response.status().as_u16(),
                duration_ms = elapsed.as_millis() as u64,
                "Request completed"
            );
        });
        response
    }

    async fn route<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        if req.method() == Method::OPTIONS {
            return empty(StatusCode::NO_CONTENT);
        }

        if let Some(auth) = &self.auth {
            if !auth.authorize(req.headers()) {
                return error_response(&RequestError::Unauthorized);
            }
        }

        let path = normalize_request_path(req.uri().path()).to_string();
        if let Some(response) = self.builtin(req.method(), &path) {
            return response;
        }

        match self.routes.lookup(req.method(), &path) {
            RouteLookup::Found(target) => match target.kind() {
                RouteKind::Info => {
                    json_response(StatusCode::OK, &PublicDefinition::from(target.resource().definition()))
                }
                RouteKind::Report { .. } => {
                    match self.generate(target.resource(), &path, req).await {
                        Ok(response) => response,
                        Err(err) => error_response(&err),
                    }
                }
            },
            RouteLookup::MethodNotAllowed(allowed) => error_response(&RequestError::MethodNotAllowed {
                method: req.method().to_string(),
                path,
                allowed,
            }),
            RouteLookup::NotFound => error_response(&RequestError::not_found(path)),
        }
    }

    /// Serves the catalog listing, OpenAPI document and metrics.
    fn builtin(&self, method: &Method, path: &str) -> Option<HttpResponse> {
        let response = if path == self.routes.listing_path() {
            let listing: Vec<PublicResource> =
                self.routes.resources().map(strip_file_paths).collect();
            json_response(StatusCode::OK, &listing)
        } else if path == OPENAPI_PATH {
            body(StatusCode::OK, JSON, self.openapi.bytes())
        } else if path == METRICS_PATH {
            match &self.metrics {
                Some(handle) => body(StatusCode::OK, PROMETHEUS_TEXT, Bytes::from(handle.render())),
                None => error_response(&RequestError::not_found(path)),
            }
        } else {
            return None;
        };

        if method == Method::GET {
            Some(response)
        } else {
            Some(error_response(&RequestError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
                allowed: vec![Method::GET.to_string()],
            }))
        }
    }

    async fn generate<B>(
        &self,
        resource: &ReportResource,
        path: &str,
        req: Request<B>,
    ) -> Result<HttpResponse, RequestError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let accept = req
            .headers()
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let mut params = QueryParams::parse(req.uri().query().unwrap_or_default())?;

        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim_start().starts_with(FORM));
        if req.method() == Method::POST && is_form {
            let body = Limited::new(req.into_body(), MAX_FORM_BODY_SIZE)
                .collect()
                .await
                .map_err(|err| {
                    if err.is::<LengthLimitError>() {
                        RequestError::PayloadTooLarge {
                            limit: MAX_FORM_BODY_SIZE,
                        }
                    } else {
                        RequestError::BodyRead {
                            message: err.to_string(),
                        }
                    }
                })?
                .to_bytes();
            params.extend_encoded(&String::from_utf8_lossy(&body))?;
        }

        let rendered = self
            .dispatcher
            .dispatch(
                resource,
                ReportRequest {
                    accept: accept.as_deref(),
                    path,
                    params: &params,
                },
            )
            .await?;

        Ok(body(
            StatusCode::OK,
            rendered.format.content_type(),
            rendered.body,
        ))
    }
}

fn body(status: StatusCode, content_type: &'static str, bytes: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn empty(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(json) => body(status, JSON, Bytes::from(json)),
        Err(err) => error_response(&RequestError::generation(err)),
    }
}

/// Converts a request error into its JSON envelope response.
pub fn error_response(err: &RequestError) -> HttpResponse {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!(kind = err.kind(), error = %err, "Request failed");
    } else {
        tracing::warn!(kind = err.kind(), error = %err, "Request rejected");
    }

    let json = serde_json::to_vec(&err.envelope())
        .unwrap_or_else(|_| br#"{"message":"Internal error","error":true}"#.to_vec());
    let mut response = body(status, JSON, Bytes::from(json));

    match err {
        RequestError::Unauthorized => {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
        }
        RequestError::MethodNotAllowed { allowed, .. } => {
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        _ => {}
    }
    response
}

/// Builder for [`Server`].
#[derive(Debug)]
pub struct ServerBuilder {
    routes: RouteTable,
    dispatcher: Dispatcher,
    addr: SocketAddr,
    auth: Option<BasicAuth>,
    metrics: Option<PrometheusHandle>,
    request_timeout: Option<Duration>,
    shutdown_timeout: Duration,
}

impl ServerBuilder {
    /// Creates a builder with defaults: `0.0.0.0:4567`, no auth, no backups,
    /// a 120 second request timeout and a 30 second drain.
    pub fn new(routes: RouteTable, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            routes,
            dispatcher: Dispatcher::new(renderer),
            addr: SocketAddr::from(([0, 0, 0, 0], 4567)),
            auth: None,
            metrics: None,
            request_timeout: Some(Duration::from_secs(120)),
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the bind address.
    #[must_use]
    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Sets basic authentication.
    #[must_use]
    pub fn auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the backup target.
    #[must_use]
    pub fn backup(mut self, backup: Option<BackupTarget>) -> Self {
        self.dispatcher = self.dispatcher.with_backup(backup);
        self
    }

    /// Sets the data source override passed to the renderer.
    #[must_use]
    pub fn data_source(mut self, data_source: Option<DataSource>) -> Self {
        self.dispatcher = self.dispatcher.with_data_source(data_source);
        self
    }

    /// Sets the clock used for backup file names.
    #[must_use]
    pub fn clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.dispatcher = self.dispatcher.with_clock(clock);
        self
    }

    /// Serves `GET /metrics` from this handle.
    #[must_use]
    pub fn metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    /// Sets the request timeout; `None` disables it.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the drain timeout used on shutdown.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Builds the server and its OpenAPI document.
    ///
    /// # Errors
    ///
    /// Returns an error if the OpenAPI document cannot be serialized.
    pub fn build(self) -> ServerResult<Server> {
        let openapi = OpenApiDocument::from_routes(&self.routes)?;
        Ok(Server {
            addr: self.addr,
            routes: self.routes,
            dispatcher: self.dispatcher,
            auth: self.auth,
            openapi,
            metrics: self.metrics,
            request_timeout: self.request_timeout,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}
