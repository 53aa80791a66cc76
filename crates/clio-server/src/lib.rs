//! # Clio Server
//!
//! HTTP server for a catalog of reports.
//!
//! - [`ResourceCompiler`] turns configured report entries into a [`RouteTable`]
//! - [`Dispatcher`] negotiates, binds and renders one report request
//! - [`BackupTarget`] mirrors every generated document to disk
//! - [`UpstreamRenderer`] forwards render jobs to an HTTP rendering service
//! - [`Server`] serves the table over HTTP/1.1 via Hyper, with basic auth,
//!   CORS, an OpenAPI document, Prometheus metrics and graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use clio_config::ConfigLoader;
//! use clio_server::{ResourceCompiler, Server, UpstreamRenderer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_file("clio.yml")?.load()?;
//!     let routes = ResourceCompiler::from_config(&config).compile(&config.reports)?;
//!     let renderer = Arc::new(UpstreamRenderer::new(&config.renderer)?);
//!
//!     Server::from_config(&config, routes, renderer, None)?.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/clio-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod backup;
pub mod catalog;
pub mod cors;
pub mod dispatch;
mod error;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod upstream;

pub use auth::BasicAuth;
pub use backup::BackupTarget;
pub use catalog::ResourceCompiler;
pub use dispatch::{Dispatcher, RenderedReport, ReportRequest};
pub use error::{CompileError, CompileResult, ServerError, ServerResult};
pub use openapi::OpenApiDocument;
pub use routes::{RouteKind, RouteLookup, RouteTable, RouteTarget};
pub use server::{Server, ServerBuilder, MAX_FORM_BODY_SIZE, REQUEST_ID_HEADER};
pub use shutdown::{ConnectionTracker, ShutdownSignal};
pub use upstream::UpstreamRenderer;
