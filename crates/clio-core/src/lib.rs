//! # Clio Core
//!
//! Core types for serving a catalog of reports over HTTP.
//!
//! This crate holds everything that does not need a socket:
//!
//! - [`ParameterSchema`] / [`ParameterType`] - typed description of one report input
//! - [`ReportDefinition`] - a named report with its source file and parameters
//! - [`ReportResource`] - a definition bound to a route, methods and output formats
//! - [`negotiate`] - output format resolution from `Accept` and the URL suffix
//! - [`bind`] - query parameters to a typed [`ParameterMap`]
//! - [`FanOutWriter`] - duplicates a byte stream into several [`Sink`]s
//! - [`Renderer`] - the seam to the external rendering engine
//! - [`RequestError`] - per-request failures and their JSON envelope
//!
//! # Example
//!
//! ```
//! use clio_core::{negotiate, OutputFormat};
//!
//! assert_eq!(negotiate(Some("text/html, */*"), "/sales"), Some(OutputFormat::Html));
//! assert_eq!(negotiate(None, "/sales.pdf"), Some(OutputFormat::Pdf));
//! assert_eq!(negotiate(Some("application/json"), "/sales"), None);
//! ```

#![doc(html_root_url = "https://docs.rs/clio-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod binder;
mod context;
mod definition;
mod error;
pub mod fanout;
mod format;
mod negotiate;
mod parameter;
pub mod render;
mod resource;
mod value;

pub use binder::{bind, ParameterMap, QueryParams};
pub use context::RequestId;
pub use definition::ReportDefinition;
pub use error::{
    DefinitionError, ErrorEnvelope, RequestError, RequestResult, GENERATION_FAILED_MESSAGE,
};
pub use fanout::{CloseError, FanOutWriter, SharedBuffer, Sink};
pub use format::{describe_formats, OutputFormat, UnknownOutputFormat};
pub use negotiate::{negotiate, negotiate_for};
pub use parameter::{ParameterSchema, ParameterType, UnknownParameterType};
pub use render::{DataSource, RenderError, RenderJob, Renderer};
pub use resource::{strip_file_paths, PublicDefinition, PublicResource, ReportMethod, ReportResource};
pub use value::{CoercionError, TypedValue};
