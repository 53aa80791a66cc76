//! The compiled route table.
//!
//! Built once by the [`ResourceCompiler`](crate::ResourceCompiler) and never
//! mutated afterwards, so lookups need no synchronization.

use std::collections::BTreeMap;
use std::sync::Arc;

use clio_core::{OutputFormat, ReportMethod, ReportResource};
use http::Method;

use crate::error::{CompileError, CompileResult};

/// Path of the catalog listing, relative to the API root.
pub const LISTING_PATH: &str = "/reports.json";

/// Path of the OpenAPI document.
pub const OPENAPI_PATH: &str = "/openapi";

/// Path of the Prometheus scrape endpoint.
pub const METRICS_PATH: &str = "/metrics";

/// Suffix of the per-report info route.
pub const INFO_SUFFIX: &str = "/info";

/// What a concrete route serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Generates the report. `extension` is the format named in the path, if any.
    Report {
        /// Format suffix of the path.
        extension: Option<OutputFormat>,
    },
    /// Returns the report definition without file locations.
    Info,
}

/// The resource and kind registered for one method and path.
#[derive(Debug, Clone)]
pub struct RouteTarget {
    resource: Arc<ReportResource>,
    kind: RouteKind,
}

impl RouteTarget {
    /// Creates a route target.
    pub fn new(resource: Arc<ReportResource>, kind: RouteKind) -> Self {
        Self { resource, kind }
    }

    /// Returns the resource.
    pub fn resource(&self) -> &ReportResource {
        &self.resource
    }

    /// Returns the kind of route.
    pub fn kind(&self) -> RouteKind {
        self.kind
    }
}

/// Result of a route lookup.
#[derive(Debug)]
pub enum RouteLookup<'a> {
    /// The method and path are registered.
    Found(&'a RouteTarget),
    /// The path is registered, but not for this method.
    MethodNotAllowed(Vec<String>),
    /// Nothing is registered under the path.
    NotFound,
}

/// Mapping from `(method, concrete path)` to its target.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    api_root: String,
    routes: BTreeMap<String, BTreeMap<ReportMethod, RouteTarget>>,
    resources: Vec<Arc<ReportResource>>,
}

impl RouteTable {
    /// Creates an empty table under `api_root` (no trailing `/`).
    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
            routes: BTreeMap::new(),
            resources: Vec::new(),
        }
    }

    /// Returns the API root.
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Returns the full path of the catalog listing.
    pub fn listing_path(&self) -> String {
        format!("{}{LISTING_PATH}", self.api_root)
    }

    /// Returns the paths no report may use.
    pub fn reserved_paths(&self) -> [String; 4] {
        let root = if self.api_root.is_empty() {
            "/".to_string()
        } else {
            self.api_root.clone()
        };
        [
            root,
            self.listing_path(),
            OPENAPI_PATH.to_string(),
            METRICS_PATH.to_string(),
        ]
    }

    /// Returns the full path of a resource's base route.
    pub fn full_path(&self, resource: &ReportResource) -> String {
        format!("{}{}", self.api_root, resource.route_path())
    }

    /// Registers one route.
    pub(crate) fn insert(
        &mut self,
        method: ReportMethod,
        path: String,
        target: RouteTarget,
    ) -> CompileResult<()> {
        let slots = self.routes.entry(path.clone()).or_default();
        if let Some(existing) = slots.get(&method) {
            return Err(CompileError::DuplicateRoute {
                method: method.to_string(),
                path,
                first: existing.resource.name().to_string(),
                second: target.resource.name().to_string(),
            });
        }
        slots.insert(method, target);
        Ok(())
    }

    /// Records a compiled resource for listings.
    pub(crate) fn push_resource(&mut self, resource: Arc<ReportResource>) {
        self.resources.push(resource);
    }

    /// Looks up a request. A trailing `/` on `path` is ignored.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup<'_> {
        let Some(slots) = self.routes.get(normalize_request_path(path)) else {
            return RouteLookup::NotFound;
        };

        match ReportMethod::from_http(method).and_then(|m| slots.get(&m)) {
            Some(target) => RouteLookup::Found(target),
            None => RouteLookup::MethodNotAllowed(
                slots.keys().map(|m| m.as_str().to_string()).collect(),
            ),
        }
    }

    /// Iterates over every route as `(method, path, target)`, sorted by path.
    pub fn routes(&self) -> impl Iterator<Item = (ReportMethod, &str, &RouteTarget)> {
        self.routes.iter().flat_map(|(path, slots)| {
            slots
                .iter()
                .map(move |(method, target)| (*method, path.as_str(), target))
        })
    }

    /// Returns the compiled resources in catalog order.
    pub fn resources(&self) -> impl Iterator<Item = &ReportResource> {
        self.resources.iter().map(AsRef::as_ref)
    }

    /// Returns the number of `(method, path)` routes.
    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Strips trailing `/` from a request path, keeping a bare `/`.
pub fn normalize_request_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
