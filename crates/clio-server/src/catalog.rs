//! Resource compiler: turns the configured catalog into a [`RouteTable`].
//!
//! Every entry is validated before anything is served. The first invalid
//! entry aborts the whole compile.
//!
//! A resource with methods `M`, formats `F` and path `P` expands into
//! `m P` and `m P.ext(f)` for every `m` in `M` and `f` in `F`, plus
//! `GET P/info`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clio_config::{ClioConfig, ReportConfig};
use clio_core::{
    DefinitionError, ParameterSchema, ReportDefinition, ReportMethod, ReportResource,
};

use crate::error::{CompileError, CompileResult};
use crate::routes::{RouteKind, RouteTable, RouteTarget, INFO_SUFFIX};

/// Compiles report configuration into routes.
#[derive(Debug, Clone)]
pub struct ResourceCompiler {
    api_root: String,
    base_dir: PathBuf,
}

impl ResourceCompiler {
    /// Creates a compiler for `api_root` (no trailing `/`), resolving relative
    /// report files against `base_dir`.
    pub fn new(api_root: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_root: api_root.into(),
            base_dir: base_dir.into(),
        }
    }

    /// Creates a compiler from a loaded configuration.
    pub fn from_config(config: &ClioConfig) -> Self {
        Self::new(config.api_root(), config.base_dir.clone())
    }

    /// Compiles the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns the first [`CompileError`] found; no partial table is returned.
    pub fn compile(&self, catalog: &[ReportConfig]) -> CompileResult<RouteTable> {
        let mut table = RouteTable::new(self.api_root.clone());

        for entry in catalog {
            let resource = Arc::new(self.build_resource(entry, &table)?);
            register(&mut table, Arc::clone(&resource))?;

            tracing::info!(
                report = resource.name(),
                path = %table.full_path(&resource),
                methods = ?resource.methods(),
                formats = ?resource.formats(),
                "Registered report"
            );
            table.push_resource(resource);
        }

        tracing::info!(
            reports = catalog.len(),
            routes = table.len(),
            "Report catalog compiled"
        );
        Ok(table)
    }

    /// Builds and validates one resource.
    fn build_resource(
        &self,
        entry: &ReportConfig,
        table: &RouteTable,
    ) -> CompileResult<ReportResource> {
        let methods = methods_of(entry);
        if methods.is_empty() {
            return Err(DefinitionError::NoMethods {
                report: entry.name.clone(),
            }
            .into());
        }

        let route_path = entry
            .path
            .clone()
            .unwrap_or_else(|| ReportResource::default_route_path(&entry.name));

        // Validated against a placeholder file first so path errors win over
        // missing files.
        let placeholder = ReportResource::new(
            route_path.clone(),
            methods.clone(),
            entry.ext.iter().copied().collect(),
            ReportDefinition::new(entry.name.clone(), PathBuf::new()),
        )?;
        let full_path = table.full_path(&placeholder);
        if table.reserved_paths().contains(&full_path) {
            return Err(CompileError::ReservedPath {
                report: entry.name.clone(),
                path: full_path,
            });
        }

        let file = self
            .resolve_file(&entry.file)
            .ok_or_else(|| CompileError::ReportFileNotFound {
                report: entry.name.clone(),
                path: entry.file.clone(),
            })?;

        let parameters = entry
            .parameters
            .iter()
            .map(|p| {
                ParameterSchema::new(p.name.clone(), p.ty)
                    .required(p.required)
                    .with_default(p.default.clone())
            })
            .collect();

        let definition = ReportDefinition::new(entry.name.clone(), file)
            .with_version(entry.version.clone())
            .with_description(entry.description.clone())
            .with_parameters(parameters)?;
        definition.validate()?;

        Ok(ReportResource::new(
            route_path,
            methods,
            entry.ext.iter().copied().collect(),
            definition,
        )?)
    }

    /// Resolves a report file to an existing path.
    ///
    /// The literal path is tried first. A relative path is then resolved
    /// against the base directory, after stripping a leading `./` or `.\`.
    pub fn resolve_file(&self, file: &Path) -> Option<PathBuf> {
        if file.exists() {
            return Some(file.to_path_buf());
        }
        if file.is_absolute() {
            return None;
        }

        let raw = file.to_string_lossy();
        let stripped = raw
            .strip_prefix("./")
            .or_else(|| raw.strip_prefix(".\\"))
            .unwrap_or(&raw);
        let candidate = self.base_dir.join(stripped);
        candidate.exists().then_some(candidate)
    }
}

fn methods_of(entry: &ReportConfig) -> BTreeSet<ReportMethod> {
    let mut methods = BTreeSet::new();
    if entry.methods.get {
        methods.insert(ReportMethod::Get);
    }
    if entry.methods.post {
        methods.insert(ReportMethod::Post);
    }
    methods
}

/// Expands one resource into its concrete routes.
fn register(table: &mut RouteTable, resource: Arc<ReportResource>) -> CompileResult<()> {
    let base = table.full_path(&resource);

    for &method in resource.methods() {
        table.insert(
            method,
            base.clone(),
            RouteTarget::new(Arc::clone(&resource), RouteKind::Report { extension: None }),
        )?;
        for &format in resource.formats() {
            table.insert(
                method,
                format!("{base}.{}", format.extension()),
                RouteTarget::new(
                    Arc::clone(&resource),
                    RouteKind::Report {
                        extension: Some(format),
                    },
                ),
            )?;
        }
    }

    table.insert(
        ReportMethod::Get,
        format!("{base}{INFO_SUFFIX}"),
        RouteTarget::new(resource, RouteKind::Info),
    )
}
