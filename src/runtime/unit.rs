//! Handler units: one loaded handler source file.
//!
//! # Responsibilities
//! - Compile a handler source and run its top-level statements once
//! - Resolve the entry-point shape (verb table / generic `handle`) at load time
//! - Select and invoke an entry point for a request
//!
//! # Design Decisions
//! - A unit is immutable after load; a changed file produces a new unit
//! - Shape resolution happens once per load, not per request
//! - Top-level constants produced by the load are bound into the function
//!   bodies, so entry points read them without re-running the top level
//! - Functions declared `private` are never entry points

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

use rhai::{Array, CallFnOptions, Dynamic, Engine, FnAccess, OptimizationLevel, Scope, AST};
use serde::Serialize;

use crate::error::DispatchError;
use crate::workspace::{HandlerName, ProjectName};

/// Verbs that may be implemented as named entry points.
pub const VERB_FUNCTIONS: &[&str] = &["get", "post", "put", "delete", "patch", "head"];

/// Name of the generic entry point.
pub const GENERIC_FUNCTION: &str = "handle";

/// Top-level constant listing the verbs accepted by `handle`.
pub const SUPPORTED_METHODS_CONST: &str = "SUPPORTED_METHODS";

/// Verbs accepted by `handle` when the unit declares no allow-list.
pub const DEFAULT_SUPPORTED_METHODS: &[&str] = &["GET"];

/// Request data handed to an entry point (as a Rhai object map).
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub project: String,
    pub handler: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: String,
    pub json: Option<serde_json::Value>,
}

/// The generic `handle` entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericEntry {
    pub takes_request: bool,
    /// Upper-cased verbs.
    pub supported_methods: Vec<String>,
}

/// Entry-point surface of a unit, resolved once at load.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerShape {
    /// Verb-named functions, keyed by lower-case verb; value is whether the
    /// function takes the request context. `handle` may back them up.
    VerbTable {
        verbs: BTreeMap<String, bool>,
        fallback: Option<GenericEntry>,
    },
    /// Only a generic `handle` function.
    Generic(GenericEntry),
    /// Neither convention is present.
    Unusable,
}

/// The function chosen for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    pub function: String,
    pub takes_request: bool,
}

/// A compiled handler source file.
pub struct HandlerUnit {
    project: ProjectName,
    handler: HandlerName,
    path: PathBuf,
    modified: SystemTime,
    loaded_at: Instant,
    ast: AST,
    shape: HandlerShape,
    invocations: AtomicU64,
}

impl std::fmt::Debug for HandlerUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerUnit")
            .field("project", &self.project)
            .field("handler", &self.handler)
            .field("path", &self.path)
            .field("modified", &self.modified)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl HandlerUnit {
    /// Load a handler from `path`, recording `modified` as its timestamp.
    pub fn load(
        engine: &Engine,
        project: &ProjectName,
        handler: &HandlerName,
        path: &Path,
        modified: SystemTime,
    ) -> Result<Self, DispatchError> {
        let label = format!("{}/api/{}", project, handler);

        let source = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DispatchError::HandlerNotFound {
                project: project.to_string(),
                handler: handler.to_string(),
            },
            _ => DispatchError::HandlerMisconfigured(format!("{}: cannot read source: {}", label, e)),
        })?;

        let mut compiled = engine
            .compile(&source)
            .map_err(|e| DispatchError::HandlerMisconfigured(format!("{}: parse error: {}", label, e)))?;
        compiled.set_source(label.as_str());

        let mut scope = Scope::new();
        engine.run_ast_with_scope(&mut scope, &compiled).map_err(|e| {
            DispatchError::HandlerMisconfigured(format!("{}: initialisation failed: {}", label, e))
        })?;

        let supported_methods = read_supported_methods(&scope)
            .map_err(|e| DispatchError::HandlerMisconfigured(format!("{}: {}", label, e)))?;

        // Functions only; the top level has already run.
        let mut ast = engine.optimize_ast(
            &module_constants(&scope, &compiled),
            compiled.clone_functions_only(),
            OptimizationLevel::Simple,
        );
        ast.set_source(label.as_str());
        let shape = resolve_shape(&ast, supported_methods);

        Ok(Self {
            project: project.clone(),
            handler: handler.clone(),
            path: path.to_path_buf(),
            modified,
            loaded_at: Instant::now(),
            ast,
            shape,
            invocations: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    pub fn shape(&self) -> &HandlerShape {
        &self.shape
    }

    /// Number of entry-point invocations made against this unit.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Pick the entry point for `method` following the handler conventions.
    pub fn select(&self, method: &str) -> Result<EntryPoint, DispatchError> {
        let verb = method.to_ascii_lowercase();
        match &self.shape {
            HandlerShape::VerbTable { verbs, fallback } => {
                if let Some(&takes_request) = verbs.get(&verb) {
                    return Ok(EntryPoint {
                        function: verb,
                        takes_request,
                    });
                }
                match fallback {
                    Some(generic) => self.select_generic(generic, method),
                    None => Err(DispatchError::HandlerMisconfigured(format!(
                        "{}/api/{} defines no entry point for {} (verbs: {})",
                        self.project,
                        self.handler,
                        method,
                        verbs.keys().cloned().collect::<Vec<_>>().join(", ")
                    ))),
                }
            }
            HandlerShape::Generic(generic) => self.select_generic(generic, method),
            HandlerShape::Unusable => Err(DispatchError::HandlerMisconfigured(format!(
                "{}/api/{}.rhai must define verb functions or handle(request)",
                self.project, self.handler
            ))),
        }
    }

    fn select_generic(&self, generic: &GenericEntry, method: &str) -> Result<EntryPoint, DispatchError> {
        let method = method.to_ascii_uppercase();
        if generic.supported_methods.iter().any(|m| *m == method) {
            Ok(EntryPoint {
                function: GENERIC_FUNCTION.to_string(),
                takes_request: generic.takes_request,
            })
        } else {
            Err(DispatchError::MethodNotAllowed {
                project: self.project.to_string(),
                handler: self.handler.to_string(),
                method,
            })
        }
    }

    /// Invoke an entry point once. Errors raised by the script are returned,
    /// never retried.
    pub fn invoke(
        &self,
        engine: &Engine,
        entry: &EntryPoint,
        request: &RequestContext,
    ) -> Result<Dynamic, DispatchError> {
        self.invocations.fetch_add(1, Ordering::Relaxed);

        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let mut scope = Scope::new();

        let result = if entry.takes_request {
            let ctx = rhai::serde::to_dynamic(request)
                .map_err(|e| DispatchError::HandlerRuntimeError(e.to_string()))?;
            engine.call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, &entry.function, (ctx,))
        } else {
            engine.call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, &entry.function, ())
        };

        result.map_err(|e| DispatchError::HandlerRuntimeError(e.to_string()))
    }
}

/// Top-level constants left by initialisation, minus any name that a
/// function uses as a parameter.
fn module_constants(init: &Scope, ast: &AST) -> Scope<'static> {
    let params: Vec<&str> = ast
        .iter_functions()
        .flat_map(|f| f.params.into_iter())
        .collect();

    let mut constants = Scope::new();
    for (name, is_constant, value) in init.iter() {
        if is_constant && !params.contains(&name) {
            constants.push_constant_dynamic(name.to_string(), value);
        }
    }
    constants
}

fn read_supported_methods(scope: &Scope) -> Result<Vec<String>, String> {
    let Some(value) = scope.get_value::<Dynamic>(SUPPORTED_METHODS_CONST) else {
        return Ok(DEFAULT_SUPPORTED_METHODS.iter().map(|m| m.to_string()).collect());
    };
    let type_name = value.type_name();
    let items = value
        .try_cast::<Array>()
        .ok_or_else(|| format!("{} must be an array of strings, got {}", SUPPORTED_METHODS_CONST, type_name))?;

    items
        .into_iter()
        .map(|item| {
            item.into_string()
                .map(|m| m.to_ascii_uppercase())
                .map_err(|t| format!("{} entries must be strings, got {}", SUPPORTED_METHODS_CONST, t))
        })
        .collect()
}

fn resolve_shape(ast: &AST, supported_methods: Vec<String>) -> HandlerShape {
    let mut verbs: BTreeMap<String, bool> = BTreeMap::new();
    let mut generic: Option<bool> = None;

    for f in ast.iter_functions() {
        if !matches!(f.access, FnAccess::Public) || f.params.len() > 1 {
            continue;
        }
        let takes_request = f.params.len() == 1;
        if VERB_FUNCTIONS.contains(&f.name) {
            let slot = verbs.entry(f.name.to_string()).or_insert(takes_request);
            *slot |= takes_request;
        } else if f.name == GENERIC_FUNCTION {
            generic = Some(generic.unwrap_or(false) | takes_request);
        }
    }

    let generic = generic.map(|takes_request| GenericEntry {
        takes_request,
        supported_methods,
    });

    match (verbs.is_empty(), generic) {
        (false, fallback) => HandlerShape::VerbTable { verbs, fallback },
        (true, Some(generic)) => HandlerShape::Generic(generic),
        (true, None) => HandlerShape::Unusable,
    }
}
