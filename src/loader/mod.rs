//! Plugin loader: turns plugin specification strings into values.
//!
//! A specification has the form `[module-path:]expression`. The expression is
//! parsed by a closed-form parser and evaluated against two namespaces only:
//! the selected module's [`CapabilityRegistry`] and the safe builtins. Nothing
//! else in the process is reachable from configuration text.
//!
//! ```
//! use collector_plugins::loader::{load_plugin, Value};
//! use collector_plugins::document::FieldValue;
//!
//! let one = load_plugin("1").unwrap();
//! assert_eq!(one, Value::Scalar(FieldValue::Int(1)));
//!
//! let rank = load_plugin("ComputeRank(\"rank\")").unwrap();
//! assert!(rank.as_plugin().is_some());
//! ```

pub mod parser;
pub mod registry;

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::code_table::CodeTable;
use crate::document::FieldValue;
use crate::error::{PluginError, Result};
use crate::transform::Plugin;

pub use parser::{parse_expression, Expr};
pub use registry::{Args, CapabilityRegistry, Constructor, Entry, Value, BUILTINS_MODULE, DEFAULT_MODULE};

fn module_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*:")
            .expect("module prefix pattern is valid")
    })
}

/// Split `spec` into an optional module path and the expression text.
pub fn split_spec(spec: &str) -> (Option<&str>, &str) {
    match module_prefix().captures(spec) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            (caps.get(1).map(|m| m.as_str()), &spec[whole..])
        }
        None => (None, spec),
    }
}

/// Loads plugin specifications against registered module namespaces.
#[derive(Debug)]
pub struct PluginLoader {
    builtins: CapabilityRegistry,
    modules: HashMap<String, CapabilityRegistry>,
    default_module: String,
}

impl PluginLoader {
    /// Loader whose default module resolves departments with the built-in table.
    pub fn new() -> Self {
        Self::with_code_table(CodeTable::departments())
    }

    pub fn with_code_table(table: CodeTable) -> Self {
        let mut loader = Self {
            builtins: CapabilityRegistry::builtins(),
            modules: HashMap::new(),
            default_module: DEFAULT_MODULE.to_string(),
        };
        loader.register_module(CapabilityRegistry::plugins(Arc::new(table)));
        loader
    }

    /// Make a namespace selectable by its module path, replacing any previous
    /// registry with the same path.
    pub fn register_module(&mut self, registry: CapabilityRegistry) {
        self.modules.insert(registry.module().to_string(), registry);
    }

    pub fn module(&self, path: &str) -> Option<&CapabilityRegistry> {
        self.modules.get(path)
    }

    pub fn default_module(&self) -> &CapabilityRegistry {
        // with_code_table always registers the default module.
        &self.modules[&self.default_module]
    }

    /// Evaluate one plugin specification.
    pub fn load_plugin(&self, spec: &str) -> Result<Value> {
        let (module_path, expression) = split_spec(spec);
        let module = match module_path {
            Some(path) => self
                .modules
                .get(path)
                .ok_or_else(|| PluginError::NameResolution {
                    name: path.to_string(),
                    module: path.to_string(),
                })?,
            None => self.default_module(),
        };

        let expr = parse_expression(expression)?;
        let value = self.evaluate(&expr, module)?;
        tracing::debug!("Loaded plugin spec {:?} from {} as {}", spec, module.module(), value.kind());
        Ok(value)
    }

    /// Evaluate specifications in order, failing on the first error.
    pub fn load_plugins<I, S>(&self, specs: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        specs
            .into_iter()
            .map(|spec| self.load_plugin(spec.as_ref()))
            .collect()
    }

    /// Evaluate a specification that must produce a plugin.
    pub fn load_transform(&self, spec: &str) -> Result<Plugin> {
        let value = self.load_plugin(spec)?;
        let kind = value.kind();
        value.into_plugin().ok_or_else(|| {
            PluginError::invalid_argument(spec, format!("evaluates to a {}, not a plugin", kind))
        })
    }

    fn evaluate(&self, expr: &Expr, module: &CapabilityRegistry) -> Result<Value> {
        match expr {
            Expr::Int(i) => Ok(Value::Scalar(FieldValue::Int(*i))),
            Expr::Float(f) => Ok(Value::Scalar(FieldValue::Float(*f))),
            Expr::Str(s) => Ok(Value::Scalar(FieldValue::String(s.clone()))),
            Expr::List(items) => items
                .iter()
                .map(|item| self.evaluate(item, module))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Expr::Name(name) => match self.resolve(name, module)? {
                Entry::Constant(value) => Ok(value.clone()),
                Entry::Callable(_) => Err(PluginError::invalid_argument(
                    name,
                    "constructor must be called with arguments",
                )),
            },
            Expr::Call { callee, args, kwargs } => {
                self.resolve(callee, module)?;
                let namespace = if module.has(callee) { module } else { &self.builtins };

                let mut evaluated = Args::new(
                    args.iter()
                        .map(|arg| self.evaluate(arg, module))
                        .collect::<Result<Vec<_>>>()?,
                );
                for (name, arg) in kwargs {
                    evaluated = evaluated.with_keyword(name.clone(), self.evaluate(arg, module)?);
                }

                namespace.call(callee, evaluated)
            }
        }
    }

    // Module names shadow builtins.
    fn resolve<'a>(&'a self, name: &str, module: &'a CapabilityRegistry) -> Result<&'a Entry> {
        module
            .get(name)
            .or_else(|| self.builtins.get(name))
            .ok_or_else(|| PluginError::NameResolution {
                name: name.to_string(),
                module: module.module().to_string(),
            })
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a single specification with the default loader.
pub fn load_plugin(spec: &str) -> Result<Value> {
    PluginLoader::new().load_plugin(spec)
}

/// Load several specifications with the default loader.
pub fn load_plugins<I, S>(specs: I) -> Result<Vec<Value>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    PluginLoader::new().load_plugins(specs)
}
