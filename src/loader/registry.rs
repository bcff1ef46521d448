//! Capability registries: the namespaces plugin expressions resolve against.
//!
//! A registry maps names to either constants or constructors. The loader
//! consults exactly two registries per expression: the selected module and
//! the fixed set of safe builtins.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::code_table::CodeTable;
use crate::document::FieldValue;
use crate::error::{PluginError, Result};
use crate::plugins::compute_id::stringify;
use crate::plugins::{
    aggregate_count, aggregate_rate, AggregateKey, AggregationRule, ComputeDepartmentKey,
    ComputeIdFrom, ComputeRank, MissingKeyPolicy, Reduction, RemoveKey, SetDepartment,
};
use crate::transform::{Plugin, Transform};

/// Name of the module used when a specification has no module prefix.
pub const DEFAULT_MODULE: &str = "collector.plugins";

/// Name under which the builtin namespace reports resolution errors.
pub const BUILTINS_MODULE: &str = "builtins";

/// Result of evaluating a plugin expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(FieldValue),
    List(Vec<Value>),
    Rule(AggregationRule),
    Plugin(Plugin),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(v) => v.type_name(),
            Value::List(_) => "list",
            Value::Rule(_) => "aggregation rule",
            Value::Plugin(_) => "plugin",
        }
    }

    pub fn as_plugin(&self) -> Option<&Plugin> {
        match self {
            Value::Plugin(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_plugin(self) -> Option<Plugin> {
        match self {
            Value::Plugin(p) => Some(p),
            _ => None,
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        Value::Scalar(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(FieldValue::String(s)) => write!(f, "{:?}", s),
            Value::Scalar(v) => write!(f, "{}", v),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Rule(rule) => match rule.reduction() {
                Reduction::Sum => write!(f, "aggregate_count({:?})", rule.field()),
                Reduction::WeightedRate { weight } => {
                    write!(f, "aggregate_rate({:?}, {:?})", rule.field(), weight)
                }
            },
            Value::Plugin(plugin) => write!(f, "<{} plugin>", plugin.name()),
        }
    }
}

/// Evaluated call arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: IndexMap<String, Value>,
}

impl Args {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: IndexMap::new(),
        }
    }

    pub fn with_keyword(mut self, name: impl Into<String>, value: Value) -> Self {
        self.keywords.insert(name.into(), value);
        self
    }

    /// Remove and return a keyword argument.
    pub fn take_keyword(&mut self, name: &str) -> Option<Value> {
        self.keywords.shift_remove(name)
    }

    /// Fail if any keyword argument was not consumed.
    pub fn finish(&self, callee: &str) -> Result<()> {
        match self.keywords.keys().next() {
            Some(name) => Err(PluginError::invalid_argument(
                callee,
                format!("unexpected keyword argument '{}'", name),
            )),
            None => Ok(()),
        }
    }

    fn arity(&self, callee: &str, expected: usize) -> Result<()> {
        if self.positional.len() == expected {
            Ok(())
        } else {
            Err(PluginError::invalid_argument(
                callee,
                format!("takes {} positional argument(s) but {} were given", expected, self.positional.len()),
            ))
        }
    }

    /// Exactly `N` string arguments and no keywords.
    pub fn strings<const N: usize>(&self, callee: &str) -> Result<[String; N]> {
        self.finish(callee)?;
        self.arity(callee, N)?;
        let strings = string_values(callee, &self.positional)?;
        strings
            .try_into()
            .map_err(|_| PluginError::invalid_argument(callee, "wrong number of arguments"))
    }

    pub fn single(&self, callee: &str) -> Result<&Value> {
        self.finish(callee)?;
        self.arity(callee, 1)?;
        Ok(&self.positional[0])
    }
}

fn string_values(callee: &str, values: &[Value]) -> Result<Vec<String>> {
    values
        .iter()
        .map(|value| match value {
            Value::Scalar(FieldValue::String(s)) => Ok(s.clone()),
            other => Err(PluginError::invalid_argument(
                callee,
                format!("expected a string, got {} {}", other.kind(), other),
            )),
        })
        .collect()
}

fn keyword_string(args: &mut Args, callee: &str, name: &str) -> Result<Option<String>> {
    match args.take_keyword(name) {
        None => Ok(None),
        Some(Value::Scalar(FieldValue::String(s))) => Ok(Some(s)),
        Some(other) => Err(PluginError::invalid_argument(
            callee,
            format!("keyword '{}' must be a string, got {}", name, other.kind()),
        )),
    }
}

/// A function from evaluated arguments to a value.
pub trait Constructor: Send + Sync {
    fn construct(&self, args: Args) -> Result<Value>;
}

impl<F> Constructor for F
where
    F: Fn(Args) -> Result<Value> + Send + Sync,
{
    fn construct(&self, args: Args) -> Result<Value> {
        self(args)
    }
}

/// A registered name.
pub enum Entry {
    Constant(Value),
    Callable(Box<dyn Constructor>),
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Constant(value) => write!(f, "Constant({})", value),
            Entry::Callable(_) => write!(f, "Callable"),
        }
    }
}

/// Namespace of names a plugin expression may reference.
#[derive(Debug)]
pub struct CapabilityRegistry {
    module: String,
    entries: HashMap<String, Entry>,
}

impl CapabilityRegistry {
    /// Create an empty registry for `module`.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            entries: HashMap::new(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Register a constructor under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, func: Box<dyn Constructor>) {
        self.entries.insert(name.into(), Entry::Callable(func));
    }

    pub fn register_constant(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), Entry::Constant(value));
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Call a registered constructor.
    pub fn call(&self, name: &str, args: Args) -> Result<Value> {
        match self.entries.get(name) {
            Some(Entry::Callable(func)) => func.construct(args),
            Some(Entry::Constant(value)) => Err(PluginError::invalid_argument(
                name,
                format!("{} value is not callable", value.kind()),
            )),
            None => Err(PluginError::NameResolution {
                name: name.to_string(),
                module: self.module.clone(),
            }),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// The default plugin module, resolving department codes through `table`.
    pub fn plugins(table: Arc<CodeTable>) -> Self {
        let mut registry = Self::new(DEFAULT_MODULE);

        registry.register(
            "ComputeRank",
            Box::new(|args: Args| -> Result<Value> {
                let [var_name] = args.strings("ComputeRank")?;
                Ok(Value::Plugin(ComputeRank::new(var_name).into()))
            }),
        );

        registry.register(
            "RemoveKey",
            Box::new(|mut args: Args| -> Result<Value> {
                let missing = match keyword_string(&mut args, "RemoveKey", "missing")? {
                    Some(policy) => policy.parse()?,
                    None => MissingKeyPolicy::default(),
                };
                args.finish("RemoveKey")?;
                let keys = string_values("RemoveKey", &args.positional)?;
                Ok(Value::Plugin(RemoveKey::new(keys).with_policy(missing).into()))
            }),
        );

        registry.register(
            "ComputeIdFrom",
            Box::new(|mut args: Args| -> Result<Value> {
                let separator = keyword_string(&mut args, "ComputeIdFrom", "separator")?;
                args.finish("ComputeIdFrom")?;
                let fields = string_values("ComputeIdFrom", &args.positional)?;
                if fields.is_empty() {
                    return Err(PluginError::invalid_argument("ComputeIdFrom", "at least one field is required"));
                }
                let mut plugin = ComputeIdFrom::new(fields);
                if let Some(separator) = separator {
                    plugin = plugin.with_separator(separator);
                }
                Ok(Value::Plugin(plugin.into()))
            }),
        );

        let department_table = Arc::clone(&table);
        registry.register(
            "ComputeDepartmentKey",
            Box::new(move |args: Args| -> Result<Value> {
                let [key_name] = args.strings("ComputeDepartmentKey")?;
                Ok(Value::Plugin(
                    ComputeDepartmentKey::new(key_name, Arc::clone(&department_table)).into(),
                ))
            }),
        );

        registry.register(
            "SetDepartment",
            Box::new(move |args: Args| -> Result<Value> {
                let [code_or_label] = args.strings("SetDepartment")?;
                Ok(Value::Plugin(SetDepartment::new(&code_or_label, &table).into()))
            }),
        );

        registry.register(
            "AggregateKey",
            Box::new(|args: Args| -> Result<Value> {
                args.finish("AggregateKey")?;
                let values = match <[Value; 1]>::try_from(args.positional) {
                    Ok([Value::List(items)]) => items,
                    Ok([other]) => vec![other],
                    Err(values) => values,
                };
                let rules = values
                    .into_iter()
                    .map(|value| match value {
                        Value::Rule(rule) => Ok(rule),
                        other => Err(PluginError::invalid_argument(
                            "AggregateKey",
                            format!("expected an aggregation rule, got {} {}", other.kind(), other),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Plugin(AggregateKey::new(rules).into()))
            }),
        );

        registry.register(
            "aggregate_count",
            Box::new(|args: Args| -> Result<Value> {
                let [keyname] = args.strings("aggregate_count")?;
                Ok(Value::Rule(aggregate_count(keyname)))
            }),
        );

        registry.register(
            "aggregate_rate",
            Box::new(|args: Args| -> Result<Value> {
                let [rate_key, count_key] = args.strings("aggregate_rate")?;
                Ok(Value::Rule(aggregate_rate(rate_key, count_key)))
            }),
        );

        registry
    }

    /// The fixed set of safe primitives available to every expression.
    pub fn builtins() -> Self {
        let mut registry = Self::new(BUILTINS_MODULE);

        registry.register_constant("True", Value::Scalar(FieldValue::Bool(true)));
        registry.register_constant("False", Value::Scalar(FieldValue::Bool(false)));
        registry.register_constant("None", Value::Scalar(FieldValue::Null));

        registry.register(
            "int",
            Box::new(|args: Args| -> Result<Value> {
                let value = match args.single("int")? {
                    Value::Scalar(FieldValue::Int(i)) => *i,
                    Value::Scalar(FieldValue::Float(f)) if f.is_finite() => f.trunc() as i64,
                    Value::Scalar(FieldValue::Bool(b)) => i64::from(*b),
                    Value::Scalar(FieldValue::String(s)) => s.trim().parse().map_err(|_| {
                        PluginError::invalid_argument("int", format!("invalid literal {:?}", s))
                    })?,
                    other => {
                        return Err(PluginError::invalid_argument(
                            "int",
                            format!("cannot convert {} to int", other.kind()),
                        ))
                    }
                };
                Ok(Value::Scalar(FieldValue::Int(value)))
            }),
        );

        registry.register(
            "float",
            Box::new(|args: Args| -> Result<Value> {
                let value = match args.single("float")? {
                    Value::Scalar(FieldValue::Bool(b)) => f64::from(u8::from(*b)),
                    Value::Scalar(FieldValue::String(s)) => s.trim().parse().map_err(|_| {
                        PluginError::invalid_argument("float", format!("invalid literal {:?}", s))
                    })?,
                    Value::Scalar(v) => v.as_f64().ok_or_else(|| {
                        PluginError::invalid_argument("float", format!("cannot convert {} to float", v.type_name()))
                    })?,
                    other => {
                        return Err(PluginError::invalid_argument(
                            "float",
                            format!("cannot convert {} to float", other.kind()),
                        ))
                    }
                };
                Ok(Value::Scalar(FieldValue::Float(value)))
            }),
        );

        registry.register(
            "str",
            Box::new(|args: Args| -> Result<Value> {
                let rendered = match args.single("str")? {
                    Value::Scalar(v) => stringify(v),
                    other => other.to_string(),
                };
                Ok(Value::Scalar(FieldValue::String(rendered)))
            }),
        );

        registry.register(
            "len",
            Box::new(|args: Args| -> Result<Value> {
                let len = match args.single("len")? {
                    Value::List(items) => items.len(),
                    Value::Scalar(FieldValue::String(s)) => s.chars().count(),
                    other => {
                        return Err(PluginError::invalid_argument(
                            "len",
                            format!("{} has no length", other.kind()),
                        ))
                    }
                };
                Ok(Value::Scalar(FieldValue::Int(len as i64)))
            }),
        );

        registry
    }
}
