//! # Collector Plugins: Composable Document Transforms
//!
//! Collector plugins turn configuration strings into document-sequence
//! transforms for data-collection pipelines.
//!
//! ## Features
//!
//! - **Plugin loader**: `[module-path:]expression` strings such as
//!   `ComputeRank("rank")` are parsed and resolved against a registry of named
//!   constructors; nothing outside the registry is reachable
//! - **Field transforms**: rank assignment, key removal, content-derived
//!   identifiers and department-code resolution
//! - **Grouping & aggregation**: partition by every non-aggregated field and
//!   reduce with sums and weighted rates
//! - **Pipelines**: ordered plugin lists loaded from YAML or JSON
//!
//! ## Example: pipeline configuration
//!
//! ```yaml
//! plugins:
//!   - ComputeDepartmentKey("customVarValue9")
//!   - RemoveKey("customVarValue9")
//!   - AggregateKey(aggregate_count("visits"), aggregate_rate("rate", "visits"))
//!   - ComputeRank("rank")
//! ```
//!
//! ## Example: in code
//!
//! ```
//! use collector_plugins::{document, FieldValue, Pipeline, PluginLoader};
//!
//! let loader = PluginLoader::new();
//! let pipeline = Pipeline::from_specs(&loader, ["ComputeDepartmentKey(\"code\")"]).unwrap();
//!
//! let output = pipeline.run(vec![document([("code", "<D10>")])]).unwrap();
//! assert_eq!(output[0]["department"], FieldValue::from("department-for-work-pensions"));
//! ```

pub mod code_table;
pub mod document;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod plugins;
pub mod transform;

// Re-export key types
pub use code_table::CodeTable;
pub use document::{document, Document, FieldValue};
pub use error::{PluginError, Result};
pub use loader::{load_plugin, load_plugins, CapabilityRegistry, PluginLoader, Value};
pub use pipeline::{Pipeline, PipelineConfig};
pub use plugins::{
    aggregate_by_department, aggregate_count, aggregate_rate, AggregateKey, AggregationRule,
    ComputeDepartmentKey, ComputeIdFrom, ComputeRank, RemoveKey, SetDepartment,
};
pub use transform::{Plugin, Transform};
