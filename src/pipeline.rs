//! Pipeline configuration and runner.
//!
//! A pipeline is an ordered list of plugin specifications applied in turn to
//! the full document sequence.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::code_table::CodeTable;
use crate::document::Document;
use crate::error::{PluginError, Result};
use crate::loader::PluginLoader;
use crate::transform::{Plugin, Transform};

/// Pipeline configuration as read from YAML or JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Plugin specifications, applied in order.
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Optional code table replacing the built-in department table.
    /// Relative paths resolve against the config file's directory.
    #[serde(default)]
    pub code_table: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load a pipeline configuration file.
    ///
    /// # Example
    /// ```ignore
    /// use collector_plugins::PipelineConfig;
    ///
    /// let config = PipelineConfig::load_from_file("pipeline.yaml")?;
    /// println!("{} plugins", config.plugins.len());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| {
            PluginError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let mut config = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&contents)?
        } else {
            Self::from_yaml_str(&contents)?
        };

        if let (Some(table), Some(dir)) = (&config.code_table, path.parent()) {
            if table.is_relative() {
                config.code_table = Some(dir.join(table));
            }
        }

        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| PluginError::Config(format!("Failed to parse YAML: {}", e)))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| PluginError::Config(format!("Failed to parse JSON: {}", e)))
    }

    /// Build the loader this configuration asks for.
    pub fn loader(&self) -> Result<PluginLoader> {
        let table = match &self.code_table {
            Some(path) => CodeTable::load_from_file(path)?,
            None => CodeTable::departments(),
        };
        Ok(PluginLoader::with_code_table(table))
    }

    /// Load every configured plugin.
    pub fn build(&self) -> Result<Pipeline> {
        Pipeline::from_specs(&self.loader()?, &self.plugins)
    }
}

/// Ordered list of loaded plugins.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    plugins: Vec<Plugin>,
}

impl Pipeline {
    pub fn new(plugins: Vec<Plugin>) -> Self {
        Self { plugins }
    }

    /// Load `specs` in order; each must evaluate to a plugin.
    pub fn from_specs<I, S>(loader: &PluginLoader, specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let plugins = specs
            .into_iter()
            .map(|spec| loader.load_transform(spec.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { plugins })
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Apply each plugin in turn; the first failure aborts the run.
    pub fn run(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        let input_count = documents.len();
        let mut documents = documents;

        for (stage, plugin) in self.plugins.iter().enumerate() {
            let before = documents.len();
            documents = plugin.apply(&documents).map_err(|e| {
                tracing::error!("Plugin {} (stage {}) failed: {}", plugin.name(), stage, e);
                e
            })?;
            tracing::debug!(
                "Stage {} {}: {} -> {} documents",
                stage,
                plugin.name(),
                before,
                documents.len()
            );
        }

        tracing::info!(
            "Pipeline of {} plugins turned {} documents into {}",
            self.plugins.len(),
            input_count,
            documents.len()
        );
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{document, FieldValue};
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_run_applies_plugins_in_order() {
        let loader = PluginLoader::new();
        let pipeline = Pipeline::from_specs(
            &loader,
            ["AggregateKey(aggregate_count('pageviews'))", "ComputeRank('rank')"],
        )
        .unwrap();

        let docs = vec![
            document([("path", FieldValue::from("/b")), ("pageviews", FieldValue::Int(1))]),
            document([("path", FieldValue::from("/a")), ("pageviews", FieldValue::Int(2))]),
            document([("path", FieldValue::from("/b")), ("pageviews", FieldValue::Int(3))]),
        ];

        let output = pipeline.run(docs).unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output[0]["path"], FieldValue::from("/a"));
        assert_eq!(output[0]["rank"], FieldValue::Int(1));
        assert_eq!(output[1]["pageviews"], FieldValue::Int(4));
        assert_eq!(output[1]["rank"], FieldValue::Int(2));
    }

    #[test]
    fn test_non_plugin_spec_is_rejected() {
        let result = Pipeline::from_specs(&PluginLoader::new(), ["1"]);
        assert!(matches!(result, Err(PluginError::InvalidArgument { .. })));
    }

    #[test]
    fn test_failure_propagates() {
        let pipeline = Pipeline::from_specs(&PluginLoader::new(), ["RemoveKey('missing')"]).unwrap();
        let result = pipeline.run(vec![document([("a", 1)])]);
        assert!(matches!(result, Err(PluginError::MissingField { .. })));
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let docs = vec![document([("a", 1)])];
        assert_eq!(Pipeline::default().run(docs.clone()).unwrap(), docs);
    }

    #[test]
    fn test_load_config_with_relative_code_table() {
        let temp_dir = TempDir::new().unwrap();

        let mut table = fs::File::create(temp_dir.path().join("codes.yaml")).unwrap();
        writeln!(table, "\"<X1>\": agency-one").unwrap();

        let config_path = temp_dir.path().join("pipeline.yaml");
        let mut config = fs::File::create(&config_path).unwrap();
        writeln!(
            config,
            "plugins:\n  - ComputeDepartmentKey(\"code\")\n  - RemoveKey(\"code\")\ncode_table: codes.yaml"
        )
        .unwrap();

        let config = PipelineConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.code_table, Some(temp_dir.path().join("codes.yaml")));

        let output = config.build().unwrap().run(vec![document([("code", "<X1>")])]).unwrap();
        assert_eq!(output, vec![document([("department", "agency-one")])]);
    }

    #[test]
    fn test_load_json_config() {
        let config = PipelineConfig::from_json_str(r#"{"plugins": ["ComputeRank(\"rank\")"]}"#).unwrap();
        assert_eq!(config.plugins, vec!["ComputeRank(\"rank\")".to_string()]);
        assert_eq!(config.code_table, None);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        assert!(matches!(
            PipelineConfig::from_yaml_str("plugins: {not: a list}"),
            Err(PluginError::Config(_))
        ));
    }
}
