//! Department code table.
//!
//! Maps short bracketed codes such as `<D10>` to canonical slugs. A lookup
//! miss is not an error: the code is passed through unchanged.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{PluginError, Result};

const DEPARTMENTS: &[(&str, &str)] = &[
    ("<D1>", "attorney-generals-office"),
    ("<D2>", "cabinet-office"),
    ("<D3>", "department-for-business-innovation-skills"),
    ("<D4>", "department-for-communities-and-local-government"),
    ("<D5>", "department-for-culture-media-sport"),
    ("<D6>", "department-for-education"),
    ("<D7>", "department-for-environment-food-rural-affairs"),
    ("<D8>", "department-for-international-development"),
    ("<D9>", "department-for-transport"),
    ("<D10>", "department-for-work-pensions"),
    ("<D11>", "department-of-energy-climate-change"),
    ("<D12>", "department-of-health"),
    ("<D13>", "foreign-commonwealth-office"),
    ("<D15>", "hm-treasury"),
    ("<D16>", "home-office"),
    ("<D17>", "ministry-of-defence"),
    ("<D18>", "ministry-of-justice"),
    ("<D25>", "hm-revenue-customs"),
    ("<D102>", "food-standards-agency"),
    ("<OT532>", "prime-ministers-office-10-downing-street"),
    ("<OT537>", "deputy-prime-ministers-office"),
];

fn leading_code() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^<[^<>]+>").expect("leading code pattern is valid"))
}

/// Extract the first bracketed code token at the start of `value`.
///
/// `"<D18><D9>"` yields `"<D18>"`; `"D18"` yields `None`.
pub fn first_code(value: &str) -> Option<&str> {
    leading_code().find(value).map(|m| m.as_str())
}

/// Immutable code → slug mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeTable {
    codes: IndexMap<String, String>,
}

impl CodeTable {
    /// The built-in government department table.
    pub fn departments() -> Self {
        Self::from_pairs(DEPARTMENTS.iter().copied())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            codes: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Load a table from a YAML or JSON mapping file.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| {
            PluginError::Config(format!("Failed to read code table {}: {}", path.display(), e))
        })?;

        let table: CodeTable = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents)
                .map_err(|e| PluginError::Config(format!("Failed to parse JSON: {}", e)))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| PluginError::Config(format!("Failed to parse YAML: {}", e)))?
        };

        tracing::debug!("Loaded {} codes from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.codes.get(code).map(|s| s.as_str())
    }

    /// Canonical value for `code`, or the code itself when unmapped.
    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        match self.get(code) {
            Some(slug) => slug,
            None => {
                tracing::trace!("No mapping for code {}, passing through", code);
                code
            }
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
