use std::str::FromStr;

use crate::document::{require, Document};
use crate::error::{PluginError, Result};
use crate::transform::Transform;

/// What `RemoveKey` does when a document lacks a key scheduled for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingKeyPolicy {
    /// Fail the whole call before any document is produced.
    #[default]
    Error,
    /// Skip absent keys.
    Ignore,
}

impl FromStr for MissingKeyPolicy {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(MissingKeyPolicy::Error),
            "ignore" => Ok(MissingKeyPolicy::Ignore),
            other => Err(PluginError::invalid_argument(
                "RemoveKey",
                format!("missing must be \"error\" or \"ignore\", got \"{}\"", other),
            )),
        }
    }
}

/// Removes the configured keys from every document.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveKey {
    remove_keys: Vec<String>,
    missing: MissingKeyPolicy,
}

impl RemoveKey {
    pub fn new<I, S>(remove_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            remove_keys: remove_keys.into_iter().map(Into::into).collect(),
            missing: MissingKeyPolicy::default(),
        }
    }

    pub fn with_policy(mut self, missing: MissingKeyPolicy) -> Self {
        self.missing = missing;
        self
    }

    pub fn remove_keys(&self) -> &[String] {
        &self.remove_keys
    }

    pub fn policy(&self) -> MissingKeyPolicy {
        self.missing
    }
}

impl Transform for RemoveKey {
    fn name(&self) -> &'static str {
        "RemoveKey"
    }

    fn apply(&self, documents: &[Document]) -> Result<Vec<Document>> {
        if self.missing == MissingKeyPolicy::Error {
            for doc in documents {
                for key in &self.remove_keys {
                    require(doc, key)?;
                }
            }
        }

        Ok(documents
            .iter()
            .map(|doc| {
                let mut doc = doc.clone();
                for key in &self.remove_keys {
                    doc.shift_remove(key);
                }
                doc
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{document, FieldValue};

    #[test]
    fn test_remove_key() {
        let doc = document([("a", FieldValue::Null), ("b", FieldValue::Null)]);

        let output = RemoveKey::new(["b"]).apply(&[doc]).unwrap();

        assert_eq!(output, vec![document([("a", FieldValue::Null)])]);
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let doc = document([("a", 1), ("b", 2), ("c", 3)]);

        let output = RemoveKey::new(["b"]).apply(&[doc]).unwrap();
        let keys: Vec<&str> = output[0].keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_missing_key_fails_whole_call() {
        let docs = vec![document([("a", 1), ("b", 2)]), document([("a", 1)])];

        let result = RemoveKey::new(["b"]).apply(&docs);

        assert!(matches!(result, Err(PluginError::MissingField { ref field, .. }) if field == "b"));
    }

    #[test]
    fn test_missing_key_ignored_when_configured() {
        let docs = vec![document([("a", 1), ("b", 2)]), document([("a", 1)])];

        let output = RemoveKey::new(["b"])
            .with_policy(MissingKeyPolicy::Ignore)
            .apply(&docs)
            .unwrap();

        assert_eq!(output, vec![document([("a", 1)]), document([("a", 1)])]);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("ignore".parse::<MissingKeyPolicy>().unwrap(), MissingKeyPolicy::Ignore);
        assert!("skip".parse::<MissingKeyPolicy>().is_err());
    }
}
