//! Content-derived document identifiers.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::Utc;

use crate::document::{require, Document, FieldValue};
use crate::error::Result;
use crate::transform::Transform;

pub const ID_FIELD: &str = "_id";
pub const HUMAN_ID_FIELD: &str = "humanId";
pub const DEFAULT_SEPARATOR: &str = "_";

/// Render a value for identifier computation.
///
/// Timestamps are converted to UTC and formatted as `YYYYMMDDHHMMSS`.
pub fn stringify(value: &FieldValue) -> String {
    match value {
        FieldValue::Timestamp(ts) => ts.with_timezone(&Utc).format("%Y%m%d%H%M%S").to_string(),
        other => other.to_string(),
    }
}

/// URL-safe base64 identifier and human-readable form of `value`.
pub fn value_id(value: &str) -> (String, String) {
    (URL_SAFE.encode(value.as_bytes()), value.to_string())
}

/// Derives `_id` and `humanId` from an ordered list of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeIdFrom {
    fields: Vec<String>,
    separator: String,
}

impl ComputeIdFrom {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn joined(&self, doc: &Document) -> Result<String> {
        let parts = self
            .fields
            .iter()
            .map(|field| require(doc, field).map(stringify))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(&self.separator))
    }
}

impl Transform for ComputeIdFrom {
    fn name(&self) -> &'static str {
        "ComputeIdFrom"
    }

    fn apply(&self, documents: &[Document]) -> Result<Vec<Document>> {
        documents
            .iter()
            .map(|doc| {
                let (id, human_id) = value_id(&self.joined(doc)?);
                let mut doc = doc.clone();
                doc.insert(ID_FIELD.to_string(), FieldValue::String(id));
                doc.insert(HUMAN_ID_FIELD.to_string(), FieldValue::String(human_id));
                Ok(doc)
            })
            .collect()
    }
}
