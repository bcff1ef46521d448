//! Department resolution from bracketed code tokens.

use std::sync::Arc;

use crate::code_table::{first_code, CodeTable};
use crate::document::{describe, Document, FieldValue};
use crate::error::{PluginError, Result};
use crate::transform::Transform;

/// Field every department plugin writes.
pub const DEPARTMENT_FIELD: &str = "department";

/// Reads a code-bearing field and writes the resolved `department`.
///
/// Only the first `<code>` token at the start of the value is used; unmapped
/// codes are written through verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeDepartmentKey {
    key_name: String,
    table: Arc<CodeTable>,
}

impl ComputeDepartmentKey {
    pub fn new(key_name: impl Into<String>, table: Arc<CodeTable>) -> Self {
        Self {
            key_name: key_name.into(),
            table,
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    fn department(&self, doc: &Document) -> Result<String> {
        let value = doc.get(&self.key_name).ok_or_else(|| PluginError::MissingField {
            field: self.key_name.clone(),
            document: describe(doc),
        })?;

        let codes = value.as_str().ok_or_else(|| {
            PluginError::malformed(&self.key_name, format!("expected a string, got {}", value.type_name()))
        })?;

        let code = first_code(codes).ok_or_else(|| {
            PluginError::malformed(&self.key_name, format!("\"{}\" does not start with a <code> token", codes))
        })?;

        Ok(self.table.resolve(code).to_string())
    }
}

impl Transform for ComputeDepartmentKey {
    fn name(&self) -> &'static str {
        "ComputeDepartmentKey"
    }

    fn apply(&self, documents: &[Document]) -> Result<Vec<Document>> {
        documents
            .iter()
            .map(|doc| {
                let department = self.department(doc)?;
                let mut doc = doc.clone();
                doc.insert(DEPARTMENT_FIELD.to_string(), FieldValue::String(department));
                Ok(doc)
            })
            .collect()
    }
}

/// Stamps every document with one department resolved at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SetDepartment {
    department: String,
}

impl SetDepartment {
    /// Resolve `code_or_label` through `table`; text without a leading code
    /// token is used as the department label as-is.
    pub fn new(code_or_label: &str, table: &CodeTable) -> Self {
        let department = match first_code(code_or_label) {
            Some(code) => table.resolve(code).to_string(),
            None => code_or_label.to_string(),
        };
        Self { department }
    }

    pub fn department(&self) -> &str {
        &self.department
    }
}

impl Transform for SetDepartment {
    fn name(&self) -> &'static str {
        "SetDepartment"
    }

    fn apply(&self, documents: &[Document]) -> Result<Vec<Document>> {
        Ok(documents
            .iter()
            .map(|doc| {
                let mut doc = doc.clone();
                doc.insert(
                    DEPARTMENT_FIELD.to_string(),
                    FieldValue::String(self.department.clone()),
                );
                doc
            })
            .collect())
    }
}
