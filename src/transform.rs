//! The transform interface and the tagged union of every plugin kind.
//!
//! Transforms are copy-on-write: they borrow the input sequence for the
//! duration of the call and return newly built documents.

use crate::document::Document;
use crate::error::Result;
use crate::plugins::{
    AggregateKey, ComputeDepartmentKey, ComputeIdFrom, ComputeRank, RemoveKey, SetDepartment,
};

/// A configured function from document sequence to document sequence.
pub trait Transform {
    /// Registry name of the transform kind.
    fn name(&self) -> &'static str;

    /// Apply the transform to a whole document sequence.
    fn apply(&self, documents: &[Document]) -> Result<Vec<Document>>;
}

/// A loaded plugin, one variant per plugin kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Plugin {
    ComputeRank(ComputeRank),
    RemoveKey(RemoveKey),
    ComputeIdFrom(ComputeIdFrom),
    ComputeDepartmentKey(ComputeDepartmentKey),
    SetDepartment(SetDepartment),
    AggregateKey(AggregateKey),
}

impl Plugin {
    fn as_transform(&self) -> &dyn Transform {
        match self {
            Plugin::ComputeRank(p) => p,
            Plugin::RemoveKey(p) => p,
            Plugin::ComputeIdFrom(p) => p,
            Plugin::ComputeDepartmentKey(p) => p,
            Plugin::SetDepartment(p) => p,
            Plugin::AggregateKey(p) => p,
        }
    }
}

impl Transform for Plugin {
    fn name(&self) -> &'static str {
        self.as_transform().name()
    }

    fn apply(&self, documents: &[Document]) -> Result<Vec<Document>> {
        self.as_transform().apply(documents)
    }
}

macro_rules! impl_from_plugin {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Plugin {
                fn from(plugin: $variant) -> Self {
                    Plugin::$variant(plugin)
                }
            }
        )*
    };
}

impl_from_plugin!(
    ComputeRank,
    RemoveKey,
    ComputeIdFrom,
    ComputeDepartmentKey,
    SetDepartment,
    AggregateKey,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{document, FieldValue};

    #[test]
    fn test_plugin_dispatches_to_variant() {
        let plugin: Plugin = ComputeRank::new("rank").into();
        assert_eq!(plugin.name(), "ComputeRank");

        let output = plugin.apply(&[document([("a", 1)])]).unwrap();
        assert_eq!(output[0]["rank"], FieldValue::Int(1));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let plugin: Plugin = RemoveKey::new(["a"]).into();
        let input = vec![document([("a", 1), ("b", 2)])];

        let output = plugin.apply(&input).unwrap();

        assert!(input[0].contains_key("a"));
        assert!(!output[0].contains_key("a"));
    }
}
