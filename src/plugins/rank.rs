use crate::document::{Document, FieldValue};
use crate::error::Result;
use crate::transform::Transform;

/// Writes a 1-based position into every document, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeRank {
    var_name: String,
}

impl ComputeRank {
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }

    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

impl Transform for ComputeRank {
    fn name(&self) -> &'static str {
        "ComputeRank"
    }

    fn apply(&self, documents: &[Document]) -> Result<Vec<Document>> {
        Ok(documents
            .iter()
            .zip(1i64..)
            .map(|(doc, rank)| {
                let mut doc = doc.clone();
                doc.insert(self.var_name.clone(), FieldValue::Int(rank));
                doc
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::document;
    use proptest::prelude::*;

    #[test]
    fn test_rank() {
        let plugin = ComputeRank::new("rank");
        let docs = vec![Document::new(), Document::new()];

        let result = plugin.apply(&docs).unwrap();

        assert_eq!(result[0]["rank"], FieldValue::Int(1));
        assert_eq!(result[1]["rank"], FieldValue::Int(2));
    }

    #[test]
    fn test_rank_overwrites_existing_field() {
        let plugin = ComputeRank::new("rank");
        let docs = vec![document([("rank", 99)])];

        let result = plugin.apply(&docs).unwrap();
        assert_eq!(result[0]["rank"], FieldValue::Int(1));
    }

    proptest! {
        #[test]
        fn prop_rank_follows_input_order(values in proptest::collection::vec(any::<i64>(), 0..50)) {
            let docs: Vec<Document> = values.iter().map(|v| document([("v", *v)])).collect();

            let result = ComputeRank::new("position").apply(&docs).unwrap();

            prop_assert_eq!(result.len(), docs.len());
            for (i, doc) in result.iter().enumerate() {
                prop_assert_eq!(&doc["position"], &FieldValue::Int(i as i64 + 1));
                prop_assert_eq!(&doc["v"], &docs[i]["v"]);
            }
        }
    }
}
