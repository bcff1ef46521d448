//! Grouping and aggregation.
//!
//! Documents are partitioned by the values of every field that is not being
//! aggregated, and each partition is reduced to one document. The output
//! follows the sorted group-key order, not the input order.

use crate::document::{require, Document, FieldValue};
use crate::error::{PluginError, Result};
use crate::transform::Transform;

/// Field summed when no rules are configured.
pub const DEFAULT_AGGREGATE_FIELD: &str = "pageviews";

/// How a partition collapses into one value for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// Total of the field itself.
    Sum,
    /// Mean of the field weighted by another field.
    WeightedRate { weight: String },
}

/// An output field paired with the reduction that computes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRule {
    field: String,
    reduction: Reduction,
}

/// Sum `keyname` across a group.
pub fn aggregate_count(keyname: impl Into<String>) -> AggregationRule {
    AggregationRule {
        field: keyname.into(),
        reduction: Reduction::Sum,
    }
}

/// Weighted mean of `rate_key`, weighted by `count_key`.
///
/// The summed weight is not emitted; pair with `aggregate_count(count_key)`
/// to keep it.
pub fn aggregate_rate(rate_key: impl Into<String>, count_key: impl Into<String>) -> AggregationRule {
    AggregationRule {
        field: rate_key.into(),
        reduction: Reduction::WeightedRate {
            weight: count_key.into(),
        },
    }
}

fn numeric(doc: &Document, field: &str) -> Result<FieldValue> {
    match require(doc, field)? {
        value @ (FieldValue::Int(_) | FieldValue::Float(_)) => Ok(value.clone()),
        other => Err(PluginError::malformed(
            field,
            format!("expected a number, got {} {}", other.type_name(), other),
        )),
    }
}

fn as_f64(doc: &Document, field: &str) -> Result<f64> {
    Ok(numeric(doc, field)?.as_f64().unwrap_or_default())
}

impl AggregationRule {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn reduction(&self) -> &Reduction {
        &self.reduction
    }

    /// Reduce a non-empty group to a single value.
    pub fn reduce(&self, docs: &[Document]) -> Result<FieldValue> {
        if docs.is_empty() {
            return Err(PluginError::AggregationPrecondition(format!(
                "cannot aggregate '{}' over an empty group",
                self.field
            )));
        }

        match &self.reduction {
            Reduction::Sum => self.sum(docs),
            Reduction::WeightedRate { weight } => self.weighted_rate(docs, weight),
        }
    }

    // Stays integral while every value is an int and the total fits.
    fn sum(&self, docs: &[Document]) -> Result<FieldValue> {
        let mut total = FieldValue::Int(0);
        for doc in docs {
            total = match (total, numeric(doc, &self.field)?) {
                (FieldValue::Int(a), FieldValue::Int(b)) => match a.checked_add(b) {
                    Some(sum) => FieldValue::Int(sum),
                    None => FieldValue::Float(a as f64 + b as f64),
                },
                (acc, value) => FieldValue::Float(
                    acc.as_f64().unwrap_or_default() + value.as_f64().unwrap_or_default(),
                ),
            };
        }
        Ok(total)
    }

    fn weighted_rate(&self, docs: &[Document], weight: &str) -> Result<FieldValue> {
        let mut total = 0.0;
        let mut weighted_total = 0.0;
        for doc in docs {
            let w = as_f64(doc, weight)?;
            total += w;
            weighted_total += as_f64(doc, &self.field)? * w;
        }

        if total == 0.0 {
            return Err(PluginError::AggregationPrecondition(format!(
                "total weight '{}' is zero for rate '{}'",
                weight, self.field
            )));
        }

        Ok(FieldValue::Float(weighted_total / total))
    }
}

/// Build one document for `docs`: the first member's fields with every
/// aggregated field replaced by its reduction.
pub fn make_aggregate(docs: &[Document], values_to_aggregate: &[AggregationRule]) -> Result<Document> {
    let first = docs.first().ok_or_else(|| {
        PluginError::AggregationPrecondition("cannot aggregate an empty group".to_string())
    })?;

    let mut new_doc = first.clone();
    for rule in values_to_aggregate {
        new_doc.insert(rule.field.clone(), rule.reduce(docs)?);
    }
    Ok(new_doc)
}

/// Sort by `key` and split into maximal runs of equal key.
///
/// The sort is stable, so members of a group keep their input order.
pub fn group<K, F>(docs: &[Document], key: F) -> Result<Vec<Vec<Document>>>
where
    K: Ord,
    F: Fn(&Document) -> Result<K>,
{
    let mut keyed = docs
        .iter()
        .map(|doc| Ok((key(doc)?, doc)))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut groups: Vec<Vec<Document>> = Vec::new();
    let mut previous: Option<&K> = None;
    for (k, doc) in &keyed {
        match (previous, groups.last_mut()) {
            (Some(p), Some(current)) if p == k => current.push((*doc).clone()),
            _ => groups.push(vec![(*doc).clone()]),
        }
        previous = Some(k);
    }
    Ok(groups)
}

/// Collapse `docs` into one document per distinct combination of
/// non-aggregated field values.
pub fn aggregate_by_department(
    docs: &[Document],
    values_to_aggregate: &[AggregationRule],
) -> Result<Vec<Document>> {
    let first = docs.first().ok_or_else(|| {
        PluginError::AggregationPrecondition("cannot aggregate an empty document sequence".to_string())
    })?;

    let group_keys: Vec<&String> = first
        .keys()
        .filter(|k| !values_to_aggregate.iter().any(|rule| &rule.field == *k))
        .collect();

    let key = |doc: &Document| -> Result<Vec<FieldValue>> {
        group_keys
            .iter()
            .map(|k| require(doc, k).cloned())
            .collect()
    };

    let groups = group(docs, key)?;
    tracing::debug!(
        "Aggregated {} documents into {} groups on {} key fields",
        docs.len(),
        groups.len(),
        group_keys.len()
    );

    groups
        .iter()
        .map(|grouped| make_aggregate(grouped, values_to_aggregate))
        .collect()
}

/// Plugin form of [`aggregate_by_department`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateKey {
    rules: Vec<AggregationRule>,
}

impl AggregateKey {
    /// An empty rule list falls back to summing `pageviews`.
    pub fn new(rules: Vec<AggregationRule>) -> Self {
        let rules = if rules.is_empty() {
            vec![aggregate_count(DEFAULT_AGGREGATE_FIELD)]
        } else {
            rules
        };
        Self { rules }
    }

    pub fn rules(&self) -> &[AggregationRule] {
        &self.rules
    }
}

impl Default for AggregateKey {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Transform for AggregateKey {
    fn name(&self) -> &'static str {
        "AggregateKey"
    }

    fn apply(&self, documents: &[Document]) -> Result<Vec<Document>> {
        aggregate_by_department(documents, &self.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::document;
    use proptest::prelude::*;

    #[test]
    fn test_make_aggregate_sum() {
        let doc1 = document([("a", 2), ("b", 2), ("c", 2), ("visits", 201)]);
        let doc2 = document([("a", 2), ("b", 2), ("c", 2), ("visits", 103)]);

        let aggregate_doc = make_aggregate(&[doc1, doc2], &[aggregate_count("visits")]).unwrap();

        let expected = document([("a", 2), ("b", 2), ("c", 2), ("visits", 304)]);
        assert_eq!(aggregate_doc, expected);
        assert!(matches!(aggregate_doc["visits"], FieldValue::Int(304)));
    }

    #[test]
    fn test_make_aggregate_rate() {
        let doc1 = document([
            ("a", FieldValue::Int(2)),
            ("visits", FieldValue::Int(100)),
            ("rate", FieldValue::Float(0.25)),
        ]);
        let doc2 = document([
            ("a", FieldValue::Int(2)),
            ("visits", FieldValue::Int(100)),
            ("rate", FieldValue::Float(0.75)),
        ]);

        let aggregate_doc = make_aggregate(
            &[doc1, doc2],
            &[aggregate_count("visits"), aggregate_rate("rate", "visits")],
        )
        .unwrap();

        assert_eq!(aggregate_doc["visits"], FieldValue::Int(200));
        assert_eq!(aggregate_doc["rate"], FieldValue::Float(0.5));
    }

    #[test]
    fn test_rate_uses_weights() {
        let docs = vec![
            document([("visits", FieldValue::Int(30)), ("rate", FieldValue::Float(1.0))]),
            document([("visits", FieldValue::Int(10)), ("rate", FieldValue::Float(0.0))]),
        ];
        let value = aggregate_rate("rate", "visits").reduce(&docs).unwrap();
        assert_eq!(value, FieldValue::Float(0.75));
    }

    #[test]
    fn test_rate_does_not_emit_weight() {
        let docs = vec![
            document([("visits", FieldValue::Int(1)), ("rate", FieldValue::Float(1.0))]),
            document([("visits", FieldValue::Int(3)), ("rate", FieldValue::Float(0.0))]),
        ];
        let aggregate_doc = make_aggregate(&docs, &[aggregate_rate("rate", "visits")]).unwrap();
        assert_eq!(aggregate_doc["visits"], FieldValue::Int(1));
    }

    #[test]
    fn test_zero_weight_is_an_error() {
        let docs = vec![document([("visits", FieldValue::Int(0)), ("rate", FieldValue::Float(0.5))])];
        let result = aggregate_rate("rate", "visits").reduce(&docs);
        assert!(matches!(result, Err(PluginError::AggregationPrecondition(_))));
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            aggregate_by_department(&[], &[aggregate_count("pageviews")]),
            Err(PluginError::AggregationPrecondition(_))
        ));
        assert!(matches!(
            make_aggregate(&[], &[aggregate_count("pageviews")]),
            Err(PluginError::AggregationPrecondition(_))
        ));
    }

    #[test]
    fn test_mixed_int_and_float_sum_is_float() {
        let docs = vec![
            document([("v", FieldValue::Int(1))]),
            document([("v", FieldValue::Float(0.5))]),
        ];
        assert!(matches!(aggregate_count("v").reduce(&docs).unwrap(), FieldValue::Float(f) if f == 1.5));
    }

    #[test]
    fn test_non_numeric_sum_is_malformed() {
        let docs = vec![document([("v", "ten")])];
        assert!(matches!(aggregate_count("v").reduce(&docs), Err(PluginError::MalformedValue { .. })));
    }

    #[test]
    fn test_group_sorts_and_partitions() {
        let docs = vec![
            document([("k", "b"), ("n", "1")]),
            document([("k", "a"), ("n", "2")]),
            document([("k", "b"), ("n", "3")]),
        ];

        let groups = group(&docs, |doc| Ok(doc["k"].clone())).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0][0]["n"], FieldValue::from("2"));
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups[1][0]["n"], FieldValue::from("1"));
        assert_eq!(groups[1][1]["n"], FieldValue::from("3"));
    }

    fn row(department: &str, date: &str, pageviews: i64) -> Document {
        document([
            ("department", FieldValue::from(department)),
            ("date", FieldValue::from(date)),
            ("pageviews", FieldValue::Int(pageviews)),
        ])
    }

    #[test]
    fn test_aggregate_by_department() {
        let docs = vec![
            row("dwp", "2013-04-01", 10),
            row("moj", "2013-04-01", 5),
            row("dwp", "2013-04-01", 7),
            row("dwp", "2013-04-02", 1),
        ];

        let output = AggregateKey::default().apply(&docs).unwrap();

        assert_eq!(
            output,
            vec![
                row("dwp", "2013-04-01", 17),
                row("dwp", "2013-04-02", 1),
                row("moj", "2013-04-01", 5),
            ]
        );
    }

    #[test]
    fn test_missing_group_field_fails_loudly() {
        let docs = vec![
            row("dwp", "2013-04-01", 10),
            document([("date", FieldValue::from("2013-04-01")), ("pageviews", FieldValue::Int(5))]),
        ];
        let result = aggregate_by_department(&docs, &[aggregate_count("pageviews")]);
        assert!(matches!(result, Err(PluginError::MissingField { ref field, .. }) if field == "department"));
    }

    #[test]
    fn test_large_numeric_keys_stay_apart() {
        let two_pow_53: i64 = 1 << 53;
        let keyed = |k: FieldValue| document([("k", k), ("pageviews", FieldValue::Int(1))]);
        let docs = vec![
            keyed(FieldValue::Int(two_pow_53)),
            keyed(FieldValue::Float(two_pow_53 as f64)),
            keyed(FieldValue::Int(two_pow_53 + 1)),
        ];

        let output = aggregate_by_department(&docs, &[aggregate_count("pageviews")]).unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output[0]["k"], FieldValue::Int(two_pow_53));
        assert_eq!(output[0]["pageviews"], FieldValue::Int(2));
        assert!(matches!(output[1]["k"], FieldValue::Int(k) if k == two_pow_53 + 1));
        assert_eq!(output[1]["pageviews"], FieldValue::Int(1));
    }

    #[test]
    fn test_default_rule_sums_pageviews() {
        assert_eq!(AggregateKey::default().rules(), &[aggregate_count("pageviews")]);
    }

    proptest! {
        #[test]
        fn prop_output_has_one_document_per_key(keys in proptest::collection::vec(0u8..5, 1..40)) {
            let docs: Vec<Document> = keys
                .iter()
                .map(|k| document([("k", FieldValue::Int(i64::from(*k))), ("pageviews", FieldValue::Int(1))]))
                .collect();
            let distinct: std::collections::BTreeSet<u8> = keys.iter().copied().collect();

            let output = aggregate_by_department(&docs, &[aggregate_count("pageviews")]).unwrap();

            prop_assert_eq!(output.len(), distinct.len());
        }

        #[test]
        fn prop_sum_is_associative(
            left in proptest::collection::vec(-1000i64..1000, 1..20),
            right in proptest::collection::vec(-1000i64..1000, 1..20),
        ) {
            let to_docs = |values: &[i64]| -> Vec<Document> {
                values.iter().map(|v| document([("k", FieldValue::from("x")), ("v", FieldValue::Int(*v))])).collect()
            };
            let rules = [aggregate_count("v")];

            let mut all = to_docs(&left);
            all.extend(to_docs(&right));
            let whole = aggregate_by_department(&all, &rules).unwrap();

            let mut partials = aggregate_by_department(&to_docs(&left), &rules).unwrap();
            partials.extend(aggregate_by_department(&to_docs(&right), &rules).unwrap());
            let combined = aggregate_by_department(&partials, &rules).unwrap();

            prop_assert_eq!(whole, combined);
        }
    }
}
