//! Integration tests for loading and running collector pipelines

use collector_plugins::document::documents_from_json;
use collector_plugins::{
    document, load_plugin, FieldValue, Pipeline, PipelineConfig, PluginError, PluginLoader, Transform, Value,
};
use std::fs;
use tempfile::TempDir;

fn analytics_documents() -> Vec<collector_plugins::Document> {
    documents_from_json(
        r#"[
            {"customVarValue9": "<D10>", "date": "2013-04-01", "visits": 100, "rate": 0.25},
            {"customVarValue9": "<D18><D9>", "date": "2013-04-01", "visits": 40, "rate": 0.5},
            {"customVarValue9": "<D10>", "date": "2013-04-01", "visits": 100, "rate": 0.75},
            {"customVarValue9": "<DTHISDOESNOTEXIST>", "date": "2013-04-01", "visits": 3, "rate": 1.0}
        ]"#,
    )
    .unwrap()
}

#[test]
fn test_department_aggregation_pipeline() {
    let loader = PluginLoader::new();
    let pipeline = Pipeline::from_specs(
        &loader,
        [
            "ComputeDepartmentKey(\"customVarValue9\")",
            "RemoveKey(\"customVarValue9\")",
            "AggregateKey(aggregate_count(\"visits\"), aggregate_rate(\"rate\", \"visits\"))",
            "ComputeRank(\"rank\")",
        ],
    )
    .unwrap();

    let output = pipeline.run(analytics_documents()).unwrap();

    assert_eq!(output.len(), 3);

    let departments: Vec<&FieldValue> = output.iter().map(|doc| &doc["department"]).collect();
    assert_eq!(
        departments,
        vec![
            &FieldValue::from("<DTHISDOESNOTEXIST>"),
            &FieldValue::from("department-for-work-pensions"),
            &FieldValue::from("ministry-of-justice"),
        ]
    );

    let dwp = &output[1];
    assert_eq!(dwp["visits"], FieldValue::Int(200));
    assert_eq!(dwp["rate"], FieldValue::Float(0.5));
    assert_eq!(dwp["rank"], FieldValue::Int(2));
    assert!(!dwp.contains_key("customVarValue9"));
}

#[test]
fn test_pipeline_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("pipeline.json");
    fs::write(
        &config_path,
        r#"{"plugins": ["SetDepartment(\"<D9>\")", "ComputeIdFrom(\"date\", \"department\")"]}"#,
    )
    .unwrap();

    let pipeline = PipelineConfig::load_from_file(&config_path).unwrap().build().unwrap();
    let output = pipeline
        .run(vec![document([("date", "2013-04-01")])])
        .unwrap();

    assert_eq!(output[0]["department"], FieldValue::from("department-for-transport"));
    assert_eq!(output[0]["humanId"], FieldValue::from("2013-04-01_department-for-transport"));
    assert!(matches!(output[0]["_id"], FieldValue::String(ref id) if !id.is_empty()));
}

#[test]
fn test_identifier_ignores_timezone_offset() {
    let plugin = PluginLoader::new().load_transform("ComputeIdFrom('timestamp')").unwrap();
    let docs = documents_from_json(
        r#"[{"timestamp": "2013-04-01T12:00:00+02:00"}, {"timestamp": "2013-04-01T10:00:00Z"}]"#,
    )
    .unwrap();

    let output = plugin.apply(&docs).unwrap();

    assert_eq!(output[0]["humanId"], FieldValue::from("20130401100000"));
    assert_eq!(output[0]["_id"], output[1]["_id"]);
}

#[test]
fn test_loader_error_taxonomy() {
    assert_eq!(load_plugin("1").unwrap(), Value::Scalar(FieldValue::Int(1)));
    assert!(matches!(load_plugin("NotRegistered(\"x\")"), Err(PluginError::NameResolution { .. })));
    assert!(matches!(load_plugin("ComputeRank(\"rank\""), Err(PluginError::Syntax { .. })));
}

#[test]
fn test_missing_department_field_stops_pipeline() {
    let pipeline = Pipeline::from_specs(&PluginLoader::new(), ["ComputeDepartmentKey(\"key_name\")"]).unwrap();
    let result = pipeline.run(vec![document([("foo", "<D10>")])]);
    assert!(matches!(result, Err(PluginError::MissingField { .. })));
}

#[test]
fn test_zero_weight_group_fails() {
    let pipeline = Pipeline::from_specs(
        &PluginLoader::new(),
        ["AggregateKey(aggregate_rate(\"rate\", \"visits\"))"],
    )
    .unwrap();
    let docs = documents_from_json(r#"[{"page": "/", "visits": 0, "rate": 0.5}]"#).unwrap();

    assert!(matches!(pipeline.run(docs), Err(PluginError::AggregationPrecondition(_))));
}
