//! Integration tests for the core crate.

use std::collections::BTreeMap;

use buildflow_core::api::{BuildList, Selector, WatchEvent};
use buildflow_core::model::{
    Build, BuildOutput, BuildParameters, BuildSource, BuildStatus, BuildStrategy,
    BuildStrategyType, ObjectMeta, Resource,
};

fn sample_build(id: &str, kind: BuildStrategyType) -> Build {
    Build {
        meta: ObjectMeta::named(id),
        parameters: BuildParameters {
            source: BuildSource {
                git_uri: "https://example.com/app.git".into(),
                git_ref: None,
            },
            strategy: BuildStrategy::of(kind),
            output: BuildOutput {
                image_tag: "app:latest".into(),
                registry: None,
            },
        },
        status: BuildStatus::New,
        pod_id: None,
    }
}

#[test]
fn test_strategy_type_serde() {
    let serialized = serde_json::to_string(&BuildStrategyType::Docker).unwrap();
    assert_eq!(serialized, r#""Docker""#);
    let serialized = serde_json::to_string(&BuildStrategyType::Sti).unwrap();
    assert_eq!(serialized, r#""STI""#);

    let parsed: BuildStrategyType = serde_json::from_str(r#""STI""#).unwrap();
    assert_eq!(parsed, BuildStrategyType::Sti);
}

#[test]
fn test_unknown_strategy_type_is_kept() {
    let parsed: BuildStrategyType = serde_json::from_str(r#""Custom""#).unwrap();
    assert_eq!(parsed, BuildStrategyType::Other("Custom".into()));
    assert_eq!(parsed.to_string(), "Custom");
    assert_eq!(serde_json::to_string(&parsed).unwrap(), r#""Custom""#);
}

#[test]
fn test_build_wire_shape() {
    let build = sample_build("b1", BuildStrategyType::Docker);
    let value = serde_json::to_value(&build).unwrap();
    assert_eq!(value["id"], "b1");
    assert_eq!(value["parameters"]["strategy"]["type"], "Docker");
    assert_eq!(value["status"], "new");

    let back: Build = serde_json::from_value(value).unwrap();
    assert_eq!(back, build);
    assert_eq!(back.id(), "b1");
}

#[test]
fn test_watch_event_serde() {
    let event = WatchEvent::Modified(sample_build("b2", BuildStrategyType::Sti));
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "MODIFIED");
    assert_eq!(value["object"]["id"], "b2");

    let back: WatchEvent<Build> = serde_json::from_value(value).unwrap();
    assert_eq!(back.object().id(), "b2");
}

#[test]
fn test_list_defaults_when_fields_missing() {
    let list: BuildList = serde_json::from_str("{}").unwrap();
    assert!(list.items.is_empty());
    assert_eq!(list.resource_version, "");
}

#[test]
fn test_build_list_with_items() {
    let listed = BuildList {
        resource_version: "7".into(),
        items: vec![
            sample_build("b1", BuildStrategyType::Docker),
            sample_build("b2", BuildStrategyType::Sti),
        ],
    };
    let json = serde_json::to_string(&listed).unwrap();
    let back: BuildList = serde_json::from_str(&json).unwrap();
    assert_eq!(back, listed);

    let sparse: BuildList = serde_json::from_str(
        r#"{"items":[{"id":"b3","parameters":{"source":{"git_uri":"https://example.com/b3.git"},"strategy":{"type":"Docker"},"output":{"image_tag":"v1"}}}]}"#,
    )
    .unwrap();
    assert_eq!(sparse.resource_version, "");
    assert_eq!(sparse.items[0].id(), "b3");
    assert_eq!(sparse.items[0].status, BuildStatus::New);
}

#[test]
fn test_selector() {
    let everything = Selector::everything();
    assert!(everything.is_empty());
    assert!(everything.matches(&BTreeMap::new()));
    assert_eq!(everything.to_query(), "");

    let sel = Selector::everything().with("app", "web").with("tier", "build");
    assert_eq!(sel.to_query(), "app=web,tier=build");

    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), "web".to_string());
    assert!(!sel.matches(&labels));
    labels.insert("tier".to_string(), "build".to_string());
    assert!(sel.matches(&labels));
}
