// tests/discovery_test.rs
// Discovery routing and category-resolution degradation through the
// full pipeline.


use medstack::config::EngineConfig;
use medstack::engine::decision::RoutedAction;
use medstack::engine::envelope::{ResultType, Status};
use medstack::engine::CompatibilityEngine;
use medstack::error::EngineError;

use test_helpers::*;

use medstack::engine::input::{QueryMode, QueryStructure, ResponseFraming};

fn engine() -> CompatibilityEngine {
    CompatibilityEngine::new(EngineConfig::default())
}

fn five_micro_catalog() -> StaticCatalog {
    snapshot(vec![
        guide("navien-072", 0.070),
        micro("micro-a", 0.074),
        micro("micro-b", 0.021),
        micro("micro-c", 0.053),
        micro("micro-d", 0.090),
        micro("micro-e", 0.070),
    ])
}

fn discovery_request(anchor: &str, category: &str) -> medstack::engine::input::EngineInput {
    let mut input = named_request(
        &[anchor],
        classification(
            QueryMode::Discovery,
            ResponseFraming::Neutral,
            QueryStructure::NamedPlusCategory,
        ),
    );
    input.categories = vec![category.to_string()];
    input
}

#[tokio::test]
async fn test_discovery_returns_passing_members_ascending_by_od() {
    // 5 category members, 3 with OD at or under the 0.070 in anchor bore.
    let env = engine()
        .run(
            &discovery_request("navien-072", "microcatheter"),
            &five_micro_catalog(),
        )
        .await
        .expect("pipeline");

    assert_eq!(env.status, Status::Complete);
    assert_eq!(env.result_type, ResultType::DeviceDiscovery);
    assert_eq!(env.action, Some(RoutedAction::RunDiscovery));
    assert!(env.configurations.is_empty());
    assert_eq!(env.candidates_considered, 5);
    assert_eq!(env.discovery_category.as_deref(), Some("microcatheter"));

    let matches = env.discovery.expect("discovery payload");
    let ids: Vec<_> = matches
        .iter()
        .map(|m| m.device.label().to_string())
        .collect();
    assert_eq!(ids, vec!["micro-b", "micro-c", "micro-e"]);
    assert!(matches
        .iter()
        .all(|m| m.junctions.iter().all(|j| j.passed)));
}

#[tokio::test]
async fn test_discovery_serializes_as_device_list() {
    // Consumers receive `discovery` as an array of device records; the
    // certification keys ride along on each element.
    let env = engine()
        .run(
            &discovery_request("navien-072", "microcatheter"),
            &five_micro_catalog(),
        )
        .await
        .expect("pipeline");

    let v = serde_json::to_value(&env).expect("serialize");
    let list = v["discovery"].as_array().expect("device array");
    assert_eq!(list.len(), 3);
    assert_eq!(list[0]["id"], "micro-b");
    assert_eq!(list[0]["category_type"], "microcatheter");
    assert!(list[0]["junctions"].as_array().is_some());
    assert_eq!(v["discovery_category"], "microcatheter");
    assert_eq!(v["candidates_considered"], 5);
}

#[tokio::test]
async fn test_discovery_without_anchor_needs_clarification() {
    let mut input = named_request(
        &[],
        classification(
            QueryMode::Discovery,
            ResponseFraming::Neutral,
            QueryStructure::CategoryOnly,
        ),
    );
    input.categories = vec!["microcatheter".to_string()];

    let env = engine()
        .run(&input, &five_micro_catalog())
        .await
        .expect("pipeline");
    assert_eq!(env.status, Status::NeedsClarification);
    assert!(env.note.expect("note").contains("anchor"));
}

#[tokio::test]
async fn test_unknown_discovery_category_needs_clarification() {
    let env = engine()
        .run(
            &discovery_request("navien-072", "pacemaker lead"),
            &five_micro_catalog(),
        )
        .await
        .expect("pipeline");
    assert_eq!(env.status, Status::NeedsClarification);
    assert!(env.note.expect("note").contains("pacemaker lead"));
}

#[tokio::test]
async fn test_unknown_category_in_generation_needs_clarification() {
    let mut input = named_request(
        &["navien-072"],
        classification(
            QueryMode::Specific,
            ResponseFraming::Neutral,
            QueryStructure::NamedPlusCategory,
        ),
    );
    input.categories = vec!["pacemaker lead".to_string()];

    let env = engine()
        .run(&input, &five_micro_catalog())
        .await
        .expect("pipeline");
    assert_eq!(env.status, Status::NeedsClarification);
    assert_eq!(env.result_type, ResultType::CompatibilityCheck);
    assert!(env.configurations.is_empty());
}

#[tokio::test]
async fn test_unknown_catalog_id_is_an_input_error() {
    let input = named_request(
        &["ghost-device"],
        classification(
            QueryMode::Specific,
            ResponseFraming::Neutral,
            QueryStructure::SingleDevice,
        ),
    );
    let err = engine()
        .run(&input, &five_micro_catalog())
        .await
        .expect_err("unknown id");
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn test_discovery_manufacturer_filter_narrows_matches() {
    let mut input = discovery_request("navien-072", "microcatheter");
    input.discovery_filters.manufacturer = Some("Someone Else".to_string());

    let env = engine()
        .run(&input, &five_micro_catalog())
        .await
        .expect("pipeline");
    assert_eq!(env.status, Status::Complete);
    assert!(env.discovery.expect("discovery payload").is_empty());
}

#[tokio::test]
async fn test_discovery_dimension_filters_narrow_matches() {
    // Every microcatheter here has a 0.017 in bore (0.4318 mm) and a
    // 1500 mm working length; floors just above exclude all of them.
    let mut input = discovery_request("navien-072", "microcatheter");
    input.discovery_filters.min_id_mm = Some(0.5);
    let env = engine()
        .run(&input, &five_micro_catalog())
        .await
        .expect("pipeline");
    assert!(env.discovery.expect("discovery payload").is_empty());

    let mut input = discovery_request("navien-072", "microcatheter");
    input.discovery_filters.min_id_mm = Some(0.4);
    let env = engine()
        .run(&input, &five_micro_catalog())
        .await
        .expect("pipeline");
    assert_eq!(env.discovery.expect("discovery payload").len(), 3);

    let mut input = discovery_request("navien-072", "microcatheter");
    input.discovery_filters.min_length_mm = Some(1600.0);
    let env = engine()
        .run(&input, &five_micro_catalog())
        .await
        .expect("pipeline");
    assert!(env.discovery.expect("discovery payload").is_empty());
}

#[tokio::test]
async fn test_prior_results_anchor_discovery() {
    // No named devices, but a prior filtering step already settled on
    // the guide; its id anchors the search instead of clarifying.
    let mut input = named_request(
        &[],
        classification(
            QueryMode::Discovery,
            ResponseFraming::Neutral,
            QueryStructure::CategoryOnly,
        ),
    );
    input.categories = vec!["microcatheter".to_string()];
    input.prior_device_ids = vec!["navien-072".to_string()];

    let env = engine()
        .run(&input, &five_micro_catalog())
        .await
        .expect("pipeline");
    assert_eq!(env.status, Status::Complete);
    assert_eq!(env.discovery.expect("discovery payload").len(), 3);
}

#[tokio::test]
async fn test_exploratory_category_query_still_generates() {
    // Exploratory mode with a category slot goes through generation, not
    // discovery: the envelope carries configurations.
    let mut input = named_request(
        &["navien-072"],
        classification(
            QueryMode::Exploratory,
            ResponseFraming::Neutral,
            QueryStructure::NamedPlusCategory,
        ),
    );
    input.categories = vec!["microcatheter".to_string()];

    let env = engine()
        .run(&input, &five_micro_catalog())
        .await
        .expect("pipeline");
    assert_eq!(env.result_type, ResultType::CompatibilityCheck);
    assert!(env.discovery.is_none());
    assert_eq!(env.configurations.len(), 5);
}
