//! Integration tests for distance classification over HTTP.
//!
//! These rely on the metro city and state adjacency rows seeded by the
//! reference data migration.

mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};
use serial_test::serial;

async fn classify(app: &common::TestApp, origin: &str, destination: &str) -> (StatusCode, Value) {
    let response = app
        .post_json(
            "/distance/classify",
            &json!({ "origin_address": origin, "destination_address": destination }),
        )
        .await;
    let status = response.status();
    let body = response.json::<Value>().await.expect("Invalid JSON body");
    (status, body)
}

#[tokio::test]
#[serial]
async fn metro_to_metro_is_metro_cities() {
    let app = common::spawn_app().await;

    let (status, body) = classify(
        &app,
        "Flat 4, Andheri East, Mumbai 400069",
        "Shivajinagar, Pune 411005",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "METRO_CITIES");
    assert_eq!(body["title"], "Metro Cities");
    assert_eq!(body["is_metro_pair"], true);
    assert_eq!(body["origin_state"], "MH");
    assert_eq!(body["destination_state"], "MH");
}

#[tokio::test]
#[serial]
async fn non_metro_same_state_is_within_state() {
    let app = common::spawn_app().await;

    let (status, body) = classify(
        &app,
        "12 College Road, Nashik, Maharashtra 422005",
        "Sitabuldi, Nagpur, Maharashtra 440012",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "WITHIN_STATE");
    assert_eq!(body["is_metro_pair"], false);
}

#[tokio::test]
#[serial]
async fn neighbouring_states_are_out_of_state() {
    let app = common::spawn_app().await;

    let (status, body) = classify(
        &app,
        "Ring Road, Surat, Gujarat 395002",
        "College Road, Nashik, Maharashtra 422005",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "OUT_OF_STATE");
    assert_eq!(body["is_neighbor"], true);
}

#[tokio::test]
#[serial]
async fn distant_states_are_other_state() {
    let app = common::spawn_app().await;

    let (status, body) = classify(
        &app,
        "Fraser Road, Patna, Bihar 800001",
        "Marine Drive, Kochi, Kerala 682031",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "OTHER_STATE");
    assert_eq!(body["is_neighbor"], false);
}

#[tokio::test]
#[serial]
async fn unknown_states_report_diagnostics() {
    let app = common::spawn_app().await;

    let (status, body) = classify(&app, "Warehouse 7", "Gate 2").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_kind"], "DISTANCE_CATEGORY_UNRESOLVABLE");
    assert_eq!(body["diagnostics"]["origin_address"], "Warehouse 7");
    assert_eq!(body["diagnostics"]["origin_state"], Value::Null);
}

#[tokio::test]
#[serial]
async fn blank_address_is_rejected() {
    let app = common::spawn_app().await;

    let (status, body) = classify(&app, "", "Pune").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_kind"], "VALIDATION_FAILED");
}

async fn set_pune_metro(app: &common::TestApp, active: bool) {
    sqlx::query("UPDATE metro_cities SET active = $1 WHERE city = 'PUNE'")
        .bind(active)
        .execute(&app.pool)
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
async fn reload_applies_metro_table_edits() {
    let app = common::spawn_app().await;

    let (_, before) = classify(&app, "Andheri, Mumbai", "Kothrud, Pune").await;
    assert_eq!(before["category"], "METRO_CITIES");

    set_pune_metro(&app, false).await;
    let response = app.post_json("/reference/reload", &json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reloaded: Value = response.json().await.unwrap();
    assert_eq!(reloaded["complete"], true);

    let (_, after) = classify(&app, "Andheri, Mumbai", "Kothrud, Pune").await;
    assert_eq!(after["category"], "WITHIN_STATE");

    set_pune_metro(&app, true).await;
    let restored: Value = app
        .post_json("/reference/reload", &json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(
        restored["metro_cities"].as_u64(),
        reloaded["metro_cities"].as_u64().map(|n| n + 1)
    );
}
