//! Integration tests for reconciling consignments into invoices.

mod common;

use common::{decimal, unique_consignment_number, unique_party_name, TestApp};
use reqwest::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use serial_test::serial;

async fn import(app: &TestApp, rows: Vec<Value>) -> Vec<Value> {
    let response = app
        .post_json("/consignments", &json!({ "consignments": rows }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

fn row(party_name: &str, amount: &str, date: &str) -> Value {
    json!({
        "consignment_number": unique_consignment_number(),
        "party_name": party_name,
        "shipment_date": date,
        "weight_grams": 180,
        "origin_address": "Andheri East, Mumbai 400069",
        "destination_address": "Shivajinagar, Pune 411005",
        "calculated_amount": amount
    })
}

fn ids(rows: &[Value]) -> Vec<Value> {
    rows.iter().map(|r| r["consignment_id"].clone()).collect()
}

#[tokio::test]
#[serial]
async fn reconciles_a_single_party_batch() {
    let app = common::spawn_app().await;
    let party = unique_party_name("Acme");
    let mut gst_row = row(&party, "300.00", "2026-03-20");
    gst_row["pricing_meta"] = json!({ "base": "300.00", "gst_pct": "18" });
    let stored = import(
        &app,
        vec![
            row(&party, "100.00", "2026-03-02"),
            row(&format!("  {}  ", party.to_uppercase()), "200.00", "2026-03-11"),
            gst_row,
        ],
    )
    .await;

    let response = app
        .post_json(
            "/invoices/reconcile",
            &json!({ "consignment_ids": ids(&stored), "additional_charges": "25" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();

    let number = created["invoice_number"].as_str().unwrap();
    assert!(number.starts_with("INV-"));
    assert_eq!(number.len(), "INV-202603-00001".len());
    assert_eq!(created["line_count"], 3);
    assert_eq!(decimal(&created["totals"]["subtotal"]), dec!(600));
    assert_eq!(decimal(&created["totals"]["tax_amount"]), dec!(54));
    assert_eq!(decimal(&created["totals"]["total_amount"]), dec!(679));

    let invoice: Value = app
        .get(&format!("/invoices/{}", created["invoice_id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(invoice["lines"].as_array().unwrap().len(), 3);
    assert_eq!(invoice["period_start"], "2026-03-02");
    assert_eq!(invoice["period_end"], "2026-03-20");
    assert_eq!(decimal(&invoice["outstanding_amount"]), dec!(679));
    assert_eq!(invoice["created_by"], "test-operator");
}

#[tokio::test]
#[serial]
async fn resubmitting_an_invoiced_batch_is_rejected() {
    let app = common::spawn_app().await;
    let party = unique_party_name("Acme");
    let stored = import(
        &app,
        vec![
            row(&party, "100.00", "2026-03-02"),
            row(&party, "150.00", "2026-03-03"),
        ],
    )
    .await;
    let body = json!({ "consignment_ids": ids(&stored) });

    let first = app.post_json("/invoices/reconcile", &body).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let invoice: Value = first.json().await.unwrap();

    let second = app.post_json("/invoices/reconcile", &body).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let error: Value = second.json().await.unwrap();
    assert_eq!(error["error_kind"], "ALREADY_INVOICED");
    let listed = error["diagnostics"]["consignments"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&stored[0]["consignment_number"]));

    // Deleting the invoice releases the rows for billing again.
    let response = app
        .delete(&format!("/invoices/{}", invoice["invoice_id"].as_str().unwrap()))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let again = app.post_json("/invoices/reconcile", &body).await;
    assert_eq!(again.status(), StatusCode::CREATED);
}

#[tokio::test]
#[serial]
async fn mixed_party_batch_writes_nothing() {
    let app = common::spawn_app().await;
    let acme = unique_party_name("Acme");
    let globex = unique_party_name("Globex");
    let stored = import(
        &app,
        vec![row(&acme, "100.00", "2026-03-02"), row(&globex, "80.00", "2026-03-02")],
    )
    .await;

    let response = app
        .post_json(
            "/invoices/reconcile",
            &json!({ "consignment_ids": ids(&stored) }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error_kind"], "MIXED_PARTY_BATCH");
    assert_eq!(error["diagnostics"]["parties"].as_array().unwrap().len(), 2);

    // Neither row was linked, so each can still be billed on its own.
    let response = app
        .post_json(
            "/invoices/reconcile",
            &json!({ "consignment_ids": [stored[0]["consignment_id"]] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
#[serial]
async fn party_filter_must_match_the_rows() {
    let app = common::spawn_app().await;
    let acme = unique_party_name("Acme");
    let stored = import(&app, vec![row(&acme, "100.00", "2026-03-02")]).await;

    let response = app
        .post_json(
            "/invoices/reconcile",
            &json!({ "consignment_ids": ids(&stored), "party_name": "Someone Else" }),
        )
        .await;
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error_kind"], "MIXED_PARTY_BATCH");
}

#[tokio::test]
#[serial]
async fn overrides_replace_stored_pricing() {
    let app = common::spawn_app().await;
    let party = unique_party_name("Initech");
    let stored = import(
        &app,
        vec![
            row(&party, "999.00", "2026-03-02"),
            row(&party, "1.00", "2026-03-04"),
        ],
    )
    .await;

    let response = app
        .post_json(
            "/invoices/reconcile",
            &json!({
                "consignment_ids": ids(&stored),
                "overrides": { "base_rate": "50", "fuel_pct": "10", "gst_pct": "18" }
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();

    // Each line: 50 + 5.00 fuel = 55.00, GST 9.90, total 64.90.
    assert_eq!(decimal(&created["totals"]["subtotal"]), dec!(110));
    assert_eq!(decimal(&created["totals"]["tax_amount"]), dec!(19.80));
    assert_eq!(decimal(&created["totals"]["total_amount"]), dec!(129.80));
}

#[tokio::test]
#[serial]
async fn duplicate_consignment_number_rejects_the_upload() {
    let app = common::spawn_app().await;
    let party = unique_party_name("Acme");
    let first = row(&party, "10.00", "2026-03-02");
    let mut duplicate = row(&party, "20.00", "2026-03-02");
    duplicate["consignment_number"] = first["consignment_number"].clone();

    let response = app
        .post_json("/consignments", &json!({ "consignments": [first, duplicate] }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
async fn unknown_consignment_is_not_found() {
    let app = common::spawn_app().await;

    let response = app
        .post_json(
            "/invoices/reconcile",
            &json!({ "consignment_ids": [uuid::Uuid::new_v4()] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn malformed_pricing_meta_is_rejected_at_import() {
    let app = common::spawn_app().await;
    let party = unique_party_name("Globex");
    let mut bad = row(&party, "100.00", "2026-03-11");
    bad["pricing_meta"] = json!({ "gst_pct": "18", "fuel": "8.0 INR" });
    let number = bad["consignment_number"].as_str().unwrap().to_string();

    let response = app
        .post_json("/consignments", &json!({ "consignments": [bad] }))
        .await;
    assert!(response.status().is_client_error());

    let stored: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM consignments WHERE consignment_number = $1")
            .bind(&number)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(stored, 0);
}

#[tokio::test]
#[serial]
async fn sub_paise_additional_charges_are_rejected() {
    let app = common::spawn_app().await;
    let party = unique_party_name("Hooli");
    let stored = import(&app, vec![row(&party, "100.00", "2026-03-12")]).await;

    let response = app
        .post_json(
            "/invoices/reconcile",
            &json!({ "consignment_ids": ids(&stored), "additional_charges": "0.005" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error_kind"], "VALIDATION_FAILED");
}
