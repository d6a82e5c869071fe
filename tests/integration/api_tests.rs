//! API integration tests
//!
//! These run against a live server with a seeded database:
//! `cargo run` in one shell, then `cargo test -- --ignored`.
//! Seed expectations: org TEST_ORG, librarian L0001, students S0001..S0003
//! with no open loans, items B-0001 and B-0002 available (B-0002 being the
//! only copy of title TITLE_B2), no holds on either title, pickup location
//! LOC_MAIN active.

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const ORG_ID: &str = "00000000-0000-0000-0000-000000000001";
const LIBRARIAN_ID: &str = "00000000-0000-0000-0000-000000000101";
const LOC_MAIN: &str = "00000000-0000-0000-0000-000000000201";
const TITLE_B2: &str = "00000000-0000-0000-0000-000000000302";

fn client() -> Client {
    Client::new()
}

async fn get_json(client: &Client, path: &str) -> Value {
    let response = client
        .get(format!("{}{}", BASE_URL, path))
        .header("X-Org-Id", ORG_ID)
        .send()
        .await
        .expect("Failed to send request");
    response.json().await.expect("Failed to parse response")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let response = client()
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_missing_org_header_is_rejected() {
    let response = client()
        .get(format!("{}/loans", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_checkout_then_checkin_roundtrip() {
    let client = client();

    let response = client
        .post(format!("{}/circulation/checkout", BASE_URL))
        .header("X-Org-Id", ORG_ID)
        .json(&json!({
            "actor_user_id": LIBRARIAN_ID,
            "borrower_external_id": "S0001",
            "item_barcode": "B-0001"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(loan["status"], "open");
    assert!(loan["due_at"].is_string());

    // A second checkout of the same copy must conflict with no side effects.
    let response = client
        .post(format!("{}/circulation/checkout", BASE_URL))
        .header("X-Org-Id", ORG_ID)
        .json(&json!({
            "actor_user_id": LIBRARIAN_ID,
            "borrower_external_id": "S0002",
            "item_barcode": "B-0001"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "ItemNotAvailable");

    let response = client
        .post(format!("{}/circulation/checkin", BASE_URL))
        .header("X-Org-Id", ORG_ID)
        .json(&json!({
            "actor_user_id": LIBRARIAN_ID,
            "item_barcode": "B-0001"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["loan"]["status"], "closed");
    // No queue on this title, so the copy goes back to the shelf.
    assert_eq!(body["item_status"], "available");
    assert!(body["assigned_hold"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_hold_queue_fifo_assignment() {
    let client = client();

    // Check the copy out so the holds queue up instead of going ready.
    let response = client
        .post(format!("{}/circulation/checkout", BASE_URL))
        .header("X-Org-Id", ORG_ID)
        .json(&json!({
            "actor_user_id": LIBRARIAN_ID,
            "borrower_external_id": "S0001",
            "item_barcode": "B-0002"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse response");

    // Two holds placed in order by different borrowers.
    for ext in ["S0002", "S0003"] {
        let response = client
            .post(format!("{}/holds", BASE_URL))
            .header("X-Org-Id", ORG_ID)
            .json(&json!({
                "borrower_external_id": ext,
                "bibliographic_id": TITLE_B2,
                "pickup_location_id": LOC_MAIN
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 201);
        let hold: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(hold["status"], "queued");
    }

    // Renewal is blocked while the queue is non-empty.
    let response = client
        .post(format!(
            "{}/loans/{}/renew",
            BASE_URL,
            loan["id"].as_str().unwrap()
        ))
        .header("X-Org-Id", ORG_ID)
        .json(&json!({ "actor_user_id": LIBRARIAN_ID }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "RenewBlockedByQueue");

    // Checkin hands the copy to the first hold, not the second.
    let response = client
        .post(format!("{}/circulation/checkin", BASE_URL))
        .header("X-Org-Id", ORG_ID)
        .json(&json!({
            "actor_user_id": LIBRARIAN_ID,
            "item_barcode": "B-0002"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["item_status"], "on_hold");
    assert!(body["assigned_hold"]["ready_until"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_expire_ready_preview_reports_candidates_only() {
    let client = client();

    let response = client
        .post(format!("{}/maintenance/holds/expire-ready", BASE_URL))
        .header("X-Org-Id", ORG_ID)
        .json(&json!({
            "actor_user_id": LIBRARIAN_ID,
            "mode": "preview"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let summary: Value = response.json().await.expect("Failed to parse response");
    assert!(summary["candidates_total"].is_number());
    assert_eq!(summary["processed"], 0);
    assert_eq!(summary["transferred"], 0);
    assert_eq!(summary["released"], 0);
}

#[tokio::test]
#[ignore]
async fn test_enqueue_expiry_job_and_poll_status() {
    let client = client();

    let response = client
        .post(format!("{}/jobs/expire-ready-holds", BASE_URL))
        .header("X-Org-Id", ORG_ID)
        .json(&json!({
            "actor_user_id": LIBRARIAN_ID,
            "limit": 50,
            "note": "integration test sweep"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 202);
    let job: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(job["kind"], "expire_ready_holds");
    assert_eq!(job["status"], "queued");
    assert_eq!(job["attempts"], 0);

    let job_id = job["id"].as_str().unwrap();
    let fetched = get_json(&client, &format!("/jobs/{}", job_id)).await;
    assert_eq!(fetched["id"], job["id"]);
}
