//! Integration tests for the invoice lifecycle: numbering, finalization,
//! credit notes and the overdue sweep.

mod common;

use chrono::{Days, Utc};
use common::{current_year, spawn_app};
use reqwest::StatusCode;
use serde_json::json;
use serial_test::serial;
use std::collections::HashSet;
use tokio::task::JoinSet;
use uuid::Uuid;

#[tokio::test]
async fn new_invoice_is_numbered_and_totalled() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;

    let invoice = app.create_invoice(&client_id).await;

    assert_eq!(invoice["subtotal"], "2250.00");
    assert_eq!(invoice["vatAmount"], "450.00");
    assert_eq!(invoice["total"], "2700.00");
    assert_eq!(invoice["invoiceNumber"], format!("FAC-{}-0001", current_year()));
    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["paymentStatus"], "unpaid");
    assert_eq!(invoice["isFinalized"], false);
    assert_eq!(invoice["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn numbers_increase_in_creation_order() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let year = current_year();

    for expected in 1..=3 {
        let invoice = app.create_invoice(&client_id).await;
        assert_eq!(invoice["invoiceNumber"], format!("FAC-{year}-{expected:04}"));
    }

    // Each user has their own sequence.
    let other = app.as_other_user();
    let other_client = other.create_client("Globex").await;
    let invoice = other.create_invoice(&other_client).await;
    assert_eq!(invoice["invoiceNumber"], format!("FAC-{year}-0001"));
}

#[tokio::test]
#[serial]
async fn concurrent_creations_get_distinct_numbers() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let app = app.clone();
        let client_id = client_id.clone();
        tasks.spawn(async move { app.create_invoice(&client_id).await });
    }

    let mut numbers = HashSet::new();
    while let Some(invoice) = tasks.join_next().await {
        let invoice = invoice.unwrap();
        numbers.insert(invoice["invoiceNumber"].as_str().unwrap().to_string());
    }

    let year = current_year();
    let expected: HashSet<String> = (1..=8).map(|seq| format!("FAC-{year}-{seq:04}")).collect();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn finalized_invoice_rejects_edits() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_finalized_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    assert_eq!(invoice["isFinalized"], true);
    assert!(invoice["finalizedAt"].is_string());

    let (status, body) = app
        .put(
            &format!("/invoices/{id}"),
            json!({ "items": [{ "description": "Dev", "quantity": 6, "unitPrice": 450 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("finalisée"));

    let (status, _) = app.post_empty(&format!("/invoices/{id}/finalize")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/invoices/{id}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, stored) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(stored["total"], "2700.00");
}

#[tokio::test]
async fn draft_cannot_be_finalized() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    let (status, body) = app.post_empty(&format!("/invoices/{id}/finalize")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn draft_update_replaces_items_and_recomputes_totals() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    let (status, body) = app
        .put(
            &format!("/invoices/{id}"),
            json!({
                "items": [
                    { "description": "Dev", "quantity": 2, "unitPrice": 450 },
                    { "description": "Recette", "quantity": 1, "unitPrice": 300, "discount": 50 }
                ],
                "notes": "Paiement à 30 jours"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["subtotal"], "1050.00");
    assert_eq!(body["vatAmount"], "210.00");
    assert_eq!(body["total"], "1260.00");
    assert_eq!(body["notes"], "Paiement à 30 jours");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["invoiceNumber"], invoice["invoiceNumber"]);
}

#[tokio::test]
async fn credit_note_negates_the_invoice() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_finalized_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    let (status, credit) = app.post_empty(&format!("/invoices/{id}/credit-note")).await;
    assert_eq!(status, StatusCode::CREATED, "{credit}");

    assert_eq!(credit["invoiceType"], "credit_note");
    assert_eq!(credit["invoiceNumber"], format!("AV-{}-0001", current_year()));
    assert_eq!(credit["total"], "-2700.00");
    assert_eq!(credit["subtotal"], "-2250.00");
    assert_eq!(credit["isFinalized"], true);
    assert_eq!(credit["relatedInvoiceId"], id);
    assert_eq!(
        credit["description"],
        format!("Avoir sur facture {}", invoice["invoiceNumber"].as_str().unwrap())
    );

    let items = credit["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["unitPrice"], "-450.00");
    assert_eq!(items[0]["total"], "-2250.00");
    assert_eq!(items[0]["quantity"], invoice["items"][0]["quantity"]);

    let (_, original) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(original["total"], "2700.00");

    // A credit note cannot itself be credited or edited.
    let credit_id = credit["id"].as_str().unwrap();
    let (status, _) = app.post_empty(&format!("/invoices/{credit_id}/credit-note")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.put(&format!("/invoices/{credit_id}"), json!({ "notes": "x" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn draft_without_payments_can_be_deleted() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    let (status, body) = app.delete(&format!("/invoices/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["id"], id);

    let (status, _) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_transitions_follow_the_workflow() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    // draft -> paid skips sending.
    let (status, _) = app.put(&format!("/invoices/{id}"), json!({ "status": "paid" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.put(&format!("/invoices/{id}"), json!({ "status": "sent" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.put(&format!("/invoices/{id}"), json!({ "status": "paid" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "paid");
    assert_eq!(body["paymentStatus"], "paid");
    assert!(body["paidAt"].is_string());

    // Settling recorded the balance as a payment.
    let (_, payments) = app.get(&format!("/payments/invoice/{id}")).await;
    assert_eq!(payments["summary"]["totalPaid"], "2700.00");
    assert_eq!(payments["summary"]["balanceDue"], "0.00");
}

#[tokio::test]
async fn cancelling_is_refused_once_payments_exist() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();
    app.put(&format!("/invoices/{id}"), json!({ "status": "sent" })).await;

    let (status, _) = app
        .post("/payments", json!({ "invoiceId": id, "amount": 100 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .put(&format!("/invoices/{id}"), json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_by_type_and_status() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let finalized = app.create_finalized_invoice(&client_id).await;
    app.create_invoice(&client_id).await;
    let id = finalized["id"].as_str().unwrap();
    app.post_empty(&format!("/invoices/{id}/credit-note")).await;

    let (_, all) = app.get("/invoices").await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, drafts) = app.get("/invoices?status=draft").await;
    assert_eq!(drafts.as_array().unwrap().len(), 1);

    let (_, credit_notes) = app.get("/invoices?invoiceType=credit_note").await;
    let credit_notes = credit_notes.as_array().unwrap();
    assert_eq!(credit_notes.len(), 1);
    assert_eq!(credit_notes[0]["relatedInvoiceId"], id);

    let (status, _) = app.get("/invoices?status=archived").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mark_overdue_flags_past_due_invoices() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();
    app.put(&format!("/invoices/{id}"), json!({ "status": "sent" })).await;
    let fresh = app.create_invoice(&client_id).await;
    let fresh_id = fresh["id"].as_str().unwrap();
    app.put(&format!("/invoices/{fresh_id}"), json!({ "status": "sent" })).await;

    let today = Utc::now().date_naive();
    let issued = today.checked_sub_days(Days::new(45)).unwrap();
    let due = today.checked_sub_days(Days::new(15)).unwrap();
    sqlx::query("UPDATE invoices SET issue_date = $1, due_date = $2 WHERE id = $3")
        .bind(issued)
        .bind(due)
        .bind(Uuid::parse_str(id).unwrap())
        .execute(app.db.pool())
        .await
        .unwrap();

    let (status, body) = app.post_empty("/invoices/mark-overdue").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);

    let (_, overdue) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(overdue["status"], "overdue");
    assert_eq!(overdue["paymentStatus"], "overdue");

    let (_, untouched) = app.get(&format!("/invoices/{fresh_id}")).await;
    assert_eq!(untouched["status"], "sent");

    // A second sweep has nothing left to do.
    let (_, body) = app.post_empty("/invoices/mark-overdue").await;
    assert_eq!(body["updated"], 0);
}

#[tokio::test]
async fn invoices_are_scoped_to_their_owner() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    let intruder = app.as_other_user();
    let (status, body) = intruder.get(&format!("/invoices/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = intruder.delete(&format!("/invoices/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Someone else's client cannot be invoiced either.
    let (status, _) = intruder
        .post(
            "/invoices",
            json!({
                "clientId": client_id,
                "items": [{ "description": "Dev", "quantity": 1, "unitPrice": 100 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn requests_without_user_are_unauthorized() {
    let Some(app) = spawn_app().await else { return };

    let resp = app
        .http
        .get(format!("{}/invoices", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn malformed_input_uses_the_error_envelope() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;

    let (status, body) = app.get("/invoices/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, body) = app
        .post("/invoices", json!({ "clientId": client_id, "items": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app
        .post(
            "/invoices",
            json!({
                "clientId": client_id,
                "items": [{ "description": "Dev", "quantity": 1, "unitPrice": -5 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let resp = app
        .request(reqwest::Method::POST, "/invoices")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn amounts_beyond_stored_precision_are_rejected() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;

    let rejected = [
        json!({ "description": "Dev", "quantity": "0.0004", "unitPrice": "100000.00" }),
        json!({ "description": "Dev", "quantity": "1.0005", "unitPrice": 1000 }),
        json!({ "description": "Dev", "quantity": 1000000000, "unitPrice": "0.01" }),
        json!({ "description": "Dev", "quantity": 1, "unitPrice": 100, "discount": "10.125" }),
    ];
    for item in rejected {
        let (status, body) = app
            .post("/invoices", json!({ "clientId": client_id, "items": [item] }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(body["error"].is_string());
    }

    let (status, body) = app
        .post(
            "/invoices",
            json!({
                "clientId": client_id,
                "vatRate": "5.555",
                "items": [{ "description": "Dev", "quantity": 1, "unitPrice": 1000 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, invoice) = app
        .post(
            "/invoices",
            json!({
                "clientId": client_id,
                "vatRate": "5.5",
                "items": [{ "description": "Dev", "quantity": "1.125", "unitPrice": 1000 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{invoice}");
    assert_eq!(invoice["subtotal"], "1125.00");
    assert_eq!(invoice["vatAmount"], "61.88");
    assert_eq!(invoice["total"], "1186.88");
}
