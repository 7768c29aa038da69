//! Integration tests for payment recording and reconciliation.

mod common;

use common::spawn_app;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn full_payment_settles_and_deleting_it_reverts() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_finalized_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    let (status, payment) = app
        .post(
            "/payments",
            json!({ "invoiceId": id, "amount": "2700.00", "method": "bank_transfer", "reference": "VIR-42" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{payment}");
    assert_eq!(payment["amount"], "2700.00");
    assert_eq!(payment["method"], "bank_transfer");

    let (_, paid) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(paid["paymentStatus"], "paid");
    assert_eq!(paid["status"], "paid");
    assert!(paid["paidAt"].is_string());

    let payment_id = payment["id"].as_str().unwrap();
    let (status, body) = app.delete(&format!("/payments/{payment_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, reverted) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(reverted["paymentStatus"], "unpaid");
    assert_eq!(reverted["status"], "sent");
    assert!(reverted["paidAt"].is_null());
}

#[tokio::test]
async fn removing_the_payment_of_an_unsent_invoice_restores_the_draft() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();
    assert!(invoice["sentAt"].is_null());

    let (status, payment) = app
        .post("/payments", json!({ "invoiceId": id, "amount": "2700.00" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{payment}");

    let (_, paid) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(paid["status"], "paid");

    let payment_id = payment["id"].as_str().unwrap();
    let (status, _) = app.delete(&format!("/payments/{payment_id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, reverted) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(reverted["status"], "draft");
    assert_eq!(reverted["paymentStatus"], "unpaid");

    let (status, _) = app.post_empty(&format!("/invoices/{id}/finalize")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn overpayment_by_one_cent_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_finalized_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    let (status, body) = app
        .post("/payments", json!({ "invoiceId": id, "amount": 2700.01 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("2700.00"));

    let (_, unchanged) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(unchanged["paymentStatus"], "unpaid");
    assert_eq!(unchanged["status"], "sent");

    let (_, payments) = app.get(&format!("/payments/invoice/{id}")).await;
    assert!(payments["payments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn partial_payments_accumulate_to_paid() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_finalized_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    let (status, _) = app
        .post("/payments", json!({ "invoiceId": id, "amount": 1000, "method": "check" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, partial) = app.get(&format!("/payments/invoice/{id}")).await;
    assert_eq!(partial["summary"]["invoiceTotal"], "2700.00");
    assert_eq!(partial["summary"]["totalPaid"], "1000.00");
    assert_eq!(partial["summary"]["balanceDue"], "1700.00");

    let (_, invoice) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(invoice["paymentStatus"], "partial");
    assert_eq!(invoice["status"], "sent");

    let (status, _) = app
        .post("/payments", json!({ "invoiceId": id, "amount": "1700.00", "method": "card" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, settled) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(settled["paymentStatus"], "paid");
    assert_eq!(settled["status"], "paid");

    let (status, _) = app
        .post("/payments", json!({ "invoiceId": id, "amount": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn payments_are_refused_on_credit_notes_and_bad_amounts() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_finalized_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    let (_, credit) = app.post_empty(&format!("/invoices/{id}/credit-note")).await;
    let credit_id = credit["id"].as_str().unwrap();
    let (status, _) = app
        .post("/payments", json!({ "invoiceId": credit_id, "amount": 10 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/payments", json!({ "invoiceId": id, "amount": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/payments", json!({ "invoiceId": id, "amount": 10, "method": "bitcoin" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let intruder = app.as_other_user();
    let (status, _) = intruder
        .post("/payments", json!({ "invoiceId": id, "amount": 10 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn legacy_status_route_goes_through_payments() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_finalized_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();
    let path = format!("/invoices/{id}/payment");

    let (status, _) = app.put(&path, json!({ "paymentStatus": "partial" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(&path, json!({ "paymentStatus": "partial", "paidAmount": 700 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["paymentStatus"], "partial");

    let (status, _) = app.put(&path, json!({ "paymentStatus": "unpaid" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.put(&path, json!({ "paymentStatus": "overdue" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "overdue");
    assert_eq!(body["paymentStatus"], "overdue");

    let (status, body) = app.put(&path, json!({ "paymentStatus": "paid" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["paymentStatus"], "paid");
    assert!(body["paidAt"].is_string());

    let (_, payments) = app.get(&format!("/payments/invoice/{id}")).await;
    let recorded = payments["payments"].as_array().unwrap();
    assert_eq!(recorded.len(), 2);
    assert_eq!(payments["summary"]["balanceDue"], "0.00");
}

#[tokio::test]
async fn overdue_stays_overdue_until_settled() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let invoice = app.create_finalized_invoice(&client_id).await;
    let id = invoice["id"].as_str().unwrap();

    app.put(&format!("/invoices/{id}/payment"), json!({ "paymentStatus": "overdue" }))
        .await;

    let (status, payment) = app
        .post("/payments", json!({ "invoiceId": id, "amount": 500 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, still_overdue) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(still_overdue["paymentStatus"], "overdue");
    assert_eq!(still_overdue["status"], "overdue");

    let payment_id = payment["id"].as_str().unwrap();
    app.delete(&format!("/payments/{payment_id}")).await;
    let (_, after_delete) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(after_delete["paymentStatus"], "overdue");

    app.post("/payments", json!({ "invoiceId": id, "amount": 2700 }))
        .await;
    let (_, settled) = app.get(&format!("/invoices/{id}")).await;
    assert_eq!(settled["paymentStatus"], "paid");
    assert_eq!(settled["status"], "paid");
}

#[tokio::test]
async fn payment_list_and_treasury_stats() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    let first = app.create_finalized_invoice(&client_id).await;
    let second = app.create_finalized_invoice(&client_id).await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    app.post("/payments", json!({ "invoiceId": first_id, "amount": 2700 }))
        .await;
    app.post("/payments", json!({ "invoiceId": second_id, "amount": 200 }))
        .await;
    app.put(
        &format!("/invoices/{second_id}/payment"),
        json!({ "paymentStatus": "overdue" }),
    )
    .await;

    let (status, payments) = app.get("/payments").await;
    assert_eq!(status, StatusCode::OK);
    let payments = payments.as_array().unwrap();
    assert_eq!(payments.len(), 2);
    assert!(payments.iter().all(|p| p["invoiceNumber"].is_string()));

    let (status, stats) = app.get("/payments/stats").await;
    assert_eq!(status, StatusCode::OK, "{stats}");
    assert_eq!(stats["collectedThisMonth"], "2900.00");
    assert_eq!(stats["invoicedThisMonth"], "5400.00");
    assert_eq!(stats["outstanding"], "0.00");
    assert_eq!(stats["overdue"]["count"], 1);
    assert_eq!(stats["overdue"]["amount"], "2500.00");
    assert_eq!(stats["recentPayments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_payment_cannot_be_deleted() {
    let Some(app) = spawn_app().await else { return };

    let (status, body) = app
        .delete(&format!("/payments/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Paiement introuvable");
}
