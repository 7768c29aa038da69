//! Integration tests for clients, document settings and service endpoints.

mod common;

use common::spawn_app;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn client_revenue_counts_issued_documents() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;

    let (_, fresh) = app.get(&format!("/clients/{client_id}")).await;
    assert_eq!(fresh["clientType"], "company");
    assert_eq!(fresh["status"], "active");
    assert_eq!(fresh["totalRevenue"], "0.00");
    assert_eq!(fresh["invoiceCount"], 0);

    app.create_finalized_invoice(&client_id).await;
    app.create_finalized_invoice(&client_id).await;
    app.create_invoice(&client_id).await;

    let (_, client) = app.get(&format!("/clients/{client_id}")).await;
    assert_eq!(client["totalRevenue"], "5400.00");
    assert_eq!(client["invoiceCount"], 2);
}

#[tokio::test]
async fn parent_company_must_be_a_company() {
    let Some(app) = spawn_app().await else { return };
    let company = app.create_client("Acme SAS").await;

    let (status, contact) = app
        .post(
            "/clients",
            json!({ "name": "Jeanne Martin", "clientType": "individual", "parentCompanyId": company }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{contact}");
    assert_eq!(contact["parentCompanyId"], company);
    let contact_id = contact["id"].as_str().unwrap();

    let (status, _) = app
        .post("/clients", json!({ "name": "Paul", "parentCompanyId": contact_id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(&format!("/clients/{company}"), json!({ "parentCompanyId": company }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, detached) = app
        .put(&format!("/clients/{contact_id}"), json!({ "parentCompanyId": null }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(detached["parentCompanyId"].is_null());
    assert_eq!(detached["name"], "Jeanne Martin");
}

#[tokio::test]
async fn client_with_documents_cannot_be_deleted() {
    let Some(app) = spawn_app().await else { return };
    let client_id = app.create_client("Acme SAS").await;
    app.create_quote(&client_id).await;

    let (status, body) = app.delete(&format!("/clients/{client_id}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let unused = app.create_client("Initech").await;
    let (status, body) = app.delete(&format!("/clients/{unused}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, clients) = app.get("/clients").await;
    assert_eq!(clients.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn client_validation_errors_are_bad_requests() {
    let Some(app) = spawn_app().await else { return };

    let (status, body) = app.post("/clients", json!({ "name": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .post("/clients", json!({ "name": "Acme", "email": "nope" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_are_created_lazily_and_patched() {
    let Some(app) = spawn_app().await else { return };

    let (status, settings) = app.get("/settings").await;
    assert_eq!(status, StatusCode::OK, "{settings}");
    assert!(settings["companyName"].is_null());

    let (status, updated) = app
        .put(
            "/settings",
            json!({
                "companyName": "Studio Dupont",
                "iban": "FR7630006000011234567890189",
                "theme": { "primaryColor": "#1d4ed8", "template": "classic" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["companyName"], "Studio Dupont");
    assert_eq!(updated["theme"]["template"], "classic");

    let (_, patched) = app.put("/settings", json!({ "footer": "Merci !" })).await;
    assert_eq!(patched["companyName"], "Studio Dupont");
    assert_eq!(patched["footer"], "Merci !");

    let (status, _) = app.put("/settings", json!({ "theme": "blue" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_and_metrics_endpoints() {
    let Some(app) = spawn_app().await else { return };

    let resp = app
        .http
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "facturation-service");

    let resp = app
        .http
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    app.create_client("Acme SAS").await;
    let metrics = app
        .http
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("facturation_db_query_duration_seconds"));
}
