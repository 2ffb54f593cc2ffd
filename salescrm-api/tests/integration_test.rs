/// End-to-end flows against a real PostgreSQL database
///
/// Run with a disposable database:
///
/// ```bash
/// TEST_DATABASE_URL=postgresql://localhost/salescrm_test cargo test -p salescrm-api -- --ignored
/// ```

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{send, TestContext};
use serde_json::json;
use std::io;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[tokio::test]
#[ignore]
async fn test_register_then_profile_and_permissions() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.request("GET", "/v1/users/me", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "super_admin");
    assert!(body["data"]["user"].get("passwordHash").is_none());
    assert!(!body["data"]["permissions"].as_array().unwrap().is_empty());

    let (status, _) = send(
        &ctx.app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": common::TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_account_crud_with_pagination() {
    let ctx = TestContext::new().await.unwrap();

    for name in ["Acme", "Globex", "Initech"] {
        let (status, body) = ctx
            .request("POST", "/v1/accounts", Some(json!({ "name": name, "industry": "Manufacturing" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["ownerId"], ctx.user_id.to_string());
    }

    let (status, body) = ctx.request("GET", "/v1/accounts?page=1&pageSize=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 2);

    let id = body["data"][0]["id"].as_str().unwrap().to_string();
    let (status, body) = ctx
        .request("PUT", &format!("/v1/accounts/{}", id), Some(json!({ "website": "https://acme.example" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["website"], "https://acme.example");

    let (status, body) = ctx.request("DELETE", &format!("/v1/accounts/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());

    let (status, _) = ctx.request("GET", &format!("/v1/accounts/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_hierarchical_visibility() {
    let ctx = TestContext::new().await.unwrap();

    let (manager_id, manager_token) = ctx.create_user("sales_manager", None).await.unwrap();
    let (_, rep_token) = ctx.create_user("sales_rep", Some(manager_id)).await.unwrap();
    let (_, other_token) = ctx.create_user("sales_rep", None).await.unwrap();

    let (status, body) = send(
        &ctx.app,
        "POST",
        "/v1/accounts",
        Some(&rep_token),
        Some(json!({ "name": "Rep Account" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let account_uri = format!("/v1/accounts/{}", body["data"]["id"].as_str().unwrap());

    // The manager sees the report's record, an unrelated rep does not
    let (status, _) = send(&ctx.app, "GET", &account_uri, Some(&manager_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&ctx.app, "GET", &account_uri, Some(&other_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 403);

    let (_, body) = send(&ctx.app, "GET", "/v1/accounts", Some(&other_token), None).await;
    assert_eq!(body["pagination"]["total"], 0);

    // Admins see everything
    let (status, _) = ctx.request("GET", &account_uri, None).await;
    assert_eq!(status, StatusCode::OK);

    // A rep cannot hand a record to someone outside their scope
    let (status, _) = send(
        &ctx.app,
        "POST",
        "/v1/accounts",
        Some(&other_token),
        Some(json!({ "name": "Sneaky", "ownerId": manager_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_manager_cycle_is_rejected() {
    let ctx = TestContext::new().await.unwrap();

    let (manager_id, _) = ctx.create_user("sales_manager", None).await.unwrap();
    let (rep_id, _) = ctx.create_user("sales_rep", Some(manager_id)).await.unwrap();

    let (status, _) = ctx
        .request("PUT", &format!("/v1/users/{}", manager_id), Some(json!({ "managerId": rep_id })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = ctx
        .request("PUT", &format!("/v1/users/{}", manager_id), Some(json!({ "managerId": manager_id })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_opposite_manager_changes_cannot_both_land() {
    let ctx = TestContext::new().await.unwrap();

    let (a, _) = ctx.create_user("sales_manager", None).await.unwrap();
    let (b, _) = ctx.create_user("sales_manager", None).await.unwrap();

    let a_uri = format!("/v1/users/{}", a);
    let b_uri = format!("/v1/users/{}", b);
    let ((a_status, _), (b_status, _)) = tokio::join!(
        ctx.request("PUT", &a_uri, Some(json!({ "managerId": b }))),
        ctx.request("PUT", &b_uri, Some(json!({ "managerId": a }))),
    );

    let mut statuses = [a_status, b_status];
    statuses.sort_by_key(|s| s.as_u16());
    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNPROCESSABLE_ENTITY]);

    // Exactly one edge was written
    let (_, a_body) = ctx.request("GET", &a_uri, None).await;
    let (_, b_body) = ctx.request("GET", &b_uri, None).await;
    let edges = [&a_body["data"]["managerId"], &b_body["data"]["managerId"]]
        .iter()
        .filter(|m| !m.is_null())
        .count();
    assert_eq!(edges, 1);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_team_is_paginated() {
    let ctx = TestContext::new().await.unwrap();
    let (manager_id, _) = ctx.create_user("sales_manager", None).await.unwrap();

    sqlx::query(
        "INSERT INTO users (tenant_id, email, password_hash, name, role, manager_id) \
         SELECT $1, 'rep' || g || '-' || $3 || '@example.com', 'x', 'Rep ' || g, 'sales_rep'::user_role, $2 \
         FROM generate_series(1, 105) AS g",
    )
    .bind(ctx.tenant_id)
    .bind(manager_id)
    .bind(manager_id.to_string())
    .execute(&ctx.db)
    .await
    .unwrap();

    let uri = format!("/v1/users/{}/team?page=1&pageSize=100", manager_id);
    let (status, body) = ctx.request("GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["unrestricted"], false);
    assert_eq!(body["data"]["members"].as_array().unwrap().len(), 100);
    assert_eq!(body["pagination"]["total"], 106);
    assert_eq!(body["pagination"]["totalPages"], 2);

    let uri = format!("/v1/users/{}/team?page=2&pageSize=100", manager_id);
    let (_, body) = ctx.request("GET", &uri, None).await;
    assert_eq!(body["data"]["members"].as_array().unwrap().len(), 6);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_write_responses_carry_display_names() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.request("POST", "/v1/accounts", Some(json!({ "name": "Acme" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["ownerName"], "Test Admin");
    let uri = format!("/v1/accounts/{}", body["data"]["id"].as_str().unwrap());

    let (status, updated) = ctx.request("PUT", &uri, Some(json!({ "industry": "Retail" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, fetched) = ctx.request("GET", &uri, None).await;
    assert!(updated["data"]["ownerName"].is_string());
    assert_eq!(updated["data"]["ownerName"], fetched["data"]["ownerName"]);

    let (manager_id, _) = ctx.create_user("sales_manager", None).await.unwrap();
    let (rep_id, _) = ctx.create_user("sales_rep", None).await.unwrap();
    let (status, body) = ctx
        .request("PUT", &format!("/v1/users/{}", rep_id), Some(json!({ "managerId": manager_id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["managerName"], "Test sales_manager");

    let (status, body) = ctx
        .request("POST", "/v1/tasks", Some(json!({ "title": "Follow up", "assignedTo": rep_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["assignedToName"], "Test sales_rep");
    assert_eq!(body["data"]["createdByName"], "Test Admin");

    ctx.cleanup().await.unwrap();
}

/// Collects formatted log output for assertions
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[tokio::test]
#[ignore]
async fn test_csv_import_reports_and_logs_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let ctx = TestContext::new().await.unwrap();

    let boundary = "salescrm-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"accounts.csv\"\r\n\
         Content-Type: text/csv\r\n\r\nname\nAcme\nGlobex\n\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/v1/import/accounts")
        .header("authorization", format!("Bearer {}", ctx.token))
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();

    let response = ctx.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let report: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(report["data"]["totalRows"], 2);
    assert_eq!(report["data"]["imported"], 2);

    let output = logs.text();
    assert_eq!(output.matches("CSV import finished").count(), 1);
    assert!(output.contains(&ctx.tenant_id.to_string()));

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_deal_stage_rules() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .request("POST", "/v1/deals", Some(json!({ "name": "Big Deal", "amount": 5000.0 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["stage"], "prospecting");
    assert_eq!(body["data"]["probability"], 10);
    let uri = format!("/v1/deals/{}", body["data"]["id"].as_str().unwrap());

    let (_, body) = ctx.request("PUT", &uri, Some(json!({ "stage": "negotiation" }))).await;
    assert_eq!(body["data"]["probability"], 75);
    assert!(body["data"]["actualCloseDate"].is_null());

    let (_, body) = ctx.request("PUT", &uri, Some(json!({ "stage": "closed_won" }))).await;
    assert_eq!(body["data"]["probability"], 100);
    assert!(body["data"]["actualCloseDate"].is_string());

    let (_, body) = ctx.request("PUT", &uri, Some(json!({ "stage": "proposal" }))).await;
    assert!(body["data"]["actualCloseDate"].is_null());

    let (status, body) = ctx
        .request(
            "POST",
            &format!("{}/items", uri),
            Some(json!({ "description": "Licences", "quantity": 2.0, "unitPrice": 300.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["dealAmount"], 600.0);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_lead_conversion() {
    let ctx = TestContext::new().await.unwrap();

    let (_, body) = ctx
        .request(
            "POST",
            "/v1/leads",
            Some(json!({ "firstName": "Grace", "lastName": "Hopper", "company": "Navy", "email": "grace@example.com" })),
        )
        .await;
    let uri = format!("/v1/leads/{}/convert", body["data"]["id"].as_str().unwrap());

    let (status, body) = ctx
        .request("POST", &uri, Some(json!({ "createDeal": true, "dealAmount": 1200.0 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lead"]["status"], "converted");
    assert_eq!(body["data"]["account"]["name"], "Navy");
    assert_eq!(body["data"]["contact"]["firstName"], "Grace");
    assert_eq!(body["data"]["deal"]["amount"], 1200.0);

    let (status, _) = ctx.request("POST", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_quote_totals_and_pdf() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .request(
            "POST",
            "/v1/quotes",
            Some(json!({
                "title": "Annual plan",
                "discountAmount": 10.0,
                "items": [
                    { "description": "Seats", "quantity": 10.0, "unitPrice": 20.0, "discountPercent": 10.0, "taxRate": 10.0 },
                    { "description": "Setup", "quantity": 1.0, "unitPrice": 50.0 }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    // 180 + 50 subtotal, 18 tax, minus 10 discount
    assert_eq!(body["data"]["subtotal"], 230.0);
    assert_eq!(body["data"]["taxAmount"], 18.0);
    assert_eq!(body["data"]["total"], 238.0);
    assert!(body["data"]["quoteNumber"].as_str().unwrap().starts_with("Q-"));

    let pdf_uri = format!("/v1/quotes/{}/pdf", body["data"]["id"].as_str().unwrap());
    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(&pdf_uri)
                .header("authorization", format!("Bearer {}", ctx.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_task_assignment_notifies_assignee() {
    let ctx = TestContext::new().await.unwrap();
    let (rep_id, rep_token) = ctx.create_user("sales_rep", None).await.unwrap();

    let (status, _) = ctx
        .request("POST", "/v1/tasks", Some(json!({ "title": "Call back", "assignedTo": rep_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&ctx.app, "GET", "/v1/notifications/unread-count", Some(&rep_token), None).await;
    assert_eq!(body["data"]["unread"], 1);

    let (status, body) = send(&ctx.app, "PUT", "/v1/notifications/read-all", Some(&rep_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 1);

    // Nothing for the assigner
    let (_, body) = ctx.request("GET", "/v1/notifications", None).await;
    assert_eq!(body["pagination"]["total"], 0);

    ctx.cleanup().await.unwrap();
}
