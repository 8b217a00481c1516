mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, fixture, identity, TestApp, PROJECT};
use dashboard_service::models::ProjectStats;
use dashboard_service::services::MockIdentityProvider;
use serde_json::json;

#[tokio::test]
async fn list_returns_only_member_projects() {
    let f = fixture();
    f.app.store.seed_project("other", "Somebody else's", &identity("x@example.com"));

    let response = f.app.get("/api/projects", Some("viewer-token")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ids: Vec<&str> = body["projects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![PROJECT]);

    let response = f.app.get("/api/projects", Some("outsider-token")).await;
    let body = body_json(response).await;
    assert!(body["projects"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn create_provisions_project_owned_by_caller() {
    let creator = identity("creator@example.com");
    let app =
        TestApp::new(MockIdentityProvider::new().with_session("creator-token", creator.clone()));

    let response = app
        .request(
            Method::POST,
            "/api/projects",
            Some("creator-token"),
            Some(json!({
                "id": "clinic-app",
                "name": "Clinic",
                "description": "Patient records",
                "template_id": "healthcare"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["project"]["id"], "clinic-app");
    assert_eq!(body["project"]["owner_id"], creator.id.to_string());
    assert_eq!(body["project"]["description"], "Patient records");
    assert_eq!(body["project"]["schema_name"], "proj_clinic_app");

    assert_eq!(
        app.store.role_of("clinic-app", creator.id),
        Some(dashboard_service::models::Role::Owner)
    );
}

#[tokio::test]
async fn create_reports_a_dropped_description() {
    let creator = identity("creator@example.com");
    let app =
        TestApp::new(MockIdentityProvider::new().with_session("creator-token", creator.clone()));
    app.store.fail_operation("update_project");

    let response = app
        .request(
            Method::POST,
            "/api/projects",
            Some("creator-token"),
            Some(json!({ "id": "notes", "name": "Notes", "description": "Lost" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["project"]["id"], "notes");
    assert!(body["project"]["description"].is_null());
    assert_eq!(body["warnings"], json!(["Project created without its description"]));
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let f = fixture();

    for payload in [
        json!({ "id": "Bad_Id", "name": "x" }),
        json!({ "id": "", "name": "x" }),
        json!({ "id": "a".repeat(64), "name": "x" }),
        json!({ "id": "ok-id", "name": "" }),
        json!({ "id": "ok-id", "name": "x", "template_id": "not-a-template" }),
        json!({ "name": "missing id" }),
    ] {
        let response = f
            .app
            .request(Method::POST, "/api/projects", Some("member-token"), Some(payload.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", payload);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid input");
    }

    assert!(!f.app.store.calls().iter().any(|c| c == "provision_new_project"));
}

#[tokio::test]
async fn create_surfaces_procedure_rejection() {
    let f = fixture();

    let response = f
        .app
        .request(
            Method::POST,
            "/api/projects",
            Some("member-token"),
            Some(json!({ "id": PROJECT, "name": "Duplicate" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Project with this ID already exists");
}

#[tokio::test]
async fn viewing_requires_membership() {
    let f = fixture();

    for token in ["owner-token", "admin-token", "member-token", "viewer-token"] {
        let response = f.app.get("/api/projects/proj1", Some(token)).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", token);
        let body = body_json(response).await;
        assert_eq!(body["project"]["name"], "Project One");
    }

    let response = f.app.get("/api/projects/proj1", Some("outsider-token")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn update_requires_admin() {
    let f = fixture();

    for token in ["member-token", "viewer-token", "outsider-token"] {
        let response = f
            .app
            .request(
                Method::PATCH,
                "/api/projects/proj1",
                Some(token),
                Some(json!({ "name": "Renamed" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", token);
    }
    assert!(!f.app.store.calls().iter().any(|c| c == "update_project"));

    let response = f
        .app
        .request(
            Method::PATCH,
            "/api/projects/proj1",
            Some("admin-token"),
            Some(json!({ "name": "Renamed", "description": "New text" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["project"]["name"], "Renamed");
    assert_eq!(body["project"]["description"], "New text");
}

#[tokio::test]
async fn delete_requires_the_owner_id() {
    let f = fixture();

    for token in ["admin-token", "member-token", "outsider-token"] {
        let response = f
            .app
            .request(Method::DELETE, "/api/projects/proj1", Some(token), None)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", token);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Only project owner can delete");
    }
    assert!(!f.app.store.calls().iter().any(|c| c == "delete_project"));

    let response = f
        .app
        .request(Method::DELETE, "/api/projects/proj1", Some("owner-token"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "success": true }));
    assert!(f.app.store.calls().iter().any(|c| c == "delete_project"));
    assert!(f.app.store.project(PROJECT).is_none());
}

#[tokio::test]
async fn stats_for_members() {
    let f = fixture();
    f.app.store.set_stats(
        PROJECT,
        ProjectStats {
            users_count: 12,
            api_calls_count: 3400,
            storage_usage_mb: 12.5,
            tables_count: 3,
            rows_count: 780,
        },
    );

    let response = f.app.get("/api/projects/proj1/stats", Some("viewer-token")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["stats"]["users_count"], 12);
    assert_eq!(body["stats"]["storage_usage_mb"], 12.5);

    let response = f.app.get("/api/projects/proj1/stats", Some("outsider-token")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn store_outage_is_a_generic_500() {
    let f = fixture();
    f.app.store.set_unavailable(true);

    let response = f.app.get("/api/projects/proj1", Some("owner-token")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body, json!({ "error": "Internal server error" }));
}

#[tokio::test]
async fn malformed_json_is_400() {
    let f = fixture();

    let response = f
        .app
        .request(
            Method::PATCH,
            "/api/projects/proj1",
            Some("admin-token"),
            Some(json!("not an object")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid input");
}

#[tokio::test]
async fn templates_fall_back_to_built_ins() {
    let f = fixture();

    let response = f.app.get("/api/templates", Some("viewer-token")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ids: Vec<&str> = body["templates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["healthcare", "education", "ecommerce", "blank"]);

    f.app.store.set_unavailable(true);
    let response = f.app.get("/api/templates", Some("viewer-token")).await;
    assert_eq!(response.status(), StatusCode::OK);
}
