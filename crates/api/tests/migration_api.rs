//! HTTP-level integration tests for the migration endpoints.
//!
//! End-to-end migration behaviour (derivative generation, rollback,
//! validation depth) is covered in the pipeline crate; these tests pin
//! the HTTP surface.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json};
use sqlx::PgPool;

#[sqlx::test(migrations = "../db/migrations")]
async fn dry_run_reports_candidates_without_migrating(pool: PgPool) {
    sqlx::query(
        "INSERT INTO legacy_protocols (id, protocol_type, data) VALUES (9001, 'handover', '{}')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let (store, _dir) = common::test_store();
    let app = common::build_test_app(pool.clone(), store);
    let response = post_json(
        app,
        "/api/v1/migration/start",
        serde_json::json!({"dry_run": true}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["total"], 1);
    assert_eq!(json["successful"], 0);
    assert_eq!(json["candidates"], serde_json::json!([9001]));

    let migrated: Option<bool> =
        sqlx::query_scalar("SELECT migrated FROM legacy_protocols WHERE id = 9001")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert_eq!(migrated, Some(false));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn progress_is_idle_before_any_run(pool: PgPool) {
    let (store, _dir) = common::test_store();
    let app = common::build_test_app(pool, store);
    let response = get(app, "/api/v1/migration/progress").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["is_running"], false);
    assert_eq!(json["processed"], 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn validate_unknown_legacy_protocol_is_invalid(pool: PgPool) {
    let (store, _dir) = common::test_store();
    let app = common::build_test_app(pool, store);
    let response = get(app, "/api/v1/migration/validate/424242").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["valid"], false);
    assert!(!json["issues"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn rollback_of_unmigrated_protocol_is_a_noop(pool: PgPool) {
    let (store, _dir) = common::test_store();
    let app = common::build_test_app(pool, store);
    let response = post_json(
        app,
        "/api/v1/migration/rollback/424242",
        serde_json::json!({}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["protocol_deleted"], false);
    assert_eq!(json["photos_deleted"], 0);
}
