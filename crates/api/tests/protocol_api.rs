//! HTTP-level integration tests for protocol document endpoints and
//! queue statistics.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, seed_protocol};
use fleetdoc_db::models::processing_job::{RecordProcessingJob, JOB_TYPE_MANIFEST};
use fleetdoc_db::repositories::ProcessingJobRepo;
use fleetdoc_storage::{keys, ObjectStore};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Test: generate-manifest queues a job and pdf/manifest status reports it
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn generate_manifest_queues_and_reports_processing(pool: PgPool) {
    let protocol_id = seed_protocol(&pool).await;

    let (store, _dir) = common::test_store();
    let app = common::build_test_app(pool.clone(), store.clone());
    let response = post_json(
        app,
        &format!("/api/v1/protocols/{protocol_id}/generate-manifest"),
        serde_json::json!({"photo_ids": [1]}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert!(json["job_id"].is_number());
    assert_eq!(json["estimated_time"], "2-5 minutes");

    // The job is still waiting, so the status endpoint answers 202.
    let app = common::build_test_app(pool, store);
    let response = get(app, &format!("/api/v1/protocols/{protocol_id}/manifest")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["status"], "processing");
}

// ---------------------------------------------------------------------------
// Test: generate-manifest without photo ids is rejected up front
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn generate_manifest_without_photo_ids_returns_400(pool: PgPool) {
    let protocol_id = seed_protocol(&pool).await;

    let (store, _dir) = common::test_store();
    for body in [serde_json::json!({}), serde_json::json!({"photo_ids": []})] {
        let app = common::build_test_app(pool.clone(), store.clone());
        let response = post_json(
            app,
            &format!("/api/v1/protocols/{protocol_id}/generate-manifest"),
            body,
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "photoIds array is required");
    }

    // Nothing reached the queue.
    let waiting: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue_jobs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(waiting, 0);
}

// ---------------------------------------------------------------------------
// Test: a completed manifest is served with its stored document
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn get_manifest_returns_stored_document(pool: PgPool) {
    let protocol_id = seed_protocol(&pool).await;

    let (store, _dir) = common::test_store();
    let document = serde_json::json!({
        "version": "2.0",
        "protocolId": protocol_id,
        "files": [],
    });
    let key = keys::manifest_key(protocol_id, "abcd1234abcd1234");
    let url = store
        .put(
            &key,
            serde_json::to_vec(&document).unwrap(),
            "application/json",
        )
        .await
        .unwrap();
    ProcessingJobRepo::record(
        &pool,
        &RecordProcessingJob {
            protocol_id,
            job_type: JOB_TYPE_MANIFEST,
            status: "completed",
            result_url: Some(&url),
            error_message: None,
            metadata: None,
        },
    )
    .await
    .unwrap();

    let app = common::build_test_app(pool, store);
    let response = get(app, &format!("/api/v1/protocols/{protocol_id}/manifest")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["url"], url);
    assert_eq!(json["manifest"], document);
}

// ---------------------------------------------------------------------------
// Test: document status without any history is a 404
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn pdf_status_without_history_returns_404(pool: PgPool) {
    let protocol_id = seed_protocol(&pool).await;

    let (store, _dir) = common::test_store();
    let app = common::build_test_app(pool, store);
    let response = get(app, &format!("/api/v1/protocols/{protocol_id}/pdf/status")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: generate-pdf against an unknown protocol is a 404
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn generate_manifest_for_unknown_protocol_returns_404(pool: PgPool) {
    let (store, _dir) = common::test_store();
    let app = common::build_test_app(pool, store);
    let response = post_json(
        app,
        "/api/v1/protocols/999999/generate-manifest",
        serde_json::json!({"photo_ids": [1, 2]}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: queue stats shape and health verdict
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn queue_stats_reports_both_lanes(pool: PgPool) {
    let protocol_id = seed_protocol(&pool).await;

    // Queue one document job so the counts are non-trivial.
    let (store, _dir) = common::test_store();
    let app = common::build_test_app(pool.clone(), store.clone());
    post_json(
        app,
        &format!("/api/v1/protocols/{protocol_id}/generate-manifest"),
        serde_json::json!({"photo_ids": [1]}),
    )
    .await;

    let app = common::build_test_app(pool, store);
    let response = get(app, "/api/v1/queue/stats").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["photo"]["waiting"], 0);
    assert_eq!(json["document"]["waiting"], 1);
    assert_eq!(json["photo"]["healthy"], true);
    assert_eq!(json["document"]["healthy"], true);
    assert_eq!(json["healthy"], true);
    assert!(json["timestamp"].is_string());
}

// ---------------------------------------------------------------------------
// Test: in-flight jobs count toward the backlog verdict
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn queue_health_counts_active_jobs_toward_backlog(pool: PgPool) {
    // 30 waiting is under the document limit of 50 on its own, but
    // together with 25 active the lane is over it.
    sqlx::query(
        "INSERT INTO queue_jobs (lane, job_type, payload, status) \
         SELECT 'document', 'generate-manifest', '{}', \
                CASE WHEN n <= 25 THEN 'active' ELSE 'waiting' END \
         FROM generate_series(1, 55) AS n",
    )
    .execute(&pool)
    .await
    .unwrap();

    let (store, _dir) = common::test_store();
    let app = common::build_test_app(pool, store);
    let response = get(app, "/api/v1/queue/stats").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["document"]["active"], 25);
    assert_eq!(json["document"]["waiting"], 30);
    assert_eq!(json["document"]["healthy"], false);
    assert_eq!(json["photo"]["healthy"], true);
    assert_eq!(json["healthy"], false);
}
