//! Manifest generation and verification round trips.

use std::sync::Arc;

use fleetdoc_core::hashing;
use fleetdoc_core::types::{DbId, ProtocolType};
use fleetdoc_db::models::photo::{CreatePhoto, DerivativeRecord};
use fleetdoc_db::models::processing_job::JOB_TYPE_MANIFEST;
use fleetdoc_db::repositories::{PhotoRepo, ProcessingJobRepo};
use fleetdoc_pipeline::manifest::ManifestService;
use fleetdoc_pipeline::PipelineError;
use fleetdoc_storage::{keys, LocalStore, ObjectStore};
use sqlx::PgPool;

// ---- helpers ----

async fn seed_protocol(pool: &PgPool) -> DbId {
    sqlx::query_scalar("INSERT INTO protocols (protocol_type, data) VALUES ('return', '{}') RETURNING id")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// A completed photo whose stored original matches its recorded hash.
async fn seed_completed_photo(
    pool: &PgPool,
    store: &Arc<dyn ObjectStore>,
    protocol_id: DbId,
    seed: u8,
) -> DbId {
    let original: Vec<u8> = (0..2048u32).map(|i| (i as u8).wrapping_add(seed)).collect();
    let key = format!("protocols/{protocol_id}/photos/original/{seed}.jpg");
    let url = store
        .put(&key, original.clone(), "image/jpeg")
        .await
        .unwrap();

    let photo = PhotoRepo::create(
        pool,
        &CreatePhoto {
            protocol_id,
            original_url: url,
            original_filename: None,
            mime_type: Some("image/jpeg".into()),
            original_size: original.len() as i64,
        },
    )
    .await
    .unwrap();

    let record = DerivativeRecord {
        thumb_url: format!("local://protocols/{protocol_id}/photos/thumb/{seed}.webp"),
        gallery_url: format!("local://protocols/{protocol_id}/photos/gallery/{seed}.jpg"),
        pdf_url: format!("local://protocols/{protocol_id}/photos/pdf/{seed}.jpg"),
        original_hash: hashing::strong_hash_hex(&original).unwrap(),
        thumb_hash: format!("{seed:064x}"),
        gallery_hash: format!("{:064x}", seed as u64 + 1),
        pdf_hash: format!("{:064x}", seed as u64 + 2),
        original_size: original.len() as i64,
        thumb_size: 100,
        gallery_size: 400,
        pdf_size: 300,
        savings: serde_json::json!({}),
    };
    PhotoRepo::complete(pool, photo.photo_id, &record).await.unwrap();
    photo.photo_id
}

// ---- tests ----

#[sqlx::test(migrations = "../db/migrations")]
async fn generates_and_verifies_manifest(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let protocol_id = seed_protocol(&pool).await;
    for seed in 1..=3 {
        seed_completed_photo(&pool, &store, protocol_id, seed).await;
    }

    let service = ManifestService::new(pool.clone(), store.clone());
    let outcome = service
        .generate(protocol_id, ProtocolType::Return, &[])
        .await
        .unwrap();
    assert_eq!(outcome.photo_count, 3);

    // The stored object parses back and its key embeds its own hash.
    let key = keys::key_from_url(&outcome.url).unwrap();
    assert!(key.contains(&outcome.hash[..16]));
    let stored = store.get(&key).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(parsed["version"], "2.0");
    assert_eq!(parsed["summary"]["total_photos"], 3);

    let history = ProcessingJobRepo::latest(&pool, protocol_id, JOB_TYPE_MANIFEST)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.status, "completed");
    assert_eq!(history.result_url.as_deref(), Some(outcome.url.as_str()));

    let report = service.verify(protocol_id, &outcome.url).await.unwrap();
    assert!(report.verified);
    assert_eq!(report.checked, 3);
    assert!(report.issues.is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn verification_collects_every_discrepancy(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let protocol_id = seed_protocol(&pool).await;
    let mut photo_ids = Vec::new();
    for seed in 1..=3 {
        photo_ids.push(seed_completed_photo(&pool, &store, protocol_id, seed).await);
    }

    let service = ManifestService::new(pool.clone(), store.clone());
    let outcome = service
        .generate(protocol_id, ProtocolType::Return, &[])
        .await
        .unwrap();

    // Tamper with one original and delete another after the fact.
    let row = PhotoRepo::find_by_id(&pool, photo_ids[0]).await.unwrap().unwrap();
    let key = keys::key_from_url(&row.original_url).unwrap();
    store.put(&key, b"tampered".to_vec(), "image/jpeg").await.unwrap();

    let row = PhotoRepo::find_by_id(&pool, photo_ids[1]).await.unwrap().unwrap();
    let key = keys::key_from_url(&row.original_url).unwrap();
    store.delete(&key).await.unwrap();

    let report = service.verify(protocol_id, &outcome.url).await.unwrap();
    assert!(!report.verified);
    assert_eq!(report.checked, 3);
    assert_eq!(report.issues.len(), 2, "issues: {:?}", report.issues);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn explicit_photo_selection_narrows_the_manifest(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let protocol_id = seed_protocol(&pool).await;
    let mut photo_ids = Vec::new();
    for seed in 1..=3 {
        photo_ids.push(seed_completed_photo(&pool, &store, protocol_id, seed).await);
    }

    let service = ManifestService::new(pool.clone(), store.clone());
    let outcome = service
        .generate(protocol_id, ProtocolType::Return, &photo_ids[..2])
        .await
        .unwrap();
    assert_eq!(outcome.photo_count, 2);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn empty_protocol_is_rejected_and_recorded(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let protocol_id = seed_protocol(&pool).await;

    let service = ManifestService::new(pool.clone(), store);
    let err = service
        .generate(protocol_id, ProtocolType::Return, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoPhotos));

    let history = ProcessingJobRepo::latest(&pool, protocol_id, JOB_TYPE_MANIFEST)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.status, "failed");
    assert!(history.error_message.is_some());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn incomplete_photos_are_excluded(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let protocol_id = seed_protocol(&pool).await;
    seed_completed_photo(&pool, &store, protocol_id, 1).await;

    // Second photo never finished processing.
    PhotoRepo::create(
        &pool,
        &CreatePhoto {
            protocol_id,
            original_url: format!("local://protocols/{protocol_id}/photos/original/pending.jpg"),
            original_filename: None,
            mime_type: None,
            original_size: 10,
        },
    )
    .await
    .unwrap();

    let service = ManifestService::new(pool.clone(), store);
    let outcome = service
        .generate(protocol_id, ProtocolType::Return, &[])
        .await
        .unwrap();
    assert_eq!(outcome.photo_count, 1);
}
