//! Protocol PDF assembly against a local object store.

use std::io::Cursor;
use std::sync::Arc;

use chrono::Utc;
use fleetdoc_core::pdf::{CustomerInfo, PhotoCategory, RentalInfo, VehicleInfo};
use fleetdoc_core::types::{DbId, ProtocolType};
use fleetdoc_db::models::photo::{CreatePhoto, DerivativeRecord};
use fleetdoc_db::models::processing_job::JOB_TYPE_PDF;
use fleetdoc_db::repositories::{PhotoRepo, ProcessingJobRepo};
use fleetdoc_pipeline::jobs::BulkPdfRequest;
use fleetdoc_pipeline::pdf_build::{PdfBuildService, PdfJobData, PdfPhotoRef};
use fleetdoc_storage::{keys, LocalStore, ObjectStore};
use image::{DynamicImage, RgbImage};
use sqlx::PgPool;

// ---- helpers ----

fn fixture_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 2 % 256) as u8, (y * 2 % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

async fn seed_protocol(pool: &PgPool) -> DbId {
    sqlx::query_scalar("INSERT INTO protocols (protocol_type, data) VALUES ('handover', '{}') RETURNING id")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// A completed photo row. `with_pdf` / `with_gallery` control which
/// renditions actually exist in storage.
async fn seed_photo(
    pool: &PgPool,
    store: &Arc<dyn ObjectStore>,
    protocol_id: DbId,
    with_pdf: bool,
    with_gallery: bool,
) -> DbId {
    let photo = PhotoRepo::create(
        pool,
        &CreatePhoto {
            protocol_id,
            original_url: format!("local://protocols/{protocol_id}/photos/original/x.jpg"),
            original_filename: None,
            mime_type: Some("image/jpeg".into()),
            original_size: 1000,
        },
    )
    .await
    .unwrap();
    let photo_id = photo.photo_id;

    let pdf_key = format!("protocols/{protocol_id}/photos/pdf/{photo_id}.jpg");
    let gallery_key = format!("protocols/{protocol_id}/photos/gallery/{photo_id}.jpg");
    if with_pdf {
        store
            .put(&pdf_key, fixture_jpeg(200, 150), "image/jpeg")
            .await
            .unwrap();
    }
    if with_gallery {
        store
            .put(&gallery_key, fixture_jpeg(400, 300), "image/jpeg")
            .await
            .unwrap();
    }

    let record = DerivativeRecord {
        thumb_url: format!("local://protocols/{protocol_id}/photos/thumb/{photo_id}.webp"),
        gallery_url: format!("local://{gallery_key}"),
        pdf_url: format!("local://{pdf_key}"),
        original_hash: "a".repeat(64),
        thumb_hash: "b".repeat(64),
        gallery_hash: "c".repeat(64),
        pdf_hash: "d".repeat(64),
        original_size: 1000,
        thumb_size: 100,
        gallery_size: 400,
        pdf_size: 300,
        savings: serde_json::json!({}),
    };
    PhotoRepo::complete(pool, photo_id, &record).await.unwrap();
    photo_id
}

fn job_data(photos: Vec<PdfPhotoRef>) -> PdfJobData {
    PdfJobData {
        protocol_type: ProtocolType::Handover,
        vehicle: VehicleInfo {
            license_plate: "ZH 123456".into(),
            make: "Skoda".into(),
            model: "Octavia".into(),
            year: 2022,
            vin: None,
        },
        customer: CustomerInfo {
            first_name: "Nina".into(),
            last_name: "Keller".into(),
            email: "nina@example.com".into(),
            phone: None,
        },
        rental: RentalInfo {
            start_date: Utc::now(),
            end_date: Utc::now(),
            start_km: 42_000,
            end_km: None,
            location: "Zurich Airport".into(),
        },
        photos,
        notes: None,
        signature: None,
    }
}

fn photo_ref(photo_id: DbId) -> PdfPhotoRef {
    PdfPhotoRef {
        photo_id,
        description: "front left".into(),
        category: PhotoCategory::Exterior,
    }
}

// ---- tests ----

#[sqlx::test(migrations = "../db/migrations")]
async fn builds_uploads_and_records(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let protocol_id = seed_protocol(&pool).await;
    let photo_id = seed_photo(&pool, &store, protocol_id, true, true).await;

    let service = PdfBuildService::new(pool.clone(), store.clone());
    let outcome = service
        .build_protocol_pdf(protocol_id, &job_data(vec![photo_ref(photo_id)]))
        .await
        .unwrap();

    assert_eq!(outcome.embedded_photos, 1);
    assert_eq!(outcome.page_count, 2);

    let key = keys::key_from_url(&outcome.url).unwrap();
    let bytes = store.get(&key).await.unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(bytes.len() as u64, outcome.size);

    let history = ProcessingJobRepo::latest(&pool, protocol_id, JOB_TYPE_PDF)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.status, "completed");
    let metadata = history.metadata.unwrap();
    assert_eq!(metadata["page_count"], 2);
    assert_eq!(metadata["embedded_photos"], 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn falls_back_to_gallery_and_drops_unresolvable(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let protocol_id = seed_protocol(&pool).await;
    let with_pdf = seed_photo(&pool, &store, protocol_id, true, true).await;
    let gallery_only = seed_photo(&pool, &store, protocol_id, false, true).await;
    let neither = seed_photo(&pool, &store, protocol_id, false, false).await;

    let service = PdfBuildService::new(pool.clone(), store);
    let outcome = service
        .build_protocol_pdf(
            protocol_id,
            &job_data(vec![
                photo_ref(with_pdf),
                photo_ref(gallery_only),
                photo_ref(neither),
            ]),
        )
        .await
        .unwrap();

    // Two photos resolve (one through the gallery fallback), one drops.
    assert_eq!(outcome.embedded_photos, 2);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn stale_photo_reference_is_dropped_not_fatal(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let protocol_id = seed_protocol(&pool).await;
    let existing = seed_photo(&pool, &store, protocol_id, true, true).await;

    // A photo id with no matching row, as after a concurrent delete.
    let outcome = PdfBuildService::new(pool.clone(), store)
        .build_protocol_pdf(
            protocol_id,
            &job_data(vec![photo_ref(existing), photo_ref(987_654)]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.embedded_photos, 1);

    let history = ProcessingJobRepo::latest(&pool, protocol_id, JOB_TYPE_PDF)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.status, "completed");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn invalid_protocol_data_records_failure(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let protocol_id = seed_protocol(&pool).await;

    let mut data = job_data(Vec::new());
    data.vehicle.license_plate = String::new();
    data.customer.last_name = String::new();

    let service = PdfBuildService::new(pool.clone(), store);
    let err = service.build_protocol_pdf(protocol_id, &data).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("vehicle.license_plate"), "got: {message}");
    assert!(message.contains("customer.last_name"), "got: {message}");

    let history = ProcessingJobRepo::latest(&pool, protocol_id, JOB_TYPE_PDF)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.status, "failed");
    assert!(history.result_url.is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn bulk_build_isolates_failures(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
    let good = seed_protocol(&pool).await;
    let bad = seed_protocol(&pool).await;

    let mut broken = job_data(Vec::new());
    broken.vehicle.make = String::new();

    let service = PdfBuildService::new(pool.clone(), store);
    let outcome = service
        .bulk_build(&[
            BulkPdfRequest {
                protocol_id: good,
                data: job_data(Vec::new()),
            },
            BulkPdfRequest {
                protocol_id: bad,
                data: broken,
            },
        ])
        .await;

    assert_eq!(outcome.total, 2);
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed, 1);
    let failed = outcome.results.iter().find(|r| !r.success).unwrap();
    assert_eq!(failed.protocol_id, bad);
    assert!(failed.error.is_some());
}
