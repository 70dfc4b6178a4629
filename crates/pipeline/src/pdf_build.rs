//! Protocol PDF assembly.
//!
//! Takes a protocol's data snapshot plus its processed photo rows,
//! resolves the PDF-sized rendition of every photo (falling back to
//! the gallery rendition, dropping photos with neither), renders the
//! archival document and uploads it. Every attempt is appended to the
//! `protocol_processing_jobs` history, success or failure.

use std::sync::Arc;
use std::time::Instant;

use fleetdoc_core::hashing;
use fleetdoc_core::pdf::{
    self, CustomerInfo, EmbeddedPhoto, PdfRenderRequest, PhotoCategory, RentalInfo, VehicleInfo,
};
use fleetdoc_core::types::{DbId, ProtocolType};
use fleetdoc_db::models::processing_job::{RecordProcessingJob, JOB_TYPE_PDF};
use fleetdoc_db::repositories::{PhotoRepo, ProcessingJobRepo};
use fleetdoc_storage::{keys, ObjectStore};
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::jobs::{BulkPdfRequest, BULK_PDF_BATCH_SIZE};
use crate::PipelineError;

/// Protocol data snapshot carried in the job payload. Photo bytes are
/// not part of it; they are resolved from storage at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfJobData {
    pub protocol_type: ProtocolType,
    pub vehicle: VehicleInfo,
    pub customer: CustomerInfo,
    pub rental: RentalInfo,
    pub photos: Vec<PdfPhotoRef>,
    pub notes: Option<String>,
    pub signature: Option<String>,
}

/// Reference to a processed photo to embed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfPhotoRef {
    pub photo_id: DbId,
    pub description: String,
    pub category: PhotoCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfBuildOutcome {
    pub url: String,
    pub hash: String,
    pub size: u64,
    pub page_count: usize,
    pub embedded_photos: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkPdfOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkPdfResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkPdfResult {
    pub protocol_id: DbId,
    pub success: bool,
    pub url: Option<String>,
    pub error: Option<String>,
}

pub struct PdfBuildService {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
}

impl PdfBuildService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, store }
    }

    /// Build, upload, and record one protocol document. The history
    /// row is written for failures too, so polls see the outcome.
    pub async fn build_protocol_pdf(
        &self,
        protocol_id: DbId,
        data: &PdfJobData,
    ) -> Result<PdfBuildOutcome, PipelineError> {
        match self.build_inner(protocol_id, data).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = e.to_string();
                tracing::error!(protocol_id, error = %message, "pdf build failed");
                let record = ProcessingJobRepo::record(
                    &self.pool,
                    &RecordProcessingJob {
                        protocol_id,
                        job_type: JOB_TYPE_PDF,
                        status: "failed",
                        result_url: None,
                        error_message: Some(&message),
                        metadata: None,
                    },
                )
                .await;
                if let Err(db_err) = record {
                    tracing::warn!(protocol_id, error = %db_err, "failed to record pdf failure");
                }
                Err(e)
            }
        }
    }

    async fn build_inner(
        &self,
        protocol_id: DbId,
        data: &PdfJobData,
    ) -> Result<PdfBuildOutcome, PipelineError> {
        let started = Instant::now();

        let mut photos = Vec::with_capacity(data.photos.len());
        for photo_ref in &data.photos {
            match self.resolve_photo(photo_ref).await? {
                Some(photo) => photos.push(photo),
                None => {
                    tracing::warn!(
                        photo_id = photo_ref.photo_id,
                        "no embeddable rendition, photo dropped from document"
                    );
                }
            }
        }
        let embedded_photos = photos.len();

        let generated_at = chrono::Utc::now();
        let request = PdfRenderRequest {
            protocol_id,
            protocol_type: data.protocol_type,
            vehicle: data.vehicle.clone(),
            customer: data.customer.clone(),
            rental: data.rental.clone(),
            photos,
            notes: data.notes.clone(),
            signature: data.signature.clone(),
            generated_at,
        };

        let rendered = tokio::task::spawn_blocking(move || {
            let document = pdf::render(&request)?;
            let optimized = pdf::optimize(&document.bytes)?;
            Ok::<_, fleetdoc_core::error::CoreError>((optimized, document.page_count))
        })
        .await
        .map_err(|e| PipelineError::Payload(format!("pdf render task panicked: {e}")))?;
        let (bytes, page_count) = rendered?;

        let hash = hashing::strong_hash_hex(&bytes)?;
        let size = bytes.len() as u64;
        let key = keys::pdf_key(
            protocol_id,
            data.protocol_type,
            generated_at.timestamp_millis(),
        );
        let url = self.store.put(&key, bytes, "application/pdf").await?;

        let metadata = serde_json::json!({
            "hash": hash,
            "size": size,
            "page_count": page_count,
            "embedded_photos": embedded_photos,
            "elapsed_ms": started.elapsed().as_millis() as u64,
        });
        ProcessingJobRepo::record(
            &self.pool,
            &RecordProcessingJob {
                protocol_id,
                job_type: JOB_TYPE_PDF,
                status: "completed",
                result_url: Some(&url),
                error_message: None,
                metadata: Some(metadata),
            },
        )
        .await?;

        tracing::info!(protocol_id, page_count, embedded_photos, size, "protocol pdf built");
        Ok(PdfBuildOutcome {
            url,
            hash,
            size,
            page_count,
            embedded_photos,
        })
    }

    /// Bulk builds run in fixed-size batches; one protocol failing
    /// never aborts the rest of the batch.
    pub async fn bulk_build(&self, requests: &[BulkPdfRequest]) -> BulkPdfOutcome {
        let mut results = Vec::with_capacity(requests.len());
        for batch in requests.chunks(BULK_PDF_BATCH_SIZE) {
            let outcomes = futures::future::join_all(
                batch
                    .iter()
                    .map(|req| self.build_protocol_pdf(req.protocol_id, &req.data)),
            )
            .await;
            for (req, outcome) in batch.iter().zip(outcomes) {
                results.push(match outcome {
                    Ok(built) => BulkPdfResult {
                        protocol_id: req.protocol_id,
                        success: true,
                        url: Some(built.url),
                        error: None,
                    },
                    Err(e) => BulkPdfResult {
                        protocol_id: req.protocol_id,
                        success: false,
                        url: None,
                        error: Some(e.to_string()),
                    },
                });
            }
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        BulkPdfOutcome {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Fetch the PDF rendition of a photo, falling back to gallery.
    /// Returns `None` when the photo row is gone or neither rendition
    /// is retrievable; the document is built from what remains.
    async fn resolve_photo(
        &self,
        photo_ref: &PdfPhotoRef,
    ) -> Result<Option<EmbeddedPhoto>, PipelineError> {
        let Some(row) = PhotoRepo::find_by_id(&self.pool, photo_ref.photo_id).await? else {
            tracing::warn!(photo_id = photo_ref.photo_id, "referenced photo no longer exists");
            return Ok(None);
        };

        let candidates = [row.pdf_url.as_deref(), row.gallery_url.as_deref()];
        for url in candidates.into_iter().flatten() {
            let Some(key) = keys::key_from_url(url) else {
                continue;
            };
            match self.store.get(&key).await {
                Ok(jpeg) => {
                    let (width, height) = jpeg_size(&jpeg)?;
                    return Ok(Some(EmbeddedPhoto {
                        photo_id: photo_ref.photo_id,
                        description: photo_ref.description.clone(),
                        category: photo_ref.category,
                        jpeg,
                        width,
                        height,
                    }));
                }
                Err(e) => {
                    tracing::warn!(photo_id = photo_ref.photo_id, key, error = %e, "rendition fetch failed");
                }
            }
        }
        Ok(None)
    }
}

fn jpeg_size(jpeg: &[u8]) -> Result<(u32, u32), PipelineError> {
    let img = image::load_from_memory(jpeg)
        .map_err(|e| PipelineError::Payload(format!("embedded image undecodable: {e}")))?;
    Ok(img.dimensions())
}
