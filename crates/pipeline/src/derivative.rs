//! Photo derivative processing.
//!
//! Claims a stored original, produces the thumb/gallery/pdf renditions,
//! uploads them, and records the artifacts on the photo row. Progress
//! checkpoints are pushed through a [`ProgressSink`] so status polls
//! observe them mid-flight.

use std::sync::Arc;

use async_trait::async_trait;
use fleetdoc_core::imaging::{self, DerivativeProfile, DerivativeSet};
use fleetdoc_core::types::{DbId, DerivativeKind};
use fleetdoc_db::models::photo::DerivativeRecord;
use fleetdoc_db::repositories::{PhotoRepo, QueueJobRepo};
use fleetdoc_storage::{keys, ObjectStore};
use sqlx::PgPool;

use crate::PipelineError;

/// Receives progress checkpoints during processing. Reporting is
/// best-effort: a sink must never fail the job it is observing.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: i16);
}

/// Sink that persists progress on both the queue job and the photo row.
pub struct QueueProgress {
    pool: PgPool,
    job_id: DbId,
    photo_id: DbId,
}

impl QueueProgress {
    pub fn new(pool: PgPool, job_id: DbId, photo_id: DbId) -> Self {
        Self {
            pool,
            job_id,
            photo_id,
        }
    }
}

#[async_trait]
impl ProgressSink for QueueProgress {
    async fn report(&self, progress: i16) {
        if let Err(e) = QueueJobRepo::update_progress(&self.pool, self.job_id, progress).await {
            tracing::warn!(job_id = self.job_id, error = %e, "progress update failed");
        }
        if let Err(e) = PhotoRepo::update_progress(&self.pool, self.photo_id, progress).await {
            tracing::warn!(photo_id = self.photo_id, error = %e, "progress update failed");
        }
    }
}

/// Sink that drops every report, for callers without a queue job.
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report(&self, _progress: i16) {}
}

/// Stateless over its inputs: one service instance handles any number
/// of photos concurrently.
pub struct DerivativeService {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
    profile: DerivativeProfile,
}

impl DerivativeService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>, profile: DerivativeProfile) -> Self {
        Self {
            pool,
            store,
            profile,
        }
    }

    /// Process one photo end to end. Any failure marks the photo row
    /// `failed` with the verbatim error text before propagating.
    pub async fn process_photo(
        &self,
        protocol_id: DbId,
        photo_id: DbId,
        sink: &dyn ProgressSink,
    ) -> Result<DerivativeRecord, PipelineError> {
        match self.process_inner(protocol_id, photo_id, sink).await {
            Ok(record) => Ok(record),
            Err(e) => {
                let message = e.to_string();
                tracing::error!(photo_id, error = %message, "derivative processing failed");
                if let Err(db_err) = PhotoRepo::mark_failed(&self.pool, photo_id, &message).await {
                    tracing::warn!(photo_id, error = %db_err, "failed to record photo failure");
                }
                Err(e)
            }
        }
    }

    async fn process_inner(
        &self,
        protocol_id: DbId,
        photo_id: DbId,
        sink: &dyn ProgressSink,
    ) -> Result<DerivativeRecord, PipelineError> {
        let photo = PhotoRepo::find_by_id(&self.pool, photo_id)
            .await?
            .ok_or(PipelineError::PhotoNotFound(photo_id))?;

        PhotoRepo::mark_processing(&self.pool, photo_id).await?;
        sink.report(10).await;

        let key = keys::key_from_url(&photo.original_url).ok_or_else(|| {
            PipelineError::Download {
                url: photo.original_url.clone(),
                message: "original url does not resolve to a storage key".into(),
            }
        })?;
        let original = self.store.get(&key).await?;
        sink.report(30).await;

        let set = render_derivatives(original, self.profile.clone()).await?;
        sink.report(50).await;

        let thumb_url = self
            .store
            .put(
                &keys::derivative_key(protocol_id, photo_id, DerivativeKind::Thumb),
                set.thumb.clone(),
                DerivativeKind::Thumb.content_type(),
            )
            .await?;
        let gallery_url = self
            .store
            .put(
                &keys::derivative_key(protocol_id, photo_id, DerivativeKind::Gallery),
                set.gallery.clone(),
                DerivativeKind::Gallery.content_type(),
            )
            .await?;
        let pdf_url = self
            .store
            .put(
                &keys::derivative_key(protocol_id, photo_id, DerivativeKind::Pdf),
                set.pdf.clone(),
                DerivativeKind::Pdf.content_type(),
            )
            .await?;
        sink.report(70).await;

        let record = build_record(&set, thumb_url, gallery_url, pdf_url)?;
        PhotoRepo::complete(&self.pool, photo_id, &record).await?;
        sink.report(90).await;

        if PhotoRepo::find_metadata(&self.pool, photo_id).await?.is_some() {
            PhotoRepo::mark_metadata_processed(&self.pool, photo_id).await?;
        }
        sink.report(100).await;

        tracing::info!(
            photo_id,
            protocol_id,
            original_size = set.sizes.original,
            thumb_size = set.sizes.thumb,
            gallery_size = set.sizes.gallery,
            pdf_size = set.sizes.pdf,
            "derivatives generated"
        );
        Ok(record)
    }
}

/// Image work is CPU-bound; run it off the async executor.
async fn render_derivatives(
    data: Vec<u8>,
    profile: DerivativeProfile,
) -> Result<DerivativeSet, PipelineError> {
    let set = tokio::task::spawn_blocking(move || imaging::generate_derivatives(&data, &profile))
        .await
        .map_err(|e| PipelineError::Payload(format!("derivative task panicked: {e}")))??;
    Ok(set)
}

fn build_record(
    set: &DerivativeSet,
    thumb_url: String,
    gallery_url: String,
    pdf_url: String,
) -> Result<DerivativeRecord, PipelineError> {
    let savings = imaging::calculate_savings(&set.sizes);
    let savings_json =
        serde_json::to_value(&savings).map_err(|e| PipelineError::Payload(e.to_string()))?;

    Ok(DerivativeRecord {
        thumb_url,
        gallery_url,
        pdf_url,
        original_hash: set.hash.clone(),
        thumb_hash: fleetdoc_core::hashing::strong_hash_hex(&set.thumb)?,
        gallery_hash: fleetdoc_core::hashing::strong_hash_hex(&set.gallery)?,
        pdf_hash: fleetdoc_core::hashing::strong_hash_hex(&set.pdf)?,
        original_size: set.sizes.original as i64,
        thumb_size: set.sizes.thumb as i64,
        gallery_size: set.sizes.gallery as i64,
        pdf_size: set.sizes.pdf as i64,
        savings: savings_json,
    })
}
