//! Legacy protocol migration.
//!
//! Moves V1 protocols into the current model: copies the protocol row,
//! downloads every legacy photo, regenerates the full derivative set,
//! re-uploads the legacy PDF, and flips the `migrated` flag. Re-running
//! a migration is safe end to end: protocol rows insert-or-keep, photo
//! rows upsert on the legacy photo id, and storage keys are
//! deterministic so uploads overwrite their previous objects.
//!
//! Failures are isolated per protocol. One bad candidate lands in the
//! error list and the run continues with the rest of its batch. Within
//! a protocol, a photo that cannot be fetched or processed is logged
//! and skipped; the protocol itself still migrates.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use fleetdoc_core::hashing;
use fleetdoc_core::imaging::{self, DerivativeProfile};
use fleetdoc_core::types::{DbId, DerivativeKind};
use fleetdoc_db::models::legacy::{CandidateFilter, LegacyPhoto, LegacyProtocol};
use fleetdoc_db::models::photo::{DerivativeRecord, MigratePhoto};
use fleetdoc_db::models::processing_job::{RecordProcessingJob, JOB_TYPE_PDF_MIGRATION};
use fleetdoc_db::repositories::{
    LegacyProtocolRepo, PhotoRepo, ProcessingJobRepo, ProtocolRepo,
};
use fleetdoc_storage::{keys, ObjectStore};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::jobs::MIGRATION_PHOTO_CONCURRENCY;
use crate::PipelineError;

/// Protocols migrated per concurrent batch.
pub const MIGRATION_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigrationOptions {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub skip_photos: bool,
    #[serde(default)]
    pub skip_pdfs: bool,
    pub protocol_ids: Option<Vec<DbId>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Shared run state, readable while a migration is in flight.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationProgress {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<MigrationErrorEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub eta_seconds: Option<u64>,
}

impl MigrationProgress {
    pub fn is_running(&self) -> bool {
        self.total > 0 && self.processed < self.total
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationErrorEntry {
    pub protocol_id: DbId,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage of candidates migrated, 0.0 on an empty run.
    pub success_rate: f64,
    pub errors: Vec<MigrationErrorEntry>,
    pub candidates: Vec<DbId>,
    pub elapsed_ms: u64,
}

fn success_rate(successful: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RollbackReport {
    pub protocol_deleted: bool,
    pub photos_deleted: u64,
    pub jobs_deleted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

pub struct MigrationService {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
    http: reqwest::Client,
    profile: DerivativeProfile,
    progress: Arc<Mutex<MigrationProgress>>,
}

impl MigrationService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>, profile: DerivativeProfile) -> Self {
        Self {
            pool,
            store,
            http: reqwest::Client::new(),
            profile,
            progress: Arc::new(Mutex::new(MigrationProgress::default())),
        }
    }

    /// Current run state. Reflects the last started run until the next
    /// one resets it.
    pub async fn progress(&self) -> MigrationProgress {
        self.progress.lock().await.clone()
    }

    /// Run a migration over the selected candidates.
    pub async fn run(&self, options: &MigrationOptions) -> Result<MigrationReport, PipelineError> {
        let filter = CandidateFilter {
            protocol_ids: options.protocol_ids.clone(),
            from: options.from,
            to: options.to,
        };
        let candidates = LegacyProtocolRepo::candidates(&self.pool, &filter).await?;
        let candidate_ids: Vec<DbId> = candidates.iter().map(|c| c.id).collect();
        let total = candidates.len();
        let started = Instant::now();

        {
            let mut progress = self.progress.lock().await;
            *progress = MigrationProgress {
                total,
                started_at: Some(Utc::now()),
                ..MigrationProgress::default()
            };
        }

        if options.dry_run {
            tracing::info!(total, "dry run, no protocols migrated");
            // A dry run never leaves the progress endpoint "running".
            self.progress.lock().await.total = 0;
            return Ok(MigrationReport {
                dry_run: true,
                total,
                successful: 0,
                failed: 0,
                success_rate: 0.0,
                errors: Vec::new(),
                candidates: candidate_ids,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        tracing::info!(total, "migration started");
        for batch in candidates.chunks(MIGRATION_BATCH_SIZE) {
            futures::future::join_all(
                batch
                    .iter()
                    .map(|legacy| self.migrate_and_account(legacy, options).boxed()),
            )
            .await;

            let mut progress = self.progress.lock().await;
            if progress.processed > 0 {
                let per_protocol = started.elapsed().as_secs_f64() / progress.processed as f64;
                let remaining = total.saturating_sub(progress.processed);
                progress.eta_seconds = Some((per_protocol * remaining as f64) as u64);
            }
        }

        let progress = self.progress.lock().await.clone();
        tracing::info!(
            total,
            successful = progress.successful,
            failed = progress.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "migration finished"
        );
        Ok(MigrationReport {
            dry_run: false,
            total,
            successful: progress.successful,
            failed: progress.failed,
            success_rate: success_rate(progress.successful, total),
            errors: progress.errors,
            candidates: candidate_ids,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Undo a migrated protocol: rows first, then a best-effort sweep
    /// of its storage prefix. Safe on never-migrated protocols.
    pub async fn rollback(&self, legacy_id: DbId) -> Result<RollbackReport, PipelineError> {
        let Some(protocol) = ProtocolRepo::find_by_legacy_id(&self.pool, legacy_id).await? else {
            LegacyProtocolRepo::unmark_migrated(&self.pool, legacy_id).await?;
            return Ok(RollbackReport {
                protocol_deleted: false,
                photos_deleted: 0,
                jobs_deleted: 0,
            });
        };

        let photos_deleted = PhotoRepo::delete_by_protocol(&self.pool, protocol.id).await?;
        let jobs_deleted = ProcessingJobRepo::delete_by_protocol(&self.pool, protocol.id).await?;
        let protocol_deleted = ProtocolRepo::delete_by_legacy_id(&self.pool, legacy_id).await?;
        LegacyProtocolRepo::unmark_migrated(&self.pool, legacy_id).await?;

        match self
            .store
            .delete_prefix(&keys::protocol_prefix(protocol.id))
            .await
        {
            Ok(removed) => {
                tracing::info!(legacy_id, protocol_id = protocol.id, removed, "rollback swept storage");
            }
            Err(e) => {
                tracing::warn!(legacy_id, protocol_id = protocol.id, error = %e, "rollback storage sweep failed");
            }
        }

        Ok(RollbackReport {
            protocol_deleted,
            photos_deleted,
            jobs_deleted,
        })
    }

    /// Check a migrated protocol against its legacy source.
    pub async fn validate(&self, legacy_id: DbId) -> Result<ValidationReport, PipelineError> {
        let mut issues = Vec::new();

        let legacy = LegacyProtocolRepo::find_by_id(&self.pool, legacy_id).await?;
        let Some(_legacy) = legacy else {
            return Ok(ValidationReport {
                valid: false,
                issues: vec![format!("legacy protocol {legacy_id} not found")],
            });
        };

        let Some(protocol) = ProtocolRepo::find_by_legacy_id(&self.pool, legacy_id).await? else {
            return Ok(ValidationReport {
                valid: false,
                issues: vec![format!("legacy protocol {legacy_id} has not been migrated")],
            });
        };

        let expected = LegacyProtocolRepo::count_photos(&self.pool, legacy_id).await?;
        let actual = PhotoRepo::count_by_protocol(&self.pool, protocol.id).await?;
        if expected != actual {
            issues.push(format!(
                "photo count mismatch: legacy has {expected}, migrated has {actual}"
            ));
        }

        for photo in PhotoRepo::list_by_protocol(&self.pool, protocol.id).await? {
            if photo.thumb_url.is_none() || photo.gallery_url.is_none() || photo.pdf_url.is_none() {
                issues.push(format!("photo {} is missing derivatives", photo.photo_id));
            }
        }

        Ok(ValidationReport {
            valid: issues.is_empty(),
            issues,
        })
    }

    /// Outcome accounting always advances `processed`, so progress and
    /// the ETA stay truthful even when a protocol fails.
    async fn migrate_and_account(&self, legacy: &LegacyProtocol, options: &MigrationOptions) {
        let outcome = self.migrate_protocol(legacy, options).await;

        let mut progress = self.progress.lock().await;
        progress.processed += 1;
        match outcome {
            Ok(()) => progress.successful += 1,
            Err(e) => {
                let error = e.to_string();
                tracing::error!(legacy_id = legacy.id, error = %error, "protocol migration failed");
                progress.failed += 1;
                progress.errors.push(MigrationErrorEntry {
                    protocol_id: legacy.id,
                    error,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    async fn migrate_protocol(
        &self,
        legacy: &LegacyProtocol,
        options: &MigrationOptions,
    ) -> Result<(), PipelineError> {
        let protocol = ProtocolRepo::insert_migrated(&self.pool, legacy).await?;
        let photos = if options.skip_photos {
            Vec::new()
        } else {
            LegacyProtocolRepo::photos_for(&self.pool, legacy.id).await?
        };

        // A single broken photo must not sink the whole protocol.
        let photo_futures: Vec<_> = photos
            .iter()
            .map(|photo| {
                async move {
                    match self.migrate_photo(protocol.id, photo).await {
                        Ok(()) => 0usize,
                        Err(e) => {
                            tracing::warn!(
                                legacy_id = legacy.id,
                                photo_id = photo.id,
                                error = %e,
                                "photo migration failed, continuing with the rest"
                            );
                            1
                        }
                    }
                }
                .boxed()
            })
            .collect();
        let skipped = stream::iter(photo_futures)
        .buffer_unordered(MIGRATION_PHOTO_CONCURRENCY)
        .fold(0usize, |acc, n| async move { acc + n })
        .await;

        if !options.skip_pdfs {
            if let Some(pdf_url) = &legacy.pdf_url {
                self.migrate_pdf(protocol.id, pdf_url).await?;
            }
        }

        LegacyProtocolRepo::mark_migrated(&self.pool, legacy.id).await?;
        tracing::info!(
            legacy_id = legacy.id,
            protocol_id = protocol.id,
            photos = photos.len() - skipped,
            skipped_photos = skipped,
            "protocol migrated"
        );
        Ok(())
    }

    /// Re-process one legacy photo. Storage keys reuse the legacy photo
    /// id, so a re-run overwrites rather than orphaning objects.
    async fn migrate_photo(
        &self,
        protocol_id: DbId,
        photo: &LegacyPhoto,
    ) -> Result<(), PipelineError> {
        let data = self.download_legacy(&photo.photo_url).await?;

        let profile = self.profile.clone();
        let original = data.clone();
        let set = tokio::task::spawn_blocking(move || imaging::generate_derivatives(&data, &profile))
            .await
            .map_err(|e| PipelineError::Payload(format!("derivative task panicked: {e}")))??;

        let extension = match set.info.format.as_str() {
            "png" => "png",
            "webp" => "webp",
            _ => "jpg",
        };
        let original_key = keys::original_key(protocol_id, photo.id, extension);
        let original_url = self
            .store
            .put(&original_key, original, keys::mime_from_key(&original_key))
            .await?;

        let thumb_url = self
            .store
            .put(
                &keys::derivative_key(protocol_id, photo.id, DerivativeKind::Thumb),
                set.thumb.clone(),
                DerivativeKind::Thumb.content_type(),
            )
            .await?;
        let gallery_url = self
            .store
            .put(
                &keys::derivative_key(protocol_id, photo.id, DerivativeKind::Gallery),
                set.gallery.clone(),
                DerivativeKind::Gallery.content_type(),
            )
            .await?;
        let pdf_url = self
            .store
            .put(
                &keys::derivative_key(protocol_id, photo.id, DerivativeKind::Pdf),
                set.pdf.clone(),
                DerivativeKind::Pdf.content_type(),
            )
            .await?;

        let savings = imaging::calculate_savings(&set.sizes);
        let record = DerivativeRecord {
            thumb_url,
            gallery_url,
            pdf_url,
            original_hash: set.hash.clone(),
            thumb_hash: hashing::strong_hash_hex(&set.thumb)?,
            gallery_hash: hashing::strong_hash_hex(&set.gallery)?,
            pdf_hash: hashing::strong_hash_hex(&set.pdf)?,
            original_size: set.sizes.original as i64,
            thumb_size: set.sizes.thumb as i64,
            gallery_size: set.sizes.gallery as i64,
            pdf_size: set.sizes.pdf as i64,
            savings: serde_json::to_value(&savings)
                .map_err(|e| PipelineError::Payload(e.to_string()))?,
        };
        PhotoRepo::upsert_migrated(
            &self.pool,
            &MigratePhoto {
                protocol_id,
                source_legacy_photo_id: photo.id,
                original_url,
                record,
            },
        )
        .await?;
        Ok(())
    }

    /// Copy the legacy PDF under a content-addressed key and record the
    /// move in the processing history.
    async fn migrate_pdf(&self, protocol_id: DbId, pdf_url: &str) -> Result<(), PipelineError> {
        let bytes = self.download_legacy(pdf_url).await?;
        let hash = hashing::strong_hash_hex(&bytes)?;
        let key = keys::migrated_pdf_key(protocol_id, &hash[..16]);
        let url = self.store.put(&key, bytes, "application/pdf").await?;

        ProcessingJobRepo::record(
            &self.pool,
            &RecordProcessingJob {
                protocol_id,
                job_type: JOB_TYPE_PDF_MIGRATION,
                status: "completed",
                result_url: Some(&url),
                error_message: None,
                metadata: Some(serde_json::json!({ "source_url": pdf_url, "hash": hash })),
            },
        )
        .await?;
        Ok(())
    }

    /// Legacy URLs are either plain HTTP or keys into our own storage.
    async fn download_legacy(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| PipelineError::Download {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            let bytes = response.bytes().await.map_err(|e| PipelineError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            return Ok(bytes.to_vec());
        }

        match keys::key_from_url(url) {
            Some(key) => Ok(self.store.get(&key).await?),
            None => Err(PipelineError::Download {
                url: url.to_string(),
                message: "url is neither http nor a storage key".into(),
            }),
        }
    }
}
