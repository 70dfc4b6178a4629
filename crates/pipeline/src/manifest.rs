//! Manifest generation and verification.
//!
//! Generation reads the stored hash and size columns, so producing a
//! manifest never re-downloads photo bytes. Verification is the
//! inverse: it re-fetches every original and checks it against the
//! hash the manifest recorded, collecting every discrepancy instead of
//! stopping at the first.

use std::sync::Arc;

use fleetdoc_core::hashing::{self, EntryHashes, EntrySizes, FileManifestEntry};
use fleetdoc_core::manifest;
use fleetdoc_core::types::{DbId, ProtocolType};
use fleetdoc_db::models::photo::PhotoDerivative;
use fleetdoc_db::models::processing_job::{RecordProcessingJob, JOB_TYPE_MANIFEST};
use fleetdoc_db::repositories::{PhotoRepo, ProcessingJobRepo};
use fleetdoc_storage::{keys, ObjectStore};
use serde::Serialize;
use sqlx::PgPool;

use crate::PipelineError;

#[derive(Debug, Clone, Serialize)]
pub struct ManifestOutcome {
    pub url: String,
    pub hash: String,
    pub photo_count: usize,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub verified: bool,
    pub checked: usize,
    pub issues: Vec<String>,
}

pub struct ManifestService {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
}

impl ManifestService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, store }
    }

    /// Build and upload the manifest for a protocol. With an empty
    /// `photo_ids` every photo of the protocol is included.
    pub async fn generate(
        &self,
        protocol_id: DbId,
        protocol_type: ProtocolType,
        photo_ids: &[DbId],
    ) -> Result<ManifestOutcome, PipelineError> {
        match self.generate_inner(protocol_id, protocol_type, photo_ids).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = e.to_string();
                tracing::error!(protocol_id, error = %message, "manifest generation failed");
                let record = ProcessingJobRepo::record(
                    &self.pool,
                    &RecordProcessingJob {
                        protocol_id,
                        job_type: JOB_TYPE_MANIFEST,
                        status: "failed",
                        result_url: None,
                        error_message: Some(&message),
                        metadata: None,
                    },
                )
                .await;
                if let Err(db_err) = record {
                    tracing::warn!(protocol_id, error = %db_err, "failed to record manifest failure");
                }
                Err(e)
            }
        }
    }

    async fn generate_inner(
        &self,
        protocol_id: DbId,
        protocol_type: ProtocolType,
        photo_ids: &[DbId],
    ) -> Result<ManifestOutcome, PipelineError> {
        let rows = PhotoRepo::list_by_protocol(&self.pool, protocol_id).await?;
        let selected: Vec<&PhotoDerivative> = rows
            .iter()
            .filter(|row| photo_ids.is_empty() || photo_ids.contains(&row.photo_id))
            .collect();

        let mut entries = Vec::with_capacity(selected.len());
        for row in selected {
            match self.entry_for(row).await? {
                Some(entry) => entries.push(entry),
                None => {
                    tracing::warn!(
                        photo_id = row.photo_id,
                        status = row.status,
                        "photo has incomplete derivatives, excluded from manifest"
                    );
                }
            }
        }
        if entries.is_empty() {
            return Err(PipelineError::NoPhotos);
        }

        let built = manifest::build(protocol_id, protocol_type, chrono::Utc::now(), entries);
        let encoded = manifest::encode(&built)?;
        let photo_count = built.photos.len();
        let size = encoded.bytes.len() as u64;

        let key = keys::manifest_key(protocol_id, &encoded.short_hash);
        let url = self
            .store
            .put(&key, encoded.bytes, "application/json")
            .await?;

        let metadata = serde_json::json!({
            "hash": encoded.hash,
            "photo_count": photo_count,
            "size": size,
        });
        ProcessingJobRepo::record(
            &self.pool,
            &RecordProcessingJob {
                protocol_id,
                job_type: JOB_TYPE_MANIFEST,
                status: "completed",
                result_url: Some(&url),
                error_message: None,
                metadata: Some(metadata),
            },
        )
        .await?;

        tracing::info!(protocol_id, photo_count, size, "manifest generated");
        Ok(ManifestOutcome {
            url,
            hash: encoded.hash,
            photo_count,
            size,
        })
    }

    /// Re-fetch every original a manifest names and check its hash.
    pub async fn verify(
        &self,
        protocol_id: DbId,
        manifest_url: &str,
    ) -> Result<VerificationReport, PipelineError> {
        let key = keys::key_from_url(manifest_url).ok_or_else(|| PipelineError::Download {
            url: manifest_url.to_string(),
            message: "manifest url does not resolve to a storage key".into(),
        })?;
        let bytes = self.store.get(&key).await?;
        let parsed: manifest::PhotoManifest = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::Payload(format!("manifest unparsable: {e}")))?;

        let mut issues = Vec::new();
        let checked = parsed.photos.len();
        for entry in &parsed.photos {
            if let Some(issue) = self.verify_entry(entry).await? {
                issues.push(issue);
            }
        }

        let report = VerificationReport {
            verified: issues.is_empty(),
            checked,
            issues,
        };
        tracing::info!(
            protocol_id,
            checked = report.checked,
            issues = report.issues.len(),
            "manifest verified"
        );
        Ok(report)
    }

    async fn verify_entry(
        &self,
        entry: &FileManifestEntry,
    ) -> Result<Option<String>, PipelineError> {
        let Some(row) = PhotoRepo::find_by_id(&self.pool, entry.photo_id).await? else {
            return Ok(Some(format!("photo {} no longer exists", entry.photo_id)));
        };

        let Some(key) = keys::key_from_url(&row.original_url) else {
            return Ok(Some(format!(
                "photo {} original url is not a storage key: {}",
                entry.photo_id, row.original_url
            )));
        };
        let data = match self.store.get(&key).await {
            Ok(data) => data,
            Err(fleetdoc_storage::StorageError::NotFound { .. }) => {
                return Ok(Some(format!("photo {} original object missing", entry.photo_id)));
            }
            Err(e) => return Err(e.into()),
        };

        if !hashing::verify_integrity(&data, &entry.hashes.original)? {
            return Ok(Some(format!("photo {} original hash mismatch", entry.photo_id)));
        }
        Ok(None)
    }

    /// Entry from stored columns; `None` until all renditions exist.
    async fn entry_for(
        &self,
        row: &PhotoDerivative,
    ) -> Result<Option<FileManifestEntry>, PipelineError> {
        let (Some(original_hash), Some(thumb_hash), Some(gallery_hash), Some(pdf_hash)) = (
            row.original_hash.clone(),
            row.thumb_hash.clone(),
            row.gallery_hash.clone(),
            row.pdf_hash.clone(),
        ) else {
            return Ok(None);
        };
        let (Some(original_size), Some(thumb_size), Some(gallery_size), Some(pdf_size)) = (
            row.original_size,
            row.thumb_size,
            row.gallery_size,
            row.pdf_size,
        ) else {
            return Ok(None);
        };

        let metadata = PhotoRepo::find_metadata(&self.pool, row.photo_id).await?;
        Ok(Some(FileManifestEntry {
            photo_id: row.photo_id,
            hashes: EntryHashes {
                original: original_hash,
                thumb: thumb_hash,
                gallery: gallery_hash,
                pdf: pdf_hash,
            },
            sizes: EntrySizes {
                original: original_size as u64,
                thumb: thumb_size as u64,
                gallery: gallery_size as u64,
                pdf: pdf_size as u64,
            },
            metadata,
        }))
    }
}
