//! Queue job payloads and lane routing.
//!
//! Payloads are a tagged union: the `type` discriminator doubles as
//! the broker's `job_type` column, so a claimed row deserializes
//! straight back into the enum.

use fleetdoc_core::types::DbId;
use fleetdoc_db::models::queue_job::{EnqueueJob, QueueJob, LANE_DOCUMENT, LANE_PHOTO};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::pdf_build::PdfJobData;
use crate::PipelineError;

/// Bulk PDF builds run in fixed batches of this size.
pub const BULK_PDF_BATCH_SIZE: usize = 3;

/// Concurrent photo operations per protocol during migration.
pub const MIGRATION_PHOTO_CONCURRENCY: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobPayload {
    GenerateDerivatives {
        protocol_id: DbId,
        photo_id: DbId,
        user_id: Option<String>,
    },
    BuildProtocolPdf {
        protocol_id: DbId,
        data: PdfJobData,
    },
    BulkPdfBuild {
        requests: Vec<BulkPdfRequest>,
    },
    GenerateManifest {
        protocol_id: DbId,
        photo_ids: Vec<DbId>,
    },
    VerifyManifest {
        protocol_id: DbId,
        manifest_url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkPdfRequest {
    pub protocol_id: DbId,
    pub data: PdfJobData,
}

impl JobPayload {
    /// The broker `job_type` string, identical to the serde tag.
    pub fn job_type(&self) -> &'static str {
        match self {
            Self::GenerateDerivatives { .. } => "generate-derivatives",
            Self::BuildProtocolPdf { .. } => "build-protocol-pdf",
            Self::BulkPdfBuild { .. } => "bulk-pdf-build",
            Self::GenerateManifest { .. } => "generate-manifest",
            Self::VerifyManifest { .. } => "verify-manifest",
        }
    }

    /// Lane routing is total over the payload enum: photo work rides
    /// the photo lane, everything document-shaped rides the other.
    pub fn lane(&self) -> &'static str {
        match self {
            Self::GenerateDerivatives { .. } => LANE_PHOTO,
            Self::BuildProtocolPdf { .. }
            | Self::BulkPdfBuild { .. }
            | Self::GenerateManifest { .. }
            | Self::VerifyManifest { .. } => LANE_DOCUMENT,
        }
    }
}

/// Serialize and enqueue a payload on its lane.
pub async fn enqueue(
    pool: &PgPool,
    payload: &JobPayload,
    priority: i32,
    delay_secs: i64,
) -> Result<QueueJob, PipelineError> {
    let serialized =
        serde_json::to_value(payload).map_err(|e| PipelineError::Payload(e.to_string()))?;
    let job = fleetdoc_db::repositories::QueueJobRepo::enqueue(
        pool,
        &EnqueueJob {
            lane: payload.lane(),
            job_type: payload.job_type(),
            payload: serialized,
            priority,
            delay_secs,
        },
    )
    .await?;
    tracing::debug!(job_id = job.id, job_type = job.job_type, lane = job.lane, "enqueued job");
    Ok(job)
}

/// Deserialize a claimed row's payload.
pub fn parse_payload(job: &QueueJob) -> Result<JobPayload, PipelineError> {
    serde_json::from_value(job.payload.clone()).map_err(|e| PipelineError::Payload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_matches_serde_tag() {
        let payload = JobPayload::GenerateDerivatives {
            protocol_id: 1,
            photo_id: 2,
            user_id: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], payload.job_type());
        assert_eq!(value["photo_id"], 2);
    }

    #[test]
    fn lane_routing_is_total() {
        let photo = JobPayload::GenerateDerivatives {
            protocol_id: 1,
            photo_id: 2,
            user_id: None,
        };
        assert_eq!(photo.lane(), LANE_PHOTO);

        let manifest = JobPayload::GenerateManifest {
            protocol_id: 1,
            photo_ids: vec![2],
        };
        assert_eq!(manifest.lane(), LANE_DOCUMENT);

        let verify = JobPayload::VerifyManifest {
            protocol_id: 1,
            manifest_url: "local://protocols/1/manifests/manifest_aa.json".into(),
        };
        assert_eq!(verify.lane(), LANE_DOCUMENT);
    }

    #[test]
    fn payload_roundtrips_through_json() {
        let payload = JobPayload::GenerateManifest {
            protocol_id: 9,
            photo_ids: vec![1, 2, 3],
        };
        let value = serde_json::to_value(&payload).unwrap();
        let back: JobPayload = serde_json::from_value(value).unwrap();
        match back {
            JobPayload::GenerateManifest { protocol_id, photo_ids } => {
                assert_eq!(protocol_id, 9);
                assert_eq!(photo_ids, vec![1, 2, 3]);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
