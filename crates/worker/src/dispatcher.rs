//! Lane dispatch: one claim loop per lane, each pulling jobs with
//! `FOR UPDATE SKIP LOCKED` so any number of worker processes can run
//! side by side without double-dispatch.

use std::sync::Arc;
use std::time::Duration;

use fleetdoc_db::models::queue_job::{QueueJob, LANE_DOCUMENT, LANE_PHOTO};
use fleetdoc_db::repositories::QueueJobRepo;
use fleetdoc_pipeline::derivative::{DerivativeService, QueueProgress};
use fleetdoc_pipeline::jobs::{self, JobPayload};
use fleetdoc_pipeline::manifest::ManifestService;
use fleetdoc_pipeline::pdf_build::PdfBuildService;
use fleetdoc_pipeline::PipelineError;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// The services a dispatcher drives, shared across lanes.
pub struct Services {
    pub derivative: DerivativeService,
    pub pdf_build: PdfBuildService,
    pub manifest: ManifestService,
}

pub struct Dispatcher {
    pool: PgPool,
    services: Arc<Services>,
    /// Claimant identity recorded on every job this process takes.
    worker_id: String,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(pool: PgPool, services: Arc<Services>, poll_interval_secs: u64) -> Self {
        Self {
            pool,
            services,
            worker_id: format!("worker-{}", uuid::Uuid::new_v4()),
            poll_interval: Duration::from_secs(poll_interval_secs),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Spawn one claim loop per lane. Loops drain their current job
    /// before honoring cancellation.
    pub fn spawn_lanes(self: &Arc<Self>, cancel: &CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        [LANE_PHOTO, LANE_DOCUMENT]
            .into_iter()
            .map(|lane| {
                let dispatcher = Arc::clone(self);
                let cancel = cancel.clone();
                tokio::spawn(async move { dispatcher.run_lane(lane, cancel).await })
            })
            .collect()
    }

    async fn run_lane(&self, lane: &'static str, cancel: CancellationToken) {
        tracing::info!(lane, worker_id = %self.worker_id, "lane dispatcher started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match QueueJobRepo::claim_next(&self.pool, lane, &self.worker_id).await {
                Ok(Some(job)) => self.handle(job).await,
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(lane, error = %e, "claim failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
        tracing::info!(lane, "lane dispatcher stopped");
    }

    /// Execute one claimed job and settle its terminal state. A job
    /// failure is recorded verbatim and never retried automatically.
    async fn handle(&self, job: QueueJob) {
        let job_id = job.id;
        tracing::info!(job_id, job_type = job.job_type, lane = job.lane, "job claimed");

        let outcome = match jobs::parse_payload(&job) {
            Ok(payload) => self.execute(job_id, payload).await,
            Err(e) => Err(e),
        };

        let settle = match outcome {
            Ok(()) => QueueJobRepo::complete(&self.pool, job_id).await,
            Err(e) => {
                let message = e.to_string();
                tracing::error!(job_id, error = %message, "job failed");
                QueueJobRepo::fail(&self.pool, job_id, &message).await
            }
        };
        if let Err(e) = settle {
            tracing::error!(job_id, error = %e, "failed to settle job state");
        }
    }

    async fn execute(&self, job_id: i64, payload: JobPayload) -> Result<(), PipelineError> {
        match payload {
            JobPayload::GenerateDerivatives {
                protocol_id,
                photo_id,
                user_id: _,
            } => {
                let sink = QueueProgress::new(self.pool.clone(), job_id, photo_id);
                self.services
                    .derivative
                    .process_photo(protocol_id, photo_id, &sink)
                    .await?;
            }
            JobPayload::BuildProtocolPdf { protocol_id, data } => {
                self.services
                    .pdf_build
                    .build_protocol_pdf(protocol_id, &data)
                    .await?;
            }
            JobPayload::BulkPdfBuild { requests } => {
                let outcome = self.services.pdf_build.bulk_build(&requests).await;
                if outcome.failed > 0 {
                    return Err(PipelineError::Payload(format!(
                        "{} of {} protocol documents failed",
                        outcome.failed, outcome.total
                    )));
                }
            }
            JobPayload::GenerateManifest {
                protocol_id,
                photo_ids,
            } => {
                let protocol = fleetdoc_db::repositories::ProtocolRepo::find_by_id(
                    &self.pool,
                    protocol_id,
                )
                .await?
                .ok_or(PipelineError::ProtocolNotFound(protocol_id))?;
                let protocol_type =
                    fleetdoc_core::types::ProtocolType::from_str(&protocol.protocol_type)
                        .ok_or_else(|| {
                            PipelineError::Payload(format!(
                                "unknown protocol type: {}",
                                protocol.protocol_type
                            ))
                        })?;
                self.services
                    .manifest
                    .generate(protocol_id, protocol_type, &photo_ids)
                    .await?;
            }
            JobPayload::VerifyManifest {
                protocol_id,
                manifest_url,
            } => {
                let report = self
                    .services
                    .manifest
                    .verify(protocol_id, &manifest_url)
                    .await?;
                if !report.verified {
                    return Err(PipelineError::Payload(format!(
                        "manifest verification found {} issue(s)",
                        report.issues.len()
                    )));
                }
            }
        }
        Ok(())
    }
}
