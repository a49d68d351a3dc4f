// Copyright 2026 The Exporter Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Orchestrates one experiment export: load process/project/submission,
//! reconcile the bulk data-file transfer, crawl the provenance graph, and
//! stage every node plus the links document.

use std::time::Duration;

use exporter_coordinator::CoordinatorClient;
use exporter_graph::GraphCrawler;
use exporter_metadata::MetadataService;
use exporter_staging::StagingClient;
use futures::TryStreamExt;
use tracing::error;
use uuid::Uuid;

use crate::error::ExportError;

pub struct Exporter {
    metadata: MetadataService,
    crawler: GraphCrawler,
    staging: StagingClient,
    coordinator: CoordinatorClient,
    ingest_api_base_url: String,
    transfer_poll_initial: Duration,
    transfer_poll_max: Duration,
}

impl Exporter {
    pub fn new(
        metadata: MetadataService,
        crawler: GraphCrawler,
        staging: StagingClient,
        coordinator: CoordinatorClient,
        ingest_api_base_url: impl Into<String>,
        transfer_poll_initial: Duration,
        transfer_poll_max: Duration,
    ) -> Self {
        Self {
            metadata,
            crawler,
            staging,
            coordinator,
            ingest_api_base_url: ingest_api_base_url.into(),
            transfer_poll_initial,
            transfer_poll_max,
        }
    }

    /// One full experiment export, as driven by the listener for an
    /// `ExperimentMessage`.
    pub async fn export(
        &self,
        process_uuid: Uuid,
        submission_uuid: Uuid,
        experiment_uuid: Uuid,
        experiment_version: &str,
        export_job_id: &str,
    ) -> Result<(), ExportError> {
        let process = self.metadata.fetch_by_uuid(&self.ingest_api_base_url, "processes", process_uuid).await?;
        let project = self
            .metadata
            .projects(&process)
            .try_next()
            .await?
            .ok_or(ExportError::MissingProject(process_uuid))?;

        // The experiment-message path always requests the data transfer; `export_data`
        // is also reachable on its own (mirrors the upstream export/export_data split)
        // for callers that want only this phase.
        let export_data_requested = true;
        let already_transferred = self.coordinator.is_data_transfer_complete(export_job_id).await?;
        if export_data_requested && !already_transferred {
            self.reconcile_data_transfer(submission_uuid, project.uuid, export_job_id).await?;
        }

        let graph = self.crawler.build_full(process, project.clone()).await?;

        for node in graph.nodes.iter() {
            self.staging.write_metadata(node, project.uuid).await?;
        }
        self.staging.write_links(&graph.links, experiment_uuid, experiment_version, project.uuid).await?;

        Ok(())
    }

    /// Reconciles just the bulk data-file transfer for a submission, without
    /// crawling the graph or writing metadata/links. A narrower counterpart
    /// to [`Exporter::export`] for callers that only need this phase.
    pub async fn export_data(&self, submission_uuid: Uuid, project_uuid: Uuid, export_job_id: &str) -> Result<(), ExportError> {
        let already_transferred = self.coordinator.is_data_transfer_complete(export_job_id).await?;
        if !already_transferred {
            self.reconcile_data_transfer(submission_uuid, project_uuid, export_job_id).await?;
        }
        Ok(())
    }

    /// Records the assay against the job tracker, then finalizes the job if
    /// that was the last outstanding assay. Called once per successful
    /// export, after staging completes.
    pub async fn record_and_maybe_finalize(&self, job_id: &str, assay_process_id: &str) -> Result<(), ExportError> {
        self.coordinator.record_assay(job_id, assay_process_id).await?;
        self.coordinator.maybe_finalize(job_id).await?;
        Ok(())
    }

    /// Best-effort: leaves a trail on the submission the operator is
    /// watching. Never returns an error itself, since it runs on the
    /// already-failed path and has nothing further to propagate to.
    pub async fn report_submission_error(&self, submission_uuid: Uuid, export_error: &ExportError, _raw_message: &[u8]) {
        let submission = match self
            .metadata
            .fetch_raw_by_uuid(&self.ingest_api_base_url, "submissionEnvelopes", submission_uuid)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, %submission_uuid, "failed to fetch submission to report export error");
                return;
            }
        };

        let Some(self_link) = submission.pointer("/_links/self/href").and_then(|v| v.as_str()) else {
            error!(%submission_uuid, "submission has no self link, cannot report export error");
            return;
        };

        let body = serde_json::json!({
            "type": "ExportError",
            "title": "experiment export failed",
            "detail": export_error.to_string(),
        });
        if let Err(e) = self.metadata.create_submission_error(self_link, body).await {
            error!(error = %e, %submission_uuid, "failed to create submission error");
        }
    }

    /// The "creator polls the transfer service; an observer polls the
    /// coordinator's flag instead" split: only the worker that actually
    /// created the external transfer job burns its rate quota on it.
    async fn reconcile_data_transfer(
        &self,
        submission_uuid: Uuid,
        project_uuid: Uuid,
        export_job_id: &str,
    ) -> Result<(), ExportError> {
        let submission =
            self.metadata.fetch_raw_by_uuid(&self.ingest_api_base_url, "submissionEnvelopes", submission_uuid).await?;
        let staging_area_location = submission
            .pointer("/stagingDetails/stagingAreaLocation/value")
            .and_then(|v| v.as_str())
            .ok_or(ExportError::MissingStagingLocation(submission_uuid))?;

        let (spec, created) = self.staging.transfer_data_files(staging_area_location, project_uuid, export_job_id).await?;

        if created {
            self.staging
                .transfer()
                .wait_for_completion(&spec.name, self.transfer_poll_initial, self.transfer_poll_max)
                .await
                .map_err(exporter_staging::StagingError::from)?;
            self.coordinator.set_data_transfer_complete(export_job_id).await?;
        } else {
            self.coordinator
                .wait_for_data_transfer(export_job_id, self.transfer_poll_initial, self.transfer_poll_max)
                .await?;
        }
        Ok(())
    }
}
