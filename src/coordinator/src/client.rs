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

use std::sync::Arc;
use std::time::Duration;

use exporter_common::{poll_until, BackoffConfig, TimeoutError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("export job coordinator request failed: {0}")]
    Transport(String),
    #[error("export job {0} not found")]
    NotFound(String),
    #[error("waiting for data transfer of export job {job_id} timed out: {source}")]
    Timeout { job_id: String, #[source] source: TimeoutError },
}

/// The subset of job-tracker state the exporter reasons about; the
/// tracker itself owns the rest of the job document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Exporting,
    Exported,
    Failed,
}

#[derive(Debug, Deserialize)]
struct ExportJobContext {
    #[serde(rename = "expectedAssays", default)]
    expected_assays: u64,
    #[serde(rename = "dataTransferComplete", default)]
    data_transfer_complete: bool,
}

#[derive(Debug, Deserialize)]
struct ExportJob {
    context: ExportJobContext,
}

#[derive(Debug, Deserialize)]
struct EntityPage {
    #[serde(rename = "totalElements")]
    total_elements: u64,
}

#[derive(Debug, Deserialize)]
struct EntitiesResponse {
    page: EntityPage,
}

#[derive(Debug, Serialize)]
struct RecordAssayRequest<'a> {
    status: JobState,
    context: RecordAssayContext<'a>,
    errors: &'static [()],
}

#[derive(Debug, Serialize)]
struct RecordAssayContext<'a> {
    #[serde(rename = "assayProcessId")]
    assay_process_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SetJobStateRequest {
    status: JobState,
}

#[derive(Debug, Serialize)]
struct SetDataTransferCompleteRequest {
    context: SetDataTransferCompleteContext,
}

#[derive(Debug, Serialize)]
struct SetDataTransferCompleteContext {
    #[serde(rename = "dataTransferComplete")]
    data_transfer_complete: bool,
}

pub struct CoordinatorClient {
    http: Arc<Client>,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(http: Arc<Client>, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/exportJobs/{job_id}", self.base_url.trim_end_matches('/'))
    }

    fn entities_url(&self, job_id: &str) -> String {
        format!("{}/entities", self.job_url(job_id))
    }

    /// Idempotent: recording the same `assay_process_id` twice is a no-op
    /// from the tracker's perspective, since completions are counted by
    /// set membership there, not by request count.
    pub async fn record_assay(&self, job_id: &str, assay_process_id: &str) -> Result<(), CoordinatorError> {
        let url = self.entities_url(job_id);
        let response = self
            .http
            .post(&url)
            .json(&RecordAssayRequest {
                status: JobState::Exported,
                context: RecordAssayContext { assay_process_id },
                errors: &[],
            })
            .send()
            .await
            .map_err(|e| CoordinatorError::Transport(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(CoordinatorError::NotFound(job_id.to_string())),
            s => Err(CoordinatorError::Transport(format!("record assay for job {job_id} failed with {s}"))),
        }
    }

    async fn fetch_job(&self, job_id: &str) -> Result<ExportJob, CoordinatorError> {
        let response = self
            .http
            .get(self.job_url(job_id))
            .send()
            .await
            .map_err(|e| CoordinatorError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CoordinatorError::NotFound(job_id.to_string())),
            s if !s.is_success() => Err(CoordinatorError::Transport(format!("fetch job {job_id} failed with {s}"))),
            _ => response.json().await.map_err(|e| CoordinatorError::Transport(e.to_string())),
        }
    }

    async fn count_entities(&self, job_id: &str) -> Result<u64, CoordinatorError> {
        let response = self
            .http
            .get(self.entities_url(job_id))
            .send()
            .await
            .map_err(|e| CoordinatorError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CoordinatorError::NotFound(job_id.to_string())),
            s if !s.is_success() => {
                Err(CoordinatorError::Transport(format!("fetch entities for job {job_id} failed with {s}")))
            }
            _ => {
                let entities: EntitiesResponse =
                    response.json().await.map_err(|e| CoordinatorError::Transport(e.to_string()))?;
                Ok(entities.page.total_elements)
            }
        }
    }

    /// Compares the job's expected-vs-completed assay counts and, if they
    /// now match, transitions the job to `Exported`. Returns whether the
    /// job was finalized by this call, so the caller can decide whether to
    /// also kick off anything gated on job completion.
    pub async fn maybe_finalize(&self, job_id: &str) -> Result<bool, CoordinatorError> {
        let job = self.fetch_job(job_id).await?;
        let completed = self.count_entities(job_id).await?;
        if completed < job.context.expected_assays {
            return Ok(false);
        }

        let url = self.job_url(job_id);
        let response = self
            .http
            .patch(&url)
            .json(&SetJobStateRequest { status: JobState::Exported })
            .send()
            .await
            .map_err(|e| CoordinatorError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoordinatorError::Transport(format!(
                "finalize job {job_id} failed with {}",
                response.status()
            )));
        }
        info!(job_id, "export job finalized as EXPORTED");
        Ok(true)
    }

    pub async fn set_data_transfer_complete(&self, job_id: &str) -> Result<(), CoordinatorError> {
        let url = self.job_url(job_id);
        let response = self
            .http
            .patch(&url)
            .json(&SetDataTransferCompleteRequest {
                context: SetDataTransferCompleteContext { data_transfer_complete: true },
            })
            .send()
            .await
            .map_err(|e| CoordinatorError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoordinatorError::Transport(format!(
                "set data transfer complete for job {job_id} failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn is_data_transfer_complete(&self, job_id: &str) -> Result<bool, CoordinatorError> {
        Ok(self.fetch_job(job_id).await?.context.data_transfer_complete)
    }

    /// An observer that didn't win the race to create the bulk transfer
    /// polls this instead of the transfer service itself, so only the
    /// creator talks to the transfer API.
    pub async fn wait_for_data_transfer(
        &self,
        job_id: &str,
        initial: Duration,
        max: Duration,
    ) -> Result<(), CoordinatorError> {
        let cfg = BackoffConfig::new(initial, max, Duration::from_secs(24 * 3600));
        poll_until(&format!("data transfer completion of job {job_id}"), cfg, || async {
            self.is_data_transfer_complete(job_id).await.ok().filter(|&done| done).map(|_| ())
        })
        .await
        .map_err(|source| CoordinatorError::Timeout { job_id: job_id.to_string(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_url_strips_trailing_slash_on_base() {
        let http = Arc::new(Client::new());
        let client = CoordinatorClient::new(http, "https://ingest.example.org/");
        assert_eq!(client.job_url("job-42"), "https://ingest.example.org/exportJobs/job-42");
    }
}
