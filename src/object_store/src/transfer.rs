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

//! Creates and polls a bulk source-to-destination data-file transfer job,
//! keyed by export-job id so two workers racing to export the same
//! submission converge on a single external transfer.

use std::sync::Arc;
use std::time::Duration;

use exporter_common::{poll_until, BackoffConfig, TimeoutError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The transfer job's name is derivable from the export job id alone:
/// `transferJobs/<export_job_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferJobSpec {
    pub name: String,
    pub source_bucket: String,
    pub source_path: String,
    pub destination_bucket: String,
    pub destination_prefix: String,
    /// `false`: "do not overwrite existing" transfer option.
    pub overwrite_existing: bool,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer service request failed: {0}")]
    Transport(String),
    #[error("transfer job {job_name} did not complete: {source}")]
    Timeout { job_name: String, #[source] source: TimeoutError },
}

#[derive(Debug, Deserialize)]
struct TransferOperation {
    done: bool,
}

#[derive(Debug, Deserialize, Default)]
struct TransferOperationsList {
    #[serde(default)]
    operations: Vec<TransferOperation>,
}

pub struct TransferOrchestrator {
    http: Arc<Client>,
    transfer_service_base_url: String,
    destination_bucket: String,
    destination_prefix: String,
    /// The project the external transfer service bills/scopes jobs under.
    transfer_project_id: String,
}

impl TransferOrchestrator {
    pub fn new(
        http: Arc<Client>,
        transfer_service_base_url: impl Into<String>,
        destination_bucket: impl Into<String>,
        destination_prefix: impl Into<String>,
        transfer_project_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            transfer_service_base_url: transfer_service_base_url.into(),
            destination_bucket: destination_bucket.into(),
            destination_prefix: destination_prefix.into(),
            transfer_project_id: transfer_project_id.into(),
        }
    }

    /// Attempts to create the transfer job. `created = false` means the
    /// job already existed and the caller is now just an observer.
    pub async fn ensure_transfer(
        &self,
        source_bucket: &str,
        source_path: &str,
        project: Uuid,
        export_job_id: &str,
    ) -> Result<(TransferJobSpec, bool), TransferError> {
        let spec = TransferJobSpec {
            name: format!("transferJobs/{export_job_id}"),
            source_bucket: source_bucket.to_string(),
            source_path: format!("{}/", source_path.trim_end_matches('/')),
            destination_bucket: self.destination_bucket.clone(),
            destination_prefix: format!(
                "{}/{}/data/",
                self.destination_prefix.trim_end_matches('/'),
                project
            ),
            overwrite_existing: false,
        };

        let url = format!("{}/transferJobs", self.transfer_service_base_url);
        let response = self
            .http
            .post(&url)
            .json(&spec)
            .send()
            .await
            .map_err(|e| TransferError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::CONFLICT => Ok((spec, false)),
            s if s.is_success() => Ok((spec, true)),
            s => Err(TransferError::Transport(format!("create transfer job failed with {s}"))),
        }
    }

    /// Polls the transfer-operations endpoint, backing off exponentially
    /// but never sleeping longer than 10 minutes between polls, to respect
    /// the external rate quota. A 429 from the poll itself is treated the
    /// same as "not done yet" and simply widens the next wait.
    pub async fn wait_for_completion(
        &self,
        job_name: &str,
        initial: Duration,
        max: Duration,
    ) -> Result<(), TransferError> {
        let cfg = BackoffConfig::new(initial, Duration::from_secs(600), max);
        poll_until(&format!("transfer job {job_name}"), cfg, || self.poll_once(job_name))
            .await
            .map_err(|source| TransferError::Timeout { job_name: job_name.to_string(), source })
    }

    async fn poll_once(&self, job_name: &str) -> Option<()> {
        let url = format!(
            "{}/transferOperations?filter={}",
            self.transfer_service_base_url,
            serde_json::json!({ "project_id": self.transfer_project_id, "job_names": [job_name] })
        );
        let response = self.http.get(&url).send().await.ok()?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS || !response.status().is_success() {
            return None;
        }
        let body: TransferOperationsList = response.json().await.unwrap_or_default();
        let first = body.operations.first()?;
        first.done.then_some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_job_name_is_derivable_from_export_job_id() {
        let spec = TransferJobSpec {
            name: format!("transferJobs/{}", "job-42"),
            source_bucket: "src".into(),
            source_path: "a/".into(),
            destination_bucket: "dst".into(),
            destination_prefix: "staging/proj/data/".into(),
            overwrite_existing: false,
        };
        assert_eq!(spec.name, "transferJobs/job-42");
    }
}
