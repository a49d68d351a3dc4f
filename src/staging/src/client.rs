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

//! Produces object keys, serializes metadata/descriptor/link documents
//! with their schema stamp, and streams the bytes to the destination
//! store. Also the entry point for the out-of-band data-file transfer.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use exporter_graph::LinkSet;
use exporter_metadata::{
    DataFile, MetadataParseError, MetadataResource, MetadataType, SchemaKind, SchemaParseError, SchemaService,
};
use exporter_object_store::{DestinationStoreClient, ObjectStoreError, TransferError, TransferJobSpec, TransferOrchestrator};
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::descriptor::FileDescriptor;
use crate::keys;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error(transparent)]
    Metadata(#[from] MetadataParseError),
    #[error(transparent)]
    Schema(#[from] SchemaParseError),
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("failed to serialize staged document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("staging area location `{0}` is not of the form <scheme>//<bucket>/<key>")]
    InvalidStagingLocation(String),
}

/// `must supply destination credentials, may supply schema cache`: a
/// configuration struct validated at construction so a half-built client
/// is never observable.
#[derive(Debug, Error)]
pub enum StagingConfigError {
    #[error("staging client is missing required field `{0}`")]
    MissingField(&'static str),
}

pub struct StagingClientBuilder {
    destination: Option<DestinationStoreClient>,
    transfer: Option<TransferOrchestrator>,
    schema_http: Option<Arc<reqwest::Client>>,
    schema_registry_url: Option<String>,
    schema_cache_ttl: Duration,
}

impl Default for StagingClientBuilder {
    fn default() -> Self {
        Self {
            destination: None,
            transfer: None,
            schema_http: None,
            schema_registry_url: None,
            schema_cache_ttl: Duration::from_secs(600),
        }
    }
}

impl StagingClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn destination(mut self, destination: DestinationStoreClient) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn transfer(mut self, transfer: TransferOrchestrator) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn schema_service(mut self, http: Arc<reqwest::Client>, registry_url: impl Into<String>) -> Self {
        self.schema_http = Some(http);
        self.schema_registry_url = Some(registry_url.into());
        self
    }

    /// Optional: overrides the default 600s schema cache TTL.
    pub fn schema_cache_ttl(mut self, ttl: Duration) -> Self {
        self.schema_cache_ttl = ttl;
        self
    }

    pub fn build(self) -> Result<StagingClient, StagingConfigError> {
        let destination = self.destination.ok_or(StagingConfigError::MissingField("destination"))?;
        let transfer = self.transfer.ok_or(StagingConfigError::MissingField("transfer"))?;
        let schema_http = self.schema_http.ok_or(StagingConfigError::MissingField("schema_service.http"))?;
        let schema_registry_url = self
            .schema_registry_url
            .ok_or(StagingConfigError::MissingField("schema_service.registry_url"))?;

        let schema = SchemaService::with_ttl(schema_http, schema_registry_url, self.schema_cache_ttl);

        Ok(StagingClient { destination, transfer, schema })
    }
}

pub struct StagingClient {
    destination: DestinationStoreClient,
    transfer: TransferOrchestrator,
    schema: SchemaService,
}

impl std::fmt::Debug for StagingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingClient").finish_non_exhaustive()
    }
}

impl StagingClient {
    pub fn builder() -> StagingClientBuilder {
        StagingClientBuilder::new()
    }

    /// Writes `m`'s content with `provenance` injected. Additionally
    /// writes the file descriptor when `m.metadata_type = file`.
    pub async fn write_metadata(&self, resource: &MetadataResource, project: Uuid) -> Result<(), StagingError> {
        let mut body = resource.content.clone();
        body["provenance"] = serde_json::to_value(&resource.provenance)?;

        let bytes = Bytes::from(serde_json::to_vec(&body)?);
        self.destination.write(&keys::metadata_key(project, resource), bytes).await?;

        if resource.metadata_type == MetadataType::File {
            self.write_file_descriptor(resource, project).await?;
        }
        Ok(())
    }

    pub async fn write_file_descriptor(&self, resource: &MetadataResource, project: Uuid) -> Result<(), StagingError> {
        let data_file = DataFile::from_resource(resource)?;
        let descriptor = FileDescriptor::from_data_file(&data_file);
        let schema = self.schema.latest(SchemaKind::FileDescriptor).await?;
        let body = descriptor.to_json(&schema);

        let bytes = Bytes::from(serde_json::to_vec(&body)?);
        self.destination
            .write(&keys::descriptor_key(project, resource), bytes)
            .await
            .map_err(Into::into)
    }

    pub async fn write_links(
        &self,
        links: &LinkSet,
        process_uuid: Uuid,
        process_version: &str,
        project: Uuid,
    ) -> Result<(), StagingError> {
        debug!(%process_uuid, link_count = links.len(), "writing links document");
        let schema = self.schema.latest(SchemaKind::Links).await?;
        let mut body = links.to_links_json();
        body["describedBy"] = json!(schema.schema_url);
        body["schema_version"] = json!(schema.schema_version);
        body["schema_type"] = json!("links");

        let bytes = Bytes::from(serde_json::to_vec(&body)?);
        self.destination
            .write(&keys::links_key(project, process_uuid, process_version), bytes)
            .await
            .map_err(Into::into)
    }

    /// Parses `staging_area_location` and delegates to the transfer
    /// orchestrator. Independent of, and not ordered against, the
    /// metadata writes above.
    pub async fn transfer_data_files(
        &self,
        staging_area_location: &str,
        project: Uuid,
        export_job_id: &str,
    ) -> Result<(TransferJobSpec, bool), StagingError> {
        let (bucket, first_segment) = parse_staging_location(staging_area_location)?;
        self.transfer
            .ensure_transfer(&bucket, &first_segment, project, export_job_id)
            .await
            .map_err(Into::into)
    }

    pub fn transfer(&self) -> &TransferOrchestrator {
        &self.transfer
    }
}

/// `<scheme>//<bucket>/<key>[/…]` -> `(bucket, first_path_segment)`.
fn parse_staging_location(location: &str) -> Result<(String, String), StagingError> {
    let after_scheme = location
        .split_once("//")
        .map(|(_, rest)| rest)
        .ok_or_else(|| StagingError::InvalidStagingLocation(location.to_string()))?;
    let mut parts = after_scheme.splitn(3, '/');
    let bucket = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StagingError::InvalidStagingLocation(location.to_string()))?;
    let first_segment = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StagingError::InvalidStagingLocation(location.to_string()))?;
    Ok((bucket.to_string(), first_segment.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_staging_area_location() {
        let (bucket, segment) = parse_staging_location("s3://source-bucket/submissions/abc/def").unwrap();
        assert_eq!(bucket, "source-bucket");
        assert_eq!(segment, "submissions");
    }

    #[test]
    fn rejects_location_without_scheme_separator() {
        assert!(parse_staging_location("not-a-url").is_err());
    }

    #[test]
    fn builder_requires_destination_and_transfer() {
        let err = StagingClientBuilder::new().build().unwrap_err();
        assert!(matches!(err, StagingConfigError::MissingField("destination")));
    }
}
