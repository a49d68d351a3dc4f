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

//! Typed accessor over the REST metadata repository (the ingest API).
//! Every relation is a paginated HAL collection; [`MetadataService::related`]
//! hides the paging behind a lazily-polled, restartable stream.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tracing::trace;

use crate::resource::{MetadataParseError, MetadataResource};

#[derive(Debug, Error)]
pub enum MetadataFetchError {
    #[error("request to {url} failed: {source}")]
    Transport { url: String, #[source] source: reqwest::Error },
    #[error("failed to parse metadata document from {url}: {source}")]
    Parse { url: String, #[source] source: MetadataParseError },
    #[error("failed to decode HAL page from {url}: {source}")]
    Decode { url: String, #[source] source: serde_json::Error },
}

/// Minimal HAL envelope: we only ever read `_embedded.<type>` and
/// `_links.next.href`, everything else is opaque `content`.
#[derive(Debug, serde::Deserialize)]
struct HalPage {
    #[serde(rename = "_embedded", default)]
    embedded: Option<serde_json::Value>,
    #[serde(rename = "_links", default)]
    links: Option<serde_json::Value>,
}

impl HalPage {
    fn items(&self, target_type: &str) -> Vec<serde_json::Value> {
        self.embedded
            .as_ref()
            .and_then(|e| e.get(target_type))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
    }

    fn next_href(&self) -> Option<String> {
        self.links
            .as_ref()
            .and_then(|l| l.pointer("/next/href"))
            .and_then(|v| v.as_str())
            .map(String::from)
    }
}

fn by_uuid_url(base_url: &str, entity_type: &str, uuid: uuid::Uuid) -> String {
    format!(
        "{}/{entity_type}/search/findByUuid?uuid={uuid}",
        base_url.trim_end_matches('/')
    )
}

#[derive(Clone)]
pub struct MetadataService {
    http: Arc<Client>,
}

impl MetadataService {
    pub fn new(http: Arc<Client>) -> Self {
        Self { http }
    }

    pub async fn fetch(&self, link: &str) -> Result<MetadataResource, MetadataFetchError> {
        let raw = self.get_json(link).await?;
        MetadataResource::from_json(raw)
            .map_err(|source| MetadataFetchError::Parse { url: link.to_string(), source })
    }

    /// Spring Data REST's `findByUuid` search convention: the entry point
    /// for a message handler that only has a bare uuid, no callback link.
    pub async fn fetch_by_uuid(
        &self,
        base_url: &str,
        entity_type: &str,
        uuid: uuid::Uuid,
    ) -> Result<MetadataResource, MetadataFetchError> {
        let link = by_uuid_url(base_url, entity_type, uuid);
        self.fetch(&link).await
    }

    /// Like [`fetch_by_uuid`](Self::fetch_by_uuid) but returns the raw
    /// document untouched. Submission envelopes don't have the
    /// `type`/`content` shape [`MetadataResource`] expects, so callers that
    /// only need `stagingDetails` or `_links.self` read the raw tree.
    pub async fn fetch_raw_by_uuid(
        &self,
        base_url: &str,
        entity_type: &str,
        uuid: uuid::Uuid,
    ) -> Result<serde_json::Value, MetadataFetchError> {
        self.get_json(&by_uuid_url(base_url, entity_type, uuid)).await
    }

    /// Posts a `{type, title, detail}` submission error to the submission's
    /// `self` link, so a poison message still leaves a trail on the
    /// submission the operator is watching.
    pub async fn create_submission_error(
        &self,
        submission_self_link: &str,
        error: serde_json::Value,
    ) -> Result<(), MetadataFetchError> {
        let url = format!("{}/submissionErrors", submission_self_link.trim_end_matches('/'));
        self.http
            .post(&url)
            .json(&error)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| MetadataFetchError::Transport { url, source })?;
        Ok(())
    }

    /// Posts an arbitrary JSON body to `url`. Used by the manifest path,
    /// the one caller that writes a document shape the typed model doesn't
    /// cover.
    pub async fn post_raw(&self, url: &str, body: serde_json::Value) -> Result<(), MetadataFetchError> {
        self.http
            .post(url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| MetadataFetchError::Transport { url: url.to_string(), source })?;
        Ok(())
    }

    pub fn projects<'a>(
        &'a self,
        process: &MetadataResource,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        self.related(process, "projects", "projects")
    }

    async fn get_json(&self, link: &str) -> Result<serde_json::Value, MetadataFetchError> {
        self.http
            .get(link)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| MetadataFetchError::Transport { url: link.to_string(), source })?
            .json()
            .await
            .map_err(|source| MetadataFetchError::Transport { url: link.to_string(), source })
    }

    /// Follows `relation` on `subject`'s raw payload, lazily paging through
    /// the `target_type` collection. A missing relation link yields an
    /// empty stream, never an error. Each call starts a fresh traversal
    /// from page one, so the returned stream is restartable by construction.
    pub fn related<'a>(
        &'a self,
        subject: &MetadataResource,
        relation: &'a str,
        target_type: &'a str,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        let Some(start) = subject.relation_link(relation) else {
            return stream::empty().boxed();
        };

        stream::unfold(Some(start), move |cursor| async move {
            let href = cursor?;
            let page = match self.get_json(&href).await {
                Ok(p) => p,
                Err(e) => return Some((vec![Err(e)], None)),
            };
            let page: HalPage = match serde_json::from_value(page) {
                Ok(p) => p,
                Err(source) => {
                    return Some((
                        vec![Err(MetadataFetchError::Decode { url: href.clone(), source })],
                        None,
                    ))
                }
            };
            let next = page.next_href();
            trace!(url = %href, has_next = next.is_some(), "fetched HAL page");
            let items: Vec<_> = page
                .items(target_type)
                .into_iter()
                .map(|raw| {
                    MetadataResource::from_json(raw)
                        .map_err(|source| MetadataFetchError::Parse { url: href.clone(), source })
                })
                .collect();
            Some((items, next))
        })
        .flat_map(stream::iter)
        .boxed()
    }

    pub fn input_biomaterials<'a>(
        &'a self,
        process: &MetadataResource,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        self.related(process, "inputBiomaterials", "biomaterials")
    }

    pub fn input_files<'a>(
        &'a self,
        process: &MetadataResource,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        self.related(process, "inputFiles", "files")
    }

    pub fn derived_biomaterials<'a>(
        &'a self,
        process: &MetadataResource,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        self.related(process, "derivedBiomaterials", "biomaterials")
    }

    pub fn derived_files<'a>(
        &'a self,
        process: &MetadataResource,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        self.related(process, "derivedFiles", "files")
    }

    pub fn protocols<'a>(
        &'a self,
        process: &MetadataResource,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        self.related(process, "protocols", "protocols")
    }

    pub fn derived_by_processes<'a>(
        &'a self,
        biomaterial_or_file: &MetadataResource,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        self.related(biomaterial_or_file, "derivedByProcesses", "processes")
    }

    pub fn input_to_processes<'a>(
        &'a self,
        biomaterial_or_file: &MetadataResource,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        self.related(biomaterial_or_file, "inputToProcesses", "processes")
    }

    pub fn supplementary_files<'a>(
        &'a self,
        project: &MetadataResource,
    ) -> BoxStream<'a, Result<MetadataResource, MetadataFetchError>> {
        self.related(project, "supplementaryFiles", "files")
    }
}
