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

//! The manifest-path variant exporter. Given a set of metadata callback
//! links, builds an `AssayManifest` grouping uuids by metadata type and
//! POSTs it to the metadata repository. Never touches the transfer
//! orchestrator or the destination store.

use exporter_metadata::{MetadataResource, MetadataService, MetadataType};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ExportError;

/// `{biomaterials: [uuid], files: [uuid], processes: [uuid], protocols:
/// [uuid], dataFiles: [{uuid, fileName}]}`; grouped by metadata type with
/// a flattened data-file summary for the consumer that doesn't want to
/// re-derive it from `files`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssayManifest {
    pub biomaterials: Vec<Uuid>,
    pub files: Vec<Uuid>,
    pub processes: Vec<Uuid>,
    pub protocols: Vec<Uuid>,
    #[serde(rename = "dataFiles")]
    pub data_files: Vec<DataFileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataFileSummary {
    pub uuid: Uuid,
    pub file_name: String,
}

impl AssayManifest {
    pub fn from_resources(resources: &[MetadataResource]) -> Self {
        let mut manifest = AssayManifest::default();
        for resource in resources {
            match resource.metadata_type {
                MetadataType::Biomaterial => manifest.biomaterials.push(resource.uuid),
                MetadataType::Process => manifest.processes.push(resource.uuid),
                MetadataType::Protocol => manifest.protocols.push(resource.uuid),
                MetadataType::Project => {}
                MetadataType::File => {
                    manifest.files.push(resource.uuid);
                    if let Some(file_name) = resource.content.get("fileName").and_then(|v| v.as_str()) {
                        manifest.data_files.push(DataFileSummary {
                            uuid: resource.uuid,
                            file_name: file_name.to_string(),
                        });
                    }
                }
            }
        }
        manifest
    }
}

pub struct ManifestExporter {
    metadata: MetadataService,
    manifest_post_url: String,
}

impl ManifestExporter {
    pub fn new(metadata: MetadataService, manifest_post_url: impl Into<String>) -> Self {
        Self { metadata, manifest_post_url: manifest_post_url.into() }
    }

    /// `export_update`: fetches every callback link independently (a
    /// targeted re-export touches a handful of documents, not a whole
    /// graph) and posts the resulting manifest.
    pub async fn export_update(&self, callback_links: &[String]) -> Result<(), ExportError> {
        let mut resources = Vec::with_capacity(callback_links.len());
        for link in callback_links {
            resources.push(self.metadata.fetch(link).await?);
        }

        let manifest = AssayManifest::from_resources(&resources);
        self.post_manifest(&manifest).await
    }

    async fn post_manifest(&self, manifest: &AssayManifest) -> Result<(), ExportError> {
        let body: Value = serde_json::to_value(manifest).expect("AssayManifest always serializes");
        self.metadata
            .post_raw(&self.manifest_post_url, body)
            .await
            .map_err(ExportError::from)
    }
}
