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

//! Object-key construction. Every artifact is prefixed `/<project_uuid>/...`
//! so key shape lives in one place rather than being inlined at each call
//! site.

use exporter_metadata::MetadataResource;
use uuid::Uuid;

pub fn metadata_key(project: Uuid, resource: &MetadataResource) -> String {
    format!(
        "{project}/metadata/{}/{}_{}.json",
        resource.concrete_type, resource.uuid, resource.dcp_version
    )
}

pub fn descriptor_key(project: Uuid, resource: &MetadataResource) -> String {
    format!(
        "{project}/descriptors/{}/{}_{}.json",
        resource.concrete_type, resource.uuid, resource.dcp_version
    )
}

pub fn links_key(project: Uuid, process_uuid: Uuid, process_version: &str) -> String {
    format!("{project}/links/{process_uuid}_{process_version}_{project}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn links_key_shape() {
        let project = Uuid::nil();
        let process = Uuid::nil();
        assert_eq!(
            links_key(project, process, "v1"),
            "00000000-0000-0000-0000-000000000000/links/00000000-0000-0000-0000-000000000000_v1_00000000-0000-0000-0000-000000000000.json"
        );
    }

    #[test]
    fn metadata_key_shape() {
        let project = Uuid::nil();
        let resource = MetadataResource::from_json(json!({
            "uuid": {"uuid": Uuid::nil().to_string()},
            "dcpVersion": "v1",
            "type": "biomaterial",
            "submissionDate": "2024-01-01T00:00:00.000Z",
            "updateDate": "2024-01-01T00:00:00.000Z",
            "content": {"describedBy": "https://schema.humancellatlas.org/type/biomaterial/5.0.0/donor_organism"},
        }))
        .unwrap();
        assert_eq!(
            metadata_key(project, &resource),
            "00000000-0000-0000-0000-000000000000/metadata/donor_organism/00000000-0000-0000-0000-000000000000_v1.json"
        );
    }
}
