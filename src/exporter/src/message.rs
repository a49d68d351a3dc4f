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

//! Wire shapes of the two message types the listener consumes.

use serde::Deserialize;
use uuid::Uuid;

/// `ingest.exporter.experiment.submitted`. Field names are the broker's,
/// not ours: `document_id` is the assay process id recorded with the
/// coordinator, `document_uuid` is the uuid used to fetch the process
/// itself, `envelope_uuid`/`bundle_uuid` name the submission and the
/// experiment (bundle) respectively.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentMessage {
    pub document_id: String,
    pub document_uuid: Uuid,
    pub envelope_uuid: Uuid,
    pub bundle_uuid: Uuid,
    pub version_timestamp: String,
    pub index: u32,
    pub total: u32,
    pub export_job_id: String,
}

/// `ingest.exporter.manifest.submitted`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleUpdateMessage {
    pub callback_links: Vec<String>,
    pub envelope_uuid: Uuid,
    pub index: u32,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_experiment_message_wire_shape() {
        let body = serde_json::json!({
            "documentId": "https://api.example.org/processes/1",
            "documentUuid": "11111111-1111-1111-1111-111111111111",
            "envelopeUuid": "22222222-2222-2222-2222-222222222222",
            "bundleUuid": "33333333-3333-3333-3333-333333333333",
            "versionTimestamp": "2024-01-01T00:00:00.000000Z",
            "index": 1,
            "total": 4,
            "exportJobId": "job-42",
        });
        let msg: ExperimentMessage = serde_json::from_value(body).unwrap();
        assert_eq!(msg.export_job_id, "job-42");
        assert_eq!(msg.total, 4);
    }

    #[test]
    fn parses_simple_update_message_wire_shape() {
        let body = serde_json::json!({
            "callbackLinks": ["https://api.example.org/biomaterials/1"],
            "envelopeUuid": "22222222-2222-2222-2222-222222222222",
            "index": 0,
            "total": 1,
        });
        let msg: SimpleUpdateMessage = serde_json::from_value(body).unwrap();
        assert_eq!(msg.callback_links.len(), 1);
    }

    #[test]
    fn missing_required_field_fails_to_parse() {
        let body = serde_json::json!({ "documentUuid": "11111111-1111-1111-1111-111111111111" });
        let result: Result<ExperimentMessage, _> = serde_json::from_value(body);
        assert!(result.is_err());
    }
}
