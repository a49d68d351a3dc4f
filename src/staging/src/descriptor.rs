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

//! The per-data-file descriptor staged alongside its metadata document.

use exporter_metadata::{DataFile, SchemaRef};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    pub file_id: Uuid,
    pub file_version: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub crc32c: Option<String>,
    pub s3_etag: Option<String>,
}

impl FileDescriptor {
    pub fn from_data_file(data_file: &DataFile) -> Self {
        Self {
            file_id: data_file.uuid,
            file_version: data_file.dcp_version.clone(),
            file_name: format!("{}_{}_{}", data_file.uuid, data_file.dcp_version, data_file.file_name),
            content_type: data_file.content_type.clone(),
            size: data_file.size,
            sha1: data_file.checksums.sha1.clone(),
            sha256: data_file.checksums.sha256.clone(),
            crc32c: data_file.checksums.crc32c.clone(),
            s3_etag: data_file.checksums.s3_etag.clone(),
        }
    }

    pub fn to_json(&self, schema: &SchemaRef) -> Value {
        json!({
            "describedBy": schema.schema_url,
            "schema_type": "file_descriptor",
            "schema_version": schema.schema_version,
            "file_id": self.file_id,
            "file_version": self.file_version,
            "file_name": self.file_name,
            "content_type": self.content_type,
            "size": self.size,
            "sha1": self.sha1,
            "sha256": self.sha256,
            "crc32c": self.crc32c,
            "s3_etag": self.s3_etag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exporter_metadata::Checksums;

    #[test]
    fn file_name_embeds_uuid_and_version() {
        let data_file = DataFile {
            uuid: Uuid::nil(),
            dcp_version: "2024-01-01T00:00:00.000Z".into(),
            file_name: "R1.fastq.gz".into(),
            cloud_url: "s3://bucket/key".into(),
            content_type: None,
            size: None,
            checksums: Checksums::default(),
            source_bucket: "bucket".into(),
            source_key: "key".into(),
        };
        let descriptor = FileDescriptor::from_data_file(&data_file);
        assert_eq!(
            descriptor.file_name,
            "00000000-0000-0000-0000-000000000000_2024-01-01T00:00:00.000Z_R1.fastq.gz"
        );
    }
}
