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

//! The document shapes the crawler and staging client trade in.
//!
//! Upstream metadata documents are effectively schema-less to us: we copy
//! `content` through untouched and only read a handful of well-known
//! fields off the raw payload. [`MetadataResource::from_json`] is the one
//! place that reaches into that payload, so parsing failures are loud and
//! localized rather than scattered across the crawler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataParseError {
    #[error("metadata document is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("metadata document has unrecognized type `{0}`")]
    UnknownType(String),
    #[error("describedBy URL `{0}` contains no semantic version")]
    NoSchemaVersion(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataType {
    Biomaterial,
    File,
    Process,
    Project,
    Protocol,
}

impl MetadataType {
    fn parse(raw: &str) -> Result<Self, MetadataParseError> {
        match raw {
            "biomaterial" => Ok(Self::Biomaterial),
            "file" => Ok(Self::File),
            "process" => Ok(Self::Process),
            "project" => Ok(Self::Project),
            "protocol" => Ok(Self::Protocol),
            other => Err(MetadataParseError::UnknownType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Biomaterial => "biomaterial",
            Self::File => "file",
            Self::Process => "process",
            Self::Project => "project",
            Self::Protocol => "protocol",
        }
    }
}

/// `{document_id, submission_date, update_date, schema_major_version, schema_minor_version}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub document_id: Uuid,
    pub submission_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    pub schema_major_version: u32,
    pub schema_minor_version: u32,
}

/// A single document retrieved from the metadata repository.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataResource {
    pub uuid: Uuid,
    pub dcp_version: String,
    pub metadata_type: MetadataType,
    pub concrete_type: String,
    pub content: serde_json::Value,
    pub provenance: Provenance,
    /// The untransformed payload, kept around so relation traversal can
    /// read `_links` without us having to model the whole HAL envelope.
    raw: serde_json::Value,
}

impl MetadataResource {
    pub fn from_json(raw: serde_json::Value) -> Result<Self, MetadataParseError> {
        let uuid_str = raw
            .pointer("/uuid/uuid")
            .and_then(|v| v.as_str())
            .ok_or(MetadataParseError::MissingField("uuid.uuid"))?;
        let uuid = Uuid::parse_str(uuid_str)
            .map_err(|_| MetadataParseError::MissingField("uuid.uuid"))?;

        let dcp_version = raw
            .get("dcpVersion")
            .and_then(|v| v.as_str())
            .ok_or(MetadataParseError::MissingField("dcpVersion"))?
            .to_string();

        let type_str = raw
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(MetadataParseError::MissingField("type"))?;
        let metadata_type = MetadataType::parse(type_str)?;

        let content = raw
            .get("content")
            .cloned()
            .ok_or(MetadataParseError::MissingField("content"))?;

        let described_by = content
            .get("describedBy")
            .and_then(|v| v.as_str())
            .ok_or(MetadataParseError::MissingField("content.describedBy"))?;

        let concrete_type = described_by
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(MetadataParseError::MissingField("content.describedBy"))?
            .to_string();

        let (schema_major_version, schema_minor_version) = parse_semver(described_by)?;

        let document_id = raw
            .get("uuid")
            .and_then(|v| v.get("uuid"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or(uuid);

        let submission_date = raw
            .get("submissionDate")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or(MetadataParseError::MissingField("submissionDate"))?;

        let update_date = raw
            .get("updateDate")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(submission_date);

        Ok(Self {
            uuid,
            dcp_version,
            metadata_type,
            concrete_type,
            content,
            provenance: Provenance {
                document_id,
                submission_date,
                update_date,
                schema_major_version,
                schema_minor_version,
            },
            raw,
        })
    }

    /// Follows `_links.<relation>.href` off the raw payload. Missing
    /// relations are a normal, expected shape (an empty result), never a
    /// parse error.
    pub fn relation_link(&self, relation: &str) -> Option<String> {
        self.raw
            .pointer(&format!("/_links/{relation}/href"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    pub fn self_link(&self) -> Option<String> {
        self.relation_link("self")
    }
}

fn parse_semver(described_by: &str) -> Result<(u32, u32), MetadataParseError> {
    for segment in described_by.split('/') {
        let mut parts = segment.split('.');
        let major = parts.next().and_then(|s| s.parse::<u32>().ok());
        let minor = parts.next().and_then(|s| s.parse::<u32>().ok());
        let patch_present = parts.next().map(|s| s.parse::<u32>().is_ok()).unwrap_or(false);
        if let (Some(major), Some(minor)) = (major, minor) {
            if patch_present {
                return Ok((major, minor));
            }
        }
    }
    Err(MetadataParseError::NoSchemaVersion(described_by.to_string()))
}

/// SHA1/SHA256/CRC32C/S3 ETag checksums for a data file. Any may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checksums {
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub crc32c: Option<String>,
    pub s3_etag: Option<String>,
}

impl Checksums {
    fn lowercased(self) -> Self {
        Self {
            sha1: self.sha1.map(|s| s.to_lowercase()),
            sha256: self.sha256.map(|s| s.to_lowercase()),
            crc32c: self.crc32c.map(|s| s.to_lowercase()),
            s3_etag: self.s3_etag,
        }
    }
}

/// Derived from a `file`-typed [`MetadataResource`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataFile {
    pub uuid: Uuid,
    pub dcp_version: String,
    pub file_name: String,
    pub cloud_url: String,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub checksums: Checksums,
    pub source_bucket: String,
    pub source_key: String,
}

impl DataFile {
    pub fn from_resource(resource: &MetadataResource) -> Result<Self, MetadataParseError> {
        if resource.metadata_type != MetadataType::File {
            return Err(MetadataParseError::MissingField("type=file"));
        }
        let content = &resource.content;

        let file_name = content
            .get("fileName")
            .and_then(|v| v.as_str())
            .ok_or(MetadataParseError::MissingField("content.fileName"))?
            .to_string();

        let cloud_url = content
            .get("cloudUrl")
            .and_then(|v| v.as_str())
            .ok_or(MetadataParseError::MissingField("content.cloudUrl"))?
            .to_string();

        let (source_bucket, source_key) = parse_cloud_url(&cloud_url)?;

        let content_type = content.get("contentType").and_then(|v| v.as_str()).map(String::from);
        let size = content.get("size").and_then(|v| v.as_u64());

        let checksums = content
            .get("checksums")
            .map(|c| Checksums {
                sha1: c.get("sha1").and_then(|v| v.as_str()).map(String::from),
                sha256: c.get("sha256").and_then(|v| v.as_str()).map(String::from),
                crc32c: c.get("crc32c").and_then(|v| v.as_str()).map(String::from),
                s3_etag: c.get("s3_etag").and_then(|v| v.as_str()).map(String::from),
            })
            .unwrap_or_default()
            .lowercased();

        Ok(Self {
            uuid: resource.uuid,
            dcp_version: resource.dcp_version.clone(),
            file_name,
            cloud_url,
            content_type,
            size,
            checksums,
            source_bucket,
            source_key,
        })
    }
}

/// `<scheme>//<bucket>/<key...>` -> `(bucket, rest-after-first-slash)`.
fn parse_cloud_url(cloud_url: &str) -> Result<(String, String), MetadataParseError> {
    let after_scheme = cloud_url
        .split_once("//")
        .map(|(_, rest)| rest)
        .ok_or(MetadataParseError::MissingField("content.cloudUrl"))?;
    let (bucket, key) = after_scheme
        .split_once('/')
        .ok_or(MetadataParseError::MissingField("content.cloudUrl"))?;
    Ok((bucket.to_string(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_raw(metadata_type: &str, concrete: &str) -> serde_json::Value {
        json!({
            "uuid": {"uuid": "11111111-1111-1111-1111-111111111111"},
            "dcpVersion": "2024-01-01T00:00:00.000Z",
            "type": metadata_type,
            "submissionDate": "2024-01-01T00:00:00.000Z",
            "updateDate": "2024-01-02T00:00:00.000Z",
            "content": {
                "describedBy": format!("https://schema.humancellatlas.org/type/biomaterial/5.1.0/{concrete}"),
            },
            "_links": {
                "self": {"href": "https://api.example.org/biomaterials/1"},
                "inputToProcesses": {"href": "https://api.example.org/biomaterials/1/inputToProcesses"},
            }
        })
    }

    #[test]
    fn parses_required_fields() {
        let resource = MetadataResource::from_json(sample_raw("biomaterial", "donor_organism")).unwrap();
        assert_eq!(resource.metadata_type, MetadataType::Biomaterial);
        assert_eq!(resource.concrete_type, "donor_organism");
        assert_eq!(resource.provenance.schema_major_version, 5);
        assert_eq!(resource.provenance.schema_minor_version, 1);
    }

    #[test]
    fn missing_uuid_is_loud() {
        let mut raw = sample_raw("biomaterial", "donor_organism");
        raw.as_object_mut().unwrap().remove("uuid");
        let err = MetadataResource::from_json(raw).unwrap_err();
        assert_eq!(err, MetadataParseError::MissingField("uuid.uuid"));
    }

    #[test]
    fn describedby_without_semver_is_rejected() {
        let mut raw = sample_raw("biomaterial", "donor_organism");
        raw["content"]["describedBy"] = json!("https://schema.humancellatlas.org/type/biomaterial/donor_organism");
        let err = MetadataResource::from_json(raw).unwrap_err();
        assert!(matches!(err, MetadataParseError::NoSchemaVersion(_)));
    }

    #[test]
    fn missing_relation_link_is_none_not_error() {
        let resource = MetadataResource::from_json(sample_raw("biomaterial", "donor_organism")).unwrap();
        assert!(resource.relation_link("derivedByProcesses").is_none());
        assert!(resource.relation_link("inputToProcesses").is_some());
    }

    fn sample_file_raw() -> serde_json::Value {
        let mut raw = sample_raw("file", "sequence_file");
        raw["content"]["fileName"] = json!("R1.fastq.gz");
        raw["content"]["cloudUrl"] = json!("s3://source-bucket/submissions/abc/R1.fastq.gz");
        raw["content"]["contentType"] = json!("application/gzip");
        raw["content"]["size"] = json!(1024);
        raw["content"]["checksums"] = json!({"sha1": "ABCDEF", "sha256": "123456", "s3_etag": "AbC123-2"});
        raw
    }

    #[test]
    fn data_file_parses_cloud_url_and_lowercases_checksums() {
        let resource = MetadataResource::from_json(sample_file_raw()).unwrap();
        let data_file = DataFile::from_resource(&resource).unwrap();
        assert_eq!(data_file.source_bucket, "source-bucket");
        assert_eq!(data_file.source_key, "submissions/abc/R1.fastq.gz");
        assert_eq!(data_file.checksums.sha1.as_deref(), Some("abcdef"));
        assert_eq!(data_file.checksums.crc32c, None);
        // s3_etag is opaque and case-sensitive; it must survive unmodified.
        assert_eq!(data_file.checksums.s3_etag.as_deref(), Some("AbC123-2"));
    }

    #[test]
    fn data_file_rejects_non_file_resource() {
        let resource = MetadataResource::from_json(sample_raw("biomaterial", "donor_organism")).unwrap();
        assert!(DataFile::from_resource(&resource).is_err());
    }
}
