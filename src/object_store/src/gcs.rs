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

//! Google Cloud Storage backend. The destination bucket the staging
//! client writes to, and the bucket the transfer job copies data files
//! from, are both plain GCS buckets reached through this client.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use google_cloud_storage::client::Client;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::patch::PatchObjectRequest;
use google_cloud_storage::http::objects::rewrite::RewriteObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::objects::Object;
use google_cloud_storage::http::Error as GcsError;

use crate::store::{ObjectMetadata, ObjectStore, ObjectStoreError};

pub struct GcsObjectStore {
    client: Client,
    bucket: String,
}

impl GcsObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }
}

fn classify(err: GcsError) -> ObjectStoreError {
    match &err {
        GcsError::Response(e) if e.code == 412 => ObjectStoreError::PreconditionFailed(e.message.clone()),
        GcsError::Response(e) if e.code == 404 => ObjectStoreError::NotFound(e.message.clone()),
        other => ObjectStoreError::Transport(other.to_string()),
    }
}

fn to_object_metadata(object: Object) -> ObjectMetadata {
    ObjectMetadata {
        size: object.size as u64,
        user_metadata: object.metadata.unwrap_or_default(),
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put_if_absent(&self, key: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        let upload_type = UploadType::Simple(Media::new(key.to_string()));
        let request = UploadObjectRequest {
            bucket: self.bucket.clone(),
            // `if_generation_match: Some(0)` is the GCS idiom for "create
            // only if no live generation exists at this name yet".
            if_generation_match: Some(0),
            ..Default::default()
        };
        self.client
            .upload_object(&request, bytes.to_vec(), &upload_type)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, ObjectStoreError> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            object: key.to_string(),
            ..Default::default()
        };
        match self.client.get_object(&request).await {
            Ok(object) => Ok(Some(to_object_metadata(object))),
            Err(err) => match classify(err) {
                ObjectStoreError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn set_user_metadata(
        &self,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        let request = PatchObjectRequest {
            bucket: self.bucket.clone(),
            object: key.to_string(),
            metadata: Some(Object {
                metadata: Some(metadata),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.client.patch_object(&request).await.map(|_| ()).map_err(classify)
    }

    async fn rename(&self, source_key: &str, dest_key: &str) -> Result<(), ObjectStoreError> {
        let request = RewriteObjectRequest {
            source_bucket: self.bucket.clone(),
            source_object: source_key.to_string(),
            destination_bucket: self.bucket.clone(),
            destination_object: dest_key.to_string(),
            ..Default::default()
        };
        self.client.rewrite_object(&request).await.map(|_| ()).map_err(classify)?;

        let delete = google_cloud_storage::http::objects::delete::DeleteObjectRequest {
            bucket: self.bucket.clone(),
            object: source_key.to_string(),
            ..Default::default()
        };
        self.client.delete_object(&delete).await.map_err(classify)
    }
}
