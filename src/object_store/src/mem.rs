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

//! An in-process [`ObjectStore`] backend for tests. Mirrors the
//! write-once-then-patch-metadata semantics a real bucket gives us, so
//! [`crate::store::DestinationStoreClient`] can be exercised without a
//! network dependency.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::store::{ObjectMetadata, ObjectStore, ObjectStoreError};

#[derive(Clone)]
struct Entry {
    bytes: Bytes,
    user_metadata: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemObjectStore {
    objects: Mutex<HashMap<String, Entry>>,
}

impl MemObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemObjectStore {
    async fn put_if_absent(&self, key: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.lock();
        if objects.contains_key(key) {
            return Err(ObjectStoreError::PreconditionFailed(key.to_string()));
        }
        objects.insert(key.to_string(), Entry { bytes, user_metadata: HashMap::new() });
        Ok(())
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, ObjectStoreError> {
        let objects = self.objects.lock();
        Ok(objects.get(key).map(|e| ObjectMetadata {
            size: e.bytes.len() as u64,
            user_metadata: e.user_metadata.clone(),
        }))
    }

    async fn set_user_metadata(
        &self,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.lock();
        let entry = objects
            .get_mut(key)
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))?;
        entry.user_metadata = metadata;
        Ok(())
    }

    async fn rename(&self, source_key: &str, dest_key: &str) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.lock();
        let entry = objects
            .remove(source_key)
            .ok_or_else(|| ObjectStoreError::NotFound(source_key.to_string()))?;
        objects.insert(dest_key.to_string(), entry);
        Ok(())
    }
}
