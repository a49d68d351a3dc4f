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

//! Resolves the latest URL/version for the schemas we stamp onto staged
//! documents, behind a read-mostly TTL cache so a burst of exports for the
//! same project doesn't hammer the schema registry.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Links,
    FileDescriptor,
}

impl SchemaKind {
    fn concrete_entity(self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::FileDescriptor => "file_descriptor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRef {
    pub schema_url: String,
    pub schema_version: String,
}

#[derive(Debug, Error)]
pub enum SchemaParseError {
    #[error("schema registry request for {0:?} failed: {1}")]
    Transport(SchemaKindDebugHelper, #[source] reqwest::Error),
    #[error("schema registry has no schema for {0:?}")]
    NotFound(SchemaKindDebugHelper),
}

/// `SchemaKind` doesn't need to implement `Display`; this just lets the
/// error message embed a readable tag without leaking the enum as a public
/// `Debug` contract.
#[derive(Debug)]
pub struct SchemaKindDebugHelper(pub &'static str);

#[derive(Debug, Deserialize)]
struct SchemaRegistryResponse {
    #[serde(rename = "_links")]
    links: SchemaRegistryLinks,
    #[serde(rename = "schemaVersion")]
    schema_version: String,
}

#[derive(Debug, Deserialize)]
struct SchemaRegistryLinks {
    #[serde(rename = "json-schema")]
    json_schema: SchemaRegistryHref,
}

#[derive(Debug, Deserialize)]
struct SchemaRegistryHref {
    href: String,
}

pub struct SchemaService {
    http: Arc<Client>,
    registry_base_url: String,
    cache: Cache<&'static str, SchemaRef>,
}

impl SchemaService {
    pub fn new(http: Arc<Client>, registry_base_url: String) -> Self {
        Self::with_ttl(http, registry_base_url, Duration::from_secs(600))
    }

    pub fn with_ttl(http: Arc<Client>, registry_base_url: String, ttl: Duration) -> Self {
        Self {
            http,
            registry_base_url,
            cache: Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub async fn latest(&self, kind: SchemaKind) -> Result<SchemaRef, SchemaParseError> {
        let key = kind.concrete_entity();
        if let Some(hit) = self.cache.get(key).await {
            return Ok(hit);
        }

        let url = format!(
            "{}/schemas/search/findLatestByHighLevelEntityAndDomainEntityAndConcreteEntity?highLevelEntity=system&domainEntity=&concreteEntity={key}",
            self.registry_base_url
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SchemaParseError::Transport(SchemaKindDebugHelper(key), e))?;

        let parsed: SchemaRegistryResponse = response
            .json()
            .await
            .map_err(|e| SchemaParseError::Transport(SchemaKindDebugHelper(key), e))?;

        let schema_ref = SchemaRef {
            schema_url: parsed.links.json_schema.href,
            schema_version: parsed.schema_version,
        };
        self.cache.insert(key, schema_ref.clone()).await;
        Ok(schema_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_across_calls_with_same_key() {
        // A TTL long enough that a second `latest()` call within the test
        // is guaranteed to be a cache hit; we can't point at a real
        // registry here, so this only exercises the cache bookkeeping.
        let cache: Cache<&'static str, SchemaRef> =
            Cache::builder().time_to_live(Duration::from_secs(600)).build();
        let schema_ref = SchemaRef {
            schema_url: "https://schema.example.org/links/2.0.0/links".into(),
            schema_version: "2.0.0".into(),
        };
        cache.insert(SchemaKind::Links.concrete_entity(), schema_ref.clone()).await;
        let hit = cache.get(SchemaKind::Links.concrete_entity()).await;
        assert_eq!(hit, Some(schema_ref));
    }

    #[test]
    fn registry_response_reads_url_from_hal_link() {
        let body = serde_json::json!({
            "_links": {"json-schema": {"href": "https://some-schema-url"}},
            "schemaVersion": "1.2.3",
        });
        let parsed: SchemaRegistryResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.links.json_schema.href, "https://some-schema-url");
        assert_eq!(parsed.schema_version, "1.2.3");
    }
}
