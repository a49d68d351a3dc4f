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

//! Typed access to the metadata repository and schema registry: the two
//! external services the graph crawler and staging client read from.

pub mod client;
pub mod resource;
pub mod schema;

pub use client::{MetadataFetchError, MetadataService};
pub use resource::{Checksums, DataFile, MetadataParseError, MetadataResource, MetadataType, Provenance};
pub use schema::{SchemaKind, SchemaParseError, SchemaRef, SchemaService};
