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

use exporter_coordinator::CoordinatorError;
use exporter_metadata::{MetadataFetchError, MetadataParseError};
use exporter_staging::StagingError;
use thiserror::Error;

/// Everything that can go wrong processing one message. Every variant is
/// fatal to *this* message only; the worker keeps consuming afterward.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to parse message body: {0}")]
    MessageParse(String),
    #[error(transparent)]
    MetadataFetch(#[from] MetadataFetchError),
    #[error(transparent)]
    MetadataParse(#[from] MetadataParseError),
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    #[error("process {0} has no related project")]
    MissingProject(uuid::Uuid),
    #[error("submission {0} has no stagingDetails.stagingAreaLocation.value")]
    MissingStagingLocation(uuid::Uuid),
}
