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

//! The destination object store client and the bulk transfer orchestrator
//! that copies data files into it out-of-band from metadata staging.

pub mod gcs;
pub mod mem;
pub mod store;
pub mod transfer;

pub use gcs::GcsObjectStore;
pub use mem::MemObjectStore;
pub use store::{DestinationStoreClient, ObjectMetadata, ObjectStore, ObjectStoreError, EXPORT_COMPLETED_KEY};
pub use transfer::{TransferError, TransferJobSpec, TransferOrchestrator};
