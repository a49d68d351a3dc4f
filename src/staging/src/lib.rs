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

//! Stages normalized metadata, file descriptors, and links documents into
//! the destination object store, and kicks off the out-of-band data-file
//! transfer.

pub mod client;
pub mod descriptor;
pub mod keys;

pub use client::{StagingClient, StagingClientBuilder, StagingConfigError, StagingError};
pub use descriptor::FileDescriptor;
