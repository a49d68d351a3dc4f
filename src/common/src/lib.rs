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

//! Shared plumbing used by every crate in the exporter workspace: the
//! backoff/polling helper and the handful of error types that cut across
//! component boundaries.

pub mod backoff;
pub mod error;
pub mod telemetry;

pub use backoff::{poll_until, Backoff, BackoffConfig};
pub use error::TimeoutError;
