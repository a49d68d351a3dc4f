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

use std::time::Duration;

use thiserror::Error;

/// Raised by [`crate::backoff::poll_until`] when a polling loop exhausts its
/// deadline without the condition becoming true.
#[derive(Debug, Error)]
#[error("timed out waiting for {what} after {deadline:?}")]
pub struct TimeoutError {
    pub what: String,
    pub deadline: Duration,
}
