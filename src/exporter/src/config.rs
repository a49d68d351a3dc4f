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

//! Process configuration, read from the environment with `clap`'s `env`
//! derive so a missing required value fails fast at startup with a
//! readable message rather than surfacing later as a confusing request
//! error.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "exporter", about = "Experiment export worker")]
pub struct Config {
    /// Full AMQP broker URL. Takes precedence over `RABBIT_HOST`/`RABBIT_PORT`.
    #[arg(long, env = "RABBIT_URL")]
    pub rabbit_url: Option<String>,

    #[arg(long, env = "RABBIT_HOST", default_value = "localhost")]
    pub rabbit_host: String,

    #[arg(long, env = "RABBIT_PORT", default_value_t = 5672)]
    pub rabbit_port: u16,

    /// Base URL of the metadata repository (the ingest API).
    #[arg(long, env = "INGEST_API")]
    pub ingest_api_base_url: String,

    /// Base URL of the export job coordinator; defaults to the ingest API
    /// when the job tracker is served from the same host.
    #[arg(long, env = "EXPORT_JOB_COORDINATOR_URL")]
    pub coordinator_base_url: Option<String>,

    #[arg(long, env = "TRANSFER_SERVICE_URL")]
    pub transfer_service_base_url: String,

    /// Project the bulk transfer service bills/scopes jobs under.
    #[arg(long, env = "TRANSFER_PROJECT_ID")]
    pub transfer_project_id: String,

    #[arg(long, env = "DESTINATION_BUCKET")]
    pub destination_bucket: String,

    #[arg(long, env = "DESTINATION_PREFIX", default_value = "")]
    pub destination_prefix: String,

    /// Skips declaring and consuming the manifest-path queue entirely.
    #[arg(long, env = "DISABLE_MANIFEST", default_value_t = false)]
    pub disable_manifest: bool,

    #[arg(long, env = "WORKER_CONCURRENCY", default_value_t = 4)]
    pub worker_concurrency: usize,

    #[arg(long, env = "TRANSFER_POLL_INITIAL_SECONDS", default_value_t = 5)]
    pub transfer_poll_initial_seconds: u64,

    #[arg(long, env = "TRANSFER_POLL_MAX_SECONDS", default_value_t = 3600)]
    pub transfer_poll_max_seconds: u64,
}

impl Config {
    pub fn broker_url(&self) -> String {
        self.rabbit_url
            .clone()
            .unwrap_or_else(|| format!("amqp://{}:{}/%2f", self.rabbit_host, self.rabbit_port))
    }

    pub fn coordinator_base_url(&self) -> String {
        self.coordinator_base_url.clone().unwrap_or_else(|| self.ingest_api_base_url.clone())
    }

    pub fn manifest_post_url(&self) -> String {
        format!("{}/bundleManifests", self.ingest_api_base_url.trim_end_matches('/'))
    }

    pub fn transfer_poll_initial(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.transfer_poll_initial_seconds)
    }

    pub fn transfer_poll_max(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.transfer_poll_max_seconds)
    }
}
