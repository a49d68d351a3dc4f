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

mod config;
mod error;
mod export;
mod listener;
mod manifest;
mod message;

use std::sync::Arc;

use clap::Parser;
use config::Config;
use export::Exporter;
use exporter_coordinator::CoordinatorClient;
use exporter_graph::GraphCrawler;
use exporter_metadata::MetadataService;
use exporter_object_store::{DestinationStoreClient, GcsObjectStore, TransferOrchestrator};
use exporter_staging::StagingClient;
use google_cloud_storage::client::{Client as GcsClient, ClientConfig};
use listener::Listener;
use manifest::ManifestExporter;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    exporter_common::telemetry::init_tracing("exporter=info,warn");

    let http = Arc::new(reqwest::Client::new());

    let gcs_config = ClientConfig::default().with_auth().await?;
    let gcs_client = GcsClient::new(gcs_config);
    let destination = DestinationStoreClient::new(
        Arc::new(GcsObjectStore::new(gcs_client, config.destination_bucket.clone())),
        config.destination_prefix.clone(),
    );
    let transfer = TransferOrchestrator::new(
        http.clone(),
        config.transfer_service_base_url.clone(),
        config.destination_bucket.clone(),
        config.destination_prefix.clone(),
        config.transfer_project_id.clone(),
    );

    let staging = StagingClient::builder()
        .destination(destination)
        .transfer(transfer)
        .schema_service(http.clone(), config.ingest_api_base_url.clone())
        .build()?;

    let metadata = MetadataService::new(http.clone());
    let crawler = GraphCrawler::new(metadata.clone());
    let coordinator = CoordinatorClient::new(http.clone(), config.coordinator_base_url());

    let exporter = Exporter::new(
        metadata.clone(),
        crawler,
        staging,
        coordinator,
        config.ingest_api_base_url.clone(),
        config.transfer_poll_initial(),
        config.transfer_poll_max(),
    );

    let manifest_exporter = if config.disable_manifest {
        None
    } else {
        Some(ManifestExporter::new(metadata, config.manifest_post_url()))
    };

    info!(broker = %config.broker_url(), worker_concurrency = config.worker_concurrency, "starting exporter");

    let listener = Listener::connect(&config.broker_url(), exporter, manifest_exporter, config.worker_concurrency).await?;
    listener.run().await?;

    Ok(())
}
