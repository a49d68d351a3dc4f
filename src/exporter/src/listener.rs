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

//! One AMQP connection, one topic exchange, and a bounded worker pool so a
//! slow export never blocks the connection's heartbeat. The dispatcher
//! itself does nothing but read deliveries and hand each one to the pool;
//! all business logic lives in [`crate::export::Exporter`] and
//! [`crate::manifest::ManifestExporter`].

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Semaphore;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{error, info, warn};

use crate::export::Exporter;
use crate::manifest::ManifestExporter;
use crate::message::{ExperimentMessage, SimpleUpdateMessage};

const EXCHANGE: &str = "ingest.exporter.exchange";
const EXPERIMENT_QUEUE: &str = "ingest.exporter.experiment.submitted.queue";
const EXPERIMENT_ROUTING_KEY: &str = "ingest.exporter.experiment.submitted";
const EXPERIMENT_EXPORTED_ROUTING_KEY: &str = "ingest.exporter.experiment.exported";
const MANIFEST_QUEUE: &str = "ingest.exporter.manifest.submitted.queue";
const MANIFEST_ROUTING_KEY: &str = "ingest.exporter.manifest.submitted";

/// `{interval_start=0s, interval_step=2s, interval_max=30s, max_retries=60}`.
fn publish_retry_strategy() -> impl Iterator<Item = Duration> {
    std::iter::once(Duration::ZERO)
        .chain(FixedInterval::new(Duration::from_secs(2)).map(|d| d.min(Duration::from_secs(30))))
        .take(61)
}

pub struct Listener {
    connection: Connection,
    exporter: Arc<Exporter>,
    manifest_exporter: Option<Arc<ManifestExporter>>,
    worker_permits: Arc<Semaphore>,
}

impl Listener {
    pub async fn connect(
        broker_url: &str,
        exporter: Exporter,
        manifest_exporter: Option<ManifestExporter>,
        worker_concurrency: usize,
    ) -> Result<Self, lapin::Error> {
        let connection = Connection::connect(
            broker_url,
            ConnectionProperties::default()
                .with_executor(tokio_executor_trait::Tokio::current())
                .with_reactor(tokio_reactor_trait::Tokio),
        )
        .await?;

        Ok(Self {
            connection,
            exporter: Arc::new(exporter),
            manifest_exporter: manifest_exporter.map(Arc::new),
            worker_permits: Arc::new(Semaphore::new(worker_concurrency)),
        })
    }

    /// Declares the exchange and queues, then consumes both streams
    /// concurrently until the connection closes or the process is killed.
    pub async fn run(self) -> Result<(), lapin::Error> {
        let channel = self.connection.create_channel().await?;
        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;

        let experiment_task = self.run_experiment_consumer(channel.clone());

        if let Some(manifest_exporter) = self.manifest_exporter.clone() {
            let manifest_task = Self::run_manifest_consumer(channel, manifest_exporter);
            tokio::try_join!(experiment_task, manifest_task)?;
        } else {
            experiment_task.await?;
        }
        Ok(())
    }

    async fn run_experiment_consumer(&self, channel: Channel) -> Result<(), lapin::Error> {
        channel.basic_qos(1, BasicQosOptions::default()).await?;
        channel
            .queue_declare(EXPERIMENT_QUEUE, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await?;
        channel
            .queue_bind(
                EXPERIMENT_QUEUE,
                EXCHANGE,
                EXPERIMENT_ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let mut consumer = channel
            .basic_consume(
                EXPERIMENT_QUEUE,
                "exporter.experiment",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    error!(error = %e, "experiment consumer delivery error");
                    continue;
                }
            };

            let permit = self.worker_permits.clone().acquire_owned().await.expect("semaphore never closed");
            let exporter = self.exporter.clone();
            let channel = channel.clone();

            tokio::spawn(async move {
                let _permit = permit;
                handle_experiment_message(&exporter, &channel, delivery).await;
            });
        }
        Ok(())
    }

    async fn run_manifest_consumer(channel: Channel, manifest_exporter: Arc<ManifestExporter>) -> Result<(), lapin::Error> {
        channel.basic_qos(1, BasicQosOptions::default()).await?;
        channel
            .queue_declare(MANIFEST_QUEUE, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await?;
        channel
            .queue_bind(MANIFEST_QUEUE, EXCHANGE, MANIFEST_ROUTING_KEY, QueueBindOptions::default(), FieldTable::default())
            .await?;

        let mut consumer = channel
            .basic_consume(MANIFEST_QUEUE, "exporter.manifest", BasicConsumeOptions::default(), FieldTable::default())
            .await?;

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    error!(error = %e, "manifest consumer delivery error");
                    continue;
                }
            };
            let manifest_exporter = manifest_exporter.clone();
            tokio::spawn(async move {
                handle_manifest_message(&manifest_exporter, delivery).await;
            });
        }
        Ok(())
    }
}

async fn handle_experiment_message(exporter: &Exporter, channel: &Channel, delivery: lapin::message::Delivery) {
    let body = delivery.data.clone();

    let message: ExperimentMessage = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "failed to parse experiment message, acknowledging without export");
            ack_delivery(&delivery).await;
            return;
        }
    };

    info!(process_uuid = %message.document_uuid, submission_uuid = %message.envelope_uuid, "received experiment message");

    let result = exporter
        .export(
            message.document_uuid,
            message.envelope_uuid,
            message.bundle_uuid,
            &message.version_timestamp,
            &message.export_job_id,
        )
        .await;

    match result {
        Ok(()) => {
            if let Err(e) = exporter.record_and_maybe_finalize(&message.export_job_id, &message.document_id).await {
                error!(error = %e, job_id = %message.export_job_id, "failed to record assay completion");
            }
            if let Err(e) = publish_completion(channel, &body).await {
                error!(error = %e, "failed to publish export completion after retries");
            }
        }
        Err(e) => {
            error!(error = %e, process_uuid = %message.document_uuid, "failed to export experiment");
            exporter.report_submission_error(message.envelope_uuid, &e, &body).await;
        }
    }

    ack_delivery(&delivery).await;
}

async fn handle_manifest_message(manifest_exporter: &ManifestExporter, delivery: lapin::message::Delivery) {
    let message: SimpleUpdateMessage = match serde_json::from_slice(&delivery.data) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "failed to parse manifest update message");
            ack_delivery(&delivery).await;
            return;
        }
    };

    info!(envelope_uuid = %message.envelope_uuid, links = message.callback_links.len(), "received manifest update message");

    if let Err(e) = manifest_exporter.export_update(&message.callback_links).await {
        error!(error = %e, envelope_uuid = %message.envelope_uuid, "failed to export manifest update");
    }

    ack_delivery(&delivery).await;
}

async fn ack_delivery(delivery: &lapin::message::Delivery) {
    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
        error!(error = %e, "failed to ack delivery");
    }
}

async fn publish_completion(channel: &Channel, body: &[u8]) -> Result<(), lapin::Error> {
    Retry::spawn(publish_retry_strategy(), || async {
        channel
            .basic_publish(
                EXCHANGE,
                EXPERIMENT_EXPORTED_ROUTING_KEY,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default(),
            )
            .await?
            .await?;
        Ok::<_, lapin::Error>(())
    })
    .await
}
