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

//! Traversal of the process-centric provenance DAG. Runs as an iterative
//! worklist rather than recursion: the DAG can be wide and deep, and
//! source-data cycles aren't ruled out, so we keep an explicit visited set
//! of process uuids instead of trusting the call stack to terminate.

use std::collections::HashSet;

use exporter_metadata::{MetadataFetchError, MetadataResource, MetadataService};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use tracing::trace;
use uuid::Uuid;

use crate::model::{EntityRef, ExperimentGraph, Link, ProcessLink, SupplementaryFileLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upward,
    Downward,
}

pub struct GraphCrawler {
    metadata: MetadataService,
}

impl GraphCrawler {
    pub fn new(metadata: MetadataService) -> Self {
        Self { metadata }
    }

    /// `upward.extend(downward).extend(supplementary)` for `process`
    /// rooted at `project`.
    pub async fn build_full(
        &self,
        process: MetadataResource,
        project: MetadataResource,
    ) -> Result<ExperimentGraph, MetadataFetchError> {
        let upward = self.crawl(process.clone(), Direction::Upward).await?;
        let downward = self.crawl(process, Direction::Downward).await?;
        let supplementary = self.build_supplementary(project).await?;
        Ok(upward.extend(downward).extend(supplementary))
    }

    async fn crawl(
        &self,
        seed: MetadataResource,
        direction: Direction,
    ) -> Result<ExperimentGraph, MetadataFetchError> {
        let mut graph = ExperimentGraph::new();
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut frontier = vec![seed];

        while let Some(process) = frontier.pop() {
            if !visited.insert(process.uuid) {
                trace!(process_uuid = %process.uuid, ?direction, "already visited, skipping re-expansion");
                continue;
            }

            let (inputs, outputs, protocols) = self.process_info(&process).await?;

            for resource in inputs.iter().chain(outputs.iter()).chain(protocols.iter()) {
                graph.nodes.insert(resource.clone());
            }
            graph.nodes.insert(process.clone());

            graph.links.insert(Link::Process(ProcessLink::new(
                process.uuid,
                process.concrete_type.clone(),
                to_refs(&inputs),
                to_refs(&outputs),
                to_refs(&protocols),
            )));

            let next = self.next_frontier(direction, &inputs, &outputs).await?;
            for candidate in next {
                if !visited.contains(&candidate.uuid) {
                    frontier.push(candidate);
                }
            }
        }

        Ok(graph)
    }

    /// Fetches `{inputs = input_biomaterials ∪ input_files, outputs =
    /// derived_biomaterials ∪ derived_files, protocols}` for one process.
    /// The five lookups are independent, so they run concurrently.
    async fn process_info(
        &self,
        process: &MetadataResource,
    ) -> Result<(Vec<MetadataResource>, Vec<MetadataResource>, Vec<MetadataResource>), MetadataFetchError> {
        let (input_biomaterials, input_files, derived_biomaterials, derived_files, protocols) = tokio::try_join!(
            collect(self.metadata.input_biomaterials(process)),
            collect(self.metadata.input_files(process)),
            collect(self.metadata.derived_biomaterials(process)),
            collect(self.metadata.derived_files(process)),
            collect(self.metadata.protocols(process)),
        )?;

        let mut inputs = input_biomaterials;
        inputs.extend(input_files);
        let mut outputs = derived_biomaterials;
        outputs.extend(derived_files);

        Ok((inputs, outputs, protocols))
    }

    /// `upward`: processes that derive each input. `downward`: processes
    /// that take each output as input.
    async fn next_frontier(
        &self,
        direction: Direction,
        inputs: &[MetadataResource],
        outputs: &[MetadataResource],
    ) -> Result<Vec<MetadataResource>, MetadataFetchError> {
        let subjects = match direction {
            Direction::Upward => inputs,
            Direction::Downward => outputs,
        };

        let lookups = subjects.iter().map(|subject| async move {
            let stream = match direction {
                Direction::Upward => self.metadata.derived_by_processes(subject),
                Direction::Downward => self.metadata.input_to_processes(subject),
            };
            collect(stream).await
        });

        let grouped = futures::future::try_join_all(lookups).await?;
        Ok(grouped.into_iter().flatten().collect())
    }

    /// The project node plus, if any exist, a supplementary-file link from
    /// the project to its supplementary files.
    pub async fn build_supplementary(
        &self,
        project: MetadataResource,
    ) -> Result<ExperimentGraph, MetadataFetchError> {
        let files = collect(self.metadata.supplementary_files(&project)).await?;

        let mut graph = ExperimentGraph::new();
        graph.nodes.insert(project.clone());

        if !files.is_empty() {
            let file_refs = to_refs(&files);
            let entity = EntityRef::new(project.concrete_type.clone(), project.uuid);
            graph
                .links
                .insert(Link::SupplementaryFile(SupplementaryFileLink::new(entity, file_refs)));
            for file in files {
                graph.nodes.insert(file);
            }
        }

        Ok(graph)
    }
}

async fn collect<'a>(
    stream: BoxStream<'a, Result<MetadataResource, MetadataFetchError>>,
) -> Result<Vec<MetadataResource>, MetadataFetchError> {
    stream.try_collect().await
}

fn to_refs(resources: &[MetadataResource]) -> Vec<EntityRef> {
    resources.iter().map(|r| EntityRef::new(r.concrete_type.clone(), r.uuid)).collect()
}
