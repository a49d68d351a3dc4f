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

//! The provenance graph's data model: a deduplicating node set, a tagged
//! link union with merge-on-insert semantics, and the pair of the two
//! ([`ExperimentGraph`]) that the crawler assembles and the staging client
//! serializes.

use std::fmt;

use exporter_metadata::MetadataResource;
use indexmap::IndexMap;
use serde_json::{json, Value};
use uuid::Uuid;

/// A reference to another entity as it appears inside a link: `{type,
/// uuid}` under varying field-name prefixes (`input_`, `output_`,
/// `protocol_`, `file_`, `entity_`) depending on where it's serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity_type: String,
    pub uuid: Uuid,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, uuid: Uuid) -> Self {
        Self { entity_type: entity_type.into(), uuid }
    }

    fn to_json(&self, prefix: &str) -> Value {
        json!({
            format!("{prefix}_type"): self.entity_type,
            format!("{prefix}_id"): self.uuid,
        })
    }
}

/// A set of [`MetadataResource`] keyed by uuid. First insertion wins;
/// iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct MetadataNodeSet {
    nodes: IndexMap<Uuid, MetadataResource>,
}

impl MetadataNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(resource: MetadataResource) -> Self {
        let mut set = Self::new();
        set.insert(resource);
        set
    }

    /// No-op if `resource.uuid` is already present.
    pub fn insert(&mut self, resource: MetadataResource) {
        self.nodes.entry(resource.uuid).or_insert(resource);
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.nodes.contains_key(uuid)
    }

    /// Defensive copy: callers can't mutate our internal state through it.
    pub fn get(&self, uuid: &Uuid) -> Option<MetadataResource> {
        self.nodes.get(uuid).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataResource> {
        self.nodes.values()
    }

    /// Merges `other` into `self`; entries already present in `self` are
    /// kept, new ones are appended in `other`'s insertion order.
    pub fn extend(&mut self, other: MetadataNodeSet) {
        for (_, resource) in other.nodes {
            self.nodes.entry(resource.uuid).or_insert(resource);
        }
    }
}

fn dedup_refs(mut refs: Vec<EntityRef>) -> Vec<EntityRef> {
    let mut seen = std::collections::HashSet::new();
    refs.retain(|r| seen.insert(r.uuid));
    refs
}

fn union_refs(existing: &mut Vec<EntityRef>, incoming: Vec<EntityRef>) {
    let mut seen: std::collections::HashSet<Uuid> = existing.iter().map(|r| r.uuid).collect();
    for r in incoming {
        if seen.insert(r.uuid) {
            existing.push(r);
        }
    }
}

/// One process step: `{process_uuid, process_type, inputs, outputs,
/// protocols}`. Each inner list is deduplicated by uuid in discovery order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessLink {
    pub process_uuid: Uuid,
    pub process_type: String,
    pub inputs: Vec<EntityRef>,
    pub outputs: Vec<EntityRef>,
    pub protocols: Vec<EntityRef>,
}

impl ProcessLink {
    pub fn new(
        process_uuid: Uuid,
        process_type: impl Into<String>,
        inputs: Vec<EntityRef>,
        outputs: Vec<EntityRef>,
        protocols: Vec<EntityRef>,
    ) -> Self {
        Self {
            process_uuid,
            process_type: process_type.into(),
            inputs: dedup_refs(inputs),
            outputs: dedup_refs(outputs),
            protocols: dedup_refs(protocols),
        }
    }

    /// Unions `other`'s inputs/outputs/protocols into `self`. A mismatched
    /// `process_type` means the caller merged links for two different
    /// processes under the same uuid, which is a programmer error.
    pub fn merge(&mut self, other: ProcessLink) {
        assert_eq!(
            self.process_type, other.process_type,
            "merging process links for {} with mismatched process_type {} != {}",
            self.process_uuid, self.process_type, other.process_type
        );
        union_refs(&mut self.inputs, other.inputs);
        union_refs(&mut self.outputs, other.outputs);
        union_refs(&mut self.protocols, other.protocols);
    }

    fn to_json(&self) -> Value {
        json!({
            "process_id": self.process_uuid,
            "process_type": self.process_type,
            "inputs": self.inputs.iter().map(|r| r.to_json("input")).collect::<Vec<_>>(),
            "outputs": self.outputs.iter().map(|r| r.to_json("output")).collect::<Vec<_>>(),
            "protocols": self.protocols.iter().map(|r| r.to_json("protocol")).collect::<Vec<_>>(),
        })
    }
}

/// Attaches supplementary files to an entity, typically a project:
/// `{entity: {type, uuid}, files: [{type, uuid}]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplementaryFileLink {
    pub entity: EntityRef,
    pub files: Vec<EntityRef>,
}

impl SupplementaryFileLink {
    pub fn new(entity: EntityRef, files: Vec<EntityRef>) -> Self {
        Self { entity, files: dedup_refs(files) }
    }

    pub fn merge(&mut self, other: SupplementaryFileLink) {
        assert_eq!(
            self.entity, other.entity,
            "merging supplementary-file links for mismatched entities {:?} != {:?}",
            self.entity, other.entity
        );
        union_refs(&mut self.files, other.files);
    }

    fn to_json(&self) -> Value {
        json!({
            "link_type": "supplementary_file_link",
            "entity": self.entity.to_json("entity"),
            "files": self.files.iter().map(|r| r.to_json("file")).collect::<Vec<_>>(),
        })
    }
}

/// Tagged union of the two link shapes the links document carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    Process(ProcessLink),
    SupplementaryFile(SupplementaryFileLink),
}

impl Link {
    pub fn key(&self) -> LinkKey {
        match self {
            Link::Process(p) => LinkKey::Process(p.process_uuid),
            Link::SupplementaryFile(s) => LinkKey::SupplementaryFile(s.entity.uuid),
        }
    }

    fn merge(&mut self, other: Link) {
        match (self, other) {
            (Link::Process(a), Link::Process(b)) => a.merge(b),
            (Link::SupplementaryFile(a), Link::SupplementaryFile(b)) => a.merge(b),
            (a, b) => panic!("cannot merge mismatched link kinds: {a:?} and {b:?}"),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Link::Process(p) => p.to_json(),
            Link::SupplementaryFile(s) => s.to_json(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKey {
    Process(Uuid),
    SupplementaryFile(Uuid),
}

/// Ordered collection of [`Link`], keyed by `process_uuid` for process
/// links and by `entity.uuid` for supplementary-file links. Inserting a
/// link whose key already exists merges it into the existing one.
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    links: IndexMap<LinkKey, Link>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, link: Link) {
        let key = link.key();
        match self.links.get_mut(&key) {
            Some(existing) => existing.merge(link),
            None => {
                self.links.insert(key, link);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn get_process(&self, process_uuid: Uuid) -> Option<&ProcessLink> {
        match self.links.get(&LinkKey::Process(process_uuid))? {
            Link::Process(p) => Some(p),
            _ => None,
        }
    }

    /// Merges `other`'s links into `self` in `other`'s insertion order.
    pub fn extend(&mut self, other: LinkSet) {
        for (_, link) in other.links {
            self.insert(link);
        }
    }

    /// The `to_dict` contract: `{"links": [...]}`. `write_links` wraps
    /// this with `describedBy`/`schema_version`/`schema_type`.
    pub fn to_links_json(&self) -> Value {
        json!({ "links": self.iter().map(Link::to_json).collect::<Vec<_>>() })
    }
}

impl fmt::Display for LinkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkSet({} links)", self.len())
    }
}

/// `{nodes: MetadataNodeSet, links: LinkSet}`, produced per-message and
/// discarded after export.
#[derive(Debug, Clone, Default)]
pub struct ExperimentGraph {
    pub nodes: MetadataNodeSet,
    pub links: LinkSet,
}

impl ExperimentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(mut self, other: ExperimentGraph) -> Self {
        self.nodes.extend(other.nodes);
        self.links.extend(other.links);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exporter_metadata::MetadataResource;

    fn resource(uuid: Uuid, metadata_type: &str) -> MetadataResource {
        MetadataResource::from_json(serde_json::json!({
            "uuid": {"uuid": uuid.to_string()},
            "dcpVersion": "2024-01-01T00:00:00.000Z",
            "type": metadata_type,
            "submissionDate": "2024-01-01T00:00:00.000Z",
            "updateDate": "2024-01-01T00:00:00.000Z",
            "content": {
                "describedBy": "https://schema.humancellatlas.org/type/biomaterial/5.1.0/donor_organism",
            },
        }))
        .unwrap()
    }

    #[test]
    fn node_set_dedups_first_insertion_wins() {
        let uuid = Uuid::new_v4();
        let mut set = MetadataNodeSet::new();
        set.insert(resource(uuid, "biomaterial"));
        set.insert(resource(uuid, "biomaterial"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn process_link_dedups_inner_lists() {
        let a = Uuid::new_v4();
        let link = ProcessLink::new(
            Uuid::new_v4(),
            "process",
            vec![EntityRef::new("biomaterial", a), EntityRef::new("biomaterial", a)],
            vec![],
            vec![],
        );
        assert_eq!(link.inputs.len(), 1);
    }

    #[test]
    fn link_set_merges_on_same_process_uuid() {
        let process_uuid = Uuid::new_v4();
        let input_a = Uuid::new_v4();
        let input_b = Uuid::new_v4();

        let mut set = LinkSet::new();
        set.insert(Link::Process(ProcessLink::new(
            process_uuid,
            "analysis_process",
            vec![EntityRef::new("biomaterial", input_a)],
            vec![],
            vec![],
        )));
        set.insert(Link::Process(ProcessLink::new(
            process_uuid,
            "analysis_process",
            vec![EntityRef::new("biomaterial", input_b)],
            vec![],
            vec![],
        )));

        assert_eq!(set.len(), 1);
        let merged = set.get_process(process_uuid).unwrap();
        assert_eq!(merged.inputs.len(), 2);
    }

    #[test]
    fn extend_is_commutative_up_to_member_order() {
        let process_uuid = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut g1 = LinkSet::new();
        g1.insert(Link::Process(ProcessLink::new(process_uuid, "p", vec![EntityRef::new("t", a)], vec![], vec![])));
        let mut g2 = LinkSet::new();
        g2.insert(Link::Process(ProcessLink::new(process_uuid, "p", vec![EntityRef::new("t", b)], vec![], vec![])));

        let mut merged_1 = g1.clone();
        merged_1.extend(g2.clone());
        let mut merged_2 = g2;
        merged_2.extend(g1);

        let set_1: std::collections::HashSet<_> =
            merged_1.get_process(process_uuid).unwrap().inputs.iter().map(|r| r.uuid).collect();
        let set_2: std::collections::HashSet<_> =
            merged_2.get_process(process_uuid).unwrap().inputs.iter().map(|r| r.uuid).collect();
        assert_eq!(set_1, set_2);
    }

    #[test]
    #[should_panic(expected = "mismatched process_type")]
    fn merging_mismatched_process_type_panics() {
        let process_uuid = Uuid::new_v4();
        let mut set = LinkSet::new();
        set.insert(Link::Process(ProcessLink::new(process_uuid, "analysis_process", vec![], vec![], vec![])));
        set.insert(Link::Process(ProcessLink::new(process_uuid, "library_prep_process", vec![], vec![], vec![])));
    }

    #[test]
    fn experiment_graph_extend_merges_nodes_and_links() {
        let project = resource(Uuid::new_v4(), "project");
        let mut g1 = ExperimentGraph::new();
        g1.nodes.insert(project.clone());
        let g2 = ExperimentGraph::new();
        let merged = g1.extend(g2);
        assert_eq!(merged.nodes.len(), 1);
    }
}
