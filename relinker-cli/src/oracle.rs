//! A [`relinker_core::BuildGraphOracle`] backed by the `dependents` edge
//! lists parsed directly out of the manifest, standing in for a real host
//! build graph's queries.

use std::collections::HashMap;

use relinker_core::{BuildGraphOracle, LibraryHandle, NodeId};

use crate::manifest::Manifest;

/// Spans every CPU in the manifest, not just one: the planner partitions by
/// CPU internally but is handed a single oracle reference for the whole
/// run, so producer node ids must be looked up in one shared namespace
/// (the manifest's authors are expected to keep producer ids globally
/// unique, the way real build-graph node ids are).
pub struct ManifestBuildGraphOracle {
    incoming: HashMap<NodeId, Vec<NodeId>>,
}

impl ManifestBuildGraphOracle {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let incoming = manifest
            .cpus
            .values()
            .flat_map(|cpu| cpu.owned_libraries.iter())
            .map(|lib| {
                (
                    NodeId(lib.producer.clone()),
                    lib.dependents.iter().cloned().map(NodeId).collect(),
                )
            })
            .collect();
        ManifestBuildGraphOracle { incoming }
    }
}

impl BuildGraphOracle for ManifestBuildGraphOracle {
    fn incoming_edges(&self, node: &NodeId) -> Vec<NodeId> {
        self.incoming.get(node).cloned().unwrap_or_default()
    }

    fn node_for_library(&self, handle: &LibraryHandle) -> Option<NodeId> {
        handle.producer().cloned()
    }
}
