//! Computes, for each in-package library identified by a build-graph node,
//! the set of other in-package libraries that transitively depend on it.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{RelinkerError, Result};
use crate::model::{BuildGraphOracle, NodeId};

/// `dependentsOf: map[ownedInputNode -> set[ownedInputNode]]`, per §4.5.
///
/// `owned_producers` is the set of producer nodes for this CPU's owned
/// input libraries; `oracle` exposes `incomingEdges(node) -> [node]`
/// (dependents of `node`).
pub fn analyze(
    owned_producers: &[NodeId],
    oracle: &dyn BuildGraphOracle,
) -> Result<HashMap<NodeId, HashSet<NodeId>>> {
    let owned: HashSet<&NodeId> = owned_producers.iter().collect();

    // Step 1: compute the subgraph spanned by the owned inputs and all
    // ancestors reachable via incoming_edges until closure.
    let mut closure: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = owned_producers.iter().cloned().collect();
    while let Some(node) = queue.pop_front() {
        if !closure.insert(node.clone()) {
            continue;
        }
        for dependent in oracle.incoming_edges(&node) {
            if !closure.contains(&dependent) {
                queue.push_back(dependent);
            }
        }
    }

    // Build direct-dependent and direct-dependency adjacency within the
    // closure. `incoming_edges(n)` gives the direct dependents of `n`
    // (edges m -> n where m depends on n); we also need the reverse view
    // (n's out-edges, i.e. the things `n` depends on) to drive Kahn's
    // algorithm, which we derive by inverting the adjacency we just read.
    let mut direct_dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut direct_dependencies: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for node in &closure {
        let dependents: Vec<NodeId> = oracle
            .incoming_edges(node)
            .into_iter()
            .filter(|m| closure.contains(m))
            .collect();
        for dependent in &dependents {
            direct_dependencies
                .entry(dependent.clone())
                .or_default()
                .push(node.clone());
        }
        direct_dependents.insert(node.clone(), dependents);
    }

    // Step 2+3: Kahn's algorithm over the dependent -> dependency graph,
    // processing nodes once all of their direct dependents have been
    // processed (i.e. leaf-first, where a leaf has no incoming dependents).
    let mut in_degree: HashMap<NodeId, usize> = closure
        .iter()
        .map(|n| (n.clone(), direct_dependents.get(n).map_or(0, Vec::len)))
        .collect();

    let mut ready: VecDeque<NodeId> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(n, _)| n.clone())
        .collect();

    let mut all_dependents: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
    let mut processed = 0usize;

    while let Some(node) = ready.pop_front() {
        let mut dependents_of_node: HashSet<NodeId> = HashSet::new();
        for dependent in direct_dependents.get(&node).into_iter().flatten() {
            if let Some(further) = all_dependents.get(dependent) {
                dependents_of_node.extend(further.iter().cloned());
            }
            if owned.contains(dependent) {
                dependents_of_node.insert(dependent.clone());
            }
        }
        all_dependents.insert(node.clone(), dependents_of_node);
        processed += 1;

        for dependency in direct_dependencies.get(&node).into_iter().flatten() {
            let degree = in_degree.get_mut(dependency).expect("node in closure");
            *degree -= 1;
            if *degree == 0 {
                ready.push_back(dependency.clone());
            }
        }
    }

    if processed != closure.len() {
        let stuck = in_degree
            .into_iter()
            .find(|(_, deg)| *deg > 0)
            .map(|(n, _)| n.0)
            .unwrap_or_default();
        return Err(RelinkerError::CyclicLibraryGraph(stuck));
    }

    // Step 4: restrict to owned-input nodes only.
    Ok(all_dependents
        .into_iter()
        .filter(|(n, _)| owned.contains(n))
        .collect())
}
