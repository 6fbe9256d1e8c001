//! Orchestrates `SymbolSet`, `DependencyAnalyzer`, and `RelinkAction`:
//! partitions inputs by CPU, computes dependent sets, emits the ordered
//! list of `RelinkNode`s wired with the correct upstream dependencies, and
//! publishes the rewrite map.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::dependency_analyzer;
use crate::error::{RelinkerError, Result};
use crate::model::{BuildGraphOracle, LibraryHandle, LibraryKey, NodeId, RelinkNode, TargetCpu, Toolchain};
use crate::symbol_set::SymbolSet;

/// Original library path (or key) -> relinked library path, partitioned
/// the way the input was partitioned (§6).
#[derive(Debug, Default)]
pub struct RewriteMap {
    pub owned: HashMap<LibraryKey, PathBuf>,
    pub copied: HashMap<LibraryKey, PathBuf>,
}

impl RewriteMap {
    pub fn get(&self, key: &LibraryKey) -> Option<&Path> {
        self.owned
            .get(key)
            .or_else(|| self.copied.get(key))
            .map(PathBuf::as_path)
    }
}

/// The complete output of planning for all CPUs present in the input.
pub struct Plan {
    /// Dependent-before-dependency order, suitable for a sequential
    /// scheduler or a DAG-aware one.
    pub nodes: Vec<Rc<RelinkNode>>,
    pub rewrite_map: RewriteMap,
    /// `globalKnownSymbols[cpu]`, the plan-scoped constant each RelinkAction
    /// needs to compute its own `symbolsNeeded` (§4.6 step 2).
    pub global_known_symbols: HashMap<TargetCpu, SymbolSet>,
}

pub struct PlannerInputs<'a> {
    pub owned_libraries: HashMap<LibraryKey, LibraryHandle>,
    pub copied_libraries: HashMap<LibraryKey, LibraryHandle>,
    pub toolchains: HashMap<TargetCpu, &'a dyn Toolchain>,
    pub oracle: &'a dyn BuildGraphOracle,
    /// Root directory under which this plan's per-library output
    /// directories are created.
    pub output_dir: &'a Path,
}

pub fn plan(inputs: PlannerInputs) -> Result<Plan> {
    if inputs.owned_libraries.is_empty() && inputs.copied_libraries.is_empty() {
        return Err(RelinkerError::EmptyInput);
    }

    let cpus: Vec<TargetCpu> = {
        let mut set: Vec<TargetCpu> = inputs
            .owned_libraries
            .keys()
            .chain(inputs.copied_libraries.keys())
            .map(|k| k.cpu)
            .collect();
        set.sort();
        set.dedup();
        set
    };

    let mut nodes: Vec<Rc<RelinkNode>> = Vec::new();
    let mut rewrite_map = RewriteMap::default();
    let mut global_known_symbols = HashMap::new();

    for cpu in cpus {
        let toolchain = *inputs
            .toolchains
            .get(&cpu)
            .ok_or(RelinkerError::UnknownCpu(cpu))?;

        let owned_for_cpu: BTreeMap<&LibraryKey, &LibraryHandle> = inputs
            .owned_libraries
            .iter()
            .filter(|(k, _)| k.cpu == cpu)
            .collect();
        let copied_for_cpu: BTreeMap<&LibraryKey, &LibraryHandle> = inputs
            .copied_libraries
            .iter()
            .filter(|(k, _)| k.cpu == cpu)
            .collect();

        // Step 2: globalKnownSymbols[cpu], chunked across threads.
        let all_paths: Vec<&Path> = owned_for_cpu
            .values()
            .chain(copied_for_cpu.values())
            .map(|h| h.path())
            .collect();
        let known = extract_global_known_symbols(&all_paths, toolchain)?;

        // Step 3: DependencyAnalyzer over this CPU's owned libraries.
        let mut producer_to_key: HashMap<NodeId, LibraryKey> = HashMap::new();
        let mut owned_producers: Vec<NodeId> = Vec::new();
        for (key, handle) in &owned_for_cpu {
            let producer = handle
                .producer()
                .expect("owned handle always carries a producer")
                .clone();
            producer_to_key.insert(producer.clone(), (*key).clone());
            owned_producers.push(producer);
        }
        let dependents_of = dependency_analyzer::analyze(&owned_producers, inputs.oracle)?;

        // Step 4: RelinkNode per copied library, empty upstreamDeps.
        let mut copied_nodes: Vec<Rc<RelinkNode>> = Vec::new();
        for (key, handle) in &copied_for_cpu {
            let output = cpu_output_path(inputs.output_dir, cpu, &key.library_name);
            let symbols_needed_output =
                cpu_symbols_needed_path(inputs.output_dir, cpu, &key.library_name);
            let node = Rc::new(RelinkNode {
                key: (*key).clone(),
                input: (*handle).clone(),
                upstream_deps: Vec::new(),
                output: output.clone(),
                symbols_needed_output,
            });
            rewrite_map.copied.insert((*key).clone(), output);
            copied_nodes.push(node.clone());
            nodes.push(node);
        }

        // Step 5: owned libraries, dependents-before-dependencies order.
        // |dependentsOf(p)| strictly increases along a dependent -> dependency
        // edge (a dependent's set is always a strict subset of its own
        // dependency's set, per dependency_analyzer's propagation), so
        // sorting owned libraries by ascending |dependentsOf(p)| yields a
        // valid dependents-first order without a second topological sort.
        let mut owned_keys: Vec<&LibraryKey> = owned_for_cpu.keys().copied().collect();
        owned_keys.sort_by_key(|key| {
            let handle = &owned_for_cpu[key];
            let producer = handle.producer().expect("owned handle");
            let fan_in = dependents_of.get(producer).map_or(0, |s| s.len());
            (fan_in, key.library_name.clone())
        });

        let mut planned: HashMap<NodeId, Rc<RelinkNode>> = HashMap::new();
        for key in owned_keys {
            let handle = owned_for_cpu[key];
            let producer = handle.producer().expect("owned handle").clone();

            let mut upstream_deps: Vec<Rc<RelinkNode>> = copied_nodes.clone();
            if let Some(dependents) = dependents_of.get(&producer) {
                let mut dependent_nodes: Vec<(&str, Rc<RelinkNode>)> = dependents
                    .iter()
                    .map(|dependent_producer| {
                        let dependent_key = &producer_to_key[dependent_producer];
                        let node = planned
                            .get(dependent_producer)
                            .expect("dependent already planned by reverse ordering")
                            .clone();
                        (dependent_key.library_name.as_str(), node)
                    })
                    .collect();
                dependent_nodes.sort_by_key(|(name, _)| name.to_string());
                upstream_deps.extend(dependent_nodes.into_iter().map(|(_, n)| n));
            }

            let output = cpu_output_path(inputs.output_dir, cpu, &key.library_name);
            let symbols_needed_output =
                cpu_symbols_needed_path(inputs.output_dir, cpu, &key.library_name);
            let node = Rc::new(RelinkNode {
                key: (*key).clone(),
                input: handle.clone(),
                upstream_deps,
                output: output.clone(),
                symbols_needed_output,
            });

            rewrite_map.owned.insert((*key).clone(), output);
            planned.insert(producer, node.clone());
            nodes.push(node);
        }

        global_known_symbols.insert(cpu, known);
    }

    Ok(Plan {
        nodes,
        rewrite_map,
        global_known_symbols,
    })
}

fn cpu_output_path(output_dir: &Path, cpu: TargetCpu, library_name: &str) -> PathBuf {
    output_dir.join(cpu.to_string()).join(library_name)
}

fn cpu_symbols_needed_path(output_dir: &Path, cpu: TargetCpu, library_name: &str) -> PathBuf {
    output_dir
        .join(cpu.to_string())
        .join(format!("{library_name}.symbols-needed.txt"))
}

/// `globalKnownSymbols[cpu]` is the union of `defined` across every input
/// library of that CPU. Each extraction is dominated by process-spawn and
/// I/O cost, so this fans the library list out across a handful of threads
/// rather than reaching for a thread-pool crate.
fn extract_global_known_symbols(paths: &[&Path], toolchain: &dyn Toolchain) -> Result<SymbolSet> {
    if paths.is_empty() {
        return Ok(SymbolSet::empty());
    }

    let worker_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(paths.len());
    let chunk_size = paths.len().div_ceil(worker_count);

    std::thread::scope(|scope| {
        let handles: Vec<_> = paths
            .chunks(chunk_size.max(1))
            .map(|chunk| {
                scope.spawn(move || {
                    let mut defined = SymbolSet::empty();
                    for path in chunk {
                        let (chunk_defined, _undefined) = toolchain.extract_symbols(path)?;
                        defined = defined.union(&chunk_defined);
                    }
                    Ok::<SymbolSet, RelinkerError>(defined)
                })
            })
            .collect();

        let mut total = SymbolSet::empty();
        for handle in handles {
            let chunk_result = handle.join().expect("symbol extraction thread panicked")?;
            total = total.union(&chunk_result);
        }
        Ok(total)
    })
}
