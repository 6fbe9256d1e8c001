//! The minimal, single-process reference scheduler described in §5: walks
//! the ordered `[RelinkNode]` list and runs each action in order, on the
//! calling thread. Not a substitute for a production build system's
//! scheduler (no caching, no concurrency, no resource caps) — it exists
//! only so this crate can be exercised end to end from the command line.

use std::collections::HashMap;

use log::info;
use relinker_core::{Plan, RelinkAction, Result, TargetCpu, Toolchain};

pub fn run(plan: &Plan, toolchains: &HashMap<TargetCpu, &dyn Toolchain>) -> Result<()> {
    for node in &plan.nodes {
        let toolchain = *toolchains
            .get(&node.cpu())
            .expect("planner already validated every cpu has a toolchain");
        let known = &plan.global_known_symbols[&node.cpu()];

        info!(
            "relinking {} ({})",
            node.key.library_name,
            node.input.path().display()
        );

        let upstream_symbol_artifacts = node
            .upstream_deps
            .iter()
            .map(|n| n.symbols_needed_output.clone())
            .collect();
        let action = RelinkAction {
            cpu: node.cpu(),
            source_library: node.input.path().to_path_buf(),
            upstream_symbol_artifacts,
            output: node.output.clone(),
            symbols_needed_output: node.symbols_needed_output.clone(),
            toolchain,
        };
        action.execute(known, !node.input.is_owned())?;
    }
    Ok(())
}
