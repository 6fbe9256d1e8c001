mod cli;
mod manifest;
mod oracle;
mod scheduler;

use std::collections::HashMap;
use std::path::Path;

use clap::Parser;
use relinker_core::{LibraryHandle, LibraryKey, Plan, TargetCpu, Toolchain};
use relinker_toolchain::{ExternalToolchain, ToolchainConfig};
use serde::Serialize;

fn main() {
    env_logger::init();

    let opt = cli::Opt::parse();
    let result = match opt.action {
        cli::Action::Plan(args) => do_plan_action(&args),
        cli::Action::Relink(args) => do_relink_action(&args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn do_plan_action(args: &cli::PlanArgs) -> relinker_core::Result<()> {
    let (plan, _toolchains) = build_plan(args)?;
    std::fs::create_dir_all(&args.out_dir).map_err(|e| relinker_core::RelinkerError::io(&args.out_dir, e))?;

    let summary = PlanSummary::from_plan(&plan);
    let summary_path = args.out_dir.join("plan.json");
    let json = serde_json::to_string_pretty(&summary).expect("plan summary is always serializable");
    std::fs::write(&summary_path, json)
        .map_err(|e| relinker_core::RelinkerError::io(&summary_path, e))?;

    log::info!(
        "wrote plan for {} node(s) to {}",
        plan.nodes.len(),
        summary_path.display()
    );
    Ok(())
}

fn do_relink_action(args: &cli::PlanArgs) -> relinker_core::Result<()> {
    let (plan, toolchains) = build_plan(args)?;
    let toolchain_refs: HashMap<TargetCpu, &dyn Toolchain> = toolchains
        .iter()
        .map(|(cpu, t)| (*cpu, t as &dyn Toolchain))
        .collect();
    scheduler::run(&plan, &toolchain_refs)
}

/// Loads the manifest and builds the plan; returns the owning toolchain map
/// alongside the plan so callers can borrow from it for scheduling.
fn build_plan(
    args: &cli::PlanArgs,
) -> relinker_core::Result<(Plan, HashMap<TargetCpu, ExternalToolchain>)> {
    let manifest_data = manifest::load(&args.manifest)?;
    let build_oracle = oracle::ManifestBuildGraphOracle::from_manifest(&manifest_data);

    let mut owned_libraries: HashMap<LibraryKey, LibraryHandle> = HashMap::new();
    let mut copied_libraries: HashMap<LibraryKey, LibraryHandle> = HashMap::new();
    let mut toolchains: HashMap<TargetCpu, ExternalToolchain> = HashMap::new();

    for (cpu_name, cpu_manifest) in &manifest_data.cpus {
        let cpu = manifest::parse_cpu_name(cpu_name)?;

        toolchains.insert(
            cpu,
            ExternalToolchain::new(ToolchainConfig {
                cpu,
                linker_path: cpu_manifest.toolchain.linker_path.clone(),
                symbol_dumper_path: cpu_manifest.toolchain.symbol_dumper_path.clone(),
                sysroot: cpu_manifest.toolchain.sysroot.clone(),
                extra_link_flags: cpu_manifest.toolchain.extra_link_flags.clone(),
                mandatory_local_symbols: cpu_manifest.toolchain.mandatory_local_symbols.clone(),
            }),
        );

        for lib in &cpu_manifest.owned_libraries {
            owned_libraries.insert(
                LibraryKey::new(cpu, lib.library_name.clone()),
                LibraryHandle::Owned {
                    path: lib.path.clone(),
                    producer: relinker_core::NodeId(lib.producer.clone()),
                },
            );
        }
        for lib in &cpu_manifest.copied_libraries {
            copied_libraries.insert(
                LibraryKey::new(cpu, lib.library_name.clone()),
                LibraryHandle::Copied {
                    path: lib.path.clone(),
                },
            );
        }
    }

    let toolchain_refs: HashMap<TargetCpu, &dyn Toolchain> = toolchains
        .iter()
        .map(|(cpu, t)| (*cpu, t as &dyn Toolchain))
        .collect();

    let plan = relinker_core::plan(relinker_core::PlannerInputs {
        owned_libraries,
        copied_libraries,
        toolchains: toolchain_refs,
        oracle: &build_oracle,
        output_dir: &args.out_dir,
    })?;

    Ok((plan, toolchains))
}

#[derive(Serialize)]
struct PlanSummary {
    nodes: Vec<NodeSummary>,
    rewrite_map: RewriteMapSummary,
}

#[derive(Serialize)]
struct NodeSummary {
    cpu: String,
    library_name: String,
    input_path: String,
    output: String,
    symbols_needed_output: String,
    upstream_deps: Vec<String>,
}

#[derive(Serialize)]
struct RewriteMapSummary {
    owned: HashMap<String, String>,
    copied: HashMap<String, String>,
}

impl PlanSummary {
    fn from_plan(plan: &Plan) -> Self {
        let nodes = plan
            .nodes
            .iter()
            .map(|node| NodeSummary {
                cpu: node.cpu().to_string(),
                library_name: node.key.library_name.clone(),
                input_path: path_string(node.input.path()),
                output: path_string(&node.output),
                symbols_needed_output: path_string(&node.symbols_needed_output),
                upstream_deps: node
                    .upstream_deps
                    .iter()
                    .map(|n| n.key.library_name.clone())
                    .collect(),
            })
            .collect();

        let owned = plan
            .rewrite_map
            .owned
            .iter()
            .map(|(key, path)| (key.to_string(), path_string(path)))
            .collect();
        let copied = plan
            .rewrite_map
            .copied
            .iter()
            .map(|(key, path)| (key.to_string(), path_string(path)))
            .collect();

        PlanSummary {
            nodes,
            rewrite_map: RewriteMapSummary { owned, copied },
        }
    }
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}
