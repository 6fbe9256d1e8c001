//! End-to-end scenarios exercising the planner and relink actions together
//! against a fake toolchain and a map-backed build-graph oracle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use relinker_core::{
    BuildGraphOracle, LibraryHandle, LibraryKey, NodeId, Plan, PlannerInputs, RelinkAction,
    RelinkerError, SymbolSet, TargetCpu, Toolchain, ToolchainInfo,
};

struct MapOracle {
    incoming: HashMap<NodeId, Vec<NodeId>>,
}

impl BuildGraphOracle for MapOracle {
    fn incoming_edges(&self, node: &NodeId) -> Vec<NodeId> {
        self.incoming.get(node).cloned().unwrap_or_default()
    }

    fn node_for_library(&self, _handle: &LibraryHandle) -> Option<NodeId> {
        None
    }
}

/// A toolchain whose symbol tables can be reseeded after each relink, and
/// whose `relink` just writes a pre-registered "linked" symbol table keyed
/// by the destination path, honoring exactly the version script's requested
/// exports the way a real linker would.
struct FakeToolchain {
    info: ToolchainInfo,
    mandatory: SymbolSet,
    tables: RefCell<HashMap<PathBuf, (SymbolSet, SymbolSet)>>,
    relinked_tables: RefCell<HashMap<PathBuf, (SymbolSet, SymbolSet)>>,
}

impl FakeToolchain {
    fn new(cpu: TargetCpu) -> Self {
        FakeToolchain {
            info: ToolchainInfo {
                cpu,
                linker_path: PathBuf::from("/fake/ld"),
                symbol_dumper_path: PathBuf::from("/fake/nm"),
                sysroot: None,
                extra_link_flags: vec![],
            },
            mandatory: SymbolSet::empty(),
            tables: RefCell::new(HashMap::new()),
            relinked_tables: RefCell::new(HashMap::new()),
        }
    }

    fn seed(&self, path: &Path, defined: &[&str], undefined: &[&str]) {
        self.tables
            .borrow_mut()
            .insert(path.to_path_buf(), symbol_pair(defined, undefined));
    }
}

fn symbol_pair(defined: &[&str], undefined: &[&str]) -> (SymbolSet, SymbolSet) {
    let mut d = SymbolSet::empty();
    defined.iter().for_each(|s| d.insert(*s));
    let mut u = SymbolSet::empty();
    undefined.iter().for_each(|s| u.insert(*s));
    (d, u)
}

impl Toolchain for FakeToolchain {
    fn info(&self) -> &ToolchainInfo {
        &self.info
    }

    fn mandatory_local_symbols(&self) -> &SymbolSet {
        &self.mandatory
    }

    fn extract_symbols(&self, library_path: &Path) -> relinker_core::Result<(SymbolSet, SymbolSet)> {
        if let Some(pair) = self.relinked_tables.borrow().get(library_path) {
            return Ok(pair.clone());
        }
        self.tables
            .borrow()
            .get(library_path)
            .cloned()
            .ok_or_else(|| RelinkerError::ToolchainError {
                command: "fake-nm".to_string(),
                stderr: format!("no symbols seeded for {}", library_path.display()),
            })
    }

    fn relink(&self, source: &Path, version_script: &Path, output: &Path) -> relinker_core::Result<()> {
        let (defined_old, _) = self.tables.borrow().get(source).cloned().unwrap();
        let script = std::fs::read_to_string(version_script).unwrap();
        let exported: Vec<String> = script
            .lines()
            .skip_while(|l| !l.trim_end().ends_with("global:"))
            .skip(1)
            .take_while(|l| !l.trim().ends_with("local:"))
            .map(|l| l.trim().trim_end_matches(';').to_string())
            .collect();

        let mut new_defined = SymbolSet::empty();
        for name in &exported {
            if defined_old.contains(name) {
                new_defined.insert(name.clone());
            }
        }
        // A real linker would drop undefined references no longer reachable
        // from the new, smaller export set; the fake keeps the original
        // undefined set, which is a conservative (superset) approximation
        // fine for these tests since none of them rely on undefined-pruning.
        let (_, undefined_old) = self.tables.borrow().get(source).cloned().unwrap();
        self.relinked_tables
            .borrow_mut()
            .insert(output.to_path_buf(), (new_defined, undefined_old));
        std::fs::write(output, b"relinked").unwrap();
        Ok(())
    }
}

fn owned(path: PathBuf, producer: &str) -> LibraryHandle {
    LibraryHandle::Owned {
        path,
        producer: NodeId(producer.to_string()),
    }
}

fn run_plan(
    owned_libraries: HashMap<LibraryKey, LibraryHandle>,
    copied_libraries: HashMap<LibraryKey, LibraryHandle>,
    oracle: &MapOracle,
    toolchain: &FakeToolchain,
    out_dir: &Path,
) -> relinker_core::Result<Plan> {
    let mut toolchains: HashMap<TargetCpu, &dyn Toolchain> = HashMap::new();
    toolchains.insert(toolchain.info.cpu, toolchain);
    relinker_core::plan(PlannerInputs {
        owned_libraries,
        copied_libraries,
        toolchains,
        oracle,
        output_dir: out_dir,
    })
}

fn execute_all(plan: &Plan, toolchain: &FakeToolchain) {
    let known = &plan.global_known_symbols[&toolchain.info.cpu];
    for node in &plan.nodes {
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
        action.execute(known, !node.input.is_owned()).unwrap();
    }
}

#[test]
fn s1_single_library_no_deps() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = FakeToolchain::new(TargetCpu::Arm);
    let lib_a = dir.path().join("libA.so");
    std::fs::write(&lib_a, b"orig").unwrap();
    toolchain.seed(&lib_a, &["foo", "bar"], &[]);

    let oracle = MapOracle {
        incoming: HashMap::new(),
    };
    let mut owned_libs = HashMap::new();
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm, "libA.so"),
        owned(lib_a, "pA"),
    );

    let plan = run_plan(
        owned_libs,
        HashMap::new(),
        &oracle,
        &toolchain,
        dir.path(),
    )
    .unwrap();
    assert_eq!(plan.nodes.len(), 1);
    assert!(plan.nodes[0].upstream_deps.is_empty());

    execute_all(&plan, &toolchain);

    let symbols_needed = SymbolSet::read(&plan.nodes[0].symbols_needed_output).unwrap();
    assert!(symbols_needed.is_empty());
}

#[test]
fn s2_two_libraries_linear() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = FakeToolchain::new(TargetCpu::Arm64);
    let lib_a = dir.path().join("libA.so");
    let lib_b = dir.path().join("libB.so");
    std::fs::write(&lib_a, b"orig").unwrap();
    std::fs::write(&lib_b, b"orig").unwrap();
    toolchain.seed(&lib_a, &["a1", "a2"], &["b1"]);
    toolchain.seed(&lib_b, &["b1", "b2"], &[]);

    let oracle = MapOracle {
        incoming: HashMap::from([(NodeId("pB".into()), vec![NodeId("pA".into())])]),
    };
    let mut owned_libs = HashMap::new();
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm64, "libA.so"),
        owned(lib_a, "pA"),
    );
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm64, "libB.so"),
        owned(lib_b, "pB"),
    );

    let plan = run_plan(
        owned_libs,
        HashMap::new(),
        &oracle,
        &toolchain,
        dir.path(),
    )
    .unwrap();

    assert_eq!(plan.nodes[0].key.library_name, "libA.so");
    assert_eq!(plan.nodes[1].key.library_name, "libB.so");

    execute_all(&plan, &toolchain);

    let lib_b_node = &plan.nodes[1];
    let (defined_new, _) = toolchain.extract_symbols(&lib_b_node.output).unwrap();
    assert!(defined_new.contains("b1"));
    assert!(!defined_new.contains("b2"));
}

#[test]
fn s3_diamond_union_of_both_branches() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = FakeToolchain::new(TargetCpu::Arm64);
    let lib_top = dir.path().join("libTop.so");
    let lib_l = dir.path().join("libL.so");
    let lib_r = dir.path().join("libR.so");
    let lib_bot = dir.path().join("libBot.so");
    for p in [&lib_top, &lib_l, &lib_r, &lib_bot] {
        std::fs::write(p, b"orig").unwrap();
    }
    toolchain.seed(&lib_top, &["top1"], &["l1", "r1"]);
    toolchain.seed(&lib_l, &["l1"], &["x"]);
    toolchain.seed(&lib_r, &["r1"], &["y"]);
    toolchain.seed(&lib_bot, &["x", "y", "z"], &[]);

    let oracle = MapOracle {
        incoming: HashMap::from([
            (NodeId("pL".into()), vec![NodeId("pTop".into())]),
            (NodeId("pR".into()), vec![NodeId("pTop".into())]),
            (
                NodeId("pBot".into()),
                vec![NodeId("pL".into()), NodeId("pR".into())],
            ),
        ]),
    };

    let mut owned_libs = HashMap::new();
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm64, "libTop.so"),
        owned(lib_top, "pTop"),
    );
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm64, "libL.so"),
        owned(lib_l, "pL"),
    );
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm64, "libR.so"),
        owned(lib_r, "pR"),
    );
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm64, "libBot.so"),
        owned(lib_bot, "pBot"),
    );

    let plan = run_plan(
        owned_libs,
        HashMap::new(),
        &oracle,
        &toolchain,
        dir.path(),
    )
    .unwrap();

    // libBot must be planned last: both libL and libR must precede it.
    let bot_index = plan
        .nodes
        .iter()
        .position(|n| n.key.library_name == "libBot.so")
        .unwrap();
    let l_index = plan
        .nodes
        .iter()
        .position(|n| n.key.library_name == "libL.so")
        .unwrap();
    let r_index = plan
        .nodes
        .iter()
        .position(|n| n.key.library_name == "libR.so")
        .unwrap();
    assert!(l_index < bot_index);
    assert!(r_index < bot_index);

    execute_all(&plan, &toolchain);

    let bot_node = &plan.nodes[bot_index];
    let (defined_new, _) = toolchain.extract_symbols(&bot_node.output).unwrap();
    assert!(defined_new.contains("x"));
    assert!(defined_new.contains("y"));
    assert!(!defined_new.contains("z"));
}

#[test]
fn s4_copied_library_is_universal_upstream_and_copied_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = FakeToolchain::new(TargetCpu::X86_64);
    let lib_a = dir.path().join("libA.so");
    let lib_c = dir.path().join("libC.so");
    std::fs::write(&lib_a, b"orig-a").unwrap();
    std::fs::write(&lib_c, b"orig-c").unwrap();
    toolchain.seed(&lib_a, &["a"], &[]);
    toolchain.seed(&lib_c, &[], &["a"]);

    let oracle = MapOracle {
        incoming: HashMap::new(),
    };
    let mut owned_libs = HashMap::new();
    owned_libs.insert(
        LibraryKey::new(TargetCpu::X86_64, "libA.so"),
        owned(lib_a.clone(), "pA"),
    );
    let mut copied_libs = HashMap::new();
    copied_libs.insert(
        LibraryKey::new(TargetCpu::X86_64, "libC.so"),
        LibraryHandle::Copied {
            path: lib_c.clone(),
        },
    );

    let plan = run_plan(owned_libs, copied_libs, &oracle, &toolchain, dir.path()).unwrap();

    let a_node = plan
        .nodes
        .iter()
        .find(|n| n.key.library_name == "libA.so")
        .unwrap();
    assert!(a_node
        .upstream_deps
        .iter()
        .any(|n| n.key.library_name == "libC.so"));

    let c_node = plan
        .nodes
        .iter()
        .find(|n| n.key.library_name == "libC.so")
        .unwrap();
    assert!(c_node.upstream_deps.is_empty());

    execute_all(&plan, &toolchain);

    // Copied library is preserved byte-for-byte.
    assert_eq!(std::fs::read(&c_node.output).unwrap(), b"orig-c");

    let (defined_new, _) = toolchain.extract_symbols(&a_node.output).unwrap();
    assert!(defined_new.contains("a"));
}

#[test]
fn s5_cross_cpu_isolation() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain_arm = FakeToolchain::new(TargetCpu::Arm);
    let toolchain_arm64 = FakeToolchain::new(TargetCpu::Arm64);

    let lib_a_arm = dir.path().join("arm/libA.so");
    let lib_a_arm64 = dir.path().join("arm64/libA.so");
    std::fs::create_dir_all(lib_a_arm.parent().unwrap()).unwrap();
    std::fs::create_dir_all(lib_a_arm64.parent().unwrap()).unwrap();
    std::fs::write(&lib_a_arm, b"orig").unwrap();
    std::fs::write(&lib_a_arm64, b"orig").unwrap();
    toolchain_arm.seed(&lib_a_arm, &["shared_name_sym"], &[]);
    toolchain_arm64.seed(&lib_a_arm64, &["shared_name_sym"], &[]);

    let oracle = MapOracle {
        incoming: HashMap::new(),
    };

    let mut owned_libs = HashMap::new();
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm, "libA.so"),
        owned(lib_a_arm, "pA-arm"),
    );
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm64, "libA.so"),
        owned(lib_a_arm64, "pA-arm64"),
    );

    let mut toolchains: HashMap<TargetCpu, &dyn Toolchain> = HashMap::new();
    toolchains.insert(TargetCpu::Arm, &toolchain_arm);
    toolchains.insert(TargetCpu::Arm64, &toolchain_arm64);

    let plan = relinker_core::plan(PlannerInputs {
        owned_libraries: owned_libs,
        copied_libraries: HashMap::new(),
        toolchains,
        oracle: &oracle,
        output_dir: dir.path(),
    })
    .unwrap();

    assert_eq!(plan.nodes.len(), 2);
    for node in &plan.nodes {
        for upstream in &node.upstream_deps {
            assert_eq!(upstream.cpu(), node.cpu());
        }
    }
    assert_eq!(plan.global_known_symbols.len(), 2);
}

#[test]
fn s6_cycle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = FakeToolchain::new(TargetCpu::Arm);
    let lib_a = dir.path().join("libA.so");
    let lib_b = dir.path().join("libB.so");
    std::fs::write(&lib_a, b"orig").unwrap();
    std::fs::write(&lib_b, b"orig").unwrap();
    toolchain.seed(&lib_a, &["a"], &["b"]);
    toolchain.seed(&lib_b, &["b"], &["a"]);

    let oracle = MapOracle {
        incoming: HashMap::from([
            (NodeId("pA".into()), vec![NodeId("pB".into())]),
            (NodeId("pB".into()), vec![NodeId("pA".into())]),
        ]),
    };

    let mut owned_libs = HashMap::new();
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm, "libA.so"),
        owned(lib_a, "pA"),
    );
    owned_libs.insert(
        LibraryKey::new(TargetCpu::Arm, "libB.so"),
        owned(lib_b, "pB"),
    );

    let err = run_plan(
        owned_libs,
        HashMap::new(),
        &oracle,
        &toolchain,
        dir.path(),
    )
    .unwrap_err();
    assert!(matches!(err, RelinkerError::CyclicLibraryGraph(_)));
}
