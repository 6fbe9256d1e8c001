use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::Result;
use crate::symbol_set::SymbolSet;

/// A supported CPU architecture. Opaque outside of toolchain selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetCpu {
    Arm,
    Arm64,
    X86,
    X86_64,
}

impl fmt::Display for TargetCpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetCpu::Arm => "arm",
            TargetCpu::Arm64 => "arm64",
            TargetCpu::X86 => "x86",
            TargetCpu::X86_64 => "x86_64",
        };
        f.write_str(s)
    }
}

/// An opaque identifier for a node in the host build graph. Producer-node
/// references are logical lookups through a [`BuildGraphOracle`], never
/// back-pointers into the graph itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uniquely identifies one library within the package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LibraryKey {
    pub cpu: TargetCpu,
    pub library_name: String,
}

impl LibraryKey {
    pub fn new(cpu: TargetCpu, library_name: impl Into<String>) -> Self {
        LibraryKey {
            cpu,
            library_name: library_name.into(),
        }
    }
}

impl fmt::Display for LibraryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cpu, self.library_name)
    }
}

/// The source-of-truth pointer to a library file.
///
/// Modeled as a tagged variant rather than a trait object, per the "avoid an
/// inheritance hierarchy" design note: the Planner dispatches on the tag, it
/// never needs dynamic behavior attached to a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryHandle {
    /// Produced by a node in the host build graph; its producer can be
    /// queried for dependents through a [`BuildGraphOracle`].
    Owned { path: PathBuf, producer: NodeId },
    /// Provenance unknown; treated as a sealed input with no resolvable
    /// dependents.
    Copied { path: PathBuf },
}

impl LibraryHandle {
    pub fn path(&self) -> &Path {
        match self {
            LibraryHandle::Owned { path, .. } => path,
            LibraryHandle::Copied { path } => path,
        }
    }

    pub fn producer(&self) -> Option<&NodeId> {
        match self {
            LibraryHandle::Owned { producer, .. } => Some(producer),
            LibraryHandle::Copied { .. } => None,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, LibraryHandle::Owned { .. })
    }
}

/// One planned relink. Created during planning and immutable thereafter.
///
/// `upstream_deps` holds shared references rather than owned values: in a
/// diamond-shaped library graph, the same upstream node is the dependency of
/// more than one downstream node, and `RelinkNode` would otherwise have no
/// finite size.
#[derive(Debug, Clone)]
pub struct RelinkNode {
    pub key: LibraryKey,
    pub input: LibraryHandle,
    pub upstream_deps: Vec<Rc<RelinkNode>>,
    pub output: PathBuf,
    pub symbols_needed_output: PathBuf,
}

impl RelinkNode {
    pub fn cpu(&self) -> TargetCpu {
        self.key.cpu
    }
}

/// The host build system's dependency oracle. Specified only at its
/// interface: the real implementation lives in the enclosing build tool.
pub trait BuildGraphOracle {
    /// Nodes that depend on `node` (i.e. `node`'s dependents).
    fn incoming_edges(&self, node: &NodeId) -> Vec<NodeId>;

    /// The build-graph node that produced this handle, if any.
    fn node_for_library(&self, handle: &LibraryHandle) -> Option<NodeId>;
}

/// Toolchain information that is not behavioral: paths and flags the
/// toolchain provider exposes for a single [`TargetCpu`].
#[derive(Debug, Clone)]
pub struct ToolchainInfo {
    pub cpu: TargetCpu,
    pub linker_path: PathBuf,
    pub symbol_dumper_path: PathBuf,
    pub sysroot: Option<PathBuf>,
    pub extra_link_flags: Vec<String>,
}

/// The toolchain abstraction providing linker/objdump/nm binaries and flags
/// for one CPU. Specified only at its interface; `relinker-toolchain`
/// supplies the concrete implementation that shells out to real binaries.
///
/// `Send + Sync` because the planner extracts `globalKnownSymbols` by
/// fanning a chunked symbol-extraction pass for one CPU's libraries across
/// a `std::thread::scope`, sharing one toolchain reference across threads.
pub trait Toolchain: Send + Sync {
    fn info(&self) -> &ToolchainInfo;

    /// The mandatory-local symbol list (e.g. `__bss_start`, `_edata`,
    /// `_end`) that must never be hidden, however it was derived. Always
    /// sourced from the toolchain, never hard-coded in this crate.
    fn mandatory_local_symbols(&self) -> &SymbolSet;

    /// Lists the symbols `library_path` defines (exported) and the symbols
    /// it references but leaves undefined.
    fn extract_symbols(&self, library_path: &Path) -> Result<(SymbolSet, SymbolSet)>;

    /// Re-links `source` using `version_script`, writing the result to
    /// `output`. Implementations may either re-run the linker against the
    /// original object inputs or perform a copy-and-strip of `source`.
    fn relink(&self, source: &Path, version_script: &Path, output: &Path) -> Result<()>;
}
