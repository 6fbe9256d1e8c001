//! Loads a JSON package manifest that stands in for a real host build
//! system's dependency oracle and toolchain provider, so the core can be
//! exercised standalone. Not a replacement for a production build system's
//! rule graph (§6).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use relinker_core::{RelinkerError, Result, TargetCpu};

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub cpus: HashMap<String, CpuManifest>,
}

#[derive(Debug, Deserialize)]
pub struct CpuManifest {
    pub toolchain: ToolchainEntry,
    #[serde(default)]
    pub owned_libraries: Vec<OwnedLibraryEntry>,
    #[serde(default)]
    pub copied_libraries: Vec<CopiedLibraryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ToolchainEntry {
    pub linker_path: PathBuf,
    pub symbol_dumper_path: PathBuf,
    #[serde(default)]
    pub sysroot: Option<PathBuf>,
    #[serde(default)]
    pub extra_link_flags: Vec<String>,
    #[serde(default)]
    pub mandatory_local_symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct OwnedLibraryEntry {
    pub library_name: String,
    pub path: PathBuf,
    /// This library's producer node id in the host build graph.
    pub producer: String,
    /// `incomingEdges(producer)`: node ids of direct dependents, as known
    /// statically by the host build graph.
    #[serde(default)]
    pub dependents: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CopiedLibraryEntry {
    pub library_name: String,
    pub path: PathBuf,
}

pub fn load(path: &Path) -> Result<Manifest> {
    let contents = fs::read_to_string(path).map_err(|e| RelinkerError::io(path, e))?;
    serde_json::from_str(&contents)
        .map_err(|e| RelinkerError::InvalidManifest(format!("{}: {e}", path.display())))
}

pub fn parse_cpu_name(name: &str) -> Result<TargetCpu> {
    match name {
        "arm" => Ok(TargetCpu::Arm),
        "arm64" => Ok(TargetCpu::Arm64),
        "x86" => Ok(TargetCpu::X86),
        "x86_64" => Ok(TargetCpu::X86_64),
        _ => Err(RelinkerError::InvalidManifest(format!(
            "unrecognized cpu name '{name}'"
        ))),
    }
}
