//! A concrete [`relinker_core::Toolchain`] that shells out to a configured
//! `nm`/`objdump`-equivalent symbol dumper and linker via
//! `std::process::Command`.
//!
//! Process invocation lives entirely in this crate; parsing the dumper's
//! textual output is delegated to [`relinker_core::symbol_extractor::parse_dump_output`],
//! a pure function, so that parsing logic is testable without spawning a
//! real binary.

use std::fs;
use std::path::Path;
use std::process::Command;

use log::debug;
use relinker_core::{Result, SymbolSet, TargetCpu, Toolchain, ToolchainInfo};

/// Configuration for one CPU's external toolchain, normally sourced from a
/// package manifest (see `relinker-cli::manifest`).
#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    pub cpu: TargetCpu,
    pub linker_path: std::path::PathBuf,
    pub symbol_dumper_path: std::path::PathBuf,
    pub sysroot: Option<std::path::PathBuf>,
    pub extra_link_flags: Vec<String>,
    pub mandatory_local_symbols: Vec<String>,
}

/// Invokes real `nm`-equivalent and linker binaries for one CPU.
pub struct ExternalToolchain {
    info: ToolchainInfo,
    mandatory_local_symbols: SymbolSet,
}

impl ExternalToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        let mut mandatory_local_symbols = SymbolSet::empty();
        for symbol in config.mandatory_local_symbols {
            mandatory_local_symbols.insert(symbol);
        }
        ExternalToolchain {
            info: ToolchainInfo {
                cpu: config.cpu,
                linker_path: config.linker_path,
                symbol_dumper_path: config.symbol_dumper_path,
                sysroot: config.sysroot,
                extra_link_flags: config.extra_link_flags,
            },
            mandatory_local_symbols,
        }
    }
}

impl Toolchain for ExternalToolchain {
    fn info(&self) -> &ToolchainInfo {
        &self.info
    }

    fn mandatory_local_symbols(&self) -> &SymbolSet {
        &self.mandatory_local_symbols
    }

    fn extract_symbols(&self, library_path: &Path) -> Result<(SymbolSet, SymbolSet)> {
        debug!(
            "running {} -D {}",
            self.info.symbol_dumper_path.display(),
            library_path.display()
        );
        let output = Command::new(&self.info.symbol_dumper_path)
            .arg("-D")
            .arg(library_path)
            .output()
            .map_err(|e| toolchain_error(&self.info.symbol_dumper_path, &e.to_string()))?;

        if !output.status.success() {
            return Err(toolchain_error(
                &self.info.symbol_dumper_path,
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(relinker_core::symbol_extractor::parse_dump_output(&stdout))
    }

    fn relink(&self, source: &Path, version_script: &Path, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| relinker_core::RelinkerError::io(parent, e))?;
        }

        let mut command = Command::new(&self.info.linker_path);
        command
            .arg("-shared")
            .arg("--version-script")
            .arg(version_script)
            .args(&self.info.extra_link_flags);
        if let Some(sysroot) = &self.info.sysroot {
            command.arg("--sysroot").arg(sysroot);
        }
        command.arg("-o").arg(output).arg(source);

        debug!("running {:?}", command);
        let result = command
            .output()
            .map_err(|e| toolchain_error(&self.info.linker_path, &e.to_string()))?;

        if !result.status.success() {
            return Err(toolchain_error(
                &self.info.linker_path,
                &String::from_utf8_lossy(&result.stderr),
            ));
        }
        Ok(())
    }
}

fn toolchain_error(command: &Path, stderr: &str) -> relinker_core::RelinkerError {
    relinker_core::RelinkerError::ToolchainError {
        command: command.display().to_string(),
        stderr: stderr.to_string(),
    }
}
