//! Executes one relink: inputs = one source library + symbol-need files
//! from dependents; output = relinked library + its own symbol-need file.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{RelinkerError, Result};
use crate::model::{TargetCpu, Toolchain};
use crate::symbol_extractor;
use crate::symbol_set::SymbolSet;
use crate::version_script;

/// One planned relink, bound to a concrete toolchain for execution.
///
/// Matches the fields named in §4.4; `output` and `symbols_needed_output`
/// are produced atomically on success via [`write_atomically`], so a failed
/// or cancelled action never leaves a half-written artifact visible to a
/// downstream action that depends on it.
pub struct RelinkAction<'a> {
    pub cpu: TargetCpu,
    pub source_library: PathBuf,
    pub upstream_symbol_artifacts: Vec<PathBuf>,
    pub output: PathBuf,
    pub symbols_needed_output: PathBuf,
    pub toolchain: &'a dyn Toolchain,
}

impl RelinkAction<'_> {
    /// Runs the action. `global_known_symbols` is the plan-scoped constant
    /// from §4.6 step 2; `is_copied` selects the copied-library fast path
    /// of §4.4 when true and there are no upstream symbol artifacts.
    pub fn execute(&self, global_known_symbols: &SymbolSet, is_copied: bool) -> Result<()> {
        if is_copied && self.upstream_symbol_artifacts.is_empty() {
            return self.run_copied_fast_path(global_known_symbols);
        }

        // Step 1: collect required exports.
        let mut artifacts = Vec::with_capacity(self.upstream_symbol_artifacts.len());
        for path in &self.upstream_symbol_artifacts {
            artifacts.push(SymbolSet::read(path)?);
        }
        let demanded_by_dependents = SymbolSet::union_all(&artifacts);

        // Step 2: filter to our defines.
        let (defined_old, _undefined_old) =
            symbol_extractor::extract(&self.source_library, self.toolchain)?;
        let exports = demanded_by_dependents.intersect(&defined_old);

        // Step 3: emit version script.
        let version_script_path = self.scratch_path();
        version_script::write(
            &version_script_path,
            &exports,
            self.toolchain.mandatory_local_symbols(),
        )?;

        // Step 4: invoke linker.
        write_atomically(&self.output, |temp_path| {
            self.toolchain
                .relink(&self.source_library, &version_script_path, temp_path)
        })?;

        self.verify_and_emit_symbols_needed(global_known_symbols, &exports)
    }

    fn run_copied_fast_path(&self, global_known_symbols: &SymbolSet) -> Result<()> {
        let (_defined_old, undefined_old) =
            symbol_extractor::extract(&self.source_library, self.toolchain)?;

        write_atomically(&self.output, |temp_path| {
            let mut src = File::open(&self.source_library)
                .map_err(|e| RelinkerError::io(&self.source_library, e))?;
            let mut dst = File::create(temp_path).map_err(|e| RelinkerError::io(temp_path, e))?;
            io::copy(&mut src, &mut dst).map_err(|e| RelinkerError::io(temp_path, e))?;
            Ok(())
        })?;

        let symbols_needed = undefined_old.intersect(global_known_symbols);
        write_atomically_symbol_set(&self.symbols_needed_output, &symbols_needed)
    }

    /// Step 5: extract from the freshly linked library and verify the
    /// export set matches exactly what we asked for (§7 `LinkError`).
    fn verify_and_emit_symbols_needed(
        &self,
        global_known_symbols: &SymbolSet,
        expected_exports: &SymbolSet,
    ) -> Result<()> {
        let (defined_new, undefined_new) =
            symbol_extractor::extract(&self.output, self.toolchain)?;
        let mandatory = self.toolchain.mandatory_local_symbols();
        let expected = expected_exports.union(mandatory);

        for symbol in expected.iter() {
            if !defined_new.contains(symbol) {
                return Err(RelinkerError::LinkError(
                    self.output.clone(),
                    format!("expected exported symbol {symbol} missing from relinked output"),
                ));
            }
        }

        let symbols_needed = undefined_new.intersect(global_known_symbols);
        write_atomically_symbol_set(&self.symbols_needed_output, &symbols_needed)
    }

    /// Path for the version script, kept unique per library even when
    /// several `RelinkAction`s of the same CPU share an output directory.
    fn scratch_path(&self) -> PathBuf {
        let dir = self.output.parent().unwrap_or_else(|| Path::new("."));
        let mut name = self
            .output
            .file_name()
            .unwrap_or_default()
            .to_os_string();
        name.push(".version-script.map");
        dir.join(name)
    }
}

/// Runs `write_fn` against a temporary file in the same directory as
/// `final_path`, then atomically renames it into place on success. If
/// `write_fn` fails, the temporary file is discarded and `final_path` is
/// left untouched (`TempWriteThenRename`, §5).
fn write_atomically(
    final_path: &Path,
    write_fn: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    let dir = final_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| RelinkerError::io(dir, e))?;
    let temp = NamedTempFile::new_in(dir).map_err(|e| RelinkerError::io(dir, e))?;
    write_fn(temp.path())?;
    temp.persist(final_path)
        .map_err(|e| RelinkerError::io(final_path, e.error))?;
    Ok(())
}

fn write_atomically_symbol_set(final_path: &Path, symbols: &SymbolSet) -> Result<()> {
    let dir = final_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| RelinkerError::io(dir, e))?;
    let temp = NamedTempFile::new_in(dir).map_err(|e| RelinkerError::io(dir, e))?;
    symbols.write(temp.path())?;
    temp.persist(final_path)
        .map_err(|e| RelinkerError::io(final_path, e.error))?;
    Ok(())
}
