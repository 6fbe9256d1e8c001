//! Emits a linker version script exporting exactly a given symbol set plus
//! mandatory symbols.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{RelinkerError, Result};
use crate::symbol_set::SymbolSet;

/// Writes a single-anonymous-version linker script to `path` that exports
/// every member of `exported ∪ mandatory_local` as `global:` and hides
/// everything else as `local:`.
///
/// Mandatory local symbols (e.g. `__bss_start`, `_edata`, `_end`) are always
/// folded into the export set before emission, per §4.3 — they must never be
/// hidden even if no dependent references them. The output is sorted, so it
/// is byte-stable for a given `(exported, mandatory_local)` pair.
pub fn write(path: &Path, exported: &SymbolSet, mandatory_local: &SymbolSet) -> Result<()> {
    let all_exports = exported.union(mandatory_local);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RelinkerError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| RelinkerError::io(path, e))?;
    let mut w = BufWriter::new(file);

    (|| -> std::io::Result<()> {
        writeln!(w, "{{")?;
        writeln!(w, "  global:")?;
        for name in all_exports.iter() {
            writeln!(w, "    {name};")?;
        }
        writeln!(w, "  local:")?;
        writeln!(w, "    *;")?;
        writeln!(w, "}};")
    })()
    .map_err(|e| RelinkerError::io(path, e))?;

    w.flush().map_err(|e| RelinkerError::io(path, e))?;
    Ok(())
}
