//! Given a shared object, lists the symbols it defines (exports) and the
//! symbols it references but leaves undefined.
//!
//! Extraction is split into invoking the toolchain's symbol dumper (the
//! [`crate::model::Toolchain`] trait, implemented against a real `nm`/
//! `objdump` in the `relinker-toolchain` crate) and parsing that dumper's
//! textual output (this module, a pure function with no process-invocation
//! logic so it can be tested against fixed text fixtures).

use std::path::Path;

use crate::error::Result;
use crate::model::Toolchain;
use crate::symbol_set::SymbolSet;

/// `extract(libraryPath, toolchain) -> (defined, undefined)`, per §4.2.
///
/// This is a thin facade: the actual dumping is the toolchain's job (it
/// knows which binary to run and how to run it for its CPU); this function
/// exists so call sites in `relink_action.rs` have one name to call
/// regardless of which concrete toolchain is in use.
pub fn extract(library_path: &Path, toolchain: &dyn Toolchain) -> Result<(SymbolSet, SymbolSet)> {
    toolchain.extract_symbols(library_path)
}

/// Symbol type code from one line of `nm -D` style output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolDisposition {
    /// Referenced but not defined here (section is `SHN_UNDEF`).
    Undefined,
    /// Defined here with binding other than `LOCAL`.
    Defined,
    /// Defined here with `LOCAL` binding: an implementation detail, neither
    /// exported nor a reference to another library.
    Local,
}

fn classify(type_char: char) -> SymbolDisposition {
    // nm's one-letter symbol type convention: uppercase means global (or
    // weak) binding, lowercase means local binding. The two exceptions are
    // 'U' (undefined, always uppercase, never local) and 'w' (undefined
    // weak reference, lowercase despite referring to something undefined).
    match type_char {
        'U' | 'w' => SymbolDisposition::Undefined,
        c if c.is_ascii_uppercase() => SymbolDisposition::Defined,
        _ => SymbolDisposition::Local,
    }
}

/// Parses the textual output of an `nm -D`-equivalent symbol dumper into
/// `(defined, undefined)` sets, per the `defined`/`undefined` contract in
/// §4.2. Each line is either `<address> <type> <name>` (defined symbols
/// carry an address) or `<type> <name>` (undefined symbols have none).
/// Blank lines and lines that don't parse as a symbol record are ignored.
pub fn parse_dump_output(stdout: &str) -> (SymbolSet, SymbolSet) {
    let mut defined = SymbolSet::empty();
    let mut undefined = SymbolSet::empty();

    for line in stdout.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (type_field, name) = match fields.as_slice() {
            [type_field, name] => (*type_field, *name),
            [_addr, type_field, name] => (*type_field, *name),
            _ => continue,
        };
        let Some(type_char) = type_field.chars().next() else {
            continue;
        };
        if type_field.len() != 1 {
            continue;
        }
        match classify(type_char) {
            SymbolDisposition::Defined => defined.insert(name.to_string()),
            SymbolDisposition::Undefined => undefined.insert(name.to_string()),
            SymbolDisposition::Local => {}
        }
    }

    (defined, undefined)
}
