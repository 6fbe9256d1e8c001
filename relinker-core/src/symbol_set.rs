use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{RelinkerError, Result};

/// An unordered set of linker symbol names (UTF-8, versioning suffix
/// preserved verbatim).
///
/// The serialized form is the canonical form: one symbol per line, sorted
/// lexicographically, LF-terminated, no comments, no trailing whitespace.
/// Two `SymbolSet`s are equal iff their serialized forms are byte-identical,
/// which the `BTreeSet` backing gives us for free.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSet {
    names: BTreeSet<String>,
}

impl SymbolSet {
    pub fn empty() -> Self {
        SymbolSet::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn union(&self, other: &SymbolSet) -> SymbolSet {
        SymbolSet {
            names: self.names.union(&other.names).cloned().collect(),
        }
    }

    pub fn union_all<'a>(sets: impl IntoIterator<Item = &'a SymbolSet>) -> SymbolSet {
        let mut result = SymbolSet::empty();
        for set in sets {
            result.names.extend(set.names.iter().cloned());
        }
        result
    }

    pub fn intersect(&self, other: &SymbolSet) -> SymbolSet {
        SymbolSet {
            names: self.names.intersection(&other.names).cloned().collect(),
        }
    }

    /// Serializes the set in canonical form: one symbol per line, sorted,
    /// LF-terminated, no trailing blank line.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RelinkerError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| RelinkerError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        for name in &self.names {
            writer
                .write_all(name.as_bytes())
                .and_then(|_| writer.write_all(b"\n"))
                .map_err(|e| RelinkerError::io(path, e))?;
        }
        writer.flush().map_err(|e| RelinkerError::io(path, e))?;
        Ok(())
    }

    /// Reads a symbol set previously written by [`SymbolSet::write`]. An
    /// absent file is always a [`RelinkerError::MissingSymbolArtifact`], not
    /// an empty set, since a missing artifact signals an upstream action
    /// that has not run yet.
    pub fn read(path: &Path) -> Result<SymbolSet> {
        let contents = fs::read_to_string(path)
            .map_err(|_| RelinkerError::MissingSymbolArtifact(path.to_path_buf()))?;
        let mut set = SymbolSet::empty();
        for line in contents.lines() {
            if !line.is_empty() {
                set.insert(line.to_string());
            }
        }
        Ok(set)
    }
}

impl FromIterator<String> for SymbolSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        SymbolSet {
            names: iter.into_iter().collect(),
        }
    }
}
