//! Reverse-dependency analysis and fixed-point relink scheduling for
//! reducing the exported symbol set of shared libraries destined for an
//! Android-style application package.
//!
//! A smaller exported-symbol set lets the native linker perform more
//! aggressive cross-DSO dead-code elimination at packaging time. Given a
//! set of shared libraries, each owned by a node in a host build graph or
//! of unknown ("copied") provenance, [`planner::plan`] computes, for every
//! library, the minimal export set its in-package dependents actually need
//! and produces an ordered list of [`model::RelinkNode`]s that a scheduler
//! can execute to produce the reduced libraries.
//!
//! This crate is the core: it has no knowledge of any specific host build
//! system or toolchain binary. Both are supplied through the
//! [`model::BuildGraphOracle`] and [`model::Toolchain`] traits. The
//! `relinker-toolchain` crate supplies a concrete `Toolchain`; the
//! `relinker-cli` crate supplies a manifest-backed `BuildGraphOracle` and a
//! sequential reference scheduler, for standalone use outside of a real
//! build.
//!
//! # Flow
//!
//! 1. [`planner::plan`] partitions the input by CPU, runs
//!    [`dependency_analyzer::analyze`] to learn which owned libraries
//!    transitively depend on which, and emits one [`model::RelinkNode`]
//!    per input library in dependent-before-dependency order.
//! 2. A scheduler executes each node's [`relink_action::RelinkAction`] in
//!    that order (or any order consistent with each node's
//!    `upstream_deps`). Each action reads its upstream nodes'
//!    symbols-needed files, filters that demand down to symbols its own
//!    library actually defines, emits a version script via
//!    [`version_script::write`], invokes the toolchain's linker, and
//!    publishes its own symbols-needed file for its own upstream nodes to
//!    read in turn.

pub mod dependency_analyzer;
pub mod error;
pub mod model;
pub mod planner;
pub mod relink_action;
pub mod symbol_extractor;
pub mod symbol_set;
pub mod version_script;

pub use error::{RelinkerError, Result};
pub use model::{
    BuildGraphOracle, LibraryHandle, LibraryKey, NodeId, RelinkNode, TargetCpu, Toolchain,
    ToolchainInfo,
};
pub use planner::{plan, Plan, PlannerInputs, RewriteMap};
pub use relink_action::RelinkAction;
pub use symbol_set::SymbolSet;
