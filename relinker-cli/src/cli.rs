use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "relinker",
    version,
    about = "Reduces the exported symbol set of a package's native libraries to the minimum their in-package dependents need."
)]
pub struct Opt {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// Build the relink plan and write the rewrite map and ordered node
    /// list as JSON, without relinking anything.
    Plan(PlanArgs),

    /// Build the relink plan and run the sequential reference scheduler
    /// over it, producing the relinked libraries.
    Relink(PlanArgs),
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Path to the package manifest (see `relinker_cli::manifest`).
    #[arg(long)]
    pub manifest: PathBuf,

    /// Directory relinked libraries, symbols-needed files, and (for `plan`)
    /// the plan summary JSON are written under.
    #[arg(long = "out-dir")]
    pub out_dir: PathBuf,
}
