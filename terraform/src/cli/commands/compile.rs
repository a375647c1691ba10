use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::ops::terraform_compile;

/// Compile a directory of textual scripts back into the archive.
#[derive(Debug, Parser)]
pub struct Command {
    /// Directory produced by `terraform extract`.
    pub input_dir: PathBuf,
    /// Path to the world archive to repack.
    pub archive: PathBuf,
}

pub(crate) fn exec(command: Command) -> Result<()> {
    terraform_compile::compile(command)
}
