use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::ops::terraform_extract;

/// Extract world map scripts and messages from an archive into editable
/// text files.
#[derive(Debug, Parser)]
pub struct Command {
    /// Path to the world archive (e.g. world_us.lgp).
    pub archive: PathBuf,
    /// Directory the text files are written to.
    #[clap(short = 'o', long = "output", default_value = "output")]
    pub output: PathBuf,
    /// Add a hex dump comment above each opcode.
    #[clap(short = 'v', long = "verbose")]
    pub verbose: bool,
}

pub(crate) fn exec(command: Command) -> Result<()> {
    terraform_extract::extract(command)
}
