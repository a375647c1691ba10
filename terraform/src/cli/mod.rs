use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
use self::commands::{compile, extract};

pub use compile::Command as CompileCommand;
pub use extract::Command as ExtractCommand;

#[derive(Debug, Parser)]
#[clap(name = "terraform", about = "World map script editor", version)]
struct Opt {
    /// the command to run
    #[clap(subcommand)]
    command: Terraform,
}

#[derive(Debug, Subcommand)]
enum Terraform {
    Extract(ExtractCommand),
    Compile(CompileCommand),
}

pub(crate) fn run_cli() -> Result<()> {
    let opt = Opt::parse();

    match opt.command {
        Terraform::Extract(command) => extract::exec(command),
        Terraform::Compile(command) => compile::exec(command),
    }
}
