mod cli;
mod ops;
mod utils;

use crate::utils::tracing::{init_tracing, println_error};

fn main() {
    init_tracing();
    if let Err(err) = cli::run_cli() {
        println_error(&format!("{err:#}"));
        std::process::exit(1);
    }
}
