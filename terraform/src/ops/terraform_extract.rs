use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;

use worldscript_core::{container, disassembler};

use crate::cli::ExtractCommand;
use crate::utils::ftext;
use crate::utils::lgp;
use crate::utils::tracing::println_info;

pub fn extract(command: ExtractCommand) -> Result<()> {
    let files = lgp::load_files(&command.archive)?;

    let mut scripts = Vec::new();
    let mut messages_file = None;
    for (name, data) in &files {
        let plain = name.trim_start_matches('/');
        if is_script_name(plain) {
            scripts.push((plain.to_string(), data.as_slice()));
        } else if plain == "mes" {
            messages_file = Some(data.as_slice());
        }
    }
    let messages_file = messages_file.ok_or_else(|| {
        anyhow!(
            "messages file 'mes' not found inside {}",
            command.archive.display()
        )
    })?;
    if scripts.len() < 3 {
        bail!(
            "expected three script files (wm0.ev, wm2.ev, wm3.ev), found {}",
            scripts.len()
        );
    }

    let raw_messages = container::read_messages(messages_file)?;
    let mut messages = Vec::with_capacity(raw_messages.len());
    for (id, raw) in raw_messages.iter().enumerate() {
        messages.push(ftext::decode(raw).with_context(|| format!("in message ID {id}"))?);
    }

    fs::create_dir_all(&command.output)?;
    write_messages(&command.output, &messages)?;

    for (name, data) in scripts.iter().take(3) {
        extract_script(name, data, &command, &messages)?;
    }
    Ok(())
}

fn is_script_name(name: &str) -> bool {
    name.len() == 6
        && name.starts_with("wm")
        && name.as_bytes()[2].is_ascii_digit()
        && name.ends_with(".ev")
}

fn write_messages(outdir: &Path, messages: &[String]) -> Result<()> {
    let path = outdir.join("messages.txt");
    println_info(&format!("Writing messages to file: {}", path.display()));
    let mut out = String::new();
    for (id, text) in messages.iter().enumerate() {
        out.push_str(&format!("---[ MESSAGE ID {id}:\n{text}\n\n"));
    }
    fs::write(path, out)?;
    Ok(())
}

fn extract_script(
    name: &str,
    data: &[u8],
    command: &ExtractCommand,
    messages: &[String],
) -> Result<()> {
    let (index, code) = container::read_script(data)?;
    let functions = disassembler::disassemble(&index, &code)?;

    let directory = command.output.join(name);
    println_info(&format!(
        "Writing functions to directory: {}",
        directory.display()
    ));
    fs::create_dir_all(&directory)?;
    for function in &functions {
        let rendered = disassembler::render(function, messages, command.verbose);
        fs::write(directory.join(format!("{}.s", function.name())), rendered)?;
    }
    Ok(())
}
