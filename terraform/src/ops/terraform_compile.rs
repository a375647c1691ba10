use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use worldscript_core::container::{self, FunctionKey};
use worldscript_core::{assembler, parser};

use crate::cli::CompileCommand;
use crate::utils::ftext;
use crate::utils::lgp;
use crate::utils::tracing::println_info;

const SCRIPT_NAMES: [&str; 3] = ["wm0.ev", "wm2.ev", "wm3.ev"];

pub fn compile(command: CompileCommand) -> Result<()> {
    if !command.input_dir.is_dir() {
        bail!("input directory not found: {}", command.input_dir.display());
    }

    println_info("Reading messages...");
    let messages = load_messages(&command.input_dir)?;
    let mut replacements = vec![("mes".to_string(), container::write_messages(&messages)?)];

    println_info("Reading scripts...");
    for script in SCRIPT_NAMES {
        let directory = command.input_dir.join(script);
        if !directory.is_dir() {
            bail!("script directory not found: {}", directory.display());
        }
        let functions = compile_script(&directory)?;
        replacements.push((script.to_string(), container::write_script(&functions)?));
    }

    println_info("Packing the archive...");
    lgp::pack(&command.archive, &replacements)?;
    Ok(())
}

/// Splits `messages.txt` on its `---[ MESSAGE ID n:` separators and encodes
/// each message.
fn load_messages(input_dir: &Path) -> Result<Vec<Vec<u8>>> {
    let path = input_dir.join("messages.txt");
    let text = fs::read_to_string(&path)
        .with_context(|| format!("messages.txt not found in {}", input_dir.display()))?;

    let mut messages: Vec<String> = Vec::new();
    for line in text.lines() {
        if line.starts_with("---[ MES") {
            messages.push(String::new());
        } else if let Some(current) = messages.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }

    let mut encoded = Vec::with_capacity(messages.len());
    for (id, message) in messages.iter().enumerate() {
        encoded.push(ftext::encode(message.trim()).with_context(|| format!("in message ID {id}"))?);
    }
    Ok(encoded)
}

/// Compiles every `.s` file of one script directory, prefix-grouped
/// (`system`, `model`, `mesh`) and sorted within each group, with a running
/// base offset so jump targets come out absolute.
fn compile_script(directory: &Path) -> Result<Vec<(FunctionKey, Vec<u8>)>> {
    let mut all_names = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(".s") {
                all_names.push(name.to_string());
            }
        }
    }

    let mut names = Vec::with_capacity(all_names.len());
    for prefix in ["system", "model", "mesh"] {
        let mut group: Vec<String> = all_names
            .iter()
            .filter(|name| name.contains(prefix))
            .cloned()
            .collect();
        group.sort();
        names.extend(group);
    }

    let mut functions = Vec::with_capacity(names.len());
    let mut offset = 1usize;
    for name in &names {
        let stem = name.trim_end_matches(".s");
        let key = FunctionKey::from_file_stem(stem)?;
        let source = fs::read_to_string(directory.join(name))?;
        let statements = parser::parse_program(&source, name)?;
        let code =
            assembler::assemble(&statements, offset).with_context(|| format!("in {name}"))?;
        offset += code.len() / 2;
        functions.push((key, code));
    }
    Ok(functions)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cli::{CompileCommand, ExtractCommand};
    use crate::ops::terraform_extract::extract;
    use crate::utils::lgp::build_test_archive;

    /// Full pipeline: a synthetic archive extracts to text, the text
    /// compiles back, and the containers come out byte-identical.
    #[test]
    fn extract_compile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("world.lgp");
        let output = dir.path().join("output");

        let source = "If SavemapByte(0x0C15) < 5 Then\n  PlaySound(433)\nEndIf\nEnd";
        let statements = parser::parse_program(source, "seed.s").unwrap();
        let code = assembler::assemble(&statements, 1).unwrap();
        let wm0 =
            container::write_script(&[(FunctionKey::System { id: 0 }, code)]).unwrap();
        let empty = container::write_script(&[]).unwrap();
        let mes = container::write_messages(&[
            ftext::encode("Hello, world!").unwrap(),
            ftext::encode("Second message").unwrap(),
        ])
        .unwrap();

        let archive = build_test_archive(&[
            ("mes", &mes),
            ("wm0.ev", &wm0),
            ("wm2.ev", &empty),
            ("wm3.ev", &empty),
        ]);
        fs::write(&archive_path, archive).unwrap();

        extract(ExtractCommand {
            archive: archive_path.clone(),
            output: output.clone(),
            verbose: false,
        })
        .unwrap();

        let messages_txt = fs::read_to_string(output.join("messages.txt")).unwrap();
        assert!(messages_txt.starts_with("---[ MESSAGE ID 0:\nHello, world!\n"));
        let dumped =
            fs::read_to_string(output.join("wm0.ev").join("000_system_00.s")).unwrap();
        assert!(dumped.contains("If SavemapByte(0x0C15) < 5 Then"), "{dumped}");
        assert!(dumped.contains("  PlaySound(433)"), "{dumped}");

        compile(CompileCommand {
            input_dir: output,
            archive: archive_path.clone(),
        })
        .unwrap();

        let files = crate::utils::lgp::load_files(&archive_path).unwrap();
        assert_eq!(files[0].1, mes);
        assert_eq!(files[1].1, wm0);
        assert_eq!(files[2].1, empty);
        assert_eq!(files[3].1, empty);
    }
}
