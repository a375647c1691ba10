//! Turns the code area back into textual assembly.
//!
//! Disassembly runs a pseudo-stack: every decoded instruction is pushed onto
//! a flat vector, and an opcode with stack arguments pops its operands back
//! off and folds them into its own parameter strings. `If` targets are
//! tracked so the matching `EndIf` can be synthesized when the stream
//! reaches them, and `GoTo` targets become numbered labels.

use std::collections::HashMap;

use crate::constants;
use crate::container::{FunctionKey, IndexEntry};
use crate::error::{Result, ScriptError};
use crate::opcode::{self, codes};

/// Prefix for rendered `Value` parameters. Empty in the shipped format.
const VALUE_PREFIX: &str = "";

const MESSAGE_PREVIEW_LEN: usize = 50;

#[derive(Debug, Clone)]
pub struct Instruction {
    pub mnemonic: String,
    /// Rendered parameter strings: decimal, hex, `$Name` or folded
    /// sub-expressions.
    pub params: Vec<String>,
    /// Word position of the opcode within the code area.
    pub pc: usize,
    pub indent: usize,
    /// Provenance words, in source order. `None` for synthesized `EndIf`s.
    pub raw: Option<Vec<u16>>,
}

#[derive(Debug, Clone)]
pub enum Function {
    Code {
        name: String,
        entry: IndexEntry,
        instructions: Vec<Instruction>,
        /// Label targets in first-use order; `LABEL_n` is `labels[n - 1]`.
        labels: Vec<usize>,
    },
    /// A later index entry pointing at an offset already disassembled.
    DuplicateStub { name: String, original: usize },
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Code { name, .. } => name,
            Function::DuplicateStub { name, .. } => name,
        }
    }
}

/// Disassembles every indexed function, in index order.
pub fn disassemble(index: &[IndexEntry], code: &[u16]) -> Result<Vec<Function>> {
    let mut functions = Vec::with_capacity(index.len());
    let mut seen_offsets: HashMap<u16, usize> = HashMap::new();

    for (file_id, entry) in index.iter().enumerate() {
        let name = entry.key.file_stem(file_id);
        if let Some(&original) = seen_offsets.get(&entry.offset) {
            let stub_name = format!("{}-{original:03}{}", &name[..3], &name[3..]);
            functions.push(Function::DuplicateStub {
                name: stub_name,
                original,
            });
            continue;
        }
        seen_offsets.insert(entry.offset, file_id);
        functions.push(disassemble_function(name, *entry, code)?);
    }
    Ok(functions)
}

fn disassemble_function(name: String, entry: IndexEntry, code: &[u16]) -> Result<Function> {
    let mut instructions: Vec<Instruction> = Vec::new();
    let mut labels: Vec<usize> = Vec::new();
    let mut jumps: Vec<usize> = Vec::new();
    let mut indent = 0usize;
    let mut pos = entry.offset as usize;

    let truncated = |name: &str, pos: usize| {
        ScriptError::MalformedContainer(format!("function {name}: code truncated at word {pos}"))
    };

    loop {
        let word = *code.get(pos).ok_or_else(|| truncated(&name, pos))?;
        let mut words = vec![word];
        pos += 1;

        let op = if (codes::RUN_MODEL_FUNCTION..codes::RUN_MODEL_FUNCTION_END).contains(&word) {
            opcode::by_mnemonic("RunModelFunction").expect("RunModelFunction is in the table")
        } else if let Some(op) = opcode::by_code(word) {
            op
        } else {
            instructions.push(Instruction {
                mnemonic: format!("Unknown{word:04x}"),
                params: Vec::new(),
                pc: pos - 1,
                indent,
                raw: Some(words),
            });
            continue;
        };

        let mut params: Vec<String> = Vec::new();

        if op.stack_arity > 0 {
            for i in 0..op.stack_arity {
                let arg = instructions.pop().ok_or_else(|| {
                    ScriptError::MalformedContainer(format!(
                        "function {name}: stack underrun folding {} at word {}",
                        op.mnemonic,
                        pos - 1
                    ))
                })?;
                if let Some(raw) = &arg.raw {
                    words.splice(0..0, raw.iter().copied());
                }
                let arg_code = opcode::by_mnemonic(&arg.mnemonic).map(|o| o.code);

                // Comparisons against the player model or the last field id
                // rewrite their other operand through the constant maps.
                if op.code == codes::EQ && arg_code == Some(codes::SPECIAL_BYTE) {
                    match arg.params.first().map(String::as_str) {
                        Some("$PlayerEntityModelId") => {
                            remap_last(&mut params, constants::model_name)
                        }
                        Some("$LastFieldID") => remap_last(&mut params, constants::field_name),
                        _ => {}
                    }
                }

                params.push(render_stack_arg(word, i, &arg, arg_code));
            }
            params.reverse();
        }

        for _ in 0..op.inline_arity {
            let inline = *code.get(pos).ok_or_else(|| truncated(&name, pos))?;
            words.push(inline);
            match op.code {
                codes::SAVEMAP_BIT => {
                    params.push(savemap_param((inline >> 3) + codes::SAVEMAP_BASE));
                    params.push((inline & 7).to_string());
                }
                codes::SAVEMAP_BYTE | codes::SAVEMAP_WORD => {
                    params.push(savemap_param((inline >> 3) + codes::SAVEMAP_BASE));
                }
                codes::SPECIAL_BIT | codes::SPECIAL_BYTE | codes::SPECIAL_WORD => {
                    match constants::special_var(inline) {
                        Some(var) => params.push(format!("${var}")),
                        None => params.push(inline.to_string()),
                    }
                }
                codes::GOTO => {
                    let target = inline as usize;
                    let idx = match labels.iter().position(|&l| l == target) {
                        Some(idx) => idx,
                        None => {
                            labels.push(target);
                            labels.len() - 1
                        }
                    };
                    params.push(format!("LABEL_{}", idx + 1));
                }
                // The If placeholder is implicit in the textual form; only
                // remember where the block ends.
                codes::IF => jumps.push(inline as usize),
                _ => params.push(inline.to_string()),
            }
            pos += 1;
        }

        if (codes::RUN_MODEL_FUNCTION..codes::RUN_MODEL_FUNCTION_END).contains(&word) {
            params.push((word - codes::RUN_MODEL_FUNCTION).to_string());
        }

        instructions.push(Instruction {
            mnemonic: op.mnemonic.to_string(),
            params,
            pc: pos - 1 - op.inline_arity,
            indent,
            raw: Some(words),
        });

        // De-indent wherever a pending If jump lands.
        while jumps.contains(&pos) {
            indent = indent.saturating_sub(1);
            jumps.pop();
            instructions.push(Instruction {
                mnemonic: "EndIf".to_string(),
                params: Vec::new(),
                pc: pos,
                indent,
                raw: None,
            });
        }

        if op.code == codes::IF {
            indent += 1;
        }
        if op.code == codes::RETURN {
            break;
        }
    }

    Ok(Function::Code {
        name,
        entry,
        instructions,
        labels,
    })
}

fn remap_last(params: &mut [String], lookup: fn(u16) -> Option<&'static str>) {
    if let Some(last) = params.last_mut() {
        let text = last.strip_prefix(VALUE_PREFIX).unwrap_or(last);
        if let Some(mapped) = text.parse().ok().and_then(lookup) {
            *last = format!("{VALUE_PREFIX}${mapped}");
        }
    }
}

fn render_stack_arg(parent: u16, i: usize, arg: &Instruction, arg_code: Option<u16>) -> String {
    if arg_code == Some(codes::VALUE) {
        let text = &arg.params[0];
        if opcode::is_model_opcode(parent) {
            if let Some(model) = text.parse().ok().and_then(constants::model_name) {
                return format!("{VALUE_PREFIX}${model}");
            }
        }
        if parent == codes::ENTER_FIELD_LEVEL && i == 1 {
            if let Some(field) = text.parse().ok().and_then(constants::field_name) {
                return format!("{VALUE_PREFIX}${field}");
            }
        }
        return format!("{VALUE_PREFIX}{text}");
    }
    match arg_code {
        Some(codes::NEG) => format!("-{}", arg.params[0]),
        Some(code) => match opcode::infix_token(code) {
            Some(token) => format!("{} {token} {}", arg.params[0], arg.params[1]),
            None => render_call(arg),
        },
        None => render_call(arg),
    }
}

fn render_call(arg: &Instruction) -> String {
    format!("{}({})", arg.mnemonic, arg.params.join(", "))
}

fn savemap_param(address: u16) -> String {
    match constants::savemap_var(address) {
        Some(var) => format!("${var}"),
        None => format!("0x{address:04X}"),
    }
}

/// Renders one function to its on-disk textual form.
pub fn render(function: &Function, messages: &[String], verbose: bool) -> String {
    let (entry, instructions, labels) = match function {
        Function::DuplicateStub { original, .. } => {
            return format!("# Dummy function, duplicate of function #{original:03}");
        }
        Function::Code {
            entry,
            instructions,
            labels,
            ..
        } => (entry, instructions, labels),
    };

    let mut out = String::new();
    match entry.key {
        FunctionKey::System { id } => {
            out.push_str(&format!("# System Function ID {id:02}\n"));
        }
        FunctionKey::Model { model_id, id } => {
            let model = constants::model_name(model_id as u16).unwrap_or("Unknown");
            out.push_str(&format!(
                "# Model ID {model_id:02} ({model}), Function ID {id:02}\n"
            ));
        }
        FunctionKey::Mesh {
            coords,
            walkmesh_type,
        } => {
            out.push_str(&format!(
                "# Mesh Function ID {coords}, Mesh Type {walkmesh_type}\n"
            ));
        }
    }
    out.push_str(&format!(
        "# Start offset: 0x{:04x}\n\n",
        entry.offset as usize * 2 + 0x400
    ));

    for instruction in instructions {
        let pad = "  ".repeat(instruction.indent);

        if instruction.raw.is_some() && labels.contains(&instruction.pc) {
            let idx = labels.iter().position(|&l| l == instruction.pc).map_or(0, |i| i + 1);
            out.push_str(&format!("{pad}@LABEL_{idx}\n"));
        }

        // ResetStack is reinserted by the assembler; dumping it is noise.
        if instruction.mnemonic == "ResetStack" {
            continue;
        }

        let text = match instruction.mnemonic.as_str() {
            "If" => format!("If {} Then", instruction.params[0]),
            "EndIf" => "EndIf".to_string(),
            "Return" => "End".to_string(),
            "GoTo" => format!("GoTo @{}", instruction.params[0]),
            "SetWindowMessage" => {
                let mut text = render_call(instruction);
                if let Some(preview) = message_preview(instruction, messages) {
                    text.push_str(&format!(" # {preview}"));
                }
                text
            }
            _ => render_call(instruction),
        };

        if verbose {
            if let Some(raw) = &instruction.raw {
                let hex: String = raw
                    .iter()
                    .map(|w| format!(" {:02x}{:02x}", w & 0xFF, w >> 8))
                    .collect();
                out.push_str(&format!("{pad}# {:04x}:{hex}\n", instruction.pc));
            }
        }

        out.push_str(&format!("{pad}{text}\n"));
    }

    out
}

fn message_preview(instruction: &Instruction, messages: &[String]) -> Option<String> {
    let id: usize = instruction.params.first()?.parse().ok()?;
    let message = messages.get(id)?.replace('\n', " ");
    if message.chars().count() > MESSAGE_PREVIEW_LEN {
        let clipped: String = message.chars().take(MESSAGE_PREVIEW_LEN).collect();
        Some(format!("{clipped} ..."))
    } else {
        Some(message)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assembler::assemble;
    use crate::opcode::codes::RETURN;
    use crate::parser::parse_program;

    fn entry(offset: u16) -> IndexEntry {
        IndexEntry {
            key: FunctionKey::System { id: 1 },
            offset,
        }
    }

    /// Lays out a code area the way the container does: shared Return at
    /// word 0, then the function at word 1.
    fn code_area(function_bytes: &[u8]) -> Vec<u16> {
        let mut code = vec![RETURN];
        code.extend(
            function_bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
        );
        code
    }

    fn body_lines(rendered: &str) -> Vec<&str> {
        rendered
            .lines()
            .filter(|line| !line.starts_with('#') && !line.is_empty())
            .collect()
    }

    #[test]
    fn text_and_bytes_round_trip() {
        let source = "If SpecialByte($PlayerEntityModelId) == $Buggy Then\n\
                      \x20 RunModelFunction($Buggy, 18)\n\
                      \x20 GoTo @LABEL_1\n\
                      EndIf\n\
                      @LABEL_1\n\
                      End";
        let statements = parse_program(source, "test.s").unwrap();
        let bytes = assemble(&statements, 1).unwrap();
        let code = code_area(&bytes);

        let functions = disassemble(&[entry(1)], &code).unwrap();
        let rendered = render(&functions[0], &[], false);
        assert_eq!(
            body_lines(&rendered),
            vec![
                "If SpecialByte($PlayerEntityModelId) == $Buggy Then",
                "  RunModelFunction($Buggy, 18)",
                "  GoTo @LABEL_1",
                "EndIf",
                "@LABEL_1",
                "End",
            ]
        );

        // Reassembling the dump reproduces the bytes exactly.
        let reparsed = parse_program(&rendered, "roundtrip.s").unwrap();
        let reassembled = assemble(&reparsed, 1).unwrap();
        assert_eq!(reassembled, bytes);
    }

    #[test]
    fn expression_folding_round_trip() {
        let source = "WriteTo(SavemapByte(0x0C14), SavemapByte(0x0C14) - 1)\n\
                      SetEntityAltitudeOffset(SavemapWord(0x0C16) - 3685 >> 1)\n\
                      End";
        let statements = parse_program(source, "test.s").unwrap();
        let bytes = assemble(&statements, 1).unwrap();
        let code = code_area(&bytes);

        let functions = disassemble(&[entry(1)], &code).unwrap();
        let rendered = render(&functions[0], &[], false);
        let reparsed = parse_program(&rendered, "roundtrip.s").unwrap();
        assert_eq!(assemble(&reparsed, 1).unwrap(), bytes);
        assert!(rendered.contains("SavemapByte(0x0C14) - 1"));
        assert!(rendered.contains("SavemapWord(0x0C16) - 3685 >> 1"));
    }

    #[test]
    fn run_model_function_range_decodes() {
        // 0x215 - 0x204 = 17.
        let code = vec![RETURN, 0x110, 99, 0x215, RETURN];
        let functions = disassemble(&[entry(1)], &code).unwrap();
        let Function::Code { instructions, .. } = &functions[0] else {
            panic!("expected code");
        };
        let rmf = &instructions[0];
        assert_eq!(rmf.mnemonic, "RunModelFunction");
        assert_eq!(rmf.params, vec!["99".to_string(), "17".to_string()]);
    }

    #[test]
    fn unknown_opcodes_render_as_hex() {
        let code = vec![RETURN, 0x30d, RETURN];
        let functions = disassemble(&[entry(1)], &code).unwrap();
        let rendered = render(&functions[0], &[], false);
        assert!(rendered.contains("Unknown030d()"), "{rendered}");
    }

    #[test]
    fn named_savemap_and_special_vars() {
        // WriteTo(SavemapWord($GameProgress), SpecialByte($LastFieldID))
        let code = vec![RETURN, 0x11c, 0, 0x11b, 6, 0x0e0, RETURN];
        let functions = disassemble(&[entry(1)], &code).unwrap();
        let rendered = render(&functions[0], &[], false);
        assert!(
            rendered.contains("WriteTo(SavemapWord($GameProgress), SpecialByte($LastFieldID))"),
            "{rendered}"
        );
    }

    #[test]
    fn field_comparison_peephole() {
        // SpecialByte($LastFieldID) == 3 folds 3 through the field map.
        let code = vec![RETURN, 0x11b, 6, 0x110, 3, 0x070, 0x201, 8, RETURN];
        let functions = disassemble(&[entry(1)], &code).unwrap();
        let rendered = render(&functions[0], &[], false);
        assert!(
            rendered.contains("If SpecialByte($LastFieldID) == $ChocoboFarm Then"),
            "{rendered}"
        );
    }

    #[test]
    fn duplicate_offsets_become_stubs() {
        let index = [
            entry(1),
            IndexEntry {
                key: FunctionKey::System { id: 2 },
                offset: 1,
            },
        ];
        let code = vec![RETURN, RETURN];
        let functions = disassemble(&index, &code).unwrap();
        assert_eq!(functions.len(), 2);
        match &functions[1] {
            Function::DuplicateStub { name, original } => {
                assert_eq!(name, "001-000_system_02");
                assert_eq!(*original, 0);
            }
            other => panic!("expected stub, got {other:?}"),
        }
        assert_eq!(
            render(&functions[1], &[], false),
            "# Dummy function, duplicate of function #000"
        );
    }

    #[test]
    fn verbose_adds_hex_comments() {
        let source = "PlayLayerAnimation(0x06)\nEnd";
        let statements = parse_program(source, "test.s").unwrap();
        let bytes = assemble(&statements, 1).unwrap();
        let code = code_area(&bytes);
        let rendered = render(&disassemble(&[entry(1)], &code).unwrap()[0], &[], true);
        // The hex comment carries the folded instruction's pc and all of its
        // provenance words.
        assert!(rendered.contains("# 0003: 1001 0600 4a03"), "{rendered}");
    }

    #[test]
    fn window_message_preview() {
        // SetWindowMessage(0) with a long message gets a clipped comment.
        let code = vec![RETURN, 0x110, 0, 0x325, RETURN];
        let messages = vec!["A very long line\nthat keeps going well past the fifty character mark".to_string()];
        let rendered = render(&disassemble(&[entry(1)], &code).unwrap()[0], &messages, false);
        let line = rendered
            .lines()
            .find(|l| l.starts_with("SetWindowMessage"))
            .unwrap_or_default()
            .to_string();
        assert!(line.contains("SetWindowMessage(0) # A very long line that"), "{line}");
        assert!(line.ends_with(" ..."), "{line}");
    }

    #[test]
    fn stack_underrun_is_malformed() {
        // WriteTo with nothing on the pseudo-stack.
        let code = vec![RETURN, 0x0e0, RETURN];
        let err = disassemble(&[entry(1)], &code).unwrap_err();
        assert!(matches!(err, ScriptError::MalformedContainer(_)), "{err}");
    }

    #[test]
    fn truncated_code_is_malformed() {
        let code = vec![RETURN, 0x110];
        let err = disassemble(&[entry(1)], &code).unwrap_err();
        assert!(matches!(err, ScriptError::MalformedContainer(_)), "{err}");
    }
}
