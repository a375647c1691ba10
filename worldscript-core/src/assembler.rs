//! Lowers parsed statement trees to interpreter bytecode.
//!
//! Two passes: the emit pass walks statements and expressions, producing
//! little-endian words and recording label positions and jump placeholders;
//! `apply_jumps` then patches every placeholder with its absolute target,
//! `label_pc + base_offset`. The evaluation stack is cleared mechanically: a
//! `ResetStack` precedes every control statement once code has been emitted,
//! so hand-written assembly never has to manage the stack.

use crate::constants;
use crate::error::{Result, ScriptError};
use crate::opcode::{self, codes};
use crate::parser::{BinaryOp, Call, Expression, Statement};

/// Placeholder word emitted for unpatched jump targets.
const PLACEHOLDER: u16 = 0xCDAB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpKey {
    /// A `@LABEL_n` target.
    Label(u16),
    /// The skip target of the `If` whose placeholder sits at this word.
    If(usize),
}

pub fn assemble(statements: &[Statement], base_offset: usize) -> Result<Vec<u8>> {
    let mut asm = Assembler::new(base_offset);
    for statement in statements {
        asm.statement(statement)?;
    }
    asm.finish()
}

struct Assembler {
    out: Vec<u8>,
    base_offset: usize,
    /// Open `If` blocks: placeholder word position and source line.
    ifs: Vec<(usize, usize)>,
    labels: Vec<(JumpKey, usize)>,
    /// Queued patches: placeholder word position, target key, source line.
    jumps: Vec<(usize, JumpKey, usize)>,
    /// Set after a statement that leaves the interpreter mid-script; the
    /// next control statement flushes it as a `ResetStack`.
    pending_reset: bool,
}

impl Assembler {
    fn new(base_offset: usize) -> Self {
        Assembler {
            out: Vec::new(),
            base_offset,
            ifs: Vec::new(),
            labels: Vec::new(),
            jumps: Vec::new(),
            pending_reset: false,
        }
    }

    /// Current position in words.
    fn pc(&self) -> usize {
        self.out.len() / 2
    }

    fn emit(&mut self, word: u16) {
        self.out.extend_from_slice(&word.to_le_bytes());
    }

    fn flush_reset(&mut self) {
        if self.pending_reset {
            self.emit(codes::RESET_STACK);
            self.pending_reset = false;
        }
    }

    fn statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::End { .. } => self.emit(codes::RETURN),
            Statement::EndIf { line } => {
                let (position, _) = self
                    .ifs
                    .pop()
                    .ok_or(ScriptError::UnmatchedEndIf { line: *line })?;
                self.labels.push((JumpKey::If(position), self.pc()));
            }
            Statement::Label { id, .. } => self.labels.push((JumpKey::Label(*id), self.pc())),
            Statement::Goto { id, line } => {
                self.flush_reset();
                self.emit(codes::GOTO);
                self.jumps.push((self.pc(), JumpKey::Label(*id), *line));
                self.emit(PLACEHOLDER);
                self.pending_reset = true;
            }
            Statement::If { cond, line } => {
                self.flush_reset();
                self.expression(cond, *line)?;
                self.emit(codes::IF);
                let position = self.pc();
                self.ifs.push((position, *line));
                self.jumps.push((position, JumpKey::If(position), *line));
                self.emit(PLACEHOLDER);
                self.pending_reset = true;
            }
            Statement::Call(call) => {
                self.flush_reset();
                let transfers_control = self.call(call)?;
                self.pending_reset = !transfers_control;
            }
        }
        Ok(())
    }

    /// Emits one opcode call. Returns true for `RunModelFunction`, which
    /// hands control to another entity's function and carries no stack
    /// reset after it.
    fn call(&mut self, call: &Call) -> Result<bool> {
        let line = call.line;
        let op = match opcode::by_mnemonic(&call.mnemonic) {
            Some(op) => op,
            None => return self.unknown_call(call),
        };

        match op.code {
            codes::RUN_MODEL_FUNCTION => {
                let (id_arg, stack_args) =
                    call.args.split_last().ok_or(ScriptError::ValueResolution {
                        token: call.mnemonic.clone(),
                        line,
                    })?;
                let id = self.value_of(id_arg, line)?;
                for arg in stack_args {
                    self.expression(arg, line)?;
                }
                self.emit(codes::RUN_MODEL_FUNCTION + id);
                return Ok(true);
            }
            codes::SAVEMAP_BIT => {
                if call.args.len() != 2 {
                    return Err(self.arity_error(call, 2));
                }
                let address = self.value_of(&call.args[0], line)?;
                let bit = self.value_of(&call.args[1], line)?;
                let word = self
                    .savemap_offset(address, line)?
                    .checked_mul(8)
                    .and_then(|w| w.checked_add(bit))
                    .ok_or(ScriptError::ValueResolution {
                        token: format!("0x{address:04X}"),
                        line,
                    })?;
                self.emit(op.code);
                self.emit(word);
            }
            codes::SAVEMAP_BYTE | codes::SAVEMAP_WORD => {
                if call.args.len() != 1 {
                    return Err(self.arity_error(call, 1));
                }
                let address = self.value_of(&call.args[0], line)?;
                let word = self.savemap_offset(address, line)? * 8;
                self.emit(op.code);
                self.emit(word);
            }
            _ if op.inline_arity > 0 => {
                if call.args.len() != op.inline_arity {
                    return Err(self.arity_error(call, op.inline_arity));
                }
                let mut words = Vec::with_capacity(op.inline_arity);
                for arg in &call.args {
                    words.push(self.value_of(arg, line)?);
                }
                self.emit(op.code);
                for word in words {
                    self.emit(word);
                }
            }
            _ => {
                for arg in &call.args {
                    self.expression(arg, line)?;
                }
                self.emit(op.code);
            }
        }
        Ok(false)
    }

    /// `Unknown<hex>` mnemonics come from the disassembler and lower back to
    /// their raw opcode word.
    fn unknown_call(&mut self, call: &Call) -> Result<bool> {
        if let Some(hex) = call.mnemonic.strip_prefix("Unknown") {
            if let Ok(code) = u16::from_str_radix(hex, 16) {
                if call.args.is_empty() {
                    self.emit(code);
                    return Ok(false);
                }
            }
        }
        Err(ScriptError::UnknownOpcode {
            mnemonic: call.mnemonic.clone(),
            line: call.line,
        })
    }

    fn expression(&mut self, expr: &Expression, line: usize) -> Result<()> {
        match expr {
            Expression::Number(n) => {
                self.emit(codes::VALUE);
                self.emit(*n);
            }
            Expression::Constant(name) | Expression::Variable(name) => {
                let value = resolve_name(name, line)?;
                self.emit(codes::VALUE);
                self.emit(value);
            }
            Expression::Neg(inner) => {
                self.expression(inner, line)?;
                self.emit(codes::NEG);
            }
            Expression::Binary { op, lhs, rhs } => {
                self.expression(lhs, line)?;
                self.expression(rhs, line)?;
                self.emit(binary_code(*op));
            }
            Expression::Call(call) => {
                self.call(call)?;
            }
        }
        Ok(())
    }

    /// Resolves an expression that must be a plain value: a literal or a
    /// named constant.
    fn value_of(&self, expr: &Expression, line: usize) -> Result<u16> {
        match expr {
            Expression::Number(n) => Ok(*n),
            Expression::Constant(name) | Expression::Variable(name) => resolve_name(name, line),
            _ => Err(ScriptError::ValueResolution {
                token: "<expression>".to_string(),
                line,
            }),
        }
    }

    fn savemap_offset(&self, address: u16, line: usize) -> Result<u16> {
        address
            .checked_sub(codes::SAVEMAP_BASE)
            .ok_or(ScriptError::ValueResolution {
                token: format!("0x{address:04X}"),
                line,
            })
    }

    fn arity_error(&self, call: &Call, expected: usize) -> ScriptError {
        ScriptError::ValueResolution {
            token: format!(
                "{}: expected {expected} argument(s), found {}",
                call.mnemonic,
                call.args.len()
            ),
            line: call.line,
        }
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        if let Some(&(_, line)) = self.ifs.last() {
            return Err(ScriptError::UnterminatedIf { line });
        }
        self.apply_jumps()?;
        Ok(self.out)
    }

    fn apply_jumps(&mut self) -> Result<()> {
        for &(position, key, line) in &self.jumps {
            let target = self
                .labels
                .iter()
                .find(|(k, _)| *k == key)
                .map(|&(_, pc)| pc)
                .ok_or(match key {
                    JumpKey::Label(id) => ScriptError::UnresolvedLabel { id },
                    JumpKey::If(_) => ScriptError::UnterminatedIf { line },
                })?;
            let word = (target + self.base_offset) as u16;
            self.out[position * 2..position * 2 + 2].copy_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }
}

fn resolve_name(name: &str, line: usize) -> Result<u16> {
    constants::resolve(name).ok_or(ScriptError::ValueResolution {
        token: name.to_string(),
        line,
    })
}

fn binary_code(op: BinaryOp) -> u16 {
    match op {
        BinaryOp::Mul => codes::MUL,
        BinaryOp::Add => codes::ADD,
        BinaryOp::Sub => codes::SUB,
        BinaryOp::Shl => codes::SHL,
        BinaryOp::Shr => codes::SHR,
        BinaryOp::Lt => codes::LT,
        BinaryOp::Gt => codes::GT,
        BinaryOp::Le => codes::LE,
        BinaryOp::Ge => codes::GE,
        BinaryOp::Eq => codes::EQ,
        BinaryOp::BitAnd => codes::BIT_AND,
        BinaryOp::BitOr => codes::BIT_OR,
        BinaryOp::And => codes::LOGIC_AND,
        BinaryOp::Or => codes::LOGIC_OR,
    }
}
