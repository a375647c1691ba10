//! The opcode table of the world map script interpreter.
//!
//! One row per opcode: mnemonic, number of 16-bit words the interpreter pops
//! from its evaluation stack, number of inline words following the opcode in
//! the code stream, and whether executing it pushes a result. Everything else
//! in the crate keys off this table, so codes appear exactly once here.

use lazy_static::lazy_static;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op {
    pub code: u16,
    pub mnemonic: &'static str,
    pub stack_arity: usize,
    pub inline_arity: usize,
    pub produces_value: bool,
}

impl Op {
    const fn new(
        code: u16,
        mnemonic: &'static str,
        stack_arity: usize,
        inline_arity: usize,
        produces_value: bool,
    ) -> Self {
        Op {
            code,
            mnemonic,
            stack_arity,
            inline_arity,
            produces_value,
        }
    }
}

/// Codes the disassembler and assembler special-case.
pub mod codes {
    pub const NEG: u16 = 0x015;
    pub const NOT: u16 = 0x017;
    pub const MUL: u16 = 0x030;
    pub const ADD: u16 = 0x040;
    pub const SUB: u16 = 0x041;
    pub const SHL: u16 = 0x050;
    pub const SHR: u16 = 0x051;
    pub const LT: u16 = 0x060;
    pub const GT: u16 = 0x061;
    pub const LE: u16 = 0x062;
    pub const GE: u16 = 0x063;
    pub const EQ: u16 = 0x070;
    pub const BIT_AND: u16 = 0x080;
    pub const BIT_OR: u16 = 0x0a0;
    pub const LOGIC_AND: u16 = 0x0b0;
    pub const LOGIC_OR: u16 = 0x0c0;
    pub const WRITE_TO: u16 = 0x0e0;

    pub const RESET_STACK: u16 = 0x100;
    pub const VALUE: u16 = 0x110;
    pub const SAVEMAP_BIT: u16 = 0x114;
    pub const SPECIAL_BIT: u16 = 0x117;
    pub const SAVEMAP_BYTE: u16 = 0x118;
    pub const SPECIAL_BYTE: u16 = 0x11b;
    pub const SAVEMAP_WORD: u16 = 0x11c;
    pub const SPECIAL_WORD: u16 = 0x11f;

    pub const GOTO: u16 = 0x200;
    pub const IF: u16 = 0x201;
    pub const RETURN: u16 = 0x203;
    /// Pseudo-opcode: the emitted word is `RUN_MODEL_FUNCTION + id`, and any
    /// word in `[RUN_MODEL_FUNCTION, RUN_MODEL_FUNCTION_END)` reads back as
    /// this opcode.
    pub const RUN_MODEL_FUNCTION: u16 = 0x204;
    pub const RUN_MODEL_FUNCTION_END: u16 = 0x300;

    pub const ENTER_FIELD_LEVEL: u16 = 0x318;
    pub const SET_WINDOW_MESSAGE: u16 = 0x325;

    /// Savemap addresses are encoded relative to this base.
    pub const SAVEMAP_BASE: u16 = 0xBA4;
}

use self::codes::*;

static OPCODES: &[Op] = &[
    // Expression opcodes. All of them push their result.
    Op::new(NEG, "Neg", 1, 0, true),
    Op::new(NOT, "Not", 1, 0, true),
    Op::new(0x018, "GetDistanceToPoint", 1, 0, true),
    Op::new(MUL, "Mul", 2, 0, true),
    Op::new(ADD, "Add", 2, 0, true),
    Op::new(SUB, "Sub", 2, 0, true),
    Op::new(SHL, "ShiftLeft", 2, 0, true),
    Op::new(SHR, "ShiftRight", 2, 0, true),
    Op::new(LT, "IsLessThan", 2, 0, true),
    Op::new(GT, "IsGreaterThan", 2, 0, true),
    Op::new(LE, "IsLessOrEqualThan", 2, 0, true),
    Op::new(GE, "IsGreaterOrEqualThan", 2, 0, true),
    Op::new(EQ, "IsEqual", 2, 0, true),
    Op::new(BIT_AND, "BitAnd", 2, 0, true),
    Op::new(BIT_OR, "BitOr", 2, 0, true),
    Op::new(LOGIC_AND, "LogicAnd", 2, 0, true),
    Op::new(LOGIC_OR, "LogicOr", 2, 0, true),
    Op::new(WRITE_TO, "WriteTo", 2, 0, false),
    // Stack control and value sources.
    Op::new(RESET_STACK, "ResetStack", 0, 0, false),
    Op::new(VALUE, "Value", 0, 1, true),
    Op::new(SAVEMAP_BIT, "SavemapBit", 0, 1, true),
    Op::new(0x115, "TempBit", 0, 1, true),
    Op::new(SPECIAL_BIT, "SpecialBit", 0, 1, true),
    Op::new(SAVEMAP_BYTE, "SavemapByte", 0, 1, true),
    Op::new(0x119, "TempByte", 0, 1, true),
    Op::new(SPECIAL_BYTE, "SpecialByte", 0, 1, true),
    Op::new(SAVEMAP_WORD, "SavemapWord", 0, 1, true),
    Op::new(0x11d, "TempWord", 0, 1, true),
    Op::new(SPECIAL_WORD, "SpecialWord", 0, 1, true),
    // Control flow.
    Op::new(GOTO, "GoTo", 0, 1, false),
    Op::new(IF, "If", 1, 1, false),
    Op::new(RETURN, "Return", 0, 0, false),
    Op::new(RUN_MODEL_FUNCTION, "RunModelFunction", 1, 0, false),
    // World functions. The table is sparse on purpose: unidentified codes
    // round-trip through the Unknown<hex> path.
    Op::new(0x300, "LoadModel", 1, 0, false),
    Op::new(0x302, "SetPlayerModel", 1, 0, false),
    Op::new(0x303, "SetActiveEntity", 1, 0, false),
    Op::new(0x304, "SetEntityDirection", 1, 0, false),
    Op::new(0x305, "FaceModel", 1, 0, false),
    Op::new(0x306, "WaitFrames", 1, 0, false),
    Op::new(0x307, "PlayerControlsEnabled", 1, 0, false),
    Op::new(0x308, "SetEntityMovespeed", 1, 0, false),
    Op::new(0x30b, "SetEntityAltitudeOffset", 1, 0, false),
    Op::new(0x310, "SetVerticalSpeed", 1, 0, false),
    Op::new(ENTER_FIELD_LEVEL, "EnterFieldLevel", 2, 0, false),
    Op::new(0x319, "GetDistanceToModel", 1, 0, true),
    Op::new(0x31b, "GetDirectionToModel", 1, 0, true),
    Op::new(0x31d, "PlaySound", 1, 0, false),
    Op::new(0x320, "PlayMusic", 1, 0, false),
    Op::new(0x324, "SetWindowDimensions", 4, 0, false),
    Op::new(SET_WINDOW_MESSAGE, "SetWindowMessage", 1, 0, false),
    Op::new(0x326, "SetWindowPrompt", 2, 0, false),
    Op::new(0x327, "WaitForWindowAcknowledge", 0, 0, false),
    Op::new(0x328, "CloseWindow", 0, 0, false),
    Op::new(0x32d, "SetEntityMeshCoordinates", 2, 0, false),
    Op::new(0x32e, "SetEntityCoordinatesInMesh", 2, 0, false),
    Op::new(0x331, "SetEntityAnimation", 1, 0, false),
    Op::new(0x336, "SetEncountersEnabled", 1, 0, false),
    Op::new(0x33a, "SetBattleLock", 1, 0, false),
    Op::new(0x347, "MoveToModel", 1, 0, false),
    Op::new(0x349, "SetFieldEntryPoint", 2, 0, false),
    Op::new(0x34a, "PlayLayerAnimation", 1, 0, false),
];

/// Opcodes whose `Value` stack arguments refer to world model ids.
static MODEL_OPCODES: &[u16] = &[RUN_MODEL_FUNCTION, 0x300, 0x305, 0x319, 0x31b, 0x347];

lazy_static! {
    static ref BY_CODE: HashMap<u16, &'static Op> =
        OPCODES.iter().map(|op| (op.code, op)).collect();
    static ref BY_MNEMONIC: HashMap<&'static str, &'static Op> =
        OPCODES.iter().map(|op| (op.mnemonic, op)).collect();
}

pub fn by_code(code: u16) -> Option<&'static Op> {
    BY_CODE.get(&code).copied()
}

pub fn by_mnemonic(mnemonic: &str) -> Option<&'static Op> {
    BY_MNEMONIC.get(mnemonic).copied()
}

/// True when `Value` stack arguments of `code` name world models. The whole
/// `RunModelFunction` word range counts, since the emitted word carries the
/// function id.
pub fn is_model_opcode(code: u16) -> bool {
    (RUN_MODEL_FUNCTION..RUN_MODEL_FUNCTION_END).contains(&code)
        || MODEL_OPCODES.contains(&code)
}

/// The infix token an expression opcode folds into, or `None` for opcodes
/// that render as calls.
pub fn infix_token(code: u16) -> Option<&'static str> {
    Some(match code {
        MUL => "*",
        ADD => "+",
        SUB => "-",
        SHL => "<<",
        SHR => ">>",
        LT => "<",
        GT => ">",
        LE => "<=",
        GE => ">=",
        EQ => "==",
        BIT_AND => "&",
        BIT_OR => "|",
        LOGIC_AND => "AND",
        LOGIC_OR => "OR",
        _ => return None,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_and_mnemonics_are_unique() {
        let mut codes = std::collections::HashSet::new();
        let mut names = std::collections::HashSet::new();
        for op in OPCODES {
            assert!(codes.insert(op.code), "duplicate code {:#x}", op.code);
            assert!(names.insert(op.mnemonic), "duplicate mnemonic {}", op.mnemonic);
        }
    }

    #[test]
    fn expression_opcodes_produce_values() {
        for op in OPCODES {
            if infix_token(op.code).is_some() || op.code == codes::NEG {
                assert!(op.produces_value, "{} must push its result", op.mnemonic);
                assert!(op.stack_arity >= 1);
            }
        }
    }

    #[test]
    fn pinned_codes() {
        assert_eq!(by_mnemonic("Value").unwrap().code, 0x110);
        assert_eq!(by_mnemonic("WriteTo").unwrap().code, 0x0e0);
        assert_eq!(by_mnemonic("SpecialByte").unwrap().code, 0x11b);
        assert_eq!(by_mnemonic("TempByte").unwrap().code, 0x119);
        assert_eq!(by_mnemonic("EnterFieldLevel").unwrap().code, 0x318);
        assert_eq!(by_mnemonic("PlayLayerAnimation").unwrap().code, 0x34a);
        // 0x30d is deliberately unidentified; existing dumps carry it as
        // Unknown030d() and must keep reassembling.
        assert!(by_code(0x30d).is_none());
    }

    #[test]
    fn run_model_function_range() {
        assert!(is_model_opcode(0x204));
        assert!(is_model_opcode(0x215));
        assert!(is_model_opcode(0x2ff));
        assert!(is_model_opcode(0x300)); // LoadModel takes a model id
        assert!(!is_model_opcode(0x203));
    }
}
