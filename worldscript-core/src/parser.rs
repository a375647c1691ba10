//! Front end for the textual assembly: a pest grammar over statements,
//! labels and expressions, lowered into the trees the assembler consumes.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::{Result, ScriptError};

#[derive(Parser)]
#[grammar = "world_script.pest"]
pub struct WorldScriptParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    BitAnd,
    BitOr,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Neg(Box<Expression>),
    Number(u16),
    /// Bare identifier, resolved through the constant maps.
    Constant(String),
    /// `$Name` variable, resolved through the constant maps.
    Variable(String),
    Call(Call),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub mnemonic: String,
    pub args: Vec<Expression>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    End { line: usize },
    EndIf { line: usize },
    Label { id: u16, line: usize },
    Goto { id: u16, line: usize },
    If { cond: Expression, line: usize },
    Call(Call),
}

/// Parses one function's textual assembly. `file` only flavors diagnostics.
pub fn parse_program(src: &str, file: &str) -> Result<Vec<Statement>> {
    let mut pairs =
        WorldScriptParser::parse(Rule::program, src).map_err(|e| ScriptError::Parse {
            file: file.to_string(),
            message: e.to_string(),
        })?;
    let program = pairs.next().expect("program rule always matches");
    build_statements(program).map_err(|e| e.in_file(file))
}

fn build_statements(program: Pair<Rule>) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    for pair in program.into_inner() {
        let line = pair.line_col().0;
        match pair.as_rule() {
            Rule::EOI => break,
            Rule::end_stmt => statements.push(Statement::End { line }),
            Rule::endif_stmt => statements.push(Statement::EndIf { line }),
            Rule::label_def => statements.push(Statement::Label {
                id: label_id(pair)?,
                line,
            }),
            Rule::goto_stmt => statements.push(Statement::Goto {
                id: label_id(pair)?,
                line,
            }),
            Rule::if_stmt => {
                let cond = pair
                    .into_inner()
                    .find(|p| !matches!(p.as_rule(), Rule::kw_if | Rule::kw_then))
                    .expect("if condition");
                statements.push(Statement::If {
                    cond: build_expr(cond)?,
                    line,
                });
            }
            Rule::opcode => statements.push(Statement::Call(build_call(pair)?)),
            rule => unreachable!("unexpected rule {rule:?} at program level"),
        }
    }
    Ok(statements)
}

fn label_id(pair: Pair<Rule>) -> Result<u16> {
    let line = pair.line_col().0;
    let name = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::label_name)
        .expect("label name")
        .as_str()
        .to_string();
    name.trim_start_matches("LABEL_")
        .parse()
        .map_err(|_| ScriptError::ValueResolution { token: name, line })
}

fn build_call(pair: Pair<Rule>) -> Result<Call> {
    let line = pair.line_col().0;
    let mut inner = pair.into_inner();
    let mnemonic = inner.next().expect("opcode mnemonic").as_str().to_string();
    let mut args = Vec::new();
    if let Some(arguments) = inner.next() {
        for arg in arguments.into_inner() {
            args.push(build_expr(arg)?);
        }
    }
    Ok(Call {
        mnemonic,
        args,
        line,
    })
}

fn build_expr(pair: Pair<Rule>) -> Result<Expression> {
    match pair.as_rule() {
        Rule::logic_or
        | Rule::logic_and
        | Rule::comparison
        | Rule::bit_or
        | Rule::bit_and
        | Rule::shift
        | Rule::sum
        | Rule::term => build_binary(pair),
        Rule::unary => build_unary(pair),
        Rule::opcode => Ok(Expression::Call(build_call(pair)?)),
        Rule::variable => Ok(Expression::Variable(
            pair.into_inner().next().expect("variable name").as_str().to_string(),
        )),
        Rule::constant => Ok(Expression::Constant(pair.as_str().to_string())),
        Rule::hex_int => number(&pair, u16::from_str_radix(&pair.as_str()[2..], 16).ok()),
        Rule::dec_int => number(&pair, pair.as_str().parse().ok()),
        rule => unreachable!("unexpected rule {rule:?} in expression"),
    }
}

fn number(pair: &Pair<Rule>, value: Option<u16>) -> Result<Expression> {
    value.map(Expression::Number).ok_or_else(|| ScriptError::Parse {
        file: String::new(),
        message: format!(
            "number '{}' out of range on line {}",
            pair.as_str(),
            pair.line_col().0
        ),
    })
}

/// Folds a `sub (op sub)*` precedence layer left-associatively. A layer
/// with a single operand is transparent.
fn build_binary(pair: Pair<Rule>) -> Result<Expression> {
    let mut inner = pair.into_inner();
    let mut lhs = build_expr(inner.next().expect("left operand"))?;
    while let Some(op) = inner.next() {
        let rhs = build_expr(inner.next().expect("right operand"))?;
        lhs = Expression::Binary {
            op: binary_op(op.as_str()),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn build_unary(pair: Pair<Rule>) -> Result<Expression> {
    let mut inner = pair.into_inner();
    let first = inner.next().expect("unary operand");
    if first.as_rule() == Rule::op_neg {
        let operand = build_expr(inner.next().expect("negated operand"))?;
        Ok(Expression::Neg(Box::new(operand)))
    } else {
        build_expr(first)
    }
}

fn binary_op(token: &str) -> BinaryOp {
    match token {
        "*" => BinaryOp::Mul,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "<<" => BinaryOp::Shl,
        ">>" => BinaryOp::Shr,
        "<" => BinaryOp::Lt,
        ">" => BinaryOp::Gt,
        "<=" => BinaryOp::Le,
        ">=" => BinaryOp::Ge,
        "==" => BinaryOp::Eq,
        "&" => BinaryOp::BitAnd,
        "|" => BinaryOp::BitOr,
        "AND" => BinaryOp::And,
        "OR" => BinaryOp::Or,
        _ => unreachable!("unknown operator token {token}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(src: &str) -> Vec<Statement> {
        parse_program(src, "test.s").expect("parse failure")
    }

    #[test]
    fn test_end() {
        let lines = parse("End");
        assert_eq!(lines, vec![Statement::End { line: 1 }]);
    }

    #[test]
    fn test_simple_func() {
        let lines = parse("TestFunc()");
        match &lines[0] {
            Statement::Call(call) => {
                assert_eq!(call.mnemonic, "TestFunc");
                assert!(call.args.is_empty());
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_prog() {
        let lines = parse(
            "\nTestFunc1()\nTestFunc2()\n\nEnd\n",
        );
        assert_eq!(lines.len(), 3);
        assert!(matches!(&lines[0], Statement::Call(c) if c.mnemonic == "TestFunc1"));
        assert!(matches!(&lines[1], Statement::Call(c) if c.mnemonic == "TestFunc2"));
        assert!(matches!(lines[2], Statement::End { .. }));
    }

    #[test]
    fn test_func_params() {
        let lines = parse("TestFunc1(123)\nTestFunc1(4, 6)\nTestFunc2(-256)");
        let call = |s: &Statement| match s {
            Statement::Call(c) => c.clone(),
            other => panic!("expected call, got {other:?}"),
        };
        assert_eq!(call(&lines[0]).args, vec![Expression::Number(123)]);
        assert_eq!(
            call(&lines[1]).args,
            vec![Expression::Number(4), Expression::Number(6)]
        );
        assert_eq!(
            call(&lines[2]).args,
            vec![Expression::Neg(Box::new(Expression::Number(256)))]
        );
    }

    #[test]
    fn test_nested_func() {
        let lines = parse("TestFunc1(TestFunc2())");
        let Statement::Call(outer) = &lines[0] else {
            panic!("expected call");
        };
        assert_eq!(outer.mnemonic, "TestFunc1");
        match &outer.args[0] {
            Expression::Call(inner) => assert_eq!(inner.mnemonic, "TestFunc2"),
            other => panic!("expected nested call, got {other:?}"),
        }
    }

    #[test]
    fn test_comment() {
        let lines = parse("LoadModel(0) # loads a model");
        assert_eq!(lines.len(), 1);
        let lines = parse("# only a comment");
        assert!(lines.is_empty());
    }

    #[test]
    fn test_hex_and_variables() {
        let lines = parse("WriteTo(SavemapBit(0x0F29, 3), $Highwind)");
        let Statement::Call(call) = &lines[0] else {
            panic!("expected call");
        };
        match &call.args[0] {
            Expression::Call(inner) => {
                assert_eq!(inner.args[0], Expression::Number(0x0F29));
                assert_eq!(inner.args[1], Expression::Number(3));
            }
            other => panic!("expected call, got {other:?}"),
        }
        assert_eq!(call.args[1], Expression::Variable("Highwind".to_string()));
    }

    #[test]
    fn test_precedence_shapes() {
        // `a - b >> c` folds the subtraction first.
        let lines = parse("Foo(SavemapWord(0x0C16) - 3685 >> 1)");
        let Statement::Call(call) = &lines[0] else {
            panic!("expected call");
        };
        match &call.args[0] {
            Expression::Binary { op: BinaryOp::Shr, lhs, rhs } => {
                assert!(matches!(**lhs, Expression::Binary { op: BinaryOp::Sub, .. }));
                assert_eq!(**rhs, Expression::Number(1));
            }
            other => panic!("expected shift, got {other:?}"),
        }
    }

    #[test]
    fn test_complex_if() {
        let lines = parse(
            "If GetDistanceToModel(SpecialByte($PlayerEntityModelId)) <= 75 Then\n\
             WriteTo(TempByte(10), 0)\n\
             EndIf\n\
             TestFunc(123)\n\
             GoTo @LABEL_1\n\
             @LABEL_1",
        );
        assert_eq!(lines.len(), 6);
        assert!(matches!(
            &lines[0],
            Statement::If { cond: Expression::Binary { op: BinaryOp::Le, .. }, .. }
        ));
        assert!(matches!(lines[1], Statement::Call(_)));
        assert!(matches!(lines[2], Statement::EndIf { line: 3 }));
        assert!(matches!(lines[4], Statement::Goto { id: 1, .. }));
        assert!(matches!(lines[5], Statement::Label { id: 1, .. }));
    }

    #[test]
    fn test_logic_operators() {
        let lines = parse("If SavemapBit(0x0D73, 1) AND SpecialByte(8) == 6 Then\nEndIf");
        let Statement::If { cond, .. } = &lines[0] else {
            panic!("expected if");
        };
        // AND binds loosest: its right side keeps the comparison.
        match cond {
            Expression::Binary { op: BinaryOp::And, rhs, .. } => {
                assert!(matches!(**rhs, Expression::Binary { op: BinaryOp::Eq, .. }));
            }
            other => panic!("expected AND, got {other:?}"),
        }
    }

    #[test]
    fn parse_failure_names_the_file() {
        let err = parse_program("If ( Then", "012_system_01.s").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("012_system_01.s"), "{text}");
    }
}
