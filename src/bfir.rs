//! bfir defines a flat IR for BF. Unlike a tree of loops, a `Program`
//! is a single sequence of ops where brackets are ops too, and each
//! bracket stores the relative distance to its partner once branches
//! have been resolved.
//!
//! It also provides the tokenizer that turns source bytes into a
//! `Program`. Every recognised symbol keeps its source position so
//! later stages can point back at it.

use self::OpKind::*;
use crate::diagnostics::Position;
use itertools::Itertools;
use std::fmt;
use std::io::{self, Read};
use std::num::Wrapping;

#[cfg(test)]
use pretty_assertions::assert_eq;

/// A cell is the fundamental BF datatype that we work with. BF
/// requires this to be at least one byte, we provide a cell of
/// exactly one byte.
pub type Cell = Wrapping<u8>;

const INITIAL_PROGRAM_SIZE: usize = 1 << 8;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum OpKind {
    Add,
    Sub,
    ShiftLeft,
    ShiftRight,
    /// `[`: jump forward to the matching `]` when the cell is zero.
    BranchIfZero,
    /// `]`: jump back to the matching `[` when the cell is non-zero.
    BranchIfNotZero,
    Input,
    Output,
    Halt,
    /// These ops have no direct equivalent in BF, but the peephole
    /// passes generate them.
    SetZero,
    Nop,
    MoveLeft,
    MoveRight,
    Scan,
}

impl OpKind {
    /// Whether a run of this kind can be collapsed into a single op
    /// with a repeat count.
    pub fn is_aggregatable(self) -> bool {
        matches!(self, Add | Sub | ShiftLeft | ShiftRight | Input | Output)
    }

    pub fn is_branch(self) -> bool {
        matches!(self, BranchIfZero | BranchIfNotZero)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, ShiftLeft | ShiftRight)
    }
}

/// A single IR operation. The meaning of `operand` depends on `kind`:
/// a repeat count for the simple ops, a relative jump for branches, and
/// a relative cell offset for moves and scans.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct Op {
    pub kind: OpKind,
    pub operand: i32,
    pub position: Option<Position>,
}

impl Op {
    pub fn new(kind: OpKind, operand: i32) -> Self {
        Op {
            kind,
            operand,
            position: None,
        }
    }

    pub fn halt() -> Self {
        Op::new(Halt, 0)
    }

    pub fn eq_ignore_position(&self, other: &Op) -> bool {
        self.kind == other.kind && self.operand == other.operand
    }

    /// The number of times a simple op applies. Freshly tokenized ops
    /// carry an operand of 0, which stands for a single application.
    pub(crate) fn repeat_count(&self) -> i32 {
        if self.operand == 0 {
            1
        } else {
            self.operand
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self.kind {
            Add => '+',
            Sub => '-',
            ShiftLeft => '<',
            ShiftRight => '>',
            BranchIfZero => '[',
            BranchIfNotZero => ']',
            Input => ',',
            Output => '.',
            Halt => return write!(f, "<END>"),
            Nop => return write!(f, "<NOP>"),
            SetZero => return write!(f, "<ZERO>"),
            MoveLeft => return write!(f, "<MOVE LEFT {}>", self.operand),
            MoveRight => return write!(f, "<MOVE RIGHT {}>", self.operand),
            Scan => return write!(f, "<SCAN {}>", self.operand),
        };

        if self.operand != 0 {
            write!(f, "{}({})", symbol, self.operand)
        } else {
            write!(f, "{}", symbol)
        }
    }
}

/// An ordered sequence of ops. A well-formed program ends with exactly
/// one `Halt`.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Program {
    ops: Vec<Op>,
}

impl Program {
    pub(crate) fn new() -> Self {
        Program {
            ops: Vec::with_capacity(INITIAL_PROGRAM_SIZE),
        }
    }

    /// Build a program from `ops`, terminating it with `Halt` unless it
    /// already ends with one.
    pub fn from_ops(mut ops: Vec<Op>) -> Self {
        if ops.last().map(|op| op.kind) != Some(Halt) {
            ops.push(Op::halt());
        }
        Program { ops }
    }

    pub(crate) fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub(crate) fn ops_mut(&mut self) -> &mut [Op] {
        &mut self.ops
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The op kinds, in order. Mostly useful for comparing shapes.
    pub fn kinds(&self) -> Vec<OpKind> {
        self.ops.iter().map(|op| op.kind).collect()
    }

    pub fn eq_ignore_position(&self, other: &Program) -> bool {
        self.ops.len() == other.ops.len()
            && self
                .ops
                .iter()
                .zip(&other.ops)
                .all(|(a, b)| a.eq_ignore_position(b))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ops.iter().join(""))
    }
}

/// Given BF source, return the corresponding unoptimised `Program`.
/// Bytes other than the eight BF symbols are comments and are
/// skipped. This never fails: bracket balance is checked later by
/// `resolve_branches`.
pub fn parse(source: &[u8]) -> Program {
    let mut program = Program::new();

    for (index, byte) in source.iter().enumerate() {
        let kind = match byte {
            b'+' => Add,
            b'-' => Sub,
            b'<' => ShiftLeft,
            b'>' => ShiftRight,
            b'[' => BranchIfZero,
            b']' => BranchIfNotZero,
            b'.' => Output,
            b',' => Input,
            _ => continue,
        };
        program.push(Op {
            kind,
            operand: 0,
            position: Some(Position::at(index)),
        });
    }

    program.push(Op::halt());
    program
}

/// Read `reader` to the end and tokenize what it produced.
pub fn parse_reader<R: Read>(mut reader: R) -> io::Result<Program> {
    let mut source = vec![];
    reader.read_to_end(&mut source)?;
    Ok(parse(&source))
}

#[test]
fn parse_increment() {
    assert_eq!(
        parse(b"+").into_ops(),
        [
            Op {
                kind: Add,
                operand: 0,
                position: Some(Position { start: 0, end: 0 }),
            },
            Op::halt()
        ]
    );
    assert_eq!(
        parse(b"++").into_ops(),
        [
            Op {
                kind: Add,
                operand: 0,
                position: Some(Position { start: 0, end: 0 }),
            },
            Op {
                kind: Add,
                operand: 0,
                position: Some(Position { start: 1, end: 1 }),
            },
            Op::halt()
        ]
    );
}

#[test]
fn parse_every_symbol() {
    assert_eq!(
        parse(b"+-<>[],.").kinds(),
        [
            Add,
            Sub,
            ShiftLeft,
            ShiftRight,
            BranchIfZero,
            BranchIfNotZero,
            Input,
            Output,
            Halt
        ]
    );
}

#[test]
fn parse_operands_start_at_zero() {
    assert!(parse(b"+-<>[],.").ops().iter().all(|op| op.operand == 0));
}

#[test]
fn parse_comment() {
    assert_eq!(parse(b"foo! ").into_ops(), [Op::halt()]);
}

#[test]
fn parse_comment_keeps_positions() {
    let program = parse(b"a+ b-");
    assert_eq!(program.ops()[0].position, Some(Position::at(1)));
    assert_eq!(program.ops()[1].position, Some(Position::at(4)));
}

#[test]
fn parse_does_not_check_balance() {
    assert_eq!(parse(b"]]").kinds(), [BranchIfNotZero, BranchIfNotZero, Halt]);
}

#[test]
fn parse_empty() {
    assert_eq!(parse(b"").into_ops(), [Op::halt()]);
}

#[test]
fn parse_from_reader() {
    let program = parse_reader(&b"+ [>]"[..]).unwrap();
    assert_eq!(
        program.kinds(),
        [Add, BranchIfZero, ShiftRight, BranchIfNotZero, Halt]
    );
}

#[test]
fn from_ops_terminates_once() {
    let program = Program::from_ops(vec![Op::new(Add, 1)]);
    assert_eq!(program.kinds(), [Add, Halt]);

    let program = Program::from_ops(program.into_ops());
    assert_eq!(program.kinds(), [Add, Halt]);
}

#[test]
fn display_program() {
    let program = Program::from_ops(vec![
        Op::new(Add, 3),
        Op::new(BranchIfZero, 2),
        Op::new(SetZero, 0),
        Op::new(BranchIfNotZero, -2),
        Op::new(Output, 0),
        Op::new(Nop, 0),
        Op::new(MoveRight, 1),
        Op::new(MoveLeft, 2),
        Op::new(Scan, -1),
    ]);
    assert_eq!(
        program.to_string(),
        "+(3)[(2)<ZERO>](-2).<NOP><MOVE RIGHT 1><MOVE LEFT 2><SCAN -1><END>"
    );
}

#[test]
fn eq_ignore_position_compares_kind_and_operand() {
    let with_position = parse(b"+");
    let without = Program::from_ops(vec![Op::new(Add, 0)]);
    assert!(with_position.eq_ignore_position(&without));
    assert!(!with_position.eq_ignore_position(&Program::from_ops(vec![Op::new(Add, 1)])));
}

#[test]
fn from_empty_ops_is_halt_only() {
    assert_eq!(Program::from_ops(vec![]).into_ops(), [Op::halt()]);
}
