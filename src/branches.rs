//! Bracket matching. Every `[` and `]` gets the signed distance to its
//! partner, so the interpreter can jump with one addition.

use crate::bfir::OpKind::*;
use crate::bfir::Program;
use crate::diagnostics::{ParseError, Position};
use tracing::{debug, trace};

#[cfg(test)]
use crate::bfir::{parse, Op};
#[cfg(test)]
use crate::aggregate::aggregate;
#[cfg(test)]
use pretty_assertions::assert_eq;

const BRANCH_STACK_SIZE: usize = 1 << 8;

/// An open bracket waiting for its partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchEntry {
    pub index: usize,
    pub position: Option<Position>,
}

/// The open brackets seen so far, innermost last. Only lives for the
/// duration of `resolve_branches`.
#[derive(Debug, Default)]
pub struct BranchStack {
    entries: Vec<BranchEntry>,
}

impl BranchStack {
    pub fn new() -> Self {
        BranchStack {
            entries: Vec::with_capacity(BRANCH_STACK_SIZE),
        }
    }

    pub fn push(&mut self, index: usize, position: Option<Position>) {
        self.entries.push(BranchEntry { index, position });
    }

    /// Remove the innermost open bracket.
    ///
    /// Panics if the stack is empty: callers check `is_empty` first, so
    /// an empty pop means the resolver itself is broken.
    pub fn pop(&mut self) -> BranchEntry {
        match self.entries.pop() {
            Some(entry) => entry,
            None => panic!("attempted to pop from empty branch stack"),
        }
    }

    pub fn peek(&self) -> Option<&BranchEntry> {
        self.entries.last()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Pair up the brackets in `program`. For a `[` at `j` matched by a
/// `]` at `i`, the `[` gets `i - j` and the `]` gets `j - i`: each
/// points exactly at its partner, not past it.
///
/// Fails if a `]` has no open `[`, or a `[` is never closed. On
/// failure the program must not be executed.
pub fn resolve_branches(program: &mut Program) -> Result<(), ParseError> {
    let mut stack = BranchStack::new();
    let mut pairs = 0;

    let ops = program.ops_mut();
    for i in 0..ops.len() {
        match ops[i].kind {
            BranchIfZero => stack.push(i, ops[i].position),
            BranchIfNotZero => {
                if stack.is_empty() {
                    return Err(ParseError {
                        message: "This ] has no matching [".to_owned(),
                        position: ops[i].position,
                    });
                }

                let open = stack.pop();
                let distance = (i - open.index) as i32;
                ops[i].operand = -distance;
                ops[open.index].operand = distance;

                trace!(open = open.index, close = i, "matched branches");
                pairs += 1;
            }
            _ => {}
        }
    }

    if let Some(open) = stack.peek() {
        return Err(ParseError {
            message: "This [ has no matching ]".to_owned(),
            position: open.position,
        });
    }

    debug!(pairs, "resolved branches");
    Ok(())
}

#[cfg(test)]
fn resolve_source(source: &str) -> Result<Program, ParseError> {
    let (mut program, _) = aggregate(parse(source.as_bytes()));
    resolve_branches(&mut program)?;
    Ok(program)
}

/// Check that every bracket points at a partner of the opposite kind
/// which points straight back.
#[cfg(test)]
fn assert_symmetric(program: &Program) {
    let ops = program.ops();
    for (index, op) in ops.iter().enumerate() {
        let partner = (index as i64 + i64::from(op.operand)) as usize;
        match op.kind {
            BranchIfZero => {
                assert!(op.operand > 0);
                assert_eq!(ops[partner].kind, BranchIfNotZero);
                assert_eq!(ops[partner].operand, -op.operand);
            }
            BranchIfNotZero => {
                assert!(op.operand < 0);
                assert_eq!(ops[partner].kind, BranchIfZero);
                assert_eq!(ops[partner].operand, -op.operand);
            }
            _ => {}
        }
    }
}

#[test]
fn resolve_simple_loop() {
    let program = resolve_source("+[-]").unwrap();
    assert_eq!(
        program.ops().iter().map(|op| op.operand).collect::<Vec<_>>(),
        [1, 2, 1, -2, 0]
    );
}

#[test]
fn resolve_adjacent_loops() {
    let program = resolve_source("[][]").unwrap();
    assert_eq!(
        program.ops().iter().map(|op| op.operand).collect::<Vec<_>>(),
        [1, -1, 1, -1, 0]
    );
}

#[test]
fn resolve_nested_loops() {
    let program = resolve_source("[[>]<[+]]").unwrap();
    let operands: Vec<_> = program.ops().iter().map(|op| op.operand).collect();
    // [ [ > ] < [ + ] ] <END>
    assert_eq!(operands, [8, 2, 1, -2, 1, 2, 1, -2, -8, 0]);
    assert_symmetric(&program);
}

#[test]
fn resolve_deep_nesting() {
    let source = format!("{}+{}", "[".repeat(300), "]".repeat(300));
    let program = resolve_source(&source).unwrap();
    assert_symmetric(&program);
    assert_eq!(program.ops()[0].operand, 600);
}

#[test]
fn resolve_no_branches() {
    let program = resolve_source("+++>.").unwrap();
    assert_eq!(program.kinds().len(), 4);
}

#[test]
fn resolve_unmatched_close() {
    let err = resolve_source("]").unwrap_err();
    assert_eq!(err.message, "This ] has no matching [");
    assert_eq!(err.position, Some(Position::at(0)));
}

#[test]
fn resolve_unclosed_opens() {
    let err = resolve_source("[[").unwrap_err();
    assert_eq!(err.message, "This [ has no matching ]");
    // The innermost open bracket is reported.
    assert_eq!(err.position, Some(Position::at(1)));
}

#[test]
fn resolve_extra_close() {
    let err = resolve_source("[]]").unwrap_err();
    assert_eq!(err.message, "This ] has no matching [");
    assert_eq!(err.position, Some(Position::at(2)));
}

#[test]
fn resolve_close_before_open() {
    assert!(resolve_source("][").is_err());
    assert!(resolve_source("[][").is_err());
}

#[test]
fn resolve_without_positions() {
    let mut program = Program::from_ops(vec![Op::new(BranchIfNotZero, 0)]);
    let err = resolve_branches(&mut program).unwrap_err();
    assert_eq!(err.position, None);
}

#[test]
fn branch_stack_is_lifo() {
    let mut stack = BranchStack::new();
    stack.push(1, None);
    stack.push(4, Some(Position::at(9)));

    assert_eq!(stack.len(), 2);
    assert_eq!(stack.peek().map(|entry| entry.index), Some(4));
    assert_eq!(stack.pop().index, 4);
    assert_eq!(stack.pop().index, 1);
    assert!(stack.is_empty());
}

#[test]
#[should_panic(expected = "attempted to pop from empty branch stack")]
fn branch_stack_pop_empty_panics() {
    BranchStack::new().pop();
}
