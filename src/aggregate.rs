//! Run-length aggregation: `++++` becomes a single `+(4)`.

use crate::bfir::OpKind::*;
use crate::bfir::{Op, Program};
use crate::diagnostics::Combine;
use itertools::Itertools;
use tracing::debug;

#[cfg(test)]
use crate::bfir::{parse, OpKind};
#[cfg(test)]
use crate::diagnostics::Position;
#[cfg(test)]
use pretty_assertions::assert_eq;

/// Collapse consecutive ops of the same simple kind into one op whose
/// operand is the run length. Branches are never merged, so `[[` stays
/// as two ops. Consumes `program` and returns the aggregated program,
/// terminated by a single `Halt`, along with how many ops were merged
/// away.
///
/// Running this again on its own output changes nothing.
pub fn aggregate(program: Program) -> (Program, usize) {
    let before = program.len();
    let mut merged = 0;

    let ops = program
        .into_ops()
        .into_iter()
        .filter(|op| op.kind != Halt)
        .map(|op| {
            if op.kind.is_aggregatable() {
                Op {
                    operand: op.repeat_count(),
                    ..op
                }
            } else {
                op
            }
        })
        .coalesce(|prev, cur| {
            if prev.kind == cur.kind && prev.kind.is_aggregatable() {
                merged += 1;
                Ok(Op {
                    kind: prev.kind,
                    operand: prev.operand + cur.operand,
                    position: prev.position.combine(cur.position),
                })
            } else {
                Err((prev, cur))
            }
        });

    let mut aggregated = Program::new();
    for op in ops {
        aggregated.push(op);
    }
    aggregated.push(Op::halt());

    debug!(before, after = aggregated.len(), merged, "aggregated ops");
    (aggregated, merged)
}

#[cfg(test)]
fn aggregate_source(source: &str) -> Vec<(OpKind, i32)> {
    let (program, _) = aggregate(parse(source.as_bytes()));
    program
        .ops()
        .iter()
        .map(|op| (op.kind, op.operand))
        .collect()
}

#[test]
fn aggregate_run_then_output() {
    assert_eq!(
        aggregate_source("+++."),
        [(Add, 3), (Output, 1), (Halt, 0)]
    );
}

#[test]
fn aggregate_single_ops_get_count_one() {
    assert_eq!(
        aggregate_source("+-<>,."),
        [
            (Add, 1),
            (Sub, 1),
            (ShiftLeft, 1),
            (ShiftRight, 1),
            (Input, 1),
            (Output, 1),
            (Halt, 0)
        ]
    );
}

#[test]
fn aggregate_every_simple_kind() {
    assert_eq!(
        aggregate_source("++-->>><<,,...."),
        [
            (Add, 2),
            (Sub, 2),
            (ShiftRight, 3),
            (ShiftLeft, 2),
            (Input, 2),
            (Output, 4),
            (Halt, 0)
        ]
    );
}

#[test]
fn aggregate_never_merges_branches() {
    assert_eq!(
        aggregate_source("[[]]"),
        [
            (BranchIfZero, 0),
            (BranchIfZero, 0),
            (BranchIfNotZero, 0),
            (BranchIfNotZero, 0),
            (Halt, 0)
        ]
    );
}

#[test]
fn aggregate_across_comments() {
    assert_eq!(aggregate_source("+ foo +\n+"), [(Add, 3), (Halt, 0)]);
}

#[test]
fn aggregate_runs_split_by_other_kinds() {
    assert_eq!(
        aggregate_source("++>++"),
        [(Add, 2), (ShiftRight, 1), (Add, 2), (Halt, 0)]
    );
}

#[test]
fn aggregate_empty() {
    assert_eq!(aggregate_source(""), [(Halt, 0)]);
}

#[test]
fn aggregate_counts_merges() {
    let (_, merged) = aggregate(parse(b"+++>>[-]"));
    // Two merges for `+++`, one for `>>`.
    assert_eq!(merged, 3);
}

#[test]
fn aggregate_combines_positions() {
    let (program, _) = aggregate(parse(b"++ +"));
    assert_eq!(program.ops()[0].position, Some(Position { start: 0, end: 3 }));
    assert_eq!(program.ops()[1].position, None);
}

#[test]
fn aggregate_is_idempotent() {
    let (once, _) = aggregate(parse(b"+++[->>+<<]..,<<[[-]]>"));
    let (twice, merged) = aggregate(once.clone());

    assert_eq!(once, twice);
    assert_eq!(merged, 0);
}

#[test]
fn aggregate_passes_through_rewritten_ops() {
    let program = Program::from_ops(vec![
        Op::new(Nop, 0),
        Op::new(Nop, 0),
        Op::new(SetZero, 0),
        Op::new(SetZero, 0),
        Op::new(Scan, -1),
    ]);
    let (aggregated, merged) = aggregate(program.clone());

    assert_eq!(aggregated, program);
    assert_eq!(merged, 0);
}
