//! Runs the whole front half of the pipeline in one call.

use crate::aggregate::aggregate;
use crate::bfir::{parse, Program};
use crate::branches::resolve_branches;
use crate::diagnostics::{ParseError, PassStats};
use crate::peephole::{optimize, OptimisationsFlags};

#[cfg(test)]
use crate::bfir::OpKind::*;
#[cfg(test)]
use crate::diagnostics::Position;
#[cfg(test)]
use pretty_assertions::assert_eq;

/// Tokenize, aggregate, resolve branches and optimize `source`. The
/// returned program is ready for `execute`.
pub fn compile(
    source: &[u8],
    flags: OptimisationsFlags,
) -> Result<(Program, PassStats), ParseError> {
    let (mut program, ops_aggregated) = aggregate(parse(source));
    resolve_branches(&mut program)?;

    let mut stats = PassStats {
        ops_aggregated,
        ..PassStats::default()
    };
    stats += optimize(&mut program, flags);

    Ok((program, stats))
}

#[test]
fn compile_collects_stats() {
    let (program, stats) = compile(b"+++[-]>>[->+<]<[<]", OptimisationsFlags::all()).unwrap();

    assert_eq!(
        stats,
        PassStats {
            ops_aggregated: 3,
            zero_ops_eliminated: 1,
            move_ops_eliminated: 1,
            scan_ops_eliminated: 1,
        }
    );
    assert_eq!(
        program.kinds().into_iter().filter(|kind| *kind != Nop).collect::<Vec<_>>(),
        [Add, SetZero, ShiftRight, MoveRight, ShiftLeft, Scan, Halt]
    );
}

#[test]
fn compile_respects_flags() {
    let (program, stats) = compile(b"[-][>]", OptimisationsFlags::ZERO_CELL).unwrap();

    assert_eq!(stats.zero_ops_eliminated, 1);
    assert_eq!(stats.scan_ops_eliminated, 0);
    assert_eq!(
        program.kinds(),
        [Nop, SetZero, Nop, BranchIfZero, ShiftRight, BranchIfNotZero, Halt]
    );
}

#[test]
fn compile_reports_unbalanced() {
    let err = compile(b"+[", OptimisationsFlags::all()).unwrap_err();
    assert_eq!(err.position, Some(Position::at(1)));
}

#[test]
fn compile_stats_display() {
    let (_, stats) = compile(b"++[-]", OptimisationsFlags::all()).unwrap();
    assert_eq!(
        stats.to_string(),
        "ops combined: 1\nzero ops eliminated: 1\nmove ops eliminated: 0\nscan ops eliminated: 0"
    );
}
