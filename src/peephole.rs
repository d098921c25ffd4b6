//! Optimisations that replace small bracket idioms with a single op.
//!
//! Each pass is one forward scan with a fixed-width window. Matched ops
//! are turned into `Nop` rather than removed, so the program keeps its
//! length and every resolved branch offset stays valid.
//!
//! The passes must run in the order zero-cell, move-gadget,
//! scan-gadget: each pattern is written in terms of the literal
//! `Sub`/`Shift` ops that an earlier pass may already have consumed.

use crate::bfir::OpKind::*;
use crate::bfir::{Op, OpKind, Program};
use crate::diagnostics::PassStats;
use bitflags::bitflags;
use tracing::debug;

bitflags! {
    pub struct OptimisationsFlags: u32 {
        /// `[-]` becomes `SetZero`.
        const ZERO_CELL = 0b0001;
        /// `[->+<]` and `[-<+>]` become `MoveRight`/`MoveLeft`.
        const MOVE_GADGET = 0b0010;
        /// `[>]` and `[<]` become `Scan`. Only pays off for the
        /// interpreter, a native backend is better off without it.
        const SCAN_GADGET = 0b0100;
    }
}

impl Default for OptimisationsFlags {
    fn default() -> Self {
        OptimisationsFlags::all()
    }
}

/// Run the selected peephole passes over a program whose branches have
/// already been resolved.
pub fn optimize(program: &mut Program, flags: OptimisationsFlags) -> PassStats {
    let mut stats = PassStats::default();

    if flags.contains(OptimisationsFlags::ZERO_CELL) {
        stats.zero_ops_eliminated = zero_cell_optimization(program);
    }
    if flags.contains(OptimisationsFlags::MOVE_GADGET) {
        stats.move_ops_eliminated = move_gadget_detection(program);
    }
    if flags.contains(OptimisationsFlags::SCAN_GADGET) {
        stats.scan_ops_eliminated = scan_gadget_detection(program);
    }

    stats
}

/// Slide a `width`-op window over the program, left to right. When
/// `rewrite` accepts a window the scan resumes after it, so no op is
/// part of two matches in the same pass.
fn rewrite_windows<F>(program: &mut Program, width: usize, mut rewrite: F) -> usize
where
    F: FnMut(&mut [Op]) -> bool,
{
    let ops = program.ops_mut();
    let mut rewrites = 0;
    let mut i = 0;

    while i + width <= ops.len() {
        if rewrite(&mut ops[i..i + width]) {
            rewrites += 1;
            i += width;
        } else {
            i += 1;
        }
    }

    rewrites
}

fn replace(op: &mut Op, kind: OpKind, operand: i32) {
    op.kind = kind;
    op.operand = operand;
}

fn nop(op: &mut Op) {
    replace(op, Nop, 0);
}

/// Replace `[-]` (with any decrement amount) with `SetZero`.
pub fn zero_cell_optimization(program: &mut Program) -> usize {
    let eliminated = rewrite_windows(program, 3, |window| match window {
        [open @ Op {
            kind: BranchIfZero,
            ..
        }, body @ Op { kind: Sub, .. }, close @ Op {
            kind: BranchIfNotZero,
            ..
        }] => {
            nop(open);
            replace(body, SetZero, 0);
            nop(close);
            true
        }
        _ => false,
    });

    debug!(eliminated, "zero cell optimization");
    eliminated
}

/// Replace `[->+<]` and `[-<+>]`, with any equal shift distance, by a
/// single op that adds the current cell into its neighbour and zeroes
/// it.
///
/// Only unit decrements and increments are accepted: `[->++<]`
/// doubles the value and is left alone. Operands are read as repeat
/// counts, so unaggregated programs match too.
pub fn move_gadget_detection(program: &mut Program) -> usize {
    let eliminated = rewrite_windows(program, 6, |window| match window {
        [open @ Op {
            kind: BranchIfZero,
            ..
        }, dec @ Op { kind: Sub, .. }, there, inc @ Op { kind: Add, .. }, back, close @ Op {
            kind: BranchIfNotZero,
            ..
        }] if dec.repeat_count() == 1
            && inc.repeat_count() == 1
            && there.kind.is_shift()
            && back.kind.is_shift()
            && there.kind != back.kind
            && there.repeat_count() == back.repeat_count() =>
        {
            let kind = if there.kind == ShiftLeft {
                MoveLeft
            } else {
                MoveRight
            };
            let distance = there.repeat_count();

            nop(open);
            nop(dec);
            replace(there, kind, distance);
            nop(inc);
            nop(back);
            nop(close);
            true
        }
        _ => false,
    });

    debug!(eliminated, "move gadget detection");
    eliminated
}

/// Replace `[>]` and `[<]`, with any shift distance, by `Scan`. The
/// scan operand is a signed stride: negative for leftward scans. An
/// unaggregated shift counts as a stride of one.
pub fn scan_gadget_detection(program: &mut Program) -> usize {
    let eliminated = rewrite_windows(program, 3, |window| match window {
        [open @ Op {
            kind: BranchIfZero,
            ..
        }, shift, close @ Op {
            kind: BranchIfNotZero,
            ..
        }] if shift.kind.is_shift() => {
            let stride = if shift.kind == ShiftLeft {
                -shift.repeat_count()
            } else {
                shift.repeat_count()
            };

            nop(open);
            replace(shift, Scan, stride);
            nop(close);
            true
        }
        _ => false,
    });

    debug!(eliminated, "scan gadget detection");
    eliminated
}
