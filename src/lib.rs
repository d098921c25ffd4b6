#![warn(trivial_numeric_casts)]

//! bf-threaded turns BF source into a flat, optimized IR and runs it on a
//! threaded-dispatch interpreter.
//!
//! The pipeline is `parse` → `aggregate` → `resolve_branches` → `optimize`
//! → `execute`. Each stage either rewrites the `Program` in place or
//! consumes it and hands back a new one.

pub use aggregate::aggregate;
pub use bfir::{parse, parse_reader, Cell, Op, OpKind, Program};
pub use branches::{resolve_branches, BranchEntry, BranchStack};
pub use diagnostics::{Diagnostic, Level, ParseError, PassStats, Position};
pub use execution::{execute, Tape, TAPE_SIZE};
pub use peephole::{
    move_gadget_detection, optimize, scan_gadget_detection, zero_cell_optimization,
    OptimisationsFlags,
};
pub use pipeline::compile;

mod aggregate;
mod bfir;
mod branches;
mod diagnostics;
mod execution;
mod peephole;
mod pipeline;

#[cfg(test)]
mod peephole_tests;
#[cfg(test)]
mod soundness_tests;
