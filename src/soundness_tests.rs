use crate::aggregate::aggregate;
use crate::bfir::OpKind::*;
use crate::bfir::{parse, Program};
use crate::branches::resolve_branches;
use crate::execution::{execute, Tape};
use crate::peephole::OptimisationsFlags;
use crate::pipeline::compile;
use pretty_assertions::assert_eq;
use quickcheck::quickcheck;

const TAPE_CELLS: usize = 512;
const SYMBOLS: &[u8] = b"+-<>[],.";

/// Build a BF program from `genome` that is guaranteed to terminate
/// and to keep the pointer on the tape.
///
/// `low` and `high` bound the pointer, `touched` bounds every cell that
/// may be non-zero. Cell 0 is never written, so a leftward scan always
/// stops.
struct ProgramBuilder {
    source: String,
    low: usize,
    high: usize,
    touched: usize,
}

impl ProgramBuilder {
    fn new() -> Self {
        ProgramBuilder {
            source: ">".to_owned(),
            low: 1,
            high: 1,
            touched: 1,
        }
    }

    fn can_go_left(&self, distance: usize) -> bool {
        self.low > distance
    }

    fn can_go_right(&self, distance: usize) -> bool {
        self.touched + distance < TAPE_CELLS - 1
    }

    fn right(&mut self, distance: usize) {
        self.source.push_str(&">".repeat(distance));
        self.low += distance;
        self.high += distance;
        self.touched = self.touched.max(self.high);
    }

    fn left(&mut self, distance: usize) {
        self.source.push_str(&"<".repeat(distance));
        self.low -= distance;
        self.high -= distance;
    }

    /// `[-` followed by a body that touches one neighbour and returns,
    /// so the loop counts the current cell down to zero.
    fn counter_loop(&mut self, param: usize) {
        let distance = 1 + param % 2;
        let leftwards = (param / 2) % 2 == 1;
        let amount = 1 + (param / 4) % 2;
        let symbol = if (param / 8) % 2 == 0 { "+" } else { "-" };

        let (there, back) = if leftwards {
            if !self.can_go_left(distance) {
                return;
            }
            ("<", ">")
        } else {
            if !self.can_go_right(distance) {
                return;
            }
            self.touched = self.touched.max(self.high + distance);
            (">", "<")
        };

        self.source.push_str("[-");
        self.source.push_str(&there.repeat(distance));
        self.source.push_str(&symbol.repeat(amount));
        self.source.push_str(&back.repeat(distance));
        self.source.push(']');
    }

    fn push_gene(&mut self, gene: u8) {
        let param = usize::from(gene / 11);
        match gene % 11 {
            0 => self.source.push_str(&"+".repeat(1 + param % 5)),
            1 => self.source.push_str(&"-".repeat(1 + param % 3)),
            2 => {
                let distance = 1 + param % 3;
                if self.can_go_right(distance) {
                    self.right(distance);
                }
            }
            3 => {
                let distance = 1 + param % 3;
                if self.can_go_left(distance) {
                    self.left(distance);
                }
            }
            4 => self.source.push('.'),
            5 => self.source.push(','),
            6 => self.source.push_str("[-]"),
            7 => self.counter_loop(param),
            8 => {
                if self.can_go_right(1) {
                    // Every cell past `touched` is still zero.
                    self.source.push_str("[>]");
                    self.high = self.touched + 1;
                    self.touched = self.high;
                }
            }
            9 => {
                if self.can_go_right(1) {
                    // Cell 0 is zero, so this stops at or above it.
                    self.source.push_str("[<]>");
                    self.low = 1;
                    self.high += 1;
                    self.touched = self.touched.max(self.high);
                }
            }
            _ => {
                // Zero the next cell, move the one after into it, all
                // inside a loop counting the current cell down.
                if self.can_go_right(2) {
                    self.source.push_str("[->[-]>[-<+>]<<]");
                    self.touched = self.touched.max(self.high + 2);
                }
            }
        }
    }
}

fn terminating_program(genome: &[u8]) -> String {
    let mut builder = ProgramBuilder::new();
    for &gene in genome {
        builder.push_gene(gene);
    }
    builder.source
}

fn run(program: Program, input: &[u8]) -> (Vec<u8>, Tape) {
    let mut tape = Tape::new(TAPE_CELLS);
    let mut output = vec![];
    execute(program, &mut tape, &mut &input[..], &mut output).unwrap();
    (output, tape)
}

fn run_with_flags(source: &str, flags: OptimisationsFlags, input: &[u8]) -> (Vec<u8>, Tape) {
    let (program, _) = compile(source.as_bytes(), flags).unwrap();
    run(program, input)
}

fn symbols(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .map(|b| SYMBOLS[usize::from(*b) % SYMBOLS.len()])
        .collect()
}

#[test]
fn builder_programs_are_balanced() {
    let source = terminating_program(&[7, 10, 9, 8, 6, 3, 2, 21, 32]);
    assert!(compile(source.as_bytes(), OptimisationsFlags::all()).is_ok());
}

#[test]
fn optimized_matches_unoptimized_on_gadgets() {
    let source = ",>,<[->>+<<]>>[-<+>]<[>]<[<]>[-]++++[->[-]>[-<+>]<<].>.>.";
    let input = [3, 200];
    assert_eq!(
        run_with_flags(source, OptimisationsFlags::all(), &input),
        run_with_flags(source, OptimisationsFlags::empty(), &input)
    );
}

#[test]
fn quickcheck_optimizations_preserve_behaviour() {
    fn prop(genome: Vec<u8>) -> bool {
        let source = terminating_program(&genome);
        let input: Vec<u8> = genome.iter().rev().copied().collect();

        let optimized = run_with_flags(&source, OptimisationsFlags::all(), &input);
        let unoptimized = run_with_flags(&source, OptimisationsFlags::empty(), &input);
        optimized == unoptimized
    }
    quickcheck(prop as fn(Vec<u8>) -> bool);
}

#[test]
fn quickcheck_aggregation_preserves_behaviour() {
    fn prop(genome: Vec<u8>) -> bool {
        let source = terminating_program(&genome);
        let mut raw = parse(source.as_bytes());
        if resolve_branches(&mut raw).is_err() {
            return false;
        }
        run(raw, &genome) == run_with_flags(&source, OptimisationsFlags::empty(), &genome)
    }
    quickcheck(prop as fn(Vec<u8>) -> bool);
}

#[test]
fn quickcheck_aggregate_is_idempotent() {
    fn prop(bytes: Vec<u8>) -> bool {
        let (once, _) = aggregate(parse(&symbols(&bytes)));
        let (twice, merged) = aggregate(once.clone());
        once == twice && merged == 0
    }
    quickcheck(prop as fn(Vec<u8>) -> bool);
}

#[test]
fn quickcheck_aggregate_ends_with_one_halt() {
    fn prop(bytes: Vec<u8>) -> bool {
        let (program, _) = aggregate(parse(&bytes));
        let halts = program.ops().iter().filter(|op| op.kind == Halt).count();
        halts == 1 && program.ops().last().map(|op| op.kind) == Some(Halt)
    }
    quickcheck(prop as fn(Vec<u8>) -> bool);
}

#[test]
fn quickcheck_resolution_matches_balance() {
    fn prop(bytes: Vec<u8>) -> bool {
        let source: Vec<u8> = bytes
            .iter()
            .map(|b| if b % 2 == 0 { b'[' } else { b']' })
            .collect();

        let mut depth: i64 = 0;
        let mut balanced = true;
        for &symbol in &source {
            depth += if symbol == b'[' { 1 } else { -1 };
            if depth < 0 {
                balanced = false;
            }
        }
        balanced &= depth == 0;

        let (mut program, _) = aggregate(parse(&source));
        match resolve_branches(&mut program) {
            Ok(()) => {
                balanced
                    && program.ops().iter().enumerate().all(|(index, op)| {
                        if !op.kind.is_branch() {
                            return true;
                        }
                        let partner = (index as i64 + i64::from(op.operand)) as usize;
                        let expected = if op.kind == BranchIfZero {
                            BranchIfNotZero
                        } else {
                            BranchIfZero
                        };
                        program.ops()[partner].kind == expected
                            && program.ops()[partner].operand == -op.operand
                    })
            }
            Err(_) => !balanced,
        }
    }
    quickcheck(prop as fn(Vec<u8>) -> bool);
}
