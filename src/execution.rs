//! The interpreter: a dispatch loop over the final IR and a fixed-size
//! tape of cells.

use crate::bfir::OpKind::*;
use crate::bfir::{Cell, Program};
use std::io::{self, Read, Write};
use std::num::Wrapping;
use tracing::debug;

#[cfg(test)]
use crate::aggregate::aggregate;
#[cfg(test)]
use crate::bfir::{parse, Op};
#[cfg(test)]
use crate::branches::resolve_branches;
#[cfg(test)]
use crate::peephole::{optimize, OptimisationsFlags};
#[cfg(test)]
use pretty_assertions::assert_eq;

/// Number of cells on a default tape. Enough for the biggest BF
/// programs in circulation.
pub const TAPE_SIZE: usize = 1 << 16;

/// The memory a program runs against: a fixed run of cells and a
/// pointer into it. The pointer starts at cell 0.
///
/// Moving the pointer off either end is not reported as an error. The
/// next access to the current cell panics instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<Cell>,
    pointer: isize,
}

impl Default for Tape {
    fn default() -> Self {
        Tape::new(TAPE_SIZE)
    }
}

impl Tape {
    pub fn new(size: usize) -> Self {
        Tape {
            cells: vec![Wrapping(0); size],
            pointer: 0,
        }
    }

    pub fn from_cells(cells: &[u8]) -> Self {
        Tape {
            cells: cells.iter().copied().map(Wrapping).collect(),
            pointer: 0,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> u8 {
        self.cells[index].0
    }

    /// The index of the current cell. Negative, or past `len()`, once
    /// the program has moved off the tape.
    pub fn pointer(&self) -> isize {
        self.pointer
    }

    pub fn set_pointer(&mut self, pointer: usize) {
        self.pointer = pointer as isize;
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn current(&self) -> Cell {
        self.cells[self.pointer as usize]
    }

    fn current_mut(&mut self) -> &mut Cell {
        &mut self.cells[self.pointer as usize]
    }

    fn shift(&mut self, offset: isize) {
        self.pointer += offset;
    }

    /// Add the current cell into the cell `offset` away and zero the
    /// current one.
    fn transfer(&mut self, offset: isize) {
        let value = self.current();
        self.cells[(self.pointer + offset) as usize] += value;
        *self.current_mut() = Wrapping(0);
    }
}

fn read_byte<R: Read>(input: &mut R) -> io::Result<Option<u8>> {
    input.by_ref().bytes().next().transpose()
}

/// Run `program` to its `Halt`, reading from `input` and writing to
/// `output`. The program is consumed.
///
/// Branch operands must have been set by `resolve_branches`: a taken
/// branch adds its operand to the cursor, landing on the partner
/// bracket, and then every op advances by one. An operand of 0 on a
/// simple op, as the tokenizer produces, counts as a single
/// application.
///
/// Only I/O errors are reported. A loop that never exits, or a scan
/// that never finds a zero cell, runs forever.
pub fn execute<R: Read, W: Write>(
    program: Program,
    tape: &mut Tape,
    input: &mut R,
    output: &mut W,
) -> io::Result<()> {
    debug!(ops = program.len(), tape = tape.len(), "executing");

    let ops = program.into_ops();
    let mut ip: usize = 0;

    loop {
        let op = ops[ip];
        match op.kind {
            Add => *tape.current_mut() += Wrapping(op.repeat_count() as u8),
            Sub => *tape.current_mut() -= Wrapping(op.repeat_count() as u8),
            ShiftLeft => tape.shift(-(op.repeat_count() as isize)),
            ShiftRight => tape.shift(op.repeat_count() as isize),
            BranchIfZero => {
                if tape.current().0 == 0 {
                    ip = (ip as isize + op.operand as isize) as usize;
                }
            }
            BranchIfNotZero => {
                if tape.current().0 != 0 {
                    ip = (ip as isize + op.operand as isize) as usize;
                }
            }
            Input => {
                for _ in 0..op.repeat_count() {
                    // At end of input the cell keeps its value.
                    if let Some(byte) = read_byte(input)? {
                        *tape.current_mut() = Wrapping(byte);
                    }
                }
            }
            Output => {
                for _ in 0..op.repeat_count() {
                    output.write_all(&[tape.current().0])?;
                    output.flush()?;
                }
            }
            Halt => {
                debug!(pointer = tape.pointer, "halted");
                return Ok(());
            }
            SetZero => *tape.current_mut() = Wrapping(0),
            Nop => {}
            MoveLeft => tape.transfer(-(op.operand as isize)),
            MoveRight => tape.transfer(op.operand as isize),
            Scan => {
                while tape.current().0 != 0 {
                    tape.shift(op.operand as isize);
                }
            }
        }
        ip += 1;
    }
}

#[cfg(test)]
fn compile_source(source: &str, flags: OptimisationsFlags) -> Program {
    let (mut program, _) = aggregate(parse(source.as_bytes()));
    resolve_branches(&mut program).unwrap();
    optimize(&mut program, flags);
    program
}

#[cfg(test)]
fn run_on(program: Program, tape: &mut Tape, input: &[u8]) -> Vec<u8> {
    let mut output = vec![];
    execute(program, tape, &mut &input[..], &mut output).unwrap();
    output
}

#[cfg(test)]
fn run_source(source: &str) -> (Vec<u8>, Tape) {
    let mut tape = Tape::new(64);
    let output = run_on(
        compile_source(source, OptimisationsFlags::all()),
        &mut tape,
        b"",
    );
    (output, tape)
}

#[test]
fn execute_aggregated_output() {
    let (output, tape) = run_source("+++.");
    assert_eq!(output, [3]);
    assert_eq!(tape.cell(0), 3);
}

#[test]
fn execute_empty_program() {
    let (output, tape) = run_source("");
    assert!(output.is_empty());
    assert_eq!(tape, Tape::new(64));
}

#[test]
fn execute_wraps_cells() {
    let (_, tape) = run_source("->");
    assert_eq!(tape.cell(0), 255);

    let (_, tape) = run_source(&"+".repeat(257));
    assert_eq!(tape.cell(0), 1);
}

#[test]
fn execute_shifts() {
    let (_, tape) = run_source(">>>+<");
    assert_eq!(tape.cell(3), 1);
    assert_eq!(tape.pointer(), 2);
}

#[test]
fn execute_skips_loop_on_zero_cell() {
    let (output, tape) = run_source("[+.]>+.");
    assert_eq!(output, [1]);
    assert_eq!(tape.cell(0), 0);
}

#[test]
fn execute_repeats_loop_body() {
    let (output, _) = run_source("+++[.-]");
    assert_eq!(output, [3, 2, 1]);
}

#[test]
fn execute_loop_not_at_program_start() {
    // The jump offsets are relative: a loop after other ops must land
    // on its own partner.
    let (output, _) = run_source(">>+++++[>++<-]>.");
    assert_eq!(output, [10]);
}

#[test]
fn execute_nested_loops() {
    let (_, tape) = run_source("+++[>++[>+<-]<-]");
    assert_eq!(tape.cell(0), 0);
    assert_eq!(tape.cell(1), 0);
    assert_eq!(tape.cell(2), 6);
}

#[test]
fn execute_hello_world() {
    let source = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";
    let (output, _) = run_source(source);
    assert_eq!(String::from_utf8(output).unwrap(), "Hello World!\n");
}

#[test]
fn execute_zero_cell() {
    let program = compile_source("[-]", OptimisationsFlags::all());
    let mut tape = Tape::from_cells(&[7]);

    let output = run_on(program, &mut tape, b"");
    assert!(output.is_empty());
    assert_eq!(tape.cell(0), 0);
}

#[test]
fn execute_move_right() {
    let program = compile_source("[->+<]", OptimisationsFlags::all());
    let mut tape = Tape::from_cells(&[5, 0]);

    run_on(program, &mut tape, b"");
    assert_eq!(tape.cell(0), 0);
    assert_eq!(tape.cell(1), 5);
    assert_eq!(tape.pointer(), 0);
}

#[test]
fn execute_move_accumulates() {
    let program = Program::from_ops(vec![Op::new(MoveLeft, 2)]);
    let mut tape = Tape::from_cells(&[250, 0, 10]);
    tape.set_pointer(2);

    run_on(program, &mut tape, b"");
    assert_eq!(tape.cell(0), 4);
    assert_eq!(tape.cell(2), 0);
    assert_eq!(tape.pointer(), 2);
}

#[test]
fn execute_scan_right() {
    let program = compile_source("[>]", OptimisationsFlags::all());
    let mut tape = Tape::from_cells(&[1, 2, 3, 4, 0, 6]);

    run_on(program, &mut tape, b"");
    assert_eq!(tape.pointer(), 4);
}

#[test]
fn execute_scan_left_by_stride() {
    let program = compile_source("[<<]", OptimisationsFlags::all());
    let mut tape = Tape::from_cells(&[0, 9, 9, 1, 9, 1, 9]);
    tape.set_pointer(6);

    run_on(program, &mut tape, b"");
    assert_eq!(tape.pointer(), 0);
}

#[test]
fn execute_scan_on_zero_cell_stays() {
    let program = Program::from_ops(vec![Op::new(Scan, 3)]);
    let mut tape = Tape::new(4);

    run_on(program, &mut tape, b"");
    assert_eq!(tape.pointer(), 0);
}

#[test]
fn execute_echo_until_nul() {
    let program = compile_source(",[.,]", OptimisationsFlags::all());
    let mut tape = Tape::new(4);

    let output = run_on(program, &mut tape, b"abc\0def");
    assert_eq!(output, b"abc");
}

#[test]
fn execute_input_repeats() {
    let program = compile_source(",,", OptimisationsFlags::all());
    let mut tape = Tape::new(4);

    run_on(program, &mut tape, b"xy");
    assert_eq!(tape.cell(0), b'y');
}

#[test]
fn execute_input_eof_keeps_cell() {
    let program = compile_source("+++++,", OptimisationsFlags::all());
    let mut tape = Tape::new(4);

    run_on(program, &mut tape, b"");
    assert_eq!(tape.cell(0), 5);
}

#[test]
fn execute_output_repeats() {
    let program = compile_source("++...", OptimisationsFlags::all());
    let mut tape = Tape::new(4);

    assert_eq!(run_on(program, &mut tape, b""), [2, 2, 2]);
}

#[test]
fn execute_unaggregated_program() {
    let mut program = parse(b"++[>+++<-]>.");
    resolve_branches(&mut program).unwrap();
    let mut tape = Tape::new(4);

    assert_eq!(run_on(program, &mut tape, b""), [6]);
}

#[cfg(test)]
struct FlushCounter {
    written: Vec<u8>,
    flushes: usize,
}

#[cfg(test)]
impl Write for FlushCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

#[test]
fn execute_flushes_every_byte() {
    let program = compile_source("+...>.", OptimisationsFlags::all());
    let mut tape = Tape::new(4);
    let mut output = FlushCounter {
        written: vec![],
        flushes: 0,
    };

    execute(program, &mut tape, &mut &b""[..], &mut output).unwrap();
    assert_eq!(output.written, [1, 1, 1, 0]);
    assert_eq!(output.flushes, 4);
}

#[test]
fn execute_propagates_write_errors() {
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let program = compile_source(".", OptimisationsFlags::all());
    let mut tape = Tape::new(4);
    let err = execute(program, &mut tape, &mut &b""[..], &mut Broken).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
}

#[test]
fn default_tape_size() {
    let tape = Tape::default();
    assert_eq!(tape.len(), TAPE_SIZE);
    assert_eq!(tape.pointer(), 0);
    assert!(tape.cells().iter().all(|cell| cell.0 == 0));
}

#[test]
fn execute_empty_ops_halts() {
    let program = Program::from_ops(vec![]);
    let mut tape = Tape::new(4);

    assert!(run_on(program, &mut tape, b"").is_empty());
}

#[test]
fn pointer_off_tape_is_negative() {
    // Moving off the tape is only fatal once a cell is touched.
    let program = compile_source("<<", OptimisationsFlags::all());
    let mut tape = Tape::new(4);

    run_on(program, &mut tape, b"");
    assert_eq!(tape.pointer(), -2);
}
