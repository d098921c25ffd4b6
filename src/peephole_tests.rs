use crate::aggregate::aggregate;
use crate::bfir::OpKind::*;
use crate::bfir::{parse, Op, OpKind, Program};
use crate::branches::resolve_branches;
use crate::peephole::*;
use pretty_assertions::assert_eq;

fn resolved(source: &str) -> Program {
    let (mut program, _) = aggregate(parse(source.as_bytes()));
    resolve_branches(&mut program).unwrap();
    program
}

fn optimized(source: &str) -> Program {
    let mut program = resolved(source);
    optimize(&mut program, OptimisationsFlags::all());
    program
}

fn shape(program: &Program) -> Vec<(OpKind, i32)> {
    program
        .ops()
        .iter()
        .map(|op| (op.kind, op.operand))
        .collect()
}

fn without_nops(program: &Program) -> Vec<(OpKind, i32)> {
    shape(program)
        .into_iter()
        .filter(|(kind, _)| *kind != Nop)
        .collect()
}

#[test]
fn zero_cell_single_op() {
    let program = optimized("[-]");
    assert_eq!(
        shape(&program),
        [(Nop, 0), (SetZero, 0), (Nop, 0), (Halt, 0)]
    );
    assert_eq!(without_nops(&program), [(SetZero, 0), (Halt, 0)]);
}

#[test]
fn zero_cell_any_decrement() {
    let mut program = resolved("[---]");
    assert_eq!(zero_cell_optimization(&mut program), 1);
    assert_eq!(without_nops(&program), [(SetZero, 0), (Halt, 0)]);
}

#[test]
fn zero_cell_ignores_increment() {
    let mut program = resolved("[+]");
    assert_eq!(zero_cell_optimization(&mut program), 0);
    assert_eq!(program.kinds(), [BranchIfZero, Add, BranchIfNotZero, Halt]);
}

#[test]
fn zero_cell_inside_loop_keeps_outer_offsets() {
    let mut program = resolved("+[>[-]<-]");
    let before = shape(&program);
    assert_eq!(zero_cell_optimization(&mut program), 1);

    assert_eq!(program.len(), before.len());
    // The outer brackets are untouched.
    assert_eq!(program.ops()[1], resolved("+[>[-]<-]").ops()[1]);
    assert_eq!(program.ops()[8].operand, -7);
}

#[test]
fn zero_cell_several() {
    let mut program = resolved("[-]>[-]>[-]");
    assert_eq!(zero_cell_optimization(&mut program), 3);
}

#[test]
fn zero_cell_keeps_positions() {
    let mut program = resolved("[-]");
    zero_cell_optimization(&mut program);
    let positions: Vec<_> = program.ops().iter().map(|op| op.position).collect();
    let original: Vec<_> = resolved("[-]").ops().iter().map(|op| op.position).collect();
    assert_eq!(positions, original);
}

#[test]
fn move_gadget_right() {
    let program = optimized("[->+<]");
    assert_eq!(without_nops(&program), [(MoveRight, 1), (Halt, 0)]);
    assert_eq!(program.len(), 7);
}

#[test]
fn move_gadget_left() {
    let program = optimized("[-<+>]");
    assert_eq!(without_nops(&program), [(MoveLeft, 1), (Halt, 0)]);
}

#[test]
fn move_gadget_distance() {
    let program = optimized("[->>>+<<<]");
    assert_eq!(without_nops(&program), [(MoveRight, 3), (Halt, 0)]);
}

#[test]
fn move_gadget_unequal_distance() {
    let mut program = resolved("[->>+<]");
    assert_eq!(move_gadget_detection(&mut program), 0);
}

#[test]
fn move_gadget_same_direction() {
    // `[->+>]` is aggregated into different shapes, so build the
    // window directly.
    let mut program = Program::from_ops(vec![
        Op::new(BranchIfZero, 5),
        Op::new(Sub, 1),
        Op::new(ShiftRight, 1),
        Op::new(Add, 1),
        Op::new(ShiftRight, 1),
        Op::new(BranchIfNotZero, -5),
    ]);
    assert_eq!(move_gadget_detection(&mut program), 0);
}

#[test]
fn move_gadget_needs_unit_steps() {
    let mut program = resolved("[->++<]");
    assert_eq!(move_gadget_detection(&mut program), 0);

    let mut program = resolved("[-->+<]");
    assert_eq!(move_gadget_detection(&mut program), 0);
}

#[test]
fn move_gadget_ignores_other_bodies() {
    let mut program = resolved("[>+<-]");
    assert_eq!(move_gadget_detection(&mut program), 0);
    assert_eq!(program, resolved("[>+<-]"));
}

#[test]
fn scan_right() {
    let program = optimized("[>]");
    assert_eq!(without_nops(&program), [(Scan, 1), (Halt, 0)]);
}

#[test]
fn scan_left_is_negative() {
    let program = optimized("[<<]");
    assert_eq!(without_nops(&program), [(Scan, -2), (Halt, 0)]);
}

#[test]
fn scan_ignores_other_bodies() {
    let mut program = resolved("[.]");
    assert_eq!(scan_gadget_detection(&mut program), 0);
}

#[test]
fn scan_inside_loop() {
    let program = optimized("+[[<]>-]");
    assert_eq!(
        without_nops(&program),
        [
            (Add, 1),
            (BranchIfZero, 6),
            (Scan, -1),
            (ShiftRight, 1),
            (Sub, 1),
            (BranchIfNotZero, -6),
            (Halt, 0)
        ]
    );
}

#[test]
fn adjacent_windows_do_not_overlap() {
    // Scanning resumes right after a match.
    let mut program = resolved("[>][<]");
    assert_eq!(scan_gadget_detection(&mut program), 2);
    assert_eq!(
        without_nops(&program),
        [(Scan, 1), (Scan, -1), (Halt, 0)]
    );
}

#[test]
fn rerunning_a_pass_finds_nothing() {
    let mut program = resolved("[-][->+<][>]");
    assert_eq!(zero_cell_optimization(&mut program), 1);
    assert_eq!(move_gadget_detection(&mut program), 1);
    assert_eq!(scan_gadget_detection(&mut program), 1);

    assert_eq!(zero_cell_optimization(&mut program), 0);
    assert_eq!(move_gadget_detection(&mut program), 0);
    assert_eq!(scan_gadget_detection(&mut program), 0);
}

#[test]
fn optimize_flags_select_passes() {
    let mut program = resolved("[-][->+<][>]");
    let stats = optimize(
        &mut program,
        OptimisationsFlags::MOVE_GADGET | OptimisationsFlags::SCAN_GADGET,
    );

    assert_eq!(stats.zero_ops_eliminated, 0);
    assert_eq!(stats.move_ops_eliminated, 1);
    assert_eq!(stats.scan_ops_eliminated, 1);
    assert_eq!(
        without_nops(&program),
        [
            (BranchIfZero, 2),
            (Sub, 1),
            (BranchIfNotZero, -2),
            (MoveRight, 1),
            (Scan, 1),
            (Halt, 0)
        ]
    );
}

#[test]
fn optimize_empty_flags_is_noop() {
    let mut program = resolved("[-][->+<][>]");
    optimize(&mut program, OptimisationsFlags::empty());
    assert_eq!(program, resolved("[-][->+<][>]"));
}

#[test]
fn optimize_default_runs_everything() {
    assert_eq!(OptimisationsFlags::default(), OptimisationsFlags::all());
}

#[test]
fn optimize_keeps_length() {
    let source = "++[->+<]>[-]<[>]+[<<]";
    let before = resolved(source).len();
    assert_eq!(optimized(source).len(), before);
}

fn resolved_unaggregated(source: &str) -> Program {
    let mut program = parse(source.as_bytes());
    resolve_branches(&mut program).unwrap();
    program
}

#[test]
fn scan_unaggregated_has_unit_stride() {
    let mut program = resolved_unaggregated("[>]");
    optimize(&mut program, OptimisationsFlags::all());
    assert_eq!(without_nops(&program), [(Scan, 1), (Halt, 0)]);

    let mut program = resolved_unaggregated("[<]");
    optimize(&mut program, OptimisationsFlags::all());
    assert_eq!(without_nops(&program), [(Scan, -1), (Halt, 0)]);
}

#[test]
fn move_gadget_unaggregated() {
    let mut program = resolved_unaggregated("[->+<]");
    assert_eq!(move_gadget_detection(&mut program), 1);
    assert_eq!(without_nops(&program), [(MoveRight, 1), (Halt, 0)]);
}
