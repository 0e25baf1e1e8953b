//! Literals, globals, slot placement and fast math.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rave_codegen::emit::{FastMathFlags, Instr};
use rave_codegen::{lower_function, BinaryOp, CodegenConfig, Node};
use rave_ir::{FuncArgSet, FuncType, FunctionDecl, Name, Type};

use crate::common::{allocas_per_block, instrs, Program, SPAN};

/// `for (int name = 0; name < 4; name += 1) { body }`
fn counting_loop(name: Name, body: Vec<Node>) -> Node {
    Node::for_loop(
        SPAN,
        vec![Node::var(SPAN, name, None, Some(Node::int(SPAN, 0)))],
        Some(Node::binary(SPAN, BinaryOp::Lt, Node::iden(SPAN, name), Node::int(SPAN, 4))),
        vec![Node::binary(SPAN, BinaryOp::AddAssign, Node::iden(SPAN, name), Node::int(SPAN, 1))],
        body,
    )
}

#[test]
fn string_literals_are_nul_terminated_globals() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let printf = Node::call(
        SPAN,
        Node::iden(SPAN, program.name("printf")),
        vec![Node::string(SPAN, "hi")],
    );
    program.define(&mut ctx, "greet", Type::VOID, vec![printf]).unwrap();

    let (module, _) = ctx.into_parts();
    assert_eq!(module.globals().len(), 1);
    let dump = module.to_string();
    assert!(dump.contains("[3 x i8] [i8 104, i8 105, i8 0]"), "{dump}");
    assert!(dump.contains("declare i32 @printf(i8* %arg0, ...)"), "{dump}");
}

#[test]
fn fast_math_applies_to_float_arithmetic_only() {
    let program = Program::new();
    let mut ctx = program.ctx_with(CodegenConfig::default().with_fast_math(FastMathFlags::FAST));
    let (d, n) = (program.name("d"), program.name("n"));
    let decl = FunctionDecl::new(
        program.name("scale"),
        FuncType::new(
            Type::DOUBLE,
            vec![FuncArgSet::new(d, Type::DOUBLE), FuncArgSet::new(n, Type::INT)],
        ),
    );
    let mut body = Node::block(
        SPAN,
        vec![
            Node::binary(SPAN, BinaryOp::AddAssign, Node::iden(SPAN, n), Node::int(SPAN, 1)),
            Node::ret(
                SPAN,
                Some(Node::binary(SPAN, BinaryOp::Mul, Node::iden(SPAN, d), Node::float(SPAN, 2.0))),
            ),
        ],
    );
    let id = lower_function(&mut ctx, &decl, &mut body).unwrap();

    let binaries: Vec<FastMathFlags> = instrs(ctx.module(), id)
        .into_iter()
        .filter_map(|i| match i {
            Instr::Binary { fast_math, .. } => Some(*fast_math),
            _ => None,
        })
        .collect();
    assert_eq!(binaries, vec![FastMathFlags::empty(), FastMathFlags::FAST]);
    assert!(ctx.module().to_string().contains("fmul fast double"));
}

#[test]
fn sequential_loops_may_reuse_their_counter_name() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let i = program.name("i");
    let id = program
        .define(
            &mut ctx,
            "twice",
            Type::VOID,
            vec![counting_loop(i, vec![]), counting_loop(i, vec![])],
        )
        .unwrap();

    let allocas = allocas_per_block(ctx.module(), id);
    assert_eq!(allocas[0], 2);
    assert!(allocas[1..].iter().all(|&n| n == 0));
    assert!(!ctx.scope().contains(i));
}

#[test]
fn every_function_gets_its_own_entry_slots() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let x = program.name("x");
    let local = || Node::var(SPAN, x, None, Some(Node::int(SPAN, 1)));
    let read = || Node::ret(SPAN, Some(Node::iden(SPAN, x)));

    let first = program.define(&mut ctx, "first", Type::INT, vec![local(), read()]).unwrap();
    let second = program.define(&mut ctx, "second", Type::INT, vec![local(), read()]).unwrap();

    assert_eq!(allocas_per_block(ctx.module(), first), vec![1]);
    assert_eq!(allocas_per_block(ctx.module(), second), vec![1]);
    assert_eq!(ctx.module().functions().count(), 2);
}

proptest! {
    #[test]
    fn nested_loop_counters_are_all_hoisted_to_entry(depth in 1usize..5) {
        let program = Program::new();
        let mut ctx = program.ctx();
        let mut body = vec![Node::var(SPAN, program.name("inner"), None, Some(Node::int(SPAN, 0)))];
        for level in 0..depth {
            body = vec![counting_loop(program.name(&format!("i{level}")), body)];
        }
        let id = program.define(&mut ctx, "nest", Type::VOID, body).unwrap();

        let allocas = allocas_per_block(ctx.module(), id);
        prop_assert_eq!(allocas[0], depth + 1);
        prop_assert!(allocas[1..].iter().all(|&n| n == 0));
    }
}
