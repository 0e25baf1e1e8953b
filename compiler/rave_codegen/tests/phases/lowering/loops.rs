//! `For` and `Foreach` through whole functions.

use pretty_assertions::assert_eq;
use rave_codegen::emit::Module;
use rave_codegen::{BinaryOp, CodegenError, FunctionId, Node};
use rave_ir::{Name, Type};

use crate::common::{allocas_per_block, instrs, Program, SPAN};

fn block_names(module: &Module, function: FunctionId) -> Vec<String> {
    module
        .function(function)
        .unwrap()
        .blocks
        .iter()
        .map(|&b| module.block(b).unwrap().name.clone())
        .collect()
}

/// `for (int i = 0; i < n; i += 1) { body }`
fn counting_loop(i: Name, n: i128, body: Vec<Node>) -> Node {
    Node::for_loop(
        SPAN,
        vec![Node::var(SPAN, i, None, Some(Node::int(SPAN, 0)))],
        Some(Node::binary(SPAN, BinaryOp::Lt, Node::iden(SPAN, i), Node::int(SPAN, n))),
        vec![Node::binary(SPAN, BinaryOp::AddAssign, Node::iden(SPAN, i), Node::int(SPAN, 1))],
        body,
    )
}

fn accumulate(into: Name, from: Name) -> Node {
    Node::binary(SPAN, BinaryOp::AddAssign, Node::iden(SPAN, into), Node::iden(SPAN, from))
}

#[test]
fn a_copied_loop_lowers_like_the_original() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let (i, sum) = (program.name("i"), program.name("sum"));
    let original = counting_loop(i, 10, vec![accumulate(sum, i)]);
    let copy = original.copy();
    let body = |lp: Node| {
        vec![
            Node::var(SPAN, sum, Some(Type::INT), Some(Node::int(SPAN, 0))),
            lp,
            Node::ret(SPAN, Some(Node::iden(SPAN, sum))),
        ]
    };

    let a = program.define(&mut ctx, "a", Type::INT, body(original)).unwrap();
    let b = program.define(&mut ctx, "b", Type::INT, body(copy)).unwrap();

    let module = ctx.module();
    assert_eq!(instrs(module, a).len(), instrs(module, b).len());
    assert_eq!(block_names(module, a), block_names(module, b));
    assert_eq!(
        block_names(module, a),
        vec!["entry", "while.cond", "while.body", "while.end"]
    );
}

#[test]
fn nested_loops_see_the_outer_counter() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let (i, j, sum) = (program.name("i"), program.name("j"), program.name("sum"));
    let inner = counting_loop(j, 3, vec![accumulate(sum, i), accumulate(sum, j)]);
    let body = vec![
        Node::var(SPAN, sum, None, Some(Node::int(SPAN, 0))),
        counting_loop(i, 3, vec![inner]),
        Node::ret(SPAN, Some(Node::iden(SPAN, sum))),
    ];
    let id = program.define(&mut ctx, "grid", Type::INT, body).unwrap();

    assert_eq!(allocas_per_block(ctx.module(), id)[0], 3);
    assert_eq!(block_names(ctx.module(), id).len(), 7);
    assert!(ctx.scope().is_empty());
}

#[test]
fn the_counter_is_gone_after_the_loop() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let i = program.name("i");
    let body = vec![
        counting_loop(i, 2, vec![]),
        Node::ret(SPAN, Some(Node::iden(SPAN, i))),
    ];
    let err = program.define(&mut ctx, "leak", Type::INT, body).unwrap_err();
    assert!(matches!(err, CodegenError::UnknownVariable { name, .. } if name == "i"));
    assert!(ctx.scope().is_empty());
}

#[test]
fn foreach_sums_an_array() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let (arr, sum, e) = (program.name("arr"), program.name("sum"), program.name("e"));
    let body = vec![
        Node::var(SPAN, arr, Some(Type::array_of(4, Type::LONG)), None),
        Node::var(SPAN, sum, Some(Type::LONG), Some(Node::int(SPAN, 0))),
        Node::foreach(SPAN, e, Node::iden(SPAN, arr), vec![accumulate(sum, e)]),
        Node::ret(SPAN, Some(Node::iden(SPAN, sum))),
    ];
    let id = program.define(&mut ctx, "total", Type::LONG, body).unwrap();

    assert_eq!(allocas_per_block(ctx.module(), id), vec![5, 0, 0, 0]);
    let dump = ctx.module().to_string();
    assert!(dump.contains("alloca [4 x i64]"), "{dump}");
    assert!(dump.contains("getelementptr"), "{dump}");
    assert!(ctx.diagnostics().diagnostics().is_empty());
}

#[test]
fn foreach_element_shadows_and_restores_an_outer_name() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let (arr, e) = (program.name("arr"), program.name("e"));
    let body = vec![
        Node::var(SPAN, e, Some(Type::DOUBLE), Some(Node::float(SPAN, 0.5))),
        Node::var(SPAN, arr, Some(Type::array_of(2, Type::INT)), None),
        Node::foreach(SPAN, e, Node::iden(SPAN, arr), vec![Node::iden(SPAN, e)]),
        Node::ret(SPAN, Some(Node::iden(SPAN, e))),
    ];
    let id = program.define(&mut ctx, "outer_e", Type::DOUBLE, body).unwrap();

    // The return reads the outer double, not the loop's int element.
    let dump = ctx.module().to_string();
    assert!(dump.contains("ret double"), "{dump}");
    assert!(!dump.contains("sitofp"), "{dump}");
    assert_eq!(allocas_per_block(ctx.module(), id)[0], 5);
}
