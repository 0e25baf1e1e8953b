use pretty_assertions::assert_eq;
use rave_ir::{BasicKind, Type};

use crate::emit::{Instr, ValueKind};
use crate::error::CodegenError;
use crate::node::{Node, NodeKind};
use crate::test_support::{Fixture, SPAN};

#[test]
fn unknown_identifier_fails_check() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut node = Node::iden(SPAN, fx.name("nope"));
    assert!(matches!(
        node.check(&mut ctx),
        Err(CodegenError::UnknownVariable { name, .. }) if name == "nope"
    ));
}

#[test]
fn identifier_of_a_function_is_its_address() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut node = Node::iden(SPAN, fx.name("add2"));
    node.check(&mut ctx).unwrap();
    let value = node.generate(&mut ctx).unwrap();
    assert!(value.ty().callable_signature().is_some());
    assert!(matches!(
        ctx.module().value(value.id()).map(|v| &v.kind),
        Some(ValueKind::Function(_))
    ));
}

#[test]
fn variable_infers_its_type_and_reads_back_through_a_load() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let x = fx.name("x");
    let mut decl = Node::var(SPAN, x, None, Some(Node::float(SPAN, 0.5)));
    decl.check(&mut ctx).unwrap();
    let NodeKind::Var(var) = &decl.kind else {
        unreachable!()
    };
    assert_eq!(var.ty, Some(Type::DOUBLE));

    decl.generate(&mut ctx).unwrap();
    let binding = ctx.scope().lookup(x).unwrap().clone();
    assert_eq!(binding.ty, Type::DOUBLE);

    let mut read = Node::iden(SPAN, x);
    let value = read.generate(&mut ctx).unwrap();
    assert!(ctx.is_load(&value));
    assert_eq!(ctx.undo_load(&value, SPAN).unwrap().id(), binding.ptr);
}

#[test]
fn variable_without_type_or_initializer_fails() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut decl = Node::var(SPAN, fx.name("x"), None, None);
    assert!(matches!(
        decl.check(&mut ctx),
        Err(CodegenError::InvalidOperands { .. })
    ));
}

#[test]
fn void_variable_is_rejected() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut decl = Node::var(
        SPAN,
        fx.name("x"),
        None,
        Some(Node::call(SPAN, Node::iden(SPAN, fx.name("take_point")), vec![
            Node::struct_lit(SPAN, fx.name("Point"), vec![]),
        ])),
    );
    assert!(matches!(
        decl.check(&mut ctx),
        Err(CodegenError::InvalidOperands { message, .. }) if message.contains("void")
    ));
}

#[test]
fn global_int_literal_adopts_declared_width() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let g = fx.name("counter");
    let mut decl = Node::global_var(SPAN, g, Some(Type::LONG), Some(Node::int(SPAN, 3)));
    decl.check(&mut ctx).unwrap();
    decl.generate(&mut ctx).unwrap();

    let binding = ctx.scope().lookup(g).unwrap();
    let Some(ValueKind::Global { init }) = ctx.module().value(binding.ptr).map(|v| &v.kind) else {
        panic!("global storage expected");
    };
    assert_eq!(
        ctx.module().value_type(*init),
        Some(&crate::emit::IrType::Int(64))
    );
    assert_eq!(entry_allocas(&ctx), 0);
}

#[test]
fn global_without_initializer_is_zeroed() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut decl = Node::global_var(SPAN, fx.name("flag"), Some(Type::BOOL), None);
    decl.check(&mut ctx).unwrap();
    decl.generate(&mut ctx).unwrap();
    assert!(ctx.scope().contains(fx.name("flag")));
}

#[test]
fn global_with_runtime_initializer_fails() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut decl = Node::global_var(
        SPAN,
        fx.name("g"),
        Some(Type::INT),
        Some(Node::call(
            SPAN,
            Node::iden(SPAN, fx.name("add2")),
            vec![Node::int(SPAN, 1), Node::int(SPAN, 2)],
        )),
    );
    decl.check(&mut ctx).unwrap();
    assert!(matches!(
        decl.generate(&mut ctx),
        Err(CodegenError::InvalidOperands { message, .. }) if message.contains("constant initializer")
    ));
}

fn entry_allocas(ctx: &crate::context::GenContext<'_>) -> usize {
    let function = ctx.current_function().unwrap();
    let entry = ctx.module().function(function).unwrap().entry_block().unwrap();
    ctx.module()
        .instrs(entry)
        .filter(|(_, i)| matches!(i, Instr::Alloca { .. }))
        .count()
}

// -- fields --

fn declare_point(fx: &Fixture, ctx: &mut crate::context::GenContext<'_>) {
    let mut decl = Node::var(
        SPAN,
        fx.name("p"),
        None,
        Some(Node::struct_lit(
            SPAN,
            fx.name("Point"),
            vec![Node::int(SPAN, 1), Node::int(SPAN, 2)],
        )),
    );
    decl.check(ctx).unwrap();
    decl.generate(ctx).unwrap();
}

#[test]
fn field_read_is_a_load_from_the_field_address() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    declare_point(&fx, &mut ctx);

    let mut y = Node::field(SPAN, Node::iden(SPAN, fx.name("p")), fx.name("y"));
    y.check(&mut ctx).unwrap();
    assert_eq!(y.get_type(&ctx).unwrap(), Type::INT);
    let value = y.generate(&mut ctx).unwrap();

    let addr = ctx.undo_load(&value, SPAN).unwrap();
    let p_slot = ctx.scope().lookup(fx.name("p")).unwrap().ptr;
    assert_eq!(
        ctx.module().instr(addr.id()),
        Some(&Instr::StructGep {
            source: crate::emit::IrType::Struct(fx.name("Point")),
            ptr: p_slot,
            index: 1,
        })
    );
}

#[test]
fn field_through_pointer_and_assignment() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    declare_point(&fx, &mut ctx);

    let pp = fx.name("pp");
    let mut decl = Node::var(
        SPAN,
        pp,
        None,
        Some(Node::unary(SPAN, crate::node::UnaryOp::AddrOf, Node::iden(SPAN, fx.name("p")))),
    );
    decl.check(&mut ctx).unwrap();
    decl.generate(&mut ctx).unwrap();

    let mut assign = Node::binary(
        SPAN,
        crate::node::BinaryOp::Assign,
        Node::field(SPAN, Node::iden(SPAN, pp), fx.name("x")),
        Node::int(SPAN, 9),
    );
    assign.check(&mut ctx).unwrap();
    assign.generate(&mut ctx).unwrap();
}

#[test]
fn field_errors() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    declare_point(&fx, &mut ctx);

    let mut missing = Node::field(SPAN, Node::iden(SPAN, fx.name("p")), fx.name("z"));
    assert!(matches!(
        missing.check(&mut ctx),
        Err(CodegenError::UnknownField { struct_name, field, .. }) if struct_name == "Point" && field == "z"
    ));

    let mut scalar = Node::field(SPAN, Node::int(SPAN, 1), fx.name("x"));
    assert!(matches!(
        scalar.check(&mut ctx),
        Err(CodegenError::InvalidOperands { message, .. }) if message.contains("has no fields")
    ));
}

// -- indexing --

#[test]
fn indexing_an_array_variable() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let arr = fx.name("arr");
    let mut decl = Node::var(SPAN, arr, Some(Type::array_of(4, Type::INT)), None);
    decl.check(&mut ctx).unwrap();
    decl.generate(&mut ctx).unwrap();

    let mut elem = Node::index(SPAN, Node::iden(SPAN, arr), Node::int(SPAN, 2));
    elem.check(&mut ctx).unwrap();
    assert_eq!(elem.get_type(&ctx).unwrap(), Type::INT);
    let value = elem.generate(&mut ctx).unwrap();

    let addr = ctx.undo_load(&value, SPAN).unwrap();
    let Some(Instr::Gep { ptr, indices, .. }) = ctx.module().instr(addr.id()) else {
        panic!("expected address arithmetic");
    };
    assert_eq!(*ptr, ctx.scope().lookup(arr).unwrap().ptr);
    assert_eq!(indices.len(), 2);
}

#[test]
fn indexing_a_pointer_uses_one_index() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut elem = Node::index(SPAN, Node::string(SPAN, "hey"), Node::typed_int(SPAN, 1, BasicKind::Char));
    elem.check(&mut ctx).unwrap();
    assert_eq!(elem.get_type(&ctx).unwrap(), Type::CHAR);
    let value = elem.generate(&mut ctx).unwrap();
    let addr = ctx.undo_load(&value, SPAN).unwrap();
    assert!(matches!(
        ctx.module().instr(addr.id()),
        Some(Instr::Gep { indices, .. }) if indices.len() == 1
    ));
}

#[test]
fn index_must_be_an_integer() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut elem = Node::index(SPAN, Node::string(SPAN, "hey"), Node::float(SPAN, 1.0));
    assert!(matches!(
        elem.check(&mut ctx),
        Err(CodegenError::InvalidOperands { message, .. }) if message.contains("index must be an integer")
    ));
}

// -- struct literals --

#[test]
fn struct_literal_checks() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut ghost = Node::struct_lit(SPAN, fx.name("Ghost"), vec![]);
    assert!(matches!(
        ghost.check(&mut ctx),
        Err(CodegenError::UnknownStruct { name, .. }) if name == "Ghost"
    ));

    let mut crowded = Node::struct_lit(
        SPAN,
        fx.name("Point"),
        vec![Node::int(SPAN, 1), Node::int(SPAN, 2), Node::int(SPAN, 3)],
    );
    assert!(matches!(
        crowded.check(&mut ctx),
        Err(CodegenError::InvalidOperands { .. })
    ));
}

#[test]
fn struct_literal_is_a_loaded_slot() {
    let fx = Fixture::new();
    let mut ctx = fx.in_function();
    let mut lit = Node::struct_lit(SPAN, fx.name("Point"), vec![Node::int(SPAN, 5)]);
    lit.check(&mut ctx).unwrap();
    let value = lit.generate(&mut ctx).unwrap();
    assert_eq!(value.ty(), &fx.point());
    assert!(ctx.is_load(&value));
}
