//! Call ABI through whole functions.

use pretty_assertions::assert_eq;
use rave_codegen::emit::{CallAttr, Instr, IrType};
use rave_codegen::{CodegenConfig, CodegenError, Node};
use rave_diagnostic::ErrorCode;
use rave_ir::{CallConv, Type};

use crate::common::{allocas_per_block, calls, span_at, Program, SPAN};

/// `Point <name> = Point { 1, 2 };`
fn point_local(program: &Program, name: &str) -> Node {
    Node::var(
        SPAN,
        program.name(name),
        None,
        Some(Node::struct_lit(
            SPAN,
            program.name("Point"),
            vec![Node::int(SPAN, 1), Node::int(SPAN, 2)],
        )),
    )
}

fn call(program: &Program, span: rave_ir::Span, callee: &str, args: Vec<Node>) -> Node {
    Node::call(span, Node::iden(SPAN, program.name(callee)), args)
}

fn point_ir(program: &Program) -> IrType {
    IrType::Struct(program.name("Point"))
}

fn by_value_attrs(instr: &Instr) -> Vec<CallAttr> {
    match instr {
        Instr::Call { attrs, .. } => attrs.iter().map(|a| a.attr.clone()).collect(),
        _ => Vec::new(),
    }
}

#[test]
fn by_value_alignment_follows_the_config() {
    let program = Program::new();
    let mut ctx = program.ctx_with(CodegenConfig::default().with_by_value_alignment(16));
    let body = vec![
        point_local(&program, "p"),
        call(&program, SPAN, "take_point", vec![Node::iden(SPAN, program.name("p"))]),
    ];
    let id = program.define(&mut ctx, "send", Type::VOID, body).unwrap();

    let calls = calls(ctx.module(), id);
    assert_eq!(calls.len(), 1);
    assert_eq!(
        by_value_attrs(calls[0]),
        vec![CallAttr::ByVal(point_ir(&program)), CallAttr::Align(16)]
    );
    let dump = ctx.module().to_string();
    assert!(dump.contains("byval("), "{dump}");
    assert!(dump.contains("align 16"), "{dump}");
}

#[test]
fn unregistered_struct_parameter_takes_the_argument_shape() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let p = program.name("p");
    let body = vec![
        point_local(&program, "p"),
        call(&program, span_at(1), "take_ghost", vec![Node::iden(SPAN, p)]),
        call(&program, span_at(2), "take_ghost", vec![Node::iden(SPAN, p)]),
    ];
    let id = program.define(&mut ctx, "haunt", Type::VOID, body).unwrap();

    for instr in calls(ctx.module(), id) {
        assert_eq!(
            by_value_attrs(instr),
            vec![CallAttr::ByVal(point_ir(&program)), CallAttr::Align(8)]
        );
    }
    // The declaration itself only knows it receives a pointer.
    let ghost = ctx.module().function_by_name("take_ghost").unwrap();
    assert_eq!(
        ctx.module().function(ghost).unwrap().ty.params,
        vec![IrType::ptr_to(IrType::Int(8))]
    );
}

#[test]
fn struct_rvalues_are_passed_through_entry_slots() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let literal = Node::struct_lit(
        SPAN,
        program.name("Point"),
        vec![Node::int(SPAN, 1), Node::int(SPAN, 2)],
    );
    let body = vec![
        call(&program, span_at(1), "take_point", vec![literal]),
        call(
            &program,
            span_at(2),
            "take_point",
            vec![call(&program, SPAN, "make_point", vec![])],
        ),
    ];
    let id = program.define(&mut ctx, "rvalues", Type::VOID, body).unwrap();

    let module = ctx.module();
    let passed: Vec<_> = calls(module, id)
        .into_iter()
        .filter_map(|instr| match instr {
            Instr::Call { args, .. } if args.len() == 1 => Some((args[0], instr)),
            _ => None,
        })
        .collect();
    assert_eq!(passed.len(), 2);
    for (arg, instr) in passed {
        assert_eq!(module.value_type(arg), Some(&IrType::ptr_to(point_ir(&program))));
        assert_eq!(
            by_value_attrs(instr),
            vec![CallAttr::ByVal(point_ir(&program)), CallAttr::Align(8)]
        );
    }
    // Every slot lives in the entry block, whatever produced the struct.
    let allocas = allocas_per_block(module, id);
    assert_eq!(allocas.len(), 1);
    assert!(allocas[0] >= 1);
    assert!(module.to_string().contains("@make_point()"));
}

#[test]
fn pending_struct_marshals_through_its_replacement() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let body = vec![
        point_local(&program, "p"),
        call(&program, SPAN, "take_pending", vec![Node::iden(SPAN, program.name("p"))]),
    ];
    let id = program.define(&mut ctx, "specialize", Type::VOID, body).unwrap();

    let calls = calls(ctx.module(), id);
    assert_eq!(
        by_value_attrs(calls[0]),
        vec![CallAttr::ByVal(point_ir(&program)), CallAttr::Align(8)]
    );
}

#[test]
fn by_value_scalar_to_unregistered_struct_is_spilled_and_copied_as_scalar() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let body = vec![call(&program, span_at(3), "take_ghost", vec![Node::int(SPAN, 7)])];
    let id = program.define(&mut ctx, "scalar", Type::VOID, body).unwrap();

    let calls = calls(ctx.module(), id);
    assert_eq!(
        by_value_attrs(calls[0]),
        vec![CallAttr::ByVal(IrType::Int(32)), CallAttr::Align(8)]
    );
    assert!(ctx.current_function().is_none());
}

#[test]
fn arity_errors_carry_their_call_site() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let body = vec![call(&program, span_at(4), "sys_write", vec![])];
    let err = program.define(&mut ctx, "short", Type::VOID, body).unwrap_err();

    assert_eq!(
        err,
        CodegenError::ArityMismatch {
            span: span_at(4),
            expected: 1,
            found: 0,
            variadic: false,
        }
    );
    let diag = err.to_diagnostic();
    assert_eq!(diag.code, ErrorCode::E2002);
    assert_eq!(diag.message, "expected 1 argument, found 0");
}

#[test]
fn variadic_arity_counts_only_fixed_parameters() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let body = vec![call(&program, span_at(5), "printf", vec![])];
    let err = program.define(&mut ctx, "empty", Type::VOID, body).unwrap_err();
    let diag = err.to_diagnostic();
    assert_eq!(diag.code, ErrorCode::E2002);
    assert_eq!(diag.notes.len(), 1);

    let mut ctx = program.ctx();
    let body = vec![call(
        &program,
        SPAN,
        "printf",
        vec![Node::string(SPAN, "%d %d"), Node::int(SPAN, 1), Node::int(SPAN, 2)],
    )];
    program.define(&mut ctx, "full", Type::VOID, body).unwrap();
}

#[test]
fn cdecl64_calls_are_marked_in_the_dump() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let body = vec![Node::ret(
        SPAN,
        Some(call(&program, SPAN, "sys_write", vec![Node::int(SPAN, 1)])),
    )];
    let id = program.define(&mut ctx, "write_one", Type::LONG, body).unwrap();

    let calls = calls(ctx.module(), id);
    assert!(matches!(calls[0], Instr::Call { conv: CallConv::Cdecl64, .. }));
    let dump = ctx.module().to_string();
    assert!(dump.contains("call x86_64_sysvcc i64 @sys_write(i64"), "{dump}");
}
