//! Warnings and error conversion at the function boundary.

use pretty_assertions::assert_eq;
use rave_codegen::{BinaryOp, CodegenConfig, Node};
use rave_diagnostic::{ErrorCode, Severity};
use rave_ir::Type;

use crate::common::{span_at, Program, SPAN};

#[test]
fn unused_locals_surface_after_lowering() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let (used, unused) = (program.name("used"), program.name("unused"));
    let body = vec![
        Node::var(span_at(1), used, None, Some(Node::int(SPAN, 1))),
        Node::var(span_at(2), unused, None, Some(Node::int(SPAN, 2))),
        Node::ret(SPAN, Some(Node::iden(SPAN, used))),
    ];
    program.define(&mut ctx, "f", Type::INT, body).unwrap();

    let (_, mut diagnostics) = ctx.into_parts();
    let warnings = diagnostics.flush();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, ErrorCode::W2001);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert_eq!(warnings[0].message, "unused variable 'unused'");
    assert_eq!(warnings[0].primary_span(), Some(span_at(2)));
}

#[test]
fn warnings_accumulate_across_functions() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let x = program.name("x");
    for name in ["one", "two"] {
        let body = vec![Node::var(SPAN, x, Some(Type::INT), None)];
        program.define(&mut ctx, name, Type::VOID, body).unwrap();
    }
    // Same span and message in both functions: the queue keeps one.
    assert_eq!(ctx.diagnostics().warning_count(), 1);
    assert!(!ctx.diagnostics().has_errors());
}

#[test]
fn assignment_only_locals_still_warn() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let x = program.name("x");
    let body = vec![
        Node::var(SPAN, x, Some(Type::INT), None),
        Node::binary(SPAN, BinaryOp::Assign, Node::iden(SPAN, x), Node::int(SPAN, 5)),
    ];
    program.define(&mut ctx, "store_only", Type::VOID, body).unwrap();
    assert_eq!(ctx.diagnostics().warning_count(), 1);
}

#[test]
fn disabled_warnings_leave_the_queue_empty() {
    let program = Program::new();
    let mut ctx = program.ctx_with(CodegenConfig::default().with_warnings_disabled(true));
    let body = vec![Node::var(SPAN, program.name("x"), Some(Type::INT), None)];
    program.define(&mut ctx, "quiet", Type::VOID, body).unwrap();
    assert!(ctx.diagnostics().diagnostics().is_empty());
}

#[test]
fn failed_functions_report_no_warnings() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let body = vec![
        Node::var(SPAN, program.name("dead"), Some(Type::INT), None),
        Node::iden(span_at(7), program.name("nowhere")),
    ];
    let err = program.define(&mut ctx, "broken", Type::VOID, body).unwrap_err();

    assert!(ctx.diagnostics().diagnostics().is_empty());
    let diag = err.to_diagnostic();
    assert_eq!(diag.code, ErrorCode::E2005);
    assert!(diag.is_error());
    assert_eq!(diag.primary_span(), Some(span_at(7)));
    assert!(diag.message.contains("nowhere"));
}

#[test]
fn struct_errors_name_the_struct() {
    let program = Program::new();
    let mut ctx = program.ctx();
    let p = program.name("p");
    let body = vec![
        Node::var(SPAN, p, Some(program.point()), None),
        Node::ret(
            SPAN,
            Some(Node::field(span_at(8), Node::iden(SPAN, p), program.name("z"))),
        ),
    ];
    let err = program.define(&mut ctx, "missing_field", Type::INT, body).unwrap_err();

    assert_eq!(err.to_diagnostic().code, ErrorCode::E2006);
    assert_eq!(err.to_string(), "struct `Point` has no field `z`");
}
