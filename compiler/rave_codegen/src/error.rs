//! Fatal lowering errors.
//!
//! A `CodegenError` aborts lowering of the current function. Type names
//! are rendered to strings when the error is built so the error can
//! outlive the interner borrow.

use rave_diagnostic::{Diagnostic, ErrorCode};
use rave_ir::Span;

/// Result alias used throughout lowering.
pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    #[error("expression of type `{found}` is not callable")]
    NotCallable { span: Span, found: String },

    #[error(
        "expected {}{expected} argument{}, found {found}",
        at_least(.variadic),
        plural(.expected)
    )]
    ArityMismatch {
        span: Span,
        expected: usize,
        found: usize,
        variadic: bool,
    },

    #[error("cannot resolve the by-value shape of parameter {index} (`{type_name}`)")]
    UnresolvedByValueShape {
        span: Span,
        index: usize,
        type_name: String,
    },

    #[error("unknown struct `{name}`")]
    UnknownStruct { span: Span, name: String },

    #[error("unknown identifier `{name}`")]
    UnknownVariable { span: Span, name: String },

    #[error("struct `{struct_name}` has no field `{field}`")]
    UnknownField {
        span: Span,
        struct_name: String,
        field: String,
    },

    #[error("expected a pointer, found `{found}`")]
    NotAPointer { span: Span, found: String },

    #[error("{message}")]
    InvalidOperands { span: Span, message: String },

    #[error("internal error: value is not the result of a load")]
    NotALoad { span: Span },

    #[error("internal error: no function is being lowered")]
    NoActiveFunction,
}

fn at_least(variadic: &bool) -> &'static str {
    if *variadic {
        "at least "
    } else {
        ""
    }
}

fn plural(n: &usize) -> &'static str {
    if *n == 1 {
        ""
    } else {
        "s"
    }
}

impl CodegenError {
    /// Source location of the failure, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            CodegenError::NotCallable { span, .. }
            | CodegenError::ArityMismatch { span, .. }
            | CodegenError::UnresolvedByValueShape { span, .. }
            | CodegenError::UnknownStruct { span, .. }
            | CodegenError::UnknownVariable { span, .. }
            | CodegenError::UnknownField { span, .. }
            | CodegenError::NotAPointer { span, .. }
            | CodegenError::InvalidOperands { span, .. }
            | CodegenError::NotALoad { span } => Some(*span),
            CodegenError::NoActiveFunction => None,
        }
    }

    /// Lowering-core bug rather than a user error.
    pub fn is_internal(&self) -> bool {
        matches!(self, CodegenError::NotALoad { .. } | CodegenError::NoActiveFunction)
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CodegenError::NotCallable { .. } => ErrorCode::E2001,
            CodegenError::ArityMismatch { .. } => ErrorCode::E2002,
            CodegenError::UnresolvedByValueShape { .. } => ErrorCode::E2003,
            CodegenError::UnknownStruct { .. } => ErrorCode::E2004,
            CodegenError::UnknownVariable { .. } => ErrorCode::E2005,
            CodegenError::UnknownField { .. } => ErrorCode::E2006,
            CodegenError::NotAPointer { .. } => ErrorCode::E2007,
            CodegenError::InvalidOperands { .. } => ErrorCode::E2008,
            CodegenError::NotALoad { .. } | CodegenError::NoActiveFunction => ErrorCode::E9001,
        }
    }

    /// Convert to a renderable diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code()).with_message(self.to_string());
        let diag = match self.span() {
            Some(span) => diag.with_label(span, self.label()),
            None => diag,
        };
        match self {
            CodegenError::UnresolvedByValueShape { .. } => diag.with_note(
                "by-value parameters need a registered struct or a pointer argument to copy from",
            ),
            CodegenError::ArityMismatch { variadic: true, .. } => {
                diag.with_note("extra arguments are allowed after the fixed parameters")
            }
            _ if self.is_internal() => {
                diag.with_note("this is a bug in the compiler, please report it")
            }
            _ => diag,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CodegenError::NotCallable { .. } => "called here",
            CodegenError::ArityMismatch { .. } => "in this call",
            CodegenError::UnresolvedByValueShape { .. } => "argument passed by value here",
            CodegenError::UnknownStruct { .. } => "struct used here",
            CodegenError::UnknownVariable { .. } => "not found in this scope",
            CodegenError::UnknownField { .. } => "unknown field",
            CodegenError::NotAPointer { .. } => "dereferenced here",
            CodegenError::InvalidOperands { .. } => "in this expression",
            CodegenError::NotALoad { .. } => "expected a loaded value here",
            CodegenError::NoActiveFunction => "",
        }
    }
}
