use std::fmt;

/// Error codes for lowering diagnostics.
///
/// Format: E#### / W#### where the first digit indicates the category:
/// - E2xxx: Type errors found while lowering
/// - E9xxx: Internal compiler errors
/// - W2xxx: Style findings from the diagnostic pass
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Type Errors (E2xxx)
    /// Callee is not a function or function pointer
    E2001,
    /// Wrong number of arguments for a fixed-arity callee
    E2002,
    /// By-value aggregate shape cannot be resolved
    E2003,
    /// Unknown struct name
    E2004,
    /// Unknown identifier
    E2005,
    /// Unknown struct field
    E2006,
    /// Operand is not a pointer
    E2007,
    /// Operand types not supported by the operation
    E2008,

    // Internal Errors (E9xxx)
    /// Internal compiler error
    E9001,

    // Warnings (W2xxx)
    /// Unused variable
    W2001,
}

impl ErrorCode {
    /// Get the code as a string (e.g., "E2001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2007 => "E2007",
            ErrorCode::E2008 => "E2008",
            ErrorCode::E9001 => "E9001",
            ErrorCode::W2001 => "W2001",
        }
    }

    /// Check if this is a warning code (Wxxx range).
    pub fn is_warning(&self) -> bool {
        self.as_str().starts_with('W')
    }

    /// Check if this is an internal compiler error (E9xxx range).
    pub fn is_internal(&self) -> bool {
        self.as_str().starts_with("E9")
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
