//! Diagnostic system for the lowering core.
//!
//! - Error codes for searchability
//! - Clear messages (what went wrong)
//! - Primary span (where it went wrong)
//! - Notes (why it's wrong)
//!
//! The [`DiagnosticQueue`] is the sink codegen reports into. Rendering
//! is the driver's business.

mod diagnostic;
mod error_code;
pub mod queue;

pub use diagnostic::{unused_variable, Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
