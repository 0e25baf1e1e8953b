//! Diagnostic queue: the sink lowering reports into.
//!
//! Features:
//! - Error limits to prevent overwhelming output
//! - Deduplication of identical diagnostics
//! - Optional suppression of warnings
//! - Stable ordering by source position on flush

use rave_ir::Span;

use crate::{Diagnostic, ErrorCode};

/// Configuration for diagnostic processing.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of errors kept (0 = unlimited).
    pub error_limit: usize,
    /// Drop diagnostics identical to one already queued.
    pub deduplicate: bool,
    /// Drop every warning.
    pub disable_warnings: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 10,
            deduplicate: true,
            disable_warnings: false,
        }
    }
}

impl DiagnosticConfig {
    /// Create a config with no limits and no filtering (for testing).
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            deduplicate: false,
            disable_warnings: false,
        }
    }
}

/// Queue for collecting diagnostics.
///
/// ```text
/// let mut queue = DiagnosticQueue::new();
/// queue.warning(ErrorCode::W2001, "unused variable 'x'", span);
/// let sorted = queue.flush();
/// ```
#[derive(Clone, Debug, Default)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    /// Create a new diagnostic queue with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a diagnostic queue with custom configuration.
    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            diagnostics: Vec::new(),
            error_count: 0,
            config,
        }
    }

    /// Queue a diagnostic.
    ///
    /// Returns `true` if the diagnostic was kept, `false` if it was filtered.
    pub fn emit(&mut self, diag: Diagnostic) -> bool {
        let is_error = diag.is_error();

        if !is_error && self.config.disable_warnings {
            return false;
        }

        if is_error && self.config.error_limit > 0 && self.error_count >= self.config.error_limit
        {
            return false;
        }

        if self.config.deduplicate && self.diagnostics.contains(&diag) {
            return false;
        }

        if is_error {
            self.error_count += 1;
        }
        self.diagnostics.push(diag);
        true
    }

    /// Report a non-fatal finding.
    pub fn warning(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) -> bool {
        let message = message.into();
        self.emit(
            Diagnostic::warning(code)
                .with_label(span, message.clone())
                .with_message(message),
        )
    }

    /// Report an error.
    pub fn error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) -> bool {
        let message = message.into();
        self.emit(
            Diagnostic::error(code)
                .with_label(span, message.clone())
                .with_message(message),
        )
    }

    /// Queued diagnostics in emission order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of queued errors.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Number of queued warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count
    }

    /// Check if any error was queued.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Take all diagnostics, sorted by primary span start.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        let mut out = std::mem::take(&mut self.diagnostics);
        self.error_count = 0;
        out.sort_by_key(|d| d.primary_span().map_or(0, |s| s.start));
        out
    }
}
