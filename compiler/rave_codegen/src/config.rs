//! Lowering configuration.

use crate::emit::FastMathFlags;

/// Knobs the driver sets before lowering a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodegenConfig {
    /// Alignment attached to by-value call arguments.
    pub by_value_alignment: u32,
    /// Initial fast-math flags for float instructions and calls.
    pub fast_math: FastMathFlags,
    /// Drop warnings instead of queueing them.
    pub disable_warnings: bool,
    /// Trace a warning when a call site falls back to the argument's
    /// element type for an unregistered struct parameter.
    pub warn_struct_fallback: bool,
    /// Name given to the emitted module.
    pub module_name: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            by_value_alignment: 8,
            fast_math: FastMathFlags::empty(),
            disable_warnings: false,
            warn_struct_fallback: true,
            module_name: "main".to_owned(),
        }
    }
}

impl CodegenConfig {
    #[must_use]
    pub fn with_by_value_alignment(mut self, align: u32) -> Self {
        self.by_value_alignment = align;
        self
    }

    #[must_use]
    pub fn with_fast_math(mut self, flags: FastMathFlags) -> Self {
        self.fast_math = flags;
        self
    }

    #[must_use]
    pub fn with_warnings_disabled(mut self, disabled: bool) -> Self {
        self.disable_warnings = disabled;
        self
    }

    #[must_use]
    pub fn with_struct_fallback_warning(mut self, enabled: bool) -> Self {
        self.warn_struct_fallback = enabled;
        self
    }

    #[must_use]
    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }
}
