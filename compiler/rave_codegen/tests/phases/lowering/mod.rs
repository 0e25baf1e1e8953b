//! End-to-end lowering tests.

mod calls;
mod diagnostics;
mod loops;
mod values;
