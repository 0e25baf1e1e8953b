//! Rave IR - leaf data for the lowering core.
//!
//! This crate contains the data the code generator reads but never emits:
//! - Spans for source locations
//! - Names for interned identifiers
//! - Type descriptors (`Type`, `FuncType`, `FuncArgSet`)
//! - Declaration registries for structs and callables
//!
//! # Design Philosophy
//!
//! - **Intern identifiers**: Strings → `Name(u32)`, compared in O(1)
//! - **Read-mostly registries**: owned by the driver, borrowed by codegen
//! - **No emission**: nothing in this crate knows about instructions

/// Compile-time assertion that a type has a specific size.
///
/// Used to prevent accidental size regressions in frequently-copied types.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod interner;
mod name;
pub mod registry;
mod span;
pub mod types;

pub use interner::{InternError, StringInterner};
pub use name::Name;
pub use registry::{
    CallConv, FieldDecl, FunctionDecl, FunctionTable, Registries, StructDecl, StructTable,
};
pub use span::Span;
pub use types::{BasicKind, FuncArgSet, FuncType, Type};
