//! Lowering core for Rave.
//!
//! Turns checked syntax trees into instructions of an in-memory
//! [`Module`], one function body at a time.
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=rave_codegen=debug`: function-level tracing, unused
//!   variable findings.
//! - `RUST_LOG=rave_codegen=trace`: per-call and per-global emission
//!   (very verbose).
//! - `RUST_LOG=rave_codegen::value_layer=warn`: only the struct-parameter
//!   fallback warnings.
//!
//! # Clippy Configuration
//!
//! Index and width conversions between `usize`, `u32`, and `u64` are
//! bounded by source sizes and allowed crate-wide.
#![allow(
    // Struct field indices are u32, argument positions usize
    clippy::cast_possible_truncation,
    // Array lengths are u64 in types, usize in memory
    clippy::cast_sign_loss,
)]
//!
//! # Architecture
//!
//! - **Nodes** (`node.rs`): the tree and its lifecycle dispatch
//!   (`check`, `comptime`, `copy`, `generate`, `get_type`)
//! - **Value layer** (`value_layer.rs`): typed values, load provenance,
//!   hoisted allocation, address arithmetic, ABI-aware calls
//! - **Builder** (`ir_builder.rs`): instruction emission with a
//!   save/restore cursor
//! - **Lowering** (`lower_*.rs`): per-node semantics; `For` and
//!   `Foreach` desugar into `While`
//! - **Diagnostics** (`unused_vars.rs`): the unused-variable pass
//!
//! # Key Types
//!
//! - [`GenContext`]: state threaded through every lifecycle operation
//! - [`Value`]: backend handle + source type + load provenance
//! - [`Node`]: syntax tree node
//! - [`CallAbi`]: per-call-site parameter passing
//!
//! # Example
//!
//! ```ignore
//! use rave_codegen::{lower_function, CodegenConfig, GenContext, Node};
//! use rave_ir::{FuncType, FunctionDecl, Registries, StringInterner, Type};
//!
//! let interner = StringInterner::new();
//! let registries = Registries::new();
//! let mut ctx = GenContext::new(&registries, &interner, CodegenConfig::default());
//!
//! let decl = FunctionDecl::new(interner.intern("main"), FuncType::new(Type::INT, vec![]));
//! let mut body = Node::block(span, vec![Node::ret(span, Some(Node::int(span, 0)))]);
//! lower_function(&mut ctx, &decl, &mut body)?;
//!
//! let (module, diagnostics) = ctx.into_parts();
//! println!("{module}");
//! ```

pub mod abi;
pub mod config;
pub mod context;
pub mod emit;
pub mod error;
pub mod function;
pub mod ir_builder;
pub mod node;
pub mod scope;
pub mod type_lowering;
pub mod value;
pub mod value_id;

mod lower_calls;
mod lower_control_flow;
mod lower_literals;
mod lower_memory;
mod lower_operators;
mod unused_vars;
mod value_layer;

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod test_support;

pub use abi::{CallAbi, MarshalType, ParamPassing};
pub use config::CodegenConfig;
pub use context::GenContext;
pub use emit::{FastMathFlags, IrType, Module};
pub use error::{CodegenError, CodegenResult};
pub use function::lower_function;
pub use ir_builder::IrBuilder;
pub use lower_calls::check_arity;
pub use node::{BinaryOp, Node, NodeKind, UnaryOp};
pub use scope::{Scope, ScopeBinding};
pub use value::{Value, ValueOrigin};
pub use value_id::{BlockId, FunctionId, ValueId};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=rave_codegen=debug` or `RUST_LOG=rave_codegen=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
