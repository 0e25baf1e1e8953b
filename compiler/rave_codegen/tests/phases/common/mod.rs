//! Shared test utilities for phase tests.
//!
//! `Program` owns the interner and registries a test lowers against. The
//! registered declarations are:
//!
//! - `struct Point { int x; int y; }`
//! - `struct Pending`, awaiting specialization as `Point`
//! - `int printf(char* fmt, ...)`
//! - `long sys_write(long n)` with `@cdecl64`
//! - `void take_point(Point p)`, `p` by value
//! - `void take_ghost(Ghost g)`, `g` by value, `Ghost` never registered
//! - `void take_pending(Pending p)`, `p` by value
//! - `Point make_point()`

use rave_codegen::emit::{Instr, Module};
use rave_codegen::{lower_function, CodegenConfig, CodegenResult, FunctionId, GenContext, Node};
use rave_ir::{
    CallConv, FieldDecl, FuncArgSet, FuncType, FunctionDecl, Name, Registries, Span,
    StringInterner, StructDecl, Type,
};

pub const SPAN: Span = Span::new(0, 1);

/// Span distinct per `n`, for tests that care about call-site identity.
pub fn span_at(n: u32) -> Span {
    Span::new(n * 10, n * 10 + 5)
}

pub struct Program {
    pub interner: StringInterner,
    pub registries: Registries,
}

impl Program {
    pub fn new() -> Self {
        let interner = StringInterner::new();
        let mut registries = Registries::new();
        let n = |s: &str| interner.intern(s);

        registries.structs.insert(StructDecl::new(
            n("Point"),
            vec![
                FieldDecl {
                    name: n("x"),
                    ty: Type::INT,
                },
                FieldDecl {
                    name: n("y"),
                    ty: Type::INT,
                },
            ],
        ));
        registries.mark_pending(n("Pending"), Type::Struct(n("Point")));

        registries.functions.insert(FunctionDecl::new(
            n("printf"),
            FuncType::variadic(Type::INT, vec![FuncArgSet::new(n("fmt"), Type::pointer_to(Type::CHAR))]),
        ));
        registries.functions.insert(
            FunctionDecl::new(
                n("sys_write"),
                FuncType::new(Type::LONG, vec![FuncArgSet::new(n("n"), Type::LONG)]),
            )
            .with_call_conv(CallConv::Cdecl64),
        );
        registries
            .functions
            .insert(FunctionDecl::new(n("make_point"), FuncType::new(Type::Struct(n("Point")), vec![])));
        for (callee, ty) in [("take_point", "Point"), ("take_ghost", "Ghost"), ("take_pending", "Pending")] {
            registries.functions.insert(FunctionDecl::new(
                n(callee),
                FuncType::new(Type::VOID, vec![FuncArgSet::by_value(n("p"), Type::Struct(n(ty)))]),
            ));
        }

        Self {
            interner,
            registries,
        }
    }

    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    pub fn point(&self) -> Type {
        Type::Struct(self.name("Point"))
    }

    pub fn ctx(&self) -> GenContext<'_> {
        self.ctx_with(CodegenConfig::default())
    }

    pub fn ctx_with(&self, config: CodegenConfig) -> GenContext<'_> {
        GenContext::new(&self.registries, &self.interner, config)
    }

    /// Lower `stmts` as the body of `name() -> ret`.
    pub fn define(
        &self,
        ctx: &mut GenContext<'_>,
        name: &str,
        ret: Type,
        stmts: Vec<Node>,
    ) -> CodegenResult<FunctionId> {
        let decl = FunctionDecl::new(self.name(name), FuncType::new(ret, vec![]));
        lower_function(ctx, &decl, &mut Node::block(SPAN, stmts))
    }
}

/// Instructions of `function`, in block order.
pub fn instrs(module: &Module, function: FunctionId) -> Vec<&Instr> {
    module
        .function_instrs(function)
        .into_iter()
        .map(|(_, i)| i)
        .collect()
}

/// Every call instruction of `function`.
pub fn calls(module: &Module, function: FunctionId) -> Vec<&Instr> {
    instrs(module, function)
        .into_iter()
        .filter(|i| matches!(i, Instr::Call { .. }))
        .collect()
}

/// Allocas per block of `function`, in block order.
pub fn allocas_per_block(module: &Module, function: FunctionId) -> Vec<usize> {
    module
        .function(function)
        .map(|f| {
            f.blocks
                .iter()
                .map(|&b| {
                    module
                        .instrs(b)
                        .filter(|(_, i)| matches!(i, Instr::Alloca { .. }))
                        .count()
                })
                .collect()
        })
        .unwrap_or_default()
}
