//! Shared fixtures for unit tests.

use rave_ir::{
    CallConv, FieldDecl, FuncArgSet, FuncType, FunctionDecl, Name, Registries, Span,
    StringInterner, StructDecl, Type,
};

use crate::config::CodegenConfig;
use crate::context::GenContext;

pub(crate) const SPAN: Span = Span::new(0, 1);

/// Interner plus registries with a few declarations:
///
/// - `struct Point { int x; int y; }`
/// - `int add2(int a, int b)`
/// - `int printf(char* fmt, ...)`
/// - `void take_point(Point p)` with `p` by value
/// - `Point make_point()`
/// - `long sys_write(long n)` using `@cdecl64`
/// - `void take_ghost(Ghost g)` with `g` by value; `Ghost` is never
///   registered
pub(crate) struct Fixture {
    pub interner: StringInterner,
    pub registries: Registries,
}

impl Fixture {
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

        let int_params = vec![FuncArgSet::new(n("a"), Type::INT), FuncArgSet::new(n("b"), Type::INT)];
        registries
            .functions
            .insert(FunctionDecl::new(n("add2"), FuncType::new(Type::INT, int_params)));
        registries.functions.insert(FunctionDecl::new(
            n("printf"),
            FuncType::variadic(Type::INT, vec![FuncArgSet::new(n("fmt"), Type::pointer_to(Type::CHAR))]),
        ));
        registries.functions.insert(FunctionDecl::new(
            n("take_point"),
            FuncType::new(Type::VOID, vec![FuncArgSet::by_value(n("p"), Type::Struct(n("Point")))]),
        ));
        registries
            .functions
            .insert(FunctionDecl::new(n("make_point"), FuncType::new(Type::Struct(n("Point")), vec![])));
        registries.functions.insert(
            FunctionDecl::new(
                n("sys_write"),
                FuncType::new(Type::LONG, vec![FuncArgSet::new(n("n"), Type::LONG)]),
            )
            .with_call_conv(CallConv::Cdecl64),
        );
        registries.functions.insert(FunctionDecl::new(
            n("take_ghost"),
            FuncType::new(Type::VOID, vec![FuncArgSet::by_value(n("g"), Type::Struct(n("Ghost")))]),
        ));

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

    /// Context with no function open.
    pub fn ctx(&self) -> GenContext<'_> {
        self.ctx_with(CodegenConfig::default())
    }

    pub fn ctx_with(&self, config: CodegenConfig) -> GenContext<'_> {
        GenContext::new(&self.registries, &self.interner, config)
    }

    /// Context positioned in the entry block of `void test_fn()`.
    pub fn in_function(&self) -> GenContext<'_> {
        self.in_function_with(CodegenConfig::default())
    }

    pub fn in_function_with(&self, config: CodegenConfig) -> GenContext<'_> {
        self.in_function_returning(Type::VOID, config)
    }

    pub fn in_function_returning(&self, ret: Type, config: CodegenConfig) -> GenContext<'_> {
        let mut ctx = self.ctx_with(config);
        let decl = FunctionDecl::new(self.name("test_fn"), FuncType::new(ret, vec![]));
        ctx.enter_function(&decl, SPAN).unwrap();
        ctx
    }
}
