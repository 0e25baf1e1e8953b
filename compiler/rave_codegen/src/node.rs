//! The node tree and its lifecycle.
//!
//! Every node supports the same five operations, dispatched on
//! [`NodeKind`]:
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `check` | validate against scope and registries; idempotent; sets the checked flag |
//! | `comptime` | fold to a constant node if possible; never emits |
//! | `copy` | deep clone without generation-time caches |
//! | `generate` | emit instructions and return the node's [`Value`] |
//! | `get_type` | static type, no emission |
//!
//! Compound statements additionally expose `optimize` (see
//! [`unused_vars`](crate::unused_vars)).
//!
//! Per-variant logic lives in the `lower_*` modules.

use rave_ir::{BasicKind, CallConv, FuncType, Name, Span, Type};

use crate::context::GenContext;
use crate::error::CodegenResult;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub span: Span,
    pub kind: NodeKind,
    checked: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Int(IntLit),
    Float(FloatLit),
    Bool(bool),
    Str(StrLit),
    Iden(Name),
    Var(VarDecl),
    Binary(Binary),
    Unary(Unary),
    Field(FieldAccess),
    Index(IndexAccess),
    StructLit(StructLit),
    Call(Call),
    Block(Block),
    If(If),
    While(While),
    For(For),
    Foreach(Foreach),
    Ret(Ret),
}

// ---------------------------------------------------------------------------
// Variant payloads
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntLit {
    pub value: i128,
    pub kind: BasicKind,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatLit {
    pub value: f64,
    pub kind: BasicKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrLit {
    pub value: String,
    /// Wide strings hold 32-bit code units.
    pub is_wide: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub name: Name,
    /// Declared type; inferred from `init` during `check` when absent.
    pub ty: Option<Type>,
    pub init: Option<Box<Node>>,
    pub is_global: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
        )
    }

    /// `+=` → `+`, and so on. `=` and non-assignments have none.
    pub fn compound_base(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::AddAssign => Some(BinaryOp::Add),
            BinaryOp::SubAssign => Some(BinaryOp::Sub),
            BinaryOp::MulAssign => Some(BinaryOp::Mul),
            BinaryOp::DivAssign => Some(BinaryOp::Div),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binary {
    pub op: BinaryOp,
    pub lhs: Box<Node>,
    pub rhs: Box<Node>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    AddrOf,
    Deref,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Unary {
    pub op: UnaryOp,
    pub operand: Box<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldAccess {
    pub base: Box<Node>,
    pub field: Name,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexAccess {
    pub base: Box<Node>,
    pub index: Box<Node>,
}

/// Positional struct construction.
#[derive(Clone, Debug, PartialEq)]
pub struct StructLit {
    pub name: Name,
    pub fields: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub callee: Box<Node>,
    pub args: Vec<Node>,
    /// Signature resolved by `check`; valid for one emission only.
    pub(crate) resolved: Option<ResolvedCallee>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedCallee {
    pub sig: FuncType,
    pub call_conv: CallConv,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct If {
    pub cond: Box<Node>,
    pub then_body: Block,
    pub else_body: Option<Block>,
}

/// Guarded loop; a missing guard loops forever.
#[derive(Clone, Debug, PartialEq)]
pub struct While {
    pub guard: Option<Box<Node>>,
    pub body: Block,
}

/// Counted loop; lowered as init statements followed by a `While`.
#[derive(Clone, Debug, PartialEq)]
pub struct For {
    pub init: Vec<Node>,
    pub guard: Option<Box<Node>>,
    /// Moved to the end of `body` on first generation.
    pub post: Vec<Node>,
    pub body: Block,
}

/// Loop over the elements of a fixed-size array.
#[derive(Clone, Debug, PartialEq)]
pub struct Foreach {
    pub elem: Name,
    pub iterable: Box<Node>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ret {
    pub value: Option<Box<Node>>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Node {
    pub fn new(span: Span, kind: NodeKind) -> Self {
        Self {
            span,
            kind,
            checked: false,
        }
    }

    /// Reassemble a node taken apart by `comptime`.
    pub(crate) fn rebuilt(span: Span, kind: NodeKind, checked: bool) -> Self {
        Self {
            span,
            kind,
            checked,
        }
    }

    pub fn int(span: Span, value: i128) -> Self {
        Self::typed_int(span, value, BasicKind::Int)
    }

    pub fn typed_int(span: Span, value: i128, kind: BasicKind) -> Self {
        Self::new(span, NodeKind::Int(IntLit { value, kind }))
    }

    pub fn float(span: Span, value: f64) -> Self {
        Self::new(
            span,
            NodeKind::Float(FloatLit {
                value,
                kind: BasicKind::Double,
            }),
        )
    }

    pub fn boolean(span: Span, value: bool) -> Self {
        Self::new(span, NodeKind::Bool(value))
    }

    pub fn string(span: Span, value: impl Into<String>) -> Self {
        Self::new(
            span,
            NodeKind::Str(StrLit {
                value: value.into(),
                is_wide: false,
            }),
        )
    }

    pub fn wide_string(span: Span, value: impl Into<String>) -> Self {
        Self::new(
            span,
            NodeKind::Str(StrLit {
                value: value.into(),
                is_wide: true,
            }),
        )
    }

    pub fn iden(span: Span, name: Name) -> Self {
        Self::new(span, NodeKind::Iden(name))
    }

    pub fn var(span: Span, name: Name, ty: Option<Type>, init: Option<Node>) -> Self {
        Self::new(
            span,
            NodeKind::Var(VarDecl {
                name,
                ty,
                init: init.map(Box::new),
                is_global: false,
            }),
        )
    }

    pub fn global_var(span: Span, name: Name, ty: Option<Type>, init: Option<Node>) -> Self {
        Self::new(
            span,
            NodeKind::Var(VarDecl {
                name,
                ty,
                init: init.map(Box::new),
                is_global: true,
            }),
        )
    }

    pub fn binary(span: Span, op: BinaryOp, lhs: Node, rhs: Node) -> Self {
        Self::new(
            span,
            NodeKind::Binary(Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }),
        )
    }

    pub fn unary(span: Span, op: UnaryOp, operand: Node) -> Self {
        Self::new(
            span,
            NodeKind::Unary(Unary {
                op,
                operand: Box::new(operand),
            }),
        )
    }

    pub fn field(span: Span, base: Node, field: Name) -> Self {
        Self::new(
            span,
            NodeKind::Field(FieldAccess {
                base: Box::new(base),
                field,
            }),
        )
    }

    pub fn index(span: Span, base: Node, index: Node) -> Self {
        Self::new(
            span,
            NodeKind::Index(IndexAccess {
                base: Box::new(base),
                index: Box::new(index),
            }),
        )
    }

    pub fn struct_lit(span: Span, name: Name, fields: Vec<Node>) -> Self {
        Self::new(span, NodeKind::StructLit(StructLit { name, fields }))
    }

    pub fn call(span: Span, callee: Node, args: Vec<Node>) -> Self {
        Self::new(
            span,
            NodeKind::Call(Call {
                callee: Box::new(callee),
                args,
                resolved: None,
            }),
        )
    }

    pub fn block(span: Span, stmts: Vec<Node>) -> Self {
        Self::new(span, NodeKind::Block(Block { stmts }))
    }

    pub fn if_else(span: Span, cond: Node, then_body: Vec<Node>, else_body: Option<Vec<Node>>) -> Self {
        Self::new(
            span,
            NodeKind::If(If {
                cond: Box::new(cond),
                then_body: Block { stmts: then_body },
                else_body: else_body.map(|stmts| Block { stmts }),
            }),
        )
    }

    pub fn while_loop(span: Span, guard: Option<Node>, body: Vec<Node>) -> Self {
        Self::new(
            span,
            NodeKind::While(While {
                guard: guard.map(Box::new),
                body: Block { stmts: body },
            }),
        )
    }

    pub fn for_loop(
        span: Span,
        init: Vec<Node>,
        guard: Option<Node>,
        post: Vec<Node>,
        body: Vec<Node>,
    ) -> Self {
        Self::new(
            span,
            NodeKind::For(For {
                init,
                guard: guard.map(Box::new),
                post,
                body: Block { stmts: body },
            }),
        )
    }

    pub fn foreach(span: Span, elem: Name, iterable: Node, body: Vec<Node>) -> Self {
        Self::new(
            span,
            NodeKind::Foreach(Foreach {
                elem,
                iterable: Box::new(iterable),
                body: Block { stmts: body },
            }),
        )
    }

    pub fn ret(span: Span, value: Option<Node>) -> Self {
        Self::new(
            span,
            NodeKind::Ret(Ret {
                value: value.map(Box::new),
            }),
        )
    }
}

impl Default for Node {
    /// An empty block.
    fn default() -> Self {
        Self::block(Span::DUMMY, Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle dispatch
// ---------------------------------------------------------------------------

impl Node {
    #[inline]
    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Literal that needs no emission beyond a constant.
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Int(_) | NodeKind::Float(_) | NodeKind::Bool(_) | NodeKind::Str(_)
        )
    }

    pub fn check(&mut self, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        let span = self.span;
        match &mut self.kind {
            NodeKind::Int(_) | NodeKind::Float(_) | NodeKind::Bool(_) | NodeKind::Str(_) => {}
            NodeKind::Iden(name) => {
                let name = *name;
                crate::lower_memory::check_iden(name, span, ctx)?;
            }
            NodeKind::Var(v) => v.check(span, ctx)?,
            NodeKind::Binary(b) => b.check(span, ctx)?,
            NodeKind::Unary(u) => u.check(span, ctx)?,
            NodeKind::Field(f) => f.check(span, ctx)?,
            NodeKind::Index(i) => i.check(span, ctx)?,
            NodeKind::StructLit(s) => s.check(span, ctx)?,
            NodeKind::Call(c) => c.check(span, ctx)?,
            NodeKind::Block(b) => b.check(ctx)?,
            NodeKind::If(i) => i.check(ctx)?,
            NodeKind::While(w) => w.check(ctx)?,
            NodeKind::For(f) => f.check(ctx)?,
            NodeKind::Foreach(f) => f.check(span, ctx)?,
            NodeKind::Ret(r) => r.check(span, ctx)?,
        }
        self.checked = true;
        Ok(())
    }

    /// Fold to a constant node where the operands allow it.
    pub fn comptime(self) -> Node {
        let Node {
            span,
            kind,
            checked,
        } = self;
        let kind = match kind {
            NodeKind::Binary(b) => return b.comptime(span, checked),
            NodeKind::Unary(u) => return u.comptime(span, checked),
            NodeKind::Var(mut v) => {
                v.init = v.init.map(fold_boxed);
                NodeKind::Var(v)
            }
            NodeKind::Field(mut f) => {
                f.base = fold_boxed(f.base);
                NodeKind::Field(f)
            }
            NodeKind::Index(mut i) => {
                i.base = fold_boxed(i.base);
                i.index = fold_boxed(i.index);
                NodeKind::Index(i)
            }
            NodeKind::StructLit(mut s) => {
                s.fields = s.fields.into_iter().map(Node::comptime).collect();
                NodeKind::StructLit(s)
            }
            NodeKind::Block(b) => NodeKind::Block(b.comptime()),
            NodeKind::If(mut i) => {
                i.cond = fold_boxed(i.cond);
                i.then_body = i.then_body.comptime();
                i.else_body = i.else_body.map(Block::comptime);
                NodeKind::If(i)
            }
            NodeKind::While(mut w) => {
                w.guard = w.guard.map(fold_boxed);
                w.body = w.body.comptime();
                NodeKind::While(w)
            }
            NodeKind::For(mut f) => {
                f.init = f.init.into_iter().map(Node::comptime).collect();
                f.guard = f.guard.map(fold_boxed);
                f.post = f.post.into_iter().map(Node::comptime).collect();
                f.body = f.body.comptime();
                NodeKind::For(f)
            }
            NodeKind::Foreach(mut f) => {
                f.body = f.body.comptime();
                NodeKind::Foreach(f)
            }
            NodeKind::Ret(mut r) => {
                r.value = r.value.map(fold_boxed);
                NodeKind::Ret(r)
            }
            // Calls fold nothing; literals and names are already final.
            other => other,
        };
        Node {
            span,
            kind,
            checked,
        }
    }

    /// Deep clone with fresh generation state.
    ///
    /// The copy is unchecked and carries no resolved callees; both are
    /// recomputed when the copy is checked.
    #[must_use]
    pub fn copy(&self) -> Node {
        let mut copy = self.clone();
        copy.forget_generation_state();
        copy
    }

    fn forget_generation_state(&mut self) {
        self.checked = false;
        if let NodeKind::Call(call) = &mut self.kind {
            call.resolved = None;
        }
        self.for_each_child_mut(&mut Node::forget_generation_state);
    }

    pub fn generate(&mut self, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let span = self.span;
        match &mut self.kind {
            NodeKind::Int(lit) => Ok(ctx.const_int(lit.kind, lit.value)),
            NodeKind::Float(lit) => Ok(ctx.const_float(lit.kind, lit.value)),
            NodeKind::Bool(b) => Ok(ctx.const_bool(*b)),
            NodeKind::Str(s) => s.generate(span, ctx),
            NodeKind::Iden(name) => {
                let name = *name;
                crate::lower_memory::generate_iden(name, span, ctx)
            }
            NodeKind::Var(v) => v.generate(span, ctx),
            NodeKind::Binary(b) => b.generate(span, ctx),
            NodeKind::Unary(u) => u.generate(span, ctx),
            NodeKind::Field(f) => f.generate(span, ctx),
            NodeKind::Index(i) => i.generate(span, ctx),
            NodeKind::StructLit(s) => s.generate(span, ctx),
            NodeKind::Call(c) => c.generate(span, ctx),
            NodeKind::Block(b) => b.generate(ctx),
            NodeKind::If(i) => i.generate(span, ctx),
            NodeKind::While(w) => w.generate(span, ctx),
            NodeKind::For(f) => f.generate(span, ctx),
            NodeKind::Foreach(f) => f.generate(span, ctx),
            NodeKind::Ret(r) => r.generate(span, ctx),
        }
    }

    /// Static type of the node. Never emits.
    pub fn get_type(&self, ctx: &GenContext<'_>) -> CodegenResult<Type> {
        let span = self.span;
        match &self.kind {
            NodeKind::Int(lit) => Ok(Type::Basic(lit.kind)),
            NodeKind::Float(lit) => Ok(Type::Basic(lit.kind)),
            NodeKind::Bool(_) => Ok(Type::BOOL),
            NodeKind::Str(s) => Ok(s.get_type()),
            NodeKind::Iden(name) => crate::lower_memory::iden_type(*name, span, ctx),
            NodeKind::Binary(b) => b.get_type(span, ctx),
            NodeKind::Unary(u) => u.get_type(span, ctx),
            NodeKind::Field(f) => f.get_type(span, ctx),
            NodeKind::Index(i) => i.get_type(span, ctx),
            NodeKind::StructLit(s) => Ok(Type::Struct(s.name)),
            NodeKind::Call(c) => c.get_type(span, ctx),
            NodeKind::Var(_)
            | NodeKind::Block(_)
            | NodeKind::If(_)
            | NodeKind::While(_)
            | NodeKind::For(_)
            | NodeKind::Foreach(_)
            | NodeKind::Ret(_) => Ok(Type::VOID),
        }
    }

    // -- traversal --

    /// Visit direct children, statement bodies included.
    pub(crate) fn for_each_child(&self, f: &mut impl FnMut(&Node)) {
        match &self.kind {
            NodeKind::Int(_)
            | NodeKind::Float(_)
            | NodeKind::Bool(_)
            | NodeKind::Str(_)
            | NodeKind::Iden(_) => {}
            NodeKind::Var(v) => v.init.iter().for_each(|n| f(n)),
            NodeKind::Binary(b) => {
                f(&b.lhs);
                f(&b.rhs);
            }
            NodeKind::Unary(u) => f(&u.operand),
            NodeKind::Field(a) => f(&a.base),
            NodeKind::Index(i) => {
                f(&i.base);
                f(&i.index);
            }
            NodeKind::StructLit(s) => s.fields.iter().for_each(|n| f(n)),
            NodeKind::Call(c) => {
                f(&c.callee);
                c.args.iter().for_each(|n| f(n));
            }
            NodeKind::Block(b) => b.stmts.iter().for_each(|n| f(n)),
            NodeKind::If(i) => {
                f(&i.cond);
                i.then_body.stmts.iter().for_each(|n| f(n));
                if let Some(e) = &i.else_body {
                    e.stmts.iter().for_each(|n| f(n));
                }
            }
            NodeKind::While(w) => {
                w.guard.iter().for_each(|n| f(n));
                w.body.stmts.iter().for_each(|n| f(n));
            }
            NodeKind::For(l) => {
                l.init.iter().for_each(|n| f(n));
                l.guard.iter().for_each(|n| f(n));
                l.post.iter().for_each(|n| f(n));
                l.body.stmts.iter().for_each(|n| f(n));
            }
            NodeKind::Foreach(l) => {
                f(&l.iterable);
                l.body.stmts.iter().for_each(|n| f(n));
            }
            NodeKind::Ret(r) => r.value.iter().for_each(|n| f(n)),
        }
    }

    fn for_each_child_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        match &mut self.kind {
            NodeKind::Int(_)
            | NodeKind::Float(_)
            | NodeKind::Bool(_)
            | NodeKind::Str(_)
            | NodeKind::Iden(_) => {}
            NodeKind::Var(v) => v.init.iter_mut().for_each(|n| f(n)),
            NodeKind::Binary(b) => {
                f(&mut b.lhs);
                f(&mut b.rhs);
            }
            NodeKind::Unary(u) => f(&mut u.operand),
            NodeKind::Field(a) => f(&mut a.base),
            NodeKind::Index(i) => {
                f(&mut i.base);
                f(&mut i.index);
            }
            NodeKind::StructLit(s) => s.fields.iter_mut().for_each(|n| f(n)),
            NodeKind::Call(c) => {
                f(&mut c.callee);
                c.args.iter_mut().for_each(|n| f(n));
            }
            NodeKind::Block(b) => b.stmts.iter_mut().for_each(|n| f(n)),
            NodeKind::If(i) => {
                f(&mut i.cond);
                i.then_body.stmts.iter_mut().for_each(|n| f(n));
                if let Some(e) = &mut i.else_body {
                    e.stmts.iter_mut().for_each(|n| f(n));
                }
            }
            NodeKind::While(w) => {
                w.guard.iter_mut().for_each(|n| f(n));
                w.body.stmts.iter_mut().for_each(|n| f(n));
            }
            NodeKind::For(l) => {
                l.init.iter_mut().for_each(|n| f(n));
                l.guard.iter_mut().for_each(|n| f(n));
                l.post.iter_mut().for_each(|n| f(n));
                l.body.stmts.iter_mut().for_each(|n| f(n));
            }
            NodeKind::Foreach(l) => {
                f(&mut l.iterable);
                l.body.stmts.iter_mut().for_each(|n| f(n));
            }
            NodeKind::Ret(r) => r.value.iter_mut().for_each(|n| f(n)),
        }
    }
}

fn fold_boxed(node: Box<Node>) -> Box<Node> {
    Box::new((*node).comptime())
}

impl Block {
    pub(crate) fn comptime(self) -> Block {
        Block {
            stmts: self.stmts.into_iter().map(Node::comptime).collect(),
        }
    }
}
