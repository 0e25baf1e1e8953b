//! Control flow lowering: blocks, conditionals, loops, and returns.
//!
//! # Loop desugaring
//!
//! Only `While` emits loop structure directly:
//!
//! ```text
//!   br while.cond
//! while.cond:
//!   %c = <guard>
//!   br %c, while.body, while.end
//! while.body:
//!   <body>
//!   br while.cond
//! while.end:
//! ```
//!
//! `For` generates its init statements in place, appends its post
//! statements to the body, and lowers the rest as a `While`. `Foreach`
//! rewrites itself into a `For` over a synthesized index.

use std::mem;

use rave_ir::{BasicKind, Name, Span, Type};
use smallvec::SmallVec;

use crate::context::GenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::node::{Block, BinaryOp, For, Foreach, If, Node, NodeKind, Ret, While};
use crate::value::Value;
use crate::value_id::BlockId;

/// Reject conditions that cannot be compared against zero.
fn check_condition(cond: &Node, ctx: &GenContext<'_>) -> CodegenResult<()> {
    let ty = cond.get_type(ctx)?;
    let usable = ty.is_pointer() || ty.basic().is_some_and(|k| k != BasicKind::Void);
    if usable {
        Ok(())
    } else {
        Err(CodegenError::InvalidOperands {
            span: cond.span,
            message: format!("`{}` cannot be used as a condition", ctx.type_name(&ty)),
        })
    }
}

/// Run `f` with check-time declarations scoped to it.
fn with_checked_scope<'a, R>(ctx: &mut GenContext<'a>, f: impl FnOnce(&mut GenContext<'a>) -> R) -> R {
    let saved = ctx.checked_vars.clone();
    let result = f(ctx);
    ctx.checked_vars = saved;
    result
}

fn branch_if_open(ctx: &mut GenContext<'_>, dest: BlockId) -> CodegenResult<()> {
    if ctx.builder.current_block_terminated() {
        Ok(())
    } else {
        ctx.builder.br(dest)
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

impl Block {
    pub(crate) fn check(&mut self, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        with_checked_scope(ctx, |ctx| {
            self.stmts.iter_mut().try_for_each(|stmt| stmt.check(ctx))
        })
    }

    /// Statements after a terminator are unreachable and skipped. Local
    /// variables declared here are unbound on exit.
    pub(crate) fn generate(&mut self, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let mut declared: SmallVec<[Name; 4]> = SmallVec::new();
        for stmt in &mut self.stmts {
            if ctx.builder.current_block_terminated() {
                tracing::trace!(start = stmt.span.start, "skipping unreachable statements");
                break;
            }
            stmt.generate(ctx)?;
            if let NodeKind::Var(var) = &stmt.kind {
                if !var.is_global {
                    declared.push(var.name);
                }
            }
        }
        for name in declared.into_iter().rev() {
            ctx.scope.remove(name);
        }
        Ok(Value::void())
    }
}

// ---------------------------------------------------------------------------
// If
// ---------------------------------------------------------------------------

impl If {
    pub(crate) fn check(&mut self, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        self.cond.check(ctx)?;
        check_condition(&self.cond, ctx)?;
        self.then_body.check(ctx)?;
        if let Some(else_body) = &mut self.else_body {
            else_body.check(ctx)?;
        }
        Ok(())
    }

    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let function = ctx.current_function_id()?;
        let cond = self.cond.generate(ctx)?;
        let cond = ctx.to_condition(cond, span)?;

        let then_bb = ctx.make_block("if.then", function);
        let else_bb = self
            .else_body
            .is_some()
            .then(|| ctx.make_block("if.else", function));
        let end_bb = ctx.make_block("if.end", function);
        ctx.builder.cond_br(cond.id(), then_bb, else_bb.unwrap_or(end_bb))?;

        ctx.builder.position_at_end(then_bb);
        self.then_body.generate(ctx)?;
        branch_if_open(ctx, end_bb)?;

        if let (Some(else_bb), Some(else_body)) = (else_bb, &mut self.else_body) {
            ctx.builder.position_at_end(else_bb);
            else_body.generate(ctx)?;
            branch_if_open(ctx, end_bb)?;
        }

        ctx.builder.position_at_end(end_bb);
        Ok(Value::void())
    }
}

// ---------------------------------------------------------------------------
// While
// ---------------------------------------------------------------------------

impl While {
    pub(crate) fn check(&mut self, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        if let Some(guard) = &mut self.guard {
            guard.check(ctx)?;
            check_condition(guard, ctx)?;
        }
        self.body.check(ctx)
    }

    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let function = ctx.current_function_id()?;
        let cond_bb = ctx.make_block("while.cond", function);
        let body_bb = ctx.make_block("while.body", function);
        let end_bb = ctx.make_block("while.end", function);

        ctx.builder.br(cond_bb)?;
        ctx.builder.position_at_end(cond_bb);
        match &mut self.guard {
            Some(guard) => {
                let cond = guard.generate(ctx)?;
                let cond = ctx.to_condition(cond, span)?;
                ctx.builder.cond_br(cond.id(), body_bb, end_bb)?;
            }
            None => ctx.builder.br(body_bb)?,
        }

        ctx.builder.position_at_end(body_bb);
        self.body.generate(ctx)?;
        branch_if_open(ctx, cond_bb)?;

        ctx.builder.position_at_end(end_bb);
        Ok(Value::void())
    }
}

// ---------------------------------------------------------------------------
// For
// ---------------------------------------------------------------------------

impl For {
    pub(crate) fn check(&mut self, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        with_checked_scope(ctx, |ctx| {
            self.init.iter_mut().try_for_each(|stmt| stmt.check(ctx))?;
            if let Some(guard) = &mut self.guard {
                guard.check(ctx)?;
                check_condition(guard, ctx)?;
            }
            self.post.iter_mut().try_for_each(|stmt| stmt.check(ctx))?;
            self.body.check(ctx)
        })
    }

    /// Lower as init statements followed by a `While`.
    ///
    /// Post statements move into the body once, after a nested block
    /// holding the original body, so generating the same node again does
    /// not repeat them. Init variables are unbound after the loop.
    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        with_checked_scope(ctx, |ctx| self.generate_loop(span, ctx))?;
        for stmt in &self.init {
            if let NodeKind::Var(var) = &stmt.kind {
                if !var.is_global {
                    ctx.scope.remove(var.name);
                }
            }
        }
        Ok(Value::void())
    }

    fn generate_loop(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        for stmt in &mut self.init {
            stmt.check(ctx)?;
            stmt.generate(ctx)?;
        }
        if !self.post.is_empty() {
            // Body locals are unbound before the post statements run.
            let inner = Node::block(span, mem::take(&mut self.body.stmts));
            self.body.stmts.push(inner);
            self.body.stmts.append(&mut self.post);
        }

        let mut lowered = While {
            guard: self.guard.take(),
            body: mem::take(&mut self.body),
        };
        let result = lowered
            .check(ctx)
            .and_then(|()| lowered.generate(span, ctx));
        self.guard = lowered.guard;
        self.body = lowered.body;
        result.map(drop)
    }
}

// ---------------------------------------------------------------------------
// Foreach
// ---------------------------------------------------------------------------

impl Foreach {
    fn element_type(&self, span: Span, ctx: &GenContext<'_>) -> CodegenResult<(u64, Type)> {
        match self.iterable.get_type(ctx)? {
            Type::Array { len, elem } => Ok((len, *elem)),
            other => Err(CodegenError::InvalidOperands {
                span,
                message: format!(
                    "foreach needs a fixed-size array, found `{}`",
                    ctx.type_name(&other)
                ),
            }),
        }
    }

    pub(crate) fn check(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        self.iterable.check(ctx)?;
        let (_, elem) = self.element_type(span, ctx)?;
        with_checked_scope(ctx, |ctx| {
            ctx.declare_checked(self.elem, elem);
            self.body.check(ctx)
        })
    }

    /// Rewrite into
    ///
    /// ```text
    /// elem_t* elems = &iterable[0];
    /// for (long i = 0; i < len; i += 1) { elem = elems[i]; body }
    /// ```
    ///
    /// over fresh copies, leaving this node untouched. The iterable is
    /// evaluated once, before the loop.
    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let (len, elem) = self.element_type(span, ctx)?;
        let index = ctx.hidden_name("foreach.index");
        let elements = ctx.hidden_name("foreach.elements");
        let len = i128::from(len);

        let mut iterable = self.iterable.copy();
        iterable.check(ctx)?;
        let mut array = iterable.generate(ctx)?;
        ctx.make_as_pointer(&mut array, span)?;
        let zero = ctx.const_int(BasicKind::Long, 0);
        let first = ctx.gep(&array, &[zero.clone(), zero], span)?;
        let elements_ty = Type::pointer_to(elem.clone());
        let slot = ctx.alloc(&elements_ty, span)?;
        ctx.store(first, &slot, span)?;
        ctx.scope.bind(elements, slot.id(), elements_ty);

        let init = Node::var(span, index, Some(Type::LONG), Some(Node::typed_int(span, 0, BasicKind::Long)));
        let guard = Node::binary(
            span,
            BinaryOp::Lt,
            Node::iden(span, index),
            Node::typed_int(span, len, BasicKind::Long),
        );
        let post = Node::binary(
            span,
            BinaryOp::AddAssign,
            Node::iden(span, index),
            Node::typed_int(span, 1, BasicKind::Long),
        );
        let element = Node::var(
            span,
            self.elem,
            Some(elem),
            Some(Node::index(span, Node::iden(span, elements), Node::iden(span, index))),
        );
        let mut body = Vec::with_capacity(self.body.stmts.len() + 1);
        body.push(element);
        body.extend(self.body.stmts.iter().map(Node::copy));

        let mut lowered = Node::for_loop(span, vec![init], Some(guard), vec![post], body);
        let result = lowered.check(ctx).and_then(|()| lowered.generate(ctx));
        ctx.scope.remove(elements);
        result
    }
}

// ---------------------------------------------------------------------------
// Ret
// ---------------------------------------------------------------------------

impl Ret {
    pub(crate) fn check(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        if let Some(value) = &mut self.value {
            value.check(ctx)?;
        }
        let Ok(ret) = ctx.current_return_type() else {
            return Ok(());
        };
        match (&self.value, ret.is_void()) {
            (Some(value), true) => Err(CodegenError::InvalidOperands {
                span: value.span,
                message: "cannot return a value from a `void` function".to_owned(),
            }),
            (None, false) => Err(CodegenError::InvalidOperands {
                span,
                message: format!("missing return value of type `{}`", ctx.type_name(ret)),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let ret_ty = ctx.current_return_type()?.clone();
        match &mut self.value {
            Some(node) => {
                let value = node.generate(ctx)?;
                let value = ctx.coerce(value, &ret_ty, span)?;
                ctx.builder.ret(Some(value.id()))?;
            }
            None => ctx.builder.ret(None)?,
        }
        Ok(Value::void())
    }
}
