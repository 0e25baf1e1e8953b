//! Function body lowering.
//!
//! Drives one body through the node lifecycle: `check`, `comptime`,
//! `generate`, then `optimize`. Scope and check-time declarations are
//! restored afterwards whether lowering succeeded or not.

use std::mem;

use rave_ir::{FunctionDecl, Name, Span, Type};

use crate::context::{FunctionState, GenContext};
use crate::emit::FunctionData;
use crate::error::{CodegenError, CodegenResult};
use crate::node::Node;
use crate::scope::Scope;
use crate::type_lowering::TypeLowering;
use crate::value_id::FunctionId;

/// Bindings visible before the function was entered.
pub(crate) struct OuterState {
    scope: Scope,
    checked_vars: im::HashMap<Name, Type>,
}

/// Lower `body` as the definition of `decl`.
pub fn lower_function(
    ctx: &mut GenContext<'_>,
    decl: &FunctionDecl,
    body: &mut Node,
) -> CodegenResult<FunctionId> {
    let span = body.span;
    let name = ctx.name_str(decl.name);
    tracing::debug!(function = name, "lowering function");

    let (id, outer) = ctx.enter_function(decl, span)?;
    let result = ctx
        .bind_params(decl, span)
        .and_then(|()| lower_body(ctx, body))
        .and_then(|()| ctx.finish_body(span));
    ctx.leave_function(outer);

    match result {
        Ok(()) => Ok(id),
        Err(err) => {
            tracing::debug!(function = name, %err, "function lowering failed");
            Err(err)
        }
    }
}

fn lower_body(ctx: &mut GenContext<'_>, body: &mut Node) -> CodegenResult<()> {
    body.check(ctx)?;
    *body = mem::take(body).comptime();
    body.generate(ctx)?;
    body.optimize(ctx);
    Ok(())
}

impl GenContext<'_> {
    /// Declare `decl` if needed, open its entry block, and make it current.
    pub(crate) fn enter_function(
        &mut self,
        decl: &FunctionDecl,
        span: Span,
    ) -> CodegenResult<(FunctionId, OuterState)> {
        let ir_ty = TypeLowering {
            registries: self.registries,
            interner: self.interner,
            span,
        }
        .lower_signature(&decl.sig, &mut self.builder)?;
        let name = self.name_str(decl.name);
        let id = self
            .builder
            .get_or_declare_function(name, ir_ty, decl.call_conv);
        if !self.module().function(id).is_some_and(FunctionData::is_declaration) {
            return Err(CodegenError::InvalidOperands {
                span,
                message: format!("function `{name}` is already defined"),
            });
        }

        let entry = self.builder.append_block(id, "entry");
        self.builder.set_current_function(id);
        self.builder.position_at_end(entry);

        let outer = OuterState {
            scope: self.scope.child(),
            checked_vars: self.checked_vars.clone(),
        };
        self.current = Some(FunctionState {
            id,
            ret: decl.sig.ret.clone(),
        });
        Ok((id, outer))
    }

    /// Bind each named parameter to an addressable slot.
    ///
    /// By-value parameters already arrive as a pointer to the caller's
    /// copy and are bound to it directly.
    pub(crate) fn bind_params(&mut self, decl: &FunctionDecl, span: Span) -> CodegenResult<()> {
        let id = self.current_function_id()?;
        for (index, param) in decl.sig.fixed_params().iter().enumerate() {
            let Some(arg) = self.builder.param(id, index) else {
                continue;
            };
            if param.name == Name::EMPTY {
                continue;
            }
            if param.by_value {
                self.scope.bind(param.name, arg, param.ty.clone());
            } else {
                let slot = self.alloc(&param.ty, span)?;
                self.builder.store(arg, slot.id())?;
                self.scope.bind(param.name, slot.id(), param.ty.clone());
            }
        }
        Ok(())
    }

    /// Close a body that fell off its end with an implicit return.
    pub(crate) fn finish_body(&mut self, span: Span) -> CodegenResult<()> {
        if self.builder.current_block_terminated() {
            return Ok(());
        }
        let ret = self.current_return_type()?.clone();
        if ret.is_void() {
            return self.builder.ret(None);
        }
        let zero = self.zero_of(&ret, span).map_err(|_| CodegenError::InvalidOperands {
            span,
            message: format!("missing return value of type `{}`", self.type_name(&ret)),
        })?;
        self.builder.ret(Some(zero))
    }

    pub(crate) fn leave_function(&mut self, outer: OuterState) {
        self.scope = outer.scope;
        self.checked_vars = outer.checked_vars;
        self.current = None;
        self.builder.clear_current_function();
    }
}
