//! Call lowering.
//!
//! A call node resolves its callee's signature once during `check`,
//! validates arity, then generates arguments left to right. By-value
//! arguments are made addressable; fixed scalar arguments are converted
//! to the formal type. Excess arguments of a variadic callee pass
//! through unconverted.

use rave_ir::{CallConv, FuncType, Span, Type};

use crate::context::GenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::node::{Call, NodeKind, ResolvedCallee};
use crate::value::Value;

/// Reject an argument count the signature cannot accept.
///
/// Fixed-arity callees need exactly as many arguments as fixed formals;
/// variadic callees need at least that many.
pub fn check_arity(sig: &FuncType, found: usize, span: Span) -> CodegenResult<()> {
    let expected = sig.fixed_params().len();
    let variadic = sig.accepts_varargs();
    if found < expected || (!variadic && found > expected) {
        return Err(CodegenError::ArityMismatch {
            span,
            expected,
            found,
            variadic,
        });
    }
    Ok(())
}

impl Call {
    pub(crate) fn check(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        self.callee.check(ctx)?;
        self.args.iter_mut().try_for_each(|arg| arg.check(ctx))?;
        self.resolved = Some(self.resolve(span, ctx)?);
        Ok(())
    }

    fn resolve(&self, span: Span, ctx: &GenContext<'_>) -> CodegenResult<ResolvedCallee> {
        let callee_ty = self.callee.get_type(ctx)?;
        let sig = callee_ty
            .callable_signature()
            .cloned()
            .ok_or_else(|| CodegenError::NotCallable {
                span,
                found: ctx.type_name(&callee_ty),
            })?;
        check_arity(&sig, self.args.len(), span)?;

        // Only direct references to a declared callable carry its
        // convention; calls through variables use the platform default.
        let call_conv = match &self.callee.kind {
            NodeKind::Iden(name) if ctx.variable_type(*name).is_none() => ctx
                .registries
                .functions
                .get(*name)
                .map_or(CallConv::C, |decl| decl.call_conv),
            _ => CallConv::C,
        };
        Ok(ResolvedCallee { sig, call_conv })
    }

    pub(crate) fn get_type(&self, span: Span, ctx: &GenContext<'_>) -> CodegenResult<Type> {
        match &self.resolved {
            Some(resolved) => Ok(resolved.sig.ret.clone()),
            None => {
                let callee_ty = self.callee.get_type(ctx)?;
                callee_ty
                    .callable_signature()
                    .map(|sig| sig.ret.clone())
                    .ok_or_else(|| CodegenError::NotCallable {
                        span,
                        found: ctx.type_name(&callee_ty),
                    })
            }
        }
    }

    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let resolved = match &self.resolved {
            Some(resolved) => resolved.clone(),
            None => {
                let resolved = self.resolve(span, ctx)?;
                self.resolved = Some(resolved.clone());
                resolved
            }
        };
        let ResolvedCallee { sig, call_conv } = resolved;

        let callee = self.callee.generate(ctx)?;
        let fixed = sig.fixed_params();
        let mut args = Vec::with_capacity(self.args.len());
        for (index, arg) in self.args.iter_mut().enumerate() {
            let mut value = arg.generate(ctx)?;
            match fixed.get(index) {
                Some(formal) if formal.by_value => ctx.make_as_pointer(&mut value, arg.span)?,
                Some(formal) if formal.ty.basic().is_some() && value.ty().basic().is_some() => {
                    value = ctx.coerce(value, &formal.ty, arg.span)?;
                }
                _ => {}
            }
            args.push(value);
        }

        tracing::trace!(
            callee = %ctx.type_name(callee.ty()),
            args = args.len(),
            "lowering call"
        );
        ctx.call(&callee, &args, &sig.by_value_indices(), call_conv, span)
    }
}
