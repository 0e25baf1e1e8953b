//! Variables and memory access: names, declarations, fields, indexing,
//! and struct construction.
//!
//! Every expression here that reads memory returns a loaded [`Value`], so
//! callers that need the address (assignment, `&`, by-value arguments)
//! can recover it with `undo_load`.

use rave_ir::{BasicKind, Name, Span, Type};

use crate::context::GenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::node::{FieldAccess, IndexAccess, NodeKind, StructLit, VarDecl};
use crate::value::Value;
use crate::value_id::ValueId;

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

pub(crate) fn check_iden(name: Name, span: Span, ctx: &GenContext<'_>) -> CodegenResult<()> {
    iden_type(name, span, ctx).map(drop)
}

/// Variables shadow callables of the same name.
pub(crate) fn iden_type(name: Name, span: Span, ctx: &GenContext<'_>) -> CodegenResult<Type> {
    if let Some(ty) = ctx.variable_type(name) {
        return Ok(ty);
    }
    ctx.registries
        .functions
        .get(name)
        .map(|decl| Type::func(decl.sig.clone()))
        .ok_or_else(|| CodegenError::UnknownVariable {
            span,
            name: ctx.name_str(name).to_owned(),
        })
}

pub(crate) fn generate_iden(name: Name, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
    if let Some(binding) = ctx.scope.lookup(name) {
        let slot = Value::new(binding.ptr, Type::pointer_to(binding.ty.clone()));
        return ctx.load(&slot, span);
    }
    ctx.function_ref(name, span)
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

impl VarDecl {
    pub(crate) fn check(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        if let Some(init) = &mut self.init {
            init.check(ctx)?;
        }
        let ty = self.resolved_type(span, ctx)?;
        if ty.is_void() {
            return Err(CodegenError::InvalidOperands {
                span,
                message: format!("variable `{}` cannot have type `void`", ctx.name_str(self.name)),
            });
        }
        ctx.declare_checked(self.name, ty.clone());
        self.ty = Some(ty);
        Ok(())
    }

    fn resolved_type(&self, span: Span, ctx: &GenContext<'_>) -> CodegenResult<Type> {
        match (&self.ty, &self.init) {
            (Some(ty), _) => Ok(ty.clone()),
            (None, Some(init)) => init.get_type(ctx),
            (None, None) => Err(CodegenError::InvalidOperands {
                span,
                message: format!(
                    "cannot infer the type of `{}` without an initializer",
                    ctx.name_str(self.name)
                ),
            }),
        }
    }

    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let ty = self.resolved_type(span, ctx)?;
        if self.is_global {
            let storage = self.generate_global(&ty, span, ctx)?;
            ctx.scope.bind(self.name, storage, ty);
            return Ok(Value::void());
        }

        let slot = ctx.alloc(&ty, span)?;
        if let Some(init) = &mut self.init {
            let value = init.generate(ctx)?;
            ctx.store(value, &slot, span)?;
        }
        ctx.scope.bind(self.name, slot.id(), ty);
        Ok(Value::void())
    }

    fn generate_global(&mut self, ty: &Type, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<ValueId> {
        let storage_ty = ctx.lower_type(ty, span)?;
        let init = match self.init.as_deref_mut() {
            Some(node) => {
                // Integer literals adopt the declared width directly.
                let literal = match (&node.kind, ty.basic()) {
                    (NodeKind::Int(lit), Some(kind)) if kind.is_integer() => Some((kind, lit.value)),
                    _ => None,
                };
                if let Some((kind, value)) = literal {
                    ctx.const_int(kind, value).id()
                } else {
                    let value = node.generate(ctx)?;
                    if !ctx.builder.is_constant(value.id()) || value.ty() != ty {
                        return Err(CodegenError::InvalidOperands {
                            span,
                            message: format!(
                                "global `{}` needs a constant initializer of type `{}`",
                                ctx.name_str(self.name),
                                ctx.type_name(ty)
                            ),
                        });
                    }
                    value.id()
                }
            }
            None => ctx.zero_of(ty, span)?,
        };
        let symbol = ctx.name_str(self.name);
        tracing::trace!(symbol, "emitting global");
        Ok(ctx.builder.global_constant(symbol, storage_ty, init))
    }
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

impl FieldAccess {
    pub(crate) fn check(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        self.base.check(ctx)?;
        self.resolve(span, ctx).map(drop)
    }

    /// Field index and type. Pointers to structs are dereferenced
    /// implicitly.
    fn resolve(&self, span: Span, ctx: &GenContext<'_>) -> CodegenResult<(u32, Type)> {
        let base_ty = self.base.get_type(ctx)?;
        let struct_name = match &base_ty {
            Type::Struct(name) => *name,
            Type::Pointer(inner) => inner.struct_name().ok_or_else(|| no_fields(&base_ty, span, ctx))?,
            _ => return Err(no_fields(&base_ty, span, ctx)),
        };
        let decl = ctx
            .registries
            .structs
            .get(struct_name)
            .ok_or_else(|| CodegenError::UnknownStruct {
                span,
                name: ctx.name_str(struct_name).to_owned(),
            })?;
        let unknown_field = || CodegenError::UnknownField {
            span,
            struct_name: ctx.name_str(struct_name).to_owned(),
            field: ctx.name_str(self.field).to_owned(),
        };
        let index = decl.field_index(self.field).ok_or_else(unknown_field)?;
        let field = decl.field(index).ok_or_else(unknown_field)?;
        Ok((index, field.ty.clone()))
    }

    pub(crate) fn get_type(&self, span: Span, ctx: &GenContext<'_>) -> CodegenResult<Type> {
        self.resolve(span, ctx).map(|(_, ty)| ty)
    }

    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let (index, _) = self.resolve(span, ctx)?;
        let base = self.base.generate(ctx)?;
        let addr = ctx.struct_field_address(&base, index, span)?;
        ctx.load(&addr, span)
    }
}

fn no_fields(ty: &Type, span: Span, ctx: &GenContext<'_>) -> CodegenError {
    CodegenError::InvalidOperands {
        span,
        message: format!("`{}` has no fields", ctx.type_name(ty)),
    }
}

// ---------------------------------------------------------------------------
// Indexing
// ---------------------------------------------------------------------------

impl IndexAccess {
    pub(crate) fn check(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        self.base.check(ctx)?;
        self.index.check(ctx)?;
        let index_ty = self.index.get_type(ctx)?;
        if !index_ty.basic().is_some_and(BasicKind::is_integer) {
            return Err(CodegenError::InvalidOperands {
                span: self.index.span,
                message: format!("index must be an integer, found `{}`", ctx.type_name(&index_ty)),
            });
        }
        self.get_type(span, ctx).map(drop)
    }

    pub(crate) fn get_type(&self, span: Span, ctx: &GenContext<'_>) -> CodegenResult<Type> {
        let base_ty = self.base.get_type(ctx)?;
        base_ty
            .element()
            .cloned()
            .ok_or_else(|| CodegenError::InvalidOperands {
                span,
                message: format!("cannot index into `{}`", ctx.type_name(&base_ty)),
            })
    }

    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let mut base = self.base.generate(ctx)?;
        let index = self.index.generate(ctx)?;
        let index = ctx.coerce(index, &Type::LONG, self.index.span)?;
        let addr = if matches!(base.ty(), Type::Array { .. }) {
            ctx.make_as_pointer(&mut base, span)?;
            let zero = ctx.const_int(BasicKind::Long, 0);
            ctx.gep(&base, &[zero, index], span)?
        } else if base.ty().is_pointer() {
            ctx.gep(&base, &[index], span)?
        } else {
            return Err(CodegenError::InvalidOperands {
                span,
                message: format!("cannot index into `{}`", ctx.type_name(base.ty())),
            });
        };
        ctx.load(&addr, span)
    }
}

// ---------------------------------------------------------------------------
// Struct construction
// ---------------------------------------------------------------------------

impl StructLit {
    pub(crate) fn check(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        let decl = ctx
            .registries
            .structs
            .get(self.name)
            .ok_or_else(|| CodegenError::UnknownStruct {
                span,
                name: ctx.name_str(self.name).to_owned(),
            })?;
        if self.fields.len() > decl.fields.len() {
            return Err(CodegenError::InvalidOperands {
                span,
                message: format!(
                    "`{}` has {} fields but {} were given",
                    ctx.name_str(self.name),
                    decl.fields.len(),
                    self.fields.len()
                ),
            });
        }
        self.fields.iter_mut().try_for_each(|f| f.check(ctx))
    }

    /// Fields are written in order into a fresh slot; unnamed trailing
    /// fields stay uninitialized.
    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let slot = ctx.alloc(&Type::Struct(self.name), span)?;
        for (index, field) in self.fields.iter_mut().enumerate() {
            let value = field.generate(ctx)?;
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            let addr = ctx.struct_field_address(&slot, index, field.span)?;
            ctx.store(value, &addr, field.span)?;
        }
        ctx.load(&slot, span)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
