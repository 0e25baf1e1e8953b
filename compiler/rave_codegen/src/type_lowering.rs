//! Source type → backend type.
//!
//! Struct types resolve through the struct registry first, then through
//! the pending-specialization map. Struct bodies are defined in the
//! module the first time a struct is lowered; a struct reached again
//! while its own body is being lowered (through a pointer field) is
//! referenced by name only.

use rave_ir::{BasicKind, FuncType, Name, Registries, Span, StringInterner, Type};
use rustc_hash::FxHashSet;

use crate::emit::{IrFuncType, IrType};
use crate::error::{CodegenError, CodegenResult};
use crate::ir_builder::IrBuilder;

/// Backend type of a scalar kind.
pub fn lower_basic(kind: BasicKind) -> IrType {
    match kind {
        BasicKind::Void => IrType::Void,
        BasicKind::Float | BasicKind::Double => IrType::Float(kind.bits()),
        _ => IrType::Int(kind.bits()),
    }
}

pub(crate) struct TypeLowering<'a> {
    pub registries: &'a Registries,
    pub interner: &'a StringInterner,
    /// Location blamed when a struct does not resolve.
    pub span: Span,
}

impl TypeLowering<'_> {
    pub fn lower(&self, ty: &Type, builder: &mut IrBuilder) -> CodegenResult<IrType> {
        self.lower_in(ty, builder, &mut FxHashSet::default())
    }

    /// Backend signature; by-value parameters become pointers to their shape.
    ///
    /// A by-value parameter naming an unknown struct is declared as an
    /// opaque byte pointer.
    pub fn lower_signature(
        &self,
        sig: &FuncType,
        builder: &mut IrBuilder,
    ) -> CodegenResult<IrFuncType> {
        self.lower_signature_in(sig, builder, &mut FxHashSet::default())
    }

    fn lower_in(
        &self,
        ty: &Type,
        builder: &mut IrBuilder,
        visiting: &mut FxHashSet<Name>,
    ) -> CodegenResult<IrType> {
        Ok(match ty {
            Type::Basic(kind) => lower_basic(*kind),
            Type::Pointer(inner) => IrType::ptr_to(self.lower_in(inner, builder, visiting)?),
            Type::Array { len, elem } => IrType::Array {
                len: *len,
                elem: Box::new(self.lower_in(elem, builder, visiting)?),
            },
            Type::Struct(name) => return self.lower_struct(*name, builder, visiting),
            Type::Func(sig) => {
                IrType::Func(Box::new(self.lower_signature_in(sig, builder, visiting)?))
            }
        })
    }

    fn lower_struct(
        &self,
        name: Name,
        builder: &mut IrBuilder,
        visiting: &mut FxHashSet<Name>,
    ) -> CodegenResult<IrType> {
        if let Some(decl) = self.registries.structs.get(name) {
            if visiting.contains(&name) || builder.module().struct_body(name).is_some() {
                return Ok(IrType::Struct(name));
            }
            visiting.insert(name);
            let fields = decl
                .fields
                .iter()
                .map(|f| self.lower_in(&f.ty, builder, visiting))
                .collect::<CodegenResult<Vec<_>>>();
            visiting.remove(&name);
            builder.define_struct(name, fields?);
            return Ok(IrType::Struct(name));
        }
        if let Some(replacement) = self.registries.replacement(name) {
            tracing::trace!(
                name = self.interner.lookup(name),
                "lowering pending struct through its replacement"
            );
            return self.lower_in(replacement, builder, visiting);
        }
        Err(CodegenError::UnknownStruct {
            span: self.span,
            name: self.interner.lookup(name).to_owned(),
        })
    }

    fn lower_signature_in(
        &self,
        sig: &FuncType,
        builder: &mut IrBuilder,
        visiting: &mut FxHashSet<Name>,
    ) -> CodegenResult<IrFuncType> {
        let params = sig
            .fixed_params()
            .iter()
            .map(|p| {
                if !p.by_value {
                    return self.lower_in(&p.ty, builder, visiting);
                }
                match self.lower_in(&p.ty, builder, visiting) {
                    Ok(shape) => Ok(IrType::ptr_to(shape)),
                    // Call sites marshal an unresolved struct from the argument.
                    Err(CodegenError::UnknownStruct { .. }) if p.ty.struct_name().is_some() => {
                        Ok(IrType::ptr_to(IrType::Int(8)))
                    }
                    Err(err) => Err(err),
                }
            })
            .collect::<CodegenResult<Vec<_>>>()?;
        Ok(IrFuncType {
            ret: self.lower_in(&sig.ret, builder, visiting)?,
            params,
            is_vararg: sig.accepts_varargs(),
        })
    }
}
