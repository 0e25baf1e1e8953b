//! String literal lowering.
//!
//! A literal becomes a NUL-terminated constant array in module storage;
//! the expression's value is the address of its first element.

use std::iter;

use rave_ir::{BasicKind, Span, Type};

use crate::context::GenContext;
use crate::error::CodegenResult;
use crate::node::StrLit;
use crate::value::Value;

impl StrLit {
    fn unit_kind(&self) -> BasicKind {
        if self.is_wide {
            BasicKind::Int
        } else {
            BasicKind::Char
        }
    }

    pub(crate) fn get_type(&self) -> Type {
        Type::pointer_to(Type::Basic(self.unit_kind()))
    }

    pub(crate) fn generate(&self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let kind = self.unit_kind();
        let units: Vec<i128> = if self.is_wide {
            self.value.chars().map(|c| i128::from(u32::from(c))).collect()
        } else {
            self.value.bytes().map(i128::from).collect()
        };
        let elems: Vec<Value> = units
            .into_iter()
            .chain(iter::once(0))
            .map(|unit| ctx.const_int(kind, unit))
            .collect();

        let array = ctx.make_constant_array(&Type::Basic(kind), &elems, span)?;
        let storage_ty = ctx.lower_type(array.ty(), span)?;
        let symbol = ctx.global_name(".str");
        let global = ctx.builder.global_constant(&symbol, storage_ty, array.id());
        let global = Value::new(global, Type::pointer_to(array.ty().clone()));
        ctx.const_gep(&global, &[0, 0], span)
    }
}
