//! Typed value handles.
//!
//! A [`Value`] pairs a backend handle with the source-level type it
//! carries. Values produced by loading from an address remember that
//! address, so an rvalue read out of storage can be turned back into an
//! lvalue without guessing.

use rave_ir::Type;

use crate::value_id::ValueId;

/// How a value came to exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueOrigin {
    /// Computed, constant, or otherwise not backed by a load.
    Direct,
    /// Read from the boxed address.
    Loaded(Box<Value>),
}

/// A backend handle plus its source type.
///
/// When `ty` is a pointer, `id` denotes an address of memory holding the
/// pointee type. Values are only minted by the lowering context, which
/// keeps the pair consistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    id: ValueId,
    ty: Type,
    origin: ValueOrigin,
}

impl Value {
    pub(crate) fn new(id: ValueId, ty: Type) -> Self {
        Self {
            id,
            ty,
            origin: ValueOrigin::Direct,
        }
    }

    pub(crate) fn loaded(id: ValueId, ty: Type, source: Value) -> Self {
        Self {
            id,
            ty,
            origin: ValueOrigin::Loaded(Box::new(source)),
        }
    }

    /// Result of an expression with no value.
    pub fn void() -> Self {
        Self::new(ValueId::NONE, Type::VOID)
    }

    #[inline]
    pub fn id(&self) -> ValueId {
        self.id
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn origin(&self) -> &ValueOrigin {
        &self.origin
    }

    /// The address this value was loaded from.
    pub fn load_source(&self) -> Option<&Value> {
        match &self.origin {
            ValueOrigin::Loaded(src) => Some(src),
            ValueOrigin::Direct => None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.id.is_none()
    }

    /// Same handle viewed at another type, with no load provenance.
    pub(crate) fn retyped(&self, ty: Type) -> Self {
        Self::new(self.id, ty)
    }
}
