//! Call-site ABI: how each argument is physically passed.
//!
//! # Key Distinction
//!
//! - **`rave_ir::FuncType`** = *semantic*: declared parameter types, by-value flags
//! - **`CallAbi`** = *physical*: per-slot backend types and attributes for one call
//!
//! A `CallAbi` is computed per call site because the shape of a struct
//! parameter can depend on the argument actually passed (see
//! [`MarshalType`]).

use rave_ir::{CallConv, Type};

use crate::emit::{CallAttr, CallSiteAttr, IrFuncType, IrType};

// ---------------------------------------------------------------------------
// Passing modes
// ---------------------------------------------------------------------------

/// How one fixed parameter is passed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamPassing {
    /// The value itself, in the lowered parameter type.
    Direct(IrType),
    /// A pointer to a private copy of `shape`, marked `byval` and aligned.
    ByValue { shape: IrType, alignment: u32 },
}

impl ParamPassing {
    /// Backend type of the argument slot.
    pub fn slot_type(&self) -> IrType {
        match self {
            ParamPassing::Direct(ty) => ty.clone(),
            ParamPassing::ByValue { shape, .. } => IrType::ptr_to(shape.clone()),
        }
    }

    /// Attributes for argument position `index` (0-based).
    pub fn attrs(&self, index: usize) -> Vec<CallSiteAttr> {
        match self {
            ParamPassing::Direct(_) => Vec::new(),
            ParamPassing::ByValue { shape, alignment } => {
                let slot = u32::try_from(index + 1).unwrap_or(u32::MAX);
                vec![
                    CallSiteAttr {
                        slot,
                        attr: CallAttr::ByVal(shape.clone()),
                    },
                    CallSiteAttr {
                        slot,
                        attr: CallAttr::Align(*alignment),
                    },
                ]
            }
        }
    }
}

/// Where a struct parameter's shape came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarshalType {
    /// The declared formal type.
    Declared(Type),
    /// The formal named an unregistered, non-pending struct; the
    /// argument's own element type stands in for it.
    ArgumentFallback(Type),
}

impl MarshalType {
    pub fn ty(&self) -> &Type {
        match self {
            MarshalType::Declared(ty) | MarshalType::ArgumentFallback(ty) => ty,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, MarshalType::ArgumentFallback(_))
    }
}

// ---------------------------------------------------------------------------
// CallAbi
// ---------------------------------------------------------------------------

/// Physical layout of one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallAbi {
    pub params: Vec<ParamPassing>,
    pub ret: IrType,
    pub is_vararg: bool,
    pub call_conv: CallConv,
}

impl CallAbi {
    /// Function type presented to the backend at this call site.
    pub fn fn_type(&self) -> IrFuncType {
        IrFuncType {
            ret: self.ret.clone(),
            params: self.params.iter().map(ParamPassing::slot_type).collect(),
            is_vararg: self.is_vararg,
        }
    }

    /// Attributes of every by-value slot, in slot order.
    pub fn call_site_attrs(&self) -> Vec<CallSiteAttr> {
        self.params
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.attrs(i))
            .collect()
    }

    pub fn by_value_count(&self) -> usize {
        self.params
            .iter()
            .filter(|p| matches!(p, ParamPassing::ByValue { .. }))
            .count()
    }
}
