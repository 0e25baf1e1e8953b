//! Static type descriptors.
//!
//! [`Type`] is the source-level type of an expression. It is a closed
//! tagged variant: basic scalars, pointers, fixed-length arrays, named
//! structs, and function signatures. Struct descriptors carry only the
//! struct's name; field lists are resolved through the
//! [`StructTable`](crate::StructTable).

use std::fmt;

use crate::{Name, StringInterner};

// ---------------------------------------------------------------------------
// BasicKind
// ---------------------------------------------------------------------------

/// Scalar type kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Cent,
    UCent,
    Float,
    Double,
    Void,
}

impl BasicKind {
    /// Parse a basic type from its source spelling.
    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "bool" => BasicKind::Bool,
            "char" => BasicKind::Char,
            "uchar" => BasicKind::UChar,
            "short" => BasicKind::Short,
            "ushort" => BasicKind::UShort,
            "int" => BasicKind::Int,
            "uint" => BasicKind::UInt,
            "long" => BasicKind::Long,
            "ulong" => BasicKind::ULong,
            "cent" => BasicKind::Cent,
            "ucent" => BasicKind::UCent,
            "float" => BasicKind::Float,
            "double" => BasicKind::Double,
            "void" => BasicKind::Void,
            _ => return None,
        })
    }

    /// Source spelling.
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Char => "char",
            BasicKind::UChar => "uchar",
            BasicKind::Short => "short",
            BasicKind::UShort => "ushort",
            BasicKind::Int => "int",
            BasicKind::UInt => "uint",
            BasicKind::Long => "long",
            BasicKind::ULong => "ulong",
            BasicKind::Cent => "cent",
            BasicKind::UCent => "ucent",
            BasicKind::Float => "float",
            BasicKind::Double => "double",
            BasicKind::Void => "void",
        }
    }

    /// Width in bits (`0` for `void`).
    pub fn bits(self) -> u32 {
        match self {
            BasicKind::Void => 0,
            BasicKind::Bool => 1,
            BasicKind::Char | BasicKind::UChar => 8,
            BasicKind::Short | BasicKind::UShort => 16,
            BasicKind::Int | BasicKind::UInt | BasicKind::Float => 32,
            BasicKind::Long | BasicKind::ULong | BasicKind::Double => 64,
            BasicKind::Cent | BasicKind::UCent => 128,
        }
    }

    /// True for `float` and `double`.
    pub fn is_float(self) -> bool {
        matches!(self, BasicKind::Float | BasicKind::Double)
    }

    /// True for every integer kind, including `bool`.
    pub fn is_integer(self) -> bool {
        !self.is_float() && self != BasicKind::Void
    }

    /// True for the unsigned integer kinds.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            BasicKind::Bool
                | BasicKind::UChar
                | BasicKind::UShort
                | BasicKind::UInt
                | BasicKind::ULong
                | BasicKind::UCent
        )
    }
}

// ---------------------------------------------------------------------------
// Type
// ---------------------------------------------------------------------------

/// Source-level type descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Scalar (or `void`).
    Basic(BasicKind),
    /// Address of a `T`.
    Pointer(Box<Type>),
    /// `len` contiguous elements.
    Array { len: u64, elem: Box<Type> },
    /// Named struct; fields resolve through the struct registry.
    Struct(Name),
    /// Callable signature.
    Func(Box<FuncType>),
}

impl Type {
    pub const VOID: Type = Type::Basic(BasicKind::Void);
    pub const BOOL: Type = Type::Basic(BasicKind::Bool);
    pub const CHAR: Type = Type::Basic(BasicKind::Char);
    pub const INT: Type = Type::Basic(BasicKind::Int);
    pub const LONG: Type = Type::Basic(BasicKind::Long);
    pub const DOUBLE: Type = Type::Basic(BasicKind::Double);

    /// `T*`
    pub fn pointer_to(pointee: Type) -> Type {
        Type::Pointer(Box::new(pointee))
    }

    /// `T[len]`
    pub fn array_of(len: u64, elem: Type) -> Type {
        Type::Array {
            len,
            elem: Box::new(elem),
        }
    }

    /// Function signature type.
    pub fn func(sig: FuncType) -> Type {
        Type::Func(Box::new(sig))
    }

    /// The pointed-to type, if this is a pointer.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// Element navigation: the pointee of a pointer or the element of an array.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) => Some(inner),
            Type::Array { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// The element type if there is one, otherwise the type itself.
    pub fn element_or_self(&self) -> &Type {
        self.element().unwrap_or(self)
    }

    #[inline]
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Basic(BasicKind::Void))
    }

    /// The struct name, if this is a struct type.
    pub fn struct_name(&self) -> Option<Name> {
        match self {
            Type::Struct(name) => Some(*name),
            _ => None,
        }
    }

    /// The basic kind, if this is a scalar type.
    pub fn basic(&self) -> Option<BasicKind> {
        match self {
            Type::Basic(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Resolve a callee type to its signature.
    ///
    /// A function type is used directly; a pointer to a function type is
    /// unwrapped one level. Anything else is not callable.
    pub fn callable_signature(&self) -> Option<&FuncType> {
        match self {
            Type::Func(sig) => Some(sig),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Func(sig) => Some(sig),
                _ => None,
            },
            _ => None,
        }
    }

    /// Render with names resolved through `interner`.
    pub fn display<'a>(&'a self, interner: &'a StringInterner) -> TypeDisplay<'a> {
        TypeDisplay {
            ty: self,
            interner,
        }
    }
}

/// [`Type`] paired with an interner for `Display`.
pub struct TypeDisplay<'a> {
    ty: &'a Type,
    interner: &'a StringInterner,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            Type::Basic(kind) => f.write_str(kind.name()),
            Type::Pointer(inner) => write!(f, "{}*", inner.display(self.interner)),
            Type::Array { len, elem } => write!(f, "{}[{len}]", elem.display(self.interner)),
            Type::Struct(name) => f.write_str(self.interner.lookup(*name)),
            Type::Func(sig) => {
                write!(f, "{}(", sig.ret.display(self.interner))?;
                for (i, param) in sig.fixed_params().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param.ty.display(self.interner))?;
                }
                if sig.accepts_varargs() {
                    if sig.fixed_params().is_empty() {
                        f.write_str("...")?;
                    } else {
                        f.write_str(", ...")?;
                    }
                }
                f.write_str(")")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function signatures
// ---------------------------------------------------------------------------

/// One formal parameter of a callable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FuncArgSet {
    pub name: Name,
    pub ty: Type,
    /// Aggregate passed as a copy through a pointer plus `byval`.
    pub by_value: bool,
    /// Placeholder for the `...` tail; not a real parameter.
    pub is_vararg_marker: bool,
}

impl FuncArgSet {
    /// An ordinary parameter.
    pub fn new(name: Name, ty: Type) -> Self {
        Self {
            name,
            ty,
            by_value: false,
            is_vararg_marker: false,
        }
    }

    /// A parameter passed by value.
    pub fn by_value(name: Name, ty: Type) -> Self {
        Self {
            by_value: true,
            ..Self::new(name, ty)
        }
    }

    /// The `...` marker.
    pub fn vararg_marker() -> Self {
        Self {
            is_vararg_marker: true,
            ..Self::new(Name::EMPTY, Type::VOID)
        }
    }
}

/// Callable signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FuncType {
    pub ret: Type,
    pub params: Vec<FuncArgSet>,
    pub is_vararg: bool,
}

impl FuncType {
    /// A fixed-arity signature.
    pub fn new(ret: Type, params: Vec<FuncArgSet>) -> Self {
        Self {
            ret,
            params,
            is_vararg: false,
        }
    }

    /// A signature accepting extra trailing arguments.
    pub fn variadic(ret: Type, params: Vec<FuncArgSet>) -> Self {
        Self {
            ret,
            params,
            is_vararg: true,
        }
    }

    /// Parameters before the first vararg marker.
    pub fn fixed_params(&self) -> &[FuncArgSet] {
        let end = self
            .params
            .iter()
            .position(|p| p.is_vararg_marker)
            .unwrap_or(self.params.len());
        &self.params[..end]
    }

    /// True if excess arguments are permitted.
    pub fn accepts_varargs(&self) -> bool {
        self.is_vararg || self.params.iter().any(|p| p.is_vararg_marker)
    }

    /// Indices of by-value parameters, in ascending order.
    pub fn by_value_indices(&self) -> Vec<usize> {
        self.fixed_params()
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.by_value.then_some(i))
            .collect()
    }
}
