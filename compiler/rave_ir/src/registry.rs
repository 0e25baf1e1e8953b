//! Declaration registries.
//!
//! The driver registers every struct and callable before lowering starts;
//! codegen only reads these tables. The one exception to "read-only" is
//! the pending-specialization map: names of generic instantiations still
//! in flight, each mapped to the type that will replace it.

use rustc_hash::FxHashMap;

use crate::{FuncType, Name, Type};

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

/// One field of a struct declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldDecl {
    pub name: Name,
    pub ty: Type,
}

/// A struct declaration: ordered fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDecl {
    pub name: Name,
    pub fields: Vec<FieldDecl>,
}

impl StructDecl {
    pub fn new(name: Name, fields: Vec<FieldDecl>) -> Self {
        Self { name, fields }
    }

    /// Field by position.
    pub fn field(&self, index: u32) -> Option<&FieldDecl> {
        self.fields.get(index as usize)
    }

    /// Position of the field called `name`.
    pub fn field_index(&self, name: Name) -> Option<u32> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .and_then(|i| u32::try_from(i).ok())
    }
}

/// Struct name → declaration.
#[derive(Clone, Debug, Default)]
pub struct StructTable {
    decls: FxHashMap<Name, StructDecl>,
}

impl StructTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a declaration.
    pub fn insert(&mut self, decl: StructDecl) {
        self.decls.insert(decl.name, decl);
    }

    pub fn get(&self, name: Name) -> Option<&StructDecl> {
        self.decls.get(&name)
    }

    pub fn contains(&self, name: Name) -> bool {
        self.decls.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Callables
// ---------------------------------------------------------------------------

/// Calling convention recorded on the callee declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CallConv {
    /// Platform C convention.
    #[default]
    C,
    /// Explicit 64-bit cdecl (`@cdecl64`).
    Cdecl64,
}

/// A callable declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: Name,
    pub sig: FuncType,
    pub call_conv: CallConv,
}

impl FunctionDecl {
    pub fn new(name: Name, sig: FuncType) -> Self {
        Self {
            name,
            sig,
            call_conv: CallConv::C,
        }
    }

    #[must_use]
    pub fn with_call_conv(mut self, call_conv: CallConv) -> Self {
        self.call_conv = call_conv;
        self
    }
}

/// Callable name → declaration.
#[derive(Clone, Debug, Default)]
pub struct FunctionTable {
    decls: FxHashMap<Name, FunctionDecl>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, decl: FunctionDecl) {
        self.decls.insert(decl.name, decl);
    }

    pub fn get(&self, name: Name) -> Option<&FunctionDecl> {
        self.decls.get(&name)
    }

    pub fn contains(&self, name: Name) -> bool {
        self.decls.contains_key(&name)
    }
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// All declaration tables codegen consults.
///
/// Once the driver stops registering declarations the whole bundle is
/// read-only and may be shared by reference between function passes.
#[derive(Clone, Debug, Default)]
pub struct Registries {
    pub structs: StructTable,
    pub functions: FunctionTable,
    pending: FxHashMap<Name, Type>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` is awaiting specialization to `replacement`.
    pub fn mark_pending(&mut self, name: Name, replacement: Type) {
        self.pending.insert(name, replacement);
    }

    /// Specialization of `name` finished.
    pub fn clear_pending(&mut self, name: Name) -> Option<Type> {
        self.pending.remove(&name)
    }

    /// True if `name` is a generic instantiation still in flight.
    pub fn is_pending(&self, name: Name) -> bool {
        self.pending.contains_key(&name)
    }

    /// The type `name` will be replaced with, if pending.
    pub fn replacement(&self, name: Name) -> Option<&Type> {
        self.pending.get(&name)
    }
}
