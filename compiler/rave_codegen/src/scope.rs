//! Scope management for lowering.
//!
//! `Scope` uses `im::HashMap` for O(1) structural-sharing clone, making
//! child scope creation essentially free. Every binding is addressable:
//! it names the storage a variable lives in plus the variable's type.
//!
//! Re-binding a name shadows the previous binding; `remove` pops the
//! innermost binding and uncovers the shadowed one.

use im::HashMap;
use rave_ir::{Name, Type};
use smallvec::SmallVec;

use crate::value_id::ValueId;

// ---------------------------------------------------------------------------
// ScopeBinding
// ---------------------------------------------------------------------------

/// Storage for one variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeBinding {
    /// Pointer to the variable's slot (stack, global, or by-value copy).
    pub ptr: ValueId,
    /// Type of the stored value.
    pub ty: Type,
}

type Shadowed = SmallVec<[ScopeBinding; 1]>;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct Scope {
    bindings: HashMap<Name, Shadowed>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Child scope inheriting all bindings; mutations stay local to it.
    #[must_use]
    pub fn child(&self) -> Self {
        self.clone()
    }

    pub fn bind(&mut self, name: Name, ptr: ValueId, ty: Type) {
        self.bindings
            .entry(name)
            .or_default()
            .push(ScopeBinding { ptr, ty });
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: Name) -> Option<&ScopeBinding> {
        self.bindings.get(&name).and_then(|stack| stack.last())
    }

    pub fn contains(&self, name: Name) -> bool {
        self.lookup(name).is_some()
    }

    /// Drop the innermost binding of `name`.
    pub fn remove(&mut self, name: Name) -> Option<ScopeBinding> {
        let stack = self.bindings.get_mut(&name)?;
        let removed = stack.pop();
        if stack.is_empty() {
            self.bindings.remove(&name);
        }
        removed
    }

    /// Number of distinct names visible.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
