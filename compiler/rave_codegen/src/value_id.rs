//! Opaque ID newtypes for the instruction builder.
//!
//! All backend values, blocks, and functions live in a [`Module`](crate::emit::Module)
//! and are referenced by `Copy` handles. Each ID is a `u32` index into the
//! corresponding arena `Vec`. A `NONE` sentinel (`u32::MAX`) marks an
//! absent value (e.g. the result of a `void` expression).

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

/// Opaque handle to a value (constant, parameter, or instruction result).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u32);

/// Opaque handle to a basic block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

/// Opaque handle to a function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u32);

macro_rules! id_impl {
    ($ty:ident, $what:literal) => {
        impl $ty {
            #[doc = concat!("Sentinel for \"no ", $what, "\".")]
            pub const NONE: Self = Self(u32::MAX);

            /// True if this is the `NONE` sentinel.
            #[inline]
            pub fn is_none(self) -> bool {
                self.0 == u32::MAX
            }

            /// The raw index.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }

            /// Index as `usize` for arena access.
            #[inline]
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }

            /// Build from an arena length.
            #[inline]
            pub(crate) fn from_len(len: usize) -> Self {
                debug_assert!(len < u32::MAX as usize, "{} arena overflow", $what);
                #[allow(clippy::cast_possible_truncation)]
                Self(len as u32)
            }
        }
    };
}

id_impl!(ValueId, "value");
id_impl!(BlockId, "block");
id_impl!(FunctionId, "function");
