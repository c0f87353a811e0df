//! Opaque ID newtypes for backend entities.
//!
//! These IDs keep inkwell's `'ctx` lifetime out of callers' data. Every
//! ID is a `u32` index: types into the module's
//! [`TypeTable`](crate::TypeTable), everything else into the arenas of
//! the [`Module`](crate::Module). IDs are `Copy` and never outlive the
//! module that produced them.

macro_rules! define_id {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => { $(
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an ID from a raw index.
            #[inline]
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[expect(
                clippy::cast_possible_truncation,
                reason = "tables never exceed u32::MAX entries"
            )]
            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }
    )* };
}

define_id! {
    /// Interned type handle.
    TypeId,
    /// Value handle (arguments, constants, instruction results).
    ValueId,
    /// Basic block handle.
    BlockId,
    /// Function handle within a module.
    FuncId,
    /// Global variable handle within a module.
    GlobalId,
}
