//! Element slots.
//!
//! Every slot of a backing store is an atomic cell. Two threads racing on
//! the same index is the caller's problem (last write wins), but it is never
//! a data race in the language sense, and a growth copy can read slots while
//! appenders in shared mode are still filling others.

use core::fmt;
use core::sync::atomic::Ordering;

/// Value type storable in a [`ConcurrentArray`](crate::ConcurrentArray).
///
/// Implemented for every primitive integer, `bool`, `f32` and `f64`.
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Atomic cell holding one element.
    type Atom: Send + Sync;

    /// Create a cell holding `value`.
    fn new_atom(value: Self) -> Self::Atom;

    /// Read the cell.
    fn load(atom: &Self::Atom) -> Self;

    /// Overwrite the cell.
    fn store(atom: &Self::Atom, value: Self);
}

macro_rules! impl_element {
    ($($ty:ty => $atom:ty),* $(,)?) => {
        $(
            impl Element for $ty {
                type Atom = $atom;

                #[inline]
                fn new_atom(value: Self) -> Self::Atom {
                    <$atom>::new(value)
                }

                #[inline]
                fn load(atom: &Self::Atom) -> Self {
                    atom.load(Ordering::Acquire)
                }

                #[inline]
                fn store(atom: &Self::Atom, value: Self) {
                    atom.store(value, Ordering::Release)
                }
            }
        )*
    };
}

impl_element! {
    bool => core::sync::atomic::AtomicBool,
    i8 => core::sync::atomic::AtomicI8,
    u8 => core::sync::atomic::AtomicU8,
    i16 => core::sync::atomic::AtomicI16,
    u16 => core::sync::atomic::AtomicU16,
    i32 => core::sync::atomic::AtomicI32,
    u32 => core::sync::atomic::AtomicU32,
    i64 => portable_atomic::AtomicI64,
    u64 => portable_atomic::AtomicU64,
    i128 => portable_atomic::AtomicI128,
    u128 => portable_atomic::AtomicU128,
    isize => core::sync::atomic::AtomicIsize,
    usize => core::sync::atomic::AtomicUsize,
    f32 => portable_atomic::AtomicF32,
    f64 => portable_atomic::AtomicF64,
}
