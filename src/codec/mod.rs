//! Zero-copy ASCII codec for FIX tag values.
//!
//! All operations are O(length), allocation-free and operate in place over a
//! caller-supplied byte window. [`AsciiSlice`] exposes the read side,
//! [`AsciiSliceMut`] the write side. Decimal prices travel as
//! [`DecimalFloat`], a fixed-point `{ value, scale }` pair.

mod ascii;
mod decimal_float;

#[cfg(test)] mod decimal_float_test;

pub use ascii::AsciiSlice;
pub use ascii::AsciiSliceMut;
pub use ascii::LONGEST_FLOAT_LENGTH;
pub use ascii::LONGEST_INT_LENGTH;
pub use ascii::LONGEST_LONG_LENGTH;
pub use ascii::SEPARATOR;
pub use decimal_float::DecimalFloat;
