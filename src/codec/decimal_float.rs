use std::fmt;

/// Fixed-point decimal used for FIX price fields.
///
/// The numeric value is `value * 10^-scale`. `{ value: 12345, scale: 2 }`
/// renders as `123.45`.
#[derive(Clone, Copy, Debug, Default)]
#[derive(PartialEq, Eq)]
pub struct DecimalFloat {
    value: i64,
    scale: i32,
}

impl DecimalFloat {
    pub const ZERO: DecimalFloat = DecimalFloat { value: 0, scale: 0 };

    pub fn new(value: i64, scale: i32) -> Self {
        Self { value, scale }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn scale(&self) -> i32 {
        self.scale
    }

    pub fn set(&mut self, value: i64, scale: i32) {
        self.value = value;
        self.scale = scale;
    }

    /// Canonical form: no trailing zeros in the fraction, zero has scale 0.
    ///
    /// `{ 1200, 3 }` normalises to `{ 12, 1 }`.
    pub fn normalise(mut self) -> Self {
        if self.value == 0 {
            self.scale = 0;
            return self;
        }
        while self.scale > 0 && self.value % 10 == 0 {
            self.value /= 10;
            self.scale -= 1;
        }
        self
    }
}

impl fmt::Display for DecimalFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale <= 0 {
            return write!(f, "{}", self.value);
        }

        let digits = self.value.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let sign = if self.value < 0 { "-" } else { "" };
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int_part}.{frac_part}")
        } else {
            write!(f, "{sign}0.{digits:0>scale$}")
        }
    }
}
