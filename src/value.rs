//! Typed channel values and their 16-bit wire representation.
//!
//! Every OIS channel declares a [`NumericType`]; its current [`Value`] is
//! transported as a 16-bit raw word:
//!
//! - `Boolean` → 0 or 1.
//! - `Number` → the integer clamped to [−32768, 32767], two's complement.
//! - `Fraction` → `round(value × 100)` clamped to the same range, i.e. the
//!   raw word carries signed hundredths. The ×100 scaling exists only on
//!   this side of the wire.
//!
//! Decoding reinterprets the raw word as `i16` before widening — a raw
//! `0xEF98` is −4200, never 61336.

/// Declared type of a numeric channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericType {
    Boolean,
    Number,
    Fraction,
}

/// Current value of a numeric channel, interpreted per [`NumericType`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Boolean(bool),
    Number(i32),
    Fraction(f32),
}

impl Value {
    /// The zero value for a channel type (every declared channel starts here).
    pub fn zero(ty: NumericType) -> Self {
        match ty {
            NumericType::Boolean => Value::Boolean(false),
            NumericType::Number => Value::Number(0),
            NumericType::Fraction => Value::Fraction(0.0),
        }
    }

    /// Encode to the 16-bit raw wire word under the channel's declared type.
    ///
    /// A value of a different variant than `ty` is converted through its
    /// natural numeric reading first (`true` = 1, fractions truncate), so a
    /// mismatched [`Value`] never panics.
    pub fn to_raw(&self, ty: NumericType) -> u16 {
        match ty {
            NumericType::Boolean => {
                if self.truthy() {
                    1
                } else {
                    0
                }
            }
            NumericType::Number => self.as_i32().clamp(-32768, 32767) as i16 as u16,
            NumericType::Fraction => {
                let hundredths = (self.as_f32() * 100.0).round() as i64;
                hundredths.clamp(-32768, 32767) as i16 as u16
            }
        }
    }

    /// Decode a 16-bit raw wire word into a value of the declared type.
    pub fn from_raw(ty: NumericType, raw: u16) -> Self {
        match ty {
            NumericType::Boolean => Value::Boolean(raw != 0),
            NumericType::Number => Value::Number(raw as i16 as i32),
            NumericType::Fraction => Value::Fraction(raw as i16 as f32 / 100.0),
        }
    }

    fn truthy(&self) -> bool {
        match *self {
            Value::Boolean(b) => b,
            Value::Number(n) => n != 0,
            Value::Fraction(f) => f != 0.0,
        }
    }

    fn as_i32(&self) -> i32 {
        match *self {
            Value::Boolean(b) => b as i32,
            Value::Number(n) => n,
            Value::Fraction(f) => f as i32,
        }
    }

    fn as_f32(&self) -> f32 {
        match *self {
            Value::Boolean(b) => b as i32 as f32,
            Value::Number(n) => n as f32,
            Value::Fraction(f) => f,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Fraction(fraction) => write!(f, "{fraction:.2}"),
        }
    }
}
