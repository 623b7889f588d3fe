//! Element types, dtype promotion, and solve precision.
//!
//! `DType` tags the element type of a matrix or vector at runtime so the
//! solve shim can pick a precision without knowing the caller's Rust type.
//! Promotion follows NumPy's `promote_types` for the real types modelled here.

use half::f16;
use std::fmt;

/// Runtime element type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
}

impl DType {
    pub fn is_float(self) -> bool {
        matches!(self, DType::F16 | DType::F32 | DType::F64)
    }

    pub fn is_signed_int(self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32 | DType::I64)
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(self, DType::U8 | DType::U16 | DType::U32 | DType::U64)
    }

    /// Width in bits (booleans count as 8).
    pub fn bits(self) -> u32 {
        match self {
            DType::Bool | DType::I8 | DType::U8 => 8,
            DType::I16 | DType::U16 | DType::F16 => 16,
            DType::I32 | DType::U32 | DType::F32 => 32,
            DType::I64 | DType::U64 | DType::F64 => 64,
        }
    }

    fn signed_of_bits(bits: u32) -> DType {
        match bits {
            0..=8 => DType::I8,
            9..=16 => DType::I16,
            17..=32 => DType::I32,
            _ => DType::I64,
        }
    }

    fn float_of_bits(bits: u32) -> DType {
        match bits {
            0..=16 => DType::F16,
            17..=32 => DType::F32,
            _ => DType::F64,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::F16 => "float16",
            DType::F32 => "float32",
            DType::F64 => "float64",
        };
        f.write_str(name)
    }
}

/// Smallest dtype both operands can be represented in.
///
/// - Floats win over integers, and must be wide enough to hold the
///   integer exactly (8-bit -> f16, 16-bit -> f32, wider -> f64).
/// - Mixing signed and unsigned integers widens to a signed type;
///   `u64` with any signed type has no integer home and becomes `f64`.
/// - Booleans lose to everything.
pub fn promote(lhs: DType, rhs: DType) -> DType {
    use DType::*;

    if lhs == rhs {
        return lhs;
    }
    if lhs == Bool {
        return rhs;
    }
    if rhs == Bool {
        return lhs;
    }

    match (lhs.is_float(), rhs.is_float()) {
        (true, true) => {
            if lhs.bits() >= rhs.bits() {
                lhs
            } else {
                rhs
            }
        }
        (true, false) => float_with_int(lhs, rhs),
        (false, true) => float_with_int(rhs, lhs),
        (false, false) => {
            if lhs.is_signed_int() == rhs.is_signed_int() {
                if lhs.bits() >= rhs.bits() {
                    lhs
                } else {
                    rhs
                }
            } else {
                let (signed, unsigned) = if lhs.is_signed_int() {
                    (lhs, rhs)
                } else {
                    (rhs, lhs)
                };
                if unsigned == U64 {
                    F64
                } else if signed.bits() > unsigned.bits() {
                    signed
                } else {
                    DType::signed_of_bits(unsigned.bits() * 2)
                }
            }
        }
    }
}

fn float_with_int(float: DType, int: DType) -> DType {
    let needed = DType::float_of_bits(int.bits() * 2);
    if float.bits() >= needed.bits() {
        float
    } else {
        needed
    }
}

/// Precision of a native solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    /// Pick the solve precision for a matrix of element type `dtype`.
    ///
    /// `f32` and `f64` are used as-is; anything else is promoted together
    /// with `f32`, so integer and half-precision inputs are solved in at
    /// least single precision.
    pub fn for_dtype(dtype: DType) -> Precision {
        let solved = match dtype {
            DType::F32 | DType::F64 => dtype,
            other => promote(other, DType::F32),
        };
        match solved {
            DType::F64 => Precision::Double,
            _ => Precision::Single,
        }
    }

    /// Machine epsilon of the working precision.
    pub fn epsilon(self) -> f64 {
        match self {
            Precision::Single => f32::EPSILON as f64,
            Precision::Double => f64::EPSILON,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Single => f.write_str("single"),
            Precision::Double => f.write_str("double"),
        }
    }
}

/// Rust types that can be elements of a matrix or vector.
pub trait Element: Copy + Send + Sync + fmt::Debug + 'static {
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    fn is_zero(self) -> bool;
}

macro_rules! impl_element_int {
    ($($t:ty => $dt:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$dt;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn is_zero(self) -> bool {
                    self == 0
                }
            }
        )*
    };
}

impl_element_int!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    #[inline]
    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    #[inline]
    fn is_zero(self) -> bool {
        !self
    }
}

impl Element for f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    #[inline]
    fn is_zero(self) -> bool {
        f16::to_f32(self) == 0.0
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn is_zero(self) -> bool {
        self == 0.0
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn is_zero(self) -> bool {
        self == 0.0
    }
}
