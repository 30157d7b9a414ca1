#![forbid(unsafe_code)]

use crate::column::ColumnData;
use std::fmt;
use std::sync::Arc;

/// Logical element type of a [`crate::Column`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
    /// Milliseconds since the Unix epoch.
    TimestampMillis,
    /// Fixed-point decimal stored as `i32`; `value = rep * 10^scale`.
    Decimal32 { scale: i32 },
    /// Fixed-point decimal stored as `i64`; `value = rep * 10^scale`.
    Decimal64 { scale: i32 },
    String,
    /// Integer codes into a child column of unique keys of the given type.
    Dictionary(Box<DataType>),
}

impl DataType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, DataType::Dictionary(_))
    }

    /// The type a reader sees after decoding any dictionary indirection.
    pub fn logical(&self) -> &DataType {
        match self {
            DataType::Dictionary(inner) => inner.logical(),
            other => other,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int8 => f.write_str("int8"),
            DataType::Int16 => f.write_str("int16"),
            DataType::Int32 => f.write_str("int32"),
            DataType::Int64 => f.write_str("int64"),
            DataType::UInt8 => f.write_str("uint8"),
            DataType::UInt16 => f.write_str("uint16"),
            DataType::UInt32 => f.write_str("uint32"),
            DataType::UInt64 => f.write_str("uint64"),
            DataType::Float32 => f.write_str("float32"),
            DataType::Float64 => f.write_str("float64"),
            DataType::Boolean => f.write_str("bool"),
            DataType::TimestampMillis => f.write_str("timestamp[ms]"),
            DataType::Decimal32 { scale } => write!(f, "decimal32(scale={scale})"),
            DataType::Decimal64 { scale } => write!(f, "decimal64(scale={scale})"),
            DataType::String => f.write_str("string"),
            DataType::Dictionary(inner) => write!(f, "dictionary<{inner}>"),
        }
    }
}

/// A single logical element, used for row-wise construction and inspection.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Boolean(bool),
    TimestampMillis(i64),
    Decimal32 { rep: i32, scale: i32 },
    Decimal64 { rep: i64, scale: i32 },
    String(Arc<str>),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn string(value: &str) -> Self {
        ScalarValue::String(Arc::<str>::from(value))
    }
}

/// Plain Rust primitives that map one-to-one onto a fixed-width [`DataType`].
pub trait NativeType: Copy + Default + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    fn into_data(values: Vec<Self>) -> ColumnData;

    fn slice(data: &ColumnData) -> Option<&[Self]>;

    fn into_scalar(self) -> ScalarValue;

    fn from_scalar(value: &ScalarValue) -> Option<Self>;
}

macro_rules! native_type {
    ($ty:ty, $variant:ident) => {
        impl NativeType for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn into_data(values: Vec<Self>) -> ColumnData {
                ColumnData::$variant(values)
            }

            fn slice(data: &ColumnData) -> Option<&[Self]> {
                match data {
                    ColumnData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn into_scalar(self) -> ScalarValue {
                ScalarValue::$variant(self)
            }

            fn from_scalar(value: &ScalarValue) -> Option<Self> {
                match value {
                    ScalarValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

native_type!(i8, Int8);
native_type!(i16, Int16);
native_type!(i32, Int32);
native_type!(i64, Int64);
native_type!(u8, UInt8);
native_type!(u16, UInt16);
native_type!(u32, UInt32);
native_type!(u64, UInt64);
native_type!(f32, Float32);
native_type!(f64, Float64);
