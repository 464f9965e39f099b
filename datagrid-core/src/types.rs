//! Column types and runtime values.

use uuid::Uuid;

use crate::error::{GridError, Result};

/// The closed set of column types supported by the grid.
///
/// Wire tags are fixed by the protocol and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Boolean.
    Boolean,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit IEEE-754 float.
    Float,
    /// 64-bit IEEE-754 float.
    Double,
    /// Fixed-scale decimal; the scale lives in the column definition.
    Decimal,
    /// Date as days since the Unix epoch.
    Date,
    /// Time of day in nanoseconds since midnight.
    Time,
    /// Local date-time in milliseconds since the Unix epoch.
    Datetime,
    /// Point-in-time in microseconds since the Unix epoch.
    Timestamp,
    /// UUID.
    Uuid,
    /// Bit mask, stored as raw bytes.
    Bitmask,
    /// UTF-8 string.
    String,
    /// Raw byte array.
    Bytes,
    /// Calendar period of years, months and days.
    Period,
    /// Duration of seconds and nanoseconds.
    Duration,
    /// Fixed-point integral number.
    Number,
}

impl ColumnType {
    /// Returns the wire tag for this type.
    pub fn tag(self) -> i8 {
        match self {
            ColumnType::Boolean => 1,
            ColumnType::Int8 => 2,
            ColumnType::Int16 => 3,
            ColumnType::Int32 => 4,
            ColumnType::Int64 => 5,
            ColumnType::Float => 6,
            ColumnType::Double => 7,
            ColumnType::Decimal => 8,
            ColumnType::Date => 9,
            ColumnType::Time => 10,
            ColumnType::Datetime => 11,
            ColumnType::Timestamp => 12,
            ColumnType::Uuid => 13,
            ColumnType::Bitmask => 14,
            ColumnType::String => 15,
            ColumnType::Bytes => 16,
            ColumnType::Period => 17,
            ColumnType::Duration => 18,
            ColumnType::Number => 19,
        }
    }

    /// Resolves a wire tag back into a column type.
    pub fn from_tag(tag: i8) -> Result<Self> {
        Ok(match tag {
            1 => ColumnType::Boolean,
            2 => ColumnType::Int8,
            3 => ColumnType::Int16,
            4 => ColumnType::Int32,
            5 => ColumnType::Int64,
            6 => ColumnType::Float,
            7 => ColumnType::Double,
            8 => ColumnType::Decimal,
            9 => ColumnType::Date,
            10 => ColumnType::Time,
            11 => ColumnType::Datetime,
            12 => ColumnType::Timestamp,
            13 => ColumnType::Uuid,
            14 => ColumnType::Bitmask,
            15 => ColumnType::String,
            16 => ColumnType::Bytes,
            17 => ColumnType::Period,
            18 => ColumnType::Duration,
            19 => ColumnType::Number,
            _ => {
                return Err(GridError::Format(format!(
                    "unknown column type tag: {}",
                    tag
                )))
            }
        })
    }
}

/// A runtime value for a single column.
///
/// `Null` is an explicit SQL null and is distinct from a column being absent
/// from a partial tuple; absence is tracked by the tuple container and the
/// binary codec, not by a `Value` variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// 8-bit integer value.
    Int8(i8),
    /// 16-bit integer value.
    Int16(i16),
    /// 32-bit integer value.
    Int32(i32),
    /// 64-bit integer value.
    Int64(i64),
    /// 32-bit float value.
    Float(f32),
    /// 64-bit float value.
    Double(f64),
    /// Decimal value as an unscaled integer; must carry the column's scale.
    Decimal {
        /// Unscaled value.
        unscaled: i128,
        /// Decimal scale.
        scale: i16,
    },
    /// Days since the Unix epoch.
    Date(i32),
    /// Nanoseconds since midnight.
    Time(i64),
    /// Milliseconds since the Unix epoch, local.
    Datetime(i64),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    /// UUID value.
    Uuid(Uuid),
    /// Bit mask bytes.
    Bitmask(Vec<u8>),
    /// UTF-8 string value.
    String(String),
    /// Raw bytes value.
    Bytes(Vec<u8>),
    /// Calendar period.
    Period {
        /// Years component.
        years: i32,
        /// Months component.
        months: i32,
        /// Days component.
        days: i32,
    },
    /// Time duration.
    Duration {
        /// Whole seconds.
        seconds: i64,
        /// Nanosecond adjustment.
        nanos: i32,
    },
    /// Fixed-point integral number.
    Number(i128),
}

impl Value {
    /// Returns true if this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Checks whether this value can be stored in a column of the given type
    /// and scale.
    ///
    /// There is no numeric widening: an `Int32` value does not match an
    /// `Int64` column. `Null` matches every type; nullability is enforced by
    /// the schema, not here. A `Decimal` only matches when its scale equals
    /// the column's scale.
    pub fn matches(&self, column_type: ColumnType, scale: i32) -> bool {
        match (self, column_type) {
            (Value::Null, _) => true,
            (Value::Boolean(_), ColumnType::Boolean) => true,
            (Value::Int8(_), ColumnType::Int8) => true,
            (Value::Int16(_), ColumnType::Int16) => true,
            (Value::Int32(_), ColumnType::Int32) => true,
            (Value::Int64(_), ColumnType::Int64) => true,
            (Value::Float(_), ColumnType::Float) => true,
            (Value::Double(_), ColumnType::Double) => true,
            (Value::Decimal { scale: s, .. }, ColumnType::Decimal) => i32::from(*s) == scale,
            (Value::Date(_), ColumnType::Date) => true,
            (Value::Time(_), ColumnType::Time) => true,
            (Value::Datetime(_), ColumnType::Datetime) => true,
            (Value::Timestamp(_), ColumnType::Timestamp) => true,
            (Value::Uuid(_), ColumnType::Uuid) => true,
            (Value::Bitmask(_), ColumnType::Bitmask) => true,
            (Value::String(_), ColumnType::String) => true,
            (Value::Bytes(_), ColumnType::Bytes) => true,
            (Value::Period { .. }, ColumnType::Period) => true,
            (Value::Duration { .. }, ColumnType::Duration) => true,
            (Value::Number(_), ColumnType::Number) => true,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip_for_all_types() {
        let all = [
            ColumnType::Boolean,
            ColumnType::Int8,
            ColumnType::Int16,
            ColumnType::Int32,
            ColumnType::Int64,
            ColumnType::Float,
            ColumnType::Double,
            ColumnType::Decimal,
            ColumnType::Date,
            ColumnType::Time,
            ColumnType::Datetime,
            ColumnType::Timestamp,
            ColumnType::Uuid,
            ColumnType::Bitmask,
            ColumnType::String,
            ColumnType::Bytes,
            ColumnType::Period,
            ColumnType::Duration,
            ColumnType::Number,
        ];

        for ty in all {
            assert_eq!(ColumnType::from_tag(ty.tag()).unwrap(), ty);
        }
    }

    #[test]
    fn test_unknown_tag_fails() {
        assert!(ColumnType::from_tag(0).is_err());
        assert!(ColumnType::from_tag(99).is_err());
        assert!(ColumnType::from_tag(-1).is_err());
    }

    #[test]
    fn test_no_numeric_widening() {
        assert!(!Value::Int32(5).matches(ColumnType::Int64, 0));
        assert!(!Value::Int64(5).matches(ColumnType::Int32, 0));
        assert!(!Value::Float(1.0).matches(ColumnType::Double, 0));
        assert!(!Value::Int8(1).matches(ColumnType::Int16, 0));
    }

    #[test]
    fn test_null_matches_any_type() {
        assert!(Value::Null.matches(ColumnType::Int64, 0));
        assert!(Value::Null.matches(ColumnType::String, 0));
        assert!(Value::Null.matches(ColumnType::Decimal, 3));
    }

    #[test]
    fn test_decimal_scale_must_match() {
        let v = Value::Decimal {
            unscaled: 12345,
            scale: 2,
        };
        assert!(v.matches(ColumnType::Decimal, 2));
        assert!(!v.matches(ColumnType::Decimal, 3));
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(42i64), Value::Int64(42));
        assert_eq!(Value::from("abc"), Value::String("abc".to_string()));
        assert_eq!(Value::from(true), Value::Boolean(true));
    }
}
