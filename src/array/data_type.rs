//! Data types.
//!
//! Dataset variables and non-time coordinates are stored as `float64`, and the time coordinate is stored as
//! `int64` seconds since the Unix epoch.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ArrayError;

/// A data type.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// `float64` IEEE 754 double-precision floating point.
    #[display("float64")]
    Float64,
    /// `int64` signed integer.
    #[display("int64")]
    Int64,
}

impl DataType {
    /// The size of an element in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        8
    }

    /// The fill value written to new arrays of this data type.
    #[must_use]
    pub fn default_fill_value(&self) -> Value {
        match self {
            Self::Float64 => Value::String("NaN".to_string()),
            Self::Int64 => Value::from(i64::MIN),
        }
    }
}

/// A type that can be stored as the elements of an array.
pub trait Element: Copy + Send + Sync + 'static {
    /// The data type of an array of this element.
    const DATA_TYPE: DataType;

    /// Parse a fill value from array metadata.
    fn from_fill_value_metadata(value: &Value) -> Option<Self>;

    /// Encode elements as little endian bytes.
    fn encode(elements: &[Self]) -> Vec<u8>;

    /// Decode little endian bytes.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidBytesInputSize`] if `bytes` is not a whole number of elements.
    fn decode(bytes: &[u8]) -> Result<Vec<Self>, ArrayError>;
}

macro_rules! impl_element {
    ($type:ty, $data_type:expr, $fill:expr) => {
        impl Element for $type {
            const DATA_TYPE: DataType = $data_type;

            fn from_fill_value_metadata(value: &Value) -> Option<Self> {
                $fill(value)
            }

            fn encode(elements: &[Self]) -> Vec<u8> {
                elements
                    .iter()
                    .flat_map(|element| element.to_le_bytes())
                    .collect()
            }

            fn decode(bytes: &[u8]) -> Result<Vec<Self>, ArrayError> {
                const SIZE: usize = std::mem::size_of::<$type>();
                if bytes.len() % SIZE != 0 {
                    return Err(ArrayError::InvalidBytesInputSize(
                        bytes.len(),
                        (bytes.len() / SIZE * SIZE) as u64,
                    ));
                }
                Ok(bytes
                    .chunks_exact(SIZE)
                    .map(|chunk| {
                        let mut element = [0u8; SIZE];
                        element.copy_from_slice(chunk);
                        <$type>::from_le_bytes(element)
                    })
                    .collect())
            }
        }
    };
}

fn f64_fill_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(string) => match string.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            hex => hex
                .strip_prefix("0x")
                .and_then(|hex| u64::from_str_radix(hex, 16).ok())
                .map(f64::from_bits),
        },
        _ => None,
    }
}

fn i64_fill_value(value: &Value) -> Option<i64> {
    value.as_i64()
}

impl_element!(f64, DataType::Float64, f64_fill_value);
impl_element!(i64, DataType::Int64, i64_fill_value);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_serde() {
        assert_eq!(
            serde_json::to_string(&DataType::Float64).unwrap(),
            r#""float64""#
        );
        assert_eq!(
            serde_json::from_str::<DataType>(r#""int64""#).unwrap(),
            DataType::Int64
        );
        assert!(serde_json::from_str::<DataType>(r#""uint8""#).is_err());
    }

    #[test]
    fn element_fill_values() {
        assert!(f64::from_fill_value_metadata(&Value::from("NaN"))
            .unwrap()
            .is_nan());
        assert_eq!(
            f64::from_fill_value_metadata(&Value::from("0x3ff0000000000000")),
            Some(1.0)
        );
        assert_eq!(f64::from_fill_value_metadata(&Value::from(2)), Some(2.0));
        assert_eq!(
            i64::from_fill_value_metadata(&DataType::Int64.default_fill_value()),
            Some(i64::MIN)
        );
        assert_eq!(i64::from_fill_value_metadata(&Value::from("NaN")), None);
    }

    #[test]
    fn element_bytes() {
        let bytes = i64::encode(&[1, -1]);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..8], &[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(i64::decode(&bytes).unwrap(), vec![1, -1]);
        assert!(f64::decode(&bytes[..7]).is_err());
    }
}
