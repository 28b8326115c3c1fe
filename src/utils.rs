use crate::error::Error;
use hex::FromHexError;
use serde_json::{Map, Number, Value};
use std::convert::TryFrom;
use tracing::debug;

/// Decodes `hex` into exactly `out_len` bytes.
pub fn hex_to_bytes(hex: &str, out_len: usize) -> Result<Vec<u8>, FromHexError> {
    if hex.len() != out_len * 2 {
        return Err(FromHexError::InvalidStringLength);
    }
    hex::decode(hex)
}

/// Decodes `hex` into a fixed-size buffer.
pub fn hex_to_array<const N: usize>(hex: &str) -> Result<[u8; N], FromHexError> {
    let mut out = [0_u8; N];
    hex::decode_to_slice(hex, &mut out)?;
    Ok(out)
}

/// Reverses the byte order of a buffer in place.
///
/// Hashes and `bits` travel as big-endian hex but are assembled little-endian, so every such
/// field is flipped once at decode time and once more if it is emitted again.
pub fn flip(data: &mut [u8]) {
    data.reverse();
}

/// Hex of `data` with its byte order reversed.
pub fn flipped_hex(data: &[u8]) -> String {
    let mut data = data.to_vec();
    flip(&mut data);
    hex::encode(data)
}

/// `n` as a `T`, provided the conversion is exact.
///
/// JSON has a single number type, so an integer field may arrive as `5`, `5.0` or `5.5`; only
/// the first two are accepted, and only when the value fits `T`.
pub fn exact_integer<T>(n: &Number) -> Option<T>
where
    T: TryFrom<u64> + TryFrom<i64>,
{
    if let Some(u) = n.as_u64() {
        return <T as TryFrom<u64>>::try_from(u).ok();
    }
    if let Some(i) = n.as_i64() {
        return <T as TryFrom<i64>>::try_from(i).ok();
    }
    let f = n.as_f64()?;
    if !f.is_finite() || f.fract() != 0.0 {
        return None;
    }
    // 2^64 and -2^63 are exact in f64, the casts below cannot saturate inside these bounds
    if (0.0..18_446_744_073_709_551_616.0).contains(&f) {
        <T as TryFrom<u64>>::try_from(f as u64).ok()
    } else if (-9_223_372_036_854_775_808.0..0.0).contains(&f) {
        <T as TryFrom<i64>>::try_from(f as i64).ok()
    } else {
        None
    }
}

/// Why a single member could not be read as the requested type.
#[derive(Debug)]
pub enum FieldError {
    WrongType,
    InvalidNumber,
    Hex(FromHexError),
}

impl FieldError {
    fn into_error(self, field: &'static str) -> Error {
        match self {
            FieldError::WrongType => Error::WrongType(field),
            FieldError::InvalidNumber => Error::InvalidNumber(field),
            FieldError::Hex(error) => Error::BadHex { field, error },
        }
    }
}

/// A type a JSON object member can be read into.
pub trait FieldValue: Sized {
    fn from_value(value: &Value) -> Result<Self, FieldError>;
}

macro_rules! integer_field {
    ($($t:ty),*) => {
        $(
            impl FieldValue for $t {
                fn from_value(value: &Value) -> Result<Self, FieldError> {
                    match value {
                        Value::Number(n) => exact_integer(n).ok_or(FieldError::InvalidNumber),
                        _ => Err(FieldError::WrongType),
                    }
                }
            }
        )*
    };
}

integer_field!(u16, i16, u32, i32, u64, i64);

impl FieldValue for String {
    fn from_value(value: &Value) -> Result<Self, FieldError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or(FieldError::WrongType)
    }
}

impl FieldValue for bool {
    fn from_value(value: &Value) -> Result<Self, FieldError> {
        value.as_bool().ok_or(FieldError::WrongType)
    }
}

impl<const N: usize> FieldValue for [u8; N] {
    fn from_value(value: &Value) -> Result<Self, FieldError> {
        let s = value.as_str().ok_or(FieldError::WrongType)?;
        hex_to_array(s).map_err(FieldError::Hex)
    }
}

/// Reads a member that must be present and valid. Any failure aborts the caller.
pub fn require_field<T: FieldValue>(
    obj: &Map<String, Value>,
    key: &'static str,
) -> Result<T, Error> {
    let value = obj.get(key).ok_or(Error::MissingField(key))?;
    T::from_value(value).map_err(|e| e.into_error(key))
}

/// Reads a member that may be absent. A member that is present but unusable is treated as
/// absent.
pub fn optional_field<T: FieldValue>(obj: &Map<String, Value>, key: &'static str) -> Option<T> {
    let value = obj.get(key)?;
    match T::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Ignoring optional field `{}`: {:?} ({})", key, e, value);
            None
        }
    }
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn flip_is_its_own_inverse(bytes: Vec<u8>) -> bool {
    let mut flipped = bytes.clone();
    flip(&mut flipped);
    flip(&mut flipped);
    flipped == bytes
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn flipped_hex_restores_wire_order(bytes: Vec<u8>) -> bool {
    let wire = hex::encode(&bytes);
    let mut decoded = hex_to_bytes(&wire, bytes.len()).unwrap();
    flip(&mut decoded);
    flipped_hex(&decoded) == wire
}
