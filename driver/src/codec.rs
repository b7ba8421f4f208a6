//! # Canonical Codec
//!
//! Deterministic JSON used wherever a value is hashed or signed.
//!
//! The rules match the server's `json.dumps(sort_keys=True,
//! separators=(",", ":"), ensure_ascii=False)`:
//!
//! - object keys sorted at every depth,
//! - no insignificant whitespace,
//! - non-ASCII text written as raw UTF-8,
//! - control characters escaped as JSON requires,
//! - floats in Python's `repr` form (`1e-07`, `1e+20`, `0.0001`).
//!
//! Keys are sorted here explicitly instead of relying on `serde_json::Map`
//! ordering, so the output does not change if some crate in the build
//! graph turns on `serde_json/preserve_order`.

use std::fmt;

use serde::ser::{self, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::crypto::hash::sha3_256_hex;

/// The value could not be turned into canonical JSON.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// A float was NaN or infinite. JSON cannot represent it and silently
    /// writing `null` would change the hash.
    #[error("non-finite number {0} cannot be serialized")]
    NonFiniteNumber(String),

    /// serde could not map the value onto JSON (e.g. a map with non-string keys).
    #[error("value cannot be represented as JSON: {0}")]
    Unrepresentable(String),

    /// JSON was structurally fine but did not have the expected shape.
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

impl SerializationError {
    pub(crate) fn malformed(what: &'static str, reason: impl ToString) -> Self {
        Self::Malformed {
            what,
            reason: reason.to_string(),
        }
    }
}

/// Canonical rendering of any serializable value.
///
/// ```
/// use resdb_driver::codec::serialize;
/// use serde_json::json;
///
/// let s = serialize(&json!({"b": 1, "a": {"d": "é", "c": [true, null]}})).unwrap();
/// assert_eq!(s, r#"{"a":{"c":[true,null],"d":"é"},"b":1}"#);
/// ```
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<String, SerializationError> {
    value.serialize(FiniteCheck)?;
    let value =
        serde_json::to_value(value).map_err(|e| SerializationError::Unrepresentable(e.to_string()))?;
    Ok(serialize_value(&value))
}

/// Canonical rendering of an already-built JSON value. Infallible: a
/// `serde_json::Value` cannot hold anything JSON cannot express.
pub fn serialize_value(value: &Value) -> String {
    let mut out = String::with_capacity(256);
    write_value(&mut out, value);
    out
}

/// SHA3-256 of `bytes` as lower-case hex.
pub fn hash(bytes: &[u8]) -> String {
    sha3_256_hex(bytes)
}

/// Convert a float into a JSON number, refusing NaN and infinities.
///
/// Use this when building asset or metadata payloads from floating point
/// data; `serde_json` would otherwise turn them into `null`.
pub fn finite_number(value: f64) -> Result<Value, SerializationError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| SerializationError::NonFiniteNumber(value.to_string()))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) if n.is_f64() => write_float(out, &n.to_string()),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

/// Rewrite a shortest round-trip float rendering (`1e-7`, `1.5e20`,
/// `0.00001`) the way Python's `repr` prints the same digits: positional
/// when the decimal point lands in `-4 < point <= 16`, otherwise
/// `d.ddde±XX` with at least two exponent digits.
fn write_float(out: &mut String, text: &str) {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (mantissa, exponent) = match unsigned.split_once(|c: char| c == 'e' || c == 'E') {
        Some((m, e)) => match e.parse::<i32>() {
            Ok(e) => (m, e),
            Err(_) => return out.push_str(text),
        },
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let all: String = format!("{}{}", int_part, frac_part);
    let leading = all.bytes().take_while(|b| *b == b'0').count();
    let digits = all[leading..].trim_end_matches('0');
    let point = int_part.len() as i32 - leading as i32 + exponent;

    if negative {
        out.push('-');
    }
    if digits.is_empty() {
        out.push_str("0.0");
        return;
    }
    let len = digits.len() as i32;
    if -4 < point && point <= 16 {
        if point <= 0 {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take((-point) as usize));
            out.push_str(digits);
        } else if point >= len {
            out.push_str(digits);
            out.extend(std::iter::repeat('0').take((point - len) as usize));
            out.push_str(".0");
        } else {
            out.push_str(&digits[..point as usize]);
            out.push('.');
            out.push_str(&digits[point as usize..]);
        }
    } else {
        out.push_str(&digits[..1]);
        if len > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let exp = point - 1;
        out.push_str(&format!("e{}{:02}", if exp < 0 { '-' } else { '+' }, exp.abs()));
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

// ---------------------------------------------------------------------------
// Non-finite float guard
// ---------------------------------------------------------------------------

impl ser::Error for SerializationError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Unrepresentable(msg.to_string())
    }
}

/// Walks a value without producing output and fails on NaN or infinity,
/// which `serde_json` would otherwise write as `null`.
struct FiniteCheck;

impl FiniteCheck {
    fn float(value: f64) -> Result<(), SerializationError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(SerializationError::NonFiniteNumber(value.to_string()))
        }
    }
}

type Checked = Result<(), SerializationError>;

impl ser::Serializer for FiniteCheck {
    type Ok = ();
    type Error = SerializationError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_f32(self, v: f32) -> Checked {
        Self::float(f64::from(v))
    }
    fn serialize_f64(self, v: f64) -> Checked {
        Self::float(v)
    }

    fn serialize_bool(self, _: bool) -> Checked {
        Ok(())
    }
    fn serialize_i8(self, _: i8) -> Checked {
        Ok(())
    }
    fn serialize_i16(self, _: i16) -> Checked {
        Ok(())
    }
    fn serialize_i32(self, _: i32) -> Checked {
        Ok(())
    }
    fn serialize_i64(self, _: i64) -> Checked {
        Ok(())
    }
    fn serialize_i128(self, _: i128) -> Checked {
        Ok(())
    }
    fn serialize_u8(self, _: u8) -> Checked {
        Ok(())
    }
    fn serialize_u16(self, _: u16) -> Checked {
        Ok(())
    }
    fn serialize_u32(self, _: u32) -> Checked {
        Ok(())
    }
    fn serialize_u64(self, _: u64) -> Checked {
        Ok(())
    }
    fn serialize_u128(self, _: u128) -> Checked {
        Ok(())
    }
    fn serialize_char(self, _: char) -> Checked {
        Ok(())
    }
    fn serialize_str(self, _: &str) -> Checked {
        Ok(())
    }
    fn serialize_bytes(self, _: &[u8]) -> Checked {
        Ok(())
    }
    fn serialize_none(self) -> Checked {
        Ok(())
    }
    fn serialize_unit(self) -> Checked {
        Ok(())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Checked {
        Ok(())
    }
    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Checked {
        value.serialize(self)
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _: &'static str, value: &T) -> Checked {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, SerializationError> {
        Ok(self)
    }
    fn serialize_tuple(self, _: usize) -> Result<Self, SerializationError> {
        Ok(self)
    }
    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, SerializationError> {
        Ok(self)
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, SerializationError> {
        Ok(self)
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self, SerializationError> {
        Ok(self)
    }
    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, SerializationError> {
        Ok(self)
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, SerializationError> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = SerializationError;
    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = SerializationError;
    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = SerializationError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = SerializationError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = SerializationError;
    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Checked {
        key.serialize(FiniteCheck)
    }
    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = SerializationError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Checked {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = SerializationError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Checked {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Checked {
        Ok(())
    }
}
