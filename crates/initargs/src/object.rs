use std::fmt::{self, Write};

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::serializable::Reduced;

/// A Python value passed as a constructor argument, declared as a default, or stored as state.
///
/// This is an owned value type: it can be freely cloned, compared, and serialized, and it
/// needs no runtime to operate on. Capturing objects store their init arguments as `Object`s
/// so that replaying `T(*args, **kwargs)` works for any type without knowing its field types.
///
/// # Equality
///
/// There are two notions of equality:
/// - `PartialEq` is structural Rust equality. Variants never compare equal across types,
///   floats compare by bit pattern so `Eq` holds. Used by tests and map keys.
/// - [`Object::py_eq`] is Python's `==`. `True == 1 == 1.0`, `NaN != NaN`, sets ignore
///   order. Used when deciding whether a captured value equals its declared default.
///
/// # JSON Serialization
///
/// The derived serde impls use the externally tagged format (`{"Int": 42}`), which is what
/// binary payloads carry. [`Object::to_json_value`] produces a natural, output-only rendering:
/// - `None` → `null`, `Bool` → bool, `Int`/`Float` → number, `String` → string
/// - `List` → array, `Dict` → object (keys via repr unless already strings)
/// - `BigInt` → `{"$bigint": "..."}`, `Bytes` → `{"$bytes": [...]}`
/// - `Tuple` → `{"$tuple": [...]}`, `Set` → `{"$set": [...]}`
/// - `Instance` → `{"$instance": {"type": "...", "args": [...], "kwargs": {...}, "state": {...}}}`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Object {
    /// Python's `None` singleton.
    #[serde(alias = "none", alias = "NoneType")]
    None,
    /// Python boolean (`True` or `False`).
    #[serde(alias = "bool")]
    Bool(bool),
    /// Python integer (64-bit signed).
    #[serde(alias = "int")]
    Int(i64),
    /// Python arbitrary-precision integer (larger than i64).
    BigInt(BigInt),
    /// Python float (64-bit IEEE 754).
    #[serde(alias = "float")]
    Float(f64),
    /// Python string (UTF-8).
    #[serde(alias = "str")]
    String(String),
    /// Python bytes object.
    #[serde(alias = "bytes")]
    Bytes(Vec<u8>),
    /// Python list (mutable sequence).
    #[serde(alias = "list")]
    List(Vec<Self>),
    /// Python tuple (immutable sequence).
    #[serde(alias = "tuple")]
    Tuple(Vec<Self>),
    /// Python dictionary (insertion-ordered mapping).
    #[serde(alias = "dict")]
    Dict(DictPairs),
    /// Python set. Stored in insertion order, compared order-insensitively by `py_eq`.
    #[serde(alias = "set")]
    Set(Vec<Self>),
    /// A nested capturing object, held in its reduced (constructor-replay) form.
    Instance(Box<Reduced>),
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            _ => self.repr_fmt(f),
        }
    }
}

impl Object {
    /// Creates a new `Object::Dict` from something that can be converted into `DictPairs`.
    pub fn dict(dict: impl Into<DictPairs>) -> Self {
        Self::Dict(dict.into())
    }

    /// Creates an `Object::Tuple` from any iterator of values convertible to `Object`.
    pub fn tuple<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Self>,
    {
        Self::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Creates an `Object::List` from any iterator of values convertible to `Object`.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Returns the items of a sequence value (`list`, `tuple`, or `set`), or `None` for other variants.
    ///
    /// Used wherever a value is unpacked like `*iterable`.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) | Self::Tuple(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Python `==`.
    ///
    /// Numbers compare across `bool`/`int`/`float`, containers compare element-wise with
    /// `py_eq`, dicts and sets compare regardless of order. A list never equals a tuple.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.py_eq(&b);
        }
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Tuple(a), Self::Tuple(b)) => seq_py_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(ak, av)| {
                        b.iter()
                            .find(|(bk, _)| ak.py_eq(bk))
                            .is_some_and(|(_, bv)| av.py_eq(bv))
                    })
            }
            (Self::Set(a), Self::Set(b)) => {
                let contains = |items: &[Self], item: &Self| items.iter().any(|other| item.py_eq(other));
                a.iter().all(|item| contains(b, item)) && b.iter().all(|item| contains(a, item))
            }
            (Self::Instance(a), Self::Instance(b)) => a.py_eq(b),
            _ => false,
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(BigInt::from(u8::from(*b)))),
            Self::Int(i) => Some(Number::Int(BigInt::from(*i))),
            Self::BigInt(bi) => Some(Number::Int(bi.clone())),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Returns the Python `repr()` string for this value.
    #[must_use]
    pub fn py_repr(&self) -> String {
        let mut s = String::new();
        // writing into a String cannot fail
        let _ = self.repr_fmt(&mut s);
        s
    }

    /// Converts this value to a natural JSON representation.
    ///
    /// Unlike the derived `serde::Serialize` (externally tagged, e.g. `{"Int": 42}`), this
    /// produces human-friendly JSON for logs and inspection. It is output-only.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::{Value as JV, json};
        match self {
            Self::None => JV::Null,
            Self::Bool(b) => JV::Bool(*b),
            Self::Int(i) => json!(i),
            Self::BigInt(bi) => json!({"$bigint": bi.to_string()}),
            Self::Float(f) => {
                if f.is_nan() || f.is_infinite() {
                    JV::Null
                } else {
                    json!(f)
                }
            }
            Self::String(s) => JV::String(s.clone()),
            Self::Bytes(b) => json!({"$bytes": b}),
            Self::List(items) => JV::Array(items.iter().map(Self::to_json_value).collect()),
            Self::Tuple(items) => json!({"$tuple": items.iter().map(Self::to_json_value).collect::<Vec<_>>()}),
            Self::Dict(pairs) => {
                let map: serde_json::Map<String, JV> = pairs
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Self::String(s) => s.clone(),
                            other => other.py_repr(),
                        };
                        (key, v.to_json_value())
                    })
                    .collect();
                JV::Object(map)
            }
            Self::Set(items) => json!({"$set": items.iter().map(Self::to_json_value).collect::<Vec<_>>()}),
            Self::Instance(reduced) => {
                let kwargs: serde_json::Map<String, JV> = reduced
                    .kwargs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect();
                let state: serde_json::Map<String, JV> = reduced
                    .state
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect();
                json!({"$instance": {
                    "type": reduced.type_name,
                    "args": reduced.args.iter().map(Self::to_json_value).collect::<Vec<_>>(),
                    "kwargs": kwargs,
                    "state": state,
                }})
            }
        }
    }

    fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::Float(v) => {
                if v.is_nan() {
                    return f.write_str("nan");
                }
                if v.is_infinite() {
                    return f.write_str(if *v > 0.0 { "inf" } else { "-inf" });
                }
                let s = v.to_string();
                f.write_str(&s)?;
                if !s.contains('.') {
                    f.write_str(".0")?;
                }
                Ok(())
            }
            Self::String(s) => string_repr_fmt(s, f),
            Self::Bytes(b) => bytes_repr_fmt(b, f),
            Self::List(l) => {
                f.write_char('[')?;
                write_items(l, f)?;
                f.write_char(']')
            }
            Self::Tuple(t) => {
                f.write_char('(')?;
                write_items(t, f)?;
                if t.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::Dict(d) => {
                f.write_char('{')?;
                let mut first = true;
                for (k, v) in d.iter() {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    k.repr_fmt(f)?;
                    f.write_str(": ")?;
                    v.repr_fmt(f)?;
                }
                f.write_char('}')
            }
            Self::Set(s) => {
                if s.is_empty() {
                    f.write_str("set()")
                } else {
                    f.write_char('{')?;
                    write_items(s, f)?;
                    f.write_char('}')
                }
            }
            Self::Instance(reduced) => {
                // Format: TypeName(pos1, pos2, key=value)
                f.write_str(&reduced.type_name)?;
                f.write_char('(')?;
                write_items(&reduced.args, f)?;
                let mut first = reduced.args.is_empty();
                for (name, value) in &reduced.kwargs {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    f.write_str(name)?;
                    f.write_char('=')?;
                    value.repr_fmt(f)?;
                }
                f.write_char(')')
            }
        }
    }

    /// Returns the Python type name for this value (e.g., `"int"`, `"str"`, `"list"`).
    ///
    /// For instances this is `"instance"`; the concrete type name lives on the reduced form.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::BigInt(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::Instance(_) => "instance",
        }
    }
}

/// Numeric view used by `py_eq` so `bool`, `int` and `float` compare across types.
enum Number {
    Int(BigInt),
    Float(f64),
}

impl Number {
    fn py_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(i), Self::Float(f)) | (Self::Float(f), Self::Int(i)) => {
                f.is_finite() && f.fract() == 0.0 && BigInt::from_f64(*f).is_some_and(|as_int| &as_int == i)
            }
        }
    }
}

fn seq_py_eq(a: &[Object], b: &[Object]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
}

fn write_items(items: &[Object], f: &mut impl Write) -> fmt::Result {
    let mut iter = items.iter();
    if let Some(first) = iter.next() {
        first.repr_fmt(f)?;
        for item in iter {
            f.write_str(", ")?;
            item.repr_fmt(f)?;
        }
    }
    Ok(())
}

/// Writes a string repr the way CPython picks quotes: single quotes unless the
/// string contains a single quote and no double quote.
fn string_repr_fmt(s: &str, f: &mut impl Write) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

fn bytes_repr_fmt(bytes: &[u8], f: &mut impl Write) -> fmt::Result {
    f.write_str("b'")?;
    for &b in bytes {
        match b {
            b'\\' => f.write_str("\\\\")?,
            b'\'' => f.write_str("\\'")?,
            b'\n' => f.write_str("\\n")?,
            b'\r' => f.write_str("\\r")?,
            b'\t' => f.write_str("\\t")?,
            0x20..=0x7e => f.write_char(char::from(b))?,
            _ => write!(f, "\\x{b:02x}")?,
        }
    }
    f.write_char('\'')
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            // Cross-compare Int and BigInt
            (Self::Int(a), Self::BigInt(b)) | (Self::BigInt(b), Self::Int(a)) => BigInt::from(*a) == *b,
            // Use to_bits() so that Eq stays reflexive for NaN
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Instance(a), Self::Instance(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Object {}

impl AsRef<Self> for Object {
    fn as_ref(&self) -> &Self {
        self
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<BigInt> for Object {
    fn from(value: BigInt) -> Self {
        Self::BigInt(value)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for Object {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Object {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl From<Reduced> for Object {
    fn from(value: Reduced) -> Self {
        Self::Instance(Box::new(value))
    }
}

/// Error returned when a `Object` cannot be converted to the requested Rust type.
///
/// This error is returned by the `TryFrom` implementations when attempting to extract
/// a specific type from a `Object` that holds a different variant.
#[derive(Debug)]
pub struct ConversionError {
    /// The type name that was expected (e.g., "int", "str").
    pub expected: &'static str,
    /// The actual type name of the `Object` (e.g., "list", "NoneType").
    pub actual: &'static str,
}

impl ConversionError {
    /// Creates a new `ConversionError` with the expected and actual type names.
    #[must_use]
    pub fn new(expected: &'static str, actual: &'static str) -> Self {
        Self { expected, actual }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.actual)
    }
}

impl std::error::Error for ConversionError {}

/// Attempts to convert a Object to an i64 integer.
/// Returns an error if the object is not an Int variant.
impl TryFrom<&Object> for i64 {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Int(i) => Ok(*i),
            _ => Err(ConversionError::new("int", value.type_name())),
        }
    }
}

/// Attempts to convert a Object to an f64 float.
/// Int values are automatically converted to f64 to match python's behavior.
impl TryFrom<&Object> for f64 {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Float(f) => Ok(*f),
            Object::Int(i) => Ok(*i as Self),
            _ => Err(ConversionError::new("float", value.type_name())),
        }
    }
}

impl TryFrom<&Object> for String {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        if let Object::String(s) = value {
            Ok(s.clone())
        } else {
            Err(ConversionError::new("str", value.type_name()))
        }
    }
}

/// Only `Bool` converts; ints are not coerced.
impl TryFrom<&Object> for bool {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Bool(b) => Ok(*b),
            _ => Err(ConversionError::new("bool", value.type_name())),
        }
    }
}

/// Unpacks any sequence variant into its items.
impl TryFrom<&Object> for Vec<Object> {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        value
            .as_sequence()
            .map(<[Object]>::to_vec)
            .ok_or_else(|| ConversionError::new("sequence", value.type_name()))
    }
}

/// A collection of key-value pairs representing Python dictionary contents.
///
/// Used by `Object::Dict` to store dictionary entries while preserving
/// insertion order. Keys and values are both `Object` instances.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DictPairs(Vec<(Object, Object)>);

impl From<Vec<(Object, Object)>> for DictPairs {
    fn from(pairs: Vec<(Object, Object)>) -> Self {
        Self(pairs)
    }
}

impl IntoIterator for DictPairs {
    type Item = (Object, Object);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DictPairs {
    type Item = &'a (Object, Object);
    type IntoIter = std::slice::Iter<'a, (Object, Object)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(Object, Object)> for DictPairs {
    fn from_iter<T: IntoIterator<Item = (Object, Object)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl DictPairs {
    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dict has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Object, &Object)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}
