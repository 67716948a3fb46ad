//! Byte-stream and JSON encodings of reduced capturing objects.
//!
//! The binary format is an 8-byte magic header followed by the postcard encoding of a
//! [`Reduced`]. Loading decodes the reduced form and replays the constructor through
//! [`reconstruct`], so a payload can never bypass the type's own argument validation.

use std::any::Any;

use ahash::AHashMap;

use crate::{
    exception::{CaptureError, CaptureResult, ExcType},
    serializable::{Reduced, Serializable, reconstruct},
};

/// Magic header for init-args payloads.
const PICKLE_MAGIC: &[u8; 8] = b"INITARG1";

/// Serializes a capturing instance to bytes.
///
/// # Errors
/// Returns a `RuntimeError` if `value` never captured its arguments.
pub fn dumps<T: Serializable>(value: &T) -> CaptureResult<Vec<u8>> {
    let (_, reduced) = value.reduce()?;
    encode(&reduced)
}

/// Encodes a reduced form with the magic header.
///
/// # Errors
/// Returns an `UnpicklingError` if postcard fails to encode the payload.
pub fn encode(reduced: &Reduced) -> CaptureResult<Vec<u8>> {
    let encoded = postcard::to_allocvec(reduced)
        .map_err(|error| unpickling_error(format!("failed to serialize payload: {error}")))?;
    let mut out = Vec::with_capacity(PICKLE_MAGIC.len() + encoded.len());
    out.extend_from_slice(PICKLE_MAGIC);
    out.extend_from_slice(&encoded);
    Ok(out)
}

/// Checks the magic header and decodes the reduced form, without reconstructing.
///
/// # Errors
/// Returns an `UnpicklingError` if the header is missing or the payload is corrupted.
pub fn decode(data: &[u8]) -> CaptureResult<Reduced> {
    let Some(body) = data.strip_prefix(PICKLE_MAGIC.as_slice()) else {
        return Err(unpickling_error("invalid load key, not an init-args payload"));
    };
    postcard::from_bytes(body).map_err(|error| unpickling_error(format!("data was truncated or corrupted: {error}")))
}

/// Deserializes a `T` from bytes produced by [`dumps`].
///
/// # Errors
/// - `UnpicklingError` if the payload cannot be decoded
/// - `TypeError` if the payload holds a different type
/// - anything `T`'s constructor or `set_state` raises
pub fn loads<T: Serializable>(data: &[u8]) -> CaptureResult<T> {
    reconstruct(decode(data)?)
}

/// Serializes a capturing instance to a JSON string.
///
/// # Errors
/// Returns a `RuntimeError` if `value` never captured its arguments.
pub fn to_json<T: Serializable>(value: &T) -> CaptureResult<String> {
    let (_, reduced) = value.reduce()?;
    Ok(serde_json::to_string(&reduced)?)
}

/// Deserializes a `T` from a string produced by [`to_json`].
///
/// # Errors
/// See [`loads`].
pub fn from_json<T: Serializable>(json: &str) -> CaptureResult<T> {
    let reduced: Reduced = serde_json::from_str(json)?;
    reconstruct(reduced)
}

type Loader = fn(Reduced) -> CaptureResult<Box<dyn Any>>;

/// Dispatches reduced forms to the registered type with the matching name.
///
/// Used when the concrete type of a payload is not known statically. Results come back
/// type-erased; callers downcast them.
///
/// ```
/// # use initargs::Registry;
/// let registry = Registry::new();
/// let err = registry.loads(b"INITARG1\x07Unknown\x00\x00\x00").unwrap_err();
/// assert_eq!(err.to_string(), "TypeError: cannot reconstruct unknown type 'Unknown'");
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    loaders: AHashMap<&'static str, Loader>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under its [`Serializable::TYPE_NAME`], replacing any earlier registration.
    pub fn register<T: Serializable + 'static>(&mut self) -> &mut Self {
        self.loaders.insert(T::TYPE_NAME, load_boxed::<T>);
        self
    }

    /// Whether a type is registered under `type_name`.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.loaders.contains_key(type_name)
    }

    /// Rebuilds whatever type `reduced` names.
    ///
    /// # Errors
    /// - `TypeError` if no type is registered under the reduced type name
    /// - anything the type's constructor or `set_state` raises
    pub fn reconstruct(&self, reduced: Reduced) -> CaptureResult<Box<dyn Any>> {
        let Some(loader) = self.loaders.get(reduced.type_name.as_str()) else {
            return Err(CaptureError::new(
                ExcType::TypeError,
                format!("cannot reconstruct unknown type '{}'", reduced.type_name),
            ));
        };
        loader(reduced)
    }

    /// Decodes bytes produced by [`dumps`] and rebuilds whatever type they name.
    ///
    /// # Errors
    /// See [`decode`] and [`Registry::reconstruct`].
    pub fn loads(&self, data: &[u8]) -> CaptureResult<Box<dyn Any>> {
        self.reconstruct(decode(data)?)
    }
}

fn load_boxed<T: Serializable + 'static>(reduced: Reduced) -> CaptureResult<Box<dyn Any>> {
    Ok(Box::new(reconstruct::<T>(reduced)?))
}

fn unpickling_error(message: impl Into<String>) -> CaptureError {
    CaptureError::new(ExcType::UnpicklingError, message)
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::object::Object;

    #[test]
    fn encode_prefixes_magic() {
        let reduced = Reduced {
            type_name: "T".to_owned(),
            args: vec![Object::Int(1)],
            kwargs: IndexMap::new(),
            state: IndexMap::new(),
        };
        let bytes = encode(&reduced).unwrap();
        assert!(bytes.starts_with(b"INITARG1"));
        assert_eq!(decode(&bytes).unwrap(), reduced);
    }

    #[test]
    fn truncated_payload_is_unpickling_error() {
        let err = decode(b"INITARG1\x05").unwrap_err();
        assert_eq!(err.exc_type(), ExcType::UnpicklingError);
        assert!(err.message().starts_with("data was truncated or corrupted"));
    }
}
