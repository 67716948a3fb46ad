use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for capture, binding and reconstruction operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Python exception types raised by capture and reconstruction.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `KeyError` -> "KeyError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// A declared parameter has no binding in the locals snapshot.
    KeyError,
    /// Bad call shape: unexpected keyword, missing argument, wrong value type.
    TypeError,
    /// Malformed signature declaration.
    ValueError,
    /// Operation is not valid in the instance's current state.
    RuntimeError,
    /// A serialized payload could not be decoded.
    UnpicklingError,
}

impl ExcType {
    /// Creates a KeyError for a parameter missing from a locals snapshot.
    ///
    /// Matches CPython's format for dict lookups: `KeyError: 'name'`
    #[must_use]
    pub(crate) fn key_error_missing_local(name: &str) -> CaptureError {
        CaptureError::new(Self::KeyError, format!("'{name}'"))
    }

    /// Creates a TypeError for a keyword argument that matches no parameter.
    ///
    /// Matches CPython's format: `{name}() got an unexpected keyword argument '{key}'`
    #[must_use]
    pub(crate) fn type_error_unexpected_keyword(name: &str, key: &str) -> CaptureError {
        CaptureError::new(
            Self::TypeError,
            format!("{name}() got an unexpected keyword argument '{key}'"),
        )
    }

    /// Creates a TypeError for an argument given both positionally and by keyword.
    ///
    /// Matches CPython's format: `{name}() got multiple values for argument '{param}'`
    #[must_use]
    pub(crate) fn type_error_duplicate_arg(name: &str, param: &str) -> CaptureError {
        CaptureError::new(
            Self::TypeError,
            format!("{name}() got multiple values for argument '{param}'"),
        )
    }

    /// Creates a TypeError for a positional-only parameter passed by keyword.
    ///
    /// Matches CPython's format:
    /// `{name}() got some positional-only arguments passed as keyword arguments: '{param}'`
    #[must_use]
    pub(crate) fn type_error_positional_only(name: &str, param: &str) -> CaptureError {
        CaptureError::new(
            Self::TypeError,
            format!("{name}() got some positional-only arguments passed as keyword arguments: '{param}'"),
        )
    }

    /// Creates a TypeError for too many positional arguments.
    ///
    /// Matches CPython's format: `{name}() takes {max} positional arguments but {given} were given`
    #[must_use]
    pub(crate) fn type_error_too_many_positional(name: &str, max: usize, given: usize) -> CaptureError {
        let takes = if max == 1 {
            "1 positional argument".to_owned()
        } else {
            format!("{max} positional arguments")
        };
        let were = if given == 1 { "was" } else { "were" };
        CaptureError::new(
            Self::TypeError,
            format!("{name}() takes {takes} but {given} {were} given"),
        )
    }

    /// Creates a TypeError for missing required positional arguments.
    #[must_use]
    pub(crate) fn type_error_missing_positional(name: &str, missing: &[&str]) -> CaptureError {
        Self::missing_args(name, "positional", missing)
    }

    /// Creates a TypeError for missing required keyword-only arguments.
    #[must_use]
    pub(crate) fn type_error_missing_kwonly(name: &str, missing: &[&str]) -> CaptureError {
        Self::missing_args(name, "keyword-only", missing)
    }

    fn missing_args(name: &str, group: &str, missing: &[&str]) -> CaptureError {
        let count = missing.len();
        let names = format_param_names(missing);
        let noun = if count == 1 { "argument" } else { "arguments" };
        CaptureError::new(
            Self::TypeError,
            format!("{name}() missing {count} required {group} {noun}: {names}"),
        )
    }

    /// Creates a TypeError for keys in a `**kwargs` mapping that are not strings.
    #[must_use]
    pub(crate) fn type_error_keywords_must_be_strings() -> CaptureError {
        CaptureError::new(Self::TypeError, "keywords must be strings")
    }

    /// Creates a TypeError for a value of the wrong type.
    ///
    /// Format: `{what} must be {expected}, not {actual}`
    #[must_use]
    pub(crate) fn type_error_expected(what: &str, expected: &str, actual: &str) -> CaptureError {
        CaptureError::new(Self::TypeError, format!("{what} must be {expected}, not {actual}"))
    }

    /// Creates a RuntimeError for reducing or copying an instance that never captured its arguments.
    #[must_use]
    pub(crate) fn runtime_error_not_captured(type_name: &str) -> CaptureError {
        CaptureError::new(
            Self::RuntimeError,
            format!("{type_name} has not captured its init arguments"),
        )
    }
}

/// Formats a list of parameter names the way CPython lists them in error messages.
///
/// `['a']` -> `'a'`, `['a', 'b']` -> `'a' and 'b'`, `['a', 'b', 'c']` -> `'a', 'b', and 'c'`
fn format_param_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [only] => format!("'{only}'"),
        [first, second] => format!("'{first}' and '{second}'"),
        [init @ .., last] => {
            let mut out = String::new();
            for name in init {
                out.push('\'');
                out.push_str(name);
                out.push_str("', ");
            }
            out.push_str("and '");
            out.push_str(last);
            out.push('\'');
            out
        }
    }
}

/// An error raised by capture, binding, copy or reconstruction.
///
/// Carries the Python exception type it corresponds to plus the message, so
/// callers can match on `exc_type` the same way `except KeyError:` would.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureError {
    exc_type: ExcType,
    message: String,
}

impl CaptureError {
    /// Creates a new error of the given type.
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: message.into(),
        }
    }

    /// The Python exception type of this error.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    /// The exception message, without the type prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.exc_type, self.message)
    }
}

impl std::error::Error for CaptureError {}

impl From<postcard::Error> for CaptureError {
    fn from(err: postcard::Error) -> Self {
        Self::new(ExcType::UnpicklingError, err.to_string())
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ExcType::UnpicklingError, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_names_follow_cpython_listing() {
        assert_eq!(format_param_names(&["a"]), "'a'");
        assert_eq!(format_param_names(&["a", "b"]), "'a' and 'b'");
        assert_eq!(format_param_names(&["a", "b", "c"]), "'a', 'b', and 'c'");
    }

    #[test]
    fn display_prefixes_exception_type() {
        let err = ExcType::type_error_unexpected_keyword("Foo", "bar");
        assert_eq!(err.to_string(), "TypeError: Foo() got an unexpected keyword argument 'bar'");
        assert_eq!(err.exc_type(), ExcType::TypeError);
    }

    #[test]
    fn too_many_positional_pluralizes() {
        let err = ExcType::type_error_too_many_positional("f", 1, 2);
        assert_eq!(err.message(), "f() takes 1 positional argument but 2 were given");
        let err = ExcType::type_error_too_many_positional("f", 0, 1);
        assert_eq!(err.message(), "f() takes 0 positional arguments but 1 was given");
    }
}
