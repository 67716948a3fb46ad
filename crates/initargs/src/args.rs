use indexmap::IndexMap;

use crate::{
    exception::{CaptureResult, ExcType},
    object::{ConversionError, Object},
};

/// The arguments of one call: an ordered positional list and an ordered keyword mapping.
///
/// This is both what the reconciler produces (the captured call) and what a constructor
/// receives when the captured call is replayed as `T(*args, **kwargs)`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CallArgs {
    args: Vec<Object>,
    kwargs: IndexMap<String, Object>,
}

impl CallArgs {
    /// Creates an empty call, `f()`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a call from already-split positional and keyword arguments.
    #[must_use]
    pub fn from_parts(args: Vec<Object>, kwargs: IndexMap<String, Object>) -> Self {
        Self { args, kwargs }
    }

    /// Creates a purely positional call, `f(a, b, ...)`.
    pub fn positional<I, V>(args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Object>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            kwargs: IndexMap::new(),
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Object>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Adds (or replaces) a keyword argument.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Object>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// The positional arguments, in order.
    #[must_use]
    pub fn args(&self) -> &[Object] {
        &self.args
    }

    /// The keyword arguments, in insertion order.
    #[must_use]
    pub fn kwargs(&self) -> &IndexMap<String, Object> {
        &self.kwargs
    }

    /// Splits into `(args, kwargs)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Object>, IndexMap<String, Object>) {
        (self.args, self.kwargs)
    }

    /// Whether the call carries no arguments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    /// Python `==` over both parts, using [`Object::py_eq`] for the values.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.py_eq(b))
            && kwargs_py_eq(&self.kwargs, &other.kwargs)
    }
}

/// Order-insensitive `py_eq` over two name-keyed maps.
pub(crate) fn kwargs_py_eq(a: &IndexMap<String, Object>, b: &IndexMap<String, Object>) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|other| v.py_eq(other)))
}

/// A snapshot of a callable's parameter bindings right after entry.
///
/// Holds one entry per declared parameter: plain parameters map to their bound value,
/// `*args` maps to a tuple of the extra positional values and `**kwargs` maps to a dict of
/// the extra keyword values (both possibly empty). This is the explicit stand-in for a
/// `locals()` snapshot: initializers build it from their own parameters, either through
/// [`Signature::bind`](crate::Signature::bind) or with the [`locals!`](crate::locals) macro.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locals(IndexMap<String, Object>);

impl Locals {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a binding.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Object>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds (or replaces) a binding in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Object>) {
        self.0.insert(name.into(), value.into());
    }

    /// Looks up a binding.
    ///
    /// # Errors
    /// Returns a `KeyError` if `name` is not bound.
    pub fn get(&self, name: &str) -> CaptureResult<&Object> {
        self.0.get(name).ok_or_else(|| ExcType::key_error_missing_local(name))
    }

    /// Looks up a binding and converts it to a Rust value.
    ///
    /// # Errors
    /// Returns a `KeyError` if `name` is not bound, or a `TypeError` if the value has the wrong type.
    pub fn extract<T>(&self, name: &str) -> CaptureResult<T>
    where
        T: for<'a> TryFrom<&'a Object, Error = ConversionError>,
    {
        let value = self.get(name)?;
        T::try_from(value).map_err(|err| ExcType::type_error_expected(&format!("argument '{name}'"), err.expected, err.actual))
    }

    /// Whether `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Object)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Object>> FromIterator<(K, V)> for Locals {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Builds a [`Locals`] snapshot from an initializer's own parameters.
///
/// With bare identifiers, each variable is cloned into an [`Object`] under its own name:
///
/// ```
/// use initargs::{Object, locals};
///
/// let arg1 = "a1".to_owned();
/// let va = Object::tuple(["v1", "v2"]);
/// let snapshot = locals![arg1, va];
/// assert_eq!(snapshot.get("arg1").unwrap(), &Object::from("a1"));
/// ```
///
/// With `"name" => expr` pairs, names and values are given explicitly.
#[macro_export]
macro_rules! locals {
    ($($name:literal => $value:expr),* $(,)?) => {
        $crate::Locals::new()$(.with($name, $value))*
    };
    ($($name:ident),* $(,)?) => {
        $crate::Locals::new()$(.with(stringify!($name), $crate::Object::from($name.clone())))*
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_reports_type_mismatch() {
        let locals = Locals::new().with("count", "three");
        let err = locals.extract::<i64>("count").unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);
        assert_eq!(err.message(), "argument 'count' must be int, not str");
    }

    #[test]
    fn missing_binding_is_key_error() {
        let err = Locals::new().get("x").unwrap_err();
        assert_eq!(err.exc_type(), ExcType::KeyError);
        assert_eq!(err.message(), "'x'");
    }

    #[test]
    fn kwargs_equality_ignores_order() {
        let a = CallArgs::new().kwarg("x", 1).kwarg("y", 2.0);
        let b = CallArgs::new().kwarg("y", 2).kwarg("x", true);
        assert!(a.py_eq(&b));
        assert_ne!(a, b);
    }
}
