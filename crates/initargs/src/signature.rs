//! Function signature representation and argument binding.
//!
//! This module describes Python-style signatures with all parameter kinds:
//! positional-only, positional-or-keyword, *args, keyword-only, and **kwargs,
//! with default values. It provides the two reflection capabilities capture needs
//! (describe a callable's parameters, and strip transparent wrappers) plus the
//! argument binding algorithm constructors use when a captured call is replayed.

use ahash::AHashSet;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::{CallArgs, Locals},
    exception::{CaptureError, CaptureResult, ExcType},
    object::{DictPairs, Object},
};

/// The kind of a parameter, mirroring `inspect.Parameter.kind`.
///
/// Variants are declared in the only order they may appear in a signature, so the
/// derived `Ord` is the ordering rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamKind {
    /// Before `/`, e.g. `a` in `def f(a, /)`.
    PositionalOnly,
    /// A regular parameter, e.g. `a` in `def f(a)`.
    PositionalOrKeyword,
    /// `*args`.
    VarPositional,
    /// After `*` or `*args`, e.g. `c` in `def f(*, c)`.
    KeywordOnly,
    /// `**kwargs`.
    VarKeyword,
}

impl ParamKind {
    /// The description CPython uses in signature errors.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::PositionalOnly => "positional-only",
            Self::PositionalOrKeyword => "positional or keyword",
            Self::VarPositional => "variadic positional",
            Self::KeywordOnly => "keyword-only",
            Self::VarKeyword => "variadic keyword",
        }
    }

    /// Whether the parameter collects extra arguments (`*args` or `**kwargs`).
    #[must_use]
    pub fn is_variadic(self) -> bool {
        matches!(self, Self::VarPositional | Self::VarKeyword)
    }
}

/// One declared parameter: its name, kind and optional default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<Object>,
}

impl Param {
    /// Creates a parameter without a default.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    /// Creates a parameter with a default value.
    pub fn with_default(name: impl Into<String>, kind: ParamKind, default: impl Into<Object>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(default.into()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    /// The declared default, or `None` if the parameter is required (or variadic).
    #[must_use]
    pub fn default(&self) -> Option<&Object> {
        self.default.as_ref()
    }
}

/// A callable's declared parameter list.
///
/// Build one with [`Signature::builder`]; the builder validates the declaration the way
/// Python's compiler and `inspect.Signature` do, so a `Signature` always has unique
/// parameter names in a legal kind order.
///
/// # Wrapping
///
/// A decorator that forwards `(*args, **kwargs)` to the function it wraps exposes its
/// own forwarding signature, while the user-declared one is what capture needs.
/// [`Signature::with_wrapped`] records the wrapped signature (like `functools.wraps`
/// setting `__wrapped__`) and [`Signature::unwrapped`] follows that chain back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Name of the callable, used in error messages (e.g. `Point` in `Point() missing ...`).
    name: String,
    /// Parameters in declaration order.
    params: Vec<Param>,
    /// The signature this one transparently forwards to, if any.
    wrapped: Option<Box<Signature>>,
}

impl Signature {
    /// Starts building a signature for the callable `name`.
    pub fn builder(name: impl Into<String>) -> SignatureBuilder {
        SignatureBuilder {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Creates a signature from a full parameter list, validating it.
    ///
    /// # Errors
    /// Returns a `ValueError` if names repeat, kinds are out of order, a variadic kind appears
    /// twice, or a required positional parameter follows a defaulted one.
    pub fn new(name: impl Into<String>, params: Vec<Param>) -> CaptureResult<Self> {
        validate(&params)?;
        Ok(Self {
            name: name.into(),
            params,
            wrapped: None,
        })
    }

    /// Marks this signature as a transparent wrapper around `inner`.
    #[must_use]
    pub fn with_wrapped(mut self, inner: Self) -> Self {
        self.wrapped = Some(Box::new(inner));
        self
    }

    /// Follows the wrapper chain to the innermost, user-declared signature.
    #[must_use]
    pub fn unwrapped(&self) -> &Self {
        let mut current = self;
        while let Some(inner) = &current.wrapped {
            current = inner;
        }
        current
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// The `*args` parameter, if declared.
    #[must_use]
    pub fn var_positional(&self) -> Option<&Param> {
        self.params.iter().find(|p| p.kind == ParamKind::VarPositional)
    }

    /// The `**kwargs` parameter, if declared.
    #[must_use]
    pub fn var_keyword(&self) -> Option<&Param> {
        self.params.iter().find(|p| p.kind == ParamKind::VarKeyword)
    }

    /// Binds call arguments to this signature's parameters according to Python's calling conventions.
    ///
    /// This is what a constructor does with `T(*args, **kwargs)`:
    /// 1. Bind positional args to positional-only, then positional-or-keyword params (in order)
    /// 2. Collect excess positional args into the `*args` tuple
    /// 3. Bind keyword args to positional-or-keyword and keyword-only params
    /// 4. Collect unmatched keyword args into the `**kwargs` dict
    /// 5. Apply defaults for unbound params
    ///
    /// Returns a [`Locals`] snapshot with one entry per declared parameter, in declaration
    /// order, ready to hand to capture. Binds against this signature as written; callers that
    /// want the user-declared signature of a wrapper call [`Signature::unwrapped`] first.
    ///
    /// # Errors
    /// Returns a `TypeError` if:
    /// - Too many positional arguments
    /// - Unexpected keyword argument
    /// - Positional-only parameter passed as keyword (and there is no `**kwargs` to absorb it)
    /// - Same argument passed both positionally and by keyword
    /// - Missing required positional or keyword-only arguments
    pub fn bind(&self, call: CallArgs) -> CaptureResult<Locals> {
        let (args, kwargs) = call.into_parts();
        let func = self.name.as_str();
        let has_var_kwargs = self.var_keyword().is_some();

        let positional_params: Vec<&Param> = self
            .params
            .iter()
            .filter(|p| matches!(p.kind, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword))
            .collect();

        // 1. Bind positional args in order
        let given = args.len();
        let mut pos_iter = args.into_iter();
        let mut bound: IndexMap<&str, Object> = IndexMap::with_capacity(self.params.len());
        for param in &positional_params {
            match pos_iter.next() {
                Some(value) => {
                    bound.insert(param.name.as_str(), value);
                }
                None => break,
            }
        }

        // 2. Collect excess positional args
        let excess: Vec<Object> = pos_iter.collect();
        if !excess.is_empty() && self.var_positional().is_none() {
            return Err(ExcType::type_error_too_many_positional(
                func,
                positional_params.len(),
                given,
            ));
        }

        // 3. Bind keyword args
        let mut excess_kwargs: Vec<(Object, Object)> = Vec::new();
        for (key, value) in kwargs {
            match self.param(&key) {
                Some(param) if param.kind == ParamKind::PositionalOnly && !has_var_kwargs => {
                    return Err(ExcType::type_error_positional_only(func, &key));
                }
                Some(param) if matches!(param.kind, ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly) => {
                    if bound.contains_key(param.name.as_str()) {
                        return Err(ExcType::type_error_duplicate_arg(func, &key));
                    }
                    bound.insert(param.name.as_str(), value);
                }
                _ if has_var_kwargs => excess_kwargs.push((Object::String(key), value)),
                _ => return Err(ExcType::type_error_unexpected_keyword(func, &key)),
            }
        }

        // 4. Apply defaults and check required params
        let mut missing_positional: Vec<&str> = Vec::new();
        let mut missing_kwonly: Vec<&str> = Vec::new();
        for param in &self.params {
            if param.kind.is_variadic() || bound.contains_key(param.name.as_str()) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    bound.insert(param.name.as_str(), default.clone());
                }
                None if param.kind == ParamKind::KeywordOnly => missing_kwonly.push(&param.name),
                None => missing_positional.push(&param.name),
            }
        }
        if !missing_positional.is_empty() {
            return Err(ExcType::type_error_missing_positional(func, &missing_positional));
        }
        if !missing_kwonly.is_empty() {
            return Err(ExcType::type_error_missing_kwonly(func, &missing_kwonly));
        }

        // 5. Lay out the snapshot in declaration order
        let mut excess = Some(excess);
        let mut excess_kwargs = Some(excess_kwargs);
        let mut locals = Locals::new();
        for param in &self.params {
            let value = match param.kind {
                ParamKind::VarPositional => Object::Tuple(excess.take().unwrap_or_default()),
                ParamKind::VarKeyword => Object::Dict(DictPairs::from(excess_kwargs.take().unwrap_or_default())),
                _ => bound.shift_remove(param.name.as_str()).unwrap_or(Object::None),
            };
            locals.insert(param.name.clone(), value);
        }
        Ok(locals)
    }
}

/// Incrementally declares a [`Signature`], one parameter at a time in declaration order.
///
/// ```
/// use initargs::Signature;
///
/// // def f(arg1, arg2="d2", *va, kw="dk")
/// let signature = Signature::builder("f")
///     .arg("arg1")
///     .arg_default("arg2", "d2")
///     .var_args("va")
///     .kwonly_default("kw", "dk")
///     .build()
///     .unwrap();
/// assert_eq!(signature.params().len(), 4);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct SignatureBuilder {
    name: String,
    params: Vec<Param>,
}

impl SignatureBuilder {
    /// Adds a required positional-only parameter.
    pub fn pos_only(self, name: impl Into<String>) -> Self {
        self.param(Param::new(name, ParamKind::PositionalOnly))
    }

    /// Adds a positional-only parameter with a default.
    pub fn pos_only_default(self, name: impl Into<String>, default: impl Into<Object>) -> Self {
        self.param(Param::with_default(name, ParamKind::PositionalOnly, default))
    }

    /// Adds a required positional-or-keyword parameter.
    pub fn arg(self, name: impl Into<String>) -> Self {
        self.param(Param::new(name, ParamKind::PositionalOrKeyword))
    }

    /// Adds a positional-or-keyword parameter with a default.
    pub fn arg_default(self, name: impl Into<String>, default: impl Into<Object>) -> Self {
        self.param(Param::with_default(name, ParamKind::PositionalOrKeyword, default))
    }

    /// Adds the `*args` parameter.
    pub fn var_args(self, name: impl Into<String>) -> Self {
        self.param(Param::new(name, ParamKind::VarPositional))
    }

    /// Adds a required keyword-only parameter.
    pub fn kwonly(self, name: impl Into<String>) -> Self {
        self.param(Param::new(name, ParamKind::KeywordOnly))
    }

    /// Adds a keyword-only parameter with a default.
    pub fn kwonly_default(self, name: impl Into<String>, default: impl Into<Object>) -> Self {
        self.param(Param::with_default(name, ParamKind::KeywordOnly, default))
    }

    /// Adds the `**kwargs` parameter.
    pub fn var_kwargs(self, name: impl Into<String>) -> Self {
        self.param(Param::new(name, ParamKind::VarKeyword))
    }

    /// Adds an arbitrary parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Validates and finishes the signature.
    ///
    /// # Errors
    /// See [`Signature::new`].
    pub fn build(self) -> CaptureResult<Signature> {
        Signature::new(self.name, self.params)
    }
}

/// Checks a parameter list the way `inspect.Signature.__init__` does.
fn validate(params: &[Param]) -> CaptureResult<()> {
    let mut seen: AHashSet<&str> = AHashSet::with_capacity(params.len());
    let mut previous: Option<ParamKind> = None;
    let mut seen_default = false;
    for param in params {
        if !seen.insert(param.name.as_str()) {
            return Err(CaptureError::new(
                ExcType::ValueError,
                format!("duplicate parameter name: '{}'", param.name),
            ));
        }
        if let Some(prev) = previous {
            if param.kind < prev {
                return Err(CaptureError::new(
                    ExcType::ValueError,
                    format!(
                        "wrong parameter order: {} parameter before {} parameter",
                        prev.description(),
                        param.kind.description()
                    ),
                ));
            }
            if param.kind == prev && param.kind.is_variadic() {
                return Err(CaptureError::new(
                    ExcType::ValueError,
                    format!("more than one {} parameter", param.kind.description()),
                ));
            }
        }
        if param.kind.is_variadic() && param.default.is_some() {
            return Err(CaptureError::new(
                ExcType::ValueError,
                format!("{} parameter '{}' cannot have a default", param.kind.description(), param.name),
            ));
        }
        if matches!(param.kind, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword) {
            if param.default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(CaptureError::new(
                    ExcType::ValueError,
                    "non-default argument follows default argument",
                ));
            }
        }
        previous = Some(param.kind);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_inspect() {
        assert_eq!(ParamKind::VarPositional.to_string(), "VAR_POSITIONAL");
        assert_eq!("KEYWORD_ONLY".parse::<ParamKind>().unwrap(), ParamKind::KeywordOnly);
    }

    #[test]
    fn kinds_order_like_declarations() {
        assert!(ParamKind::PositionalOnly < ParamKind::PositionalOrKeyword);
        assert!(ParamKind::VarPositional < ParamKind::KeywordOnly);
        assert!(ParamKind::KeywordOnly < ParamKind::VarKeyword);
    }

    #[test]
    fn unwrapped_follows_whole_chain() {
        let inner = Signature::builder("inner").arg("x").build().unwrap();
        let middle = Signature::builder("middle")
            .var_args("args")
            .var_kwargs("kwargs")
            .build()
            .unwrap()
            .with_wrapped(inner.clone());
        let outer = Signature::builder("outer")
            .var_args("a")
            .build()
            .unwrap()
            .with_wrapped(middle);
        assert_eq!(outer.unwrapped(), &inner);
        assert_eq!(inner.unwrapped(), &inner);
    }
}
