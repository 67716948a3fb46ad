//! Reconciling a declared signature against a locals snapshot.
//!
//! After a call has been bound there is no way to tell which arguments were passed
//! positionally, which by keyword, or which were left at their default. The
//! reconciler reconstructs a canonical call that reproduces an equivalent invocation:
//! as much as possible goes into the keyword mapping, and only what must be positional
//! (positional-only parameters, and everything up to a non-empty `*args`) goes into
//! the positional list.

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{
    args::{CallArgs, Locals},
    exception::{CaptureResult, ExcType},
    object::Object,
    signature::{ParamKind, Signature},
    tracer::{CaptureTracer, NoopTracer},
};

/// Which keyword-mapped parameters to drop when their captured value equals their default.
///
/// Omitting defaulted parameters lets a later version of the type change a default and
/// have old payloads pick it up. It is off by default because a parameter explicitly
/// passed with its default value is indistinguishable from one that was not passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OmitPolicy {
    /// Keep every parameter.
    #[default]
    None,
    /// Drop every parameter whose value equals its declared default.
    All,
    /// Drop only the named parameters, when their value equals their declared default.
    Names(AHashSet<String>),
}

impl OmitPolicy {
    /// Creates a [`OmitPolicy::Names`] policy.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    /// Whether this policy asks for `name` to be dropped when it equals its default.
    #[must_use]
    pub fn covers(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Names(names) => names.contains(name),
        }
    }
}

impl From<bool> for OmitPolicy {
    fn from(omit_all: bool) -> Self {
        if omit_all { Self::All } else { Self::None }
    }
}

/// Reconstructs the `(args, kwargs)` split of a call from a locals snapshot.
///
/// Equivalent to [`reconcile_traced`] with a [`NoopTracer`].
///
/// # Errors
/// See [`reconcile_traced`].
pub fn reconcile(signature: &Signature, locals: &Locals, omit: &OmitPolicy) -> CaptureResult<CallArgs> {
    reconcile_traced(signature, locals, omit, &mut NoopTracer)
}

/// Reconstructs the `(args, kwargs)` split of a call from a locals snapshot, reporting decisions to `tracer`.
///
/// `signature` is unwrapped first, so a forwarding wrapper's `(*args, **kwargs)` never
/// shadows the user-declared parameters. Parameters are walked in declaration order:
/// - positional-only values go to the positional list
/// - positional-or-keyword and keyword-only values go to the keyword mapping
/// - a non-empty `*args` first moves every keyword candidate gathered so far to the
///   positional list (keywords cannot skip the gap before `*args`), then appends its values
/// - `**kwargs` entries are merged into the keyword mapping
///
/// Finally, parameters covered by `omit` whose value `py_eq`s their declared default are
/// removed from the keyword mapping.
///
/// # Errors
/// - `KeyError` if a declared parameter has no binding in `locals`
/// - `TypeError` if the `*args` binding is not a sequence, or the `**kwargs` binding is not
///   a dict with string keys
pub fn reconcile_traced(
    signature: &Signature,
    locals: &Locals,
    omit: &OmitPolicy,
    tracer: &mut impl CaptureTracer,
) -> CaptureResult<CallArgs> {
    let signature = signature.unwrapped();
    let func = signature.name();

    let mut positional: Vec<Object> = Vec::new();
    let mut keyword: IndexMap<String, Object> = IndexMap::new();

    for param in signature.params() {
        let name = param.name();
        match param.kind() {
            ParamKind::PositionalOnly => positional.push(locals.get(name)?.clone()),
            ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly => {
                keyword.insert(name.to_owned(), locals.get(name)?.clone());
            }
            ParamKind::VarPositional => {
                let value = locals.get(name)?;
                let var_args = value
                    .as_sequence()
                    .ok_or_else(|| ExcType::type_error_expected(&format!("*{name}"), "a sequence", value.type_name()))?;
                if var_args.is_empty() {
                    continue;
                }
                tracer.on_demote(func, keyword.len(), var_args.len());
                positional.extend(keyword.drain(..).map(|(_, v)| v));
                positional.extend(var_args.iter().cloned());
            }
            ParamKind::VarKeyword => {
                let value = locals.get(name)?;
                let Object::Dict(extra) = value else {
                    return Err(ExcType::type_error_expected(
                        &format!("**{name}"),
                        "a dict",
                        value.type_name(),
                    ));
                };
                for (key, extra_value) in extra {
                    let Object::String(key) = key else {
                        return Err(ExcType::type_error_keywords_must_be_strings());
                    };
                    keyword.insert(key.clone(), extra_value.clone());
                }
            }
        }
    }

    if *omit != OmitPolicy::None {
        for param in signature.params() {
            let name = param.name();
            if !omit.covers(name) {
                continue;
            }
            let Some(default) = param.default() else {
                continue;
            };
            if keyword.get(name).is_some_and(|value| value.py_eq(default)) {
                keyword.shift_remove(name);
                tracer.on_omit_default(func, name);
            }
        }
    }

    let call = CallArgs::from_parts(positional, keyword);
    tracer.on_reconcile(func, &call);
    Ok(call)
}
