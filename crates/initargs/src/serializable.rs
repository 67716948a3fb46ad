//! The capturing base type.
//!
//! Instead of persisting an object's fields, a capturing type records the arguments
//! its initializer was called with and replays them on reconstruction. The object is
//! therefore always rebuilt through its constructor, so every invariant the constructor
//! enforces is re-validated on load. Anything the constructor cannot rebuild (state
//! mutated after construction) goes through the explicit `get_state`/`set_state` hooks.
//!
//! Rust has no implicit base class, so the pieces are explicit:
//! - [`InitArgs`] is the per-instance capture cache plus its "already captured" flag.
//!   Types embed one and hand it to every level of their initializer chain.
//! - [`Serializable`] is the behavior: reduce to a [`Reduced`] form, reconstruct, copy.

use indexmap::IndexMap;

use crate::{
    args::{CallArgs, Locals, kwargs_py_eq},
    capture::{OmitPolicy, reconcile_traced},
    exception::{CaptureError, CaptureResult, ExcType},
    object::Object,
    signature::{ParamKind, Signature},
    tracer::{CaptureTracer, NoopTracer},
};

/// Auxiliary state a type saves beyond its constructor arguments.
pub type StateDict = IndexMap<String, Object>;

/// The function that rebuilds a `T` from its reduced form.
pub type ReconstructFn<T> = fn(Reduced) -> CaptureResult<T>;

/// Captured init arguments of one instance.
///
/// Starts uncaptured. The first successful [`InitArgs::capture`] stores the reconciled
/// call and flips the flag; every later capture on the same instance is a no-op. In an
/// initializer chain the most-derived initializer captures first, so the parent
/// initializers it delegates to leave its capture untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitArgs {
    captured: bool,
    call: CallArgs,
}

impl InitArgs {
    /// Creates an uncaptured cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the arguments have been captured.
    #[must_use]
    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// The captured call, or `None` before capture.
    #[must_use]
    pub fn call(&self) -> Option<&CallArgs> {
        self.captured.then_some(&self.call)
    }

    /// Captured positional arguments (empty before capture).
    #[must_use]
    pub fn args(&self) -> &[Object] {
        self.call.args()
    }

    /// Captured keyword arguments (empty before capture).
    #[must_use]
    pub fn kwargs(&self) -> &IndexMap<String, Object> {
        self.call.kwargs()
    }

    /// Captures the init arguments of `T` from its initializer's locals.
    ///
    /// This is the entry point a type's own initializer calls first thing; it resolves the
    /// signature from `T` itself.
    ///
    /// # Errors
    /// See [`reconcile_traced`](crate::reconcile_traced).
    pub fn capture_for<T: Serializable>(&mut self, locals: &Locals, omit: &OmitPolicy) -> CaptureResult<()> {
        self.capture_traced(&T::signature(), locals, omit, &mut NoopTracer)
    }

    /// Captures init arguments against an explicit signature. No-op if already captured.
    ///
    /// # Errors
    /// See [`reconcile_traced`](crate::reconcile_traced).
    pub fn capture(&mut self, signature: &Signature, locals: &Locals, omit: &OmitPolicy) -> CaptureResult<()> {
        self.capture_traced(signature, locals, omit, &mut NoopTracer)
    }

    /// Like [`InitArgs::capture`], reporting to `tracer`.
    ///
    /// The flag is only set once reconciliation succeeded, so a failed capture leaves the
    /// instance uncaptured.
    ///
    /// # Errors
    /// See [`reconcile_traced`](crate::reconcile_traced).
    pub fn capture_traced(
        &mut self,
        signature: &Signature,
        locals: &Locals,
        omit: &OmitPolicy,
        tracer: &mut impl CaptureTracer,
    ) -> CaptureResult<()> {
        let func = signature.unwrapped().name();
        if self.captured {
            tracer.on_capture_skipped(func);
            return Ok(());
        }
        self.call = reconcile_traced(signature, locals, omit, tracer)?;
        self.captured = true;
        tracer.on_capture(func);
        Ok(())
    }
}

/// The reduced form of a capturing instance: everything needed to rebuild it.
///
/// This is the argument tuple of the reduce protocol, `(type, args, kwargs, state)`.
/// The type is carried by name so the form can be written to a byte stream.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Reduced {
    /// [`Serializable::TYPE_NAME`] of the reduced type.
    pub type_name: String,
    /// Captured positional arguments.
    pub args: Vec<Object>,
    /// Captured keyword arguments.
    pub kwargs: IndexMap<String, Object>,
    /// Auxiliary state from [`Serializable::get_state`].
    pub state: StateDict,
}

impl Reduced {
    /// The captured call, `(args, kwargs)`.
    #[must_use]
    pub fn call(&self) -> CallArgs {
        CallArgs::from_parts(self.args.clone(), self.kwargs.clone())
    }

    /// Python `==` over all four parts.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.py_eq(b))
            && kwargs_py_eq(&self.kwargs, &other.kwargs)
            && kwargs_py_eq(&self.state, &other.state)
    }
}

/// A type that serializes itself by replaying its constructor arguments.
///
/// Implementors embed an [`InitArgs`], capture into it at the top of their initializer,
/// and expose it through [`Serializable::init_args`]. Reduce, reconstruct and copy are
/// then provided.
///
/// ```
/// use initargs::{CallArgs, CaptureResult, InitArgs, OmitPolicy, Serializable, Signature};
///
/// struct Greeting {
///     init: InitArgs,
///     name: String,
/// }
///
/// impl Serializable for Greeting {
///     const TYPE_NAME: &'static str = "Greeting";
///
///     fn signature() -> Signature {
///         Signature::builder("Greeting").arg("name").build().expect("valid signature")
///     }
///
///     fn construct(call: CallArgs) -> CaptureResult<Self> {
///         let locals = Self::signature().bind(call)?;
///         let mut init = InitArgs::new();
///         init.capture_for::<Self>(&locals, &OmitPolicy::None)?;
///         Ok(Self { init, name: locals.extract("name")? })
///     }
///
///     fn init_args(&self) -> &InitArgs {
///         &self.init
///     }
/// }
///
/// let hello = Greeting::construct(CallArgs::positional(["world"])).unwrap();
/// let copy = hello.copy_with([("name", "there")]).unwrap();
/// assert_eq!(copy.name, "there");
/// ```
pub trait Serializable: Sized {
    /// Stable name identifying the type in reduced forms and byte streams.
    const TYPE_NAME: &'static str;

    /// The initializer's declared signature.
    fn signature() -> Signature;

    /// The constructor: builds an instance from call arguments, i.e. `T(*args, **kwargs)`.
    ///
    /// Implementations typically bind `call` with [`Signature::bind`] and capture the result.
    fn construct(call: CallArgs) -> CaptureResult<Self>;

    /// The instance's capture cache.
    fn init_args(&self) -> &InitArgs;

    /// Override to save any persistent state into `state`.
    fn get_state(&self, _state: &mut StateDict) {}

    /// Override to restore persistent state from `state`.
    ///
    /// `copying` is true when called by [`Serializable::copy_with`]. Since overridden init
    /// arguments may differ from the original's, some saved state may no longer apply.
    fn set_state(&mut self, _state: &StateDict, _copying: bool) -> CaptureResult<()> {
        Ok(())
    }

    /// The reduce protocol: returns the reconstruction function and the reduced form.
    ///
    /// `reconstruct(reduced)` creates a new instance through [`Serializable::construct`]
    /// and then applies the saved state.
    ///
    /// # Errors
    /// Returns a `RuntimeError` if the instance never captured its arguments.
    fn reduce(&self) -> CaptureResult<(ReconstructFn<Self>, Reduced)> {
        let call = self
            .init_args()
            .call()
            .ok_or_else(|| ExcType::runtime_error_not_captured(Self::TYPE_NAME))?;
        let mut state = StateDict::new();
        self.get_state(&mut state);
        let reduced = Reduced {
            type_name: Self::TYPE_NAME.to_owned(),
            args: call.args().to_vec(),
            kwargs: call.kwargs().clone(),
            state,
        };
        Ok((reconstruct::<Self>, reduced))
    }

    /// Reduces this instance into an [`Object::Instance`], for nesting inside another
    /// capturing type's arguments or state.
    ///
    /// # Errors
    /// See [`Serializable::reduce`].
    fn to_object(&self) -> CaptureResult<Object> {
        let (_, reduced) = self.reduce()?;
        Ok(Object::from(reduced))
    }

    /// Creates a copy of this instance with the same arguments and state.
    ///
    /// # Errors
    /// See [`Serializable::copy_with`].
    fn copy(&self) -> CaptureResult<Self> {
        self.copy_with(std::iter::empty::<(String, Object)>())
    }

    /// Creates a copy of this instance, replacing some init argument values.
    ///
    /// `overrides` are keyed by parameter name. A value for a parameter held positionally
    /// replaces that slot; a value for the `*args` parameter replaces all trailing positional
    /// values; everything else is merged into the keyword arguments. Saved state is then
    /// transferred with `copying = true`.
    ///
    /// # Errors
    /// - `RuntimeError` if the instance never captured its arguments
    /// - `TypeError` if an override names no parameter (reported by the constructor as an
    ///   unexpected keyword argument), or if an `*args` override is not a sequence
    /// - anything the constructor or `set_state` raises
    fn copy_with<I, K, V>(&self, overrides: I) -> CaptureResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Object>,
    {
        let call = self
            .init_args()
            .call()
            .ok_or_else(|| ExcType::runtime_error_not_captured(Self::TYPE_NAME))?;
        let overrides: IndexMap<String, Object> = overrides.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let new_call = apply_overrides(&Self::signature(), call, overrides)?;
        let mut copied = Self::construct(new_call)?;

        let mut state = StateDict::new();
        self.get_state(&mut state);
        copied.set_state(&state, true)?;
        Ok(copied)
    }
}

/// Rebuilds a `T` from its reduced form: `T(*args, **kwargs)`, then `set_state(state, copying=false)`.
///
/// # Errors
/// - `TypeError` if `reduced` was produced by a different type
/// - anything the constructor or `set_state` raises
pub fn reconstruct<T: Serializable>(reduced: Reduced) -> CaptureResult<T> {
    if reduced.type_name != T::TYPE_NAME {
        return Err(CaptureError::new(
            ExcType::TypeError,
            format!("cannot reconstruct {} from a reduced {}", T::TYPE_NAME, reduced.type_name),
        ));
    }
    let Reduced { args, kwargs, state, .. } = reduced;
    let mut obj = T::construct(CallArgs::from_parts(args, kwargs))?;
    obj.set_state(&state, false)?;
    Ok(obj)
}

/// Rebuilds a `T` nested as an [`Object::Instance`].
///
/// # Errors
/// - `TypeError` if `value` is not an instance
/// - see [`reconstruct`]
pub fn from_object<T: Serializable>(value: &Object) -> CaptureResult<T> {
    match value {
        Object::Instance(reduced) => reconstruct(reduced.as_ref().clone()),
        other => Err(ExcType::type_error_expected(T::TYPE_NAME, "an instance", other.type_name())),
    }
}

/// Applies copy overrides to a captured call.
///
/// Walks the declared parameters in order. A parameter occupying a positional slot has the
/// slot replaced in place. An overridden `*args` replaces the trailing positional values and
/// ends the walk, since everything after it is keyword-only. If `*args` was empty at capture
/// time the positional-or-keyword parameters before it still sit in the keyword mapping; they
/// are moved in front of the new values so the call stays bindable. Leftover overrides are
/// merged into the keyword mapping.
fn apply_overrides(
    signature: &Signature,
    call: &CallArgs,
    mut overrides: IndexMap<String, Object>,
) -> CaptureResult<CallArgs> {
    let mut args = call.args().to_vec();
    let mut kwargs = call.kwargs().clone();
    if overrides.is_empty() {
        return Ok(CallArgs::from_parts(args, kwargs));
    }

    let signature = signature.unwrapped();
    let var_args_overridden = signature
        .var_positional()
        .is_some_and(|param| overrides.contains_key(param.name()));

    // No positional slots to consult
    if args.is_empty() && !var_args_overridden {
        kwargs.extend(overrides);
        return Ok(CallArgs::from_parts(args, kwargs));
    }

    let params = signature.params();
    for (index, param) in params.iter().enumerate() {
        if param.kind() == ParamKind::VarPositional {
            if let Some(replacement) = overrides.shift_remove(param.name()) {
                let values = replacement.as_sequence().ok_or_else(|| {
                    ExcType::type_error_expected(&format!("*{}", param.name()), "a sequence", replacement.type_name())
                })?;
                if !values.is_empty() && args.len() < index {
                    for earlier in &params[args.len()..index] {
                        let cached = kwargs.shift_remove(earlier.name());
                        let value = overrides
                            .shift_remove(earlier.name())
                            .or(cached)
                            .or_else(|| earlier.default().cloned())
                            .ok_or_else(|| ExcType::key_error_missing_local(earlier.name()))?;
                        args.push(value);
                    }
                }
                args.truncate(index);
                args.extend(values.iter().cloned());
            }
            break;
        }
        if index < args.len()
            && let Some(value) = overrides.shift_remove(param.name())
        {
            args[index] = value;
        }
    }

    kwargs.extend(overrides);
    Ok(CallArgs::from_parts(args, kwargs))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn varargs_signature() -> Signature {
        // def f(p, /, arg1, arg2="d2", *va, kw="dk")
        Signature::builder("f")
            .pos_only("p")
            .arg("arg1")
            .arg_default("arg2", "d2")
            .var_args("va")
            .kwonly_default("kw", "dk")
            .build()
            .unwrap()
    }

    fn overrides(pairs: &[(&str, Object)]) -> IndexMap<String, Object> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn no_overrides_is_identity() {
        let call = CallArgs::positional(["x"]).kwarg("kw", 1);
        let result = apply_overrides(&varargs_signature(), &call, IndexMap::new()).unwrap();
        assert_eq!(result, call);
    }

    #[test]
    fn positional_slot_replaced_in_place() {
        let call = CallArgs::positional(["p0", "a1", "a2", "v1"]).kwarg("kw", "dk");
        let result = apply_overrides(&varargs_signature(), &call, overrides(&[("arg1", "new".into())])).unwrap();
        assert_eq!(result, CallArgs::positional(["p0", "new", "a2", "v1"]).kwarg("kw", "dk"));
    }

    #[test]
    fn keyword_parameter_after_positional_only_goes_to_kwargs() {
        // va was empty: only `p` is positional, arg1/arg2 are keyword-mapped
        let call = CallArgs::positional(["p0"]).kwarg("arg1", "a1").kwarg("arg2", "d2").kwarg("kw", "dk");
        let result = apply_overrides(&varargs_signature(), &call, overrides(&[("arg2", "x".into())])).unwrap();
        assert_eq!(
            result,
            CallArgs::positional(["p0"]).kwarg("arg1", "a1").kwarg("arg2", "x").kwarg("kw", "dk")
        );
    }

    #[test]
    fn var_args_override_demotes_keyword_candidates() {
        let call = CallArgs::positional(["p0"]).kwarg("arg1", "a1").kwarg("kw", "dk");
        let result = apply_overrides(
            &varargs_signature(),
            &call,
            overrides(&[("va", Object::list(["v1"])), ("arg2", "x".into())]),
        )
        .unwrap();
        assert_eq!(result, CallArgs::positional(["p0", "a1", "x", "v1"]).kwarg("kw", "dk"));
    }

    #[test]
    fn var_args_override_moves_overridden_keyword_out_of_kwargs() {
        let call = CallArgs::positional(["p0"]).kwarg("arg1", "a1").kwarg("arg2", "d2").kwarg("kw", "dk");
        let result = apply_overrides(
            &varargs_signature(),
            &call,
            overrides(&[("arg1", "x".into()), ("va", Object::list(["v1"]))]),
        )
        .unwrap();
        assert_eq!(result, CallArgs::positional(["p0", "x", "d2", "v1"]).kwarg("kw", "dk"));
        assert!(varargs_signature().bind(result).is_ok());
    }

    #[test]
    fn var_args_override_must_be_sequence() {
        let call = CallArgs::positional(["p0", "a1", "a2", "v1"]);
        let err = apply_overrides(&varargs_signature(), &call, overrides(&[("va", 3.into())])).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);
        assert_eq!(err.message(), "*va must be a sequence, not int");
    }
}
