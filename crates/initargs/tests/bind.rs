//! Tests for binding call arguments to a signature and for signature validation.
//!
//! Error messages follow CPython's wording so that failures read the same as the
//! equivalent Python call would.

use initargs::{CallArgs, DictPairs, ExcType, Object, Param, ParamKind, Signature};
use pretty_assertions::assert_eq;

/// `def f(p, /, arg1, arg2="d2", *va, kw, kw2="dk2", **extra)`
fn full() -> Signature {
    Signature::builder("f")
        .pos_only("p")
        .arg("arg1")
        .arg_default("arg2", "d2")
        .var_args("va")
        .kwonly("kw")
        .kwonly_default("kw2", "dk2")
        .var_kwargs("extra")
        .build()
        .unwrap()
}

fn bind_err(signature: &Signature, call: CallArgs) -> String {
    let err = signature.bind(call).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
    err.message().to_owned()
}

#[test]
fn bind_fills_every_parameter_in_declaration_order() {
    let locals = full()
        .bind(CallArgs::positional(["p0", "a1"]).kwarg("kw", "k"))
        .unwrap();
    let names: Vec<&str> = locals.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["p", "arg1", "arg2", "va", "kw", "kw2", "extra"]);
    assert_eq!(locals.get("arg2").unwrap(), &Object::from("d2"));
    assert_eq!(locals.get("va").unwrap(), &Object::tuple(Vec::<Object>::new()));
    assert_eq!(locals.get("extra").unwrap(), &Object::dict(DictPairs::default()));
}

#[test]
fn bind_collects_var_args_and_var_kwargs() {
    let locals = full()
        .bind(
            CallArgs::positional(["p0", "a1", "a2", "v1", "v2"])
                .kwarg("kw", "k")
                .kwarg("other", 7),
        )
        .unwrap();
    assert_eq!(locals.get("va").unwrap(), &Object::tuple(["v1", "v2"]));
    assert_eq!(
        locals.get("extra").unwrap(),
        &Object::dict(vec![(Object::from("other"), Object::from(7))])
    );
}

#[test]
fn positional_only_name_is_absorbed_by_var_kwargs() {
    let locals = full()
        .bind(CallArgs::positional(["p0", "a1"]).kwarg("kw", "k").kwarg("p", "again"))
        .unwrap();
    assert_eq!(locals.get("p").unwrap(), &Object::from("p0"));
    assert_eq!(
        locals.get("extra").unwrap(),
        &Object::dict(vec![(Object::from("p"), Object::from("again"))])
    );
}

#[test]
fn too_many_positional() {
    let signature = Signature::builder("Point").arg("x").arg("y").build().unwrap();
    assert_eq!(
        bind_err(&signature, CallArgs::positional([1, 2, 3])),
        "Point() takes 2 positional arguments but 3 were given"
    );
}

#[test]
fn unexpected_keyword() {
    let signature = Signature::builder("Point").arg("x").build().unwrap();
    assert_eq!(
        bind_err(&signature, CallArgs::positional([1]).kwarg("z", 2)),
        "Point() got an unexpected keyword argument 'z'"
    );
}

#[test]
fn multiple_values_for_argument() {
    let signature = Signature::builder("Point").arg("x").arg("y").build().unwrap();
    assert_eq!(
        bind_err(&signature, CallArgs::positional([1, 2]).kwarg("x", 3)),
        "Point() got multiple values for argument 'x'"
    );
}

#[test]
fn positional_only_passed_as_keyword() {
    let signature = Signature::builder("f").pos_only("p").build().unwrap();
    assert_eq!(
        bind_err(&signature, CallArgs::new().kwarg("p", 1)),
        "f() got some positional-only arguments passed as keyword arguments: 'p'"
    );
}

#[test]
fn missing_required_arguments() {
    let signature = Signature::builder("f")
        .arg("a")
        .arg("b")
        .arg("c")
        .kwonly("k")
        .build()
        .unwrap();
    assert_eq!(
        bind_err(&signature, CallArgs::new().kwarg("k", 1)),
        "f() missing 3 required positional arguments: 'a', 'b', and 'c'"
    );
    assert_eq!(
        bind_err(&signature, CallArgs::positional([1, 2, 3])),
        "f() missing 1 required keyword-only argument: 'k'"
    );
}

#[test]
fn builder_rejects_duplicate_names() {
    let err = Signature::builder("f").arg("x").kwonly("x").build().unwrap_err();
    assert_eq!(err.exc_type(), ExcType::ValueError);
    assert_eq!(err.message(), "duplicate parameter name: 'x'");
}

#[test]
fn builder_rejects_wrong_order() {
    let err = Signature::builder("f").kwonly("k").arg("a").build().unwrap_err();
    assert_eq!(err.exc_type(), ExcType::ValueError);
    assert!(err.message().starts_with("wrong parameter order"));
}

#[test]
fn builder_rejects_second_var_args() {
    let err = Signature::builder("f").var_args("a").var_args("b").build().unwrap_err();
    assert_eq!(err.exc_type(), ExcType::ValueError);
}

#[test]
fn builder_rejects_required_after_default() {
    let err = Signature::builder("f").arg_default("a", 1).arg("b").build().unwrap_err();
    assert_eq!(err.message(), "non-default argument follows default argument");
}

#[test]
fn keyword_only_may_follow_defaults() {
    let signature = Signature::builder("f").arg_default("a", 1).kwonly("b").build();
    assert!(signature.is_ok());
}

#[test]
fn variadic_parameters_cannot_have_defaults() {
    let err = Signature::new(
        "f",
        vec![Param::with_default("va", ParamKind::VarPositional, Object::tuple([1]))],
    )
    .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::ValueError);
}

#[test]
fn lookup_helpers() {
    let signature = full();
    assert_eq!(signature.var_positional().map(Param::name), Some("va"));
    assert_eq!(signature.var_keyword().map(Param::name), Some("extra"));
    assert_eq!(signature.param("kw2").and_then(Param::default), Some(&Object::from("dk2")));
    assert!(signature.param("missing").is_none());
}
