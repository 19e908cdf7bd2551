//! Variable bridge against the in-memory host.

mod support;

use hmbridge::{BridgeError, MacroValue};
use support::{setup, slot_is_empty};

#[test]
fn test_set_bool_into_text_variable() {
    let fx = setup();
    fx.hm.vars().set("$flag", true).unwrap();

    assert_eq!(fx.fake.assigned("$flag"), Some(MacroValue::Str("1".into())));
    assert!(slot_is_empty());
}

#[test]
fn test_set_float_truncates_into_numeric_variable() {
    let fx = setup();
    fx.hm.vars().set("#n", 3.7f64).unwrap();
    assert_eq!(fx.fake.assigned("#n"), Some(MacroValue::Int(3)));

    fx.hm.vars().set("#n", -2.9f64).unwrap();
    assert_eq!(fx.fake.assigned("#n"), Some(MacroValue::Int(-2)));
}

#[test]
fn test_numeric_strings_and_integers_cross_namespaces() {
    let fx = setup();
    fx.hm.vars().set("#n", "42").unwrap();
    assert_eq!(fx.fake.assigned("#n"), Some(MacroValue::Int(42)));

    fx.hm.vars().set("$s", 7i64).unwrap();
    assert_eq!(fx.fake.assigned("$s"), Some(MacroValue::Str("7".into())));
}

#[test]
fn test_text_into_numeric_variable_is_rejected_before_the_host() {
    let fx = setup();
    let err = fx.hm.vars().set("#n", "hello").unwrap_err();

    assert!(matches!(err, BridgeError::MarshalFailure(_)));
    assert_eq!(fx.fake.engine_calls(), 0);
    assert_eq!(fx.fake.assigned("#n"), None);
}

#[test]
fn test_name_without_prefix_is_rejected() {
    let fx = setup();
    assert!(matches!(
        fx.hm.vars().set("plain", 1i64),
        Err(BridgeError::MarshalFailure(_))
    ));
    assert!(matches!(
        fx.hm.vars().get("plain"),
        Err(BridgeError::MarshalFailure(_))
    ));
    assert_eq!(fx.fake.engine_calls(), 0);
}

#[test]
fn test_get_returns_the_namespace_kind() {
    let fx = setup();
    {
        let mut state = fx.fake.state();
        state.vars.insert("#count".into(), MacroValue::Int(12));
        state.vars.insert("$name".into(), MacroValue::Str("秀丸".into()));
    }

    assert_eq!(fx.hm.vars().get("#count").unwrap(), MacroValue::Int(12));
    assert_eq!(
        fx.hm.vars().get("$name").unwrap(),
        MacroValue::Str("秀丸".into())
    );
    // unset variables read as the namespace zero
    assert_eq!(fx.hm.vars().get("#missing").unwrap(), MacroValue::Int(0));
    assert_eq!(
        fx.hm.vars().get("$missing").unwrap(),
        MacroValue::Str(String::new())
    );
    assert!(slot_is_empty());
}

#[test]
fn test_read_evaluates_expressions() {
    let fx = setup();
    fx.fake.register_function("strlen", |args| match args {
        [MacroValue::Str(s)] => Some(MacroValue::Int(s.chars().count() as i64)),
        _ => None,
    });
    fx.fake
        .state()
        .vars
        .insert("$s".into(), MacroValue::Str("hello".into()));

    assert_eq!(fx.hm.vars().read("strlen($s)").unwrap(), MacroValue::Int(5));
    // the result variable is reset by the script itself
    assert_eq!(fx.fake.assigned("#_HmBridgeResult"), Some(MacroValue::Int(0)));
}

#[test]
fn test_idle_engine_uses_remote_exec() {
    let fx = setup();
    fx.hm.vars().set("#n", 1i64).unwrap();

    let state = fx.fake.state();
    assert_eq!(state.eval_calls, 0);
    assert_eq!(state.remote_calls.len(), 1);
    assert_eq!(state.accessors_created, 1);
    assert_eq!(state.accessors_released, 1);
}

#[test]
fn test_running_engine_uses_eval() {
    let fx = setup();
    fx.fake.set_executing(true);
    fx.hm.vars().set("#n", 1i64).unwrap();
    assert_eq!(fx.hm.vars().get("#n").unwrap(), MacroValue::Int(1));

    let state = fx.fake.state();
    assert_eq!(state.eval_calls, 2);
    assert!(state.remote_calls.is_empty());
}

#[test]
fn test_failed_script_clears_the_slot() {
    let fx = setup();
    fx.fake.state().reject_remote = true;

    let err = fx.hm.vars().set("$s", "text").unwrap_err();
    assert!(matches!(err, BridgeError::MacroFailure(_)));
    assert!(slot_is_empty());

    assert!(fx.hm.vars().get("$s").is_err());
    assert!(slot_is_empty());
}

#[test]
fn test_numeric_looking_text_is_stored_verbatim() {
    let fx = setup();
    fx.hm.vars().set("$ver", "8.90").unwrap();
    assert_eq!(fx.fake.assigned("$ver"), Some(MacroValue::Str("8.90".into())));

    fx.hm.vars().set("$zip", "007").unwrap();
    assert_eq!(fx.fake.assigned("$zip"), Some(MacroValue::Str("007".into())));

    fx.hm.vars().set("$pad", " 42 ").unwrap();
    assert_eq!(fx.fake.assigned("$pad"), Some(MacroValue::Str(" 42 ".into())));
}

#[test]
fn test_set_then_get_inside_running_macro() {
    let fx = setup();
    fx.fake.set_executing(true);
    let vars = fx.hm.vars();

    vars.set("$x", true).unwrap();
    assert_eq!(vars.get("$x").unwrap(), MacroValue::Str("1".into()));

    vars.set("#n", 3.7f64).unwrap();
    assert_eq!(vars.get("#n").unwrap(), MacroValue::Int(3));

    vars.set("#n", "42").unwrap();
    assert_eq!(vars.get("#n").unwrap(), MacroValue::Int(42));

    vars.set("$s", "8.90").unwrap();
    assert_eq!(vars.get("$s").unwrap(), MacroValue::Str("8.90".into()));

    vars.set("#n", i64::MAX).unwrap();
    assert_eq!(vars.get("#n").unwrap(), MacroValue::Int(i64::MAX));

    vars.set("$s", "こんにちは").unwrap();
    assert_eq!(vars.get("$s").unwrap(), MacroValue::Str("こんにちは".into()));

    assert!(slot_is_empty());
}

#[test]
fn test_variables_set_by_a_remote_exec_end_with_it() {
    let fx = setup();
    fx.hm.vars().set("#n", 5i64).unwrap();

    assert_eq!(fx.fake.assigned("#n"), Some(MacroValue::Int(5)));
    assert_eq!(fx.fake.var("#n"), None);
    assert_eq!(fx.hm.vars().get("#n").unwrap(), MacroValue::Int(0));
}
