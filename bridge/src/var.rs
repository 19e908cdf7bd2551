//! Variable bridge
//!
//! Typed get/set of macro variables. Values travel through the exchange slot
//! and a short synthesized script that creates the accessor object:
//!
//! ```text
//! set:  #_HmBridgeAccessor = createobject(@"<path>", @"<class>");
//!       $name = member(#_HmBridgeAccessor, "drain");
//!       releaseobject(#_HmBridgeAccessor);
//!
//! get:  #_HmBridgeAccessor = createobject(@"<path>", @"<class>");
//!       #_HmBridgeResult = member(#_HmBridgeAccessor, "fill", <expression>);
//!       releaseobject(#_HmBridgeAccessor);
//!       #_HmBridgeResult = 0;
//! ```
//!
//! The slot is cleared after every operation whatever the outcome.

use crate::error::{BridgeError, MacroResult, Result};
use crate::exchange::{AccessorLocator, ExchangeSlot};
use crate::value::{coerce, MacroValue, Namespace, Value};
use crate::Hm;

pub const ACCESSOR_VAR: &str = "#_HmBridgeAccessor";
pub const RESULT_VAR: &str = "#_HmBridgeResult";

/// Accessor member that returns the slot's value to macro code
pub const DRAIN: &str = "drain";
/// Accessor member that stores a macro value into the slot
pub const FILL: &str = "fill";

pub(crate) fn accessor_create(locator: &AccessorLocator) -> String {
    let target = locator.resolve();
    format!(
        "{} = createobject(@\"{}\", @\"{}\");",
        ACCESSOR_VAR,
        target.path.display(),
        target.class
    )
}

pub(crate) fn accessor_release() -> String {
    format!("releaseobject({});", ACCESSOR_VAR)
}

/// Script that assigns the slot's value to `name`.
pub fn set_script(locator: &AccessorLocator, name: &str) -> String {
    format!(
        "{}\n{} = member({}, \"{}\");\n{}",
        accessor_create(locator),
        name,
        ACCESSOR_VAR,
        DRAIN,
        accessor_release()
    )
}

/// Script that evaluates `expression` and stores the result in the slot.
pub fn get_script(locator: &AccessorLocator, expression: &str) -> String {
    format!(
        "{}\n{} = member({}, \"{}\", {});\n{}\n{} = 0;",
        accessor_create(locator),
        RESULT_VAR,
        ACCESSOR_VAR,
        FILL,
        expression,
        accessor_release(),
        RESULT_VAR
    )
}

/// Put `value` in the slot, run `script`, and clear the slot again.
pub(crate) fn deposit_and_run(hm: &Hm, value: MacroValue, script: &str) -> MacroResult {
    ExchangeSlot::store(value);
    let result = hm.guard().run(script);
    ExchangeSlot::clear();
    result
}

/// Macro variables of the running (or next) macro.
pub struct Vars<'a> {
    hm: &'a Hm,
}

impl<'a> Vars<'a> {
    pub fn new(hm: &'a Hm) -> Self {
        Self { hm }
    }

    /// Assign `value` to the variable `name`.
    ///
    /// Strings go into `$` names unchanged. Anything else is coerced first
    /// and then has to fit the namespace the name prefix selects: integers
    /// fit `$` names as their decimal form, strings that are not numbers
    /// never fit `#` names.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let ns = namespace_of(name)?;
        let coerced = match (ns, value.into()) {
            (Namespace::Text, Value::Str(s)) => MacroValue::Str(s),
            (_, value) => coerce(&value).conform(ns).ok_or_else(|| {
                BridgeError::MarshalFailure(format!("'{}' cannot hold {:?}", name, value))
            })?,
        };

        let script = set_script(self.hm.accessor(), name);
        deposit_and_run(self.hm, coerced, &script)
            .into_result()
            .map(|_| ())
    }

    /// Read the variable `name`: an integer for `#` names, a string for `$`.
    pub fn get(&self, name: &str) -> Result<MacroValue> {
        let ns = namespace_of(name)?;
        let value = self.read(name)?;
        let kind = value.namespace();
        value.conform(ns).ok_or_else(|| {
            BridgeError::MarshalFailure(format!(
                "'{}' read back a {:?} value",
                name, kind
            ))
        })
    }

    /// Evaluate any read expression and return its value.
    ///
    /// The kind of the result is whatever the accessor was filled with.
    pub fn read(&self, expression: &str) -> Result<MacroValue> {
        let script = get_script(self.hm.accessor(), expression);
        let (result, filled) = fill_and_take(&script, |s| self.hm.guard().run(s));

        result.into_result()?;
        filled.ok_or_else(|| nothing_filled(expression))
    }
}

/// Run a script that fills the slot and take what it left there.
pub(crate) fn fill_and_take(
    script: &str,
    run: impl FnOnce(&str) -> MacroResult,
) -> (MacroResult, Option<MacroValue>) {
    ExchangeSlot::clear();
    let result = run(script);
    (result, ExchangeSlot::take())
}

pub(crate) fn nothing_filled(expression: &str) -> BridgeError {
    BridgeError::MarshalFailure(format!("no value came back for '{}'", expression))
}

fn namespace_of(name: &str) -> Result<Namespace> {
    Namespace::of(name).ok_or_else(|| {
        BridgeError::MarshalFailure(format!("'{}' is not a macro variable name", name))
    })
}
