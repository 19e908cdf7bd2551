//! Statement and function invoker
//!
//! Calls a macro statement or function by name with extension values as
//! arguments. Each argument is coerced and parked in a fresh exchange
//! variable, the call expression refers to those variables, and every
//! variable is reset to `0` / `""` once the call is over.
//!
//! Inside a running macro the arguments travel through the exchange slot one
//! by one. An idle engine gets a single top-level macro holding the
//! arguments as literals, the call, and the resets.
//!
//! Exchange variable names combine a family id, chosen at random once per
//! invoker, with an instance number that only moves forward:
//! `#HmArg_<family>_<instance>`. Names are never reused within a process, and
//! two invokers sharing a macro run are unlikely to pick the same family.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;

use crate::error::{FunctionResult, MacroResult};
use crate::guard::ExecState;
use crate::value::{coerce, MacroValue, Value};
use crate::var::{fill_and_take, get_script, nothing_filled};
use crate::Hm;

/// One argument parked in the macro namespace for the duration of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeVariable {
    pub name: String,
    pub value: MacroValue,
}

/// Names exchange variables.
#[derive(Debug)]
pub struct Invoker {
    family: u16,
    next_instance: AtomicU32,
}

impl Invoker {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let family = rng.gen_range(1..=i16::MAX as u16);
        let first = rng.gen_range(1..=i16::MAX as u32);
        Self::with_family(family, first)
    }

    pub fn with_family(family: u16, first_instance: u32) -> Self {
        Self {
            family,
            next_instance: AtomicU32::new(first_instance),
        }
    }

    pub fn family(&self) -> u16 {
        self.family
    }

    /// Claim a fresh name for `value`.
    pub fn allocate(&self, value: MacroValue) -> ExchangeVariable {
        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}HmArg_{}_{}",
            value.namespace().prefix(),
            self.family,
            instance
        );
        ExchangeVariable { name, value }
    }
}

impl Default for Invoker {
    fn default() -> Self {
        Self::new()
    }
}

/// `name arg1, arg2;`
pub fn statement_expression(name: &str, args: &[ExchangeVariable]) -> String {
    if args.is_empty() {
        return format!("{};", name);
    }
    format!("{} {};", name, join_names(args))
}

/// `name(arg1, arg2)`
pub fn function_expression(name: &str, args: &[ExchangeVariable]) -> String {
    format!("{}({})", name, join_names(args))
}

fn join_names(args: &[ExchangeVariable]) -> String {
    args.iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The macro engine, as seen from the extension.
pub struct Macro<'a> {
    hm: &'a Hm,
}

impl<'a> Macro<'a> {
    pub fn new(hm: &'a Hm) -> Self {
        Self { hm }
    }

    pub fn is_executing(&self) -> bool {
        self.hm.guard().is_executing()
    }

    pub fn state(&self) -> ExecState {
        self.hm.guard().state()
    }

    /// Evaluate inside the running macro. Only legal while one runs.
    pub fn eval(&self, expression: &str) -> MacroResult {
        self.hm.guard().eval(expression)
    }

    /// Start a macro file. Only legal while no macro runs.
    pub fn exec_file(&self, path: impl AsRef<Path>) -> MacroResult {
        self.hm.guard().exec_file(path.as_ref())
    }

    /// Start macro text. Only legal while no macro runs.
    pub fn exec_eval(&self, expression: &str) -> MacroResult {
        self.hm.guard().exec_eval(expression)
    }

    /// Run the statement `name` for its effect.
    ///
    /// Returns the status of the underlying evaluation unchanged.
    pub fn statement(&self, name: &str, args: &[Value]) -> MacroResult {
        let vars = self.allocate(args);
        let expression = statement_expression(name, &vars);

        match self.state() {
            ExecState::Idle => self.hm.guard().exec_eval(&batch_script(&vars, &expression)),
            ExecState::Executing => {
                if let Err(result) = self.deposit(&vars) {
                    return result;
                }
                let result = self.hm.guard().eval(&expression);
                self.reset(&vars);
                result
            }
        }
    }

    /// Evaluate the function `name` and return its value.
    ///
    /// The value is an integer or a string according to the kind the read
    /// path reports.
    pub fn function(&self, name: &str, args: &[Value]) -> FunctionResult {
        let vars = self.allocate(args);
        let expression = function_expression(name, &vars);
        let read = get_script(self.hm.accessor(), &expression);

        let (result, filled) = match self.state() {
            ExecState::Idle => fill_and_take(&batch_script(&vars, &read), |s| {
                self.hm.guard().exec_eval(s)
            }),
            ExecState::Executing => {
                if let Err(result) = self.deposit(&vars) {
                    return FunctionResult {
                        value: None,
                        message: result.message,
                        error: result.error,
                    };
                }
                let taken = fill_and_take(&read, |s| self.hm.guard().eval(s));
                self.reset(&vars);
                taken
            }
        };

        let (value, error) = match (result.error, filled) {
            (Some(e), _) => (None, Some(e)),
            (None, Some(value)) => (Some(value), None),
            (None, None) => (None, Some(nothing_filled(&expression))),
        };
        FunctionResult {
            value,
            message: result.message,
            error,
        }
    }

    fn allocate(&self, args: &[Value]) -> Vec<ExchangeVariable> {
        args.iter()
            .map(|arg| self.hm.invoker().allocate(coerce(arg)))
            .collect()
    }

    /// Park every argument through the exchange slot. On failure the
    /// variables already written are reset.
    fn deposit(&self, vars: &[ExchangeVariable]) -> Result<(), MacroResult> {
        for (i, var) in vars.iter().enumerate() {
            if let Err(e) = self.hm.vars().set(&var.name, var.value.clone()) {
                self.reset(&vars[..i]);
                return Err(MacroResult::rejected(e));
            }
        }
        Ok(())
    }

    fn reset(&self, vars: &[ExchangeVariable]) {
        for var in vars {
            let zero = MacroValue::zero(var.value.namespace());
            if let Err(e) = self.hm.vars().set(&var.name, zero) {
                log::warn!("could not reset {}: {}", var.name, e);
            }
        }
    }
}

/// One top-level macro that parks the arguments as literals, runs `body`,
/// and resets the arguments.
///
/// Variables of a top-level macro end with it, so an idle engine gets the
/// whole call in a single run.
pub fn batch_script(args: &[ExchangeVariable], body: &str) -> String {
    let assign = |var: &ExchangeVariable, value: &MacroValue| {
        format!("{} = {};", var.name, value.literal())
    };

    let mut lines: Vec<String> = args.iter().map(|v| assign(v, &v.value)).collect();
    lines.push(body.to_string());
    lines.extend(
        args.iter()
            .map(|v| assign(v, &MacroValue::zero(v.value.namespace()))),
    );
    lines.join("\n")
}
