//! Execution-state guard
//!
//! The macro engine is either idle or running a script. Code can be
//! evaluated inside a running script only while one runs (`eval`), and a new
//! top-level script can be started only while none runs (`exec_file`,
//! `exec_eval`). The guard only observes the state by polling the host; it
//! never changes it.
//!
//! The host may change state between the poll and the action that follows.
//! Every gated entry point polls immediately before acting to keep that
//! window small, but the race itself cannot be closed from this side.

use std::fmt;
use std::path::Path;

use hmbridge_host::messages::{
    WM_ISMACROEXECUTING, WM_REMOTE_EXECMACRO_FILE, WM_REMOTE_EXECMACRO_MEMORY,
};
use hmbridge_host::wide::to_wide;

use crate::error::{BridgeError, MacroResult};
use crate::host_call::remote_exec;
use crate::Hm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Idle,
    Executing,
}

impl fmt::Display for ExecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecState::Idle => write!(f, "idle"),
            ExecState::Executing => write!(f, "executing"),
        }
    }
}

pub struct ExecutionGuard<'a> {
    hm: &'a Hm,
}

impl<'a> ExecutionGuard<'a> {
    pub fn new(hm: &'a Hm) -> Self {
        Self { hm }
    }

    /// Poll the host for the engine state.
    ///
    /// A host without a main window is treated as idle.
    pub fn state(&self) -> ExecState {
        let Some(hwnd) = self.hm.window_handle() else {
            return ExecState::Idle;
        };

        if self.hm.host().send(hwnd, WM_ISMACROEXECUTING, 0, 0) != 0 {
            ExecState::Executing
        } else {
            ExecState::Idle
        }
    }

    pub fn is_executing(&self) -> bool {
        self.state() == ExecState::Executing
    }

    /// `Ok` when the engine is in `expected` right now.
    pub fn require(&self, expected: ExecState) -> Result<(), BridgeError> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(BridgeError::StateViolation { expected, actual })
        }
    }

    /// Evaluate `expression` inside the running macro.
    pub fn eval(&self, expression: &str) -> MacroResult {
        if let Err(e) = self.require(ExecState::Executing) {
            return MacroResult::rejected(e);
        }

        log::debug!("eval:\n{}", expression);
        match self.hm.host().eval_macro(&to_wide(expression)) {
            Ok(0) => MacroResult::failed(
                "",
                BridgeError::MacroFailure("host rejected the evaluated macro".to_string()),
            ),
            Ok(status) => MacroResult::ok(status, ""),
            Err(e) => MacroResult::failed("", e.into()),
        }
    }

    /// Start the macro file at `path` as a new top-level macro.
    pub fn exec_file(&self, path: &Path) -> MacroResult {
        if let Err(e) = self.require(ExecState::Idle) {
            return MacroResult::rejected(e);
        }
        if !path.exists() {
            return MacroResult::rejected(BridgeError::NotFound(path.to_path_buf()));
        }

        log::debug!("exec file: {}", path.display());
        remote_exec(self.hm, WM_REMOTE_EXECMACRO_FILE, &path.to_string_lossy())
    }

    /// Start `expression` as a new top-level macro.
    pub fn exec_eval(&self, expression: &str) -> MacroResult {
        if let Err(e) = self.require(ExecState::Idle) {
            return MacroResult::rejected(e);
        }

        log::debug!("exec eval:\n{}", expression);
        remote_exec(self.hm, WM_REMOTE_EXECMACRO_MEMORY, expression)
    }

    /// Run `script` in whichever mode the current state permits.
    pub fn run(&self, script: &str) -> MacroResult {
        match self.state() {
            ExecState::Executing => self.eval(script),
            ExecState::Idle => self.exec_eval(script),
        }
    }
}
