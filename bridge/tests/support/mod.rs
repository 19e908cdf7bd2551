//! In-memory host for integration tests.
//!
//! `FakeHost` implements the three host traits over plain state. It owns fake
//! global-memory handles, counts round-trips, and interprets the handful of
//! script shapes the bridge synthesizes: accessor creation and release,
//! `drain`/`fill` members, literal assignments, `insert`, the
//! `if (selecting)` block, and plain statements.
//!
//! Like the real engine, variables assigned by a top-level macro started
//! with a remote exec are gone once it ends.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use hmbridge::host::messages::{
    WM_COMMAND, WM_HIDEMARUINFO, WM_ISMACROEXECUTING, WM_REMOTE_EXECMACRO_FILE,
    WM_REMOTE_EXECMACRO_MEMORY,
};
use hmbridge::host::wide::{from_wide, to_wide};
use hmbridge::host::{
    CursorPos, GlobalHandle, HostExports, HostVersion, MessageTransport, Platform, Point,
    Unresolved, WindowHandle,
};
use hmbridge::config::BridgeConfig;
use hmbridge::{ExchangeAccessor, ExchangeSlot, Hm, Invoker, MacroValue, Namespace};
use parking_lot::{const_mutex, Mutex, MutexGuard};

pub const ACCESSOR: &str = "#_HmBridgeAccessor";
pub const MAIN_WINDOW: WindowHandle = WindowHandle(0x1000);
pub const PANE_WINDOW: WindowHandle = WindowHandle(0x2000);

/// Tests share the process-wide exchange slot
static SERIAL: Mutex<()> = const_mutex(());

pub type MacroFn = Box<dyn Fn(&[MacroValue]) -> Option<MacroValue> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertAt {
    Caret,
    All,
    Line,
    Selection,
}

#[derive(Default)]
pub struct FakeState {
    pub window: WindowHandle,
    pub executing: bool,
    pub vars: HashMap<String, MacroValue>,
    /// Every successful assignment, in order
    pub assignments: Vec<(String, MacroValue)>,
    pub functions: HashMap<String, MacroFn>,
    /// Statements run, with their resolved arguments
    pub statements: Vec<(String, Vec<MacroValue>)>,
    pub failing_statements: HashSet<String>,
    /// Editing commands run, in order
    pub effects: Vec<String>,
    pub scripts: Vec<String>,
    pub accessors_created: usize,
    pub accessors_released: usize,

    pub state_polls: usize,
    pub eval_calls: usize,
    pub remote_calls: Vec<(u32, String)>,
    pub reject_remote: bool,
    pub remote_response: Option<String>,

    pub total_text: String,
    pub selection: Option<String>,
    pub cursor: Option<CursorPos>,
    pub mouse: Option<Point>,
    pub mouse_cursor: Option<CursorPos>,
    pub file_path: String,
    pub queue_status: i32,
    pub encodings: HashMap<String, i32>,
    pub files: HashMap<String, String>,
    pub null_handles: bool,
    pub refuse_info: bool,

    handles: HashMap<isize, Box<[u16]>>,
    next_handle: isize,
    pub handles_issued: usize,
    pub freed: Vec<isize>,

    pub output_pane: WindowHandle,
    pub commands: Vec<(WindowHandle, usize)>,
    pub command_result: isize,
    /// Output pane push/pop calls, with the host window they named
    pub pane_calls: Vec<(&'static str, WindowHandle)>,
    pub pane_depth: i32,
}

impl FakeState {
    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    fn alloc(&mut self, text: &str) -> GlobalHandle {
        if self.null_handles {
            return GlobalHandle::NULL;
        }
        self.next_handle += 1;
        self.handles_issued += 1;
        let handle = 0x7000 + self.next_handle;
        self.handles
            .insert(handle, to_wide(text).into_boxed_slice());
        GlobalHandle(handle)
    }

    fn lines(&self) -> Vec<&str> {
        self.total_text.split('\n').collect()
    }

    // ------------------------------------------------------------------
    // Script interpreter
    // ------------------------------------------------------------------

    fn run_script(&mut self, script: &str) -> bool {
        self.scripts.push(script.to_string());

        let mut skipping = false;
        let mut at = InsertAt::Caret;
        for line in script.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if skipping {
                skipping = line != "}";
                continue;
            }
            if line == "if (selecting) {" {
                if self.selection.is_some() {
                    at = InsertAt::Selection;
                } else {
                    skipping = true;
                }
                continue;
            }
            if line == "}" {
                continue;
            }

            let Some(stmt) = line.strip_suffix(';') else {
                return false;
            };
            if !self.run_statement(stmt, &mut at) {
                return false;
            }
        }
        true
    }

    fn run_statement(&mut self, stmt: &str, at: &mut InsertAt) -> bool {
        match stmt {
            "begingroupundo" | "endgroupundo" => {
                self.effects.push(stmt.to_string());
                return true;
            }
            "selectall" => {
                *at = InsertAt::All;
                self.effects.push(stmt.to_string());
                return true;
            }
            "selectline" => {
                *at = InsertAt::Line;
                self.effects.push(stmt.to_string());
                return true;
            }
            _ => {}
        }

        if let Some(rest) = stmt.strip_prefix("moveto2 ") {
            self.effects.push(format!("moveto2 {}", rest));
            return true;
        }
        if stmt.starts_with("releaseobject(") {
            self.accessors_released += 1;
            return true;
        }
        if let Some(rest) = stmt.strip_prefix("insert member(") {
            if rest != format!("{}, \"drain\")", ACCESSOR) {
                return false;
            }
            let text = ExchangeAccessor::drain()
                .map(|v| v.to_string())
                .unwrap_or_default();
            self.insert(&text, *at);
            return true;
        }
        if let Some((name, rhs)) = stmt.split_once(" = ") {
            return self.assign(name.trim(), rhs.trim());
        }

        let (name, args) = stmt.split_once(' ').unwrap_or((stmt, ""));
        let Some(args) = self.eval_args(args) else {
            return false;
        };
        if self.failing_statements.contains(name) {
            return false;
        }
        self.statements.push((name.to_string(), args));
        true
    }

    fn assign(&mut self, name: &str, rhs: &str) -> bool {
        let Some(ns) = Namespace::of(name) else {
            return false;
        };

        if rhs.starts_with("createobject(") {
            self.accessors_created += 1;
            self.vars.insert(name.to_string(), MacroValue::Int(1));
            return true;
        }

        let drain = format!("member({}, \"drain\")", ACCESSOR);
        let fill = format!("member({}, \"fill\", ", ACCESSOR);

        let value = if rhs == drain {
            ExchangeAccessor::drain()
        } else if let Some(expr) = rhs.strip_prefix(&fill).and_then(|r| r.strip_suffix(')')) {
            let Some(value) = self.eval_expr(expr) else {
                return false;
            };
            Some(MacroValue::Int(i64::from(ExchangeAccessor::fill(value))))
        } else {
            self.eval_expr(rhs)
        };

        match value.and_then(|v| v.conform(ns)) {
            Some(v) => {
                self.assignments.push((name.to_string(), v.clone()));
                self.vars.insert(name.to_string(), v);
                true
            }
            None => false,
        }
    }

    fn eval_args(&self, args: &str) -> Option<Vec<MacroValue>> {
        let args = args.trim();
        if args.is_empty() {
            return Some(Vec::new());
        }
        args.split(',').map(|a| self.eval_expr(a.trim())).collect()
    }

    fn eval_expr(&self, expr: &str) -> Option<MacroValue> {
        let expr = expr.trim();
        if let Some(ns) = Namespace::of(expr) {
            return Some(
                self.vars
                    .get(expr)
                    .cloned()
                    .unwrap_or_else(|| MacroValue::zero(ns)),
            );
        }
        if let Some(inner) = expr.strip_prefix("@\"").and_then(|e| e.strip_suffix('"')) {
            return Some(MacroValue::Str(inner.replace("\"\"", "\"")));
        }
        if let Some(inner) = expr.strip_prefix('"').and_then(|e| e.strip_suffix('"')) {
            return Some(MacroValue::Str(inner.to_string()));
        }
        if let Ok(n) = expr.parse::<i64>() {
            return Some(MacroValue::Int(n));
        }
        if let Some((name, rest)) = expr.split_once('(') {
            let args = self.eval_args(rest.strip_suffix(')')?)?;
            let f = self.functions.get(name.trim())?;
            return f(&args);
        }
        None
    }

    fn insert(&mut self, text: &str, at: InsertAt) {
        match at {
            InsertAt::All => self.total_text = text.to_string(),
            InsertAt::Selection => {
                if let Some(sel) = self.selection.take() {
                    self.total_text = self.total_text.replacen(&sel, text, 1);
                }
            }
            InsertAt::Line => {
                let line_no = self.cursor.map_or(1, |c| c.line_no).max(1) as usize;
                let mut lines: Vec<String> = self.lines().iter().map(|l| l.to_string()).collect();
                if let Some(line) = lines.get_mut(line_no - 1) {
                    *line = text.to_string();
                }
                self.total_text = lines.join("\n");
            }
            InsertAt::Caret => self.total_text.push_str(text),
        }
        self.effects.push(format!("insert {}", text));
    }
}

pub struct FakeHost {
    pub state: Mutex<FakeState>,
    version: HostVersion,
    unbound: HashSet<&'static str>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::with_version(HostVersion(900.0))
    }

    pub fn with_version(version: HostVersion) -> Self {
        let state = FakeState {
            window: MAIN_WINDOW,
            output_pane: PANE_WINDOW,
            ..Default::default()
        };
        let mut unbound = HashSet::new();
        if !version.at_least(890) {
            unbound.insert("Hidemaru_AnalyzeEncoding");
            unbound.insert("Hidemaru_LoadFileUnicode");
        }
        Self {
            state: Mutex::new(state),
            version,
            unbound,
        }
    }

    /// Treat `symbol` as never resolved.
    pub fn unbind(mut self, symbol: &'static str) -> Self {
        self.unbound.insert(symbol);
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    pub fn set_executing(&self, executing: bool) {
        self.state.lock().executing = executing;
    }

    pub fn register_function<F>(&self, name: &str, f: F)
    where
        F: Fn(&[MacroValue]) -> Option<MacroValue> + Send + 'static,
    {
        self.state.lock().functions.insert(name.to_string(), Box::new(f));
    }

    /// Round-trips that reached the engine: evaluations plus remote execs.
    pub fn engine_calls(&self) -> usize {
        let state = self.state.lock();
        state.eval_calls + state.remote_calls.len()
    }

    pub fn var(&self, name: &str) -> Option<MacroValue> {
        self.state.lock().vars.get(name).cloned()
    }

    /// Last value any script assigned to `name`, even if its macro has ended.
    pub fn assigned(&self, name: &str) -> Option<MacroValue> {
        self.state
            .lock()
            .assignments
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn check(&self, symbol: &'static str) -> Result<(), Unresolved> {
        if self.unbound.contains(symbol) {
            Err(Unresolved(symbol))
        } else {
            Ok(())
        }
    }
}

impl HostExports for FakeHost {
    fn version(&self) -> HostVersion {
        self.version
    }

    fn is_bound(&self, symbol: &str) -> bool {
        !self.unbound.contains(symbol)
    }

    fn current_window_handle(&self) -> Result<WindowHandle, Unresolved> {
        self.check("Hidemaru_GetCurrentWindowHandle")?;
        Ok(self.state.lock().window)
    }

    fn total_text(&self) -> Result<GlobalHandle, Unresolved> {
        self.check("Hidemaru_GetTotalTextUnicode")?;
        let mut state = self.state.lock();
        let text = state.total_text.clone();
        Ok(state.alloc(&text))
    }

    fn selected_text(&self) -> Result<GlobalHandle, Unresolved> {
        self.check("Hidemaru_GetSelectedTextUnicode")?;
        let mut state = self.state.lock();
        let text = state.selection.clone().unwrap_or_default();
        Ok(state.alloc(&text))
    }

    fn line_text(&self, line_no: i32) -> Result<GlobalHandle, Unresolved> {
        self.check("Hidemaru_GetLineTextUnicode")?;
        let mut state = self.state.lock();
        let text = state
            .lines()
            .get((line_no.max(1) - 1) as usize)
            .map(|l| l.to_string())
            .unwrap_or_default();
        Ok(state.alloc(&text))
    }

    fn cursor_pos(&self) -> Result<Option<CursorPos>, Unresolved> {
        self.check("Hidemaru_GetCursorPosUnicode")?;
        Ok(self.state.lock().cursor)
    }

    fn cursor_pos_from_mouse(
        &self,
        _point: Option<Point>,
    ) -> Result<Option<CursorPos>, Unresolved> {
        self.check("Hidemaru_GetCursorPosUnicodeFromMousePos")?;
        Ok(self.state.lock().mouse_cursor)
    }

    fn eval_macro(&self, script: &[u16]) -> Result<i32, Unresolved> {
        self.check("Hidemaru_EvalMacro")?;
        let mut state = self.state.lock();
        state.eval_calls += 1;
        Ok(i32::from(state.run_script(&from_wide(script))))
    }

    fn check_queue_status(&self) -> Result<i32, Unresolved> {
        self.check("Hidemaru_CheckQueueStatus")?;
        Ok(self.state.lock().queue_status)
    }

    fn analyze_encoding(&self, path: &[u16]) -> Result<i32, Unresolved> {
        self.check("Hidemaru_AnalyzeEncoding")?;
        let state = self.state.lock();
        Ok(state.encodings.get(&from_wide(path)).copied().unwrap_or(0))
    }

    fn load_file_unicode(
        &self,
        path: &[u16],
        _hm_encode: i32,
    ) -> Result<(GlobalHandle, usize), Unresolved> {
        self.check("Hidemaru_LoadFileUnicode")?;
        let mut state = self.state.lock();
        match state.files.get(&from_wide(path)).cloned() {
            Some(text) => {
                let len = text.encode_utf16().count();
                Ok((state.alloc(&text), len))
            }
            None => Ok((GlobalHandle::NULL, 0)),
        }
    }

    fn output_pane_window(&self, host: WindowHandle) -> Result<WindowHandle, Unresolved> {
        self.check("GetWindowHandle")?;
        let state = self.state.lock();
        if host == state.window {
            Ok(state.output_pane)
        } else {
            Ok(WindowHandle::NULL)
        }
    }

    fn output_pane_push(&self, host: WindowHandle) -> Result<i32, Unresolved> {
        self.check("Push")?;
        let mut state = self.state.lock();
        state.pane_calls.push(("push", host));
        state.pane_depth += 1;
        Ok(1)
    }

    fn output_pane_pop(&self, host: WindowHandle) -> Result<i32, Unresolved> {
        self.check("Pop")?;
        let mut state = self.state.lock();
        state.pane_calls.push(("pop", host));
        if state.pane_depth == 0 {
            return Ok(0);
        }
        state.pane_depth -= 1;
        Ok(1)
    }
}

impl MessageTransport for FakeHost {
    fn send(&self, target: WindowHandle, msg: u32, wparam: usize, _lparam: isize) -> isize {
        let mut state = self.state.lock();
        match msg {
            WM_ISMACROEXECUTING if target == state.window => {
                state.state_polls += 1;
                isize::from(state.executing)
            }
            WM_COMMAND => {
                state.commands.push((target, wparam));
                state.command_result
            }
            _ => 0,
        }
    }

    fn send_buffers(
        &self,
        target: WindowHandle,
        msg: u32,
        response: &mut [u16],
        request: &[u16],
    ) -> bool {
        let mut state = self.state.lock();
        if target != state.window {
            return false;
        }

        let request = from_wide(request);
        state.remote_calls.push((msg, request.clone()));
        let ok = match msg {
            WM_REMOTE_EXECMACRO_MEMORY if !state.reject_remote => {
                let outer = state.vars.clone();
                let ok = state.run_script(&request);
                state.vars = outer;
                ok
            }
            WM_REMOTE_EXECMACRO_FILE => !state.reject_remote,
            _ => false,
        };

        if let Some(text) = &state.remote_response {
            let wide = to_wide(text);
            let n = wide.len().min(response.len());
            response[..n].copy_from_slice(&wide[..n]);
        }
        ok
    }

    fn send_out_buffer(
        &self,
        target: WindowHandle,
        msg: u32,
        wparam: usize,
        response: &mut [u16],
    ) -> bool {
        let state = self.state.lock();
        if target != state.window || msg != WM_HIDEMARUINFO || wparam != 4 {
            return false;
        }
        let wide = to_wide(&state.file_path);
        let n = wide.len().min(response.len());
        response[..n].copy_from_slice(&wide[..n]);
        !state.refuse_info
    }
}

impl Platform for FakeHost {
    fn global_lock(&self, handle: GlobalHandle) -> *const u16 {
        self.state
            .lock()
            .handles
            .get(&handle.0)
            .map_or(std::ptr::null(), |text| text.as_ptr())
    }

    fn global_unlock(&self, _handle: GlobalHandle) -> bool {
        true
    }

    fn global_free(&self, handle: GlobalHandle) -> bool {
        let mut state = self.state.lock();
        state.freed.push(handle.0);
        state.handles.remove(&handle.0).is_some()
    }

    fn screen_cursor_pos(&self) -> Option<Point> {
        self.state.lock().mouse
    }
}

pub fn slot_is_empty() -> bool {
    ExchangeSlot::take().is_none()
}

pub fn config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.accessor.assembly_path = Some(PathBuf::from("/ext/hmbridge.dll"));
    config
}

/// Test fixture: the serialization guard, the fake, and a bridge over it
/// with exchange variables named `HmArg_7_<n>` from `n = 100`.
pub struct Fixture {
    _serial: MutexGuard<'static, ()>,
    pub fake: Arc<FakeHost>,
    pub hm: Hm,
}

pub fn setup() -> Fixture {
    setup_with(FakeHost::new())
}

pub fn setup_with(fake: FakeHost) -> Fixture {
    let serial = SERIAL.lock();
    hmbridge::logging::init_test();
    hmbridge::ExchangeSlot::clear();

    let fake = Arc::new(fake);
    let hm = Hm::with_invoker(fake.clone(), &config(), Invoker::with_family(7, 100));
    Fixture {
        _serial: serial,
        fake,
        hm,
    }
}
