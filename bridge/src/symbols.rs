//! Symbol Resolver - late binding of host exports
//!
//! The host executable's location is only known at run time, so its exports
//! are resolved by name with `libloading` once per process and kept as typed
//! function pointer slots. Exports newer than the host stay unbound; every
//! call site checks its slot.
//!
//! Binding never fails as a whole. A module that cannot be loaded or a symbol
//! that cannot be found is logged and leaves the matching slots empty.

use std::collections::HashSet;
use std::path::Path;

use hmbridge_host::{declare_host_exports, HostExportDesc, HostVersion, Point};
use libloading::Library;

declare_host_exports! {
    HIDEMARU_EXPORTS;
    GET_CURRENT_WINDOW_HANDLE => "Hidemaru_GetCurrentWindowHandle", required;
    GET_TOTAL_TEXT => "Hidemaru_GetTotalTextUnicode", required;
    GET_SELECTED_TEXT => "Hidemaru_GetSelectedTextUnicode", required;
    GET_LINE_TEXT => "Hidemaru_GetLineTextUnicode", required;
    GET_CURSOR_POS => "Hidemaru_GetCursorPosUnicode", required;
    GET_CURSOR_POS_FROM_MOUSE => "Hidemaru_GetCursorPosUnicodeFromMousePos", required;
    EVAL_MACRO => "Hidemaru_EvalMacro", required;
    CHECK_QUEUE_STATUS => "Hidemaru_CheckQueueStatus", required;
    ANALYZE_ENCODING => "Hidemaru_AnalyzeEncoding", optional(890);
    LOAD_FILE_UNICODE => "Hidemaru_LoadFileUnicode", optional(890);
    OUTPUT_PANE_WINDOW => "GetWindowHandle" in "HmOutputPane.dll", optional;
    OUTPUT_PANE_PUSH => "Push" in "HmOutputPane.dll", optional;
    OUTPUT_PANE_POP => "Pop" in "HmOutputPane.dll", optional;
}

pub type GetWindowHandleFn = unsafe extern "system" fn() -> isize;
pub type GetTextFn = unsafe extern "system" fn() -> isize;
pub type GetLineTextFn = unsafe extern "system" fn(line_no: i32) -> isize;
pub type GetCursorPosFn = unsafe extern "system" fn(line_no: *mut i32, column: *mut i32) -> i32;
pub type GetCursorPosFromMouseFn =
    unsafe extern "system" fn(point: *const Point, line_no: *mut i32, column: *mut i32) -> i32;
pub type EvalMacroFn = unsafe extern "system" fn(script: *const u16) -> i32;
pub type CheckQueueStatusFn = unsafe extern "system" fn() -> i32;
pub type AnalyzeEncodingFn =
    unsafe extern "system" fn(path: *const u16, lparam1: isize, lparam2: isize) -> i32;
pub type LoadFileUnicodeFn = unsafe extern "system" fn(
    path: *const u16,
    hm_encode: i32,
    len_out: *mut i32,
    lparam1: isize,
    lparam2: isize,
) -> isize;
pub type OutputPaneWindowFn = unsafe extern "system" fn(host: isize) -> isize;
pub type OutputPaneStackFn = unsafe extern "system" fn(host: isize) -> i32;

/// Resolved host exports.
///
/// Function pointers stay valid as long as the binding holds the modules
/// they came from.
pub struct HostBinding {
    version: HostVersion,
    /// Loaded modules (kept alive for the function pointers)
    _modules: Vec<Library>,
    bound: HashSet<&'static str>,

    pub get_current_window_handle: Option<GetWindowHandleFn>,
    pub get_total_text: Option<GetTextFn>,
    pub get_selected_text: Option<GetTextFn>,
    pub get_line_text: Option<GetLineTextFn>,
    pub get_cursor_pos: Option<GetCursorPosFn>,
    pub get_cursor_pos_from_mouse: Option<GetCursorPosFromMouseFn>,
    pub eval_macro: Option<EvalMacroFn>,
    pub check_queue_status: Option<CheckQueueStatusFn>,
    pub analyze_encoding: Option<AnalyzeEncodingFn>,
    pub load_file_unicode: Option<LoadFileUnicodeFn>,
    pub output_pane_window: Option<OutputPaneWindowFn>,
    pub output_pane_push: Option<OutputPaneStackFn>,
    pub output_pane_pop: Option<OutputPaneStackFn>,
}

impl HostBinding {
    /// A binding with every slot empty.
    pub fn unbound(version: HostVersion) -> Self {
        Self {
            version,
            _modules: Vec::new(),
            bound: HashSet::new(),
            get_current_window_handle: None,
            get_total_text: None,
            get_selected_text: None,
            get_line_text: None,
            get_cursor_pos: None,
            get_cursor_pos_from_mouse: None,
            eval_macro: None,
            check_queue_status: None,
            analyze_encoding: None,
            load_file_unicode: None,
            output_pane_window: None,
            output_pane_push: None,
            output_pane_pop: None,
        }
    }

    /// Load the host module at `host_path` and resolve its exports for a host
    /// of `version`.
    pub fn bind(host_path: &Path, version: HostVersion) -> Self {
        let mut binding = Self::unbound(version);

        let host = match unsafe { Library::new(host_path) } {
            Ok(lib) => lib,
            Err(e) => {
                log::error!("failed to load host module {}: {}", host_path.display(), e);
                return binding;
            }
        };

        binding.get_current_window_handle = binding.resolve(&host, &GET_CURRENT_WINDOW_HANDLE);
        binding.get_total_text = binding.resolve(&host, &GET_TOTAL_TEXT);
        binding.get_selected_text = binding.resolve(&host, &GET_SELECTED_TEXT);
        binding.get_line_text = binding.resolve(&host, &GET_LINE_TEXT);
        binding.get_cursor_pos = binding.resolve(&host, &GET_CURSOR_POS);
        binding.get_cursor_pos_from_mouse = binding.resolve(&host, &GET_CURSOR_POS_FROM_MOUSE);
        binding.eval_macro = binding.resolve(&host, &EVAL_MACRO);
        binding.check_queue_status = binding.resolve(&host, &CHECK_QUEUE_STATUS);
        binding.analyze_encoding = binding.resolve(&host, &ANALYZE_ENCODING);
        binding.load_file_unicode = binding.resolve(&host, &LOAD_FILE_UNICODE);
        binding._modules.push(host);

        if let Some(pane) = Self::load_companion(host_path, &OUTPUT_PANE_WINDOW) {
            binding.output_pane_window = binding.resolve(&pane, &OUTPUT_PANE_WINDOW);
            binding.output_pane_push = binding.resolve(&pane, &OUTPUT_PANE_PUSH);
            binding.output_pane_pop = binding.resolve(&pane, &OUTPUT_PANE_POP);
            binding._modules.push(pane);
        }

        log::info!(
            "bound {} of {} host exports (host version {})",
            binding.bound.len(),
            HIDEMARU_EXPORTS.len(),
            version
        );

        binding
    }

    /// Load the companion module `desc` lives in, next to the host.
    fn load_companion(host_path: &Path, desc: &HostExportDesc) -> Option<Library> {
        let module = desc.module?;
        let path = host_path.parent().unwrap_or(Path::new(".")).join(module);
        if !path.exists() {
            log::debug!("companion module {} not present", path.display());
            return None;
        }

        match unsafe { Library::new(&path) } {
            Ok(lib) => Some(lib),
            Err(e) => {
                log::warn!("failed to load {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Look up one export as a `T`, honoring its version gate.
    ///
    /// `T` must be the function pointer type matching the export's native
    /// signature.
    fn resolve<T: Copy>(&mut self, lib: &Library, desc: &HostExportDesc) -> Option<T> {
        if !self.version.supports(desc) {
            log::debug!(
                "{} needs host {} or later, have {}",
                desc.symbol,
                desc.introduced_in,
                self.version
            );
            return None;
        }

        match unsafe { lib.get::<T>(desc.symbol.as_bytes()) } {
            Ok(symbol) => {
                log::debug!("resolved {}", desc.symbol);
                self.bound.insert(desc.symbol);
                Some(*symbol)
            }
            Err(e) => {
                if desc.required {
                    log::warn!("required host export {} not found: {}", desc.symbol, e);
                } else {
                    log::debug!("optional host export {} not found: {}", desc.symbol, e);
                }
                None
            }
        }
    }

    pub fn version(&self) -> HostVersion {
        self.version
    }

    pub fn is_bound(&self, symbol: &str) -> bool {
        self.bound.contains(symbol)
    }

    /// Names of the exports that were resolved, in table order.
    pub fn bound_symbols(&self) -> Vec<&'static str> {
        HIDEMARU_EXPORTS
            .iter()
            .filter(|d| self.bound.contains(d.symbol))
            .map(|d| d.symbol)
            .collect()
    }
}

/// Exports a host of `version` would be asked for, with whether each passes
/// its version gate.
pub fn plan(version: HostVersion) -> Vec<(&'static HostExportDesc, bool)> {
    HIDEMARU_EXPORTS
        .iter()
        .map(|d| (d, version.supports(d)))
        .collect()
}
