//! Host ABI vocabulary for the Hidemaru macro bridge
//!
//! This crate names everything that crosses the boundary between the bridge
//! and the host process: handle types, the version-gated export table, the
//! message ids of the host's RPC surface, and the three traits a host backend
//! implements.
//!
//! # Export Tables
//!
//! Backends declare which host exports they bind with the
//! [`declare_host_exports!`] macro, which generates one [`HostExportDesc`]
//! constant per export plus a static table the resolver walks at bind time.
//!
//! ```rust,ignore
//! use hmbridge_host::declare_host_exports;
//!
//! declare_host_exports! {
//!     HIDEMARU_EXPORTS;
//!     // constant,              symbol,                       availability
//!     EVAL_MACRO             => "Hidemaru_EvalMacro",         required;
//!     ANALYZE_ENCODING       => "Hidemaru_AnalyzeEncoding",   optional(890);
//! }
//! ```

use std::fmt;

pub mod wide;

// ============================================================================
// Handles and Positions
// ============================================================================

/// Window handle of a host window (`HWND`).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NULL: WindowHandle = WindowHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Movable global memory handle (`HGLOBAL`) returned by the text getters.
///
/// The receiver owns the handle and must free it.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GlobalHandle(pub isize);

impl GlobalHandle {
    pub const NULL: GlobalHandle = GlobalHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Screen coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Editor cursor position in the host's unicode line/column reckoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPos {
    pub line_no: i32,
    pub column: i32,
}

impl CursorPos {
    /// Reported whenever the host cannot tell where the cursor is.
    pub const UNKNOWN: CursorPos = CursorPos {
        line_no: -1,
        column: -1,
    };

    pub fn is_known(&self) -> bool {
        self.line_no >= 0 && self.column >= 0
    }
}

// ============================================================================
// Host Version
// ============================================================================

/// Host version in the host's own numbering (`8.90` is `890.0`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct HostVersion(pub f64);

impl HostVersion {
    /// Build from the four parts of a PE file version.
    pub fn from_file_version(major: u16, minor: u16, build: u16, private: u16) -> Self {
        HostVersion(
            100.0 * f64::from(major)
                + 10.0 * f64::from(minor)
                + f64::from(build)
                + 0.01 * f64::from(private),
        )
    }

    pub fn at_least(self, threshold: u32) -> bool {
        self.0 >= f64::from(threshold)
    }

    /// Whether a host of this version carries the given export.
    pub fn supports(self, desc: &HostExportDesc) -> bool {
        self.at_least(desc.introduced_in)
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0 / 100.0)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A host export that was not bound, either because the host is too old or
/// because symbol resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unresolved(pub &'static str);

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host export '{}' is not bound", self.0)
    }
}

impl std::error::Error for Unresolved {}

// ============================================================================
// Host Traits
// ============================================================================

/// The host's native function table.
///
/// Every method maps to one export. A method returns `Err(Unresolved)` when
/// its export was never bound; callers check at every call site.
pub trait HostExports: Send + Sync {
    /// Version the binding was gated with
    fn version(&self) -> HostVersion;

    /// Whether `symbol` was resolved at bind time
    fn is_bound(&self, symbol: &str) -> bool;

    fn current_window_handle(&self) -> Result<WindowHandle, Unresolved>;

    fn total_text(&self) -> Result<GlobalHandle, Unresolved>;

    fn selected_text(&self) -> Result<GlobalHandle, Unresolved>;

    fn line_text(&self, line_no: i32) -> Result<GlobalHandle, Unresolved>;

    /// `Ok(None)` when the host reports failure
    fn cursor_pos(&self) -> Result<Option<CursorPos>, Unresolved>;

    /// `point` of `None` asks for the current mouse position
    fn cursor_pos_from_mouse(&self, point: Option<Point>)
        -> Result<Option<CursorPos>, Unresolved>;

    /// Evaluate NUL-terminated UTF-16 macro text inside the running macro.
    /// Returns the host status, zero on failure.
    fn eval_macro(&self, script: &[u16]) -> Result<i32, Unresolved>;

    fn check_queue_status(&self) -> Result<i32, Unresolved>;

    /// Host encoding id of a file. Introduced in 8.90.
    fn analyze_encoding(&self, path: &[u16]) -> Result<i32, Unresolved>;

    /// Load a file as UTF-16 text. Returns the handle and its length in
    /// UTF-16 units. Introduced in 8.90.
    fn load_file_unicode(
        &self,
        path: &[u16],
        hm_encode: i32,
    ) -> Result<(GlobalHandle, usize), Unresolved>;

    /// Window of the output pane attached to `host`, from the output pane
    /// companion module.
    fn output_pane_window(&self, host: WindowHandle) -> Result<WindowHandle, Unresolved>;

    /// Save the output pane state of `host`.
    fn output_pane_push(&self, host: WindowHandle) -> Result<i32, Unresolved>;

    /// Restore the output pane state saved by the last push.
    fn output_pane_pop(&self, host: WindowHandle) -> Result<i32, Unresolved>;
}

/// Synchronous message RPC to a host window.
///
/// Every call blocks until the receiving window has handled the message.
pub trait MessageTransport: Send + Sync {
    /// Plain integer message. Returns the pointer-sized result.
    fn send(&self, target: WindowHandle, msg: u32, wparam: usize, lparam: isize) -> isize;

    /// `wparam` is a caller-allocated response buffer, `lparam` a
    /// NUL-terminated request string. The receiver writes at most
    /// `response.len()` units into the buffer.
    fn send_buffers(
        &self,
        target: WindowHandle,
        msg: u32,
        response: &mut [u16],
        request: &[u16],
    ) -> bool;

    /// `lparam` is a caller-allocated response buffer.
    fn send_out_buffer(
        &self,
        target: WindowHandle,
        msg: u32,
        wparam: usize,
        response: &mut [u16],
    ) -> bool;
}

/// OS services the bridge needs around host calls.
pub trait Platform: Send + Sync {
    /// Lock a global handle. Returns null when the lock fails.
    fn global_lock(&self, handle: GlobalHandle) -> *const u16;

    fn global_unlock(&self, handle: GlobalHandle) -> bool;

    /// Returns `false` when the handle could not be released
    fn global_free(&self, handle: GlobalHandle) -> bool;

    fn screen_cursor_pos(&self) -> Option<Point>;
}

/// Everything a bridge needs from one host process.
pub trait Host: HostExports + MessageTransport + Platform {}

impl<T: HostExports + MessageTransport + Platform> Host for T {}

// ============================================================================
// Message Ids
// ============================================================================

/// Message ids understood by the host main window.
pub mod messages {
    pub const WM_USER: u32 = 0x400;
    pub const WM_COMMAND: u32 = 0x111;

    pub const WM_ISMACROEXECUTING: u32 = WM_USER + 167;
    pub const WM_HIDEMARUINFO: u32 = WM_USER + 181;
    pub const WM_REMOTE_EXECMACRO_FILE: u32 = WM_USER + 271;
    pub const WM_REMOTE_EXECMACRO_MEMORY: u32 = WM_USER + 272;

    /// `wparam` of `WM_HIDEMARUINFO`
    pub const HIDEMARUINFO_GETFILEFULLPATH: usize = 4;

    /// Capacity of the response buffer of the remote-exec messages.
    /// The first unit is pre-filled with `0x0f0f` so an untouched buffer
    /// can be told apart from an empty response.
    pub const REMOTE_EXEC_RESPONSE_CAPACITY: usize = 0x0f0f + 1;
    pub const REMOTE_EXEC_RESPONSE_SENTINEL: u16 = 0x0f0f;

    pub const FILE_PATH_CAPACITY: usize = 512;

    /// Output pane `WM_COMMAND` id that clears the pane
    pub const OUTPUT_PANE_CLEAR: i32 = 1009;
}

// ============================================================================
// Export Descriptors
// ============================================================================

/// Baseline version every bridge-supported host has.
pub const BASELINE_VERSION: u32 = 866;

/// Describes one named export of a host module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostExportDesc {
    pub symbol: &'static str,
    /// Module the export lives in, relative to the host directory.
    /// `None` for the host executable itself.
    pub module: Option<&'static str>,
    /// Missing required exports are logged as warnings, missing optional ones
    /// only at debug level
    pub required: bool,
    /// First host version that carries the export
    pub introduced_in: u32,
}

/// Declare version-gated export descriptors.
///
/// Generates one `pub const` [`HostExportDesc`] per line plus a `static`
/// table holding all of them in declaration order.
///
/// # Syntax
///
/// ```rust,ignore
/// declare_host_exports! {
///     TABLE_NAME;
///     CONST_NAME => "SymbolName", required;
///     CONST_NAME => "SymbolName", optional(890);
///     CONST_NAME => "SymbolName" in "Companion.dll", optional;
/// }
/// ```
///
/// `required` exports exist since [`BASELINE_VERSION`]. `optional` without a
/// version is resolved whenever its module loads.
#[macro_export]
macro_rules! declare_host_exports {
    (
        $table:ident;
        $($name:ident => $symbol:literal $(in $module:literal)?, $kind:ident $(($ver:literal))?;)*
    ) => {
        $(
            pub const $name: $crate::HostExportDesc = $crate::HostExportDesc {
                symbol: $symbol,
                module: $crate::_module!($($module)?),
                required: $crate::_is_required!($kind),
                introduced_in: $crate::_since!($kind $(, $ver)?),
            };
        )*

        pub static $table: &[$crate::HostExportDesc] = &[$($name),*];
    };
}

// ---------------------------------------------------------------------------
// Internal helper macros (exported for cross-crate macro use)
// ---------------------------------------------------------------------------

#[doc(hidden)]
#[macro_export]
macro_rules! _is_required {
    (required) => { true };
    (optional) => { false };
}

#[doc(hidden)]
#[macro_export]
macro_rules! _since {
    (required) => { $crate::BASELINE_VERSION };
    (optional) => { 0u32 };
    (optional, $ver:literal) => { $ver };
}

#[doc(hidden)]
#[macro_export]
macro_rules! _module {
    () => { None };
    ($module:literal) => { Some($module) };
}

#[cfg(test)]
mod tests {
    use super::*;

    declare_host_exports! {
        TEST_EXPORTS;
        ALWAYS => "Test_Always", required;
        LATER => "Test_Later", optional(890);
        SIDE => "Test_Side" in "Side.dll", optional;
    }

    #[test]
    fn test_descriptor_table() {
        assert_eq!(TEST_EXPORTS.len(), 3);
        assert_eq!(TEST_EXPORTS[0], ALWAYS);
        assert!(ALWAYS.required);
        assert_eq!(ALWAYS.introduced_in, BASELINE_VERSION);
        assert_eq!(ALWAYS.module, None);

        assert!(!LATER.required);
        assert_eq!(LATER.introduced_in, 890);

        assert_eq!(SIDE.module, Some("Side.dll"));
        assert_eq!(SIDE.introduced_in, 0);
    }

    #[test]
    fn test_version_gate() {
        let old = HostVersion::from_file_version(8, 8, 5, 0);
        let new = HostVersion::from_file_version(8, 9, 0, 3);
        assert_eq!(old.0, 885.0);
        assert!(old.supports(&ALWAYS));
        assert!(!old.supports(&LATER));
        assert!(new.supports(&LATER));
        assert_eq!(new.to_string(), "8.90");
    }

    #[test]
    fn test_null_handles() {
        assert!(WindowHandle::NULL.is_null());
        assert!(GlobalHandle::default().is_null());
        assert!(!GlobalHandle(7).is_null());
        assert!(!CursorPos::UNKNOWN.is_known());
    }
}
