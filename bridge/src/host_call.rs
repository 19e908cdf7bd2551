//! Host call surface
//!
//! Synchronous wrappers over the bound exports and the message RPC. Text
//! comes back from the host as a global memory handle the caller owns;
//! [`HostText`] runs lock, copy, unlock and free on every exit path.

use std::path::{Path, PathBuf};

use hmbridge_host::messages::{
    FILE_PATH_CAPACITY, HIDEMARUINFO_GETFILEFULLPATH, REMOTE_EXEC_RESPONSE_CAPACITY,
    REMOTE_EXEC_RESPONSE_SENTINEL, WM_COMMAND, WM_HIDEMARUINFO,
};
use hmbridge_host::wide::{from_wide, from_wide_ptr, to_wide};
use hmbridge_host::{CursorPos, GlobalHandle, Host, WindowHandle};

use crate::encoding::Encoding;
use crate::error::{BridgeError, MacroResult, Result};
use crate::exchange::AccessorLocator;
use crate::value::MacroValue;
use crate::var::{accessor_create, accessor_release, deposit_and_run, ACCESSOR_VAR, DRAIN};
use crate::Hm;

// ============================================================================
// Global Memory
// ============================================================================

/// Owned host text handle, freed on drop.
pub(crate) struct HostText<'a> {
    host: &'a dyn Host,
    handle: GlobalHandle,
    /// Length in UTF-16 units when the host reports one
    len: Option<usize>,
}

impl<'a> HostText<'a> {
    /// Take ownership of a handle the host just returned.
    pub(crate) fn take(host: &'a dyn Host, handle: GlobalHandle, what: &str) -> Result<Self> {
        if handle.is_null() {
            return Err(BridgeError::MarshalFailure(format!(
                "{} returned a null handle",
                what
            )));
        }
        Ok(Self {
            host,
            handle,
            len: None,
        })
    }

    pub(crate) fn with_len(mut self, len: usize) -> Self {
        self.len = Some(len);
        self
    }

    /// Copy the text out. A handle that cannot be locked reads as empty.
    pub(crate) fn read(&self) -> String {
        let ptr = self.host.global_lock(self.handle);
        if ptr.is_null() {
            log::warn!("could not lock host text handle {:#x}", self.handle.0);
            return String::new();
        }

        let _locked = Locked {
            host: self.host,
            handle: self.handle,
        };
        // SAFETY: the host hands out NUL-terminated UTF-16 text, and the
        // handle stays locked until `_locked` drops.
        unsafe { from_wide_ptr(ptr, self.len) }
    }
}

impl Drop for HostText<'_> {
    fn drop(&mut self) {
        if !self.host.global_free(self.handle) {
            log::warn!("failed to free host text handle {:#x}", self.handle.0);
        }
    }
}

struct Locked<'a> {
    host: &'a dyn Host,
    handle: GlobalHandle,
}

impl Drop for Locked<'_> {
    fn drop(&mut self) {
        self.host.global_unlock(self.handle);
    }
}

// ============================================================================
// Message RPC
// ============================================================================

/// Send a remote-exec message with a caller-allocated response buffer.
pub(crate) fn remote_exec(hm: &Hm, msg: u32, request: &str) -> MacroResult {
    let Some(hwnd) = hm.window_handle() else {
        return MacroResult::failed(
            "",
            BridgeError::HostUnavailable(crate::symbols::GET_CURRENT_WINDOW_HANDLE.symbol),
        );
    };

    let mut response = vec![0u16; REMOTE_EXEC_RESPONSE_CAPACITY];
    response[0] = REMOTE_EXEC_RESPONSE_SENTINEL;

    let success = hm
        .host()
        .send_buffers(hwnd, msg, &mut response, &to_wide(request));
    let message = response_text(&response);

    if success {
        MacroResult::ok(1, message)
    } else {
        MacroResult::failed(
            message,
            BridgeError::MacroFailure("host rejected the remote macro".to_string()),
        )
    }
}

/// Response text, empty when the host left the buffer untouched.
fn response_text(buf: &[u16]) -> String {
    if buf.first() == Some(&REMOTE_EXEC_RESPONSE_SENTINEL) && buf.get(1).map_or(true, |&c| c == 0)
    {
        return String::new();
    }
    from_wide(buf)
}

/// Send a numeric `WM_COMMAND` and clamp the pointer-sized result into `i32`.
pub fn send_command(hm: &Hm, target: WindowHandle, command_id: i32) -> i32 {
    let result = hm.host().send(target, WM_COMMAND, command_id as usize, 0);
    clamp_to_i32(result)
}

/// Saturate rather than truncate.
pub fn clamp_to_i32(value: isize) -> i32 {
    value.clamp(i32::MIN as isize, i32::MAX as isize) as i32
}

// ============================================================================
// Edit
// ============================================================================

/// Cursor position under the mouse, with the mouse's screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MousePos {
    pub line_no: i32,
    pub column: i32,
    pub x: i32,
    pub y: i32,
}

impl MousePos {
    pub const UNKNOWN: MousePos = MousePos {
        line_no: -1,
        column: -1,
        x: -1,
        y: -1,
    };
}

/// The active edit area.
pub struct Edit<'a> {
    hm: &'a Hm,
}

impl<'a> Edit<'a> {
    pub fn new(hm: &'a Hm) -> Self {
        Self { hm }
    }

    pub fn total_text(&self) -> Result<String> {
        let host = self.hm.host();
        let handle = host.total_text()?;
        Ok(HostText::take(host, handle, "total text")?.read())
    }

    pub fn selected_text(&self) -> Result<String> {
        let host = self.hm.host();
        let handle = host.selected_text()?;
        Ok(HostText::take(host, handle, "selected text")?.read())
    }

    /// Text of the line the cursor is on. Empty when the cursor position is
    /// unknown.
    pub fn line_text(&self) -> Result<String> {
        let pos = self.cursor_pos();
        if !pos.is_known() {
            return Ok(String::new());
        }

        let host = self.hm.host();
        let handle = host.line_text(pos.line_no)?;
        Ok(HostText::take(host, handle, "line text")?.read())
    }

    /// [`CursorPos::UNKNOWN`] whenever the host cannot report the position.
    pub fn cursor_pos(&self) -> CursorPos {
        match self.hm.host().cursor_pos() {
            Ok(Some(pos)) => pos,
            Ok(None) => CursorPos::UNKNOWN,
            Err(e) => {
                log::warn!("{}", e);
                CursorPos::UNKNOWN
            }
        }
    }

    pub fn mouse_pos(&self) -> MousePos {
        let host = self.hm.host();
        let Some(point) = host.screen_cursor_pos() else {
            return MousePos::UNKNOWN;
        };

        match host.cursor_pos_from_mouse(None) {
            Ok(Some(pos)) => MousePos {
                line_no: pos.line_no,
                column: pos.column,
                x: point.x,
                y: point.y,
            },
            Ok(None) => MousePos::UNKNOWN,
            Err(e) => {
                log::warn!("{}", e);
                MousePos::UNKNOWN
            }
        }
    }

    /// Full path of the open file, `None` for an untitled document.
    pub fn file_path(&self) -> Option<PathBuf> {
        let hwnd = self.hm.window_handle()?;
        let mut buf = vec![0u16; FILE_PATH_CAPACITY];
        let answered = self.hm.host().send_out_buffer(
            hwnd,
            WM_HIDEMARUINFO,
            HIDEMARUINFO_GETFILEFULLPATH,
            &mut buf,
        );
        if !answered {
            log::warn!("host did not answer the file path query");
            return None;
        }

        let path = from_wide(&buf);
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }

    /// Replace the whole text as one undo step.
    pub fn set_total_text(&self, text: &str) -> Result<()> {
        let body = insert_script(self.hm.accessor());
        let script = format!("begingroupundo;\nselectall;\n{}\nendgroupundo;", body);
        self.insert(text, &script)
    }

    /// Replace the selection. Does nothing when nothing is selected.
    pub fn set_selected_text(&self, text: &str) -> Result<()> {
        let body = insert_script(self.hm.accessor());
        let script = format!("if (selecting) {{\n{}\n}}", body);
        self.insert(text, &script)
    }

    /// Replace the cursor line and put the cursor back where it was.
    pub fn set_line_text(&self, text: &str) -> Result<()> {
        let pos = self.cursor_pos();
        let body = insert_script(self.hm.accessor());
        let script = format!(
            "begingroupundo;\nselectline;\n{}\nmoveto2 {}, {};\nendgroupundo;",
            body, pos.column, pos.line_no
        );
        self.insert(text, &script)
    }

    fn insert(&self, text: &str, script: &str) -> Result<()> {
        deposit_and_run(self.hm, MacroValue::Str(text.to_string()), script)
            .into_result()
            .map(|_| ())
    }
}

fn insert_script(locator: &AccessorLocator) -> String {
    format!(
        "{}\ninsert member({}, \"{}\");\n{}",
        accessor_create(locator),
        ACCESSOR_VAR,
        DRAIN,
        accessor_release()
    )
}

// ============================================================================
// File
// ============================================================================

/// Files as the host reads them.
pub struct File<'a> {
    hm: &'a Hm,
}

impl<'a> File<'a> {
    pub fn new(hm: &'a Hm) -> Self {
        Self { hm }
    }

    /// Encoding the host detects for `path`. Needs a host of 8.90 or later.
    pub fn encoding(&self, path: &Path) -> Result<Encoding> {
        let hm_encode = self
            .hm
            .host()
            .analyze_encoding(&to_wide(&path.to_string_lossy()))?;
        Ok(Encoding::from_hm_encode(hm_encode))
    }

    /// Read `path` decoded with the host encoding id `hm_encode`.
    /// Needs a host of 8.90 or later.
    pub fn load_text(&self, path: &Path, hm_encode: i32) -> Result<String> {
        let host = self.hm.host();
        let (handle, len) = host.load_file_unicode(&to_wide(&path.to_string_lossy()), hm_encode)?;
        let text = HostText::take(host, handle, "load file")?.with_len(len);
        Ok(text.read())
    }

    /// Read `path` with the encoding the host detects for it.
    pub fn read_text(&self, path: &Path) -> Result<String> {
        let encoding = self.encoding(path)?;
        self.load_text(path, encoding.hm_encode)
    }
}
