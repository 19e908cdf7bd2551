//! Native host backend
//!
//! Implements the host traits over the real process: host exports through
//! [`HostBinding`], window messages, global memory and the mouse position
//! through the system modules, all resolved with `libloading` at first use.
//! A system function that cannot be resolved degrades the same way a missing
//! host export does, so the crate loads (and its tests run) on any platform.

use std::ffi::c_void;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::{Arc, OnceLock};

use hmbridge_host::wide::{from_wide, to_wide};
use hmbridge_host::{
    CursorPos, GlobalHandle, HostExportDesc, HostExports, HostVersion, MessageTransport, Platform,
    Point, Unresolved, WindowHandle, BASELINE_VERSION,
};
use libloading::Library;

use crate::config::BridgeConfig;
use crate::symbols::{self, HostBinding};

// ============================================================================
// System Functions
// ============================================================================

type GlobalLockFn = unsafe extern "system" fn(mem: isize) -> *mut c_void;
type GlobalUnlockFn = unsafe extern "system" fn(mem: isize) -> i32;
type GlobalFreeFn = unsafe extern "system" fn(mem: isize) -> isize;
type SendMessageWFn =
    unsafe extern "system" fn(hwnd: isize, msg: u32, wparam: usize, lparam: isize) -> isize;
type GetCursorPosFn = unsafe extern "system" fn(point: *mut Point) -> i32;
type GetModuleHandleExWFn =
    unsafe extern "system" fn(flags: u32, name: *const u16, module: *mut isize) -> i32;
type GetModuleFileNameWFn =
    unsafe extern "system" fn(module: isize, buf: *mut u16, size: u32) -> u32;
type GetFileVersionInfoSizeWFn =
    unsafe extern "system" fn(path: *const u16, handle: *mut u32) -> u32;
type GetFileVersionInfoWFn =
    unsafe extern "system" fn(path: *const u16, handle: u32, len: u32, data: *mut c_void) -> i32;
type VerQueryValueWFn = unsafe extern "system" fn(
    block: *const c_void,
    sub_block: *const u16,
    buf: *mut *mut c_void,
    len: *mut u32,
) -> i32;

const GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT: u32 = 0x2;
const GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS: u32 = 0x4;

const MODULE_PATH_CAPACITY: usize = 1024;

/// `VS_FIXEDFILEINFO`
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct FixedFileInfo {
    signature: u32,
    struc_version: u32,
    file_version_ms: u32,
    file_version_ls: u32,
    product_version_ms: u32,
    product_version_ls: u32,
    file_flags_mask: u32,
    file_flags: u32,
    file_os: u32,
    file_type: u32,
    file_subtype: u32,
    file_date_ms: u32,
    file_date_ls: u32,
}

impl FixedFileInfo {
    fn host_version(&self) -> HostVersion {
        HostVersion::from_file_version(
            (self.file_version_ms >> 16) as u16,
            (self.file_version_ms & 0xffff) as u16,
            (self.file_version_ls >> 16) as u16,
            (self.file_version_ls & 0xffff) as u16,
        )
    }
}

struct Win32 {
    /// Loaded modules (kept alive for the function pointers)
    _modules: Vec<Library>,

    global_lock: Option<GlobalLockFn>,
    global_unlock: Option<GlobalUnlockFn>,
    global_free: Option<GlobalFreeFn>,
    get_module_handle_ex: Option<GetModuleHandleExWFn>,
    get_module_file_name: Option<GetModuleFileNameWFn>,

    send_message: Option<SendMessageWFn>,
    get_cursor_pos: Option<GetCursorPosFn>,

    get_file_version_info_size: Option<GetFileVersionInfoSizeWFn>,
    get_file_version_info: Option<GetFileVersionInfoWFn>,
    ver_query_value: Option<VerQueryValueWFn>,
}

impl Win32 {
    fn load() -> Self {
        let kernel32 = open("kernel32.dll");
        let user32 = open("user32.dll");
        let version = open("version.dll");

        let win32 = Self {
            global_lock: lookup(&kernel32, "GlobalLock"),
            global_unlock: lookup(&kernel32, "GlobalUnlock"),
            global_free: lookup(&kernel32, "GlobalFree"),
            get_module_handle_ex: lookup(&kernel32, "GetModuleHandleExW"),
            get_module_file_name: lookup(&kernel32, "GetModuleFileNameW"),
            send_message: lookup(&user32, "SendMessageW"),
            get_cursor_pos: lookup(&user32, "GetCursorPos"),
            get_file_version_info_size: lookup(&version, "GetFileVersionInfoSizeW"),
            get_file_version_info: lookup(&version, "GetFileVersionInfoW"),
            ver_query_value: lookup(&version, "VerQueryValueW"),
            _modules: Vec::new(),
        };

        Self {
            _modules: [kernel32, user32, version].into_iter().flatten().collect(),
            ..win32
        }
    }

    /// File version resource of `path` as a host version.
    fn file_version(&self, path: &Path) -> Option<HostVersion> {
        let size_of_info = self.get_file_version_info_size?;
        let read_info = self.get_file_version_info?;
        let query = self.ver_query_value?;

        let wide = to_wide(&path.to_string_lossy());
        let mut ignored = 0u32;
        let size = unsafe { size_of_info(wide.as_ptr(), &mut ignored) };
        if size == 0 {
            return None;
        }

        let mut data = vec![0u8; size as usize];
        if unsafe { read_info(wide.as_ptr(), 0, size, data.as_mut_ptr().cast()) } == 0 {
            return None;
        }

        let root = to_wide("\\");
        let mut info: *mut c_void = ptr::null_mut();
        let mut len = 0u32;
        let found = unsafe { query(data.as_ptr().cast(), root.as_ptr(), &mut info, &mut len) };
        if found == 0 || info.is_null() || (len as usize) < size_of::<FixedFileInfo>() {
            return None;
        }

        // SAFETY: `info` points into `data` and holds at least one
        // VS_FIXEDFILEINFO, checked above.
        let fixed = unsafe { ptr::read_unaligned(info as *const FixedFileInfo) };
        Some(fixed.host_version())
    }
}

fn open(name: &str) -> Option<Library> {
    match unsafe { Library::new(name) } {
        Ok(lib) => Some(lib),
        Err(e) => {
            log::debug!("system module {} unavailable: {}", name, e);
            None
        }
    }
}

fn lookup<T: Copy>(lib: &Option<Library>, name: &str) -> Option<T> {
    let lib = lib.as_ref()?;
    match unsafe { lib.get::<T>(name.as_bytes()) } {
        Ok(symbol) => Some(*symbol),
        Err(e) => {
            log::debug!("system function {} unavailable: {}", name, e);
            None
        }
    }
}

fn win32() -> &'static Win32 {
    static WIN32: OnceLock<Win32> = OnceLock::new();
    WIN32.get_or_init(Win32::load)
}

/// Path of the module this crate was loaded from.
///
/// `None` when it cannot be determined, including on platforms without the
/// module API.
pub fn own_module_path() -> Option<PathBuf> {
    let w = win32();
    let handle_ex = w.get_module_handle_ex?;
    let file_name = w.get_module_file_name?;

    let anchor = own_module_path as *const ();
    let mut module = 0isize;
    let found = unsafe {
        handle_ex(
            GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
            anchor.cast(),
            &mut module,
        )
    };
    if found == 0 {
        return None;
    }

    let mut buf = vec![0u16; MODULE_PATH_CAPACITY];
    let len = unsafe { file_name(module, buf.as_mut_ptr(), buf.len() as u32) } as usize;
    if len == 0 || len >= buf.len() {
        return None;
    }
    Some(PathBuf::from(from_wide(&buf[..len])))
}

// ============================================================================
// Native Host
// ============================================================================

/// The host process this module is loaded into.
pub struct NativeHost {
    binding: HostBinding,
    win32: &'static Win32,
}

impl NativeHost {
    /// Bind the host named by `config`, or the current executable.
    ///
    /// The version comes from `config`, else from the executable's version
    /// resource, else the baseline is assumed.
    pub fn bind(config: &BridgeConfig) -> Self {
        let win32 = win32();
        let host_path = config
            .host_path
            .clone()
            .or_else(|| std::env::current_exe().ok());

        let Some(host_path) = host_path else {
            log::error!("cannot determine the host executable");
            return Self {
                binding: HostBinding::unbound(HostVersion(f64::from(BASELINE_VERSION))),
                win32,
            };
        };

        let version = config
            .version
            .map(HostVersion)
            .or_else(|| win32.file_version(&host_path))
            .unwrap_or_else(|| {
                let baseline = HostVersion(f64::from(BASELINE_VERSION));
                log::warn!(
                    "no version resource in {}, assuming {}",
                    host_path.display(),
                    baseline
                );
                baseline
            });

        Self {
            binding: HostBinding::bind(&host_path, version),
            win32,
        }
    }

    /// The process-wide native host, bound on first use.
    pub fn global(config: &BridgeConfig) -> Arc<NativeHost> {
        static NATIVE: OnceLock<Arc<NativeHost>> = OnceLock::new();
        NATIVE
            .get_or_init(|| Arc::new(Self::bind(config)))
            .clone()
    }

    pub fn binding(&self) -> &HostBinding {
        &self.binding
    }
}

fn bound<T>(slot: Option<T>, desc: &HostExportDesc) -> Result<T, Unresolved> {
    slot.ok_or(Unresolved(desc.symbol))
}

impl HostExports for NativeHost {
    fn version(&self) -> HostVersion {
        self.binding.version()
    }

    fn is_bound(&self, symbol: &str) -> bool {
        self.binding.is_bound(symbol)
    }

    fn current_window_handle(&self) -> Result<WindowHandle, Unresolved> {
        let f = bound(
            self.binding.get_current_window_handle,
            &symbols::GET_CURRENT_WINDOW_HANDLE,
        )?;
        Ok(WindowHandle(unsafe { f() }))
    }

    fn total_text(&self) -> Result<GlobalHandle, Unresolved> {
        let f = bound(self.binding.get_total_text, &symbols::GET_TOTAL_TEXT)?;
        Ok(GlobalHandle(unsafe { f() }))
    }

    fn selected_text(&self) -> Result<GlobalHandle, Unresolved> {
        let f = bound(self.binding.get_selected_text, &symbols::GET_SELECTED_TEXT)?;
        Ok(GlobalHandle(unsafe { f() }))
    }

    fn line_text(&self, line_no: i32) -> Result<GlobalHandle, Unresolved> {
        let f = bound(self.binding.get_line_text, &symbols::GET_LINE_TEXT)?;
        Ok(GlobalHandle(unsafe { f(line_no) }))
    }

    fn cursor_pos(&self) -> Result<Option<CursorPos>, Unresolved> {
        let f = bound(self.binding.get_cursor_pos, &symbols::GET_CURSOR_POS)?;
        let mut pos = CursorPos::UNKNOWN;
        let ok = unsafe { f(&mut pos.line_no, &mut pos.column) };
        Ok((ok != 0).then_some(pos))
    }

    fn cursor_pos_from_mouse(
        &self,
        point: Option<Point>,
    ) -> Result<Option<CursorPos>, Unresolved> {
        let f = bound(
            self.binding.get_cursor_pos_from_mouse,
            &symbols::GET_CURSOR_POS_FROM_MOUSE,
        )?;
        let point_ptr = point.as_ref().map_or(ptr::null(), |p| p as *const Point);
        let mut pos = CursorPos::UNKNOWN;
        let ok = unsafe { f(point_ptr, &mut pos.line_no, &mut pos.column) };
        Ok((ok != 0).then_some(pos))
    }

    fn eval_macro(&self, script: &[u16]) -> Result<i32, Unresolved> {
        let f = bound(self.binding.eval_macro, &symbols::EVAL_MACRO)?;
        debug_assert_eq!(script.last(), Some(&0));
        Ok(unsafe { f(script.as_ptr()) })
    }

    fn check_queue_status(&self) -> Result<i32, Unresolved> {
        let f = bound(self.binding.check_queue_status, &symbols::CHECK_QUEUE_STATUS)?;
        Ok(unsafe { f() })
    }

    fn analyze_encoding(&self, path: &[u16]) -> Result<i32, Unresolved> {
        let f = bound(self.binding.analyze_encoding, &symbols::ANALYZE_ENCODING)?;
        Ok(unsafe { f(path.as_ptr(), 0, 0) })
    }

    fn load_file_unicode(
        &self,
        path: &[u16],
        hm_encode: i32,
    ) -> Result<(GlobalHandle, usize), Unresolved> {
        let f = bound(self.binding.load_file_unicode, &symbols::LOAD_FILE_UNICODE)?;
        let mut len = 0i32;
        let handle = unsafe { f(path.as_ptr(), hm_encode, &mut len, 0, 0) };
        Ok((GlobalHandle(handle), len.max(0) as usize))
    }

    fn output_pane_window(&self, host: WindowHandle) -> Result<WindowHandle, Unresolved> {
        let f = bound(self.binding.output_pane_window, &symbols::OUTPUT_PANE_WINDOW)?;
        Ok(WindowHandle(unsafe { f(host.0) }))
    }

    fn output_pane_push(&self, host: WindowHandle) -> Result<i32, Unresolved> {
        let f = bound(self.binding.output_pane_push, &symbols::OUTPUT_PANE_PUSH)?;
        Ok(unsafe { f(host.0) })
    }

    fn output_pane_pop(&self, host: WindowHandle) -> Result<i32, Unresolved> {
        let f = bound(self.binding.output_pane_pop, &symbols::OUTPUT_PANE_POP)?;
        Ok(unsafe { f(host.0) })
    }
}

impl MessageTransport for NativeHost {
    fn send(&self, target: WindowHandle, msg: u32, wparam: usize, lparam: isize) -> isize {
        match self.win32.send_message {
            Some(f) => unsafe { f(target.0, msg, wparam, lparam) },
            None => 0,
        }
    }

    fn send_buffers(
        &self,
        target: WindowHandle,
        msg: u32,
        response: &mut [u16],
        request: &[u16],
    ) -> bool {
        let Some(f) = self.win32.send_message else {
            return false;
        };
        let result = unsafe {
            f(
                target.0,
                msg,
                response.as_mut_ptr() as usize,
                request.as_ptr() as isize,
            )
        };
        result != 0
    }

    fn send_out_buffer(
        &self,
        target: WindowHandle,
        msg: u32,
        wparam: usize,
        response: &mut [u16],
    ) -> bool {
        let Some(f) = self.win32.send_message else {
            return false;
        };
        unsafe { f(target.0, msg, wparam, response.as_mut_ptr() as isize) != 0 }
    }
}

impl Platform for NativeHost {
    fn global_lock(&self, handle: GlobalHandle) -> *const u16 {
        match self.win32.global_lock {
            Some(f) => unsafe { f(handle.0) as *const u16 },
            None => ptr::null(),
        }
    }

    fn global_unlock(&self, handle: GlobalHandle) -> bool {
        match self.win32.global_unlock {
            // nonzero only means other locks remain
            Some(f) => {
                unsafe { f(handle.0) };
                true
            }
            None => false,
        }
    }

    fn global_free(&self, handle: GlobalHandle) -> bool {
        match self.win32.global_free {
            Some(f) => unsafe { f(handle.0) == 0 },
            None => false,
        }
    }

    fn screen_cursor_pos(&self) -> Option<Point> {
        let f = self.win32.get_cursor_pos?;
        let mut point = Point::default();
        (unsafe { f(&mut point) } != 0).then_some(point)
    }
}
