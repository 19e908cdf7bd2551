//! C ABI of the accessor object
//!
//! A COM shim, or macro code calling the bridge module directly with
//! `dllfunc`, reaches the exchange slot through these exports. `fill`
//! stores a value coming from the macro engine, `drain` hands the held value
//! to it. Draining never empties the slot; the bridge clears it once the
//! script that drained it has finished.

use hmbridge_host::wide::from_wide_ptr;
use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::exchange::{ExchangeAccessor, ExchangeSlot};
use crate::value::{MacroValue, Namespace};

pub const SLOT_EMPTY: i32 = 0;
pub const SLOT_INT: i32 = 1;
pub const SLOT_STR: i32 = 2;

lazy_static! {
    /// Backing store of the last string handed out by `hmbridge_slot_drain_str`
    static ref DRAINED: Mutex<Vec<u16>> = Mutex::new(vec![0]);
}

/// Store an integer from macro code. Returns 1.
#[no_mangle]
pub extern "C" fn hmbridge_slot_fill_int(value: i64) -> i32 {
    ExchangeAccessor::fill(MacroValue::Int(value))
}

/// Store a NUL-terminated UTF-16 string from macro code. A null pointer
/// stores the empty string. Returns 1.
///
/// # Safety
/// `text` must be null or point to a NUL-terminated UTF-16 string.
#[no_mangle]
pub unsafe extern "C" fn hmbridge_slot_fill_str(text: *const u16) -> i32 {
    let text = from_wide_ptr(text, None);
    ExchangeAccessor::fill(MacroValue::Str(text))
}

/// Kind of the held value: 0 empty, 1 integer, 2 string.
#[no_mangle]
pub extern "C" fn hmbridge_slot_kind() -> i32 {
    match ExchangeSlot::peek() {
        None => SLOT_EMPTY,
        Some(MacroValue::Int(_)) => SLOT_INT,
        Some(MacroValue::Str(_)) => SLOT_STR,
    }
}

/// The held value as an integer; 0 when empty or not numeric.
#[no_mangle]
pub extern "C" fn hmbridge_slot_drain_int() -> i64 {
    ExchangeAccessor::drain()
        .and_then(|v| v.conform(Namespace::Numeric))
        .and_then(|v| v.as_int())
        .unwrap_or(0)
}

/// The held value as a NUL-terminated UTF-16 string; empty when the slot is.
///
/// The pointer stays valid until the next call of this function.
#[no_mangle]
pub extern "C" fn hmbridge_slot_drain_str() -> *const u16 {
    let text = ExchangeAccessor::drain()
        .and_then(|v| v.conform(Namespace::Text))
        .map(|v| v.to_string())
        .unwrap_or_default();

    let mut drained = DRAINED.lock();
    *drained = text.encode_utf16().chain(std::iter::once(0)).collect();
    drained.as_ptr()
}
