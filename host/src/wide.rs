//! UTF-16 conversions for strings crossing the host boundary

/// NUL-terminated UTF-16 copy of `s`.
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decode up to the first NUL (or the end of the buffer).
pub fn from_wide(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

/// Copy a NUL-terminated UTF-16 string out of foreign memory.
///
/// Reads at most `max_len` units when given, stopping early at a NUL.
///
/// # Safety
/// `ptr` must be null or point to readable memory that holds a NUL
/// terminator, or at least `max_len` units when `max_len` is given.
pub unsafe fn from_wide_ptr(ptr: *const u16, max_len: Option<usize>) -> String {
    if ptr.is_null() {
        return String::new();
    }

    let mut len = 0usize;
    while max_len.map_or(true, |max| len < max) && *ptr.add(len) != 0 {
        len += 1;
    }

    let slice = std::slice::from_raw_parts(ptr, len);
    String::from_utf16_lossy(slice)
}
