//! Host encoding ids and their Windows code pages

/// Code page for each host encoding id, indexed by id.
/// `0` marks an encoding without a code page.
const CODE_PAGES: [u32; 28] = [
    0,     // 0 unknown
    932,   // 1 Shift-JIS
    1200,  // 2 UTF-16 little-endian
    51932, // 3 EUC-JP
    50221, // 4 JIS
    65000, // 5 UTF-7
    65001, // 6 UTF-8
    1201,  // 7 UTF-16 big-endian
    1252,  // 8 Western European
    936,   // 9 Simplified Chinese (GB2312)
    950,   // 10 Traditional Chinese (Big5)
    949,   // 11 Korean
    1361,  // 12 Korean (Johab)
    1250,  // 13 Central European
    1257,  // 14 Baltic
    1253,  // 15 Greek
    1251,  // 16 Cyrillic
    42,    // 17 Symbol
    1254,  // 18 Turkish
    1255,  // 19 Hebrew
    1256,  // 20 Arabic
    874,   // 21 Thai
    1258,  // 22 Vietnamese
    10001, // 23 Japanese (Mac)
    850,   // 24 OEM/DOS
    0,     // 25 other
    12000, // 26 UTF-32 little-endian
    12001, // 27 UTF-32 big-endian
];

/// Code page of a host encoding id; `0` when unknown, including ids the
/// table does not cover yet.
pub fn code_page_for(hm_encode: i32) -> u32 {
    if hm_encode <= 0 {
        return 0;
    }
    CODE_PAGES.get(hm_encode as usize).copied().unwrap_or(0)
}

/// A file encoding in both numbering schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub hm_encode: i32,
    pub ms_code_page: u32,
}

impl Encoding {
    pub fn from_hm_encode(hm_encode: i32) -> Self {
        Self {
            hm_encode,
            ms_code_page: code_page_for(hm_encode),
        }
    }
}
