//! Maps a DBF language-driver byte (or a `.cpg` sidecar's encoding name) to
//! a concrete text codec.
//!
//! The original xBase ecosystem is built on DOS OEM code pages that
//! `encoding_rs` (a web-encodings crate) does not model directly. Where an
//! exact match exists we use it; where it doesn't, we fall back to the
//! closest single-byte Windows code page, which is accurate for the ASCII
//! range and "close enough" for the extended range, the same tradeoff most
//! modern DBF readers make.

use std::sync::OnceLock;

use encoding_rs::{Encoding, MACINTOSH, UTF_8, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252, WINDOWS_1253, WINDOWS_1254};

type Table = Vec<(u8, &'static Encoding)>;

static TABLE: OnceLock<Table> = OnceLock::new();

/// Performs process-wide setup for the crate.
///
/// Currently this builds the language-driver-byte lookup table used by
/// [`encoding_for_driver_byte`]. Calling it more than once, or never
/// calling it at all, is safe: every entry point that needs the table
/// triggers lazy, idempotent initialization via [`std::sync::OnceLock`].
pub fn init() {
    table();
}

fn table() -> &'static Table {
    TABLE.get_or_init(|| {
        log::debug!("initializing code-page table");
        vec![
            (0x00, UTF_8),
            (0x01, WINDOWS_1252), // US MS-DOS (437); approximated
            (0x02, WINDOWS_1252), // International MS-DOS (850); approximated
            (0x03, WINDOWS_1252), // Windows ANSI
            (0x04, MACINTOSH),
            (0x64, WINDOWS_1250), // Eastern European MS-DOS (852); approximated
            (0x65, WINDOWS_1251), // Russian MS-DOS (866); approximated
            (0x66, WINDOWS_1252), // Nordic MS-DOS (865); approximated
            (0x67, WINDOWS_1252), // Icelandic MS-DOS (861); approximated
            (0x6a, WINDOWS_1253), // Greek MS-DOS (737); approximated
            (0x6b, WINDOWS_1254), // Turkish MS-DOS (857); approximated
            (0x96, MACINTOSH),    // Russian Macintosh; approximated
            (0x97, MACINTOSH),    // Eastern European Macintosh; approximated
            (0x98, MACINTOSH),    // Greek Macintosh; approximated
            (0xc8, WINDOWS_1250), // Eastern European Windows
            (0xc9, WINDOWS_1251), // Russian Windows
            (0xca, WINDOWS_1254), // Turkish Windows
            (0xcb, WINDOWS_1253), // Greek Windows
        ]
    })
}

/// Looks up the text codec for a DBF header's language-driver byte,
/// falling back to UTF-8 when the byte is unrecognized.
pub fn encoding_for_driver_byte(byte: u8) -> &'static Encoding {
    table()
        .iter()
        .find(|&&(b, _)| b == byte)
        .map(|&(_, encoding)| encoding)
        .unwrap_or(UTF_8)
}

/// Looks up the text codec by the name found in a `.cpg` sidecar file
/// (e.g. `"UTF-8"`, `"windows-1252"`). Returns `None` for unrecognized
/// names rather than guessing.
pub fn encoding_for_name(name: &str) -> Option<&'static Encoding> {
    Encoding::for_label(name.trim().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_driver_byte_falls_back_to_utf8() {
        assert_eq!(UTF_8, encoding_for_driver_byte(0xff));
    }

    #[test]
    fn known_driver_byte_resolves() {
        assert_eq!(WINDOWS_1251, encoding_for_driver_byte(0xc9));
    }

    #[test]
    fn cpg_name_lookup() {
        assert_eq!(Some(UTF_8), encoding_for_name("utf-8"));
        assert_eq!(Some(WINDOWS_1252), encoding_for_name("windows-1252"));
        assert_eq!(None, encoding_for_name("not-a-real-encoding"));
    }

    #[test]
    fn init_is_idempotent() {
        init();
        init();
        assert_eq!(UTF_8, encoding_for_driver_byte(0x00));
    }
}
