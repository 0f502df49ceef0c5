//! Single-pass UTF-8 well-formedness validation.

use crate::error::Error;

/// Returns true iff `bytes` is well-formed UTF-8.
///
/// Walks the input once, tracking how many continuation bytes the current
/// sequence still owes and the admissible range of the next continuation
/// byte. Overlong encodings, surrogate code points, and code points above
/// U+10FFFF are rejected, so acceptance matches [`core::str::from_utf8`].
pub fn is_well_formed(bytes: &[u8]) -> bool {
    // Continuation bytes still owed by the current sequence.
    let mut expected = 0u8;
    // Admissible range for the next continuation byte. The first
    // continuation of a sequence is narrowed by some leading bytes; every
    // later one is plain 0x80..=0xBF.
    let mut lower = 0x80u8;
    let mut upper = 0xBFu8;

    for &byte in bytes {
        if expected == 0 {
            match byte {
                // ASCII: 0xxx'xxxx
                0x00..=0x7F => {}
                // Start of a 2-byte sequence: 110x'xxxx. 0xC0 and 0xC1
                // would only encode overlong forms.
                0xC2..=0xDF => expected = 1,
                // Start of a 3-byte sequence: 1110'xxxx.
                0xE0 => {
                    expected = 2;
                    lower = 0xA0; // excludes overlong 3-byte forms
                }
                0xE1..=0xEC | 0xEE..=0xEF => expected = 2,
                0xED => {
                    expected = 2;
                    upper = 0x9F; // excludes surrogate code points
                }
                // Start of a 4-byte sequence: 1111'0xxx.
                0xF0 => {
                    expected = 3;
                    lower = 0x90; // excludes overlong 4-byte forms
                }
                0xF1..=0xF3 => expected = 3,
                0xF4 => {
                    expected = 3;
                    upper = 0x8F; // excludes code points above U+10FFFF
                }
                // Unexpected continuation byte or invalid leading byte.
                _ => return false,
            }
        } else {
            if byte < lower || byte > upper {
                return false;
            }
            lower = 0x80;
            upper = 0xBF;
            expected -= 1;
        }
    }

    // Valid as long as no sequence is left open.
    expected == 0
}

/// Validate `bytes` and convert it into an owned string.
pub(crate) fn into_string(bytes: Vec<u8>) -> Result<String, Error> {
    if !is_well_formed(&bytes) {
        return Err(Error::InvalidUtf8);
    }
    String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
}
