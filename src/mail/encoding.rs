//! Header and body encodings

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Maximum length of a base64 body line, CRLF excluded (RFC 2045)
pub const BASE64_LINE_LENGTH: usize = 76;

/// RFC 2047 `B` encoded-word in UTF-8.
///
/// Applied unconditionally, pure ASCII input included.
pub fn encoded_word(text: &[u8]) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(text))
}

/// Append `data` base64 encoded, in lines of at most 76 characters, each ending in CRLF
pub fn write_base64_lines(out: &mut Vec<u8>, data: &[u8]) {
    let encoded = STANDARD.encode(data);
    for line in encoded.as_bytes().chunks(BASE64_LINE_LENGTH) {
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
}
