//! Media type detection for attachments

/// Number of leading bytes looked at when sniffing
const SNIFF_LEN: usize = 512;

pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Media type for an attachment named `name` holding `content`.
///
/// Content sniffing runs first. When it only finds plain text, the file
/// extension decides, since sniffing cannot tell CSV or JSON from any other
/// text. Unknown extensions keep the sniffed type.
pub fn for_attachment(name: &str, content: &[u8]) -> String {
    let sniffed = sniff(content);
    if sniffed.starts_with("text/plain") {
        if let Some(by_extension) = mime_guess::from_path(name).first_raw() {
            return by_extension.to_owned();
        }
    }
    sniffed.to_owned()
}

/// Media type judged from the first bytes of `content`
pub fn sniff(content: &[u8]) -> &'static str {
    let data = &content[..content.len().min(SNIFF_LEN)];

    let trimmed = skip_whitespace(data);
    if let Some(found) = sniff_markup(trimmed) {
        return found;
    }

    if let Some(found) = sniff_magic(data) {
        return found;
    }

    if data.iter().any(|&b| is_binary(b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN_UTF8
    }
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

fn sniff_markup(data: &[u8]) -> Option<&'static str> {
    for tag in HTML_TAGS {
        if data.len() <= tag.len() || !data[..tag.len()].eq_ignore_ascii_case(tag) {
            continue;
        }
        // The tag must end here, followed by a space or '>'
        if matches!(data[tag.len()], b' ' | b'>') {
            return Some("text/html; charset=utf-8");
        }
    }

    if data.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }
    None
}

/// Exact signatures, checked against the untrimmed data
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", TEXT_PLAIN_UTF8),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"ID3", "audio/mpeg"),
    (b"OggS\x00", "application/ogg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    (b"\x00\x61\x73\x6D", "application/wasm"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
];

fn sniff_magic(data: &[u8]) -> Option<&'static str> {
    if let Some(&(_, found)) = SIGNATURES.iter().find(|(sig, _)| data.starts_with(sig)) {
        return Some(found);
    }

    // RIFF containers carry their real type at offset 8
    if data.len() >= 12 && data.starts_with(b"RIFF") {
        return match &data[8..12] {
            b"WEBP" => Some("image/webp"),
            b"WAVE" => Some("audio/wave"),
            b"AVI " => Some("video/avi"),
            _ => None,
        };
    }

    // ISO base media: size, then "ftyp"
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return Some("video/mp4");
    }

    None
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
