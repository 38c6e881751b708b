//! Body decoding with charset sniffing
//!
//! Sniff order: byte-order mark, then `<meta charset>` / `http-equiv`
//! declaration in the first kilobyte, then the charset from the
//! Content-Type header, then UTF-8 (lossy).

use encoding_rs::Encoding;

/// How far into the body a meta charset declaration is honoured.
const META_SCAN_LIMIT: usize = 1024;

/// Decode body bytes into text.
pub fn decode_body(bytes: &[u8], header_charset: Option<&str>) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if let Some(encoding) = sniff_meta_charset(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(bytes);
        return text.into_owned();
    }

    if let Some(label) = header_charset {
        if let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) {
            let (text, _) = encoding.decode_without_bom_handling(bytes);
            return text.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

/// Charset parameter of a Content-Type header value, if present.
#[must_use]
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .map(str::trim)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("charset") {
                Some(value.trim().trim_matches('"'))
            } else {
                None
            }
        })
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let window = &bytes[..bytes.len().min(META_SCAN_LIMIT)];
    let haystack = String::from_utf8_lossy(window).to_ascii_lowercase();
    let pos = haystack.find("charset=")?;
    let rest = &haystack[pos + "charset=".len()..];
    let rest = rest.trim_start_matches(['"', '\'']);
    let end = rest
        .find(|c: char| matches!(c, '"' | '\'' | '>' | ';' | ' ' | '/'))
        .unwrap_or(rest.len());
    Encoding::for_label(rest[..end].as_bytes())
}
