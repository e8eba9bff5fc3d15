//! Text encodings for `add_text` and `read_text`.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use oxitar_core::{OxiTarError, Result};

/// Resolve a WHATWG encoding label; `None` is UTF-8.
pub(crate) fn lookup(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        None => Ok(UTF_8),
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| OxiTarError::encoding_error(format!("unknown encoding '{label}'"))),
    }
}

/// Encode text, refusing characters the encoding cannot represent.
pub(crate) fn encode(encoding: &'static Encoding, text: &str) -> Result<Vec<u8>> {
    // encoding_rs only decodes UTF-16; its encoder falls back to UTF-8.
    if encoding == UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }

    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(OxiTarError::encoding_error(format!(
            "text cannot be represented in {}",
            encoding.name()
        )));
    }
    Ok(bytes.into_owned())
}

/// Decode an entry payload, refusing malformed input.
pub(crate) fn decode(encoding: &'static Encoding, data: &[u8], name: &str) -> Result<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(data);
    if had_errors {
        return Err(OxiTarError::encoding_error(format!(
            "entry '{name}' is not valid {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(None).unwrap(), UTF_8);
        assert_eq!(lookup(Some("latin1")).unwrap().name(), "windows-1252");
        assert_eq!(lookup(Some(" Shift_JIS ")).unwrap().name(), "Shift_JIS");
        assert!(lookup(Some("klingon")).is_err());
    }

    #[test]
    fn test_encode_decode() {
        let sjis = lookup(Some("shift_jis")).unwrap();
        let bytes = encode(sjis, "日本語").unwrap();
        assert_eq!(bytes, [0x93, 0xFA, 0x96, 0x7B, 0x8C, 0xEA]);
        assert_eq!(decode(sjis, &bytes, "x").unwrap(), "日本語");

        let utf16 = lookup(Some("utf-16le")).unwrap();
        let bytes = encode(utf16, "hi").unwrap();
        assert_eq!(bytes, [b'h', 0, b'i', 0]);
        assert_eq!(decode(utf16, &bytes, "x").unwrap(), "hi");
    }

    #[test]
    fn test_unrepresentable_and_malformed() {
        let latin1 = lookup(Some("iso-8859-1")).unwrap();
        assert!(encode(latin1, "日本").is_err());
        assert!(decode(UTF_8, &[0xFF, 0xFE, 0x41], "bad.txt").is_err());
    }
}
