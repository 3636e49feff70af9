//! Byte decoding and XML parse wrapper.
//!
//! Importers receive raw bytes; this module turns them into a parsed
//! document. Decoding sniffs a BOM first and the declared encoding second
//! (EA exports UTF-8, UTF-16 and windows-1252 depending on version and
//! export options). Parsing is whole-document and in-memory — the importers
//! run multiple passes over one shared DOM, so there is no streaming mode.

use std::borrow::Cow;

use roxmltree::{Document, ParsingOptions};

use super::ImportError;

/// Decode XML bytes to text: BOM first, declared encoding second,
/// Latin-1 as the lossless 8-bit fallback.
pub fn decode_xml_bytes(input: &[u8]) -> Result<Cow<'_, str>, ImportError> {
    if let Some(rest) = input.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        let text = std::str::from_utf8(rest)
            .map_err(|e| ImportError::decode(format!("invalid UTF-8 after BOM: {e}")))?;
        return Ok(Cow::Borrowed(text));
    }
    if input.starts_with(&[0xFF, 0xFE]) {
        return decode_utf16(&input[2..], true).map(Cow::Owned);
    }
    if input.starts_with(&[0xFE, 0xFF]) {
        return decode_utf16(&input[2..], false).map(Cow::Owned);
    }

    // UTF-16 without a BOM shows up as alternating NULs in the prolog.
    if input.len() >= 2 {
        if input[0] == b'<' && input[1] == 0 {
            return decode_utf16(input, true).map(Cow::Owned);
        }
        if input[0] == 0 && input[1] == b'<' {
            return decode_utf16(input, false).map(Cow::Owned);
        }
    }

    let declared = declared_encoding(input).map(str::to_ascii_lowercase);
    match declared.as_deref() {
        Some(enc) if enc.contains("utf-16") => {
            // Declared but BOM-less; the prolog NUL check above already
            // handles the common case, so default to little-endian.
            decode_utf16(input, true).map(Cow::Owned)
        }
        Some(enc)
            if enc.contains("8859") || enc.contains("1252") || enc.contains("latin") =>
        {
            Ok(Cow::Owned(decode_latin1(input)))
        }
        _ => match std::str::from_utf8(input) {
            Ok(text) => Ok(Cow::Borrowed(text)),
            // Undeclared non-UTF-8 input: Latin-1 never fails and keeps
            // every byte addressable for diagnostics.
            Err(_) => Ok(Cow::Owned(decode_latin1(input))),
        },
    }
}

/// Parse decoded text into a DOM.
///
/// DTDs are allowed because several EA export paths include one; everything
/// else uses the parser defaults.
pub fn parse_document(text: &str) -> Result<Document<'_>, ImportError> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    Document::parse_with_options(text, options).map_err(|e| ImportError::xml(e.to_string()))
}

/// Extract the encoding declared in the XML prolog, if any.
fn declared_encoding(input: &[u8]) -> Option<&str> {
    let prefix_len = input.len().min(256);
    let prolog = std::str::from_utf8(&input[..prefix_len])
        .unwrap_or_else(|e| std::str::from_utf8(&input[..e.valid_up_to()]).unwrap_or(""));
    let lower = prolog.to_ascii_lowercase();
    let at = lower.find("encoding")?;
    let rest = &prolog[at + "encoding".len()..];
    let quote_at = rest.find(['"', '\''])?;
    let quote = rest.as_bytes()[quote_at] as char;
    let value = &rest[quote_at + 1..];
    let end = value.find(quote)?;
    Some(&value[..end])
}

fn decode_utf16(input: &[u8], little_endian: bool) -> Result<String, ImportError> {
    if input.len() % 2 != 0 {
        return Err(ImportError::decode("UTF-16 input with odd byte length"));
    }
    let units: Vec<u16> = input
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|e| ImportError::decode(format!("invalid UTF-16: {e}")))
}

fn decode_latin1(input: &[u8]) -> String {
    input.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_utf8() {
        let text = decode_xml_bytes(b"<?xml version=\"1.0\"?><a/>").unwrap();
        assert_eq!(text.as_ref(), "<?xml version=\"1.0\"?><a/>");
    }

    #[test]
    fn test_decode_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("<a name=\"\u{e9}\"/>".as_bytes());
        let text = decode_xml_bytes(&bytes).unwrap();
        assert_eq!(text.as_ref(), "<a name=\"\u{e9}\"/>");
    }

    #[test]
    fn test_decode_utf16_le_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let text = decode_xml_bytes(&bytes).unwrap();
        assert_eq!(text.as_ref(), "<a/>");
    }

    #[test]
    fn test_decode_utf16_be_without_bom() {
        let mut bytes = Vec::new();
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        let text = decode_xml_bytes(&bytes).unwrap();
        assert_eq!(text.as_ref(), "<a/>");
    }

    #[test]
    fn test_decode_declared_windows_1252() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><a name=\"\xE9\"/>";
        let text = decode_xml_bytes(bytes).unwrap();
        assert!(text.contains('\u{e9}'));
    }

    #[test]
    fn test_declared_encoding_extraction() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding='UTF-16'?>"),
            Some("UTF-16")
        );
        assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?>"), None);
    }

    #[test]
    fn test_parse_document_rejects_garbage() {
        assert!(parse_document("<unclosed").is_err());
        assert!(parse_document("<a><b/></a>").is_ok());
    }
}
