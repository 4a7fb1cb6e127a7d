//! Character set detection for raw document bytes.
//!
//! Order: byte order mark, then the `<?` pattern of BOM-less UTF-16, then the
//! `encoding` pseudo-attribute of the XML declaration, then UTF-8.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use tracing::debug;

use crate::XmlError;

/// Decode `bytes` to text according to the BOM or XML declaration.
pub(crate) fn decode(bytes: &[u8]) -> Result<Cow<'_, str>, XmlError> {
    let (encoding, body) = detect(bytes)?;
    debug!(encoding = encoding.name(), "decoding document");
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| XmlError::Xml(format!("malformed {} byte sequence", encoding.name())))
}

fn detect(bytes: &[u8]) -> Result<(&'static Encoding, &[u8]), XmlError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return Ok((encoding, &bytes[bom_len..]));
    }
    match bytes {
        [b'<', 0, b'?', 0, ..] => return Ok((UTF_16LE, bytes)),
        [0, b'<', 0, b'?', ..] => return Ok((UTF_16BE, bytes)),
        _ => {}
    }
    let Some(label) = declared_label(bytes) else {
        return Ok((UTF_8, bytes));
    };
    let encoding = Encoding::for_label(label)
        .ok_or_else(|| {
            XmlError::Invalid(format!(
                "unsupported encoding {:?}",
                String::from_utf8_lossy(label)
            ))
        })?
        // A declaration readable as ASCII rules out UTF-16.
        .output_encoding();
    Ok((encoding, bytes))
}

/// Value of `encoding="..."` inside a leading `<?xml ... ?>`.
fn declared_label(bytes: &[u8]) -> Option<&[u8]> {
    let decl = bytes.strip_prefix(b"<?xml")?;
    let end = decl.windows(2).position(|pair| pair == b"?>")?;
    let decl = &decl[..end];
    let at = decl.windows(8).position(|window| window == b"encoding")?;
    let rest = skip_spaces(skip_spaces(&decl[at + 8..]).strip_prefix(b"=")?);
    let (&quote, value) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let close = value.iter().position(|&b| b == quote)?;
    Some(&value[..close])
}

fn skip_spaces(bytes: &[u8]) -> &[u8] {
    let spaces = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &bytes[spaces..]
}
