use std::fmt;

use memchr::memchr;

/// A malformed escape inside a string literal, relative to the raw string
/// body (the text between the quotes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeError {
    pub offset: usize,
    pub len: usize,
    pub message: &'static str,
}

/// Decodes the escape starting at `bytes[idx] == b'\\'`. Returns the decoded
/// character and the number of bytes consumed.
fn read_escape(bytes: &[u8], idx: usize) -> Result<(char, usize), EscapeError> {
    let invalid = |len: usize, message: &'static str| EscapeError {
        offset: idx,
        len,
        message,
    };
    let Some(&next) = bytes.get(idx + 1) else {
        return Err(invalid(1, "unterminated escape"));
    };
    let ch = match next {
        b'n' => '\n',
        b't' => '\t',
        b'r' => '\r',
        b'"' => '"',
        b'\\' => '\\',
        b'f' => '\u{0C}',
        b'b' => '\u{08}',
        b'/' => '/',
        b'u' => return read_unicode_escape(bytes, idx),
        _ => return Err(invalid(2, "unknown escape sequence")),
    };
    Ok((ch, 2))
}

fn read_hex4(bytes: &[u8], start: usize) -> Option<u32> {
    let digits = bytes.get(start..start + 4)?;
    let mut value = 0u32;
    for &byte in digits {
        value = value * 16 + (byte as char).to_digit(16)?;
    }
    Some(value)
}

fn read_unicode_escape(bytes: &[u8], idx: usize) -> Result<(char, usize), EscapeError> {
    let available = (bytes.len() - idx).min(6);
    let Some(unit) = read_hex4(bytes, idx + 2) else {
        return Err(EscapeError {
            offset: idx,
            len: available,
            message: "truncated or malformed \\u escape",
        });
    };
    if (0xD800..0xDC00).contains(&unit) {
        let low = if bytes.get(idx + 6) == Some(&b'\\') && bytes.get(idx + 7) == Some(&b'u') {
            read_hex4(bytes, idx + 8)
        } else {
            None
        };
        return match low {
            Some(low) if (0xDC00..0xE000).contains(&low) => {
                let scalar = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                char::from_u32(scalar)
                    .map(|ch| (ch, 12))
                    .ok_or(EscapeError {
                        offset: idx,
                        len: 12,
                        message: "invalid surrogate pair",
                    })
            }
            _ => Err(EscapeError {
                offset: idx,
                len: 6,
                message: "unpaired surrogate in \\u escape",
            }),
        };
    }
    char::from_u32(unit).map(|ch| (ch, 6)).ok_or(EscapeError {
        offset: idx,
        len: 6,
        message: "unpaired surrogate in \\u escape",
    })
}

/// Checks every escape in a raw string body without decoding it.
pub fn validate_escapes(raw: &str) -> Result<(), EscapeError> {
    let bytes = raw.as_bytes();
    let mut idx = 0;
    while let Some(offset) = memchr(b'\\', &bytes[idx..]) {
        let pos = idx + offset;
        let (_, consumed) = read_escape(bytes, pos)?;
        idx = pos + consumed;
    }
    Ok(())
}

/// Feeds the decoded form of `raw` to `sink` in pieces, without allocating.
/// Malformed escapes are passed through verbatim.
pub fn for_each_decoded(raw: &str, mut sink: impl FnMut(&str)) {
    let bytes = raw.as_bytes();
    let mut idx = 0;
    let mut buf = [0u8; 4];
    while idx < bytes.len() {
        let Some(offset) = memchr(b'\\', &bytes[idx..]) else {
            sink(&raw[idx..]);
            return;
        };
        let pos = idx + offset;
        if pos > idx {
            sink(&raw[idx..pos]);
        }
        match read_escape(bytes, pos) {
            Ok((ch, consumed)) => {
                sink(ch.encode_utf8(&mut buf));
                idx = pos + consumed;
            }
            Err(_) => {
                sink("\\");
                idx = pos + 1;
            }
        }
    }
}

/// Decodes all escapes of a raw string body into a fresh buffer.
pub fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for_each_decoded(raw, |piece| out.push_str(piece));
    out
}

/// Writes `value` as an EDN string body (without the surrounding quotes).
pub fn escape_into<W: fmt::Write>(out: &mut W, value: &str) -> fmt::Result {
    let bytes = value.as_bytes();
    let mut start = 0;
    for (idx, byte) in bytes.iter().enumerate() {
        let escaped = match byte {
            b'"' => "\\\"",
            b'\\' => "\\\\",
            b'\n' => "\\n",
            b'\t' => "\\t",
            b'\r' => "\\r",
            0x08 => "\\b",
            0x0C => "\\f",
            _ => continue,
        };
        if start < idx {
            out.write_str(&value[start..idx])?;
        }
        out.write_str(escaped)?;
        start = idx + 1;
    }
    if start < value.len() {
        out.write_str(&value[start..])?;
    }
    Ok(())
}
