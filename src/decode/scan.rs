//! Batch byte-classification primitives.
//!
//! Every routine walks the input in fixed-width batches, turning each batch
//! into a bitmask (the per-byte loops below compile to compare + movemask on
//! targets with SIMD) and then resolves the first interesting bit. State that
//! has to survive a batch edge, such as a pending backslash escape, is kept as
//! an absolute offset so that results never depend on where batches fall.

use memchr::memchr;

pub const BATCH: usize = 16;

const WHITESPACE: u8 = 1;
const DELIMITER: u8 = 2;
const DIGIT: u8 = 4;

static CLASS: [u8; 256] = build_class_table();

const fn build_class_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let whitespace = [b' ', b'\t', b'\n', b'\r', b',', 0x0B, 0x0C];
    let mut idx = 0;
    while idx < whitespace.len() {
        table[whitespace[idx] as usize] = WHITESPACE | DELIMITER;
        idx += 1;
    }
    let delimiters = [b'(', b')', b'[', b']', b'{', b'}', b'"', b';'];
    idx = 0;
    while idx < delimiters.len() {
        table[delimiters[idx] as usize] = DELIMITER;
        idx += 1;
    }
    let mut digit = b'0';
    while digit <= b'9' {
        table[digit as usize] = DIGIT;
        digit += 1;
    }
    table
}

#[inline]
pub fn is_whitespace(byte: u8) -> bool {
    CLASS[byte as usize] & WHITESPACE != 0
}

/// Bytes that end a token: whitespace, brackets, `"` and `;`.
#[inline]
pub fn is_delimiter(byte: u8) -> bool {
    CLASS[byte as usize] & DELIMITER != 0
}

#[inline]
fn batch_mask(chunk: &[u8], pred: impl Fn(u8) -> bool) -> u32 {
    let mut mask = 0u32;
    for (idx, &byte) in chunk.iter().enumerate() {
        mask |= (pred(byte) as u32) << idx;
    }
    mask
}

/// Returns the offset of the first byte at or after `pos` for which `pred`
/// holds, or `bytes.len()`.
#[inline]
fn find_first(bytes: &[u8], mut pos: usize, pred: impl Fn(u8) -> bool + Copy) -> usize {
    while pos + BATCH <= bytes.len() {
        let mask = batch_mask(&bytes[pos..pos + BATCH], pred);
        if mask != 0 {
            return pos + mask.trailing_zeros() as usize;
        }
        pos += BATCH;
    }
    while pos < bytes.len() && !pred(bytes[pos]) {
        pos += 1;
    }
    pos
}

/// Skips whitespace, commas and `;` line comments starting at `pos`.
pub fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        pos = find_first(bytes, pos, |byte| !is_whitespace(byte));
        if pos < bytes.len() && bytes[pos] == b';' {
            pos = match memchr(b'\n', &bytes[pos..]) {
                Some(offset) => pos + offset + 1,
                None => bytes.len(),
            };
            continue;
        }
        return pos;
    }
}

/// Finds the first unescaped `"` at or after `pos`. With `already_escaped`
/// the byte at `pos` is treated as the target of a preceding backslash.
pub fn find_quote(bytes: &[u8], start: usize, already_escaped: bool) -> Option<usize> {
    // bytes before this offset are escaped
    let mut escaped_until = if already_escaped { start + 1 } else { start };
    let mut pos = start;
    while pos + BATCH <= bytes.len() {
        let mut events = batch_mask(&bytes[pos..pos + BATCH], |byte| {
            byte == b'"' || byte == b'\\'
        });
        while events != 0 {
            let idx = pos + events.trailing_zeros() as usize;
            events &= events - 1;
            if idx < escaped_until {
                continue;
            }
            if bytes[idx] == b'"' {
                return Some(idx);
            }
            escaped_until = idx + 2;
        }
        pos += BATCH;
    }
    for idx in pos..bytes.len() {
        if idx < escaped_until {
            continue;
        }
        match bytes[idx] {
            b'"' => return Some(idx),
            b'\\' => escaped_until = idx + 2,
            _ => {}
        }
    }
    None
}

/// Advances past a maximal run of ASCII digits.
pub fn scan_digits(bytes: &[u8], pos: usize) -> usize {
    find_first(bytes, pos, |byte| CLASS[byte as usize] & DIGIT == 0)
}

/// Advances past a maximal run of non-delimiter bytes.
pub fn scan_token(bytes: &[u8], pos: usize) -> usize {
    find_first(bytes, pos, is_delimiter)
}

pub fn has_backslash(bytes: &[u8]) -> bool {
    memchr(b'\\', bytes).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case("   x", 3)]
    #[case(" ,\t\r\n x", 6)]
    #[case("; comment\nx", 10)]
    #[case("; a\n; b\r\n  x", 11)]
    #[case("; trailing comment", 18)]
    #[case("", 0)]
    #[case("x", 0)]
    fn test_skip_whitespace(#[case] input: &str, #[case] expected: usize) {
        assert_eq!(skip_whitespace(input.as_bytes(), 0), expected);
    }

    #[rstest::rstest]
    fn test_skip_whitespace_across_batches() {
        let input = format!("{}{}x", " ".repeat(BATCH * 2 + 3), ",".repeat(BATCH - 1));
        assert_eq!(skip_whitespace(input.as_bytes(), 0), input.len() - 1);
    }

    #[rstest::rstest]
    #[case(r#"abc""#, Some(3))]
    #[case(r#"a\"b""#, Some(4))]
    #[case(r#"a\\"b"#, Some(3))]
    #[case(r#"\\\"x""#, Some(5))]
    #[case(r#"abc"#, None)]
    #[case(r#"abc\""#, None)]
    fn test_find_quote(#[case] input: &str, #[case] expected: Option<usize>) {
        assert_eq!(find_quote(input.as_bytes(), 0, false), expected);
    }

    #[rstest::rstest]
    fn test_find_quote_already_escaped() {
        assert_eq!(find_quote(br#""x""#, 0, true), Some(2));
    }

    #[rstest::rstest]
    #[case(15)]
    #[case(16)]
    #[case(31)]
    #[case(32)]
    fn test_find_quote_escape_at_batch_edge(#[case] backslash_at: usize) {
        // escaped quote straddling the batch edge, followed by the real quote
        let mut input = "a".repeat(backslash_at);
        input.push_str("\\\"tail\"");
        let expected = backslash_at + 1 + 1 + 4;
        assert_eq!(find_quote(input.as_bytes(), 0, false), Some(expected));
    }

    #[rstest::rstest]
    #[case(15)]
    #[case(16)]
    #[case(31)]
    #[case(32)]
    fn test_find_quote_escaped_backslash_at_batch_edge(#[case] backslash_at: usize) {
        let mut input = "a".repeat(backslash_at);
        input.push_str("\\\\\"");
        assert_eq!(
            find_quote(input.as_bytes(), 0, false),
            Some(backslash_at + 2)
        );
    }

    #[rstest::rstest]
    #[case("12345x", 5)]
    #[case("x", 0)]
    #[case("", 0)]
    fn test_scan_digits(#[case] input: &str, #[case] expected: usize) {
        assert_eq!(scan_digits(input.as_bytes(), 0), expected);
    }

    #[rstest::rstest]
    fn test_scan_digits_long_run() {
        let input = format!("{}]", "7".repeat(BATCH * 3 + 5));
        assert_eq!(scan_digits(input.as_bytes(), 0), BATCH * 3 + 5);
    }

    #[rstest::rstest]
    #[case("foo/bar baz", 7)]
    #[case("a.b)", 3)]
    #[case("x\"", 1)]
    #[case("x;c", 1)]
    #[case("nil", 3)]
    fn test_scan_token(#[case] input: &str, #[case] expected: usize) {
        assert_eq!(scan_token(input.as_bytes(), 0), expected);
    }

    #[rstest::rstest]
    fn test_has_backslash() {
        assert!(has_backslash(br"a\nb"));
        assert!(!has_backslash(b"plain"));
    }
}
