//! Normal forms for verbatim big numbers, so that `0x00ffN` equals `0xFFN` and
//! `1.50M` equals `1.5M` without an arbitrary-precision dependency. Both
//! forms are linear in the digit count.

use std::cmp::Ordering;
use std::hash::Hasher;

use smallvec::SmallVec;

/// Big integer digits with leading zeros removed, kept in their literal
/// radix. Zero has no digits and is radix-neutral. Nonzero numbers written
/// in different radixes are distinct values.
#[derive(Debug, Clone, Copy)]
pub struct IntDigits<'t> {
    digits: &'t str,
    radix: u32,
}

impl<'t> IntDigits<'t> {
    pub fn new(digits: &'t str, radix: u32) -> Self {
        Self {
            digits: digits.trim_start_matches('0'),
            radix,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn radix(&self) -> u32 {
        if self.is_zero() {
            10
        } else {
            self.radix
        }
    }

    fn folded(&self) -> impl Iterator<Item = u8> + 't {
        let digits = self.digits;
        digits.bytes().map(|byte| byte.to_ascii_lowercase())
    }

    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.radix());
        state.write_usize(self.digits.len());
        if self.digits.bytes().any(|byte| byte.is_ascii_uppercase()) {
            self.folded().for_each(|byte| state.write_u8(byte));
        } else {
            state.write(self.digits.as_bytes());
        }
    }

    /// Zero sorts first. Other magnitudes order by radix, then numerically
    /// within a radix.
    pub fn cmp_magnitude(&self, other: &Self) -> Ordering {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .radix
                .cmp(&other.radix)
                .then_with(|| self.digits.len().cmp(&other.digits.len()))
                .then_with(|| self.folded().cmp(other.folded())),
        }
    }
}

/// A decimal magnitude as `0.DIGITS x 10^exponent`, with leading and
/// trailing zeros removed. Zero has no digits and exponent 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecimalKey {
    digits: SmallVec<[u8; 24]>,
    exponent: i64,
}

impl DecimalKey {
    /// Parses unsigned decimal text such as `1.50`, `3` or `12e-4`.
    pub fn parse(text: &str) -> Self {
        let (mantissa, exp_text) = match text.find(['e', 'E']) {
            Some(idx) => (&text[..idx], &text[idx + 1..]),
            None => (text, ""),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let explicit = parse_exponent(exp_text);

        let mut digits: SmallVec<[u8; 24]> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .filter(u8::is_ascii_digit)
            .map(|byte| byte - b'0')
            .collect();
        let leading = digits.iter().take_while(|&&digit| digit == 0).count();
        if leading == digits.len() {
            return Self::zero();
        }
        digits.drain(..leading);
        while digits.last() == Some(&0) {
            digits.pop();
        }
        let exponent = (int_part.len() as i64 - leading as i64).saturating_add(explicit);
        Self { digits, exponent }
    }

    pub fn zero() -> Self {
        Self {
            digits: SmallVec::new(),
            exponent: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn cmp_magnitude(&self, other: &Self) -> Ordering {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .exponent
                .cmp(&other.exponent)
                .then_with(|| self.digits.as_slice().cmp(other.digits.as_slice())),
        }
    }
}

fn parse_exponent(text: &str) -> i64 {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let value = digits.bytes().fold(0i64, |acc, byte| {
        acc.saturating_mul(10).saturating_add((byte - b'0') as i64)
    });
    if negative {
        -value
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(digits: IntDigits<'_>) -> u64 {
        let mut state = std::collections::hash_map::DefaultHasher::new();
        digits.hash_into(&mut state);
        state.finish()
    }

    #[rstest::rstest]
    #[case("0042", 10, "42", 10)]
    #[case("FF", 16, "ff", 16)]
    #[case("000", 10, "0", 16)]
    #[case("", 8, "0", 10)]
    fn test_int_digits_normalize(
        #[case] a: &str,
        #[case] radix_a: u32,
        #[case] b: &str,
        #[case] radix_b: u32,
    ) {
        let (x, y) = (IntDigits::new(a, radix_a), IntDigits::new(b, radix_b));
        assert_eq!(x.cmp_magnitude(&y), Ordering::Equal);
        assert_eq!(hash_of(x), hash_of(y));
    }

    #[rstest::rstest]
    #[case("9223372036854775808", 10, "99999999999999999999999", 10)]
    #[case("9", 10, "10", 10)]
    #[case("a9", 16, "B0", 16)]
    #[case("0", 16, "1", 2)]
    #[case("ff", 16, "1", 36)]
    fn test_int_digits_ordering(
        #[case] a: &str,
        #[case] radix_a: u32,
        #[case] b: &str,
        #[case] radix_b: u32,
    ) {
        let (x, y) = (IntDigits::new(a, radix_a), IntDigits::new(b, radix_b));
        assert_eq!(x.cmp_magnitude(&y), Ordering::Less);
        assert_eq!(y.cmp_magnitude(&x), Ordering::Greater);
    }

    #[rstest::rstest]
    #[case("1.50", "1.5")]
    #[case("150e-2", "1.5")]
    #[case("0.0015e3", "1.5")]
    #[case("0", "0.000")]
    #[case("100", "1e2")]
    fn test_decimal_key_normalizes(#[case] a: &str, #[case] b: &str) {
        assert_eq!(DecimalKey::parse(a), DecimalKey::parse(b));
    }

    #[rstest::rstest]
    #[case("1.5", "2", Ordering::Less)]
    #[case("10", "9.99", Ordering::Greater)]
    #[case("0", "0.001", Ordering::Less)]
    #[case("1.25", "1.2", Ordering::Greater)]
    fn test_decimal_key_ordering(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(
            DecimalKey::parse(a).cmp_magnitude(&DecimalKey::parse(b)),
            expected
        );
    }
}
