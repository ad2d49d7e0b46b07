//! Tiered number parsing.
//!
//! [`scan_number`] classifies a token (radix, tier, digit spans) without
//! building anything; [`parse_number`] then materialises the cheapest exact
//! representation: `i64`, verbatim big-integer digits, `f64`, or verbatim
//! big-decimal text.

use crate::arena::Span;
use crate::decode::scan::scan_digits;

/// A number literal, with spans relative to the token it was parsed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    BigInt {
        negative: bool,
        radix: u8,
        digits: Span,
    },
    Float(f64),
    BigDecimal {
        negative: bool,
        digits: Span,
    },
    #[cfg(feature = "ratio")]
    Ratio { numerator: i64, denominator: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberShape {
    Integer {
        negative: bool,
        radix: u32,
        digits: Span,
        /// Explicit `N` suffix.
        big: bool,
    },
    Decimal {
        negative: bool,
        /// Unsigned mantissa and exponent, without the `M` suffix.
        body: Span,
        /// Explicit `M` suffix.
        exact: bool,
    },
    #[cfg(feature = "ratio")]
    Ratio {
        negative: bool,
        numerator: Span,
        denominator: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberError {
    /// Offset within the token where the problem was detected.
    pub offset: usize,
    pub message: &'static str,
}

fn error(offset: usize, message: &'static str) -> NumberError {
    NumberError { offset, message }
}

/// Largest mantissa a double holds exactly.
const MAX_EXACT_MANTISSA: u64 = 1 << 53;

const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Classifies a complete number token.
pub fn scan_number(token: &[u8]) -> Result<NumberShape, NumberError> {
    let len = token.len();
    let mut idx = 0;
    let mut negative = false;
    if let Some(&sign @ (b'+' | b'-')) = token.first() {
        negative = sign == b'-';
        idx = 1;
    }
    if !token.get(idx).is_some_and(u8::is_ascii_digit) {
        return Err(error(idx, "expected a digit"));
    }

    if token[idx] == b'0' && matches!(token.get(idx + 1), Some(b'x' | b'X')) {
        let start = idx + 2;
        let mut end = start;
        while end < len && token[end].is_ascii_hexdigit() {
            end += 1;
        }
        if end == start {
            return Err(error(start, "missing hexadecimal digits"));
        }
        let big = token.get(end) == Some(&b'N');
        let rest = end + big as usize;
        if rest != len {
            return Err(error(rest, "invalid character in hexadecimal literal"));
        }
        return Ok(NumberShape::Integer {
            negative,
            radix: 16,
            digits: Span::new(start, end),
            big,
        });
    }

    let run_end = scan_digits(token, idx);
    match token.get(run_end) {
        None => integer_shape(token, negative, idx, run_end, false),
        Some(b'N') if run_end + 1 == len => integer_shape(token, negative, idx, run_end, true),
        Some(b'M') if run_end + 1 == len => Ok(NumberShape::Decimal {
            negative,
            body: Span::new(idx, run_end),
            exact: true,
        }),
        Some(b'r' | b'R') => radix_shape(token, negative, idx, run_end),
        Some(b'.' | b'e' | b'E') => decimal_shape(token, negative, idx, run_end),
        #[cfg(feature = "ratio")]
        Some(b'/') => ratio_shape(token, negative, idx, run_end),
        Some(_) => Err(error(run_end, "invalid character in number")),
    }
}

fn integer_shape(
    token: &[u8],
    negative: bool,
    start: usize,
    end: usize,
    big: bool,
) -> Result<NumberShape, NumberError> {
    if token[start] == b'0' && end - start > 1 {
        if let Some(bad) = token[start + 1..end].iter().position(|&b| b > b'7') {
            return Err(error(start + 1 + bad, "invalid digit in octal literal"));
        }
        return Ok(NumberShape::Integer {
            negative,
            radix: 8,
            digits: Span::new(start + 1, end),
            big,
        });
    }
    Ok(NumberShape::Integer {
        negative,
        radix: 10,
        digits: Span::new(start, end),
        big,
    })
}

fn radix_shape(
    token: &[u8],
    negative: bool,
    start: usize,
    run_end: usize,
) -> Result<NumberShape, NumberError> {
    let radix = if run_end - start <= 2 {
        token[start..run_end]
            .iter()
            .fold(0u32, |acc, &b| acc * 10 + (b - b'0') as u32)
    } else {
        0
    };
    if !(2..=36).contains(&radix) {
        return Err(error(start, "radix out of range"));
    }
    let digits_start = run_end + 1;
    if digits_start == token.len() {
        return Err(error(digits_start, "missing digits after radix"));
    }
    if let Some(bad) = token[digits_start..]
        .iter()
        .position(|&b| (b as char).to_digit(radix).is_none())
    {
        return Err(error(digits_start + bad, "invalid digit for radix"));
    }
    Ok(NumberShape::Integer {
        negative,
        radix,
        digits: Span::new(digits_start, token.len()),
        big: false,
    })
}

fn decimal_shape(
    token: &[u8],
    negative: bool,
    start: usize,
    run_end: usize,
) -> Result<NumberShape, NumberError> {
    let len = token.len();
    let mut pos = run_end;
    if token.get(pos) == Some(&b'.') {
        pos = scan_digits(token, pos + 1);
    }
    if matches!(token.get(pos), Some(b'e' | b'E')) {
        pos += 1;
        if matches!(token.get(pos), Some(b'+' | b'-')) {
            pos += 1;
        }
        let exp_start = pos;
        pos = scan_digits(token, pos);
        if pos == exp_start {
            return Err(error(exp_start, "missing exponent digits"));
        }
    }
    let body = Span::new(start, pos);
    let exact = token.get(pos) == Some(&b'M');
    if exact {
        pos += 1;
    }
    if pos != len {
        return Err(error(pos, "invalid character in number"));
    }
    Ok(NumberShape::Decimal {
        negative,
        body,
        exact,
    })
}

#[cfg(feature = "ratio")]
fn ratio_shape(
    token: &[u8],
    negative: bool,
    start: usize,
    run_end: usize,
) -> Result<NumberShape, NumberError> {
    let den_start = run_end + 1;
    let den_end = scan_digits(token, den_start);
    if den_end == den_start {
        return Err(error(den_start, "missing ratio denominator"));
    }
    if den_end != token.len() {
        return Err(error(den_end, "invalid character in ratio"));
    }
    Ok(NumberShape::Ratio {
        negative,
        numerator: Span::new(start, run_end),
        denominator: Span::new(den_start, den_end),
    })
}

/// Parses a complete number token into its cheapest exact tier.
pub fn parse_number(token: &str) -> Result<Number, NumberError> {
    let bytes = token.as_bytes();
    match scan_number(bytes)? {
        NumberShape::Integer {
            negative,
            radix,
            digits,
            big,
        } => {
            if !big {
                if let Some(value) = parse_i64(&bytes[digits.start..digits.end], radix, negative) {
                    return Ok(Number::Int(value));
                }
            }
            Ok(Number::BigInt {
                negative,
                radix: radix as u8,
                digits,
            })
        }
        NumberShape::Decimal {
            negative,
            body,
            exact: true,
        } => Ok(Number::BigDecimal {
            negative,
            digits: body,
        }),
        NumberShape::Decimal {
            negative,
            body,
            exact: false,
        } => {
            let magnitude = parse_f64(&token[body.start..body.end])
                .ok_or_else(|| error(body.start, "malformed floating point literal"))?;
            Ok(Number::Float(if negative { -magnitude } else { magnitude }))
        }
        #[cfg(feature = "ratio")]
        NumberShape::Ratio {
            negative,
            numerator,
            denominator,
        } => {
            let num = parse_i64(&bytes[numerator.start..numerator.end], 10, negative)
                .ok_or_else(|| error(numerator.start, "ratio numerator out of range"))?;
            let den = parse_i64(&bytes[denominator.start..denominator.end], 10, false)
                .ok_or_else(|| error(denominator.start, "ratio denominator out of range"))?;
            if den == 0 {
                return Err(error(denominator.start, "ratio denominator is zero"));
            }
            let (numerator, denominator) = reduce_ratio(num, den)
                .ok_or_else(|| error(numerator.start, "ratio out of range"))?;
            Ok(Number::Ratio {
                numerator,
                denominator,
            })
        }
    }
}

/// Accumulates digits with overflow checks. `None` means the value does not
/// fit in an `i64`.
pub fn parse_i64(digits: &[u8], radix: u32, negative: bool) -> Option<i64> {
    let mut acc: u64 = 0;
    for &byte in digits {
        let digit = (byte as char).to_digit(radix)? as u64;
        acc = acc.checked_mul(radix as u64)?.checked_add(digit)?;
    }
    if negative {
        if acc <= i64::MAX as u64 {
            Some(-(acc as i64))
        } else if acc == i64::MAX as u64 + 1 {
            Some(i64::MIN)
        } else {
            None
        }
    } else {
        i64::try_from(acc).ok()
    }
}

/// Parses an unsigned decimal body. Small mantissas with small exponents are
/// computed exactly; everything else goes through the correctly rounded
/// general conversion.
pub fn parse_f64(body: &str) -> Option<f64> {
    fast_f64(body.as_bytes()).or_else(|| body.parse::<f64>().ok())
}

fn fast_f64(bytes: &[u8]) -> Option<f64> {
    let mut mantissa: u64 = 0;
    let mut frac_digits: i32 = 0;
    let mut idx = 0;
    let mut in_fraction = false;
    while idx < bytes.len() {
        match bytes[idx] {
            digit @ b'0'..=b'9' => {
                mantissa = mantissa
                    .checked_mul(10)?
                    .checked_add((digit - b'0') as u64)?;
                if in_fraction {
                    frac_digits += 1;
                }
            }
            b'.' => in_fraction = true,
            b'e' | b'E' => break,
            _ => return None,
        }
        idx += 1;
    }
    if mantissa > MAX_EXACT_MANTISSA {
        return None;
    }
    let mut exponent: i32 = 0;
    if idx < bytes.len() {
        idx += 1;
        let mut exp_negative = false;
        if let Some(&sign @ (b'+' | b'-')) = bytes.get(idx) {
            exp_negative = sign == b'-';
            idx += 1;
        }
        let digits = &bytes[idx..];
        if digits.is_empty() || digits.len() > 4 {
            return None;
        }
        for &digit in digits {
            exponent = exponent * 10 + (digit - b'0') as i32;
        }
        if exp_negative {
            exponent = -exponent;
        }
    }
    let exponent = exponent - frac_digits;
    let value = mantissa as f64;
    match exponent {
        0..=22 => Some(value * POW10[exponent as usize]),
        -22..=-1 => Some(value / POW10[(-exponent) as usize]),
        _ => None,
    }
}

#[cfg(feature = "ratio")]
fn reduce_ratio(numerator: i64, denominator: i64) -> Option<(i64, i64)> {
    let mut a = numerator.unsigned_abs();
    let mut b = denominator.unsigned_abs();
    while b != 0 {
        (a, b) = (b, a % b);
    }
    let gcd = a.max(1) as i64;
    let numerator = numerator.checked_div(gcd)?;
    let denominator = denominator.checked_div(gcd)?;
    if denominator < 0 {
        Some((numerator.checked_neg()?, denominator.checked_neg()?))
    } else {
        Some((numerator, denominator))
    }
}
