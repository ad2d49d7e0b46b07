use std::fmt::{self, Write};

use crate::text::string::escape_into;
use crate::value::{NameRef, ValueRef, ValueType};

/// Writes values back out as EDN text. The output reads back to an equal
/// value; metadata is not written.
pub(crate) struct Writer<'w, W: Write> {
    out: &'w mut W,
}

impl<'w, W: Write> Writer<'w, W> {
    pub(crate) fn new(out: &'w mut W) -> Self {
        Self { out }
    }

    pub(crate) fn write_value(&mut self, value: ValueRef<'_>) -> fmt::Result {
        match value.value_type() {
            ValueType::Nil => self.out.write_str("nil"),
            ValueType::Bool => self.write_bool(value.as_bool() == Some(true)),
            ValueType::Int => self.write_i64(value.as_i64().unwrap_or_default()),
            ValueType::BigInt => self.write_bigint(value),
            ValueType::Float => self.write_f64(value.as_f64().unwrap_or_default()),
            ValueType::BigDecimal => self.write_bigdecimal(value),
            #[cfg(feature = "ratio")]
            ValueType::Ratio => {
                let (numerator, denominator) = value.as_ratio().unwrap_or((0, 1));
                self.write_i64(numerator)?;
                self.out.write_char('/')?;
                self.write_i64(denominator)
            }
            ValueType::Char => self.write_char_literal(value.as_char().unwrap_or_default()),
            ValueType::String => self.write_quoted_string(value.as_str().unwrap_or_default()),
            ValueType::Symbol => match value.as_symbol() {
                Some(name) => self.write_name(name),
                None => Ok(()),
            },
            ValueType::Keyword => match value.as_keyword() {
                Some(name) => {
                    self.out.write_char(':')?;
                    self.write_name(name)
                }
                None => Ok(()),
            },
            ValueType::List => self.write_items("(", value, ")"),
            ValueType::Vector => self.write_items("[", value, "]"),
            ValueType::Set => self.write_items("#{", value, "}"),
            ValueType::Map => self.write_map(value),
            ValueType::Tagged => {
                if let Some(tag) = value.tag() {
                    self.out.write_char('#')?;
                    self.write_name(tag)?;
                    self.out.write_char(' ')?;
                }
                match value.tagged_value() {
                    Some(inner) => self.write_value(inner),
                    None => Ok(()),
                }
            }
        }
    }

    fn write_bool(&mut self, value: bool) -> fmt::Result {
        self.out.write_str(if value { "true" } else { "false" })
    }

    fn write_i64(&mut self, value: i64) -> fmt::Result {
        let mut buf = itoa::Buffer::new();
        self.out.write_str(buf.format(value))
    }

    fn write_f64(&mut self, value: f64) -> fmt::Result {
        if value.is_nan() {
            return self.out.write_str("##NaN");
        }
        if value.is_infinite() {
            return self
                .out
                .write_str(if value > 0.0 { "##Inf" } else { "##-Inf" });
        }
        let mut buf = ryu::Buffer::new();
        self.out.write_str(buf.format_finite(value))
    }

    fn write_bigint(&mut self, value: ValueRef<'_>) -> fmt::Result {
        let Some(big) = value.as_bigint() else {
            return Ok(());
        };
        if big.negative {
            self.out.write_char('-')?;
        }
        match big.radix {
            10 => {
                self.out.write_str(big.digits)?;
                self.out.write_char('N')
            }
            16 => {
                self.out.write_str("0x")?;
                self.out.write_str(big.digits)?;
                self.out.write_char('N')
            }
            8 => {
                self.out.write_char('0')?;
                self.out.write_str(big.digits)?;
                self.out.write_char('N')
            }
            radix => {
                // radix literals take no suffix; they only get here on overflow
                let mut buf = itoa::Buffer::new();
                self.out.write_str(buf.format(radix))?;
                self.out.write_char('r')?;
                self.out.write_str(big.digits)
            }
        }
    }

    fn write_bigdecimal(&mut self, value: ValueRef<'_>) -> fmt::Result {
        let Some(decimal) = value.as_bigdecimal() else {
            return Ok(());
        };
        if decimal.negative {
            self.out.write_char('-')?;
        }
        self.out.write_str(decimal.digits)?;
        self.out.write_char('M')
    }

    fn write_char_literal(&mut self, ch: char) -> fmt::Result {
        self.out.write_char('\\')?;
        match ch {
            '\n' => self.out.write_str("newline"),
            '\r' => self.out.write_str("return"),
            ' ' => self.out.write_str("space"),
            '\t' => self.out.write_str("tab"),
            ch if ch.is_control() && (ch as u32) <= 0xFFFF => {
                write!(self.out, "u{:04X}", ch as u32)
            }
            ch => self.out.write_char(ch),
        }
    }

    pub(crate) fn write_quoted_string(&mut self, value: &str) -> fmt::Result {
        self.out.write_char('"')?;
        escape_into(self.out, value)?;
        self.out.write_char('"')
    }

    fn write_name(&mut self, name: NameRef<'_>) -> fmt::Result {
        if let Some(namespace) = name.namespace {
            self.out.write_str(namespace)?;
            self.out.write_char('/')?;
        }
        self.out.write_str(name.name)
    }

    fn write_items(&mut self, open: &str, value: ValueRef<'_>, close: &str) -> fmt::Result {
        self.out.write_str(open)?;
        for (idx, item) in value.iter().enumerate() {
            if idx > 0 {
                self.out.write_char(' ')?;
            }
            self.write_value(item)?;
        }
        self.out.write_str(close)
    }

    fn write_map(&mut self, value: ValueRef<'_>) -> fmt::Result {
        self.out.write_char('{')?;
        for (idx, (key, item)) in value.entries().enumerate() {
            if idx > 0 {
                self.out.write_str(", ")?;
            }
            self.write_value(key)?;
            self.out.write_char(' ')?;
            self.write_value(item)?;
        }
        self.out.write_char('}')
    }
}

impl fmt::Display for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Writer::new(f).write_value(*self)
    }
}

/// Renders `value` as EDN text.
pub fn to_edn_string(value: ValueRef<'_>) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = Writer::new(&mut out).write_value(value);
    out
}
