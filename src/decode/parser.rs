use std::fmt;

use crate::arena::{Arena, Name, Node, Span, Text, ValueId};
use crate::num::{parse_number, Number};
use crate::options::{DefaultReaderMode, EofValue, ParseOptions};
use crate::text::string::validate_escapes;
use crate::value::cmp::Seen;
use crate::{Error, ErrorKind, Result};

use super::scan::{find_quote, has_backslash, is_delimiter, scan_token, skip_whitespace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    List,
    Vector,
    Map,
    Set,
}

impl Collection {
    fn closer(self) -> u8 {
        match self {
            Collection::List => b')',
            Collection::Vector => b']',
            Collection::Map | Collection::Set => b'}',
        }
    }

    fn name(self) -> &'static str {
        match self {
            Collection::List => "list",
            Collection::Vector => "vector",
            Collection::Map => "map",
            Collection::Set => "set",
        }
    }
}

/// The reader macro a required form follows, for error messages.
#[derive(Debug, Clone, Copy)]
enum After<'t> {
    Discard,
    Tag(&'t str),
    #[cfg(feature = "metadata")]
    Meta,
    #[cfg(feature = "metadata")]
    MetaTarget,
}

impl fmt::Display for After<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            After::Discard => f.write_str("#_"),
            After::Tag(tag) => write!(f, "tag #{tag}"),
            #[cfg(feature = "metadata")]
            After::Meta => f.write_str("^"),
            #[cfg(feature = "metadata")]
            After::MetaTarget => f.write_str("metadata"),
        }
    }
}

fn is_closer(byte: u8) -> bool {
    matches!(byte, b')' | b']' | b'}')
}

fn is_symbol_char(ch: char) -> bool {
    ch.is_alphanumeric()
        || matches!(
            ch,
            '.' | '*' | '+' | '!' | '-' | '_' | '?' | '$' | '%' | '&' | '=' | '<' | '>' | '#'
                | ':' | '\''
        )
}

fn is_symbol_start(ch: char) -> bool {
    ch.is_alphabetic()
        || matches!(
            ch,
            '.' | '*' | '+' | '!' | '-' | '_' | '?' | '$' | '%' | '&' | '=' | '<' | '>'
        )
}

/// Checks one segment (namespace or name) of a symbol or keyword.
fn valid_segment(segment: &str, allow_digit_start: bool) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(is_symbol_start(first) || (allow_digit_start && first.is_ascii_digit())) {
        return false;
    }
    // `-1x`, `+2` and `.5` would read as numbers
    if matches!(first, '-' | '+' | '.') && segment[1..].starts_with(|ch: char| ch.is_ascii_digit())
    {
        return false;
    }
    chars.all(is_symbol_char)
}

/// Splits `token` into namespace and name spans relative to `offset`.
fn split_name(token: &str, offset: usize, allow_digit_start: bool) -> Option<Name> {
    if token == "/" {
        return Some(Name {
            namespace: None,
            name: Text::Input(Span::new(offset, offset + 1)),
        });
    }
    match token.find('/') {
        None => valid_segment(token, allow_digit_start).then(|| Name {
            namespace: None,
            name: Text::Input(Span::new(offset, offset + token.len())),
        }),
        Some(slash) => {
            let (namespace, name) = (&token[..slash], &token[slash + 1..]);
            let name_ok = name == "/" || valid_segment(name, allow_digit_start);
            (valid_segment(namespace, allow_digit_start) && name_ok).then(|| Name {
                namespace: Some(Text::Input(Span::new(offset, offset + slash))),
                name: Text::Input(Span::new(offset + slash + 1, offset + token.len())),
            })
        }
    }
}

/// Recursive-descent reader. Per-collection state (open delimiters, items
/// read so far, duplicate tables) lives in heap stacks on the reader so each
/// nesting level costs as little call stack as possible.
pub(crate) struct Reader<'a, 'o> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    openers: Vec<(usize, Collection)>,
    items: Vec<ValueId>,
    seen: Vec<Seen>,
    open_sets: usize,
    arena: Arena<'a>,
    options: &'o ParseOptions,
}

impl<'a, 'o> Reader<'a, 'o> {
    pub(crate) fn new(
        input: &'a str,
        start: usize,
        arena: Arena<'a>,
        options: &'o ParseOptions,
    ) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: start,
            depth: 0,
            openers: Vec::new(),
            items: Vec::new(),
            seen: Vec::new(),
            open_sets: 0,
            arena,
            options,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn into_arena(self) -> Arena<'a> {
        self.arena
    }

    #[cold]
    fn error(
        &self,
        kind: ErrorKind,
        message: impl Into<String>,
        start: usize,
        end: usize,
    ) -> Error {
        Error::at(kind, message, self.bytes, start, end)
    }

    /// Arena errors carry no position; pin them to the value being built.
    fn locate(&self, err: Error, start: usize) -> Error {
        if err.start.offset == 0 && err.end.offset == 0 {
            Error::at(err.kind, err.message, self.bytes, start, self.pos)
        } else {
            err
        }
    }

    /// Error for input that ends where more is required. Inside a collection
    /// this is reported against the innermost opener.
    #[cold]
    #[inline(never)]
    fn eof_error(&self, start: usize, message: &str) -> Error {
        let end = self.bytes.len();
        match self.openers.last() {
            Some(&(opener, kind)) => self.error(
                ErrorKind::UnterminatedCollection,
                format!("unterminated {}: {message}", kind.name()),
                opener,
                end,
            ),
            None => self.error(ErrorKind::UnexpectedEof, message, start, end),
        }
    }

    #[cold]
    #[inline(never)]
    fn depth_error(&self, start: usize) -> Error {
        self.error(
            ErrorKind::DepthExceeded,
            format!("nesting deeper than {} levels", self.options.max_depth),
            start,
            start + 1,
        )
    }

    #[cold]
    #[inline(never)]
    fn unmatched(&self, at: usize, byte: u8) -> Error {
        self.error(
            ErrorKind::UnmatchedDelimiter,
            format!("unmatched '{}'", byte as char),
            at,
            at + 1,
        )
    }

    #[cold]
    #[inline(never)]
    fn unexpected_closer(&self, at: usize, byte: u8) -> Error {
        self.error(
            ErrorKind::InvalidSyntax,
            format!("unexpected '{}'", byte as char),
            at,
            at + 1,
        )
    }

    #[cold]
    #[inline(never)]
    fn missing_value(&self, start: usize, after: After<'_>) -> Error {
        match self.bytes.get(self.pos) {
            Some(&byte) => self.error(
                ErrorKind::InvalidSyntax,
                format!("expected a value after {after}, found '{}'", byte as char),
                start,
                self.pos + 1,
            ),
            None => self.eof_error(start, &format!("expected a value after {after}")),
        }
    }

    #[cold]
    #[inline(never)]
    fn unterminated(&self, opener: usize, kind: Collection) -> Error {
        self.error(
            ErrorKind::UnterminatedCollection,
            format!(
                "unterminated {}, expected '{}'",
                kind.name(),
                kind.closer() as char
            ),
            opener,
            self.bytes.len(),
        )
    }

    #[cold]
    #[inline(never)]
    fn mismatched(&self, opener: usize, kind: Collection, byte: u8) -> Error {
        self.error(
            ErrorKind::UnmatchedDelimiter,
            format!(
                "expected '{}' to close {} but found '{}'",
                kind.closer() as char,
                kind.name(),
                byte as char
            ),
            opener,
            self.pos + 1,
        )
    }

    #[cold]
    #[inline(never)]
    fn duplicate(&self, kind: Collection, start: usize) -> Error {
        match kind {
            Collection::Map => {
                self.error(ErrorKind::DuplicateKey, "duplicate map key", start, self.pos)
            }
            _ => self.error(
                ErrorKind::DuplicateElement,
                "duplicate set element",
                start,
                self.pos,
            ),
        }
    }

    /// Goes one nesting level deeper. Callers pair every successful `enter`
    /// with a `leave`, including on error paths.
    fn enter(&mut self, start: usize) -> Result<()> {
        if self.depth >= self.options.max_depth {
            return Err(self.depth_error(start));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Reads the form required after a reader macro, one level deeper.
    fn read_nested(&mut self, start: usize, after: After<'_>) -> Result<ValueId> {
        self.enter(start)?;
        let result = self.read_required(start, after);
        self.leave();
        result
    }

    /// Reads the next top-level form. `None` means only trivia remained.
    pub(crate) fn read_top(&mut self) -> Result<Option<ValueId>> {
        self.skip_trivia()?;
        match self.bytes.get(self.pos) {
            None => Ok(None),
            Some(&byte) if is_closer(byte) => Err(self.unmatched(self.pos, byte)),
            Some(_) => self.read_value().map(Some),
        }
    }

    /// Requires that nothing but trivia follows the current position.
    pub(crate) fn expect_end(&mut self) -> Result<()> {
        self.skip_trivia()?;
        match self.bytes.get(self.pos) {
            None => Ok(()),
            Some(&byte) if is_closer(byte) => Err(self.unmatched(self.pos, byte)),
            Some(_) => {
                let end = scan_token(self.bytes, self.pos).max(self.pos + 1);
                Err(self.error(
                    ErrorKind::InvalidSyntax,
                    "unexpected content after the top-level value",
                    self.pos,
                    end,
                ))
            }
        }
    }

    pub(crate) fn empty_input_error(&self) -> Error {
        self.error(
            ErrorKind::UnexpectedEof,
            "input contains no value",
            self.pos,
            self.bytes.len(),
        )
    }

    pub(crate) fn alloc_eof_value(&mut self, value: &EofValue) -> Result<ValueId> {
        let start = self.pos;
        let result = match value {
            EofValue::Nil => Ok(ValueId::NIL),
            EofValue::Bool(value) => Ok(ValueId::from_bool(*value)),
            EofValue::Int(value) => self.arena.alloc_int(*value),
            EofValue::Keyword(name) => match name.split_once('/') {
                Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                    self.arena.alloc_keyword(Some(namespace), name)
                }
                _ => self.arena.alloc_keyword(None, name),
            },
        };
        result.map_err(|err| self.locate(err, start))
    }

    /// Skips whitespace, comments and `#_` discarded forms.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            self.pos = skip_whitespace(self.bytes, self.pos);
            if self.bytes.get(self.pos..self.pos + 2) == Some(b"#_".as_slice()) {
                let start = self.pos;
                self.pos += 2;
                let mark = self.arena.mark();
                self.read_nested(start, After::Discard)?;
                self.arena.rewind(mark);
                continue;
            }
            return Ok(());
        }
    }

    /// Reads the form that must follow a reader macro starting at `start`.
    fn read_required(&mut self, start: usize, after: After<'_>) -> Result<ValueId> {
        self.skip_trivia()?;
        match self.bytes.get(self.pos) {
            Some(&byte) if !is_closer(byte) => self.read_value(),
            _ => Err(self.missing_value(start, after)),
        }
    }

    /// Reads one value starting at a non-trivia byte.
    fn read_value(&mut self) -> Result<ValueId> {
        let start = self.pos;
        let Some(&lead) = self.bytes.get(start) else {
            return Err(self.eof_error(start, "expected a value"));
        };
        match lead {
            b'(' => self.read_collection(start, start + 1, Collection::List),
            b'[' => self.read_collection(start, start + 1, Collection::Vector),
            b'{' => self.read_collection(start, start + 1, Collection::Map),
            b')' | b']' | b'}' => Err(self.unexpected_closer(start, lead)),
            b'"' => self.read_string(start),
            b'\\' => self.read_char(start),
            b':' => self.read_keyword(start),
            b'#' => self.read_dispatch(start),
            b'^' => self.read_meta(start),
            b'0'..=b'9' => self.read_number(start),
            b'+' | b'-' if self.bytes.get(start + 1).is_some_and(u8::is_ascii_digit) => {
                self.read_number(start)
            }
            _ => self.read_symbolic(start),
        }
    }

    fn read_collection(
        &mut self,
        opener: usize,
        content: usize,
        kind: Collection,
    ) -> Result<ValueId> {
        self.enter(opener)?;
        self.pos = content;
        self.openers.push((opener, kind));
        let base = self.items.len();
        let dedup = matches!(kind, Collection::Set | Collection::Map);
        if dedup {
            self.push_seen();
        }
        let result = match self.read_items(opener, kind, base) {
            Ok(()) => self.finish_collection(opener, kind, base),
            Err(err) => Err(err),
        };
        if dedup {
            self.open_sets -= 1;
        }
        self.items.truncate(base);
        self.openers.pop();
        self.leave();
        result
    }

    /// Opens a duplicate table for a set or map, reusing a cleared one.
    fn push_seen(&mut self) {
        match self.seen.get_mut(self.open_sets) {
            Some(seen) => seen.clear(),
            None => self.seen.push(Seen::new()),
        }
        self.open_sets += 1;
    }

    /// Records `id` in the innermost open set or map; `false` on a duplicate.
    fn insert_seen(&mut self, id: ValueId) -> bool {
        let top = self.open_sets.checked_sub(1);
        match top.and_then(|top| self.seen.get_mut(top)) {
            Some(seen) => seen.insert(&self.arena, id),
            None => true,
        }
    }

    /// Reads items up to and including the closer, pushing them onto the
    /// item stack above `base`.
    fn read_items(&mut self, opener: usize, kind: Collection, base: usize) -> Result<()> {
        let closer = kind.closer();
        loop {
            self.skip_trivia()?;
            let Some(&byte) = self.bytes.get(self.pos) else {
                return Err(self.unterminated(opener, kind));
            };
            if byte == closer {
                self.pos += 1;
                return Ok(());
            }
            if is_closer(byte) {
                return Err(self.mismatched(opener, kind, byte));
            }
            let item_start = self.pos;
            let id = self.read_value()?;
            let unique = match kind {
                Collection::Set => true,
                Collection::Map => (self.items.len() - base) % 2 == 0,
                Collection::List | Collection::Vector => false,
            };
            if unique && !self.insert_seen(id) {
                return Err(self.duplicate(kind, item_start));
            }
            self.items.push(id);
        }
    }

    #[inline(never)]
    fn finish_collection(
        &mut self,
        opener: usize,
        kind: Collection,
        base: usize,
    ) -> Result<ValueId> {
        if kind == Collection::Map && (self.items.len() - base) % 2 != 0 {
            return Err(self.error(
                ErrorKind::InvalidSyntax,
                "map literal must contain an even number of forms",
                opener,
                self.pos,
            ));
        }
        let items = &self.items[base..];
        let arena = &mut self.arena;
        let result = arena.alloc_children(items).and_then(|children| {
            arena.alloc_value(match kind {
                Collection::List => Node::List(children),
                Collection::Vector => Node::Vector(children),
                Collection::Map => Node::Map(children),
                Collection::Set => Node::Set(children),
            })
        });
        result.map_err(|err| self.locate(err, opener))
    }

    fn read_string(&mut self, start: usize) -> Result<ValueId> {
        let body = start + 1;
        let Some(close) = find_quote(self.bytes, body, false) else {
            return Err(self.error(
                ErrorKind::InvalidString,
                "unterminated string",
                start,
                self.bytes.len(),
            ));
        };
        let raw = &self.input[body..close];
        let escaped = has_backslash(raw.as_bytes());
        if escaped {
            validate_escapes(raw).map_err(|err| {
                self.error(
                    ErrorKind::InvalidEscape,
                    err.message,
                    body + err.offset,
                    body + err.offset + err.len,
                )
            })?;
        }
        self.pos = close + 1;
        self.arena
            .alloc_string_slot(Text::Input(Span::new(body, close)), escaped)
            .map_err(|err| self.locate(err, start))
    }

    fn read_char(&mut self, start: usize) -> Result<ValueId> {
        let Some(first) = self.input[start + 1..].chars().next() else {
            return Err(self.eof_error(start, "expected a character after '\\'"));
        };
        let mut end = start + 1 + first.len_utf8();
        if !first.is_ascii() || !is_delimiter(first as u8) {
            end = scan_token(self.bytes, end);
        }
        let name = &self.input[start + 1..end];
        let value = if name.chars().nth(1).is_none() {
            first
        } else {
            match name {
                "newline" => '\n',
                "return" => '\r',
                "space" => ' ',
                "tab" => '\t',
                _ => self.unicode_char(name, start, end)?,
            }
        };
        self.pos = end;
        self.arena
            .alloc_char(value)
            .map_err(|err| self.locate(err, start))
    }

    fn unicode_char(&self, name: &str, start: usize, end: usize) -> Result<char> {
        let Some(hex) = name.strip_prefix('u') else {
            return Err(self.error(
                ErrorKind::InvalidSyntax,
                format!("unsupported character literal \\{name}"),
                start,
                end,
            ));
        };
        if hex.len() != 4 || !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(self.error(
                ErrorKind::InvalidEscape,
                "malformed \\u character literal",
                start,
                end,
            ));
        }
        u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                self.error(
                    ErrorKind::InvalidEscape,
                    "surrogate code point in character literal",
                    start,
                    end,
                )
            })
    }

    fn read_keyword(&mut self, start: usize) -> Result<ValueId> {
        let end = scan_token(self.bytes, start + 1);
        let token = &self.input[start + 1..end];
        if token.is_empty() {
            return Err(self.error(ErrorKind::InvalidSyntax, "empty keyword", start, start + 1));
        }
        if token.starts_with(':') {
            return Err(self.error(
                ErrorKind::InvalidSyntax,
                "auto-resolved keywords are not valid EDN",
                start,
                end,
            ));
        }
        let name = match token {
            "/" => None,
            _ => split_name(token, start + 1, true),
        };
        let Some(name) = name else {
            return Err(self.error(
                ErrorKind::InvalidSyntax,
                format!("invalid keyword :{token}"),
                start,
                end,
            ));
        };
        self.pos = end;
        self.arena
            .alloc_value(Node::Keyword(name))
            .map_err(|err| self.locate(err, start))
    }

    fn read_symbolic(&mut self, start: usize) -> Result<ValueId> {
        let end = scan_token(self.bytes, start);
        let token = &self.input[start..end];
        self.pos = end;
        match token {
            "nil" => return Ok(ValueId::NIL),
            "true" => return Ok(ValueId::TRUE),
            "false" => return Ok(ValueId::FALSE),
            _ => {}
        }
        let Some(name) = split_name(token, start, false) else {
            return Err(self.error(
                ErrorKind::InvalidSyntax,
                format!("invalid symbol {token}"),
                start,
                end.max(start + 1),
            ));
        };
        self.arena
            .alloc_value(Node::Symbol(name))
            .map_err(|err| self.locate(err, start))
    }

    fn read_number(&mut self, start: usize) -> Result<ValueId> {
        let end = scan_token(self.bytes, start);
        let token = &self.input[start..end];
        let number = parse_number(token).map_err(|err| {
            self.error(
                ErrorKind::InvalidNumber,
                format!("{} in {token}", err.message),
                start + err.offset.min(token.len()),
                end,
            )
        })?;
        let input_span = |span: Span| Text::Input(Span::new(start + span.start, start + span.end));
        let node = match number {
            Number::Int(value) => Node::Int(value),
            Number::BigInt {
                negative,
                radix,
                digits,
            } => Node::BigInt {
                negative,
                radix,
                digits: input_span(digits),
            },
            Number::Float(value) => Node::Float(value),
            Number::BigDecimal { negative, digits } => Node::BigDecimal {
                negative,
                digits: input_span(digits),
            },
            #[cfg(feature = "ratio")]
            Number::Ratio {
                numerator,
                denominator,
            } => Node::Ratio {
                numerator,
                denominator,
            },
        };
        self.pos = end;
        self.arena
            .alloc_value(node)
            .map_err(|err| self.locate(err, start))
    }

    fn read_dispatch(&mut self, start: usize) -> Result<ValueId> {
        let Some(&next) = self.bytes.get(start + 1) else {
            return Err(self.eof_error(start, "expected a dispatch form after '#'"));
        };
        match next {
            b'{' => self.read_collection(start, start + 2, Collection::Set),
            b'#' => self.read_symbolic_value(start),
            _ if self.input[start + 1..].starts_with(is_symbol_start) => self.read_tagged(start),
            _ => Err(self.bad_dispatch(start, next)),
        }
    }

    #[cold]
    #[inline(never)]
    fn bad_dispatch(&self, start: usize, next: u8) -> Error {
        let message = match next {
            b':' => "namespaced maps are not supported".to_string(),
            _ => format!("invalid dispatch sequence #{}", next as char),
        };
        self.error(ErrorKind::InvalidSyntax, message, start, start + 2)
    }

    fn read_symbolic_value(&mut self, start: usize) -> Result<ValueId> {
        let end = scan_token(self.bytes, start + 2);
        let value = match &self.input[start + 2..end] {
            "Inf" => f64::INFINITY,
            "-Inf" => f64::NEG_INFINITY,
            "NaN" => f64::NAN,
            other => {
                return Err(self.error(
                    ErrorKind::InvalidSyntax,
                    format!("unknown symbolic value ##{other}"),
                    start,
                    end.max(start + 2),
                ))
            }
        };
        self.pos = end;
        self.arena
            .alloc_float(value)
            .map_err(|err| self.locate(err, start))
    }

    fn read_tagged(&mut self, start: usize) -> Result<ValueId> {
        let input = self.input;
        let tag_end = scan_token(self.bytes, start + 1);
        let tag_text = &input[start + 1..tag_end];
        let tag = split_name(tag_text, start + 1, false)
            .filter(|_| tag_text.starts_with(char::is_alphabetic))
            .ok_or_else(|| {
                self.error(
                    ErrorKind::InvalidSyntax,
                    format!("invalid tag #{tag_text}"),
                    start,
                    tag_end,
                )
            })?;
        self.pos = tag_end;
        let value = self.read_nested(start, After::Tag(tag_text))?;
        self.finish_tagged(start, tag_end, tag, value)
    }

    /// Applies the registered reader for the tag at `start`, or the default
    /// reader mode when there is none.
    #[inline(never)]
    fn finish_tagged(
        &mut self,
        start: usize,
        tag_end: usize,
        tag: Name,
        value: ValueId,
    ) -> Result<ValueId> {
        let input = self.input;
        let value_end = self.pos;
        let tag_text = &input[start + 1..tag_end];

        if let Some(reader) = self.options.registry.as_ref().and_then(|r| r.lookup(tag_text)) {
            let reader = reader.clone();
            let produced = reader.read(value, &mut self.arena).map_err(|message| {
                self.error(ErrorKind::TagTransform, message, start, value_end)
            })?;
            if !self.arena.contains(produced) {
                return Err(self.error(
                    ErrorKind::TagTransform,
                    format!("reader for #{tag_text} returned a value from another arena"),
                    start,
                    value_end,
                ));
            }
            return Ok(produced);
        }

        match self.options.default_reader_mode {
            DefaultReaderMode::Passthrough => self
                .arena
                .alloc_value(Node::Tagged { tag, value })
                .map_err(|err| self.locate(err, start)),
            DefaultReaderMode::Unwrap => Ok(value),
            DefaultReaderMode::Reject => Err(self.error(
                ErrorKind::UnknownTag,
                format!("no reader registered for #{tag_text}"),
                start,
                tag_end,
            )),
        }
    }

    #[cfg(not(feature = "metadata"))]
    fn read_meta(&mut self, start: usize) -> Result<ValueId> {
        Err(self.error(
            ErrorKind::InvalidSyntax,
            "metadata is not supported",
            start,
            start + 1,
        ))
    }

    /// `^meta form`: attaches a metadata map to `form`. `^:kw` is shorthand
    /// for `{:kw true}` and `^Sym` or `^"str"` for `{:tag Sym}`.
    #[cfg(feature = "metadata")]
    fn read_meta(&mut self, start: usize) -> Result<ValueId> {
        self.pos = start + 1;
        let meta = self.read_nested(start, After::Meta)?;
        let meta_end = self.pos;
        let target = self.read_nested(start, After::MetaTarget)?;
        if target.is_singleton() {
            return Err(self.error(
                ErrorKind::InvalidSyntax,
                "metadata cannot be attached to nil or booleans",
                start,
                self.pos,
            ));
        }
        let entries = self.meta_entries(meta, target, start, meta_end)?;
        let result = self
            .arena
            .alloc_map(&entries)
            .and_then(|map| self.arena.set_meta(target, map));
        result.map_err(|err| self.locate(err, start))?;
        Ok(target)
    }

    #[cfg(feature = "metadata")]
    fn meta_entries(
        &mut self,
        meta: ValueId,
        target: ValueId,
        start: usize,
        meta_end: usize,
    ) -> Result<Vec<(ValueId, ValueId)>> {
        use crate::value::ValueType;

        let meta_type = self.arena.get(meta).value_type();
        let mut entries: Vec<(ValueId, ValueId)> = match meta_type {
            ValueType::Map => self
                .arena
                .get(meta)
                .entries()
                .map(|(key, value)| (key.id(), value.id()))
                .collect(),
            ValueType::Keyword => vec![(meta, ValueId::TRUE)],
            ValueType::Symbol | ValueType::String => {
                let key = self
                    .arena
                    .alloc_keyword(None, "tag")
                    .map_err(|err| self.locate(err, start))?;
                vec![(key, meta)]
            }
            _ => {
                return Err(self.error(
                    ErrorKind::InvalidSyntax,
                    "metadata must be a map, keyword, symbol or string",
                    start,
                    meta_end,
                ))
            }
        };
        // inner metadata survives unless the outer form overrides the key
        if let Some(existing) = self.arena.meta(target) {
            let arena = &self.arena;
            let inherited: Vec<(ValueId, ValueId)> = arena
                .get(existing)
                .entries()
                .filter(|(key, _)| {
                    !entries
                        .iter()
                        .any(|&(outer, _)| crate::value::cmp::equals(arena.get(outer), *key))
                })
                .map(|(key, value)| (key.id(), value.id()))
                .collect();
            entries.extend(inherited);
        }
        Ok(entries)
    }
}
