use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidSyntax,
    UnexpectedEof,
    OutOfMemory,
    InvalidUtf8,
    InvalidNumber,
    InvalidString,
    InvalidEscape,
    UnmatchedDelimiter,
    UnterminatedCollection,
    UnknownTag,
    DuplicateKey,
    DuplicateElement,
    /// A registered tag reader rejected its input.
    TagTransform,
    DepthExceeded,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidSyntax => "invalid syntax",
            ErrorKind::UnexpectedEof => "unexpected end of input",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::InvalidUtf8 => "invalid utf-8",
            ErrorKind::InvalidNumber => "invalid number",
            ErrorKind::InvalidString => "invalid string",
            ErrorKind::InvalidEscape => "invalid escape",
            ErrorKind::UnmatchedDelimiter => "unmatched delimiter",
            ErrorKind::UnterminatedCollection => "unterminated collection",
            ErrorKind::UnknownTag => "unknown tag",
            ErrorKind::DuplicateKey => "duplicate key",
            ErrorKind::DuplicateElement => "duplicate element",
            ErrorKind::TagTransform => "tag reader failed",
            ErrorKind::DepthExceeded => "nesting depth exceeded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position in the input. `line` and `column` are 1-based; `column` counts
/// characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Resolves a byte offset into a line/column pair. Only `\n` starts a new
    /// line, so `\r\n` counts once.
    pub fn from_offset(input: &[u8], offset: usize) -> Self {
        let offset = offset.min(input.len());
        let consumed = &input[..offset];
        let mut line = 1;
        let mut line_start = 0;
        for idx in memchr::memchr_iter(b'\n', consumed) {
            line += 1;
            line_start = idx + 1;
        }
        // continuation bytes do not start a character
        let column = consumed[line_start..]
            .iter()
            .filter(|&&byte| byte & 0xC0 != 0x80)
            .count()
            + 1;
        Self {
            offset,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message} (line {}, column {})", start.line, start.column)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub start: Location,
    pub end: Location,
}

impl Error {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        start: Location,
        end: Location,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            start,
            end,
        }
    }

    /// Builds an error from byte offsets, resolving lines and columns
    /// against `input`.
    pub fn at(
        kind: ErrorKind,
        message: impl Into<String>,
        input: &[u8],
        start: usize,
        end: usize,
    ) -> Self {
        Self::new(
            kind,
            message,
            Location::from_offset(input, start),
            Location::from_offset(input, end),
        )
    }

    pub fn out_of_memory(context: &'static str) -> Self {
        Self {
            kind: ErrorKind::OutOfMemory,
            message: format!("arena allocation failed: {context}"),
            start: Location::default(),
            end: Location::default(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
