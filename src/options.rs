use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::decode::registry::ReaderRegistry;

/// What to do with a tagged literal whose tag has no registered reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultReaderMode {
    /// Keep it as a tagged value.
    #[default]
    Passthrough,
    /// Drop the tag and keep the wrapped value.
    Unwrap,
    /// Fail with [`crate::ErrorKind::UnknownTag`].
    Reject,
}

/// Value returned when the input holds nothing but whitespace and comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EofValue {
    Nil,
    Bool(bool),
    Int(i64),
    /// Keyword given as `"name"` or `"ns/name"`, without the colon.
    Keyword(SmolStr),
}

impl EofValue {
    pub fn keyword(name: impl Into<SmolStr>) -> Self {
        EofValue::Keyword(name.into())
    }
}

impl fmt::Display for EofValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EofValue::Nil => f.write_str("nil"),
            EofValue::Bool(value) => write!(f, "{value}"),
            EofValue::Int(value) => write!(f, "{value}"),
            EofValue::Keyword(name) => write!(f, ":{name}"),
        }
    }
}

/// Nesting levels (collections, tags, discards, metadata) allowed by
/// default. Fits a 2 MiB thread stack in unoptimized builds.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub registry: Option<Arc<ReaderRegistry>>,
    pub default_reader_mode: DefaultReaderMode,
    pub eof_value: Option<EofValue>,
    pub max_depth: usize,
    pub memory_limit: Option<usize>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: Arc<ReaderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_default_reader_mode(mut self, mode: DefaultReaderMode) -> Self {
        self.default_reader_mode = mode;
        self
    }

    pub fn with_eof_value(mut self, eof_value: Option<EofValue>) -> Self {
        self.eof_value = eof_value;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Caps the bytes the parse may allocate; exceeding it fails with
    /// [`crate::ErrorKind::OutOfMemory`].
    pub fn with_memory_limit(mut self, memory_limit: Option<usize>) -> Self {
        self.memory_limit = memory_limit;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            registry: None,
            default_reader_mode: DefaultReaderMode::default(),
            eof_value: None,
            max_depth: DEFAULT_MAX_DEPTH,
            memory_limit: None,
        }
    }
}
