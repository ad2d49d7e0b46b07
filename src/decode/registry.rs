//! Tag name to reader mapping for tagged literals.
//!
//! A registry is independent of any parse: build it once, wrap it in an
//! `Arc` and share it between threads. Readers run inside the parse and
//! allocate their results in that parse's arena.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::arena::{Arena, ValueId};

/// Transforms the value wrapped by a tag. An `Err` message is reported
/// verbatim as a [`crate::ErrorKind::TagTransform`] error.
pub trait TagReader: Send + Sync {
    fn read(&self, value: ValueId, arena: &mut Arena<'_>) -> Result<ValueId, String>;
}

impl<F> TagReader for F
where
    F: Fn(ValueId, &mut Arena<'_>) -> Result<ValueId, String> + Send + Sync,
{
    fn read(&self, value: ValueId, arena: &mut Arena<'_>) -> Result<ValueId, String> {
        self(value, arena)
    }
}

#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: HashMap<SmolStr, Arc<dyn TagReader>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `reader` for `tag` (written without `#`, e.g. `"inst"` or
    /// `"myapp/Person"`), replacing any previous reader. Returns `false` and
    /// registers nothing for an empty tag.
    pub fn register(&mut self, tag: &str, reader: Arc<dyn TagReader>) -> bool {
        let tag = tag.strip_prefix('#').unwrap_or(tag);
        if tag.is_empty() {
            return false;
        }
        tracing::trace!(tag, "registered tag reader");
        self.readers.insert(SmolStr::new(tag), reader);
        true
    }

    pub fn register_fn<F>(&mut self, tag: &str, reader: F) -> bool
    where
        F: Fn(ValueId, &mut Arena<'_>) -> Result<ValueId, String> + Send + Sync + 'static,
    {
        self.register(tag, Arc::new(reader))
    }

    /// Removes the reader for `tag`; returns whether one was registered.
    pub fn unregister(&mut self, tag: &str) -> bool {
        self.readers.remove(tag).is_some()
    }

    pub fn lookup(&self, tag: &str) -> Option<&Arc<dyn TagReader>> {
        self.readers.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.readers.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

impl fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.readers.keys().map(SmolStr::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("ReaderRegistry").field("tags", &tags).finish()
    }
}
