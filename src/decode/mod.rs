mod parser;
pub mod registry;
pub mod scan;

use std::fmt;

use crate::arena::{Arena, ArenaStorage, ValueId};
use crate::options::ParseOptions;
use crate::value::ValueRef;
use crate::{Error, ErrorKind, Result};

use parser::Reader;

/// A parsed value graph. Owns the arena; borrows the input.
#[derive(Debug)]
pub struct Document<'a> {
    arena: Arena<'a>,
    root: ValueId,
    end: usize,
    eof: bool,
}

impl<'a> Document<'a> {
    pub fn root(&self) -> ValueRef<'_> {
        self.arena.get(self.root)
    }

    pub fn root_id(&self) -> ValueId {
        self.root
    }

    pub fn get(&self, id: ValueId) -> ValueRef<'_> {
        self.arena.get(id)
    }

    pub fn arena(&self) -> &Arena<'a> {
        &self.arena
    }

    pub fn input(&self) -> &'a str {
        self.arena.input()
    }

    /// Byte offset just past the parsed value. For whole-input parses this is
    /// the end of the input.
    pub fn end_offset(&self) -> usize {
        self.end
    }

    /// True when the input held no value and the root is the eof value.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Releases the graph, keeping the arena's buffers for another parse.
    pub fn into_storage(self) -> ArenaStorage {
        self.arena.into_storage()
    }
}

impl fmt::Display for Document<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root(), f)
    }
}

pub fn parse(input: &[u8]) -> Result<Document<'_>> {
    parse_with_options(input, &ParseOptions::default())
}

pub fn parse_str(input: &str) -> Result<Document<'_>> {
    parse_str_with_options(input, &ParseOptions::default())
}

pub fn parse_with_options<'a>(input: &'a [u8], options: &ParseOptions) -> Result<Document<'a>> {
    parse_with_storage(input, options, ArenaStorage::new())
}

pub fn parse_str_with_options<'a>(input: &'a str, options: &ParseOptions) -> Result<Document<'a>> {
    read_document(input, 0, options, ArenaStorage::new(), true)
}

/// Parses into recycled arena buffers from an earlier [`Document`].
pub fn parse_with_storage<'a>(
    input: &'a [u8],
    options: &ParseOptions,
    storage: ArenaStorage,
) -> Result<Document<'a>> {
    let text = check_utf8(input)?;
    read_document(text, 0, options, storage, true)
}

/// Parses a C-style buffer: the input ends at the first NUL byte, or at the
/// end of the slice if there is none.
pub fn parse_nul_terminated(input: &[u8]) -> Result<Document<'_>> {
    let len = memchr::memchr(0, input).unwrap_or(input.len());
    parse(&input[..len])
}

/// Reads one value starting at byte `start` and stops right after it.
/// Trailing content is left for the next call; see [`Document::end_offset`].
/// If only trivia remains, the document is marked [`Document::is_eof`] and
/// its root is the configured eof value, or `nil`.
pub fn parse_prefix<'a>(
    input: &'a str,
    start: usize,
    options: &ParseOptions,
) -> Result<Document<'a>> {
    if start > input.len() || !input.is_char_boundary(start) {
        return Err(Error::at(
            ErrorKind::InvalidSyntax,
            "start offset is not a character boundary",
            input.as_bytes(),
            start,
            start,
        ));
    }
    read_document(input, start, options, ArenaStorage::new(), false)
}

/// Iterates over every top-level form of `input`, one [`Document`] each.
/// Stops after the first error.
pub fn forms<'a, 'o>(input: &'a str, options: &'o ParseOptions) -> Forms<'a, 'o> {
    Forms {
        input,
        options,
        pos: 0,
        done: false,
    }
}

pub struct Forms<'a, 'o> {
    input: &'a str,
    options: &'o ParseOptions,
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Forms<'a, '_> {
    type Item = Result<Document<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match parse_prefix(self.input, self.pos, self.options) {
            Ok(document) if document.is_eof() => {
                self.done = true;
                None
            }
            Ok(document) => {
                self.pos = document.end_offset();
                Some(Ok(document))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn check_utf8(input: &[u8]) -> Result<&str> {
    std::str::from_utf8(input).map_err(|err| {
        let start = err.valid_up_to();
        let end = start + err.error_len().unwrap_or(input.len() - start);
        let error = Error::at(
            ErrorKind::InvalidUtf8,
            "invalid utf-8 sequence",
            input,
            start,
            end,
        );
        tracing::debug!(offset = start, "rejected non utf-8 input");
        error
    })
}

fn read_root(
    reader: &mut Reader<'_, '_>,
    options: &ParseOptions,
    whole: bool,
) -> Result<(ValueId, bool)> {
    if let Some(root) = reader.read_top()? {
        if whole {
            reader.expect_end()?;
        }
        return Ok((root, false));
    }
    match &options.eof_value {
        Some(value) => Ok((reader.alloc_eof_value(value)?, true)),
        None if !whole => Ok((ValueId::NIL, true)),
        None => Err(reader.empty_input_error()),
    }
}

fn read_document<'a>(
    input: &'a str,
    start: usize,
    options: &ParseOptions,
    storage: ArenaStorage,
    whole: bool,
) -> Result<Document<'a>> {
    let span = tracing::debug_span!("edn_parse", bytes = input.len() - start, start);
    let _guard = span.enter();

    let arena = Arena::with_storage(input, storage).with_limit(options.memory_limit);
    let mut reader = Reader::new(input, start, arena, options);
    match read_root(&mut reader, options, whole) {
        Ok((root, eof)) => {
            let end = reader.position();
            let arena = reader.into_arena();
            tracing::debug!(
                values = arena.len(),
                footprint = arena.footprint(),
                end,
                eof,
                "parsed edn form"
            );
            Ok(Document {
                arena,
                root,
                end,
                eof,
            })
        }
        Err(err) => {
            tracing::debug!(
                kind = %err.kind,
                offset = err.start.offset,
                message = %err.message,
                "edn parse failed"
            );
            Err(err)
        }
    }
}
