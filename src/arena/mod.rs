//! Handle-based value store backing one parse.
//!
//! Every value produced while reading a document lives in an [`Arena`] and is
//! addressed by a [`ValueId`]. Text is never copied out of the input unless it
//! has to be: symbols, keywords, big-number digits and escape-free strings
//! are spans into the borrowed input. Values built by tag readers put their
//! text in the arena's own heap buffer instead.
//!
//! `nil`, `true` and `false` are not stored at all; they are reserved handles
//! shared by every arena, so two parses of `nil` yield the same id.

use std::mem::size_of;
use std::sync::OnceLock;

#[cfg(feature = "metadata")]
use std::collections::HashMap;

use crate::text::string::decode_escapes;
use crate::value::cmp::hash_node;
use crate::value::ValueRef;
use crate::{Error, ErrorKind, Location, Result};

/// Handle to a value. Copyable and only meaningful together with the arena
/// that produced it, except for the three singletons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u32);

impl ValueId {
    pub const NIL: ValueId = ValueId(u32::MAX);
    pub const TRUE: ValueId = ValueId(u32::MAX - 1);
    pub const FALSE: ValueId = ValueId(u32::MAX - 2);

    const FIRST_RESERVED: u32 = u32::MAX - 2;

    pub fn from_bool(value: bool) -> Self {
        if value {
            ValueId::TRUE
        } else {
            ValueId::FALSE
        }
    }

    /// True for `nil`, `true` and `false`, which no arena owns.
    pub fn is_singleton(self) -> bool {
        self.0 >= Self::FIRST_RESERVED
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Where a piece of text lives: in the parsed input, or in the arena heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    Input(Span),
    Heap(Span),
}

/// Symbol, keyword or tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Name {
    pub namespace: Option<Text>,
    pub name: Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Children {
    pub first: usize,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node {
    Nil,
    Bool(bool),
    Int(i64),
    /// Digits are kept verbatim in `radix`, without sign, prefix or suffix.
    BigInt {
        negative: bool,
        radix: u8,
        digits: Text,
    },
    Float(f64),
    /// Unsigned decimal text (mantissa and optional exponent), without `M`.
    BigDecimal {
        negative: bool,
        digits: Text,
    },
    /// Always reduced, with a positive denominator.
    #[cfg(feature = "ratio")]
    Ratio {
        numerator: i64,
        denominator: i64,
    },
    Char(char),
    /// Index into the arena's string slots.
    String(usize),
    Symbol(Name),
    Keyword(Name),
    List(Children),
    Vector(Children),
    Set(Children),
    /// Keys and values interleaved; `len` counts both.
    Map(Children),
    Tagged {
        tag: Name,
        value: ValueId,
    },
}

static NIL_NODE: Node = Node::Nil;
static TRUE_NODE: Node = Node::Bool(true);
static FALSE_NODE: Node = Node::Bool(false);

/// A string literal. Decoding of escapes is deferred to the first read and
/// cached; escape-free strings are served straight from `raw`.
#[derive(Debug)]
pub(crate) struct StringSlot {
    pub(crate) raw: Text,
    pub(crate) escaped: bool,
    pub(crate) decoded: OnceLock<Box<str>>,
}

/// Allocation watermark used to drop everything allocated after it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mark {
    nodes: usize,
    children: usize,
    strings: usize,
    heap: usize,
    decoded: usize,
}

/// Capacity-retaining storage of an arena, detached from any input.
#[derive(Debug, Default)]
pub struct ArenaStorage {
    nodes: Vec<Node>,
    hashes: Vec<u64>,
    children: Vec<ValueId>,
    strings: Vec<StringSlot>,
    heap: String,
}

impl ArenaStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct Arena<'a> {
    input: &'a str,
    nodes: Vec<Node>,
    hashes: Vec<u64>,
    children: Vec<ValueId>,
    strings: Vec<StringSlot>,
    heap: String,
    /// Bytes set aside for lazily decoded copies of escaped strings.
    decoded: usize,
    #[cfg(feature = "metadata")]
    meta: HashMap<ValueId, ValueId>,
    limit: Option<usize>,
}

impl<'a> Arena<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_storage(input, ArenaStorage::new())
    }

    pub fn with_storage(input: &'a str, storage: ArenaStorage) -> Self {
        let mut arena = Self {
            input,
            nodes: storage.nodes,
            hashes: storage.hashes,
            children: storage.children,
            strings: storage.strings,
            heap: storage.heap,
            decoded: 0,
            #[cfg(feature = "metadata")]
            meta: HashMap::new(),
            limit: None,
        };
        arena.clear();
        arena
    }

    /// Caps the arena's footprint in bytes; allocations past it fail with
    /// [`ErrorKind::OutOfMemory`]. Escaped strings are charged for their
    /// decoded copy up front. Scratch tables used for duplicate detection
    /// while a set or map is open are not counted.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Drops every value, keeping the buffers. Handles from before the
    /// clear must not be used afterwards.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.hashes.clear();
        self.children.clear();
        self.strings.clear();
        self.heap.clear();
        self.decoded = 0;
        #[cfg(feature = "metadata")]
        self.meta.clear();
    }

    pub fn into_storage(self) -> ArenaStorage {
        ArenaStorage {
            nodes: self.nodes,
            hashes: self.hashes,
            children: self.children,
            strings: self.strings,
            heap: self.heap,
        }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Number of values owned by this arena (singletons excluded).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Approximate number of bytes held by the arena.
    pub fn footprint(&self) -> usize {
        self.nodes.len() * size_of::<Node>()
            + self.hashes.len() * size_of::<u64>()
            + self.children.len() * size_of::<ValueId>()
            + self.strings.len() * size_of::<StringSlot>()
            + self.heap.len()
            + self.decoded
    }

    /// True if `id` is a singleton or was allocated by this arena.
    pub fn contains(&self, id: ValueId) -> bool {
        id.is_singleton() || id.index() < self.nodes.len()
    }

    pub fn get(&self, id: ValueId) -> ValueRef<'_> {
        ValueRef::new(self, id)
    }

    pub fn node(&self, id: ValueId) -> &Node {
        match id {
            ValueId::NIL => &NIL_NODE,
            ValueId::TRUE => &TRUE_NODE,
            ValueId::FALSE => &FALSE_NODE,
            _ => self.nodes.get(id.index()).unwrap_or(&NIL_NODE),
        }
    }

    pub fn hash_of(&self, id: ValueId) -> u64 {
        if id.is_singleton() {
            return hash_node(self, self.node(id));
        }
        self.hashes.get(id.index()).copied().unwrap_or(0)
    }

    pub fn text(&self, text: Text) -> &str {
        match text {
            Text::Input(span) => self.input.get(span.start..span.end).unwrap_or(""),
            Text::Heap(span) => self.heap.get(span.start..span.end).unwrap_or(""),
        }
    }

    pub fn children(&self, children: Children) -> &[ValueId] {
        let end = children.first.saturating_add(children.len);
        self.children.get(children.first..end).unwrap_or(&[])
    }

    /// Returns the content of a string value, decoding escapes on first
    /// access. Subsequent calls return the same cached buffer.
    pub(crate) fn string(&self, index: usize) -> &str {
        let Some(slot) = self.strings.get(index) else {
            return "";
        };
        if !slot.escaped {
            return self.text(slot.raw);
        }
        slot.decoded
            .get_or_init(|| decode_escapes(self.text(slot.raw)).into_boxed_str())
    }

    /// Raw text of a string value and whether it contains escapes.
    pub(crate) fn string_raw(&self, index: usize) -> Option<(&str, bool)> {
        let slot = self.strings.get(index)?;
        Some((self.text(slot.raw), slot.escaped))
    }

    pub(crate) fn string_is_decoded(&self, index: usize) -> bool {
        self.strings
            .get(index)
            .is_some_and(|slot| !slot.escaped || slot.decoded.get().is_some())
    }

    fn ensure_budget(&self, extra: usize, context: &'static str) -> Result<()> {
        match self.limit {
            Some(limit) if self.footprint().saturating_add(extra) > limit => {
                Err(Error::out_of_memory(context))
            }
            _ => Ok(()),
        }
    }

    /// Copies `text` into the arena heap. A zero-length allocation yields a
    /// valid empty span.
    pub fn alloc(&mut self, text: &str) -> Result<Text> {
        self.ensure_budget(text.len(), "text")?;
        self.heap
            .try_reserve(text.len())
            .map_err(|_| Error::out_of_memory("text"))?;
        let start = self.heap.len();
        self.heap.push_str(text);
        Ok(Text::Heap(Span::new(start, self.heap.len())))
    }

    /// Stores a node and returns its handle. Booleans and nil are mapped to
    /// their singletons instead of being stored.
    pub fn alloc_value(&mut self, node: Node) -> Result<ValueId> {
        match node {
            Node::Nil => return Ok(ValueId::NIL),
            Node::Bool(value) => return Ok(ValueId::from_bool(value)),
            _ => {}
        }
        if self.nodes.len() >= ValueId::FIRST_RESERVED as usize {
            return Err(Error::out_of_memory("value handles exhausted"));
        }
        self.ensure_budget(size_of::<Node>() + size_of::<u64>(), "value")?;
        self.nodes
            .try_reserve(1)
            .map_err(|_| Error::out_of_memory("value"))?;
        self.hashes
            .try_reserve(1)
            .map_err(|_| Error::out_of_memory("value"))?;
        let hash = hash_node(self, &node);
        let id = ValueId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.hashes.push(hash);
        Ok(id)
    }

    pub(crate) fn alloc_children(&mut self, items: &[ValueId]) -> Result<Children> {
        self.ensure_budget(items.len() * size_of::<ValueId>(), "collection")?;
        self.children
            .try_reserve(items.len())
            .map_err(|_| Error::out_of_memory("collection"))?;
        let first = self.children.len();
        self.children.extend_from_slice(items);
        Ok(Children {
            first,
            len: items.len(),
        })
    }

    pub(crate) fn alloc_string_slot(&mut self, raw: Text, escaped: bool) -> Result<ValueId> {
        // decoding never grows a string, so the raw length bounds the copy
        let decoded = if escaped {
            match raw {
                Text::Input(span) | Text::Heap(span) => span.len(),
            }
        } else {
            0
        };
        self.ensure_budget(size_of::<StringSlot>() + decoded, "string")?;
        self.strings
            .try_reserve(1)
            .map_err(|_| Error::out_of_memory("string"))?;
        let index = self.strings.len();
        self.strings.push(StringSlot {
            raw,
            escaped,
            decoded: OnceLock::new(),
        });
        self.decoded += decoded;
        self.alloc_value(Node::String(index))
    }

    pub fn alloc_int(&mut self, value: i64) -> Result<ValueId> {
        self.alloc_value(Node::Int(value))
    }

    pub fn alloc_float(&mut self, value: f64) -> Result<ValueId> {
        self.alloc_value(Node::Float(value))
    }

    pub fn alloc_char(&mut self, value: char) -> Result<ValueId> {
        self.alloc_value(Node::Char(value))
    }

    /// Allocates a string whose content is `value` verbatim.
    pub fn alloc_string(&mut self, value: &str) -> Result<ValueId> {
        let raw = self.alloc(value)?;
        self.alloc_string_slot(raw, false)
    }

    pub fn alloc_symbol(&mut self, namespace: Option<&str>, name: &str) -> Result<ValueId> {
        let name = self.alloc_name(namespace, name)?;
        self.alloc_value(Node::Symbol(name))
    }

    pub fn alloc_keyword(&mut self, namespace: Option<&str>, name: &str) -> Result<ValueId> {
        let name = self.alloc_name(namespace, name)?;
        self.alloc_value(Node::Keyword(name))
    }

    fn alloc_name(&mut self, namespace: Option<&str>, name: &str) -> Result<Name> {
        let namespace = match namespace {
            Some(namespace) => Some(self.alloc(namespace)?),
            None => None,
        };
        Ok(Name {
            namespace,
            name: self.alloc(name)?,
        })
    }

    pub fn alloc_list(&mut self, items: &[ValueId]) -> Result<ValueId> {
        self.check_members(items)?;
        let children = self.alloc_children(items)?;
        self.alloc_value(Node::List(children))
    }

    pub fn alloc_vector(&mut self, items: &[ValueId]) -> Result<ValueId> {
        self.check_members(items)?;
        let children = self.alloc_children(items)?;
        self.alloc_value(Node::Vector(children))
    }

    /// Allocates a set, rejecting duplicate elements.
    pub fn alloc_set(&mut self, items: &[ValueId]) -> Result<ValueId> {
        self.check_members(items)?;
        let mut seen = crate::value::cmp::Seen::new();
        for &item in items {
            if !seen.insert(self, item) {
                return Err(detached(ErrorKind::DuplicateElement, "duplicate set element"));
            }
        }
        let children = self.alloc_children(items)?;
        self.alloc_value(Node::Set(children))
    }

    /// Allocates a map from `(key, value)` pairs, rejecting duplicate keys.
    pub fn alloc_map(&mut self, entries: &[(ValueId, ValueId)]) -> Result<ValueId> {
        let mut flat = Vec::with_capacity(entries.len() * 2);
        let mut seen = crate::value::cmp::Seen::new();
        for &(key, value) in entries {
            self.check_members(&[key, value])?;
            if !seen.insert(self, key) {
                return Err(detached(ErrorKind::DuplicateKey, "duplicate map key"));
            }
            flat.push(key);
            flat.push(value);
        }
        let children = self.alloc_children(&flat)?;
        self.alloc_value(Node::Map(children))
    }

    pub fn alloc_tagged(&mut self, tag: &str, value: ValueId) -> Result<ValueId> {
        self.check_members(&[value])?;
        let (namespace, name) = match tag.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                (Some(namespace), name)
            }
            _ => (None, tag),
        };
        let tag = self.alloc_name(namespace, name)?;
        self.alloc_value(Node::Tagged { tag, value })
    }

    fn check_members(&self, items: &[ValueId]) -> Result<()> {
        if items.iter().all(|&item| self.contains(item)) {
            return Ok(());
        }
        Err(detached(
            ErrorKind::InvalidSyntax,
            "value handle does not belong to this arena",
        ))
    }

    pub(crate) fn mark(&self) -> Mark {
        Mark {
            nodes: self.nodes.len(),
            children: self.children.len(),
            strings: self.strings.len(),
            heap: self.heap.len(),
            decoded: self.decoded,
        }
    }

    /// Drops everything allocated after `mark`. Nothing allocated before the
    /// mark may refer to what is dropped.
    pub(crate) fn rewind(&mut self, mark: Mark) {
        self.nodes.truncate(mark.nodes);
        self.hashes.truncate(mark.nodes);
        self.children.truncate(mark.children);
        self.strings.truncate(mark.strings);
        self.heap.truncate(mark.heap);
        self.decoded = mark.decoded;
        #[cfg(feature = "metadata")]
        self.meta.retain(|id, _| id.index() < mark.nodes);
    }

    #[cfg(feature = "metadata")]
    pub fn meta(&self, id: ValueId) -> Option<ValueId> {
        self.meta.get(&id).copied()
    }

    /// Attaches a metadata map to an owned value, replacing any previous one.
    #[cfg(feature = "metadata")]
    pub fn set_meta(&mut self, id: ValueId, meta: ValueId) -> Result<()> {
        if id.is_singleton() || !self.contains(id) {
            return Err(detached(
                ErrorKind::InvalidSyntax,
                "metadata can only be attached to arena values",
            ));
        }
        self.meta.insert(id, meta);
        Ok(())
    }
}

fn detached(kind: ErrorKind, message: &str) -> Error {
    Error::new(kind, message, Location::default(), Location::default())
}
