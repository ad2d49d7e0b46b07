//! Read-only views over parsed values.
//!
//! A [`ValueRef`] pairs a handle with the arena that owns it. Accessors never
//! panic: asking a value for the wrong type yields `None`, `false` or an
//! empty iterator.

pub mod cmp;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::slice;

use crate::arena::{Arena, Children, Name, Node, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Nil,
    Bool,
    Int,
    BigInt,
    Float,
    BigDecimal,
    #[cfg(feature = "ratio")]
    Ratio,
    Char,
    String,
    Symbol,
    Keyword,
    List,
    Vector,
    Set,
    Map,
    Tagged,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Nil => "nil",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::BigInt => "bigint",
            ValueType::Float => "float",
            ValueType::BigDecimal => "bigdecimal",
            #[cfg(feature = "ratio")]
            ValueType::Ratio => "ratio",
            ValueType::Char => "char",
            ValueType::String => "string",
            ValueType::Symbol => "symbol",
            ValueType::Keyword => "keyword",
            ValueType::List => "list",
            ValueType::Vector => "vector",
            ValueType::Set => "set",
            ValueType::Map => "map",
            ValueType::Tagged => "tagged",
        }
    }

    pub fn is_collection(self) -> bool {
        matches!(
            self,
            ValueType::List | ValueType::Vector | ValueType::Set | ValueType::Map
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Big integer digits exactly as written, in `radix`, without sign, radix
/// prefix or `N` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigIntRef<'d> {
    pub negative: bool,
    pub radix: u32,
    pub digits: &'d str,
}

/// Big decimal text exactly as written, without sign or `M` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigDecimalRef<'d> {
    pub negative: bool,
    pub digits: &'d str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameRef<'d> {
    pub namespace: Option<&'d str>,
    pub name: &'d str,
}

impl fmt::Display for NameRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = self.namespace {
            f.write_str(namespace)?;
            f.write_str("/")?;
        }
        f.write_str(self.name)
    }
}

impl NameRef<'_> {
    /// Matches `"name"` or `"ns/name"` against this name.
    pub fn matches(&self, qualified: &str) -> bool {
        match self.namespace {
            Some(namespace) => qualified
                .strip_prefix(namespace)
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|name| name == self.name),
            None => qualified == self.name,
        }
    }
}

#[derive(Clone, Copy)]
pub struct ValueRef<'d> {
    arena: &'d Arena<'d>,
    id: ValueId,
}

impl<'d> ValueRef<'d> {
    pub fn new(arena: &'d Arena<'d>, id: ValueId) -> Self {
        Self { arena, id }
    }

    pub fn id(&self) -> ValueId {
        self.id
    }

    pub fn arena(&self) -> &'d Arena<'d> {
        self.arena
    }

    pub(crate) fn node(&self) -> &'d Node {
        self.arena.node(self.id)
    }

    /// Cached structural hash; equal values hash equal across documents.
    pub fn hash_code(&self) -> u64 {
        self.arena.hash_of(self.id)
    }

    fn name(&self, name: &Name) -> NameRef<'d> {
        NameRef {
            namespace: name.namespace.map(|text| self.arena.text(text)),
            name: self.arena.text(name.name),
        }
    }

    fn children(&self) -> &'d [ValueId] {
        match *self.node() {
            Node::List(children)
            | Node::Vector(children)
            | Node::Set(children)
            | Node::Map(children) => self.arena.children(children),
            _ => &[],
        }
    }

    fn child(&self, id: ValueId) -> ValueRef<'d> {
        ValueRef::new(self.arena, id)
    }

    pub fn value_type(&self) -> ValueType {
        match self.node() {
            Node::Nil => ValueType::Nil,
            Node::Bool(_) => ValueType::Bool,
            Node::Int(_) => ValueType::Int,
            Node::BigInt { .. } => ValueType::BigInt,
            Node::Float(_) => ValueType::Float,
            Node::BigDecimal { .. } => ValueType::BigDecimal,
            #[cfg(feature = "ratio")]
            Node::Ratio { .. } => ValueType::Ratio,
            Node::Char(_) => ValueType::Char,
            Node::String(_) => ValueType::String,
            Node::Symbol(_) => ValueType::Symbol,
            Node::Keyword(_) => ValueType::Keyword,
            Node::List(_) => ValueType::List,
            Node::Vector(_) => ValueType::Vector,
            Node::Set(_) => ValueType::Set,
            Node::Map(_) => ValueType::Map,
            Node::Tagged { .. } => ValueType::Tagged,
        }
    }

    pub fn is_nil(&self) -> bool {
        self.id == ValueId::NIL
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.id {
            ValueId::TRUE => Some(true),
            ValueId::FALSE => Some(false),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self.node() {
            Node::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self.node() {
            Node::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<BigIntRef<'d>> {
        match *self.node() {
            Node::BigInt {
                negative,
                radix,
                digits,
            } => Some(BigIntRef {
                negative,
                radix: radix as u32,
                digits: self.arena.text(digits),
            }),
            _ => None,
        }
    }

    pub fn as_bigdecimal(&self) -> Option<BigDecimalRef<'d>> {
        match *self.node() {
            Node::BigDecimal { negative, digits } => Some(BigDecimalRef {
                negative,
                digits: self.arena.text(digits),
            }),
            _ => None,
        }
    }

    /// Reduced `(numerator, denominator)` with a positive denominator.
    #[cfg(feature = "ratio")]
    pub fn as_ratio(&self) -> Option<(i64, i64)> {
        match *self.node() {
            Node::Ratio {
                numerator,
                denominator,
            } => Some((numerator, denominator)),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match *self.node() {
            Node::Char(value) => Some(value),
            _ => None,
        }
    }

    /// String content with escapes decoded. Escape-free strings borrow the
    /// input directly; escaped strings are decoded on first call and the
    /// same buffer is returned afterwards.
    pub fn as_str(&self) -> Option<&'d str> {
        match *self.node() {
            Node::String(index) => Some(self.arena.string(index)),
            _ => None,
        }
    }

    /// True once the string's content is available without decoding work.
    pub fn is_decoded(&self) -> bool {
        match *self.node() {
            Node::String(index) => self.arena.string_is_decoded(index),
            _ => false,
        }
    }

    pub fn as_symbol(&self) -> Option<NameRef<'d>> {
        match self.node() {
            Node::Symbol(name) => Some(self.name(name)),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<NameRef<'d>> {
        match self.node() {
            Node::Keyword(name) => Some(self.name(name)),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<NameRef<'d>> {
        match self.node() {
            Node::Tagged { tag, .. } => Some(self.name(tag)),
            _ => None,
        }
    }

    pub fn tagged_value(&self) -> Option<ValueRef<'d>> {
        match *self.node() {
            Node::Tagged { value, .. } => Some(self.child(value)),
            _ => None,
        }
    }

    /// Element count of a list, vector or set, or entry count of a map.
    /// Zero for everything else.
    pub fn len(&self) -> usize {
        match *self.node() {
            Node::Map(Children { len, .. }) => len / 2,
            _ => self.children().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positional access into a list, vector or set.
    pub fn get(&self, index: usize) -> Option<ValueRef<'d>> {
        match self.node() {
            Node::List(_) | Node::Vector(_) | Node::Set(_) => {
                self.children().get(index).map(|&id| self.child(id))
            }
            _ => None,
        }
    }

    /// Positional access into a map's entries, in source order.
    pub fn entry(&self, index: usize) -> Option<(ValueRef<'d>, ValueRef<'d>)> {
        match self.node() {
            Node::Map(_) => {
                let children = self.children();
                let key = *children.get(index * 2)?;
                let value = *children.get(index * 2 + 1)?;
                Some((self.child(key), self.child(value)))
            }
            _ => None,
        }
    }

    /// Elements of a list, vector or set. Empty for other values.
    pub fn iter(&self) -> Items<'d> {
        let ids: &'d [ValueId] = match self.node() {
            Node::Map(_) => &[],
            _ => self.children(),
        };
        Items {
            arena: self.arena,
            ids: ids.iter(),
        }
    }

    /// Key/value pairs of a map, in source order. Empty for other values.
    pub fn entries(&self) -> Entries<'d> {
        let ids: &'d [ValueId] = match self.node() {
            Node::Map(_) => self.children(),
            _ => &[],
        };
        Entries {
            arena: self.arena,
            pairs: ids.chunks_exact(2),
        }
    }

    /// Looks up `key` in a map by structural equality. The key may come
    /// from any document.
    pub fn lookup(&self, key: ValueRef<'_>) -> Option<ValueRef<'d>> {
        self.entries()
            .find(|(candidate, _)| cmp::equals(*candidate, key))
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: ValueRef<'_>) -> bool {
        self.lookup(key).is_some()
    }

    /// Looks up a keyword key given as `"name"` or `"ns/name"`.
    pub fn get_keyword(&self, qualified: &str) -> Option<ValueRef<'d>> {
        self.entries()
            .find(|(key, _)| key.as_keyword().is_some_and(|name| name.matches(qualified)))
            .map(|(_, value)| value)
    }

    /// Set membership by structural equality.
    pub fn contains(&self, value: ValueRef<'_>) -> bool {
        match self.node() {
            Node::Set(_) => self.iter().any(|member| cmp::equals(member, value)),
            _ => false,
        }
    }

    #[cfg(feature = "metadata")]
    pub fn meta(&self) -> Option<ValueRef<'d>> {
        self.arena.meta(self.id).map(|id| self.child(id))
    }
}

impl PartialEq for ValueRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        cmp::equals(*self, *other)
    }
}

impl Eq for ValueRef<'_> {}

impl Hash for ValueRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.arena.hash_of(self.id));
    }
}

impl PartialOrd for ValueRef<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValueRef<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp::compare(*self, *other)
    }
}

impl fmt::Debug for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueRef({self})")
    }
}

pub struct Items<'d> {
    arena: &'d Arena<'d>,
    ids: slice::Iter<'d, ValueId>,
}

impl<'d> Iterator for Items<'d> {
    type Item = ValueRef<'d>;

    fn next(&mut self) -> Option<Self::Item> {
        self.ids.next().map(|&id| ValueRef::new(self.arena, id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for Items<'_> {}

pub struct Entries<'d> {
    arena: &'d Arena<'d>,
    pairs: slice::ChunksExact<'d, ValueId>,
}

impl<'d> Iterator for Entries<'d> {
    type Item = (ValueRef<'d>, ValueRef<'d>);

    fn next(&mut self) -> Option<Self::Item> {
        self.pairs.next().map(|pair| {
            (
                ValueRef::new(self.arena, pair[0]),
                ValueRef::new(self.arena, pair[1]),
            )
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pairs.size_hint()
    }
}

impl ExactSizeIterator for Entries<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_accessors_on_type_mismatch() {
        let mut arena = Arena::new("");
        let int = arena.alloc_int(7).unwrap();
        let value = arena.get(int);
        assert_eq!(value.value_type(), ValueType::Int);
        assert_eq!(value.as_i64(), Some(7));
        assert_eq!(value.as_str(), None);
        assert_eq!(value.as_f64(), None);
        assert_eq!(value.len(), 0);
        assert!(value.get(0).is_none());
        assert_eq!(value.iter().count(), 0);
        assert!(!value.contains(value));
        assert!(value.lookup(value).is_none());
    }

    #[rstest::rstest]
    fn test_map_lookup() {
        let mut arena = Arena::new("");
        let key = arena.alloc_keyword(Some("user"), "id").unwrap();
        let other = arena.alloc_keyword(None, "name").unwrap();
        let one = arena.alloc_int(1).unwrap();
        let name = arena.alloc_string("ada").unwrap();
        let map = arena.alloc_map(&[(key, one), (other, name)]).unwrap();
        let map = arena.get(map);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_keyword("user/id").and_then(|v| v.as_i64()), Some(1));
        assert_eq!(map.get_keyword("name").and_then(|v| v.as_str()), Some("ada"));
        assert!(map.get_keyword("id").is_none());
        assert!(map.contains_key(arena.get(key)));
        let (first_key, _) = map.entry(0).unwrap();
        assert_eq!(first_key.as_keyword().unwrap().to_string(), "user/id");
        assert!(map.entry(2).is_none());
    }

    #[rstest::rstest]
    fn test_name_matches() {
        let qualified = NameRef {
            namespace: Some("a.b"),
            name: "c",
        };
        assert!(qualified.matches("a.b/c"));
        assert!(!qualified.matches("c"));
        assert!(!qualified.matches("a.b/cd"));
        let bare = NameRef {
            namespace: None,
            name: "c",
        };
        assert!(bare.matches("c"));
    }
}
