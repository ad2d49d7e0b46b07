//! Equality, hashing and ordering over values, within or across documents.
//!
//! Hashes are computed once per node at allocation time from the cached
//! hashes of its children, so collection hashes are O(len). Sets and maps
//! combine member hashes with a wrapping sum, which makes them independent
//! of element order. Lists and vectors share a tag so they hash alike.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ptr;

use smallvec::SmallVec;

use crate::arena::{Arena, Name, Node, ValueId};
use crate::num::bignum::{DecimalKey, IntDigits};
use crate::text::string::for_each_decoded;
use crate::value::ValueRef;

const TAG_NIL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_BIGINT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_BIGDECIMAL: u8 = 5;
#[cfg(feature = "ratio")]
const TAG_RATIO: u8 = 6;
const TAG_CHAR: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_SYMBOL: u8 = 9;
const TAG_KEYWORD: u8 = 10;
const TAG_SEQUENCE: u8 = 11;
const TAG_SET: u8 = 12;
const TAG_MAP: u8 = 13;
const TAG_TAGGED: u8 = 14;

const CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

fn float_bits(value: f64) -> u64 {
    if value.is_nan() {
        CANONICAL_NAN
    } else if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

fn hash_name(arena: &Arena<'_>, name: &Name, state: &mut DefaultHasher) {
    match name.namespace {
        Some(namespace) => {
            state.write_u8(1);
            arena.text(namespace).hash(state);
        }
        None => state.write_u8(0),
    }
    arena.text(name.name).hash(state);
}

/// Hashes a node whose children are already allocated in `arena`.
pub fn hash_node(arena: &Arena<'_>, node: &Node) -> u64 {
    let mut state = DefaultHasher::new();
    match *node {
        Node::Nil => state.write_u8(TAG_NIL),
        Node::Bool(value) => {
            state.write_u8(TAG_BOOL);
            value.hash(&mut state);
        }
        Node::Int(value) => {
            state.write_u8(TAG_INT);
            value.hash(&mut state);
        }
        Node::BigInt {
            negative,
            radix,
            digits,
        } => {
            state.write_u8(TAG_BIGINT);
            let digits = IntDigits::new(arena.text(digits), radix as u32);
            (negative && !digits.is_zero()).hash(&mut state);
            digits.hash_into(&mut state);
        }
        Node::Float(value) => {
            state.write_u8(TAG_FLOAT);
            state.write_u64(float_bits(value));
        }
        Node::BigDecimal { negative, digits } => {
            state.write_u8(TAG_BIGDECIMAL);
            let key = DecimalKey::parse(arena.text(digits));
            (negative && !key.is_zero()).hash(&mut state);
            key.hash(&mut state);
        }
        #[cfg(feature = "ratio")]
        Node::Ratio {
            numerator,
            denominator,
        } => {
            state.write_u8(TAG_RATIO);
            numerator.hash(&mut state);
            denominator.hash(&mut state);
        }
        Node::Char(value) => {
            state.write_u8(TAG_CHAR);
            value.hash(&mut state);
        }
        Node::String(index) => {
            state.write_u8(TAG_STRING);
            // hash the decoded content without materialising it
            match arena.string_raw(index) {
                Some((raw, true)) => for_each_decoded(raw, |piece| state.write(piece.as_bytes())),
                Some((raw, false)) => state.write(raw.as_bytes()),
                None => {}
            }
            state.write_u8(0xff);
        }
        Node::Symbol(name) => {
            state.write_u8(TAG_SYMBOL);
            hash_name(arena, &name, &mut state);
        }
        Node::Keyword(name) => {
            state.write_u8(TAG_KEYWORD);
            hash_name(arena, &name, &mut state);
        }
        Node::List(children) | Node::Vector(children) => {
            state.write_u8(TAG_SEQUENCE);
            state.write_usize(children.len);
            for &child in arena.children(children) {
                state.write_u64(arena.hash_of(child));
            }
        }
        Node::Set(children) => {
            state.write_u8(TAG_SET);
            state.write_usize(children.len);
            let sum = arena
                .children(children)
                .iter()
                .fold(0u64, |acc, &child| acc.wrapping_add(arena.hash_of(child)));
            state.write_u64(sum);
        }
        Node::Map(children) => {
            state.write_u8(TAG_MAP);
            state.write_usize(children.len / 2);
            let sum = arena
                .children(children)
                .chunks_exact(2)
                .fold(0u64, |acc, pair| {
                    let mut entry = DefaultHasher::new();
                    entry.write_u64(arena.hash_of(pair[0]));
                    entry.write_u64(arena.hash_of(pair[1]));
                    acc.wrapping_add(entry.finish())
                });
            state.write_u64(sum);
        }
        Node::Tagged { tag, value } => {
            state.write_u8(TAG_TAGGED);
            hash_name(arena, &tag, &mut state);
            state.write_u64(arena.hash_of(value));
        }
    }
    state.finish()
}

fn same_value(a: ValueRef<'_>, b: ValueRef<'_>) -> bool {
    ptr::eq(a.arena(), b.arena()) && a.id() == b.id()
}

fn names_equal(a: &Arena<'_>, x: &Name, b: &Arena<'_>, y: &Name) -> bool {
    let namespace_x = x.namespace.map(|text| a.text(text));
    let namespace_y = y.namespace.map(|text| b.text(text));
    namespace_x == namespace_y && a.text(x.name) == b.text(y.name)
}

/// Structural equality. Numeric tiers never compare equal to each other;
/// `NaN` equals `NaN`; lists equal vectors with the same elements. Big
/// integers are equal only when written in the same radix.
pub fn equals(a: ValueRef<'_>, b: ValueRef<'_>) -> bool {
    if same_value(a, b) {
        return true;
    }
    if a.hash_code() != b.hash_code() {
        return false;
    }
    let (left, right) = (a.arena(), b.arena());
    match (*a.node(), *b.node()) {
        (Node::Nil, Node::Nil) => true,
        (Node::Bool(x), Node::Bool(y)) => x == y,
        (Node::Int(x), Node::Int(y)) => x == y,
        (Node::BigInt { .. }, Node::BigInt { .. }) => compare_bigint(a, b) == Ordering::Equal,
        (Node::Float(x), Node::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Node::BigDecimal { .. }, Node::BigDecimal { .. }) => {
            compare_bigdecimal(a, b) == Ordering::Equal
        }
        #[cfg(feature = "ratio")]
        (
            Node::Ratio {
                numerator: n1,
                denominator: d1,
            },
            Node::Ratio {
                numerator: n2,
                denominator: d2,
            },
        ) => n1 == n2 && d1 == d2,
        (Node::Char(x), Node::Char(y)) => x == y,
        (Node::String(x), Node::String(y)) => left.string(x) == right.string(y),
        (Node::Symbol(x), Node::Symbol(y)) | (Node::Keyword(x), Node::Keyword(y)) => {
            names_equal(left, &x, right, &y)
        }
        (Node::List(x) | Node::Vector(x), Node::List(y) | Node::Vector(y)) => {
            let (xs, ys) = (left.children(x), right.children(y));
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(&p, &q)| equals(left.get(p), right.get(q)))
        }
        (Node::Set(x), Node::Set(y)) => {
            let (xs, ys) = (left.children(x), right.children(y));
            // both sides are duplicate-free, so containment both ways
            // reduces to one direction once lengths match
            xs.len() == ys.len()
                && xs.iter().all(|&p| {
                    let probe = left.get(p);
                    ys.iter().any(|&q| equals(probe, right.get(q)))
                })
        }
        (Node::Map(x), Node::Map(y)) => {
            let (xs, ys) = (left.children(x), right.children(y));
            xs.len() == ys.len()
                && xs.chunks_exact(2).all(|entry| {
                    let key = left.get(entry[0]);
                    ys.chunks_exact(2)
                        .find(|other| equals(key, right.get(other[0])))
                        .is_some_and(|other| equals(left.get(entry[1]), right.get(other[1])))
                })
        }
        (Node::Tagged { tag: t1, value: v1 }, Node::Tagged { tag: t2, value: v2 }) => {
            names_equal(left, &t1, right, &t2) && equals(left.get(v1), right.get(v2))
        }
        _ => false,
    }
}

fn kind_rank(node: &Node) -> u8 {
    match node {
        Node::Nil => 0,
        Node::Bool(_) => 1,
        Node::Int(_) => 2,
        Node::BigInt { .. } => 3,
        #[cfg(feature = "ratio")]
        Node::Ratio { .. } => 4,
        Node::Float(_) => 5,
        Node::BigDecimal { .. } => 6,
        Node::Char(_) => 7,
        Node::String(_) => 8,
        Node::Symbol(_) => 9,
        Node::Keyword(_) => 10,
        Node::List(_) | Node::Vector(_) => 11,
        Node::Set(_) => 12,
        Node::Map(_) => 13,
        Node::Tagged { .. } => 14,
    }
}

fn signed(negative: bool, magnitude: Ordering) -> Ordering {
    if negative {
        magnitude.reverse()
    } else {
        magnitude
    }
}

fn compare_bigint(a: ValueRef<'_>, b: ValueRef<'_>) -> Ordering {
    let (Some(x), Some(y)) = (a.as_bigint(), b.as_bigint()) else {
        return Ordering::Equal;
    };
    let mx = IntDigits::new(x.digits, x.radix);
    let my = IntDigits::new(y.digits, y.radix);
    let nx = x.negative && !mx.is_zero();
    let ny = y.negative && !my.is_zero();
    match (nx, ny) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => signed(nx, mx.cmp_magnitude(&my)),
    }
}

fn compare_bigdecimal(a: ValueRef<'_>, b: ValueRef<'_>) -> Ordering {
    let (Some(x), Some(y)) = (a.as_bigdecimal(), b.as_bigdecimal()) else {
        return Ordering::Equal;
    };
    let kx = DecimalKey::parse(x.digits);
    let ky = DecimalKey::parse(y.digits);
    let nx = x.negative && !kx.is_zero();
    let ny = y.negative && !ky.is_zero();
    match (nx, ny) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => signed(nx, kx.cmp_magnitude(&ky)),
    }
}

/// Total order on floats that agrees with [`equals`]: `-0.0 == 0.0` and
/// `NaN` sorts after every number.
fn compare_float(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

fn compare_names(a: &Arena<'_>, x: &Name, b: &Arena<'_>, y: &Name) -> Ordering {
    let namespace_x = x.namespace.map(|text| a.text(text));
    let namespace_y = y.namespace.map(|text| b.text(text));
    namespace_x
        .cmp(&namespace_y)
        .then_with(|| a.text(x.name).cmp(b.text(y.name)))
}

fn sorted_members<'d>(arena: &'d Arena<'d>, ids: &[ValueId]) -> Vec<ValueRef<'d>> {
    let mut members: Vec<ValueRef<'d>> = ids.iter().map(|&id| arena.get(id)).collect();
    members.sort_by(|x, y| compare(*x, *y));
    members
}

fn sorted_entries<'d>(arena: &'d Arena<'d>, ids: &[ValueId]) -> Vec<(ValueRef<'d>, ValueRef<'d>)> {
    let mut entries: Vec<_> = ids
        .chunks_exact(2)
        .map(|pair| (arena.get(pair[0]), arena.get(pair[1])))
        .collect();
    entries.sort_by(|x, y| compare(x.0, y.0));
    entries
}

/// Total order consistent with [`equals`]. Values of different kinds order
/// by kind; sets and maps order by size, then by their sorted members.
pub fn compare(a: ValueRef<'_>, b: ValueRef<'_>) -> Ordering {
    if same_value(a, b) {
        return Ordering::Equal;
    }
    let (left, right) = (a.arena(), b.arena());
    let (x, y) = (*a.node(), *b.node());
    let rank = kind_rank(&x).cmp(&kind_rank(&y));
    if rank != Ordering::Equal {
        return rank;
    }
    match (x, y) {
        (Node::Bool(p), Node::Bool(q)) => p.cmp(&q),
        (Node::Int(p), Node::Int(q)) => p.cmp(&q),
        (Node::BigInt { .. }, Node::BigInt { .. }) => compare_bigint(a, b),
        (Node::Float(p), Node::Float(q)) => compare_float(p, q),
        (Node::BigDecimal { .. }, Node::BigDecimal { .. }) => compare_bigdecimal(a, b),
        #[cfg(feature = "ratio")]
        (
            Node::Ratio {
                numerator: n1,
                denominator: d1,
            },
            Node::Ratio {
                numerator: n2,
                denominator: d2,
            },
        ) => (n1 as i128 * d2 as i128).cmp(&(n2 as i128 * d1 as i128)),
        (Node::Char(p), Node::Char(q)) => p.cmp(&q),
        (Node::String(p), Node::String(q)) => left.string(p).cmp(right.string(q)),
        (Node::Symbol(p), Node::Symbol(q)) | (Node::Keyword(p), Node::Keyword(q)) => {
            compare_names(left, &p, right, &q)
        }
        (Node::List(p) | Node::Vector(p), Node::List(q) | Node::Vector(q)) => {
            let (xs, ys) = (left.children(p), right.children(q));
            for (&m, &n) in xs.iter().zip(ys) {
                let order = compare(left.get(m), right.get(n));
                if order != Ordering::Equal {
                    return order;
                }
            }
            xs.len().cmp(&ys.len())
        }
        (Node::Set(p), Node::Set(q)) => {
            let (xs, ys) = (left.children(p), right.children(q));
            xs.len().cmp(&ys.len()).then_with(|| {
                let (xs, ys) = (sorted_members(left, xs), sorted_members(right, ys));
                xs.iter()
                    .zip(&ys)
                    .map(|(m, n)| compare(*m, *n))
                    .find(|order| *order != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
        }
        (Node::Map(p), Node::Map(q)) => {
            let (xs, ys) = (left.children(p), right.children(q));
            xs.len().cmp(&ys.len()).then_with(|| {
                let (xs, ys) = (sorted_entries(left, xs), sorted_entries(right, ys));
                xs.iter()
                    .zip(&ys)
                    .map(|(m, n)| compare(m.0, n.0).then_with(|| compare(m.1, n.1)))
                    .find(|order| *order != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
        }
        (Node::Tagged { tag: t1, value: v1 }, Node::Tagged { tag: t2, value: v2 }) => {
            compare_names(left, &t1, right, &t2)
                .then_with(|| compare(left.get(v1), right.get(v2)))
        }
        _ => Ordering::Equal,
    }
}

const LINEAR_LIMIT: usize = 16;

/// Set of values already accepted into a map or set under construction.
/// Small collections are checked with a hash-prefiltered linear scan; larger
/// ones switch to hash buckets.
#[derive(Debug, Default)]
pub(crate) struct Seen {
    recent: SmallVec<[ValueId; LINEAR_LIMIT]>,
    buckets: Option<HashMap<u64, SmallVec<[ValueId; 2]>>>,
}

impl Seen {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn clear(&mut self) {
        self.recent.clear();
        self.buckets = None;
    }

    /// Records `id`; returns `false` if an equal value was already present.
    pub(crate) fn insert(&mut self, arena: &Arena<'_>, id: ValueId) -> bool {
        let probe = arena.get(id);
        match &mut self.buckets {
            Some(buckets) => {
                let bucket = buckets.entry(probe.hash_code()).or_default();
                if bucket.iter().any(|&seen| equals(arena.get(seen), probe)) {
                    return false;
                }
                bucket.push(id);
                true
            }
            None => {
                if self.recent.iter().any(|&seen| equals(arena.get(seen), probe)) {
                    return false;
                }
                if self.recent.len() < LINEAR_LIMIT {
                    self.recent.push(id);
                    return true;
                }
                let mut buckets: HashMap<u64, SmallVec<[ValueId; 2]>> = HashMap::new();
                for seen in self.recent.drain(..).chain(std::iter::once(id)) {
                    buckets.entry(arena.hash_of(seen)).or_default().push(seen);
                }
                self.buckets = Some(buckets);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_float_zero_and_nan() {
        let mut arena = Arena::new("");
        let pos = arena.alloc_float(0.0).unwrap();
        let neg = arena.alloc_float(-0.0).unwrap();
        let nan_a = arena.alloc_float(f64::NAN).unwrap();
        let nan_b = arena.alloc_float(-f64::NAN).unwrap();
        assert!(equals(arena.get(pos), arena.get(neg)));
        assert_eq!(arena.hash_of(pos), arena.hash_of(neg));
        assert!(equals(arena.get(nan_a), arena.get(nan_b)));
        assert_eq!(compare(arena.get(nan_a), arena.get(pos)), Ordering::Greater);
    }

    #[rstest::rstest]
    fn test_tiers_are_distinct() {
        let mut arena = Arena::new("");
        let int = arena.alloc_int(1).unwrap();
        let float = arena.alloc_float(1.0).unwrap();
        assert!(!equals(arena.get(int), arena.get(float)));
        assert_eq!(compare(arena.get(int), arena.get(float)), Ordering::Less);
    }

    #[rstest::rstest]
    fn test_seen_switches_to_buckets() {
        let mut arena = Arena::new("");
        let mut seen = Seen::new();
        for value in 0..40 {
            let id = arena.alloc_int(value).unwrap();
            assert!(seen.insert(&arena, id));
        }
        assert!(seen.buckets.is_some());
        let duplicate = arena.alloc_int(3).unwrap();
        assert!(!seen.insert(&arena, duplicate));
        let fresh = arena.alloc_int(40).unwrap();
        assert!(seen.insert(&arena, fresh));
    }

    #[rstest::rstest]
    fn test_cross_arena_equality() {
        let mut left = Arena::new("");
        let mut right = Arena::new("");
        let a = left.alloc_keyword(Some("ns"), "k").unwrap();
        let b = right.alloc_keyword(Some("ns"), "k").unwrap();
        assert!(equals(left.get(a), right.get(b)));
        assert_eq!(compare(left.get(a), right.get(b)), Ordering::Equal);
    }
}
