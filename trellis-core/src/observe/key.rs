//! Property keys.
//!
//! A [`Key`] names one observable slot of a target. Besides ordinary names
//! and array indices there are two synthetic shape keys, used when an effect
//! depends on which keys exist rather than on one value, and the reserved
//! facet keys that views answer before any normal lookup.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Names whose reads are never tracked.
const NON_TRACKABLE: [&str; 3] = ["__proto__", "__v_isRef", "__isVue"];

/// Reserved facet keys answered by a view itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactiveFlag {
    /// The value was marked exempt from wrapping.
    Skip,
    /// The view is a mutable reactive view.
    IsReactive,
    /// The view rejects writes.
    IsReadonly,
    /// The view does not wrap nested values.
    IsShallow,
    /// The object the view wraps.
    Raw,
}

/// A symbol key.
///
/// Symbols compare by identity. A fixed set of well-known symbols stands in
/// for the host's built-in protocol keys; reads of those are never tracked.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Cow<'static, str>,
}

/// Ids below this are reserved for well-known symbols.
const FIRST_USER_SYMBOL: u64 = 1 << 16;

impl Symbol {
    /// Iteration protocol.
    pub const ITERATOR: Symbol = Symbol::well_known(1, "Symbol.iterator");
    /// Async iteration protocol.
    pub const ASYNC_ITERATOR: Symbol = Symbol::well_known(2, "Symbol.asyncIterator");
    /// Instance check protocol.
    pub const HAS_INSTANCE: Symbol = Symbol::well_known(3, "Symbol.hasInstance");
    /// Primitive conversion protocol.
    pub const TO_PRIMITIVE: Symbol = Symbol::well_known(4, "Symbol.toPrimitive");
    /// Type tag used when formatting.
    pub const TO_STRING_TAG: Symbol = Symbol::well_known(5, "Symbol.toStringTag");
    /// Scope exclusion list.
    pub const UNSCOPABLES: Symbol = Symbol::well_known(6, "Symbol.unscopables");

    const fn well_known(id: u64, description: &'static str) -> Self {
        Self {
            id,
            description: Cow::Borrowed(description),
        }
    }

    /// Create a fresh symbol, distinct from every other symbol.
    pub fn new(description: impl Into<String>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(FIRST_USER_SYMBOL);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description: Cow::Owned(description.into()),
        }
    }

    /// Whether this is one of the built-in protocol symbols.
    pub fn is_well_known(&self) -> bool {
        self.id < FIRST_USER_SYMBOL
    }

    /// The description given at creation.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// One observable slot of a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A canonical non-negative integer key.
    Index(usize),
    /// Any other string key, including an array's `length`.
    Name(Rc<str>),
    /// A symbol key.
    Symbol(Symbol),
    /// Shape of the target: which keys exist.
    Iterate,
    /// Key set of a map-like target.
    MapKeyIterate,
    /// A reserved facet key.
    Flag(ReactiveFlag),
}

impl Key {
    /// The `length` key.
    pub fn length() -> Self {
        Key::Name(Rc::from("length"))
    }

    /// Whether this is the `length` key.
    pub fn is_length(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == "length")
    }

    /// The index, for integer keys.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            _ => None,
        }
    }

    /// Whether this is an integer key.
    pub fn is_index(&self) -> bool {
        matches!(self, Key::Index(_))
    }

    /// Keys whose reads never create a dependency.
    pub(crate) fn skips_tracking(&self) -> bool {
        match self {
            Key::Symbol(symbol) => symbol.is_well_known(),
            Key::Name(name) => NON_TRACKABLE.contains(&&**name),
            _ => false,
        }
    }

    /// Built-in symbols, which `has` does not track.
    pub(crate) fn is_builtin_symbol(&self) -> bool {
        matches!(self, Key::Symbol(symbol) if symbol.is_well_known())
    }
}

/// Whether `key` is the canonical decimal form of a non-negative integer.
fn parse_integer_key(key: &str) -> Option<usize> {
    if key == "NaN" || key.starts_with('-') || key.starts_with('+') {
        return None;
    }
    let parsed: usize = key.parse().ok()?;
    (parsed.to_string() == key).then_some(parsed)
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        match parse_integer_key(key) {
            Some(index) => Key::Index(index),
            None => Key::Name(Rc::from(key)),
        }
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Key::from(key.as_str())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Key::Symbol(symbol)
    }
}

impl From<ReactiveFlag> for Key {
    fn from(flag: ReactiveFlag) -> Self {
        Key::Flag(flag)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{index}"),
            Key::Name(name) => f.write_str(name),
            Key::Symbol(symbol) => write!(f, "{symbol:?}"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::MapKeyIterate => f.write_str("<map key iterate>"),
            Key::Flag(flag) => write!(f, "<{flag:?}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_strings_become_indices() {
        assert_eq!(Key::from("0"), Key::Index(0));
        assert_eq!(Key::from("42"), Key::Index(42));
        assert_eq!(Key::from("042"), Key::Name(Rc::from("042")));
        assert_eq!(Key::from("-1"), Key::Name(Rc::from("-1")));
        assert_eq!(Key::from("NaN"), Key::Name(Rc::from("NaN")));
        assert_eq!(Key::from("1.5"), Key::Name(Rc::from("1.5")));
    }

    #[test]
    fn length_key_is_a_name() {
        assert!(Key::from("length").is_length());
        assert!(Key::length().is_length());
        assert!(!Key::Index(0).is_length());
    }

    #[test]
    fn well_known_symbols_skip_tracking() {
        assert!(Key::from(Symbol::ITERATOR).skips_tracking());
        assert!(!Key::from(Symbol::new("mine")).skips_tracking());
        assert!(Key::from("__proto__").skips_tracking());
        assert!(!Key::from("value").skips_tracking());
    }

    #[test]
    fn symbols_compare_by_identity() {
        let a = Symbol::new("same");
        let b = Symbol::new("same");
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
        assert_eq!(Symbol::ITERATOR, Symbol::ITERATOR);
    }
}
