//! Blackboard scopes and port bindings.
//!
//! A tree owns one [`Blackboards`] arena. Scope 0 belongs to the main tree, every
//! subtree gets a scope of its own whose remap table forwards selected keys to
//! the parent scope. Nodes never hold references to each other; everything they
//! share goes through these tables.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use ::once_cell::unsync::OnceCell;

use crate::{convert::Converters, error::ConversionError, PortType, Symbol, ValueType};

/// Handle of a blackboard scope inside a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) usize);

/// A single key/value scope.
///
/// # Implementation note
///
/// Values are kept in an `Rc` rather than a `Box`. `Clone` is not object safe,
/// so sharing is the only way to hand a value to a subtree or to a reader
/// outside the tree without asking every stored type to implement a cloning
/// trait of ours.
#[derive(Default)]
pub struct Blackboard {
    entries: HashMap<Symbol, Rc<dyn Any>>,
    parent: Option<ScopeId>,
    remaps: HashMap<Symbol, Symbol>,
}

impl Blackboard {
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Keys stored in this scope, not counting remapped ones.
    pub fn keys(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries.keys().copied()
    }

    pub fn remaps(&self) -> impl Iterator<Item = (Symbol, Symbol)> + '_ {
        self.remaps.iter().map(|(local, parent)| (*local, *parent))
    }
}

impl fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("Blackboard")
            .field("keys", &keys)
            .field("parent", &self.parent)
            .field("remaps", &self.remaps)
            .finish()
    }
}

/// Arena of all blackboard scopes of a tree.
#[derive(Debug)]
pub struct Blackboards {
    scopes: Vec<Blackboard>,
}

impl Default for Blackboards {
    fn default() -> Self {
        Self {
            scopes: vec![Blackboard::default()],
        }
    }
}

impl Blackboards {
    pub const ROOT: ScopeId = ScopeId(0);

    /// Creates a child scope. `remaps` maps keys of the new scope to keys of
    /// `parent`.
    pub fn push_scope(
        &mut self,
        parent: ScopeId,
        remaps: impl IntoIterator<Item = (Symbol, Symbol)>,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Blackboard {
            entries: HashMap::new(),
            parent: Some(parent),
            remaps: remaps.into_iter().collect(),
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Blackboard> {
        self.scopes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Follows remaps up the scope chain to the scope and key that actually
    /// store `key`.
    pub fn resolve(&self, mut scope: ScopeId, mut key: Symbol) -> (ScopeId, Symbol) {
        loop {
            let Some(board) = self.scopes.get(scope.0) else {
                return (scope, key);
            };
            match (board.parent, board.remaps.get(&key)) {
                (Some(parent), Some(remapped)) => {
                    scope = parent;
                    key = *remapped;
                }
                _ => return (scope, key),
            }
        }
    }

    pub fn get_any(&self, scope: ScopeId, key: impl Into<Symbol>) -> Option<&Rc<dyn Any>> {
        let (scope, key) = self.resolve(scope, key.into());
        self.scopes.get(scope.0)?.entries.get(&key)
    }

    /// Typed read. Absent if the key is unset or holds another type.
    pub fn get<T: 'static>(&self, scope: ScopeId, key: impl Into<Symbol>) -> Option<&T> {
        self.get_any(scope, key)?.downcast_ref()
    }

    pub fn set_any(&mut self, scope: ScopeId, key: impl Into<Symbol>, value: Rc<dyn Any>) {
        let (scope, key) = self.resolve(scope, key.into());
        if let Some(board) = self.scopes.get_mut(scope.0) {
            board.entries.insert(key, value);
        }
    }

    /// Creates or overwrites an entry; the previous type does not matter.
    pub fn set<T: 'static>(&mut self, scope: ScopeId, key: impl Into<Symbol>, value: T) {
        self.set_any(scope, key, Rc::new(value));
    }

    pub fn remove(&mut self, scope: ScopeId, key: impl Into<Symbol>) -> Option<Rc<dyn Any>> {
        let (scope, key) = self.resolve(scope, key.into());
        self.scopes.get_mut(scope.0)?.entries.remove(&key)
    }
}

/// A string literal bound to an input port.
///
/// The first successful typed conversion is cached; a typed port primes it while the tree is
/// built. Reading the literal as any other type parses the text again on every read.
pub struct Literal {
    text: String,
    parsed: OnceCell<Rc<dyn Any>>,
}

impl Literal {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parsed: OnceCell::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Borrows the literal as `T` without converting: either the text itself
    /// or an earlier cached conversion.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        (&self.text as &dyn Any)
            .downcast_ref()
            .or_else(|| self.parsed.get()?.downcast_ref())
    }

    pub fn convert<T: Clone + 'static>(&self, converters: &Converters) -> Result<T, ConversionError> {
        if let Some(value) = self.get::<T>() {
            return Ok(value.clone());
        }
        let value = converters.parse::<T>(&self.text)?;
        // Another type may have been cached already; it keeps the slot.
        let _ = self.parsed.set(Rc::new(value.clone()));
        Ok(value)
    }

    /// Converts into `ty` ahead of time, used while a tree is built.
    pub(crate) fn prime(&self, converters: &Converters, ty: ValueType) -> Result<(), ConversionError> {
        if ty.id == std::any::TypeId::of::<String>() || self.parsed.get().is_some() {
            return Ok(());
        }
        let value = converters.parse_dyn(ty, &self.text)?;
        let _ = self.parsed.set(value);
        Ok(())
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Literal").field(&self.text).finish()
    }
}

/// What a node port is bound to.
#[derive(Debug)]
pub enum BlackboardValue {
    Ref(Symbol, PortType),
    Literal(Literal),
}

impl BlackboardValue {
    /// Binds to a blackboard key with unspecified direction.
    pub fn key(key: impl Into<Symbol>) -> Self {
        Self::Ref(key.into(), PortType::InOut)
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(Literal::new(text))
    }

    /// Interprets `{key}` as a reference to `key` and anything else as a
    /// literal.
    pub fn parse_binding(s: &str) -> Self {
        match s
            .trim()
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Some(key) if !key.trim().is_empty() => Self::key(key.trim()),
            _ => Self::literal(s),
        }
    }
}

impl From<&str> for BlackboardValue {
    fn from(s: &str) -> Self {
        Self::parse_binding(s)
    }
}

impl From<String> for BlackboardValue {
    fn from(s: String) -> Self {
        Self::parse_binding(&s)
    }
}

/// Port bindings of a node instance.
pub type BBMap = HashMap<Symbol, BlackboardValue>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overwrite_with_other_type() {
        let mut boards = Blackboards::default();
        boards.set(Blackboards::ROOT, "x", 1i32);
        boards.set(Blackboards::ROOT, "x", "one".to_owned());
        assert_eq!(boards.get::<i32>(Blackboards::ROOT, "x"), None);
        assert_eq!(
            boards.get::<String>(Blackboards::ROOT, "x").map(String::as_str),
            Some("one")
        );
    }

    #[test]
    fn remap_reaches_parent() {
        let mut boards = Blackboards::default();
        let child = boards.push_scope(Blackboards::ROOT, [(Symbol::from("a"), Symbol::from("X"))]);
        let sibling = boards.push_scope(Blackboards::ROOT, [(Symbol::from("b"), Symbol::from("X"))]);

        boards.set(child, "a", 5u32);
        boards.set(child, "local", 1u32);

        assert_eq!(boards.get::<u32>(Blackboards::ROOT, "X"), Some(&5));
        assert_eq!(boards.get::<u32>(sibling, "b"), Some(&5));
        assert_eq!(boards.get::<u32>(Blackboards::ROOT, "local"), None);
        assert_eq!(boards.get::<u32>(sibling, "local"), None);
    }

    #[test]
    fn nested_remaps() {
        let mut boards = Blackboards::default();
        let mid = boards.push_scope(Blackboards::ROOT, [(Symbol::from("m"), Symbol::from("top"))]);
        let leaf = boards.push_scope(mid, [(Symbol::from("l"), Symbol::from("m"))]);
        boards.set(leaf, "l", 'z');
        assert_eq!(
            boards.resolve(leaf, Symbol::from("l")),
            (Blackboards::ROOT, Symbol::from("top"))
        );
        assert_eq!(boards.get::<char>(Blackboards::ROOT, "top"), Some(&'z'));
    }

    #[test]
    fn binding_syntax() {
        assert!(matches!(
            BlackboardValue::from("{goal}"),
            BlackboardValue::Ref(key, PortType::InOut) if key == "goal"
        ));
        assert!(matches!(BlackboardValue::from("goal"), BlackboardValue::Literal(_)));
        assert!(matches!(BlackboardValue::from("{}"), BlackboardValue::Literal(_)));
    }

    #[test]
    fn literal_caches_first_conversion() {
        let converters = Converters::default();
        let lit = Literal::new("42");
        assert_eq!(lit.get::<i32>(), None);
        assert_eq!(lit.convert::<i32>(&converters), Ok(42));
        assert_eq!(lit.get::<i32>(), Some(&42));
        assert_eq!(lit.convert::<u8>(&converters), Ok(42));
        // Only the first type keeps the cache slot.
        assert_eq!(lit.get::<u8>(), None);
        assert_eq!(lit.get::<i32>(), Some(&42));
        assert_eq!(lit.get::<String>().map(String::as_str), Some("42"));
    }
}
