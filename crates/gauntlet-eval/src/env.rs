//! Scope chain for the Gauntlet evaluator.

use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// What created a scope. Class bodies get special lookup treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Class,
    Comprehension,
}

/// Shared handle to a scope. Closures, class objects and suspended
/// generators keep their scope alive through it.
pub type Env = Rc<Environment>;

/// One scope: its own bindings plus a link to the lexically enclosing scope.
///
/// `define` always writes the current scope. `get` searches outward, but a
/// class-body scope is only visible to code running directly in it: nested
/// functions and comprehensions skip over it.
pub struct Environment {
    kind: ScopeKind,
    bindings: RefCell<BTreeMap<String, Value>>,
    parent: Option<Env>,
}

impl Environment {
    /// A fresh module scope.
    pub fn global() -> Env {
        Rc::new(Self {
            kind: ScopeKind::Module,
            bindings: RefCell::new(BTreeMap::new()),
            parent: None,
        })
    }

    /// A new scope nested in `parent`.
    pub fn child(parent: &Env, kind: ScopeKind) -> Env {
        Rc::new(Self {
            kind,
            bindings: RefCell::new(BTreeMap::new()),
            parent: Some(parent.clone()),
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Bind (or rebind) `name` in this scope.
    pub fn define(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    /// Resolve `name` from this scope outward, skipping enclosing class bodies.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.get_local(name) {
            return Some(v);
        }
        let mut scope = self.parent.as_ref();
        while let Some(env) = scope {
            if env.kind != ScopeKind::Class {
                if let Some(v) = env.get_local(name) {
                    return Some(v);
                }
            }
            scope = env.parent.as_ref();
        }
        None
    }

    /// Look only at this scope's own bindings.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.bindings.borrow().get(name).cloned()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Names bound directly in this scope, sorted.
    pub fn names(&self) -> Vec<String> {
        self.bindings.borrow().keys().cloned().collect()
    }

    /// Copy of this scope's bindings.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.bindings.borrow().clone()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("kind", &self.kind)
            .field("names", &self.names())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
