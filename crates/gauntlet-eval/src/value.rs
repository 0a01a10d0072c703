//! Runtime values.
//!
//! `Value` is a closed union. Lists, dicts and sets are shared by reference:
//! cloning a `Value::List` clones the handle, so every binding observes the
//! same storage. Ints, bools, strings and tuples behave as values; a tuple's
//! elements keep whatever sharing their own type has.

use crate::builtins::Builtin;
use crate::env::Env;
use crate::error::{EvalError, EvalResult, Exception, ExceptionKind};
use crate::generator::Generator;
use gauntlet_types::ast::{BinOp, Block, Expr};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
/// Insertion-ordered; each entry keeps the original key value.
pub type DictRef = Rc<RefCell<IndexMap<HashKey, (Value, Value)>>>;
pub type SetRef = Rc<RefCell<IndexMap<HashKey, Value>>>;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    List(ListRef),
    Tuple(Rc<[Value]>),
    Dict(DictRef),
    Set(SetRef),
    Generator(Generator),
    Callable(Callable),
    Class(Rc<ClassObject>),
    Exception(Rc<Exception>),
}

/// Anything that can be called.
#[derive(Clone)]
pub enum Callable {
    Function(Rc<Function>),
    Builtin(Builtin),
    BoundMethod(Rc<BoundMethod>),
    /// An exception class; calling it builds an instance.
    ExceptionType(ExceptionKind),
}

/// A user-defined function or lambda.
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    /// Parallel to `params`; evaluated once, at definition time.
    pub defaults: Vec<Option<Value>>,
    pub body: FunctionBody,
    pub closure: Env,
    /// Body contains a `yield`: calling returns a generator instead of running it.
    pub is_generator: bool,
}

pub enum FunctionBody {
    Block(Block),
    /// Lambda body.
    Expr(Expr),
}

/// `receiver.method` looked up but not yet called.
pub struct BoundMethod {
    pub receiver: Value,
    pub name: String,
}

/// A class object: its name and the namespace its body populated.
pub struct ClassObject {
    pub name: String,
    pub namespace: Env,
}

/// Hashable projection of a value, used as dict and set keys.
///
/// Bools hash as ints so `1` and `True` collide, as in the modeled language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    Str(Rc<str>),
    Tuple(Vec<HashKey>),
    /// Builtins and exception classes, by name.
    Named(&'static str),
    /// Everything else hashes by identity.
    Identity(usize),
}

impl Value {
    // ── Construction ─────────────────────────────────────────────────────

    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(items.into())
    }

    pub fn set(items: Vec<Value>) -> EvalResult<Self> {
        let mut map = IndexMap::with_capacity(items.len());
        for item in items {
            map.entry(item.hash_key()?).or_insert(item);
        }
        Ok(Value::Set(Rc::new(RefCell::new(map))))
    }

    pub fn dict(pairs: Vec<(Value, Value)>) -> EvalResult<Self> {
        let mut map = IndexMap::with_capacity(pairs.len());
        for (key, value) in pairs {
            let hk = key.hash_key()?;
            match map.get_mut(&hk) {
                Some((_, slot)) => *slot = value,
                None => {
                    map.insert(hk, (key, value));
                }
            }
        }
        Ok(Value::Dict(Rc::new(RefCell::new(map))))
    }

    pub fn exception(exc: Exception) -> Self {
        Value::Exception(Rc::new(exc))
    }

    // ── Capability predicates ────────────────────────────────────────────

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Generator(_) => "generator",
            Value::Callable(Callable::Function(_)) => "function",
            Value::Callable(Callable::Builtin(b)) if b.is_type() => "type",
            Value::Callable(Callable::Builtin(_)) => "builtin_function_or_method",
            Value::Callable(Callable::BoundMethod(_)) => "method",
            Value::Callable(Callable::ExceptionType(_)) | Value::Class(_) => "type",
            Value::Exception(exc) => exc.kind.name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(map) => !map.borrow().is_empty(),
            Value::Set(map) => !map.borrow().is_empty(),
            _ => true,
        }
    }

    /// Lists and tuples: what a sequence pattern may destructure.
    pub fn is_sequence_like(&self) -> bool {
        matches!(self, Value::List(_) | Value::Tuple(_))
    }

    /// Whether `self op= rhs` mutates `self` instead of rebinding a new value.
    pub fn supports_inplace_combine(&self, op: BinOp) -> bool {
        matches!(
            (self, op),
            (Value::List(_), BinOp::Add | BinOp::Mul)
                | (
                    Value::Set(_),
                    BinOp::BitOr | BinOp::BitAnd | BinOp::Sub | BinOp::BitXor
                )
                | (Value::Dict(_), BinOp::BitOr)
        )
    }

    /// Ints and bools as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// The `is` test.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_same(y)))
            }
            (Value::Generator(a), Value::Generator(b)) => a.ptr_eq(b),
            (Value::Callable(a), Value::Callable(b)) => a.is_same(b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn hash_key(&self) -> EvalResult<HashKey> {
        Ok(match self {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Int(i64::from(*b)),
            Value::Int(n) => HashKey::Int(*n),
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Tuple(items) => HashKey::Tuple(
                items
                    .iter()
                    .map(Value::hash_key)
                    .collect::<EvalResult<Vec<_>>>()?,
            ),
            Value::List(_) | Value::Dict(_) | Value::Set(_) => {
                return Err(EvalError::unsupported(format!(
                    "unhashable type: '{}'",
                    self.type_name()
                )));
            }
            Value::Callable(Callable::Builtin(b)) => HashKey::Named(b.name()),
            Value::Callable(Callable::ExceptionType(k)) => HashKey::Named(k.name()),
            Value::Callable(Callable::Function(f)) => HashKey::Identity(Rc::as_ptr(f) as usize),
            Value::Callable(Callable::BoundMethod(m)) => {
                HashKey::Identity(Rc::as_ptr(m) as usize)
            }
            Value::Generator(g) => HashKey::Identity(g.id()),
            Value::Class(c) => HashKey::Identity(Rc::as_ptr(c) as usize),
            Value::Exception(e) => HashKey::Identity(Rc::as_ptr(e) as usize),
        })
    }

    // ── Text ─────────────────────────────────────────────────────────────

    /// `str(value)`
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Exception(exc) => exc.message_text(),
            _ => self.repr(),
        }
    }

    /// `repr(value)`
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new());
        out
    }

    fn write_repr(&self, out: &mut String, seen: &mut Vec<usize>) {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Str(s) => out.push_str(&quote(s)),
            Value::List(items) => {
                let id = Rc::as_ptr(items) as *const () as usize;
                if seen.contains(&id) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(id);
                out.push('[');
                write_items(out, items.borrow().iter(), seen);
                out.push(']');
                seen.pop();
            }
            Value::Tuple(items) => {
                out.push('(');
                write_items(out, items.iter(), seen);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(map) => {
                let id = Rc::as_ptr(map) as *const () as usize;
                if seen.contains(&id) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(id);
                out.push('{');
                for (i, (key, value)) in map.borrow().values().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out, seen);
                    out.push_str(": ");
                    value.write_repr(out, seen);
                }
                out.push('}');
                seen.pop();
            }
            Value::Set(map) => {
                let map = map.borrow();
                if map.is_empty() {
                    out.push_str("set()");
                } else {
                    out.push('{');
                    write_items(out, map.values(), seen);
                    out.push('}');
                }
            }
            Value::Generator(g) => out.push_str(&format!("<generator object {}>", g.name())),
            Value::Callable(c) => out.push_str(&c.repr()),
            Value::Class(c) => out.push_str(&format!("<class '{}'>", c.name)),
            Value::Exception(exc) => {
                out.push_str(exc.kind.name());
                out.push('(');
                match &exc.message {
                    Some(m) => out.push_str(&quote(m)),
                    None if !exc.value.is_none() => exc.value.write_repr(out, seen),
                    None => {}
                }
                out.push(')');
            }
        }
    }
}

fn write_items<'a>(out: &mut String, items: impl Iterator<Item = &'a Value>, seen: &mut Vec<usize>) {
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_repr(out, seen);
    }
}

/// String literal form: single quotes unless only double quotes avoid escaping.
fn quote(s: &str) -> String {
    let q = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(q);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == q => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(q);
    out
}

impl Callable {
    pub fn name(&self) -> String {
        match self {
            Callable::Function(f) => f.name.clone(),
            Callable::Builtin(b) => b.name().to_string(),
            Callable::BoundMethod(m) => m.name.clone(),
            Callable::ExceptionType(k) => k.name().to_string(),
        }
    }

    fn is_same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Builtin(a), Callable::Builtin(b)) => a == b,
            (Callable::BoundMethod(a), Callable::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Callable::ExceptionType(a), Callable::ExceptionType(b)) => a == b,
            _ => false,
        }
    }

    fn repr(&self) -> String {
        match self {
            Callable::Function(f) => format!("<function {}>", f.name),
            Callable::Builtin(b) if b.is_type() => format!("<class '{}'>", b.name()),
            Callable::Builtin(b) => format!("<built-in function {}>", b.name()),
            Callable::BoundMethod(m) => {
                format!("<bound method {}.{}>", m.receiver.type_name(), m.name)
            }
            Callable::ExceptionType(k) => format!("<class '{}'>", k.name()),
        }
    }
}

/// Structural equality (`==`). Ints and bools compare numerically.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, (_, v))| b.get(k).is_some_and(|(_, w)| v == w))
            }
            (Value::Set(a), Value::Set(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.keys().all(|k| b.contains_key(k))
            }
            _ => match (self.as_int(), other.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => self.is_same(other),
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

impl fmt::Debug for ClassObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class '{}'>", self.name)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i64]) -> Vec<Value> {
        ns.iter().map(|n| Value::Int(*n)).collect()
    }

    #[test]
    fn list_clone_aliases_storage() {
        let a = Value::list(ints(&[1]));
        let b = a.clone();
        if let Value::List(items) = &a {
            items.borrow_mut().push(Value::Int(2));
        }
        assert!(a.is_same(&b));
        assert_eq!(b, Value::list(ints(&[1, 2])));
    }

    #[test]
    fn equal_lists_are_not_identical() {
        let a = Value::list(ints(&[1, 2]));
        let b = Value::list(ints(&[1, 2]));
        assert_eq!(a, b);
        assert!(!a.is_same(&b));
    }

    #[test]
    fn tuple_elements_keep_their_identity() {
        let inner = Value::list(ints(&[10]));
        let t = Value::tuple(vec![inner.clone()]);
        if let Value::List(items) = &inner {
            items.borrow_mut().push(Value::Int(20));
        }
        assert_eq!(t.repr(), "([10, 20],)");
    }

    #[test]
    fn inplace_capability() {
        let list = Value::list(vec![]);
        assert!(list.supports_inplace_combine(BinOp::Add));
        assert!(!list.supports_inplace_combine(BinOp::Sub));
        assert!(!Value::Int(1).supports_inplace_combine(BinOp::Add));
        assert!(!Value::tuple(vec![]).supports_inplace_combine(BinOp::Add));
        assert!(Value::set(vec![]).unwrap().supports_inplace_combine(BinOp::BitOr));
    }

    #[test]
    fn sequence_like_excludes_strings() {
        assert!(Value::list(vec![]).is_sequence_like());
        assert!(Value::tuple(vec![]).is_sequence_like());
        assert!(!Value::str("ab").is_sequence_like());
    }

    #[test]
    fn bool_and_int_share_hash_and_equality() {
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_eq!(
            Value::Bool(true).hash_key().unwrap(),
            Value::Int(1).hash_key().unwrap()
        );
        assert!(!Value::Bool(true).is_same(&Value::Int(1)));
    }

    #[test]
    fn lists_are_unhashable() {
        let err = Value::list(vec![]).hash_key().unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unhashable type: 'list'");
    }

    #[test]
    fn repr_forms() {
        assert_eq!(Value::tuple(vec![]).repr(), "()");
        assert_eq!(Value::set(vec![]).unwrap().repr(), "set()");
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
        assert_eq!(Value::str("x").repr(), "'x'");
        let d = Value::dict(vec![(Value::str("h"), Value::Int(1))]).unwrap();
        assert_eq!(d.repr(), "{'h': 1}");
        assert_eq!(Value::list(vec![Value::None, Value::Bool(false)]).to_str(), "[None, False]");
    }

    #[test]
    fn self_containing_list_repr_terminates() {
        let list = Value::list(vec![]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.repr(), "[[...]]");
    }

    #[test]
    fn set_deduplicates_in_insertion_order() {
        let s = Value::set(ints(&[3, 1, 3, 2, 1])).unwrap();
        assert_eq!(s.repr(), "{3, 1, 2}");
    }

    #[test]
    fn dict_later_key_wins_but_first_key_kept() {
        let d = Value::dict(vec![
            (Value::Int(1), Value::str("a")),
            (Value::Bool(true), Value::str("b")),
        ])
        .unwrap();
        assert_eq!(d.repr(), "{1: 'b'}");
    }
}
