//! Built-in functions and methods of the core types.

use crate::compare::less_than;
use crate::env::Environment;
use crate::error::{EvalError, EvalResult, ExceptionKind};
use crate::evaluator::{exception_from_value, Evaluator};
use crate::ops::{binary_op, order};
use crate::value::{Callable, ClassObject, Value};
use gauntlet_types::ast::{BinOp, CmpOp};
use std::cmp::Ordering;
use std::rc::Rc;

/// A built-in function. Some double as type objects (`list`, `int`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Print,
    Range,
    Len,
    List,
    Tuple,
    Set,
    Dict,
    Str,
    Repr,
    Int,
    Bool,
    Sorted,
    Sum,
    Min,
    Max,
    Enumerate,
    Next,
    Type,
}

impl Builtin {
    const ALL: [Builtin; 18] = [
        Self::Print,
        Self::Range,
        Self::Len,
        Self::List,
        Self::Tuple,
        Self::Set,
        Self::Dict,
        Self::Str,
        Self::Repr,
        Self::Int,
        Self::Bool,
        Self::Sorted,
        Self::Sum,
        Self::Min,
        Self::Max,
        Self::Enumerate,
        Self::Next,
        Self::Type,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Range => "range",
            Self::Len => "len",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::Dict => "dict",
            Self::Str => "str",
            Self::Repr => "repr",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Sorted => "sorted",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Enumerate => "enumerate",
            Self::Next => "next",
            Self::Type => "type",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Whether this builtin is also the type object of a value kind.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Self::List | Self::Tuple | Self::Set | Self::Dict | Self::Str | Self::Int | Self::Bool
        )
    }

    /// Whether `receiver.name(...)` is a known method.
    pub fn method_exists(receiver: &Value, name: &str) -> bool {
        let methods: &[&str] = match receiver {
            Value::List(_) => &["append", "extend", "pop"],
            Value::Set(_) => &["add", "update", "remove", "discard"],
            Value::Dict(_) => &["get", "keys", "values", "items"],
            Value::Str(_) => &["count", "join", "upper"],
            Value::Generator(_) => &["send", "throw", "close"],
            _ => &[],
        };
        methods.contains(&name)
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    let given = args.len();
    if (min..=max).contains(&given) {
        return Ok(());
    }
    Err(EvalError::unsupported(if min == max {
        format!("{name}() takes exactly {min} argument{} ({given} given)", plural(min))
    } else if given < min {
        format!("{name}() expected at least {min} argument{}, got {given}", plural(min))
    } else {
        format!("{name}() expected at most {max} argument{}, got {given}", plural(max))
    }))
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn int_arg(name: &str, v: &Value) -> EvalResult<i64> {
    v.as_int().ok_or_else(|| {
        EvalError::unsupported(format!(
            "'{}' object cannot be interpreted as an integer in {name}()",
            v.type_name()
        ))
    })
}

impl Evaluator {
    // ══════════════════════════════════════════════════════════════════════
    // Functions
    // ══════════════════════════════════════════════════════════════════════

    pub fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> EvalResult<Value> {
        tracing::trace!(builtin = builtin.name(), argc = args.len(), "call");
        let name = builtin.name();
        match builtin {
            Builtin::Print => {
                let line: Vec<String> = args.iter().map(Value::to_str).collect();
                self.trace.push(line.join(" "));
                Ok(Value::None)
            }
            Builtin::Range => {
                arity(name, &args, 1, 3)?;
                let ints = args
                    .iter()
                    .map(|a| int_arg(name, a))
                    .collect::<EvalResult<Vec<_>>>()?;
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => (0, 0, 1),
                };
                if step == 0 {
                    return Err(EvalError::raise(
                        ExceptionKind::ValueError,
                        "range() arg 3 must not be zero",
                    ));
                }
                let mut items = Vec::new();
                let mut i = start;
                while (step > 0 && i < stop) || (step < 0 && i > stop) {
                    self.tick()?;
                    items.push(Value::Int(i));
                    match i.checked_add(step) {
                        Some(next) => i = next,
                        None => break,
                    }
                }
                Ok(Value::list(items))
            }
            Builtin::Len => {
                arity(name, &args, 1, 1)?;
                let n = match &args[0] {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Tuple(items) => items.len(),
                    Value::Dict(map) => map.borrow().len(),
                    Value::Set(map) => map.borrow().len(),
                    other => {
                        return Err(EvalError::unsupported(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )))
                    }
                };
                Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
            }
            Builtin::List => {
                arity(name, &args, 0, 1)?;
                match args.first() {
                    Some(v) => Ok(Value::list(self.collect_values(v)?)),
                    None => Ok(Value::list(Vec::new())),
                }
            }
            Builtin::Tuple => {
                arity(name, &args, 0, 1)?;
                match args.first() {
                    Some(v) => Ok(Value::tuple(self.collect_values(v)?)),
                    None => Ok(Value::tuple(Vec::new())),
                }
            }
            Builtin::Set => {
                arity(name, &args, 0, 1)?;
                match args.first() {
                    Some(v) => Value::set(self.collect_values(v)?),
                    None => Value::set(Vec::new()),
                }
            }
            Builtin::Dict => {
                arity(name, &args, 0, 1)?;
                match args.first() {
                    None => Value::dict(Vec::new()),
                    Some(Value::Dict(map)) => Value::dict(map.borrow().values().cloned().collect()),
                    Some(v) => {
                        let mut pairs = Vec::new();
                        for item in self.collect_values(v)? {
                            let pair = self.collect_values(&item)?;
                            let [key, value] = <[Value; 2]>::try_from(pair).map_err(|pair| {
                                EvalError::raise(
                                    ExceptionKind::ValueError,
                                    format!(
                                        "dictionary update sequence element has length {}; 2 is required",
                                        pair.len()
                                    ),
                                )
                            })?;
                            pairs.push((key, value));
                        }
                        Value::dict(pairs)
                    }
                }
            }
            Builtin::Str => {
                arity(name, &args, 0, 1)?;
                Ok(Value::str(args.first().map(Value::to_str).unwrap_or_default()))
            }
            Builtin::Repr => {
                arity(name, &args, 1, 1)?;
                Ok(Value::str(args[0].repr()))
            }
            Builtin::Int => {
                arity(name, &args, 0, 1)?;
                match args.first() {
                    None => Ok(Value::Int(0)),
                    Some(v) => match v {
                        Value::Int(_) | Value::Bool(_) => Ok(Value::Int(int_arg(name, v)?)),
                        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                            EvalError::raise(
                                ExceptionKind::ValueError,
                                format!("invalid literal for int() with base 10: {}", v.repr()),
                            )
                        }),
                        other => Err(EvalError::unsupported(format!(
                            "int() argument must be a string or a number, not '{}'",
                            other.type_name()
                        ))),
                    },
                }
            }
            Builtin::Bool => {
                arity(name, &args, 0, 1)?;
                Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
            }
            Builtin::Sorted => {
                arity(name, &args, 1, 1)?;
                let mut items = self.collect_values(&args[0])?;
                sort_values(&mut items)?;
                Ok(Value::list(items))
            }
            Builtin::Sum => {
                arity(name, &args, 1, 2)?;
                let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
                for item in self.collect_values(&args[0])? {
                    total = binary_op(BinOp::Add, &total, &item)?;
                }
                Ok(total)
            }
            Builtin::Min | Builtin::Max => {
                let items = match args.len() {
                    0 => {
                        return Err(EvalError::unsupported(format!(
                            "{name} expected at least 1 argument, got 0"
                        )))
                    }
                    1 => self.collect_values(&args[0])?,
                    _ => args,
                };
                let mut iter = items.into_iter();
                let Some(mut best) = iter.next() else {
                    return Err(EvalError::raise(
                        ExceptionKind::ValueError,
                        format!("{name}() arg is an empty sequence"),
                    ));
                };
                for item in iter {
                    let better = if builtin == Builtin::Min {
                        less_than(&item, &best)?
                    } else {
                        less_than(&best, &item)?
                    };
                    if better {
                        best = item;
                    }
                }
                Ok(best)
            }
            Builtin::Enumerate => {
                arity(name, &args, 1, 2)?;
                let start = match args.get(1) {
                    Some(v) => int_arg(name, v)?,
                    None => 0,
                };
                let items = self.collect_values(&args[0])?;
                let mut out = Vec::with_capacity(items.len());
                for (offset, item) in (0_i64..).zip(items) {
                    let index = start.checked_add(offset).ok_or_else(|| {
                        EvalError::raise(ExceptionKind::OverflowError, "integer overflow")
                    })?;
                    out.push(Value::tuple(vec![Value::Int(index), item]));
                }
                Ok(Value::list(out))
            }
            Builtin::Next => {
                arity(name, &args, 1, 2)?;
                let Value::Generator(gen) = &args[0] else {
                    return Err(EvalError::unsupported(format!(
                        "'{}' object is not an iterator",
                        args[0].type_name()
                    )));
                };
                match (self.advance(gen), args.get(1)) {
                    (Err(EvalError::ExhaustedGenerator(_)), Some(default)) => Ok(default.clone()),
                    (result, _) => result,
                }
            }
            Builtin::Type => {
                arity(name, &args, 1, 1)?;
                Ok(type_of(&args[0]))
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Methods
    // ══════════════════════════════════════════════════════════════════════

    pub fn call_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        tracing::trace!(receiver = receiver.type_name(), method = name, "method call");
        match (receiver, name) {
            // ── list ──
            (Value::List(items), "append") => {
                arity(name, &args, 1, 1)?;
                items.borrow_mut().extend(args);
                Ok(Value::None)
            }
            (Value::List(items), "extend") => {
                arity(name, &args, 1, 1)?;
                let extra = self.collect_values(&args[0])?;
                items.borrow_mut().extend(extra);
                Ok(Value::None)
            }
            (Value::List(items), "pop") => {
                arity(name, &args, 0, 1)?;
                let len = items.borrow().len();
                if len == 0 {
                    return Err(EvalError::raise(ExceptionKind::IndexError, "pop from empty list"));
                }
                let index = match args.first() {
                    Some(v) => {
                        let i = int_arg(name, v)?;
                        let len = i64::try_from(len).unwrap_or(i64::MAX);
                        let i = if i < 0 { i + len } else { i };
                        usize::try_from(i)
                            .ok()
                            .filter(|i| *i < items.borrow().len())
                            .ok_or_else(|| {
                                EvalError::raise(ExceptionKind::IndexError, "pop index out of range")
                            })?
                    }
                    None => len - 1,
                };
                Ok(items.borrow_mut().remove(index))
            }

            // ── set ──
            (Value::Set(map), "add") => {
                arity(name, &args, 1, 1)?;
                let key = args[0].hash_key()?;
                map.borrow_mut().entry(key).or_insert_with(|| args[0].clone());
                Ok(Value::None)
            }
            (Value::Set(map), "update") => {
                arity(name, &args, 1, 1)?;
                for item in self.collect_values(&args[0])? {
                    let key = item.hash_key()?;
                    map.borrow_mut().entry(key).or_insert(item);
                }
                Ok(Value::None)
            }
            (Value::Set(map), "remove") => {
                arity(name, &args, 1, 1)?;
                let key = args[0].hash_key()?;
                match map.borrow_mut().shift_remove(&key) {
                    Some(_) => Ok(Value::None),
                    None => Err(EvalError::raise(ExceptionKind::KeyError, args[0].repr())),
                }
            }
            (Value::Set(map), "discard") => {
                arity(name, &args, 1, 1)?;
                let key = args[0].hash_key()?;
                map.borrow_mut().shift_remove(&key);
                Ok(Value::None)
            }

            // ── dict ──
            (Value::Dict(map), "get") => {
                arity(name, &args, 1, 2)?;
                let key = args[0].hash_key()?;
                let found = map.borrow().get(&key).map(|(_, v)| v.clone());
                Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
            }
            (Value::Dict(map), "keys") => {
                arity(name, &args, 0, 0)?;
                Ok(Value::list(map.borrow().values().map(|(k, _)| k.clone()).collect()))
            }
            (Value::Dict(map), "values") => {
                arity(name, &args, 0, 0)?;
                Ok(Value::list(map.borrow().values().map(|(_, v)| v.clone()).collect()))
            }
            (Value::Dict(map), "items") => {
                arity(name, &args, 0, 0)?;
                Ok(Value::list(
                    map.borrow()
                        .values()
                        .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                        .collect(),
                ))
            }

            // ── str ──
            (Value::Str(s), "count") => {
                arity(name, &args, 1, 1)?;
                let Value::Str(sub) = &args[0] else {
                    return Err(EvalError::unsupported(format!(
                        "must be str, not {}",
                        args[0].type_name()
                    )));
                };
                let n = if sub.is_empty() {
                    s.chars().count() + 1
                } else {
                    s.matches(&**sub).count()
                };
                Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
            }
            (Value::Str(sep), "join") => {
                arity(name, &args, 1, 1)?;
                let mut parts = Vec::new();
                for (i, item) in self.collect_values(&args[0])?.into_iter().enumerate() {
                    match item {
                        Value::Str(part) => parts.push(part.to_string()),
                        other => {
                            return Err(EvalError::unsupported(format!(
                                "sequence item {i}: expected str instance, {} found",
                                other.type_name()
                            )))
                        }
                    }
                }
                Ok(Value::str(parts.join(&**sep)))
            }
            (Value::Str(s), "upper") => {
                arity(name, &args, 0, 0)?;
                Ok(Value::str(s.to_uppercase()))
            }

            // ── generator ──
            (Value::Generator(gen), "send") => {
                arity(name, &args, 1, 1)?;
                let value = args.into_iter().next().unwrap_or(Value::None);
                self.send(gen, value)
            }
            (Value::Generator(gen), "throw") => {
                arity(name, &args, 1, 1)?;
                let err = exception_from_value(&args[0])?;
                self.throw(gen, err)
            }
            (Value::Generator(gen), "close") => {
                arity(name, &args, 0, 0)?;
                self.close(gen).map(|()| Value::None)
            }

            _ => Err(EvalError::raise(
                ExceptionKind::AttributeError,
                format!("'{}' object has no attribute '{name}'", receiver.type_name()),
            )),
        }
    }
}

/// Stable sort by `<`, surfacing the first comparison failure.
fn sort_values(items: &mut [Value]) -> EvalResult<()> {
    let mut failure = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        match order(CmpOp::Lt, a, b) {
            Ok(ordering) => ordering,
            Err(err) => {
                failure = Some(err);
                Ordering::Equal
            }
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// `type(value)`. Types without a builtin type object get a bare class
/// object carrying just the name.
fn type_of(value: &Value) -> Value {
    let builtin = match value {
        Value::Bool(_) => Some(Builtin::Bool),
        Value::Int(_) => Some(Builtin::Int),
        Value::Str(_) => Some(Builtin::Str),
        Value::List(_) => Some(Builtin::List),
        Value::Tuple(_) => Some(Builtin::Tuple),
        Value::Dict(_) => Some(Builtin::Dict),
        Value::Set(_) => Some(Builtin::Set),
        _ => None,
    };
    match (builtin, value) {
        (Some(b), _) => Value::Callable(Callable::Builtin(b)),
        (None, Value::Exception(exc)) => Value::Callable(Callable::ExceptionType(exc.kind)),
        (None, other) => Value::Class(Rc::new(ClassObject {
            name: other.type_name().to_string(),
            namespace: Environment::global(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvalConfig;
    use crate::error::Exception;

    fn ev() -> Evaluator {
        Evaluator::new(EvalConfig::default())
    }

    fn ints(ns: &[i64]) -> Value {
        Value::list(ns.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn names_round_trip() {
        for b in Builtin::ALL {
            assert_eq!(Builtin::from_name(b.name()), Some(b));
        }
    }

    #[test]
    fn print_joins_with_spaces() {
        let mut ev = ev();
        ev.call_builtin(Builtin::Print, vec![Value::str("a"), Value::Int(1), Value::None])
            .unwrap();
        assert_eq!(ev.trace.lines(), ["a 1 None"]);
    }

    #[test]
    fn range_forms() {
        let mut ev = ev();
        let r = ev.call_builtin(Builtin::Range, vec![Value::Int(3)]).unwrap();
        assert_eq!(r, ints(&[0, 1, 2]));
        let r = ev
            .call_builtin(Builtin::Range, vec![Value::Int(5), Value::Int(0), Value::Int(-2)])
            .unwrap();
        assert_eq!(r, ints(&[5, 3, 1]));
        let err = ev
            .call_builtin(Builtin::Range, vec![Value::Int(0), Value::Int(1), Value::Int(0)])
            .unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::ValueError));
    }

    #[test]
    fn sorted_min_max() {
        let mut ev = ev();
        let items = ints(&[3, 1, 2]);
        assert_eq!(ev.call_builtin(Builtin::Sorted, vec![items.clone()]).unwrap(), ints(&[1, 2, 3]));
        assert_eq!(ev.call_builtin(Builtin::Min, vec![items.clone()]).unwrap(), Value::Int(1));
        assert_eq!(
            ev.call_builtin(Builtin::Max, vec![Value::Int(4), Value::Int(9)]).unwrap(),
            Value::Int(9)
        );
        let mixed = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert!(ev.call_builtin(Builtin::Sorted, vec![mixed]).is_err());
    }

    #[test]
    fn len_rejects_ints() {
        let err = ev().call_builtin(Builtin::Len, vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: object of type 'int' has no len()");
    }

    #[test]
    fn str_methods() {
        let mut ev = ev();
        let s = Value::str("hello");
        assert_eq!(ev.call_method(&s, "count", vec![Value::str("l")]).unwrap(), Value::Int(2));
        assert_eq!(ev.call_method(&s, "upper", vec![]).unwrap(), Value::str("HELLO"));
        let joined = ev
            .call_method(&Value::str(", "), "join", vec![Value::list(vec![Value::str("a"), Value::str("b")])])
            .unwrap();
        assert_eq!(joined, Value::str("a, b"));
    }

    #[test]
    fn dict_get_with_default() {
        let mut ev = ev();
        let d = Value::dict(vec![(Value::str("a"), Value::Int(1))]).unwrap();
        assert_eq!(ev.call_method(&d, "get", vec![Value::str("a")]).unwrap(), Value::Int(1));
        assert_eq!(
            ev.call_method(&d, "get", vec![Value::str("z"), Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn set_remove_missing_is_key_error() {
        let mut ev = ev();
        let s = Value::set(vec![Value::Int(1)]).unwrap();
        ev.call_method(&s, "discard", vec![Value::Int(5)]).unwrap();
        let err = ev.call_method(&s, "remove", vec![Value::Int(5)]).unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::KeyError));
    }

    #[test]
    fn type_name_of_values() {
        let mut ev = ev();
        let t = ev.call_builtin(Builtin::Type, vec![Value::Int(1)]).unwrap();
        assert_eq!(ev.get_attr(&t, "__name__").unwrap(), Value::str("int"));
        let exc = Value::exception(Exception::new(ExceptionKind::KeyError));
        let t = ev.call_builtin(Builtin::Type, vec![exc]).unwrap();
        assert_eq!(ev.get_attr(&t, "__name__").unwrap(), Value::str("KeyError"));
        let t = ev.call_builtin(Builtin::Type, vec![Value::None]).unwrap();
        assert_eq!(ev.get_attr(&t, "__name__").unwrap(), Value::str("NoneType"));
    }
}
