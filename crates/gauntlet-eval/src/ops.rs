//! Operator semantics of the built-in types.
//!
//! Pure functions over values: arithmetic, ordering, membership and item
//! access. Anything that needs to run code (iterating a generator) lives on
//! the evaluator instead.

use crate::error::{EvalError, EvalResult, ExceptionKind};
use crate::value::{HashKey, Value};
use gauntlet_types::ast::{BinOp, CmpOp};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

fn overflow() -> EvalError {
    EvalError::raise(ExceptionKind::OverflowError, "integer overflow")
}

fn unsupported_operands(op: &str, l: &Value, r: &Value) -> EvalError {
    EvalError::unsupported(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        l.type_name(),
        r.type_name()
    ))
}

/// `l op r`, always producing a fresh value.
pub fn binary_op(op: BinOp, l: &Value, r: &Value) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (l.as_int(), r.as_int()) {
        // bool & bool stays bool
        if let (Value::Bool(x), Value::Bool(y)) = (l, r) {
            match op {
                BinOp::BitAnd => return Ok(Value::Bool(*x & *y)),
                BinOp::BitOr => return Ok(Value::Bool(*x | *y)),
                BinOp::BitXor => return Ok(Value::Bool(*x ^ *y)),
                _ => {}
            }
        }
        return int_op(op, a, b).map(Value::Int);
    }
    repeat_len(op, l, r)?;

    match (op, l, r) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_int().is_some() => {
            let times = repeat_count(n);
            Ok(Value::str(s.repeat(times)))
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items))
            if n.as_int().is_some() =>
        {
            Ok(Value::list(repeat_items(&items.borrow(), repeat_count(n))))
        }
        (BinOp::Mul, Value::Tuple(items), n) | (BinOp::Mul, n, Value::Tuple(items))
            if n.as_int().is_some() =>
        {
            Ok(Value::tuple(repeat_items(items, repeat_count(n))))
        }
        (BinOp::BitOr | BinOp::BitAnd | BinOp::Sub | BinOp::BitXor, Value::Set(a), Value::Set(b)) => {
            let result = set_algebra(op, &a.borrow(), &b.borrow());
            Ok(Value::Set(Rc::new(RefCell::new(result))))
        }
        (BinOp::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged = a.borrow().clone();
            for (k, entry) in b.borrow().iter() {
                merged.insert(k.clone(), entry.clone());
            }
            Ok(Value::Dict(Rc::new(RefCell::new(merged))))
        }
        _ => Err(unsupported_operands(op.as_str(), l, r)),
    }
}

/// Longest result sequence repetition may build, in items (bytes for `str`).
const MAX_REPEAT_LEN: usize = 1 << 32;

/// Size of the value `l * r` builds when it repeats a sequence, `None` for
/// any other operation. Fails before anything is allocated when the result
/// would be too long.
pub fn repeat_len(op: BinOp, l: &Value, r: &Value) -> EvalResult<Option<usize>> {
    if op != BinOp::Mul {
        return Ok(None);
    }
    let (len, n, what) = match (l, r) {
        (Value::Str(s), n) | (n, Value::Str(s)) if n.as_int().is_some() => (s.len(), n, "string"),
        (Value::List(items), n) | (n, Value::List(items)) if n.as_int().is_some() => {
            (items.borrow().len(), n, "list")
        }
        (Value::Tuple(items), n) | (n, Value::Tuple(items)) if n.as_int().is_some() => {
            (items.len(), n, "tuple")
        }
        _ => return Ok(None),
    };
    len.checked_mul(repeat_count(n))
        .filter(|total| *total <= MAX_REPEAT_LEN)
        .map(Some)
        .ok_or_else(|| {
            EvalError::raise(ExceptionKind::OverflowError, format!("repeated {what} is too long"))
        })
}

fn repeat_count(n: &Value) -> usize {
    n.as_int().map_or(0, |n| usize::try_from(n).unwrap_or(0))
}

fn repeat_items(items: &[Value], times: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend(items.iter().cloned());
    }
    out
}

fn int_op(op: BinOp, a: i64, b: i64) -> EvalResult<i64> {
    match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow),
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow),
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow),
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(EvalError::raise(
                    ExceptionKind::ZeroDivisionError,
                    "integer division or modulo by zero",
                ));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(q - 1)
            } else {
                Ok(q)
            }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(EvalError::raise(
                    ExceptionKind::ZeroDivisionError,
                    "integer division or modulo by zero",
                ));
            }
            if b == -1 {
                return Ok(0);
            }
            let r = a % b;
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(r + b)
            } else {
                Ok(r)
            }
        }
        BinOp::Pow => {
            let exp = u32::try_from(b).map_err(|_| {
                EvalError::raise(
                    ExceptionKind::ValueError,
                    "negative exponents are not supported for integers",
                )
            })?;
            a.checked_pow(exp).ok_or_else(overflow)
        }
        BinOp::BitOr => Ok(a | b),
        BinOp::BitAnd => Ok(a & b),
        BinOp::BitXor => Ok(a ^ b),
    }
}

/// Set union/intersection/difference/symmetric difference, preserving the
/// left operand's order first.
pub fn set_algebra(
    op: BinOp,
    a: &IndexMap<HashKey, Value>,
    b: &IndexMap<HashKey, Value>,
) -> IndexMap<HashKey, Value> {
    match op {
        BinOp::BitOr => {
            let mut out = a.clone();
            for (k, v) in b {
                out.entry(k.clone()).or_insert_with(|| v.clone());
            }
            out
        }
        BinOp::BitAnd => a
            .iter()
            .filter(|(k, _)| b.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        BinOp::Sub => a
            .iter()
            .filter(|(k, _)| !b.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        _ => {
            let mut out: IndexMap<HashKey, Value> = a
                .iter()
                .filter(|(k, _)| !b.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (k, v) in b {
                if !a.contains_key(k) {
                    out.insert(k.clone(), v.clone());
                }
            }
            out
        }
    }
}

pub fn negate(v: &Value) -> EvalResult<Value> {
    match v.as_int() {
        Some(n) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        None => Err(EvalError::unsupported(format!(
            "bad operand type for unary -: '{}'",
            v.type_name()
        ))),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Comparison
// ══════════════════════════════════════════════════════════════════════════════

/// Total order used by `<`-style comparisons and `sorted`.
pub fn order(op: CmpOp, l: &Value, r: &Value) -> EvalResult<Ordering> {
    if let (Some(a), Some(b)) = (l.as_int(), r.as_int()) {
        return Ok(a.cmp(&b));
    }
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => order_items(op, &a.borrow(), &b.borrow()),
        (Value::Tuple(a), Value::Tuple(b)) => order_items(op, a, b),
        _ => Err(EvalError::unsupported(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.as_str(),
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn order_items(op: CmpOp, a: &[Value], b: &[Value]) -> EvalResult<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        if x != y {
            return order(op, x, y);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Apply one relational operator. Membership against generators is handled
/// by the evaluator before reaching here.
pub fn compare(op: CmpOp, l: &Value, r: &Value) -> EvalResult<bool> {
    Ok(match op {
        CmpOp::Eq => l == r,
        CmpOp::NotEq => l != r,
        CmpOp::Is => l.is_same(r),
        CmpOp::IsNot => !l.is_same(r),
        CmpOp::In => contains(r, l)?,
        CmpOp::NotIn => !contains(r, l)?,
        CmpOp::Lt => order(op, l, r)? == Ordering::Less,
        CmpOp::LtE => order(op, l, r)? != Ordering::Greater,
        CmpOp::Gt => order(op, l, r)? == Ordering::Greater,
        CmpOp::GtE => order(op, l, r)? != Ordering::Less,
    })
}

/// `item in container`
pub fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|v| v == item)),
        Value::Tuple(items) => Ok(items.iter().any(|v| v == item)),
        Value::Str(s) => match item {
            Value::Str(sub) => Ok(s.contains(&**sub)),
            other => Err(EvalError::unsupported(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Dict(map) => Ok(map.borrow().contains_key(&item.hash_key()?)),
        Value::Set(map) => Ok(map.borrow().contains_key(&item.hash_key()?)),
        other => Err(EvalError::unsupported(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Item access
// ══════════════════════════════════════════════════════════════════════════════

fn normalize_index(container: &Value, index: &Value, len: usize) -> EvalResult<Option<usize>> {
    let Some(i) = index.as_int() else {
        return Err(EvalError::unsupported(format!(
            "{} indices must be integers or slices, not {}",
            container.type_name(),
            index.type_name()
        )));
    };
    let len = i64::try_from(len).map_err(|_| overflow())?;
    let i = if i < 0 { i + len } else { i };
    Ok(if (0..len).contains(&i) {
        usize::try_from(i).ok()
    } else {
        None
    })
}

fn index_error(what: &str) -> EvalError {
    EvalError::raise(ExceptionKind::IndexError, format!("{what} index out of range"))
}

/// `container[key]`
pub fn get_item(container: &Value, key: &Value) -> EvalResult<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            normalize_index(container, key, items.len())?
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| index_error("list"))
        }
        Value::Tuple(items) => normalize_index(container, key, items.len())?
            .and_then(|i| items.get(i).cloned())
            .ok_or_else(|| index_error("tuple")),
        Value::Str(s) => {
            let count = s.chars().count();
            normalize_index(container, key, count)?
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::str(c.to_string()))
                .ok_or_else(|| index_error("string"))
        }
        Value::Dict(map) => map
            .borrow()
            .get(&key.hash_key()?)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| EvalError::raise(ExceptionKind::KeyError, key.repr())),
        other => Err(EvalError::unsupported(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `container[key] = value`. Immutable containers refuse with a TypeError.
pub fn set_item(container: &Value, key: Value, value: Value) -> EvalResult<()> {
    match container {
        Value::List(items) => {
            let len = items.borrow().len();
            let i = normalize_index(container, &key, len)?
                .ok_or_else(|| index_error("list assignment"))?;
            items.borrow_mut()[i] = value;
            Ok(())
        }
        Value::Dict(map) => {
            let hk = key.hash_key()?;
            let mut map = map.borrow_mut();
            match map.get_mut(&hk) {
                Some((_, slot)) => *slot = value,
                None => {
                    map.insert(hk, (key, value));
                }
            }
            Ok(())
        }
        other => Err(EvalError::unsupported(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    #[test]
    fn floor_division_and_modulo_follow_divisor_sign() {
        assert_eq!(binary_op(BinOp::FloorDiv, &int(-7), &int(2)).unwrap(), int(-4));
        assert_eq!(binary_op(BinOp::Mod, &int(-7), &int(2)).unwrap(), int(1));
        assert_eq!(binary_op(BinOp::Mod, &int(7), &int(-2)).unwrap(), int(-1));
        assert_eq!(binary_op(BinOp::Mod, &int(10), &int(2)).unwrap(), int(0));
    }

    #[test]
    fn min_int_modulo_minus_one_is_zero() {
        assert_eq!(binary_op(BinOp::Mod, &int(i64::MIN), &int(-1)).unwrap(), int(0));
        assert_eq!(binary_op(BinOp::Mod, &int(7), &int(-1)).unwrap(), int(0));
        let err = binary_op(BinOp::FloorDiv, &int(i64::MIN), &int(-1)).unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::OverflowError));
    }

    #[test]
    fn huge_repetition_fails_before_allocating() {
        let list = Value::list(vec![int(1), int(2), int(3), int(4)]);
        let err = binary_op(BinOp::Mul, &list, &int(1 << 62)).unwrap_err();
        assert_eq!(err.to_string(), "OverflowError: repeated list is too long");

        let err = binary_op(BinOp::Mul, &Value::str("ab"), &int(1 << 62)).unwrap_err();
        assert_eq!(err.to_string(), "OverflowError: repeated string is too long");

        let err = binary_op(BinOp::Mul, &int(1 << 40), &Value::tuple(vec![int(0)])).unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::OverflowError));
    }

    #[test]
    fn repeat_len_counts_result_items() {
        let list = Value::list(vec![int(1), int(2)]);
        assert_eq!(repeat_len(BinOp::Mul, &list, &int(3)).unwrap(), Some(6));
        assert_eq!(repeat_len(BinOp::Mul, &int(-2), &list).unwrap(), Some(0));
        assert_eq!(repeat_len(BinOp::Mul, &int(2), &int(3)).unwrap(), None);
        assert_eq!(repeat_len(BinOp::Add, &list, &list).unwrap(), None);
        assert_eq!(
            binary_op(BinOp::Mul, &Value::str("ab"), &int(3)).unwrap(),
            Value::str("ababab")
        );
    }

    #[test]
    fn division_by_zero_raises() {
        let err = binary_op(BinOp::FloorDiv, &int(1), &int(0)).unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::ZeroDivisionError));
    }

    #[test]
    fn overflow_is_an_exception_not_a_panic() {
        let err = binary_op(BinOp::Pow, &int(10), &int(40)).unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::OverflowError));
    }

    #[test]
    fn list_plus_builds_a_new_list() {
        let a = Value::list(vec![int(1)]);
        let b = Value::list(vec![int(2)]);
        let c = binary_op(BinOp::Add, &a, &b).unwrap();
        assert_eq!(c, Value::list(vec![int(1), int(2)]));
        assert!(!c.is_same(&a));
        assert_eq!(a, Value::list(vec![int(1)]));
    }

    #[test]
    fn mixed_operands_are_a_type_error() {
        let err = binary_op(BinOp::Add, &int(1), &Value::str("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
    }

    #[test]
    fn set_algebra_matches_expected_members() {
        let s1 = Value::set((1..=5).map(int).collect()).unwrap();
        let s2 = Value::set((4..=8).map(int).collect()).unwrap();
        let union = binary_op(BinOp::BitOr, &s1, &s2).unwrap();
        assert_eq!(union, Value::set((1..=8).map(int).collect()).unwrap());
        let inter = binary_op(BinOp::BitAnd, &s1, &s2).unwrap();
        assert_eq!(inter, Value::set(vec![int(4), int(5)]).unwrap());
        let diff = binary_op(BinOp::Sub, &s1, &s2).unwrap();
        assert_eq!(diff, Value::set(vec![int(1), int(2), int(3)]).unwrap());
        let sym = binary_op(BinOp::BitXor, &s1, &s2).unwrap();
        assert_eq!(
            sym,
            Value::set(vec![int(1), int(2), int(3), int(6), int(7), int(8)]).unwrap()
        );
    }

    #[test]
    fn sequence_ordering_is_lexicographic() {
        let a = Value::tuple(vec![int(1), int(2)]);
        let b = Value::tuple(vec![int(1), int(3)]);
        assert!(compare(CmpOp::Lt, &a, &b).unwrap());
        assert!(compare(CmpOp::Lt, &Value::str("apple"), &Value::str("b")).unwrap());
    }

    #[test]
    fn ordering_mismatched_types_fails() {
        let err = compare(CmpOp::Lt, &int(1), &Value::str("x")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: '<' not supported between instances of 'int' and 'str'"
        );
    }

    #[test]
    fn negative_indexing() {
        let list = Value::list(vec![int(1), int(2), int(3)]);
        assert_eq!(get_item(&list, &int(-1)).unwrap(), int(3));
        assert!(get_item(&list, &int(3)).unwrap_err().is_instance_of(ExceptionKind::IndexError));
    }

    #[test]
    fn tuple_refuses_item_assignment() {
        let t = Value::tuple(vec![int(1)]);
        let err = set_item(&t, int(0), int(2)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: 'tuple' object does not support item assignment"
        );
    }

    #[test]
    fn missing_dict_key_raises_key_error() {
        let d = Value::dict(vec![]).unwrap();
        let err = get_item(&d, &Value::str("k")).unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::KeyError));
        assert_eq!(err.to_string(), "KeyError: 'k'");
    }

    #[test]
    fn membership() {
        let s = Value::set(vec![int(2), int(3)]).unwrap();
        assert!(compare(CmpOp::In, &int(2), &s).unwrap());
        assert!(compare(CmpOp::NotIn, &int(10), &s).unwrap());
        assert!(compare(CmpOp::In, &Value::str("ell"), &Value::str("hello")).unwrap());
    }
}
