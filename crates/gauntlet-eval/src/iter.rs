//! Iteration over values.

use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::generator::Generator;
use crate::value::{ListRef, Value};

/// A cursor over an iterable value.
///
/// Lists are walked live, so appending during a `for` loop extends it.
/// Strings, tuples, dicts and sets are snapshotted when iteration starts.
pub enum ValueIter {
    List { items: ListRef, index: usize },
    Snapshot(std::vec::IntoIter<Value>),
    Generator(Generator),
}

impl ValueIter {
    pub fn new(value: &Value) -> EvalResult<Self> {
        Ok(match value {
            Value::List(items) => Self::List {
                items: items.clone(),
                index: 0,
            },
            Value::Tuple(items) => Self::Snapshot(items.to_vec().into_iter()),
            Value::Str(s) => Self::Snapshot(
                s.chars()
                    .map(|c| Value::str(c.to_string()))
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Value::Dict(map) => Self::Snapshot(
                map.borrow()
                    .values()
                    .map(|(k, _)| k.clone())
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Value::Set(map) => {
                Self::Snapshot(map.borrow().values().cloned().collect::<Vec<_>>().into_iter())
            }
            Value::Generator(gen) => Self::Generator(gen.clone()),
            other => {
                return Err(EvalError::unsupported(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
        })
    }

    /// The next item, or `None` once exhausted. Advancing a generator runs
    /// its body up to the next yield.
    pub fn next(&mut self, ev: &mut Evaluator) -> EvalResult<Option<Value>> {
        match self {
            Self::List { items, index } => {
                let item = items.borrow().get(*index).cloned();
                if item.is_some() {
                    *index += 1;
                }
                Ok(item)
            }
            Self::Snapshot(items) => Ok(items.next()),
            Self::Generator(gen) => ev.next_item(gen),
        }
    }
}

impl Evaluator {
    /// Drain an iterable into a vector.
    pub fn collect_values(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        match value {
            Value::List(items) => return Ok(items.borrow().clone()),
            Value::Tuple(items) => return Ok(items.to_vec()),
            _ => {}
        }
        let mut iter = ValueIter::new(value)?;
        let mut out = Vec::new();
        while let Some(item) = iter.next(self)? {
            self.tick()?;
            out.push(item);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvalConfig;

    #[test]
    fn list_iteration_observes_appends() {
        let mut ev = Evaluator::new(EvalConfig::default());
        let list = Value::list(vec![Value::Int(1)]);
        let mut iter = ValueIter::new(&list).unwrap();
        assert_eq!(iter.next(&mut ev).unwrap(), Some(Value::Int(1)));
        if let Value::List(items) = &list {
            items.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(iter.next(&mut ev).unwrap(), Some(Value::Int(2)));
        assert_eq!(iter.next(&mut ev).unwrap(), None);
    }

    #[test]
    fn dict_iterates_keys_in_insertion_order() {
        let mut ev = Evaluator::new(EvalConfig::default());
        let d = Value::dict(vec![
            (Value::str("b"), Value::Int(1)),
            (Value::str("a"), Value::Int(2)),
        ])
        .unwrap();
        assert_eq!(
            ev.collect_values(&d).unwrap(),
            vec![Value::str("b"), Value::str("a")]
        );
    }

    #[test]
    fn ints_are_not_iterable() {
        let err = ValueIter::new(&Value::Int(3)).err().unwrap();
        assert_eq!(err.to_string(), "TypeError: 'int' object is not iterable");
    }
}
