//! Assignment and augmented assignment.
//!
//! `target op= value` resolves the target once, computes the new value and
//! stores it back. When the current value can combine in place (list `+=`,
//! set `|=`, ...) the mutation happens first and the store writes the same
//! object back. The store can still fail, as with an item of a tuple: the
//! error reaches the caller but the mutation stays visible to every holder.

use crate::env::Env;
use crate::error::{EvalError, EvalResult, ExceptionKind};
use crate::evaluator::Evaluator;
use crate::ops;
use crate::value::Value;
use gauntlet_types::ast::{AssignStmt, AugAssignStmt, BinOp, Expr, ExprKind};

/// A resolved store location. Object and key are evaluated exactly once.
enum Slot {
    Name(String),
    Attribute { object: Value, attr: String },
    Item { container: Value, key: Value },
}

impl Evaluator {
    pub(crate) fn exec_assign(&mut self, stmt: &AssignStmt, env: &Env) -> EvalResult<()> {
        let value = self.eval_expr(&stmt.value, env)?;
        self.assign_targets(&stmt.targets, value, env)
    }

    /// `t1 = t2 = value`, left to right.
    pub(crate) fn assign_targets(&mut self, targets: &[Expr], value: Value, env: &Env) -> EvalResult<()> {
        for target in targets {
            self.assign_target(target, value.clone(), env)?;
        }
        Ok(())
    }

    /// Bind `value` to a name, unpack it into a tuple/list of targets, or
    /// store it through an attribute or subscript.
    pub fn assign_target(&mut self, target: &Expr, value: Value, env: &Env) -> EvalResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                env.define(name, value);
                Ok(())
            }
            ExprKind::Tuple(targets) | ExprKind::List(targets) => {
                let items = self.collect_values(&value)?;
                if items.len() > targets.len() {
                    return Err(EvalError::raise(
                        ExceptionKind::ValueError,
                        format!("too many values to unpack (expected {})", targets.len()),
                    ));
                }
                if items.len() < targets.len() {
                    return Err(EvalError::raise(
                        ExceptionKind::ValueError,
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        ),
                    ));
                }
                for (t, item) in targets.iter().zip(items) {
                    self.assign_target(t, item, env)?;
                }
                Ok(())
            }
            ExprKind::Attribute { object, attr } => {
                let object = self.eval_expr(object, env)?;
                self.store_attr(&object, &attr.name, value)
            }
            ExprKind::Subscript { object, index } => {
                let container = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?;
                ops::set_item(&container, key, value)
            }
            _ => Err(EvalError::unsupported("cannot assign to expression")),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Augmented assignment
    // ══════════════════════════════════════════════════════════════════════

    pub(crate) fn exec_aug_assign(&mut self, stmt: &AugAssignStmt, env: &Env) -> EvalResult<()> {
        let slot = self.resolve_slot(&stmt.target, env)?;
        let current = self.load_slot(&slot, env)?;
        let rhs = self.eval_expr(&stmt.value, env)?;

        let result = if current.supports_inplace_combine(stmt.op) {
            self.combine_in_place(stmt.op, &current, &rhs)?;
            current
        } else {
            self.binary(stmt.op, &current, &rhs).map_err(|err| match err {
                EvalError::UnsupportedOperation(_) => EvalError::unsupported(format!(
                    "unsupported operand type(s) for {}: '{}' and '{}'",
                    stmt.op.augmented(),
                    current.type_name(),
                    rhs.type_name()
                )),
                other => other,
            })?
        };

        if let Err(err) = self.store_slot(slot, result, env) {
            tracing::debug!(op = %stmt.op.augmented(), error = %err, "augmented store failed");
            return Err(err);
        }
        Ok(())
    }

    fn resolve_slot(&mut self, target: &Expr, env: &Env) -> EvalResult<Slot> {
        match &target.kind {
            ExprKind::Name(name) => Ok(Slot::Name(name.clone())),
            ExprKind::Attribute { object, attr } => Ok(Slot::Attribute {
                object: self.eval_expr(object, env)?,
                attr: attr.name.clone(),
            }),
            ExprKind::Subscript { object, index } => {
                let container = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?;
                Ok(Slot::Item { container, key })
            }
            _ => Err(EvalError::unsupported(
                "illegal expression for augmented assignment",
            )),
        }
    }

    fn load_slot(&mut self, slot: &Slot, env: &Env) -> EvalResult<Value> {
        match slot {
            Slot::Name(name) => self.lookup_name(name, env),
            Slot::Attribute { object, attr } => self.get_attr(object, attr),
            Slot::Item { container, key } => ops::get_item(container, key),
        }
    }

    fn store_slot(&mut self, slot: Slot, value: Value, env: &Env) -> EvalResult<()> {
        match slot {
            Slot::Name(name) => {
                env.define(&name, value);
                Ok(())
            }
            Slot::Attribute { object, attr } => self.store_attr(&object, &attr, value),
            Slot::Item { container, key } => ops::set_item(&container, key, value),
        }
    }

    /// Mutate `target` with `rhs`. Visible through every alias as soon as
    /// this returns.
    fn combine_in_place(&mut self, op: BinOp, target: &Value, rhs: &Value) -> EvalResult<()> {
        match (target, op) {
            (Value::List(items), BinOp::Add) => {
                let extra = self.collect_values(rhs)?;
                items.borrow_mut().extend(extra);
                Ok(())
            }
            (Value::List(items), BinOp::Mul) => {
                let Some(times) = rhs.as_int() else {
                    return Err(EvalError::unsupported(format!(
                        "can't multiply sequence by non-int of type '{}'",
                        rhs.type_name()
                    )));
                };
                let times = usize::try_from(times).unwrap_or(0);
                let total = ops::repeat_len(BinOp::Mul, target, rhs)?.unwrap_or(0);
                self.charge(u64::try_from(total).unwrap_or(u64::MAX))?;
                let original = items.borrow().clone();
                let mut items = items.borrow_mut();
                items.clear();
                for _ in 0..times {
                    items.extend(original.iter().cloned());
                }
                Ok(())
            }
            (Value::Set(set), _) => {
                let Value::Set(other) = rhs else {
                    return Err(inplace_mismatch(op, target, rhs));
                };
                let combined = ops::set_algebra(op, &set.borrow(), &other.borrow());
                *set.borrow_mut() = combined;
                Ok(())
            }
            (Value::Dict(map), BinOp::BitOr) => {
                let Value::Dict(other) = rhs else {
                    return Err(inplace_mismatch(op, target, rhs));
                };
                let entries: Vec<_> = other
                    .borrow()
                    .iter()
                    .map(|(k, entry)| (k.clone(), entry.clone()))
                    .collect();
                let mut map = map.borrow_mut();
                for (k, (key, value)) in entries {
                    match map.get_mut(&k) {
                        Some((_, slot)) => *slot = value,
                        None => {
                            map.insert(k, (key, value));
                        }
                    }
                }
                Ok(())
            }
            _ => Err(inplace_mismatch(op, target, rhs)),
        }
    }
}

fn inplace_mismatch(op: BinOp, l: &Value, r: &Value) -> EvalError {
    EvalError::unsupported(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.augmented(),
        l.type_name(),
        r.type_name()
    ))
}
