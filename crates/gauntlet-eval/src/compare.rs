//! Chained comparisons.
//!
//! `a < b < c` evaluates each operand at most once, left to right, and stops
//! at the first link that is false: operands after it are never evaluated.

use crate::env::Env;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::ops;
use crate::value::Value;
use gauntlet_types::ast::{CmpOp, Comparison, Expr};

impl Evaluator {
    pub fn eval_compare(
        &mut self,
        left: &Expr,
        comparisons: &[Comparison],
        env: &Env,
    ) -> EvalResult<Value> {
        let mut lhs = self.eval_expr(left, env)?;
        for link in comparisons {
            let rhs = self.eval_expr(&link.operand, env)?;
            if !self.compare_pair(link.op, &lhs, &rhs)? {
                return Ok(Value::Bool(false));
            }
            // the middle operand is reused, not re-evaluated
            lhs = rhs;
        }
        Ok(Value::Bool(true))
    }

    /// One comparison link. Membership in a generator consumes it up to the
    /// first match.
    pub fn compare_pair(&mut self, op: CmpOp, lhs: &Value, rhs: &Value) -> EvalResult<bool> {
        match (op, rhs) {
            (CmpOp::In | CmpOp::NotIn, Value::Generator(gen)) => {
                let mut found = false;
                while let Some(item) = self.next_item(gen)? {
                    self.tick()?;
                    if item == *lhs {
                        found = true;
                        break;
                    }
                }
                Ok(found == (op == CmpOp::In))
            }
            _ => ops::compare(op, lhs, rhs),
        }
    }
}

/// Shorthand used by `sorted`, `min` and `max`.
pub(crate) fn less_than(a: &Value, b: &Value) -> Result<bool, EvalError> {
    ops::compare(CmpOp::Lt, a, b)
}

#[cfg(test)]
mod tests {
    use crate::config::EvalConfig;
    use crate::env::Environment;
    use crate::evaluator::Evaluator;
    use crate::value::Value;
    use gauntlet_types::ast::CmpOp;
    use gauntlet_types::builder as b;

    fn load(n: i64) -> gauntlet_types::ast::Expr {
        b::call_name("load", vec![b::int(n)])
    }

    /// `def load(v): print(f"load {v}"); return v`
    fn loader() -> gauntlet_types::ast::Stmt {
        b::def(
            "load",
            vec![b::param("v")],
            vec![
                b::print(vec![b::fstring(vec![b::text("load "), b::interp(b::name("v"))])]),
                b::return_(Some(b::name("v"))),
            ],
        )
    }

    fn eval(chain: gauntlet_types::ast::Expr) -> (Value, Vec<String>) {
        let mut ev = Evaluator::new(EvalConfig::default());
        let env = Environment::global();
        let program = b::program(vec![loader(), b::expr_stmt(chain)]);
        let value = ev.exec_module(&program.body, &env).unwrap();
        (value, ev.trace.take())
    }

    #[test]
    fn true_chain_evaluates_every_operand_once() {
        let (value, lines) = eval(b::compare(
            load(1),
            vec![(CmpOp::Lt, load(2)), (CmpOp::Lt, load(3))],
        ));
        assert_eq!(value, Value::Bool(true));
        assert_eq!(lines, ["load 1", "load 2", "load 3"]);
    }

    #[test]
    fn false_link_short_circuits() {
        let (value, lines) = eval(b::compare(
            load(3),
            vec![(CmpOp::Lt, load(2)), (CmpOp::Lt, load(1))],
        ));
        assert_eq!(value, Value::Bool(false));
        assert_eq!(lines, ["load 3", "load 2"]);
    }

    #[test]
    fn failing_first_link_skips_everything_after() {
        let (value, lines) = eval(b::compare(
            load(5),
            vec![
                (CmpOp::Eq, load(6)),
                (CmpOp::Eq, b::name("never_defined")),
            ],
        ));
        assert_eq!(value, Value::Bool(false));
        assert_eq!(lines, ["load 5", "load 6"]);
    }

    #[test]
    fn membership_in_a_generator() {
        let mut ev = Evaluator::new(EvalConfig::default());
        let env = Environment::global();
        let program = b::program(vec![b::expr_stmt(b::compare(
            b::int(3),
            vec![(
                CmpOp::In,
                b::gen_exp(
                    b::name("x"),
                    vec![b::clause(b::name("x"), b::list(vec![b::int(1), b::int(3)]), vec![])],
                ),
            )],
        ))]);
        assert_eq!(ev.exec_module(&program.body, &env).unwrap(), Value::Bool(true));
    }
}
