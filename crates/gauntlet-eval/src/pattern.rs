//! Structural pattern matching.
//!
//! Cases are tried strictly in source order. The first case whose pattern
//! matches and whose guard (if any) is truthy wins; later cases are never
//! examined. Bindings of a matched pattern are made before its guard runs.

use crate::env::Env;
use crate::error::EvalResult;
use crate::evaluator::Evaluator;
use crate::value::Value;
use gauntlet_types::ast::{Literal, MatchCase, MatchStmt, Pattern, PatternKind};

/// Test `subject` against `pattern`. `Some(bindings)` on a match.
///
/// `True`, `False` and `None` compare by identity, so `case True:` does not
/// match `1`. Ints and strings compare by equality.
pub fn match_pattern(pattern: &Pattern, subject: &Value) -> Option<Vec<(String, Value)>> {
    match &pattern.kind {
        PatternKind::Wildcard => Some(Vec::new()),
        PatternKind::Capture(name) => Some(vec![(name.name.clone(), subject.clone())]),
        PatternKind::LiteralSet(literals) => literals
            .iter()
            .any(|lit| literal_matches(lit, subject))
            .then(Vec::new),
        PatternKind::Sequence(names) => {
            let items: Vec<Value> = match subject {
                Value::List(items) => items.borrow().clone(),
                Value::Tuple(items) => items.to_vec(),
                _ => return None,
            };
            if items.len() != names.len() {
                return None;
            }
            Some(
                names
                    .iter()
                    .zip(items)
                    .filter(|(name, _)| name.name != "_")
                    .map(|(name, item)| (name.name.clone(), item))
                    .collect(),
            )
        }
    }
}

fn literal_matches(literal: &Literal, subject: &Value) -> bool {
    match literal {
        Literal::Int(n) => *subject == Value::Int(*n),
        Literal::Str(s) => *subject == Value::str(s.as_str()),
        Literal::Bool(b) => subject.is_same(&Value::Bool(*b)),
        Literal::None => subject.is_none(),
    }
}

impl Evaluator {
    /// Pick the case to run for `subject`, binding its captures into `env`.
    pub(crate) fn select_match_case<'m>(
        &mut self,
        stmt: &'m MatchStmt,
        subject: &Value,
        env: &Env,
    ) -> EvalResult<Option<&'m MatchCase>> {
        for (index, case) in stmt.cases.iter().enumerate() {
            let Some(bindings) = match_pattern(&case.pattern, subject) else {
                continue;
            };
            for (name, value) in bindings {
                env.define(&name, value);
            }
            if let Some(guard) = &case.guard {
                if !self.eval_expr(guard, env)?.is_truthy() {
                    continue;
                }
            }
            tracing::debug!(case = index, subject = %subject.repr(), "match case selected");
            return Ok(Some(case));
        }
        Ok(None)
    }

    pub(crate) fn exec_match(&mut self, stmt: &MatchStmt, env: &Env) -> EvalResult<()> {
        let subject = self.eval_expr(&stmt.subject, env)?;
        match self.select_match_case(stmt, &subject, env)? {
            Some(case) => self.exec_block(&case.body, env),
            None => Ok(()),
        }
    }
}
