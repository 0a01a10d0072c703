//! Comprehensions and generator expressions.
//!
//! The outermost iterable is evaluated in the enclosing scope before the
//! comprehension's private scope exists, so it can see class-body names.
//! Everything else (the element, conditions, inner iterables) runs in the
//! private scope, whose lookups skip an enclosing class body.

use crate::env::{Env, Environment, ScopeKind};
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::generator::Generator;
use crate::iter::ValueIter;
use crate::value::Value;
use gauntlet_types::ast::*;
use gauntlet_types::Span;

/// Name the outer iterable is bound to inside a generator expression's scope.
/// Not a valid identifier, so user code cannot collide with it.
const OUTER_ITERABLE: &str = ".0";

/// Accumulated elements of an eager comprehension.
enum Collected {
    List(Vec<Value>),
    Set(Vec<Value>),
    Dict(Vec<(Value, Value)>),
}

impl Evaluator {
    pub(crate) fn eval_comprehension(&mut self, comp: &Comprehension, env: &Env) -> EvalResult<Value> {
        let Some((first, _)) = comp.clauses.split_first() else {
            return Err(EvalError::unsupported("comprehension without a 'for' clause"));
        };
        let outer = self.eval_expr(&first.iterable, env)?;
        let scope = Environment::child(env, ScopeKind::Comprehension);

        let mut out = match &comp.kind {
            ComprehensionKind::Generator(elt) => {
                // validates iterability up front
                ValueIter::new(&outer)?;
                scope.define(OUTER_ITERABLE, outer);
                let body = desugar_generator(elt, &comp.clauses, comp.span);
                return Ok(Value::Generator(Generator::new("<genexpr>".to_string(), body, scope)));
            }
            ComprehensionKind::List(_) => Collected::List(Vec::new()),
            ComprehensionKind::Set(_) => Collected::Set(Vec::new()),
            ComprehensionKind::Dict { .. } => Collected::Dict(Vec::new()),
        };

        self.run_clauses(&comp.clauses, Some(outer), &comp.kind, &scope, &mut out)?;

        match out {
            Collected::List(items) => Ok(Value::list(items)),
            Collected::Set(items) => Value::set(items),
            Collected::Dict(pairs) => Value::dict(pairs),
        }
    }

    /// Run the clause at the head of `clauses`, recursing into the rest for
    /// each accepted item. `outer` is the pre-evaluated first iterable.
    fn run_clauses(
        &mut self,
        clauses: &[CompClause],
        outer: Option<Value>,
        kind: &ComprehensionKind,
        scope: &Env,
        out: &mut Collected,
    ) -> EvalResult<()> {
        let Some((clause, rest)) = clauses.split_first() else {
            return self.collect_element(kind, scope, out);
        };
        let iterable = match outer {
            Some(value) => value,
            None => self.eval_expr(&clause.iterable, scope)?,
        };
        let mut iter = ValueIter::new(&iterable)?;
        'items: while let Some(item) = iter.next(self)? {
            self.tick()?;
            self.assign_target(&clause.target, item, scope)?;
            for condition in &clause.conditions {
                if !self.eval_expr(condition, scope)?.is_truthy() {
                    continue 'items;
                }
            }
            self.run_clauses(rest, None, kind, scope, out)?;
        }
        Ok(())
    }

    fn collect_element(
        &mut self,
        kind: &ComprehensionKind,
        scope: &Env,
        out: &mut Collected,
    ) -> EvalResult<()> {
        match (kind, out) {
            (ComprehensionKind::List(elt), Collected::List(items))
            | (ComprehensionKind::Set(elt), Collected::Set(items)) => {
                items.push(self.eval_expr(elt, scope)?);
            }
            (ComprehensionKind::Dict { key, value }, Collected::Dict(pairs)) => {
                let key = self.eval_expr(key, scope)?;
                let value = self.eval_expr(value, scope)?;
                pairs.push((key, value));
            }
            _ => return Err(EvalError::unsupported("mismatched comprehension accumulator")),
        }
        Ok(())
    }
}

/// Rewrite `(elt for t in it if c ...)` as the body of a generator function:
/// nested `for`/`if` statements around `yield elt`, with the first iterable
/// read from [`OUTER_ITERABLE`].
fn desugar_generator(elt: &Expr, clauses: &[CompClause], span: Span) -> Block {
    let mut body = vec![Stmt::Expr(ExprStmt {
        expr: Expr::new(ExprKind::Yield(Some(Box::new(elt.clone()))), elt.span),
        span: elt.span,
    })];
    for (index, clause) in clauses.iter().enumerate().rev() {
        for condition in clause.conditions.iter().rev() {
            body = vec![Stmt::If(IfStmt {
                condition: condition.clone(),
                then_block: Block::new(body, clause.span),
                else_block: None,
                span: clause.span,
            })];
        }
        let iterable = if index == 0 {
            Expr::new(ExprKind::Name(OUTER_ITERABLE.to_string()), clause.span)
        } else {
            clause.iterable.clone()
        };
        body = vec![Stmt::For(ForStmt {
            target: clause.target.clone(),
            iterable,
            body: Block::new(body, clause.span),
            else_block: None,
            span: clause.span,
        })];
    }
    Block::new(body, span)
}
