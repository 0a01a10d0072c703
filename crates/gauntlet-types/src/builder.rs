//! Programmatic syntax-tree construction.
//!
//! Parsing is the host's job; hosts without a parser (and the test suites)
//! assemble programs with these helpers. Every node gets the synthetic span.

use crate::ast::*;
use crate::Span;

fn sp() -> Span {
    Span::default()
}

fn e(kind: ExprKind) -> Expr {
    Expr::new(kind, sp())
}

pub fn ident(name: impl Into<String>) -> Ident {
    Ident::new(name, sp())
}

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block::new(stmts, sp())
}

pub fn program(stmts: Vec<Stmt>) -> Program {
    Program {
        body: block(stmts),
        span: sp(),
    }
}

// ── Expressions ───────────────────────────────────────────────────────────────

pub fn int(n: i64) -> Expr {
    e(ExprKind::IntLit(n))
}

pub fn string(s: impl Into<String>) -> Expr {
    e(ExprKind::StrLit(s.into()))
}

pub fn boolean(b: bool) -> Expr {
    e(ExprKind::BoolLit(b))
}

pub fn none() -> Expr {
    e(ExprKind::NoneLit)
}

pub fn name(n: impl Into<String>) -> Expr {
    e(ExprKind::Name(n.into()))
}

pub fn fstring(parts: Vec<FStringPart>) -> Expr {
    e(ExprKind::FString(parts))
}

pub fn text(s: impl Into<String>) -> FStringPart {
    FStringPart::Literal(s.into())
}

pub fn interp(expr: Expr) -> FStringPart {
    FStringPart::Expr(expr)
}

pub fn list(items: Vec<Expr>) -> Expr {
    e(ExprKind::List(items))
}

pub fn tuple(items: Vec<Expr>) -> Expr {
    e(ExprKind::Tuple(items))
}

pub fn set(items: Vec<Expr>) -> Expr {
    e(ExprKind::Set(items))
}

pub fn dict(entries: Vec<(Expr, Expr)>) -> Expr {
    e(ExprKind::Dict(
        entries
            .into_iter()
            .map(|(key, value)| DictEntry { key, value })
            .collect(),
    ))
}

pub fn attr(object: Expr, attr: impl Into<String>) -> Expr {
    e(ExprKind::Attribute {
        object: Box::new(object),
        attr: ident(attr),
    })
}

pub fn subscript(object: Expr, index: Expr) -> Expr {
    e(ExprKind::Subscript {
        object: Box::new(object),
        index: Box::new(index),
    })
}

pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
    e(ExprKind::Call {
        func: Box::new(func),
        args,
    })
}

/// `name(args...)`
pub fn call_name(func: impl Into<String>, args: Vec<Expr>) -> Expr {
    call(name(func), args)
}

/// `object.method(args...)`
pub fn method(object: Expr, method: impl Into<String>, args: Vec<Expr>) -> Expr {
    call(attr(object, method), args)
}

pub fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    e(ExprKind::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
}

pub fn and(left: Expr, right: Expr) -> Expr {
    e(ExprKind::Logical {
        left: Box::new(left),
        op: LogicalOp::And,
        right: Box::new(right),
    })
}

pub fn or(left: Expr, right: Expr) -> Expr {
    e(ExprKind::Logical {
        left: Box::new(left),
        op: LogicalOp::Or,
        right: Box::new(right),
    })
}

pub fn not(operand: Expr) -> Expr {
    e(ExprKind::Unary {
        op: UnaryOp::Not,
        operand: Box::new(operand),
    })
}

pub fn neg(operand: Expr) -> Expr {
    e(ExprKind::Unary {
        op: UnaryOp::Neg,
        operand: Box::new(operand),
    })
}

/// `left op1 o1 op2 o2 ...`
pub fn compare(left: Expr, links: Vec<(CmpOp, Expr)>) -> Expr {
    e(ExprKind::Compare {
        left: Box::new(left),
        comparisons: links
            .into_iter()
            .map(|(op, operand)| Comparison { op, operand })
            .collect(),
    })
}

/// `then_expr if condition else else_expr`
pub fn conditional(condition: Expr, then_expr: Expr, else_expr: Expr) -> Expr {
    e(ExprKind::Conditional {
        condition: Box::new(condition),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
    })
}

pub fn lambda(params: Vec<Param>, body: Expr) -> Expr {
    e(ExprKind::Lambda(Box::new(LambdaExpr {
        params,
        body,
        span: sp(),
    })))
}

pub fn clause(target: Expr, iterable: Expr, conditions: Vec<Expr>) -> CompClause {
    CompClause {
        target,
        iterable,
        conditions,
        span: sp(),
    }
}

fn comprehension(kind: ComprehensionKind, clauses: Vec<CompClause>) -> Expr {
    e(ExprKind::Comprehension(Box::new(Comprehension {
        kind,
        clauses,
        span: sp(),
    })))
}

pub fn list_comp(elt: Expr, clauses: Vec<CompClause>) -> Expr {
    comprehension(ComprehensionKind::List(elt), clauses)
}

pub fn set_comp(elt: Expr, clauses: Vec<CompClause>) -> Expr {
    comprehension(ComprehensionKind::Set(elt), clauses)
}

pub fn dict_comp(key: Expr, value: Expr, clauses: Vec<CompClause>) -> Expr {
    comprehension(ComprehensionKind::Dict { key, value }, clauses)
}

pub fn gen_exp(elt: Expr, clauses: Vec<CompClause>) -> Expr {
    comprehension(ComprehensionKind::Generator(elt), clauses)
}

pub fn yield_value(value: Expr) -> Expr {
    e(ExprKind::Yield(Some(Box::new(value))))
}

pub fn yield_none() -> Expr {
    e(ExprKind::Yield(None))
}

// ── Statements ────────────────────────────────────────────────────────────────

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt { expr, span: sp() })
}

/// `print(args...)` as a statement.
pub fn print(args: Vec<Expr>) -> Stmt {
    expr_stmt(call_name("print", args))
}

/// `yield value` as a statement.
pub fn yield_stmt(value: Expr) -> Stmt {
    expr_stmt(yield_value(value))
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    assign_many(vec![target], value)
}

pub fn assign_many(targets: Vec<Expr>, value: Expr) -> Stmt {
    Stmt::Assign(AssignStmt {
        targets,
        value,
        span: sp(),
    })
}

/// `name = value`
pub fn let_(target: impl Into<String>, value: Expr) -> Stmt {
    assign(name(target), value)
}

pub fn aug_assign(target: Expr, op: BinOp, value: Expr) -> Stmt {
    Stmt::AugAssign(AugAssignStmt {
        target,
        op,
        value,
        span: sp(),
    })
}

pub fn if_(condition: Expr, then_block: Vec<Stmt>, else_block: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If(IfStmt {
        condition,
        then_block: block(then_block),
        else_block: else_block.map(block),
        span: sp(),
    })
}

pub fn while_(condition: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While(WhileStmt {
        condition,
        body: block(body),
        else_block: None,
        span: sp(),
    })
}

pub fn for_(target: Expr, iterable: Expr, body: Vec<Stmt>) -> Stmt {
    for_else(target, iterable, body, None)
}

pub fn for_else(
    target: Expr,
    iterable: Expr,
    body: Vec<Stmt>,
    else_block: Option<Vec<Stmt>>,
) -> Stmt {
    Stmt::For(ForStmt {
        target,
        iterable,
        body: block(body),
        else_block: else_block.map(block),
        span: sp(),
    })
}

pub fn param(n: impl Into<String>) -> Param {
    Param {
        name: ident(n),
        default: None,
        span: sp(),
    }
}

pub fn param_default(n: impl Into<String>, default: Expr) -> Param {
    Param {
        name: ident(n),
        default: Some(default),
        span: sp(),
    }
}

pub fn def(n: impl Into<String>, params: Vec<Param>, body: Vec<Stmt>) -> Stmt {
    Stmt::FunctionDef(FunctionDef {
        name: ident(n),
        params,
        body: block(body),
        span: sp(),
    })
}

pub fn class(n: impl Into<String>, body: Vec<Stmt>) -> Stmt {
    Stmt::ClassDef(ClassDef {
        name: ident(n),
        body: block(body),
        span: sp(),
    })
}

pub fn return_(value: Option<Expr>) -> Stmt {
    Stmt::Return(ReturnStmt { value, span: sp() })
}

pub fn handler(exc_type: Option<Expr>, bind: Option<&str>, body: Vec<Stmt>) -> ExceptHandler {
    ExceptHandler {
        exc_type,
        name: bind.map(ident),
        body: block(body),
        span: sp(),
    }
}

pub fn try_(
    body: Vec<Stmt>,
    handlers: Vec<ExceptHandler>,
    else_block: Option<Vec<Stmt>>,
    finally_block: Option<Vec<Stmt>>,
) -> Stmt {
    Stmt::Try(TryStmt {
        body: block(body),
        handlers,
        else_block: else_block.map(block),
        finally_block: finally_block.map(block),
        span: sp(),
    })
}

pub fn raise(exc: Option<Expr>) -> Stmt {
    Stmt::Raise(RaiseStmt { exc, span: sp() })
}

pub fn break_() -> Stmt {
    Stmt::Break(sp())
}

pub fn continue_() -> Stmt {
    Stmt::Continue(sp())
}

pub fn pass() -> Stmt {
    Stmt::Pass(sp())
}

// ── Match ─────────────────────────────────────────────────────────────────────

pub fn match_(subject: Expr, cases: Vec<MatchCase>) -> Stmt {
    Stmt::Match(MatchStmt {
        subject,
        cases,
        span: sp(),
    })
}

pub fn case(pattern: Pattern, body: Vec<Stmt>) -> MatchCase {
    MatchCase {
        pattern,
        guard: None,
        body: block(body),
        span: sp(),
    }
}

pub fn case_if(pattern: Pattern, guard: Expr, body: Vec<Stmt>) -> MatchCase {
    MatchCase {
        pattern,
        guard: Some(guard),
        body: block(body),
        span: sp(),
    }
}

fn pattern(kind: PatternKind) -> Pattern {
    Pattern { kind, span: sp() }
}

pub fn literals(values: Vec<Literal>) -> Pattern {
    pattern(PatternKind::LiteralSet(values))
}

pub fn sequence(names: &[&str]) -> Pattern {
    pattern(PatternKind::Sequence(names.iter().map(|n| ident(*n)).collect()))
}

pub fn capture(n: impl Into<String>) -> Pattern {
    pattern(PatternKind::Capture(ident(n)))
}

pub fn wildcard() -> Pattern {
    pattern(PatternKind::Wildcard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_compare_keeps_link_order() {
        let expr = compare(int(1), vec![(CmpOp::Lt, int(2)), (CmpOp::LtE, int(3))]);
        let ExprKind::Compare { comparisons, .. } = expr.kind else {
            panic!("expected a comparison");
        };
        let ops: Vec<_> = comparisons.iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![CmpOp::Lt, CmpOp::LtE]);
    }

    #[test]
    fn program_body_is_shared_not_copied() {
        let prog = program(vec![pass(), pass()]);
        let cursor = prog.body.clone();
        assert!(std::rc::Rc::ptr_eq(&prog.body.stmts, &cursor.stmts));
        assert_eq!(cursor.len(), 2);
    }

    #[test]
    fn sequence_pattern_preserves_names() {
        let p = sequence(&["a", "b"]);
        match p.kind {
            PatternKind::Sequence(names) => {
                let names: Vec<_> = names.iter().map(|i| i.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("unexpected pattern {other:?}"),
        }
    }

    #[test]
    fn built_nodes_are_synthetic() {
        assert!(print(vec![int(1)]).span().is_synthetic());
    }
}
