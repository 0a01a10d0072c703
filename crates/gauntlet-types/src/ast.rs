//! Syntax tree consumed by the evaluator.
//!
//! Every node carries a [`Span`]. Statement lists are reference-counted
//! ([`Block`]) so a suspended generator can keep a cursor into a block
//! without cloning it. Large recursive variants are boxed.

use crate::Span;
use std::rc::Rc;

// ══════════════════════════════════════════════════════════════════════════════
// Top Level
// ══════════════════════════════════════════════════════════════════════════════

/// A complete script: the module-level statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Block,
    pub span: Span,
}

/// A spanned identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// An indented statement suite.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Rc<[Stmt]>,
    pub span: Span,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>, span: Span) -> Self {
        Self {
            stmts: stmts.into(),
            span,
        }
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Stmt> {
        self.stmts.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stmt> {
        self.stmts.iter()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A bare expression; its value is discarded unless last in the program.
    Expr(ExprStmt),
    /// `a = b = value`
    Assign(AssignStmt),
    /// `target += value` and friends
    AugAssign(AugAssignStmt),
    /// `if cond: ... [else: ...]`; `elif` is an `If` inside the else block.
    If(IfStmt),
    /// `while cond: ... [else: ...]`
    While(WhileStmt),
    /// `for target in iterable: ... [else: ...]`
    For(ForStmt),
    /// `def name(params): ...`
    FunctionDef(FunctionDef),
    /// `class Name: ...`
    ClassDef(ClassDef),
    /// `return [value]`
    Return(ReturnStmt),
    /// `try: ... except ...: ... else: ... finally: ...`
    Try(TryStmt),
    /// `raise [exc]`
    Raise(RaiseStmt),
    /// `match subject: case ...`
    Match(MatchStmt),
    Break(Span),
    Continue(Span),
    Pass(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::AugAssign(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::FunctionDef(s) => s.span,
            Stmt::ClassDef(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::Raise(s) => s.span,
            Stmt::Match(s) => s.span,
            Stmt::Break(span) | Stmt::Continue(span) | Stmt::Pass(span) => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

/// `t1 = t2 = value`: targets are assigned left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub targets: Vec<Expr>,
    pub value: Expr,
    pub span: Span,
}

/// `target op= value`. The target is a name, attribute or subscript.
#[derive(Debug, Clone, PartialEq)]
pub struct AugAssignStmt {
    pub target: Expr,
    pub op: BinOp,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Block,
    pub else_block: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    /// A name, or a tuple/list of targets to unpack into.
    pub target: Expr,
    pub iterable: Expr,
    pub body: Block,
    pub else_block: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

/// A positional parameter, optionally with a default evaluated at definition time.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: Ident,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Block,
    pub handlers: Vec<ExceptHandler>,
    pub else_block: Option<Block>,
    pub finally_block: Option<Block>,
    pub span: Span,
}

/// `except [Type [as name]]: body`. A missing type catches everything.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub exc_type: Option<Expr>,
    pub name: Option<Ident>,
    pub body: Block,
    pub span: Span,
}

/// `raise exc`, or a bare `raise` re-raising the exception being handled.
#[derive(Debug, Clone, PartialEq)]
pub struct RaiseStmt {
    pub exc: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchStmt {
    pub subject: Expr,
    pub cases: Vec<MatchCase>,
    pub span: Span,
}

/// `case pattern [if guard]: body`
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Block,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Patterns
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// `0 | 1 | "x"`: matches if the subject equals any literal.
    LiteralSet(Vec<Literal>),
    /// `[a, b]` / `(a, b)`: a list or tuple of exactly this many elements.
    Sequence(Vec<Ident>),
    /// `name`: always matches and binds the subject.
    Capture(Ident),
    /// `_`
    Wildcard,
}

/// A literal allowed in patterns.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Str(String),
    Bool(bool),
    None,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // ── Literals ──
    IntLit(i64),
    StrLit(String),
    BoolLit(bool),
    NoneLit,
    /// `f"load {val}"`
    FString(Vec<FStringPart>),

    // ── Displays ──
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<DictEntry>),
    Set(Vec<Expr>),

    // ── Names & access ──
    Name(String),
    Attribute {
        object: Box<Expr>,
        attr: Ident,
    },
    Subscript {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },

    // ── Operators ──
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// `a and b`, `a or b`: short-circuit, evaluates to an operand.
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `a < b <= c`: one left operand followed by (op, operand) links.
    Compare {
        left: Box<Expr>,
        comparisons: Vec<Comparison>,
    },
    /// `then if cond else otherwise`
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    Lambda(Box<LambdaExpr>),
    Comprehension(Box<Comprehension>),
    /// `yield [value]`
    Yield(Option<Box<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: CmpOp,
    pub operand: Expr,
}

/// `lambda params: body`
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExpr {
    pub params: Vec<Param>,
    pub body: Expr,
    pub span: Span,
}

/// `[elt for target in iterable if cond ...]` and its set/dict/generator forms.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub kind: ComprehensionKind,
    /// Never empty. `clauses[0].iterable` is the outer iterable.
    pub clauses: Vec<CompClause>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComprehensionKind {
    List(Expr),
    Set(Expr),
    Dict { key: Expr, value: Expr },
    Generator(Expr),
}

/// `for target in iterable if cond1 if cond2`
#[derive(Debug, Clone, PartialEq)]
pub struct CompClause {
    pub target: Expr,
    pub iterable: Expr,
    pub conditions: Vec<Expr>,
    pub span: Span,
}

// ── Operators ─────────────────────────────────────────────────────────────────

/// Arithmetic and bitwise operators; also the operator of an augmented assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
    Pow,
    BitOr,
    BitAnd,
    BitXor,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitOr => "|",
            BinOp::BitAnd => "&",
            BinOp::BitXor => "^",
        }
    }

    /// The augmented spelling, `+=` for `Add`.
    pub fn augmented(&self) -> String {
        format!("{}=", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Lt,
    LtE,
    Gt,
    GtE,
    Eq,
    NotEq,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}
