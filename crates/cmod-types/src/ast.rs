//! AST of a module description file.
//!
//! A description file is a restricted Python module: top-level assignments of
//! literals, `const()` integers, dictionaries and tuples, plus `def` stubs for
//! natively implemented functions. Every node carries a [`Span`]; nodes keep
//! source order.

use crate::Span;

/// A parsed description file.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

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

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `NAME = value`
    Assign(Assign),
    /// `def NAME(params): ...`
    Function(FunctionDecl),
    /// `import x` / `from x import y, z`
    Import(ImportStmt),
    /// A bare string expression statement.
    Docstring(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Assign(a) => a.span,
            Stmt::Function(f) => f.span,
            Stmt::Import(i) => i.span,
            Stmt::Docstring(span) => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub target: Ident,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub span: Span,
}

impl FunctionDecl {
    /// Whether every parameter is a plain positional one.
    pub fn is_fixed_arity(&self) -> bool {
        self.params.iter().all(|p| p.kind == ParamKind::Positional)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `a`
    Positional,
    /// `a=1`
    Default,
    /// `*args`
    VarArgs,
    /// `**kwargs`
    KwArgs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportStmt {
    pub module: String,
    pub names: Vec<String>,
    pub span: Span,
}

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
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    /// Reference to another top-level name.
    Name(String),
    /// `const(<int>)`
    Const(Box<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<DictEntry>),
}

impl ExprKind {
    /// Short noun used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::Int(_) => "integer",
            ExprKind::Float(_) => "float",
            ExprKind::Str(_) => "string",
            ExprKind::Bool(_) => "boolean",
            ExprKind::None => "None",
            ExprKind::Name(_) => "name",
            ExprKind::Const(_) => "const()",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::Dict(_) => "dictionary",
        }
    }
}

/// `key: value` inside a dictionary literal.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    pub key: Expr,
    pub value: Expr,
    pub span: Span,
}
