//! Token types for the description-file lexer.

use cmod_types::Span;
use std::fmt;

/// Python keywords the description grammar reacts to.
///
/// Any other keyword is lexed as an identifier and rejected (or skipped) by
/// the parser.
pub const ALL_KEYWORDS: &[&str] = &[
    "def", "import", "from", "as", "pass", "True", "False", "None",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_keyword(&self) -> bool {
        self.kind.is_keyword()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────
    /// `42`, `0x2A`, `0b1010`, `1_000`
    IntLit(i64),
    /// `3.5`, `1e-3`
    FloatLit(f64),
    /// `'abc'`, `"abc"`, `"""abc"""` (escapes already resolved)
    StringLit(String),

    Identifier(String),

    // ── Keywords ─────────────────────────────────────────────
    Def,
    Import,
    From,
    As,
    Pass,
    True,
    False,
    None,

    // ── Operators & punctuation ──────────────────────────────
    Plus,
    Minus,
    Star,
    StarStar,
    /// `...`
    Ellipsis,
    /// `->`
    Arrow,
    /// `@`, decorators only
    At,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Eq,

    // ── Layout ───────────────────────────────────────────────
    /// End of a logical line. Never produced inside brackets.
    Newline,
    Eof,
}

impl TokenKind {
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "def" => TokenKind::Def,
            "import" => TokenKind::Import,
            "from" => TokenKind::From,
            "as" => TokenKind::As,
            "pass" => TokenKind::Pass,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            _ => return None,
        })
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Def
                | TokenKind::Import
                | TokenKind::From
                | TokenKind::As
                | TokenKind::Pass
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
        )
    }

    /// Whether this token opens a bracketed region.
    pub fn is_open_bracket(&self) -> bool {
        matches!(
            self,
            TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::IntLit(n) => write!(f, "{n}"),
            TokenKind::FloatLit(n) => write!(f, "{n:?}"),
            TokenKind::StringLit(s) => write!(f, "{s:?}"),
            TokenKind::Identifier(s) => f.write_str(s),
            TokenKind::Def => f.write_str("def"),
            TokenKind::Import => f.write_str("import"),
            TokenKind::From => f.write_str("from"),
            TokenKind::As => f.write_str("as"),
            TokenKind::Pass => f.write_str("pass"),
            TokenKind::True => f.write_str("True"),
            TokenKind::False => f.write_str("False"),
            TokenKind::None => f.write_str("None"),
            TokenKind::Plus => f.write_str("+"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::StarStar => f.write_str("**"),
            TokenKind::Ellipsis => f.write_str("..."),
            TokenKind::Arrow => f.write_str("->"),
            TokenKind::At => f.write_str("@"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::LBrace => f.write_str("{"),
            TokenKind::RBrace => f.write_str("}"),
            TokenKind::LBracket => f.write_str("["),
            TokenKind::RBracket => f.write_str("]"),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Colon => f.write_str(":"),
            TokenKind::Dot => f.write_str("."),
            TokenKind::Eq => f.write_str("="),
            TokenKind::Newline => f.write_str("newline"),
            TokenKind::Eof => f.write_str("end of file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_keyword_round_trips() {
        for kw in ALL_KEYWORDS {
            let kind = TokenKind::from_keyword(kw).unwrap_or_else(|| panic!("{kw} not a keyword"));
            assert!(kind.is_keyword());
            assert_eq!(kind.to_string(), *kw);
        }
    }

    #[test]
    fn test_const_is_not_a_keyword() {
        assert_eq!(TokenKind::from_keyword("const"), None);
        assert_eq!(TokenKind::from_keyword("true"), None);
    }

    #[test]
    fn test_display_literals() {
        assert_eq!(TokenKind::IntLit(-3).to_string(), "-3");
        assert_eq!(TokenKind::FloatLit(1.0).to_string(), "1.0");
        assert_eq!(TokenKind::StringLit("a\"b".into()).to_string(), r#""a\"b""#);
    }
}
