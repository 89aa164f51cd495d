//! Value parsing.
//!
//! A value is a literal, a name, `const(<value>)`, a tuple or a dictionary.
//! There are no operators apart from a sign in front of a numeric literal.

use cmod_lexer::token::TokenKind;
use cmod_types::ast::*;
use cmod_types::{ErrorCode, Span};

use crate::parser::{Parser, MAX_NESTING};

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Point
    // ══════════════════════════════════════════════════════════════════════════

    /// Parse one value.
    pub(crate) fn parse_value(&mut self) -> Option<Expr> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            self.error_at_current(
                ErrorCode::NESTING_TOO_DEEP,
                format!("values may nest at most {MAX_NESTING} levels deep"),
            );
            self.depth -= 1;
            return None;
        }
        let result = self.parse_primary();
        self.depth -= 1;
        result
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        match self.peek_kind().clone() {
            TokenKind::IntLit(n) => {
                self.advance();
                Some(Expr::new(ExprKind::Int(n), start))
            }
            TokenKind::FloatLit(f) => {
                self.advance();
                Some(Expr::new(ExprKind::Float(f), start))
            }
            TokenKind::StringLit(_) => Some(self.parse_string()),
            TokenKind::True => {
                self.advance();
                Some(Expr::new(ExprKind::Bool(true), start))
            }
            TokenKind::False => {
                self.advance();
                Some(Expr::new(ExprKind::Bool(false), start))
            }
            TokenKind::None => {
                self.advance();
                Some(Expr::new(ExprKind::None, start))
            }
            TokenKind::Minus | TokenKind::Plus => self.parse_signed_number(),
            TokenKind::Identifier(name) => self.parse_name(name),
            TokenKind::LParen => self.parse_paren(),
            TokenKind::LBrace => self.parse_dict(),
            TokenKind::LBracket => {
                self.error_with_suggestion(
                    ErrorCode::UNEXPECTED_TOKEN,
                    "lists are mutable and cannot be placed in ROM",
                    start,
                    "use a tuple `( ... )` instead",
                );
                None
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected a value, got '{other}'"),
                );
                None
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Literals
    // ══════════════════════════════════════════════════════════════════════════

    /// Adjacent string literals concatenate, as in Python.
    fn parse_string(&mut self) -> Expr {
        let start = self.current_span();
        let mut text = String::new();
        while let TokenKind::StringLit(s) = self.peek_kind() {
            text.push_str(s);
            self.advance();
        }
        Expr::new(ExprKind::Str(text), start.merge(self.previous_span()))
    }

    /// `-<number>` or `+<number>`.
    fn parse_signed_number(&mut self) -> Option<Expr> {
        let sign = self.advance();
        let negative = sign.kind == TokenKind::Minus;
        let span = sign.span.merge(self.current_span());
        let kind = match self.peek_kind().clone() {
            TokenKind::IntLit(n) => ExprKind::Int(if negative { -n } else { n }),
            TokenKind::FloatLit(f) => ExprKind::Float(if negative { -f } else { f }),
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("a sign must be followed by a number, got '{other}'"),
                );
                return None;
            }
        };
        self.advance();
        Some(Expr::new(kind, span))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Names
    // ══════════════════════════════════════════════════════════════════════════

    /// A name reference, or `const(<value>)`.
    fn parse_name(&mut self, name: String) -> Option<Expr> {
        let start = self.advance().span;
        if !self.check_exact(&TokenKind::LParen) {
            if self.check_exact(&TokenKind::Dot) {
                self.error_with_suggestion(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("attribute access on '{name}' is not supported"),
                    self.current_span(),
                    "refer to a name declared in this file",
                );
                return None;
            }
            return Some(Expr::new(ExprKind::Name(name), start));
        }

        if name != "const" {
            self.error_with_suggestion(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("cannot call '{name}' in a constant value"),
                start,
                "only `const(<integer>)` may be called",
            );
            return None;
        }

        self.advance(); // eat `(`
        let inner = self.parse_value()?;
        self.eat(&TokenKind::Comma);
        self.expect(&TokenKind::RParen)?;
        let span = start.merge(self.previous_span());
        Some(Expr::new(ExprKind::Const(Box::new(inner)), span))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Tuples & Grouping
    // ══════════════════════════════════════════════════════════════════════════

    /// `()`, `(v)`, `(v,)`, `(v, w, ...)`.
    ///
    /// A single parenthesized value without a trailing comma is a grouping,
    /// not a tuple.
    fn parse_paren(&mut self) -> Option<Expr> {
        let start = self.advance().span; // eat `(`
        if self.eat(&TokenKind::RParen) {
            return Some(Expr::new(
                ExprKind::Tuple(Vec::new()),
                start.merge(self.previous_span()),
            ));
        }

        let first = self.parse_value()?;
        if self.eat(&TokenKind::RParen) {
            return Some(Expr::new(first.kind, start.merge(self.previous_span())));
        }

        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check_exact(&TokenKind::RParen) {
                break;
            }
            items.push(self.parse_value()?);
        }
        self.expect(&TokenKind::RParen)?;
        Some(Expr::new(
            ExprKind::Tuple(items),
            start.merge(self.previous_span()),
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Dictionaries
    // ══════════════════════════════════════════════════════════════════════════

    /// `{ key: value, ... }`
    fn parse_dict(&mut self) -> Option<Expr> {
        let start = self.advance().span; // eat `{`
        let mut entries = Vec::new();
        while !self.check_exact(&TokenKind::RBrace) && !self.at_end() {
            let key = self.parse_value()?;
            if !self.check_exact(&TokenKind::Colon) {
                return self.set_literal_error(start);
            }
            self.advance();
            let value = self.parse_value()?;
            let span = key.span.merge(value.span);
            entries.push(DictEntry { key, value, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(Expr::new(
            ExprKind::Dict(entries),
            start.merge(self.previous_span()),
        ))
    }

    fn set_literal_error(&mut self, start: Span) -> Option<Expr> {
        if matches!(self.peek_kind(), TokenKind::Comma | TokenKind::RBrace) {
            self.error_with_suggestion(
                ErrorCode::UNEXPECTED_TOKEN,
                "set literals are not supported",
                start,
                "use a tuple or a dictionary",
            );
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected ':' in dictionary entry, got '{}'", self.peek_kind()),
            );
        }
        None
    }
}
