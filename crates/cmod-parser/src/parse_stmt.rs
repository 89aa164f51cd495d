//! Top-level statement parsing.
//!
//! Only assignments, `def` stubs, imports and docstrings are meaningful.
//! Other Python statements are reported as warnings and skipped together
//! with any indented block that belongs to them.

use crate::parser::Parser;
use cmod_lexer::token::TokenKind;
use cmod_types::ast::*;
use cmod_types::ErrorCode;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Program
    // ══════════════════════════════════════════════════════════════════════════

    pub(crate) fn parse_program(&mut self) -> Program {
        let start = self.current_span();
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            match self.peek_kind() {
                TokenKind::Import => match self.parse_import() {
                    Some(imports) => statements.extend(imports.into_iter().map(Stmt::Import)),
                    None => self.synchronize(),
                },
                _ => match self.parse_statement() {
                    Some(Some(stmt)) => statements.push(stmt),
                    Some(None) => {}
                    None => self.synchronize(),
                },
            }
            self.skip_newlines();
        }
        let span = start.merge(self.previous_span());
        Program { statements, span }
    }

    /// Parse one statement. `Some(None)` means the statement was recognized
    /// and intentionally dropped.
    fn parse_statement(&mut self) -> Option<Option<Stmt>> {
        match self.peek_kind().clone() {
            TokenKind::From => self.parse_from_import().map(|s| Some(Stmt::Import(s))),
            TokenKind::Def => self.parse_function().map(|f| Some(Stmt::Function(f))),
            TokenKind::At => {
                // decorators do not change how a native stub is exported
                self.synchronize();
                Some(None)
            }
            TokenKind::StringLit(_) if self.is_bare_string_statement() => {
                let start = self.current_span();
                while matches!(self.peek_kind(), TokenKind::StringLit(_)) {
                    self.advance();
                }
                let span = start.merge(self.previous_span());
                self.expect_end_of_statement()?;
                Some(Some(Stmt::Docstring(span)))
            }
            TokenKind::Pass | TokenKind::Ellipsis if self.is_single_token_line() => {
                self.advance();
                self.expect_end_of_statement()?;
                Some(None)
            }
            TokenKind::Identifier(_)
                if matches!(self.look_ahead(1), TokenKind::Eq | TokenKind::Colon) =>
            {
                self.parse_assignment()
            }
            _ => {
                self.skip_unsupported();
                Some(None)
            }
        }
    }

    fn is_bare_string_statement(&self) -> bool {
        let mut n = 0;
        while matches!(self.look_ahead(n), TokenKind::StringLit(_)) {
            n += 1;
        }
        matches!(self.look_ahead(n), TokenKind::Newline | TokenKind::Eof)
    }

    fn is_single_token_line(&self) -> bool {
        matches!(self.look_ahead(1), TokenKind::Newline | TokenKind::Eof)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Assignments
    // ══════════════════════════════════════════════════════════════════════════

    /// `NAME = value` or `NAME: annotation = value`.
    ///
    /// A bare annotation without a value declares nothing and is skipped with
    /// a warning.
    fn parse_assignment(&mut self) -> Option<Option<Stmt>> {
        let target = self.expect_identifier()?;
        if self.eat(&TokenKind::Colon) {
            self.skip_annotation(&[TokenKind::Eq]);
            if !self.check_exact(&TokenKind::Eq) {
                let span = target.span.merge(self.previous_span());
                self.warning_at(
                    ErrorCode::UNSUPPORTED_STATEMENT,
                    format!("annotation of '{}' without a value is ignored", target.name),
                    span,
                );
                self.synchronize();
                return Some(None);
            }
        }
        self.expect(&TokenKind::Eq)?;

        // chained `A = B = 1` is not a declaration
        if matches!(self.peek_kind(), TokenKind::Identifier(_))
            && self.look_ahead(1) == &TokenKind::Eq
        {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                "chained assignment is not supported",
            );
            return None;
        }

        let value = self.parse_value()?;
        let span = target.span.merge(value.span);
        self.expect_end_of_statement()?;
        Some(Some(Stmt::Assign(Assign {
            target,
            value,
            span,
        })))
    }

    /// Skip a type annotation up to one of `stops` at bracket depth zero, or
    /// the end of the line.
    fn skip_annotation(&mut self, stops: &[TokenKind]) {
        let mut depth = 0usize;
        loop {
            let kind = self.peek_kind();
            match kind {
                TokenKind::Newline | TokenKind::Eof => return,
                k if depth == 0 && stops.contains(k) => return,
                k if k.is_open_bracket() => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Functions
    // ══════════════════════════════════════════════════════════════════════════

    /// `def NAME(params) [-> annotation]: body`
    ///
    /// The body is never interpreted: an inline body runs to the end of the
    /// line, otherwise every following line indented past `def` belongs to it.
    fn parse_function(&mut self) -> Option<FunctionDecl> {
        let start = self.current_span();
        self.advance(); // eat `def`
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(&TokenKind::RParen)?;
        if self.eat(&TokenKind::Arrow) {
            self.skip_annotation(&[TokenKind::Colon]);
        }
        self.expect(&TokenKind::Colon)?;
        let span = start.merge(self.previous_span());

        if self.check_exact(&TokenKind::Newline) {
            self.advance();
            self.skip_indented_block(start.start_col);
        } else {
            self.synchronize();
        }

        Some(FunctionDecl { name, params, span })
    }

    fn parse_params(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        let mut keyword_only = false;
        while !self.check_exact(&TokenKind::RParen) && !self.at_end() {
            let kind = if self.eat(&TokenKind::StarStar) {
                ParamKind::KwArgs
            } else if self.eat(&TokenKind::Star) {
                // a bare `*` only marks the following parameters keyword-only
                if matches!(self.peek_kind(), TokenKind::Comma | TokenKind::RParen) {
                    keyword_only = true;
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                    continue;
                }
                keyword_only = true;
                ParamKind::VarArgs
            } else {
                ParamKind::Positional
            };

            let name = self.expect_identifier()?;
            if self.eat(&TokenKind::Colon) {
                self.skip_annotation(&[TokenKind::Comma, TokenKind::Eq]);
            }
            let kind = if self.eat(&TokenKind::Eq) {
                self.parse_value()?;
                ParamKind::Default
            } else if kind == ParamKind::Positional && keyword_only {
                ParamKind::Default
            } else {
                kind
            };
            params.push(Param { name, kind });

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Some(params)
    }

    /// Skip every line whose first token is indented past `column`.
    fn skip_indented_block(&mut self, column: u32) {
        while !self.at_end() && self.current_span().start_col > column {
            self.synchronize();
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Imports
    // ══════════════════════════════════════════════════════════════════════════

    /// `import a.b [as c], d`
    fn parse_import(&mut self) -> Option<Vec<ImportStmt>> {
        self.advance(); // eat `import`
        let mut imports = Vec::new();
        loop {
            let start = self.current_span();
            let module = self.expect_dotted_name()?;
            if self.eat(&TokenKind::As) {
                self.expect_identifier()?;
            }
            imports.push(ImportStmt {
                module,
                names: Vec::new(),
                span: start.merge(self.previous_span()),
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_end_of_statement()?;
        Some(imports)
    }

    /// `from [.]a.b import x [as y], z` / `from a import (x, y)` / `from a import *`
    fn parse_from_import(&mut self) -> Option<ImportStmt> {
        let start = self.current_span();
        self.advance(); // eat `from`

        let mut module = String::new();
        loop {
            if self.eat(&TokenKind::Dot) {
                module.push('.');
            } else if self.eat(&TokenKind::Ellipsis) {
                module.push_str("...");
            } else {
                break;
            }
        }
        if !self.check_exact(&TokenKind::Import) {
            module.push_str(&self.expect_dotted_name()?);
        }
        self.expect(&TokenKind::Import)?;

        let mut names = Vec::new();
        if self.eat(&TokenKind::Star) {
            names.push("*".to_string());
        } else {
            let parenthesized = self.eat(&TokenKind::LParen);
            loop {
                if parenthesized && self.check_exact(&TokenKind::RParen) {
                    break;
                }
                names.push(self.expect_identifier()?.name);
                if self.eat(&TokenKind::As) {
                    self.expect_identifier()?;
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            if parenthesized {
                self.expect(&TokenKind::RParen)?;
            }
        }

        let span = start.merge(self.previous_span());
        self.expect_end_of_statement()?;
        Some(ImportStmt {
            module,
            names,
            span,
        })
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Unsupported statements
    // ══════════════════════════════════════════════════════════════════════════

    /// Warn about a statement that declares nothing and skip it, including
    /// the indented block of a compound statement.
    fn skip_unsupported(&mut self) {
        let start = self.current_span();
        let first = self.peek_kind().to_string();
        let mut end = start;
        while !self.at_end() && !self.check_exact(&TokenKind::Newline) {
            end = self.advance().span;
        }
        let compound = self.previous_is_colon();
        self.eat(&TokenKind::Newline);
        if compound {
            self.skip_indented_block(start.start_col);
        }
        self.warning_at(
            ErrorCode::UNSUPPORTED_STATEMENT,
            format!("statement starting with '{first}' declares nothing and is ignored"),
            start.merge(end),
        );
    }

    fn previous_is_colon(&self) -> bool {
        self.peek_previous_kind() == Some(&TokenKind::Colon)
    }
}
