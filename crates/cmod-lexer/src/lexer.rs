//! Description-file lexer: source text to token stream.
//!
//! Handles the subset of Python tokens that a module description uses:
//! - integer literals in every base with `_` separators, float literals
//! - single, double and triple quoted strings with the common escapes
//! - `#` comments and `\` line continuations
//! - newline suppression inside `()`, `[]` and `{}`
//! - error recovery: collects up to 20 errors instead of stopping at the first

use cmod_types::{CmodError, CompileErrors, ErrorCode, SourceFile, Span};

use crate::token::{Token, TokenKind};

pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    col: u32,
    errors: CompileErrors,
    /// Number of currently open brackets of any kind.
    bracket_depth: u32,
    /// Spans of the open brackets, innermost last.
    open_brackets: Vec<Span>,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    pub errors: CompileErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: CompileErrors::empty(),
            bracket_depth: 0,
            open_brackets: Vec::new(),
        }
    }

    /// Lex the entire source file into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens: Vec<Token> = Vec::new();

        loop {
            if self.errors.is_full() {
                break;
            }
            let token = self.scan_token();
            let is_eof = token.kind == TokenKind::Eof;

            // blank lines and comment-only lines collapse into one Newline
            let redundant_newline = token.kind == TokenKind::Newline
                && tokens
                    .last()
                    .is_none_or(|t| t.kind == TokenKind::Newline);
            if !redundant_newline {
                tokens.push(token);
            }
            if is_eof {
                break;
            }
        }

        if let Some(&span) = self.open_brackets.first() {
            self.emit_error(
                ErrorCode::UNCLOSED_BRACKET,
                "bracket opened here is never closed",
                span,
            );
        }

        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }

        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ── Character-level helpers ──────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // continuation bytes of a UTF-8 sequence share the column
            self.col += 1;
        }
        Some(ch)
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let err = CmodError::new(&self.source_file.name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    fn emit_error_with_suggestion(
        &mut self,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        suggestion: impl Into<String>,
    ) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let err = CmodError::new(&self.source_file.name, code, message, span, source_line)
            .with_suggestion(suggestion);
        self.errors.push_error(err);
    }

    fn text_from(&self, start: usize) -> &'src str {
        let source = self.source;
        std::str::from_utf8(&source[start..self.pos]).unwrap_or("")
    }

    // ── Whitespace & comments ────────────────────────────────────────────────

    /// Skip blanks, comments and line continuations. Newlines inside brackets
    /// count as blanks.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                b' ' | b'\t' | b'\r' | b'\x0c' => {
                    self.advance();
                }
                b'\n' if self.bracket_depth > 0 => {
                    self.advance();
                }
                b'\\' if matches!(self.peek_at(1), Some(b'\n')) => {
                    self.advance();
                    self.advance();
                }
                b'\\' if self.peek_at(1) == Some(b'\r') && self.peek_at(2) == Some(b'\n') => {
                    self.advance();
                    self.advance();
                    self.advance();
                }
                b'#' => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    // ── Token scanning ───────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Token {
        self.skip_trivia();

        if self.errors.is_full() {
            return Token::new(TokenKind::Eof, self.current_span());
        }

        let start_line = self.line;
        let start_col = self.col;
        let start = self.pos;
        let Some(ch) = self.advance() else {
            return Token::new(TokenKind::Eof, self.current_span());
        };

        let simple = |kind: TokenKind, lexer: &Self| {
            Token::new(kind, lexer.span_from(start_line, start_col))
        };

        match ch {
            b'\n' => simple(TokenKind::Newline, self),

            b'"' | b'\'' => self.scan_string(ch, start_line, start_col),

            b'0'..=b'9' => self.scan_number(start, start_line, start_col),

            b'.' if matches!(self.peek(), Some(b'0'..=b'9')) => {
                self.scan_number(start, start_line, start_col)
            }

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == b'_' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let text = self.text_from(start);
                let kind = TokenKind::from_keyword(text)
                    .unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
                simple(kind, self)
            }

            b'(' | b'[' | b'{' => {
                self.bracket_depth += 1;
                let token = simple(
                    match ch {
                        b'(' => TokenKind::LParen,
                        b'[' => TokenKind::LBracket,
                        _ => TokenKind::LBrace,
                    },
                    self,
                );
                self.open_brackets.push(token.span);
                token
            }

            b')' | b']' | b'}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                self.open_brackets.pop();
                simple(
                    match ch {
                        b')' => TokenKind::RParen,
                        b']' => TokenKind::RBracket,
                        _ => TokenKind::RBrace,
                    },
                    self,
                )
            }

            b'+' => simple(TokenKind::Plus, self),
            b'@' => simple(TokenKind::At, self),
            b',' => simple(TokenKind::Comma, self),
            b':' => simple(TokenKind::Colon, self),
            b'=' => simple(TokenKind::Eq, self),

            b'-' => {
                if self.peek() == Some(b'>') {
                    self.advance();
                    simple(TokenKind::Arrow, self)
                } else {
                    simple(TokenKind::Minus, self)
                }
            }

            b'*' => {
                if self.peek() == Some(b'*') {
                    self.advance();
                    simple(TokenKind::StarStar, self)
                } else {
                    simple(TokenKind::Star, self)
                }
            }

            b'.' => {
                if self.peek() == Some(b'.') && self.peek_at(1) == Some(b'.') {
                    self.advance();
                    self.advance();
                    simple(TokenKind::Ellipsis, self)
                } else {
                    simple(TokenKind::Dot, self)
                }
            }

            _ => {
                // swallow the rest of a multi-byte character
                while matches!(self.peek(), Some(c) if c & 0xC0 == 0x80) {
                    self.advance();
                }
                let span = self.span_from(start_line, start_col);
                let shown = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
                self.emit_error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unexpected character '{shown}'"),
                    span,
                );
                self.scan_token()
            }
        }
    }

    // ── Numbers ──────────────────────────────────────────────────────────────

    fn scan_number(&mut self, start: usize, start_line: u32, start_col: u32) -> Token {
        let first = self.source[start];

        if first == b'0' && matches!(self.peek(), Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B')) {
            let radix = match self.advance() {
                Some(b'x' | b'X') => 16,
                Some(b'o' | b'O') => 8,
                _ => 2,
            };
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == b'_' {
                    self.advance();
                } else {
                    break;
                }
            }
            let text = self.text_from(start);
            let digits: String = text[2..].chars().filter(|&c| c != '_').collect();
            return self.int_token(text, &digits, radix, start_line, start_col);
        }

        let mut is_float = first == b'.';
        self.eat_digits();
        if !is_float && self.peek() == Some(b'.') && self.peek_at(1) != Some(b'.') {
            is_float = true;
            self.advance();
            self.eat_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E'))
            && (matches!(self.peek_at(1), Some(b'0'..=b'9'))
                || (matches!(self.peek_at(1), Some(b'+' | b'-'))
                    && matches!(self.peek_at(2), Some(b'0'..=b'9'))))
        {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.advance();
            }
            self.eat_digits();
        }

        let text = self.text_from(start);
        let cleaned: String = text.chars().filter(|&c| c != '_').collect();

        if is_float {
            let span = self.span_from(start_line, start_col);
            return match cleaned.parse::<f64>() {
                Ok(value) if value.is_finite() => Token::new(TokenKind::FloatLit(value), span),
                Ok(_) => {
                    self.emit_error(
                        ErrorCode::INVALID_LITERAL,
                        format!("float literal '{text}' is out of range"),
                        span,
                    );
                    Token::new(TokenKind::FloatLit(0.0), span)
                }
                Err(_) => {
                    self.emit_error(
                        ErrorCode::INVALID_LITERAL,
                        format!("invalid float literal '{text}'"),
                        span,
                    );
                    Token::new(TokenKind::FloatLit(0.0), span)
                }
            };
        }

        if cleaned.len() > 1 && cleaned.starts_with('0') && cleaned.bytes().any(|b| b != b'0') {
            let span = self.span_from(start_line, start_col);
            self.emit_error_with_suggestion(
                ErrorCode::INVALID_LITERAL,
                format!("leading zeros are not allowed in '{text}'"),
                span,
                "use the 0o prefix for octal integers",
            );
            return Token::new(TokenKind::IntLit(0), span);
        }

        self.int_token(text, &cleaned, 10, start_line, start_col)
    }

    fn eat_digits(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == b'_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn int_token(
        &mut self,
        text: &str,
        digits: &str,
        radix: u32,
        start_line: u32,
        start_col: u32,
    ) -> Token {
        let span = self.span_from(start_line, start_col);
        match i64::from_str_radix(digits, radix) {
            Ok(value) if !digits.is_empty() => Token::new(TokenKind::IntLit(value), span),
            Err(e) if matches!(e.kind(), std::num::IntErrorKind::PosOverflow) => {
                self.emit_error(
                    ErrorCode::INVALID_LITERAL,
                    format!("integer literal '{text}' does not fit in 64 bits"),
                    span,
                );
                Token::new(TokenKind::IntLit(0), span)
            }
            _ => {
                self.emit_error(
                    ErrorCode::INVALID_LITERAL,
                    format!("invalid integer literal '{text}'"),
                    span,
                );
                Token::new(TokenKind::IntLit(0), span)
            }
        }
    }

    // ── Strings ──────────────────────────────────────────────────────────────

    /// Scan a string after its first quote character.
    fn scan_string(&mut self, quote: u8, start_line: u32, start_col: u32) -> Token {
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut buf: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        span,
                    );
                    break;
                }
                Some(b'\n') if !triple => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error_with_suggestion(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        span,
                        "use a triple-quoted string to span several lines",
                    );
                    break;
                }
                Some(c) if c == quote => {
                    if !triple {
                        self.advance();
                        break;
                    }
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        self.advance();
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                    buf.push(c);
                }
                Some(b'\\') => self.scan_escape(&mut buf),
                Some(c) => {
                    self.advance();
                    buf.push(c);
                }
            }
        }

        Token::new(
            TokenKind::StringLit(String::from_utf8_lossy(&buf).into_owned()),
            self.span_from(start_line, start_col),
        )
    }

    /// Resolve one escape sequence. Unknown escapes keep the backslash, as
    /// Python does.
    fn scan_escape(&mut self, buf: &mut Vec<u8>) {
        let start_line = self.line;
        let start_col = self.col;
        self.advance();

        match self.advance() {
            Some(b'\n') => {}
            Some(b'\\') => buf.push(b'\\'),
            Some(b'\'') => buf.push(b'\''),
            Some(b'"') => buf.push(b'"'),
            Some(b'n') => buf.push(b'\n'),
            Some(b't') => buf.push(b'\t'),
            Some(b'r') => buf.push(b'\r'),
            Some(b'0') => buf.push(0),
            Some(b'x') => {
                let hex: Vec<u8> = (0..2).filter_map(|i| self.peek_at(i)).collect();
                let value = std::str::from_utf8(&hex)
                    .ok()
                    .filter(|h| h.len() == 2)
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match value {
                    Some(byte) => {
                        self.advance();
                        self.advance();
                        let mut tmp = [0u8; 4];
                        buf.extend_from_slice(char::from(byte).encode_utf8(&mut tmp).as_bytes());
                    }
                    None => {
                        let span = self.span_from(start_line, start_col);
                        self.emit_error(
                            ErrorCode::INVALID_LITERAL,
                            "truncated \\xXX escape",
                            span,
                        );
                    }
                }
            }
            Some(other) => {
                buf.push(b'\\');
                buf.push(other);
            }
            None => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNTERMINATED_STRING,
                    "unexpected end of file in escape sequence",
                    span,
                );
            }
        }
    }
}
