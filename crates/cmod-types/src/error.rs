use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors stored before the rest are only counted.
pub const MAX_ERRORS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Symbol,
    Layout,
    Output,
}

/// Numeric diagnostic code (E100–E499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNCLOSED_BRACKET: Self = Self(101);
    pub const INVALID_LITERAL: Self = Self(102);
    pub const UNTERMINATED_STRING: Self = Self(103);
    pub const UNSUPPORTED_STATEMENT: Self = Self(104);
    pub const NESTING_TOO_DEEP: Self = Self(105);

    // ── Symbols (E200–E299) ──
    pub const DUPLICATE_SYMBOL: Self = Self(200);
    pub const UNRESOLVED_SYMBOL: Self = Self(201);
    pub const INVALID_SYMBOL: Self = Self(202);
    pub const DUPLICATE_KEY: Self = Self(203);

    // ── Constant layout (E300–E399) ──
    pub const SIZE_INVARIANT: Self = Self(300);
    pub const CYCLIC_CONSTANT: Self = Self(301);
    pub const VALUE_OUT_OF_RANGE: Self = Self(302);

    // ── Output (E400–E499) ──
    pub const OUTPUT_IO: Self = Self(400);
    pub const MODULE_EXISTS: Self = Self(401);

    pub fn category(self) -> ErrorCategory {
        match self.0 {
            200..=299 => ErrorCategory::Symbol,
            300..=399 => ErrorCategory::Layout,
            400..=499 => ErrorCategory::Output,
            _ => ErrorCategory::Syntax,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Symbol => write!(f, "symbol"),
            Self::Layout => write!(f, "layout"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// A structured diagnostic.
///
/// Rendered by the CLI or serialized to JSON; consumers must not parse
/// `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmodError {
    /// Description file name.
    pub file: String,
    pub code: ErrorCode,
    pub severity: Severity,
    /// Derived from `code`.
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The offending source line, verbatim.
    pub source_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl CmodError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            suggestion: None,
        }
    }

    /// Same as [`CmodError::new`] but with [`Severity::Warning`].
    pub fn warning(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::new(file, code, message, span, source_line)
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for CmodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.file, self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for CmodError {}

/// Diagnostics collected by one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<CmodError>,
    pub warnings: Vec<CmodError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl CompileErrors {
    pub fn empty() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            total_errors: 0,
            total_warnings: 0,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Whether the error cap has been reached and scanning should stop.
    pub fn is_full(&self) -> bool {
        self.total_errors >= MAX_ERRORS
    }

    /// Record an error; only the first [`MAX_ERRORS`] are stored.
    pub fn push_error(&mut self, error: CmodError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    pub fn push_warning(&mut self, warning: CmodError) {
        self.warnings.push(warning);
        self.total_warnings += 1;
    }

    /// Route a diagnostic by its severity.
    pub fn push(&mut self, diagnostic: CmodError) {
        match diagnostic.severity {
            Severity::Error => self.push_error(diagnostic),
            Severity::Warning => self.push_warning(diagnostic),
        }
    }

    /// Append everything from another collection, respecting the cap.
    pub fn extend(&mut self, other: CompileErrors) {
        // errors beyond the cap were counted but not stored
        let unstored = other.total_errors.saturating_sub(other.errors.len());
        for e in other.errors {
            self.push_error(e);
        }
        self.total_errors += unstored;
        for w in other.warnings {
            self.push_warning(w);
        }
    }
}

impl Default for CompileErrors {
    fn default() -> Self {
        Self::empty()
    }
}
