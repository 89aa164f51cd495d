//! Shared types for mpy-cmod.
//!
//! Source spans, structured diagnostics and the AST of a module description
//! file, shared by the lexer, parser and compiler crates.

mod error;
mod span;
pub mod ast;

pub use error::{CmodError, CompileErrors, ErrorCategory, ErrorCode, Severity, MAX_ERRORS};
pub use span::{SourceFile, Span};

pub type Result<T> = std::result::Result<T, CmodError>;
