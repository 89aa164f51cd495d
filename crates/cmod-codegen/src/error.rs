//! Codegen error types.

use thiserror::Error;

/// Errors that abort generation of a unit.
///
/// None of them is recoverable: when `emit` fails no text is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    /// The same symbol is bound twice in one mapping table.
    #[error("duplicate symbol '{symbol}' in {table}")]
    DuplicateSymbol { symbol: String, table: String },

    /// The same key appears twice in one constant dictionary.
    #[error("duplicate key {key} in dictionary '{table}'")]
    DuplicateKey { key: String, table: String },

    /// A size field disagrees with the number of emitted elements.
    #[error("{table} declares {declared} elements but has {actual}")]
    SizeInvariant {
        table: String,
        declared: usize,
        actual: usize,
    },

    /// Constant objects reference each other in a loop.
    #[error("cyclic constant: {}", cycle.join(" -> "))]
    CyclicConstant { cycle: Vec<String> },

    /// A value refers to an object that was never described.
    #[error("unresolved symbol '{name}' referenced from {context}")]
    UnresolvedSymbol { name: String, context: String },

    /// A name cannot be spelled in the generated C.
    #[error("invalid symbol '{name}': {reason}")]
    InvalidSymbol { name: String, reason: String },

    /// An integer does not fit the runtime's small-int encoding.
    #[error("integer {value} in {context} does not fit a {bits}-bit small int")]
    IntegerOutOfRange {
        value: i64,
        bits: u32,
        context: String,
    },

    #[error("float constant '{object}' is not finite")]
    NonFiniteFloat { object: String },
}

impl CodegenError {
    /// Name of the binding or object the error is about, when there is one.
    pub fn subject(&self) -> Option<&str> {
        match self {
            CodegenError::DuplicateSymbol { symbol, .. } => Some(symbol),
            CodegenError::DuplicateKey { table, .. } => Some(table),
            CodegenError::SizeInvariant { table, .. } => Some(table),
            CodegenError::CyclicConstant { cycle } => cycle.first().map(String::as_str),
            CodegenError::UnresolvedSymbol { context, .. } => Some(context),
            CodegenError::InvalidSymbol { name, .. } => Some(name),
            CodegenError::IntegerOutOfRange { context, .. } => Some(context),
            CodegenError::NonFiniteFloat { object } => Some(object),
        }
    }
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
