//! mpy-cmod compiler: orchestrates the full generation pipeline.
//!
//! ```text
//! description.py → Lexer → Parser → Binding collector → Layout → C emitter → <module>.c
//! ```
//!
//! [`compile`] returns the generated unit or every diagnostic that stopped
//! it; [`compile_to_result`] wraps the same run in a serializable
//! [`CompileResult`]. Files are written by [`output`].

pub mod collect;
pub mod output;

use std::collections::HashMap;

use cmod_codegen::{CodegenError, EmitOptions, GeneratedUnit, SourceMap};
use cmod_lexer::Lexer;
use cmod_parser::Parser;
use cmod_types::{CmodError, CompileErrors, ErrorCode, SourceFile, Span};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use collect::{collect, Collected};
pub use output::{clear_module, module_exists, write_module, OutputError};

/// Options of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Passed to the code generator. `module_name` defaults to the stem of
    /// the description file name, `source_name` to its base name.
    #[serde(default)]
    pub emit: EmitOptions,
    /// Also write `qstrdefs.<module>.h`.
    #[serde(default)]
    pub qstrdefs: bool,
}

/// A successful run.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub unit: GeneratedUnit,
    /// Warnings only; a run with errors returns `Err`.
    pub diagnostics: CompileErrors,
}

/// JSON-friendly outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    pub success: bool,
    pub module_name: Option<String>,
    /// Content of `<module>.c`.
    pub c_source: Option<String>,
    /// Content of `micropython.mk`.
    pub makefile: Option<String>,
    pub qstrdefs: Option<String>,
    pub source_map: Option<SourceMap>,
    /// Lowercase hex SHA-256 of `c_source`.
    pub digest: Option<String>,
    pub errors: CompileErrors,
}

impl CompileResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Run the full pipeline on `source`, read from `filename`.
pub fn compile(source: &str, filename: &str, options: &Options) -> Result<Compiled, CompileErrors> {
    let sf = SourceFile::new(filename, source);
    let mut diagnostics = CompileErrors::empty();

    // 1. Lex
    let lexed = Lexer::new(&sf).lex();
    diagnostics.extend(lexed.errors);
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    // 2. Parse
    let parsed = Parser::new(lexed.tokens, &sf).parse();
    diagnostics.extend(parsed.errors);
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    // 3. Collect bindings
    let mut emit_options = options.emit.clone();
    let module_name = emit_options
        .module_name
        .get_or_insert_with(|| sf.stem().to_string())
        .clone();
    if emit_options.source_name.is_none() {
        emit_options.source_name = Some(base_name(filename).to_string());
    }
    let collected = collect(&parsed.program, &module_name, &sf, &mut diagnostics);
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    // 4. Layout + C
    match cmod_codegen::emit(&collected.spec, &emit_options) {
        Ok(unit) => Ok(Compiled { unit, diagnostics }),
        Err(err) => {
            diagnostics.push_error(codegen_diagnostic(&err, &collected.spans, &sf));
            Err(diagnostics)
        }
    }
}

/// Run the pipeline and package the outcome as a [`CompileResult`].
pub fn compile_to_result(source: &str, filename: &str, options: &Options) -> CompileResult {
    match compile(source, filename, options) {
        Ok(compiled) => {
            let unit = compiled.unit;
            let makefile = if options.qstrdefs {
                unit.makefile_with_qstrdefs()
            } else {
                unit.makefile.clone()
            };
            CompileResult {
                success: true,
                digest: Some(sha256_hex(&unit.code)),
                module_name: Some(unit.module_name),
                c_source: Some(unit.code),
                makefile: Some(makefile),
                qstrdefs: options.qstrdefs.then_some(unit.qstrdefs),
                source_map: Some(unit.source_map),
                errors: compiled.diagnostics,
            }
        }
        Err(errors) => CompileResult {
            success: false,
            module_name: None,
            c_source: None,
            makefile: None,
            qstrdefs: None,
            source_map: None,
            digest: None,
            errors,
        },
    }
}

/// Diagnostics only: everything [`compile`] reports, without the output.
pub fn check(source: &str, filename: &str, options: &Options) -> CompileErrors {
    match compile(source, filename, options) {
        Ok(compiled) => compiled.diagnostics,
        Err(errors) => errors,
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn codegen_error_code(err: &CodegenError) -> ErrorCode {
    match err {
        CodegenError::DuplicateSymbol { .. } => ErrorCode::DUPLICATE_SYMBOL,
        CodegenError::UnresolvedSymbol { .. } => ErrorCode::UNRESOLVED_SYMBOL,
        CodegenError::InvalidSymbol { .. } => ErrorCode::INVALID_SYMBOL,
        CodegenError::DuplicateKey { .. } => ErrorCode::DUPLICATE_KEY,
        CodegenError::SizeInvariant { .. } => ErrorCode::SIZE_INVARIANT,
        CodegenError::CyclicConstant { .. } => ErrorCode::CYCLIC_CONSTANT,
        CodegenError::IntegerOutOfRange { .. } | CodegenError::NonFiniteFloat { .. } => {
            ErrorCode::VALUE_OUT_OF_RANGE
        }
    }
}

/// Attach a source location to a layout error through the name it is about.
fn codegen_diagnostic(
    err: &CodegenError,
    spans: &HashMap<String, Span>,
    source: &SourceFile,
) -> CmodError {
    let span = err
        .subject()
        .and_then(|name| spans.get(name))
        .copied()
        .unwrap_or(Span::point(1, 1));
    let source_line = source.line(span.start_line).unwrap_or("");
    CmodError::new(
        &source.name,
        codegen_error_code(err),
        err.to_string(),
        span,
        source_line,
    )
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn sha256_hex(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
