//! Human-readable rendering of diagnostics.

use cmod_types::{CmodError, CompileErrors, Severity};

pub fn render(diag: &CmodError) -> String {
    let label = match diag.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    let mut out = format!("{label}[{}]: {}\n", diag.code, diag.message);

    let line_no = diag.span.start_line.to_string();
    let pad = " ".repeat(line_no.len());
    out.push_str(&format!("{pad}--> {}:{}\n", diag.file, diag.span));

    if !diag.source_line.is_empty() {
        let start = diag.span.start_col.max(1) as usize;
        let width = if diag.span.end_line == diag.span.start_line {
            (diag.span.end_col as usize + 1).saturating_sub(start).max(1)
        } else {
            diag.source_line.len().saturating_sub(start - 1).max(1)
        };
        out.push_str(&format!("{pad} |\n"));
        out.push_str(&format!("{line_no} | {}\n", diag.source_line));
        out.push_str(&format!(
            "{pad} | {}{}\n",
            " ".repeat(start - 1),
            "^".repeat(width)
        ));
    }
    if let Some(help) = &diag.suggestion {
        out.push_str(&format!("{pad} = help: {help}\n"));
    }
    out
}

/// Every stored diagnostic, warnings first, plus a note for errors past the
/// storage cap.
pub fn render_all(diags: &CompileErrors) -> String {
    let mut out = String::new();
    for d in diags.warnings.iter().chain(&diags.errors) {
        out.push_str(&render(d));
        out.push('\n');
    }
    let unstored = diags.total_errors.saturating_sub(diags.errors.len());
    if unstored > 0 {
        out.push_str(&format!("note: {unstored} more errors not shown\n"));
    }
    out
}
