//! Line-oriented C text builder.

/// Accumulates C source one line at a time with four-space indentation.
#[derive(Debug, Default)]
pub struct CWriter {
    out: String,
    indent: usize,
}

impl CWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_line(&mut self, line: &str) {
        if line.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    /// Emit several lines; a trailing newline of `text` is ignored.
    pub fn emit_lines(&mut self, text: &str) {
        for line in text.lines() {
            self.emit_line(line);
        }
    }

    pub fn blank_line(&mut self) {
        self.out.push('\n');
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut w = CWriter::new();
        w.emit_line("x = {");
        w.indent();
        w.emit_line("1,");
        w.blank_line();
        w.dedent();
        w.dedent();
        w.emit_line("};");
        assert_eq!(w.finish(), "x = {\n    1,\n\n};\n");
    }

    #[test]
    fn test_empty_line_has_no_trailing_spaces() {
        let mut w = CWriter::new();
        w.indent();
        w.emit_lines("a\n\nb\n");
        assert_eq!(w.finish(), "    a\n\n    b\n");
    }
}
