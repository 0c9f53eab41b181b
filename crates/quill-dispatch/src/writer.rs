//! Indentation-aware output buffer for generated code

use std::fmt::Write;

/// Line-oriented writer that tracks the current indentation
#[derive(Debug, Clone)]
pub struct CodeWriter {
    output: String,
    depth: usize,
    indent: &'static str,
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeWriter {
    /// Writer indenting by two spaces
    pub fn new() -> Self {
        Self {
            output: String::new(),
            depth: 0,
            indent: "  ",
        }
    }

    /// Write one line at the current depth
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            writeln!(self.output).unwrap();
            return;
        }
        for _ in 0..self.depth {
            self.output.push_str(self.indent);
        }
        writeln!(self.output, "{}", text).unwrap();
    }

    /// Write `text` then indent the following lines
    pub fn indent_begin(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Dedent then write `text`; an empty `text` only dedents
    pub fn indent_end(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        if !text.as_ref().is_empty() {
            self.line(text);
        }
    }

    /// `#ifndef guard`
    pub fn ifndef_begin(&mut self, guard: &str) {
        writeln!(self.output, "#ifndef {}", guard).unwrap();
    }

    /// `#endif // guard`
    pub fn ifndef_end(&mut self, guard: &str) {
        writeln!(self.output, "#endif // {}", guard).unwrap();
    }

    /// Current depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Text written so far
    pub fn as_str(&self) -> &str {
        &self.output
    }

    /// Consume the writer
    pub fn finish(self) -> String {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut w = CodeWriter::new();
        w.indent_begin("switch (x) {");
        w.line("case 0:");
        w.indent_end("}");
        assert_eq!(w.finish(), "switch (x) {\n  case 0:\n}\n");
    }

    #[test]
    fn test_preprocessor_lines_not_indented() {
        let mut w = CodeWriter::new();
        w.indent_begin("{");
        w.ifndef_begin("GUARD");
        w.line("x;");
        w.ifndef_end("GUARD");
        w.indent_end("}");
        assert_eq!(w.as_str(), "{\n#ifndef GUARD\n  x;\n#endif // GUARD\n}\n");
    }

    #[test]
    fn test_empty_end_only_dedents() {
        let mut w = CodeWriter::new();
        w.indent_begin("case 1:");
        w.line("break;");
        w.indent_end("");
        w.line("}");
        assert_eq!(w.as_str(), "case 1:\n  break;\n}\n");
    }

    #[test]
    fn test_unbalanced_end_saturates() {
        let mut w = CodeWriter::new();
        w.indent_end("}");
        assert_eq!(w.depth(), 0);
    }
}
