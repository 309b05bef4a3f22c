pub(crate) struct GlslWriter {
    out: String,
    indent: usize,
}

impl GlslWriter {
    pub(crate) fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    pub(crate) fn indent(&mut self) {
        self.indent += 1;
    }

    pub(crate) fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub(crate) fn line(&mut self, s: &str) {
        if s.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        self.out.push_str(s);
        self.out.push('\n');
    }

    /// Writes `header {` and indents.
    pub(crate) fn open(&mut self, header: &str) {
        if header.is_empty() {
            self.line("{");
        } else {
            self.line(&format!("{header} {{"));
        }
        self.indent();
    }

    /// Dedents and writes `}` (plus `suffix`, e.g. `;`).
    pub(crate) fn close(&mut self, suffix: &str) {
        self.dedent();
        self.line(&format!("}}{suffix}"));
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}
