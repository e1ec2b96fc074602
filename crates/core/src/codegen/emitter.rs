//! Indented line writer for generated DocDEF text.

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub(crate) struct Emitter {
    buf: String,
    depth: usize,
}

impl Emitter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current depth. Empty lines carry no indent.
    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buf.push_str(INDENT);
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.line("");
    }

    pub(crate) fn comment(&mut self, text: impl AsRef<str>) {
        // `*/` inside a comment would end it early
        let text = text.as_ref().replace("*/", "* /");
        self.line(format!("/* {} */", text));
    }

    pub(crate) fn indent(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn finish(self) -> String {
        self.buf
    }
}
