/// How [`stringify_notebook_with`](crate::stringify_notebook_with) lays out
/// its JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeConfig {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Append `\n` after the closing brace.
    pub trailing_newline: bool,
}

impl Default for SerializeConfig {
    fn default() -> Self {
        Self {
            indent: 2,
            trailing_newline: false,
        }
    }
}

impl SerializeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The layout Jupyter itself writes: one-space indent and a final newline.
    pub fn nbformat() -> Self {
        Self {
            indent: 1,
            trailing_newline: true,
        }
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_trailing_newline(mut self, trailing_newline: bool) -> Self {
        self.trailing_newline = trailing_newline;
        self
    }
}
