//! Simulated include stack built from preprocessor line markers.

/// One file on the include stack and the line a marker last placed us on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub file: String,
    pub line: usize,
}

/// Tracks `# <line> "<file>" [flags]` markers and the newlines seen since
/// the most recent one, so diagnostics can name the real source position.
#[derive(Debug, Clone, Default)]
pub struct IncludeStack {
    frames: Vec<Frame>,
    lines_since_marker: usize,
    skip_trailing: bool,
}

impl IncludeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a line marker. Flag 1 enters an include, flag 2 returns to an
    /// including file, no flag repositions the current file.
    pub fn mark(&mut self, line: usize, file: Option<&str>, flags: &[u32]) {
        let file = match file {
            Some(f) => f.to_string(),
            None => self
                .frames
                .last()
                .map(|f| f.file.clone())
                .unwrap_or_default(),
        };

        if flags.contains(&1) {
            self.frames.push(Frame { file, line });
        } else if flags.contains(&2) {
            while self.frames.len() > 1 && self.frames.last().is_some_and(|f| f.file != file) {
                self.frames.pop();
            }
            self.set_top(file, line);
        } else {
            self.set_top(file, line);
        }

        self.lines_since_marker = 0;
        self.skip_trailing = true;
    }

    fn set_top(&mut self, file: String, line: usize) {
        match self.frames.last_mut() {
            Some(top) => {
                top.file = file;
                top.line = line;
            }
            None => self.frames.push(Frame { file, line }),
        }
    }

    /// Count newlines that precede a statement's first character.
    pub fn advance(&mut self, newlines: usize) {
        self.lines_since_marker += newlines;
    }

    /// Count newlines inside and after a statement. The marker statement's
    /// own line ending is not counted.
    pub fn advance_trailing(&mut self, newlines: usize) {
        if std::mem::take(&mut self.skip_trailing) {
            return;
        }
        self.lines_since_marker += newlines;
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Current (file, line), if any marker has been seen.
    pub fn current(&self) -> Option<(&str, usize)> {
        self.frames
            .last()
            .map(|f| (f.file.as_str(), f.line + self.lines_since_marker))
    }

    /// Render the include stack for a diagnostic, most recent frame last.
    /// Empty when no marker has been seen.
    pub fn render(&self, statement: Option<&str>) -> String {
        let Some((file, line)) = self.current() else {
            return String::new();
        };
        let depth = self.frames.len();
        let mut lines: Vec<String> = self.frames[..depth - 1]
            .iter()
            .map(|f| format!("{}:{}", f.file, f.line))
            .collect();
        lines.push(format!("{file}:{line}"));

        let mut s = format!("\n Included from:\n  {}", lines.join("\n  "));
        if let Some(statement) = statement {
            s.push_str(&format!("\n Snippet from {file}:\n  {statement}"));
        }
        s.push('\n');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_enter_and_return() {
        let mut stack = IncludeStack::new();
        stack.mark(1, Some("agent.cc"), &[]);
        stack.advance(3);
        stack.mark(1, Some("agent.h"), &[1]);
        assert_eq!(stack.frames().len(), 2);
        assert_eq!(stack.current(), Some(("agent.h", 1)));

        stack.mark(5, Some("agent.cc"), &[2]);
        assert_eq!(stack.frames().len(), 1);
        assert_eq!(stack.current(), Some(("agent.cc", 5)));
    }

    #[test]
    fn test_marker_newline_not_counted() {
        let mut stack = IncludeStack::new();
        stack.mark(10, Some("a.cc"), &[]);
        stack.advance_trailing(1);
        assert_eq!(stack.current(), Some(("a.cc", 10)));
        stack.advance(2);
        stack.advance_trailing(1);
        assert_eq!(stack.current(), Some(("a.cc", 13)));
    }

    #[test]
    fn test_render() {
        let mut stack = IncludeStack::new();
        assert_eq!(stack.render(Some("int x")), "");
        stack.mark(1, Some("a.cc"), &[]);
        stack.mark(7, Some("b.h"), &[1]);
        assert_eq!(
            stack.render(Some("#pragma cyclus nope")),
            "\n Included from:\n  a.cc:1\n  b.h:7\n Snippet from b.h:\n  #pragma cyclus nope\n"
        );
    }

    #[test]
    fn test_line_without_file_keeps_file() {
        let mut stack = IncludeStack::new();
        stack.mark(1, Some("a.cc"), &[]);
        stack.mark(40, None, &[]);
        assert_eq!(stack.current(), Some(("a.cc", 40)));
    }
}
