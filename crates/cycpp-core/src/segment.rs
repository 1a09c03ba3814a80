//! Statement segmentation.
//!
//! Source text is cut into statements, each followed by the separator that
//! ended it. Which characters end a statement depends on how the statement
//! opened: directives and line comments run to the end of the line, block
//! comments run to `*/`, access labels end at `:`, and everything else runs
//! to the first `{`, `}` or `;`. Concatenating every statement's text and
//! separator reproduces the input up to the last complete statement; an
//! unterminated tail is left in [`Segmenter::remainder`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static ACCESS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A\s*(?:public|private|protected)\s*:").expect("access label regex")
});

/// The text that terminated a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    OpenBrace,
    CloseBrace,
    Semicolon,
    Newline,
    CommentEnd,
    Colon,
}

impl Separator {
    pub fn as_str(self) -> &'static str {
        match self {
            Separator::OpenBrace => "{",
            Separator::CloseBrace => "}",
            Separator::Semicolon => ";",
            Separator::Newline => "\n",
            Separator::CommentEnd => "*/",
            Separator::Colon => ":",
        }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a statement was opened, which decides what may terminate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Plain,
    Directive,
    LineComment,
    BlockComment,
    AccessLabel,
}

/// One segmented statement. `text` keeps all surrounding whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement<'a> {
    pub text: &'a str,
    pub sep: Separator,
    pub kind: StatementKind,
}

impl<'a> Statement<'a> {
    pub fn trimmed(&self) -> &'a str {
        self.text.trim()
    }

    pub fn is_plain(&self) -> bool {
        self.kind == StatementKind::Plain
    }

    pub fn is_directive(&self) -> bool {
        self.kind == StatementKind::Directive
    }

    /// Newlines before the first non-whitespace character.
    pub fn leading_newlines(&self) -> usize {
        let lead = self.text.len() - self.text.trim_start().len();
        count_newlines(&self.text[..lead])
    }

    /// Newlines after the first non-whitespace character, separator included.
    pub fn trailing_newlines(&self) -> usize {
        let lead = self.text.len() - self.text.trim_start().len();
        count_newlines(&self.text[lead..]) + count_newlines(self.sep.as_str())
    }

    /// Text plus separator, exactly as it appeared in the source.
    pub fn source(&self) -> String {
        let mut s = String::with_capacity(self.text.len() + 2);
        s.push_str(self.text);
        s.push_str(self.sep.as_str());
        s
    }
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

/// Iterator over the statements of a source text.
pub struct Segmenter<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Segmenter<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Input not yet consumed by a complete statement.
    pub fn remainder(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn emit(&mut self, text_len: usize, sep: Separator, kind: StatementKind) -> Statement<'a> {
        let start = self.pos;
        let text = &self.src[start..start + text_len];
        self.pos = start + text_len + sep.as_str().len();
        Statement { text, sep, kind }
    }
}

impl<'a> Iterator for Segmenter<'a> {
    type Item = Statement<'a>;

    fn next(&mut self) -> Option<Statement<'a>> {
        let rest = &self.src[self.pos..];
        let body = rest.trim_start();
        if body.is_empty() {
            return None;
        }
        let lead = rest.len() - body.len();

        if body.starts_with('#') || body.starts_with("//") {
            let kind = if body.starts_with('#') {
                StatementKind::Directive
            } else {
                StatementKind::LineComment
            };
            let end = body.find('\n')?;
            return Some(self.emit(lead + end, Separator::Newline, kind));
        }

        if let Some(comment) = body.strip_prefix("/*") {
            let end = comment.find("*/")?;
            return Some(self.emit(
                lead + 2 + end,
                Separator::CommentEnd,
                StatementKind::BlockComment,
            ));
        }

        if let Some(m) = ACCESS_LABEL.find(rest) {
            // `protected::x` is a qualified name, not a label
            if !rest[m.end()..].starts_with(':') {
                return Some(self.emit(m.end() - 1, Separator::Colon, StatementKind::AccessLabel));
            }
        }

        let end = rest.find(&['{', '}', ';'][..])?;
        let sep = match rest.as_bytes()[end] {
            b'{' => Separator::OpenBrace,
            b'}' => Separator::CloseBrace,
            _ => Separator::Semicolon,
        };
        Some(self.emit(end, sep, StatementKind::Plain))
    }
}

/// Convenience wrapper returning every statement of `src`.
pub fn segment(src: &str) -> Vec<Statement<'_>> {
    Segmenter::new(src).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rebuild(src: &str) -> String {
        segment(src).iter().map(Statement::source).collect()
    }

    #[test]
    fn test_reconstructs_input() {
        let src = "namespace a {\nclass B : public C {\n public:\n  int x;\n};\n}";
        assert_eq!(rebuild(src), src);
    }

    #[test]
    fn test_directive_braces_are_not_structural() {
        let src = "\n#pragma cyclus var {'default': {'a': 1}}\nint x;";
        let stmts = segment(src);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].kind, StatementKind::Directive);
        assert_eq!(stmts[0].trimmed(), "#pragma cyclus var {'default': {'a': 1}}");
        assert_eq!(stmts[0].sep, Separator::Newline);
        assert_eq!(stmts[1].trimmed(), "int x");
        assert_eq!(stmts[1].sep, Separator::Semicolon);
    }

    #[test]
    fn test_access_label_is_its_own_statement() {
        let stmts = segment("class A {\n  private:\n  int y;");
        assert_eq!(stmts[1].kind, StatementKind::AccessLabel);
        assert_eq!(stmts[1].trimmed(), "private");
        assert_eq!(stmts[1].sep, Separator::Colon);
        assert_eq!(stmts[2].trimmed(), "int y");
    }

    #[test]
    fn test_access_label_directly_after_brace() {
        let stmts = segment("struct A {public: int y;");
        assert_eq!(stmts[1].kind, StatementKind::AccessLabel);
        assert_eq!(stmts[1].trimmed(), "public");
        assert_eq!(stmts[2].trimmed(), "int y");
        assert_eq!(stmts[2].kind, StatementKind::Plain);
    }

    #[test]
    fn test_qualified_name_is_not_access_label() {
        let stmts = segment(" protected::x = 1;");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].kind, StatementKind::Plain);
    }

    #[test]
    fn test_comments() {
        let src = "/* { not a brace } */ int a; // trailing { \n";
        let stmts = segment(src);
        assert_eq!(stmts[0].kind, StatementKind::BlockComment);
        assert_eq!(stmts[0].sep, Separator::CommentEnd);
        assert_eq!(stmts[1].trimmed(), "int a");
        assert_eq!(stmts[2].kind, StatementKind::LineComment);
        assert_eq!(rebuild(src), src);
    }

    #[test]
    fn test_unterminated_tail_is_dropped() {
        let stmts = segment("int a; int b");
        assert_eq!(stmts.len(), 1);
        let mut segmenter = Segmenter::new("int a;\n#pragma cyclus");
        assert_eq!(segmenter.by_ref().count(), 1);
        assert_eq!(segmenter.remainder(), "\n#pragma cyclus");
    }

    #[test]
    fn test_newline_accounting() {
        let stmts = segment("\n\n  int a\n  ;");
        assert_eq!(stmts[0].leading_newlines(), 2);
        assert_eq!(stmts[0].trailing_newlines(), 1);
        let stmts = segment("#define X\n");
        assert_eq!(stmts[0].trailing_newlines(), 1);
    }
}
