//! `#pragma cyclus` argument directives and the declarations they annotate.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::chain::{Filter, Machine, Pass};
use crate::codegen::GENERATOR_NAMES;
use crate::error::{CycppError, Result};
use crate::scope::Access;
use crate::segment::Statement;
use crate::types::{canonicalize, catalogue};

static EXEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^#\s*pragma\s+cyclus\s+exec\s+(.*)$").expect("exec regex"));

static NOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^#\s*pragma\s+cyclus\s+note\s+(.*)$").expect("note regex"));

static VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^#\s*pragma\s+cyclus\s+var\s+(.*)$").expect("var regex"));

static DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.*\S)\s+(\w+)$").expect("declaration regex"));

static ANY_PRAGMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^#\s*pragma\s+cyclus(.*)$").expect("pragma regex"));

fn argument<'a>(re: &Regex, stmt: &Statement<'a>) -> Option<&'a str> {
    re.captures(stmt.trimmed())
        .and_then(|caps| caps.get(1))
        .map(|arg| arg.as_str())
}

/// `exec <statements>`: run against the persistent exec namespace.
pub struct ExecFilter;

impl Filter for ExecFilter {
    fn name(&self) -> &'static str {
        "exec"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_directive() && EXEC.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        if let Some(code) = argument(&EXEC, stmt) {
            m.exec(code)?;
        }
        Ok(None)
    }
}

/// `note <mapping>`: deep-merge into the enclosing class's record.
pub struct NoteFilter;

impl Filter for NoteFilter {
    fn name(&self) -> &'static str {
        "note"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_directive() && NOTE.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        let Some(arg) = argument(&NOTE, stmt) else {
            return Ok(None);
        };
        if !m.scope.in_class() {
            return Err(CycppError::NoteOutsideClass {
                location: m.location(Some(stmt.trimmed())),
            });
        }
        let note = m.eval_mapping(arg)?;
        let class = m.scope.fully_qualified_name();
        m.table.ensure_record(&class).merge_note(note);
        Ok(None)
    }
}

/// `var <mapping>`: hold the annotation for the next member declaration.
/// In pass 3 only the fact that a declaration is annotated matters.
pub struct VarFilter;

impl Filter for VarFilter {
    fn name(&self) -> &'static str {
        "var"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_directive() && VAR.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        if m.pass == Pass::Generate {
            m.pending_var = Some(Default::default());
            return Ok(None);
        }
        let Some(arg) = argument(&VAR, stmt) else {
            return Ok(None);
        };
        if !m.scope.in_class() {
            return Err(CycppError::VarOutsideClass {
                location: m.location(Some(stmt.trimmed())),
            });
        }
        m.pending_var = Some(m.eval_mapping(arg)?);
        Ok(None)
    }
}

/// Drop an initializer at the first `=` outside template brackets.
fn strip_initializer(text: &str) -> &str {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            '=' if depth == 0 => return text[..i].trim_end(),
            _ => {}
        }
    }
    text
}

fn split_declaration(stmt: &Statement<'_>) -> Option<(String, String)> {
    let caps = DECLARATION.captures(strip_initializer(stmt.trimmed()))?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// A member declaration consuming a pending `var` annotation.
pub struct VarDeclarationFilter;

impl VarDeclarationFilter {
    fn record(&self, stmt: &Statement<'_>, m: &mut Machine, fields: Map<String, Value>) -> Result<()> {
        let Some((spelled, member)) = split_declaration(stmt) else {
            return Ok(());
        };
        let class = m.scope.fully_qualified_name();
        if m.scope.access() != Some(Access::Public) {
            warn!(class = %class, member = %member, "skipping non-public state variable");
            return Ok(());
        }
        let Some(ty) = canonicalize(&m.scope, &spelled) else {
            return Err(CycppError::Type {
                location: m.location(Some(stmt.trimmed())),
                class,
                member,
                spelled,
                catalogue: catalogue(),
            });
        };
        debug!(class = %class, member = %member, ty = %ty, "state variable");
        m.table.ensure_record(&class).add_variable(&member, ty, fields);
        Ok(())
    }

    fn shape_member(&self, stmt: &Statement<'_>, m: &Machine) -> Option<String> {
        let (_, member) = split_declaration(stmt)?;
        let class = m.scope.fully_qualified_name();
        m.table
            .record(&class)?
            .variable(&member)?
            .shape()?;
        Some(format!(
            "{}{}\n  std::vector<int> cycpp_shape_{member};\n",
            stmt.text, stmt.sep
        ))
    }
}

impl Filter for VarDeclarationFilter {
    fn name(&self) -> &'static str {
        "var-declaration"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_plain() && split_declaration(stmt).is_some()
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        let Some(fields) = m.pending_var.take() else {
            return Ok(None);
        };
        match m.pass {
            Pass::Accumulate => {
                self.record(stmt, m, fields)?;
                Ok(None)
            }
            Pass::Generate => Ok(self.shape_member(stmt, m)),
        }
    }
}

/// Catch-all for `#pragma cyclus` directives no other filter claimed.
pub struct DirectiveErrorFilter {
    accepted: Vec<&'static str>,
}

impl DirectiveErrorFilter {
    /// Pass 2: generator directives are checked later, so they pass.
    pub fn lenient() -> Self {
        let mut accepted = vec!["var", "note", "exec", "decl", "def", "impl"];
        accepted.extend(GENERATOR_NAMES.iter().copied());
        Self { accepted }
    }

    /// Pass 3: every generator directive should have been claimed already.
    pub fn strict() -> Self {
        Self {
            accepted: vec!["var", "note", "exec"],
        }
    }
}

impl Filter for DirectiveErrorFilter {
    fn name(&self) -> &'static str {
        "directive-error"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        if !stmt.is_directive() {
            return false;
        }
        let Some(rest) = argument(&ANY_PRAGMA, stmt) else {
            return false;
        };
        // `#pragma cyclusfoo` is some other pragma
        if !rest.starts_with(char::is_whitespace) {
            return false;
        }
        rest.split_whitespace()
            .next()
            .is_some_and(|word| !self.accepted.contains(&word))
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        Err(CycppError::MalformedDirective {
            location: m.location(Some(stmt.trimmed())),
            statement: stmt.trimmed().to_string(),
        })
    }
}
