//! Pass 3: expand generator directives into method definitions.
//!
//! Directive forms:
//!
//! ```text
//! #pragma cyclus [def|decl|impl] <generator> [class]
//! #pragma cyclus [def|decl|impl]
//! ```
//!
//! The first expands one generator for `class` (default: the innermost
//! enclosing class). The second expands every generator for the enclosing
//! class, in the order of [`GENERATORS`].

pub mod generators;
pub mod literal;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::chain::{Chain, Filter, Machine};
use crate::error::{CycppError, Result};
use crate::filters::{
    scope_filters, DirectiveErrorFilter, LinemarkerFilter, VarDeclarationFilter, VarFilter,
};
use crate::segment::{Segmenter, Statement};
use crate::table::{ClassRecord, ClassTable};

pub use generators::GENERATORS;

/// Directive names of every generator, in expansion order.
pub const GENERATOR_NAMES: &[&str] = &[
    "initfromcopy",
    "initfromdb",
    "infiletodb",
    "clone",
    "schema",
    "annotations",
    "initinv",
    "snapshotinv",
    "snapshot",
];

static GENERATOR_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s*pragma\s+cyclus(?:\s+(def|decl|impl))?\s+(\w+)(?:\s+([\w:.]+))?\s*$")
        .expect("generator directive regex")
});

static FAN_OUT_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s*pragma\s+cyclus(?:\s+(def|decl|impl))?\s*$").expect("fan-out regex")
});

/// What part of a method a directive expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Signature only, terminated by `;`.
    Decl,
    /// Signature, body and closing brace.
    Def,
    /// Body only.
    Impl,
}

impl Mode {
    fn from_keyword(keyword: Option<&str>) -> Self {
        match keyword {
            Some("decl") => Mode::Decl,
            Some("impl") => Mode::Impl,
            _ => Mode::Def,
        }
    }
}

/// Everything a generator body may read.
pub struct GenContext<'a> {
    /// Fully qualified target class.
    pub class: &'a str,
    /// Target class as it should be spelled at the directive.
    pub display: &'a str,
    pub record: &'a ClassRecord,
    pub table: &'a ClassTable,
    /// Indentation of body lines.
    pub indent: &'a str,
    pub wrap_width: usize,
}

impl GenContext<'_> {
    /// Framework roles whose generated method the body must call first.
    pub fn roles(&self) -> Vec<String> {
        self.table.closest_roles(self.class)
    }

    pub fn unsupported(&self, generator: &str, member: &str, ty: impl ToString) -> CycppError {
        CycppError::unsupported(generator, self.class, member, ty)
    }

    pub fn invalid(&self, member: &str, reason: impl Into<String>) -> CycppError {
        CycppError::invalid_annotation(self.class, member, reason)
    }
}

/// One of the method generators.
pub trait Generator: Sync {
    /// Name used in directives and in per-variable override keys.
    fn directive(&self) -> &'static str;

    fn method_name(&self) -> &'static str;

    fn return_type(&self) -> &'static str {
        "void"
    }

    fn args(&self, ctx: &GenContext<'_>) -> String {
        let _ = ctx;
        String::new()
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String>;
}

/// Expand `generator` at the current position of `m`.
fn expand(
    generator: &dyn Generator,
    mode: Mode,
    target: Option<&str>,
    stmt: &Statement<'_>,
    m: &mut Machine,
) -> Result<String> {
    let local = m
        .scope
        .in_class()
        .then(|| m.scope.fully_qualified_name());
    let class = match target {
        Some(name) => {
            let name = name.replace('.', "::");
            let table = &m.table;
            m.scope
                .resolve_class(&name, &|n| table.is_known(n) || table.record(n).is_some())
                .ok_or_else(|| CycppError::UnresolvedClass {
                    location: m.location(Some(stmt.trimmed())),
                    name,
                })?
        }
        None => local.clone().ok_or_else(|| CycppError::UnresolvedClass {
            location: m.location(Some(stmt.trimmed())),
            name: String::new(),
        })?,
    };

    m.table.ensure_record(&class);
    let in_class_body = local.as_deref() == Some(class.as_str());
    let display = m.scope.scoped_name(&class);
    let depth = m.scope.depth().saturating_sub(m.scope.namespace_count());
    let indent = " ".repeat(2 * depth);
    let body_indent = " ".repeat(2 * depth + 2);

    let Some(record) = m.table.record(&class) else {
        return Ok(String::new());
    };
    let ctx = GenContext {
        class: &class,
        display: &display,
        record,
        table: &m.table,
        indent: &body_indent,
        wrap_width: m.wrap_width,
    };

    let mut body = String::new();
    if mode != Mode::Decl {
        body = generator.body(&ctx)?;
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
    }
    debug!(generator = generator.directive(), class = %class, ?mode, "generated method");
    if mode == Mode::Impl {
        return Ok(body);
    }

    let (virt, qualifier) = if in_class_body {
        ("virtual ", String::new())
    } else {
        ("", format!("{display}::"))
    };
    let end = if mode == Mode::Decl { ";" } else { " {" };
    let mut out = format!(
        "\n{indent}{virt}{rtn} {qualifier}{name}({args}){end}\n",
        rtn = generator.return_type(),
        name = generator.method_name(),
        args = generator.args(&ctx),
    );
    out.push_str(&body);
    if mode != Mode::Decl {
        out.push_str(&indent);
        out.push_str("};\n");
    }
    Ok(out)
}

/// Claims directives naming one generator.
pub struct GeneratorFilter {
    generator: &'static dyn Generator,
}

impl GeneratorFilter {
    pub fn new(generator: &'static dyn Generator) -> Self {
        Self { generator }
    }
}

impl Filter for GeneratorFilter {
    fn name(&self) -> &'static str {
        self.generator.directive()
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_directive()
            && GENERATOR_DIRECTIVE
                .captures(stmt.trimmed())
                .is_some_and(|caps| &caps[2] == self.generator.directive())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        let Some(caps) = GENERATOR_DIRECTIVE.captures(stmt.trimmed()) else {
            return Ok(None);
        };
        let mode = Mode::from_keyword(caps.get(1).map(|k| k.as_str()));
        let target = caps.get(3).map(|t| t.as_str());
        expand(self.generator, mode, target, stmt, m).map(Some)
    }
}

/// Claims bare directives and expands every generator for the enclosing
/// class.
pub struct FanOutFilter;

impl Filter for FanOutFilter {
    fn name(&self) -> &'static str {
        "fan-out"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_directive() && FAN_OUT_DIRECTIVE.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        let Some(caps) = FAN_OUT_DIRECTIVE.captures(stmt.trimmed()) else {
            return Ok(None);
        };
        let mode = Mode::from_keyword(caps.get(1).map(|k| k.as_str()));
        let mut out = String::new();
        for generator in GENERATORS {
            out.push_str(&expand(*generator, mode, None, stmt, m)?);
        }
        Ok(Some(out))
    }
}

/// The pass 3 chain.
pub fn generator_chain() -> Chain {
    let mut filters: Vec<Box<dyn Filter>> = GENERATORS
        .iter()
        .map(|g| Box::new(GeneratorFilter::new(*g)) as Box<dyn Filter>)
        .collect();
    filters.extend(scope_filters(false));
    filters.extend([
        Box::new(VarFilter) as Box<dyn Filter>,
        Box::new(VarDeclarationFilter),
        Box::new(LinemarkerFilter),
        Box::new(FanOutFilter),
        Box::new(DirectiveErrorFilter::strict()),
    ]);
    Chain::new(filters)
}

/// Run pass 3 over `source`, replacing every generator directive.
pub fn generate_code(source: &str, table: ClassTable, wrap_width: usize) -> Result<String> {
    let mut chain = generator_chain();
    let mut machine = Machine::generator(table, wrap_width);
    let mut out = String::with_capacity(source.len());
    let mut segmenter = Segmenter::new(source);
    let mut statements = 0usize;
    for stmt in segmenter.by_ref() {
        match chain.feed(&stmt, &mut machine)? {
            Some(replacement) => out.push_str(&replacement),
            None => {
                out.push_str(stmt.text);
                out.push_str(stmt.sep.as_str());
            }
        }
        statements += 1;
    }
    out.push_str(segmenter.remainder());
    info!(statements, bytes = out.len(), "generated code");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_names_match_generators() {
        let names: Vec<&str> = GENERATORS.iter().map(|g| g.directive()).collect();
        assert_eq!(names, GENERATOR_NAMES);
    }

    #[test]
    fn test_chain_order() {
        let names = generator_chain().names();
        assert_eq!(&names[..9], GENERATOR_NAMES);
        assert_eq!(names[9], "class");
        assert_eq!(names.last(), Some(&"directive-error"));
    }

    #[test]
    fn test_directive_forms() {
        let caps = GENERATOR_DIRECTIVE
            .captures("#pragma cyclus decl clone fac.Sink")
            .unwrap();
        assert_eq!(&caps[1], "decl");
        assert_eq!(&caps[2], "clone");
        assert_eq!(&caps[3], "fac.Sink");
        assert!(FAN_OUT_DIRECTIVE.is_match("#pragma cyclus impl"));
        assert!(FAN_OUT_DIRECTIVE.is_match("#  pragma cyclus"));
        assert!(!FAN_OUT_DIRECTIVE.is_match("#pragma cyclus var {}"));
    }

    #[test]
    fn test_passthrough_without_directives() {
        let src = "namespace a {\nclass B {\n public:\n  int x;\n};\n}  // end\n";
        let out = generate_code(src, ClassTable::new(), 50).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_unknown_target() {
        let src = "\n#pragma cyclus def clone Missing\n";
        let err = generate_code(src, ClassTable::new(), 50).unwrap_err();
        assert!(matches!(err, CycppError::UnresolvedClass { name, .. } if name == "Missing"));
    }

    #[test]
    fn test_bare_directive_outside_class() {
        let err = generate_code("\n#pragma cyclus\n", ClassTable::new(), 50).unwrap_err();
        assert!(matches!(err, CycppError::UnresolvedClass { .. }));
    }
}
