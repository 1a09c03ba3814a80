//! Filters that track lexical structure: classes, access labels,
//! namespaces, aliases and line markers.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::chain::{Filter, Machine};
use crate::error::Result;
use crate::segment::{Separator, Statement, StatementKind};
use crate::types::split_top_level;

static CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:template\s*<[\s\w,]*>\s*)?(?:class|struct)\s+(\w+)(?:\s+final)?(?:\s*:([\s\w,:]+))?",
    )
    .expect("class regex")
});

static ACCESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(public|private|protected)\s*:?$").expect("access regex"));

static USING_NAMESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^using\s+namespace\s+([\w:]+)$").expect("using namespace regex")
});

static NAMESPACE_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^namespace\s+(\w+)\s*=\s*([\w:]+)$").expect("namespace alias regex")
});

static NAMESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:inline\s+)?namespace(?:\s+([\w:]+))?$").expect("namespace regex")
});

static TYPEDEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^typedef\s+(.+)$").expect("typedef regex"));

static DECLARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.*[^\s*&])[\s*&]+(\w+)$").expect("declarator regex"));

static USING_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^using\s+(?:typename\s+)?((?:\w+)?(?:::\w+)+)$").expect("using regex")
});

static USING_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^using\s+(\w+)\s*=\s*(?:typename\s+)?(.+)$").expect("using alias regex")
});

static LINEMARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^#\s*(?:line\s+)?(\d+)(?:\s+"((?:[^"\\]|\\.)*)")?((?:\s+\d+)*)\s*$"#)
        .expect("linemarker regex")
});

fn is_code(stmt: &Statement<'_>) -> bool {
    matches!(stmt.kind, StatementKind::Plain | StatementKind::AccessLabel)
}

/// Class and struct heads. In pass 2 it also records the resolved bases.
pub struct ClassFilter {
    track_bases: bool,
}

impl ClassFilter {
    pub fn with_bases() -> Self {
        Self { track_bases: true }
    }

    pub fn without_bases() -> Self {
        Self { track_bases: false }
    }
}

impl Filter for ClassFilter {
    fn name(&self) -> &'static str {
        "class"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_plain() && CLASS.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        let Some(caps) = CLASS.captures(stmt.trimmed()) else {
            return Ok(None);
        };
        m.scope.push_class(&caps[1]);
        if !self.track_bases {
            return Ok(None);
        }

        let class = m.scope.fully_qualified_name();
        let specifiers = caps.get(2).map(|b| b.as_str()).unwrap_or_default();
        let table = &m.table;
        // unresolvable bases are expected for classes outside the framework
        let bases: Vec<String> = specifiers
            .split(',')
            .filter_map(|spec| spec.split_whitespace().last())
            .filter_map(|base| m.scope.resolve_class(base, &|n| table.is_known(n)))
            .collect();
        m.table.declare_class(&class, bases);
        Ok(None)
    }

    fn revert(&mut self, _stmt: &Statement<'_>, m: &mut Machine) {
        m.scope.close_class();
    }
}

pub struct AccessFilter;

impl Filter for AccessFilter {
    fn name(&self) -> &'static str {
        "access"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        is_code(stmt) && ACCESS.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        if let Some(access) = ACCESS
            .captures(stmt.trimmed())
            .and_then(|caps| caps[1].parse().ok())
        {
            m.scope.set_access(access);
        }
        Ok(None)
    }
}

pub struct UsingNamespaceFilter;

impl Filter for UsingNamespaceFilter {
    fn name(&self) -> &'static str {
        "using-namespace"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_plain() && USING_NAMESPACE.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        if let Some(caps) = USING_NAMESPACE.captures(stmt.trimmed()) {
            m.scope.add_using_namespace(&caps[1]);
        }
        Ok(None)
    }

    fn revert(&mut self, stmt: &Statement<'_>, m: &mut Machine) {
        if stmt.sep == Separator::CloseBrace {
            m.scope.drop_closed_using_namespaces();
        }
    }
}

/// Drop aliases declared in a block that just closed.
fn revert_aliases(stmt: &Statement<'_>, m: &mut Machine) {
    if stmt.sep == Separator::CloseBrace {
        m.scope.drop_closed_aliases();
    }
}

pub struct NamespaceAliasFilter;

impl Filter for NamespaceAliasFilter {
    fn name(&self) -> &'static str {
        "namespace-alias"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_plain() && NAMESPACE_ALIAS.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        if let Some(caps) = NAMESPACE_ALIAS.captures(stmt.trimmed()) {
            m.scope.add_alias(&caps[2], &caps[1]);
        }
        Ok(None)
    }

    fn revert(&mut self, stmt: &Statement<'_>, m: &mut Machine) {
        revert_aliases(stmt, m);
    }
}

pub struct NamespaceFilter;

impl Filter for NamespaceFilter {
    fn name(&self) -> &'static str {
        "namespace"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_plain() && NAMESPACE.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        if let Some(caps) = NAMESPACE.captures(stmt.trimmed()) {
            m.scope.push_namespace(caps.get(1).map(|n| n.as_str()));
        }
        Ok(None)
    }

    fn revert(&mut self, _stmt: &Statement<'_>, m: &mut Machine) {
        m.scope.close_namespace();
    }
}

/// `typedef T a, b` makes `a` and `b` aliases of `T`. Compound typedefs of
/// inline struct bodies are not tracked.
pub struct TypedefFilter;

impl Filter for TypedefFilter {
    fn name(&self) -> &'static str {
        "typedef"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_plain() && TYPEDEF.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        let Some(caps) = TYPEDEF.captures(stmt.trimmed()) else {
            return Ok(None);
        };
        let declarators = split_top_level(&caps[1]);
        let Some((first, others)) = declarators.split_first() else {
            return Ok(None);
        };
        let Some(decl) = DECLARATOR.captures(first) else {
            return Ok(None);
        };
        let target = &decl[1];
        m.scope.add_alias(target, &decl[2]);
        for other in others {
            let name = other.trim_start_matches(['*', '&', ' ']);
            if !name.is_empty() {
                m.scope.add_alias(target, name);
            }
        }
        Ok(None)
    }

    fn revert(&mut self, stmt: &Statement<'_>, m: &mut Machine) {
        revert_aliases(stmt, m);
    }
}

/// `using a::b` aliases `b`; `using A = T` aliases `A`.
pub struct UsingFilter;

impl Filter for UsingFilter {
    fn name(&self) -> &'static str {
        "using"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        let text = stmt.trimmed();
        stmt.is_plain() && (USING_DECLARATION.is_match(text) || USING_ALIAS.is_match(text))
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        let text = stmt.trimmed();
        if let Some(caps) = USING_ALIAS.captures(text) {
            m.scope.add_alias(caps[2].trim(), &caps[1]);
        } else if let Some(caps) = USING_DECLARATION.captures(text) {
            let target = &caps[1];
            if let Some((_, name)) = target.rsplit_once("::") {
                m.scope.add_alias(target, name);
            }
        }
        Ok(None)
    }

    fn revert(&mut self, stmt: &Statement<'_>, m: &mut Machine) {
        revert_aliases(stmt, m);
    }
}

/// `# <line> "<file>" [flags]` and `#line <line> ["<file>"]` markers.
pub struct LinemarkerFilter;

impl Filter for LinemarkerFilter {
    fn name(&self) -> &'static str {
        "linemarker"
    }

    fn matches(&self, stmt: &Statement<'_>) -> bool {
        stmt.is_directive() && LINEMARKER.is_match(stmt.trimmed())
    }

    fn transform(&mut self, stmt: &Statement<'_>, m: &mut Machine) -> Result<Option<String>> {
        let Some(caps) = LINEMARKER.captures(stmt.trimmed()) else {
            return Ok(None);
        };
        let Ok(line) = caps[1].parse::<usize>() else {
            return Ok(None);
        };
        let flags: Vec<u32> = caps[3]
            .split_whitespace()
            .filter_map(|f| f.parse().ok())
            .collect();
        let file = caps.get(2).map(|f| f.as_str());
        trace!(line, ?file, ?flags, "line marker");
        m.locations.mark(line, file, &flags);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::segment::segment;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> Machine {
        let mut chain = Chain::new(vec![
            Box::new(ClassFilter::with_bases()),
            Box::new(AccessFilter),
            Box::new(UsingNamespaceFilter),
            Box::new(NamespaceAliasFilter),
            Box::new(NamespaceFilter),
            Box::new(TypedefFilter),
            Box::new(UsingFilter),
            Box::new(LinemarkerFilter),
        ]);
        let mut m = Machine::accumulator();
        for stmt in segment(src) {
            chain.feed(&stmt, &mut m).unwrap();
        }
        m
    }

    #[test]
    fn test_bases_are_resolved_in_scope() {
        let m = run(
            "namespace cyclus { class Agent {}; class Facility : public Agent {}; }\n\
             namespace fac { class Sink : public cyclus::Facility, private Unknown {}; }",
        );
        assert_eq!(
            m.table.parents("fac::Sink").into_iter().collect::<Vec<_>>(),
            vec!["cyclus::Facility"]
        );
        assert_eq!(
            m.table.parents("cyclus::Facility").into_iter().collect::<Vec<_>>(),
            vec!["cyclus::Agent"]
        );
        assert_eq!(m.scope.depth(), 0);
        assert!(!m.scope.in_class());
    }

    #[test]
    fn test_typedef_and_using_aliases() {
        let m = run(
            "typedef std::map<int, double> Table, *TablePtr;\n\
             using Name = std::string;\n\
             using cyclus::Material;\n\
             namespace cy = cyclus;\n",
        );
        assert_eq!(m.scope.alias_target("Table"), Some("std::map<int, double>"));
        assert_eq!(m.scope.alias_target("TablePtr"), Some("std::map<int, double>"));
        assert_eq!(m.scope.alias_target("Name"), Some("std::string"));
        assert_eq!(m.scope.alias_target("Material"), Some("cyclus::Material"));
        assert_eq!(m.scope.alias_target("cy"), Some("cyclus"));
    }

    #[test]
    fn test_nested_alias_reverts_after_block() {
        let m = run("typedef int T;\nnamespace inner {\n  typedef double T;\n}\n");
        assert_eq!(m.scope.alias_target("T"), Some("int"));
    }

    #[test]
    fn test_access_labels() {
        let mut chain = Chain::new(vec![Box::new(ClassFilter::with_bases()), Box::new(AccessFilter)]);
        let mut m = Machine::accumulator();
        let stmts = segment("class A {\n public:\n  int x;");
        for stmt in &stmts[..2] {
            chain.feed(stmt, &mut m).unwrap();
        }
        assert_eq!(m.scope.access(), Some(crate::scope::Access::Public));
    }

    #[test]
    fn test_linemarkers_track_includes() {
        let m = run("# 1 \"agent.cc\"\n# 1 \"agent.h\" 1\nclass A {};\n# 4 \"agent.cc\" 2\n\nint x;");
        assert_eq!(m.locations.frames().len(), 1);
        assert_eq!(m.locations.current(), Some(("agent.cc", 5)));
    }
}
