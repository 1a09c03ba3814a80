//! State variable type system.
//!
//! Spelled types from member declarations are reduced to a canonical form
//! drawn from a fixed catalogue of primitives, resources, buffers and
//! fixed-arity templates. Aliases and `using namespace` directives from the
//! enclosing scopes are applied while resolving.

use std::fmt;

use serde_json::Value;

use crate::scope::ScopeTracker;

/// Namespace of the agent framework the generated code targets.
pub const FRAMEWORK_NS: &str = "cyclus";

pub const PRIMITIVES: &[&str] = &[
    "bool",
    "int",
    "float",
    "double",
    "std::string",
    "cyclus::Blob",
    "boost::uuids::uuid",
];

pub const RESOURCES: &[&str] = &["cyclus::Resource", "cyclus::Material", "cyclus::Product"];

/// Buffer holding untyped resources, moved with `PopN`/`PushAll`.
pub const RESOURCE_BUFF: &str = "cyclus::toolkit::ResourceBuff";

/// Templated buffer, moved with `PopNRes`/`Push`.
pub const RES_BUF: &str = "cyclus::toolkit::ResBuf";

/// Known templates and their arity.
pub const TEMPLATES: &[(&str, usize)] = &[
    ("std::vector", 1),
    ("std::set", 1),
    ("std::list", 1),
    ("std::pair", 2),
    ("std::map", 2),
    (RES_BUF, 1),
];

const MAX_RESOLVE_DEPTH: usize = 32;

/// Which buffer API a buffer-typed variable uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// `ResourceBuff`: untyped elements
    Untyped,
    /// `ResBuf<R>`: templated elements
    Templated,
}

/// A fully resolved state variable type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    Atom(String),
    Template { head: String, args: Vec<CanonicalType> },
}

impl CanonicalType {
    pub fn atom(name: &str) -> Self {
        CanonicalType::Atom(name.to_string())
    }

    pub fn template(head: &str, args: Vec<CanonicalType>) -> Self {
        CanonicalType::Template {
            head: head.to_string(),
            args,
        }
    }

    /// Atom name or template head.
    pub fn head(&self) -> &str {
        match self {
            CanonicalType::Atom(name) => name,
            CanonicalType::Template { head, .. } => head,
        }
    }

    pub fn arg(&self, i: usize) -> Option<&CanonicalType> {
        match self {
            CanonicalType::Atom(_) => None,
            CanonicalType::Template { args, .. } => args.get(i),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, CanonicalType::Atom(name) if PRIMITIVES.contains(&name.as_str()))
    }

    pub fn buffer_kind(&self) -> Option<BufferKind> {
        match self {
            CanonicalType::Atom(name) if name == RESOURCE_BUFF => Some(BufferKind::Untyped),
            CanonicalType::Template { head, .. } if head == RES_BUF => Some(BufferKind::Templated),
            _ => None,
        }
    }

    pub fn is_buffer(&self) -> bool {
        self.buffer_kind().is_some()
    }

    /// Structured form used in annotations: a string for atoms, a list of
    /// head followed by arguments for templates.
    pub fn to_value(&self) -> Value {
        match self {
            CanonicalType::Atom(name) => Value::String(name.clone()),
            CanonicalType::Template { head, args } => {
                let mut items = vec![Value::String(head.clone())];
                items.extend(args.iter().map(CanonicalType::to_value));
                Value::Array(items)
            }
        }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalType::Atom(name) => f.write_str(name),
            CanonicalType::Template { head, args } => {
                write!(f, "{head}< ")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(" >")
            }
        }
    }
}

/// A type as spelled in source, split into template structure but not yet
/// resolved against the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Name(String),
    Template { head: String, args: Vec<TypeExpr> },
}

impl TypeExpr {
    pub fn parse(spelled: &str) -> TypeExpr {
        let s = normalize(spelled);
        let (Some(open), Some(close)) = (s.find('<'), s.rfind('>')) else {
            return TypeExpr::Name(s);
        };
        if close < open {
            return TypeExpr::Name(s);
        }
        let head = normalize(&s[..open]);
        let args = split_top_level(&s[open + 1..close])
            .into_iter()
            .map(TypeExpr::parse)
            .collect();
        TypeExpr::Template { head, args }
    }
}

/// Collapse whitespace and strip leading/trailing scope operators.
pub fn normalize(spelled: &str) -> String {
    let collapsed = spelled.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_matches(':').trim().to_string()
}

/// Split on commas that are not nested inside `<>` or `()`.
pub fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

fn template_arity(head: &str) -> Option<usize> {
    TEMPLATES
        .iter()
        .find(|(name, _)| *name == head)
        .map(|(_, arity)| *arity)
}

fn is_supported_atom(name: &str) -> bool {
    PRIMITIVES.contains(&name) || RESOURCES.contains(&name) || name == RESOURCE_BUFF
}

fn segments(name: &str) -> usize {
    name.split("::").count()
}

/// Every supported atom and template, for error messages.
pub fn catalogue() -> String {
    let mut names: Vec<String> = PRIMITIVES
        .iter()
        .chain(RESOURCES)
        .chain(std::iter::once(&RESOURCE_BUFF))
        .map(|s| s.to_string())
        .collect();
    names.extend(TEMPLATES.iter().map(|(head, arity)| {
        let params = match arity {
            1 => "T",
            _ => "T1, T2",
        };
        format!("{head}<{params}>")
    }));
    names.sort();
    names.join(", ")
}

/// Resolve a spelled type against the aliases and `using namespace`
/// directives visible in `scope`. `None` means the type is not supported.
pub fn canonicalize(scope: &ScopeTracker, spelled: &str) -> Option<CanonicalType> {
    resolve(scope, &TypeExpr::parse(spelled), MAX_RESOLVE_DEPTH)
}

fn resolve(scope: &ScopeTracker, expr: &TypeExpr, budget: usize) -> Option<CanonicalType> {
    if budget == 0 {
        return None;
    }
    match expr {
        TypeExpr::Name(name) => resolve_name(scope, name, budget),
        TypeExpr::Template { head, args } => resolve_template(scope, head, args, budget),
    }
}

fn resolve_name(scope: &ScopeTracker, name: &str, budget: usize) -> Option<CanonicalType> {
    if is_supported_atom(name) {
        return Some(CanonicalType::atom(name));
    }
    if let Some(target) = scope.alias_target(name) {
        return resolve(scope, &TypeExpr::parse(target), budget - 1);
    }
    scope
        .using_namespaces()
        .filter(|ns| segments(name) <= segments(ns))
        .find_map(|ns| resolve(scope, &TypeExpr::Name(format!("{ns}::{name}")), budget - 1))
}

fn resolve_template(
    scope: &ScopeTracker,
    head: &str,
    args: &[TypeExpr],
    budget: usize,
) -> Option<CanonicalType> {
    if let Some(arity) = template_arity(head) {
        if args.len() != arity {
            return None;
        }
        let args = args
            .iter()
            .map(|arg| resolve(scope, arg, budget - 1))
            .collect::<Option<Vec<_>>>()?;
        if head == RES_BUF && !RESOURCES.contains(&args[0].head()) {
            return None;
        }
        return Some(CanonicalType::template(head, args));
    }
    if let Some(target) = scope.alias_target(head) {
        if target.contains('<') {
            return None;
        }
        let retry = TypeExpr::Template {
            head: normalize(target),
            args: args.to_vec(),
        };
        return resolve(scope, &retry, budget - 1);
    }
    scope
        .using_namespaces()
        .filter(|ns| segments(head) <= segments(ns))
        .find_map(|ns| {
            let retry = TypeExpr::Template {
                head: format!("{ns}::{head}"),
                args: args.to_vec(),
            };
            resolve(scope, &retry, budget - 1)
        })
}
