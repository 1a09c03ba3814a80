//! Lexical scope tracking by brace depth.
//!
//! Namespaces and classes are pushed with the depth at which they were
//! declared and popped once the depth returns there. Aliases and
//! `using namespace` directives are visible at their depth and deeper and
//! are dropped when a closing brace takes the depth above them.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::trace;

/// Member access in the innermost class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    Private,
}

impl FromStr for Access {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Access::Public),
            "protected" => Ok(Access::Protected),
            "private" => Ok(Access::Private),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
        })
    }
}

#[derive(Debug, Clone)]
struct NamespaceFrame {
    depth: usize,
    /// `None` for anonymous namespaces
    name: Option<String>,
}

#[derive(Debug, Clone)]
struct ClassFrame {
    depth: usize,
    name: String,
    access: Access,
}

/// `name` stands for `target` from `depth` inward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub depth: usize,
    pub target: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeTracker {
    depth: usize,
    namespaces: Vec<NamespaceFrame>,
    classes: Vec<ClassFrame>,
    using_namespaces: Vec<(usize, String)>,
    aliases: Vec<Alias>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn enter_block(&mut self) {
        self.depth += 1;
    }

    pub fn leave_block(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Shift depth by the brace balance of a directive line.
    pub fn shift(&mut self, delta: isize) {
        self.depth = self.depth.saturating_add_signed(delta);
    }

    pub fn push_namespace(&mut self, name: Option<&str>) {
        trace!(depth = self.depth, namespace = ?name, "enter namespace");
        self.namespaces.push(NamespaceFrame {
            depth: self.depth,
            name: name.map(str::to_string),
        });
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    /// Pop the innermost namespace if the depth is back at its opening.
    pub fn close_namespace(&mut self) {
        if self.namespaces.last().is_some_and(|ns| ns.depth == self.depth) {
            let ns = self.namespaces.pop();
            trace!(depth = self.depth, namespace = ?ns.and_then(|ns| ns.name), "leave namespace");
        }
    }

    /// Enter a class body. Access starts out private.
    pub fn push_class(&mut self, name: &str) {
        trace!(depth = self.depth, class = name, "enter class");
        self.classes.push(ClassFrame {
            depth: self.depth,
            name: name.to_string(),
            access: Access::Private,
        });
    }

    /// Pop the innermost class if the depth is back at its declaration.
    /// Forward declarations are popped by the same statement that pushed them.
    pub fn close_class(&mut self) {
        if self.classes.last().is_some_and(|c| c.depth == self.depth) {
            if let Some(class) = self.classes.pop() {
                trace!(depth = self.depth, class = %class.name, "leave class");
            }
        }
    }

    pub fn in_class(&self) -> bool {
        !self.classes.is_empty()
    }

    pub fn access(&self) -> Option<Access> {
        self.classes.last().map(|c| c.access)
    }

    pub fn set_access(&mut self, access: Access) {
        if let Some(class) = self.classes.last_mut() {
            class.access = access;
        }
    }

    pub fn add_using_namespace(&mut self, ns: &str) {
        self.using_namespaces
            .push((self.depth, ns.trim_matches(':').to_string()));
    }

    /// Active `using namespace` directives, innermost first.
    pub fn using_namespaces(&self) -> impl Iterator<Item = &str> {
        self.using_namespaces.iter().rev().map(|(_, ns)| ns.as_str())
    }

    pub fn drop_closed_using_namespaces(&mut self) {
        let depth = self.depth;
        self.using_namespaces.retain(|(d, _)| *d <= depth);
    }

    pub fn add_alias(&mut self, target: &str, name: &str) {
        trace!(depth = self.depth, name, target, "alias");
        self.aliases.push(Alias {
            depth: self.depth,
            target: target.trim().to_string(),
            name: name.trim().to_string(),
        });
    }

    /// Target of the deepest alias called `name`; among aliases at the same
    /// depth the most recent wins. A name qualified by enclosing scopes
    /// (`Bar::Baz` inside `Bar`) finds aliases declared there.
    pub fn alias_target(&self, name: &str) -> Option<&str> {
        if let Some(target) = self.unqualified_alias(name) {
            return Some(target);
        }
        let scope = self.scope_segments(true);
        for end in (1..=scope.len()).rev() {
            for start in 0..end {
                let qualifier = scope[start..end].join("::");
                let rest = strip_scope_prefix(name, &qualifier)
                    .and_then(|rest| rest.strip_prefix("::"));
                if let Some(target) = rest.and_then(|rest| self.unqualified_alias(rest)) {
                    return Some(target);
                }
            }
        }
        None
    }

    fn unqualified_alias(&self, name: &str) -> Option<&str> {
        self.aliases
            .iter()
            .filter(|a| a.name == name)
            .max_by_key(|a| a.depth)
            .map(|a| a.target.as_str())
    }

    pub fn drop_closed_aliases(&mut self) {
        let depth = self.depth;
        self.aliases.retain(|a| a.depth <= depth);
    }

    /// Name segments of every open namespace and class, outermost first.
    fn scope_segments(&self, include_innermost_class: bool) -> Vec<&str> {
        let classes = if include_innermost_class {
            &self.classes[..]
        } else {
            &self.classes[..self.classes.len().saturating_sub(1)]
        };
        self.namespaces
            .iter()
            .filter_map(|ns| ns.name.as_deref())
            .flat_map(|name| name.split("::"))
            .chain(classes.iter().map(|c| c.name.as_str()))
            .collect()
    }

    /// `::`-joined names of all open namespaces and classes.
    pub fn fully_qualified_name(&self) -> String {
        self.scope_segments(true).join("::")
    }

    /// `class` qualified relative to the scope enclosing the innermost
    /// class, for out-of-class member definitions.
    pub fn scoped_name(&self, class: &str) -> String {
        let scope = self.scope_segments(false);
        let path: Vec<&str> = class.split("::").collect();
        let (prefix, last) = path.split_at(path.len().saturating_sub(1));
        let shared = scope
            .iter()
            .zip(prefix)
            .take_while(|(s, c)| s == c)
            .count();
        prefix[shared..]
            .iter()
            .chain(last)
            .copied()
            .collect::<Vec<_>>()
            .join("::")
    }

    /// Resolve a class name as written at the current position to a known
    /// fully qualified name. Tries the name itself, then every enclosing
    /// scope from the innermost out, then each `using namespace`, then
    /// aliases longest first. Returns `None` when nothing matches, when the
    /// alias chain runs deeper than `MAX_RESOLVE_DEPTH`, or after
    /// `MAX_RESOLVE_STEPS` candidates.
    pub fn resolve_class(&self, name: &str, known: &dyn Fn(&str) -> bool) -> Option<String> {
        let mut search = Search {
            visited: HashSet::new(),
            steps: MAX_RESOLVE_STEPS,
        };
        self.resolve_class_from(name, known, true, &mut search, MAX_RESOLVE_DEPTH)
    }

    fn resolve_class_from(
        &self,
        name: &str,
        known: &dyn Fn(&str) -> bool,
        use_namespaces: bool,
        search: &mut Search,
        depth: usize,
    ) -> Option<String> {
        let name = name.trim().trim_matches(':');
        if name.is_empty() {
            return None;
        }
        if known(name) {
            return Some(name.to_string());
        }
        if depth == 0 || search.steps == 0 {
            trace!(name, "class resolution budget exhausted");
            return None;
        }
        search.steps -= 1;
        if !search.visited.insert((name.to_string(), use_namespaces)) {
            return None;
        }

        let scope = self.scope_segments(true);
        for i in (1..=scope.len()).rev() {
            let candidate = format!("{}::{}", scope[..i].join("::"), name);
            if known(&candidate) {
                return Some(candidate);
            }
        }

        if use_namespaces {
            for ns in self.using_namespaces() {
                let candidate = format!("{ns}::{name}");
                if let Some(found) =
                    self.resolve_class_from(&candidate, known, false, search, depth - 1)
                {
                    return Some(found);
                }
            }
        }

        let mut aliases: Vec<&Alias> = self.aliases.iter().collect();
        aliases.sort_by_key(|a| std::cmp::Reverse(a.name.len()));
        for alias in aliases {
            let Some(rest) = strip_scope_prefix(name, &alias.name) else {
                continue;
            };
            let candidate = format!("{}{}", alias.target, rest);
            if let Some(found) =
                self.resolve_class_from(&candidate, known, use_namespaces, search, depth - 1)
            {
                return Some(found);
            }
        }
        None
    }
}

/// Longest alias chain followed by `resolve_class`.
const MAX_RESOLVE_DEPTH: usize = 32;
/// Candidate names `resolve_class` tries before giving up.
const MAX_RESOLVE_STEPS: usize = 1024;

struct Search {
    visited: HashSet<(String, bool)>,
    steps: usize,
}

/// `Some(rest)` when `name` is `prefix` or starts with `prefix::`.
fn strip_scope_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with("::")).then_some(rest)
}
