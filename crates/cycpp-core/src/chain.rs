//! Filter chain dispatch and the state shared by its filters.
//!
//! Every statement is offered to the filters in order and the first one
//! whose recognizer accepts it transforms it. Depth is then adjusted for
//! the statement's separator, and every filter gets a chance to revert
//! scoped state whose owning block just closed.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::location::IncludeStack;
use crate::scope::ScopeTracker;
use crate::script::{self, Env};
use crate::segment::{Separator, Statement};
use crate::table::{deep_merge, ClassTable};

/// Which pass a machine is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Pass 2: build the class table.
    Accumulate,
    /// Pass 3: expand generator directives.
    Generate,
}

/// State threaded through every filter of a pass.
#[derive(Debug)]
pub struct Machine {
    pub pass: Pass,
    pub scope: ScopeTracker,
    pub table: ClassTable,
    /// Names assigned by `exec` directives.
    pub exec_ns: Map<String, Value>,
    /// Annotation waiting for the next member declaration.
    pub pending_var: Option<Map<String, Value>>,
    pub locations: IncludeStack,
    pub wrap_width: usize,
}

impl Machine {
    pub fn accumulator() -> Self {
        Self::new(Pass::Accumulate, ClassTable::new(), 0)
    }

    pub fn generator(table: ClassTable, wrap_width: usize) -> Self {
        Self::new(Pass::Generate, table, wrap_width)
    }

    fn new(pass: Pass, table: ClassTable, wrap_width: usize) -> Self {
        Self {
            pass,
            scope: ScopeTracker::new(),
            table,
            exec_ns: Map::new(),
            pending_var: None,
            locations: IncludeStack::new(),
            wrap_width,
        }
    }

    /// Include stack and snippet for diagnostics; empty without line markers.
    pub fn location(&self, statement: Option<&str>) -> String {
        self.locations.render(statement)
    }

    /// Evaluate a `var`/`note` argument. The current class's variables are
    /// searched first, then every recorded class by path, then `exec` names.
    pub fn eval_mapping(&self, src: &str) -> Result<Map<String, Value>> {
        let current = self.scope.fully_qualified_name();
        let locals = self
            .table
            .record(&current)
            .map(|r| r.vars_value())
            .unwrap_or_default();
        let proxies = class_proxies(&self.table, &current);
        let env = Env::new()
            .with(&locals)
            .with(&proxies)
            .with(&self.exec_ns);
        Ok(script::eval_mapping(src, &env)?)
    }

    /// Run an `exec` argument against the class proxies.
    pub fn exec(&mut self, src: &str) -> Result<()> {
        let current = self.scope.fully_qualified_name();
        let proxies = class_proxies(&self.table, &current);
        script::run(src, &[&proxies], &mut self.exec_ns)?;
        Ok(())
    }
}

/// Every recorded class's variables nested by `::` path, plus shortcuts to
/// the members of scopes `current` shares with each class.
pub fn class_proxies(table: &ClassTable, current: &str) -> Map<String, Value> {
    let mut root = Map::new();
    for (name, record) in table.records() {
        let path: Vec<&str> = name.split("::").collect();
        insert_path(&mut root, &path, Value::Object(record.vars_value()));
    }

    let here: Vec<&str> = current.split("::").collect();
    let mut shortcuts = Map::new();
    for (name, _) in table.records() {
        let path: Vec<&str> = name.split("::").collect();
        let shared = path.iter().zip(&here).take_while(|(a, b)| a == b).count();
        if shared == 0 {
            continue;
        }
        if let Some(Value::Object(node)) = lookup_path(&root, &path[..shared]) {
            shortcuts.extend(node.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    root.extend(shortcuts);
    root
}

fn insert_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = root;
    for segment in parents {
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        node = next;
    }
    match node.get_mut(*last) {
        Some(existing) => deep_merge(existing, value),
        None => {
            node.insert(last.to_string(), value);
        }
    }
}

fn lookup_path<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(root.get(*first)?, |node, segment| node.get(*segment))
}

/// One matcher and action unit of a chain.
pub trait Filter {
    fn name(&self) -> &'static str;

    /// Whether this filter claims the statement.
    fn matches(&self, stmt: &Statement<'_>) -> bool;

    /// Act on a claimed statement. `Some` replaces the statement and its
    /// separator in pass 3 output.
    fn transform(&mut self, stmt: &Statement<'_>, machine: &mut Machine) -> Result<Option<String>>;

    /// Called for every statement after depth has been adjusted.
    fn revert(&mut self, stmt: &Statement<'_>, machine: &mut Machine) {
        let _ = (stmt, machine);
    }
}

/// Filters in priority order.
pub struct Chain {
    filters: Vec<Box<dyn Filter>>,
}

impl Chain {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Feed one statement. Returns the replacement text, if any.
    pub fn feed(&mut self, stmt: &Statement<'_>, machine: &mut Machine) -> Result<Option<String>> {
        machine.locations.advance(stmt.leading_newlines());

        let mut output = None;
        if !stmt.trimmed().is_empty() {
            if let Some(filter) = self.filters.iter_mut().find(|f| f.matches(stmt)) {
                debug!(filter = filter.name(), statement = stmt.trimmed(), "claimed");
                output = filter.transform(stmt, machine)?;
            }
        }

        match stmt.sep {
            Separator::OpenBrace => machine.scope.enter_block(),
            Separator::CloseBrace => machine.scope.leave_block(),
            Separator::Newline if machine.pass == Pass::Generate && stmt.is_directive() => {
                let text = stmt.trimmed();
                if text.contains("pragma") {
                    let opened = text.matches('{').count() as isize;
                    let closed = text.matches('}').count() as isize;
                    machine.scope.shift(opened - closed);
                }
            }
            _ => {}
        }

        for filter in &mut self.filters {
            filter.revert(stmt, machine);
        }
        machine.locations.advance_trailing(stmt.trailing_newlines());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanonicalType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn table() -> ClassTable {
        let mut table = ClassTable::new();
        for name in ["a::B", "a::C", "d::E"] {
            table.declare_class(name, []);
            table
                .ensure_record(name)
                .add_variable("x", CanonicalType::atom("int"), Map::new());
        }
        table
            .ensure_record("a::C")
            .add_variable("y", CanonicalType::atom("double"), Map::new());
        table
    }

    #[test]
    fn test_class_proxies_nest_by_path() {
        let proxies = class_proxies(&table(), "d::E");
        assert_eq!(
            proxies["a"]["C"]["y"],
            json!({"type": "double", "index": 1})
        );
        // the current class's own members are reachable unqualified
        assert_eq!(proxies["x"]["index"], json!(0));
        assert!(!proxies.contains_key("C"));
    }

    #[test]
    fn test_sibling_shortcuts() {
        let proxies = class_proxies(&table(), "a::B");
        assert_eq!(proxies["C"]["x"]["index"], json!(0));
    }

    #[test]
    fn test_eval_mapping_sees_locals_and_exec_names() {
        let mut machine = Machine::accumulator();
        machine.table = table();
        machine.scope.push_namespace(Some("a"));
        machine.scope.enter_block();
        machine.scope.push_class("C");
        machine.scope.enter_block();
        machine.exec("cap = 3").unwrap();
        let map = machine
            .eval_mapping("{'default': cap * 2, 'peer': B.x['index'], 'mine': y['index']}")
            .unwrap();
        assert_eq!(Value::Object(map), json!({"default": 6, "peer": 0, "mine": 1}));
    }
}
