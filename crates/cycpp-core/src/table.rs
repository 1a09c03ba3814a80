//! The class table built by pass 2 and read by pass 3.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::types::CanonicalType;

/// Framework roles that have generated parent calls, with the entity kind
/// each confers. Checked in order, most specific first.
pub const ROLES: &[(&str, EntityKind)] = &[
    ("cyclus::Region", EntityKind::Region),
    ("cyclus::Institution", EntityKind::Institution),
    ("cyclus::Facility", EntityKind::Facility),
    ("cyclus::Agent", EntityKind::Archetype),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Region,
    Institution,
    Facility,
    Archetype,
    Unknown,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Region => "region",
            EntityKind::Institution => "institution",
            EntityKind::Facility => "facility",
            EntityKind::Archetype => "archetype",
            EntityKind::Unknown => "unknown",
        }
    }
}

/// Merge `new` into `old`: nested objects merge key by key, anything else
/// overwrites.
pub fn deep_merge(old: &mut Value, new: Value) {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => merge_maps(old, new),
        (old, new) => *old = new,
    }
}

fn merge_maps(old: &mut Map<String, Value>, new: Map<String, Value>) {
    for (key, val) in new {
        match old.get_mut(&key) {
            Some(existing) => deep_merge(existing, val),
            None => {
                old.insert(key, val);
            }
        }
    }
}

/// Annotation of one state variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableAnnotation {
    pub ty: CanonicalType,
    /// Declaration order within the class, starting at zero.
    pub index: usize,
    /// Everything the `var` directive supplied, minus `type` and `index`.
    pub fields: Map<String, Value>,
}

impl VariableAnnotation {
    pub fn new(ty: CanonicalType, index: usize, mut fields: Map<String, Value>) -> Self {
        fields.remove("type");
        fields.remove("index");
        Self { ty, index, fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn default(&self) -> Option<&Value> {
        self.get("default")
    }

    pub fn shape(&self) -> Option<&Value> {
        self.get("shape")
    }

    pub fn uitype(&self) -> Option<&Value> {
        self.get("uitype")
    }

    pub fn schematype(&self) -> Option<&Value> {
        self.get("schematype")
    }

    pub fn capacity(&self) -> Option<&Value> {
        self.get("capacity")
    }

    /// Input file name of the variable, when it differs from the member name.
    pub fn alias(&self) -> Option<&str> {
        self.get_str("alias")
    }

    /// C++ code computing the variable instead of reading it.
    pub fn derived_init(&self) -> Option<&str> {
        self.get_str("derived_init")
    }

    /// Code that replaces what the named generator would emit for this
    /// variable.
    pub fn override_for(&self, generator: &str) -> Option<&str> {
        self.get_str(generator)
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("type".into(), self.ty.to_value());
        map.insert("index".into(), Value::from(self.index));
        Value::Object(map)
    }
}

/// A member of a class's `vars` table: a state variable, or an alternate
/// name pointing at one.
#[derive(Debug, Clone, PartialEq)]
pub enum VarEntry {
    Variable(VariableAnnotation),
    Alias(String),
}

impl VarEntry {
    pub fn to_value(&self) -> Value {
        match self {
            VarEntry::Variable(ann) => ann.to_value(),
            VarEntry::Alias(target) => Value::String(target.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassRecord {
    pub name: String,
    pub entity: EntityKind,
    pub parents: Vec<String>,
    pub all_parents: Vec<String>,
    pub vars: IndexMap<String, VarEntry>,
    /// Class level annotations merged in by `note` directives.
    pub notes: Map<String, Value>,
}

impl ClassRecord {
    /// State variables in declaration order, skipping alias entries.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &VariableAnnotation)> {
        self.vars.iter().filter_map(|(name, entry)| match entry {
            VarEntry::Variable(ann) => Some((name.as_str(), ann)),
            VarEntry::Alias(_) => None,
        })
    }

    pub fn variable(&self, name: &str) -> Option<&VariableAnnotation> {
        match self.vars.get(name) {
            Some(VarEntry::Variable(ann)) => Some(ann),
            _ => None,
        }
    }

    pub fn variable_count(&self) -> usize {
        self.variables().count()
    }

    /// Add the next state variable, assigning it the next index. An `alias`
    /// field also records an alias entry.
    pub fn add_variable(&mut self, name: &str, ty: CanonicalType, fields: Map<String, Value>) {
        let ann = VariableAnnotation::new(ty, self.variable_count(), fields);
        let alias = ann.alias().map(str::to_string);
        self.vars.insert(name.to_string(), VarEntry::Variable(ann));
        if let Some(alias) = alias {
            if alias != name {
                self.vars.insert(alias, VarEntry::Alias(name.to_string()));
            }
        }
    }

    /// Deep-merge a `note` mapping. A `vars` key merges into the fields of
    /// the variables it names.
    pub fn merge_note(&mut self, note: Map<String, Value>) {
        for (key, val) in note {
            match (key.as_str(), val) {
                ("vars", Value::Object(vars)) => self.merge_var_notes(vars),
                (_, val) => merge_maps(&mut self.notes, Map::from_iter([(key, val)])),
            }
        }
    }

    fn merge_var_notes(&mut self, vars: Map<String, Value>) {
        for (var, fields) in vars {
            match (self.vars.get_mut(&var), fields) {
                (Some(VarEntry::Variable(ann)), Value::Object(mut fields)) => {
                    fields.remove("type");
                    fields.remove("index");
                    merge_maps(&mut ann.fields, fields);
                }
                _ => warn!(class = %self.name, var = %var, "note names no state variable"),
            }
        }
    }

    /// `vars` as a JSON object, as seen by directive expressions.
    pub fn vars_value(&self) -> Map<String, Value> {
        self.vars
            .iter()
            .map(|(name, entry)| (name.clone(), entry.to_value()))
            .collect()
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("entity".into(), Value::String(self.entity.as_str().into()));
        map.insert("parents".into(), Value::from(self.parents.clone()));
        map.insert("all_parents".into(), Value::from(self.all_parents.clone()));
        map.insert("vars".into(), Value::Object(self.vars_value()));
        for (key, val) in &self.notes {
            map.insert(key.clone(), val.clone());
        }
        Value::Object(map)
    }
}

impl Serialize for ClassRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Every class seen in pass 2 with its resolved direct bases, plus the
/// records of classes that carry annotations.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    records: IndexMap<String, ClassRecord>,
    superclasses: IndexMap<String, BTreeSet<String>>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.superclasses.contains_key(name)
    }

    /// Register a class declaration and add its resolved bases.
    pub fn declare_class(&mut self, name: &str, bases: impl IntoIterator<Item = String>) {
        self.superclasses
            .entry(name.to_string())
            .or_default()
            .extend(bases);
    }

    pub fn parents(&self, name: &str) -> BTreeSet<String> {
        self.superclasses.get(name).cloned().unwrap_or_default()
    }

    /// Transitive closure of the bases of `name`. Cyclic input terminates.
    pub fn all_parents(&self, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<&str> = vec![name];
        while let Some(class) = pending.pop() {
            for parent in self.superclasses.get(class).into_iter().flatten() {
                if seen.insert(parent.clone()) {
                    pending.push(parent);
                }
            }
        }
        seen.remove(name);
        seen
    }

    pub fn entity_of(&self, name: &str) -> EntityKind {
        let all = self.all_parents(name);
        ROLES
            .iter()
            .find(|(role, _)| all.contains(*role))
            .map(|(_, kind)| *kind)
            .unwrap_or(EntityKind::Unknown)
    }

    /// Framework roles among the direct bases of `name`, minus any that is
    /// itself an ancestor of another. Sorted.
    pub fn closest_roles(&self, name: &str) -> Vec<String> {
        let direct: BTreeSet<String> = self
            .parents(name)
            .into_iter()
            .filter(|p| ROLES.iter().any(|(role, _)| role == p))
            .collect();
        let subsumed: BTreeSet<String> = direct.iter().flat_map(|p| self.all_parents(p)).collect();
        direct.difference(&subsumed).cloned().collect()
    }

    /// Record for `name`, creating it from the superclass table on first use.
    pub fn ensure_record(&mut self, name: &str) -> &mut ClassRecord {
        if !self.records.contains_key(name) {
            let record = ClassRecord {
                name: name.to_string(),
                entity: self.entity_of(name),
                parents: self.parents(name).into_iter().collect(),
                all_parents: self.all_parents(name).into_iter().collect(),
                vars: IndexMap::new(),
                notes: Map::new(),
            };
            self.records.insert(name.to_string(), record);
        }
        &mut self.records[name]
    }

    pub fn record(&self, name: &str) -> Option<&ClassRecord> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &ClassRecord)> {
        self.records.iter().map(|(name, rec)| (name.as_str(), rec))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn class_count(&self) -> usize {
        self.superclasses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn framework() -> ClassTable {
        let mut table = ClassTable::new();
        table.declare_class("cyclus::Agent", []);
        table.declare_class("cyclus::Facility", ["cyclus::Agent".to_string()]);
        table.declare_class("cyclus::Region", ["cyclus::Agent".to_string()]);
        table
    }

    #[test]
    fn test_closest_roles_drop_subsumed() {
        let mut table = framework();
        table.declare_class(
            "x::Reactor",
            ["cyclus::Agent".to_string(), "cyclus::Facility".to_string()],
        );
        assert_eq!(table.closest_roles("x::Reactor"), vec!["cyclus::Facility"]);
        assert_eq!(table.entity_of("x::Reactor"), EntityKind::Facility);
    }

    #[test]
    fn test_all_parents_with_cycle() {
        let mut table = ClassTable::new();
        table.declare_class("A", ["B".to_string()]);
        table.declare_class("B", ["A".to_string()]);
        assert_eq!(
            table.all_parents("A").into_iter().collect::<Vec<_>>(),
            vec!["B"]
        );
    }

    #[test]
    fn test_indices_skip_aliases() {
        let mut table = framework();
        table.declare_class("R", ["cyclus::Region".to_string()]);
        let rec = table.ensure_record("R");
        let fields = json!({"alias": "a_in"});
        rec.add_variable("a", CanonicalType::atom("int"), fields.as_object().cloned().unwrap());
        rec.add_variable("b", CanonicalType::atom("double"), Map::new());
        assert_eq!(rec.variable("a").unwrap().index, 0);
        assert_eq!(rec.variable("b").unwrap().index, 1);
        assert_eq!(rec.vars.get("a_in"), Some(&VarEntry::Alias("a".into())));
        assert_eq!(rec.entity, EntityKind::Region);
    }

    #[test]
    fn test_merge_note() {
        let mut table = framework();
        let rec = table.ensure_record("cyclus::Facility");
        rec.add_variable("x", CanonicalType::atom("int"), Map::new());
        let note = json!({
            "doc": "first",
            "extra": {"a": 1},
            "vars": {"x": {"doc": "an int", "type": "double"}}
        });
        rec.merge_note(note.as_object().cloned().unwrap());
        let note = json!({"doc": "second", "extra": {"b": 2}});
        rec.merge_note(note.as_object().cloned().unwrap());

        assert_eq!(
            rec.to_value(),
            json!({
                "name": "cyclus::Facility",
                "entity": "archetype",
                "parents": ["cyclus::Agent"],
                "all_parents": ["cyclus::Agent"],
                "vars": {"x": {"doc": "an int", "type": "int", "index": 0}},
                "doc": "second",
                "extra": {"a": 1, "b": 2}
            })
        );
    }

    #[test]
    fn test_deep_merge_overwrites_scalars() {
        let mut old = json!({"a": {"b": 1, "c": [1]}, "d": 1});
        deep_merge(&mut old, json!({"a": {"c": [2]}, "d": {"e": 3}}));
        assert_eq!(old, json!({"a": {"b": 1, "c": [2]}, "d": {"e": 3}}));
    }
}
