//! The nine method generators and the pieces they share.

mod annotations;
mod copy;
mod infile;
mod inventory;
mod schema;
mod storage;

pub use annotations::Annotations;
pub use copy::{CloneMethod, InitFromCopy};
pub use infile::InfileToDb;
pub use inventory::{InitInv, SnapshotInv};
pub use schema::Schema;
pub use storage::{InitFromDb, Snapshot};

use serde_json::Value;

use super::{GenContext, Generator};
use crate::error::Result;
use crate::types::CanonicalType;

/// Every generator, in fan-out order.
pub const GENERATORS: &[&'static dyn Generator] = &[
    &InitFromCopy,
    &InitFromDb,
    &InfileToDb,
    &CloneMethod,
    &Schema,
    &Annotations,
    &InitInv,
    &SnapshotInv,
    &Snapshot,
];

/// `{indent}<role>::<call>` for each closest framework role.
fn parent_calls(ctx: &GenContext<'_>, call: &str) -> String {
    ctx.roles()
        .iter()
        .map(|role| format!("{}{role}::{call};\n", ctx.indent))
        .collect()
}

/// Fill the `cycpp_shape_*` members of every shaped variable.
fn shapes(ctx: &GenContext<'_>) -> Result<String> {
    let mut out = String::new();
    for (name, var) in ctx.record.variables() {
        let Some(shape) = var.shape() else {
            continue;
        };
        let dims = shape
            .as_array()
            .filter(|dims| dims.iter().all(Value::is_i64))
            .ok_or_else(|| ctx.invalid(name, "shape must be a list of integers"))?;
        let dims: Vec<String> = dims.iter().map(Value::to_string).collect();
        let ind = ctx.indent;
        let n = dims.len();
        out.push_str(&format!(
            "{ind}int rawcycpp_shape_{name}[{n}] = {{{}}};\n\
             {ind}cycpp_shape_{name} = std::vector<int>(rawcycpp_shape_{name}, rawcycpp_shape_{name} + {n});\n",
            dims.join(", ")
        ));
    }
    Ok(out)
}

/// `, &cycpp_shape_<name>` for shaped variables, for `AddVal` calls.
fn shape_arg(name: &str, has_shape: bool) -> String {
    if has_shape {
        format!(", &cycpp_shape_{name}")
    } else {
        String::new()
    }
}

/// A type as a template argument; a trailing `>` gets a space so that
/// nested templates never produce `>>`.
fn template_arg(ty: &CanonicalType) -> String {
    let s = ty.to_string();
    if s.ends_with('>') {
        s + " "
    } else {
        s
    }
}

/// A `uitype` or `schematype` annotation: a string for a primitive
/// (`i` is `None`), a list indexed by template position for containers.
fn tag_at(tag: Option<&Value>, i: Option<usize>) -> Option<&str> {
    match (tag?, i) {
        (Value::String(tag), None) => Some(tag),
        (Value::Array(tags), Some(i)) => tags.get(i).and_then(Value::as_str),
        _ => None,
    }
}

/// Buffer capacity setter for the buffer API of `ty`.
fn capacity_setter(ty: &CanonicalType) -> &'static str {
    match ty.buffer_kind() {
        Some(crate::types::BufferKind::Untyped) => "set_capacity",
        _ => "capacity",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Class tables for generator unit tests.

    use serde_json::{Map, Value};

    use crate::codegen::GenContext;
    use crate::table::ClassTable;
    use crate::types::CanonicalType;

    pub fn framework() -> ClassTable {
        let mut table = ClassTable::new();
        table.declare_class("cyclus::Agent", []);
        table.declare_class("cyclus::Facility", ["cyclus::Agent".to_string()]);
        table.declare_class(
            "fac::Sink",
            ["cyclus::Facility".to_string(), "cyclus::Agent".to_string()],
        );
        table
    }

    pub fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// A table with `fac::Sink` carrying `vars` in order.
    pub fn sink(vars: &[(&str, CanonicalType, Value)]) -> ClassTable {
        let mut table = framework();
        let record = table.ensure_record("fac::Sink");
        for (name, ty, value) in vars {
            record.add_variable(name, ty.clone(), fields(value.clone()));
        }
        table
    }

    pub fn context<'a>(table: &'a ClassTable, indent: &'a str) -> GenContext<'a> {
        GenContext {
            class: "fac::Sink",
            display: "Sink",
            record: table.record("fac::Sink").expect("sink record"),
            table,
            indent,
            wrap_width: 50,
        }
    }

    pub fn vector(of: &str) -> CanonicalType {
        CanonicalType::template("std::vector", vec![CanonicalType::atom(of)])
    }

    pub fn map(k: &str, v: &str) -> CanonicalType {
        CanonicalType::template(
            "std::map",
            vec![CanonicalType::atom(k), CanonicalType::atom(v)],
        )
    }
}
