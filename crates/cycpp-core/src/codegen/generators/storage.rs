use serde_json::Value;

use super::{capacity_setter, parent_calls, shape_arg, shapes, template_arg};
use crate::codegen::{GenContext, Generator};
use crate::error::Result;

/// A `capacity` annotation as a C++ expression: numbers verbatim, strings
/// as code.
fn capacity_expr(ctx: &GenContext<'_>, name: &str, capacity: &Value) -> Result<String> {
    match capacity {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(code) => Ok(code.clone()),
        other => Err(ctx.invalid(name, format!("capacity {other} is not a number or expression"))),
    }
}

/// `InitFrom(cyclus::QueryableBackend* b)`: restore state from the `Info`
/// table.
pub struct InitFromDb;

impl Generator for InitFromDb {
    fn directive(&self) -> &'static str {
        "initfromdb"
    }

    fn method_name(&self) -> &'static str {
        "InitFrom"
    }

    fn args(&self, _ctx: &GenContext<'_>) -> String {
        "cyclus::QueryableBackend* b".to_string()
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String> {
        let ind = ctx.indent;
        let mut out = parent_calls(ctx, "InitFrom(b)");
        out.push_str(&shapes(ctx)?);
        out.push_str(&format!("{ind}cyclus::QueryResult qr = b->Query(\"Info\", NULL);\n"));

        let mut capacities = Vec::new();
        for (name, var) in ctx.record.variables() {
            if let Some(code) = var.override_for(self.directive()) {
                out.push_str(code);
            } else if var.ty.is_buffer() {
                if let Some(capacity) = var.capacity() {
                    let expr = capacity_expr(ctx, name, capacity)?;
                    capacities.push((name, capacity_setter(&var.ty), expr));
                }
            } else {
                let ty = template_arg(&var.ty);
                out.push_str(&format!("{ind}{name} = qr.GetVal<{ty}>(\"{name}\");\n"));
            }
        }
        for (name, setter, expr) in capacities {
            out.push_str(&format!("{ind}{name}.{setter}({expr});\n"));
        }
        Ok(out)
    }
}

/// `Snapshot(cyclus::DbInit di)`: write every non-buffer variable to the
/// `Info` datum.
pub struct Snapshot;

impl Generator for Snapshot {
    fn directive(&self) -> &'static str {
        "snapshot"
    }

    fn method_name(&self) -> &'static str {
        "Snapshot"
    }

    fn args(&self, _ctx: &GenContext<'_>) -> String {
        "cyclus::DbInit di".to_string()
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String> {
        let ind = ctx.indent;
        let mut out = format!("{ind}di.NewDatum(\"Info\")\n");
        for (name, var) in ctx.record.variables() {
            if let Some(code) = var.override_for(self.directive()) {
                out.push_str(code);
            } else if !var.ty.is_buffer() {
                let shape = shape_arg(name, var.shape().is_some());
                out.push_str(&format!("{ind}->AddVal(\"{name}\", {name}{shape})\n"));
            }
        }
        out.push_str(&format!("{ind}->Record();\n"));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generators::testing::*;
    use crate::types::CanonicalType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn table() -> crate::table::ClassTable {
        sink(&[
            ("amounts", map("std::string", "double"), json!({})),
            ("inventory", CanonicalType::atom("cyclus::toolkit::ResourceBuff"), json!({"capacity": "max_inv"})),
            ("grid", vector("int"), json!({"shape": [4]})),
        ])
    }

    #[test]
    fn test_init_from_db() {
        let table = table();
        let out = InitFromDb.body(&context(&table, "  ")).unwrap();
        assert_eq!(
            out,
            "  cyclus::Facility::InitFrom(b);\n  \
             int rawcycpp_shape_grid[1] = {4};\n  \
             cycpp_shape_grid = std::vector<int>(rawcycpp_shape_grid, rawcycpp_shape_grid + 1);\n  \
             cyclus::QueryResult qr = b->Query(\"Info\", NULL);\n  \
             amounts = qr.GetVal<std::map< std::string, double > >(\"amounts\");\n  \
             grid = qr.GetVal<std::vector< int > >(\"grid\");\n  \
             inventory.set_capacity(max_inv);\n"
        );
    }

    #[test]
    fn test_snapshot_skips_buffers() {
        let table = table();
        let out = Snapshot.body(&context(&table, "  ")).unwrap();
        assert_eq!(
            out,
            "  di.NewDatum(\"Info\")\n  \
             ->AddVal(\"amounts\", amounts)\n  \
             ->AddVal(\"grid\", grid, &cycpp_shape_grid)\n  \
             ->Record();\n"
        );
    }

    #[test]
    fn test_bad_capacity() {
        let table = sink(&[(
            "inventory",
            CanonicalType::atom("cyclus::toolkit::ResourceBuff"),
            json!({"capacity": [1]}),
        )]);
        assert!(InitFromDb.body(&context(&table, "  ")).is_err());
    }
}
