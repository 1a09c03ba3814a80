use crate::codegen::{GenContext, Generator};
use crate::error::Result;
use crate::table::VariableAnnotation;
use crate::types::BufferKind;

/// Buffer variables in declaration order.
fn buffers<'a>(
    ctx: &'a GenContext<'_>,
) -> impl Iterator<Item = (&'a str, &'a VariableAnnotation, BufferKind)> + 'a {
    ctx.record
        .variables()
        .filter_map(|(name, var)| var.ty.buffer_kind().map(|kind| (name, var, kind)))
}

/// `SnapshotInv()`: move every buffer's contents into a named inventory
/// and back.
pub struct SnapshotInv;

impl Generator for SnapshotInv {
    fn directive(&self) -> &'static str {
        "snapshotinv"
    }

    fn method_name(&self) -> &'static str {
        "SnapshotInv"
    }

    fn return_type(&self) -> &'static str {
        "cyclus::Inventories"
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String> {
        let ind = ctx.indent;
        let mut out = format!("{ind}cyclus::Inventories invs;\n");
        for (name, var, kind) in buffers(ctx) {
            if let Some(code) = var.override_for(self.directive()) {
                out.push_str(code);
                continue;
            }
            let (pop, push) = match kind {
                BufferKind::Untyped => ("PopN", "PushAll"),
                BufferKind::Templated => ("PopNRes", "Push"),
            };
            out.push_str(&format!(
                "{ind}invs[\"{name}\"] = {name}.{pop}({name}.count());\n\
                 {ind}{name}.{push}(invs[\"{name}\"]);\n"
            ));
        }
        out.push_str(&format!("{ind}return invs;\n"));
        Ok(out)
    }
}

/// `InitInv(cyclus::Inventories& inv)`: refill every buffer.
pub struct InitInv;

impl Generator for InitInv {
    fn directive(&self) -> &'static str {
        "initinv"
    }

    fn method_name(&self) -> &'static str {
        "InitInv"
    }

    fn args(&self, _ctx: &GenContext<'_>) -> String {
        "cyclus::Inventories& inv".to_string()
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String> {
        let ind = ctx.indent;
        let mut out = String::new();
        for (name, var, kind) in buffers(ctx) {
            if let Some(code) = var.override_for(self.directive()) {
                out.push_str(code);
                continue;
            }
            let push = match kind {
                BufferKind::Untyped => "PushAll",
                BufferKind::Templated => "Push",
            };
            out.push_str(&format!("{ind}{name}.{push}(inv[\"{name}\"]);\n"));
        }
        Ok(out)
    }
}
