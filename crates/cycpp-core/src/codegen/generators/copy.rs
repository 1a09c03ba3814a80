use super::{capacity_setter, parent_calls, shapes};
use crate::codegen::{GenContext, Generator};
use crate::error::Result;

/// `InitFrom(T* m)`: copy state from another instance.
pub struct InitFromCopy;

impl Generator for InitFromCopy {
    fn directive(&self) -> &'static str {
        "initfromcopy"
    }

    fn method_name(&self) -> &'static str {
        "InitFrom"
    }

    fn args(&self, ctx: &GenContext<'_>) -> String {
        format!("{}* m", ctx.display)
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String> {
        let ind = ctx.indent;
        let mut out = parent_calls(ctx, "InitFrom(m)");
        out.push_str(&shapes(ctx)?);

        // buffers keep their own contents; only the capacity carries over
        let mut capacities = Vec::new();
        for (name, var) in ctx.record.variables() {
            if let Some(code) = var.override_for(self.directive()) {
                out.push_str(code);
            } else if var.ty.is_buffer() {
                if var.capacity().is_some() {
                    capacities.push((name, capacity_setter(&var.ty)));
                }
            } else {
                out.push_str(&format!("{ind}{name} = m->{name};\n"));
            }
        }
        for (name, setter) in capacities {
            out.push_str(&format!("{ind}{name}.{setter}(m->{name}.capacity());\n"));
        }
        Ok(out)
    }
}

/// `Clone()`: allocate a new instance and copy into it.
pub struct CloneMethod;

impl Generator for CloneMethod {
    fn directive(&self) -> &'static str {
        "clone"
    }

    fn method_name(&self) -> &'static str {
        "Clone"
    }

    fn return_type(&self) -> &'static str {
        "cyclus::Agent*"
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String> {
        let (ind, class) = (ctx.indent, ctx.display);
        Ok(format!(
            "{ind}{class}* m = new {class}(context());\n\
             {ind}m->InitFrom(this);\n\
             {ind}return m;\n"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generators::testing::*;
    use crate::types::CanonicalType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_init_from_copy() {
        let resbuf = CanonicalType::template(
            "cyclus::toolkit::ResBuf",
            vec![CanonicalType::atom("cyclus::Material")],
        );
        let table = sink(&[
            ("inventory", CanonicalType::atom("cyclus::toolkit::ResourceBuff"), json!({"capacity": "cap"})),
            ("rate", CanonicalType::atom("double"), json!({})),
            ("stock", resbuf, json!({"capacity": 10})),
            ("name", CanonicalType::atom("std::string"), json!({"initfromcopy": "  name = \"copy\";\n"})),
        ]);
        let out = InitFromCopy.body(&context(&table, "  ")).unwrap();
        assert_eq!(
            out,
            "  cyclus::Facility::InitFrom(m);\n  \
             rate = m->rate;\n  \
             name = \"copy\";\n  \
             inventory.set_capacity(m->inventory.capacity());\n  \
             stock.capacity(m->stock.capacity());\n"
        );
        assert_eq!(InitFromCopy.args(&context(&table, "  ")), "Sink* m");
    }

    #[test]
    fn test_clone() {
        let table = sink(&[]);
        assert_eq!(
            CloneMethod.body(&context(&table, "    ")).unwrap(),
            "    Sink* m = new Sink(context());\n    m->InitFrom(this);\n    return m;\n"
        );
    }
}
