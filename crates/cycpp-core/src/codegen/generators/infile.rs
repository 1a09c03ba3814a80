//! `InfileToDb`: read state from the input file tree and record it.
//!
//! Each variable is read by a strategy chosen from its type head:
//! primitives with a single query, sequences, sets and lists from the
//! repeated `val` children of their element, maps from `key`/`val` pairs
//! and pairs from `first`/`second`. A variable with a default only reads
//! input when the element is present and otherwise fills in the default.

use serde_json::Value;

use super::{parent_calls, shape_arg, shapes, tag_at, template_arg};
use crate::codegen::literal::{key_literal, literal, nuclide_id_literal, nuclide_literal};
use crate::codegen::{GenContext, Generator};
use crate::error::{CycppError, Result};
use crate::table::VariableAnnotation;
use crate::types::CanonicalType;

const DIRECTIVE: &str = "infiletodb";

pub struct InfileToDb;

impl Generator for InfileToDb {
    fn directive(&self) -> &'static str {
        DIRECTIVE
    }

    fn method_name(&self) -> &'static str {
        "InfileToDb"
    }

    fn args(&self, _ctx: &GenContext<'_>) -> String {
        "cyclus::InfileTree* tree, cyclus::DbInit di".to_string()
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String> {
        let mut w = Lines::new(ctx.indent);
        w.out.push_str(&parent_calls(ctx, "InfileToDb(tree, di)"));
        w.out.push_str(&shapes(ctx)?);
        w.line("tree = tree->SubTree(\"config/*\");");
        w.line("cyclus::InfileTree* sub;");
        w.line("int i;");
        w.line("int n;");

        for (name, var) in ctx.record.variables() {
            if let Some(code) = overrides(var).0 {
                w.out.push_str(code);
            } else if var.ty.is_buffer() {
                continue;
            } else if let Some(init) = var.derived_init() {
                w.line(init);
            } else {
                Reader { ctx, name, var }.read(&mut w)?;
            }
        }

        w.line("di.NewDatum(\"Info\")");
        for (name, var) in ctx.record.variables() {
            if let Some(code) = overrides(var).1 {
                w.out.push_str(code);
            } else if !var.ty.is_buffer() {
                let shape = shape_arg(name, var.shape().is_some());
                w.line(&format!("->AddVal(\"{name}\", {name}{shape})"));
            }
        }
        w.line("->Record();");
        Ok(w.out)
    }
}

/// The `read` and `write` replacement code of a variable. A plain string
/// replaces the read.
fn overrides(var: &VariableAnnotation) -> (Option<&str>, Option<&str>) {
    match var.get(DIRECTIVE) {
        Some(Value::String(read)) => (Some(read), None),
        Some(Value::Object(codes)) => (
            codes.get("read").and_then(Value::as_str),
            codes.get("write").and_then(Value::as_str),
        ),
        _ => (None, None),
    }
}

/// Indented line writer.
struct Lines {
    out: String,
    ind: String,
}

impl Lines {
    fn new(ind: &str) -> Self {
        Self {
            out: String::new(),
            ind: ind.to_string(),
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(&self.ind);
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn indent(&mut self) {
        self.ind.push_str("  ");
    }

    fn dedent(&mut self) {
        self.ind.truncate(self.ind.len().saturating_sub(2));
    }
}

/// The `uitype` of element `i` of a container, or of the variable itself
/// for primitives.
fn uitype_at(var: &VariableAnnotation, i: Option<usize>) -> Option<&str> {
    tag_at(var.uitype(), i)
}

struct Reader<'a> {
    ctx: &'a GenContext<'a>,
    name: &'a str,
    var: &'a VariableAnnotation,
}

impl Reader<'_> {
    fn alias(&self) -> &str {
        self.var.alias().unwrap_or(self.name)
    }

    fn unsupported(&self) -> CycppError {
        self.ctx.unsupported(DIRECTIVE, self.name, &self.var.ty)
    }

    fn invalid(&self, reason: String) -> CycppError {
        self.ctx.invalid(self.name, reason)
    }

    fn arg(&self, i: usize) -> Result<&CanonicalType> {
        self.var.ty.arg(i).ok_or_else(|| self.unsupported())
    }

    /// A query expression for one primitive value.
    fn query(
        &self,
        tree: &str,
        alias: &str,
        ty: &CanonicalType,
        default: Option<&Value>,
        uitype: Option<&str>,
        indexed: bool,
    ) -> Result<String> {
        if !ty.is_primitive() {
            return Err(self.unsupported());
        }
        let kind = if default.is_some() { "OptionalQuery" } else { "Query" };
        let index = if indexed { ", i" } else { "" };
        if uitype == Some("nuclide") {
            let default = default
                .map(|d| format!(", {}", nuclide_literal(d)))
                .unwrap_or_default();
            return Ok(format!(
                "pyne::nucname::id(cyclus::{kind}<std::string>({tree}, \"{alias}\"{default}{index}))"
            ));
        }
        let default = match default {
            Some(d) => format!(", {}", literal(ty, d).map_err(|r| self.invalid(r))?),
            None => String::new(),
        };
        Ok(format!(
            "cyclus::{kind}<{}>({tree}, \"{alias}\"{default}{index})",
            template_arg(ty)
        ))
    }

    /// A default for one container element, tagged with `uitype`.
    fn element_literal(
        &self,
        ty: &CanonicalType,
        value: &Value,
        uitype: Option<&str>,
    ) -> Result<String> {
        if uitype == Some("nuclide") {
            return Ok(nuclide_id_literal(value));
        }
        literal(ty, value).map_err(|r| self.invalid(r))
    }

    fn default_items(&self) -> Result<Option<&Vec<Value>>> {
        match self.var.default() {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(self.invalid(format!("default {other} is not a list"))),
        }
    }

    fn read(&self, w: &mut Lines) -> Result<()> {
        match self.var.ty.head() {
            "std::vector" => self.read_sequence(w, Sequence::Vector),
            "std::set" => self.read_sequence(w, Sequence::Set),
            "std::list" => self.read_sequence(w, Sequence::List),
            "std::map" => self.read_map(w),
            "std::pair" => self.read_pair(w),
            _ if self.var.ty.is_primitive() => {
                let query = self.query(
                    "tree",
                    self.alias(),
                    &self.var.ty,
                    self.var.default(),
                    uitype_at(self.var, None),
                    false,
                )?;
                w.line(&format!("{} = {query};", self.name));
                Ok(())
            }
            _ => Err(self.unsupported()),
        }
    }

    /// Opens the presence guard when there is a default to fall back on.
    fn open_guard(&self, w: &mut Lines, guarded: bool) {
        if guarded {
            w.line(&format!("if (tree->NMatches(\"{}\") > 0) {{", self.alias()));
            w.indent();
        }
        w.line(&format!("sub = tree->SubTree(\"{}\");", self.alias()));
        w.line("n = sub->NMatches(\"val\");");
    }

    fn else_branch(&self, w: &mut Lines) {
        w.dedent();
        w.line("} else {");
        w.indent();
    }

    fn close_guard(&self, w: &mut Lines) {
        w.dedent();
        w.line("}");
    }

    fn read_sequence(&self, w: &mut Lines, kind: Sequence) -> Result<()> {
        let m = self.name;
        let elem = self.arg(0)?;
        let defaults = self.default_items()?;
        let query = self.query("sub", "val", elem, None, uitype_at(self.var, Some(1)), true)?;

        if kind != Sequence::Vector {
            w.line(&format!("{m}.clear();"));
        }
        self.open_guard(w, defaults.is_some());
        if kind == Sequence::Vector {
            w.line(&format!("{m}.resize(n);"));
        }
        w.line("for (i = 0; i < n; ++i) {");
        w.line(&format!("  {}", kind.store(m, "i", &query)));
        w.line("}");

        if let Some(items) = defaults {
            self.else_branch(w);
            if kind == Sequence::Vector {
                w.line(&format!("{m}.resize({});", items.len()));
            }
            for (i, item) in items.iter().enumerate() {
                let lit = self.element_literal(elem, item, uitype_at(self.var, Some(1)))?;
                w.line(&kind.store(m, &i.to_string(), &lit));
            }
            self.close_guard(w);
        }
        Ok(())
    }

    fn read_map(&self, w: &mut Lines) -> Result<()> {
        let m = self.name;
        let (key_ty, val_ty) = (self.arg(0)?, self.arg(1)?);
        let defaults = match self.var.default() {
            None => None,
            Some(Value::Object(items)) => Some(items),
            Some(other) => return Err(self.invalid(format!("default {other} is not a mapping"))),
        };
        let key = self.query("sub", "key", key_ty, None, uitype_at(self.var, Some(1)), true)?;
        let val = self.query("sub", "val", val_ty, None, uitype_at(self.var, Some(2)), true)?;

        self.open_guard(w, defaults.is_some());
        w.line("for (i = 0; i < n; ++i) {");
        w.line(&format!("  {m}[{key}] = {val};"));
        w.line("}");

        if let Some(items) = defaults {
            self.else_branch(w);
            for (k, v) in items {
                let k = match uitype_at(self.var, Some(1)) {
                    Some("nuclide") => nuclide_id_literal(&Value::String(k.clone())),
                    _ => key_literal(key_ty, k).map_err(|r| self.invalid(r))?,
                };
                let v = self.element_literal(val_ty, v, uitype_at(self.var, Some(2)))?;
                w.line(&format!("{m}[{k}] = {v};"));
            }
            self.close_guard(w);
        }
        Ok(())
    }

    fn read_pair(&self, w: &mut Lines) -> Result<()> {
        let m = self.name;
        let (first, second) = match self.default_items()? {
            None => (None, None),
            Some(items) if items.len() == 2 => (items.first(), items.get(1)),
            Some(_) => return Err(self.invalid("pair default must have two items".into())),
        };
        let alias = self.alias();
        let q1 = self.query(
            "tree",
            &format!("{alias}/first"),
            self.arg(0)?,
            first,
            uitype_at(self.var, Some(1)),
            false,
        )?;
        let q2 = self.query(
            "tree",
            &format!("{alias}/second"),
            self.arg(1)?,
            second,
            uitype_at(self.var, Some(2)),
            false,
        )?;
        w.line(&format!("{m}.first = {q1};"));
        w.line(&format!("{m}.second = {q2};"));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sequence {
    Vector,
    Set,
    List,
}

impl Sequence {
    /// Statement storing `value` as element `i` of `member`.
    fn store(self, member: &str, i: &str, value: &str) -> String {
        match self {
            Sequence::Vector => format!("{member}[{i}] = {value};"),
            Sequence::Set => format!("{member}.insert({value});"),
            Sequence::List => format!("{member}.push_back({value});"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generators::testing::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PREAMBLE: &str = "  cyclus::Facility::InfileToDb(tree, di);\n  \
                            tree = tree->SubTree(\"config/*\");\n  \
                            cyclus::InfileTree* sub;\n  \
                            int i;\n  \
                            int n;\n";

    fn body(vars: &[(&str, CanonicalType, Value)]) -> Result<String> {
        let table = sink(vars);
        InfileToDb.body(&context(&table, "  "))
    }

    #[test]
    fn test_optional_primitive() {
        let out = body(&[("n", CanonicalType::atom("int"), json!({"default": 0}))]).unwrap();
        assert_eq!(
            out,
            format!(
                "{PREAMBLE}  n = cyclus::OptionalQuery<int>(tree, \"n\", 0);\n  \
                 di.NewDatum(\"Info\")\n  \
                 ->AddVal(\"n\", n)\n  \
                 ->Record();\n"
            )
        );
    }

    #[test]
    fn test_vector_default_fills_literals() {
        let out = body(&[("v", vector("double"), json!({"default": [1.5, 2]}))]).unwrap();
        let expected = "  if (tree->NMatches(\"v\") > 0) {\n    \
                        sub = tree->SubTree(\"v\");\n    \
                        n = sub->NMatches(\"val\");\n    \
                        v.resize(n);\n    \
                        for (i = 0; i < n; ++i) {\n      \
                        v[i] = cyclus::Query<double>(sub, \"val\", i);\n    \
                        }\n  \
                        } else {\n    \
                        v.resize(2);\n    \
                        v[0] = 1.5;\n    \
                        v[1] = 2;\n  \
                        }\n";
        assert!(out.contains(expected), "{out}");
    }

    #[test]
    fn test_map_with_alias_and_nuclide_keys() {
        let out = body(&[(
            "fracs",
            map("int", "double"),
            json!({"alias": "fractions", "uitype": ["oneOrMore", "nuclide", "double"]}),
        )])
        .unwrap();
        assert!(out.contains(
            "  sub = tree->SubTree(\"fractions\");\n  \
             n = sub->NMatches(\"val\");\n  \
             for (i = 0; i < n; ++i) {\n    \
             fracs[pyne::nucname::id(cyclus::Query<std::string>(sub, \"key\", i))] = \
             cyclus::Query<double>(sub, \"val\", i);\n  \
             }\n"
        ));
        assert!(out.contains("->AddVal(\"fracs\", fracs)"));
    }

    #[test]
    fn test_nuclide_container_defaults() {
        let out = body(&[
            (
                "fracs",
                map("int", "double"),
                json!({"uitype": ["oneOrMore", "nuclide", "double"], "default": {"U235": 0.5}}),
            ),
            (
                "nucs",
                vector("int"),
                json!({"uitype": ["oneOrMore", "nuclide"], "default": ["Pu239", 922350000]}),
            ),
        ])
        .unwrap();
        assert!(out.contains("    fracs[pyne::nucname::id(\"U235\")] = 0.5;\n"), "{out}");
        assert!(out.contains("    nucs[0] = pyne::nucname::id(\"Pu239\");\n"), "{out}");
        assert!(out.contains("    nucs[1] = pyne::nucname::id(\"922350000\");\n"), "{out}");
    }

    #[test]
    fn test_set_and_list() {
        let set = CanonicalType::template("std::set", vec![CanonicalType::atom("std::string")]);
        let list = CanonicalType::template("std::list", vec![CanonicalType::atom("int")]);
        let out = body(&[
            ("names", set, json!({"default": ["a"]})),
            ("counts", list, json!({})),
        ])
        .unwrap();
        assert!(out.contains("  names.clear();\n  if (tree->NMatches(\"names\") > 0) {\n"));
        assert!(out.contains("      names.insert(cyclus::Query<std::string>(sub, \"val\", i));\n"));
        assert!(out.contains("    names.insert(\"a\");\n"));
        assert!(out.contains("  counts.clear();\n  sub = tree->SubTree(\"counts\");\n"));
        assert!(out.contains("    counts.push_back(cyclus::Query<int>(sub, \"val\", i));\n"));
    }

    #[test]
    fn test_pair_reads_both_halves() {
        let pair = CanonicalType::template(
            "std::pair",
            vec![CanonicalType::atom("int"), CanonicalType::atom("std::string")],
        );
        let out = body(&[("p", pair, json!({"default": [1, "x"]}))]).unwrap();
        assert!(out.contains("  p.first = cyclus::OptionalQuery<int>(tree, \"p/first\", 1);\n"));
        assert!(out.contains(
            "  p.second = cyclus::OptionalQuery<std::string>(tree, \"p/second\", \"x\");\n"
        ));
    }

    #[test]
    fn test_overrides_and_derived_state() {
        let out = body(&[
            ("a", CanonicalType::atom("int"), json!({"infiletodb": {"read": "  a = 1;\n", "write": "  ->AddVal(\"a\", 1)\n"}})),
            ("b", CanonicalType::atom("double"), json!({"derived_init": "b = a * 2.0;"})),
            ("buf", CanonicalType::atom("cyclus::toolkit::ResourceBuff"), json!({})),
        ])
        .unwrap();
        assert_eq!(
            out,
            format!(
                "{PREAMBLE}  a = 1;\n  \
                 b = a * 2.0;\n  \
                 di.NewDatum(\"Info\")\n  \
                 ->AddVal(\"a\", 1)\n  \
                 ->AddVal(\"b\", b)\n  \
                 ->Record();\n"
            )
        );
    }

    #[test]
    fn test_nested_containers_are_unsupported() {
        let nested = CanonicalType::template("std::vector", vec![vector("int")]);
        let err = body(&[("vv", nested, json!({}))]).unwrap_err();
        assert!(matches!(err, CycppError::UnsupportedType { .. }));
    }

    #[test]
    fn test_bad_default() {
        let err = body(&[("v", vector("int"), json!({"default": 3}))]).unwrap_err();
        assert!(matches!(err, CycppError::InvalidAnnotation { .. }));
    }
}
