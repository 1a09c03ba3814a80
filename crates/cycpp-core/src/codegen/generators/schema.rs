//! `schema()`: a RelaxNG fragment validating the variables' input.

use serde_json::Value;

use super::tag_at;
use crate::codegen::{GenContext, Generator};
use crate::error::{CycppError, Result};
use crate::table::VariableAnnotation;
use crate::types::CanonicalType;

const DIRECTIVE: &str = "schema";

/// XML Schema data types that may be given directly.
const XSD_TYPES: &[&str] = &[
    "anyType", "anySimpleType", "string", "boolean", "decimal", "float", "double",
    "duration", "dateTime", "time", "date", "gYearMonth", "gYear", "gMonthDay", "gDay",
    "gMonth", "hexBinary", "base64Binary", "anyURI", "QName", "NOTATION",
    "normalizedString", "token", "language", "NMTOKEN", "NMTOKENS", "Name", "NCName", "ID",
    "IDREF", "IDREFS", "ENTITY", "ENTITIES", "integer", "nonPositiveInteger",
    "negativeInteger", "long", "int", "short", "byte", "nonNegativeInteger", "unsignedLong",
    "unsignedInt", "unsignedShort", "unsignedByte", "positiveInteger",
];

/// UI tags that imply a data type; `None` defers to the C++ type.
const UI_TYPES: &[(&str, Option<&str>)] = &[
    ("nuclide", Some("string")),
    ("commodity", None),
    ("incommodity", None),
    ("outcommodity", None),
    ("range", None),
    ("combobox", None),
    ("facility", None),
    ("prototype", None),
    ("recipe", None),
    ("none", None),
    ("", None),
];

fn cpp_default(cpp: &CanonicalType) -> Option<&'static str> {
    Some(match cpp.head() {
        "bool" => "boolean",
        "std::string" | "cyclus::Blob" => "string",
        "int" => "int",
        "float" => "float",
        "double" => "double",
        "boost::uuids::uuid" => "token",
        _ => return None,
    })
}

pub struct Schema;

impl Generator for Schema {
    fn directive(&self) -> &'static str {
        DIRECTIVE
    }

    fn method_name(&self) -> &'static str {
        "schema"
    }

    fn return_type(&self) -> &'static str {
        "std::string"
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String> {
        let ind = ctx.indent;
        let visible = ctx.record.variables().any(|(_, var)| {
            var.override_for(DIRECTIVE).is_some()
                || !(var.ty.is_buffer() || var.derived_init().is_some())
        });
        if !visible {
            return Ok(format!("{ind}return \"<text/>\";\n"));
        }

        let mut xml = Xml::new(format!("{ind}  "));
        xml.line("<interleave>");
        for (name, var) in ctx.record.variables() {
            if let Some(code) = var.override_for(DIRECTIVE) {
                xml.out.push_str(code);
                continue;
            }
            if var.ty.is_buffer() || var.derived_init().is_some() {
                continue;
            }
            Element { ctx, name, var }.write(&mut xml)?;
        }
        xml.line("</interleave>");
        Ok(format!("{ind}return \"\"\n{}{}  ;\n", xml.out, ind))
    }
}

/// Writes XML lines as a concatenation of C++ string literals.
struct Xml {
    out: String,
    /// C++ indentation of every literal.
    ind: String,
    level: usize,
}

impl Xml {
    fn new(ind: String) -> Self {
        Self {
            out: String::new(),
            ind,
            level: 0,
        }
    }

    fn line(&mut self, tag: &str) {
        let pad = "    ".repeat(self.level);
        let tag = tag.replace('"', "\\\"");
        self.out.push_str(&format!("{}\"{pad}{tag}\\n\"\n", self.ind));
    }

    fn open(&mut self, tag: &str) {
        self.line(tag);
        self.level += 1;
    }

    fn close(&mut self, tag: &str) {
        self.level = self.level.saturating_sub(1);
        self.line(tag);
    }

    fn element(&mut self, name: &str, data_type: &str) {
        self.open(&format!("<element name=\"{name}\">"));
        self.line(&format!("<data type=\"{data_type}\" />"));
        self.close("</element>");
    }
}

struct Element<'a> {
    ctx: &'a GenContext<'a>,
    name: &'a str,
    var: &'a VariableAnnotation,
}

impl Element<'_> {
    fn unsupported(&self) -> CycppError {
        self.ctx.unsupported(DIRECTIVE, self.name, &self.var.ty)
    }

    /// Data type of `cpp`: an XML Schema type given explicitly, then the
    /// type a UI tag implies, then the default for the C++ type.
    fn data_type(&self, cpp: &CanonicalType, given: Option<&str>) -> Result<&'static str> {
        let fallback = || cpp_default(cpp).ok_or_else(|| self.unsupported());
        let Some(given) = given else {
            return fallback();
        };
        if let Some(xsd) = XSD_TYPES.iter().copied().find(|t| *t == given) {
            return Ok(xsd);
        }
        match UI_TYPES.iter().copied().find(|(tag, _)| *tag == given) {
            Some((_, Some(implied))) => Ok(implied),
            Some((_, None)) => fallback(),
            None => Err(CycppError::InvalidSchemaType {
                class: self.ctx.class.to_string(),
                member: self.name.to_string(),
                given: given.to_string(),
            }),
        }
    }

    fn arg(&self, i: usize) -> Result<&CanonicalType> {
        self.var.ty.arg(i).ok_or_else(|| self.unsupported())
    }

    /// `schematype` for template argument `i`, else `uitype` at `i + 1`.
    fn given(&self, schematype_index: Option<usize>, uitype_index: usize) -> Option<&str> {
        let schematype = match schematype_index {
            Some(i) => tag_at(self.var.schematype(), Some(i)),
            None => self.var.schematype().and_then(Value::as_str),
        };
        schematype
            .filter(|s| !s.is_empty())
            .or_else(|| tag_at(self.var.uitype(), Some(uitype_index)))
    }

    fn write(&self, xml: &mut Xml) -> Result<()> {
        let alias = self.var.alias().unwrap_or(self.name);
        let optional = self.var.default().is_some();
        if optional {
            xml.open("<optional>");
        }

        match self.var.ty.head() {
            "std::vector" | "std::set" | "std::list" => {
                let val = self.data_type(self.arg(0)?, self.given(None, 1))?;
                xml.open(&format!("<element name=\"{alias}\">"));
                xml.open("<oneOrMore>");
                xml.element("val", val);
                xml.close("</oneOrMore>");
                xml.close("</element>");
            }
            "std::map" => {
                let key = self.data_type(self.arg(0)?, self.given(Some(0), 1))?;
                let val = self.data_type(self.arg(1)?, self.given(Some(1), 2))?;
                xml.open(&format!("<element name=\"{alias}\">"));
                xml.open("<oneOrMore>");
                xml.element("key", key);
                xml.element("val", val);
                xml.close("</oneOrMore>");
                xml.close("</element>");
            }
            "std::pair" => {
                let first = self.data_type(self.arg(0)?, self.given(Some(0), 1))?;
                let second = self.data_type(self.arg(1)?, self.given(Some(1), 2))?;
                xml.open(&format!("<element name=\"{alias}\">"));
                xml.element("first", first);
                xml.element("second", second);
                xml.close("</element>");
            }
            _ if self.var.ty.is_primitive() => {
                let given = self
                    .var
                    .schematype()
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .or_else(|| tag_at(self.var.uitype(), None));
                let data = self.data_type(&self.var.ty, given)?;
                xml.element(alias, data);
            }
            _ => return Err(self.unsupported()),
        }

        if optional {
            xml.close("</optional>");
        }
        Ok(())
    }
}
