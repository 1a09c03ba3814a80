use crate::codegen::{GenContext, Generator};
use crate::error::{CycppError, Result};

/// `annotations()`: the class record as JSON, parsed at runtime.
pub struct Annotations;

impl Generator for Annotations {
    fn directive(&self) -> &'static str {
        "annotations"
    }

    fn method_name(&self) -> &'static str {
        "annotations"
    }

    fn return_type(&self) -> &'static str {
        "Json::Value"
    }

    fn body(&self, ctx: &GenContext<'_>) -> Result<String> {
        let json = serde_json::to_string(ctx.record).map_err(|source| CycppError::Serialize {
            class: ctx.class.to_string(),
            source,
        })?;
        let literal = wrapped_literal(&json, ctx.wrap_width, ctx.indent);
        let (ind, class) = (ctx.indent, ctx.display);
        Ok(format!(
            "{ind}Json::Value root;\n\
             {ind}Json::Reader reader;\n\
             {ind}bool parsed_ok = reader.parse({literal}, root);\n\
             {ind}if (!parsed_ok) {{\n\
             {ind}  throw cyclus::ValueError(\"failed to parse annotations for {class}.\");\n\
             {ind}}}\n\
             {ind}return root;\n"
        ))
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `text` as one string literal, or as adjacent literals of `width`
/// characters on their own lines when it is longer than that.
fn wrapped_literal(text: &str, width: usize, ind: &str) -> String {
    if width == 0 || text.chars().count() <= width {
        return format!("\"{}\"", escape(text));
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width)
        .map(|chunk| {
            let chunk: String = chunk.iter().collect();
            format!("\n  {ind}\"{}\"", escape(&chunk))
        })
        .collect()
}
