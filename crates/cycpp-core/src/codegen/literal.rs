//! Rendering annotation values as C++ literals of a given type.

use serde_json::Value;

use crate::types::CanonicalType;

/// Quote and escape `s` as a C++ string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `value` as a literal of the primitive type `ty`. The error is a reason
/// suitable for an annotation diagnostic.
pub fn literal(ty: &CanonicalType, value: &Value) -> Result<String, String> {
    match (ty.head(), value) {
        ("std::string", Value::String(s)) => Ok(quote(s)),
        ("cyclus::Blob", Value::String(s)) => Ok(format!("cyclus::Blob({})", quote(s))),
        ("bool", Value::Bool(b)) => Ok(b.to_string()),
        ("bool", Value::Number(n)) => Ok((n.as_f64() != Some(0.0)).to_string()),
        ("int", Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        ("int", Value::Bool(b)) => Ok(i32::from(*b).to_string()),
        ("float" | "double", Value::Number(n)) => Ok(n.to_string()),
        ("boost::uuids::uuid", _) => Err("uuid variables cannot have a default".into()),
        (head, value) => Err(format!("default {value} is not a valid {head}")),
    }
}

/// A map key, which JSON always spells as a string, as a literal of `ty`.
pub fn key_literal(ty: &CanonicalType, key: &str) -> Result<String, String> {
    let value = match ty.head() {
        "std::string" | "cyclus::Blob" => Value::String(key.to_string()),
        "bool" => match key {
            "true" | "True" => Value::Bool(true),
            "false" | "False" => Value::Bool(false),
            _ => return Err(format!("map key {key:?} is not a valid bool")),
        },
        _ => serde_json::from_str(key)
            .map_err(|_| format!("map key {key:?} is not a valid {}", ty.head()))?,
    };
    literal(ty, &value)
}

/// A default in the form the input reader expects for a domain-tagged
/// lookup: nuclides are read as strings whatever their declared type.
pub fn nuclide_literal(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        other => quote(&other.to_string()),
    }
}

/// A nuclide default stored in an integer container: the name is
/// converted to its id when the generated code runs.
pub fn nuclide_id_literal(value: &Value) -> String {
    format!("pyne::nucname::id({})", nuclide_literal(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn atom(name: &str) -> CanonicalType {
        CanonicalType::atom(name)
    }

    #[test]
    fn test_primitives() {
        assert_eq!(literal(&atom("std::string"), &json!("a \"b\"")).unwrap(), r#""a \"b\"""#);
        assert_eq!(literal(&atom("bool"), &json!(true)).unwrap(), "true");
        assert_eq!(literal(&atom("int"), &json!(-4)).unwrap(), "-4");
        assert_eq!(literal(&atom("double"), &json!(2.5)).unwrap(), "2.5");
        assert_eq!(literal(&atom("double"), &json!(3)).unwrap(), "3");
    }

    #[test]
    fn test_rejects_mismatch() {
        assert!(literal(&atom("int"), &json!("x")).is_err());
        assert!(literal(&atom("int"), &json!(1.5)).is_err());
        assert!(literal(&atom("boost::uuids::uuid"), &json!("x")).is_err());
    }

    #[test]
    fn test_keys() {
        assert_eq!(key_literal(&atom("int"), "12").unwrap(), "12");
        assert_eq!(key_literal(&atom("std::string"), "k").unwrap(), "\"k\"");
        assert_eq!(key_literal(&atom("bool"), "False").unwrap(), "false");
        assert!(key_literal(&atom("int"), "twelve").is_err());
    }

    #[test]
    fn test_nuclide() {
        assert_eq!(nuclide_literal(&json!(922350000)), "\"922350000\"");
        assert_eq!(nuclide_literal(&json!("U235")), "\"U235\"");
        assert_eq!(nuclide_id_literal(&json!("U235")), "pyne::nucname::id(\"U235\")");
    }
}
