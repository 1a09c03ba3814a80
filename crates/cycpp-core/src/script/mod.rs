//! Directive argument language.
//!
//! `var` and `note` arguments are expressions that must produce a mapping;
//! `exec` arguments are `;`-separated statements whose assignments persist
//! across directives. Values are `serde_json::Value`s.

mod eval;
mod parser;

pub use eval::{eval, exec, type_name, Env};
pub use parser::{parse_expr, parse_program, BinOp, Expr, Stmt, UnaryOp};

use serde_json::{Map, Value};
use thiserror::Error;

/// Longest list, string or range a directive may build.
pub const MAX_SEQUENCE_LEN: usize = 1 << 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("syntax error at offset {offset} in directive argument: {text}")]
    Parse { text: String, offset: usize },

    #[error("name {0:?} is not defined")]
    UndefinedName(String),

    #[error("unsupported operand type(s) for {op}: {left} and {right}")]
    Operands {
        op: String,
        left: String,
        right: String,
    },

    #[error("{0}")]
    Type(String),

    #[error("key {0:?} not found")]
    MissingKey(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("{function}() takes {expected} argument(s), {given} given")]
    Arity {
        function: String,
        expected: String,
        given: usize,
    },

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("{type_name} has no method {method:?}")]
    UnknownMethod { type_name: String, method: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid literal for {target}(): {text:?}")]
    InvalidNumber { target: String, text: String },

    #[error("directive argument must evaluate to a mapping, got {0}")]
    NotAMapping(String),

    #[error("{what} would hold more than {limit} items")]
    TooLarge { what: String, limit: usize },
}

impl ScriptError {
    pub fn operands(op: &str, left: &Value, right: &Value) -> Self {
        Self::Operands {
            op: op.to_string(),
            left: type_name(left).to_string(),
            right: type_name(right).to_string(),
        }
    }

    pub fn too_large(what: &str) -> Self {
        Self::TooLarge {
            what: what.to_string(),
            limit: MAX_SEQUENCE_LEN,
        }
    }

    pub fn arity(function: &str, expected: &str, given: usize) -> Self {
        Self::Arity {
            function: function.to_string(),
            expected: expected.to_string(),
            given,
        }
    }
}

/// Evaluate `src` as an expression that must produce a mapping.
pub fn eval_mapping(src: &str, env: &Env<'_>) -> Result<Map<String, Value>, ScriptError> {
    let expr = parse_expr(src)?;
    match eval(&expr, env)? {
        Value::Object(map) => Ok(map),
        other => Err(ScriptError::NotAMapping(type_name(&other).to_string())),
    }
}

/// Run `src` as statements. Assignments land in `namespace`, which is also
/// the last scope consulted for names.
pub fn run(
    src: &str,
    scopes: &[&Map<String, Value>],
    namespace: &mut Map<String, Value>,
) -> Result<(), ScriptError> {
    let program = parse_program(src)?;
    exec(&program, scopes, namespace)
}
