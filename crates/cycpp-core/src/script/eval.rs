use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::parser::{BinOp, Expr, Stmt, UnaryOp};
use super::{ScriptError, MAX_SEQUENCE_LEN};

type EvalResult = Result<Value, ScriptError>;

/// Name scopes consulted in order; the first frame holding a name wins.
#[derive(Debug, Clone, Default)]
pub struct Env<'a> {
    frames: Vec<&'a Map<String, Value>>,
}

impl<'a> Env<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: &'a Map<String, Value>) {
        self.frames.push(frame);
    }

    pub fn with(mut self, frame: &'a Map<String, Value>) -> Self {
        self.push(frame);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        self.frames.iter().find_map(|frame| frame.get(name))
    }
}

pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(v: &Value) -> Option<Num> {
        let Value::Number(n) = v else {
            return None;
        };
        match n.as_i64() {
            Some(i) => Some(Num::Int(i)),
            None => n.as_f64().map(Num::Float),
        }
    }

    fn float(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(i) => Value::from(i),
            Num::Float(f) => Value::from(f),
        }
    }
}

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

/// Text form used by `str()` and for map keys.
pub fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn map_key(key: &Value) -> Result<String, ScriptError> {
    match key {
        Value::Array(_) | Value::Object(_) => Err(ScriptError::Type(format!(
            "{} cannot be used as a map key",
            type_name(key)
        ))),
        other => Ok(display(other)),
    }
}

pub fn eval(expr: &Expr, env: &Env<'_>) -> EvalResult {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::List(items) => eval_all(items, env).map(Value::Array),
        Expr::Map(entries) => {
            let mut map = Map::new();
            for (k, v) in entries {
                let key = map_key(&eval(k, env)?)?;
                map.insert(key, eval(v, env)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Name(name) => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| ScriptError::UndefinedName(name.clone())),
        Expr::Attr(obj, name) => attribute(&eval(obj, env)?, name),
        Expr::Index(obj, idx) => index(&eval(obj, env)?, &eval(idx, env)?),
        Expr::Call { func, args, kwargs } => call(func, args, kwargs, env),
        Expr::Unary(UnaryOp::Neg, e) => negate(eval(e, env)?),
        Expr::Unary(UnaryOp::Not, e) => Ok(Value::Bool(!truthy(&eval(e, env)?))),
        Expr::Binary(op, l, r) => binary(*op, eval(l, env)?, eval(r, env)?),
        Expr::And(l, r) => {
            let l = eval(l, env)?;
            if truthy(&l) {
                eval(r, env)
            } else {
                Ok(l)
            }
        }
        Expr::Or(l, r) => {
            let l = eval(l, env)?;
            if truthy(&l) {
                Ok(l)
            } else {
                eval(r, env)
            }
        }
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if truthy(&eval(cond, env)?) {
                eval(then, env)
            } else {
                eval(otherwise, env)
            }
        }
    }
}

fn eval_all(items: &[Expr], env: &Env<'_>) -> Result<Vec<Value>, ScriptError> {
    items.iter().map(|e| eval(e, env)).collect()
}

/// Run statements in order. Assignments write `namespace`, which is
/// searched after every frame in `scopes`.
pub fn exec(
    program: &[Stmt],
    scopes: &[&Map<String, Value>],
    namespace: &mut Map<String, Value>,
) -> Result<(), ScriptError> {
    for stmt in program {
        let (target, expr) = match stmt {
            Stmt::Assign(name, expr) => (Some(name), expr),
            Stmt::Expr(expr) => (None, expr),
        };
        let value = {
            let mut env = Env::new();
            for scope in scopes {
                env.push(scope);
            }
            env.push(namespace);
            eval(expr, &env)?
        };
        if let Some(name) = target {
            namespace.insert(name.clone(), value);
        }
    }
    Ok(())
}

fn attribute(obj: &Value, name: &str) -> EvalResult {
    match obj {
        Value::Object(map) => map
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::MissingKey(name.to_string())),
        other => Err(ScriptError::Type(format!(
            "{} has no attribute {name:?}",
            type_name(other)
        ))),
    }
}

fn position(i: i64, len: usize) -> Result<usize, ScriptError> {
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(ScriptError::IndexOutOfRange { index: i, len });
    }
    Ok(resolved as usize)
}

fn int_arg(v: &Value, what: &str) -> Result<i64, ScriptError> {
    match Num::of(v) {
        Some(Num::Int(i)) => Ok(i),
        _ => Err(ScriptError::Type(format!(
            "{what} must be an int, not {}",
            type_name(v)
        ))),
    }
}

fn index(obj: &Value, idx: &Value) -> EvalResult {
    match obj {
        Value::Array(items) => {
            let i = position(int_arg(idx, "list index")?, items.len())?;
            Ok(items[i].clone())
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = position(int_arg(idx, "string index")?, chars.len())?;
            Ok(Value::String(chars[i].to_string()))
        }
        Value::Object(map) => {
            let key = map_key(idx)?;
            map.get(&key)
                .cloned()
                .ok_or(ScriptError::MissingKey(key))
        }
        other => Err(ScriptError::Type(format!(
            "{} is not subscriptable",
            type_name(other)
        ))),
    }
}

fn negate(v: Value) -> EvalResult {
    match Num::of(&v) {
        Some(Num::Int(i)) => Ok(i
            .checked_neg()
            .map(Value::from)
            .unwrap_or_else(|| Value::from(-(i as f64)))),
        Some(Num::Float(f)) => Ok(Value::from(-f)),
        None => Err(ScriptError::Type(format!(
            "bad operand type for unary -: {}",
            type_name(&v)
        ))),
    }
}

fn arith(op: BinOp, a: Num, b: Num) -> EvalResult {
    use Num::{Float, Int};
    let result = match (op, a, b) {
        (BinOp::Div, _, _) => {
            if b.float() == 0.0 {
                return Err(ScriptError::DivisionByZero);
            }
            Float(a.float() / b.float())
        }
        (BinOp::Rem, Int(x), Int(y)) => {
            if y == 0 {
                return Err(ScriptError::DivisionByZero);
            }
            let r = x.wrapping_rem(y);
            Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r })
        }
        (BinOp::Rem, _, _) => {
            let (x, y) = (a.float(), b.float());
            if y == 0.0 {
                return Err(ScriptError::DivisionByZero);
            }
            let r = x % y;
            Float(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r })
        }
        (_, Int(x), Int(y)) => {
            let exact = match op {
                BinOp::Add => x.checked_add(y),
                BinOp::Sub => x.checked_sub(y),
                _ => x.checked_mul(y),
            };
            match exact {
                Some(i) => Int(i),
                None => return arith(op, Float(x as f64), Float(y as f64)),
            }
        }
        (_, _, _) => {
            let (x, y) = (a.float(), b.float());
            Float(match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                _ => x * y,
            })
        }
    };
    Ok(result.into_value())
}

/// Length of `n` copies of a `unit`-long sequence, capped at
/// `MAX_SEQUENCE_LEN`.
fn repeated_len(unit: usize, n: i64, what: &str) -> Result<usize, ScriptError> {
    let n = usize::try_from(n).unwrap_or(0);
    match unit.checked_mul(n) {
        Some(len) if len <= MAX_SEQUENCE_LEN => Ok(len),
        _ => Err(ScriptError::too_large(what)),
    }
}

fn repeat<T: Clone>(items: &[T], n: i64) -> Result<Vec<T>, ScriptError> {
    let mut out = Vec::with_capacity(repeated_len(items.len(), n, "repeated list")?);
    for _ in 0..n {
        out.extend_from_slice(items);
    }
    Ok(out)
}

fn binary(op: BinOp, l: Value, r: Value) -> EvalResult {
    match op {
        BinOp::Eq => return Ok(Value::Bool(values_equal(&l, &r))),
        BinOp::Ne => return Ok(Value::Bool(!values_equal(&l, &r))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = compare(&l, &r, op.symbol())?;
            let result = match op {
                BinOp::Lt => ord == Ordering::Less,
                BinOp::Le => ord != Ordering::Greater,
                BinOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        BinOp::In => return contains(&r, &l).map(Value::Bool),
        BinOp::NotIn => return contains(&r, &l).map(|found| Value::Bool(!found)),
        _ => {}
    }

    if let (Some(a), Some(b)) = (Num::of(&l), Num::of(&r)) {
        return arith(op, a, b);
    }
    match (op, &l, &r) {
        (BinOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (BinOp::Add, Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().chain(b).cloned().collect()))
        }
        (BinOp::Mul, Value::String(s), n @ Value::Number(_))
        | (BinOp::Mul, n @ Value::Number(_), Value::String(s)) => {
            let n = int_arg(n, "repeat count")?;
            repeated_len(s.len(), n, "repeated string")?;
            Ok(Value::String(s.repeat(usize::try_from(n).unwrap_or(0))))
        }
        (BinOp::Mul, Value::Array(items), n @ Value::Number(_))
        | (BinOp::Mul, n @ Value::Number(_), Value::Array(items)) => {
            let n = int_arg(n, "repeat count")?;
            Ok(Value::Array(repeat(items, n)?))
        }
        _ => Err(ScriptError::operands(op.symbol(), &l, &r)),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(_), Value::Number(_)) => match (Num::of(l), Num::of(r)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
            (Some(a), Some(b)) => a.float() == b.float(),
            _ => false,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => l == r,
    }
}

fn compare(l: &Value, r: &Value, op: &str) -> Result<Ordering, ScriptError> {
    match (l, r) {
        (Value::Number(_), Value::Number(_)) => match (Num::of(l), Num::of(r)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(a.cmp(&b)),
            (Some(a), Some(b)) => Ok(a.float().partial_cmp(&b.float()).unwrap_or(Ordering::Equal)),
            _ => Err(ScriptError::operands(op, l, r)),
        },
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y, op)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(ScriptError::operands(op, l, r)),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, ScriptError> {
    match (container, item) {
        (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
        (Value::Array(items), _) => Ok(items.iter().any(|x| values_equal(x, item))),
        (Value::Object(map), _) => Ok(map.contains_key(&map_key(item)?)),
        _ => Err(ScriptError::operands("in", item, container)),
    }
}

fn iterate(v: &Value) -> Result<Vec<Value>, ScriptError> {
    match v {
        Value::Array(items) => Ok(items.clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::Object(map) => Ok(map.keys().cloned().map(Value::String).collect()),
        other => Err(ScriptError::Type(format!(
            "{} is not iterable",
            type_name(other)
        ))),
    }
}

fn call(func: &Expr, args: &[Expr], kwargs: &[(String, Expr)], env: &Env<'_>) -> EvalResult {
    let args = eval_all(args, env)?;
    let mut named = Map::new();
    for (key, expr) in kwargs {
        named.insert(key.clone(), eval(expr, env)?);
    }
    match func {
        Expr::Attr(obj, method) => {
            if !named.is_empty() {
                return Err(ScriptError::Type(format!(
                    "{method}() takes no keyword arguments"
                )));
            }
            call_method(&eval(obj, env)?, method, args)
        }
        Expr::Name(name) => call_builtin(name, args, named),
        _ => Err(ScriptError::Type("expression is not callable".into())),
    }
}

fn call_method(obj: &Value, method: &str, args: Vec<Value>) -> EvalResult {
    let Value::Object(map) = obj else {
        return Err(ScriptError::UnknownMethod {
            type_name: type_name(obj).to_string(),
            method: method.to_string(),
        });
    };
    match (method, args.as_slice()) {
        ("get", [key]) => Ok(map.get(&map_key(key)?).cloned().unwrap_or(Value::Null)),
        ("get", [key, default]) => Ok(map
            .get(&map_key(key)?)
            .cloned()
            .unwrap_or_else(|| default.clone())),
        ("get", _) => Err(ScriptError::arity("get", "1 or 2", args.len())),
        ("keys", []) => Ok(Value::Array(map.keys().cloned().map(Value::String).collect())),
        ("values", []) => Ok(Value::Array(map.values().cloned().collect())),
        ("items", []) => Ok(Value::Array(
            map.iter()
                .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
                .collect(),
        )),
        ("keys" | "values" | "items", _) => Err(ScriptError::arity(method, "0", args.len())),
        _ => Err(ScriptError::UnknownMethod {
            type_name: "map".into(),
            method: method.to_string(),
        }),
    }
}

fn to_int(v: &Value) -> EvalResult {
    match (Num::of(v), v) {
        (Some(Num::Int(i)), _) => Ok(Value::from(i)),
        (Some(Num::Float(f)), _) => Ok(Value::from(f.trunc() as i64)),
        (None, Value::Bool(b)) => Ok(Value::from(i64::from(*b))),
        (None, Value::String(s)) => s.trim().parse::<i64>().map(Value::from).map_err(|_| {
            ScriptError::InvalidNumber {
                target: "int".into(),
                text: s.clone(),
            }
        }),
        _ => Err(ScriptError::Type(format!(
            "int() argument must be a string or a number, not {}",
            type_name(v)
        ))),
    }
}

fn to_float(v: &Value) -> EvalResult {
    match (Num::of(v), v) {
        (Some(n), _) => Ok(Value::from(n.float())),
        (None, Value::Bool(b)) => Ok(Value::from(if *b { 1.0 } else { 0.0 })),
        (None, Value::String(s)) => s.trim().parse::<f64>().map(Value::from).map_err(|_| {
            ScriptError::InvalidNumber {
                target: "float".into(),
                text: s.clone(),
            }
        }),
        _ => Err(ScriptError::Type(format!(
            "float() argument must be a string or a number, not {}",
            type_name(v)
        ))),
    }
}

fn range(args: &[Value]) -> EvalResult {
    let ints = args
        .iter()
        .map(|a| int_arg(a, "range() argument"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(ScriptError::arity("range", "1 to 3", args.len())),
    };
    if step == 0 {
        return Err(ScriptError::Type("range() step must not be zero".into()));
    }
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let span = if step > 0 { stop - start } else { start - stop };
    let len = if span > 0 { (span - 1) / step.abs() + 1 } else { 0 };
    if len > MAX_SEQUENCE_LEN as i128 {
        return Err(ScriptError::too_large("range()"));
    }
    // every element lies between start and stop, so it fits in an i64
    Ok(Value::Array(
        (0..len)
            .filter_map(|k| i64::try_from(start + k * step).ok())
            .map(Value::from)
            .collect(),
    ))
}

fn extremum(name: &str, args: Vec<Value>, want: Ordering) -> EvalResult {
    let items = match args.as_slice() {
        [] => return Err(ScriptError::arity(name, "at least 1", 0)),
        [only] => iterate(only)?,
        _ => args,
    };
    let mut best: Option<Value> = None;
    for item in items {
        best = match best {
            Some(b) if compare(&item, &b, name)? != want => Some(b),
            _ => Some(item),
        };
    }
    best.ok_or_else(|| ScriptError::Type(format!("{name}() arg is an empty sequence")))
}

fn call_builtin(name: &str, args: Vec<Value>, named: Map<String, Value>) -> EvalResult {
    if !named.is_empty() && name != "dict" {
        return Err(ScriptError::Type(format!(
            "{name}() takes no keyword arguments"
        )));
    }
    match (name, args.as_slice()) {
        ("len", [v]) => match v {
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Array(a) => Ok(Value::from(a.len())),
            Value::Object(m) => Ok(Value::from(m.len())),
            other => Err(ScriptError::Type(format!(
                "{} has no len()",
                type_name(other)
            ))),
        },
        ("str", []) => Ok(Value::String(String::new())),
        ("str", [v]) => Ok(Value::String(display(v))),
        ("int", []) => Ok(Value::from(0)),
        ("int", [v]) => to_int(v),
        ("float", []) => Ok(Value::from(0.0)),
        ("float", [v]) => to_float(v),
        ("bool", []) => Ok(Value::Bool(false)),
        ("bool", [v]) => Ok(Value::Bool(truthy(v))),
        ("list", []) => Ok(Value::Array(Vec::new())),
        ("list", [v]) => iterate(v).map(Value::Array),
        ("dict", [] | [_]) => {
            let mut map = match args.first() {
                None => Map::new(),
                Some(Value::Object(m)) => m.clone(),
                Some(other) => {
                    let mut map = Map::new();
                    for pair in iterate(other)? {
                        match pair {
                            Value::Array(kv) if kv.len() == 2 => {
                                map.insert(map_key(&kv[0])?, kv[1].clone());
                            }
                            _ => {
                                return Err(ScriptError::Type(
                                    "dict() sequence elements must be pairs".into(),
                                ))
                            }
                        }
                    }
                    map
                }
            };
            map.extend(named);
            Ok(Value::Object(map))
        }
        ("range", _) => range(&args),
        ("min", _) => extremum("min", args, Ordering::Less),
        ("max", _) => extremum("max", args, Ordering::Greater),
        ("sorted", [v]) => {
            let mut items = iterate(v)?;
            let mut failure = None;
            items.sort_by(|a, b| {
                compare(a, b, "<").unwrap_or_else(|e| {
                    failure.get_or_insert(e);
                    Ordering::Equal
                })
            });
            match failure {
                Some(e) => Err(e),
                None => Ok(Value::Array(items)),
            }
        }
        ("len" | "sorted", _) => Err(ScriptError::arity(name, "1", args.len())),
        ("str" | "int" | "float" | "bool" | "list" | "dict", _) => {
            Err(ScriptError::arity(name, "0 or 1", args.len()))
        }
        _ => Err(ScriptError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{eval_mapping, parse_expr, run};
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn eval_str(src: &str) -> EvalResult {
        eval(&parse_expr(src)?, &Env::new())
    }

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_oversized_sequences_are_errors() {
        for src in [
            "'ab' * 9223372036854775807",
            "[1, 2] * 9223372036854775807",
            "9223372036854775807 * [1, 2]",
            "range(9223372036854775807)",
        ] {
            let err = eval_str(src).unwrap_err();
            assert!(matches!(err, ScriptError::TooLarge { .. }), "{src}: {err}");
        }
        assert_eq!(eval_str("'ab' * -3").unwrap(), json!(""));
    }

    #[test]
    fn test_range_near_integer_limits() {
        assert_eq!(
            eval_str("range(9223372036854775806, 9223372036854775807, 10)").unwrap(),
            json!([9223372036854775806i64])
        );
        assert_eq!(
            eval_str("range(-9223372036854775807, -9223372036854775807 - 1, -5)").unwrap(),
            json!([-9223372036854775807i64])
        );
        assert_eq!(eval_str("range(10, 0, -3)").unwrap(), json!([10, 7, 4, 1]));
        assert_eq!(eval_str("range(0, 10, 4)").unwrap(), json!([0, 4, 8]));
        assert_eq!(eval_str("range(5, 5)").unwrap(), json!([]));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_str("1 + 2 * 3").unwrap(), json!(7));
        assert_eq!(eval_str("7 / 2").unwrap(), json!(3.5));
        assert_eq!(eval_str("-7 % 3").unwrap(), json!(2));
        assert_eq!(eval_str("7 % -3").unwrap(), json!(-2));
        assert_eq!(eval_str("1.5 * 2").unwrap(), json!(3.0));
        assert_eq!(eval_str("'ab' * 2 + 'c'").unwrap(), json!("ababc"));
        assert_eq!(eval_str("[1] + [2] * 2").unwrap(), json!([1, 2, 2]));
        assert_eq!(eval_str("1 / 0"), Err(ScriptError::DivisionByZero));
    }

    #[test]
    fn test_logic_returns_operands() {
        assert_eq!(eval_str("0 or 'x'").unwrap(), json!("x"));
        assert_eq!(eval_str("[] and undefined_name").unwrap(), json!([]));
        assert_eq!(eval_str("'a' if 1 < 2 else 'b'").unwrap(), json!("a"));
        assert_eq!(eval_str("1 == 1.0").unwrap(), json!(true));
        assert_eq!(eval_str("'k' not in {'k': 1}").unwrap(), json!(false));
    }

    #[test]
    fn test_builtins() {
        assert_eq!(eval_str("len({'a': 1, 'b': 2})").unwrap(), json!(2));
        assert_eq!(eval_str("range(1, 7, 2)").unwrap(), json!([1, 3, 5]));
        assert_eq!(eval_str("sorted(['b', 'a'])").unwrap(), json!(["a", "b"]));
        assert_eq!(eval_str("max(3, 9, 4)").unwrap(), json!(9));
        assert_eq!(eval_str("min([3, 9, 4])").unwrap(), json!(3));
        assert_eq!(eval_str("int('42') + int(2.9)").unwrap(), json!(44));
        assert_eq!(eval_str("dict(a=1, b=[2])").unwrap(), json!({"a": 1, "b": [2]}));
        assert_eq!(eval_str("str(1.5) + str(True)").unwrap(), json!("1.5true"));
        assert_eq!(eval_str("list((1, 2))").unwrap(), json!([1, 2]));
        assert!(matches!(
            eval_str("int('x')"),
            Err(ScriptError::InvalidNumber { .. })
        ));
        assert!(matches!(
            eval_str("frobnicate(1)"),
            Err(ScriptError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_methods_and_subscripts() {
        let scope = object(json!({"m": {"a": {"default": [1, 2]}}}));
        let env = Env::new().with(&scope);
        let get = |src: &str| eval(&parse_expr(src).unwrap(), &env);
        assert_eq!(get("m.a['default'][-1]").unwrap(), json!(2));
        assert_eq!(get("m.get('zz', 5)").unwrap(), json!(5));
        assert_eq!(get("m.get('zz')").unwrap(), Value::Null);
        assert_eq!(get("m.keys()").unwrap(), json!(["a"]));
        assert_eq!(get("m.items()[0][0]").unwrap(), json!("a"));
        assert_eq!(
            get("m.a['default'][2]"),
            Err(ScriptError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(get("m.zz"), Err(ScriptError::MissingKey("zz".into())));
    }

    #[test]
    fn test_frame_order() {
        let locals = object(json!({"x": 1}));
        let globals = object(json!({"x": 2, "y": 3}));
        let env = Env::new().with(&locals).with(&globals);
        assert_eq!(eval(&parse_expr("x + y").unwrap(), &env).unwrap(), json!(4));
        assert_eq!(
            eval(&parse_expr("z").unwrap(), &env),
            Err(ScriptError::UndefinedName("z".into()))
        );
    }

    #[test]
    fn test_run_persists_assignments() {
        let classes = object(json!({"cap": 10}));
        let mut ns = Map::new();
        run("a = cap * 2; b = a + 1", &[&classes], &mut ns).unwrap();
        run("c = b", &[&classes], &mut ns).unwrap();
        assert_eq!(Value::Object(ns), json!({"a": 20, "b": 21, "c": 21}));
    }

    #[test]
    fn test_eval_mapping_rejects_non_maps() {
        let env = Env::new();
        assert_eq!(
            eval_mapping("{'default': 0}", &env).unwrap(),
            object(json!({"default": 0}))
        );
        assert_eq!(
            eval_mapping("[1]", &env),
            Err(ScriptError::NotAMapping("list".into()))
        );
    }
}
