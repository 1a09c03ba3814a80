//! Directive argument parser using nom
//!
//! # EBNF Grammar
//!
//! ```ebnf
//! program     = statement, {";", statement}, [";"];
//! statement   = identifier, "=", expr | expr;
//!
//! expr        = or_expr, ["if", or_expr, "else", expr];
//! or_expr     = and_expr, {"or", and_expr};
//! and_expr    = not_expr, {"and", not_expr};
//! not_expr    = "not", not_expr | comparison;
//! comparison  = sum, [compare_op, sum];
//! compare_op  = "==" | "!=" | "<=" | ">=" | "<" | ">" | "in" | "not", "in";
//! sum         = term, {("+" | "-"), term};
//! term        = unary, {("*" | "/" | "%"), unary};
//! unary       = "-", unary | postfix;
//! postfix     = atom, {".", identifier | "[", expr, "]" | "(", [arguments], ")"};
//! arguments   = argument, {",", argument}, [","];
//! argument    = identifier, "=", expr | expr;
//!
//! atom        = number | string | constant | identifier | list | group | map;
//! constant    = "True" | "False" | "None" | "true" | "false" | "null";
//! list        = "[", [expr, {",", expr}, [","]], "]";
//! group       = "(", [expr, {",", expr}, [","]], ")";  (* tuples become lists *)
//! map         = "{", [entry, {",", entry}, [","]], "}";
//! entry       = (identifier | expr), ":", expr;     (* bare identifiers are string keys *)
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, peek, recognize, value, verify},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    Finish, IResult,
};
use serde_json::Value;

use super::ScriptError;

const RESERVED: &[&str] = &[
    "and", "or", "not", "if", "else", "in", "True", "False", "None", "true", "false", "null",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Name(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign(String, Expr),
    Expr(Expr),
}

enum Postfix {
    Attr(String),
    Index(Expr),
    Call(Vec<Expr>, Vec<(String, Expr)>),
}

enum Argument {
    Positional(Expr),
    Keyword(String, Expr),
}

/// Parse a single expression, rejecting trailing input.
pub fn parse_expr(src: &str) -> Result<Expr, ScriptError> {
    finish(src, all_consuming(ws(expr))(src))
}

/// Parse `;`-separated statements, rejecting trailing input.
pub fn parse_program(src: &str) -> Result<Vec<Stmt>, ScriptError> {
    let program = terminated(
        separated_list1(ws(char(';')), statement),
        opt(ws(char(';'))),
    );
    finish(src, all_consuming(ws(program))(src))
}

fn finish<O>(src: &str, result: IResult<&str, O>) -> Result<O, ScriptError> {
    result
        .finish()
        .map(|(_, out)| out)
        .map_err(|e: Error<&str>| ScriptError::Parse {
            text: src.to_string(),
            offset: src.len() - e.input.len(),
        })
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A reserved word not directly followed by an identifier character.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input| terminated(tag(kw), not(satisfy(is_ident_char)))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
        |s: &str| !RESERVED.contains(&s),
    )(input)
}

/// `=` that is not the start of `==`.
fn assign_op(input: &str) -> IResult<&str, char> {
    terminated(char('='), not(char('=')))(input)
}

fn statement(input: &str) -> IResult<&str, Stmt> {
    alt((
        map(
            pair(terminated(ws(identifier), ws(assign_op)), expr),
            |(name, value)| Stmt::Assign(name.to_string(), value),
        ),
        map(expr, Stmt::Expr),
    ))(input)
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = or_expr(input)?;
    let (input, branch) = opt(pair(
        preceded(ws(keyword("if")), or_expr),
        preceded(ws(keyword("else")), expr),
    ))(input)?;
    Ok(match branch {
        Some((cond, otherwise)) => (
            input,
            Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(first),
                otherwise: Box::new(otherwise),
            },
        ),
        None => (input, first),
    })
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(keyword("or")), and_expr))(input)?;
    let folded = rest
        .into_iter()
        .fold(first, |acc, rhs| Expr::Or(Box::new(acc), Box::new(rhs)));
    Ok((input, folded))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(ws(keyword("and")), not_expr))(input)?;
    let folded = rest
        .into_iter()
        .fold(first, |acc, rhs| Expr::And(Box::new(acc), Box::new(rhs)));
    Ok((input, folded))
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(keyword("not")), not_expr), |e| {
            Expr::Unary(UnaryOp::Not, Box::new(e))
        }),
        comparison,
    ))(input)
}

fn compare_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        value(BinOp::Eq, tag("==")),
        value(BinOp::Ne, tag("!=")),
        value(BinOp::Le, tag("<=")),
        value(BinOp::Ge, tag(">=")),
        value(BinOp::Lt, char('<')),
        value(BinOp::Gt, char('>')),
        value(BinOp::In, keyword("in")),
        value(
            BinOp::NotIn,
            tuple((keyword("not"), multispace0, keyword("in"))),
        ),
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = sum(input)?;
    let (input, rhs) = opt(pair(ws(compare_op), sum))(input)?;
    Ok(match rhs {
        Some((op, rhs)) => (input, Expr::Binary(op, Box::new(lhs), Box::new(rhs))),
        None => (input, lhs),
    })
}

fn fold_binary(first: Expr, rest: Vec<(BinOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |acc, (op, rhs)| {
        Expr::Binary(op, Box::new(acc), Box::new(rhs))
    })
}

fn sum(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let op = alt((value(BinOp::Add, char('+')), value(BinOp::Sub, char('-'))));
    let (input, rest) = many0(pair(ws(op), term))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let op = alt((
        value(BinOp::Mul, char('*')),
        value(BinOp::Div, char('/')),
        value(BinOp::Rem, char('%')),
    ));
    let (input, rest) = many0(pair(ws(op), unary))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| {
            Expr::Unary(UnaryOp::Neg, Box::new(e))
        }),
        postfix,
    ))(input)
}

fn postfix(input: &str) -> IResult<&str, Expr> {
    let (input, base) = ws(atom)(input)?;
    let (input, ops) = many0(ws(alt((
        map(preceded(char('.'), ws(identifier)), |name| {
            Postfix::Attr(name.to_string())
        }),
        map(delimited(char('['), expr, char(']')), Postfix::Index),
        map(delimited(char('('), arguments, char(')')), |args| {
            let mut positional = Vec::new();
            let mut keyword = Vec::new();
            for arg in args {
                match arg {
                    Argument::Positional(e) => positional.push(e),
                    Argument::Keyword(k, e) => keyword.push((k, e)),
                }
            }
            Postfix::Call(positional, keyword)
        }),
    ))))(input)?;

    let expr = ops.into_iter().fold(base, |acc, op| match op {
        Postfix::Attr(name) => Expr::Attr(Box::new(acc), name),
        Postfix::Index(idx) => Expr::Index(Box::new(acc), Box::new(idx)),
        Postfix::Call(args, kwargs) => Expr::Call {
            func: Box::new(acc),
            args,
            kwargs,
        },
    });
    Ok((input, expr))
}

fn arguments(input: &str) -> IResult<&str, Vec<Argument>> {
    let argument = alt((
        map(
            pair(terminated(ws(identifier), ws(assign_op)), expr),
            |(k, e)| Argument::Keyword(k.to_string(), e),
        ),
        map(expr, Argument::Positional),
    ));
    terminated(
        separated_list0(ws(char(',')), argument),
        pair(opt(ws(char(','))), multispace0),
    )(input)
}

fn atom(input: &str) -> IResult<&str, Expr> {
    alt((
        map(number, Expr::Literal),
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        map(constant, Expr::Literal),
        map(identifier, |name| Expr::Name(name.to_string())),
        list,
        group,
        mapping,
    ))(input)
}

fn constant(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Bool(true), alt((keyword("True"), keyword("true")))),
        value(Value::Bool(false), alt((keyword("False"), keyword("false")))),
        value(Value::Null, alt((keyword("None"), keyword("null")))),
    ))(input)
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn number(input: &str) -> IResult<&str, Value> {
    let float = recognize(alt((
        recognize(tuple((digit1, char('.'), digit0, opt(exponent)))),
        recognize(tuple((char('.'), digit1, opt(exponent)))),
        recognize(pair(digit1, exponent)),
    )));
    let int = terminated(digit1, peek(not(satisfy(is_ident_char))));
    alt((
        map_res(float, |s: &str| s.parse::<f64>().map(Value::from)),
        map_res(int, |s: &str| s.parse::<i64>().map(Value::from)),
    ))(input)
}

/// Single or double quoted string with backslash escapes. Unknown escapes
/// keep their backslash.
fn string_literal(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('\'' | '"'))) => c,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };
    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\\' | '\'' | '"' => out.push(escaped),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            c if c == quote => return Ok((&input[i + 1..], out)),
            c => out.push(c),
        }
    }
    Err(nom::Err::Failure(Error::new(input, ErrorKind::Char)))
}

fn expr_list(input: &str) -> IResult<&str, (Vec<Expr>, bool)> {
    map(
        pair(
            separated_list0(ws(char(',')), expr),
            opt(ws(char(','))),
        ),
        |(items, trailing)| (items, trailing.is_some()),
    )(input)
}

fn list(input: &str) -> IResult<&str, Expr> {
    map(delimited(char('['), ws(expr_list), char(']')), |(items, _)| {
        Expr::List(items)
    })(input)
}

/// Parenthesised expression, or a tuple when a comma is present.
fn group(input: &str) -> IResult<&str, Expr> {
    let (input, (mut items, trailing)) = delimited(char('('), ws(expr_list), char(')'))(input)?;
    if items.len() == 1 && !trailing {
        return Ok((input, items.remove(0)));
    }
    Ok((input, Expr::List(items)))
}

fn map_key(input: &str) -> IResult<&str, Expr> {
    alt((
        terminated(
            map(ws(identifier), |k| Expr::Literal(Value::String(k.to_string()))),
            peek(char(':')),
        ),
        expr,
    ))(input)
}

fn mapping(input: &str) -> IResult<&str, Expr> {
    let entry = pair(terminated(map_key, ws(char(':'))), expr);
    map(
        delimited(
            char('{'),
            ws(terminated(
                separated_list0(ws(char(',')), entry),
                opt(ws(char(','))),
            )),
            char('}'),
        ),
        Expr::Map,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn lit(v: Value) -> Expr {
        Expr::Literal(v)
    }

    #[test]
    fn test_map_with_bare_keys() {
        let e = parse_expr("{default: 0, 'tooltip': \"a \\\"b\\\"\"}").unwrap();
        assert_eq!(
            e,
            Expr::Map(vec![
                (lit(json!("default")), lit(json!(0))),
                (lit(json!("tooltip")), lit(json!("a \"b\""))),
            ])
        );
    }

    #[test]
    fn test_precedence() {
        let e = parse_expr("1 + 2 * 3 == 7 and not x").unwrap();
        let expected = Expr::And(
            Box::new(Expr::Binary(
                BinOp::Eq,
                Box::new(Expr::Binary(
                    BinOp::Add,
                    Box::new(lit(json!(1))),
                    Box::new(Expr::Binary(
                        BinOp::Mul,
                        Box::new(lit(json!(2))),
                        Box::new(lit(json!(3))),
                    )),
                )),
                Box::new(lit(json!(7))),
            )),
            Box::new(Expr::Unary(
                UnaryOp::Not,
                Box::new(Expr::Name("x".into())),
            )),
        );
        assert_eq!(e, expected);
    }

    #[test]
    fn test_tuples_and_groups() {
        assert_eq!(parse_expr("(1)").unwrap(), lit(json!(1)));
        assert_eq!(
            parse_expr("(1,)").unwrap(),
            Expr::List(vec![lit(json!(1))])
        );
        assert_eq!(parse_expr("()").unwrap(), Expr::List(vec![]));
        assert_eq!(
            parse_expr("('a', 2.5e1)").unwrap(),
            Expr::List(vec![lit(json!("a")), lit(json!(25.0))])
        );
    }

    #[test]
    fn test_postfix_chain() {
        let e = parse_expr("a.b['c'].get('d', None)").unwrap();
        let Expr::Call { func, args, kwargs } = e else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 2);
        assert!(kwargs.is_empty());
        assert!(matches!(*func, Expr::Attr(_, ref m) if m == "get"));
    }

    #[test]
    fn test_keyword_arguments() {
        let e = parse_expr("dict(a=1, b=x == 2)").unwrap();
        let Expr::Call { kwargs, .. } = e else {
            panic!("expected a call");
        };
        assert_eq!(kwargs[0].0, "a");
        assert!(matches!(kwargs[1].1, Expr::Binary(BinOp::Eq, _, _)));
    }

    #[test]
    fn test_identifiers_with_keyword_prefix() {
        assert_eq!(parse_expr("notes").unwrap(), Expr::Name("notes".into()));
        assert_eq!(parse_expr("index").unwrap(), Expr::Name("index".into()));
        assert_eq!(parse_expr("x not in y").unwrap(),
            Expr::Binary(
                BinOp::NotIn,
                Box::new(Expr::Name("x".into())),
                Box::new(Expr::Name("y".into())),
            ));
    }

    #[test]
    fn test_program() {
        let stmts = parse_program("x = 1; y = x + 1;").unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], Stmt::Assign("x".into(), lit(json!(1))));
        assert!(matches!(parse_program("x == 1").unwrap()[0], Stmt::Expr(_)));
    }

    #[test]
    fn test_parse_errors_report_offset() {
        let err = parse_expr("{'a': }").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { .. }));
        assert!(parse_expr("'unterminated").is_err());
        assert!(parse_expr("1 2").is_err());
    }
}
