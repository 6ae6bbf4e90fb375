//! operators on queries and their evaluation on values
use super::{EvaluationError, IntoQuery, Query, QueryKind};
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
        }
    }

    pub(crate) fn apply(self, left: Value, right: Value) -> Result<Value, EvaluationError> {
        match self {
            BinaryOp::And => Ok(if left.is_truthy() { right } else { left }),
            BinaryOp::Or => Ok(if left.is_truthy() { left } else { right }),
            BinaryOp::Add => add(left, right),
            BinaryOp::Sub => numeric(self, left, right, i64::checked_sub, |a, b| a - b),
            BinaryOp::Mul => mul(left, right),
            BinaryOp::Div => div(left, right),
            BinaryOp::Rem => match left {
                Value::String(template) => Ok(Value::String(format_percent(&template, &right)?)),
                left => rem(left, right),
            },
        }
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> EvaluationError {
    EvaluationError::UnsupportedOperands {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn numeric(
    op: BinaryOp,
    left: Value,
    right: Value,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Value, EvaluationError> {
    match (&left, &right) {
        (Value::Integer(a), Value::Integer(b)) => int(*a, *b)
            .map(Value::Integer)
            .ok_or(EvaluationError::Overflow(op.symbol())),
        (Value::Integer(_) | Value::Decimal(_), Value::Integer(_) | Value::Decimal(_)) => {
            match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Decimal(float(a, b))),
                _ => Err(unsupported(op, &left, &right)),
            }
        }
        _ => Err(unsupported(op, &left, &right)),
    }
}

fn add(left: Value, right: Value) -> Result<Value, EvaluationError> {
    match (left, right) {
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Ok(Value::String(a))
        }
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (left, right) => numeric(BinaryOp::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

/// Length of `len` items repeated `count` times, negative counts repeat nothing
fn repeated_len(len: usize, count: i64, item_size: usize) -> Result<usize, EvaluationError> {
    let count = usize::try_from(count).unwrap_or(0);
    len.checked_mul(count)
        .filter(|total| total.saturating_mul(item_size) <= isize::MAX as usize)
        .ok_or(EvaluationError::Overflow(BinaryOp::Mul.symbol()))
}

fn mul(left: Value, right: Value) -> Result<Value, EvaluationError> {
    match (left, right) {
        (Value::String(s), Value::Integer(n)) | (Value::Integer(n), Value::String(s)) => {
            let len = repeated_len(s.len(), n, 1)?;
            Ok(Value::String(if len == 0 { String::new() } else { s.repeat(len / s.len()) }))
        }
        (Value::Array(a), Value::Integer(n)) | (Value::Integer(n), Value::Array(a)) => {
            let len = repeated_len(a.len(), n, std::mem::size_of::<Value>())?;
            Ok(Value::Array(a.into_iter().cycle().take(len).collect()))
        }
        (left, right) => numeric(BinaryOp::Mul, left, right, i64::checked_mul, |a, b| a * b),
    }
}

fn div(left: Value, right: Value) -> Result<Value, EvaluationError> {
    if matches!(right, Value::Integer(0)) || matches!(right, Value::Decimal(d) if d == 0.0) {
        if matches!(left, Value::Integer(_) | Value::Decimal(_)) {
            return Err(EvaluationError::DivisionByZero);
        }
    }
    numeric(BinaryOp::Div, left, right, floor_div, |a, b| a / b)
}

fn rem(left: Value, right: Value) -> Result<Value, EvaluationError> {
    if matches!(right, Value::Integer(0)) || matches!(right, Value::Decimal(d) if d == 0.0) {
        if matches!(left, Value::Integer(_) | Value::Decimal(_)) {
            return Err(EvaluationError::DivisionByZero);
        }
    }
    numeric(BinaryOp::Rem, left, right, floor_rem, |a, b| {
        let r = a % b;
        if r != 0.0 && (r < 0.0) != (b < 0.0) {
            r + b
        } else {
            r
        }
    })
}

/// Integer division rounding towards negative infinity
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    if a % b != 0 && (a < 0) != (b < 0) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

/// Remainder with the sign of the divisor
fn floor_rem(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && (r < 0) != (b < 0) {
        Some(r + b)
    } else {
        Some(r)
    }
}

/// printf style interpolation: `%s`, `%r`, `%d`, `%i`, `%f`, `%%` and `%(key)s` with an object
pub(crate) fn format_percent(template: &str, args: &Value) -> Result<String, EvaluationError> {
    let positional: Vec<&Value> = match args {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => Vec::new(),
        other => vec![other],
    };
    let mut positional = positional.into_iter();

    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }

        let value = match chars.peek() {
            Some('%') => {
                chars.next();
                output.push('%');
                continue;
            }
            Some('(') => {
                chars.next();
                let key: String = chars.by_ref().take_while(|c| *c != ')').collect();
                let Value::Object(object) = args else {
                    return Err(EvaluationError::Format(format!(
                        "%({key}) requires an object, got {}",
                        args.type_name()
                    )));
                };
                object
                    .get(&key)
                    .ok_or_else(|| EvaluationError::Format(format!("missing key {key:?}")))?
            }
            _ => positional
                .next()
                .ok_or_else(|| EvaluationError::Format("not enough arguments".to_string()))?,
        };

        match chars.next() {
            Some('s') => output.push_str(&value.to_string()),
            Some('r') => output.push_str(&value.repr()),
            Some('d' | 'i') => match value {
                Value::Integer(i) => output.push_str(&i.to_string()),
                Value::Decimal(d) => output.push_str(&(d.trunc() as i64).to_string()),
                other => {
                    return Err(EvaluationError::Format(format!(
                        "%d requires a number, got {}",
                        other.type_name()
                    )))
                }
            },
            Some('f') => match value.as_f64() {
                Some(d) => output.push_str(&format!("{d:.6}")),
                None => {
                    return Err(EvaluationError::Format(format!(
                        "%f requires a number, got {}",
                        value.type_name()
                    )))
                }
            },
            Some(other) => {
                return Err(EvaluationError::Format(format!(
                    "unsupported conversion %{other}"
                )))
            }
            None => return Err(EvaluationError::Format("incomplete format".to_string())),
        }
    }

    if positional.next().is_some() {
        return Err(EvaluationError::Format(
            "not all arguments converted".to_string(),
        ));
    }

    Ok(output)
}

macro_rules! query_operator {
    (@reflected $trait:ident, $method:ident, $op:expr, $($lhs:ty),*) => {
        $(
            impl std::ops::$trait<Query> for $lhs {
                type Output = Query;

                #[track_caller]
                fn $method(self, rhs: Query) -> Query {
                    Query::operator($op, self.into_query(), rhs)
                }
            }
        )*
    };
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: IntoQuery> std::ops::$trait<R> for Query {
            type Output = Query;

            #[track_caller]
            fn $method(self, rhs: R) -> Query {
                Query::operator($op, self, rhs.into_query())
            }
        }

        query_operator!(@reflected $trait, $method, $op, Value, bool, i32, i64, f64, &str, String);
    };
}

query_operator!(Add, add, BinaryOp::Add);
query_operator!(Sub, sub, BinaryOp::Sub);
query_operator!(Mul, mul, BinaryOp::Mul);
query_operator!(Div, div, BinaryOp::Div);
query_operator!(Rem, rem, BinaryOp::Rem);
query_operator!(BitAnd, bitand, BinaryOp::And);
query_operator!(BitOr, bitor, BinaryOp::Or);

impl std::ops::Not for Query {
    type Output = Query;

    #[track_caller]
    fn not(self) -> Query {
        Query::new(QueryKind::Invert(Arc::new(self)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::{q, Q};
    use pretty_assertions::assert_eq;

    fn eval(query: Query) -> Value {
        query.resolve(&Value::Null).unwrap()
    }

    #[test]
    fn literals_on_both_sides() {
        assert_eq!(eval(q("a") + "b"), Value::from("ab"));
        assert_eq!(eval("a" + q("b")), Value::from("ab"));
        assert_eq!(eval(12 / q(4)), Value::from(3));
        assert_eq!(eval(q(12) / 5), Value::from(2));
        assert_eq!(eval(q(-7) / 2), Value::from(-4));
        assert_eq!(eval(q(7.0) / 2), Value::from(3.5));
        assert_eq!(eval(q(7) % 3), Value::from(1));
        assert_eq!(eval(q(-7) % 3), Value::from(2));
        assert_eq!(eval(2 * q("ab")), Value::from("abab"));
        assert_eq!(eval(q(vec![1]) + vec![Value::from(2)]), Value::from(vec![1, 2]));
        assert_eq!(eval(q(1) - 0.5), Value::from(0.5));
    }

    #[test]
    fn boolean_operators_return_operands() {
        assert_eq!(eval(q(true) & "x"), Value::from("x"));
        assert_eq!(eval(q(0) & "x"), Value::from(0));
        assert_eq!(eval(q("") | "fallback"), Value::from("fallback"));
        assert_eq!(eval(q("set") | "fallback"), Value::from("set"));
        assert_eq!(eval(!q(false)), Value::from(true));
        assert_eq!(eval(!q("x")), Value::from(false));
    }

    #[test]
    fn formatting() {
        assert_eq!(eval(q("before %s after") % "value"), Value::from("before value after"));
        assert_eq!(
            eval(q("%s-%d-%r %%") % q(vec![Value::from("a"), 2.9.into(), "c".into()])),
            Value::from(r#"a-2-"c" %"#)
        );

        let mut object = indexmap::IndexMap::new();
        object.insert("name".to_string(), Value::from("web"));
        assert_eq!(
            eval(q("host %(name)s") % Value::Object(object)),
            Value::from("host web")
        );

        let too_few = (q("%s %s") % "one").resolve(&Value::Null);
        assert!(matches!(too_few, Err(EvaluationError::Format(_))));
        let too_many = (q("%s") % q(vec!["a", "b"])).resolve(&Value::Null);
        assert!(matches!(too_many, Err(EvaluationError::Format(_))));
    }

    #[test]
    fn errors() {
        assert!(matches!(
            (q(1) / 0).resolve(&Value::Null),
            Err(EvaluationError::DivisionByZero)
        ));
        assert!(matches!(
            (q(1) - "a").resolve(&Value::Null),
            Err(EvaluationError::UnsupportedOperands { op: "-", left: "integer", right: "string" })
        ));
        assert!(matches!(
            (q(i64::MAX) + 1).resolve(&Value::Null),
            Err(EvaluationError::Overflow("+"))
        ));
    }

    #[test]
    fn repetition() {
        assert_eq!(eval(q("ab") * 3), Value::from("ababab"));
        assert_eq!(eval(2 * q(vec![1])), Value::from(vec![1, 1]));
        assert_eq!(eval(q("ab") * -1), Value::from(""));
        assert_eq!(eval(q("") * i64::MAX), Value::from(""));

        assert!(matches!(
            (q("ab") * i64::MAX).resolve(&Value::Null),
            Err(EvaluationError::Overflow("*"))
        ));
        assert!(matches!(
            (q(vec![1, 2]) * i64::MAX).resolve(&Value::Null),
            Err(EvaluationError::Overflow("*"))
        ));
    }

    #[test]
    fn operators_on_the_context() {
        let mut object = indexmap::IndexMap::new();
        object.insert("a".to_string(), Value::from(3));
        object.insert("b".to_string(), Value::from(4));
        let context = Value::Object(object);

        assert_eq!((Q.attr("a") + Q.attr("b")).resolve(&context).unwrap(), Value::from(7));
        assert_eq!((Q.item("a") * Q.item("b")).resolve(&context).unwrap(), Value::from(12));
    }
}
