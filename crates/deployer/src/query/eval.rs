use super::{EvaluationError, Query, QueryKind, QueryResult};
use crate::value::{Args, Value};

impl Query {
    /// Evaluates the query against `context`
    ///
    /// The context is usually a node ([Value::Node]). Evaluation never changes the context.
    #[tracing::instrument(level = "trace", skip_all, fields(query = %self))]
    pub fn evaluate(&self, context: &Value) -> Result<QueryResult, EvaluationError> {
        let finish = |result: Value, subqueries: Vec<QueryResult>| QueryResult {
            query: self.clone(),
            result,
            subqueries,
        };

        let result = match &self.kind {
            QueryKind::Identity => finish(context.clone(), Vec::new()),
            QueryKind::Constant(value) => finish(value.as_ref().clone(), Vec::new()),
            QueryKind::List(items) => {
                let parts = evaluate_all(items, context)?;
                let values = parts.iter().map(|part| part.result.clone()).collect();
                finish(Value::Array(values), parts)
            }
            QueryKind::Dict(items) => {
                let mut object = indexmap::IndexMap::new();
                let mut parts = Vec::with_capacity(items.len());
                for (key, item) in items {
                    let part = item.evaluate(context)?;
                    object.insert(key.clone(), part.result.clone());
                    parts.push(part);
                }
                finish(Value::Object(object), parts)
            }
            QueryKind::Attr(subquery, name) => {
                let part = subquery.evaluate(context)?;
                let value = get_attribute(&part.result, name)?;
                finish(value, vec![part])
            }
            QueryKind::Item(subquery, key) => {
                let part = subquery.evaluate(context)?;
                let key = key.evaluate(context)?;
                let value = get_item(&part.result, &key.result)?;
                finish(value, vec![part, key])
            }
            QueryKind::Call {
                callee,
                args,
                kwargs,
            } => {
                let callee = callee.evaluate(context)?;
                let positional = evaluate_all(args, context)?;
                let mut call_args = Args::from(
                    positional
                        .iter()
                        .map(|part| part.result.clone())
                        .collect::<Vec<_>>(),
                );
                let mut parts = vec![callee];
                parts.extend(positional);
                for (key, arg) in kwargs {
                    let part = arg.evaluate(context)?;
                    call_args.keyword.insert(key.clone(), part.result.clone());
                    parts.push(part);
                }
                let value = call(&parts[0].result, &call_args)?;
                finish(value, parts)
            }
            QueryKind::Operator(op, left, right) => {
                let left = left.evaluate(context)?;
                let right = right.evaluate(context)?;
                let value = op.apply(left.result.clone(), right.result.clone())?;
                finish(value, vec![left, right])
            }
            QueryKind::Invert(subquery) => {
                let part = subquery.evaluate(context)?;
                finish(Value::Boolean(!part.result.is_truthy()), vec![part])
            }
            QueryKind::Parent(subquery) => {
                let part = subquery.evaluate(context)?;
                let Value::Node(env) = &part.result else {
                    return Err(EvaluationError::NotANode(part.result.type_name()));
                };
                let parent = env.parent().ok_or_else(|| EvaluationError::NoParent {
                    node: env.node().path().to_string(),
                    target: "parent".to_string(),
                    requested_from: context.to_string(),
                })?;
                finish(Value::Node(parent), vec![part])
            }
            QueryKind::ParentNamed(subquery, name) => {
                let part = subquery.evaluate(context)?;
                let Value::Node(env) = &part.result else {
                    return Err(EvaluationError::NotANode(part.result.type_name()));
                };

                let mut current = env.clone();
                while !current.node().class().is_named(name) {
                    current = current.parent().ok_or_else(|| EvaluationError::NoParent {
                        node: current.node().path().to_string(),
                        target: name.clone(),
                        requested_from: context.to_string(),
                    })?;
                }
                finish(Value::Node(current), vec![part])
            }
        };

        tracing::trace!(result = %result.result, "evaluated");
        Ok(result)
    }
}

fn evaluate_all(items: &[Query], context: &Value) -> Result<Vec<QueryResult>, EvaluationError> {
    items.iter().map(|item| item.evaluate(context)).collect()
}

fn get_attribute(value: &Value, name: &str) -> Result<Value, EvaluationError> {
    let missing = || EvaluationError::NoAttribute {
        attribute: name.to_string(),
        value_type: value.type_name(),
    };

    match value {
        Value::Node(env) => env
            .attr(name)
            .map_err(|err| EvaluationError::Access(Box::new(err))),
        Value::Object(object) => object.get(name).cloned().ok_or_else(missing),
        Value::Host(host) => match name {
            "slug" => Ok(host.slug().into()),
            "address" => Ok(host.address().into()),
            _ => Err(missing()),
        },
        _ => Err(missing()),
    }
}

fn get_item(value: &Value, key: &Value) -> Result<Value, EvaluationError> {
    let missing = || EvaluationError::NoItem {
        key: key.repr(),
        value_type: value.type_name(),
    };

    match (value, key) {
        (Value::Array(items), Value::Integer(index)) => {
            resolve_index(*index, items.len())
                .and_then(|index| items.get(index).cloned())
                .ok_or_else(missing)
        }
        (Value::String(s), Value::Integer(index)) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(*index, chars.len())
                .and_then(|index| chars.get(index))
                .map(|c| Value::String(c.to_string()))
                .ok_or_else(missing)
        }
        (Value::Object(object), Value::String(key)) => {
            object.get(key).cloned().ok_or_else(missing)
        }
        (Value::Node(env), Value::String(key)) => env
            .attr(key)
            .map_err(|err| EvaluationError::Access(Box::new(err))),
        _ => Err(missing()),
    }
}

/// Negative indexes count from the end
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index < 0 {
        len.checked_sub(usize::try_from(index.unsigned_abs()).ok()?)
    } else {
        usize::try_from(index).ok()
    }
}

fn call(callee: &Value, args: &Args) -> Result<Value, EvaluationError> {
    match callee {
        Value::Action(action) => action
            .call(args.clone())
            .map_err(|err| EvaluationError::Access(Box::new(err))),
        Value::Function(function) => function.call(args).map_err(EvaluationError::Call),
        other => Err(EvaluationError::NotCallable(other.type_name())),
    }
}

#[cfg(test)]
mod test {
    use crate::query::{q, EvaluationError, Query, Q};
    use crate::value::{Function, Value};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn object(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<IndexMap<_, _>>(),
        )
    }

    #[test]
    fn literals_resolve_to_themselves() {
        for value in [
            Value::Null,
            Value::from(1),
            Value::from("text"),
            Value::from(vec![Value::from(1), Value::from("two")]),
            object(&[("a", Value::from(true))]),
        ] {
            assert_eq!(q(value.clone()).resolve(&Value::Null).unwrap(), value);
        }
    }

    #[test]
    fn nested_lists_and_dicts_evaluate_their_items() {
        let context = object(&[("a", Value::from(1))]);
        let query = Query::dict(vec![
            ("x".to_string(), Q.attr("a")),
            ("y".to_string(), Query::list(vec![Q.attr("a"), q(2)])),
        ]);
        assert_eq!(
            query.resolve(&context).unwrap(),
            object(&[
                ("x", Value::from(1)),
                ("y", Value::from(vec![Value::from(1), Value::from(2)]))
            ])
        );
    }

    #[test]
    fn items() {
        let context = Value::from(vec!["a", "b", "c"]);
        assert_eq!(Q.item(0).resolve(&context).unwrap(), Value::from("a"));
        assert_eq!(Q.item(-1).resolve(&context).unwrap(), Value::from("c"));
        assert!(matches!(
            Q.item(3).resolve(&context),
            Err(EvaluationError::NoItem { .. })
        ));
        assert_eq!(q("xyz").item(1).resolve(&Value::Null).unwrap(), Value::from("y"));
    }

    #[test]
    fn calls() {
        let join = Function::new("join", |args| {
            let parts: Vec<String> = args.positional.iter().map(ToString::to_string).collect();
            let separator = args.keyword("sep").map(ToString::to_string).unwrap_or_default();
            Ok(parts.join(&separator).into())
        });
        let context = object(&[("join", join.into()), ("name", "b".into())]);

        let query = Q.attr("join").call_with(
            vec![q("a"), Q.attr("name")],
            vec![("sep".to_string(), q("-"))],
        );
        assert_eq!(query.resolve(&context).unwrap(), Value::from("a-b"));
        assert!(matches!(
            Q.attr("name").call(vec![]).resolve(&context),
            Err(EvaluationError::NotCallable("string"))
        ));
    }

    #[test]
    fn missing_attributes() {
        let err = Q.attr("nope").resolve(&object(&[])).unwrap_err();
        assert_eq!(err.to_string(), "object has no attribute `nope`");
    }
}
