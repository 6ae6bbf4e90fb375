//! deferred expressions ("queries")
//!
//! A [Query] describes how to compute a value from a context without computing it. Node classes use queries to wire
//! attributes between parents and children:
//!
//! ```
//! # use deployer::query::{q, Q};
//! # use deployer::value::Value;
//! let greeting = q("Hello %s") % Q.attr("name");
//! assert_eq!(greeting.to_string(), r#"(q("Hello %s") % Q.name)"#);
//! ```
//!
//! Nothing happens until [Query::evaluate] is called with a context, which returns the result together with the
//! result of every subquery ([QueryResult]). Each query remembers where in the source code it was built.
mod eval;
mod ops;

pub use ops::BinaryOp;

use crate::error::DeployError;
use crate::value::Value;
use std::panic::Location;
use std::sync::Arc;

/// Identity query, evaluates to the context itself
pub const Q: Query = Query {
    kind: QueryKind::Identity,
    location: None,
};

/// Wraps a literal value, arrays and objects are wrapped element by element
#[track_caller]
pub fn q(value: impl Into<Value>) -> Query {
    Query::constant(value)
}

#[derive(Clone)]
pub struct Query {
    kind: QueryKind,
    location: Option<&'static Location<'static>>,
}

#[derive(Clone)]
pub(crate) enum QueryKind {
    Identity,
    Constant(Box<Value>),
    List(Vec<Query>),
    Dict(Vec<(String, Query)>),
    Attr(Arc<Query>, String),
    Item(Arc<Query>, Arc<Query>),
    Call {
        callee: Arc<Query>,
        args: Vec<Query>,
        kwargs: Vec<(String, Query)>,
    },
    Operator(BinaryOp, Arc<Query>, Arc<Query>),
    Invert(Arc<Query>),
    Parent(Arc<Query>),
    ParentNamed(Arc<Query>, String),
}

impl Query {
    #[track_caller]
    fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            location: Some(Location::caller()),
        }
    }

    #[track_caller]
    pub fn constant(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Array(items) => Self::list(items.into_iter().map(Query::constant).collect()),
            Value::Object(object) => Self::dict(
                object
                    .into_iter()
                    .map(|(key, item)| (key, Query::constant(item)))
                    .collect(),
            ),
            value => Self::new(QueryKind::Constant(Box::new(value))),
        }
    }

    /// Evaluates to an array of the item results
    #[track_caller]
    pub fn list(items: Vec<Query>) -> Self {
        Self::new(QueryKind::List(items))
    }

    /// Evaluates to an object of the item results
    #[track_caller]
    pub fn dict(items: Vec<(String, Query)>) -> Self {
        Self::new(QueryKind::Dict(items))
    }

    #[track_caller]
    pub fn attr(self, name: impl Into<String>) -> Self {
        Self::new(QueryKind::Attr(Arc::new(self), name.into()))
    }

    #[track_caller]
    pub fn item(self, key: impl IntoQuery) -> Self {
        Self::new(QueryKind::Item(Arc::new(self), Arc::new(key.into_query())))
    }

    #[track_caller]
    pub fn call(self, args: Vec<Query>) -> Self {
        self.call_with(args, Vec::new())
    }

    #[track_caller]
    pub fn call_with(self, args: Vec<Query>, kwargs: Vec<(String, Query)>) -> Self {
        Self::new(QueryKind::Call {
            callee: Arc::new(self),
            args,
            kwargs,
        })
    }

    /// Runtime parent of the node this query evaluates to
    #[track_caller]
    pub fn parent(self) -> Self {
        Self::new(QueryKind::Parent(Arc::new(self)))
    }

    /// First node, starting at the node this query evaluates to, whose class (or a base class) is named `name`
    #[track_caller]
    pub fn parent_named(self, name: impl Into<String>) -> Self {
        Self::new(QueryKind::ParentNamed(Arc::new(self), name.into()))
    }

    #[track_caller]
    pub(crate) fn operator(op: BinaryOp, left: Query, right: Query) -> Self {
        Self::new(QueryKind::Operator(op, Arc::new(left), Arc::new(right)))
    }

    /// Where this query was built, `None` for [Q]
    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }

    /// Evaluates the query against `context` and returns only the result
    pub fn resolve(&self, context: &Value) -> Result<Value, EvaluationError> {
        Ok(self.evaluate(context)?.result)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            QueryKind::Identity => f.write_str("Q"),
            QueryKind::Constant(value) => write!(f, "q({})", value.repr()),
            QueryKind::List(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            QueryKind::Dict(items) => {
                let items: Vec<String> = items
                    .iter()
                    .map(|(key, item)| format!("{key:?}: {item}"))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            QueryKind::Attr(subquery, name) => write!(f, "{subquery}.{name}"),
            QueryKind::Item(subquery, key) => write!(f, "{subquery}[{key}]"),
            QueryKind::Call {
                callee,
                args,
                kwargs,
            } => {
                let args: Vec<String> = args
                    .iter()
                    .map(ToString::to_string)
                    .chain(kwargs.iter().map(|(key, arg)| format!("{key}={arg}")))
                    .collect();
                write!(f, "{callee}({})", args.join(", "))
            }
            QueryKind::Operator(op, left, right) => write!(f, "({left} {} {right})", op.symbol()),
            QueryKind::Invert(subquery) => write!(f, "!{subquery}"),
            QueryKind::Parent(subquery) => write!(f, "{subquery}.parent()"),
            QueryKind::ParentNamed(subquery, name) => write!(f, "{subquery}.parent_named({name:?})"),
        }
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some(location) => write!(f, "Query({self} @ {location})"),
            None => write!(f, "Query({self})"),
        }
    }
}

/// Anything usable as an operand or argument of a query
pub trait IntoQuery {
    fn into_query(self) -> Query;
}

impl IntoQuery for Query {
    fn into_query(self) -> Query {
        self
    }
}

impl IntoQuery for &Query {
    fn into_query(self) -> Query {
        self.clone()
    }
}

macro_rules! literal_into_query {
    ($($ty:ty),*) => {
        $(
            impl IntoQuery for $ty {
                #[track_caller]
                fn into_query(self) -> Query {
                    Query::constant(self)
                }
            }
        )*
    };
}

literal_into_query!(Value, bool, i32, i64, usize, f64, &str, String, Vec<Value>);

/// Result of an evaluation, including the results of all subqueries
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub query: Query,
    pub result: Value,
    pub subqueries: Vec<QueryResult>,
}

impl QueryResult {
    /// Visits subqueries depth first, every result after its subqueries
    pub fn walk_through_subqueries(&self, visitor: &mut impl crate::visit::Visit<QueryResult>) {
        for subquery in &self.subqueries {
            subquery.walk_through_subqueries(visitor);
        }
        visitor.visit(self);
    }

    /// `(query, result)` pairs in [QueryResult::walk_through_subqueries] order
    pub fn trace(&self) -> Vec<(String, Value)> {
        let mut trace = Vec::new();
        self.walk_through_subqueries(&mut |result: &QueryResult| {
            trace.push((result.query.to_string(), result.result.clone()))
        });
        trace
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EvaluationError {
    #[error("{value_type} has no attribute `{attribute}`")]
    NoAttribute {
        attribute: String,
        value_type: &'static str,
    },
    #[error("{value_type} has no item {key}")]
    NoItem {
        key: String,
        value_type: &'static str,
    },
    #[error("unsupported operand types for {op}: {left} and {right}")]
    UnsupportedOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in {0}")]
    Overflow(&'static str),
    #[error("{0} is not callable")]
    NotCallable(&'static str),
    #[error("{node} has no parent (while accessing {target} from {requested_from})")]
    NoParent {
        node: String,
        target: String,
        requested_from: String,
    },
    #[error("{0} is not a node")]
    NotANode(&'static str),
    #[error("invalid format string: {0}")]
    Format(String),
    #[error(transparent)]
    Access(Box<DeployError>),
    #[error("function call failed")]
    Call(#[source] anyhow::Error),
}

/// Failure while evaluating a query attribute of a node
#[derive(thiserror::Error, Debug)]
#[error("query `{attribute}` of {node} failed ({query}{}): {inner}", location_suffix(.query))]
pub struct QueryError {
    pub node: String,
    pub attribute: String,
    pub query: Query,
    #[source]
    pub inner: EvaluationError,
}

fn location_suffix(query: &Query) -> String {
    query
        .location()
        .map(|location| format!(" defined at {location}"))
        .unwrap_or_default()
}
