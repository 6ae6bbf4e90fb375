//! node filters for [super::NodeIterator] and [super::Inspector::walk]
use crate::env::Env;
use std::ops::{BitAnd, BitOr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Nodes whose name does not start with `_`
    PublicOnly,
    PrivateOnly,
    /// Nodes whose class, or one of its base classes, has this name
    IsInstance(String),
    HasAction(String),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn is_instance(class: impl Into<String>) -> Self {
        Filter::IsInstance(class.into())
    }

    pub fn has_action(action: impl Into<String>) -> Self {
        Filter::HasAction(action.into())
    }

    pub fn matches(&self, env: &Env) -> bool {
        let node = env.node();
        match self {
            Filter::PublicOnly => !node.name().starts_with('_'),
            Filter::PrivateOnly => node.name().starts_with('_'),
            Filter::IsInstance(class) => node.class().is_named(class),
            Filter::HasAction(action) => node.class().action(action).is_some(),
            Filter::And(left, right) => left.matches(env) && right.matches(env),
            Filter::Or(left, right) => left.matches(env) || right.matches(env),
        }
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Self) -> Self::Output {
        Filter::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Self) -> Self::Output {
        Filter::Or(Box::new(self), Box::new(rhs))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::NodeClass;
    use crate::value::Value;

    #[test]
    fn combined_filters() {
        let base = NodeClass::builder("Service")
            .action("restart", |_, _| Ok(Value::Null))
            .build()
            .unwrap();
        let derived = base.extend("Nginx").build().unwrap();
        let root = NodeClass::builder("Root")
            .child("nginx", &derived)
            .child("_hidden", &base)
            .build()
            .unwrap();
        let env = Env::root(&root, Default::default()).unwrap();
        let nginx = env.child("nginx").unwrap();
        let hidden = env.child("_hidden").unwrap();

        let filter = Filter::PublicOnly & Filter::is_instance("Service");
        assert!(filter.matches(&nginx));
        assert!(!filter.matches(&hidden));
        assert!((Filter::PrivateOnly | Filter::is_instance("Nginx")).matches(&hidden));
        assert!(Filter::has_action("restart").matches(&hidden));
        assert!(!Filter::has_action("restart").matches(&env));
    }
}
