use super::Visit;
use crate::env::Env;
use crate::error::Result;
use crate::node::NodeKey;
use std::collections::{HashSet, VecDeque};

/// Breadth first walk over a node and all nodes below it
pub trait VisitNodes {
    /// Every node is visited once, children in declaration order
    fn visit_nodes(&self, visitor: &mut dyn Visit<Env>) -> Result<()>;
}

impl VisitNodes for Env {
    fn visit_nodes(&self, visitor: &mut dyn Visit<Env>) -> Result<()> {
        let mut visited: HashSet<NodeKey> = HashSet::new();
        let mut queue = VecDeque::from([self.clone()]);

        while let Some(env) = queue.pop_front() {
            if !visited.insert(env.node().key()) {
                continue;
            }
            visitor.visit(&env);

            let class = env.node().class().clone();
            for (name, _) in class.children() {
                queue.push_back(env.child(name)?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::NodeClass;
    use pretty_assertions::assert_eq;

    #[test]
    fn breadth_first_in_declaration_order() {
        let leaf = NodeClass::builder("Leaf").build().unwrap();
        let middle = NodeClass::builder("Middle").child("leaf", &leaf).build().unwrap();
        let root = NodeClass::builder("Root")
            .child("first", &middle)
            .child("second", &leaf)
            .build()
            .unwrap();

        let env = Env::root(&root, Default::default()).unwrap();
        let mut paths = Vec::new();
        env.visit_nodes(&mut |env: &Env| paths.push(env.node().path().to_string()))
            .unwrap();

        assert_eq!(
            paths,
            ["Root", "Root.first", "Root.second", "Root.first.leaf"]
        );
    }
}
