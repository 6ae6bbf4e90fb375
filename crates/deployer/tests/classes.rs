//! Class declarations: nesting rules, inheritance, nested overrides, aliases and default actions

mod common;

use common::{handles, hosts, root};
use deployer::error::DefinitionIssue;
use deployer::hosts::HostsDefinition;
use deployer::inspection::Inspector;
use deployer::node::{Action, NodeClass, NodeKind, RoleMapping};
use deployer::value::{Args, Value};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn nesting_is_checked_when_building() {
    let simple = NodeClass::simple("Worker").build().unwrap();

    let err = NodeClass::builder("Site")
        .child("worker", &simple)
        .child("workers", &simple.array().unwrap())
        .build()
        .unwrap_err();
    assert_eq!(
        err.issues(),
        [DefinitionIssue::IllegalNesting {
            child: "worker".to_string(),
            parent_kind: NodeKind::Normal,
            child_kind: NodeKind::Simple,
        }]
    );
    assert_eq!(
        err.to_string(),
        "invalid node class `Site`: a simple node (`worker`) can not be nested in a normal node"
    );
}

#[test]
fn children_inherit_or_map_bindings() {
    let worker = NodeClass::simple("Worker").build().unwrap();
    let class = NodeClass::builder("Site")
        .hosts(
            HostsDefinition::new()
                .role("role1", handles(&hosts(&["h1", "h2"])))
                .role("role2", handles(&hosts(&["h3"]))),
        )
        .child("plain", &NodeClass::builder("Plain").build().unwrap())
        .child(
            "workers",
            &worker
                .array()
                .unwrap()
                .map_roles(RoleMapping::new().host("role1").map("extra", "role2")),
        )
        .build()
        .unwrap();

    let (site, _) = root(&class);
    assert_eq!(site.child("plain").unwrap().hosts(), site.hosts());
    assert_eq!(
        site.child("workers").unwrap().hosts().to_string(),
        "extra: h3; host: h1, h2"
    );
}

#[test]
fn nested_overrides_reach_inherited_children() {
    let leaf = NodeClass::builder("Config").attribute("port", 80).build().unwrap();
    let service = NodeClass::builder("Service").child("config", &leaf).build().unwrap();
    let base = NodeClass::builder("Site").child("service", &service).build().unwrap();
    let derived = base
        .extend("Custom")
        .attribute("service__config__port", 8080)
        .build()
        .unwrap();

    let port = |class: &Arc<NodeClass>| {
        let (site, _) = root(class);
        site.child("service")
            .unwrap()
            .child("config")
            .unwrap()
            .attr("port")
            .unwrap()
    };
    assert_eq!(port(&base), Value::from(80));
    assert_eq!(port(&derived), Value::from(8080));

    let missing = base.extend("Broken").attribute("nothing__port", 1).build();
    assert_eq!(
        missing.unwrap_err().issues(),
        [DefinitionIssue::NestedOverrideMissing {
            target: "nothing".to_string()
        }]
    );
}

#[test]
fn aliases_and_default_actions() {
    let base = NodeClass::builder("Greeter")
        .with_action(
            Action::new("greet", |_, args: &Args| {
                let name = args.get(0).and_then(Value::as_str).unwrap_or("world");
                Ok(format!("hello {name}").into())
            })
            .alias("hi"),
        )
        .default_action(|env, args| Ok(env.call("greet", args.clone())?))
        .build()
        .unwrap();

    let (greeter, _) = root(&base);
    assert_eq!(greeter.call("hi", ["you"]).unwrap(), Value::from("hello you"));
    assert_eq!(greeter.call_default(()).unwrap(), Value::from("hello world"));
    assert!(Inspector::new(&greeter).is_callable());
    assert_eq!(Inspector::new(&greeter).get_actions(), ["hi", "greet"]);

    // a derived class can call the action it replaces
    let inherited = base.action("greet").unwrap().clone();
    let loud = base
        .extend("Loud")
        .action("greet", move |env, args| {
            let greeting = env.call_unbound(&inherited, args.clone())?;
            Ok(greeting.as_str().unwrap_or_default().to_uppercase().into())
        })
        .build()
        .unwrap();
    let (loud, _) = root(&loud);
    assert_eq!(loud.call("greet", ()).unwrap(), Value::from("HELLO WORLD"));
    // the alias still points to the base action
    assert_eq!(loud.call("hi", ()).unwrap(), Value::from("hello world"));
}
