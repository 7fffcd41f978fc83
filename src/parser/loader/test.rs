use super::*;
use crate::{
    boxify,
    error::{AddChildError, LoadError},
    BehaviorCallback, BehaviorNode, Context, NodeStatus, TickResult,
};

struct PrintNode;

impl BehaviorNode for PrintNode {
    fn tick(&mut self, arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        arg(&42);
        Ok(NodeStatus::Success)
    }
}

struct SendToArg;

impl BehaviorNode for SendToArg {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("input")]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let input = ctx.get_parse::<i32>("input").unwrap();
        arg(&input);
        Ok(NodeStatus::Success)
    }
}

struct DoubleNode;

impl BehaviorNode for DoubleNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("input"), PortSpec::new_out("output")]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let input = ctx.get_parse::<i32>("input").unwrap();
        ctx.set("output", input * 2)?;
        Ok(NodeStatus::Success)
    }
}

struct ConditionNode;

impl BehaviorNode for ConditionNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("input")]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        Ok(if ctx.get_parse::<bool>("input").unwrap_or(true) {
            NodeStatus::Success
        } else {
            NodeStatus::Failure
        })
    }
}

fn registry() -> Registry {
    let mut registry = Registry::default();
    registry.register("PrintNode", boxify(|| PrintNode));
    registry.register("SendToArg", boxify(|| SendToArg));
    registry.register("Double", boxify(|| DoubleNode));
    registry.register("ConditionNode", boxify(|| ConditionNode));
    registry
}

/// Loads `source`, ticks it once and collects the `i32`s sent to the callback.
fn run(source: &str) -> (Tree, NodeStatus, Vec<i32>) {
    let mut tree = load_str(source, &registry(), true).unwrap();
    let mut values = vec![];
    let result = tree
        .tick(&mut |val| {
            if let Some(val) = val.downcast_ref::<i32>() {
                values.push(*val);
            }
            None
        })
        .unwrap();
    (tree, result, values)
}

#[test]
fn test_subtree() {
    let tree = r#"
tree main = Sequence {
    sub
}

tree sub = Fallback {
    PrintNode
}
    "#;

    let (_, tree_source) = crate::parse_file(tree).unwrap();
    let mut tree = load(&tree_source, &registry(), true).unwrap();

    let mut values = vec![];
    let result = tree.tick(&mut |val| {
        if let Some(val) = val.downcast_ref::<i32>() {
            values.push(*val);
        }
        None
    });
    assert_eq!(result, Ok(NodeStatus::Success));
    assert_eq!(values, vec![42]);

    let sub = tree.find("sub").unwrap();
    assert_eq!(tree.type_name(sub), Some("sub".into()));
}

#[test]
fn test_subtree_map() {
    let (_, result, values) = run(r#"
tree main = Sequence {
sub(input <- "96")
}

tree sub(in input, out output) = Fallback {
SendToArg (input <- input)
}
"#);
    assert_eq!(result, NodeStatus::Success);
    assert_eq!(values, vec![96]);
}

#[test]
fn test_subtree_output() {
    let (tree, result, values) = run(r#"
tree main = Sequence {
sub(input <- "42", output -> doubled)
SendToArg (input <- doubled)
}

tree sub(in input, out output) = Fallback {
Double (input <- input, output -> output)
}
"#);
    assert_eq!(result, NodeStatus::Success);
    assert_eq!(values, vec![84]);
    assert_eq!(tree.get::<i32>("doubled"), Some(&84));
    assert_eq!(tree.get::<i32>("output"), None);
}

#[test]
fn test_reference_literal() {
    let mut tree = load_str(
        r#"tree main = SendToArg (input <- "{value}")"#,
        &registry(),
        true,
    )
    .unwrap();
    tree.set("value", 7);

    let mut values = vec![];
    tree.tick(&mut |val| {
        if let Some(val) = val.downcast_ref::<i32>() {
            values.push(*val);
        }
        None
    })
    .unwrap();
    assert_eq!(values, vec![7]);
}

#[test]
fn test_instance_names() {
    let (tree, _, values) = run(r#"
tree main = Sequence "root" {
    SendToArg "first" (input <- "1")
    SendToArg (input <- "2")
}
"#);
    assert_eq!(values, vec![1, 2]);
    let first = tree.find("first").unwrap();
    assert_eq!(tree.type_name(first), Some("SendToArg".into()));
    assert_eq!(tree.name(tree.root()), Some("root".into()));
    assert_eq!(tree.find_all("SendToArg").count(), 1);
}

#[test]
fn recurse() {
    let (_, st) = crate::parse_file(
        "
tree main = Sequence {
Sub
}

tree Sub = Sequence {
Sub
}
    ",
    )
    .unwrap();

    assert!(matches!(
        load(&st, &Registry::default(), false),
        Err(LoadError::InfiniteRecursion { .. })
    ));
}

#[test]
fn condition_node() {
    let (_, result, values) = run(r#"
tree main = Sequence {
    if (ConditionNode) {
        SendToArg (input <- "42")
    }
}
"#);
    assert_eq!(result, NodeStatus::Success);
    assert_eq!(values, vec![42]);
}

#[test]
fn condition_not_node() {
    let (_, result, values) = run(r#"
tree main = Sequence {
    if (ConditionNode (input <- "false")) {
        SendToArg (input <- "42")
    }
}
"#);
    assert_eq!(result, NodeStatus::Success);
    assert!(values.is_empty());
}

#[test]
fn condition_else_node() {
    let (_, result, values) = run(r#"
tree main = Sequence {
    if (ConditionNode (input <- "false")) {
        SendToArg (input <- "42")
    } else {
        SendToArg (input <- "96")
    }
}
"#);
    assert_eq!(result, NodeStatus::Success);
    assert_eq!(values, vec![96]);
}

#[test]
fn variables() {
    let (tree, result, values) = run(r#"
tree main = Sequence {
    var flag = false
    if (!flag) {
        SendToArg (input <- "1")
    } else {
        SendToArg (input <- "2")
    }
    SetBool (value <- "true", output -> flag)
    if (flag) {
        SendToArg (input <- "3")
    }
}
"#);
    assert_eq!(result, NodeStatus::Success);
    assert_eq!(values, vec![1, 3]);
    assert_eq!(tree.get::<bool>("flag"), Some(&true));
}

#[test]
fn variables_stay_in_their_tree() {
    let res = load_str(
        r#"
tree main = Sequence {
    var flag = true
    sub
}

tree sub = Sequence {
    if (flag) {
        PrintNode
    }
}
"#,
        &registry(),
        true,
    );
    assert_eq!(res.unwrap_err(), LoadError::MissingNode("flag".to_owned()));
}

#[test]
fn load_errors() {
    let registry = registry();

    assert_eq!(
        load_str("tree other = PrintNode", &registry, true).unwrap_err(),
        LoadError::MissingTree
    );
    assert_eq!(
        load_str("tree main = Nope", &registry, true).unwrap_err(),
        LoadError::MissingNode("Nope".to_owned())
    );
    assert_eq!(
        load_str("tree main = Inverter { PrintNode PrintNode }", &registry, true).unwrap_err(),
        LoadError::AddChildError(AddChildError::TooManyNodes, "Inverter".to_owned())
    );
    assert!(matches!(
        load_str("tree main = Sequence {", &registry, true),
        Err(LoadError::Parse(_))
    ));
}

#[test]
fn port_checks() {
    let registry = registry();
    let source = r#"tree main = SendToArg (input <- "1", extra <- "2")"#;

    assert_eq!(
        load_str(source, &registry, true).unwrap_err(),
        LoadError::PortUnmatch {
            node: "SendToArg".to_owned(),
            port: "extra".to_owned()
        }
    );
    assert!(load_str(source, &registry, false).is_ok());

    assert_eq!(
        load_str("tree main = SendToArg (input -> out)", &registry, true).unwrap_err(),
        LoadError::PortIOUnmatch {
            node: "SendToArg".to_owned(),
            port: "input".to_owned()
        }
    );

    // Writing into a literal is caught even without port checks.
    assert_eq!(
        load_str(
            r#"tree main = Double (input <- "1", output -> "x")"#,
            &registry,
            false
        )
        .unwrap_err(),
        LoadError::LiteralOutput {
            node: "Double".to_owned(),
            port: "output".to_owned()
        }
    );
}
