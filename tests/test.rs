use std::{any::Any, cell::Cell, rc::Rc, time::Duration};

use behavior_engine::{
    boxify,
    error::{ConversionError, LoadError, LogicError, PortError, ReinitError, TickError},
    load_str,
    logger::{StatusLog, TracingLogger},
    split_literal, AsyncAction, BBMap, BehaviorCallback, BehaviorNode, BehaviorNodeContainer,
    BlackboardValue, Context, CoroActionNode, NodeStatus, PortSpec, PortType, Registry,
    Reinitialize, SequenceNode, SetBlackboardNode, Step, Tree,
};

/// Sends the string behind `input` to the callback.
struct Echo;

impl BehaviorNode for Echo {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("input").required()]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> Result<NodeStatus, LogicError> {
        let input: String = ctx.get_input("input")?;
        arg(&input);
        Ok(NodeStatus::Success)
    }
}

fn collect_strings(tree: &mut Tree) -> anyhow::Result<(NodeStatus, Vec<String>)> {
    let mut values = vec![];
    let status = tree.tick(&mut |v: &dyn Any| {
        if let Some(s) = v.downcast_ref::<String>() {
            values.push(s.clone());
        }
        None
    })?;
    Ok((status, values))
}

#[test]
fn sibling_subtrees_share_through_remaps() -> anyhow::Result<()> {
    let mut registry = Registry::default();
    registry.register("Echo", boxify(|| Echo));

    let mut tree = load_str(
        r#"
tree main = Sequence {
    producer(result -> shared)
    consumer(value <- shared)
}

tree producer(out result) = SetBlackboard (value <- "hello", output_key -> result)

tree consumer(in value) = Echo (input <- value)
"#,
        &registry,
        true,
    )?;

    let (status, values) = collect_strings(&mut tree)?;
    assert_eq!(status, NodeStatus::Success);
    assert_eq!(values, ["hello"]);
    assert_eq!(tree.get::<String>("shared").map(String::as_str), Some("hello"));
    // The parameter names stay local to the subtrees.
    assert!(tree.get::<String>("result").is_none());
    assert!(tree.get::<String>("value").is_none());
    Ok(())
}

#[test]
fn subtree_built_by_hand() -> anyhow::Result<()> {
    let mut inner_map = BBMap::new();
    inner_map.insert("value".into(), BlackboardValue::literal("42"));
    inner_map.insert("output_key".into(), BlackboardValue::key("out"));
    let inner = BehaviorNodeContainer::new(Box::new(SetBlackboardNode), inner_map);

    let mut call_map = BBMap::new();
    call_map.insert(
        "out".into(),
        BlackboardValue::Ref("answer".into(), PortType::Output),
    );
    let subtree = BehaviorNodeContainer::new_subtree(
        "write_answer",
        vec![PortSpec::new_out("out")],
        call_map,
        inner,
    );

    let mut root = BehaviorNodeContainer::new_node(SequenceNode::default());
    root.add_child(subtree)?;
    let mut tree = Tree::new(root)?;

    assert_eq!(tree.tick(&mut |_| None)?, NodeStatus::Success);
    assert_eq!(tree.get::<String>("answer").map(String::as_str), Some("42"));
    assert_eq!(tree.blackboards().len(), 2);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position3D {
    x: f64,
    y: f64,
    z: f64,
}

fn parse_position(text: &str) -> Result<Position3D, ConversionError> {
    let parts = split_literal(text, ';');
    let [x, y, z] = parts[..] else {
        return Err(ConversionError::new(
            text,
            "Position3D",
            format!("expected 3 fields, got {}", parts.len()),
        ));
    };
    let field = |s: &str| {
        s.parse::<f64>()
            .map_err(|e| ConversionError::new(text, "Position3D", e))
    };
    Ok(Position3D {
        x: field(x)?,
        y: field(y)?,
        z: field(z)?,
    })
}

/// Sends its `goal` to the callback.
struct MoveTo;

impl BehaviorNode for MoveTo {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("goal").typed::<Position3D>()]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> Result<NodeStatus, LogicError> {
        let goal: Position3D = ctx.get_input("goal")?;
        arg(&goal);
        Ok(NodeStatus::Success)
    }
}

fn position_registry() -> Registry {
    let mut registry = Registry::default();
    registry.register("MoveTo", boxify(|| MoveTo));
    registry.converters_mut().register_parser(parse_position);
    registry
}

fn collect_positions(tree: &mut Tree) -> Result<Vec<Position3D>, TickError> {
    let mut goals = vec![];
    tree.tick(&mut |v: &dyn Any| {
        if let Some(goal) = v.downcast_ref::<Position3D>() {
            goals.push(*goal);
        }
        None
    })?;
    Ok(goals)
}

#[test]
fn composite_literal_ports() -> anyhow::Result<()> {
    let registry = position_registry();
    let mut tree = load_str(
        r#"
tree main = Sequence {
    MoveTo (goal <- "3;4;5")
    MoveTo (goal <- "{target}")
}
"#,
        &registry,
        true,
    )?;
    tree.set("target", "-1.5; 0; 2".to_string());

    assert_eq!(
        collect_positions(&mut tree)?,
        [
            Position3D {
                x: 3.,
                y: 4.,
                z: 5.
            },
            Position3D {
                x: -1.5,
                y: 0.,
                z: 2.
            },
        ]
    );

    // A typed value on the blackboard is used as is.
    tree.set(
        "target",
        Position3D {
            x: 1.,
            y: 1.,
            z: 1.,
        },
    );
    assert_eq!(collect_positions(&mut tree)?[1].x, 1.);
    Ok(())
}

#[test]
fn composite_literal_field_count() {
    let registry = position_registry();
    let err = load_str(r#"tree main = MoveTo (goal <- "1;2")"#, &registry, true).unwrap_err();
    assert_eq!(
        err,
        LoadError::Conversion {
            node: "MoveTo".to_owned(),
            port: "goal".to_owned(),
            source: ConversionError::new("1;2", "Position3D", "expected 3 fields, got 2"),
        }
    );

    // Without a converter the literal cannot be checked at all.
    let mut bare = Registry::default();
    bare.register("MoveTo", boxify(|| MoveTo));
    assert!(matches!(
        load_str(r#"tree main = MoveTo (goal <- "1;2;3")"#, &bare, true),
        Err(LoadError::UnknownType { .. })
    ));
}

#[test]
fn bad_blackboard_string_is_a_port_error() -> anyhow::Result<()> {
    let registry = position_registry();
    let mut tree = load_str(r#"tree main = MoveTo (goal <- "{target}")"#, &registry, true)?;
    tree.set("target", "north".to_string());

    let err = collect_positions(&mut tree).unwrap_err();
    assert!(matches!(
        err,
        TickError::Logic(LogicError::Port(PortError::Conversion { .. }))
    ));
    assert!(tree.poisoned().is_some());
    Ok(())
}

/// Opens the fridge door over a number of ticks.
struct OpenFridge {
    ticks_needed: u32,
    teardowns: Rc<Cell<u32>>,
}

impl AsyncAction for OpenFridge {
    type Frame = u32;

    fn start(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> Result<u32, LogicError> {
        Ok(0)
    }

    fn resume(
        &mut self,
        opened: &mut u32,
        _arg: BehaviorCallback,
        _ctx: &mut Context,
    ) -> Result<Step, LogicError> {
        *opened += 1;
        Ok(if *opened < self.ticks_needed {
            Step::Yield
        } else {
            Step::Complete(NodeStatus::Success)
        })
    }

    fn halted(&mut self, _opened: u32) {
        self.teardowns.set(self.teardowns.get() + 1);
    }
}

fn fridge_registry(ticks_needed: u32, teardowns: &Rc<Cell<u32>>) -> Registry {
    let mut registry = Registry::default();
    let teardowns = teardowns.clone();
    registry.register(
        "OpenFridge",
        boxify(move || {
            CoroActionNode::new(OpenFridge {
                ticks_needed,
                teardowns: teardowns.clone(),
            })
        }),
    );
    registry.register_simple_action("TakeMilk", vec![PortSpec::new_out("milk")], |_, ctx| {
        ctx.set("milk", true)?;
        Ok(NodeStatus::Success)
    });
    registry
}

const FRIDGE: &str = r#"
tree main = Sequence {
    Timeout (msec <- "60000") {
        OpenFridge "door"
    }
    TakeMilk (milk -> has_milk)
}
"#;

#[test]
fn fridge_within_timeout() -> anyhow::Result<()> {
    let teardowns = Rc::new(Cell::new(0));
    let mut tree = load_str(FRIDGE, &fridge_registry(3, &teardowns), true)?;
    let log = StatusLog::default();
    tree.add_observer(log.clone());
    tree.add_observer(TracingLogger::new(true));

    assert_eq!(tree.tick(&mut |_| None)?, NodeStatus::Running);
    assert_eq!(tree.tick(&mut |_| None)?, NodeStatus::Running);
    assert_eq!(tree.tick(&mut |_| None)?, NodeStatus::Success);
    assert_eq!(tree.get::<bool>("has_milk"), Some(&true));
    assert_eq!(teardowns.get(), 0);

    let door: Vec<_> = log
        .transitions()
        .into_iter()
        .filter(|(name, _)| *name == "door")
        .map(|(_, status)| status)
        .collect();
    assert_eq!(
        door,
        [NodeStatus::Running, NodeStatus::Success, NodeStatus::Idle]
    );
    Ok(())
}

#[test]
fn fridge_timeout_halts_the_action() -> anyhow::Result<()> {
    let teardowns = Rc::new(Cell::new(0));
    let source = FRIDGE.replace("60000", "0");
    let mut tree = load_str(&source, &fridge_registry(100, &teardowns), true)?;

    assert_eq!(tree.tick(&mut |_| None)?, NodeStatus::Running);
    assert_eq!(tree.tick(&mut |_| None)?, NodeStatus::Failure);
    assert_eq!(teardowns.get(), 1);
    assert_eq!(tree.get::<bool>("has_milk"), None);

    let door = tree.find("door").unwrap();
    assert_eq!(tree.node_status(door), Some(NodeStatus::Idle));
    Ok(())
}

#[test]
fn halting_the_tree_tears_down_once() -> anyhow::Result<()> {
    let teardowns = Rc::new(Cell::new(0));
    let mut tree = load_str(FRIDGE, &fridge_registry(5, &teardowns), true)?;

    tree.tick(&mut |_| None)?;
    tree.halt();
    tree.halt();
    assert_eq!(teardowns.get(), 1);
    assert!(tree
        .node_ids()
        .all(|id| tree.node_status(id) == Some(NodeStatus::Idle)));
    Ok(())
}

#[test]
fn queue_runs_to_completion() -> anyhow::Result<()> {
    let teardowns = Rc::new(Cell::new(0));
    let mut tree = load_str(
        r#"
tree main = Queue {
    OpenFridge
    AlwaysFailure
    OpenFridge
}
"#,
        &fridge_registry(2, &teardowns),
        true,
    )?;

    let status = tree.tick_while_running(&mut |_| None, Duration::ZERO)?;
    assert_eq!(status, NodeStatus::Failure);
    assert_eq!(teardowns.get(), 0);
    Ok(())
}

/// Sends its target to the callback; the target can be changed from outside the tree.
struct Grab {
    target: u32,
}

impl AsyncAction for Grab {
    type Frame = ();

    fn start(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> Result<(), LogicError> {
        Ok(())
    }

    fn resume(
        &mut self,
        _frame: &mut (),
        arg: BehaviorCallback,
        _ctx: &mut Context,
    ) -> Result<Step, LogicError> {
        arg(&self.target);
        Ok(Step::Complete(NodeStatus::Success))
    }

    fn as_reinitialize(&mut self) -> Option<&mut dyn Reinitialize> {
        Some(self)
    }
}

impl Reinitialize for Grab {
    fn reinitialize(&mut self, params: &dyn Any) -> Result<(), ReinitError> {
        let target = params
            .downcast_ref::<u32>()
            .ok_or_else(|| ReinitError::Rejected {
                node: "grab".to_owned(),
                reason: "expected a u32 target".to_owned(),
            })?;
        self.target = *target;
        Ok(())
    }
}

#[test]
fn reinitialize_by_name() -> anyhow::Result<()> {
    let mut registry = Registry::default();
    registry.register("Grab", boxify(|| CoroActionNode::new(Grab { target: 1 })));
    let mut tree = load_str(r#"tree main = Sequence { Grab "grab" }"#, &registry, true)?;

    let mut targets = vec![];
    let mut record = |tree: &mut Tree| -> anyhow::Result<()> {
        tree.tick(&mut |v: &dyn Any| {
            if let Some(t) = v.downcast_ref::<u32>() {
                targets.push(*t);
            }
            None
        })?;
        Ok(())
    };

    record(&mut tree)?;
    assert_eq!(tree.reinitialize("grab", &7u32), Ok(1));
    record(&mut tree)?;
    assert_eq!(targets, [1, 7]);

    assert!(matches!(
        tree.reinitialize("grab", &"seven"),
        Err(ReinitError::Rejected { .. })
    ));
    assert_eq!(
        tree.reinitialize("Sequence", &7u32),
        Err(ReinitError::Unsupported {
            node: "Sequence".to_owned()
        })
    );
    assert_eq!(
        tree.reinitialize("nobody", &7u32),
        Err(ReinitError::NotFound("nobody".to_owned()))
    );
    Ok(())
}

#[test]
fn introspection() -> anyhow::Result<()> {
    let teardowns = Rc::new(Cell::new(0));
    let tree = load_str(FRIDGE, &fridge_registry(3, &teardowns), true)?;

    let names: Vec<_> = tree
        .node_ids()
        .filter_map(|id| tree.name(id))
        .map(|name| name.to_string())
        .collect();
    assert_eq!(names, ["Sequence", "Timeout", "door", "TakeMilk"]);

    let timeout = tree.find("Timeout").unwrap();
    assert_eq!(tree.node_input::<u64>(timeout, "msec"), Ok(60000));
    assert_eq!(tree.children(timeout), &[tree.find("door").unwrap()]);
    Ok(())
}
