use ::behavior_engine::{
    error::{ConversionError, LogicError},
    hash_map, split_literal, BehaviorCallback, BehaviorNode, BehaviorNodeContainer, Context,
    Lazy, NodeStatus, PortSpec, Registry, SequenceNode, Symbol, Tree,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug)]
struct Position2D {
    x: f64,
    y: f64,
}

#[derive(Clone, Debug)]
struct Position3D {
    x: f64,
    y: f64,
    z: f64,
}

static TARGET_SYM: Lazy<Symbol> = Lazy::new(|| "target".into());
static GOAL_SYM: Lazy<Symbol> = Lazy::new(|| "goal".into());

fn parse_position(text: &str) -> Result<Position3D, ConversionError> {
    let fields = split_literal(text, ';')
        .into_iter()
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|e| ConversionError::new(text, "Position3D", e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    match fields[..] {
        [x, y, z] => Ok(Position3D { x, y, z }),
        _ => Err(ConversionError::new(
            text,
            "Position3D",
            format!("expected 3 fields, got {}", fields.len()),
        )),
    }
}

struct CalculateGoal;

impl BehaviorNode for CalculateGoal {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_out(*GOAL_SYM).typed::<Position2D>()]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> Result<NodeStatus, LogicError> {
        ctx.set(*GOAL_SYM, Position2D { x: 1.1, y: 2.3 })?;
        Ok(NodeStatus::Success)
    }
}

struct PrintTarget;

impl BehaviorNode for PrintTarget {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*TARGET_SYM).typed::<Position3D>()]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> Result<NodeStatus, LogicError> {
        if let Some(target) = ctx.get::<Position2D>(*TARGET_SYM) {
            println!("Target positions: [ {:.1}, {:.1} ]", target.x, target.y);
            return Ok(NodeStatus::Success);
        }
        let target: Position3D = ctx.get_input(*TARGET_SYM)?;
        println!(
            "Target positions: [ {:.1}, {:.1}, {:.1} ]",
            target.x, target.y, target.z
        );
        Ok(NodeStatus::Success)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut registry = Registry::default();
    registry.converters_mut().register_parser(parse_position);

    let mut root = BehaviorNodeContainer::new_node(SequenceNode::default());
    root.add_child(BehaviorNodeContainer::new(
        Box::new(CalculateGoal),
        hash_map!("goal" => "{GoalPosition}"),
    ))?;
    root.add_child(BehaviorNodeContainer::new(
        Box::new(PrintTarget),
        hash_map!("target" => "{GoalPosition}"),
    ))?;
    root.add_child(
        BehaviorNodeContainer::new(Box::new(PrintTarget), hash_map!("target" => "-1;3;0.5"))
            .with_name("literal target"),
    )?;

    let mut tree = Tree::build(root, &registry, true)?;
    let status = tree.tick(&mut |_| None)?;
    println!("Sequence returns {status}");
    println!("Symbols interned: {}", Symbol::count());

    Ok(())
}
