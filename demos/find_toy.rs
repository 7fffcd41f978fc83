use std::any::Any;
use std::collections::VecDeque;
use std::time::Duration;

use behavior_engine::{
    boxify,
    error::{LogicError, ReinitError},
    load_str,
    logger::TracingLogger,
    AsyncAction, BehaviorCallback, BehaviorNode, Context, CoroActionNode, Lazy, NodeStatus,
    PortSpec, Registry, Reinitialize, Step, Symbol,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

static ROOM: Lazy<Symbol> = Lazy::new(|| "room".into());
static FOUND: Lazy<Symbol> = Lazy::new(|| "found".into());

/// Hands out the rooms still to search, dropping the ones already inspected.
struct RetrieveToyRoom {
    rooms: VecDeque<String>,
}

impl Default for RetrieveToyRoom {
    fn default() -> Self {
        Self {
            rooms: ["bedroom", "hall", "kitchen"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl BehaviorNode for RetrieveToyRoom {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("toy_found"), PortSpec::new_out("retrieve_room")]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> Result<NodeStatus, LogicError> {
        let searched = ctx.get::<String>("toy_found").cloned();
        if let Some(searched) = searched {
            self.rooms.retain(|room| *room != searched);
        }
        let Some(room) = self.rooms.front().cloned() else {
            return Ok(NodeStatus::Failure);
        };
        ctx.set("retrieve_room", room)?;
        Ok(NodeStatus::Success)
    }
}

struct GotoRoom;

impl BehaviorNode for GotoRoom {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*ROOM)]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> Result<NodeStatus, LogicError> {
        let room: String = ctx.get_input(*ROOM)?;
        println!("Robot arrives at room {room}");
        Ok(NodeStatus::Success)
    }
}

/// Opening the door takes a few ticks.
#[derive(Default)]
struct EnterRoom;

impl AsyncAction for EnterRoom {
    type Frame = u32;

    fn start(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> Result<u32, LogicError> {
        Ok(3)
    }

    fn resume(
        &mut self,
        remaining: &mut u32,
        _arg: BehaviorCallback,
        _ctx: &mut Context,
    ) -> Result<Step, LogicError> {
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(Step::Yield);
        }
        Ok(Step::Complete(NodeStatus::Success))
    }
}

/// Looks for the toy in `room`. Where the toy actually is comes from outside the tree.
struct InspectRoomToy {
    toy_room: String,
}

impl BehaviorNode for InspectRoomToy {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in(*ROOM),
            PortSpec::new_out(*FOUND),
            PortSpec::new_out("toy_pose"),
        ]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> Result<NodeStatus, LogicError> {
        let room: String = ctx.get_input(*ROOM)?;
        println!("Robot inspects room {room}");
        if room == self.toy_room {
            ctx.set("toy_pose", "1;2".to_string())?;
            return Ok(NodeStatus::Success);
        }
        ctx.set(*FOUND, room)?;
        Ok(NodeStatus::Failure)
    }

    fn as_reinitialize(&mut self) -> Option<&mut dyn Reinitialize> {
        Some(self)
    }
}

impl Reinitialize for InspectRoomToy {
    fn reinitialize(&mut self, params: &dyn Any) -> Result<(), ReinitError> {
        let room = params
            .downcast_ref::<&str>()
            .ok_or_else(|| ReinitError::Rejected {
                node: "inspect".to_owned(),
                reason: "expected a room name".to_owned(),
            })?;
        self.toy_room = (*room).to_owned();
        Ok(())
    }
}

const FIND_TOY: &str = r#"
# Search the rooms one by one until the toy shows up.
tree main = Fallback {
    ToyInSight
    Retry (n <- "5") {
        search(toy_pose -> toy_pose)
    }
}

tree search(out toy_pose) = Sequence {
    RetrieveToyRoom (toy_found <- found, retrieve_room -> room)
    GotoRoom (room <- room)
    EnterRoom
    InspectRoomToy "inspect" (room <- room, found -> found, toy_pose -> toy_pose)
}
"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut registry = Registry::default();
    registry.register_type::<RetrieveToyRoom>("RetrieveToyRoom");
    registry.register("GotoRoom", boxify(|| GotoRoom));
    registry.register("EnterRoom", boxify(CoroActionNode::<EnterRoom>::default));
    registry.register(
        "InspectRoomToy",
        boxify(|| InspectRoomToy {
            toy_room: "kitchen".to_owned(),
        }),
    );
    registry.register_simple_action("ToyInSight", vec![], |_arg, _ctx| {
        Ok(NodeStatus::Failure)
    });

    let mut tree = load_str(FIND_TOY, &registry, true)?;
    tree.reinitialize("inspect", &"hall")?;
    tree.add_observer(TracingLogger::default());

    let status = tree.tick_while_running(&mut |_| None, Duration::from_millis(10))?;
    info!(%status, "search finished");
    match tree.get::<String>("toy_pose") {
        Some(pose) => println!("Toy found at {pose}"),
        None => println!("No toy"),
    }

    Ok(())
}
