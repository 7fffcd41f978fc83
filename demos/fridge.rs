use std::any::Any;
use std::time::{Duration, Instant};

use behavior_engine::{
    boxify,
    error::{LogicError, ReinitError},
    load_str,
    logger::TracingLogger,
    AsyncAction, BehaviorCallback, Context, CoroActionNode, NodeStatus, Registry, Reinitialize,
    Step,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// A device call that answers after `reply_msec`.
struct FridgeAction {
    label: &'static str,
    reply_msec: u64,
}

impl AsyncAction for FridgeAction {
    type Frame = Instant;

    fn start(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> Result<Instant, LogicError> {
        info!("{}: started, replies in {}ms", self.label, self.reply_msec);
        Ok(Instant::now())
    }

    fn resume(
        &mut self,
        started: &mut Instant,
        _arg: BehaviorCallback,
        _ctx: &mut Context,
    ) -> Result<Step, LogicError> {
        if started.elapsed() < Duration::from_millis(self.reply_msec) {
            return Ok(Step::Yield);
        }
        Ok(Step::Complete(NodeStatus::Success))
    }

    fn completed(&mut self, started: Instant, status: NodeStatus) {
        info!(
            "{}: {} after {}ms",
            self.label,
            status,
            started.elapsed().as_millis()
        );
    }

    fn halted(&mut self, started: Instant) {
        info!(
            "{}: halted after {}ms",
            self.label,
            started.elapsed().as_millis()
        );
    }

    fn as_reinitialize(&mut self) -> Option<&mut dyn Reinitialize> {
        Some(self)
    }
}

impl Reinitialize for FridgeAction {
    fn reinitialize(&mut self, params: &dyn Any) -> Result<(), ReinitError> {
        self.reply_msec = *params
            .downcast_ref::<u64>()
            .ok_or_else(|| ReinitError::Rejected {
                node: self.label.to_owned(),
                reason: "expected the reply time in milliseconds".to_owned(),
            })?;
        Ok(())
    }
}

const FRIDGE: &str = r#"
tree main = Sequence {
    SetBlackboard (value <- "160", output_key -> slow)
    SetBlackboard (value <- "10", output_key -> fast)
    Timeout (msec <- "150") {
        OpenFridge "open"
    }
    Queue {
        Timeout (msec <- "150") {
            GrabBeer "grab"
        }
        Timeout (msec <- "150") {
            CloseFridge "close"
        }
    }
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
    for (type_name, label) in [
        ("OpenFridge", "open"),
        ("GrabBeer", "grab"),
        ("CloseFridge", "close"),
    ] {
        registry.register(
            type_name,
            boxify(move || {
                CoroActionNode::new(FridgeAction {
                    label,
                    reply_msec: 0,
                })
            }),
        );
    }

    let mut tree = load_str(FRIDGE, &registry, true)?;
    tree.add_observer(TracingLogger::default());
    println!("{}", tree.dump());

    // The reply times come from the blackboard of a first run.
    tree.tick_while_running(&mut |_| None, Duration::from_millis(10))?;
    let slow: u64 = tree.entry_string("slow").unwrap_or_default().parse()?;
    let fast: u64 = tree.entry_string("fast").unwrap_or_default().parse()?;

    for (title, open, close) in [
        ("no timeout", fast, fast),
        ("open fridge timeout", slow, fast),
        ("close fridge timeout", fast, slow),
    ] {
        tree.reinitialize("open", &open)?;
        tree.reinitialize("grab", &fast)?;
        tree.reinitialize("close", &close)?;
        let status = tree.tick_while_running(&mut |_| None, Duration::from_millis(10))?;
        println!("{title}: sequence returns {status}\n------------");
    }

    Ok(())
}
