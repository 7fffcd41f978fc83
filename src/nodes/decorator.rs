use std::time::{Duration, Instant};

use tracing::warn;

use crate::{
    BehaviorCallback, BehaviorNode, Context, Lazy, NodeStatus, NumChildren, PortSpec, Symbol,
    TickResult,
};

/// Ticks the only child and maps its terminal status. The child is halted once it finishes.
fn decorate(
    arg: BehaviorCallback,
    ctx: &mut Context,
    map: impl FnOnce(NodeStatus) -> NodeStatus,
) -> TickResult {
    if ctx.num_children() == 0 {
        return Ok(NodeStatus::Failure);
    }
    let status = match ctx.tick_child(0, arg)? {
        NodeStatus::Running => return Ok(NodeStatus::Running),
        NodeStatus::Idle => return Err(ctx.idle_error(0)),
        status => status,
    };
    ctx.halt_child(0)?;
    Ok(map(status))
}

#[derive(Default)]
pub struct ForceSuccessNode;

impl BehaviorNode for ForceSuccessNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        decorate(arg, ctx, |_| NodeStatus::Success)
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }
}

#[derive(Default)]
pub struct ForceFailureNode;

impl BehaviorNode for ForceFailureNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        decorate(arg, ctx, |_| NodeStatus::Failure)
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }
}

#[derive(Default)]
pub struct InverterNode;

impl BehaviorNode for InverterNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        decorate(arg, ctx, |status| match status {
            NodeStatus::Success => NodeStatus::Failure,
            NodeStatus::Failure => NodeStatus::Success,
            other => other,
        })
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }
}

static N: Lazy<Symbol> = Lazy::new(|| "n".into());

/// Ticks a succeeding child `n` times. Failure aborts the loop; a running child keeps the count
/// until the next tick.
#[derive(Default)]
pub struct RepeatNode {
    done: usize,
}

impl BehaviorNode for RepeatNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*N)
            .typed::<usize>()
            .required()
            .with_description("Number of repetitions")]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let n = ctx.get_input::<usize>(*N)?;
        if ctx.num_children() == 0 {
            return Ok(NodeStatus::Failure);
        }
        while self.done < n {
            match ctx.tick_child(0, arg)? {
                NodeStatus::Success => {
                    self.done += 1;
                    ctx.halt_child(0)?;
                }
                NodeStatus::Failure => {
                    self.done = 0;
                    ctx.halt_child(0)?;
                    return Ok(NodeStatus::Failure);
                }
                NodeStatus::Running => return Ok(NodeStatus::Running),
                NodeStatus::Idle => return Err(ctx.idle_error(0)),
            }
        }
        self.done = 0;
        Ok(NodeStatus::Success)
    }

    fn halt(&mut self) {
        self.done = 0;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }
}

/// Ticks a failing child up to `n` times.
#[derive(Default)]
pub struct RetryNode {
    attempts: usize,
}

impl BehaviorNode for RetryNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*N)
            .typed::<usize>()
            .required()
            .with_description("Number of attempts")]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let n = ctx.get_input::<usize>(*N)?;
        if ctx.num_children() == 0 {
            return Ok(NodeStatus::Failure);
        }
        while self.attempts < n {
            match ctx.tick_child(0, arg)? {
                NodeStatus::Success => {
                    self.attempts = 0;
                    ctx.halt_child(0)?;
                    return Ok(NodeStatus::Success);
                }
                NodeStatus::Failure => {
                    self.attempts += 1;
                    ctx.halt_child(0)?;
                }
                NodeStatus::Running => return Ok(NodeStatus::Running),
                NodeStatus::Idle => return Err(ctx.idle_error(0)),
            }
        }
        self.attempts = 0;
        Ok(NodeStatus::Failure)
    }

    fn halt(&mut self) {
        self.attempts = 0;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }
}

static MSEC: Lazy<Symbol> = Lazy::new(|| "msec".into());

/// Fails and halts the child if it is still running `msec` milliseconds after the first tick.
///
/// The deadline is only checked when the node is ticked; the child is not interrupted in
/// between.
#[derive(Default)]
pub struct TimeoutNode {
    deadline: Option<Instant>,
}

impl BehaviorNode for TimeoutNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*MSEC)
            .typed::<u64>()
            .required()
            .with_description("Milliseconds the child may keep running")]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        if ctx.num_children() == 0 {
            return Ok(NodeStatus::Failure);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                warn!(node = %ctx.name(), "timed out, halting child");
                self.deadline = None;
                ctx.halt_child(0)?;
                return Ok(NodeStatus::Failure);
            }
            Some(_) => (),
            None => {
                let msec = ctx.get_input::<u64>(*MSEC)?;
                self.deadline = Some(Instant::now() + Duration::from_millis(msec));
            }
        }

        let status = match ctx.tick_child(0, arg)? {
            NodeStatus::Running => return Ok(NodeStatus::Running),
            NodeStatus::Idle => return Err(ctx.idle_error(0)),
            status => status,
        };
        self.deadline = None;
        ctx.halt_child(0)?;
        Ok(status)
    }

    fn halt(&mut self) {
        self.deadline = None;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }
}
