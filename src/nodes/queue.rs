use tracing::debug;

use crate::{
    BehaviorCallback, BehaviorNode, Context, Lazy, NodeStatus, NumChildren, PortSpec, Symbol,
    TickResult,
};

static HALT_ON_FAILURE: Lazy<Symbol> = Lazy::new(|| "halt_on_failure".into());

/// A sequence that drains its children instead of aborting on the first failure.
///
/// Every child is ticked once per pass, left to right. A `Running` child suspends the pass and
/// is resumed on the next tick; the children before it are not ticked again. Once the last child
/// has finished, all children are halted and the node returns `Failure` if any child failed
/// during the pass, `Success` otherwise.
///
/// With the `halt_on_failure` input set, a failed child is halted right away instead of at the
/// end of the pass.
#[derive(Default)]
pub struct QueueNode {
    current_child: usize,
    child_failure: bool,
    /// Children ticked to completion in this pass
    visited: Vec<usize>,
    /// Children that succeeded in this pass
    succeeded: Vec<usize>,
}

impl QueueNode {
    fn reset(&mut self) {
        self.current_child = 0;
        self.child_failure = false;
        self.visited.clear();
        self.succeeded.clear();
    }
}

impl BehaviorNode for QueueNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*HALT_ON_FAILURE)
            .typed::<bool>()
            .with_default("false")
            .with_description("Halt a failed child immediately instead of at the end of the pass")]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let halt_on_failure = ctx.get_input::<bool>(*HALT_ON_FAILURE)?;
        ctx.set_status(NodeStatus::Running);

        while self.current_child < ctx.num_children() {
            let index = self.current_child;
            match ctx.tick_child(index, arg)? {
                NodeStatus::Running => return Ok(NodeStatus::Running),
                NodeStatus::Failure => {
                    self.child_failure = true;
                    self.visited.push(index);
                    if halt_on_failure {
                        ctx.halt_child(index)?;
                    }
                }
                NodeStatus::Success => {
                    self.visited.push(index);
                    self.succeeded.push(index);
                }
                NodeStatus::Idle => return Err(ctx.idle_error(index)),
            }
            self.current_child += 1;
        }

        debug!(
            node = %ctx.name(),
            visited = ?self.visited,
            succeeded = ?self.succeeded,
            "queue pass complete"
        );
        ctx.halt_children(0);
        let failed = std::mem::take(&mut self.child_failure);
        self.reset();
        Ok(if failed {
            NodeStatus::Failure
        } else {
            NodeStatus::Success
        })
    }

    fn halt(&mut self) {
        self.reset();
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}
