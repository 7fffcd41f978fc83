use crate::{
    BehaviorCallback, BehaviorNode, Context, NodeStatus, NumChildren, PortSpec, TickResult,
};

/// Ticks children in order and fails on the first failure. A running child is resumed on the
/// next tick without re-ticking the children before it.
#[derive(Default)]
pub struct SequenceNode {
    current_child: usize,
}

impl BehaviorNode for SequenceNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        while self.current_child < ctx.num_children() {
            match ctx.tick_child(self.current_child, arg)? {
                NodeStatus::Success => self.current_child += 1,
                NodeStatus::Running => return Ok(NodeStatus::Running),
                NodeStatus::Failure => {
                    self.current_child = 0;
                    ctx.halt_children(0);
                    return Ok(NodeStatus::Failure);
                }
                NodeStatus::Idle => return Err(ctx.idle_error(self.current_child)),
            }
        }
        self.current_child = 0;
        ctx.halt_children(0);
        Ok(NodeStatus::Success)
    }

    fn halt(&mut self) {
        self.current_child = 0;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

/// A sequence that starts from the first child on every tick. A running child halts the
/// children after it.
#[derive(Default)]
pub struct ReactiveSequenceNode;

impl BehaviorNode for ReactiveSequenceNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        for i in 0..ctx.num_children() {
            match ctx.tick_child(i, arg)? {
                NodeStatus::Success => (),
                NodeStatus::Running => {
                    ctx.halt_children(i + 1);
                    return Ok(NodeStatus::Running);
                }
                NodeStatus::Failure => {
                    ctx.halt_children(0);
                    return Ok(NodeStatus::Failure);
                }
                NodeStatus::Idle => return Err(ctx.idle_error(i)),
            }
        }
        ctx.halt_children(0);
        Ok(NodeStatus::Success)
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

/// Ticks children in order until one succeeds.
#[derive(Default)]
pub struct FallbackNode {
    current_child: usize,
}

impl BehaviorNode for FallbackNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        while self.current_child < ctx.num_children() {
            match ctx.tick_child(self.current_child, arg)? {
                NodeStatus::Failure => self.current_child += 1,
                NodeStatus::Running => return Ok(NodeStatus::Running),
                NodeStatus::Success => {
                    self.current_child = 0;
                    ctx.halt_children(0);
                    return Ok(NodeStatus::Success);
                }
                NodeStatus::Idle => return Err(ctx.idle_error(self.current_child)),
            }
        }
        self.current_child = 0;
        ctx.halt_children(0);
        Ok(NodeStatus::Failure)
    }

    fn halt(&mut self) {
        self.current_child = 0;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

#[derive(Default)]
pub struct ReactiveFallbackNode;

impl BehaviorNode for ReactiveFallbackNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        for i in 0..ctx.num_children() {
            match ctx.tick_child(i, arg)? {
                NodeStatus::Failure => (),
                NodeStatus::Running => {
                    ctx.halt_children(i + 1);
                    return Ok(NodeStatus::Running);
                }
                NodeStatus::Success => {
                    ctx.halt_children(0);
                    return Ok(NodeStatus::Success);
                }
                NodeStatus::Idle => return Err(ctx.idle_error(i)),
            }
        }
        ctx.halt_children(0);
        Ok(NodeStatus::Failure)
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

/// `if` with a condition child, a then-branch and an optional else-branch.
#[derive(Default)]
pub struct IfNode {
    condition_result: Option<NodeStatus>,
}

impl BehaviorNode for IfNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let condition_result = match self.condition_result {
            Some(result) => result,
            None if ctx.num_children() == 0 => return Ok(NodeStatus::Failure),
            None => ctx.tick_child(0, arg)?,
        };

        let (branch, missing) = match condition_result {
            NodeStatus::Running => return Ok(NodeStatus::Running),
            NodeStatus::Success => (1, NodeStatus::Failure),
            // Be aware that lack of else clause is not an error, so the result is Success.
            NodeStatus::Failure => (2, NodeStatus::Success),
            NodeStatus::Idle => return Err(ctx.idle_error(0)),
        };

        // Remember the conditional result in case the branch returns Running
        self.condition_result = Some(condition_result);

        let branch_result = if branch < ctx.num_children() {
            ctx.tick_child(branch, arg)?
        } else {
            missing
        };

        // The condition is evaluated again once a branch has finished.
        if branch_result != NodeStatus::Running {
            self.condition_result = None;
            ctx.halt_children(0);
        }

        Ok(branch_result)
    }

    fn halt(&mut self) {
        self.condition_result = None;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(3)
    }
}

/// SubtreeNode is the root of a subtree call. Its child lives in a blackboard scope of its own,
/// see [`crate::BehaviorNodeContainer::new_subtree`].
pub struct SubtreeNode {
    params: Vec<PortSpec>,
}

impl SubtreeNode {
    pub fn new(params: Vec<PortSpec>) -> Self {
        Self { params }
    }
}

impl BehaviorNode for SubtreeNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.params.clone()
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        if ctx.num_children() == 0 {
            return Ok(NodeStatus::Failure);
        }
        ctx.tick_child(0, arg)
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }
}
