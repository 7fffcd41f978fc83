use std::collections::HashSet;

use crate::{
    error::LogicError, BehaviorCallback, BehaviorNode, Context, Lazy, NodeStatus, NumChildren,
    PortSpec, Symbol, TickResult,
};

static SUCCESS_THRESHOLD: Lazy<Symbol> = Lazy::new(|| "success_threshold".into());
static FAILURE_THRESHOLD: Lazy<Symbol> = Lazy::new(|| "failure_threshold".into());

/// Ticks all children every tick and counts their results.
///
/// Returns `Success` once `success_threshold` children succeeded and `Failure` once
/// `failure_threshold` children failed, or as soon as too many failed for the success threshold
/// to be reachable. Negative thresholds count from the number of children, so `-1` means all of
/// them. A child that finished is not ticked again until the node finishes or is halted.
#[derive(Default)]
pub struct ParallelNode {
    completed: HashSet<usize>,
    success_count: usize,
    failure_count: usize,
}

impl ParallelNode {
    fn reset(&mut self) {
        self.completed.clear();
        self.success_count = 0;
        self.failure_count = 0;
    }

    fn threshold(ctx: &Context, port: Symbol) -> Result<usize, LogicError> {
        let value = ctx.get_input::<i32>(port)?;
        let children = ctx.num_children();
        let resolved = if value < 0 {
            children as i64 + value as i64 + 1
        } else {
            value as i64
        };
        if resolved < 0 || resolved > children as i64 {
            return Err(LogicError::InvalidThreshold {
                node: ctx.name().to_string(),
                port: port.to_string(),
                value,
                children,
            });
        }
        Ok(resolved as usize)
    }

    fn finish(&mut self, ctx: &mut Context, status: NodeStatus) -> TickResult {
        self.reset();
        ctx.halt_children(0);
        Ok(status)
    }
}

impl BehaviorNode for ParallelNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in(*SUCCESS_THRESHOLD)
                .typed::<i32>()
                .with_default("-1")
                .with_description("Number of children that must succeed; negative counts from the end"),
            PortSpec::new_in(*FAILURE_THRESHOLD)
                .typed::<i32>()
                .with_default("1")
                .with_description("Number of children that fail the node; negative counts from the end"),
        ]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let success_threshold = Self::threshold(ctx, *SUCCESS_THRESHOLD)?;
        let failure_threshold = Self::threshold(ctx, *FAILURE_THRESHOLD)?;
        let children = ctx.num_children();

        for i in 0..children {
            if self.completed.contains(&i) {
                continue;
            }
            match ctx.tick_child(i, arg)? {
                NodeStatus::Running => (),
                NodeStatus::Success => {
                    self.completed.insert(i);
                    self.success_count += 1;
                }
                NodeStatus::Failure => {
                    self.completed.insert(i);
                    self.failure_count += 1;
                }
                NodeStatus::Idle => return Err(ctx.idle_error(i)),
            }

            if self.success_count >= success_threshold {
                return self.finish(ctx, NodeStatus::Success);
            }
            if (failure_threshold > 0 && self.failure_count >= failure_threshold)
                || self.failure_count > children - success_threshold
            {
                return self.finish(ctx, NodeStatus::Failure);
            }
        }

        if self.success_count >= success_threshold {
            return self.finish(ctx, NodeStatus::Success);
        }
        Ok(NodeStatus::Running)
    }

    fn halt(&mut self) {
        self.reset();
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}
