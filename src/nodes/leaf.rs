use std::rc::Rc;

use crate::{
    BehaviorCallback, BehaviorNode, Context, Lazy, NodeStatus, PortSpec, Symbol, TickResult,
};

pub(crate) static VALUE: Lazy<Symbol> = Lazy::new(|| "value".into());
pub(crate) static OUTPUT: Lazy<Symbol> = Lazy::new(|| "output".into());

/// Writes the boolean `value` to `output`.
pub struct SetBoolNode;

impl BehaviorNode for SetBoolNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in(*VALUE).typed::<bool>(),
            PortSpec::new_out(*OUTPUT),
        ]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        match ctx.get_input::<bool>(*VALUE) {
            Ok(value) => {
                ctx.set(*OUTPUT, value)?;
                Ok(NodeStatus::Success)
            }
            Err(_) => Ok(NodeStatus::Failure),
        }
    }
}

pub(crate) static INPUT: Lazy<Symbol> = Lazy::new(|| "input".into());

/// Succeeds if `input` is true. An unset or non-boolean input fails.
pub struct IsTrueNode;

impl BehaviorNode for IsTrueNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*INPUT)]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        Ok(match ctx.get_input::<bool>(*INPUT) {
            Ok(true) => NodeStatus::Success,
            _ => NodeStatus::Failure,
        })
    }
}

static OUTPUT_KEY: Lazy<Symbol> = Lazy::new(|| "output_key".into());

/// Copies `value`, whatever its type, to `output_key`.
pub struct SetBlackboardNode;

impl BehaviorNode for SetBlackboardNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in(*VALUE).required(),
            PortSpec::new_inout(*OUTPUT_KEY).required(),
        ]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let Some(value) = ctx.get_any(*VALUE) else {
            return Ok(NodeStatus::Failure);
        };
        ctx.set_any(*OUTPUT_KEY, value)?;
        Ok(NodeStatus::Success)
    }
}

pub struct AlwaysSuccessNode;

impl BehaviorNode for AlwaysSuccessNode {
    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        Ok(NodeStatus::Success)
    }
}

pub struct AlwaysFailureNode;

impl BehaviorNode for AlwaysFailureNode {
    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        Ok(NodeStatus::Failure)
    }
}

type SimpleTick = Rc<dyn Fn(BehaviorCallback, &mut Context) -> TickResult>;

/// A synchronous leaf backed by a closure.
pub struct SimpleActionNode {
    tick: SimpleTick,
    ports: Vec<PortSpec>,
}

impl SimpleActionNode {
    pub fn new(
        ports: Vec<PortSpec>,
        tick: impl (Fn(BehaviorCallback, &mut Context) -> TickResult) + 'static,
    ) -> Self {
        Self::from_shared(Rc::new(tick), ports)
    }

    pub(crate) fn from_shared(tick: SimpleTick, ports: Vec<PortSpec>) -> Self {
        Self { tick, ports }
    }
}

impl BehaviorNode for SimpleActionNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.ports.clone()
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        (self.tick)(arg, ctx)
    }
}
