//! Long running leaf actions.
//!
//! An [`AsyncAction`] is written as a procedure with explicit suspension points. Its local
//! state lives in a `Frame` value instead of on a suspended call stack: [`AsyncAction::start`]
//! creates the frame, [`AsyncAction::resume`] advances it by one step and either yields or
//! completes. [`CoroActionNode`] keeps the frame between ticks and throws it away when the node
//! is halted.
//!
//! ```rust
//! use behavior_engine::*;
//!
//! /// Counts to three, one step per tick.
//! struct CountToThree;
//!
//! impl AsyncAction for CountToThree {
//!     type Frame = u32;
//!
//!     fn start(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> Result<u32, error::LogicError> {
//!         Ok(0)
//!     }
//!
//!     fn resume(
//!         &mut self,
//!         count: &mut u32,
//!         _arg: BehaviorCallback,
//!         _ctx: &mut Context,
//!     ) -> Result<Step, error::LogicError> {
//!         *count += 1;
//!         Ok(if *count < 3 {
//!             Step::Yield
//!         } else {
//!             Step::Complete(NodeStatus::Success)
//!         })
//!     }
//! }
//!
//! let root = BehaviorNodeContainer::new_node(CoroActionNode::new(CountToThree));
//! let mut tree = Tree::new(root).unwrap();
//! assert_eq!(tree.tick(&mut |_| None), Ok(NodeStatus::Running));
//! assert_eq!(tree.tick(&mut |_| None), Ok(NodeStatus::Running));
//! assert_eq!(tree.tick(&mut |_| None), Ok(NodeStatus::Success));
//! ```

use std::any::Any;

use tracing::debug;

use crate::{
    error::{LogicError, ReinitError},
    BehaviorCallback, BehaviorNode, Context, NodeStatus, PortSpec, TickResult,
};

/// Outcome of one step of an [`AsyncAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend; the node reports `Running` and resumes the frame on the next tick.
    Yield,
    /// Ends the run. `Complete(Running)` is taken as `Yield`.
    Complete(NodeStatus),
}

pub trait AsyncAction {
    /// Local state of one run of the procedure.
    type Frame;

    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![]
    }

    /// Begins a new run. Called on the first tick, and on the first tick after a run completed
    /// or was halted.
    fn start(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> Result<Self::Frame, LogicError>;

    /// Advances the run by one step. Called right after `start` and then once per tick.
    ///
    /// An `Err` ends the run; the frame goes to [`AsyncAction::halted`] before the error is
    /// returned.
    fn resume(
        &mut self,
        frame: &mut Self::Frame,
        arg: BehaviorCallback,
        ctx: &mut Context,
    ) -> Result<Step, LogicError>;

    /// The run finished on its own.
    fn completed(&mut self, _frame: Self::Frame, _status: NodeStatus) {}

    /// The run was halted while suspended. Release whatever the frame holds.
    fn halted(&mut self, _frame: Self::Frame) {}

    fn as_reinitialize(&mut self) -> Option<&mut dyn Reinitialize> {
        None
    }
}

/// Adapts an [`AsyncAction`] to a [`BehaviorNode`].
pub struct CoroActionNode<A: AsyncAction> {
    action: A,
    frame: Option<A::Frame>,
}

impl<A: AsyncAction> CoroActionNode<A> {
    pub fn new(action: A) -> Self {
        Self {
            action,
            frame: None,
        }
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    /// Whether a run is suspended.
    pub fn is_suspended(&self) -> bool {
        self.frame.is_some()
    }
}

impl<A: AsyncAction + Default> Default for CoroActionNode<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A: AsyncAction> BehaviorNode for CoroActionNode<A> {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.action.provided_ports()
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let mut frame = match self.frame.take() {
            Some(frame) => frame,
            None => self.action.start(arg, ctx)?,
        };
        let step = match self.action.resume(&mut frame, arg, ctx) {
            Ok(step) => step,
            Err(err) => {
                debug!("suspended action failed, tearing it down");
                self.action.halted(frame);
                return Err(err);
            }
        };
        match step {
            // A run reported as still running keeps its frame.
            Step::Yield | Step::Complete(NodeStatus::Running) => {
                self.frame = Some(frame);
                Ok(NodeStatus::Running)
            }
            Step::Complete(status) => {
                self.action.completed(frame, status);
                Ok(status)
            }
        }
    }

    fn halt(&mut self) {
        if let Some(frame) = self.frame.take() {
            debug!("suspended action halted");
            self.action.halted(frame);
        }
    }

    fn as_reinitialize(&mut self) -> Option<&mut dyn Reinitialize> {
        self.action.as_reinitialize()
    }
}

/// Capability of a node to take new parameters from outside the tree, addressed by instance
/// name through [`crate::Tree::reinitialize`].
pub trait Reinitialize {
    fn reinitialize(&mut self, params: &dyn Any) -> Result<(), ReinitError>;
}
