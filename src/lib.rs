//! # behavior-engine (Rust crate)
//!
//! A tick-driven behavior tree engine.
//!
//!
//! ## Overview
//!
//! A behavior tree is an extension to finite state machines that makes describing transitional
//! behavior easier. A caller ticks the root of the tree once per control cycle; every tick walks
//! down the tree following the iteration policy of each control node, and every node reports a
//! [`NodeStatus`] upward.
//!
//! The engine is modeled after [BehaviorTreeCPP](https://github.com/BehaviorTree/BehaviorTree.CPP.git),
//! but the node graph is an arena: a [`Tree`] owns all nodes in a flat table and nodes never hold
//! references to each other. Everything they share goes through the blackboard.
//!
//!
//! ## How it looks like
//!
//! First, you define a node type by implementing [`BehaviorNode`].
//!
//! ```rust
//! use behavior_engine::*;
//!
//! struct Greet;
//!
//! impl BehaviorNode for Greet {
//!     fn provided_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::new_in("whom")]
//!     }
//!
//!     fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
//!         let whom: String = ctx.get_input("whom")?;
//!         arg(&format!("Hello, {whom}!"));
//!         Ok(NodeStatus::Success)
//!     }
//! }
//! ```
//!
//! Then you put nodes together. [`BehaviorNodeContainer`] is an owned, nested description of a
//! tree; `with_port` binds a port to a literal or, with the `{key}` syntax, to a blackboard key.
//!
//! ```rust
//! # use behavior_engine::*;
//! # struct Greet;
//! # impl BehaviorNode for Greet {
//! #     fn provided_ports(&self) -> Vec<PortSpec> { vec![PortSpec::new_in("whom")] }
//! #     fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
//! #         let whom: String = ctx.get_input("whom")?;
//! #         arg(&format!("Hello, {whom}!"));
//! #         Ok(NodeStatus::Success)
//! #     }
//! # }
//! let mut root = BehaviorNodeContainer::new_node(SequenceNode::default());
//! root.add_child(BehaviorNodeContainer::new_node(Greet).with_port("whom", "world"))
//!     .unwrap();
//! root.add_child(BehaviorNodeContainer::new_node(Greet).with_port("whom", "{visitor}"))
//!     .unwrap();
//!
//! let mut tree = Tree::new(root).unwrap();
//! tree.set("visitor", "Alice".to_string());
//! ```
//!
//! Ticking takes a callback. Nodes can pass anything to it and the caller answers, which is how a
//! tree talks to state it does not own.
//!
//! ```rust
//! # use behavior_engine::*;
//! # struct Greet;
//! # impl BehaviorNode for Greet {
//! #     fn provided_ports(&self) -> Vec<PortSpec> { vec![PortSpec::new_in("whom")] }
//! #     fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
//! #         let whom: String = ctx.get_input("whom")?;
//! #         arg(&format!("Hello, {whom}!"));
//! #         Ok(NodeStatus::Success)
//! #     }
//! # }
//! # let mut root = BehaviorNodeContainer::new_node(SequenceNode::default());
//! # root.add_child(BehaviorNodeContainer::new_node(Greet).with_port("whom", "world")).unwrap();
//! # root.add_child(BehaviorNodeContainer::new_node(Greet).with_port("whom", "{visitor}")).unwrap();
//! # let mut tree = Tree::new(root).unwrap();
//! # tree.set("visitor", "Alice".to_string());
//! let mut log = vec![];
//! let status = tree
//!     .tick(&mut |v: &dyn std::any::Any| {
//!         log.push(v.downcast_ref::<String>().cloned().unwrap_or_default());
//!         None
//!     })
//!     .unwrap();
//!
//! assert_eq!(status, NodeStatus::Success);
//! assert_eq!(log, ["Hello, world!", "Hello, Alice!"]);
//! ```
//!
//!
//! ## Node status
//!
//! A node starts [`NodeStatus::Idle`]. A tick returns `Running`, `Success` or `Failure`; returning
//! `Idle` from a tick is a programming error, reported as [`error::LogicError::IdleReturned`].
//! A tree that has seen a logic error is poisoned and refuses to tick again.
//!
//! `Running` means "tick me again before reading my result". An ancestor may instead halt the
//! node, which brings it and its active descendants back to `Idle` synchronously.
//!
//!
//! ## Ports and the blackboard
//!
//! Each node type declares its ports with [`PortSpec`]. A port is bound either to a literal
//! string or to a blackboard key. Literal strings are converted to the requested type through
//! the [`Converters`] table of the [`Registry`] and the first conversion is cached. Unbound ports
//! read and write the blackboard key of the same name.
//!
//! Bindings are validated when the tree is built. Binding an undeclared port, binding a literal to
//! an output, or a literal that does not convert into the declared type of its port are all
//! [`error::LoadError`]s naming the node and the port.
//!
//! Subtrees get a blackboard scope of their own. Their parameters are remapped to keys of the
//! enclosing scope, so a value written under a parameter name inside a subtree shows up under
//! the remapped name outside of it.
//!
//!
//! ## Built-in nodes
//!
//! * Control: `Sequence`, `ReactiveSequence`, `Fallback`, `ReactiveFallback`, `Queue`,
//!   `Parallel` and `if`.
//! * Decorators: `Inverter`, `ForceSuccess`, `ForceFailure`, `Repeat`, `Retry` and `Timeout`.
//! * Leaves: `SetBool`, `IsTrue`, `SetBlackboard`, `AlwaysSuccess` and `AlwaysFailure`.
//!
//! `Queue` is a sequence that does not abort on failure: it ticks every child once per pass,
//! stays `Running` on the first child that has not finished yet, and reports `Failure` at the
//! end of the pass if any child failed.
//!
//!
//! ## Long running actions
//!
//! An action that spans several ticks can be written as a plain [`BehaviorNode`] that keeps its
//! own state, or as an [`AsyncAction`] wrapped in a [`CoroActionNode`]. The latter keeps the
//! state of the running procedure in an explicit frame that is resumed on every tick and
//! discarded, exactly once, when the node is halted.
//!
//!
//! ## Loading from a text file
//!
//! Trees can also be described in a small custom language.
//!
//! ```raw
//! tree main = Sequence {
//!     Fallback {
//!         IsTrue (input <- "{door_open}")
//!         OpenDoor
//!     }
//!     Queue {
//!         PickUp (item <- "cup")
//!         PickUp (item <- "plate")
//!     }
//! }
//! ```
//!
//! Node types are looked up in a [`Registry`]; [`load_str`] parses and instantiates a tree in one
//! go. Subtrees with parameters, `if` / `else`, `!` negation and `var` declarations are supported;
//! see the [`parser`] module.
//!
//!
//! ## Logging
//!
//! The engine logs with `tracing`. Status transitions of every node can also be observed directly
//! with [`Tree::add_observer`], see [`logger`].

mod action;
mod blackboard;
mod container;
mod context;
mod convert;
pub mod error;
pub mod logger;
mod nodes;
pub mod parser;
mod port;
mod registry;
mod symbol;
mod tree;

use std::any::Any;

pub use crate::action::{AsyncAction, CoroActionNode, Reinitialize, Step};
pub use crate::blackboard::{BBMap, Blackboard, BlackboardValue, Blackboards, Literal, ScopeId};
pub use crate::container::BehaviorNodeContainer;
pub use crate::context::Context;
pub use crate::convert::{split_literal, Converters};
pub use crate::error::TickResult;
pub use crate::logger::{ObserverId, StatusChange, StatusObserver};
pub use crate::nodes::{
    AlwaysFailureNode, AlwaysSuccessNode, FallbackNode, ForceFailureNode, ForceSuccessNode,
    IfNode, InverterNode, IsTrueNode, ParallelNode, QueueNode, ReactiveFallbackNode,
    ReactiveSequenceNode, RepeatNode, RetryNode, SequenceNode, SetBlackboardNode, SetBoolNode,
    SimpleActionNode, SubtreeNode, TimeoutNode,
};
pub use crate::symbol::Symbol;
pub use crate::tree::{NodeId, Tree};
pub use crate::{
    parser::{load, load_str, load_yaml, parse_file},
    port::{PortSpec, PortType, ValueType},
    registry::{boxify, boxify_with, Constructor, NodeConfig, Registry},
};
pub use ::once_cell::sync::Lazy;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Hash)]
pub enum NodeStatus {
    /// Not ticked yet, or halted.
    #[default]
    Idle,
    /// The node should keep running in the next tick
    Running,
    Success,
    Failure,
}

impl NodeStatus {
    /// Success or Failure.
    pub fn is_completed(self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Failure)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NodeStatus::Idle => "IDLE",
            NodeStatus::Running => "RUNNING",
            NodeStatus::Success => "SUCCESS",
            NodeStatus::Failure => "FAILURE",
        })
    }
}

pub type BehaviorCallback<'a> = &'a mut dyn FnMut(&dyn Any) -> Option<Box<dyn Any>>;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NumChildren {
    Finite(usize),
    Infinite,
}

impl PartialOrd for NumChildren {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(match (self, other) {
            (NumChildren::Finite(_), NumChildren::Infinite) => std::cmp::Ordering::Less,
            (NumChildren::Infinite, NumChildren::Finite(_)) => std::cmp::Ordering::Greater,
            (NumChildren::Finite(lhs), NumChildren::Finite(rhs)) => lhs.cmp(rhs),
            (NumChildren::Infinite, NumChildren::Infinite) => return None,
        })
    }
}

/// The contract every node implements.
///
/// A node only sees the rest of the tree through the [`Context`] it is ticked with: its own
/// ports, its children by index and its own status.
pub trait BehaviorNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![]
    }

    /// Must not return `Idle`. Domain failures are `Ok(NodeStatus::Failure)`; an `Err` aborts the
    /// whole tick.
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult;

    /// Drops any state kept for a running tick. The tree halts the children and resets the
    /// status afterwards. Called on idle nodes too, so it must be idempotent.
    fn halt(&mut self) {}

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(0)
    }

    /// Opt-in for [`Tree::reinitialize`].
    fn as_reinitialize(&mut self) -> Option<&mut dyn Reinitialize> {
        None
    }
}

#[macro_export]
macro_rules! hash_map {
    () => {
        std::collections::HashMap::default()
    };
    ($($name: expr => $val: expr),+ $(,)?) => {{
        let mut ret = std::collections::HashMap::default();
        $(ret.insert($name.into(), $val.into());)+
        ret
    }};
}
