//! Built-in node types.

mod control;
mod decorator;
mod leaf;
mod parallel;
mod queue;

pub use self::control::{
    FallbackNode, IfNode, ReactiveFallbackNode, ReactiveSequenceNode, SequenceNode, SubtreeNode,
};
pub use self::decorator::{
    ForceFailureNode, ForceSuccessNode, InverterNode, RepeatNode, RetryNode, TimeoutNode,
};
pub use self::leaf::{
    AlwaysFailureNode, AlwaysSuccessNode, IsTrueNode, SetBlackboardNode, SetBoolNode,
    SimpleActionNode,
};
pub use self::parallel::ParallelNode;
pub use self::queue::QueueNode;
