use std::collections::HashMap;
use std::rc::Rc;

use super::{
    nodes::{
        AlwaysFailureNode, AlwaysSuccessNode, FallbackNode, ForceFailureNode, ForceSuccessNode,
        IfNode, InverterNode, IsTrueNode, ParallelNode, QueueNode, ReactiveFallbackNode,
        ReactiveSequenceNode, RepeatNode, RetryNode, SequenceNode, SetBlackboardNode,
        SetBoolNode, SimpleActionNode, TimeoutNode,
    },
    BBMap, BehaviorCallback, BehaviorNode, BehaviorNodeContainer, Context, Converters, PortSpec,
    TickResult,
};

/// What a constructor knows about the instance it creates.
pub struct NodeConfig<'a> {
    pub name: &'a str,
    pub ports: &'a BBMap,
}

pub type Constructor = Box<dyn Fn(&NodeConfig) -> Box<dyn BehaviorNode>>;

pub fn boxify<T>(cons: impl (Fn() -> T) + 'static) -> Constructor
where
    T: BehaviorNode + 'static,
{
    Box::new(move |_| -> Box<dyn BehaviorNode> { Box::new(cons()) })
}

/// Like [`boxify`], for constructors that look at the instance configuration.
pub fn boxify_with<T>(cons: impl (Fn(&NodeConfig) -> T) + 'static) -> Constructor
where
    T: BehaviorNode + 'static,
{
    Box::new(move |config| -> Box<dyn BehaviorNode> { Box::new(cons(config)) })
}

/// Node factory keyed by type name, together with the string converters of port values.
pub struct Registry {
    node_types: HashMap<String, Constructor>,
    converters: Rc<Converters>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut ret = Self {
            node_types: HashMap::new(),
            converters: Rc::new(Converters::default()),
        };
        ret.register("Sequence", boxify(SequenceNode::default));
        ret.register("ReactiveSequence", boxify(ReactiveSequenceNode::default));
        ret.register("Fallback", boxify(FallbackNode::default));
        ret.register("ReactiveFallback", boxify(ReactiveFallbackNode::default));
        ret.register("Queue", boxify(QueueNode::default));
        ret.register("QueueNode", boxify(QueueNode::default));
        ret.register("Parallel", boxify(ParallelNode::default));
        ret.register("ForceSuccess", boxify(ForceSuccessNode::default));
        ret.register("ForceFailure", boxify(ForceFailureNode::default));
        ret.register("Inverter", boxify(InverterNode::default));
        ret.register("Repeat", boxify(RepeatNode::default));
        ret.register("Retry", boxify(RetryNode::default));
        ret.register("Timeout", boxify(TimeoutNode::default));
        ret.register("IsTrue", boxify(|| IsTrueNode));
        ret.register("if", boxify(IfNode::default));
        ret.register("SetBool", boxify(|| SetBoolNode));
        ret.register("SetBlackboard", boxify(|| SetBlackboardNode));
        ret.register("AlwaysSuccess", boxify(|| AlwaysSuccessNode));
        ret.register("AlwaysFailure", boxify(|| AlwaysFailureNode));
        ret
    }
}

impl Registry {
    pub fn register(&mut self, type_name: impl ToString, constructor: Constructor) {
        self.node_types.insert(type_name.to_string(), constructor);
    }

    pub fn register_type<T>(&mut self, type_name: impl ToString)
    where
        T: BehaviorNode + Default + 'static,
    {
        self.register(type_name, boxify(T::default));
    }

    /// Registers a synchronous leaf backed by a closure shared by all instances.
    pub fn register_simple_action(
        &mut self,
        type_name: impl ToString,
        ports: Vec<PortSpec>,
        tick: impl (Fn(BehaviorCallback, &mut Context) -> TickResult) + 'static,
    ) {
        let tick: Rc<dyn Fn(BehaviorCallback, &mut Context) -> TickResult> = Rc::new(tick);
        self.register(
            type_name,
            boxify(move || SimpleActionNode::from_shared(tick.clone(), ports.clone())),
        );
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.node_types.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.node_types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    /// Converters for new value types go here. Trees already built keep the table they were
    /// built with.
    pub fn converters_mut(&mut self) -> &mut Converters {
        Rc::make_mut(&mut self.converters)
    }

    pub(crate) fn shared_converters(&self) -> Rc<Converters> {
        self.converters.clone()
    }

    pub fn build(&self, type_name: &str, config: &NodeConfig) -> Option<Box<dyn BehaviorNode>> {
        self.node_types
            .get(type_name)
            .map(|constructor| constructor(config))
    }

    /// Builds an unnamed node of `type_name` with the given port bindings.
    pub fn build_container(
        &self,
        type_name: &str,
        blackboard_map: BBMap,
    ) -> Option<BehaviorNodeContainer> {
        self.build_named(type_name, "", blackboard_map)
    }

    pub fn build_named(
        &self,
        type_name: &str,
        name: &str,
        blackboard_map: BBMap,
    ) -> Option<BehaviorNodeContainer> {
        let node = self.build(
            type_name,
            &NodeConfig {
                name,
                ports: &blackboard_map,
            },
        )?;
        Some(
            BehaviorNodeContainer::new_raw_with_type(node, type_name, blackboard_map)
                .with_name(name),
        )
    }
}
