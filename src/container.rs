use crate::{
    error::{AddChildError, AddChildResult},
    nodes::SubtreeNode,
    BBMap, BehaviorNode, BlackboardValue, NumChildren, PortSpec, Symbol,
};

/// An owned, nested description of a (sub)tree, flattened into a [`crate::Tree`] when the tree
/// is built.
pub struct BehaviorNodeContainer {
    /// Instance name; empty means "use the type name"
    pub(crate) name: String,
    /// Name of the type of the node
    pub(crate) type_name: String,
    pub(crate) node: Box<dyn BehaviorNode>,
    pub(crate) blackboard_map: BBMap,
    pub(crate) child_nodes: Vec<BehaviorNodeContainer>,
    /// The children of a subtree get a blackboard scope of their own
    pub(crate) subtree: bool,
}

impl BehaviorNodeContainer {
    pub fn new(node: Box<dyn BehaviorNode>, blackboard_map: BBMap) -> Self {
        Self {
            name: String::new(),
            type_name: String::new(),
            node,
            blackboard_map,
            child_nodes: vec![],
            subtree: false,
        }
    }

    /// Wraps a node, naming its type after the Rust type.
    pub fn new_node<T: BehaviorNode + 'static>(node: T) -> Self {
        let mut ret = Self::new(Box::new(node), BBMap::new());
        ret.type_name = short_type_name::<T>().to_owned();
        ret
    }

    pub(crate) fn new_raw_with_type(
        node: Box<dyn BehaviorNode>,
        type_name: impl Into<String>,
        blackboard_map: BBMap,
    ) -> Self {
        let mut ret = Self::new(node, blackboard_map);
        ret.type_name = type_name.into();
        ret
    }

    /// A subtree call. `params` are the parameters the subtree declares and `blackboard_map`
    /// binds them at the call site; `root` gets a blackboard scope of its own.
    pub fn new_subtree(
        name: impl Into<String>,
        params: Vec<PortSpec>,
        blackboard_map: BBMap,
        root: BehaviorNodeContainer,
    ) -> Self {
        let name = name.into();
        Self {
            name: name.clone(),
            type_name: name,
            node: Box::new(SubtreeNode::new(params)),
            blackboard_map,
            child_nodes: vec![root],
            subtree: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Binds `port`, see [`BlackboardValue::parse_binding`] for the string form.
    pub fn with_port(mut self, port: impl Into<Symbol>, value: impl Into<BlackboardValue>) -> Self {
        self.blackboard_map.insert(port.into(), value.into());
        self
    }

    pub fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        if NumChildren::Finite(self.child_nodes.len()) < self.node.max_children() {
            self.child_nodes.push(child);
            Ok(())
        } else {
            Err(AddChildError::TooManyNodes)
        }
    }

    pub fn children(&self) -> &[BehaviorNodeContainer] {
        &self.child_nodes
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn blackboard_map(&self) -> &BBMap {
        &self.blackboard_map
    }

    pub fn is_subtree(&self) -> bool {
        self.subtree
    }
}

impl std::fmt::Debug for BehaviorNodeContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorNodeContainer")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("blackboard_map", &self.blackboard_map)
            .field("child_nodes", &self.child_nodes)
            .field("subtree", &self.subtree)
            .finish()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{InverterNode, SequenceNode};

    #[test]
    fn type_name_is_last_segment() {
        let node = BehaviorNodeContainer::new_node(SequenceNode::default());
        assert_eq!(node.type_name(), "SequenceNode");
        assert_eq!(node.name(), "");
    }

    #[test]
    fn decorator_takes_one_child() {
        let mut inv = BehaviorNodeContainer::new_node(InverterNode::default());
        inv.add_child(BehaviorNodeContainer::new_node(SequenceNode::default()))
            .unwrap();
        assert_eq!(
            inv.add_child(BehaviorNodeContainer::new_node(SequenceNode::default())),
            Err(AddChildError::TooManyNodes)
        );
    }
}
