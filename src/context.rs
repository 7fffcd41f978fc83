use std::{any::Any, rc::Rc, str::FromStr};

use crate::{
    blackboard::{Blackboards, ScopeId},
    convert::Converters,
    error::{LogicError, PortError, TickResult},
    BehaviorCallback, NodeId, NodeStatus, Symbol, Tree,
};

/// The view a node gets of the tree while it is ticked: its own ports, its own status and its
/// children, by index.
pub struct Context<'t> {
    tree: &'t mut Tree,
    node: NodeId,
}

impl<'t> Context<'t> {
    pub(crate) fn new(tree: &'t mut Tree, node: NodeId) -> Self {
        Self { tree, node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Instance name of the node being ticked.
    pub fn name(&self) -> Symbol {
        self.tree.name(self.node).unwrap_or_else(|| "".into())
    }

    /// Status recorded before this tick.
    pub fn status(&self) -> NodeStatus {
        self.tree.node_status(self.node).unwrap_or_default()
    }

    /// Publishes a status before the tick returns, e.g. `Running` while children are ticked.
    pub fn set_status(&mut self, status: NodeStatus) {
        self.tree.set_status(self.node, status);
    }

    /// Reads a port that holds exactly a `T`.
    ///
    /// An unbound port reads the blackboard key of the same name. A literal binding yields a
    /// `String`, or a `T` once it has been converted.
    pub fn get<T: 'static>(&self, port: impl Into<Symbol>) -> Option<&T> {
        self.tree.port_get(self.node, port.into())
    }

    /// The raw value of a port, whatever its type. A literal yields a `String`.
    pub fn get_any(&self, port: impl Into<Symbol>) -> Option<Rc<dyn Any>> {
        self.tree.port_get_any(self.node, port.into())
    }

    /// Reads a port as `T`, parsing a string value with `FromStr` if needed.
    pub fn get_parse<T>(&self, port: impl Into<Symbol>) -> Option<T>
    where
        T: FromStr + Clone + 'static,
    {
        self.tree.port_get_parse(self.node, port.into())
    }

    /// Reads an input port as `T`, converting a string value through the registered converter.
    pub fn get_input<T: Clone + 'static>(&self, port: impl Into<Symbol>) -> Result<T, PortError> {
        self.tree.port_input(self.node, port.into())
    }

    /// Writes an output port.
    pub fn set<T: 'static>(&mut self, port: impl Into<Symbol>, val: T) -> Result<(), PortError> {
        self.set_any(port, Rc::new(val))
    }

    pub fn set_any(&mut self, port: impl Into<Symbol>, val: Rc<dyn Any>) -> Result<(), PortError> {
        self.tree.port_set_any(self.node, port.into(), val)
    }

    /// The blackboard scope this node belongs to.
    pub fn scope(&self) -> ScopeId {
        self.tree.scope_of(self.node)
    }

    pub fn blackboards(&self) -> &Blackboards {
        self.tree.blackboards()
    }

    pub fn blackboards_mut(&mut self) -> &mut Blackboards {
        self.tree.blackboards_mut()
    }

    pub fn converters(&self) -> &Converters {
        self.tree.converters()
    }

    pub fn num_children(&self) -> usize {
        self.tree.child_count(self.node)
    }

    pub fn child_status(&self, index: usize) -> Option<NodeStatus> {
        let child = self.tree.child_id(self.node, index).ok()?;
        self.tree.node_status(child)
    }

    pub fn tick_child(&mut self, index: usize, arg: BehaviorCallback) -> TickResult {
        let child = self.tree.child_id(self.node, index)?;
        self.tree.tick_node(child, arg)
    }

    pub fn halt_child(&mut self, index: usize) -> Result<(), LogicError> {
        let child = self.tree.child_id(self.node, index)?;
        self.tree.halt_node(child);
        Ok(())
    }

    /// Halts children from index `from` on.
    pub fn halt_children(&mut self, from: usize) {
        for index in from..self.num_children() {
            if let Ok(child) = self.tree.child_id(self.node, index) {
                self.tree.halt_node(child);
            }
        }
    }

    /// The error to return when child `index` reports `Idle` from a tick.
    pub fn idle_error(&self, index: usize) -> LogicError {
        let node = self
            .tree
            .child_id(self.node, index)
            .ok()
            .and_then(|child| self.tree.name(child))
            .unwrap_or_else(|| self.name());
        LogicError::IdleReturned {
            node: node.to_string(),
        }
    }

    /// A logic error attributed to this node.
    pub fn error(&self, message: impl Into<String>) -> LogicError {
        LogicError::Node {
            node: self.name().to_string(),
            message: message.into(),
        }
    }
}
