//! The node arena.
//!
//! [`Tree`] flattens a [`BehaviorNodeContainer`] into a table of slots addressed by [`NodeId`].
//! While a node is ticked its box is moved out of its slot, so that the node can be handed a
//! [`Context`] that borrows the rest of the tree mutably.

use std::any::{Any, TypeId};
use std::fmt::Write as _;
use std::rc::Rc;
use std::str::FromStr;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace};

use crate::{
    blackboard::{BBMap, BlackboardValue, Blackboards, Literal, ScopeId},
    convert::Converters,
    error::{LoadError, LogicError, PortError, ReinitError, TickError, TickResult},
    logger::{ObserverId, StatusChange, StatusObserver},
    BehaviorCallback, BehaviorNode, BehaviorNodeContainer, Context, NodeStatus, PortSpec,
    PortType, Registry, Symbol,
};

/// Stable handle of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

pub(crate) struct NodeSlot {
    pub(crate) name: Symbol,
    pub(crate) type_name: Symbol,
    /// `None` while the node is being ticked.
    pub(crate) node: Option<Box<dyn BehaviorNode>>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) blackboard_map: BBMap,
    pub(crate) scope: ScopeId,
    pub(crate) status: NodeStatus,
}

/// Where a port of a node reads from and writes to.
enum Binding<'a> {
    Key(ScopeId, Symbol),
    Literal(&'a Literal),
}

pub struct Tree {
    slots: Vec<NodeSlot>,
    blackboards: Blackboards,
    converters: Rc<Converters>,
    root: NodeId,
    observers: Vec<(ObserverId, Box<dyn StatusObserver>)>,
    next_observer: usize,
    poisoned: Option<LogicError>,
}

impl Tree {
    /// Builds a tree with the built-in converters, checking port bindings.
    pub fn new(root: BehaviorNodeContainer) -> Result<Self, LoadError> {
        Self::build(root, &Registry::default(), true)
    }

    /// Flattens `root` into a tree, taking string converters from `registry`.
    ///
    /// Default values of unbound ports are always bound. With `check_ports`, bindings to
    /// undeclared ports and bindings of the wrong direction are rejected as well.
    pub fn build(
        root: BehaviorNodeContainer,
        registry: &Registry,
        check_ports: bool,
    ) -> Result<Self, LoadError> {
        let mut tree = Self {
            slots: vec![],
            blackboards: Blackboards::default(),
            converters: registry.shared_converters(),
            root: NodeId(0),
            observers: vec![],
            next_observer: 0,
            poisoned: None,
        };
        tree.root = tree.insert(root, Blackboards::ROOT, check_ports)?;
        debug!(nodes = tree.slots.len(), "tree built");
        Ok(tree)
    }

    fn insert(
        &mut self,
        container: BehaviorNodeContainer,
        scope: ScopeId,
        check_ports: bool,
    ) -> Result<NodeId, LoadError> {
        let BehaviorNodeContainer {
            name,
            type_name,
            node,
            mut blackboard_map,
            child_nodes,
            subtree,
        } = container;

        let display_name = if !name.is_empty() {
            name.as_str()
        } else if !type_name.is_empty() {
            type_name.as_str()
        } else {
            "node"
        };
        let ports = node.provided_ports();
        validate_ports(
            display_name,
            &ports,
            &mut blackboard_map,
            &self.converters,
            check_ports,
        )?;

        let child_scope = if subtree {
            let remaps: Vec<_> = blackboard_map
                .iter()
                .filter_map(|(param, binding)| match binding {
                    BlackboardValue::Ref(key, _) => Some((*param, *key)),
                    BlackboardValue::Literal(_) => None,
                })
                .collect();
            let inner = self.blackboards.push_scope(scope, remaps);
            for (param, binding) in &blackboard_map {
                if let BlackboardValue::Literal(literal) = binding {
                    self.blackboards
                        .set(inner, *param, literal.text().to_owned());
                }
            }
            inner
        } else {
            scope
        };

        let id = NodeId(self.slots.len());
        self.slots.push(NodeSlot {
            name: display_name.into(),
            type_name: if type_name.is_empty() {
                display_name.into()
            } else {
                type_name.as_str().into()
            },
            node: Some(node),
            children: vec![],
            blackboard_map,
            scope,
            status: NodeStatus::Idle,
        });

        let mut children = Vec::with_capacity(child_nodes.len());
        for child in child_nodes {
            children.push(self.insert(child, child_scope, check_ports)?);
        }
        self.slots[id.0].children = children;
        Ok(id)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Status of the root node.
    pub fn status(&self) -> NodeStatus {
        self.slots[self.root.0].status
    }

    /// Ticks the root once.
    ///
    /// A logic error aborts the tick and poisons the tree; every later tick then fails with
    /// [`TickError::Poisoned`].
    pub fn tick(&mut self, arg: BehaviorCallback) -> Result<NodeStatus, TickError> {
        if let Some(err) = &self.poisoned {
            return Err(TickError::Poisoned(err.clone()));
        }
        match self.tick_node(self.root, arg) {
            Ok(status) => Ok(status),
            Err(err) => {
                error!(%err, "logic error while ticking, the tree is poisoned");
                self.poisoned = Some(err.clone());
                Err(err.into())
            }
        }
    }

    /// Ticks until the root returns something other than `Running`, sleeping `period` between
    /// ticks.
    pub fn tick_while_running(
        &mut self,
        arg: BehaviorCallback,
        period: Duration,
    ) -> Result<NodeStatus, TickError> {
        loop {
            let status = self.tick(arg)?;
            if status != NodeStatus::Running {
                return Ok(status);
            }
            std::thread::sleep(period);
        }
    }

    /// Halts the whole tree back to `Idle`.
    pub fn halt(&mut self) {
        self.halt_node(self.root);
    }

    /// The logic error that poisoned this tree, if any.
    pub fn poisoned(&self) -> Option<&LogicError> {
        self.poisoned.as_ref()
    }

    pub(crate) fn tick_node(&mut self, id: NodeId, arg: BehaviorCallback) -> TickResult {
        let slot = &mut self.slots[id.0];
        let Some(mut node) = slot.node.take() else {
            return Err(LogicError::Reentrant {
                node: slot.name.to_string(),
            });
        };
        trace!(node = %slot.name, "tick");
        let res = node.tick(arg, &mut Context::new(self, id));
        self.slots[id.0].node = Some(node);
        let status = res?;
        if status == NodeStatus::Idle {
            return Err(LogicError::IdleReturned {
                node: self.slots[id.0].name.to_string(),
            });
        }
        self.set_status(id, status);
        Ok(status)
    }

    pub(crate) fn halt_node(&mut self, id: NodeId) {
        // The node is out of its slot if it halts itself from within its own tick; it resets
        // its own state in that case.
        if let Some(node) = self.slots[id.0].node.as_mut() {
            node.halt();
        }
        let children = self.slots[id.0].children.clone();
        for child in children {
            if self.slots[child.0].status != NodeStatus::Idle {
                self.halt_node(child);
            }
        }
        if self.slots[id.0].status != NodeStatus::Idle {
            debug!(node = %self.slots[id.0].name, "halted");
        }
        self.set_status(id, NodeStatus::Idle);
    }

    pub(crate) fn set_status(&mut self, id: NodeId, status: NodeStatus) {
        let slot = &mut self.slots[id.0];
        let previous = std::mem::replace(&mut slot.status, status);
        if previous == status {
            return;
        }
        let change = StatusChange {
            node: id,
            name: slot.name,
            type_name: slot.type_name,
            previous,
            current: status,
            timestamp: Instant::now(),
        };
        for (_, observer) in &mut self.observers {
            observer.on_status_change(&change);
        }
    }

    pub(crate) fn child_id(&self, id: NodeId, index: usize) -> Result<NodeId, LogicError> {
        self.slots[id.0]
            .children
            .get(index)
            .copied()
            .ok_or_else(|| LogicError::ChildIndex {
                node: self.slots[id.0].name.to_string(),
                index,
            })
    }

    pub(crate) fn child_count(&self, id: NodeId) -> usize {
        self.slots[id.0].children.len()
    }

    fn binding(&self, id: NodeId, port: Symbol) -> Binding<'_> {
        let slot = &self.slots[id.0];
        match slot.blackboard_map.get(&port) {
            None => Binding::Key(slot.scope, port),
            Some(BlackboardValue::Ref(key, _)) => Binding::Key(slot.scope, *key),
            Some(BlackboardValue::Literal(literal)) => Binding::Literal(literal),
        }
    }

    fn port_error_node(&self, id: NodeId) -> String {
        self.slots[id.0].name.to_string()
    }

    pub(crate) fn port_get<T: 'static>(&self, id: NodeId, port: Symbol) -> Option<&T> {
        match self.binding(id, port) {
            Binding::Key(scope, key) => self.blackboards.get(scope, key),
            Binding::Literal(literal) => literal.get(),
        }
    }

    /// The raw value behind a port; a literal yields its text.
    pub(crate) fn port_get_any(&self, id: NodeId, port: Symbol) -> Option<Rc<dyn Any>> {
        match self.binding(id, port) {
            Binding::Key(scope, key) => self.blackboards.get_any(scope, key).cloned(),
            Binding::Literal(literal) => Some(Rc::new(literal.text().to_owned())),
        }
    }

    pub(crate) fn port_get_parse<T>(&self, id: NodeId, port: Symbol) -> Option<T>
    where
        T: FromStr + Clone + 'static,
    {
        self.port_get::<T>(id, port).cloned().or_else(|| {
            self.port_get::<String>(id, port)
                .and_then(|s| s.parse().ok())
        })
    }

    pub(crate) fn port_input<T: Clone + 'static>(
        &self,
        id: NodeId,
        port: Symbol,
    ) -> Result<T, PortError> {
        let conversion = |source| PortError::Conversion {
            node: self.port_error_node(id),
            port: port.to_string(),
            source,
        };
        let require_converter = || {
            if self.converters.contains(TypeId::of::<T>()) {
                Ok(())
            } else {
                Err(PortError::UnknownType {
                    type_name: std::any::type_name::<T>().to_owned(),
                })
            }
        };
        match self.binding(id, port) {
            Binding::Literal(literal) => {
                if literal.get::<T>().is_none() {
                    require_converter()?;
                }
                literal.convert(&self.converters).map_err(conversion)
            }
            Binding::Key(scope, key) => {
                let value = self
                    .blackboards
                    .get_any(scope, key)
                    .ok_or_else(|| PortError::Missing {
                        node: self.port_error_node(id),
                        port: port.to_string(),
                    })?;
                if let Some(value) = value.downcast_ref::<T>() {
                    Ok(value.clone())
                } else if let Some(text) = value.downcast_ref::<String>() {
                    require_converter()?;
                    self.converters.parse(text).map_err(conversion)
                } else {
                    Err(PortError::TypeMismatch {
                        node: self.port_error_node(id),
                        port: port.to_string(),
                        expected: std::any::type_name::<T>().to_owned(),
                    })
                }
            }
        }
    }

    pub(crate) fn port_set_any(
        &mut self,
        id: NodeId,
        port: Symbol,
        value: Rc<dyn Any>,
    ) -> Result<(), PortError> {
        match self.binding(id, port) {
            Binding::Literal(_) => Err(PortError::LiteralWrite {
                node: self.port_error_node(id),
                port: port.to_string(),
            }),
            Binding::Key(scope, key) => {
                self.blackboards.set_any(scope, key, value);
                Ok(())
            }
        }
    }

    pub(crate) fn scope_of(&self, id: NodeId) -> ScopeId {
        self.slots[id.0].scope
    }

    pub(crate) fn converters(&self) -> &Converters {
        &self.converters
    }

    /// All node ids in depth-first construction order; the root comes first.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.slots.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Instance name. Nodes without an explicit name are named after their type.
    pub fn name(&self, id: NodeId) -> Option<Symbol> {
        self.slots.get(id.0).map(|slot| slot.name)
    }

    pub fn type_name(&self, id: NodeId) -> Option<Symbol> {
        self.slots.get(id.0).map(|slot| slot.type_name)
    }

    pub fn node_status(&self, id: NodeId) -> Option<NodeStatus> {
        self.slots.get(id.0).map(|slot| slot.status)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slots
            .get(id.0)
            .map(|slot| slot.children.as_slice())
            .unwrap_or_default()
    }

    pub fn ports(&self, id: NodeId) -> Option<&BBMap> {
        self.slots.get(id.0).map(|slot| &slot.blackboard_map)
    }

    /// The first node with the given instance name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.find_all(name).next()
    }

    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, slot)| slot.name == name)
            .map(|(i, _)| NodeId(i))
    }

    /// Reads an input port of any node the same way the node itself would.
    pub fn node_input<T: Clone + 'static>(
        &self,
        id: NodeId,
        port: impl Into<Symbol>,
    ) -> Result<T, PortError> {
        if id.0 >= self.slots.len() {
            return Err(PortError::Missing {
                node: format!("#{}", id.0),
                port: port.into().to_string(),
            });
        }
        self.port_input(id, port.into())
    }

    pub fn blackboards(&self) -> &Blackboards {
        &self.blackboards
    }

    pub fn blackboards_mut(&mut self) -> &mut Blackboards {
        &mut self.blackboards
    }

    /// Reads a key of the root blackboard scope.
    pub fn get<T: 'static>(&self, key: impl Into<Symbol>) -> Option<&T> {
        self.blackboards.get(Blackboards::ROOT, key)
    }

    /// Writes a key of the root blackboard scope.
    pub fn set<T: 'static>(&mut self, key: impl Into<Symbol>, value: T) {
        self.blackboards.set(Blackboards::ROOT, key, value);
    }

    /// Formats a root scope entry with the converter registered for its type.
    pub fn entry_string(&self, key: impl Into<Symbol>) -> Option<String> {
        let value = self.blackboards.get_any(Blackboards::ROOT, key)?;
        self.converters.format(&**value)
    }

    pub fn add_observer(&mut self, observer: impl StatusObserver + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    /// Passes `params` to every node named `name` that supports reinitialization.
    ///
    /// Returns the number of nodes reinitialized.
    pub fn reinitialize(&mut self, name: &str, params: &dyn Any) -> Result<usize, ReinitError> {
        let mut count = 0;
        for slot in self.slots.iter_mut().filter(|slot| slot.name == name) {
            let Some(node) = slot.node.as_mut() else {
                continue;
            };
            let target = node.as_reinitialize().ok_or_else(|| ReinitError::Unsupported {
                node: slot.name.to_string(),
            })?;
            target.reinitialize(params)?;
            count += 1;
        }
        if count == 0 {
            return Err(ReinitError::NotFound(name.to_owned()));
        }
        debug!(node = name, count, "reinitialized");
        Ok(count)
    }

    /// Renders the tree structure with the current status of every node, one node per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root, 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let slot = &self.slots[id.0];
        let _ = write!(out, "{:indent$}{}", "", slot.name, indent = depth * 2);
        if slot.name != slot.type_name {
            let _ = write!(out, " ({})", slot.type_name);
        }
        let _ = writeln!(out, ": {}", slot.status);
        for child in &slot.children {
            self.dump_node(*child, depth + 1, out);
        }
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("nodes", &self.slots.len())
            .field("root", &self.root)
            .field("status", &self.status())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

fn validate_ports(
    node: &str,
    ports: &[PortSpec],
    blackboard_map: &mut BBMap,
    converters: &Converters,
    check_ports: bool,
) -> Result<(), LoadError> {
    for port in ports {
        if let Some(default) = &port.default {
            blackboard_map
                .entry(port.key)
                .or_insert_with(|| BlackboardValue::parse_binding(default));
        }
    }

    for (key, value) in blackboard_map.iter() {
        let Some(port) = ports.iter().find(|port| port.key == *key) else {
            if check_ports {
                return Err(LoadError::PortUnmatch {
                    node: node.to_owned(),
                    port: key.to_string(),
                });
            }
            continue;
        };
        match value {
            BlackboardValue::Ref(_, ty) => {
                if check_ports && !port.ty.accepts(*ty) {
                    return Err(LoadError::PortIOUnmatch {
                        node: node.to_owned(),
                        port: key.to_string(),
                    });
                }
            }
            BlackboardValue::Literal(literal) => {
                if port.ty != PortType::Input {
                    return Err(LoadError::LiteralOutput {
                        node: node.to_owned(),
                        port: key.to_string(),
                    });
                }
                if let Some(value_type) = port.value_type {
                    if !converters.contains(value_type.id) {
                        return Err(LoadError::UnknownType {
                            node: node.to_owned(),
                            port: key.to_string(),
                            type_name: value_type.name.to_owned(),
                        });
                    }
                    literal
                        .prime(converters, value_type)
                        .map_err(|source| LoadError::Conversion {
                            node: node.to_owned(),
                            port: key.to_string(),
                            source,
                        })?;
                }
            }
        }
    }

    for port in ports {
        if port.required && !blackboard_map.contains_key(&port.key) {
            return Err(LoadError::MissingPort {
                node: node.to_owned(),
                port: port.key.to_string(),
            });
        }
    }
    Ok(())
}
