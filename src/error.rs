use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AddChildError {
    #[error("Attempted to add too many nodes")]
    TooManyNodes,
}

pub type AddChildResult = Result<(), AddChildError>;

/// A literal string could not be parsed into the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {literal:?} into {type_name}: {reason}")]
pub struct ConversionError {
    pub literal: String,
    pub type_name: String,
    pub reason: String,
}

impl ConversionError {
    pub fn new(
        literal: impl Into<String>,
        type_name: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self {
            literal: literal.into(),
            type_name: type_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure to read or write a port while ticking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PortError {
    #[error("port {port:?} of node {node:?} has no value")]
    Missing { node: String, port: String },
    #[error("port {port:?} of node {node:?} does not hold a {expected}")]
    TypeMismatch {
        node: String,
        port: String,
        expected: String,
    },
    #[error("port {port:?} of node {node:?}: {source}")]
    Conversion {
        node: String,
        port: String,
        source: ConversionError,
    },
    #[error("port {port:?} of node {node:?} is bound to a literal and cannot be written")]
    LiteralWrite { node: String, port: String },
    #[error("no string converter is registered for {type_name}")]
    UnknownType { type_name: String },
}

/// Programming errors that abort the current tick.
///
/// A tree that produced one of these is poisoned and refuses further ticks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LogicError {
    #[error("node {node:?} returned Idle from tick")]
    IdleReturned { node: String },
    #[error("node {node:?} was ticked while it was already being ticked")]
    Reentrant { node: String },
    #[error("node {node:?} has no child at index {index}")]
    ChildIndex { node: String, index: usize },
    #[error("port {port:?} of node {node:?} is {value}, but the node only has {children} children")]
    InvalidThreshold {
        node: String,
        port: String,
        value: i32,
        children: usize,
    },
    #[error(transparent)]
    Port(#[from] PortError),
    #[error("node {node:?}: {message}")]
    Node { node: String, message: String },
}

pub type TickResult = Result<crate::NodeStatus, LogicError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickError {
    #[error(transparent)]
    Logic(#[from] LogicError),
    #[error("the tree was poisoned by an earlier logic error: {0}")]
    Poisoned(LogicError),
}

/// Configuration errors found while a tree is being built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("The main tree does not exist")]
    MissingTree,
    #[error("Node type or subtree name not found {0:?}")]
    MissingNode(String),
    #[error("{0} to {1}")]
    AddChildError(AddChildError, String),
    #[error("Subtree {node:?} includes itself")]
    InfiniteRecursion { node: String },
    #[error("Node {node:?} does not declare port {port:?}")]
    PortUnmatch { node: String, port: String },
    #[error("Port {port:?} of node {node:?} is bound with the wrong direction")]
    PortIOUnmatch { node: String, port: String },
    #[error("Port {port:?} of node {node:?} is not an input and cannot take a literal")]
    LiteralOutput { node: String, port: String },
    #[error("Required port {port:?} of node {node:?} is not bound")]
    MissingPort { node: String, port: String },
    #[error("Port {port:?} of node {node:?} has type {type_name} without a registered converter")]
    UnknownType {
        node: String,
        port: String,
        type_name: String,
    },
    #[error("Port {port:?} of node {node:?}: {source}")]
    Conversion {
        node: String,
        port: String,
        source: ConversionError,
    },
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum LoadYamlError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("Missing")]
    Missing,
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ReinitError {
    #[error("no node named {0:?}")]
    NotFound(String),
    #[error("node {node:?} cannot be reinitialized")]
    Unsupported { node: String },
    #[error("node {node:?} rejected reinitialization: {reason}")]
    Rejected { node: String, reason: String },
}
