use std::any::{type_name, TypeId};

use crate::Symbol;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PortType {
    Input,
    Output,
    InOut,
}

impl PortType {
    /// Whether a binding written with direction `binding` may be attached to a
    /// port declared as `self`. In/out on either side is accepted.
    pub fn accepts(self, binding: PortType) -> bool {
        self == binding || self == PortType::InOut || binding == PortType::InOut
    }
}

/// Type tag of a port value, used to look up its string converter.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ValueType {
    pub id: TypeId,
    pub name: &'static str,
}

impl ValueType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// Static declaration of a port on a node type.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PortSpec {
    pub ty: PortType,
    pub key: Symbol,
    pub value_type: Option<ValueType>,
    pub default: Option<String>,
    pub description: Option<String>,
    pub required: bool,
}

impl PortSpec {
    pub fn new(ty: PortType, key: impl Into<Symbol>) -> Self {
        Self {
            ty,
            key: key.into(),
            value_type: None,
            default: None,
            description: None,
            required: false,
        }
    }

    pub fn new_in(key: impl Into<Symbol>) -> Self {
        Self::new(PortType::Input, key)
    }

    pub fn new_out(key: impl Into<Symbol>) -> Self {
        Self::new(PortType::Output, key)
    }

    pub fn new_inout(key: impl Into<Symbol>) -> Self {
        Self::new(PortType::InOut, key)
    }

    /// Declares the value type, so that literals bound to this port are
    /// converted and checked while the tree is built.
    pub fn typed<T: 'static>(mut self) -> Self {
        self.value_type = Some(ValueType::of::<T>());
        self
    }

    /// Literal bound to the port when the tree description leaves it unbound.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Makes an unbound port without default a load error.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}
