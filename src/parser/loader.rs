use tracing::debug;

use super::nom_parser::{PortMap, TreeDef, TreeSource, ValueDef};
use crate::{
    error::LoadError, nodes::IsTrueNode, BBMap, BehaviorNodeContainer, BlackboardValue, PortSpec,
    PortType, Registry, Tree,
};

/// Instantiate a behavior tree from a AST of a tree.
///
/// The tree named `main` is the root. A node type that is not in `registry` is looked up among
/// the trees of `tree_source` and instantiated as a subtree.
///
/// `check_ports` enables static checking of port availability before actually ticking.
/// It is useful to catch errors in a behavior tree source file, but you need to
/// implement [`crate::BehaviorNode::provided_ports`] to use it.
pub fn load(
    tree_source: &TreeSource,
    registry: &Registry,
    check_ports: bool,
) -> Result<Tree, LoadError> {
    let main = tree_source.tree("main").ok_or(LoadError::MissingTree)?;

    let top = TreeStack {
        name: "main",
        parent: None,
    };

    let root = load_recurse(&main.root, registry, tree_source, &top, &mut vec![])?;
    let tree = Tree::build(root, registry, check_ports)?;
    debug!(nodes = tree.len(), "loaded tree main");
    Ok(tree)
}

/// Parses `text` and loads its `main` tree.
pub fn load_str(text: &str, registry: &Registry, check_ports: bool) -> Result<Tree, LoadError> {
    let source = TreeSource::parse(text)?;
    load(&source, registry, check_ports)
}

/// A mechanism to detect infinite recursion. It is a linked list in call stack.
/// You can traverse the link back to enumerate all the subtree names (which is effectively
/// function names) and check if a subtree name to be inserted is already there.
///
/// Subtrees are expanded eagerly when the tree is loaded, so a subtree that includes itself
/// would never finish loading.
struct TreeStack<'a, 'src> {
    name: &'src str,
    parent: Option<&'a TreeStack<'a, 'src>>,
}

impl<'a, 'src> TreeStack<'a, 'src> {
    fn find(&self, name: &str) -> bool {
        if self.name == name {
            true
        } else if let Some(parent) = self.parent {
            parent.find(name)
        } else {
            false
        }
    }
}

fn load_recurse<'src>(
    parent: &TreeDef<'src>,
    registry: &Registry,
    tree_source: &TreeSource<'src>,
    parent_stack: &TreeStack,
    vars: &mut Vec<&'src str>,
) -> Result<BehaviorNodeContainer, LoadError> {
    let blackboard_map = port_bindings(&parent.port_maps);
    let name = parent.name.as_deref().unwrap_or_default();

    let mut ret = if vars.contains(&parent.ty)
        && parent.port_maps.is_empty()
        && parent.children.is_empty()
    {
        // A bare variable reads as its truth value.
        let mut map = BBMap::new();
        map.insert(
            "input".into(),
            BlackboardValue::Ref(parent.ty.into(), PortType::Input),
        );
        BehaviorNodeContainer::new_raw_with_type(Box::new(IsTrueNode), "IsTrue", map)
            .with_name(name)
    } else if registry.contains(parent.ty) {
        registry
            .build_named(parent.ty, name, blackboard_map)
            .ok_or_else(|| LoadError::MissingNode(parent.ty.to_owned()))?
    } else {
        let tree = tree_source
            .tree(parent.ty)
            .ok_or_else(|| LoadError::MissingNode(parent.ty.to_owned()))?;

        // Prevent infinite recursion
        if parent_stack.find(parent.ty) {
            return Err(LoadError::InfiniteRecursion {
                node: parent.ty.to_owned(),
            });
        }
        let tree_stack = TreeStack {
            name: parent.ty,
            parent: Some(parent_stack),
        };
        // Variables do not reach into subtrees; parameters do.
        let root = load_recurse(&tree.root, registry, tree_source, &tree_stack, &mut vec![])?;
        let params = tree
            .ports
            .iter()
            .map(|port| PortSpec::new(port.direction, port.name))
            .collect();
        let mut subtree =
            BehaviorNodeContainer::new_subtree(parent.ty, params, blackboard_map, root);
        if !name.is_empty() {
            subtree = subtree.with_name(name);
        }
        subtree
    };

    let scope_vars = vars.len();
    vars.extend(parent.vars.iter().map(|var| var.name));
    for child in &parent.children {
        let child_node = load_recurse(child, registry, tree_source, parent_stack, vars)?;
        ret.add_child(child_node)
            .map_err(|e| LoadError::AddChildError(e, parent.ty.to_string()))?;
    }
    vars.truncate(scope_vars);

    Ok(ret)
}

/// Port mappings of the text format as bindings. A quoted `"{key}"` refers to `key`.
fn port_bindings(port_maps: &[PortMap]) -> BBMap {
    port_maps
        .iter()
        .map(|entry| {
            let value = match &entry.value {
                ValueDef::Ref(key) => BlackboardValue::Ref((*key).into(), entry.ty),
                ValueDef::Literal(text) => match BlackboardValue::parse_binding(text) {
                    BlackboardValue::Ref(key, _) => BlackboardValue::Ref(key, entry.ty),
                    literal => literal,
                },
            };
            (entry.node_port.into(), value)
        })
        .collect()
}

#[cfg(test)]
mod test;
