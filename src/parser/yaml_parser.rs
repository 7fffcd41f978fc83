//! Trees described in YAML.
//!
//! ```yaml
//! behavior_tree:
//!   main:
//!     type: Sequence
//!     children:
//!       - type: SetBool
//!         ports:
//!           value: true
//!           output: "{flag}"
//!       - type: IsTrue
//!         name: check flag
//!         ports:
//!           input: "{flag}"
//! ```
//!
//! Port values are read the same way as [`BlackboardValue::parse_binding`]: `"{key}"` refers to a
//! blackboard key, anything else is a literal. Numbers and booleans are taken as their literal
//! text.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{LoadError, LoadYamlError},
    BBMap, BehaviorNodeContainer, BlackboardValue, Registry, Tree,
};

#[derive(Debug, Deserialize)]
struct YamlSource {
    behavior_tree: Option<BTreeMap<String, YamlNode>>,
}

#[derive(Debug, Deserialize)]
struct YamlNode {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ports: BTreeMap<String, PortValue>,
    #[serde(default)]
    children: Vec<YamlNode>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Text(String),
    Number(serde_yaml::Number),
    Bool(bool),
}

impl PortValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
            Self::Bool(value) => value.to_string(),
        }
    }
}

fn build_node(node: YamlNode, registry: &Registry) -> Result<BehaviorNodeContainer, LoadError> {
    let blackboard_map: BBMap = node
        .ports
        .into_iter()
        .map(|(port, value)| {
            (
                port.as_str().into(),
                BlackboardValue::parse_binding(&value.into_text()),
            )
        })
        .collect();

    let mut ret = registry
        .build_named(
            &node.ty,
            node.name.as_deref().unwrap_or_default(),
            blackboard_map,
        )
        .ok_or_else(|| LoadError::MissingNode(node.ty.clone()))?;

    for child in node.children {
        let child = build_node(child, registry)?;
        ret.add_child(child)
            .map_err(|e| LoadError::AddChildError(e, node.ty.clone()))?;
    }
    Ok(ret)
}

/// Loads every tree of the `behavior_tree` map of a YAML document, keyed by tree name.
pub fn load_yaml(
    yaml: &str,
    registry: &Registry,
    check_ports: bool,
) -> Result<HashMap<String, Tree>, LoadYamlError> {
    let source: YamlSource = serde_yaml::from_str(yaml)?;
    let roots = source.behavior_tree.ok_or(LoadYamlError::Missing)?;

    roots
        .into_iter()
        .map(|(name, root)| -> Result<(String, Tree), LoadYamlError> {
            let root = build_node(root, registry)?;
            let tree = Tree::build(root, registry, check_ports)?;
            debug!(tree = %name, nodes = tree.len(), "loaded yaml tree");
            Ok((name, tree))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::NodeStatus;

    #[test]
    fn loads_named_trees() {
        let yaml = r#"
behavior_tree:
  main:
    type: Sequence
    children:
      - type: SetBool
        ports:
          value: true
          output: "{flag}"
      - type: IsTrue
        name: check flag
        ports:
          input: "{flag}"
  other:
    type: Repeat
    ports:
      n: 3
    children:
      - type: AlwaysSuccess
"#;
        let mut trees = load_yaml(yaml, &Registry::default(), true).unwrap();
        assert_eq!(trees.len(), 2);

        let main = trees.get_mut("main").unwrap();
        assert_eq!(main.tick(&mut |_| None), Ok(NodeStatus::Success));
        assert_eq!(main.get::<bool>("flag"), Some(&true));
        assert!(main.find("check flag").is_some());

        let other = trees.get_mut("other").unwrap();
        assert_eq!(other.tick(&mut |_| None), Ok(NodeStatus::Success));
    }

    #[test]
    fn errors() {
        let registry = Registry::default();
        assert!(matches!(
            load_yaml("nodes: {}", &registry, true),
            Err(LoadYamlError::Missing)
        ));
        assert!(matches!(
            load_yaml("behavior_tree: [", &registry, true),
            Err(LoadYamlError::Yaml(_))
        ));
        assert!(matches!(
            load_yaml(
                "behavior_tree:\n  main:\n    type: Nope\n",
                &registry,
                true
            ),
            Err(LoadYamlError::Load(LoadError::MissingNode(name))) if name == "Nope"
        ));
        assert!(matches!(
            load_yaml(
                "behavior_tree:\n  main:\n    type: Repeat\n",
                &registry,
                true
            ),
            Err(LoadYamlError::Load(LoadError::MissingPort { .. }))
        ));
    }
}
