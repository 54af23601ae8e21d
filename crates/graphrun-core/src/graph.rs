use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{is_truthy, StateMap};

/// Default step budget for graphs that do not declare one.
pub const DEFAULT_MAX_STEPS: usize = 500;

/// A node in the graph: a display label bound to a capability name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    /// Human-readable name.
    pub name: String,
    /// Capability name resolved through the registry at execution time.
    pub func: String,
    /// Passed to the capability when `pass_state` is false; also carries invocation flags.
    #[serde(default)]
    pub config: StateMap,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, func: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            func: func.into(),
            config: StateMap::new(),
        }
    }

    /// Set a config entry.
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Whether the capability receives the full run state (`pass_state`, default true)
    /// rather than only this node's config.
    pub fn passes_state(&self) -> bool {
        self.config.get("pass_state").map_or(true, is_truthy)
    }
}

/// One `{cond, next}` entry of a branch list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Missing condition never matches.
    #[serde(default)]
    pub cond: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

/// A single `{cond, next, else}` edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalEdge {
    #[serde(default)]
    pub cond: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<String>,
}

/// Transition rule out of a node.
///
/// Deserializes from a bare node name, a list of branches, a single
/// `{cond, next, else}` object, or `null` (explicit stop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeSpec {
    Next(String),
    Branches(Vec<Branch>),
    Conditional(ConditionalEdge),
    Stop,
}

impl EdgeSpec {
    /// Unconditional transition.
    pub fn to(next: impl Into<String>) -> Self {
        Self::Next(next.into())
    }

    /// `next` when `cond` holds, otherwise `otherwise`.
    pub fn when(
        cond: impl Into<String>,
        next: impl Into<String>,
        otherwise: Option<String>,
    ) -> Self {
        Self::Conditional(ConditionalEdge {
            cond: Some(cond.into()),
            next: Some(next.into()),
            otherwise,
        })
    }

    /// Ordered branch list built from `(cond, next)` pairs.
    pub fn branches<I, C, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, N)>,
        C: Into<String>,
        N: Into<String>,
    {
        Self::Branches(
            pairs
                .into_iter()
                .map(|(cond, next)| Branch {
                    cond: Some(cond.into()),
                    next: Some(next.into()),
                })
                .collect(),
        )
    }
}

/// Graph creation request as accepted at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub nodes: HashMap<String, NodeDef>,
    #[serde(default)]
    pub edges: HashMap<String, EdgeSpec>,
    pub entrypoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
}

impl GraphDefinition {
    pub fn new(entrypoint: impl Into<String>) -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entrypoint: entrypoint.into(),
            max_steps: None,
        }
    }

    /// Add a node keyed by `key`.
    pub fn node(mut self, key: impl Into<String>, node: NodeDef) -> Self {
        self.nodes.insert(key.into(), node);
        self
    }

    /// Set the outgoing edge of `from`.
    pub fn edge(mut self, from: impl Into<String>, edge: EdgeSpec) -> Self {
        self.edges.insert(from.into(), edge);
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Freeze into a stored graph. A missing or zero `max_steps` takes `default_max_steps`.
    pub fn into_graph(self, default_max_steps: usize) -> Graph {
        let max_steps = self
            .max_steps
            .filter(|n| *n > 0)
            .unwrap_or(default_max_steps.max(1));
        Graph {
            nodes: self.nodes,
            edges: self.edges,
            entrypoint: self.entrypoint,
            max_steps,
        }
    }
}

/// Immutable workflow definition. The entrypoint is not checked against `nodes`
/// here; a missing entrypoint fails the first step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: HashMap<String, NodeDef>,
    pub edges: HashMap<String, EdgeSpec>,
    pub entrypoint: String,
    pub max_steps: usize,
}

impl Graph {
    pub fn node(&self, key: &str) -> Option<&NodeDef> {
        self.nodes.get(key)
    }

    pub fn edge(&self, from: &str) -> Option<&EdgeSpec> {
        self.edges.get(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edge_shapes_deserialize() {
        let bare: EdgeSpec = serde_json::from_value(json!("b")).unwrap();
        assert_eq!(bare, EdgeSpec::to("b"));

        let list: EdgeSpec = serde_json::from_value(json!([
            {"cond": "state['x'] > 1", "next": "big"},
            {"cond": "True", "next": "small"}
        ]))
        .unwrap();
        match list {
            EdgeSpec::Branches(branches) => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[1].next.as_deref(), Some("small"));
            }
            other => panic!("expected branches, got {:?}", other),
        }

        let cond: EdgeSpec =
            serde_json::from_value(json!({"cond": "state['ok']", "next": "a", "else": "b"}))
                .unwrap();
        match cond {
            EdgeSpec::Conditional(c) => {
                assert_eq!(c.next.as_deref(), Some("a"));
                assert_eq!(c.otherwise.as_deref(), Some("b"));
            }
            other => panic!("expected conditional, got {:?}", other),
        }

        let stop: EdgeSpec = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(stop, EdgeSpec::Stop);
    }

    #[test]
    fn test_pass_state_flag() {
        let node = NodeDef::new("Check", "long_running_check");
        assert!(node.passes_state());

        let node = node.with_config("pass_state", json!(false));
        assert!(!node.passes_state());
    }

    #[test]
    fn test_definition_from_request_json() {
        let def: GraphDefinition = serde_json::from_value(json!({
            "nodes": {
                "smells": {"name": "Detect", "func": "detect_smells"},
                "check": {"name": "Check", "func": "long_running_check", "config": {"pass_state": false}}
            },
            "edges": {"smells": "check"},
            "entrypoint": "smells"
        }))
        .unwrap();

        assert_eq!(def.nodes.len(), 2);
        assert!(def.nodes["smells"].config.is_empty());
        assert!(!def.nodes["check"].passes_state());

        let graph = def.into_graph(DEFAULT_MAX_STEPS);
        assert_eq!(graph.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(graph.edge("smells"), Some(&EdgeSpec::to("check")));
        assert!(graph.edge("check").is_none());
    }

    #[test]
    fn test_zero_max_steps_takes_default() {
        let graph = GraphDefinition::new("a").max_steps(0).into_graph(42);
        assert_eq!(graph.max_steps, 42);

        let graph = GraphDefinition::new("a").max_steps(5).into_graph(42);
        assert_eq!(graph.max_steps, 5);
    }
}
