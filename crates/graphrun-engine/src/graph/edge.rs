use graphrun_core::graph::EdgeSpec;
use graphrun_core::types::StateMap;

use super::condition::evaluate_condition;

/// Why the interpreter stopped at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The node has no outgoing edge.
    NoEdge,
    /// No branch condition held, or the chosen target was empty.
    NoMatch,
    /// The edge is an explicit `null`.
    Explicit,
}

/// Outcome of resolving a node's outgoing edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(String),
    Stop(StopReason),
}

/// Resolve the next node from `edge` against the current state.
///
/// - bare name: unconditional
/// - branch list: first branch whose condition holds, in order
/// - `{cond, next, else}`: `next` if the condition holds, else `else`
///
/// Conditions fail closed, and a missing `cond` never holds.
pub fn resolve_edge(edge: Option<&EdgeSpec>, state: &StateMap) -> Transition {
    let target = match edge {
        None => return Transition::Stop(StopReason::NoEdge),
        Some(EdgeSpec::Stop) => return Transition::Stop(StopReason::Explicit),
        Some(EdgeSpec::Next(next)) => Some(next.as_str()),
        Some(EdgeSpec::Branches(branches)) => branches
            .iter()
            .find(|b| holds(b.cond.as_deref(), state))
            .and_then(|b| b.next.as_deref()),
        Some(EdgeSpec::Conditional(c)) => {
            if holds(c.cond.as_deref(), state) {
                c.next.as_deref()
            } else {
                c.otherwise.as_deref()
            }
        }
    };

    match target {
        Some(next) if !next.is_empty() => Transition::Next(next.to_string()),
        _ => Transition::Stop(StopReason::NoMatch),
    }
}

fn holds(cond: Option<&str>, state: &StateMap) -> bool {
    cond.is_some_and(|c| evaluate_condition(c, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrun_core::graph::{Branch, ConditionalEdge};
    use graphrun_test_utils::state;
    use serde_json::json;

    #[test]
    fn test_absent_edge_stops() {
        assert_eq!(
            resolve_edge(None, &StateMap::new()),
            Transition::Stop(StopReason::NoEdge)
        );
    }

    #[test]
    fn test_bare_name_ignores_state() {
        let edge = EdgeSpec::to("next");
        for s in [StateMap::new(), state(json!({"anything": false}))] {
            assert_eq!(
                resolve_edge(Some(&edge), &s),
                Transition::Next("next".into())
            );
        }
    }

    #[test]
    fn test_branches_first_true_wins() {
        let edge = EdgeSpec::branches([
            ("state['x'] > 10", "big"),
            ("state['x'] > 1", "medium"),
            ("True", "fallback"),
        ]);
        assert_eq!(
            resolve_edge(Some(&edge), &state(json!({"x": 5}))),
            Transition::Next("medium".into())
        );
        assert_eq!(
            resolve_edge(Some(&edge), &state(json!({"x": 50}))),
            Transition::Next("big".into())
        );
    }

    #[test]
    fn test_branches_none_true_stops() {
        let edge = EdgeSpec::branches([("state['x'] > 10", "big"), ("state['y']", "y")]);
        assert_eq!(
            resolve_edge(Some(&edge), &state(json!({"x": 1}))),
            Transition::Stop(StopReason::NoMatch)
        );
    }

    #[test]
    fn test_branch_without_cond_never_matches() {
        let edge = EdgeSpec::Branches(vec![
            Branch {
                cond: None,
                next: Some("skipped".into()),
            },
            Branch {
                cond: Some("true".into()),
                next: Some("taken".into()),
            },
        ]);
        assert_eq!(
            resolve_edge(Some(&edge), &StateMap::new()),
            Transition::Next("taken".into())
        );
    }

    #[test]
    fn test_conditional_with_else() {
        let edge = EdgeSpec::when("state['ok']", "yes", Some("no".into()));
        assert_eq!(
            resolve_edge(Some(&edge), &state(json!({"ok": true}))),
            Transition::Next("yes".into())
        );
        assert_eq!(
            resolve_edge(Some(&edge), &state(json!({"ok": false}))),
            Transition::Next("no".into())
        );
    }

    #[test]
    fn test_conditional_false_without_else_stops() {
        let edge = EdgeSpec::when("state['ok']", "yes", None);
        assert_eq!(
            resolve_edge(Some(&edge), &state(json!({"ok": false}))),
            Transition::Stop(StopReason::NoMatch)
        );
    }

    #[test]
    fn test_broken_condition_takes_else() {
        let edge = EdgeSpec::Conditional(ConditionalEdge {
            cond: Some("state['missing'] > 1".into()),
            next: Some("yes".into()),
            otherwise: Some("no".into()),
        });
        assert_eq!(
            resolve_edge(Some(&edge), &StateMap::new()),
            Transition::Next("no".into())
        );
    }

    #[test]
    fn test_explicit_stop_and_empty_target() {
        assert_eq!(
            resolve_edge(Some(&EdgeSpec::Stop), &StateMap::new()),
            Transition::Stop(StopReason::Explicit)
        );
        assert_eq!(
            resolve_edge(Some(&EdgeSpec::to("")), &StateMap::new()),
            Transition::Stop(StopReason::NoMatch)
        );
    }
}
