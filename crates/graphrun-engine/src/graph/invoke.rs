use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::FutureExt;

use graphrun_core::error::Result;
use graphrun_core::graph::NodeDef;
use graphrun_core::types::StateMap;
use graphrun_tools::Capability;

use super::state::RunState;

/// What a single node invocation did to the run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// A partial mapping with this many keys was merged.
    Merged(usize),
    /// The capability returned nothing.
    NoOutput,
    /// The capability failed; the message was recorded in `_errors`.
    Failed(String),
}

/// Invoke `capability` for `node` and fold the result into `state`.
///
/// The capability receives the full state, or only the node's config when
/// `pass_state` is false. Suspending capabilities are awaited to completion
/// before this returns. Errors and panics never propagate: they are recorded
/// under `_errors` and the run carries on.
pub async fn invoke_node(
    capability: &Capability,
    node: &NodeDef,
    state: &mut RunState,
) -> InvocationOutcome {
    let input = if node.passes_state() {
        state.data().clone()
    } else {
        node.config.clone()
    };

    let result = match capability {
        Capability::Direct(cap) => catch_unwind(AssertUnwindSafe(|| cap.call(input)))
            .unwrap_or_else(|payload| Err(panic_error(payload))),
        Capability::Suspending(cap) => AssertUnwindSafe(cap.call(input))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panic_error(payload))),
    };

    apply(result, state)
}

fn apply(result: Result<Option<StateMap>>, state: &mut RunState) -> InvocationOutcome {
    match result {
        Ok(Some(partial)) => {
            let n = partial.len();
            state.merge(partial);
            InvocationOutcome::Merged(n)
        }
        Ok(None) => InvocationOutcome::NoOutput,
        Err(e) => {
            let message = e.to_string();
            state.push_error(message.clone());
            InvocationOutcome::Failed(message)
        }
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> graphrun_core::GraphrunError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    graphrun_core::GraphrunError::invocation(format!("capability panicked: {}", detail))
}
