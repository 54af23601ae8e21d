use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The open key/value working memory threaded through a run.
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// Reserved state key collecting messages from failed capability invocations.
pub const ERRORS_KEY: &str = "_errors";

/// Unique graph identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub String);

impl GraphId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a run: `pending -> running -> {finished | failed | error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    /// No next node could be determined while steps remained under budget.
    Finished,
    /// The step budget ran out before a natural stop.
    Failed,
    /// Structural failure: missing graph, node, or capability.
    Error,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Error)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Finished | Self::Failed | Self::Error => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the monotonic lifecycle.
    /// Re-applying the current status is allowed; leaving a terminal status is not.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        self == next || next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution instance of a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub graph_id: GraphId,
    pub state: StateMap,
    pub status: RunStatus,
    /// Append-only, human-readable event log.
    pub log: Vec<String>,
    /// Last node the interpreter entered.
    #[serde(default)]
    pub current_node: Option<String>,
    /// Number of node executions so far.
    #[serde(default)]
    pub steps: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn new(graph_id: GraphId, initial_state: StateMap) -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::new(),
            graph_id,
            state: initial_state,
            status: RunStatus::Pending,
            log: Vec::new(),
            current_node: None,
            steps: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Messages collected from failed capability invocations.
    pub fn errors(&self) -> Vec<&str> {
        self.state
            .get(ERRORS_KEY)
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            graph_id: self.graph_id.clone(),
            status: self.status,
            steps: self.steps,
        }
    }
}

/// Compact view of a run for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub graph_id: GraphId,
    pub status: RunStatus,
    pub steps: usize,
}

/// Fields to merge into a run record. Unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct RunUpdate {
    pub status: Option<RunStatus>,
    pub state: Option<StateMap>,
    pub current_node: Option<String>,
    pub steps: Option<usize>,
}

impl RunUpdate {
    pub fn status(status: RunStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn state(state: StateMap) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn with_current_node(mut self, node: impl Into<String>) -> Self {
        self.current_node = Some(node.into());
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.state.is_none()
            && self.current_node.is_none()
            && self.steps.is_none()
    }
}

/// Truthiness of a JSON value: null, false, 0, "", [] and {} are false.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
