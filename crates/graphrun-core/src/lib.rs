pub mod config;
pub mod error;
pub mod graph;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{GraphrunError, Result};
pub use graph::{Branch, ConditionalEdge, EdgeSpec, Graph, GraphDefinition, NodeDef};
pub use types::*;
