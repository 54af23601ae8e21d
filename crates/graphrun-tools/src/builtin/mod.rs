pub mod checks;
pub mod review;

use serde::de::DeserializeOwned;

use graphrun_core::error::{GraphrunError, Result};
use graphrun_core::types::StateMap;

/// Deserialize a capability's input mapping into its typed parameters.
pub(crate) fn parse_input<T: DeserializeOwned>(input: StateMap) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(input))
        .map_err(|e| GraphrunError::InvalidInput(e.to_string()))
}
