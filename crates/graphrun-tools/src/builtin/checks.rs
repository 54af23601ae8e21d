use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use graphrun_core::error::Result;
use graphrun_core::traits::SuspendingCapability;
use graphrun_core::types::StateMap;

use super::parse_input;

pub struct LongRunningCheck;

#[derive(Deserialize)]
struct LongRunningCheckInput {
    #[serde(default = "default_delay_ms")]
    delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    200
}

impl SuspendingCapability for LongRunningCheck {
    fn name(&self) -> &str {
        "long_running_check"
    }
    fn description(&self) -> &str {
        "Wait `delay_ms` (default 200) then set `checked`."
    }
    fn call(&self, input: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            let p: LongRunningCheckInput = parse_input(input)?;
            debug!(delay_ms = p.delay_ms, "Running long check");
            tokio::time::sleep(Duration::from_millis(p.delay_ms)).await;
            let mut out = StateMap::new();
            out.insert("checked".into(), json!(true));
            Ok(Some(out))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrun_test_utils::state;

    #[tokio::test(start_paused = true)]
    async fn test_waits_then_marks_checked() {
        let started = tokio::time::Instant::now();
        let out = LongRunningCheck.call(StateMap::new()).await.unwrap().unwrap();
        assert_eq!(out["checked"], json!(true));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_delay() {
        let started = tokio::time::Instant::now();
        LongRunningCheck
            .call(state(json!({"delay_ms": 5})))
            .await
            .unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(5));
        assert!(elapsed < Duration::from_millis(200));
    }
}
