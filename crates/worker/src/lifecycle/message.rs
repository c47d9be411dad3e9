//! Messages posted to the worker by application instances.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate the waiting version now instead of on the next full reload.
    SkipWaiting,
}

impl WorkerMessage {
    /// Recognize a message payload; anything else is `None` and ignored.
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        match serde_json::from_value(payload.clone()) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognized worker message");
                None
            }
        }
    }
}
