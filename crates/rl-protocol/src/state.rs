//! Lock state snapshot

use serde::{Deserialize, Serialize};

/// Message shown on the lock surface until an operator replaces it
pub const DEFAULT_LOCK_MESSAGE: &str =
    "⚠️ System Error Detected\n\nPlease contact your System Administrator\nto resolve this issue.";

/// The server-authoritative lock state.
///
/// Values of this type are immutable snapshots: the server swaps whole
/// instances and never hands out a mutable reference to the live one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockState {
    /// Whether the lock surface should be up
    pub locked: bool,
    /// Text shown on the lock surface
    pub message: String,
    /// When the last lock/unlock transition happened (ms since the Unix epoch)
    pub triggered_at: Option<u64>,
    /// Who triggered the last transition
    pub triggered_by: Option<String>,
}

impl Default for LockState {
    fn default() -> Self {
        Self {
            locked: false,
            message: DEFAULT_LOCK_MESSAGE.to_string(),
            triggered_at: None,
            triggered_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unlocked() {
        let state = LockState::default();
        assert!(!state.locked);
        assert_eq!(state.message, DEFAULT_LOCK_MESSAGE);
        assert!(state.triggered_at.is_none());
    }

    #[test]
    fn test_camel_case_fields() {
        let state = LockState {
            locked: true,
            message: "m".to_string(),
            triggered_at: Some(42),
            triggered_by: Some("127.0.0.1:5000".to_string()),
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["triggeredAt"], 42);
        assert_eq!(value["triggeredBy"], "127.0.0.1:5000");
    }

    #[test]
    fn test_null_optionals_decode() {
        let json = r#"{"locked":false,"message":"x","triggeredAt":null,"triggeredBy":null}"#;
        let state: LockState = serde_json::from_str(json).unwrap();
        assert!(!state.locked);
        assert!(state.triggered_by.is_none());
    }
}
