//! On-disk form of a managed conversation.
//!
//! A checkpoint holds the messages left after management together with the
//! state of the manager that trimmed them, so the next run continues the same
//! counters. Unversioned input is read as a hand-written transcript: either a
//! bare message array or an object holding `messages`.

use crate::manager::{ManagerState, REMOVED_MESSAGE_COUNT_KEY, STATE_NAME_KEY};
use crate::types::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub const CHECKPOINT_VERSION_V1: u16 = 1;
pub const CHECKPOINT_FORMAT_V1: &str = "threadkeeper_transcript_v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEnvelopeV1 {
    pub version: u16,
    pub format: String,
    pub session_id: Option<Uuid>,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_state: Option<ManagerState>,
}

impl CheckpointEnvelopeV1 {
    pub fn new(
        session_id: Option<Uuid>,
        messages: Vec<Message>,
        manager_state: Option<ManagerState>,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION_V1,
            format: CHECKPOINT_FORMAT_V1.to_string(),
            session_id,
            messages,
            manager_state,
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("invalid checkpoint payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("payload is neither a checkpoint nor a transcript (no `version` or `messages`)")]
    UnrecognizedLayout,

    /// Carries the raw `version` value so out-of-range numbers are reported as written.
    #[error("unsupported checkpoint version: {0}")]
    UnsupportedVersion(Value),

    #[error("unsupported checkpoint format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid manager state in checkpoint: {0}")]
    InvalidManagerState(String),
}

/// Unversioned transcript as people write it by hand.
#[derive(Debug, Deserialize)]
struct Transcript {
    #[serde(default)]
    session_id: Option<Uuid>,
    messages: Vec<Message>,
    #[serde(default)]
    manager_state: Option<ManagerState>,
}

pub fn serialize_checkpoint(envelope: &CheckpointEnvelopeV1) -> Result<Vec<u8>, CheckpointError> {
    serde_json::to_vec_pretty(envelope).map_err(CheckpointError::InvalidPayload)
}

pub fn deserialize_checkpoint(payload: &[u8]) -> Result<CheckpointEnvelopeV1, CheckpointError> {
    let value: Value = serde_json::from_slice(payload)?;

    let envelope = match value.get("version").cloned() {
        None => read_transcript(value)?,
        Some(version) if version.as_u64() == Some(u64::from(CHECKPOINT_VERSION_V1)) => {
            let envelope: CheckpointEnvelopeV1 = serde_json::from_value(value)?;
            if envelope.format != CHECKPOINT_FORMAT_V1 {
                return Err(CheckpointError::UnsupportedFormat(envelope.format));
            }
            envelope
        }
        Some(version) => return Err(CheckpointError::UnsupportedVersion(version)),
    };

    if let Some(state) = &envelope.manager_state {
        check_manager_state(state)?;
    }

    Ok(envelope)
}

fn read_transcript(value: Value) -> Result<CheckpointEnvelopeV1, CheckpointError> {
    let transcript = if value.is_array() {
        Transcript {
            session_id: None,
            messages: serde_json::from_value(value)?,
            manager_state: None,
        }
    } else if value.get("messages").is_some() {
        serde_json::from_value(value)?
    } else {
        return Err(CheckpointError::UnrecognizedLayout);
    };

    tracing::debug!(
        message_count = transcript.messages.len(),
        has_manager_state = transcript.manager_state.is_some(),
        "read unversioned transcript"
    );

    Ok(CheckpointEnvelopeV1::new(
        transcript.session_id,
        transcript.messages,
        transcript.manager_state,
    ))
}

// Managers reject a mismatched name on restore; a state without a name or
// count cannot belong to any of them.
fn check_manager_state(state: &ManagerState) -> Result<(), CheckpointError> {
    if !state.get(STATE_NAME_KEY).is_some_and(Value::is_string) {
        return Err(CheckpointError::InvalidManagerState(format!(
            "`{STATE_NAME_KEY}` must name the manager"
        )));
    }

    if !state.get(REMOVED_MESSAGE_COUNT_KEY).is_some_and(Value::is_u64) {
        return Err(CheckpointError::InvalidManagerState(format!(
            "`{REMOVED_MESSAGE_COUNT_KEY}` must be a non-negative integer"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::base_state;
    use crate::types::Role;
    use serde_json::json;
    use test_case::test_case;

    fn error_message(payload: Value) -> Option<String> {
        deserialize_checkpoint(payload.to_string().as_bytes())
            .err()
            .map(|e| e.to_string())
    }

    #[test]
    fn written_checkpoint_reads_back() {
        let envelope = CheckpointEnvelopeV1::new(
            Some(Uuid::new_v4()),
            vec![Message::new(Role::User, "hello")],
            Some(base_state("SlidingWindowConversationManager", 3)),
        );

        let payload = match serialize_checkpoint(&envelope) {
            Ok(payload) => payload,
            Err(error) => panic!("serialization should succeed, got: {error}"),
        };

        match deserialize_checkpoint(&payload) {
            Ok(parsed) => {
                assert_eq!(parsed.session_id, envelope.session_id);
                assert_eq!(parsed.manager_state, envelope.manager_state);
                assert_eq!(parsed.messages, envelope.messages);
            }
            Err(error) => panic!("deserialization should succeed, got: {error}"),
        }
    }

    #[test]
    fn reads_bare_message_array() {
        let payload = json!([{"role": "user", "content": "bare"}]);

        let envelope = match deserialize_checkpoint(payload.to_string().as_bytes()) {
            Ok(envelope) => envelope,
            Err(error) => panic!("bare transcript should be accepted: {error}"),
        };

        assert_eq!(envelope.version, CHECKPOINT_VERSION_V1);
        assert_eq!(envelope.format, CHECKPOINT_FORMAT_V1);
        assert_eq!(envelope.session_id, None);
        assert!(envelope.manager_state.is_none());
        assert_eq!(
            envelope.messages.first().and_then(Message::text),
            Some("bare".to_string())
        );
    }

    #[test]
    fn reads_transcript_object_with_session_and_state() {
        let session_id = Uuid::new_v4();
        let payload = json!({
            "session_id": session_id,
            "messages": [{"role": "assistant", "content": "bare object"}],
            "manager_state": {"__name__": "NullConversationManager", "removed_message_count": 0}
        });

        let envelope = match deserialize_checkpoint(payload.to_string().as_bytes()) {
            Ok(envelope) => envelope,
            Err(error) => panic!("transcript object should be accepted: {error}"),
        };

        assert_eq!(envelope.session_id, Some(session_id));
        assert_eq!(
            envelope
                .manager_state
                .as_ref()
                .and_then(|state| state.get(STATE_NAME_KEY)),
            Some(&json!("NullConversationManager"))
        );
    }

    #[test]
    fn malformed_message_in_bare_array_reports_the_cause() {
        let message = error_message(json!([{"role": "user", "content": 42}]));

        assert!(
            message.as_deref().is_some_and(|message| message
                .starts_with("invalid checkpoint payload:")
                && message.contains("message content must be a string or an array of parts")),
            "got: {message:?}"
        );
    }

    #[test]
    fn malformed_session_id_in_transcript_object_is_rejected() {
        let message = error_message(json!({"session_id": "not-a-uuid", "messages": []}));

        assert!(
            message
                .as_deref()
                .is_some_and(|message| message.starts_with("invalid checkpoint payload:"))
        );
    }

    #[test_case(json!({"format": CHECKPOINT_FORMAT_V1}), "payload is neither a checkpoint nor a transcript (no `version` or `messages`)" ; "object without version or messages")]
    #[test_case(json!("hello"), "payload is neither a checkpoint nor a transcript (no `version` or `messages`)" ; "json string")]
    #[test_case(json!({"version": 2, "format": CHECKPOINT_FORMAT_V1, "messages": []}), "unsupported checkpoint version: 2" ; "newer version")]
    #[test_case(json!({"version": 70000, "format": CHECKPOINT_FORMAT_V1, "messages": []}), "unsupported checkpoint version: 70000" ; "version past u16")]
    #[test_case(json!({"version": "1", "format": CHECKPOINT_FORMAT_V1, "messages": []}), "unsupported checkpoint version: \"1\"" ; "version as string")]
    #[test_case(json!({"version": 1, "format": "legacy", "session_id": null, "messages": []}), "unsupported checkpoint format: legacy" ; "unknown format")]
    fn rejects_unreadable_payloads(payload: Value, expected: &str) {
        assert_eq!(error_message(payload), Some(expected.to_string()));
    }

    #[test_case(json!({"removed_message_count": 1}), "`__name__` must name the manager" ; "missing name")]
    #[test_case(json!({"__name__": "SlidingWindowConversationManager", "removed_message_count": -1}), "`removed_message_count` must be a non-negative integer" ; "negative count")]
    fn rejects_manager_state_no_manager_could_restore(state: Value, reason: &str) {
        let versioned = json!({
            "version": 1,
            "format": CHECKPOINT_FORMAT_V1,
            "session_id": null,
            "messages": [],
            "manager_state": state.clone(),
        });
        let transcript = json!({"messages": [], "manager_state": state});

        let expected = Some(format!("invalid manager state in checkpoint: {reason}"));
        assert_eq!(error_message(versioned), expected);
        assert_eq!(error_message(transcript), expected);
    }
}
