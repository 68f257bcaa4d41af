use crate::error::ConversationError;
use crate::types::Message;
use serde_json::{Map, Value};

pub const STATE_NAME_KEY: &str = "__name__";
pub const REMOVED_MESSAGE_COUNT_KEY: &str = "removed_message_count";

/// JSON object persisted alongside a session so a manager can be resumed.
pub type ManagerState = Map<String, Value>;

/// Keeps a conversation within bounds between agent cycles.
///
/// Implementations mutate the message list in place. Any trim they perform
/// must leave every tool result preceded by its tool call.
pub trait ConversationManager: Send + Sync {
    /// Tag written to `__name__`; a state is only restored by the manager that wrote it.
    fn name(&self) -> &'static str;

    fn removed_message_count(&self) -> usize;

    /// Soft cap, applied after every agent cycle.
    fn apply_management(&mut self, messages: &mut Vec<Message>) -> Result<(), ConversationError>;

    /// Hard recovery after the model rejected the context as too large.
    ///
    /// When nothing can be removed, `cause` is handed back if present,
    /// otherwise a [`ConversationError::ContextWindowOverflow`] is returned.
    fn reduce_context(
        &mut self,
        messages: &mut Vec<Message>,
        cause: Option<ConversationError>,
    ) -> Result<(), ConversationError>;

    fn get_state(&self) -> ManagerState;

    /// Restore from a state produced by [`ConversationManager::get_state`].
    ///
    /// Returns messages the caller should prepend to the conversation, if any.
    fn restore_from_session(
        &mut self,
        state: &ManagerState,
    ) -> Result<Option<Vec<Message>>, ConversationError>;
}

/// State fields shared by every manager.
pub fn base_state(name: &str, removed_message_count: usize) -> ManagerState {
    let mut state = Map::new();
    state.insert(STATE_NAME_KEY.to_string(), Value::from(name));
    state.insert(
        REMOVED_MESSAGE_COUNT_KEY.to_string(),
        Value::from(removed_message_count),
    );
    state
}

/// Validate the shared fields of `state` and return its removed message count.
pub fn restore_base_state(name: &str, state: &ManagerState) -> Result<usize, ConversationError> {
    let stored_name = state.get(STATE_NAME_KEY).and_then(Value::as_str);
    if stored_name != Some(name) {
        return Err(ConversationError::InvalidState(format!(
            "expected {name}, found {}",
            stored_name.unwrap_or("<missing>")
        )));
    }

    state
        .get(REMOVED_MESSAGE_COUNT_KEY)
        .and_then(Value::as_u64)
        .map(|count| count as usize)
        .ok_or_else(|| {
            ConversationError::InvalidState(format!("{REMOVED_MESSAGE_COUNT_KEY} is missing"))
        })
}

pub(crate) fn cause_or_overflow(
    cause: Option<ConversationError>,
    reason: &str,
) -> ConversationError {
    cause.unwrap_or_else(|| ConversationError::ContextWindowOverflow(reason.to_string()))
}

/// Leaves the conversation untouched and never recovers from overflow.
#[derive(Debug, Default)]
pub struct NullConversationManager;

impl NullConversationManager {
    pub const NAME: &'static str = "NullConversationManager";
}

impl ConversationManager for NullConversationManager {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn removed_message_count(&self) -> usize {
        0
    }

    fn apply_management(&mut self, _messages: &mut Vec<Message>) -> Result<(), ConversationError> {
        Ok(())
    }

    fn reduce_context(
        &mut self,
        _messages: &mut Vec<Message>,
        cause: Option<ConversationError>,
    ) -> Result<(), ConversationError> {
        Err(cause_or_overflow(
            cause,
            "context reduction is disabled for this conversation",
        ))
    }

    fn get_state(&self) -> ManagerState {
        base_state(Self::NAME, 0)
    }

    fn restore_from_session(
        &mut self,
        state: &ManagerState,
    ) -> Result<Option<Vec<Message>>, ConversationError> {
        restore_base_state(Self::NAME, state)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use serde_json::json;

    fn state_from(value: Value) -> ManagerState {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object state, got: {other}"),
        }
    }

    #[test]
    fn base_state_holds_name_and_count() {
        let state = base_state("SomeManager", 4);
        assert_eq!(state.get(STATE_NAME_KEY), Some(&json!("SomeManager")));
        assert_eq!(state.get(REMOVED_MESSAGE_COUNT_KEY), Some(&json!(4)));
    }

    #[test]
    fn restore_base_state_rejects_other_manager() {
        let state = state_from(json!({"__name__": "WrongManager", "removed_message_count": 0}));
        let result = restore_base_state("SomeManager", &state);
        assert!(matches!(result, Err(ConversationError::InvalidState(_))));
    }

    #[test]
    fn restore_base_state_requires_count() {
        let state = state_from(json!({"__name__": "SomeManager"}));
        let result = restore_base_state("SomeManager", &state);
        assert_eq!(
            result.err().map(|e| e.to_string()),
            Some("invalid conversation manager state: removed_message_count is missing".into())
        );
    }

    #[test]
    fn null_manager_leaves_messages_alone() {
        let mut manager = NullConversationManager;
        let mut messages = vec![
            Message::new(Role::User, "hello"),
            Message::new(Role::Assistant, "hi"),
        ];

        if let Err(error) = manager.apply_management(&mut messages) {
            panic!("apply should be a no-op, got: {error}");
        }
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn null_manager_reduce_hands_back_cause() {
        let mut manager = NullConversationManager;
        let mut messages = vec![Message::new(Role::User, "hello")];

        let result = manager.reduce_context(
            &mut messages,
            Some(ConversationError::Other("model said too long".into())),
        );
        assert_eq!(
            result.err().map(|e| e.to_string()),
            Some("model said too long".to_string())
        );

        let result = manager.reduce_context(&mut messages, None);
        assert!(matches!(
            result,
            Err(ConversationError::ContextWindowOverflow(_))
        ));
    }

    #[test]
    fn null_manager_state_roundtrips() {
        let mut manager = NullConversationManager;
        let state = manager.get_state();
        match manager.restore_from_session(&state) {
            Ok(prepend) => assert!(prepend.is_none()),
            Err(error) => panic!("own state should restore, got: {error}"),
        }
    }
}
