use crate::context::{find_valid_trim_index, leading_system_len};
use crate::error::ConversationError;
use crate::manager::{
    ConversationManager, ManagerState, base_state, cause_or_overflow, restore_base_state,
};
use crate::types::{Message, SlidingWindowConfig};
use serde_json::{Map, Value};

const MINIMAL_CONVERSATION_LEN: usize = 2;

/// Keeps the most recent `max_messages` messages.
///
/// With `preserve_important`, the leading run of system messages is pinned:
/// it still counts towards the window but is never trimmed.
#[derive(Debug, Clone, Default)]
pub struct SlidingWindowConversationManager {
    config: SlidingWindowConfig,
    removed_message_count: usize,
    custom_state: Map<String, Value>,
}

impl SlidingWindowConversationManager {
    pub const NAME: &'static str = "SlidingWindowConversationManager";

    pub fn new(config: SlidingWindowConfig) -> Self {
        tracing::debug!(
            max_messages = config.max_messages,
            preserve_important = config.preserve_important,
            "initialized conversation manager"
        );
        Self {
            config,
            removed_message_count: 0,
            custom_state: Map::new(),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.config.max_messages
    }

    pub fn preserve_important(&self) -> bool {
        self.config.preserve_important
    }

    pub fn custom_state(&self) -> &Map<String, Value> {
        &self.custom_state
    }

    pub fn custom_state_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.custom_state
    }

    fn pinned_len(&self, messages: &[Message]) -> usize {
        if self.config.preserve_important {
            leading_system_len(messages)
        } else {
            0
        }
    }

    /// Drop up to a valid trim point at or after `target` messages past the
    /// pinned prefix. Returns how many messages were removed.
    fn trim_from(&mut self, messages: &mut Vec<Message>, pinned: usize, target: usize) -> usize {
        let trim_index = messages
            .get(pinned..)
            .and_then(|unpinned| find_valid_trim_index(unpinned, target))
            .unwrap_or(0);

        if trim_index > 0 {
            messages.drain(pinned..pinned + trim_index);
            self.removed_message_count += trim_index;
        }

        trim_index
    }
}

impl ConversationManager for SlidingWindowConversationManager {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn removed_message_count(&self) -> usize {
        self.removed_message_count
    }

    fn apply_management(&mut self, messages: &mut Vec<Message>) -> Result<(), ConversationError> {
        if messages.len() <= self.config.max_messages {
            tracing::debug!(
                message_count = messages.len(),
                max_messages = self.config.max_messages,
                "no management needed"
            );
            return Ok(());
        }

        let excess = messages.len() - self.config.max_messages;
        let pinned = self.pinned_len(messages);
        let trimmed = self.trim_from(messages, pinned, excess);

        if trimmed > 0 {
            tracing::info!(
                trimmed_count = trimmed,
                remaining = messages.len(),
                "applied conversation management"
            );
        }

        Ok(())
    }

    fn reduce_context(
        &mut self,
        messages: &mut Vec<Message>,
        cause: Option<ConversationError>,
    ) -> Result<(), ConversationError> {
        tracing::warn!(
            message_count = messages.len(),
            "context overflow, attempting reduction"
        );

        if messages.len() <= MINIMAL_CONVERSATION_LEN {
            return Err(cause_or_overflow(
                cause,
                "cannot reduce context further, conversation is already minimal",
            ));
        }

        let pinned = self.pinned_len(messages);
        let target = (messages.len() - pinned) / 2;
        let trimmed = self.trim_from(messages, pinned, target);

        if trimmed == 0 {
            return Err(cause_or_overflow(
                cause,
                "unable to find valid trim point for context reduction",
            ));
        }

        tracing::info!(
            trimmed_count = trimmed,
            remaining = messages.len(),
            "reduced context"
        );

        Ok(())
    }

    fn get_state(&self) -> ManagerState {
        let mut state = base_state(Self::NAME, self.removed_message_count);
        state.insert(
            "max_messages".to_string(),
            Value::from(self.config.max_messages),
        );
        state.insert(
            "preserve_important".to_string(),
            Value::from(self.config.preserve_important),
        );
        state.insert(
            "custom_state".to_string(),
            Value::Object(self.custom_state.clone()),
        );
        state
    }

    fn restore_from_session(
        &mut self,
        state: &ManagerState,
    ) -> Result<Option<Vec<Message>>, ConversationError> {
        self.removed_message_count = restore_base_state(Self::NAME, state)?;

        // window size and pinning stay as constructed
        self.custom_state = match state.get("custom_state") {
            Some(Value::Object(custom)) => custom.clone(),
            _ => Map::new(),
        };

        Ok(None)
    }
}
