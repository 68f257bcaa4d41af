use crate::context::{estimate_tokens, find_valid_trim_index, is_valid_trim_index};
use crate::error::ConversationError;
use crate::manager::{
    ConversationManager, ManagerState, base_state, cause_or_overflow, restore_base_state,
};
use crate::types::{Message, TokenBudgetConfig};
use serde_json::Value;

const MIN_RETAINED_MESSAGES: usize = 2;

/// Prunes the oldest messages once the estimated token count exceeds `max_tokens`.
#[derive(Debug, Clone, Default)]
pub struct TokenBudgetConversationManager {
    config: TokenBudgetConfig,
    removed_message_count: usize,
    current_tokens: usize,
}

impl TokenBudgetConversationManager {
    pub const NAME: &'static str = "TokenBudgetConversationManager";

    pub fn new(config: TokenBudgetConfig) -> Self {
        tracing::debug!(max_tokens = config.max_tokens, "initialized conversation manager");
        Self {
            config,
            removed_message_count: 0,
            current_tokens: 0,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.config.max_tokens
    }

    /// Estimate recorded by the last management pass.
    pub fn current_tokens(&self) -> usize {
        self.current_tokens
    }

    /// Remove the fewest leading messages that bring the estimate to `budget`,
    /// keeping at least two. The cut moves forward to the next valid trim
    /// index; when that would leave fewer than two messages it falls back to
    /// the latest valid index that still keeps two, trimming less than the
    /// budget asks for.
    fn trim_to_budget(&mut self, messages: &mut Vec<Message>, budget: usize) -> usize {
        let mut remaining_tokens = estimate_tokens(messages);
        let mut target = 0usize;

        while remaining_tokens > budget && messages.len() - target > MIN_RETAINED_MESSAGES {
            remaining_tokens -= estimate_tokens(std::slice::from_ref(&messages[target]));
            target += 1;
        }

        if target == 0 {
            return 0;
        }

        let limit = messages.len().saturating_sub(MIN_RETAINED_MESSAGES);
        let trim_index = match find_valid_trim_index(messages, target) {
            Some(index) if index <= limit => index,
            _ => (1..=limit)
                .rev()
                .find(|&index| is_valid_trim_index(messages, index))
                .unwrap_or(0),
        };

        if trim_index > 0 {
            messages.drain(..trim_index);
            self.removed_message_count += trim_index;
        }

        trim_index
    }
}

impl ConversationManager for TokenBudgetConversationManager {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn removed_message_count(&self) -> usize {
        self.removed_message_count
    }

    fn apply_management(&mut self, messages: &mut Vec<Message>) -> Result<(), ConversationError> {
        self.current_tokens = estimate_tokens(messages);

        if self.current_tokens <= self.config.max_tokens {
            tracing::debug!(
                current_tokens = self.current_tokens,
                max_tokens = self.config.max_tokens,
                "no management needed"
            );
            return Ok(());
        }

        let trimmed = self.trim_to_budget(messages, self.config.max_tokens);
        self.current_tokens = estimate_tokens(messages);

        if trimmed > 0 {
            tracing::info!(
                trimmed_count = trimmed,
                remaining = messages.len(),
                current_tokens = self.current_tokens,
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

        let trimmed = self.trim_to_budget(messages, self.config.max_tokens / 2);
        self.current_tokens = estimate_tokens(messages);

        if self.current_tokens > self.config.max_tokens {
            if messages.len() <= MIN_RETAINED_MESSAGES {
                return Err(cause_or_overflow(cause, "cannot reduce context further"));
            }
            if trimmed == 0 {
                return Err(cause_or_overflow(
                    cause,
                    "unable to find valid trim point for context reduction",
                ));
            }
        }

        tracing::info!(
            trimmed_count = trimmed,
            remaining = messages.len(),
            current_tokens = self.current_tokens,
            "reduced context"
        );

        Ok(())
    }

    fn get_state(&self) -> ManagerState {
        let mut state = base_state(Self::NAME, self.removed_message_count);
        state.insert(
            "current_tokens".to_string(),
            Value::from(self.current_tokens),
        );
        state
    }

    fn restore_from_session(
        &mut self,
        state: &ManagerState,
    ) -> Result<Option<Vec<Message>>, ConversationError> {
        self.removed_message_count = restore_base_state(Self::NAME, state)?;
        self.current_tokens = state
            .get("current_tokens")
            .and_then(Value::as_u64)
            .map_or(0, |tokens| tokens as usize);
        Ok(None)
    }
}
