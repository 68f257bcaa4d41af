//! Conversation manager selection.

use serde::{Deserialize, Serialize};
use threadkeeper_core::{
    ConversationManager, NullConversationManager, SlidingWindowConfig,
    SlidingWindowConversationManager, TokenBudgetConfig, TokenBudgetConversationManager,
};

/// Which conversation manager trims the transcript.
#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ManagerStrategy {
    /// Keep the most recent messages
    #[default]
    SlidingWindow,
    /// Keep the transcript under an estimated token budget
    TokenBudget,
    /// Never trim
    Null,
}

/// The `[manager]` table of the config file.
#[derive(Default, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    pub strategy: ManagerStrategy,
    pub sliding_window: SlidingWindowConfig,
    pub token_budget: TokenBudgetConfig,
}

impl ManagerConfig {
    pub fn build(&self) -> Box<dyn ConversationManager> {
        match self.strategy {
            ManagerStrategy::SlidingWindow => Box::new(SlidingWindowConversationManager::new(
                self.sliding_window.clone(),
            )),
            ManagerStrategy::TokenBudget => Box::new(TokenBudgetConversationManager::new(
                self.token_budget.clone(),
            )),
            ManagerStrategy::Null => Box::new(NullConversationManager),
        }
    }
}
