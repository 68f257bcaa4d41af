pub mod checkpoint;
pub mod context;
pub mod error;
pub mod manager;
pub mod sliding_window;
pub mod token_budget;
pub mod types;

pub use checkpoint::{
    CHECKPOINT_FORMAT_V1, CHECKPOINT_VERSION_V1, CheckpointEnvelopeV1, CheckpointError,
    deserialize_checkpoint, serialize_checkpoint,
};
pub use context::{
    count_tool_parts, estimate_tokens, find_valid_trim_index, is_valid_trim_index,
    leading_system_len,
};
pub use error::ConversationError;
pub use manager::{
    ConversationManager, ManagerState, NullConversationManager, REMOVED_MESSAGE_COUNT_KEY,
    STATE_NAME_KEY, base_state, restore_base_state,
};
pub use sliding_window::SlidingWindowConversationManager;
pub use token_budget::TokenBudgetConversationManager;
pub use types::{
    ContentPart, Message, MessageContent, Role, SlidingWindowConfig, TokenBudgetConfig,
};
