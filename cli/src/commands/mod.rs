use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use clap::Subcommand;
use threadkeeper_core::{
    CheckpointEnvelopeV1, ConversationManager, Message, count_tool_parts, deserialize_checkpoint,
    estimate_tokens, find_valid_trim_index, serialize_checkpoint,
};
use uuid::Uuid;

#[derive(Subcommand, PartialEq, Debug)]
pub enum ConfigCommands {
    /// Show the configuration in effect
    Show,
    /// Print a complete sample configuration file
    Sample,
}

#[derive(Subcommand, PartialEq, Debug)]
pub enum Commands {
    /// Get CLI Version
    Version,

    /// Apply the configured conversation manager to a transcript
    Apply {
        /// Transcript or checkpoint file to read
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the resulting checkpoint (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recover from a context window overflow by aggressively trimming a transcript
    Reduce {
        /// Transcript or checkpoint file to read
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the resulting checkpoint (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print statistics about a transcript and where it could be trimmed
    Inspect {
        /// Transcript or checkpoint file to read
        #[arg(short, long)]
        input: PathBuf,
        /// Number of leading messages you would like to remove
        #[arg(short, long, default_value_t = 0)]
        target: usize,
    },

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ManagementMode {
    Apply,
    Reduce,
}

impl Commands {
    pub fn run(self, config: AppConfig) -> Result<(), String> {
        match self {
            Commands::Version => {
                println!("threadkeeper v{}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            Commands::Apply { input, output } => {
                run_management(&config, ManagementMode::Apply, &input, output.as_deref())
            }
            Commands::Reduce { input, output } => {
                run_management(&config, ManagementMode::Reduce, &input, output.as_deref())
            }
            Commands::Inspect { input, target } => {
                let checkpoint = read_checkpoint(&input)?;
                print!("{}", inspect_report(&checkpoint.messages, target));
                Ok(())
            }
            Commands::Config(ConfigCommands::Show) => {
                print!("{}", config.to_toml().map_err(|e| e.to_string())?);
                Ok(())
            }
            Commands::Config(ConfigCommands::Sample) => {
                print!("{}", AppConfig::default().to_toml().map_err(|e| e.to_string())?);
                Ok(())
            }
        }
    }
}

fn run_management(
    config: &AppConfig,
    mode: ManagementMode,
    input: &Path,
    output: Option<&Path>,
) -> Result<(), String> {
    let checkpoint = read_checkpoint(input)?;
    let mut manager = config.manager.build();
    let mut messages = checkpoint.messages;

    if let Some(state) = &checkpoint.manager_state {
        restore_manager(manager.as_mut(), state, &mut messages);
    }

    let before = messages.len();
    let outcome = match mode {
        ManagementMode::Apply => manager.apply_management(&mut messages),
        ManagementMode::Reduce => manager.reduce_context(&mut messages, None),
    };
    outcome.map_err(|e| e.to_string())?;

    eprintln!(
        "{}: removed {} message(s), {} remaining",
        manager.name(),
        before - messages.len(),
        messages.len()
    );

    let session_id = checkpoint.session_id.unwrap_or_else(Uuid::new_v4);
    let result = CheckpointEnvelopeV1::new(Some(session_id), messages, Some(manager.get_state()));
    write_checkpoint(&result, output)
}

fn restore_manager(
    manager: &mut dyn ConversationManager,
    state: &threadkeeper_core::ManagerState,
    messages: &mut Vec<Message>,
) {
    match manager.restore_from_session(state) {
        Ok(Some(mut prepend)) => {
            prepend.append(messages);
            *messages = prepend;
        }
        Ok(None) => {}
        Err(error) => {
            // a checkpoint written by another strategy starts the new one fresh
            tracing::warn!(
                manager = manager.name(),
                error = %error,
                "ignoring stored manager state"
            );
        }
    }
}

fn read_checkpoint(path: &Path) -> Result<CheckpointEnvelopeV1, String> {
    let payload = std::fs::read(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    deserialize_checkpoint(&payload).map_err(|e| format!("{}: {}", path.display(), e))
}

fn write_checkpoint(checkpoint: &CheckpointEnvelopeV1, output: Option<&Path>) -> Result<(), String> {
    let payload = serialize_checkpoint(checkpoint).map_err(|e| e.to_string())?;

    match output {
        Some(path) => std::fs::write(path, &payload)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e)),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&payload)
                .and_then(|_| stdout.write_all(b"\n"))
                .map_err(|e| format!("Failed to write output: {}", e))
        }
    }
}

fn inspect_report(messages: &[Message], target: usize) -> String {
    let (tool_calls, tool_results) = count_tool_parts(messages);
    let trim_index = find_valid_trim_index(messages, target)
        .map_or_else(|| "none".to_string(), |index| index.to_string());

    format!(
        "messages: {}\nestimated_tokens: {}\ntool_calls: {}\ntool_results: {}\ntrim_index({}): {}\n",
        messages.len(),
        estimate_tokens(messages),
        tool_calls,
        tool_results,
        target,
        trim_index
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use threadkeeper_core::{ContentPart, Role, SlidingWindowConversationManager, base_state};

    fn transcript() -> Vec<Message> {
        vec![
            Message::new(Role::User, "find the config"),
            Message::new(
                Role::Assistant,
                vec![ContentPart::tool_call("tc_1", "glob", json!({"pattern": "*.toml"}))],
            ),
            Message::new(
                Role::Tool,
                vec![ContentPart::tool_result("tc_1", json!("Cargo.toml"))],
            ),
            Message::new(Role::Assistant, "It is Cargo.toml"),
        ]
    }

    #[test]
    fn inspect_report_moves_past_tool_result() {
        let report = inspect_report(&transcript(), 2);
        assert_eq!(
            report,
            "messages: 4\nestimated_tokens: 7\ntool_calls: 1\ntool_results: 1\ntrim_index(2): 3\n"
        );
    }

    #[test]
    fn inspect_report_without_trim_point() {
        let report = inspect_report(&transcript(), 4);
        assert!(report.ends_with("trim_index(4): none\n"));
    }

    #[test]
    fn restore_manager_accepts_matching_state() {
        let mut manager = SlidingWindowConversationManager::default();
        let mut messages = transcript();
        let state = base_state(SlidingWindowConversationManager::NAME, 7);

        restore_manager(&mut manager, &state, &mut messages);

        assert_eq!(manager.removed_message_count(), 7);
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn restore_manager_ignores_foreign_state() {
        let mut manager = SlidingWindowConversationManager::default();
        let mut messages = transcript();
        let state = base_state("TokenBudgetConversationManager", 7);

        restore_manager(&mut manager, &state, &mut messages);

        assert_eq!(manager.removed_message_count(), 0);
    }
}
