//! Decision-prompt assembly.

use crate::session::Snapshot;

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub reply_contract: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You control a game avatar and talk with nearby players. \
                            Answer the latest message and choose the commands needed, if any."
                .to_string(),
            reply_contract: "Reply with exactly one JSON object and nothing else.\n\nFormat:\n{\"conversation\":\"<what you say in chat>\",\"commands\":[{\"name\":\"move\",\"args\":[10,64,10]}]}\n\nUse an empty commands list when no action is needed.".to_string(),
        }
    }
}

/// Builds the full prompt for one chat turn: system text, the player's
/// message, a state block, the command list, and the reply contract.
pub fn build_decision_prompt(
    cfg: &PromptConfig,
    instruction: &str,
    snapshot: Option<&Snapshot>,
    actions: &[String],
) -> String {
    let state_json = snapshot
        .and_then(|snap| serde_json::to_string_pretty(snap).ok())
        .unwrap_or_else(|| "{}".to_string());

    let mut command_list = String::new();
    for action in actions {
        command_list.push_str("- ");
        command_list.push_str(action);
        command_list.push('\n');
    }

    format!(
        "{}\n\n[MESSAGE]\n{instruction}\n\n[STATE_JSON]\n{state_json}\n\n[COMMANDS]\n{command_list}\n[CONTRACT]\n{}\n",
        cfg.system_prompt, cfg.reply_contract
    )
}
