//! One chat turn end to end: snapshot, prompt, decision call, dispatch.

use std::sync::Arc;

use crate::agent::dispatcher::{ChatSink, CommandDispatcher};
use crate::agent::prompt::{PromptConfig, build_decision_prompt};
use crate::agent::registry::ActionRegistry;
use crate::agent::tracker::InFlightTracker;
use crate::agent::wire::{DecisionReply, parse_reply};
use crate::llm::DecisionClient;
use crate::session::{Session, Snapshot};

/// Per-message request handed to the decision service.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub instruction: String,
    pub context: Option<Snapshot>,
}

/// Owns one conversation's worth of orchestration state. All collaborators are
/// injected, so several independent bridges can coexist in one process.
pub struct ChatBridge {
    client: DecisionClient,
    dispatcher: CommandDispatcher,
    action_help: Vec<String>,
    prompt_cfg: PromptConfig,
}

impl ChatBridge {
    pub fn new(
        client: DecisionClient,
        registry: Arc<ActionRegistry>,
        tracker: Arc<InFlightTracker>,
    ) -> Self {
        let action_help = registry.describe_all();
        Self {
            client,
            dispatcher: CommandDispatcher::new(registry, tracker),
            action_help,
            prompt_cfg: PromptConfig::default(),
        }
    }

    pub fn with_prompt_config(mut self, prompt_cfg: PromptConfig) -> Self {
        self.prompt_cfg = prompt_cfg;
        self
    }

    /// Handles one inbound chat message. Failures are contained to the turn:
    /// the reply is either fully dispatched or dropped with no narration and
    /// no actions.
    pub async fn handle_chat(
        &self,
        instruction: &str,
        session: &Arc<dyn Session>,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<DecisionReply> {
        let context = match session.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::debug!("snapshot unavailable, sending context-free prompt: {err:#}");
                None
            }
        };
        let request = DecisionRequest {
            instruction: instruction.to_string(),
            context,
        };

        let prompt = build_decision_prompt(
            &self.prompt_cfg,
            &request.instruction,
            request.context.as_ref(),
            &self.action_help,
        );
        let raw = self.client.send(&prompt).await?;
        let reply = parse_reply(&raw)?;
        self.dispatcher.run(&reply, session, chat).await?;
        Ok(reply)
    }
}
