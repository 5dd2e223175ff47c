//! Process wiring: config, tracing, control link, and the chat loop.

use std::sync::Arc;
use std::time::Duration;

use craft_bridge_core::agent::actions;
use craft_bridge_core::agent::harness::ChatBridge;
use craft_bridge_core::agent::prompt::PromptConfig;
use craft_bridge_core::agent::tracker::InFlightTracker;
use craft_bridge_core::llm::{DecisionClient, EndpointConfig, HttpEndpoint, RetryPolicy};
use craft_bridge_core::session::Session;
use tracing_subscriber::EnvFilter;

mod config;
mod control;

use config::Config;
use control::{ControlLink, RemoteSession, SessionEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::load()?;

    let (link, mut events) = ControlLink::connect(&cfg.control.addr).await?;
    let remote = Arc::new(RemoteSession::new(link));
    let session: Arc<dyn Session> = Arc::clone(&remote) as Arc<dyn Session>;

    let endpoint = HttpEndpoint::new(EndpointConfig {
        endpoint: cfg.llm.endpoint.clone(),
        model: cfg.llm.model.clone(),
    });
    let client = DecisionClient::new(Box::new(endpoint)).with_retry(RetryPolicy {
        max_attempts: cfg.llm.max_attempts,
        base_backoff: Duration::from_millis(cfg.llm.base_backoff_ms),
    });

    let registry = Arc::new(actions::builtin());
    let tracker = Arc::new(InFlightTracker::new());
    let prompt_cfg = PromptConfig {
        system_prompt: cfg.agent.system_prompt.clone(),
        ..PromptConfig::default()
    };
    let bridge = ChatBridge::new(client, registry, tracker).with_prompt_config(prompt_cfg);

    tracing::info!(addr = %cfg.control.addr, model = %cfg.llm.model, "bridge connected");

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Chat { username, text } => {
                if username == cfg.agent.name {
                    continue;
                }
                tracing::info!(%username, %text, "chat received");
                // One decision round trip per message; a failed turn is
                // dropped without taking the session loop down.
                if let Err(err) = bridge.handle_chat(&text, &session, remote.as_ref()).await {
                    tracing::warn!(%username, "turn dropped: {err:#}");
                }
            }
            SessionEvent::Spawned => tracing::info!("avatar spawned"),
            SessionEvent::Died => tracing::warn!("avatar died"),
            SessionEvent::Kicked { reason } => tracing::warn!(%reason, "avatar kicked"),
            SessionEvent::Disconnected => {
                tracing::warn!("control link closed");
                break;
            }
        }
    }

    Ok(())
}
