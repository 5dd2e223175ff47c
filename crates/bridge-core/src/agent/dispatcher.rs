//! Orchestrates one decision reply: narration first, then actions in order.
//!
//! Failures are contained at the smallest unit that can absorb them. An
//! unknown action or a failing executor costs that one action; siblings and
//! the dispatch loop carry on.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::agent::registry::{ActionKind, ActionRegistry};
use crate::agent::tracker::InFlightTracker;
use crate::agent::wire::DecisionReply;
use crate::session::Session;

/// Outbound chat boundary: one message per processed reply.
pub trait ChatSink: Send + Sync {
    fn say<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

pub struct CommandDispatcher {
    registry: Arc<ActionRegistry>,
    tracker: Arc<InFlightTracker>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<ActionRegistry>, tracker: Arc<InFlightTracker>) -> Self {
        Self { registry, tracker }
    }

    /// Runs one reply. The narration is emitted unconditionally before any
    /// action, start requests are issued strictly in list order, and each
    /// completion is observed off-loop so the dispatch loop itself only ever
    /// suspends on `wait`.
    pub async fn run(
        &self,
        reply: &DecisionReply,
        session: &Arc<dyn Session>,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<()> {
        chat.say(&reply.conversation).await?;

        for cmd in &reply.commands {
            let Some(spec) = self.registry.lookup(&cmd.name) else {
                tracing::warn!(name = %cmd.name, "unknown action requested, skipping");
                continue;
            };

            let action = match &spec.kind {
                ActionKind::AwaitDrain => {
                    self.tracker.await_drain().await;
                    continue;
                }
                ActionKind::Session(action) => action,
            };

            // Verbose replies are tolerated: excess arguments are clipped to
            // the declared parameter list, never rejected.
            let mut args = cmd.args.clone();
            args.truncate(spec.params.len());

            let token = self.tracker.token();
            self.tracker.track(token).await;

            let completion = match action.start(Arc::clone(session), args).await {
                Ok(completion) => completion,
                Err(err) => {
                    self.tracker.release(token).await;
                    tracing::warn!(action = spec.name, "action failed to start: {err:#}");
                    continue;
                }
            };

            let tracker = Arc::clone(&self.tracker);
            let name = spec.name;
            tokio::spawn(async move {
                if let Err(err) = completion.await {
                    tracing::warn!(action = name, "action failed: {err:#}");
                }
                tracker.release(token).await;
            });
        }

        Ok(())
    }
}
