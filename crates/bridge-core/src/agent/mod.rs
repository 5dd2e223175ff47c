//! Command orchestration: reply contract, registry, tracker, dispatcher, and
//! the per-message harness that ties them together.

pub mod actions;
pub mod dispatcher;
pub mod harness;
pub mod prompt;
pub mod registry;
pub mod tracker;
pub mod wire;

pub use dispatcher::{ChatSink, CommandDispatcher};
pub use harness::{ChatBridge, DecisionRequest};
pub use registry::{ActionRegistry, ActionSpec, SessionAction};
pub use tracker::{ActionToken, InFlightTracker};
pub use wire::{CommandArg, CommandRequest, DecisionReply, ReplyParseError, parse_reply};
