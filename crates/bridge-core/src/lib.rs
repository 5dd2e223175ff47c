//! Core bridge between a chat channel, a decision service, and a game session.
//!
//! Per inbound message: build a prompt from the chat instruction and a session
//! snapshot, call the decision service with bounded retry, parse the structured
//! reply, then dispatch its commands against the session. The in-flight
//! tracker gives `wait` its "all running actions finished" semantics.

pub mod agent;
pub mod llm;
pub mod session;
