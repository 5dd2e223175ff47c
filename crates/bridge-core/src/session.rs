//! Capability surface of the remote game session.
//!
//! The bridge only calls these capabilities; connection lifecycle, world state,
//! and avatar control internals live behind the trait.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Resolves when an accepted action reaches its natural or timed completion.
pub type Completion = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Future type for session capability calls.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlFlag {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    Sneak,
    Sprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Unit offset naming which face of the reference block is built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceVector {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl FaceVector {
    pub const UP: FaceVector = FaceVector { x: 0, y: 1, z: 0 };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Facing {
    pub yaw: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

/// Structured session facts offered to the decision service as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub position: Position,
    #[serde(default)]
    pub health: Option<f32>,
    #[serde(default)]
    pub facing: Option<Facing>,
    #[serde(default)]
    pub inventory: Vec<ItemStack>,
}

/// Boundary the bridge uses to drive the avatar.
pub trait Session: Send + Sync {
    /// Toggles a movement control flag. Takes effect immediately.
    fn set_control_state(&self, flag: ControlFlag, active: bool) -> SessionFuture<'_, ()>;

    /// Starts pathfinding toward `target`. The returned handle resolves when
    /// the goal is reached.
    fn navigate_to(&self, target: Position, tolerance: f64) -> SessionFuture<'_, Completion>;

    /// Places `block` against the block at `pos`, building on its `face` side.
    fn place_block_at<'a>(
        &'a self,
        pos: Position,
        face: FaceVector,
        block: &'a str,
    ) -> SessionFuture<'a, Completion>;

    /// Digs out the block at `pos`.
    fn break_block_at(&self, pos: Position) -> SessionFuture<'_, Completion>;

    /// Drops `count` of `item` from the inventory.
    fn toss_item<'a>(&'a self, item: &'a str, count: u32) -> SessionFuture<'a, ()>;

    /// Reads the current session facts used as decision context.
    fn snapshot(&self) -> SessionFuture<'_, Snapshot>;
}
