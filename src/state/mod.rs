//! State module for tracking shard progress
//!
//! # Components
//!
//! - `CheckpointStore`: durable "next unattempted index" marker for a shard
//! - `ItemState`: the per-item extraction state machine

mod checkpoint;
mod item_state;

// Re-export main types
pub use checkpoint::CheckpointStore;
pub use item_state::ItemState;
