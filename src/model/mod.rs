//! The minimal set of models the gateway core needs.
//!
//! Dispatch event payloads are deliberately left as raw [`Value`]s; interpreting them is the job
//! of the [`EventDispatcher`] given to the shard manager.
//!
//! [`Value`]: serde_json::Value
//! [`EventDispatcher`]: crate::gateway::EventDispatcher

pub mod event;
pub mod gateway;
pub mod id;
pub mod payload;
