//! A client library for Discord's real-time gateway and voice APIs.
//!
//! The crate is split in two halves:
//!
//! - [`gateway`]: sharded websocket connections to the main gateway. A [`ShardManager`] boots
//!   one [`Shard`] per shard ID, each driven on its own task; every dispatch event is handed,
//!   uninterpreted, to the [`EventDispatcher`] you supply.
//! - [`voice`]: per-guild voice connections. A [`VoiceSession`] performs the voice handshake
//!   and sends Opus audio over encrypted UDP; an [`AudioPlayer`] feeds it from an
//!   [`AudioSource`] at the protocol's 20ms cadence.
//!
//! A minimal bot connects like this:
//!
//! ```rust,no_run
//! use std::num::NonZeroU16;
//! use std::sync::Arc;
//!
//! use accord::gateway::{EventDispatcher, ShardManager, ShardManagerOptions};
//! use accord::http::Http;
//! use accord::model::gateway::GatewayIntents;
//! use accord::model::id::ShardId;
//! use async_trait::async_trait;
//! use serde_json::Value;
//!
//! struct Handler;
//!
//! #[async_trait]
//! impl EventDispatcher for Handler {
//!     async fn dispatch(&self, shard_id: ShardId, event_name: &str, data: Value) {
//!         if event_name == "MESSAGE_CREATE" {
//!             println!("[{shard_id}] {}", data["content"]);
//!         }
//!     }
//! }
//!
//! # async fn run() -> Result<(), accord::Error> {
//! let token = std::env::var("DISCORD_TOKEN").expect("token");
//! let (manager, mut errors) = ShardManager::new(ShardManagerOptions {
//!     token: Arc::from(token.as_str()),
//!     intents: GatewayIntents::non_privileged(),
//!     presence: None,
//!     dispatcher: Arc::new(Handler),
//!     voice_manager: None,
//!     http: Arc::new(Http::new(&token)),
//!     ws_url: None,
//! });
//!
//! manager.create(NonZeroU16::MIN).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Shard`]: gateway::Shard
//! [`ShardManager`]: gateway::ShardManager
//! [`EventDispatcher`]: gateway::EventDispatcher
//! [`VoiceSession`]: voice::VoiceSession
//! [`AudioPlayer`]: voice::AudioPlayer
//! [`AudioSource`]: voice::AudioSource
#![deny(rust_2018_idioms)]
#![warn(clippy::missing_errors_doc, clippy::unused_async)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
mod error;
pub mod gateway;
pub mod http;
mod internal;
pub mod model;
pub mod voice;

pub use crate::error::{Error, Result};
