//! A collection of newtypes defining type-strong IDs.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_u64 {
    ($(#[$attr:meta] $name:ident;)*) => {
        $(
            #[$attr]
            #[derive(
                Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd,
                Serialize, Deserialize,
            )]
            pub struct $name(u64);

            impl $name {
                #[must_use]
                pub const fn new(id: u64) -> Self {
                    Self(id)
                }

                /// Retrieves the inner ID as a u64.
                #[must_use]
                pub const fn get(self) -> u64 {
                    self.0
                }
            }

            impl From<u64> for $name {
                fn from(id: u64) -> Self {
                    Self(id)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Display::fmt(&self.0, f)
                }
            }
        )*
    };
}

id_u64! {
    /// An identifier for a guild.
    GuildId;
    /// An identifier for a channel.
    ChannelId;
    /// An identifier for a user.
    UserId;
}

/// An identifier for a shard.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ShardId(pub u16);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Reads a snowflake out of a raw payload field, which may be encoded as either a string or a
/// number.
pub(crate) fn snowflake(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        other => other.as_u64(),
    }
}
