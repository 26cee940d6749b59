//! These are re-exports of crate-wide items used in most modules, to avoid repeating the same
//! imports everywhere.

pub use std::result::Result as StdResult;

pub use serde_json::{json, Value};

pub use crate::error::{Error, Result};

pub type JsonMap = serde_json::Map<String, Value>;
