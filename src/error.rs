use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;

use serde_json::{Error as JsonError, Value};
use tokio_tungstenite::tungstenite::error::Error as TungsteniteError;
use url::ParseError as UrlError;

use crate::gateway::GatewayError;
use crate::voice::VoiceError;

/// The common result type between most library functions.
///
/// The library exposes functions which, for a result type, exposes only one type, rather than the
/// usual 2 (`Result<T, Error>`). This is because all functions that return a result return
/// the library's [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A common error enum returned by most of the library's functionality.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An error while decoding a payload.
    Decode(&'static str, Value),
    /// An error from the [`gateway`] module.
    ///
    /// [`gateway`]: crate::gateway
    Gateway(GatewayError),
    /// An error from the HTTP layer while fetching gateway information.
    Http(reqwest::Error),
    /// An [`std::io`] error.
    Io(IoError),
    /// An error from the [`serde_json`] crate.
    Json(JsonError),
    /// An error from the `tungstenite` crate.
    Tungstenite(TungsteniteError),
    /// An error while parsing a URL.
    Url(UrlError),
    /// An error from the [`voice`] module.
    ///
    /// [`voice`]: crate::voice
    Voice(VoiceError),
}

impl From<GatewayError> for Error {
    fn from(e: GatewayError) -> Self {
        Self::Gateway(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Self {
        Self::Json(e)
    }
}

impl From<TungsteniteError> for Error {
    fn from(e: TungsteniteError) -> Self {
        Self::Tungstenite(e)
    }
}

impl From<UrlError> for Error {
    fn from(e: UrlError) -> Self {
        Self::Url(e)
    }
}

impl From<VoiceError> for Error {
    fn from(e: VoiceError) -> Self {
        Self::Voice(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(msg, _) => f.write_str(msg),
            Self::Gateway(inner) => fmt::Display::fmt(&inner, f),
            Self::Http(inner) => fmt::Display::fmt(&inner, f),
            Self::Io(inner) => fmt::Display::fmt(&inner, f),
            Self::Json(inner) => fmt::Display::fmt(&inner, f),
            Self::Tungstenite(inner) => fmt::Display::fmt(&inner, f),
            Self::Url(inner) => fmt::Display::fmt(&inner, f),
            Self::Voice(inner) => fmt::Display::fmt(&inner, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Gateway(inner) => Some(inner),
            Self::Http(inner) => Some(inner),
            Self::Io(inner) => Some(inner),
            Self::Json(inner) => Some(inner),
            Self::Tungstenite(inner) => Some(inner),
            Self::Url(inner) => Some(inner),
            Self::Voice(inner) => Some(inner),
            Self::Decode(..) => None,
        }
    }
}
