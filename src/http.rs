//! The bare minimum of the REST API the gateway needs: where to connect, and how many shards
//! are recommended.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Client;

use crate::constants;
use crate::internal::prelude::*;
use crate::model::gateway::{BotGateway, Gateway};

const API_BASE: &str = "https://discord.com/api/v10";

/// An HTTP client for the gateway-discovery routes.
pub struct Http {
    client: Client,
    token: String,
}

impl Http {
    /// Creates a client for the given bot token. The `Bot ` prefix is added if missing.
    #[must_use]
    pub fn new(token: &str) -> Self {
        let token = token.trim();
        let token = if token.starts_with("Bot ") || token.starts_with("Bearer ") {
            token.to_owned()
        } else {
            format!("Bot {token}")
        };

        Self {
            client: Client::new(),
            token,
        }
    }

    /// The token this client authorizes with, including its prefix.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Gets the gateway URL. Does not require authentication.
    ///
    /// # Errors
    ///
    /// Errors if the request fails or returns an unexpected body.
    pub async fn get_gateway(&self) -> Result<Gateway> {
        let response = self
            .client
            .get(format!("{API_BASE}/gateway"))
            .headers(self.headers(false))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Gets the bot's gateway information: the URL plus the recommended shard count and the
    /// session start limit.
    ///
    /// # Errors
    ///
    /// Errors if the request fails, e.g. on an invalid token.
    pub async fn get_bot_gateway(&self) -> Result<BotGateway> {
        let response = self
            .client
            .get(format!("{API_BASE}/gateway/bot"))
            .headers(self.headers(true))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    fn headers(&self, auth: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(constants::USER_AGENT));

        if auth {
            if let Ok(value) = HeaderValue::from_str(&self.token) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_gets_bot_prefix() {
        assert_eq!(Http::new("abc123").token(), "Bot abc123");
        assert_eq!(Http::new("Bot abc123").token(), "Bot abc123");
        assert_eq!(Http::new("Bearer abc123").token(), "Bearer abc123");
        assert_eq!(Http::new("  abc123 ").token(), "Bot abc123");
    }
}
