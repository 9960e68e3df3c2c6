use tracing::{debug, warn};

/// Client for the external quote generator.
pub struct QuoteClient {
    client: reqwest::Client,
    url: String,
}

impl QuoteClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// One GET, no retry. Error responses come back as text for the channel
    /// rather than as an `Err`.
    pub async fn fetch(&self) -> String {
        debug!("Requesting quote from {}", self.url);

        let response = match self.client.get(&self.url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Quote request failed: {}", e);
                return format!("Quote service unavailable: {}", e);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read quote response: {}", e);
                return format!("Quote service error ({}): {}", status, e);
            }
        };

        if !status.is_success() {
            warn!("Quote service returned {}", status);
            return format!("Quote service error ({}): {}", status, body);
        }
        body
    }
}
