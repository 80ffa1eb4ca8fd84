//! plex.tv OAuth PIN flow.
//!
//! Redeemers without a Plex token sign in by approving a short code at
//! plex.tv/link. The authenticator requests the PIN, parks it in the
//! [`PinStore`], and polls until plex.tv attaches an auth token.

use std::sync::Arc;

use reqwest::{RequestBuilder, Url, header};
use tracing::debug;

use crate::domain::ports::define_port_error;
use crate::outbound::http::api_url;

use super::client::PlexHttpSettings;
use super::dto::PinDto;
use super::pin_store::{PinStore, PlexPin};

define_port_error! {
    /// Failures raised by the PIN flow.
    pub enum PinFlowError {
        /// plex.tv could not be reached.
        Transport { message: String } => "plex.tv unreachable: {message}",
        /// plex.tv answered with an undecodable body.
        Decode { message: String } => "undecodable plex.tv response: {message}",
        /// The polled PIN is not pending (never requested, expired, or
        /// already claimed).
        UnknownPin { id: i64 } => "no pending pin with id {id}",
    }
}

/// Drives the PIN flow against one plex.tv endpoint.
pub struct PinAuthenticator {
    http: reqwest::Client,
    endpoint: Url,
    settings: Arc<PlexHttpSettings>,
    store: Arc<PinStore>,
}

impl PinAuthenticator {
    /// Create an authenticator over an existing connection pool and store.
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        settings: Arc<PlexHttpSettings>,
        store: Arc<PinStore>,
    ) -> Self {
        Self {
            http,
            endpoint,
            settings,
            store,
        }
    }

    fn identify(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Plex-Client-Identifier", &self.settings.client_identifier)
            .header("X-Plex-Product", &self.settings.product)
            .header(header::ACCEPT, "application/json")
    }

    /// Request a fresh PIN and park it as pending.
    ///
    /// # Errors
    ///
    /// Returns [`PinFlowError::Transport`] when plex.tv is unreachable or
    /// answers with a failure status, and [`PinFlowError::Decode`] when the
    /// body does not decode.
    pub async fn request_pin(&self) -> Result<PlexPin, PinFlowError> {
        let url = api_url(&self.endpoint, "api/v2/pins?strong=true");
        let response = self
            .identify(self.http.post(url))
            .send()
            .await
            .map_err(|error| PinFlowError::transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(PinFlowError::transport(format!(
                "pin request answered with status {status}",
                status = response.status(),
            )));
        }
        let dto = response
            .json::<PinDto>()
            .await
            .map_err(|error| PinFlowError::decode(error.to_string()))?;

        let pin = PlexPin {
            id: dto.id,
            code: dto.code,
            auth_token: dto.auth_token,
        };
        debug!(pin_id = pin.id, "requested plex pin");
        self.store.insert(pin.clone());
        Ok(pin)
    }

    /// Poll a pending PIN for its auth token.
    ///
    /// Returns `Ok(None)` while the redeemer has not yet approved the PIN
    /// and `Ok(Some(token))` exactly once when they have; the claimed PIN is
    /// removed from the store.
    ///
    /// # Errors
    ///
    /// Returns [`PinFlowError::UnknownPin`] when the PIN is not pending,
    /// plus the transport and decode failures of [`Self::request_pin`].
    pub async fn poll(&self, pin_id: i64) -> Result<Option<String>, PinFlowError> {
        if self.store.pending(pin_id).is_none() {
            return Err(PinFlowError::unknown_pin(pin_id));
        }

        let url = api_url(&self.endpoint, &format!("api/v2/pins/{pin_id}"));
        let response = self
            .identify(self.http.get(url))
            .send()
            .await
            .map_err(|error| PinFlowError::transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(PinFlowError::transport(format!(
                "pin poll answered with status {status}",
                status = response.status(),
            )));
        }
        let dto = response
            .json::<PinDto>()
            .await
            .map_err(|error| PinFlowError::decode(error.to_string()))?;

        match dto.auth_token {
            Some(token) => {
                self.store.claim(pin_id);
                debug!(pin_id, "plex pin claimed");
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    //! The store gate rejects polls for unknown pins before any request.

    use chrono::Duration;
    use mockable::{Clock, DefaultClock};

    use super::*;

    #[tokio::test]
    async fn polling_an_unknown_pin_fails_without_a_request() {
        let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
        let store = Arc::new(PinStore::with_ttl(clock, Duration::seconds(600)));
        let authenticator = PinAuthenticator::new(
            reqwest::Client::new(),
            Url::parse("https://plex.invalid").expect("valid url"),
            Arc::new(PlexHttpSettings::default()),
            store,
        );

        let error = authenticator
            .poll(404)
            .await
            .expect_err("unknown pin rejected");
        assert_eq!(error, PinFlowError::unknown_pin(404_i64));
    }
}
