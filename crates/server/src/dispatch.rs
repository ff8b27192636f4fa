use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use compline_core::approvals::{DispatchError, OutcomeDispatcher, OutcomeNotice};
use compline_core::config::DispatchConfig;

/// Delivers outcome notices to the service that owns the referenced document.
///
/// The endpoint is picked per reference type, falling back to `dispatch.default_endpoint`.
/// A reference type with no endpoint at all is logged and treated as delivered.
pub struct HttpOutcomeDispatcher {
    client: Client,
    config: DispatchConfig,
}

impl HttpOutcomeDispatcher {
    pub fn new(config: DispatchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl OutcomeDispatcher for HttpOutcomeDispatcher {
    async fn notify(&self, notice: &OutcomeNotice) -> Result<(), DispatchError> {
        let Some(endpoint) = self.config.endpoint_for(&notice.reference_type) else {
            info!(
                event_name = "approval.outcome.no_endpoint",
                case_id = %notice.case_id,
                reference_type = %notice.reference_type,
                outcome = notice.outcome.as_str(),
                "no outcome endpoint configured for reference type; notice logged only"
            );
            return Ok(());
        };

        let mut request = self.client.post(endpoint).json(notice);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            warn!(
                event_name = "approval.outcome.endpoint_unreachable",
                case_id = %notice.case_id,
                endpoint = %endpoint,
                error = %error,
                "outcome endpoint request failed"
            );
            DispatchError::Unreachable { endpoint: endpoint.to_string(), message: error.to_string() }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Refused {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        info!(
            event_name = "approval.outcome.delivered",
            case_id = %notice.case_id,
            reference_type = %notice.reference_type,
            reference_id = %notice.reference_id,
            outcome = notice.outcome.as_str(),
            endpoint = %endpoint,
            "outcome notice delivered"
        );
        Ok(())
    }
}
