use std::time::Duration;

use async_trait::async_trait;

use crate::core::{DteError, DteType, Rut};
use crate::gateway::{
    Environment, GatewayReply, SubmitMeta, decode_binary, decode_reply, submit_envelope,
};

/// Final word from the gateway on a submission or poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted { track_id: String },
    Rejected { reason: String },
    /// Transport accepted, no tax-authority verdict yet. Advanced later
    /// via `poll_status`.
    Pending { track_id: Option<String> },
}

/// Raw HTTP exchange, minus any gateway semantics.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The HTTP seam. Production uses [`HttpTransport`]; tests substitute
/// scripted responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, api_key: &str, body: String)
    -> Result<TransportResponse, DteError>;
    async fn get(&self, url: &str, api_key: &str) -> Result<TransportResponse, DteError>;
}

/// reqwest-backed transport. Gateway calls are not expected to exceed
/// tens of seconds, so the whole request is capped at 30s.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, DteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DteError::GatewayTransient(format!("HTTP client setup: {e}")))?;
        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Result<TransportResponse, DteError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| DteError::GatewayTransient(format!("reading response body: {e}")))?
            .to_vec();
        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }

    fn network_error(e: reqwest::Error) -> DteError {
        DteError::GatewayTransient(format!("network error: {e}"))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        api_key: &str,
        body: String,
    ) -> Result<TransportResponse, DteError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, api_key)
            .body(body)
            .send()
            .await
            .map_err(Self::network_error)?;
        Self::read(response).await
    }

    async fn get(&self, url: &str, api_key: &str) -> Result<TransportResponse, DteError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, api_key)
            .send()
            .await
            .map_err(Self::network_error)?;
        Self::read(response).await
    }
}

/// Connection parameters for one gateway account.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub environment: Environment,
}

/// Parameters for fetching a rendered (PDF) copy of a document.
#[derive(Debug, Clone)]
pub struct CopyParams {
    pub rut: Rut,
    /// Issued by the caller, as opposed to received from a supplier.
    pub issued: bool,
}

/// Gateway client. Stateless per call; idempotency is enforced by the
/// lifecycle layer, which refuses to resubmit terminal records.
pub struct GatewayClient<T: Transport> {
    transport: T,
    config: GatewayConfig,
}

impl<T: Transport> GatewayClient<T> {
    pub fn new(transport: T, config: GatewayConfig) -> Self {
        Self { transport, config }
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submits a signed DTE.
    ///
    /// If the full envelope comes back non-2xx, retries exactly once
    /// with the reduced payload (the inner `<DTE>` fragment alone,
    /// without the XML declaration) before surfacing the error. The
    /// accepted payload shape is undocumented and differs between
    /// gateway environments; one reduced attempt distinguishes a shape
    /// quirk from a genuine rejection without masking the latter.
    pub async fn submit(
        &self,
        signed_xml: &str,
        meta: &SubmitMeta,
    ) -> Result<SubmissionOutcome, DteError> {
        let url = format!("{}/recepcion", self.config.base_url);
        let envelope = submit_envelope(self.config.environment, signed_xml, meta)?;

        let mut response = self
            .transport
            .post(&url, &self.config.api_key, envelope)
            .await?;

        if !response.is_success() {
            let reduced = reduced_payload(signed_xml)
                .ok_or_else(|| DteError::GatewayProtocol("no DTE fragment to resubmit".into()))?;
            tracing::warn!(
                status = response.status,
                "full envelope rejected, retrying once with reduced payload"
            );
            let envelope = submit_envelope(self.config.environment, &reduced, meta)?;
            response = self
                .transport
                .post(&url, &self.config.api_key, envelope)
                .await?;
        }

        if !response.is_success() {
            return Err(http_failure(&response));
        }

        let reply = decode_reply(response.content_type.as_deref(), &response.body_text())?;
        Ok(outcome_from_reply(reply))
    }

    /// Asks the gateway for the current verdict on a track id.
    pub async fn poll_status(&self, track_id: &str) -> Result<SubmissionOutcome, DteError> {
        let url = format!("{}/estado/{}", self.config.base_url, track_id);
        let response = self.transport.get(&url, &self.config.api_key).await?;
        if !response.is_success() {
            return Err(http_failure(&response));
        }
        let reply = decode_reply(response.content_type.as_deref(), &response.body_text())?;
        Ok(outcome_from_reply(reply))
    }

    /// Fetches the rendered (PDF) copy of an already-issued document.
    pub async fn fetch_rendered_copy(
        &self,
        dte_type: DteType,
        folio: u64,
        params: &CopyParams,
    ) -> Result<Vec<u8>, DteError> {
        let url = format!(
            "{}/copia?ambiente={}&rut={}&emitido={}&tipo={}&folio={}",
            self.config.base_url,
            self.config.environment.as_str(),
            params.rut,
            if params.issued { 1 } else { 0 },
            dte_type.code(),
            folio,
        );
        let response = self.transport.get(&url, &self.config.api_key).await?;
        if !response.is_success() {
            return Err(http_failure(&response));
        }
        decode_binary(response.content_type.as_deref(), &response.body)
    }
}

fn http_failure(response: &TransportResponse) -> DteError {
    let excerpt: String = response.body_text().chars().take(200).collect();
    if response.status >= 500 {
        DteError::GatewayTransient(format!("HTTP {}: {}", response.status, excerpt))
    } else {
        DteError::GatewayRejected(format!("HTTP {}: {}", response.status, excerpt))
    }
}

/// The inner `<DTE>` element alone, stripped of the XML declaration and
/// anything else around it.
fn reduced_payload(signed_xml: &str) -> Option<String> {
    let start = signed_xml.find("<DTE")?;
    let close = "</DTE>";
    let end = signed_xml.rfind(close)?;
    (end >= start).then(|| signed_xml[start..end + close.len()].to_string())
}

fn outcome_from_reply(reply: GatewayReply) -> SubmissionOutcome {
    let status = reply
        .status
        .as_deref()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if status.contains("RECHAZ") || status == "RCH" {
        let reason = reply
            .description
            .or(reply.status)
            .unwrap_or_else(|| "rejected by gateway".into());
        return SubmissionOutcome::Rejected { reason };
    }
    let accepted = status.contains("EPR") || status.contains("ACEPTADO") || status == "OK";
    match (accepted, reply.track_id) {
        (true, Some(track_id)) => SubmissionOutcome::Accepted { track_id },
        (_, track_id) => SubmissionOutcome::Pending { track_id },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(track: Option<&str>, status: Option<&str>, gloss: Option<&str>) -> GatewayReply {
        GatewayReply {
            track_id: track.map(String::from),
            status: status.map(String::from),
            description: gloss.map(String::from),
            degraded: false,
        }
    }

    #[test]
    fn accepted_needs_status_and_track_id() {
        assert_eq!(
            outcome_from_reply(reply(Some("77"), Some("EPR"), None)),
            SubmissionOutcome::Accepted {
                track_id: "77".into()
            }
        );
        // Accepted status without a track id stays pending
        assert_eq!(
            outcome_from_reply(reply(None, Some("EPR"), None)),
            SubmissionOutcome::Pending { track_id: None }
        );
    }

    #[test]
    fn rejection_carries_the_gateway_gloss() {
        assert_eq!(
            outcome_from_reply(reply(Some("77"), Some("RCH"), Some("RUT no autorizado"))),
            SubmissionOutcome::Rejected {
                reason: "RUT no autorizado".into()
            }
        );
    }

    #[test]
    fn unknown_status_is_pending_with_track_id() {
        assert_eq!(
            outcome_from_reply(reply(Some("77"), Some("SOK"), None)),
            SubmissionOutcome::Pending {
                track_id: Some("77".into())
            }
        );
    }

    #[test]
    fn reduced_payload_strips_declaration() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><DTE version=\"1.0\"><Documento/></DTE>";
        assert_eq!(
            reduced_payload(xml).unwrap(),
            "<DTE version=\"1.0\"><Documento/></DTE>"
        );
        assert!(reduced_payload("<Otro/>").is_none());
    }

    #[test]
    fn http_failures_classify_by_status() {
        let transient = http_failure(&TransportResponse {
            status: 503,
            content_type: None,
            body: b"unavailable".to_vec(),
        });
        assert!(matches!(transient, DteError::GatewayTransient(_)));

        let rejected = http_failure(&TransportResponse {
            status: 400,
            content_type: None,
            body: b"bad envelope".to_vec(),
        });
        assert!(matches!(rejected, DteError::GatewayRejected(_)));
    }
}
