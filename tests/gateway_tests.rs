#![cfg(feature = "gateway")]

use std::sync::Mutex;
use std::collections::VecDeque;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDate;
use dte_cl::core::{DteError, DteType};
use dte_cl::gateway::*;

/// Scripted transport: pops one canned response per call and records
/// every request body.
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<TransportResponse, DteError>>>,
    posts: Mutex<Vec<(String, String)>>,
    gets: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<TransportResponse, DteError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            posts: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
        }
    }

    fn post_bodies(&self) -> Vec<String> {
        self.posts.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        _api_key: &str,
        body: String,
    ) -> Result<TransportResponse, DteError> {
        self.posts.lock().unwrap().push((url.to_string(), body));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("transport called more times than scripted")
    }

    async fn get(&self, url: &str, _api_key: &str) -> Result<TransportResponse, DteError> {
        self.gets.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("transport called more times than scripted")
    }
}

fn ok_xml(body: &str) -> Result<TransportResponse, DteError> {
    Ok(TransportResponse {
        status: 200,
        content_type: Some("application/xml".into()),
        body: body.as_bytes().to_vec(),
    })
}

fn http(status: u16, body: &str) -> Result<TransportResponse, DteError> {
    Ok(TransportResponse {
        status,
        content_type: Some("text/plain".into()),
        body: body.as_bytes().to_vec(),
    })
}

fn client(transport: ScriptedTransport) -> GatewayClient<ScriptedTransport> {
    GatewayClient::new(
        transport,
        GatewayConfig {
            base_url: "https://gateway.test".into(),
            api_key: "key-123".into(),
            environment: Environment::Test,
        },
    )
}

fn meta() -> SubmitMeta {
    SubmitMeta::new(80, NaiveDate::from_ymd_opt(2014, 8, 22).unwrap())
}

const ACCEPTED: &str =
    "<RECEPCIONDTE><TRACKID>555001</TRACKID><ESTADO>EPR</ESTADO><GLOSA>Envio Procesado</GLOSA></RECEPCIONDTE>";

const SIGNED: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><DTE version=\"1.0\"><Documento ID=\"F45T33\"></Documento></DTE>";

#[tokio::test]
async fn submit_decodes_a_first_try_acceptance() {
    let client = client(ScriptedTransport::new(vec![ok_xml(ACCEPTED)]));
    let outcome = client.submit(SIGNED, &meta()).await.unwrap();
    assert_eq!(
        outcome,
        SubmissionOutcome::Accepted {
            track_id: "555001".into()
        }
    );
}

#[tokio::test]
async fn submit_retries_once_with_reduced_payload_after_http_500() {
    let transport =
        ScriptedTransport::new(vec![http(500, "internal error"), ok_xml(ACCEPTED)]);
    let client = client(transport);
    let outcome = client.submit(SIGNED, &meta()).await.unwrap();
    assert_eq!(
        outcome,
        SubmissionOutcome::Accepted {
            track_id: "555001".into()
        }
    );

    let bodies = client_bodies(&client);
    assert_eq!(bodies.len(), 2);
    // Second attempt carries the bare <DTE> fragment, no declaration
    let reduced = documento_of(&bodies[1]);
    assert!(reduced.starts_with("<DTE"));
    assert!(!reduced.contains("<?xml"));
    // First attempt carried the full document
    assert!(documento_of(&bodies[0]).starts_with("<?xml"));
}

#[tokio::test]
async fn rejection_on_both_attempts_is_terminal() {
    let transport = ScriptedTransport::new(vec![
        http(400, "RUT no autorizado"),
        http(400, "RUT no autorizado"),
    ]);
    let client = client(transport);
    let err = client.submit(SIGNED, &meta()).await.unwrap_err();
    assert!(matches!(err, DteError::GatewayRejected(_)));
    assert!(err.to_string().contains("RUT no autorizado"));
    assert_eq!(client_bodies(&client).len(), 2, "exactly one reduced retry");
}

#[tokio::test]
async fn fivehundred_on_both_attempts_is_transient() {
    let transport = ScriptedTransport::new(vec![http(503, "down"), http(503, "down")]);
    let client = client(transport);
    let err = client.submit(SIGNED, &meta()).await.unwrap_err();
    assert!(matches!(err, DteError::GatewayTransient(_)));
}

#[tokio::test]
async fn poll_status_reports_pending_then_uses_same_decoder() {
    let pending = "<RESPUESTA><ESTADO>SOK</ESTADO><GLOSA>Schema validado</GLOSA></RESPUESTA>";
    let client = client(ScriptedTransport::new(vec![ok_xml(pending)]));
    let outcome = client.poll_status("555001").await.unwrap();
    assert_eq!(outcome, SubmissionOutcome::Pending { track_id: None });
}

#[tokio::test]
async fn poll_status_decodes_json_wrapper() {
    let body = format!("{{\"Data\":\"{}\"}}", BASE64.encode(ACCEPTED));
    let client = client(ScriptedTransport::new(vec![Ok(TransportResponse {
        status: 200,
        content_type: Some("application/json".into()),
        body: body.into_bytes(),
    })]));
    let outcome = client.poll_status("555001").await.unwrap();
    assert_eq!(
        outcome,
        SubmissionOutcome::Accepted {
            track_id: "555001".into()
        }
    );
}

#[tokio::test]
async fn fetch_rendered_copy_accepts_base64_wrapped_pdf() {
    let body = format!("{{\"Data\":\"{}\"}}", BASE64.encode(b"%PDF-1.4 fake"));
    let transport = ScriptedTransport::new(vec![Ok(TransportResponse {
        status: 200,
        content_type: Some("application/json".into()),
        body: body.into_bytes(),
    })]);
    let client = client(transport);
    let bytes = client
        .fetch_rendered_copy(
            DteType::Invoice,
            45,
            &CopyParams {
                rut: "76543210-3".parse().unwrap(),
                issued: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(bytes, b"%PDF-1.4 fake");
}

#[tokio::test]
async fn network_errors_pass_through_as_transient() {
    let transport = ScriptedTransport::new(vec![Err(DteError::GatewayTransient(
        "connection refused".into(),
    ))]);
    let client = client(transport);
    let err = client.submit(SIGNED, &meta()).await.unwrap_err();
    assert!(matches!(err, DteError::GatewayTransient(_)));
}

// -- helpers --

fn client_bodies(client: &GatewayClient<ScriptedTransport>) -> Vec<String> {
    client.transport().post_bodies()
}

/// Decodes the base64 Documento field out of a Solicitud envelope.
fn documento_of(envelope: &str) -> String {
    let start = envelope.find("<Documento>").unwrap() + "<Documento>".len();
    let end = envelope.find("</Documento>").unwrap();
    String::from_utf8(BASE64.decode(&envelope[start..end]).unwrap()).unwrap()
}
