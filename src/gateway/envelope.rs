use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDate;

use crate::core::DteError;

/// Which gateway endpoint a submission targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Test,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "CER",
            Environment::Production => "PROD",
        }
    }
}

/// Per-submission metadata: the taxpayer's authorization resolution and
/// the barcode geometry for the rendered copy.
///
/// The resolution number and date must match what the gateway has on
/// file for the caller; a mismatch is a hard rejection, not a data
/// error.
#[derive(Debug, Clone)]
pub struct SubmitMeta {
    pub resolution_number: u32,
    pub resolution_date: NaiveDate,
    pub barcode_width: u32,
    pub barcode_height: u32,
}

impl SubmitMeta {
    pub fn new(resolution_number: u32, resolution_date: NaiveDate) -> Self {
        Self {
            resolution_number,
            resolution_date,
            // Default geometry for the printed TED barcode
            barcode_width: 590,
            barcode_height: 120,
        }
    }

    pub fn barcode(mut self, width: u32, height: u32) -> Self {
        self.barcode_width = width;
        self.barcode_height = height;
        self
    }
}

/// Builds the `Solicitud` submission envelope. Field order is fixed;
/// the gateway's parser is positional in practice.
///
/// Every field is either a fixed token, base64, or a formatted number,
/// so no XML escaping is needed here.
pub fn submit_envelope(
    environment: Environment,
    signed_xml: &str,
    meta: &SubmitMeta,
) -> Result<String, DteError> {
    if signed_xml.trim().is_empty() {
        return Err(DteError::GatewayProtocol("empty document body".into()));
    }
    let document_b64 = BASE64.encode(signed_xml.as_bytes());
    Ok(format!(
        concat!(
            "<Solicitud>",
            "<Ambiente>{}</Ambiente>",
            "<Documento>{}</Documento>",
            "<NroResolucion>{}</NroResolucion>",
            "<FchResolucion>{}</FchResolucion>",
            "<AnchoCodigoBarra>{}</AnchoCodigoBarra>",
            "<AltoCodigoBarra>{}</AltoCodigoBarra>",
            "</Solicitud>"
        ),
        environment.as_str(),
        document_b64,
        meta.resolution_number,
        meta.resolution_date.format("%Y-%m-%d"),
        meta.barcode_width,
        meta.barcode_height,
    ))
}
