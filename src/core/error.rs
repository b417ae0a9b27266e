use thiserror::Error;

/// Errors that can occur while issuing a DTE.
///
/// Allocation and validation errors surface before any folio is consumed.
/// Every variant after folio binding is recorded against that folio by the
/// lifecycle, since folios are a scarce, audited resource.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DteError {
    /// No CAF range exists for the requested (company, document type).
    #[error("no folio range authorized: {0}")]
    NotAuthorized(String),

    /// Every active CAF range for the type has been consumed.
    #[error("folio ranges exhausted: {0}")]
    Exhausted(String),

    /// The document payload is malformed; recoverable by correcting input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The signing credential is unusable (bad file, wrong password).
    /// Requires administrator intervention.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Cryptographic or XML processing failure while signing.
    /// Fatal for the attempt; the folio is already spent.
    #[error("signing error: {0}")]
    Signing(String),

    /// Network or timeout failure talking to the gateway; retryable.
    #[error("transient gateway error: {0}")]
    GatewayTransient(String),

    /// Explicit rejection from the gateway or tax authority; terminal.
    /// The folio is spent and the document must be reissued under a new one.
    #[error("gateway rejected document: {0}")]
    GatewayRejected(String),

    /// The gateway response could not be decoded in any known format.
    /// Treated as transient once, then surfaced.
    #[error("unparseable gateway response: {0}")]
    GatewayProtocol(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Folio range bookkeeping violation (overlapping import, bad state).
    #[error("folio state error: {0}")]
    Folio(String),
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "reference.reason").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Join a list of validation errors into a single [`DteError::Validation`].
pub fn validation_failure(errors: &[ValidationError]) -> DteError {
    let msg = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    DteError::Validation(msg)
}
