//! Document lifecycle: allocate, build, sign, submit, record.
//!
//! A folio is spent the moment it is allocated. Everything that fails
//! after allocation must still land the record in a terminal state
//! rather than being discarded, so no folio is ever left unresolved.

mod record;

pub use record::*;

use crate::caf::FolioAllocator;
use crate::core::{DteDraft, DteError, Rut, validate_draft, validation_failure};
use crate::gateway::{
    GatewayClient, RetryPolicy, SubmissionOutcome, SubmitMeta, Transport,
};
use crate::sign::{SigningIdentity, sign_dte};
use crate::xml::dte_xml;

/// What one issuance attempt produced. Always carries the record, even
/// on failure: the folio is spent either way and must be accounted for.
#[derive(Debug)]
pub struct IssueReport {
    pub folio: u64,
    pub state: LifecycleState,
    pub record: SubmissionRecord,
    /// Present from the moment signing succeeded, for archival and
    /// later resubmission.
    pub signed_xml: Option<String>,
    pub reason: Option<String>,
}

/// Ties the pipeline together: folio allocation, XML build, signing,
/// gateway submission, and the audit record.
pub struct DteIssuer<T: Transport> {
    allocator: FolioAllocator,
    identity: SigningIdentity,
    client: GatewayClient<T>,
    policy: RetryPolicy,
}

impl<T: Transport> DteIssuer<T> {
    pub fn new(
        allocator: FolioAllocator,
        identity: SigningIdentity,
        client: GatewayClient<T>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            allocator,
            identity,
            client,
            policy,
        }
    }

    pub fn allocator(&self) -> &FolioAllocator {
        &self.allocator
    }

    pub fn client(&self) -> &GatewayClient<T> {
        &self.client
    }

    /// Issues one document end to end.
    ///
    /// Validation and allocation failures return `Err` with no folio
    /// consumed. Any failure after the folio is bound returns
    /// `Ok(IssueReport)` with a `Failed` record instead: the folio is
    /// permanently spent and the caller must reissue under a new one.
    ///
    /// The allocator lock is never held across the network call; folio
    /// allocation and submission are separate critical sections.
    pub async fn issue(
        &self,
        company: &Rut,
        draft: DteDraft,
        meta: &SubmitMeta,
    ) -> Result<IssueReport, DteError> {
        let errors = validate_draft(&draft);
        if !errors.is_empty() {
            return Err(validation_failure(&errors));
        }

        let folio = self.allocator.next_folio(company, draft.dte_type)?;
        let mut record = SubmissionRecord::new(draft.dte_type, folio);
        let dte = draft.bind_folio(folio);

        let xml = match dte_xml(&dte) {
            Ok(xml) => xml,
            Err(e) => return Ok(self.abandon(record, e)),
        };
        let signed = match sign_dte(&xml, &self.identity) {
            Ok(signed) => signed,
            Err(e) => return Ok(self.abandon(record, e)),
        };
        record.advance(LifecycleState::Signed);

        let outcome = self.policy.run(|| self.client.submit(&signed, meta)).await;
        match outcome {
            Ok(outcome) => {
                record.advance(LifecycleState::Submitted);
                apply_outcome(&mut record, &outcome);
            }
            Err(DteError::GatewayRejected(reason)) => {
                record.error = Some(reason);
                record.advance(LifecycleState::Rejected);
            }
            Err(e) => {
                // Transient budget exhausted. The record stays Signed
                // with the signed XML preserved so the caller can
                // resubmit without spending another folio.
                record.error = Some(e.to_string());
                tracing::warn!(folio, error = %e, "submission attempts exhausted");
            }
        }

        Ok(IssueReport {
            folio,
            state: record.state,
            reason: record.error.clone(),
            signed_xml: Some(signed),
            record,
        })
    }

    fn abandon(&self, mut record: SubmissionRecord, error: DteError) -> IssueReport {
        // The folio cannot be returned to the pool; this is a
        // compliance-relevant anomaly, not a routine failure.
        tracing::error!(
            folio = record.folio,
            dte_type = %record.dte_type,
            error = %error,
            "folio spent on a document that could not be issued"
        );
        record.fail(error.to_string());
        IssueReport {
            folio: record.folio,
            state: record.state,
            reason: record.error.clone(),
            signed_xml: None,
            record,
        }
    }

    /// Advances a pending record by asking the gateway for its verdict.
    /// Terminal records are left untouched.
    pub async fn poll(&self, record: &mut SubmissionRecord) -> Result<(), DteError> {
        if record.is_terminal() {
            return Ok(());
        }
        let track_id = record
            .track_id
            .clone()
            .ok_or_else(|| DteError::Folio(format!("folio {} has no track id to poll", record.folio)))?;
        let outcome = self.policy.run(|| self.client.poll_status(&track_id)).await?;
        apply_outcome(record, &outcome);
        Ok(())
    }

    /// Re-submits an already-signed document, e.g. after a transient
    /// outage exhausted the retry budget during `issue`.
    ///
    /// Refuses terminal records: a settled folio must never hit the
    /// gateway again.
    pub async fn resubmit(
        &self,
        record: &mut SubmissionRecord,
        signed_xml: &str,
        meta: &SubmitMeta,
    ) -> Result<(), DteError> {
        if record.is_terminal() {
            return Err(DteError::Folio(format!(
                "folio {} is already settled ({:?})",
                record.folio, record.state
            )));
        }
        let outcome = self.policy.run(|| self.client.submit(signed_xml, meta)).await;
        match outcome {
            Ok(outcome) => {
                if record.state == LifecycleState::Signed {
                    record.advance(LifecycleState::Submitted);
                }
                apply_outcome(record, &outcome);
                Ok(())
            }
            Err(DteError::GatewayRejected(reason)) => {
                record.error = Some(reason.clone());
                record.advance(LifecycleState::Rejected);
                Err(DteError::GatewayRejected(reason))
            }
            Err(e) => {
                record.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

fn apply_outcome(record: &mut SubmissionRecord, outcome: &SubmissionOutcome) {
    match outcome {
        SubmissionOutcome::Accepted { track_id } => {
            record.track_id = Some(track_id.clone());
            record.last_response = Some(format!("accepted, track {track_id}"));
            record.advance(LifecycleState::Accepted);
        }
        SubmissionOutcome::Rejected { reason } => {
            record.error = Some(reason.clone());
            record.last_response = Some(format!("rejected: {reason}"));
            record.advance(LifecycleState::Rejected);
        }
        SubmissionOutcome::Pending { track_id } => {
            if let Some(track_id) = track_id {
                record.track_id = Some(track_id.clone());
            }
            record.last_response = Some("received, no verdict yet".into());
            if record.state != LifecycleState::PendingConfirmation {
                record.advance(LifecycleState::PendingConfirmation);
            }
        }
    }
}
