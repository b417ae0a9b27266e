use rust_decimal::Decimal;

use super::error::ValidationError;
use super::types::*;

/// Validate a draft document before issuance.
/// Returns all validation errors found (not just the first).
///
/// This runs before any folio is allocated — a draft that fails here
/// never consumes a folio.
pub fn validate_draft(draft: &DteDraft) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_party(&draft.issuer, "issuer", &mut errors);
    if draft.issuer.line_of_business.is_none() {
        errors.push(ValidationError::new(
            "issuer.line_of_business",
            "issuer must declare a line of business (giro)",
        ));
    }

    match &draft.receiver {
        Some(receiver) => validate_party(receiver, "receiver", &mut errors),
        None => {
            if !draft.dte_type.receiver_optional() {
                errors.push(ValidationError::new(
                    "receiver",
                    format!(
                        "document type {} requires an identified receiver",
                        draft.dte_type
                    ),
                ));
            }
        }
    }

    if draft.lines.is_empty() {
        errors.push(ValidationError::new(
            "lines",
            "document must have at least one line item",
        ));
    }
    for (i, line) in draft.lines.iter().enumerate() {
        validate_line(line, i, &mut errors);
    }

    // Exempt invoices carry only exempt lines
    if draft.dte_type == DteType::ExemptInvoice
        && draft.lines.iter().any(|l| l.tax != LineTax::Exempt)
    {
        errors.push(ValidationError::new(
            "lines",
            "exempt invoice (34) cannot carry taxed lines",
        ));
    }

    match &draft.reference {
        Some(reference) => validate_reference(reference, &mut errors),
        None => {
            if draft.dte_type.requires_reference() {
                errors.push(ValidationError::new(
                    "reference",
                    format!(
                        "document type {} requires a reference to the affected document",
                        draft.dte_type
                    ),
                ));
            }
        }
    }

    if let Some(due) = draft.due_date {
        if due < draft.issue_date {
            errors.push(ValidationError::new(
                "due_date",
                "due date cannot precede the issue date",
            ));
        }
    }

    errors
}

fn validate_party(party: &Party, path: &str, errors: &mut Vec<ValidationError>) {
    if !party.rut.is_valid() {
        errors.push(ValidationError::new(
            format!("{path}.rut"),
            format!("RUT {} has an invalid check digit", party.rut),
        ));
    }
    if party.name.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{path}.name"),
            "name must not be empty",
        ));
    }
}

fn validate_line(line: &LineItem, index: usize, errors: &mut Vec<ValidationError>) {
    let path = format!("lines[{index}]");
    if line.item_name.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{path}.item_name"),
            "item name must not be empty",
        ));
    }
    if line.quantity <= Decimal::ZERO {
        errors.push(ValidationError::new(
            format!("{path}.quantity"),
            "quantity must be positive",
        ));
    }
    if line.unit_price < Decimal::ZERO {
        errors.push(ValidationError::new(
            format!("{path}.unit_price"),
            "unit price cannot be negative",
        ));
    }
    if let LineTax::Specific { rate, .. } = line.tax {
        if rate <= Decimal::ZERO {
            errors.push(ValidationError::new(
                format!("{path}.tax"),
                "specific tax rate must be positive",
            ));
        }
    }
}

fn validate_reference(reference: &Reference, errors: &mut Vec<ValidationError>) {
    if reference.folio == 0 {
        errors.push(ValidationError::new(
            "reference.folio",
            "referenced folio must be positive",
        ));
    }
    if reference.reason.trim().is_empty() {
        errors.push(ValidationError::new(
            "reference.reason",
            "reference reason must not be empty",
        ));
    }
}
