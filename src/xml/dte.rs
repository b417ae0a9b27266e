use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::writer::{XmlResult, XmlWriter, format_quantity};
use crate::core::{
    Dte, DteError, IVA_RATE, LineTax, Party, Rut, Totals, ValidationError,
    validation_failure,
};

/// The `Documento/@ID` value: `F{folio}T{type code}`.
pub fn documento_id(dte: &Dte) -> String {
    format!("F{}T{}", dte.folio, dte.dte_type.code())
}

/// Render a folio-bound document as canonical DTE XML.
///
/// Pure transformation: never touches folio ranges, never persists.
/// The per-type layout differences (generic consumer receiver for
/// receipts, mandatory reference block for notes) are driven by the
/// closed [`DteType`] set.
pub fn dte_xml(dte: &Dte) -> XmlResult {
    let errors = pre_render_checks(dte);
    if !errors.is_empty() {
        return Err(validation_failure(&errors));
    }
    let totals = dte
        .totals
        .as_ref()
        .ok_or_else(|| DteError::Validation("totals must be calculated before XML generation".into()))?;

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs("DTE", &[("version", "1.0")])?;
    w.start_element_with_attrs("Documento", &[("ID", &documento_id(dte))])?;

    write_encabezado(&mut w, dte, totals)?;
    for line in &dte.lines {
        write_detalle(&mut w, line)?;
    }
    if let Some(reference) = &dte.reference {
        w.start_element("Referencia")?;
        w.text_element("NroLinRef", "1")?;
        w.text_element("TpoDocRef", &reference.doc_type.code().to_string())?;
        w.text_element("FolioRef", &reference.folio.to_string())?;
        w.text_element("FchRef", &reference.date.to_string())?;
        w.text_element("CodRef", &reference.code.code().to_string())?;
        w.text_element("RazonRef", &reference.reason)?;
        w.end_element("Referencia")?;
    }

    w.end_element("Documento")?;
    w.end_element("DTE")?;
    w.into_string()
}

fn write_encabezado(w: &mut XmlWriter, dte: &Dte, totals: &Totals) -> Result<(), DteError> {
    w.start_element("Encabezado")?;

    w.start_element("IdDoc")?;
    w.text_element("TipoDTE", &dte.dte_type.code().to_string())?;
    w.text_element("Folio", &dte.folio.to_string())?;
    w.text_element("FchEmis", &dte.issue_date.to_string())?;
    if let Some(due) = &dte.due_date {
        w.text_element("FchVenc", &due.to_string())?;
    }
    w.end_element("IdDoc")?;

    write_emisor(w, &dte.issuer)?;

    match &dte.receiver {
        Some(receiver) => write_receptor(w, receiver)?,
        // Pre-render checks only allow this for receipt-like types
        None => write_generic_receptor(w)?,
    }

    write_totales(w, dte, totals)?;

    w.end_element("Encabezado")?;
    Ok(())
}

fn write_emisor(w: &mut XmlWriter, issuer: &Party) -> Result<(), DteError> {
    w.start_element("Emisor")?;
    w.text_element("RUTEmisor", &issuer.rut.to_string())?;
    w.text_element("RznSoc", &issuer.name)?;
    if let Some(giro) = &issuer.line_of_business {
        w.text_element("GiroEmis", giro)?;
    }
    if let Some(acteco) = issuer.activity_code {
        w.text_element("Acteco", &acteco.to_string())?;
    }
    if let Some(street) = &issuer.address {
        w.text_element("DirOrigen", street)?;
    }
    if let Some(comuna) = &issuer.comuna {
        w.text_element("CmnaOrigen", comuna)?;
    }
    if let Some(city) = &issuer.city {
        w.text_element("CiudadOrigen", city)?;
    }
    w.end_element("Emisor")?;
    Ok(())
}

fn write_receptor(w: &mut XmlWriter, receiver: &Party) -> Result<(), DteError> {
    w.start_element("Receptor")?;
    w.text_element("RUTRecep", &receiver.rut.to_string())?;
    w.text_element("RznSocRecep", &receiver.name)?;
    if let Some(giro) = &receiver.line_of_business {
        w.text_element("GiroRecep", giro)?;
    }
    if let Some(street) = &receiver.address {
        w.text_element("DirRecep", street)?;
    }
    if let Some(comuna) = &receiver.comuna {
        w.text_element("CmnaRecep", comuna)?;
    }
    if let Some(city) = &receiver.city {
        w.text_element("CiudadRecep", city)?;
    }
    w.end_element("Receptor")?;
    Ok(())
}

fn write_generic_receptor(w: &mut XmlWriter) -> Result<(), DteError> {
    w.start_element("Receptor")?;
    w.text_element("RUTRecep", &Rut::GENERIC_CONSUMER.to_string())?;
    w.text_element("RznSocRecep", "CONSUMIDOR FINAL")?;
    w.end_element("Receptor")?;
    Ok(())
}

fn write_totales(w: &mut XmlWriter, dte: &Dte, totals: &Totals) -> Result<(), DteError> {
    w.start_element("Totales")?;
    if totals.net > Decimal::ZERO || totals.iva > Decimal::ZERO {
        w.amount_element("MntNeto", totals.net)?;
    }
    if totals.exempt > Decimal::ZERO {
        w.amount_element("MntExe", totals.exempt)?;
    }
    if totals.iva > Decimal::ZERO {
        w.text_element("TasaIVA", &format_quantity(IVA_RATE * Decimal::ONE_HUNDRED))?;
        w.amount_element("IVA", totals.iva)?;
    }
    for (code, (rate, amount)) in specific_tax_breakdown(dte) {
        w.start_element("ImptoReten")?;
        w.text_element("TipoImp", &code.to_string())?;
        w.text_element("TasaImp", &format_quantity(rate * Decimal::ONE_HUNDRED))?;
        w.amount_element("MontoImp", amount)?;
        w.end_element("ImptoReten")?;
    }
    w.amount_element("MntTotal", totals.total)?;
    w.end_element("Totales")?;
    Ok(())
}

/// Specific-tax totals grouped by SII tax code.
fn specific_tax_breakdown(dte: &Dte) -> BTreeMap<u16, (Decimal, Decimal)> {
    let mut breakdown: BTreeMap<u16, (Decimal, Decimal)> = BTreeMap::new();
    for line in &dte.lines {
        if let LineTax::Specific { code, rate } = line.tax {
            if let Some(amounts) = &line.amounts {
                let entry = breakdown.entry(code).or_insert((rate, Decimal::ZERO));
                entry.1 += amounts.specific;
            }
        }
    }
    breakdown
}

fn write_detalle(w: &mut XmlWriter, line: &crate::core::LineItem) -> Result<(), DteError> {
    let amounts = line
        .amounts
        .ok_or_else(|| DteError::Validation("line amounts must be computed before XML".into()))?;
    w.start_element("Detalle")?;
    w.text_element("NroLinDet", &line.number.to_string())?;
    if line.tax == LineTax::Exempt {
        w.text_element("IndExe", "1")?;
    }
    w.text_element("NmbItem", &line.item_name)?;
    if let Some(description) = &line.description {
        w.text_element("DscItem", description)?;
    }
    w.quantity_element("QtyItem", line.quantity)?;
    w.quantity_element("PrcItem", line.unit_price)?;
    if let LineTax::Specific { code, .. } = line.tax {
        w.text_element("CodImpAdic", &code.to_string())?;
    }
    w.amount_element("MontoItem", amounts.gross)?;
    w.end_element("Detalle")?;
    Ok(())
}

fn pre_render_checks(dte: &Dte) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if dte.folio == 0 {
        errors.push(ValidationError::new("folio", "folio must be positive"));
    }
    if !dte.issuer.rut.is_valid() {
        errors.push(ValidationError::new(
            "issuer.rut",
            format!("RUT {} has an invalid check digit", dte.issuer.rut),
        ));
    }
    if dte.lines.is_empty() {
        errors.push(ValidationError::new(
            "lines",
            "document must have at least one line item",
        ));
    }
    if dte.receiver.is_none() && !dte.dte_type.receiver_optional() {
        errors.push(ValidationError::new(
            "receiver",
            format!("document type {} requires an identified receiver", dte.dte_type),
        ));
    }
    if dte.reference.is_none() && dte.dte_type.requires_reference() {
        errors.push(ValidationError::new(
            "reference",
            format!(
                "document type {} requires a reference to the affected document",
                dte.dte_type
            ),
        ));
    }
    errors
}
