use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::arithmetic;
use super::error::{DteError, validation_failure};
use super::types::*;
use super::validation;

/// Builder for constructing valid DTE drafts.
///
/// ```
/// use chrono::NaiveDate;
/// use dte_cl::core::*;
/// use rust_decimal_macros::dec;
///
/// let draft = DteBuilder::new(DteType::Invoice, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
///     .issuer(PartyBuilder::new("76543210-3".parse().unwrap(), "ACME SpA")
///         .line_of_business("Desarrollo de software")
///         .build())
///     .receiver(PartyBuilder::new("12345678-5".parse().unwrap(), "Cliente Ltda").build())
///     .add_line(LineItemBuilder::new("Consultoría", dec!(2), dec!(1190)).build())
///     .build()
///     .unwrap();
/// ```
pub struct DteBuilder {
    dte_type: DteType,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    issuer: Option<Party>,
    receiver: Option<Party>,
    lines: Vec<LineItem>,
    reference: Option<Reference>,
}

impl DteBuilder {
    pub fn new(dte_type: DteType, issue_date: NaiveDate) -> Self {
        Self {
            dte_type,
            issue_date,
            due_date: None,
            issuer: None,
            receiver: None,
            lines: Vec::new(),
            reference: None,
        }
    }

    pub fn due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn issuer(mut self, party: Party) -> Self {
        self.issuer = Some(party);
        self
    }

    pub fn receiver(mut self, party: Party) -> Self {
        self.receiver = Some(party);
        self
    }

    /// Append a line; line numbers are assigned in order of addition.
    pub fn add_line(mut self, mut line: LineItem) -> Self {
        line.number = self.lines.len() as u32 + 1;
        self.lines.push(line);
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Build the draft, computing line amounts and totals and running
    /// validation. Returns all validation errors joined, not just the first.
    pub fn build(self) -> Result<DteDraft, DteError> {
        let mut draft = self.assemble()?;
        arithmetic::calculate_totals(&mut draft);
        let errors = validation::validate_draft(&draft);
        if !errors.is_empty() {
            return Err(validation_failure(&errors));
        }
        Ok(draft)
    }

    /// Build without validation — useful for tests or importing external data.
    /// The issuer is still required; everything else is taken as-is.
    pub fn build_unchecked(self) -> Result<DteDraft, DteError> {
        let mut draft = self.assemble()?;
        arithmetic::calculate_totals(&mut draft);
        Ok(draft)
    }

    fn assemble(self) -> Result<DteDraft, DteError> {
        let issuer = self
            .issuer
            .ok_or_else(|| DteError::Validation("issuer is required".into()))?;
        Ok(DteDraft {
            dte_type: self.dte_type,
            issue_date: self.issue_date,
            due_date: self.due_date,
            issuer,
            receiver: self.receiver,
            lines: self.lines,
            reference: self.reference,
            totals: None,
        })
    }
}

/// Builder for a [`Party`] (issuer or receiver).
pub struct PartyBuilder {
    rut: Rut,
    name: String,
    line_of_business: Option<String>,
    activity_code: Option<u32>,
    address: Option<String>,
    comuna: Option<String>,
    city: Option<String>,
}

impl PartyBuilder {
    pub fn new(rut: Rut, name: impl Into<String>) -> Self {
        Self {
            rut,
            name: name.into(),
            line_of_business: None,
            activity_code: None,
            address: None,
            comuna: None,
            city: None,
        }
    }

    pub fn line_of_business(mut self, giro: impl Into<String>) -> Self {
        self.line_of_business = Some(giro.into());
        self
    }

    pub fn activity_code(mut self, code: u32) -> Self {
        self.activity_code = Some(code);
        self
    }

    pub fn address(
        mut self,
        street: impl Into<String>,
        comuna: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        self.address = Some(street.into());
        self.comuna = Some(comuna.into());
        self.city = Some(city.into());
        self
    }

    pub fn build(self) -> Party {
        Party {
            rut: self.rut,
            name: self.name,
            line_of_business: self.line_of_business,
            activity_code: self.activity_code,
            address: self.address,
            comuna: self.comuna,
            city: self.city,
        }
    }
}

/// Builder for a detail line. Unit prices are tax-inclusive; lines are
/// standard-rate (19% IVA) unless marked otherwise.
pub struct LineItemBuilder {
    item_name: String,
    description: Option<String>,
    quantity: Decimal,
    unit_price: Decimal,
    tax: LineTax,
}

impl LineItemBuilder {
    pub fn new(item_name: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            item_name: item_name.into(),
            description: None,
            quantity,
            unit_price,
            tax: LineTax::Standard,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn exempt(mut self) -> Self {
        self.tax = LineTax::Exempt;
        self
    }

    /// Additional specific tax on top of IVA, by SII code and rate
    /// (as a fraction, e.g. `dec!(0.10)` for 10%).
    pub fn specific_tax(mut self, code: u16, rate: Decimal) -> Self {
        self.tax = LineTax::Specific { code, rate };
        self
    }

    pub fn build(self) -> LineItem {
        LineItem {
            number: 0, // assigned by DteBuilder::add_line
            item_name: self.item_name,
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            tax: self.tax,
            amounts: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn build_computes_totals() {
        let draft = DteBuilder::new(DteType::Invoice, date(2024, 6, 15))
            .issuer(
                PartyBuilder::new("76543210-3".parse().unwrap(), "ACME SpA")
                    .line_of_business("Software")
                    .build(),
            )
            .receiver(PartyBuilder::new("12345678-5".parse().unwrap(), "Cliente").build())
            .add_line(LineItemBuilder::new("A", dec!(2), dec!(1190)).build())
            .add_line(LineItemBuilder::new("B", dec!(1), dec!(595)).build())
            .build()
            .unwrap();

        let totals = draft.totals.unwrap();
        assert_eq!(totals.net, dec!(2500));
        assert_eq!(totals.iva, dec!(475));
        assert_eq!(totals.total, dec!(2975));
        assert_eq!(draft.lines[0].number, 1);
        assert_eq!(draft.lines[1].number, 2);
    }

    #[test]
    fn build_rejects_invalid_draft() {
        let err = DteBuilder::new(DteType::CreditNote, date(2024, 6, 15))
            .issuer(
                PartyBuilder::new("76543210-3".parse().unwrap(), "ACME SpA")
                    .line_of_business("Software")
                    .build(),
            )
            .receiver(PartyBuilder::new("12345678-5".parse().unwrap(), "Cliente").build())
            .add_line(LineItemBuilder::new("Anulación", dec!(1), dec!(1190)).build())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("reference"));
    }
}
