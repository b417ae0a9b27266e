use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DteError;

/// SII document type codes — the closed set of issuable DTEs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DteType {
    /// 33 — Factura electrónica.
    Invoice,
    /// 34 — Factura exenta (all lines tax-exempt).
    ExemptInvoice,
    /// 39 — Boleta electrónica (consumer receipt).
    Receipt,
    /// 52 — Guía de despacho electrónica.
    DispatchGuide,
    /// 56 — Nota de débito electrónica.
    DebitNote,
    /// 61 — Nota de crédito electrónica.
    CreditNote,
}

impl DteType {
    /// SII numeric type code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Invoice => 33,
            Self::ExemptInvoice => 34,
            Self::Receipt => 39,
            Self::DispatchGuide => 52,
            Self::DebitNote => 56,
            Self::CreditNote => 61,
        }
    }

    /// Parse from an SII numeric type code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            33 => Some(Self::Invoice),
            34 => Some(Self::ExemptInvoice),
            39 => Some(Self::Receipt),
            52 => Some(Self::DispatchGuide),
            56 => Some(Self::DebitNote),
            61 => Some(Self::CreditNote),
            _ => None,
        }
    }

    /// Receipt-like types may omit the receiver; it defaults to the
    /// generic consumer identity.
    pub fn receiver_optional(&self) -> bool {
        matches!(self, Self::Receipt)
    }

    /// Credit and debit notes must reference the affected document.
    pub fn requires_reference(&self) -> bool {
        matches!(self, Self::CreditNote | Self::DebitNote)
    }
}

impl fmt::Display for DteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Chilean tax identifier (RUT): numeric body plus a mod-11 check digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rut {
    /// Numeric body, without separators.
    pub number: u32,
    /// Check digit: '0'..'9' or 'K'.
    pub check_digit: char,
}

impl Rut {
    /// Generic consumer identity, used as the default receiver for
    /// receipt-like types (boletas without an identified buyer).
    pub const GENERIC_CONSUMER: Rut = Rut {
        number: 66_666_666,
        check_digit: '6',
    };

    pub fn new(number: u32, check_digit: char) -> Self {
        Self {
            number,
            check_digit: check_digit.to_ascii_uppercase(),
        }
    }

    /// Compute the mod-11 check digit for a RUT body.
    pub fn compute_check_digit(number: u32) -> char {
        let mut n = number;
        let mut sum: u32 = 0;
        let mut factor = 2;
        while n > 0 {
            sum += (n % 10) * factor;
            n /= 10;
            factor = if factor == 7 { 2 } else { factor + 1 };
        }
        match 11 - (sum % 11) {
            11 => '0',
            10 => 'K',
            d => char::from_digit(d, 10).unwrap_or('0'),
        }
    }

    /// Whether the stored check digit matches the body.
    pub fn is_valid(&self) -> bool {
        Self::compute_check_digit(self.number) == self.check_digit
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.number, self.check_digit)
    }
}

impl FromStr for Rut {
    type Err = DteError;

    /// Parse "12345678-5" or "12.345.678-5".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != '.').collect();
        let (body, dv) = cleaned
            .rsplit_once('-')
            .ok_or_else(|| DteError::Validation(format!("RUT '{s}' missing check digit")))?;
        let number: u32 = body
            .parse()
            .map_err(|_| DteError::Validation(format!("RUT '{s}' has a non-numeric body")))?;
        let mut chars = dv.chars();
        let (Some(digit), None) = (chars.next(), chars.next()) else {
            return Err(DteError::Validation(format!(
                "RUT '{s}' check digit must be a single character"
            )));
        };
        Ok(Rut::new(number, digit))
    }
}

/// Issuer or receiver of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    /// RUT identifier.
    pub rut: Rut,
    /// Legal name (razón social).
    pub name: String,
    /// Line of business (giro).
    pub line_of_business: Option<String>,
    /// SII economic activity code (issuer only).
    pub activity_code: Option<u32>,
    /// Street address.
    pub address: Option<String>,
    /// Comuna.
    pub comuna: Option<String>,
    /// City.
    pub city: Option<String>,
}

/// Tax treatment of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineTax {
    /// Subject to the general 19% IVA.
    Standard,
    /// Tax-exempt; the whole line amount goes to the exempt bucket.
    Exempt,
    /// IVA plus an additional specific tax (impuesto adicional),
    /// identified by its SII code with its rate as a fraction (e.g. 0.10).
    Specific { code: u16, rate: Decimal },
}

/// A single detail line. Unit prices are **tax-inclusive**.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// 1-based line number.
    pub number: u32,
    /// Item name.
    pub item_name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Invoiced quantity.
    pub quantity: Decimal,
    /// Tax-inclusive unit price.
    pub unit_price: Decimal,
    /// Tax treatment.
    pub tax: LineTax,
    /// Computed amounts, set by [`compute_line_amounts`](super::compute_line_amounts).
    pub amounts: Option<LineAmounts>,
}

/// Per-line computed amounts, in whole pesos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    /// quantity * unit price, rounded at the line boundary.
    pub gross: Decimal,
    /// Net amount extracted from the tax-inclusive gross.
    pub net: Decimal,
    /// Exempt amount (gross for exempt lines, zero otherwise).
    pub exempt: Decimal,
    /// General sales tax (IVA) component.
    pub iva: Decimal,
    /// Specific (additional) tax component.
    pub specific: Decimal,
}

/// Reference reason codes (SII CodRef).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceCode {
    /// 1 — Annuls the referenced document.
    Annuls,
    /// 2 — Corrects the referenced document's text.
    CorrectsText,
    /// 3 — Corrects the referenced document's amounts.
    CorrectsAmounts,
}

impl ReferenceCode {
    pub fn code(&self) -> u8 {
        match self {
            Self::Annuls => 1,
            Self::CorrectsText => 2,
            Self::CorrectsAmounts => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Annuls),
            2 => Some(Self::CorrectsText),
            3 => Some(Self::CorrectsAmounts),
            _ => None,
        }
    }
}

/// Reference to the affected original document — mandatory for
/// credit and debit notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    /// Type of the referenced document.
    pub doc_type: DteType,
    /// Folio of the referenced document.
    pub folio: u64,
    /// Issue date of the referenced document.
    pub date: NaiveDate,
    /// Reason code.
    pub code: ReferenceCode,
    /// Free-text reason.
    pub reason: String,
}

/// Derived document totals, in whole pesos. Never input directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of line net amounts.
    pub net: Decimal,
    /// Sum of exempt line amounts.
    pub exempt: Decimal,
    /// Sum of line IVA components.
    pub iva: Decimal,
    /// Sum of line specific-tax components.
    pub specific: Decimal,
    /// net + exempt + iva + specific.
    pub total: Decimal,
}

/// A document before folio binding — mutable, not yet issuable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DteDraft {
    pub dte_type: DteType,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub issuer: Party,
    /// Optional only for receipt-like types.
    pub receiver: Option<Party>,
    pub lines: Vec<LineItem>,
    /// Mandatory for credit/debit notes.
    pub reference: Option<Reference>,
    /// Derived totals, set by the builder.
    pub totals: Option<Totals>,
}

impl DteDraft {
    /// Bind an allocated folio, producing the immutable issuable document.
    ///
    /// The folio is spent the moment this is called; a [`Dte`] is never
    /// regenerated with a different folio.
    pub fn bind_folio(self, folio: u64) -> Dte {
        Dte {
            dte_type: self.dte_type,
            folio,
            issue_date: self.issue_date,
            due_date: self.due_date,
            issuer: self.issuer,
            receiver: self.receiver,
            lines: self.lines,
            reference: self.reference,
            totals: self.totals,
        }
    }
}

/// A folio-bound document, immutable except for lifecycle state kept
/// outside this type (see the `lifecycle` module).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dte {
    pub dte_type: DteType,
    pub folio: u64,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub issuer: Party,
    pub receiver: Option<Party>,
    pub lines: Vec<LineItem>,
    pub reference: Option<Reference>,
    pub totals: Option<Totals>,
}
