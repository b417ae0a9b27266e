//! # dte-cl
//!
//! Chilean electronic tax document (DTE) issuance library covering the full
//! pipeline: CAF folio ranges, canonical XML generation, XMLDSig signing, and
//! submission to a certification gateway.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Line prices are **tax-inclusive**; net and IVA are extracted by division,
//! never added on top of a net price (see [`core::compute_line_amounts`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use dte_cl::core::*;
//! use rust_decimal_macros::dec;
//!
//! let draft = DteBuilder::new(DteType::Invoice, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
//!     .issuer(PartyBuilder::new("76543210-3".parse().unwrap(), "ACME SpA")
//!         .line_of_business("Desarrollo de software")
//!         .build())
//!     .receiver(PartyBuilder::new("12345678-5".parse().unwrap(), "Cliente Ltda").build())
//!     .add_line(LineItemBuilder::new("Consultoría", dec!(2), dec!(1190)).build())
//!     .build()
//!     .unwrap();
//!
//! let totals = draft.totals.as_ref().unwrap();
//! assert_eq!(totals.net, dec!(2000));
//! assert_eq!(totals.iva, dec!(380));
//! assert_eq!(totals.total, dec!(2380));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | DTE types, tax arithmetic, validation, builders |
//! | `xml` | Canonical DTE XML generation |
//! | `caf` | CAF import and folio allocation |
//! | `sign` | XMLDSig signing (SHA-1 + RSA, as the SII requires) |
//! | `gateway` | Certification gateway HTTP client |
//! | `lifecycle` | Issuance state machine tying everything together |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "xml")]
pub mod xml;

#[cfg(feature = "caf")]
pub mod caf;

#[cfg(feature = "sign")]
pub mod sign;

#[cfg(feature = "gateway")]
pub mod gateway;

#[cfg(feature = "lifecycle")]
pub mod lifecycle;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
