//! Core DTE types, tax arithmetic, validation, and builders.
//!
//! The data model follows the SII (Servicio de Impuestos Internos) DTE
//! semantic model: a closed set of document types, RUT identifiers, and
//! totals that are always derived from tax-inclusive line prices.

mod arithmetic;
mod builder;
mod error;
mod types;
mod validation;

pub use arithmetic::*;
pub use builder::*;
pub use error::*;
pub use types::*;
pub use validation::*;
