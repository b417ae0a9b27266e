//! CAF (Código de Autorización de Folios) import and folio allocation.
//!
//! A CAF is an authority-issued, cryptographically endorsed block of
//! sequential folio numbers for one document type. Folios drawn from it
//! are scarce and non-reusable: once allocated, a folio is spent for
//! life, whether or not the document it was bound to succeeds.

mod allocator;
mod parse;

pub use allocator::*;
pub use parse::*;
