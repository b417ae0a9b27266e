//! Canonical DTE XML generation.
//!
//! Output is deliberately unindented: the `Documento` element is the
//! exact byte sequence later digested and signed, so it must be stable.

mod dte;
mod writer;

pub use dte::*;
pub use writer::*;
