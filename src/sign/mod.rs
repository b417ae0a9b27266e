//! XMLDSig signing for DTE documents.
//!
//! The digest/signature pair is SHA-1 + RSA (PKCS#1 v1.5), the legacy
//! pair the receiving authority requires. It is deliberately not
//! configurable: changing it would break wire compatibility.

mod c14n;
mod keys;
mod xmldsig;

pub use c14n::*;
pub use keys::*;
pub use xmldsig::*;
