use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use x509_cert::Certificate;
use x509_cert::der::{DecodePem, Encode};

use crate::core::DteError;

fn cert_err(context: &str, e: impl std::fmt::Display) -> DteError {
    DteError::Certificate(format!("{context}: {e}"))
}

/// A signer's X.509 certificate together with its RSA private key.
///
/// Built once at startup and shared by reference; the key never leaves
/// this struct except through the signing operation itself.
#[derive(Debug)]
pub struct SigningIdentity {
    private_key: RsaPrivateKey,
    cert_der: Vec<u8>,
}

impl SigningIdentity {
    /// Loads an identity from a PEM certificate and an unencrypted PEM
    /// private key (PKCS#8, with a PKCS#1 fallback).
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self, DteError> {
        let cert_der = parse_cert(cert_pem)?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(key_pem))
            .map_err(|e| cert_err("private key", e))?;
        Ok(Self {
            private_key,
            cert_der,
        })
    }

    /// Loads an identity from a PEM certificate and a password-protected
    /// PKCS#8 private key. A wrong password surfaces as
    /// [`DteError::Certificate`].
    pub fn from_encrypted_pem(
        cert_pem: &str,
        key_pem: &str,
        password: &str,
    ) -> Result<Self, DteError> {
        let cert_der = parse_cert(cert_pem)?;
        let private_key = RsaPrivateKey::from_pkcs8_encrypted_pem(key_pem, password.as_bytes())
            .map_err(|e| cert_err("encrypted private key", e))?;
        Ok(Self {
            private_key,
            cert_der,
        })
    }

    /// Builds an identity from an already-decoded key and certificate.
    pub fn from_parts(private_key: RsaPrivateKey, cert_der: Vec<u8>) -> Self {
        Self {
            private_key,
            cert_der,
        }
    }

    pub(crate) fn key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Public modulus, big-endian, base64.
    pub fn modulus_b64(&self) -> String {
        BASE64.encode(self.private_key.n().to_bytes_be())
    }

    /// Public exponent, big-endian, base64.
    pub fn exponent_b64(&self) -> String {
        BASE64.encode(self.private_key.e().to_bytes_be())
    }

    /// DER certificate, base64 (the X509Certificate element body).
    pub fn certificate_b64(&self) -> String {
        BASE64.encode(&self.cert_der)
    }
}

fn parse_cert(cert_pem: &str) -> Result<Vec<u8>, DteError> {
    let cert =
        Certificate::from_pem(cert_pem.as_bytes()).map_err(|e| cert_err("certificate", e))?;
    cert.to_der().map_err(|e| cert_err("certificate", e))
}
