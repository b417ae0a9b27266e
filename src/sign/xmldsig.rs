use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use quick_xml::Reader;
use quick_xml::events::Event;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha1::{Digest, Sha1};

use crate::core::DteError;
use crate::sign::{SigningIdentity, canonicalize};

const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
const C14N_METHOD: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
const SIGNATURE_METHOD: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
const DIGEST_METHOD: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

/// Extracts the `Documento` element from a DTE, as produced by
/// [`crate::xml::dte_xml`]. This is the byte range the signature digests,
/// so it is taken verbatim rather than re-serialized.
pub fn documento_fragment(xml: &str) -> Result<&str, DteError> {
    let start = xml
        .find("<Documento")
        .ok_or_else(|| DteError::Signing("no Documento element to sign".into()))?;
    let close = "</Documento>";
    let end = xml
        .rfind(close)
        .ok_or_else(|| DteError::Signing("unterminated Documento element".into()))?;
    if end < start {
        return Err(DteError::Signing("malformed Documento element".into()));
    }
    Ok(&xml[start..end + close.len()])
}

fn documento_id(fragment: &str) -> Result<String, DteError> {
    let mut reader = Reader::from_str(fragment);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Documento" => {
                for attr in e.attributes() {
                    let attr = attr
                        .map_err(|e| DteError::Signing(format!("bad Documento attribute: {e}")))?;
                    if attr.key.as_ref() == b"ID" {
                        let value = attr.unescape_value().map_err(|e| {
                            DteError::Signing(format!("bad Documento ID value: {e}"))
                        })?;
                        return Ok(value.into_owned());
                    }
                }
                return Err(DteError::Signing("Documento has no ID attribute".into()));
            }
            Ok(Event::Eof) => {
                return Err(DteError::Signing("no Documento element found".into()));
            }
            Err(e) => return Err(DteError::Signing(format!("XML parse error: {e}"))),
            _ => {}
        }
    }
}

fn build_signed_info(reference_uri: &str, digest_b64: &str, with_ns: bool) -> String {
    let ns = if with_ns {
        format!(" xmlns=\"{DS_NS}\"")
    } else {
        String::new()
    };
    format!(
        concat!(
            "<SignedInfo{}>",
            "<CanonicalizationMethod Algorithm=\"{}\"></CanonicalizationMethod>",
            "<SignatureMethod Algorithm=\"{}\"></SignatureMethod>",
            "<Reference URI=\"#{}\">",
            "<DigestMethod Algorithm=\"{}\"></DigestMethod>",
            "<DigestValue>{}</DigestValue>",
            "</Reference>",
            "</SignedInfo>"
        ),
        ns, C14N_METHOD, SIGNATURE_METHOD, reference_uri, DIGEST_METHOD, digest_b64
    )
}

/// Signs a DTE in place: digests the canonicalized `Documento`, signs the
/// canonicalized `SignedInfo` with the identity's RSA key, and embeds the
/// enveloped `Signature` element right before `</DTE>`.
pub fn sign_dte(xml: &str, identity: &SigningIdentity) -> Result<String, DteError> {
    let fragment = documento_fragment(xml)?;
    let id = documento_id(fragment)?;

    let canonical = canonicalize(fragment)?;
    let digest_b64 = BASE64.encode(Sha1::digest(canonical.as_bytes()));

    let signed_info = build_signed_info(&id, &digest_b64, true);
    let canonical_si = canonicalize(&signed_info)?;

    let signing_key = SigningKey::<Sha1>::new(identity.key().clone());
    let signature = signing_key
        .try_sign(canonical_si.as_bytes())
        .map_err(|e| DteError::Signing(format!("RSA signing failed: {e}")))?;
    let signature_b64 = BASE64.encode(signature.to_bytes());

    // The embedded SignedInfo inherits the ds namespace from Signature,
    // so it is serialized without the xmlns attribute.
    let signature_element = format!(
        concat!(
            "<Signature xmlns=\"{}\">",
            "{}",
            "<SignatureValue>{}</SignatureValue>",
            "<KeyInfo>",
            "<KeyValue>",
            "<RSAKeyValue>",
            "<Modulus>{}</Modulus>",
            "<Exponent>{}</Exponent>",
            "</RSAKeyValue>",
            "</KeyValue>",
            "<X509Data>",
            "<X509Certificate>{}</X509Certificate>",
            "</X509Data>",
            "</KeyInfo>",
            "</Signature>"
        ),
        DS_NS,
        build_signed_info(&id, &digest_b64, false),
        signature_b64,
        identity.modulus_b64(),
        identity.exponent_b64(),
        identity.certificate_b64(),
    );

    let close = "</DTE>";
    if !xml.contains(close) {
        return Err(DteError::Signing("no DTE envelope to sign".into()));
    }
    Ok(xml.replacen(close, &format!("{signature_element}{close}"), 1))
}

/// Structural check of a signed DTE: exactly one `Signature`, its
/// `Reference` URI pointing at the `Documento` ID, and non-empty digest
/// and signature values.
///
/// This does not recompute the digest or verify the RSA signature; it
/// answers "is this document signed" the way the submission path needs,
/// not "is this signature valid".
pub fn verify_structure(xml: &str) -> bool {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut documento_id: Option<String> = None;
    let mut signature_count = 0u32;
    let mut reference_uri: Option<String> = None;
    let mut digest_present = false;
    let mut value_present = false;
    let mut current: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = match std::str::from_utf8(e.name().as_ref()) {
                    Ok(n) => n.to_string(),
                    Err(_) => return false,
                };
                match name.as_str() {
                    "Documento" if documento_id.is_none() => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"ID" {
                                if let Ok(v) = attr.unescape_value() {
                                    documento_id = Some(v.into_owned());
                                }
                            }
                        }
                    }
                    "Signature" => signature_count += 1,
                    "Reference" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"URI" {
                                if let Ok(v) = attr.unescape_value() {
                                    reference_uri = Some(v.into_owned());
                                }
                            }
                        }
                    }
                    _ => {}
                }
                current.push(name);
            }
            Ok(Event::End(_)) => {
                current.pop();
            }
            Ok(Event::Text(ref e)) => {
                let text = match e.unescape() {
                    Ok(t) => t,
                    Err(_) => return false,
                };
                if text.trim().is_empty() {
                    continue;
                }
                match current.last().map(String::as_str) {
                    Some("DigestValue") => digest_present = true,
                    Some("SignatureValue") => value_present = true,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return false,
            _ => {}
        }
    }

    let Some(id) = documento_id else { return false };
    signature_count == 1
        && digest_present
        && value_present
        && reference_uri.as_deref() == Some(format!("#{id}").as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        "<DTE version=\"1.0\"><Documento ID=\"F77T33\">",
        "<Encabezado><Folio>77</Folio></Encabezado>",
        "</Documento></DTE>"
    );

    #[test]
    fn extracts_documento_fragment() {
        let fragment = documento_fragment(SAMPLE).unwrap();
        assert!(fragment.starts_with("<Documento ID=\"F77T33\">"));
        assert!(fragment.ends_with("</Documento>"));
    }

    #[test]
    fn reads_documento_id() {
        let fragment = documento_fragment(SAMPLE).unwrap();
        assert_eq!(documento_id(fragment).unwrap(), "F77T33");
    }

    #[test]
    fn missing_documento_is_an_error() {
        let err = documento_fragment("<DTE></DTE>").unwrap_err();
        assert!(matches!(err, DteError::Signing(_)));
    }

    #[test]
    fn signed_info_carries_fixed_algorithms() {
        let si = build_signed_info("F77T33", "abc=", true);
        assert!(si.contains("rsa-sha1"));
        assert!(si.contains("REC-xml-c14n-20010315"));
        assert!(si.contains("URI=\"#F77T33\""));
        assert!(si.contains("<DigestValue>abc=</DigestValue>"));
    }

    #[test]
    fn unsigned_document_fails_structure_check() {
        assert!(!verify_structure(SAMPLE));
    }

    #[test]
    fn structure_check_accepts_well_formed_signature() {
        let signed = SAMPLE.replacen(
            "</DTE>",
            concat!(
                "<Signature xmlns=\"http://www.w3.org/2000/09/xmldsig#\">",
                "<SignedInfo><Reference URI=\"#F77T33\">",
                "<DigestValue>ZGlnZXN0</DigestValue>",
                "</Reference></SignedInfo>",
                "<SignatureValue>c2ln</SignatureValue>",
                "</Signature></DTE>"
            ),
            1,
        );
        assert!(verify_structure(&signed));
    }

    #[test]
    fn mismatched_reference_uri_fails_structure_check() {
        let signed = SAMPLE.replacen(
            "</DTE>",
            concat!(
                "<Signature><SignedInfo><Reference URI=\"#F99T33\">",
                "<DigestValue>ZGlnZXN0</DigestValue>",
                "</Reference></SignedInfo>",
                "<SignatureValue>c2ln</SignatureValue>",
                "</Signature></DTE>"
            ),
            1,
        );
        assert!(!verify_structure(&signed));
    }
}
