use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::core::{DteError, DteType, Rut};

/// A parsed CAF authorization file.
///
/// The authority's public key (`RSAPK`) and its signature over the range
/// (`FRMA`) are kept as opaque base64 — they authenticate the range itself
/// and are never regenerated or interpreted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caf {
    /// RUT of the company the range was authorized for.
    pub issuer_rut: Rut,
    /// Legal name on the authorization.
    pub issuer_name: String,
    /// Document type the range covers.
    pub dte_type: DteType,
    /// First folio of the range (inclusive).
    pub range_start: u64,
    /// Last folio of the range (inclusive).
    pub range_end: u64,
    /// Date the authority granted the range.
    pub authorization_date: NaiveDate,
    /// Authority public key modulus (base64, opaque).
    pub public_modulus: String,
    /// Authority public key exponent (base64, opaque).
    pub public_exponent: String,
    /// Authority key identifier.
    pub key_id: Option<String>,
    /// Authority signature over the range (base64, opaque).
    pub signature: String,
}

impl Caf {
    /// Number of folios the range holds.
    pub fn capacity(&self) -> u64 {
        self.range_end - self.range_start + 1
    }
}

/// Parse a CAF authorization XML file
/// (`<AUTORIZACION><CAF><DA>...<FRMA>...`).
pub fn parse_caf(xml: &str) -> Result<Caf, DteError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut issuer_rut: Option<Rut> = None;
    let mut issuer_name: Option<String> = None;
    let mut type_code: Option<u16> = None;
    let mut range_start: Option<u64> = None;
    let mut range_end: Option<u64> = None;
    let mut authorization_date: Option<NaiveDate> = None;
    let mut public_modulus: Option<String> = None;
    let mut public_exponent: Option<String> = None;
    let mut key_id: Option<String> = None;
    let mut signature: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .unwrap_or("")
                    .to_string();
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if text.is_empty() {
                    continue;
                }
                let Some(tag) = path.last().map(String::as_str) else {
                    continue;
                };
                let in_da = path.iter().any(|p| p == "DA");
                match tag {
                    "RE" if in_da => issuer_rut = Some(text.parse()?),
                    "RS" if in_da => issuer_name = Some(text),
                    "TD" if in_da => {
                        type_code = Some(text.parse().map_err(|_| {
                            DteError::Xml(format!("CAF: invalid document type code '{text}'"))
                        })?)
                    }
                    "D" if in_da => {
                        range_start = Some(text.parse().map_err(|_| {
                            DteError::Xml(format!("CAF: invalid range start '{text}'"))
                        })?)
                    }
                    "H" if in_da => {
                        range_end = Some(text.parse().map_err(|_| {
                            DteError::Xml(format!("CAF: invalid range end '{text}'"))
                        })?)
                    }
                    "FA" if in_da => {
                        authorization_date =
                            Some(NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| {
                                DteError::Xml(format!("CAF: invalid authorization date: {e}"))
                            })?)
                    }
                    "M" if in_da => public_modulus = Some(text),
                    "E" if in_da => public_exponent = Some(text),
                    "IDK" if in_da => key_id = Some(text),
                    "FRMA" => signature = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DteError::Xml(format!("CAF parse error: {e}"))),
            _ => {}
        }
    }

    let missing = |field: &str| DteError::Xml(format!("CAF: missing {field}"));
    let type_code = type_code.ok_or_else(|| missing("TD (document type)"))?;
    let dte_type = DteType::from_code(type_code)
        .ok_or_else(|| DteError::Xml(format!("CAF: unknown document type code {type_code}")))?;
    let range_start = range_start.ok_or_else(|| missing("RNG/D (range start)"))?;
    let range_end = range_end.ok_or_else(|| missing("RNG/H (range end)"))?;
    if range_start == 0 || range_end < range_start {
        return Err(DteError::Xml(format!(
            "CAF: invalid folio range [{range_start}, {range_end}]"
        )));
    }

    let signature = signature.ok_or_else(|| missing("FRMA (authority signature)"))?;
    let compact: String = signature.split_whitespace().collect();
    if BASE64.decode(&compact).is_err() {
        return Err(DteError::Xml(
            "CAF: authority signature is not valid base64".into(),
        ));
    }

    Ok(Caf {
        issuer_rut: issuer_rut.ok_or_else(|| missing("RE (issuer RUT)"))?,
        issuer_name: issuer_name.ok_or_else(|| missing("RS (issuer name)"))?,
        dte_type,
        range_start,
        range_end,
        authorization_date: authorization_date.ok_or_else(|| missing("FA (authorization date)"))?,
        public_modulus: public_modulus.ok_or_else(|| missing("RSAPK/M"))?,
        public_exponent: public_exponent.ok_or_else(|| missing("RSAPK/E"))?,
        key_id,
        signature: compact,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_caf_xml(td: u16, start: u64, end: u64) -> String {
        format!(
            r#"<AUTORIZACION>
  <CAF version="1.0">
    <DA>
      <RE>76543210-3</RE>
      <RS>ACME SPA</RS>
      <TD>{td}</TD>
      <RNG><D>{start}</D><H>{end}</H></RNG>
      <FA>2024-03-01</FA>
      <RSAPK><M>0a1b2c3d4e5f</M><E>Aw==</E></RSAPK>
      <IDK>100</IDK>
    </DA>
    <FRMA algoritmo="SHA1withRSA">c2lnbmF0dXJl</FRMA>
  </CAF>
</AUTORIZACION>"#
        )
    }

    #[test]
    fn parses_well_formed_caf() {
        let caf = parse_caf(&sample_caf_xml(33, 100, 199)).unwrap();
        assert_eq!(caf.issuer_rut.to_string(), "76543210-3");
        assert_eq!(caf.issuer_name, "ACME SPA");
        assert_eq!(caf.dte_type, DteType::Invoice);
        assert_eq!(caf.range_start, 100);
        assert_eq!(caf.range_end, 199);
        assert_eq!(caf.capacity(), 100);
        assert_eq!(
            caf.authorization_date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(caf.signature, "c2lnbmF0dXJl");
        assert_eq!(caf.key_id.as_deref(), Some("100"));
    }

    #[test]
    fn rejects_unknown_type_code() {
        let err = parse_caf(&sample_caf_xml(77, 1, 10)).unwrap_err();
        assert!(err.to_string().contains("unknown document type"));
    }

    #[test]
    fn rejects_inverted_range() {
        let err = parse_caf(&sample_caf_xml(33, 50, 10)).unwrap_err();
        assert!(err.to_string().contains("invalid folio range"));
    }

    #[test]
    fn rejects_missing_signature() {
        let xml = sample_caf_xml(33, 1, 10).replace("<FRMA algoritmo=\"SHA1withRSA\">c2lnbmF0dXJl</FRMA>", "");
        let err = parse_caf(&xml).unwrap_err();
        assert!(err.to_string().contains("FRMA"));
    }

    #[test]
    fn single_folio_range_is_valid() {
        let caf = parse_caf(&sample_caf_xml(39, 100, 100)).unwrap();
        assert_eq!(caf.capacity(), 1);
    }
}
