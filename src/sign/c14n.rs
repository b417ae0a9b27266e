use quick_xml::Reader;
use quick_xml::events::Event;

use crate::core::DteError;

/// Inclusive canonicalization (W3C REC-xml-c14n-20010315) of an XML
/// fragment: declaration and comments dropped, empty elements expanded,
/// attributes sorted (namespace declarations first), text and attribute
/// values re-escaped canonically.
///
/// This covers the XML this crate itself produces; it is not a general
/// c14n processor (no DTDs, processing instructions, or relative
/// namespace URIs).
pub fn canonicalize(xml: &str) -> Result<String, DteError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut out = String::with_capacity(xml.len());
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .map_err(|e| DteError::Xml(format!("c14n: bad element name: {e}")))?
                    .to_string();
                let mut attrs: Vec<(String, String)> = Vec::new();
                for attr in e.attributes() {
                    let attr =
                        attr.map_err(|e| DteError::Xml(format!("c14n: bad attribute: {e}")))?;
                    let key = std::str::from_utf8(attr.key.as_ref())
                        .map_err(|e| DteError::Xml(format!("c14n: bad attribute name: {e}")))?
                        .to_string();
                    let value = attr
                        .unescape_value()
                        .map_err(|e| DteError::Xml(format!("c14n: bad attribute value: {e}")))?
                        .into_owned();
                    attrs.push((key, value));
                }
                attrs.sort_by(|(a, _), (b, _)| {
                    let a_ns = a == "xmlns" || a.starts_with("xmlns:");
                    let b_ns = b == "xmlns" || b.starts_with("xmlns:");
                    b_ns.cmp(&a_ns).then_with(|| a.cmp(b))
                });

                out.push('<');
                out.push_str(&name);
                for (key, value) in &attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
            }
            Ok(Event::End(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .map_err(|e| DteError::Xml(format!("c14n: bad element name: {e}")))?
                    .to_string();
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| DteError::Xml(format!("c14n: bad text: {e}")))?;
                out.push_str(&escape_text(&text));
            }
            Ok(Event::CData(ref e)) => {
                let text = std::str::from_utf8(e)
                    .map_err(|e| DteError::Xml(format!("c14n: bad CDATA: {e}")))?;
                out.push_str(&escape_text(text));
            }
            // Declaration, comments, and PIs do not survive c14n here
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::PI(_)) | Ok(Event::DocType(_)) => {}
            Ok(Event::Empty(_)) => unreachable!("empty elements are expanded"),
            Ok(Event::Eof) => break,
            Err(e) => return Err(DteError::Xml(format!("c14n parse error: {e}"))),
        }
    }
    Ok(out)
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
    out
}
