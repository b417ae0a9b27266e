use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;

use crate::core::DteError;

pub type XmlResult = Result<String, DteError>;

fn xml_io(e: std::io::Error) -> DteError {
    DteError::Xml(format!("XML write error: {e}"))
}

/// Thin wrapper over quick-xml's writer. No indentation, since the
/// signed fragment must be byte-stable.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, DteError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    /// A writer without the XML declaration, for inner fragments.
    pub fn fragment() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    pub fn into_string(self) -> Result<String, DteError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| DteError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, DteError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, DteError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, DteError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, DteError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write a whole-peso amount (no decimal places).
    pub fn amount_element(&mut self, name: &str, amount: Decimal) -> Result<&mut Self, DteError> {
        self.text_element(name, &format_peso(amount))
    }

    /// Write a quantity with trailing zeros trimmed.
    pub fn quantity_element(&mut self, name: &str, qty: Decimal) -> Result<&mut Self, DteError> {
        self.text_element(name, &format_quantity(qty))
    }

    /// Write a raw pre-serialized fragment verbatim (no escaping).
    pub fn raw(&mut self, xml: &str) -> Result<&mut Self, DteError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(xml)))
            .map_err(xml_io)?;
        Ok(self)
    }
}

/// Format a whole-peso amount: integer digits, no separators.
pub fn format_peso(amount: Decimal) -> String {
    amount.trunc().to_string()
}

/// Format a quantity: trailing fractional zeros trimmed, integer
/// quantities rendered without a decimal point.
pub fn format_quantity(qty: Decimal) -> String {
    qty.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn format_peso_cases() {
        assert_eq!(format_peso(dec!(2380)), "2380");
        assert_eq!(format_peso(dec!(0)), "0");
        assert_eq!(format_peso(dec!(1500.0)), "1500");
    }

    #[test]
    fn format_quantity_cases() {
        assert_eq!(format_quantity(dec!(2)), "2");
        assert_eq!(format_quantity(dec!(2.50)), "2.5");
        assert_eq!(format_quantity(dec!(0.125)), "0.125");
    }

    #[test]
    fn writer_produces_unindented_elements() {
        let mut w = XmlWriter::fragment();
        w.start_element("A").unwrap();
        w.text_element("B", "x").unwrap();
        w.end_element("A").unwrap();
        assert_eq!(w.into_string().unwrap(), "<A><B>x</B></A>");
    }

    #[test]
    fn text_is_escaped() {
        let mut w = XmlWriter::fragment();
        w.text_element("N", "a < b & c").unwrap();
        assert_eq!(w.into_string().unwrap(), "<N>a &lt; b &amp; c</N>");
    }
}
