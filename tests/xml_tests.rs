#![cfg(feature = "xml")]

use chrono::NaiveDate;
use dte_cl::core::*;
use dte_cl::xml::{documento_id, dte_xml};
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn issuer() -> Party {
    PartyBuilder::new("76543210-3".parse().unwrap(), "Comercial ACME SpA")
        .line_of_business("Venta de software")
        .activity_code(620200)
        .address("Av. Providencia 1234", "Providencia", "Santiago")
        .build()
}

fn invoice(folio: u64) -> Dte {
    DteBuilder::new(DteType::Invoice, date(2024, 6, 15))
        .due_date(date(2024, 7, 15))
        .issuer(issuer())
        .receiver(PartyBuilder::new("12345678-5".parse().unwrap(), "Cliente Ltda").build())
        .add_line(
            LineItemBuilder::new("Licencia", dec!(2), dec!(1190))
                .description("Plan empresa")
                .build(),
        )
        .build()
        .unwrap()
        .bind_folio(folio)
}

fn position(xml: &str, needle: &str) -> usize {
    xml.find(needle)
        .unwrap_or_else(|| panic!("expected {needle} in {xml}"))
}

#[test]
fn sections_appear_in_schema_order() {
    let xml = dte_xml(&invoice(45)).unwrap();
    let id_doc = position(&xml, "<IdDoc>");
    let emisor = position(&xml, "<Emisor>");
    let receptor = position(&xml, "<Receptor>");
    let totales = position(&xml, "<Totales>");
    let detalle = position(&xml, "<Detalle>");
    assert!(id_doc < emisor);
    assert!(emisor < receptor);
    assert!(receptor < totales);
    assert!(totales < detalle, "Encabezado closes before Detalle");
}

#[test]
fn id_doc_fields_in_order() {
    let xml = dte_xml(&invoice(45)).unwrap();
    let tipo = position(&xml, "<TipoDTE>");
    let folio = position(&xml, "<Folio>");
    let emis = position(&xml, "<FchEmis>");
    let venc = position(&xml, "<FchVenc>");
    assert!(tipo < folio && folio < emis && emis < venc);
}

#[test]
fn output_is_byte_stable_across_renders() {
    let dte = invoice(45);
    assert_eq!(dte_xml(&dte).unwrap(), dte_xml(&dte).unwrap());
}

#[test]
fn documento_id_formats_folio_and_type() {
    assert_eq!(documento_id(&invoice(45)), "F45T33");
    assert_eq!(documento_id(&invoice(9000123)), "F9000123T33");
}

#[test]
fn text_content_is_escaped() {
    let dte = DteBuilder::new(DteType::Invoice, date(2024, 6, 15))
        .issuer(issuer())
        .receiver(PartyBuilder::new("12345678-5".parse().unwrap(), "P & G <Chile>").build())
        .add_line(LineItemBuilder::new("Cable \"premium\"", dec!(1), dec!(1190)).build())
        .build()
        .unwrap()
        .bind_folio(48);
    let xml = dte_xml(&dte).unwrap();
    assert!(xml.contains("P &amp; G &lt;Chile&gt;"));
    assert!(!xml.contains("<Chile>"));
}

#[test]
fn zero_buckets_are_omitted() {
    // All-exempt document: no MntNeto, no IVA pair
    let dte = DteBuilder::new(DteType::ExemptInvoice, date(2024, 6, 15))
        .issuer(issuer())
        .receiver(PartyBuilder::new("12345678-5".parse().unwrap(), "Fundación X").build())
        .add_line(LineItemBuilder::new("Donación", dec!(1), dec!(10000)).exempt().build())
        .build()
        .unwrap()
        .bind_folio(49);
    let xml = dte_xml(&dte).unwrap();
    assert!(!xml.contains("<MntNeto>"));
    assert!(!xml.contains("<IVA>"));
    assert!(!xml.contains("<TasaIVA>"));
    assert!(xml.contains("<MntExe>10000</MntExe>"));
    assert!(xml.contains("<MntTotal>10000</MntTotal>"));
}
