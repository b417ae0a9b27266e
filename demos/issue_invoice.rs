use chrono::NaiveDate;
use dte_cl::caf::{FolioAllocator, parse_caf};
use dte_cl::core::*;
use dte_cl::sign::{SigningIdentity, sign_dte, verify_structure};
use dte_cl::xml::dte_xml;
use rsa::RsaPrivateKey;
use rust_decimal_macros::dec;

// A CAF as downloaded from the authority, folios 45-144 for facturas.
const CAF: &str = r#"<AUTORIZACION><CAF version="1.0"><DA>
  <RE>76543210-3</RE><RS>COMERCIAL ACME SPA</RS><TD>33</TD>
  <RNG><D>45</D><H>144</H></RNG><FA>2024-03-01</FA>
  <RSAPK><M>0a1b2c3d4e5f</M><E>Aw==</E></RSAPK><IDK>100</IDK>
</DA><FRMA algoritmo="SHA1withRSA">c2lnbmF0dXJl</FRMA></CAF></AUTORIZACION>"#;

fn main() {
    let company: Rut = "76543210-3".parse().unwrap();

    // Import the authorized folio range
    let allocator = FolioAllocator::new();
    allocator.import(company, parse_caf(CAF).unwrap()).unwrap();

    // Build the invoice; unit prices are tax-inclusive
    let draft = DteBuilder::new(
        DteType::Invoice,
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
    )
    .due_date(NaiveDate::from_ymd_opt(2024, 7, 15).unwrap())
    .issuer(
        PartyBuilder::new(company, "Comercial ACME SpA")
            .line_of_business("Venta de software")
            .activity_code(620200)
            .address("Av. Providencia 1234", "Providencia", "Santiago")
            .build(),
    )
    .receiver(PartyBuilder::new("12345678-5".parse().unwrap(), "Cliente Ltda").build())
    .add_line(
        LineItemBuilder::new("Licencia anual", dec!(2), dec!(1190))
            .description("Plan empresa")
            .build(),
    )
    .add_line(LineItemBuilder::new("Capacitación", dec!(1), dec!(50000)).exempt().build())
    .build()
    .unwrap();

    let totals = draft.totals.as_ref().unwrap();
    println!("Neto:   {}", totals.net);
    println!("Exento: {}", totals.exempt);
    println!("IVA:    {}", totals.iva);
    println!("Total:  {}", totals.total);

    // Allocate a folio and render the canonical XML
    let folio = allocator.next_folio(&company, DteType::Invoice).unwrap();
    let dte = draft.bind_folio(folio);
    let xml = dte_xml(&dte).unwrap();

    // Sign with a throwaway key; production code loads the taxpayer's
    // certificate via SigningIdentity::from_pem or from_encrypted_pem.
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let identity = SigningIdentity::from_parts(key, b"demo-certificate".to_vec());
    let signed = sign_dte(&xml, &identity).unwrap();

    println!("\nfolio {folio} signed, structure ok: {}", verify_structure(&signed));
    println!("remaining folios: {}", allocator.remaining(&company, DteType::Invoice));
    println!("\n{signed}");
}
