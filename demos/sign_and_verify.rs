use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDate;
use dte_cl::core::*;
use dte_cl::sign::{SigningIdentity, canonicalize, documento_fragment, sign_dte, verify_structure};
use dte_cl::xml::dte_xml;
use rsa::RsaPrivateKey;
use rust_decimal_macros::dec;
use sha1::{Digest, Sha1};

fn main() {
    let dte = DteBuilder::new(
        DteType::Invoice,
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
    )
    .issuer(
        PartyBuilder::new("76543210-3".parse().unwrap(), "ACME SpA")
            .line_of_business("Software")
            .build(),
    )
    .receiver(PartyBuilder::new("12345678-5".parse().unwrap(), "Cliente Ltda").build())
    .add_line(LineItemBuilder::new("Consultoría", dec!(2), dec!(1190)).build())
    .build()
    .unwrap()
    .bind_folio(45);

    let xml = dte_xml(&dte).unwrap();

    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let identity = SigningIdentity::from_parts(key, b"demo-certificate".to_vec());
    let signed = sign_dte(&xml, &identity).unwrap();

    // The structural check the submission path uses
    println!("signature present: {}", verify_structure(&signed));

    // Recompute the digest independently, like a receiving system would
    let fragment = documento_fragment(&signed).unwrap();
    let canonical = canonicalize(fragment).unwrap();
    let digest = BASE64.encode(Sha1::digest(canonical.as_bytes()));
    println!("digest over canonical Documento: {digest}");
    println!("embedded in document:            {}", signed.contains(&digest));
}
