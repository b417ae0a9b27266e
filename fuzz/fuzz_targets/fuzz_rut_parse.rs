#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(rut) = s.parse::<dte_cl::core::Rut>() {
            let _ = rut.is_valid();
            let _ = rut.to_string();
        }
    }
});
