#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = dte_cl::sign::verify_structure(s);
        let _ = dte_cl::sign::canonicalize(s);
    }
});
