#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = dte_cl::gateway::decode_reply(None, s);
        let _ = dte_cl::gateway::decode_reply(Some("application/json"), s);
        let _ = dte_cl::gateway::decode_reply(Some("text/xml"), s);
    }
    let _ = dte_cl::gateway::decode_binary(None, data);
});
