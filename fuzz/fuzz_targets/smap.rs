#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(mapping) = covscope::coverage::LineMapping::parse(text) {
            for output in 0..64 {
                let _ = mapping.map_line(output);
            }
        }
    }
});
