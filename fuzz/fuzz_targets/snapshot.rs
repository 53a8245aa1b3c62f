#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(snapshot) = covscope::coverage::decode(data) {
        let bytes = covscope::coverage::encode(&snapshot).unwrap();
        assert_eq!(covscope::coverage::decode(&bytes).unwrap(), snapshot);
    }
});
