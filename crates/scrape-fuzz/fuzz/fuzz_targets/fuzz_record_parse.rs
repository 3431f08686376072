#![no_main]

use libfuzzer_sys::fuzz_target;
use paper_scrape::PaperRecord;

fuzz_target!(|data: &[u8]| {
    // Whatever deserializes must serialize again
    if let Ok(record) = serde_json::from_slice::<PaperRecord>(data) {
        let _ = serde_json::to_string(&record);
    }
});
